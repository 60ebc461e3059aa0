//! # Inventory System
//!
//! Slot-based inventories held in a dense pool and referenced from cold
//! data by `inventory_index`. Quantities per resource are mirrored into an
//! O(1) cache so aggregate queries never walk the slots.
//!
//! Change callbacks and events fire after the mutation is complete; a
//! callback must not re-enter the inventory it was fired from.

use std::collections::HashMap;

use emberwake_shared::{
    EntityHandle, EventSender, ResourceHandle, SimEvent, TemplateRegistry,
};

use crate::error::CoreError;

/// Hard per-resource safety limit; quantities beyond this indicate a bug.
pub const MAX_SAFE_QUANTITY: u32 = 1_000_000;

/// One inventory slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InventorySlot {
    /// Stored resource, `ResourceHandle::INVALID` when empty
    pub resource: ResourceHandle,
    /// Units in the slot
    pub quantity: u32,
}

impl InventorySlot {
    /// Slot holds nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.resource.is_valid() || self.quantity == 0
    }

    /// Empties the slot.
    #[inline]
    pub fn clear(&mut self) {
        self.resource = ResourceHandle::INVALID;
        self.quantity = 0;
    }
}

/// Callback invoked after a resource quantity changes:
/// `(resource, old_total, new_total)`.
pub type ChangeCallback = Box<dyn Fn(ResourceHandle, u32, u32) + Send + Sync>;

/// A slot-based inventory bound to an owning entity and a world.
pub struct Inventory {
    slots: Vec<InventorySlot>,
    max_slots: usize,
    quantity_cache: HashMap<ResourceHandle, u32>,
    owner: EntityHandle,
    world_id: String,
    callbacks: Vec<ChangeCallback>,
}

impl Inventory {
    /// Creates an inventory with `max_slots` empty slots.
    #[must_use]
    pub fn new(owner: EntityHandle, max_slots: usize, world_id: impl Into<String>) -> Self {
        Self {
            slots: vec![InventorySlot::default(); max_slots],
            max_slots,
            quantity_cache: HashMap::new(),
            owner,
            world_id: world_id.into(),
            callbacks: Vec::new(),
        }
    }

    /// Owning entity.
    #[inline]
    #[must_use]
    pub fn owner(&self) -> EntityHandle {
        self.owner
    }

    /// World the inventory is registered in.
    #[must_use]
    pub fn world_id(&self) -> &str {
        &self.world_id
    }

    /// Rebinds the inventory to a world.
    pub fn set_world_id(&mut self, world_id: impl Into<String>) {
        self.world_id = world_id.into();
    }

    /// Registers a change callback.
    ///
    /// Callbacks run after the mutation completes and must not call back
    /// into this inventory.
    pub fn add_change_callback(&mut self, callback: ChangeCallback) {
        self.callbacks.push(callback);
    }

    /// Configured slot count.
    #[inline]
    #[must_use]
    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn used_slots(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// Number of empty slots.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.max_slots - self.used_slots()
    }

    /// True when no slot is empty.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| !s.is_empty())
    }

    /// True when every slot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(InventorySlot::is_empty)
    }

    /// O(1) total quantity of `resource`.
    #[must_use]
    pub fn quantity(&self, resource: ResourceHandle) -> u32 {
        self.quantity_cache.get(&resource).copied().unwrap_or(0)
    }

    /// True when at least `minimum` units of `resource` are held.
    #[must_use]
    pub fn has_resource(&self, resource: ResourceHandle, minimum: u32) -> bool {
        self.quantity(resource) >= minimum
    }

    /// Shared view of a slot; `None` out of range.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&InventorySlot> {
        self.slots.get(index)
    }

    /// All per-resource totals.
    #[must_use]
    pub fn all_resources(&self) -> &HashMap<ResourceHandle, u32> {
        &self.quantity_cache
    }

    /// How many more units of `resource` fit, given its stack cap.
    #[must_use]
    pub fn stackable_space(&self, resource: ResourceHandle, max_stack: u32) -> u32 {
        let mut space = 0u32;
        for slot in &self.slots {
            if slot.is_empty() {
                space = space.saturating_add(max_stack);
            } else if slot.resource == resource {
                space = space.saturating_add(max_stack.saturating_sub(slot.quantity));
            }
        }
        space
    }

    /// Adds `quantity` units of `resource`, all-or-nothing.
    ///
    /// Fills existing stacks first, then empty slots. Returns `false`
    /// without mutating when the full amount does not fit or the quantity
    /// is zero/unsafe.
    pub fn add(&mut self, resource: ResourceHandle, quantity: u32, max_stack: u32) -> bool {
        if quantity == 0 || quantity > MAX_SAFE_QUANTITY || !resource.is_valid() {
            return false;
        }
        let max_stack = max_stack.max(1);
        if self.stackable_space(resource, max_stack) < quantity {
            return false;
        }

        let old_total = self.quantity(resource);
        let mut remaining = quantity;

        // Top up existing stacks.
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if !slot.is_empty() && slot.resource == resource && slot.quantity < max_stack {
                let take = remaining.min(max_stack - slot.quantity);
                slot.quantity += take;
                remaining -= take;
            }
        }
        // Spill into empty slots.
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if slot.is_empty() {
                let take = remaining.min(max_stack);
                slot.resource = resource;
                slot.quantity = take;
                remaining -= take;
            }
        }
        debug_assert_eq!(remaining, 0, "space check and fill disagree");

        let new_total = old_total + quantity;
        self.quantity_cache.insert(resource, new_total);
        self.notify(resource, old_total, new_total);
        true
    }

    /// Removes `quantity` units of `resource`, all-or-nothing.
    ///
    /// Drains later slots first so earlier stacks keep their positions.
    pub fn remove(&mut self, resource: ResourceHandle, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }
        let old_total = self.quantity(resource);
        if old_total < quantity {
            return false;
        }

        let mut remaining = quantity;
        for slot in self.slots.iter_mut().rev() {
            if remaining == 0 {
                break;
            }
            if !slot.is_empty() && slot.resource == resource {
                let take = remaining.min(slot.quantity);
                slot.quantity -= take;
                remaining -= take;
                if slot.quantity == 0 {
                    slot.clear();
                }
            }
        }
        debug_assert_eq!(remaining, 0, "cache and slots disagree");

        let new_total = old_total - quantity;
        if new_total == 0 {
            self.quantity_cache.remove(&resource);
        } else {
            self.quantity_cache.insert(resource, new_total);
        }
        self.notify(resource, old_total, new_total);
        true
    }

    /// Swaps the contents of two slots. False when either index is out of
    /// range. Totals are unchanged, so no notification fires.
    pub fn swap_slots(&mut self, a: usize, b: usize) -> bool {
        if a >= self.slots.len() || b >= self.slots.len() {
            return false;
        }
        self.slots.swap(a, b);
        true
    }

    /// Moves units from one slot into another (grid-inventory drag).
    ///
    /// The target must be empty or hold the same resource with room under
    /// its stack cap. Totals are unchanged, so no notification fires.
    pub fn move_between_slots(&mut self, from: usize, to: usize, quantity: u32, max_stack: u32) -> bool {
        if from == to || from >= self.slots.len() || to >= self.slots.len() || quantity == 0 {
            return false;
        }
        let source = self.slots[from];
        if source.is_empty() || source.quantity < quantity {
            return false;
        }
        let target = self.slots[to];
        let max_stack = max_stack.max(1);
        let room = if target.is_empty() {
            max_stack
        } else if target.resource == source.resource {
            max_stack.saturating_sub(target.quantity)
        } else {
            0
        };
        if room < quantity {
            return false;
        }

        self.slots[to].resource = source.resource;
        self.slots[to].quantity += quantity;
        self.slots[from].quantity -= quantity;
        if self.slots[from].quantity == 0 {
            self.slots[from].clear();
        }
        true
    }

    /// Merges trailing stacks into earlier ones and packs occupied slots to
    /// the front. Totals are unchanged.
    pub fn compact(&mut self, max_stack_of: impl Fn(ResourceHandle) -> u32) {
        // Merge partial stacks of the same resource.
        for i in 0..self.slots.len() {
            if self.slots[i].is_empty() {
                continue;
            }
            let resource = self.slots[i].resource;
            let cap = max_stack_of(resource).max(1);
            for j in (i + 1)..self.slots.len() {
                if self.slots[i].quantity >= cap {
                    break;
                }
                if !self.slots[j].is_empty() && self.slots[j].resource == resource {
                    let take = (cap - self.slots[i].quantity).min(self.slots[j].quantity);
                    self.slots[i].quantity += take;
                    self.slots[j].quantity -= take;
                    if self.slots[j].quantity == 0 {
                        self.slots[j].clear();
                    }
                }
            }
        }
        // Pack occupied slots to the front.
        self.slots.sort_by_key(InventorySlot::is_empty);
    }

    /// Empties every slot, firing one notification per resource removed.
    pub fn clear(&mut self) {
        let totals: Vec<(ResourceHandle, u32)> =
            self.quantity_cache.iter().map(|(r, q)| (*r, *q)).collect();
        for slot in &mut self.slots {
            slot.clear();
        }
        self.quantity_cache.clear();
        for (resource, old_total) in totals {
            self.notify(resource, old_total, 0);
        }
    }

    /// Recomputes the quantity cache from the slots and reports whether it
    /// already agreed. A `false` return means the cache had diverged (a
    /// fatal invariant in debug builds); the cache is repaired either way.
    pub fn validate(&mut self) -> bool {
        let mut recomputed: HashMap<ResourceHandle, u32> = HashMap::new();
        for slot in &self.slots {
            if !slot.is_empty() {
                *recomputed.entry(slot.resource).or_insert(0) += slot.quantity;
            }
        }
        let consistent = recomputed == self.quantity_cache;
        if !consistent {
            tracing::error!(owner = %self.owner, "inventory quantity cache diverged, rebuilding");
            debug_assert!(consistent, "inventory quantity cache diverged");
            self.quantity_cache = recomputed;
        }
        consistent
    }

    /// Total template value of the contents.
    #[must_use]
    pub fn total_value(&self, templates: &TemplateRegistry) -> f32 {
        self.slots
            .iter()
            .filter(|s| !s.is_empty())
            .filter_map(|s| templates.get(s.resource).map(|t| t.value * s.quantity as f32))
            .sum()
    }

    /// Total carry weight of the contents.
    #[must_use]
    pub fn total_weight(&self, templates: &TemplateRegistry) -> f32 {
        self.slots
            .iter()
            .filter(|s| !s.is_empty())
            .filter_map(|s| templates.get(s.resource).map(|t| t.weight * s.quantity as f32))
            .sum()
    }

    fn notify(&self, resource: ResourceHandle, old_total: u32, new_total: u32) {
        for callback in &self.callbacks {
            callback(resource, old_total, new_total);
        }
    }
}

/// Dense pool of inventories with free-list slot reuse.
///
/// An inventory index stays valid until `free` is called for it; the store
/// frees a character's or container's inventory when the entity is
/// destroyed.
pub struct InventoryPool {
    inventories: Vec<Option<Inventory>>,
    free_list: Vec<u32>,
    capacity: usize,
    events: Option<EventSender>,
}

impl InventoryPool {
    /// Creates a pool with a hard capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inventories: Vec::with_capacity(capacity.min(1024)),
            free_list: Vec::new(),
            capacity,
            events: None,
        }
    }

    /// Attaches an event sender; subsequent mutations publish
    /// [`SimEvent::ResourceChange`].
    pub fn set_event_sender(&mut self, events: EventSender) {
        self.events = Some(events);
    }

    /// Allocates an inventory, reusing a freed slot when available.
    ///
    /// # Errors
    ///
    /// `NoInventoryCapacity` when the pool is at its hard cap.
    pub fn allocate(
        &mut self,
        owner: EntityHandle,
        max_slots: usize,
        world_id: impl Into<String>,
    ) -> Result<u32, CoreError> {
        let inventory = Inventory::new(owner, max_slots, world_id);
        if let Some(index) = self.free_list.pop() {
            self.inventories[index as usize] = Some(inventory);
            return Ok(index);
        }
        if self.inventories.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "inventory pool exhausted");
            return Err(CoreError::NoInventoryCapacity {
                capacity: self.capacity,
            });
        }
        let index = u32::try_from(self.inventories.len()).unwrap_or(u32::MAX);
        self.inventories.push(Some(inventory));
        Ok(index)
    }

    /// Frees an inventory slot for reuse. No-op on unknown indices.
    pub fn free(&mut self, index: u32) {
        if let Some(slot) = self.inventories.get_mut(index as usize) {
            if slot.take().is_some() {
                self.free_list.push(index);
            }
        }
    }

    /// Shared access; `None` for unallocated indices.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&Inventory> {
        self.inventories.get(index as usize)?.as_ref()
    }

    /// Mutable access; `None` for unallocated indices.
    pub fn get_mut(&mut self, index: u32) -> Option<&mut Inventory> {
        self.inventories.get_mut(index as usize)?.as_mut()
    }

    /// Number of live inventories.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inventories.iter().filter(|i| i.is_some()).count()
    }

    /// Adds to an inventory, consulting the template registry for the
    /// stack cap and publishing a change event on success.
    pub fn add(
        &mut self,
        index: u32,
        resource: ResourceHandle,
        quantity: u32,
        templates: &TemplateRegistry,
        reason: &'static str,
    ) -> bool {
        let max_stack = templates.max_stack_size(resource);
        let Some(inventory) = self.get_mut(index) else {
            return false;
        };
        let old_total = inventory.quantity(resource);
        if !inventory.add(resource, quantity, max_stack) {
            return false;
        }
        let owner = inventory.owner();
        self.publish(owner, resource, old_total, old_total + quantity, reason);
        true
    }

    /// Removes from an inventory, publishing a change event on success.
    pub fn remove(
        &mut self,
        index: u32,
        resource: ResourceHandle,
        quantity: u32,
        reason: &'static str,
    ) -> bool {
        let Some(inventory) = self.get_mut(index) else {
            return false;
        };
        let old_total = inventory.quantity(resource);
        if !inventory.remove(resource, quantity) {
            return false;
        }
        let owner = inventory.owner();
        self.publish(owner, resource, old_total, old_total - quantity, reason);
        true
    }

    /// Moves `quantity` of `resource` between two inventories,
    /// all-or-nothing. Fails without mutating when the source lacks the
    /// amount or the target lacks the space.
    pub fn transfer(
        &mut self,
        from: u32,
        to: u32,
        resource: ResourceHandle,
        quantity: u32,
        templates: &TemplateRegistry,
    ) -> bool {
        if from == to {
            return false;
        }
        let max_stack = templates.max_stack_size(resource);
        let Some(source) = self.get(from) else {
            return false;
        };
        if !source.has_resource(resource, quantity) {
            return false;
        }
        let Some(target) = self.get(to) else {
            return false;
        };
        if target.stackable_space(resource, max_stack) < quantity {
            return false;
        }

        let removed = self.remove(from, resource, quantity, "transfer_out");
        debug_assert!(removed);
        let added = self.add(to, resource, quantity, templates, "transfer_in");
        debug_assert!(added);
        removed && added
    }

    fn publish(
        &self,
        owner: EntityHandle,
        resource: ResourceHandle,
        old_quantity: u32,
        new_quantity: u32,
        reason: &'static str,
    ) {
        if let Some(events) = &self.events {
            events.publish(SimEvent::ResourceChange {
                owner,
                resource,
                old_quantity,
                new_quantity,
                reason,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberwake_shared::{EntityKind, ResourceCategory, ResourceTemplate};

    fn templates_with(id: &str, max_stack: u32) -> (TemplateRegistry, ResourceHandle) {
        let mut registry = TemplateRegistry::new(8);
        let mut template = ResourceTemplate::new(id, id, ResourceCategory::Material);
        template.set_max_stack_size(max_stack);
        let handle = registry.register(template).unwrap();
        (registry, handle)
    }

    fn owner() -> EntityHandle {
        EntityHandle::new(1, EntityKind::Npc, 1)
    }

    #[test]
    fn test_overflow_is_all_or_nothing() {
        let (templates, r) = templates_with("ore", 10);
        let mut inv = Inventory::new(owner(), 2, "w");

        assert!(inv.add(r, 10, templates.max_stack_size(r)));
        assert!(inv.add(r, 10, templates.max_stack_size(r)));
        // Both slots are full stacks now; one more unit has nowhere to go.
        assert!(!inv.add(r, 1, templates.max_stack_size(r)));
        assert_eq!(inv.quantity(r), 20);
        assert_eq!(inv.used_slots(), 2);
    }

    #[test]
    fn test_add_remove_restores_state() {
        let (templates, r) = templates_with("ore", 10);
        let mut inv = Inventory::new(owner(), 4, "w");

        assert!(inv.add(r, 7, templates.max_stack_size(r)));
        assert!(inv.add(r, 7, templates.max_stack_size(r)));
        assert_eq!(inv.quantity(r), 14);

        assert!(inv.remove(r, 14));
        assert_eq!(inv.quantity(r), 0);
        assert!(inv.is_empty());
        assert!(inv.validate());
    }

    #[test]
    fn test_remove_more_than_held_fails() {
        let (templates, r) = templates_with("ore", 10);
        let mut inv = Inventory::new(owner(), 2, "w");
        assert!(inv.add(r, 5, templates.max_stack_size(r)));
        assert!(!inv.remove(r, 6));
        assert_eq!(inv.quantity(r), 5);
    }

    #[test]
    fn test_cache_matches_slots() {
        let (templates, r) = templates_with("ore", 3);
        let mut inv = Inventory::new(owner(), 8, "w");
        assert!(inv.add(r, 8, templates.max_stack_size(r)));

        let slot_sum: u32 = (0..8)
            .filter_map(|i| inv.slot(i))
            .filter(|s| !s.is_empty())
            .map(|s| s.quantity)
            .sum();
        assert_eq!(slot_sum, inv.quantity(r));
        assert!(inv.validate());
    }

    #[test]
    fn test_callbacks_fire_after_mutation() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let (templates, r) = templates_with("ore", 10);
        let mut inv = Inventory::new(owner(), 2, "w");
        let seen = Arc::new(AtomicU32::new(0));
        let seen_cb = Arc::clone(&seen);
        inv.add_change_callback(Box::new(move |_, _, new_total| {
            seen_cb.store(new_total, Ordering::Relaxed);
        }));

        assert!(inv.add(r, 4, templates.max_stack_size(r)));
        assert_eq!(seen.load(Ordering::Relaxed), 4);
        assert!(inv.remove(r, 1));
        assert_eq!(seen.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_move_between_slots() {
        let (templates, r) = templates_with("ore", 10);
        let max_stack = templates.max_stack_size(r);
        let mut inv = Inventory::new(owner(), 4, "w");
        assert!(inv.add(r, 10, max_stack));
        assert!(inv.add(r, 4, max_stack));

        // Partial move into a stack with room.
        assert!(inv.move_between_slots(0, 1, 6, max_stack));
        assert_eq!(inv.slot(0).unwrap().quantity, 4);
        assert_eq!(inv.slot(1).unwrap().quantity, 10);

        // No room left in the target stack.
        assert!(!inv.move_between_slots(0, 1, 1, max_stack));
        // Full move into an empty slot clears the source.
        assert!(inv.move_between_slots(0, 3, 4, max_stack));
        assert!(inv.slot(0).unwrap().is_empty());
        assert_eq!(inv.quantity(r), 14);
        assert!(inv.validate());
    }

    #[test]
    fn test_compact_merges_stacks() {
        let (templates, r) = templates_with("ore", 10);
        let mut inv = Inventory::new(owner(), 4, "w");
        assert!(inv.add(r, 10, templates.max_stack_size(r)));
        assert!(inv.add(r, 4, templates.max_stack_size(r)));
        assert!(inv.remove(r, 8));

        inv.compact(|h| templates.max_stack_size(h));
        assert_eq!(inv.quantity(r), 6);
        assert_eq!(inv.used_slots(), 1);
        assert_eq!(inv.slot(0).unwrap().quantity, 6);
        assert!(inv.validate());
    }

    #[test]
    fn test_pool_allocate_free_reuse() {
        let mut pool = InventoryPool::new(4);
        let a = pool.allocate(owner(), 4, "w").unwrap();
        let b = pool.allocate(owner(), 4, "w").unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.live_count(), 2);

        pool.free(a);
        assert_eq!(pool.live_count(), 1);
        assert!(pool.get(a).is_none());

        let c = pool.allocate(owner(), 4, "w").unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_pool_capacity() {
        let mut pool = InventoryPool::new(1);
        pool.allocate(owner(), 2, "w").unwrap();
        assert!(matches!(
            pool.allocate(owner(), 2, "w"),
            Err(CoreError::NoInventoryCapacity { capacity: 1 })
        ));
    }

    #[test]
    fn test_transfer_all_or_nothing() {
        let (templates, r) = templates_with("ore", 10);
        let mut pool = InventoryPool::new(4);
        let a = pool.allocate(owner(), 2, "w").unwrap();
        let b = pool.allocate(owner(), 1, "w").unwrap();

        assert!(pool.add(a, r, 15, &templates, "test"));
        // Target has one slot of 10; 15 cannot fit.
        assert!(!pool.transfer(a, b, r, 15, &templates));
        assert_eq!(pool.get(a).unwrap().quantity(r), 15);
        assert_eq!(pool.get(b).unwrap().quantity(r), 0);

        assert!(pool.transfer(a, b, r, 10, &templates));
        assert_eq!(pool.get(a).unwrap().quantity(r), 5);
        assert_eq!(pool.get(b).unwrap().quantity(r), 10);
    }
}
