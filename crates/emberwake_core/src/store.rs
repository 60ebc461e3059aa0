//! # Entity Data Store
//!
//! Owns every entity slot: hot SoA data, per-kind cold blocks, the
//! inventory pool, handle <-> index mapping and the destruction queue.
//!
//! ## Lifecycle
//!
//! - Creation goes through a typed factory; the slot comes from the free
//!   list (generation bumped) or is appended below the hard cap.
//! - Destruction is two-phase: `destroy` only marks the slot, the actual
//!   removal happens in `commit_pending_destroys` once per tick, after
//!   every system has finished reading.
//!
//! ## Invariants
//!
//! - `cold.owner_of(hot.type_local_index) == dense index` for every live
//!   entity with cold data
//! - a live handle's generation equals its slot's generation
//! - kind buckets, once rebuilt, list exactly the live slots of that kind

use std::collections::HashMap;

use emberwake_shared::{
    EntityHandle, EntityId, EntityKind, ResourceHandle, SimulationTier, TemplateRegistry, Vec2,
    ENTITY_KIND_COUNT,
};
use tracing::{debug, trace, warn};

use crate::cold::{
    CharacterData, ColdStore, ContainerData, HarvestableData, ItemData, ProjectileData,
};
use crate::error::CoreError;
use crate::hot::{HotData, FLAG_ALIVE, FLAG_COLLISION_ENABLED, FLAG_DIRTY};
use crate::inventory::InventoryPool;

/// Counters for monitoring store churn.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityStats {
    /// Entities created since startup
    pub created: u64,
    /// Entities destroyed since startup
    pub destroyed: u64,
    /// Currently live entities
    pub live: usize,
    /// Peak simultaneous live entities
    pub high_water: usize,
}

/// Everything external cleanup needs to know about a destroyed entity.
///
/// Handed to the `commit_pending_destroys` callback so the caller can
/// remove the collision body and unregister world-registry entries before
/// the slot is recycled.
#[derive(Clone, Debug)]
pub struct DestroyRecord {
    /// The (now stale) handle of the destroyed entity
    pub handle: EntityHandle,
    /// Dense index the entity occupied
    pub index: u32,
    /// Entity kind
    pub kind: EntityKind,
    /// Last position
    pub position: Vec2,
    /// Inventory the entity owned, already freed back to the pool
    pub inventory_index: Option<u32>,
}

/// Central data authority for all entities.
pub struct EntityDataStore {
    hot: Vec<HotData>,
    ids: Vec<EntityId>,
    free_list: Vec<u32>,
    id_to_index: HashMap<EntityId, u32>,
    cold: ColdStore,
    inventories: InventoryPool,
    kind_buckets: [Vec<u32>; ENTITY_KIND_COUNT],
    kind_dirty: [bool; ENTITY_KIND_COUNT],
    capacity: usize,
    next_id: EntityId,
    stats: EntityStats,
}

impl EntityDataStore {
    /// Creates a store with hard caps for entities and inventories.
    ///
    /// # Panics
    ///
    /// Panics when `entity_capacity` is zero.
    #[must_use]
    pub fn new(entity_capacity: usize, inventory_capacity: usize) -> Self {
        assert!(entity_capacity > 0, "capacity must be greater than zero");
        Self {
            hot: Vec::with_capacity(entity_capacity.min(4096)),
            ids: Vec::with_capacity(entity_capacity.min(4096)),
            free_list: Vec::new(),
            id_to_index: HashMap::with_capacity(entity_capacity.min(4096)),
            cold: ColdStore::default(),
            inventories: InventoryPool::new(inventory_capacity),
            kind_buckets: Default::default(),
            kind_dirty: [false; ENTITY_KIND_COUNT],
            capacity: entity_capacity,
            next_id: 1,
            stats: EntityStats::default(),
        }
    }

    // =========================================================================
    // Factories
    // =========================================================================

    /// Creates a player character with an inventory.
    ///
    /// # Errors
    ///
    /// `NoCapacity` / `NoInventoryCapacity` when a pool is exhausted.
    pub fn create_player(
        &mut self,
        position: Vec2,
        half: Vec2,
        max_health: f32,
        inventory_slots: usize,
        world_id: &str,
    ) -> Result<EntityHandle, CoreError> {
        self.create_character(EntityKind::Player, position, half, max_health, 0, inventory_slots, world_id)
    }

    /// Creates an NPC with an inventory and a behavior tag.
    ///
    /// # Errors
    ///
    /// `NoCapacity` / `NoInventoryCapacity` when a pool is exhausted.
    pub fn create_npc(
        &mut self,
        position: Vec2,
        half: Vec2,
        max_health: f32,
        behavior: u8,
        inventory_slots: usize,
        world_id: &str,
    ) -> Result<EntityHandle, CoreError> {
        self.create_character(EntityKind::Npc, position, half, max_health, behavior, inventory_slots, world_id)
    }

    /// Creates an item lying in the world.
    ///
    /// # Errors
    ///
    /// `NoCapacity` when the entity pool is exhausted.
    pub fn create_dropped_item(
        &mut self,
        position: Vec2,
        half: Vec2,
        resource: ResourceHandle,
        quantity: u32,
        world_id: &str,
    ) -> Result<EntityHandle, CoreError> {
        let (index, handle) = self.allocate_slot(EntityKind::DroppedItem, position, half)?;
        let local = self.cold.items.push(
            ItemData {
                resource,
                quantity,
                world_id: world_id.to_owned(),
            },
            index,
        );
        self.hot[index as usize].type_local_index = local;
        Ok(handle)
    }

    /// Creates a harvestable node.
    ///
    /// # Errors
    ///
    /// `NoCapacity` when the entity pool is exhausted.
    pub fn create_harvestable(
        &mut self,
        position: Vec2,
        half: Vec2,
        yield_resource: ResourceHandle,
        yield_min: u32,
        yield_max: u32,
        respawn_time: f32,
    ) -> Result<EntityHandle, CoreError> {
        let (index, handle) = self.allocate_slot(EntityKind::Harvestable, position, half)?;
        let local = self.cold.harvestables.push(
            HarvestableData {
                yield_resource,
                yield_min,
                yield_max,
                respawn_time,
                current_respawn: 0.0,
                is_depleted: false,
            },
            index,
        );
        self.hot[index as usize].type_local_index = local;
        Ok(handle)
    }

    /// Creates a container with its own inventory.
    ///
    /// # Errors
    ///
    /// `NoCapacity` / `NoInventoryCapacity` when a pool is exhausted.
    pub fn create_container(
        &mut self,
        position: Vec2,
        half: Vec2,
        inventory_slots: usize,
        loot_table: u32,
        world_id: &str,
    ) -> Result<EntityHandle, CoreError> {
        let (index, handle) = self.allocate_slot(EntityKind::Container, position, half)?;
        let inventory_index = match self.inventories.allocate(handle, inventory_slots, world_id) {
            Ok(idx) => idx,
            Err(e) => {
                self.release_slot(index);
                return Err(e);
            }
        };
        let local = self.cold.containers.push(
            ContainerData {
                inventory_index,
                is_open: false,
                loot_table,
            },
            index,
        );
        self.hot[index as usize].type_local_index = local;
        Ok(handle)
    }

    /// Creates a projectile.
    ///
    /// # Errors
    ///
    /// `NoCapacity` when the entity pool is exhausted.
    pub fn create_projectile(
        &mut self,
        position: Vec2,
        half: Vec2,
        owner: EntityHandle,
        damage: f32,
        lifetime: f32,
        max_speed: f32,
    ) -> Result<EntityHandle, CoreError> {
        let (index, handle) = self.allocate_slot(EntityKind::Projectile, position, half)?;
        let local = self.cold.projectiles.push(
            ProjectileData {
                owner,
                damage,
                lifetime,
                max_speed,
            },
            index,
        );
        self.hot[index as usize].type_local_index = local;
        Ok(handle)
    }

    /// Creates an invisible trigger zone (no cold data).
    ///
    /// # Errors
    ///
    /// `NoCapacity` when the entity pool is exhausted.
    pub fn create_trigger_zone(&mut self, position: Vec2, half: Vec2) -> Result<EntityHandle, CoreError> {
        self.create_simple(EntityKind::Trigger, position, half)
    }

    /// Creates a decorative prop (no cold data).
    ///
    /// # Errors
    ///
    /// `NoCapacity` when the entity pool is exhausted.
    pub fn create_prop(&mut self, position: Vec2, half: Vec2) -> Result<EntityHandle, CoreError> {
        self.create_simple(EntityKind::Prop, position, half)
    }

    /// Creates an area-effect zone (no cold data).
    ///
    /// # Errors
    ///
    /// `NoCapacity` when the entity pool is exhausted.
    pub fn create_area_effect(&mut self, position: Vec2, half: Vec2) -> Result<EntityHandle, CoreError> {
        self.create_simple(EntityKind::AreaEffect, position, half)
    }

    /// Creates a static obstacle (tile collision, no cold data).
    ///
    /// # Errors
    ///
    /// `NoCapacity` when the entity pool is exhausted.
    pub fn create_static_obstacle(&mut self, position: Vec2, half: Vec2) -> Result<EntityHandle, CoreError> {
        self.create_simple(EntityKind::StaticObstacle, position, half)
    }

    fn create_character(
        &mut self,
        kind: EntityKind,
        position: Vec2,
        half: Vec2,
        max_health: f32,
        behavior: u8,
        inventory_slots: usize,
        world_id: &str,
    ) -> Result<EntityHandle, CoreError> {
        let (index, handle) = self.allocate_slot(kind, position, half)?;
        let inventory_index = match self.inventories.allocate(handle, inventory_slots, world_id) {
            Ok(idx) => idx,
            Err(e) => {
                // Partial-failure path: hand the slot straight back.
                self.release_slot(index);
                return Err(e);
            }
        };
        let mut data = CharacterData::new(max_health);
        data.behavior = behavior;
        data.inventory_index = inventory_index;
        let local = self.cold.characters.push(data, index);
        self.hot[index as usize].type_local_index = local;
        Ok(handle)
    }

    fn create_simple(
        &mut self,
        kind: EntityKind,
        position: Vec2,
        half: Vec2,
    ) -> Result<EntityHandle, CoreError> {
        let (index, handle) = self.allocate_slot(kind, position, half)?;
        self.hot[index as usize].type_local_index = u32::MAX;
        Ok(handle)
    }

    fn allocate_slot(
        &mut self,
        kind: EntityKind,
        position: Vec2,
        half: Vec2,
    ) -> Result<(u32, EntityHandle), CoreError> {
        let index = if let Some(index) = self.free_list.pop() {
            index
        } else {
            if self.hot.len() >= self.capacity {
                warn!(capacity = self.capacity, "entity pool exhausted");
                return Err(CoreError::NoCapacity {
                    capacity: self.capacity,
                });
            }
            let index = u32::try_from(self.hot.len()).unwrap_or(u32::MAX);
            self.hot.push(HotData::dead());
            self.ids.push(0);
            index
        };

        let slot = &mut self.hot[index as usize];
        // Wrap 255 -> 1; generation 0 stays the invalid sentinel.
        let generation = if slot.generation == u8::MAX { 1 } else { slot.generation + 1 };

        let id = self.next_id;
        self.next_id += 1;

        *slot = HotData::dead();
        slot.transform.position = position;
        slot.transform.previous_position = position;
        slot.half_width = half.x;
        slot.half_height = half.y;
        slot.kind = kind;
        slot.tier = SimulationTier::Active;
        slot.generation = generation;
        slot.flags = FLAG_ALIVE | FLAG_DIRTY;
        if kind.has_physics() {
            slot.flags |= FLAG_COLLISION_ENABLED;
        }

        self.ids[index as usize] = id;
        self.id_to_index.insert(id, index);
        self.kind_dirty[kind.index()] = true;

        self.stats.created += 1;
        self.stats.live += 1;
        self.stats.high_water = self.stats.high_water.max(self.stats.live);

        Ok((index, EntityHandle::new(id, kind, generation)))
    }

    /// Returns a just-allocated slot without running destroy hooks. Only
    /// used to unwind a failed multi-step create.
    fn release_slot(&mut self, index: u32) {
        let slot = &mut self.hot[index as usize];
        slot.flags = 0;
        let id = self.ids[index as usize];
        self.id_to_index.remove(&id);
        self.free_list.push(index);
        self.stats.created -= 1;
        self.stats.live -= 1;
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    /// Requests destruction. No-op returning `false` for stale handles;
    /// the slot is actually recycled by [`Self::commit_pending_destroys`].
    pub fn destroy_entity(&mut self, handle: EntityHandle) -> bool {
        let Some(index) = self.get_index(handle) else {
            trace!(%handle, "destroy on stale handle ignored");
            return false;
        };
        self.hot[index as usize].mark_for_destruction();
        true
    }

    /// Recycles every slot marked for destruction.
    ///
    /// For each doomed entity, in order:
    /// 1. `on_destroy` runs with a [`DestroyRecord`] (collision removal,
    ///    world-registry unregistration happen here)
    /// 2. the inventory, if any, is freed back to the pool
    /// 3. the cold entry is swap-removed and the moved entity's back-link
    ///    patched
    /// 4. the slot joins the free list; its next use bumps the generation
    ///
    /// Returns the number of entities destroyed.
    pub fn commit_pending_destroys(&mut self, mut on_destroy: impl FnMut(&DestroyRecord)) -> usize {
        let doomed: Vec<u32> = self
            .hot
            .iter()
            .enumerate()
            .filter(|(_, h)| h.is_alive() && h.is_pending_destroy())
            .map(|(i, _)| i as u32)
            .collect();

        for &index in &doomed {
            let hot = self.hot[index as usize];
            let id = self.ids[index as usize];
            let handle = EntityHandle::new(id, hot.kind, hot.generation);
            let inventory_index = self.inventory_index_of(index);

            let record = DestroyRecord {
                handle,
                index,
                kind: hot.kind,
                position: hot.transform.position,
                inventory_index,
            };
            on_destroy(&record);

            if let Some(inventory) = inventory_index {
                self.inventories.free(inventory);
            }

            if ColdStore::has_cold_data(hot.kind) {
                if let Some(moved_owner) = self.cold.remove(hot.kind, hot.type_local_index) {
                    self.hot[moved_owner as usize].type_local_index = hot.type_local_index;
                }
            }

            let slot = &mut self.hot[index as usize];
            slot.flags = 0;
            self.id_to_index.remove(&id);
            self.free_list.push(index);
            self.kind_dirty[hot.kind.index()] = true;

            self.stats.destroyed += 1;
            self.stats.live -= 1;
        }

        if !doomed.is_empty() {
            debug!(count = doomed.len(), "committed pending destroys");
        }
        doomed.len()
    }

    fn inventory_index_of(&self, index: u32) -> Option<u32> {
        let hot = &self.hot[index as usize];
        let local = hot.type_local_index;
        let raw = match hot.kind {
            EntityKind::Player | EntityKind::Npc => {
                self.cold.characters.get(local).map(|c| c.inventory_index)
            }
            EntityKind::Container => self.cold.containers.get(local).map(|c| c.inventory_index),
            _ => None,
        }?;
        (raw != u32::MAX).then_some(raw)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Resolves a handle to its dense index; `None` when stale.
    #[must_use]
    pub fn get_index(&self, handle: EntityHandle) -> Option<u32> {
        if !handle.is_valid() {
            return None;
        }
        let index = *self.id_to_index.get(&handle.id)?;
        let hot = &self.hot[index as usize];
        (hot.is_alive() && hot.generation == handle.generation && hot.kind == handle.kind)
            .then_some(index)
    }

    /// Reconstructs the live handle occupying `index`; `None` for dead or
    /// out-of-range slots.
    #[must_use]
    pub fn handle_at(&self, index: u32) -> Option<EntityHandle> {
        let hot = self.hot.get(index as usize)?;
        if !hot.is_alive() {
            return None;
        }
        Some(EntityHandle::new(self.ids[index as usize], hot.kind, hot.generation))
    }

    /// Hot data by index; `None` for dead or out-of-range slots.
    #[must_use]
    pub fn hot(&self, index: u32) -> Option<&HotData> {
        self.hot.get(index as usize).filter(|h| h.is_alive())
    }

    /// Mutable hot data by index.
    pub fn hot_mut(&mut self, index: u32) -> Option<&mut HotData> {
        self.hot.get_mut(index as usize).filter(|h| h.is_alive())
    }

    /// Hot data by handle with generation check.
    #[must_use]
    pub fn hot_by_handle(&self, handle: EntityHandle) -> Option<&HotData> {
        self.get_index(handle).and_then(|i| self.hot(i))
    }

    /// Mutable hot data by handle.
    pub fn hot_by_handle_mut(&mut self, handle: EntityHandle) -> Option<&mut HotData> {
        let index = self.get_index(handle)?;
        self.hot_mut(index)
    }

    /// Position of a live slot.
    #[must_use]
    pub fn position(&self, index: u32) -> Option<Vec2> {
        self.hot(index).map(|h| h.transform.position)
    }

    /// Collision write-back: moves the entity, remembering the previous
    /// position for interpolation and marking the slot dirty.
    pub fn apply_position(&mut self, index: u32, position: Vec2) {
        if let Some(hot) = self.hot_mut(index) {
            hot.transform.previous_position = hot.transform.position;
            hot.transform.position = position;
            hot.set_dirty(true);
        }
    }

    /// AI write: sets the intended velocity, read by collision at the
    /// start of its integration.
    pub fn set_velocity(&mut self, index: u32, velocity: Vec2) {
        if let Some(hot) = self.hot_mut(index) {
            hot.transform.velocity = velocity;
        }
    }

    /// Tier pass write.
    pub fn set_tier(&mut self, index: u32, tier: SimulationTier) {
        if let Some(hot) = self.hot_mut(index) {
            hot.tier = tier;
        }
    }

    // =========================================================================
    // Cold data accessors
    // =========================================================================

    /// Character data by handle (players and NPCs).
    #[must_use]
    pub fn character(&self, handle: EntityHandle) -> Option<&CharacterData> {
        let index = self.get_index(handle)?;
        let hot = &self.hot[index as usize];
        matches!(hot.kind, EntityKind::Player | EntityKind::Npc)
            .then(|| self.cold.characters.get(hot.type_local_index))?
    }

    /// Mutable character data by handle.
    pub fn character_mut(&mut self, handle: EntityHandle) -> Option<&mut CharacterData> {
        let index = self.get_index(handle)?;
        let hot = self.hot[index as usize];
        matches!(hot.kind, EntityKind::Player | EntityKind::Npc)
            .then(|| self.cold.characters.get_mut(hot.type_local_index))?
    }

    /// Dropped-item data by handle.
    #[must_use]
    pub fn item(&self, handle: EntityHandle) -> Option<&ItemData> {
        let index = self.get_index(handle)?;
        let hot = &self.hot[index as usize];
        matches!(hot.kind, EntityKind::DroppedItem).then(|| self.cold.items.get(hot.type_local_index))?
    }

    /// Dropped-item data by dense index (spatial query results).
    #[must_use]
    pub fn item_at(&self, index: u32) -> Option<&ItemData> {
        let hot = self.hot(index)?;
        matches!(hot.kind, EntityKind::DroppedItem).then(|| self.cold.items.get(hot.type_local_index))?
    }

    /// Harvestable data by handle.
    #[must_use]
    pub fn harvestable(&self, handle: EntityHandle) -> Option<&HarvestableData> {
        let index = self.get_index(handle)?;
        self.harvestable_at(index)
    }

    /// Harvestable data by dense index.
    #[must_use]
    pub fn harvestable_at(&self, index: u32) -> Option<&HarvestableData> {
        let hot = self.hot(index)?;
        matches!(hot.kind, EntityKind::Harvestable)
            .then(|| self.cold.harvestables.get(hot.type_local_index))?
    }

    /// Mutable harvestable data by handle.
    pub fn harvestable_mut(&mut self, handle: EntityHandle) -> Option<&mut HarvestableData> {
        let index = self.get_index(handle)?;
        let hot = self.hot[index as usize];
        matches!(hot.kind, EntityKind::Harvestable)
            .then(|| self.cold.harvestables.get_mut(hot.type_local_index))?
    }

    /// Container data by handle.
    #[must_use]
    pub fn container(&self, handle: EntityHandle) -> Option<&ContainerData> {
        let index = self.get_index(handle)?;
        let hot = &self.hot[index as usize];
        matches!(hot.kind, EntityKind::Container)
            .then(|| self.cold.containers.get(hot.type_local_index))?
    }

    /// Projectile data by handle.
    #[must_use]
    pub fn projectile(&self, handle: EntityHandle) -> Option<&ProjectileData> {
        let index = self.get_index(handle)?;
        let hot = &self.hot[index as usize];
        matches!(hot.kind, EntityKind::Projectile)
            .then(|| self.cold.projectiles.get(hot.type_local_index))?
    }

    /// Mutable projectile data by handle.
    pub fn projectile_mut(&mut self, handle: EntityHandle) -> Option<&mut ProjectileData> {
        let index = self.get_index(handle)?;
        let hot = self.hot[index as usize];
        matches!(hot.kind, EntityKind::Projectile)
            .then(|| self.cold.projectiles.get_mut(hot.type_local_index))?
    }

    /// The cold store, for batch passes that walk a whole family.
    #[must_use]
    pub fn cold(&self) -> &ColdStore {
        &self.cold
    }

    // =========================================================================
    // Inventories
    // =========================================================================

    /// The inventory pool.
    #[must_use]
    pub fn inventories(&self) -> &InventoryPool {
        &self.inventories
    }

    /// Mutable inventory pool.
    pub fn inventories_mut(&mut self) -> &mut InventoryPool {
        &mut self.inventories
    }

    /// Adds to an inventory by pool index; `false` when it does not fit.
    pub fn add_to_inventory(
        &mut self,
        inventory_index: u32,
        resource: ResourceHandle,
        quantity: u32,
        templates: &TemplateRegistry,
    ) -> bool {
        self.inventories
            .add(inventory_index, resource, quantity, templates, "added")
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Indices of live, non-hibernated entities.
    pub fn active_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.hot
            .iter()
            .enumerate()
            .filter(|(_, h)| h.is_alive() && h.tier != SimulationTier::Hibernated)
            .map(|(i, _)| i as u32)
    }

    /// Visits every live, non-hibernated entity.
    pub fn for_each_active(&self, mut f: impl FnMut(u32, &HotData)) {
        for (i, hot) in self.hot.iter().enumerate() {
            if hot.is_alive() && hot.tier != SimulationTier::Hibernated {
                f(i as u32, hot);
            }
        }
    }

    /// Live indices of one kind, from the maintained bucket.
    ///
    /// The bucket is rebuilt here when creation or destruction has
    /// invalidated it since the last read.
    pub fn indices_by_kind(&mut self, kind: EntityKind) -> &[u32] {
        let k = kind.index();
        if self.kind_dirty[k] {
            let bucket = &mut self.kind_buckets[k];
            bucket.clear();
            for (i, hot) in self.hot.iter().enumerate() {
                if hot.is_alive() && hot.kind == kind {
                    bucket.push(i as u32);
                }
            }
            self.kind_dirty[k] = false;
        }
        &self.kind_buckets[k]
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Store counters.
    #[must_use]
    pub fn stats(&self) -> EntityStats {
        self.stats
    }

    /// Currently live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.stats.live
    }

    /// Hard entity cap.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocated slot count (live plus free-listed).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.hot.len()
    }

    /// Checks the hot/cold cross-links for every live entity.
    ///
    /// Returns `false` (after logging) when a back-link disagrees; used by
    /// tests and debug asserts, not by the hot path.
    #[must_use]
    pub fn validate_integrity(&self) -> bool {
        let mut ok = true;
        for (i, hot) in self.hot.iter().enumerate() {
            if !hot.is_alive() || !ColdStore::has_cold_data(hot.kind) {
                continue;
            }
            let local = hot.type_local_index;
            let owner = match hot.kind {
                EntityKind::Player | EntityKind::Npc => self.cold.characters.owner_of(local),
                EntityKind::DroppedItem => self.cold.items.owner_of(local),
                EntityKind::Harvestable => self.cold.harvestables.owner_of(local),
                EntityKind::Container => self.cold.containers.owner_of(local),
                EntityKind::Projectile => self.cold.projectiles.owner_of(local),
                _ => None,
            };
            if owner != Some(i as u32) {
                tracing::error!(index = i, kind = hot.kind.as_str(), "cold back-link mismatch");
                ok = false;
            }
        }
        debug_assert!(ok, "cold back-link mismatch");
        ok
    }
}
