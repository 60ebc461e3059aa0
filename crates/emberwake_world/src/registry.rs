//! # World Resource Registry
//!
//! Registry-over-store: tracks which inventories and harvestables belong
//! to which world and where dropped items sit, then answers aggregate and
//! proximity queries by reading the entity store.
//!
//! ## Locking
//!
//! One reader-writer lock guards the registries; queries take it shared,
//! registration and world changes take it exclusive. The registry lock is
//! acquired BEFORE any entity-store or inventory access. Query methods
//! that read the store take it as a parameter, so the caller already
//! holds store access when the registry lock is taken - the documented
//! order.
//!
//! The active world additionally keeps lock-free item/harvestable
//! counters so the common "is there anything near me at all?" check never
//! touches the lock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use emberwake_core::{EntityDataStore, InventoryPool};
use emberwake_shared::{ResourceHandle, SimEvent, Vec2};
use parking_lot::RwLock;
use tracing::{debug, trace};

/// Registry activity counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorldResourceStats {
    /// Worlds currently tracked
    pub worlds_tracked: u64,
    /// Inventories registered across all worlds
    pub inventories_registered: u64,
    /// Harvestables registered across all worlds
    pub harvestables_registered: u64,
    /// Queries served since startup
    pub query_count: u64,
}

#[derive(Default)]
struct Registries {
    inventory_by_world: HashMap<String, HashSet<u32>>,
    inventory_to_world: HashMap<u32, String>,
    harvestable_by_world: HashMap<String, HashSet<u32>>,
    harvestable_to_world: HashMap<u32, String>,
    item_spatial: HashMap<String, crate::spatial::SpatialIndex>,
    harvestable_spatial: HashMap<String, crate::spatial::SpatialIndex>,
    active_world: String,
}

/// Per-world spatial and aggregate resource index.
pub struct WorldResourceRegistry {
    registries: RwLock<Registries>,
    // Fast-path counters for the active world; zero means a spatial query
    // can return immediately without locking.
    active_item_count: AtomicUsize,
    active_harvestable_count: AtomicUsize,
    query_count: AtomicU64,
}

impl Default for WorldResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldResourceRegistry {
    /// Creates an empty registry with no active world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registries: RwLock::new(Registries::default()),
            active_item_count: AtomicUsize::new(0),
            active_harvestable_count: AtomicUsize::new(0),
            query_count: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // World management
    // =========================================================================

    /// Starts tracking a world. Returns `false` when it already exists.
    pub fn create_world(&self, world: &str) -> bool {
        let mut registries = self.registries.write();
        if registries.inventory_by_world.contains_key(world) {
            return false;
        }
        registries.inventory_by_world.insert(world.to_owned(), HashSet::new());
        registries.harvestable_by_world.insert(world.to_owned(), HashSet::new());
        registries.item_spatial.insert(world.to_owned(), crate::spatial::SpatialIndex::default());
        registries
            .harvestable_spatial
            .insert(world.to_owned(), crate::spatial::SpatialIndex::default());
        debug!(world, "world tracking created");
        true
    }

    /// Stops tracking a world and drops its registrations. Entity cleanup
    /// is the store's business and must happen first.
    pub fn remove_world(&self, world: &str) -> bool {
        let mut registries = self.registries.write();
        let existed = registries.inventory_by_world.remove(world).is_some();
        registries.harvestable_by_world.remove(world);
        registries.item_spatial.remove(world);
        registries.harvestable_spatial.remove(world);
        registries.inventory_to_world.retain(|_, w| w != world);
        registries.harvestable_to_world.retain(|_, w| w != world);
        if registries.active_world == world {
            registries.active_world.clear();
            self.active_item_count.store(0, Ordering::Relaxed);
            self.active_harvestable_count.store(0, Ordering::Relaxed);
        }
        existed
    }

    /// True when the world is tracked.
    #[must_use]
    pub fn has_world(&self, world: &str) -> bool {
        self.registries.read().inventory_by_world.contains_key(world)
    }

    /// All tracked world ids.
    #[must_use]
    pub fn world_ids(&self) -> Vec<String> {
        self.registries.read().inventory_by_world.keys().cloned().collect()
    }

    /// Selects the world spatial queries default to.
    pub fn set_active_world(&self, world: &str) {
        let mut registries = self.registries.write();
        registries.active_world = world.to_owned();
        let items = registries.item_spatial.get(world).map_or(0, crate::spatial::SpatialIndex::len);
        let harvestables = registries
            .harvestable_spatial
            .get(world)
            .map_or(0, crate::spatial::SpatialIndex::len);
        self.active_item_count.store(items, Ordering::Relaxed);
        self.active_harvestable_count.store(harvestables, Ordering::Relaxed);
        debug!(world, items, harvestables, "active world changed");
    }

    /// The currently active world id.
    #[must_use]
    pub fn active_world(&self) -> String {
        self.registries.read().active_world.clone()
    }

    /// Drops all spatial data for a world (items and harvestables).
    pub fn clear_spatial_data_for_world(&self, world: &str) {
        let mut registries = self.registries.write();
        if let Some(index) = registries.item_spatial.get_mut(world) {
            index.clear();
        }
        if let Some(index) = registries.harvestable_spatial.get_mut(world) {
            index.clear();
        }
        if registries.active_world == world {
            self.active_item_count.store(0, Ordering::Relaxed);
            self.active_harvestable_count.store(0, Ordering::Relaxed);
        }
    }

    /// Zeroes the fast-path counters so in-flight spatial queries early
    /// out during a state transition.
    pub fn prepare_for_state_transition(&self) {
        self.active_item_count.store(0, Ordering::Relaxed);
        self.active_harvestable_count.store(0, Ordering::Relaxed);
    }

    /// Routes world lifecycle events into registry state.
    pub fn handle_event(&self, event: &SimEvent) {
        match event {
            SimEvent::WorldLoaded { world } => {
                self.create_world(world);
                self.set_active_world(world);
            }
            SimEvent::WorldUnloaded { world } => {
                self.clear_spatial_data_for_world(world);
            }
            _ => {}
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers an inventory with a world; its contents join the world's
    /// aggregate totals.
    pub fn register_inventory(&self, inventory_index: u32, world: &str) {
        let mut registries = self.registries.write();
        if let Some(previous) = registries.inventory_to_world.remove(&inventory_index) {
            if let Some(set) = registries.inventory_by_world.get_mut(&previous) {
                set.remove(&inventory_index);
            }
        }
        registries
            .inventory_by_world
            .entry(world.to_owned())
            .or_default()
            .insert(inventory_index);
        registries.inventory_to_world.insert(inventory_index, world.to_owned());
    }

    /// Unregisters an inventory from whatever world holds it.
    pub fn unregister_inventory(&self, inventory_index: u32) {
        let mut registries = self.registries.write();
        if let Some(world) = registries.inventory_to_world.remove(&inventory_index) {
            if let Some(set) = registries.inventory_by_world.get_mut(&world) {
                set.remove(&inventory_index);
            }
        }
    }

    /// Registers a harvestable entity (by store index) with a world.
    pub fn register_harvestable(&self, index: u32, world: &str) {
        let mut registries = self.registries.write();
        if let Some(previous) = registries.harvestable_to_world.remove(&index) {
            if let Some(set) = registries.harvestable_by_world.get_mut(&previous) {
                set.remove(&index);
            }
        }
        registries
            .harvestable_by_world
            .entry(world.to_owned())
            .or_default()
            .insert(index);
        registries.harvestable_to_world.insert(index, world.to_owned());
    }

    /// Unregisters a harvestable from whatever world holds it, including
    /// its spatial entry.
    pub fn unregister_harvestable(&self, index: u32) {
        let mut registries = self.registries.write();
        if let Some(world) = registries.harvestable_to_world.remove(&index) {
            if let Some(set) = registries.harvestable_by_world.get_mut(&world) {
                set.remove(&index);
            }
            let is_active = registries.active_world == world;
            if let Some(spatial) = registries.harvestable_spatial.get_mut(&world) {
                if spatial.remove(index) && is_active {
                    self.active_harvestable_count.fetch_sub(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Adds a harvestable to its world's spatial index.
    pub fn register_harvestable_spatial(&self, index: u32, position: Vec2, world: &str) {
        let mut registries = self.registries.write();
        let is_active = registries.active_world == world;
        registries
            .harvestable_spatial
            .entry(world.to_owned())
            .or_default()
            .insert(index, position);
        if is_active {
            self.active_harvestable_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Registers a dropped item for spatial tracking.
    pub fn register_dropped_item(&self, index: u32, position: Vec2, world: &str) {
        let mut registries = self.registries.write();
        let is_active = registries.active_world == world;
        registries
            .item_spatial
            .entry(world.to_owned())
            .or_default()
            .insert(index, position);
        if is_active {
            self.active_item_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Unregisters a dropped item from spatial tracking.
    pub fn unregister_dropped_item(&self, index: u32) {
        let mut registries = self.registries.write();
        let active_world = registries.active_world.clone();
        for (world, spatial) in &mut registries.item_spatial {
            if spatial.remove(index) {
                if *world == active_world {
                    self.active_item_count.fetch_sub(1, Ordering::Relaxed);
                }
                return;
            }
        }
    }

    // =========================================================================
    // Spatial queries (active world)
    // =========================================================================

    /// Dropped-item store indices near a position in the active world.
    ///
    /// Returns candidates at cell precision; filter against store
    /// positions for exactness. Returns the number appended.
    pub fn query_dropped_items_in_radius(&self, center: Vec2, radius: f32, out: &mut Vec<u32>) -> usize {
        if self.active_item_count.load(Ordering::Relaxed) == 0 {
            return 0;
        }
        self.query_count.fetch_add(1, Ordering::Relaxed);
        let registries = self.registries.read();
        let Some(spatial) = registries.item_spatial.get(&registries.active_world) else {
            return 0;
        };
        let before = out.len();
        spatial.query_radius(center, radius, out);
        out.len() - before
    }

    /// Harvestable store indices near a position in the active world.
    pub fn query_harvestables_in_radius(&self, center: Vec2, radius: f32, out: &mut Vec<u32>) -> usize {
        if self.active_harvestable_count.load(Ordering::Relaxed) == 0 {
            return 0;
        }
        self.query_count.fetch_add(1, Ordering::Relaxed);
        let registries = self.registries.read();
        let Some(spatial) = registries.harvestable_spatial.get(&registries.active_world) else {
            return 0;
        };
        let before = out.len();
        spatial.query_radius(center, radius, out);
        out.len() - before
    }

    /// The closest live dropped item within `radius`, by exact distance
    /// against store positions.
    #[must_use]
    pub fn find_closest_dropped_item(
        &self,
        center: Vec2,
        radius: f32,
        store: &EntityDataStore,
    ) -> Option<u32> {
        let mut candidates = Vec::new();
        self.query_dropped_items_in_radius(center, radius, &mut candidates);

        let radius_sq = radius * radius;
        let mut best: Option<(u32, f32)> = None;
        for index in candidates {
            let Some(position) = store.position(index) else {
                trace!(index, "spatial index entry without live entity");
                continue;
            };
            let distance_sq = position.distance_squared(center);
            if distance_sq > radius_sq {
                continue;
            }
            if best.map_or(true, |(_, d)| distance_sq < d) {
                best = Some((index, distance_sq));
            }
        }
        best.map(|(index, _)| index)
    }

    // =========================================================================
    // Aggregate queries
    // =========================================================================

    /// Sum of a resource across every inventory registered to a world.
    #[must_use]
    pub fn query_inventory_total(
        &self,
        world: &str,
        resource: ResourceHandle,
        inventories: &InventoryPool,
    ) -> i64 {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        let registries = self.registries.read();
        let Some(set) = registries.inventory_by_world.get(world) else {
            return 0;
        };
        set.iter()
            .filter_map(|&index| inventories.get(index))
            .map(|inventory| i64::from(inventory.quantity(resource)))
            .sum()
    }

    /// Sum of potential yield (`yield_max`) over a world's non-depleted
    /// harvestables of a resource.
    #[must_use]
    pub fn query_harvestable_total(
        &self,
        world: &str,
        resource: ResourceHandle,
        store: &EntityDataStore,
    ) -> i64 {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        let registries = self.registries.read();
        let Some(set) = registries.harvestable_by_world.get(world) else {
            return 0;
        };
        set.iter()
            .filter_map(|&index| store.harvestable_at(index))
            .filter(|h| !h.is_depleted && h.yield_resource == resource)
            .map(|h| i64::from(h.yield_max))
            .sum()
    }

    /// Combined inventory + harvestable total for a world.
    #[must_use]
    pub fn query_world_total(
        &self,
        world: &str,
        resource: ResourceHandle,
        store: &EntityDataStore,
        inventories: &InventoryPool,
    ) -> i64 {
        self.query_inventory_total(world, resource, inventories)
            + self.query_harvestable_total(world, resource, store)
    }

    /// True when the world holds at least `minimum` of the resource.
    #[must_use]
    pub fn has_resource(
        &self,
        world: &str,
        resource: ResourceHandle,
        minimum: i64,
        store: &EntityDataStore,
        inventories: &InventoryPool,
    ) -> bool {
        self.query_world_total(world, resource, store, inventories) >= minimum
    }

    /// Every inventory-held resource total for a world.
    #[must_use]
    pub fn world_resources(
        &self,
        world: &str,
        inventories: &InventoryPool,
    ) -> HashMap<ResourceHandle, i64> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        let registries = self.registries.read();
        let mut totals: HashMap<ResourceHandle, i64> = HashMap::new();
        if let Some(set) = registries.inventory_by_world.get(world) {
            for &index in set {
                let Some(inventory) = inventories.get(index) else {
                    continue;
                };
                for (&resource, &quantity) in inventory.all_resources() {
                    *totals.entry(resource).or_insert(0) += i64::from(quantity);
                }
            }
        }
        totals
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Inventories registered to a world.
    #[must_use]
    pub fn inventory_count(&self, world: &str) -> usize {
        self.registries.read().inventory_by_world.get(world).map_or(0, HashSet::len)
    }

    /// Harvestables registered to a world.
    #[must_use]
    pub fn harvestable_count(&self, world: &str) -> usize {
        self.registries.read().harvestable_by_world.get(world).map_or(0, HashSet::len)
    }

    /// Dropped items spatially tracked in the active world (lock-free).
    #[must_use]
    pub fn active_item_count(&self) -> usize {
        self.active_item_count.load(Ordering::Relaxed)
    }

    /// Harvestables spatially tracked in the active world (lock-free).
    #[must_use]
    pub fn active_harvestable_count(&self) -> usize {
        self.active_harvestable_count.load(Ordering::Relaxed)
    }

    /// Counters snapshot.
    #[must_use]
    pub fn stats(&self) -> WorldResourceStats {
        let registries = self.registries.read();
        WorldResourceStats {
            worlds_tracked: registries.inventory_by_world.len() as u64,
            inventories_registered: registries.inventory_to_world.len() as u64,
            harvestables_registered: registries.harvestable_to_world.len() as u64,
            query_count: self.query_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberwake_shared::{ResourceCategory, ResourceTemplate, TemplateRegistry};

    fn templates() -> (TemplateRegistry, ResourceHandle) {
        let mut registry = TemplateRegistry::new(8);
        let mut t = ResourceTemplate::new("ore", "Ore", ResourceCategory::Material);
        t.set_max_stack_size(50);
        let handle = registry.register(t).unwrap();
        (registry, handle)
    }

    #[test]
    fn test_world_lifecycle() {
        let registry = WorldResourceRegistry::new();
        assert!(registry.create_world("overworld"));
        assert!(!registry.create_world("overworld"));
        assert!(registry.has_world("overworld"));
        assert!(registry.remove_world("overworld"));
        assert!(!registry.has_world("overworld"));
    }

    #[test]
    fn test_world_loaded_event_sets_active() {
        let registry = WorldResourceRegistry::new();
        registry.handle_event(&SimEvent::WorldLoaded { world: "cavern".into() });
        assert_eq!(registry.active_world(), "cavern");
        assert!(registry.has_world("cavern"));
    }

    #[test]
    fn test_dropped_item_fast_path_counter() {
        let registry = WorldResourceRegistry::new();
        registry.create_world("w");
        registry.set_active_world("w");

        registry.register_dropped_item(5, Vec2::new(10.0, 10.0), "w");
        registry.register_dropped_item(6, Vec2::new(20.0, 10.0), "w");
        assert_eq!(registry.active_item_count(), 2);

        // Items in an inactive world never touch the fast-path counter.
        registry.register_dropped_item(7, Vec2::new(10.0, 10.0), "other");
        assert_eq!(registry.active_item_count(), 2);

        registry.unregister_dropped_item(5);
        assert_eq!(registry.active_item_count(), 1);

        let mut out = Vec::new();
        assert_eq!(registry.query_dropped_items_in_radius(Vec2::new(15.0, 10.0), 48.0, &mut out), 1);
        assert_eq!(out, vec![6]);
    }

    #[test]
    fn test_empty_active_world_early_out() {
        let registry = WorldResourceRegistry::new();
        registry.create_world("w");
        registry.set_active_world("w");
        let queries_before = registry.stats().query_count;

        let mut out = Vec::new();
        assert_eq!(registry.query_dropped_items_in_radius(Vec2::ZERO, 100.0, &mut out), 0);
        // The early-out path does not even count as a query.
        assert_eq!(registry.stats().query_count, queries_before);
    }

    #[test]
    fn test_find_closest_dropped_item_uses_store_positions() {
        let registry = WorldResourceRegistry::new();
        registry.create_world("w");
        registry.set_active_world("w");

        let mut store = EntityDataStore::new(64, 16);
        let (_, ore) = templates();
        let near = store
            .create_dropped_item(Vec2::new(30.0, 0.0), Vec2::new(8.0, 8.0), ore, 1, "w")
            .unwrap();
        let far = store
            .create_dropped_item(Vec2::new(60.0, 0.0), Vec2::new(8.0, 8.0), ore, 1, "w")
            .unwrap();
        let near_index = store.get_index(near).unwrap();
        let far_index = store.get_index(far).unwrap();
        registry.register_dropped_item(near_index, Vec2::new(30.0, 0.0), "w");
        registry.register_dropped_item(far_index, Vec2::new(60.0, 0.0), "w");

        assert_eq!(
            registry.find_closest_dropped_item(Vec2::ZERO, 100.0, &store),
            Some(near_index)
        );
        // Radius excludes both.
        assert_eq!(registry.find_closest_dropped_item(Vec2::ZERO, 10.0, &store), None);
    }

    #[test]
    fn test_inventory_totals() {
        let registry = WorldResourceRegistry::new();
        registry.create_world("w");

        let mut store = EntityDataStore::new(64, 16);
        let (template_registry, ore) = templates();
        let npc = store.create_npc(Vec2::ZERO, Vec2::new(8.0, 8.0), 10.0, 0, 4, "w").unwrap();
        let inventory = store.character(npc).unwrap().inventory_index;
        assert!(store.add_to_inventory(inventory, ore, 30, &template_registry));

        registry.register_inventory(inventory, "w");
        assert_eq!(registry.query_inventory_total("w", ore, store.inventories()), 30);
        assert_eq!(registry.inventory_count("w"), 1);

        registry.unregister_inventory(inventory);
        assert_eq!(registry.query_inventory_total("w", ore, store.inventories()), 0);
    }

    #[test]
    fn test_harvestable_totals_skip_depleted() {
        let registry = WorldResourceRegistry::new();
        registry.create_world("w");

        let mut store = EntityDataStore::new(64, 16);
        let (_, ore) = templates();
        let a = store
            .create_harvestable(Vec2::ZERO, Vec2::new(8.0, 8.0), ore, 1, 5, 30.0)
            .unwrap();
        let b = store
            .create_harvestable(Vec2::new(50.0, 0.0), Vec2::new(8.0, 8.0), ore, 1, 7, 30.0)
            .unwrap();
        registry.register_harvestable(store.get_index(a).unwrap(), "w");
        registry.register_harvestable(store.get_index(b).unwrap(), "w");

        assert_eq!(registry.query_harvestable_total("w", ore, &store), 12);

        store.harvestable_mut(b).unwrap().is_depleted = true;
        assert_eq!(registry.query_harvestable_total("w", ore, &store), 5);
    }

    #[test]
    fn test_world_unloaded_clears_spatial() {
        let registry = WorldResourceRegistry::new();
        registry.handle_event(&SimEvent::WorldLoaded { world: "w".into() });
        registry.register_dropped_item(1, Vec2::ZERO, "w");
        registry.register_harvestable_spatial(2, Vec2::ZERO, "w");
        assert_eq!(registry.active_item_count(), 1);
        assert_eq!(registry.active_harvestable_count(), 1);

        registry.handle_event(&SimEvent::WorldUnloaded { world: "w".into() });
        assert_eq!(registry.active_item_count(), 0);
        assert_eq!(registry.active_harvestable_count(), 0);
    }
}
