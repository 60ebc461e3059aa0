//! # Tick Pipeline
//!
//! The one legal phase order, enforced here and nowhere else:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ 1. TIER PASS     distance from reference point -> hot.tier       │
//! │ 2. AI            (caller) reads store, queries collision,        │
//! │                  submits path requests, writes velocities        │
//! │ 3. PATHFINDING   scheduler batch: cache, A*, callbacks           │
//! │ 4. STEERING      (caller) crowd separation blends velocities     │
//! │ 5. COLLISION     detect + resolve + write positions back         │
//! │ 6. EVENTS        deferred events drained and routed              │
//! │ 7. DESTROYS      commit: collision removal, registry cleanup,    │
//! │                  slot recycling                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Shutdown runs in reverse dependency order: scheduler drains, registry
//! clears, collision bodies drop, the store commits, the pool joins.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use emberwake_ai::{separation_velocity, SeparationParams};
use emberwake_collision::{BodyKind, CollisionEngine, TriggerTag};
use emberwake_core::{DestroyRecord, EntityDataStore};
use emberwake_pathfind::{
    PathCallback, PathPriority, PathfindingGrid, PathfindingScheduler, ThreadPool, WorkerPool,
};
use emberwake_shared::{
    Aabb, EntityHandle, EntityKind, EventBus, EventReceiver, EventSender, ResourceHandle, SimEvent,
    SimulationTier, Vec2,
};
use emberwake_world::WorldResourceRegistry;

use crate::config::SimulationConfig;
use crate::controllers::ControllerRegistry;

/// The assembled simulation core.
///
/// Fields are public on purpose: the units are designed to be used
/// directly, and the facade only owns wiring and phase order.
pub struct Simulation {
    /// Entity data authority
    pub store: EntityDataStore,
    /// Collision engine
    pub collision: CollisionEngine,
    /// Path request scheduler
    pub scheduler: PathfindingScheduler,
    /// Shared pathfinding grid
    pub grid: Arc<PathfindingGrid>,
    /// World resource registry
    pub registry: WorldResourceRegistry,
    /// State-scoped controllers
    pub controllers: ControllerRegistry,

    events_rx: EventReceiver,
    events_tx: EventSender,
    pool: Option<Arc<dyn WorkerPool>>,
    frame: u64,
    rng: ChaCha8Rng,
    reference_point: Vec2,
    event_scratch: Vec<SimEvent>,
    config: SimulationConfig,
}

impl Simulation {
    /// Builds the core from a config.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        let (events_tx, events_rx) = EventBus::channel(config.event_capacity);
        let mut store = EntityDataStore::new(config.entity_capacity, config.inventory_capacity);
        store.inventories_mut().set_event_sender(events_tx.clone());

        let collision = CollisionEngine::with_cell_size(events_tx.clone(), config.collision_cell_size);
        let grid = Arc::new(PathfindingGrid::new(
            config.grid_width,
            config.grid_height,
            config.grid_cell_size,
            Vec2::ZERO,
        ));
        let mut scheduler = PathfindingScheduler::new(
            config.path_queue_cap,
            config.path_batch_size,
            config.path_async_threshold,
        );

        let rng = match config.replay_seed {
            Some(seed) => {
                scheduler.set_replay_rng(ChaCha8Rng::seed_from_u64(seed ^ 0x9E37_79B9));
                ChaCha8Rng::seed_from_u64(seed)
            }
            None => {
                let seed = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map_or(0x5EED_CAFE, |d| d.as_nanos() as u64);
                ChaCha8Rng::seed_from_u64(seed)
            }
        };

        let pool: Option<Arc<dyn WorkerPool>> = config.use_worker_pool.then(|| {
            Arc::new(ThreadPool::new(config.worker_threads, config.worker_queue_capacity))
                as Arc<dyn WorkerPool>
        });

        Self {
            store,
            collision,
            scheduler,
            grid,
            registry: WorldResourceRegistry::new(),
            controllers: ControllerRegistry::new(),
            events_rx,
            events_tx,
            pool,
            frame: 0,
            rng,
            reference_point: Vec2::ZERO,
            event_scratch: Vec::new(),
            config,
        }
    }

    /// The event sender, for systems outside the core (world loader).
    #[must_use]
    pub fn event_sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    /// Current frame number (tier/cache scoping).
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Moves the tier/priority reference point (usually the player).
    pub fn set_reference_point(&mut self, point: Vec2) {
        self.reference_point = point;
    }

    // =========================================================================
    // Spawning (store + collision + registry wiring)
    // =========================================================================

    /// Spawns an NPC with a dynamic body.
    ///
    /// # Errors
    ///
    /// Propagates store capacity errors.
    pub fn spawn_npc(
        &mut self,
        position: Vec2,
        half: Vec2,
        max_health: f32,
        behavior: u8,
        inventory_slots: usize,
        world: &str,
    ) -> Result<EntityHandle, emberwake_core::CoreError> {
        let handle = self
            .store
            .create_npc(position, half, max_health, behavior, inventory_slots, world)?;
        self.collision
            .add_body(handle, Aabb::from_center(position, half), BodyKind::Dynamic);
        if let Some(character) = self.store.character(handle) {
            self.registry.register_inventory(character.inventory_index, world);
        }
        Ok(handle)
    }

    /// Spawns a dropped item and registers it for pickup queries.
    ///
    /// # Errors
    ///
    /// Propagates store capacity errors.
    pub fn spawn_dropped_item(
        &mut self,
        position: Vec2,
        half: Vec2,
        resource: ResourceHandle,
        quantity: u32,
        world: &str,
    ) -> Result<EntityHandle, emberwake_core::CoreError> {
        let handle = self
            .store
            .create_dropped_item(position, half, resource, quantity, world)?;
        if let Some(index) = self.store.get_index(handle) {
            self.registry.register_dropped_item(index, position, world);
        }
        Ok(handle)
    }

    /// Spawns a harvestable node and registers it spatially and for
    /// aggregate queries.
    ///
    /// # Errors
    ///
    /// Propagates store capacity errors.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn_harvestable(
        &mut self,
        position: Vec2,
        half: Vec2,
        yield_resource: ResourceHandle,
        yield_min: u32,
        yield_max: u32,
        respawn_time: f32,
        world: &str,
    ) -> Result<EntityHandle, emberwake_core::CoreError> {
        let handle =
            self.store
                .create_harvestable(position, half, yield_resource, yield_min, yield_max, respawn_time)?;
        if let Some(index) = self.store.get_index(handle) {
            self.registry.register_harvestable(index, world);
            self.registry.register_harvestable_spatial(index, position, world);
        }
        Ok(handle)
    }

    /// Spawns a static obstacle with its collision body (and the obstacle
    /// event that entails).
    ///
    /// # Errors
    ///
    /// Propagates store capacity errors.
    pub fn spawn_static_obstacle(
        &mut self,
        position: Vec2,
        half: Vec2,
    ) -> Result<EntityHandle, emberwake_core::CoreError> {
        let handle = self.store.create_static_obstacle(position, half)?;
        self.collision
            .add_body(handle, Aabb::from_center(position, half), BodyKind::Static);
        Ok(handle)
    }

    /// Spawns a tagged trigger volume.
    ///
    /// # Errors
    ///
    /// Propagates store capacity errors.
    pub fn spawn_trigger_area(
        &mut self,
        position: Vec2,
        half: Vec2,
        tag: TriggerTag,
    ) -> Result<EntityHandle, emberwake_core::CoreError> {
        let handle = self.store.create_trigger_zone(position, half)?;
        self.collision
            .create_trigger_area(handle, Aabb::from_center(position, half), tag);
        Ok(handle)
    }

    /// Requests deferred destruction; indices and bodies are cleaned up at
    /// the end of the tick.
    pub fn destroy(&mut self, handle: EntityHandle) -> bool {
        self.store.destroy_entity(handle)
    }

    // =========================================================================
    // Per-entity helpers for the AI phase
    // =========================================================================

    /// Submits a path request for an entity.
    pub fn request_path(
        &mut self,
        entity: EntityHandle,
        goal: Vec2,
        priority: PathPriority,
        callback: PathCallback,
    ) {
        let Some(index) = self.store.get_index(entity) else {
            callback(entity.id, &[]);
            return;
        };
        let Some(start) = self.store.position(index) else {
            callback(entity.id, &[]);
            return;
        };
        self.scheduler.request_path(entity.id, start, goal, priority, callback);
    }

    /// Crowd-separation steering for an entity: blends `intended` with
    /// repulsion from this frame's neighborhood and writes the result as
    /// the entity's velocity.
    pub fn steer(&mut self, entity: EntityHandle, intended: Vec2, params: &SeparationParams) -> Vec2 {
        let Some(index) = self.store.get_index(entity) else {
            return intended;
        };
        let Some(position) = self.store.position(index) else {
            return intended;
        };
        let velocity = separation_velocity(
            &self.collision,
            entity.id,
            self.frame,
            position,
            intended,
            params,
            &mut self.rng,
        );
        self.store.set_velocity(index, velocity);
        velocity
    }

    // =========================================================================
    // The tick
    // =========================================================================

    /// Runs one fixed-step tick. The AI phase (path requests, velocity
    /// writes, [`Self::steer`]) belongs between ticks, before this call.
    pub fn tick(&mut self, dt: f32) {
        self.frame += 1;

        self.assign_tiers();

        // Pathfinding batch. Congestion eviction reads the collision
        // neighborhood through this closure.
        let collision = &self.collision;
        let congestion = |center: Vec2, radius: f32| {
            let mut ids = Vec::new();
            collision.query_area(&Aabb::from_center(center, Vec2::new(radius, radius)), &mut ids);
            ids.iter()
                .filter(|&&id| {
                    (collision.is_dynamic(id) || collision.is_kinematic(id)) && !collision.is_trigger(id)
                })
                .count()
        };
        self.scheduler
            .update(dt, self.reference_point, &self.grid, congestion, self.pool.as_ref());

        // Collision: detect, resolve, write back, queue events.
        self.collision.update(dt, &mut self.store);

        // Deferred event routing after resolution.
        self.route_events();

        // Destruction commit: external indices first, then the slots.
        let registry = &self.registry;
        let collision = &mut self.collision;
        self.store.commit_pending_destroys(|record: &DestroyRecord| {
            collision.remove_body(record.handle.id);
            match record.kind {
                EntityKind::DroppedItem => registry.unregister_dropped_item(record.index),
                EntityKind::Harvestable => registry.unregister_harvestable(record.index),
                _ => {}
            }
            if let Some(inventory) = record.inventory_index {
                registry.unregister_inventory(inventory);
            }
        });

        // Controllers run after the world has settled.
        self.controllers.update_all(dt);
    }

    /// Distance-based tier assignment around the reference point.
    fn assign_tiers(&mut self) {
        let active_sq = self.config.active_radius * self.config.active_radius;
        let background_sq = self.config.background_radius * self.config.background_radius;
        let reference = self.reference_point;

        let indices: Vec<u32> = (0..self.store.slot_count() as u32)
            .filter(|&i| self.store.hot(i).is_some())
            .collect();
        for index in indices {
            let Some(position) = self.store.position(index) else {
                continue;
            };
            let distance_sq = position.distance_squared(reference);
            let tier = if distance_sq <= active_sq {
                SimulationTier::Active
            } else if distance_sq <= background_sq {
                SimulationTier::Background
            } else {
                SimulationTier::Hibernated
            };
            self.store.set_tier(index, tier);
        }
    }

    /// Drains the bus, routes events to the units that consume them, and
    /// keeps them available for [`Self::take_events`].
    fn route_events(&mut self) {
        let start = self.event_scratch.len();
        self.events_rx.drain(&mut self.event_scratch);
        for event in &self.event_scratch[start..] {
            self.scheduler.handle_event(event);
            self.registry.handle_event(event);
        }
    }

    /// Hands this tick's events to the caller (render, UI, audio).
    pub fn take_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.event_scratch)
    }

    /// Tears the core down in reverse dependency order.
    pub fn shutdown(&mut self) {
        debug!("simulation shutting down");
        self.scheduler.shutdown();
        self.registry.prepare_for_state_transition();
        self.controllers.clear();
        self.store.commit_pending_destroys(|_| {});
        // Dropping the pool Arc joins the workers (sole owner here).
        self.pool = None;
    }
}
