//! # Collision Engine
//!
//! Owns every collision body, the dual spatial hashes and the trigger
//! state machine. Runs detection and resolution once per tick and writes
//! resolved centers back to the entity store - the only source of
//! positional truth inside a tick.
//!
//! Event emission is deferred: everything produced during detection is
//! queued and published after resolution completes, so listeners can never
//! invalidate the pass that produced them.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use emberwake_core::EntityDataStore;
use emberwake_shared::{
    constants::{COLLISION_CELL_SIZE, MOVEMENT_THRESHOLD, OBSTACLE_SAFETY_MARGIN},
    Aabb, EntityHandle, EntityId, EventSender, ObstacleChange, SimEvent, TriggerPhase, Vec2,
};
use tracing::{debug, trace};

use crate::body::{layers, BodyKind, CollisionBody, TriggerTag};
use crate::spatial_hash::SpatialHash;

/// Moving-body / pair count at which detection fans out over scoped
/// threads. Below this the spawn overhead costs more than the scan.
const PARALLEL_BODY_THRESHOLD: usize = 2048;

/// Per-tick performance counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct PerfStats {
    /// Broadphase time, microseconds
    pub broadphase_us: u64,
    /// Narrowphase time, microseconds
    pub narrowphase_us: u64,
    /// Resolution time, microseconds
    pub resolve_us: u64,
    /// Candidate pairs produced by the last broadphase
    pub pairs: usize,
    /// Contacts confirmed by the last narrowphase
    pub contacts: usize,
    /// Bodies currently registered
    pub body_count: usize,
    /// Ticks processed
    pub frames: u64,
}

/// Source of blocking-tile data for static-body rebuilds.
///
/// The world crate implements this; the engine only needs tile geometry
/// and the blocking flag.
pub trait TileSource {
    /// Tiles per row.
    fn width(&self) -> u32;
    /// Tiles per column.
    fn height(&self) -> u32;
    /// Tile edge length in world units.
    fn tile_size(&self) -> f32;
    /// True when the tile at (x, y) blocks movement.
    fn is_blocking(&self, x: u32, y: u32) -> bool;
}

/// A confirmed overlap from the narrowphase.
#[derive(Clone, Copy, Debug)]
struct Contact {
    a: EntityId,
    b: EntityId,
    /// Minimum translation pushing `a` out of `b`
    mtv: Vec2,
    /// True when either side is a trigger
    trigger: bool,
}

/// Collision detection, resolution and trigger dispatch.
pub struct CollisionEngine {
    bodies: HashMap<EntityId, CollisionBody>,
    static_hash: SpatialHash,
    dynamic_hash: SpatialHash,
    world_bounds: Aabb,
    events: EventSender,

    // Trigger state machine: pairs currently inside, plus per-pair Enter
    // cooldown stamps. Exit is never cooldown-gated.
    active_trigger_pairs: HashSet<(EntityId, EntityId)>,
    trigger_cooldown_until: HashMap<(EntityId, EntityId), f32>,
    trigger_cooldown_secs: HashMap<EntityId, f32>,
    default_trigger_cooldown_secs: f32,

    // Static bodies created from world tiles, for onTileChanged updates.
    tile_bodies: HashMap<(u32, u32), EntityId>,

    deferred_events: Vec<SimEvent>,
    now: f32,
    perf: PerfStats,

    // Scratch buffers reused across ticks.
    query_scratch: Vec<EntityId>,
}

impl CollisionEngine {
    /// Creates an engine publishing on `events`, with default cell sizes.
    #[must_use]
    pub fn new(events: EventSender) -> Self {
        Self::with_cell_size(events, COLLISION_CELL_SIZE)
    }

    /// Creates an engine with an explicit hash cell size (32-64 px).
    #[must_use]
    pub fn with_cell_size(events: EventSender, cell_size: f32) -> Self {
        Self {
            bodies: HashMap::new(),
            static_hash: SpatialHash::new(cell_size, MOVEMENT_THRESHOLD),
            dynamic_hash: SpatialHash::new(cell_size, MOVEMENT_THRESHOLD),
            world_bounds: Aabb::new(0.0, 0.0, 100_000.0, 100_000.0),
            events,
            active_trigger_pairs: HashSet::new(),
            trigger_cooldown_until: HashMap::new(),
            trigger_cooldown_secs: HashMap::new(),
            default_trigger_cooldown_secs: 0.0,
            tile_bodies: HashMap::new(),
            deferred_events: Vec::new(),
            now: 0.0,
            perf: PerfStats::default(),
            query_scratch: Vec::new(),
        }
    }

    // =========================================================================
    // Body management (structural phase)
    // =========================================================================

    /// Registers a body for an entity. A static body additionally emits an
    /// obstacle-added event.
    pub fn add_body(&mut self, entity: EntityHandle, aabb: Aabb, kind: BodyKind) {
        let body = CollisionBody::new(entity, aabb, kind);
        let id = body.id();
        match kind {
            BodyKind::Static => {
                self.static_hash.insert(id, aabb);
                self.publish_obstacle_change(aabb, ObstacleChange::Added, "static body added");
            }
            BodyKind::Kinematic | BodyKind::Dynamic => self.dynamic_hash.insert(id, aabb),
        }
        self.bodies.insert(id, body);
    }

    /// Removes a body. No-op returning `false` for unknown ids; removing a
    /// static body emits an obstacle-removed event.
    pub fn remove_body(&mut self, id: EntityId) -> bool {
        let Some(body) = self.bodies.remove(&id) else {
            return false;
        };
        match body.kind {
            BodyKind::Static => {
                self.static_hash.remove(id);
                if !body.is_trigger {
                    self.publish_obstacle_change(body.aabb, ObstacleChange::Removed, "static body removed");
                }
            }
            BodyKind::Kinematic | BodyKind::Dynamic => self.dynamic_hash.remove(id),
        }
        // Drop trigger bookkeeping mentioning the body.
        self.active_trigger_pairs.retain(|&(t, o)| t != id && o != id);
        self.trigger_cooldown_until.retain(|&(t, o), _| t != id && o != id);
        self.trigger_cooldown_secs.remove(&id);
        true
    }

    /// Enables or disables a body without unregistering it.
    pub fn set_body_enabled(&mut self, id: EntityId, enabled: bool) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Sets the layer bits a body occupies and collides with.
    pub fn set_body_layer(&mut self, id: EntityId, layer: u32, collides_with: u32) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.layer = layer;
                body.collides_with = collides_with;
                true
            }
            None => false,
        }
    }

    /// Teleports a kinematic body to a new center.
    pub fn set_kinematic_pose(&mut self, id: EntityId, center: Vec2) -> bool {
        let Some(body) = self.bodies.get_mut(&id) else {
            return false;
        };
        body.aabb.center = center;
        let aabb = body.aabb;
        let is_static = matches!(body.kind, BodyKind::Static);
        if is_static {
            self.static_hash.update(id, aabb);
        } else {
            self.dynamic_hash.update(id, aabb);
        }
        true
    }

    /// Overrides a body's cached velocity (normally synced from the store).
    pub fn set_velocity(&mut self, id: EntityId, velocity: Vec2) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.velocity = velocity;
                true
            }
            None => false,
        }
    }

    /// Marks a body as a trigger with the given tag.
    pub fn set_body_trigger(&mut self, id: EntityId, is_trigger: bool, tag: TriggerTag) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.is_trigger = is_trigger;
                body.trigger_tag = tag;
                true
            }
            None => false,
        }
    }

    /// Per-trigger Enter cooldown in seconds.
    pub fn set_trigger_cooldown(&mut self, id: EntityId, seconds: f32) {
        self.trigger_cooldown_secs.insert(id, seconds);
    }

    /// Default Enter cooldown for triggers without an explicit one.
    pub fn set_default_trigger_cooldown(&mut self, seconds: f32) {
        self.default_trigger_cooldown_secs = seconds;
    }

    /// Convenience: registers a static trigger volume in one call.
    ///
    /// Trigger volumes do not block movement, so no obstacle-change event
    /// fires for them.
    pub fn create_trigger_area(&mut self, entity: EntityHandle, aabb: Aabb, tag: TriggerTag) {
        let mut body = CollisionBody::new(entity, aabb, BodyKind::Static);
        body.is_trigger = true;
        body.trigger_tag = tag;
        body.layer = layers::TRIGGER;
        self.static_hash.insert(entity.id, aabb);
        self.bodies.insert(entity.id, body);
    }

    /// Resizes a body's half extents in place.
    pub fn resize_body(&mut self, id: EntityId, half_width: f32, half_height: f32) -> bool {
        let Some(body) = self.bodies.get_mut(&id) else {
            return false;
        };
        body.aabb.half = Vec2::new(half_width, half_height);
        let aabb = body.aabb;
        let is_static = matches!(body.kind, BodyKind::Static);
        if is_static {
            self.static_hash.update(id, aabb);
        } else {
            self.dynamic_hash.update(id, aabb);
        }
        true
    }

    /// Clamp region for resolved positions.
    pub fn set_world_bounds(&mut self, bounds: Aabb) {
        self.world_bounds = bounds;
    }

    // =========================================================================
    // World coupling
    // =========================================================================

    /// Rebuilds the static set from a tile source. `create_obstacle` is
    /// called once per blocking tile and supplies the backing entity.
    pub fn rebuild_static_from_world(
        &mut self,
        tiles: &impl TileSource,
        mut create_obstacle: impl FnMut(Vec2, Vec2) -> Option<EntityHandle>,
    ) -> usize {
        // Drop previous tile bodies first.
        let old: Vec<EntityId> = self.tile_bodies.values().copied().collect();
        for id in old {
            self.remove_body(id);
        }
        self.tile_bodies.clear();

        let half = tiles.tile_size() * 0.5;
        let mut created = 0usize;
        for y in 0..tiles.height() {
            for x in 0..tiles.width() {
                if !tiles.is_blocking(x, y) {
                    continue;
                }
                let center = Vec2::new(
                    x as f32 * tiles.tile_size() + half,
                    y as f32 * tiles.tile_size() + half,
                );
                let Some(handle) = create_obstacle(center, Vec2::new(half, half)) else {
                    continue;
                };
                self.add_body(handle, Aabb::from_center(center, Vec2::new(half, half)), BodyKind::Static);
                self.tile_bodies.insert((x, y), handle.id);
                created += 1;
            }
        }
        debug!(count = created, "static set rebuilt from world");
        created
    }

    /// Updates the static body for one tile after the world changed it.
    pub fn on_tile_changed(
        &mut self,
        x: u32,
        y: u32,
        blocking: bool,
        tile_size: f32,
        mut create_obstacle: impl FnMut(Vec2, Vec2) -> Option<EntityHandle>,
    ) {
        if let Some(id) = self.tile_bodies.remove(&(x, y)) {
            self.remove_body(id);
        }
        if blocking {
            let half = tile_size * 0.5;
            let center = Vec2::new(x as f32 * tile_size + half, y as f32 * tile_size + half);
            if let Some(handle) = create_obstacle(center, Vec2::new(half, half)) {
                self.add_body(handle, Aabb::from_center(center, Vec2::new(half, half)), BodyKind::Static);
                self.tile_bodies.insert((x, y), handle.id);
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Union query over both hashes, deduplicated.
    pub fn query_area(&self, area: &Aabb, out: &mut Vec<EntityId>) {
        out.clear();
        let mut scratch = Vec::new();
        self.static_hash.query(area, &mut scratch);
        out.extend_from_slice(&scratch);
        self.dynamic_hash.query(area, &mut scratch);
        for id in scratch {
            if !out.contains(&id) {
                out.push(id);
            }
        }
    }

    /// Precise overlap test between two registered bodies.
    #[must_use]
    pub fn overlaps(&self, a: EntityId, b: EntityId) -> bool {
        match (self.bodies.get(&a), self.bodies.get(&b)) {
            (Some(a), Some(b)) => a.aabb.intersects(&b.aabb),
            _ => false,
        }
    }

    /// A body's current center.
    #[must_use]
    pub fn body_center(&self, id: EntityId) -> Option<Vec2> {
        self.bodies.get(&id).map(|b| b.aabb.center)
    }

    /// Shared view of a body.
    #[must_use]
    pub fn body(&self, id: EntityId) -> Option<&CollisionBody> {
        self.bodies.get(&id)
    }

    /// True for registered dynamic bodies.
    #[must_use]
    pub fn is_dynamic(&self, id: EntityId) -> bool {
        self.bodies.get(&id).is_some_and(|b| matches!(b.kind, BodyKind::Dynamic))
    }

    /// True for registered kinematic bodies.
    #[must_use]
    pub fn is_kinematic(&self, id: EntityId) -> bool {
        self.bodies.get(&id).is_some_and(|b| matches!(b.kind, BodyKind::Kinematic))
    }

    /// True for registered trigger bodies.
    #[must_use]
    pub fn is_trigger(&self, id: EntityId) -> bool {
        self.bodies.get(&id).is_some_and(|b| b.is_trigger)
    }

    /// Registered body count.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Last tick's performance counters.
    #[must_use]
    pub fn perf_stats(&self) -> PerfStats {
        self.perf
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Runs one collision tick: integrate, detect, resolve, write back,
    /// dispatch.
    ///
    /// Velocities are read from the store at the start of integration;
    /// resolved centers are written back at the end. Between the two the
    /// hashes are only read.
    pub fn update(&mut self, dt: f32, store: &mut EntityDataStore) {
        self.now += dt;
        self.perf.frames += 1;
        self.perf.body_count = self.bodies.len();

        self.integrate(dt, store);

        let t0 = Instant::now();
        let pairs = self.broadphase();
        self.perf.broadphase_us = t0.elapsed().as_micros() as u64;
        self.perf.pairs = pairs.len();

        let t1 = Instant::now();
        let contacts = self.narrowphase(&pairs);
        self.perf.narrowphase_us = t1.elapsed().as_micros() as u64;
        self.perf.contacts = contacts.len();

        let t2 = Instant::now();
        self.resolve(&contacts);
        self.perf.resolve_us = t2.elapsed().as_micros() as u64;

        self.update_triggers(&contacts);
        self.write_back(store);
        self.dispatch_events();
    }

    /// Reads velocities from the store and advances moving bodies.
    fn integrate(&mut self, dt: f32, store: &EntityDataStore) {
        let mut moves: Vec<(EntityId, Aabb)> = Vec::new();
        for body in self.bodies.values_mut() {
            if !body.enabled || !body.is_moving_kind() {
                continue;
            }
            let Some(index) = store.get_index(body.entity) else {
                continue;
            };
            let Some(hot) = store.hot(index) else {
                continue;
            };
            body.velocity = hot.transform.velocity;
            body.last_position = hot.transform.position;
            let mut center = hot.transform.position + body.velocity * dt;
            center = self.world_bounds.closest_point(center);
            body.aabb.center = center;
            moves.push((body.id(), body.aabb));
        }
        for (id, aabb) in moves {
            self.dynamic_hash.update(id, aabb);
        }
    }

    /// Candidate pair generation. Pairs come out with `a.id < b.id` so the
    /// same pair is never produced twice.
    ///
    /// Above [`PARALLEL_BODY_THRESHOLD`] moving bodies, the scan fans out
    /// over scoped threads; the hashes are snapshot-stable for the whole
    /// detection phase, so the workers only ever read.
    fn broadphase(&mut self) -> Vec<(EntityId, EntityId)> {
        let movers: Vec<EntityId> = self
            .bodies
            .values()
            .filter(|b| b.enabled && matches!(b.kind, BodyKind::Dynamic | BodyKind::Kinematic))
            .map(CollisionBody::id)
            .collect();

        let mut pairs = if movers.len() >= PARALLEL_BODY_THRESHOLD {
            self.scan_chunked(&movers, |engine, chunk, out| {
                let mut scratch = Vec::new();
                for &id in chunk {
                    engine.pairs_for(id, &mut scratch, out);
                }
            })
        } else {
            let mut pairs = Vec::new();
            let mut scratch = std::mem::take(&mut self.query_scratch);
            for &id in &movers {
                self.pairs_for(id, &mut scratch, &mut pairs);
            }
            self.query_scratch = scratch;
            pairs
        };

        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    /// Candidate pairs for one moving body, appended to `out`.
    fn pairs_for(&self, id: EntityId, scratch: &mut Vec<EntityId>, out: &mut Vec<(EntityId, EntityId)>) {
        let Some(body) = self.bodies.get(&id) else {
            return;
        };

        self.static_hash.query(&body.aabb, scratch);
        for &other in scratch.iter() {
            if let Some(other_body) = self.bodies.get(&other) {
                if body.should_collide_with(other_body) {
                    out.push(order_pair(id, other));
                }
            }
        }
        self.dynamic_hash.query(&body.aabb, scratch);
        for &other in scratch.iter() {
            // a.id < b.id dedupes the dynamic/dynamic half: the partner
            // body produces the same pair on its own scan.
            if other <= id {
                continue;
            }
            if let Some(other_body) = self.bodies.get(&other) {
                if body.should_collide_with(other_body) {
                    out.push((id, other));
                }
            }
        }
    }

    /// Fans `items` out over scoped worker threads, each appending into
    /// its own buffer; results are concatenated in chunk order so the
    /// outcome is independent of thread scheduling.
    fn scan_chunked<T: Sync, R: Send>(
        &self,
        items: &[T],
        scan: impl Fn(&Self, &[T], &mut Vec<R>) + Sync,
    ) -> Vec<R> {
        let threads = std::thread::available_parallelism().map_or(2, |n| n.get().min(8));
        let chunk_size = items.len().div_ceil(threads);
        std::thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks(chunk_size.max(1))
                .map(|chunk| {
                    let scan = &scan;
                    scope.spawn(move || {
                        let mut out = Vec::new();
                        scan(self, chunk, &mut out);
                        out
                    })
                })
                .collect();
            let mut merged = Vec::new();
            for handle in handles {
                if let Ok(mut part) = handle.join() {
                    merged.append(&mut part);
                }
            }
            merged
        })
    }

    /// Exact overlap tests over the candidate pairs, fanned out above the
    /// parallel threshold.
    fn narrowphase(&self, pairs: &[(EntityId, EntityId)]) -> Vec<Contact> {
        if pairs.len() >= PARALLEL_BODY_THRESHOLD {
            return self.scan_chunked(pairs, |engine, chunk, out| {
                for &pair in chunk {
                    engine.contact_for(pair, out);
                }
            });
        }
        let mut contacts = Vec::with_capacity(pairs.len() / 2 + 1);
        for &pair in pairs {
            self.contact_for(pair, &mut contacts);
        }
        contacts
    }

    fn contact_for(&self, (a, b): (EntityId, EntityId), out: &mut Vec<Contact>) {
        let (Some(body_a), Some(body_b)) = (self.bodies.get(&a), self.bodies.get(&b)) else {
            return;
        };
        if let Some(mtv) = body_a.aabb.penetration(&body_b.aabb) {
            out.push(Contact {
                a,
                b,
                mtv,
                trigger: body_a.is_trigger || body_b.is_trigger,
            });
        }
    }

    /// Sequential positional correction in deterministic (a, b) order.
    ///
    /// The MTV is recomputed when an earlier resolution moved either body
    /// of the pair.
    fn resolve(&mut self, contacts: &[Contact]) {
        let mut moved: HashSet<EntityId> = HashSet::new();

        for contact in contacts {
            // Triggers report overlap through events only; the contact is
            // recorded but never resolved.
            if contact.trigger {
                continue;
            }
            let mtv = if moved.contains(&contact.a) || moved.contains(&contact.b) {
                let (Some(a), Some(b)) = (self.bodies.get(&contact.a), self.bodies.get(&contact.b))
                else {
                    continue;
                };
                match a.aabb.penetration(&b.aabb) {
                    Some(mtv) => mtv,
                    None => continue,
                }
            } else {
                contact.mtv
            };

            let (kind_a, kind_b, inv_a, inv_b) = {
                let (Some(a), Some(b)) = (self.bodies.get(&contact.a), self.bodies.get(&contact.b))
                else {
                    continue;
                };
                (a.kind, b.kind, a.inverse_mass(), b.inverse_mass())
            };

            match (kind_a, kind_b) {
                // Static/kinematic pairs never move each other.
                (BodyKind::Static | BodyKind::Kinematic, BodyKind::Static | BodyKind::Kinematic) => {}
                // Dynamic vs immovable: push the dynamic body out fully.
                (BodyKind::Dynamic, BodyKind::Static | BodyKind::Kinematic) => {
                    self.push_body(contact.a, mtv);
                    moved.insert(contact.a);
                }
                (BodyKind::Static | BodyKind::Kinematic, BodyKind::Dynamic) => {
                    self.push_body(contact.b, -mtv);
                    moved.insert(contact.b);
                }
                // Dynamic vs dynamic: split by inverse mass.
                (BodyKind::Dynamic, BodyKind::Dynamic) => {
                    let total = inv_a + inv_b;
                    if total <= 0.0 {
                        continue;
                    }
                    self.push_body(contact.a, mtv * (inv_a / total));
                    self.push_body(contact.b, -mtv * (inv_b / total));
                    moved.insert(contact.a);
                    moved.insert(contact.b);
                }
            }
        }
    }

    /// Applies a positional correction and the velocity response.
    fn push_body(&mut self, id: EntityId, mtv: Vec2) {
        let Some(body) = self.bodies.get_mut(&id) else {
            return;
        };
        body.aabb.center += mtv;
        body.aabb.center = self.world_bounds.closest_point(body.aabb.center);

        // Velocity response along the contact normal: kill or reflect the
        // into-contact component, damp the tangential one.
        let normal = mtv.normalized();
        if normal != Vec2::ZERO {
            let into = body.velocity.dot(normal);
            if into < 0.0 {
                let restitution = body.restitution;
                let friction = body.friction;
                let normal_part = normal * into;
                let tangent_part = body.velocity - normal_part;
                body.velocity = tangent_part * (1.0 - friction * 0.1) - normal_part * restitution;
            }
        }

        let aabb = body.aabb;
        self.dynamic_hash.update(id, aabb);
    }

    /// Runs the Enter/Exit state machine over this tick's trigger contacts.
    fn update_triggers(&mut self, contacts: &[Contact]) {
        // Pairs overlapping this tick, keyed (trigger, other).
        let mut inside: HashSet<(EntityId, EntityId)> = HashSet::new();
        for contact in contacts {
            if !contact.trigger {
                continue;
            }
            let (Some(a), Some(b)) = (self.bodies.get(&contact.a), self.bodies.get(&contact.b))
            else {
                continue;
            };
            if a.is_trigger {
                inside.insert((contact.a, contact.b));
            }
            if b.is_trigger {
                inside.insert((contact.b, contact.a));
            }
        }

        // Idle -> Inside: emit Enter unless the pair is inside its cooldown.
        for &(trigger, other) in &inside {
            if self.active_trigger_pairs.contains(&(trigger, other)) {
                continue;
            }
            self.active_trigger_pairs.insert((trigger, other));

            let suppressed = self
                .trigger_cooldown_until
                .get(&(trigger, other))
                .is_some_and(|&until| until > self.now);
            let cooldown = self
                .trigger_cooldown_secs
                .get(&trigger)
                .copied()
                .unwrap_or(self.default_trigger_cooldown_secs);
            self.trigger_cooldown_until.insert((trigger, other), self.now + cooldown);

            if suppressed {
                trace!(trigger, other, "trigger enter suppressed by cooldown");
                continue;
            }
            let (tag, position) = match (self.bodies.get(&trigger), self.bodies.get(&other)) {
                (Some(t), Some(o)) => (t.trigger_tag, o.aabb.center),
                _ => continue,
            };
            self.deferred_events.push(SimEvent::WorldTrigger {
                entity: other,
                trigger,
                tag: tag as u8,
                position,
                phase: TriggerPhase::Enter,
            });
        }

        // Inside -> Idle: Exit fires immediately on the first
        // non-overlapping tick, never cooldown-gated.
        let exited: Vec<(EntityId, EntityId)> = self
            .active_trigger_pairs
            .iter()
            .filter(|pair| !inside.contains(pair))
            .copied()
            .collect();
        for (trigger, other) in exited {
            self.active_trigger_pairs.remove(&(trigger, other));
            let (tag, position) = match (self.bodies.get(&trigger), self.bodies.get(&other)) {
                (Some(t), Some(o)) => (t.trigger_tag, o.aabb.center),
                _ => continue,
            };
            self.deferred_events.push(SimEvent::WorldTrigger {
                entity: other,
                trigger,
                tag: tag as u8,
                position,
                phase: TriggerPhase::Exit,
            });
        }
    }

    /// Writes resolved centers back to the store.
    fn write_back(&mut self, store: &mut EntityDataStore) {
        for body in self.bodies.values() {
            if !body.enabled || !body.is_moving_kind() {
                continue;
            }
            let Some(index) = store.get_index(body.entity) else {
                continue;
            };
            if body.aabb.center != body.last_position {
                store.apply_position(index, body.aabb.center);
            }
            store.set_velocity(index, body.velocity);
        }
    }

    /// Publishes everything queued during the pass.
    fn dispatch_events(&mut self) {
        for event in self.deferred_events.drain(..) {
            self.events.publish(event);
        }
    }

    fn publish_obstacle_change(&mut self, aabb: Aabb, change: ObstacleChange, description: &str) {
        self.events.publish(SimEvent::ObstacleChanged {
            position: aabb.center,
            radius: aabb.half.x.max(aabb.half.y) + OBSTACLE_SAFETY_MARGIN,
            change,
            description: description.to_owned(),
        });
    }
}

fn order_pair(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberwake_shared::EventBus;

    fn engine() -> (CollisionEngine, emberwake_shared::EventReceiver) {
        let (tx, rx) = EventBus::channel(256);
        (CollisionEngine::new(tx), rx)
    }

    fn store() -> EntityDataStore {
        EntityDataStore::new(256, 64)
    }

    fn spawn_dynamic(
        store: &mut EntityDataStore,
        engine: &mut CollisionEngine,
        position: Vec2,
        half: Vec2,
    ) -> EntityHandle {
        let handle = store.create_npc(position, half, 10.0, 0, 2, "w").unwrap();
        engine.add_body(handle, Aabb::from_center(position, half), BodyKind::Dynamic);
        handle
    }

    #[test]
    fn test_add_remove_body_roundtrip() {
        let (mut engine, _rx) = engine();
        let mut s = store();
        let before = engine.body_count();
        let h = spawn_dynamic(&mut s, &mut engine, Vec2::ZERO, Vec2::new(8.0, 8.0));
        assert_eq!(engine.body_count(), before + 1);
        assert!(engine.remove_body(h.id));
        assert_eq!(engine.body_count(), before);
        assert!(!engine.remove_body(h.id));
    }

    #[test]
    fn test_static_change_emits_obstacle_events() {
        let (mut engine, rx) = engine();
        let mut s = store();
        let obstacle = s
            .create_static_obstacle(Vec2::new(200.0, 200.0), Vec2::new(32.0, 32.0))
            .unwrap();
        engine.add_body(
            obstacle,
            Aabb::new(200.0, 200.0, 32.0, 32.0),
            BodyKind::Static,
        );
        engine.remove_body(obstacle.id);

        let mut events = Vec::new();
        rx.drain(&mut events);
        let changes: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SimEvent::ObstacleChanged { change, radius, position, .. } => {
                    Some((*change, *radius, *position))
                }
                _ => None,
            })
            .collect();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].0, ObstacleChange::Added);
        assert_eq!(changes[1].0, ObstacleChange::Removed);
        assert_eq!(changes[0].1, 32.0 + OBSTACLE_SAFETY_MARGIN);
        assert_eq!(changes[0].2, Vec2::new(200.0, 200.0));
    }

    #[test]
    fn test_dynamic_pushed_out_of_static() {
        let (mut engine, _rx) = engine();
        let mut s = store();

        let wall = s
            .create_static_obstacle(Vec2::new(100.0, 0.0), Vec2::new(16.0, 64.0))
            .unwrap();
        engine.add_body(wall, Aabb::new(100.0, 0.0, 16.0, 64.0), BodyKind::Static);

        // Walks right into the wall.
        let walker = spawn_dynamic(&mut s, &mut engine, Vec2::new(70.0, 0.0), Vec2::new(8.0, 8.0));
        let index = s.get_index(walker).unwrap();
        s.set_velocity(index, Vec2::new(100.0, 0.0));

        engine.update(0.25, &mut s);

        // Unresolved position would be 95; the wall's left face is at 84,
        // so the body must sit flush against it (center at 76).
        let pos = s.position(index).unwrap();
        assert!(pos.x <= 76.0 + 1e-3, "body at {pos:?} still inside the wall");
        assert!(!engine.overlaps(walker.id, wall.id));
    }

    #[test]
    fn test_dynamic_pair_splits_by_inverse_mass() {
        let (mut engine, _rx) = engine();
        let mut s = store();

        let light = spawn_dynamic(&mut s, &mut engine, Vec2::new(0.0, 0.0), Vec2::new(8.0, 8.0));
        let heavy = spawn_dynamic(&mut s, &mut engine, Vec2::new(10.0, 0.0), Vec2::new(8.0, 8.0));
        // heavy is 3x the mass: it should absorb 1/4 of the correction.
        engine.bodies.get_mut(&heavy.id).unwrap().mass = 3.0;

        engine.update(1.0 / 60.0, &mut s);

        let light_pos = s.position(s.get_index(light).unwrap()).unwrap();
        let heavy_pos = s.position(s.get_index(heavy).unwrap()).unwrap();
        let light_moved = (light_pos.x - 0.0).abs();
        let heavy_moved = (heavy_pos.x - 10.0).abs();
        assert!(light_moved > heavy_moved);
        assert!(!engine.overlaps(light.id, heavy.id));
    }

    #[test]
    fn test_trigger_enter_exit_once_each() {
        let (mut engine, rx) = engine();
        let mut s = store();

        let zone = s.create_trigger_zone(Vec2::new(100.0, 100.0), Vec2::new(50.0, 50.0)).unwrap();
        engine.create_trigger_area(zone, Aabb::new(100.0, 100.0, 50.0, 50.0), TriggerTag::Water);

        let swimmer = s
            .create_npc(Vec2::new(0.0, 100.0), Vec2::ZERO, 10.0, 0, 2, "w")
            .unwrap();
        engine.add_body(
            swimmer,
            Aabb::from_center(Vec2::new(0.0, 100.0), Vec2::ZERO),
            BodyKind::Kinematic,
        );
        let index = s.get_index(swimmer).unwrap();
        s.set_velocity(index, Vec2::new(50.0, 0.0));

        for _ in 0..5 {
            engine.update(1.0, &mut s);
            s.set_velocity(index, Vec2::new(50.0, 0.0));
        }

        let mut events = Vec::new();
        rx.drain(&mut events);
        let phases: Vec<TriggerPhase> = events
            .iter()
            .filter_map(|e| match e {
                SimEvent::WorldTrigger { phase, tag, .. } => {
                    assert_eq!(*tag, TriggerTag::Water as u8);
                    Some(*phase)
                }
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![TriggerPhase::Enter, TriggerPhase::Exit]);
    }

    #[test]
    fn test_trigger_enter_cooldown_suppression() {
        let (mut engine, rx) = engine();
        let mut s = store();

        let zone = s.create_trigger_zone(Vec2::new(0.0, 0.0), Vec2::new(20.0, 20.0)).unwrap();
        engine.create_trigger_area(zone, Aabb::new(0.0, 0.0, 20.0, 20.0), TriggerTag::Checkpoint);
        engine.set_trigger_cooldown(zone.id, 10.0);

        let runner = s
            .create_npc(Vec2::new(0.0, 0.0), Vec2::ZERO, 10.0, 0, 2, "w")
            .unwrap();
        engine.add_body(runner, Aabb::from_center(Vec2::ZERO, Vec2::ZERO), BodyKind::Kinematic);
        let index = s.get_index(runner).unwrap();

        // In, out, and straight back in within the cooldown window.
        engine.update(0.1, &mut s); // inside -> Enter
        s.apply_position(index, Vec2::new(100.0, 0.0));
        engine.set_kinematic_pose(runner.id, Vec2::new(100.0, 0.0));
        engine.update(0.1, &mut s); // outside -> Exit
        s.apply_position(index, Vec2::new(0.0, 0.0));
        engine.set_kinematic_pose(runner.id, Vec2::new(0.0, 0.0));
        engine.update(0.1, &mut s); // inside again -> Enter suppressed

        let mut events = Vec::new();
        rx.drain(&mut events);
        let phases: Vec<TriggerPhase> = events
            .iter()
            .filter_map(|e| match e {
                SimEvent::WorldTrigger { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![TriggerPhase::Enter, TriggerPhase::Exit]);
    }

    #[test]
    fn test_query_area_unions_both_hashes() {
        let (mut engine, _rx) = engine();
        let mut s = store();

        let wall = s
            .create_static_obstacle(Vec2::new(10.0, 0.0), Vec2::new(8.0, 8.0))
            .unwrap();
        engine.add_body(wall, Aabb::new(10.0, 0.0, 8.0, 8.0), BodyKind::Static);
        let npc = spawn_dynamic(&mut s, &mut engine, Vec2::new(-10.0, 0.0), Vec2::new(8.0, 8.0));

        let mut out = Vec::new();
        engine.query_area(&Aabb::new(0.0, 0.0, 64.0, 64.0), &mut out);
        assert!(out.contains(&wall.id));
        assert!(out.contains(&npc.id));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_unknown_body_operations_are_noops() {
        let (mut engine, _rx) = engine();
        assert!(!engine.set_body_enabled(42, false));
        assert!(!engine.set_velocity(42, Vec2::ZERO));
        assert!(!engine.resize_body(42, 1.0, 1.0));
        assert!(!engine.overlaps(1, 2));
        assert!(engine.body_center(42).is_none());
    }

    struct CrossMap;

    impl TileSource for CrossMap {
        fn width(&self) -> u32 {
            4
        }
        fn height(&self) -> u32 {
            4
        }
        fn tile_size(&self) -> f32 {
            32.0
        }
        fn is_blocking(&self, x: u32, y: u32) -> bool {
            x == 1 && y != 3
        }
    }

    #[test]
    fn test_rebuild_static_from_world_and_tile_change() {
        let (mut engine, rx) = engine();
        let mut s = store();

        let created = engine.rebuild_static_from_world(&CrossMap, |center, half| {
            s.create_static_obstacle(center, half).ok()
        });
        assert_eq!(created, 3);
        assert_eq!(engine.body_count(), 3);

        // Tile (1, 0) opens up: its body goes away and a removal event
        // fires.
        engine.on_tile_changed(1, 0, false, 32.0, |center, half| {
            s.create_static_obstacle(center, half).ok()
        });
        assert_eq!(engine.body_count(), 2);

        // Tile (2, 2) becomes a wall.
        engine.on_tile_changed(2, 2, true, 32.0, |center, half| {
            s.create_static_obstacle(center, half).ok()
        });
        assert_eq!(engine.body_count(), 3);

        // Cell-level candidates, filtered to a precise containment hit.
        let mut out = Vec::new();
        engine.query_area(&Aabb::new(80.0, 80.0, 8.0, 8.0), &mut out);
        let covered = out
            .iter()
            .any(|&id| engine.body(id).is_some_and(|b| b.aabb.contains(Vec2::new(80.0, 80.0))));
        assert!(covered);

        let mut events = Vec::new();
        rx.drain(&mut events);
        let (added, removed) = events.iter().fold((0, 0), |(a, r), e| match e {
            SimEvent::ObstacleChanged { change: ObstacleChange::Added, .. } => (a + 1, r),
            SimEvent::ObstacleChanged { change: ObstacleChange::Removed, .. } => (a, r + 1),
            _ => (a, r),
        });
        assert_eq!(added, 4);
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_disabled_bodies_do_not_collide() {
        let (mut engine, _rx) = engine();
        let mut s = store();

        let a = spawn_dynamic(&mut s, &mut engine, Vec2::new(0.0, 0.0), Vec2::new(8.0, 8.0));
        let _b = spawn_dynamic(&mut s, &mut engine, Vec2::new(4.0, 0.0), Vec2::new(8.0, 8.0));
        engine.set_body_enabled(a.id, false);

        engine.update(1.0 / 60.0, &mut s);
        // Disabled body never moved despite the deep overlap.
        assert_eq!(s.position(s.get_index(a).unwrap()).unwrap(), Vec2::ZERO);
    }
}
