//! # Pathfinding Scheduler
//!
//! Priority queue in front of the grid search. Requests are throttled per
//! entity, answered from the cache when possible, batched for locality
//! and either executed on the tick thread or shipped to the worker pool.
//!
//! Contract with callers: every request invokes its callback exactly once.
//! Rejections, timeouts and unreachable goals all deliver an empty
//! waypoint list so the entity can fall back to direct steering.
//!
//! Async mode: when the queue is deep enough, a worker pool is attached
//! and its pressure stays under the limit, batches run on worker threads.
//! The callback then runs on the worker; its only legal actions are
//! writing the entity's own result slot and enqueueing work for the tick
//! thread.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use emberwake_shared::constants::{
    PATH_ASYNC_DEADLINE_SECS, PATH_QUEUE_CAP, PATH_RECENT_RESULT_SECS, PATH_RESULT_TTL_SECS,
    POOL_PRESSURE_LIMIT,
};
use emberwake_shared::{EntityId, SimEvent, Vec2};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

use crate::cache::PathCache;
use crate::grid::{PathResult, PathfindingGrid};
use crate::pool::WorkerPool;

/// Request urgency. Higher sorts first; ties are FIFO.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum PathPriority {
    /// Background wandering
    Low = 0,
    /// Ordinary movement
    #[default]
    Medium = 1,
    /// Near the player or combat-relevant
    High = 2,
    /// Must run this tick if at all possible
    Critical = 3,
}

/// Result delivery: `(entity, waypoints)`; empty waypoints mean failure.
pub type PathCallback = Box<dyn FnOnce(EntityId, &[Vec2]) + Send>;

/// Scheduler throughput counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchedulerStats {
    /// Requests that received any answer
    pub processed: u64,
    /// Requests answered straight from the cache
    pub from_cache: u64,
    /// Searches that produced a path
    pub completed: u64,
    /// Searches that hit the iteration cap
    pub timeouts: u64,
    /// Requests rejected (throttle, queue cap, shutdown)
    pub rejected: u64,
}

struct QueuedRequest {
    entity: EntityId,
    start: Vec2,
    goal: Vec2,
    priority: PathPriority,
    seq: u64,
    callback: Option<PathCallback>,
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueuedRequest {}
impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct StoredResult {
    waypoints: Vec<Vec2>,
    compute_time: f32,
    valid: bool,
}

/// Outcome shipped back from a worker.
struct AsyncOutcome {
    entity: EntityId,
    start: Vec2,
    goal: Vec2,
    waypoints: Vec<Vec2>,
    result: PathResult,
}

/// Priority scheduler over the pathfinding grid.
pub struct PathfindingScheduler {
    queue: BinaryHeap<QueuedRequest>,
    pending_per_entity: HashMap<EntityId, u32>,
    results: HashMap<EntityId, StoredResult>,
    cache: PathCache,
    reference_point: Vec2,
    now: f32,
    seq: u64,
    queue_cap: usize,
    batch_size: usize,
    async_threshold: usize,
    last_cache_cleanup: f32,
    stats: SchedulerStats,
    outcome_tx: Sender<AsyncOutcome>,
    outcome_rx: Receiver<AsyncOutcome>,
    replay_rng: Option<ChaCha8Rng>,
    shutdown: bool,
}

impl Default for PathfindingScheduler {
    fn default() -> Self {
        Self::new(PATH_QUEUE_CAP, 32, 16)
    }
}

impl PathfindingScheduler {
    /// Creates a scheduler with an explicit queue cap, per-tick batch size
    /// and async threshold.
    #[must_use]
    pub fn new(queue_cap: usize, batch_size: usize, async_threshold: usize) -> Self {
        let (outcome_tx, outcome_rx) = unbounded();
        Self {
            queue: BinaryHeap::new(),
            pending_per_entity: HashMap::new(),
            results: HashMap::new(),
            cache: PathCache::default(),
            reference_point: Vec2::ZERO,
            now: 0.0,
            seq: 0,
            queue_cap,
            batch_size,
            async_threshold,
            last_cache_cleanup: 0.0,
            stats: SchedulerStats::default(),
            outcome_tx,
            outcome_rx,
            replay_rng: None,
            shutdown: false,
        }
    }

    /// Seeds A* tie-breaking for deterministic replay (sync batches only).
    pub fn set_replay_rng(&mut self, rng: ChaCha8Rng) {
        self.replay_rng = Some(rng);
    }

    /// The path cache, for stats and tests.
    #[must_use]
    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    /// Scheduler counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Pending requests.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// True when a valid path is stored for the entity.
    #[must_use]
    pub fn has_path(&self, entity: EntityId) -> bool {
        self.results.get(&entity).is_some_and(|r| r.valid)
    }

    /// The stored path for an entity, empty when none.
    #[must_use]
    pub fn get_path(&self, entity: EntityId) -> Vec<Vec2> {
        self.results
            .get(&entity)
            .filter(|r| r.valid)
            .map(|r| r.waypoints.clone())
            .unwrap_or_default()
    }

    /// Drops the stored path for an entity.
    pub fn clear_path(&mut self, entity: EntityId) {
        self.results.remove(&entity);
    }

    /// Routes collision events into cache invalidation.
    pub fn handle_event(&mut self, event: &SimEvent) {
        if let SimEvent::ObstacleChanged {
            position,
            radius,
            change,
            ..
        } = event
        {
            // Additions invalidate paths through the region; removals do
            // too, since a cached detour may now be suboptimal garbage
            // routed around nothing.
            let _ = change;
            self.cache.on_obstacle_changed(*position, *radius);
        }
    }

    /// Submits a path request. The callback always fires exactly once,
    /// synchronously for cache answers and rejections, later for queued
    /// work.
    pub fn request_path(
        &mut self,
        entity: EntityId,
        start: Vec2,
        goal: Vec2,
        priority: PathPriority,
        callback: PathCallback,
    ) {
        if self.shutdown {
            warn!("path request after shutdown");
            self.stats.rejected += 1;
            callback(entity, &[]);
            return;
        }

        // Cache first: a similar path answers instantly.
        if let Some(waypoints) = self.cache.find_similar(start, goal, self.now) {
            self.store_result(entity, waypoints.clone(), true);
            self.stats.from_cache += 1;
            self.stats.processed += 1;
            callback(entity, &waypoints);
            return;
        }

        // A recent failure for this pair is not worth retrying yet.
        if self.cache.has_negative_cached(start, goal, self.now) {
            self.stats.processed += 1;
            callback(entity, &[]);
            return;
        }

        // One pending request per entity.
        if self.pending_per_entity.get(&entity).copied().unwrap_or(0) >= 1 {
            trace!(entity, "path request throttled");
            self.stats.rejected += 1;
            callback(entity, &[]);
            return;
        }

        // A result computed moments ago answers repeats, success or not.
        if let Some(stored) = self.results.get(&entity) {
            if (self.now - stored.compute_time) < PATH_RECENT_RESULT_SECS {
                let waypoints = if stored.valid { stored.waypoints.clone() } else { Vec::new() };
                callback(entity, &waypoints);
                return;
            }
        }

        let priority = self.adjust_priority_by_distance(priority, start);

        if self.queue.len() >= self.queue_cap {
            warn!(
                entity,
                queued = self.queue.len(),
                "path request queue overflow, rejecting"
            );
            self.stats.rejected += 1;
            callback(entity, &[]);
            return;
        }

        self.seq += 1;
        *self.pending_per_entity.entry(entity).or_insert(0) += 1;
        self.queue.push(QueuedRequest {
            entity,
            start,
            goal,
            priority,
            seq: self.seq,
            callback: Some(callback),
        });
    }

    /// Spatial priority zones around the reference point.
    fn adjust_priority_by_distance(&self, priority: PathPriority, start: Vec2) -> PathPriority {
        let distance = start.distance(self.reference_point);
        if distance < 800.0 {
            priority.max(PathPriority::High)
        } else if distance < 1600.0 {
            priority
        } else if distance < 3200.0 {
            priority.max(PathPriority::Low)
        } else {
            PathPriority::Low
        }
    }

    /// Per-tick processing: drains async completions, maintains the cache
    /// and runs (or dispatches) one batch of requests.
    ///
    /// `congestion_at(position, radius)` reports nearby dynamic-body
    /// counts for congestion eviction.
    pub fn update(
        &mut self,
        dt: f32,
        reference_point: Vec2,
        grid: &Arc<PathfindingGrid>,
        congestion_at: impl Fn(Vec2, f32) -> usize,
        pool: Option<&Arc<dyn WorkerPool>>,
    ) {
        if self.shutdown {
            return;
        }
        self.now += dt;
        self.reference_point = reference_point;

        self.drain_async_outcomes();
        self.expire_results();

        // Cache maintenance on a coarse cadence.
        if self.now - self.last_cache_cleanup > 5.0 {
            self.cache.cleanup(self.now);
            self.cache
                .evict_paths_in_crowded_areas(reference_point, 400.0, 8, &congestion_at);
            self.last_cache_cleanup = self.now;
        }

        let queue_depth = self.queue.len();
        let batch = self.extract_batch(self.batch_size);
        if batch.is_empty() {
            return;
        }

        let use_async = pool.is_some_and(|p| {
            queue_depth >= self.async_threshold && !p.is_shutdown() && p.pressure() < POOL_PRESSURE_LIMIT
        });

        if use_async {
            if let Some(pool) = pool {
                self.dispatch_async(batch, grid, pool);
                return;
            }
        }

        // High pressure with a pool attached: urgent requests still run
        // this tick, the rest go back in the queue.
        if pool.is_some() && queue_depth >= self.async_threshold {
            let (urgent, deferred): (Vec<_>, Vec<_>) = batch.into_iter().partition(|r| {
                r.priority == PathPriority::Critical
                    || r.start.distance(reference_point) < 200.0
            });
            for request in deferred {
                *self.pending_per_entity.entry(request.entity).or_insert(0) += 1;
                self.queue.push(request);
            }
            self.process_sync(urgent, grid);
            return;
        }

        self.process_sync(batch, grid);
    }

    /// Pulls up to `max_requests` off the queue, releasing their throttle
    /// slots, and orders the batch along a Morton curve of start positions
    /// so neighboring searches touch neighboring grid memory.
    fn extract_batch(&mut self, max_requests: usize) -> Vec<QueuedRequest> {
        let count = max_requests.min(self.queue.len());
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(request) = self.queue.pop() else {
                break;
            };
            if let Some(pending) = self.pending_per_entity.get_mut(&request.entity) {
                *pending = pending.saturating_sub(1);
                if *pending == 0 {
                    self.pending_per_entity.remove(&request.entity);
                }
            }
            batch.push(request);
        }
        batch.sort_by_key(|r| morton_key(r.start));
        batch
    }

    fn process_sync(&mut self, batch: Vec<QueuedRequest>, grid: &Arc<PathfindingGrid>) {
        let mut waypoints = Vec::new();
        for mut request in batch {
            let result = match self.replay_rng.as_mut() {
                Some(rng) => grid.find_path_seeded(request.start, request.goal, &mut waypoints, rng),
                None => grid.find_path(request.start, request.goal, &mut waypoints),
            };
            self.finish_request(&mut request, &waypoints, result);
        }
    }

    fn dispatch_async(
        &mut self,
        batch: Vec<QueuedRequest>,
        grid: &Arc<PathfindingGrid>,
        pool: &Arc<dyn WorkerPool>,
    ) {
        let grid = Arc::clone(grid);
        let outcome_tx = self.outcome_tx.clone();
        let deadline = Instant::now() + Duration::from_secs_f32(PATH_ASYNC_DEADLINE_SECS);
        let mut batch = batch;

        let submitted = pool.submit(Box::new(move || {
            let mut waypoints = Vec::new();
            for request in &mut batch {
                let result = if Instant::now() > deadline {
                    waypoints.clear();
                    PathResult::Timeout
                } else {
                    grid.find_path(request.start, request.goal, &mut waypoints)
                };
                let _ = outcome_tx.send(AsyncOutcome {
                    entity: request.entity,
                    start: request.start,
                    goal: request.goal,
                    waypoints: waypoints.clone(),
                    result,
                });
                // The worker delivers the result; the callback's only
                // legal actions are writing this entity's slot and
                // enqueueing tick-thread work.
                if let Some(callback) = request.callback.take() {
                    callback(request.entity, &waypoints);
                }
            }
        }));

        if !submitted {
            debug!("async submit bounced, batch will re-run synchronously next tick");
        }
    }

    fn drain_async_outcomes(&mut self) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            let success = outcome.result == PathResult::Success;
            if success {
                self.cache
                    .cache_path(outcome.start, outcome.goal, &outcome.waypoints, self.now);
                self.stats.completed += 1;
            } else {
                self.cache.cache_negative(outcome.start, outcome.goal, self.now);
                if outcome.result == PathResult::Timeout {
                    self.stats.timeouts += 1;
                }
            }
            self.stats.processed += 1;
            self.store_result(outcome.entity, outcome.waypoints, success);
        }
    }

    fn finish_request(&mut self, request: &mut QueuedRequest, waypoints: &[Vec2], result: PathResult) {
        let success = result == PathResult::Success;
        if success {
            self.cache
                .cache_path(request.start, request.goal, waypoints, self.now);
            self.stats.completed += 1;
        } else {
            // Failures are remembered so the entity does not hammer an
            // unreachable goal every tick.
            self.cache.cache_negative(request.start, request.goal, self.now);
            if result == PathResult::Timeout {
                self.stats.timeouts += 1;
            }
        }
        self.stats.processed += 1;

        let delivered: &[Vec2] = if success { waypoints } else { &[] };
        self.store_result(request.entity, delivered.to_vec(), success);
        if let Some(callback) = request.callback.take() {
            callback(request.entity, delivered);
        }
    }

    fn store_result(&mut self, entity: EntityId, waypoints: Vec<Vec2>, valid: bool) {
        self.results.insert(
            entity,
            StoredResult {
                waypoints,
                compute_time: self.now,
                valid,
            },
        );
    }

    fn expire_results(&mut self) {
        let now = self.now;
        self.results
            .retain(|_, r| (now - r.compute_time) <= PATH_RESULT_TTL_SECS);
    }

    /// Drains the queue (every callback fires with an empty path), clears
    /// results and refuses further work.
    pub fn shutdown(&mut self) {
        if self.shutdown {
            return;
        }
        self.shutdown = true;
        debug!(queued = self.queue.len(), "pathfinding scheduler shutting down");
        while let Some(mut request) = self.queue.pop() {
            if let Some(callback) = request.callback.take() {
                callback(request.entity, &[]);
            }
        }
        self.pending_per_entity.clear();
        self.results.clear();
        self.cache.clear();
    }
}

/// Interleaves the bits of the quantized start position; sorting by this
/// key keeps spatially adjacent searches adjacent in the batch.
fn morton_key(position: Vec2) -> u64 {
    let qx = ((position.x / 64.0) as i64).wrapping_add(1 << 31) as u64 & 0xFFFF_FFFF;
    let qy = ((position.y / 64.0) as i64).wrapping_add(1 << 31) as u64 & 0xFFFF_FFFF;
    part1by1(qx) | (part1by1(qy) << 1)
}

fn part1by1(mut v: u64) -> u64 {
    v &= 0xFFFF_FFFF;
    v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    v = (v | (v << 1)) & 0x5555_5555_5555_5555;
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberwake_shared::ObstacleChange;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Mutex;

    fn open_grid() -> Arc<PathfindingGrid> {
        Arc::new(PathfindingGrid::new(64, 64, 32.0, Vec2::ZERO))
    }

    fn no_congestion(_: Vec2, _: f32) -> usize {
        0
    }

    fn collect_callback(sink: &Arc<Mutex<Vec<(EntityId, Vec<Vec2>)>>>) -> PathCallback {
        let sink = Arc::clone(sink);
        Box::new(move |entity, waypoints| {
            sink.lock().unwrap().push((entity, waypoints.to_vec()));
        })
    }

    #[test]
    fn test_request_runs_in_batch_and_caches() {
        let grid = open_grid();
        let mut scheduler = PathfindingScheduler::default();
        let sink = Arc::new(Mutex::new(Vec::new()));

        scheduler.request_path(
            1,
            Vec2::new(16.0, 16.0),
            Vec2::new(1000.0, 1000.0),
            PathPriority::Medium,
            collect_callback(&sink),
        );
        assert_eq!(scheduler.queue_size(), 1);

        scheduler.update(0.016, Vec2::ZERO, &grid, no_congestion, None);

        let delivered = sink.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(!delivered[0].1.is_empty());
        assert!(scheduler.has_path(1));
        assert_eq!(scheduler.cache().stats().total_paths, 1);
        assert_eq!(scheduler.stats().completed, 1);
    }

    #[test]
    fn test_cache_hit_answers_synchronously() {
        let grid = open_grid();
        let mut scheduler = PathfindingScheduler::default();
        let sink = Arc::new(Mutex::new(Vec::new()));

        scheduler.request_path(
            1,
            Vec2::new(16.0, 16.0),
            Vec2::new(1000.0, 1000.0),
            PathPriority::Medium,
            collect_callback(&sink),
        );
        scheduler.update(0.016, Vec2::ZERO, &grid, no_congestion, None);

        // A nearby request from another entity is served from the cache
        // without queueing.
        scheduler.request_path(
            2,
            Vec2::new(20.0, 20.0),
            Vec2::new(1010.0, 995.0),
            PathPriority::Medium,
            collect_callback(&sink),
        );
        assert_eq!(scheduler.queue_size(), 0);
        assert_eq!(scheduler.stats().from_cache, 1);

        let delivered = sink.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        let cached = &delivered[1].1;
        assert_eq!(cached.first().copied(), Some(Vec2::new(20.0, 20.0)));
        assert_eq!(cached.last().copied(), Some(Vec2::new(1010.0, 995.0)));
    }

    #[test]
    fn test_per_entity_throttle() {
        let mut scheduler = PathfindingScheduler::default();
        let sink = Arc::new(Mutex::new(Vec::new()));

        scheduler.request_path(
            7,
            Vec2::new(16.0, 16.0),
            Vec2::new(500.0, 500.0),
            PathPriority::Medium,
            collect_callback(&sink),
        );
        scheduler.request_path(
            7,
            Vec2::new(16.0, 16.0),
            Vec2::new(800.0, 800.0),
            PathPriority::Medium,
            collect_callback(&sink),
        );

        assert_eq!(scheduler.queue_size(), 1);
        // The throttled request was answered immediately with nothing.
        let delivered = sink.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].1.is_empty());
        assert_eq!(scheduler.stats().rejected, 1);
    }

    #[test]
    fn test_queue_cap_rejects_with_empty_path() {
        let mut scheduler = PathfindingScheduler::new(2, 8, 1000);
        let rejected = Arc::new(AtomicUsize::new(0));

        for entity in 0..3u64 {
            let rejected = Arc::clone(&rejected);
            scheduler.request_path(
                entity,
                // Spread entities out so no cache or throttle interferes.
                Vec2::new(entity as f32 * 4000.0, 0.0),
                Vec2::new(entity as f32 * 4000.0, 900.0),
                PathPriority::Medium,
                Box::new(move |_, waypoints| {
                    if waypoints.is_empty() {
                        rejected.fetch_add(1, AtomicOrdering::SeqCst);
                    }
                }),
            );
        }
        assert_eq!(scheduler.queue_size(), 2);
        assert_eq!(rejected.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_failed_search_is_negative_cached() {
        let mut grid = PathfindingGrid::new(16, 16, 32.0, Vec2::ZERO);
        // Goal boxed in.
        for x in 7..=9 {
            for y in 7..=9 {
                if x != 8 || y != 8 {
                    grid.set_blocked(x, y, true);
                }
            }
        }
        let grid = Arc::new(grid);
        let mut scheduler = PathfindingScheduler::default();
        let sink = Arc::new(Mutex::new(Vec::new()));

        let start = grid.cell_center(1, 1);
        let goal = grid.cell_center(8, 8);
        scheduler.request_path(3, start, goal, PathPriority::Medium, collect_callback(&sink));
        scheduler.update(0.016, Vec2::ZERO, &grid, no_congestion, None);

        assert!(sink.lock().unwrap()[0].1.is_empty());
        assert!(scheduler.cache().has_negative_cached(start, goal, 0.016));

        // The retry is suppressed by the negative cache, not re-queued.
        scheduler.request_path(4, start, goal, PathPriority::Medium, collect_callback(&sink));
        assert_eq!(scheduler.queue_size(), 0);
        assert!(sink.lock().unwrap()[1].1.is_empty());
    }

    #[test]
    fn test_priority_order_and_distance_adjustment() {
        let mut scheduler = PathfindingScheduler::new(500, 1, 1000);
        let order = Arc::new(Mutex::new(Vec::new()));
        let grid = open_grid();

        // Low priority but close to the reference point: bumped to High.
        // Far critical stays critical and still wins.
        let mk = |order: &Arc<Mutex<Vec<u64>>>| {
            let order = Arc::clone(order);
            Box::new(move |entity: EntityId, _waypoints: &[Vec2]| {
                order.lock().unwrap().push(entity);
            }) as PathCallback
        };
        scheduler.request_path(1, Vec2::new(100.0, 0.0), Vec2::new(900.0, 900.0), PathPriority::Low, mk(&order));
        scheduler.request_path(2, Vec2::new(1000.0, 0.0), Vec2::new(900.0, 900.0), PathPriority::Medium, mk(&order));

        // Batch size 1: highest priority first. Entity 1 was bumped to
        // High (distance < 800 from origin reference), beating Medium.
        scheduler.update(0.016, Vec2::ZERO, &grid, no_congestion, None);
        assert_eq!(*order.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_obstacle_event_invalidates_cache() {
        let grid = open_grid();
        let mut scheduler = PathfindingScheduler::default();
        let sink = Arc::new(Mutex::new(Vec::new()));

        scheduler.request_path(
            1,
            Vec2::new(16.0, 16.0),
            Vec2::new(400.0, 400.0),
            PathPriority::Medium,
            collect_callback(&sink),
        );
        scheduler.update(0.016, Vec2::ZERO, &grid, no_congestion, None);
        assert_eq!(scheduler.cache().stats().total_paths, 1);

        scheduler.handle_event(&SimEvent::ObstacleChanged {
            position: Vec2::new(200.0, 200.0),
            radius: 48.0,
            change: ObstacleChange::Added,
            description: String::new(),
        });
        assert_eq!(scheduler.cache().stats().total_paths, 0);
    }

    #[test]
    fn test_async_dispatch_delivers_results() {
        use crate::pool::ThreadPool;

        let grid = open_grid();
        // Async threshold of 1: everything goes to the pool.
        let mut scheduler = PathfindingScheduler::new(500, 8, 1);
        let pool: Arc<dyn WorkerPool> = Arc::new(ThreadPool::new(1, 64));
        let sink = Arc::new(Mutex::new(Vec::new()));

        scheduler.request_path(
            9,
            Vec2::new(16.0, 16.0),
            Vec2::new(1500.0, 1500.0),
            PathPriority::Medium,
            collect_callback(&sink),
        );
        scheduler.update(0.016, Vec2::ZERO, &grid, no_congestion, Some(&pool));

        // Wait for the worker, then drain outcomes on the next tick.
        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.lock().unwrap().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        scheduler.update(0.016, Vec2::ZERO, &grid, no_congestion, Some(&pool));

        let delivered = sink.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(!delivered[0].1.is_empty());
        assert!(scheduler.has_path(9));
        assert_eq!(scheduler.cache().stats().total_paths, 1);
    }

    #[test]
    fn test_shutdown_drains_with_empty_paths() {
        let mut scheduler = PathfindingScheduler::default();
        let sink = Arc::new(Mutex::new(Vec::new()));
        scheduler.request_path(
            1,
            Vec2::new(16.0, 16.0),
            Vec2::new(900.0, 900.0),
            PathPriority::Medium,
            collect_callback(&sink),
        );
        scheduler.shutdown();

        let delivered = sink.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].1.is_empty());

        drop(delivered);
        // Post-shutdown requests are rejected, still with a callback.
        scheduler.request_path(
            2,
            Vec2::ZERO,
            Vec2::new(10.0, 10.0),
            PathPriority::Medium,
            collect_callback(&sink),
        );
        assert!(sink.lock().unwrap()[1].1.is_empty());
    }

    #[test]
    fn test_morton_key_orders_neighbors_near() {
        let near_a = morton_key(Vec2::new(0.0, 0.0));
        let near_b = morton_key(Vec2::new(64.0, 0.0));
        let far = morton_key(Vec2::new(100_000.0, 100_000.0));
        assert_ne!(near_a, near_b);
        assert!(near_b.abs_diff(near_a) < far.abs_diff(near_a));
    }
}
