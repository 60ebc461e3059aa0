//! # Path Cache
//!
//! LRU + spatial-tolerance store of computed paths. A request whose
//! endpoints land within tolerance of a cached pair reuses the cached
//! waypoints with its exact endpoints patched in, skipping A* entirely.
//!
//! Failures are cached too: a short-lived negative entry suppresses
//! immediate retries of a search that just failed.
//!
//! Eviction has four triggers: size (LRU), age (old and rarely used),
//! congestion (paths through crowded areas near the player) and obstacle
//! changes (paths whose envelope contains a changed static body).

use std::collections::{HashMap, VecDeque};

use emberwake_shared::constants::{
    PATH_CACHE_MAX_AGE_SECS, PATH_CACHE_MAX_PATHS, PATH_CACHE_MIN_USE_COUNT,
    PATH_CACHE_QUANTIZE_SIZE, PATH_CACHE_TOLERANCE, PATH_NEGATIVE_TTL_SECS,
};
use emberwake_shared::{Aabb, Vec2};
use tracing::trace;

/// Cached path entry with reuse metadata.
#[derive(Clone, Debug)]
pub struct CachedPath {
    /// Start the path was computed for
    pub start: Vec2,
    /// Goal the path was computed for
    pub goal: Vec2,
    /// Computed waypoints; empty for negative entries
    pub waypoints: Vec<Vec2>,
    /// Simulation time the entry was created
    pub creation_time: f32,
    /// Simulation time of the last hit
    pub last_used_time: f32,
    /// Number of hits
    pub use_count: u32,
    /// False for negative (no-path) entries
    pub valid: bool,
}

/// Cache effectiveness counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathCacheStats {
    /// Entries currently held
    pub total_paths: usize,
    /// Lookup attempts
    pub queries: u64,
    /// Lookup hits
    pub hits: u64,
    /// Lookup misses
    pub misses: u64,
    /// Entries dropped by LRU/age eviction
    pub evicted: u64,
    /// Entries dropped by congestion eviction
    pub congestion_evictions: u64,
}

impl PathCacheStats {
    /// Hit rate over all queries, 0.0 when none were made.
    #[must_use]
    pub fn hit_rate(&self) -> f32 {
        if self.queries == 0 {
            0.0
        } else {
            self.hits as f32 / self.queries as f32
        }
    }
}

/// FNV-1a mix of the four quantized endpoint coordinates.
///
/// Quantization matches the spatial tolerance; a finer grid would turn
/// tolerant matches into misses.
fn path_key(start: Vec2, goal: Vec2) -> u64 {
    let q = |v: f32| (v / PATH_CACHE_QUANTIZE_SIZE + 0.5).floor() as i64 as u64;

    const FNV_OFFSET: u64 = 14_695_981_039_346_656_037;
    const FNV_PRIME: u64 = 1_099_511_628_211;
    let mut hash = FNV_OFFSET;
    for part in [q(start.x), q(start.y), q(goal.x), q(goal.y)] {
        hash ^= part;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// LRU + spatial-tolerance path store.
pub struct PathCache {
    paths: HashMap<u64, CachedPath>,
    // Insertion order only; hits do not reorder (usage lives in use_count
    // and last_used_time, and re-pushing on every hit would grow without
    // bound).
    lru_queue: VecDeque<u64>,
    max_paths: usize,
    tolerance: f32,
    negative_ttl: f32,
    stats: PathCacheStats,
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(PATH_CACHE_MAX_PATHS, PATH_CACHE_TOLERANCE, PATH_NEGATIVE_TTL_SECS)
    }
}

impl PathCache {
    /// Creates a cache with explicit limits.
    #[must_use]
    pub fn new(max_paths: usize, tolerance: f32, negative_ttl: f32) -> Self {
        Self {
            paths: HashMap::with_capacity(max_paths.min(1024)),
            lru_queue: VecDeque::with_capacity(max_paths.min(1024)),
            max_paths,
            tolerance,
            negative_ttl,
            stats: PathCacheStats::default(),
        }
    }

    /// Entries currently held (positive and negative).
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// True when the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Counters snapshot.
    #[must_use]
    pub fn stats(&self) -> PathCacheStats {
        let mut stats = self.stats;
        stats.total_paths = self.paths.len();
        stats
    }

    /// Looks for a cached path whose endpoints lie within tolerance of the
    /// request. On a hit the first and last waypoints are replaced with
    /// the exact requested endpoints.
    pub fn find_similar(&mut self, start: Vec2, goal: Vec2, now: f32) -> Option<Vec<Vec2>> {
        self.stats.queries += 1;

        // Fast path: the request quantizes onto an existing key.
        let key = path_key(start, goal);
        let hit_key = if self.matches(key, start, goal) {
            Some(key)
        } else {
            // Tolerant fallback: endpoints near a cell boundary can land in
            // the neighboring bucket, so scan for a similar entry.
            self.paths
                .iter()
                .find(|(_, entry)| {
                    entry.valid
                        && entry.start.distance(start) <= self.tolerance
                        && entry.goal.distance(goal) <= self.tolerance
                })
                .map(|(&k, _)| k)
        };

        let Some(key) = hit_key else {
            self.stats.misses += 1;
            return None;
        };

        let entry = self.paths.get_mut(&key)?;
        entry.use_count += 1;
        entry.last_used_time = now;
        self.stats.hits += 1;

        let mut waypoints = entry.waypoints.clone();
        match waypoints.as_mut_slice() {
            [] => {}
            [only] => *only = start,
            [first, .., last] => {
                *first = start;
                *last = goal;
            }
        }
        Some(waypoints)
    }

    fn matches(&self, key: u64, start: Vec2, goal: Vec2) -> bool {
        self.paths.get(&key).is_some_and(|entry| {
            entry.valid
                && entry.start.distance(start) <= self.tolerance
                && entry.goal.distance(goal) <= self.tolerance
        })
    }

    /// True when a recent failed search covers this request; callers skip
    /// the expensive search and treat it as no-path-found.
    #[must_use]
    pub fn has_negative_cached(&self, start: Vec2, goal: Vec2, now: f32) -> bool {
        self.paths.values().any(|entry| {
            !entry.valid
                && (now - entry.creation_time) <= self.negative_ttl
                && entry.start.distance(start) <= self.tolerance
                && entry.goal.distance(goal) <= self.tolerance
        })
    }

    /// Caches a successful path. Empty paths are not cached.
    pub fn cache_path(&mut self, start: Vec2, goal: Vec2, waypoints: &[Vec2], now: f32) {
        if waypoints.is_empty() {
            return;
        }
        if self.paths.len() >= self.max_paths {
            self.evict_lru();
        }
        let key = path_key(start, goal);
        self.paths.insert(
            key,
            CachedPath {
                start,
                goal,
                waypoints: waypoints.to_vec(),
                creation_time: now,
                last_used_time: now,
                use_count: 1,
                valid: true,
            },
        );
        self.lru_queue.push_back(key);
    }

    /// Caches a failed search so retries are suppressed for the negative
    /// TTL.
    pub fn cache_negative(&mut self, start: Vec2, goal: Vec2, now: f32) {
        if self.paths.len() >= self.max_paths {
            self.evict_lru();
        }
        let key = path_key(start, goal);
        self.paths.insert(
            key,
            CachedPath {
                start,
                goal,
                waypoints: Vec::new(),
                creation_time: now,
                last_used_time: now,
                use_count: 0,
                valid: false,
            },
        );
        self.lru_queue.push_back(key);
    }

    fn evict_lru(&mut self) {
        while self.paths.len() >= self.max_paths {
            let Some(oldest) = self.lru_queue.pop_front() else {
                return;
            };
            if self.paths.remove(&oldest).is_some() {
                self.stats.evicted += 1;
            }
        }
    }

    /// Drops paths through crowded areas near `center`.
    ///
    /// `congestion_at(position, radius)` reports how many dynamic bodies
    /// sit near a position - injected so the cache stays collision-free.
    /// Up to eight waypoints per path are sampled; waypoints beyond twice
    /// the congestion radius are skipped.
    pub fn evict_paths_in_crowded_areas(
        &mut self,
        center: Vec2,
        congestion_radius: f32,
        max_congestion: usize,
        congestion_at: impl Fn(Vec2, f32) -> usize,
    ) {
        let doomed: Vec<u64> = self
            .paths
            .iter()
            .filter(|(_, entry)| {
                entry.valid
                    && path_intersects_congestion(
                        &entry.waypoints,
                        center,
                        congestion_radius,
                        max_congestion,
                        &congestion_at,
                    )
            })
            .map(|(&k, _)| k)
            .collect();

        for key in doomed {
            self.paths.remove(&key);
            self.stats.congestion_evictions += 1;
        }
    }

    /// Age-based cleanup: drops invalid entries past the negative TTL and
    /// old paths that never earned their keep.
    pub fn cleanup(&mut self, now: f32) {
        self.cleanup_with(now, PATH_CACHE_MAX_AGE_SECS, PATH_CACHE_MIN_USE_COUNT);
    }

    /// [`Self::cleanup`] with explicit limits.
    pub fn cleanup_with(&mut self, now: f32, max_age: f32, min_use_count: u32) {
        let negative_ttl = self.negative_ttl;
        let before = self.paths.len();
        self.paths.retain(|_, entry| {
            if !entry.valid {
                return (now - entry.creation_time) <= negative_ttl;
            }
            (now - entry.creation_time) <= max_age || entry.use_count >= min_use_count
        });
        self.stats.evicted += (before - self.paths.len()) as u64;
    }

    /// Obstacle invalidation: evicts every path whose waypoint envelope,
    /// inflated by `radius`, contains `position`.
    pub fn on_obstacle_changed(&mut self, position: Vec2, radius: f32) {
        let before = self.paths.len();
        self.paths.retain(|_, entry| {
            if !entry.valid {
                return true;
            }
            !envelope(&entry.waypoints, radius).contains(position)
        });
        let removed = before - self.paths.len();
        if removed > 0 {
            trace!(removed, "cached paths invalidated by obstacle change");
            self.stats.evicted += removed as u64;
        }
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&mut self) {
        self.paths.clear();
        self.lru_queue.clear();
        self.stats = PathCacheStats::default();
    }
}

/// Axis-aligned envelope of a waypoint list, inflated by `margin`.
fn envelope(waypoints: &[Vec2], margin: f32) -> Aabb {
    let mut min = Vec2::new(f32::INFINITY, f32::INFINITY);
    let mut max = Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for w in waypoints {
        min.x = min.x.min(w.x);
        min.y = min.y.min(w.y);
        max.x = max.x.max(w.x);
        max.y = max.y.max(w.y);
    }
    let center = (min + max) * 0.5;
    let half = (max - min) * 0.5 + Vec2::new(margin, margin);
    Aabb::from_center(center, half)
}

fn path_intersects_congestion(
    waypoints: &[Vec2],
    center: Vec2,
    congestion_radius: f32,
    max_congestion: usize,
    congestion_at: &impl Fn(Vec2, f32) -> usize,
) -> bool {
    if waypoints.is_empty() {
        return false;
    }
    let check_points = waypoints.len().min(8);
    let step = (waypoints.len() / check_points).max(1);
    for waypoint in waypoints.iter().step_by(step) {
        if waypoint.distance(center) > congestion_radius * 2.0 {
            continue;
        }
        if congestion_at(*waypoint, 64.0) >= max_congestion {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> PathCache {
        PathCache::default()
    }

    fn diagonal() -> Vec<Vec2> {
        vec![Vec2::new(0.0, 0.0), Vec2::new(50.0, 50.0), Vec2::new(100.0, 100.0)]
    }

    #[test]
    fn test_hit_adjusts_endpoints() {
        let mut c = cache();
        c.cache_path(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), &diagonal(), 0.0);

        let hit = c
            .find_similar(Vec2::new(10.0, 10.0), Vec2::new(105.0, 95.0), 1.0)
            .unwrap();
        assert_eq!(
            hit,
            vec![Vec2::new(10.0, 10.0), Vec2::new(50.0, 50.0), Vec2::new(105.0, 95.0)]
        );

        let stats = c.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.queries, 1);
    }

    #[test]
    fn test_miss_beyond_tolerance() {
        let mut c = cache();
        c.cache_path(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), &diagonal(), 0.0);

        assert!(c
            .find_similar(Vec2::new(200.0, 0.0), Vec2::new(100.0, 100.0), 1.0)
            .is_none());
        assert_eq!(c.stats().misses, 1);
    }

    #[test]
    fn test_use_count_and_last_used_update() {
        let mut c = cache();
        c.cache_path(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), &diagonal(), 0.0);
        c.find_similar(Vec2::new(1.0, 1.0), Vec2::new(99.0, 99.0), 5.0).unwrap();

        let key = path_key(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0));
        let entry = c.paths.get(&key).unwrap();
        assert_eq!(entry.use_count, 2);
        assert_eq!(entry.last_used_time, 5.0);
    }

    #[test]
    fn test_lru_eviction_at_cap() {
        let mut c = PathCache::new(4, PATH_CACHE_TOLERANCE, PATH_NEGATIVE_TTL_SECS);
        for i in 0..5 {
            let start = Vec2::new(i as f32 * 1000.0, 0.0);
            let goal = Vec2::new(i as f32 * 1000.0, 900.0);
            c.cache_path(start, goal, &[start, goal], 0.0);
        }
        assert_eq!(c.len(), 4);
        // The first inserted path is gone.
        assert!(c.find_similar(Vec2::new(0.0, 0.0), Vec2::new(0.0, 900.0), 1.0).is_none());
        assert_eq!(c.stats().evicted, 1);
    }

    #[test]
    fn test_negative_cache_expires() {
        let mut c = cache();
        c.cache_negative(Vec2::new(0.0, 0.0), Vec2::new(500.0, 0.0), 10.0);

        assert!(c.has_negative_cached(Vec2::new(0.0, 0.0), Vec2::new(500.0, 0.0), 10.5));
        // Negative hits never return as positive paths.
        assert!(c.find_similar(Vec2::new(0.0, 0.0), Vec2::new(500.0, 0.0), 10.5).is_none());
        // Past the TTL the suppression lapses.
        assert!(!c.has_negative_cached(Vec2::new(0.0, 0.0), Vec2::new(500.0, 0.0), 12.0));

        c.cleanup(12.0);
        assert!(c.is_empty());
    }

    #[test]
    fn test_age_cleanup_spares_popular_paths() {
        let mut c = cache();
        c.cache_path(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), &diagonal(), 0.0);
        // Earn enough hits to survive aging.
        c.find_similar(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), 1.0).unwrap();

        c.cache_path(Vec2::new(2000.0, 0.0), Vec2::new(2100.0, 100.0), &diagonal(), 0.0);

        c.cleanup(100.0);
        assert_eq!(c.len(), 1);
        assert!(c.find_similar(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), 100.0).is_some());
    }

    #[test]
    fn test_congestion_eviction() {
        let mut c = cache();
        c.cache_path(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), &diagonal(), 0.0);
        c.cache_path(
            Vec2::new(5000.0, 5000.0),
            Vec2::new(5100.0, 5100.0),
            &[Vec2::new(5000.0, 5000.0), Vec2::new(5100.0, 5100.0)],
            0.0,
        );

        // Everything near the origin is crowded.
        c.evict_paths_in_crowded_areas(Vec2::new(50.0, 50.0), 400.0, 8, |p, _| {
            if p.distance(Vec2::new(50.0, 50.0)) < 500.0 {
                20
            } else {
                0
            }
        });

        assert_eq!(c.len(), 1);
        assert_eq!(c.stats().congestion_evictions, 1);
        assert!(c
            .find_similar(Vec2::new(5000.0, 5000.0), Vec2::new(5100.0, 5100.0), 1.0)
            .is_some());
    }

    #[test]
    fn test_obstacle_invalidation() {
        let mut c = cache();
        let through = vec![Vec2::new(100.0, 200.0), Vec2::new(200.0, 200.0), Vec2::new(300.0, 200.0)];
        c.cache_path(through[0], through[2], &through, 0.0);
        c.cache_path(
            Vec2::new(900.0, 900.0),
            Vec2::new(990.0, 990.0),
            &[Vec2::new(900.0, 900.0), Vec2::new(990.0, 990.0)],
            0.0,
        );

        c.on_obstacle_changed(Vec2::new(200.0, 200.0), 48.0);

        assert!(c.find_similar(through[0], through[2], 1.0).is_none());
        assert!(c
            .find_similar(Vec2::new(900.0, 900.0), Vec2::new(990.0, 990.0), 1.0)
            .is_some());
    }

    #[test]
    fn test_empty_path_not_cached() {
        let mut c = cache();
        c.cache_path(Vec2::ZERO, Vec2::new(10.0, 10.0), &[], 0.0);
        assert!(c.is_empty());
    }
}
