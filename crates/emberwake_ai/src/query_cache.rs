//! # Spatial Query Cache
//!
//! Frame-scoped cache of collision area-query results. Many nearby
//! entities ask for almost the same neighborhood each tick; quantizing
//! the query to an 8 px grid makes those requests share one entry.
//!
//! Invalidation is zero-cost: entries carry the frame number they were
//! stored in, and a lookup with a newer frame simply misses. No clearing
//! loop, no writes, no cache thrashing across threads.

use emberwake_shared::{constants::CROWD_QUANTIZE_SIZE, EntityId, Vec2};

/// Fixed entry count; the cache is a direct-mapped array, not a map.
pub const CACHE_SIZE: usize = 64;

struct CacheEntry {
    frame: u64,
    key: u64,
    results: Vec<EntityId>,
}

/// Direct-mapped, frame-scoped query cache.
///
/// Intended to live in a `thread_local!`; one instance per worker thread,
/// no locking anywhere.
pub struct SpatialQueryCache {
    entries: Vec<CacheEntry>,
}

impl Default for SpatialQueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialQueryCache {
    /// Creates a cache with every vector's capacity pre-reserved.
    #[must_use]
    pub fn new() -> Self {
        let entries = (0..CACHE_SIZE)
            .map(|_| CacheEntry {
                frame: 0,
                key: 0,
                // Typical query returns 10-30 entities.
                results: Vec::with_capacity(32),
            })
            .collect();
        Self { entries }
    }

    /// Quantized hash of a (center, radius) query.
    #[must_use]
    pub fn hash_query(center: Vec2, radius: f32) -> u64 {
        let qx = (center.x / CROWD_QUANTIZE_SIZE) as i32;
        let qy = (center.y / CROWD_QUANTIZE_SIZE) as i32;
        let qr = (radius / CROWD_QUANTIZE_SIZE) as i32;
        let mut hash = qx as u32 as u64;
        hash ^= (qy as u32 as u64) << 16;
        hash ^= (qr as u32 as u64) << 32;
        hash
    }

    /// Copies a cached result into `out` when the entry matches this
    /// query and frame. Returns `false` on a miss.
    pub fn lookup(&self, center: Vec2, radius: f32, frame: u64, out: &mut Vec<EntityId>) -> bool {
        let key = Self::hash_query(center, radius);
        let entry = &self.entries[(key % CACHE_SIZE as u64) as usize];
        // Frame comparison is the whole validity check; stale frames never
        // match.
        if entry.frame == frame && entry.key == key {
            out.clear();
            out.extend_from_slice(&entry.results);
            return true;
        }
        false
    }

    /// Stores a query result, overwriting whatever occupied the slot.
    pub fn store(&mut self, center: Vec2, radius: f32, frame: u64, results: &[EntityId]) {
        let key = Self::hash_query(center, radius);
        let entry = &mut self.entries[(key % CACHE_SIZE as u64) as usize];
        entry.frame = frame;
        entry.key = key;
        entry.results.clear();
        entry.results.extend_from_slice(results);
    }
}
