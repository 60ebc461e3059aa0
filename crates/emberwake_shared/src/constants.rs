//! # Simulation Constants
//!
//! Baseline tuning for the simulation core. Anything here can be
//! overridden through the TOML simulation config; these are the values the
//! engine falls back to.

// =============================================================================
// TICK CONFIGURATION
// =============================================================================

/// Fixed simulation rate (ticks per second).
pub const TICK_RATE: u32 = 60;

/// Fixed timestep in seconds.
pub const TICK_DT: f32 = 1.0 / TICK_RATE as f32;

// =============================================================================
// SPATIAL CELL SIZES
// =============================================================================
// The path-cache quantization MUST stay equal to the path similarity
// tolerance; a finer quantization silently turns cache hits into misses.

/// Collision static/dynamic hash cell size in pixels.
pub const COLLISION_CELL_SIZE: f32 = 64.0;

/// World-registry item/harvestable index cell size in pixels.
pub const WORLD_INDEX_CELL_SIZE: f32 = 64.0;

/// Crowd query-cache quantization bucket in pixels.
pub const CROWD_QUANTIZE_SIZE: f32 = 8.0;

/// Path cache key quantization in pixels.
pub const PATH_CACHE_QUANTIZE_SIZE: f32 = 64.0;

/// Path cache spatial similarity tolerance in pixels.
pub const PATH_CACHE_TOLERANCE: f32 = PATH_CACHE_QUANTIZE_SIZE;

// =============================================================================
// COLLISION TUNING
// =============================================================================

/// Bodies that moved less than this many pixels keep their cell
/// membership; only the stored AABB is refreshed.
pub const MOVEMENT_THRESHOLD: f32 = 2.0;

/// Safety margin added to obstacle-change notification radii.
pub const OBSTACLE_SAFETY_MARGIN: f32 = 16.0;

// =============================================================================
// PATHFINDING TUNING
// =============================================================================

/// Default A* iteration cap before a Timeout result.
pub const ASTAR_ITERATION_CAP: u32 = 8000;

/// Maximum successful paths held by the cache.
pub const PATH_CACHE_MAX_PATHS: usize = 1024;

/// Cached paths older than this (seconds) with low use count are purged.
pub const PATH_CACHE_MAX_AGE_SECS: f32 = 30.0;

/// Minimum use count that protects an old cached path from age eviction.
pub const PATH_CACHE_MIN_USE_COUNT: u32 = 2;

/// Negative-cache (no-path) suppression window in seconds.
pub const PATH_NEGATIVE_TTL_SECS: f32 = 1.0;

/// Pending path request queue cap.
pub const PATH_QUEUE_CAP: usize = 500;

/// Stored per-entity path results expire after this many seconds.
pub const PATH_RESULT_TTL_SECS: f32 = 10.0;

/// A repeat request within this window returns the stored result.
pub const PATH_RECENT_RESULT_SECS: f32 = 1.0;

/// Async pathfinding per-request deadline in seconds.
pub const PATH_ASYNC_DEADLINE_SECS: f32 = 3.0;

/// Worker-pool pressure ratio above which async dispatch falls back.
pub const POOL_PRESSURE_LIMIT: f32 = 0.8;

// =============================================================================
// CROWD TUNING
// =============================================================================

/// Minimum separation radius in pixels.
pub const CROWD_MIN_RADIUS: f32 = 24.0;

/// Hard cap on the crowd query radius in pixels.
pub const CROWD_MAX_RADIUS: f32 = 96.0;

/// Neighbor cap per separation evaluation.
pub const CROWD_MAX_NEIGHBORS: usize = 6;
