//! # EMBERWAKE Pathfinding
//!
//! Weighted-grid A* plus the machinery that keeps it off the hot path:
//!
//! - [`PathfindingGrid`] - 8-connected A* with octile heuristic, terrain
//!   weights, an iteration cap and line-of-sight smoothing
//! - [`PathCache`] - LRU + spatial-tolerance reuse of computed paths,
//!   negative caching of failures, congestion and obstacle eviction
//! - [`PathfindingScheduler`] - priority queue of requests with
//!   per-entity throttling, batch extraction sorted for cache locality,
//!   and async dispatch to a worker pool under light pressure
//! - [`ThreadPool`] - the in-crate [`WorkerPool`] implementation
//!
//! Every failure mode ends the same way for the caller: the callback runs
//! with an empty waypoint list and the entity falls back to direct steering.

pub mod cache;
pub mod grid;
pub mod pool;
pub mod scheduler;

pub use cache::{CachedPath, PathCache, PathCacheStats};
pub use grid::{PathResult, PathfindingGrid};
pub use pool::{Task, ThreadPool, WorkerPool};
pub use scheduler::{PathCallback, PathPriority, PathfindingScheduler, SchedulerStats};
