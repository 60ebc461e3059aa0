//! # EMBERWAKE Crowd Steering
//!
//! Local separation correction for AI movement: an entity's intended
//! velocity (usually following a path) is blended with repulsion from
//! nearby bodies so crowds spread out instead of stacking, without losing
//! the path direction.
//!
//! Neighborhood queries go through the collision engine; a thread-local
//! frame-scoped cache collapses the many near-identical queries that
//! clustered entities make in the same tick.

pub mod crowd;
pub mod query_cache;

pub use crowd::{separation_from_neighbors, separation_velocity, SeparationParams};
pub use query_cache::SpatialQueryCache;
