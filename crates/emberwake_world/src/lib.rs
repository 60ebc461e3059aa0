//! # EMBERWAKE World Resource Registry
//!
//! Answers two questions the rest of the engine keeps asking:
//!
//! - "what dropped items / harvestables are near here?" - per-world
//!   small-grid spatial indices with O(1) insert and remove
//! - "how much of resource R exists in world W?" - aggregate queries over
//!   the registered inventories and harvestables
//!
//! The registry stores entity references only. Quantities, positions and
//! yields all live in the entity store; this crate just knows which
//! entities belong to which world.

pub mod registry;
pub mod spatial;

pub use registry::{WorldResourceRegistry, WorldResourceStats};
pub use spatial::SpatialIndex;
