//! # EMBERWAKE Collision Engine
//!
//! Detects and resolves overlaps among enabled bodies at interactive
//! rates, with tens of thousands of bodies in flight.
//!
//! ## Pipeline per tick
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ 1. INTEGRATE   kinematic/dynamic centers advance by velocity·dt  │
//! │ 2. BROADPHASE  spatial-hash candidate pairs (a.id < b.id)        │
//! │ 3. NARROWPHASE strict AABB overlap -> MTV contacts               │
//! │ 4. RESOLVE     deterministic (a,b) order, positional correction  │
//! │ 5. TRIGGERS    Enter/Exit state machine, cooldown filtered       │
//! │ 6. WRITE-BACK  resolved centers -> entity store                  │
//! │ 7. DISPATCH    queued events published after resolution          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two independent hashes index static and dynamic bodies; static changes
//! additionally emit obstacle-change events so pathfinding can invalidate
//! cached paths.

pub mod body;
pub mod engine;
pub mod spatial_hash;

pub use body::{layers, BodyKind, CollisionBody, TriggerTag};
pub use engine::{CollisionEngine, PerfStats, TileSource};
pub use spatial_hash::SpatialHash;
