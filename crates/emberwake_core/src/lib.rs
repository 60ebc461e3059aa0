//! # EMBERWAKE Entity Data Store
//!
//! Central data authority for all entity state (data-oriented design).
//!
//! The store is a pure DATA STORE, not a processor. It owns:
//! - All entity transform data (position, velocity, acceleration)
//! - Type-specific cold blocks (characters, items, harvestables, ...)
//! - The inventory pool
//! - Simulation tier tracking (Active / Background / Hibernated)
//!
//! Processing systems read from and write to the store:
//! - The collision engine resolves overlaps and writes positions back
//! - AI writes intended velocities
//! - The world registry indexes items and harvestables by position
//!
//! ## Architecture Rules
//!
//! 1. **Single source of truth** - positions live here and nowhere else
//! 2. **Hot/cold split** - per-tick fields pack into one 48-byte slot
//! 3. **Stale handles return `None`** - never a panic, never a ghost read

pub mod cold;
pub mod error;
pub mod hot;
pub mod inventory;
pub mod store;

pub use cold::{
    CharacterData, ColdStore, ContainerData, HarvestableData, InteractionRecord, ItemData,
    ProjectileData, INTERACTION_MEMORY_LEN,
};
pub use error::CoreError;
pub use hot::{HotData, Transform, FLAG_ALIVE, FLAG_COLLISION_ENABLED, FLAG_DIRTY, FLAG_PENDING_DESTROY};
pub use inventory::{Inventory, InventoryPool, InventorySlot};
pub use store::{DestroyRecord, EntityDataStore, EntityStats};
