//! # Core Error Types
//!
//! All recoverable failures of the entity data store.

use thiserror::Error;

/// Errors that can occur in the entity data store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Entity pool exhausted: free list empty and hard cap reached.
    #[error("entity pool out of capacity: {capacity} slots in use")]
    NoCapacity {
        /// Configured hard cap.
        capacity: usize,
    },

    /// Inventory pool exhausted.
    #[error("inventory pool out of capacity: {capacity} inventories in use")]
    NoInventoryCapacity {
        /// Configured hard cap.
        capacity: usize,
    },

    /// A quantity was negative, zero where positive is required, or above
    /// the per-slot safety limit.
    #[error("invalid quantity {0}")]
    InvalidQuantity(i64),

    /// Referenced inventory index is not allocated.
    #[error("inventory index {0} not allocated")]
    InventoryNotFound(u32),
}
