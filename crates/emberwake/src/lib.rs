//! # EMBERWAKE
//!
//! Core simulation of a 2D action-RPG engine, built to sustain 60 Hz with
//! tens of thousands of entities:
//!
//! - `emberwake_core` - the entity data store (positions, kinds, tiers,
//!   type-local data, inventories)
//! - `emberwake_collision` - spatial hashing, resolution, triggers
//! - `emberwake_pathfind` - weighted A*, path cache, request scheduler
//! - `emberwake_ai` - crowd-separation steering
//! - `emberwake_world` - per-world resource registries
//!
//! This crate is the seam: the [`Simulation`] tick pipeline wires the
//! units together in the one legal phase order, the
//! [`ControllerRegistry`] dispatches state-scoped helpers, and
//! [`SimulationConfig`] loads the tuning from TOML.

pub mod config;
pub mod controllers;
pub mod tick;

pub use config::{ConfigError, SimulationConfig};
pub use controllers::{Controller, ControllerRegistry, Updatable};
pub use tick::Simulation;

pub use emberwake_ai::{separation_from_neighbors, separation_velocity, SeparationParams};
pub use emberwake_collision::{BodyKind, CollisionEngine, TriggerTag};
pub use emberwake_core::{EntityDataStore, Inventory, InventoryPool};
pub use emberwake_pathfind::{PathPriority, PathfindingGrid, PathfindingScheduler, ThreadPool, WorkerPool};
pub use emberwake_shared::{
    Aabb, EntityHandle, EntityKind, EventBus, ResourceHandle, SimEvent, SimulationTier,
    TemplateRegistry, TriggerPhase, Vec2,
};
pub use emberwake_world::WorldResourceRegistry;
