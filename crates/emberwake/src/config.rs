//! # Simulation Config
//!
//! Tuning for the whole simulation core, loaded once at startup from a
//! TOML file. Every field has a default, so a partial (or missing) config
//! is always valid.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use emberwake_shared::constants::{COLLISION_CELL_SIZE, PATH_QUEUE_CAP};

/// Errors from config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("config read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or has wrong field types.
    #[error("config parse failed: {0}")]
    Parse(#[from] toml::de::Error),
}

/// All simulation tuning in one record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Hard entity cap
    pub entity_capacity: usize,
    /// Hard inventory cap
    pub inventory_capacity: usize,
    /// Collision hash cell size (32-64 px)
    pub collision_cell_size: f32,
    /// Pathfinding grid width in cells
    pub grid_width: u32,
    /// Pathfinding grid height in cells
    pub grid_height: u32,
    /// Pathfinding grid cell size in world units
    pub grid_cell_size: f32,
    /// Path request queue cap
    pub path_queue_cap: usize,
    /// Path requests processed per tick
    pub path_batch_size: usize,
    /// Queue depth that turns on async dispatch
    pub path_async_threshold: usize,
    /// Worker threads (0 = auto-detect)
    pub worker_threads: usize,
    /// Worker task queue capacity
    pub worker_queue_capacity: usize,
    /// Attach a worker pool at startup
    pub use_worker_pool: bool,
    /// Event channel capacity
    pub event_capacity: usize,
    /// Entities within this distance of the reference point run Active
    pub active_radius: f32,
    /// Entities within this distance run Background; beyond, Hibernated
    pub background_radius: f32,
    /// Seed for deterministic replay; `None` seeds from entropy
    pub replay_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 100_000,
            inventory_capacity: 20_000,
            collision_cell_size: COLLISION_CELL_SIZE,
            grid_width: 256,
            grid_height: 256,
            grid_cell_size: 32.0,
            path_queue_cap: PATH_QUEUE_CAP,
            path_batch_size: 32,
            path_async_threshold: 16,
            worker_threads: 0,
            worker_queue_capacity: 256,
            use_worker_pool: false,
            event_capacity: 4096,
            active_radius: 2048.0,
            background_radius: 6144.0,
            replay_seed: None,
        }
    }
}

impl SimulationConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// `Parse` on malformed TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a config file.
    ///
    /// # Errors
    ///
    /// `Io` on read failure, `Parse` on malformed TOML.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
