//! # EMBERWAKE Shared Types
//!
//! Common vocabulary for every simulation unit:
//! - Handles (entity + resource) with generation-based staleness detection
//! - 2D math (`Vec2`, `Aabb`) as `bytemuck` Pod types
//! - Resource templates (flat records, no inheritance tree)
//! - The inter-unit event vocabulary and bounded event bus
//! - The little-endian binary save codec
//!
//! ## Architecture Rules
//!
//! 1. **No simulation state** - this crate holds types, not systems
//! 2. **Everything cheap to copy** - handles and math types are Pod-sized
//! 3. **No panics across boundaries** - fallible codecs return typed errors

pub mod constants;
pub mod events;
pub mod handle;
pub mod math;
pub mod save;
pub mod template;

pub use events::{EventBus, EventReceiver, EventSender, ObstacleChange, SimEvent, TriggerPhase};
pub use handle::{
    EntityHandle, EntityId, EntityKind, Generation, ResourceHandle, SimulationTier,
    ENTITY_KIND_COUNT,
};
pub use math::{Aabb, Vec2};
pub use save::{SaveReader, SaveWriter, SerializeError};
pub use template::{CategoryData, ResourceCategory, ResourceTemplate, TemplateError, TemplateRegistry};
