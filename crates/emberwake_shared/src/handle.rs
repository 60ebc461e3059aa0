//! # Handles
//!
//! Lightweight identifiers for entities and resource templates.
//!
//! Both handle kinds carry a generation counter. Slots are recycled; the
//! generation is bumped on reuse so that a copied handle from a previous
//! lifetime no longer matches. Every lookup that takes a handle validates
//! the generation and reports staleness as `None`, never as a panic.

use serde::{Deserialize, Serialize};

/// Unique entity identifier (never reused; 0 is invalid).
pub type EntityId = u64;

/// Handle generation counter. 0 is invalid; wraps 255 -> 1.
pub type Generation = u8;

/// Entity type for fast filtering without downcasts.
///
/// Kinds are organized by category:
/// - Characters: have health, AI behaviors, combat stats
/// - Interactables: world objects players interact with
/// - Combat: physics-driven, typically short-lived
/// - Environment: static or animated world objects
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// The player character
    Player = 0,
    /// AI-driven character
    Npc = 1,
    /// Item lying in the world, waiting for pickup
    DroppedItem = 2,
    /// Chests, barrels, corpse loot
    Container = 3,
    /// Trees, ore nodes, gathering spots
    Harvestable = 4,
    /// Physics-driven, short-lived combat object
    Projectile = 5,
    /// AoE spell zones, traps
    AreaEffect = 6,
    /// Decorations, animated objects
    Prop = 7,
    /// Invisible trigger zone
    Trigger = 8,
    /// Tiles, walls, terrain collision
    StaticObstacle = 9,
}

/// Number of entity kinds (array sizing).
pub const ENTITY_KIND_COUNT: usize = 10;

impl EntityKind {
    /// All kinds in discriminant order.
    pub const ALL: [Self; ENTITY_KIND_COUNT] = [
        Self::Player,
        Self::Npc,
        Self::DroppedItem,
        Self::Container,
        Self::Harvestable,
        Self::Projectile,
        Self::AreaEffect,
        Self::Prop,
        Self::Trigger,
        Self::StaticObstacle,
    ];

    /// Dense index for per-kind arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns true if this kind has health/combat stats.
    #[inline]
    #[must_use]
    pub const fn has_health(self) -> bool {
        matches!(self, Self::Player | Self::Npc)
    }

    /// Returns true if this kind can own an inventory.
    #[inline]
    #[must_use]
    pub const fn has_inventory(self) -> bool {
        matches!(self, Self::Player | Self::Npc | Self::Container)
    }

    /// Returns true if this kind participates in collision.
    #[inline]
    #[must_use]
    pub const fn has_physics(self) -> bool {
        !matches!(self, Self::Prop | Self::Trigger)
    }

    /// Returns true if this kind runs AI behaviors.
    #[inline]
    #[must_use]
    pub const fn has_ai(self) -> bool {
        matches!(self, Self::Npc)
    }

    /// Returns true if this kind should be rendered. Only triggers are invisible.
    #[inline]
    #[must_use]
    pub const fn is_renderable(self) -> bool {
        !matches!(self, Self::Trigger)
    }

    /// Returns true if this kind lives in the static (non-moving) pool and
    /// uses immediate rather than deferred destruction bookkeeping.
    #[inline]
    #[must_use]
    pub const fn uses_static_pool(self) -> bool {
        matches!(self, Self::DroppedItem | Self::Container | Self::Harvestable)
    }

    /// Debug name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "Player",
            Self::Npc => "Npc",
            Self::DroppedItem => "DroppedItem",
            Self::Container => "Container",
            Self::Harvestable => "Harvestable",
            Self::Projectile => "Projectile",
            Self::AreaEffect => "AreaEffect",
            Self::Prop => "Prop",
            Self::Trigger => "Trigger",
            Self::StaticObstacle => "StaticObstacle",
        }
    }
}

/// Simulation tier - how much processing an entity receives each tick.
///
/// Assignment is distance-based (from the camera/player reference point)
/// and performed by an external tier pass; the store only holds the field.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SimulationTier {
    /// Full update: AI, collision, render (near camera)
    #[default]
    Active = 0,
    /// Simplified: position integration only, no collision (off-screen)
    Background = 1,
    /// Minimal: data stored, no updates (far away)
    Hibernated = 2,
}

impl SimulationTier {
    /// Debug name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Background => "Background",
            Self::Hibernated => "Hibernated",
        }
    }
}

/// Stable external reference to an entity in the data store.
///
/// 16 bytes, cheap to copy and compare, safe to hold across ticks. A handle
/// whose slot has been recycled fails the generation check and every lookup
/// returns `None` for it.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle {
    /// Unique entity identifier (0 = invalid)
    pub id: EntityId,
    /// Entity type
    pub kind: EntityKind,
    /// Stale-reference detection counter (0 = invalid)
    pub generation: Generation,
    /// Alignment padding, always 0
    pub padding: u16,
}

impl EntityHandle {
    /// The invalid handle.
    pub const INVALID: Self = Self {
        id: 0,
        kind: EntityKind::Npc,
        generation: 0,
        padding: 0,
    };

    /// Creates a handle from its components.
    #[inline]
    #[must_use]
    pub const fn new(id: EntityId, kind: EntityKind, generation: Generation) -> Self {
        Self {
            id,
            kind,
            generation,
            padding: 0,
        }
    }

    /// A handle is valid when both id and generation are non-zero.
    ///
    /// Validity is a local property; the store may still report the handle
    /// stale if the slot has been recycled.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.id != 0 && self.generation != 0
    }

    /// Returns true for player handles.
    #[inline]
    #[must_use]
    pub const fn is_player(self) -> bool {
        matches!(self.kind, EntityKind::Player)
    }

    /// Returns true for NPC handles.
    #[inline]
    #[must_use]
    pub const fn is_npc(self) -> bool {
        matches!(self.kind, EntityKind::Npc)
    }
}

impl Default for EntityHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "{}:{}:{}", self.id, self.kind.as_str(), self.generation)
        } else {
            write!(f, "EntityHandle::INVALID")
        }
    }
}

/// Handle identifying an immutable resource template.
///
/// 6 bytes packed: 32-bit template id plus 16-bit generation, same
/// staleness pattern as [`EntityHandle`].
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle {
    /// Template id (0 = invalid)
    pub id: u32,
    /// Stale-reference detection counter (0 = invalid)
    pub generation: u16,
}

impl ResourceHandle {
    /// The invalid handle.
    pub const INVALID: Self = Self { id: 0, generation: 0 };

    /// Creates a handle from its components.
    #[inline]
    #[must_use]
    pub const fn new(id: u32, generation: u16) -> Self {
        Self { id, generation }
    }

    /// A handle is valid when both id and generation are non-zero.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.id != 0 && self.generation != 0
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.id;
        let generation = self.generation;
        if self.is_valid() {
            write!(f, "Resource({id}:{generation})")
        } else {
            write!(f, "ResourceHandle::INVALID")
        }
    }
}

// EntityHandle must stay at 16 bytes: it is embedded in hot arrays and the
// save format.
const _: () = assert!(std::mem::size_of::<EntityHandle>() == 16);
const _: () = assert!(std::mem::size_of::<ResourceHandle>() == 6);
