//! # Collision Bodies
//!
//! A body is the collision-specific view of an entity: its AABB, motion
//! class, layer masks and trigger configuration. Positional truth lives in
//! the entity store; the body caches the AABB it was last indexed under.

use emberwake_shared::{Aabb, EntityHandle, EntityId, Vec2};

/// Motion class of a body.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BodyKind {
    /// Immovable; changes emit obstacle-change events
    Static,
    /// Driven by game logic; pushes dynamics, is never pushed
    Kinematic,
    /// Fully simulated; pushed by resolution
    #[default]
    Dynamic,
}

/// Bitmask collision layers (combine via bitwise OR).
pub mod layers {
    /// Default layer for untagged bodies
    pub const DEFAULT: u32 = 1 << 0;
    /// The player
    pub const PLAYER: u32 = 1 << 1;
    /// Hostile characters
    pub const ENEMY: u32 = 1 << 2;
    /// World geometry and props
    pub const ENVIRONMENT: u32 = 1 << 3;
    /// Projectiles
    pub const PROJECTILE: u32 = 1 << 4;
    /// Trigger volumes
    pub const TRIGGER: u32 = 1 << 5;
    /// Collides with everything
    pub const ALL: u32 = u32::MAX;
}

/// Tags for world trigger volumes. Extend as needed.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TriggerTag {
    /// Untagged
    #[default]
    None = 0,
    /// Door threshold
    Door,
    /// Save checkpoint
    Checkpoint,
    /// Water volume
    Water,
    /// Lava volume
    Lava,
    /// Teleporter
    Portal,
    /// Named-area entry
    AreaEnter,
    /// Named-area exit
    AreaExit,
    /// Movement-penalty rock field
    Rock,
    /// Movement-penalty tree cover
    Tree,
    /// Gameplay-defined
    Custom1,
    /// Gameplay-defined
    Custom2,
}

/// A collision participant referencing an entity.
#[derive(Clone, Debug)]
pub struct CollisionBody {
    /// Entity the body belongs to
    pub entity: EntityHandle,
    /// Bounds the body was last indexed under
    pub aabb: Aabb,
    /// Velocity read from the store at integration start
    pub velocity: Vec2,
    /// Center before the current tick's integration
    pub last_position: Vec2,
    /// Motion class
    pub kind: BodyKind,
    /// Layer bits this body occupies
    pub layer: u32,
    /// Layer bits this body collides with
    pub collides_with: u32,
    /// Disabled bodies are skipped entirely
    pub enabled: bool,
    /// Reports overlap via events instead of resolution
    pub is_trigger: bool,
    /// Trigger vocabulary tag
    pub trigger_tag: TriggerTag,
    /// Mass for dynamic/dynamic MTV splitting
    pub mass: f32,
    /// Tangential velocity damping on contact
    pub friction: f32,
    /// Normal velocity bounce on contact
    pub restitution: f32,
}

impl CollisionBody {
    /// Creates a body with default masks and material.
    #[must_use]
    pub fn new(entity: EntityHandle, aabb: Aabb, kind: BodyKind) -> Self {
        Self {
            entity,
            aabb,
            velocity: Vec2::ZERO,
            last_position: aabb.center,
            kind,
            layer: layers::DEFAULT,
            collides_with: layers::ALL,
            enabled: true,
            is_trigger: false,
            trigger_tag: TriggerTag::None,
            mass: 1.0,
            friction: 0.8,
            restitution: 0.0,
        }
    }

    /// Body id (the owning entity's id).
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.entity.id
    }

    /// Layer filter: both enabled and this body's mask accepts the other's
    /// layer.
    #[inline]
    #[must_use]
    pub fn should_collide_with(&self, other: &Self) -> bool {
        self.enabled && other.enabled && (self.collides_with & other.layer) != 0
    }

    /// Inverse mass; statics and kinematics are immovable (0).
    #[inline]
    #[must_use]
    pub fn inverse_mass(&self) -> f32 {
        match self.kind {
            BodyKind::Static | BodyKind::Kinematic => 0.0,
            BodyKind::Dynamic => {
                if self.mass > 0.0 {
                    1.0 / self.mass
                } else {
                    0.0
                }
            }
        }
    }

    /// True for dynamic or kinematic bodies.
    #[inline]
    #[must_use]
    pub fn is_moving_kind(&self) -> bool {
        !matches!(self.kind, BodyKind::Static)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberwake_shared::EntityKind;

    fn handle(id: u64) -> EntityHandle {
        EntityHandle::new(id, EntityKind::Npc, 1)
    }

    #[test]
    fn test_layer_filtering() {
        let mut a = CollisionBody::new(handle(1), Aabb::new(0.0, 0.0, 1.0, 1.0), BodyKind::Dynamic);
        let mut b = CollisionBody::new(handle(2), Aabb::new(0.0, 0.0, 1.0, 1.0), BodyKind::Dynamic);

        a.collides_with = layers::ENEMY;
        b.layer = layers::PLAYER;
        assert!(!a.should_collide_with(&b));

        b.layer = layers::ENEMY;
        assert!(a.should_collide_with(&b));

        b.enabled = false;
        assert!(!a.should_collide_with(&b));
    }

    #[test]
    fn test_inverse_mass() {
        let mut body = CollisionBody::new(handle(1), Aabb::new(0.0, 0.0, 1.0, 1.0), BodyKind::Dynamic);
        body.mass = 4.0;
        assert_eq!(body.inverse_mass(), 0.25);

        body.kind = BodyKind::Kinematic;
        assert_eq!(body.inverse_mass(), 0.0);
    }
}
