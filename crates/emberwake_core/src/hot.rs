//! # Hot Entity Data
//!
//! The fields every system touches every tick, packed into one 48-byte
//! slot so a batch pass walks a single contiguous array.

use emberwake_shared::{EntityKind, Generation, SimulationTier, Vec2};

/// Entity is live (slot occupied).
pub const FLAG_ALIVE: u8 = 0x01;
/// Position changed since the spatial indices last saw it.
pub const FLAG_DIRTY: u8 = 0x02;
/// Destruction requested; removed at the next commit.
pub const FLAG_PENDING_DESTROY: u8 = 0x04;
/// Entity has a collision body.
pub const FLAG_COLLISION_ENABLED: u8 = 0x08;

/// Transform data for entity movement (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    /// Current position
    pub position: Vec2,
    /// Previous tick's position (render interpolation)
    pub previous_position: Vec2,
    /// Current velocity
    pub velocity: Vec2,
    /// Current acceleration
    pub acceleration: Vec2,
}

/// Hot data accessed every tick (48 bytes, cache-line friendly).
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct HotData {
    /// Movement state
    pub transform: Transform,
    /// Collision half-width
    pub half_width: f32,
    /// Collision half-height
    pub half_height: f32,
    /// Entity type
    pub kind: EntityKind,
    /// Simulation quality bucket, written by the external tier pass
    pub tier: SimulationTier,
    /// ALIVE / DIRTY / PENDING_DESTROY / COLLISION_ENABLED bits
    pub flags: u8,
    /// Handle generation for this slot's current lifetime
    pub generation: Generation,
    /// Dense index into this kind's cold-data array
    pub type_local_index: u32,
}

impl HotData {
    /// An empty, dead slot.
    #[must_use]
    pub const fn dead() -> Self {
        Self {
            transform: Transform {
                position: Vec2::ZERO,
                previous_position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                acceleration: Vec2::ZERO,
            },
            half_width: 16.0,
            half_height: 16.0,
            kind: EntityKind::Npc,
            tier: SimulationTier::Active,
            flags: 0,
            generation: 0,
            type_local_index: 0,
        }
    }

    /// Entity is live.
    #[inline]
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.flags & FLAG_ALIVE != 0
    }

    /// Position changed since the indices last saw it.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.flags & FLAG_DIRTY != 0
    }

    /// Destruction has been requested.
    #[inline]
    #[must_use]
    pub const fn is_pending_destroy(&self) -> bool {
        self.flags & FLAG_PENDING_DESTROY != 0
    }

    /// Entity participates in collision.
    #[inline]
    #[must_use]
    pub const fn is_collision_enabled(&self) -> bool {
        self.flags & FLAG_COLLISION_ENABLED != 0
    }

    /// Sets or clears the dirty bit.
    #[inline]
    pub fn set_dirty(&mut self, dirty: bool) {
        if dirty {
            self.flags |= FLAG_DIRTY;
        } else {
            self.flags &= !FLAG_DIRTY;
        }
    }

    /// Marks the entity for deferred destruction.
    #[inline]
    pub fn mark_for_destruction(&mut self) {
        self.flags |= FLAG_PENDING_DESTROY;
    }
}

// The slot must stay at 48 bytes: batch passes are sized around it.
const _: () = assert!(std::mem::size_of::<HotData>() == 48);
const _: () = assert!(std::mem::size_of::<Transform>() == 32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut hot = HotData::dead();
        assert!(!hot.is_alive());
        hot.flags |= FLAG_ALIVE;
        assert!(hot.is_alive());

        hot.set_dirty(true);
        assert!(hot.is_dirty());
        hot.set_dirty(false);
        assert!(!hot.is_dirty());

        hot.mark_for_destruction();
        assert!(hot.is_pending_destroy());
        assert!(hot.is_alive());
    }
}
