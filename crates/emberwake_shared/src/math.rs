//! Mathematical types shared between simulation units.
//!
//! These are the canonical representations used throughout the engine
//! and in the binary save format.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 2D Vector - position, velocity, direction
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
}

impl Vec2 {
    /// Creates a new Vec2
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Unit X vector
    pub const X: Self = Self::new(1.0, 0.0);

    /// Unit Y vector
    pub const Y: Self = Self::new(0.0, 1.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 2] {
        [self.x, self.y]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 2]) -> Self {
        Self::new(arr[0], arr[1])
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Distance squared (avoids sqrt)
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Returns a unit-length copy, or zero when the vector is degenerate
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len > f32::EPSILON {
            self * (1.0 / len)
        } else {
            Self::ZERO
        }
    }

    /// Counter-clockwise perpendicular
    #[must_use]
    pub const fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Clockwise perpendicular
    #[must_use]
    pub const fn perp_cw(self) -> Self {
        Self::new(self.y, -self.x)
    }

    /// Manhattan length (cheap broad reject before a sqrt)
    #[must_use]
    pub fn manhattan(self) -> f32 {
        self.x.abs() + self.y.abs()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// Axis-aligned bounding box stored as center + half extents.
///
/// Half extents keep resize and symmetric queries branch-free; edges are
/// derived. Overlap uses strict inequality: boxes that merely touch at an
/// edge do NOT intersect.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Aabb {
    /// World-space center
    pub center: Vec2,
    /// Half extents (w/2, h/2)
    pub half: Vec2,
}

impl Aabb {
    /// Creates a box from center and half extents
    #[must_use]
    pub const fn new(cx: f32, cy: f32, hw: f32, hh: f32) -> Self {
        Self {
            center: Vec2::new(cx, cy),
            half: Vec2::new(hw, hh),
        }
    }

    /// Creates a box from a center point and half extents
    #[must_use]
    pub const fn from_center(center: Vec2, half: Vec2) -> Self {
        Self { center, half }
    }

    /// Left edge
    #[must_use]
    pub fn left(&self) -> f32 {
        self.center.x - self.half.x
    }

    /// Right edge
    #[must_use]
    pub fn right(&self) -> f32 {
        self.center.x + self.half.x
    }

    /// Top edge (minimum y)
    #[must_use]
    pub fn top(&self) -> f32 {
        self.center.y - self.half.y
    }

    /// Bottom edge (maximum y)
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.center.y + self.half.y
    }

    /// Strict overlap test. Edge-touching boxes are NOT intersecting.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        (self.center.x - other.center.x).abs() < self.half.x + other.half.x
            && (self.center.y - other.center.y).abs() < self.half.y + other.half.y
    }

    /// Point containment (inclusive of edges)
    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        (p.x - self.center.x).abs() <= self.half.x && (p.y - self.center.y).abs() <= self.half.y
    }

    /// Closest point on or inside the box to `p`
    #[must_use]
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.left(), self.right()),
            p.y.clamp(self.top(), self.bottom()),
        )
    }

    /// Penetration vector pushing `self` out of `other`, if they overlap.
    ///
    /// Returns the minimum translation along the shallower axis, signed
    /// away from `other`.
    #[must_use]
    pub fn penetration(&self, other: &Self) -> Option<Vec2> {
        let dx = self.center.x - other.center.x;
        let px = self.half.x + other.half.x - dx.abs();
        if px <= 0.0 {
            return None;
        }
        let dy = self.center.y - other.center.y;
        let py = self.half.y + other.half.y - dy.abs();
        if py <= 0.0 {
            return None;
        }
        if px < py {
            Some(Vec2::new(px.copysign(dx), 0.0))
        } else {
            Some(Vec2::new(0.0, py.copysign(dy)))
        }
    }
}
