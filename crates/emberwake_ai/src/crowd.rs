//! # Crowd Separation
//!
//! Blends an entity's intended velocity with repulsion from neighbors.
//! Three response bands, nearest first:
//!
//! - overlap (< 0.5 units): emergency push in a random direction
//! - critical (< radius/2): quadratic repulsion, steer perpendicular
//! - normal (< radius): linear repulsion blended with forward motion
//!
//! The output is always renormalized to the entity's target speed, so
//! separation changes heading, never pace.

use std::cell::RefCell;

use emberwake_collision::CollisionEngine;
use emberwake_shared::constants::{CROWD_MAX_NEIGHBORS, CROWD_MAX_RADIUS, CROWD_MIN_RADIUS};
use emberwake_shared::{Aabb, EntityId, Vec2};
use rand::RngCore;
use tracing::trace;

use crate::query_cache::SpatialQueryCache;

/// Tuning inputs for one separation evaluation.
#[derive(Clone, Copy, Debug)]
pub struct SeparationParams {
    /// Target movement speed; the output keeps this magnitude
    pub speed: f32,
    /// Base separation radius (floored to 24 px)
    pub radius: f32,
    /// Blend strength scalar, typically 0.2-0.4
    pub strength: f32,
    /// Neighbor processing cap
    pub max_neighbors: usize,
}

impl Default for SeparationParams {
    fn default() -> Self {
        Self {
            speed: 100.0,
            radius: CROWD_MIN_RADIUS,
            strength: 0.3,
            max_neighbors: CROWD_MAX_NEIGHBORS,
        }
    }
}

thread_local! {
    static QUERY_CACHE: RefCell<SpatialQueryCache> = RefCell::new(SpatialQueryCache::new());
    static QUERY_SCRATCH: RefCell<Vec<EntityId>> = const { RefCell::new(Vec::new()) };
}

/// Query radius scaled by speed, capped so broad-phase load stays flat.
fn query_radius(base_radius: f32, speed: f32) -> f32 {
    let multiplier = (speed / 120.0).clamp(1.0, 1.5);
    (base_radius * multiplier).min(CROWD_MAX_RADIUS)
}

/// Separation with the neighborhood fetched from the collision engine.
///
/// `frame` scopes the thread-local query cache: queries from the same
/// tick share results, and bumping the frame invalidates everything at
/// zero cost.
pub fn separation_velocity(
    engine: &CollisionEngine,
    self_id: EntityId,
    frame: u64,
    position: Vec2,
    intended: Vec2,
    params: &SeparationParams,
    rng: &mut dyn RngCore,
) -> Vec2 {
    if params.speed <= 0.0 {
        return intended;
    }

    let base_radius = params.radius.max(CROWD_MIN_RADIUS);
    let query_radius = query_radius(base_radius, params.speed);

    QUERY_SCRATCH.with(|scratch| {
        let mut ids = scratch.borrow_mut();

        let cached = QUERY_CACHE.with(|cache| {
            cache.borrow().lookup(position, query_radius, frame, &mut ids)
        });
        if !cached {
            let area = Aabb::from_center(position, Vec2::new(query_radius, query_radius));
            engine.query_area(&area, &mut ids);
            QUERY_CACHE.with(|cache| {
                cache.borrow_mut().store(position, query_radius, frame, &ids);
            });
        }

        // Separation only cares about bodies that can actually crowd:
        // dynamic or kinematic, not triggers, not ourselves.
        let mut neighbors: Vec<Vec2> = Vec::with_capacity(ids.len());
        for &id in ids.iter() {
            if id == self_id {
                continue;
            }
            if (!engine.is_dynamic(id) && !engine.is_kinematic(id)) || engine.is_trigger(id) {
                continue;
            }
            if let Some(center) = engine.body_center(id) {
                neighbors.push(center);
            }
        }

        separation_from_neighbors(position, intended, params, &neighbors, rng)
    })
}

/// Separation over pre-fetched neighbor positions (no collision query).
pub fn separation_from_neighbors(
    position: Vec2,
    intended: Vec2,
    params: &SeparationParams,
    neighbors: &[Vec2],
    rng: &mut dyn RngCore,
) -> Vec2 {
    if params.speed <= 0.0 {
        return intended;
    }
    let base_radius = params.radius.max(CROWD_MIN_RADIUS);
    let query_radius = query_radius(base_radius, params.speed);

    let mut sep = Vec2::ZERO;
    let mut avoidance = Vec2::ZERO;
    let mut closest = query_radius;
    let mut counted = 0usize;
    let mut critical_neighbors = 0usize;
    let neighbor_cap = params.max_neighbors.min(CROWD_MAX_NEIGHBORS);

    for &other in neighbors {
        let mut d = position - other;

        // Manhattan fast-reject before the sqrt.
        if d.manhattan() > query_radius * 1.5 {
            continue;
        }

        let mut dist = d.length();
        if dist < 0.5 {
            // Extreme overlap: no usable direction, push somewhere random.
            d = random_unit(rng);
            dist = 16.0;
            critical_neighbors += 1;
            trace!("crowd emergency push");
        }
        if dist > query_radius {
            continue;
        }
        closest = closest.min(dist);

        let dir = d * (1.0 / dist);
        if dist < base_radius * 0.5 {
            let w = (base_radius * 0.5 - dist) / (base_radius * 0.5);
            avoidance += dir * (w * w * 3.0);
            critical_neighbors += 1;
        } else if dist < base_radius {
            let w = (base_radius - dist) / base_radius;
            sep += dir * w;
        }

        counted += 1;
        if counted >= neighbor_cap {
            break;
        }
    }

    let mut out = intended;
    let intended_len = out.length();
    if (sep.length() <= 0.001 && avoidance.length() <= 0.001) || intended_len <= 0.001 {
        return out;
    }
    let intended_dir = out * (1.0 / intended_len);

    if critical_neighbors > 0 && avoidance.length() > 0.001 {
        // Emergency: steer perpendicular, keeping some forward motion.
        let avoid_dir = avoidance.normalized();
        let mut perpendicular = intended_dir.perp();
        if avoid_dir.dot(perpendicular) < 0.0 {
            perpendicular = intended_dir.perp_cw();
        }
        let emergency = intended_dir * 0.6 + perpendicular * 0.8;
        let len = emergency.length();
        if len > 0.01 {
            out = emergency * (params.speed / len);
        }
        return out;
    }

    // Crowding pressure adapts the strength, within hard caps.
    let mut adaptive = params.strength;
    if counted >= neighbor_cap {
        adaptive = (adaptive * 1.5).min(0.6);
    }
    if closest < base_radius * 0.7 {
        adaptive = (adaptive * 1.3).min(0.5);
    }

    if sep.length() > 0.001 {
        let sep_dir = sep.normalized();
        let direction_conflict = -sep_dir.dot(intended_dir);

        if direction_conflict > 0.7 {
            // Head-on conflict: redirect laterally instead of braking.
            let mut lateral = intended_dir.perp();
            if sep_dir.dot(lateral) < 0.0 {
                lateral = intended_dir.perp_cw();
            }
            let redirected = intended_dir * 0.85 + lateral * adaptive * 1.2;
            let len = redirected.length();
            if len > 0.01 {
                out = redirected * (params.speed / len);
            }
        } else {
            // Gentle separation with forward bias.
            let forward = out * (1.0 - adaptive * 0.35);
            let push = sep * (adaptive * params.speed * 0.5);
            let blended = forward + push;
            let len = blended.length();
            if len > 0.01 {
                out = blended * (params.speed / len);
            }
        }
    }

    out
}

fn random_unit(rng: &mut dyn RngCore) -> Vec2 {
    let angle = (rng.next_u32() as f32 / u32::MAX as f32) * std::f32::consts::TAU;
    Vec2::new(angle.cos(), angle.sin())
}
