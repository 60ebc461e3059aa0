//! # Pathfinding Grid
//!
//! A uniform weighted grid over world space. Each cell stores a blocking
//! flag and a traversal cost multiplier (1.0 default, higher for terrain
//! penalties). A* runs 8-connected with the octile heuristic and a hard
//! iteration cap; results are smoothed by line-of-sight waypoint removal.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use emberwake_shared::{constants::ASTAR_ITERATION_CAP, Vec2};
use rand::RngCore;

/// Outcome of a pathfinding attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathResult {
    /// A path was found and written to the output
    Success,
    /// The goal is unreachable
    Blocked,
    /// The iteration cap was hit before reaching the goal
    Timeout,
    /// The start position is outside the grid or inside a blocker
    InvalidStart,
    /// The goal position is outside the grid or inside a blocker
    InvalidGoal,
}

const SQRT_2: f32 = std::f32::consts::SQRT_2;

/// Open-list node. Ordered so the heap pops minimum f, then minimum h,
/// then the smallest tie token (sequential by default, PRNG-assigned in
/// deterministic-replay mode).
#[derive(Clone, Copy, Debug, PartialEq)]
struct OpenNode {
    f: f32,
    h: f32,
    token: u32,
    cell: u32,
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert to pop the best node first.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.token.cmp(&self.token))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Weighted grid with A* search.
pub struct PathfindingGrid {
    width: u32,
    height: u32,
    cell_size: f32,
    origin: Vec2,
    blocked: Vec<bool>,
    weight: Vec<f32>,
    iteration_cap: u32,
}

impl PathfindingGrid {
    /// Creates an unblocked grid with uniform weight 1.0.
    #[must_use]
    pub fn new(width: u32, height: u32, cell_size: f32, origin: Vec2) -> Self {
        let cells = (width * height) as usize;
        Self {
            width,
            height,
            cell_size,
            origin,
            blocked: vec![false; cells],
            weight: vec![1.0; cells],
            iteration_cap: ASTAR_ITERATION_CAP,
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Cell edge length in world units.
    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Overrides the A* iteration cap.
    pub fn set_iteration_cap(&mut self, cap: u32) {
        self.iteration_cap = cap.max(1);
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// Marks a cell blocking or walkable.
    pub fn set_blocked(&mut self, x: u32, y: u32, blocked: bool) {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            self.blocked[index] = blocked;
        }
    }

    /// Blocking flag of a cell; out-of-range cells block.
    #[must_use]
    pub fn is_blocked(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return true;
        }
        self.blocked[self.index(x, y)]
    }

    /// Sets a cell's traversal cost multiplier (clamped to >= 0.1).
    pub fn set_weight(&mut self, x: u32, y: u32, weight: f32) {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            self.weight[index] = weight.max(0.1);
        }
    }

    /// Raises traversal cost inside a circle (terrain penalty region).
    pub fn add_weight_circle(&mut self, center: Vec2, radius: f32, weight: f32) {
        let radius_sq = radius * radius;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.cell_center(x, y).distance_squared(center) <= radius_sq {
                    let index = self.index(x, y);
                    self.weight[index] = self.weight[index].max(weight);
                }
            }
        }
    }

    /// World position of a cell center.
    #[must_use]
    pub fn cell_center(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            self.origin.x + (x as f32 + 0.5) * self.cell_size,
            self.origin.y + (y as f32 + 0.5) * self.cell_size,
        )
    }

    /// Maps a world position to cell coordinates; `None` outside the grid.
    #[must_use]
    pub fn world_to_cell(&self, position: Vec2) -> Option<(u32, u32)> {
        let fx = (position.x - self.origin.x) / self.cell_size;
        let fy = (position.y - self.origin.y) / self.cell_size;
        if fx < 0.0 || fy < 0.0 {
            return None;
        }
        let x = fx as u32;
        let y = fy as u32;
        (x < self.width && y < self.height).then_some((x, y))
    }

    /// Finds a path from `start` to `goal`, writing world-space waypoints
    /// into `out` (cleared first). The first and last waypoints equal the
    /// exact requested endpoints.
    pub fn find_path(&self, start: Vec2, goal: Vec2, out: &mut Vec<Vec2>) -> PathResult {
        self.find_path_impl(start, goal, out, None)
    }

    /// [`Self::find_path`] with PRNG-broken ties for deterministic replay.
    pub fn find_path_seeded(
        &self,
        start: Vec2,
        goal: Vec2,
        out: &mut Vec<Vec2>,
        rng: &mut dyn RngCore,
    ) -> PathResult {
        self.find_path_impl(start, goal, out, Some(rng))
    }

    fn find_path_impl(
        &self,
        start: Vec2,
        goal: Vec2,
        out: &mut Vec<Vec2>,
        mut rng: Option<&mut dyn RngCore>,
    ) -> PathResult {
        out.clear();

        let Some((sx, sy)) = self.world_to_cell(start) else {
            return PathResult::InvalidStart;
        };
        if self.is_blocked(sx, sy) {
            return PathResult::InvalidStart;
        }
        let Some((gx, gy)) = self.world_to_cell(goal) else {
            return PathResult::InvalidGoal;
        };
        if self.is_blocked(gx, gy) {
            return PathResult::InvalidGoal;
        }

        let start_cell = self.index(sx, sy) as u32;
        let goal_cell = self.index(gx, gy) as u32;
        if start_cell == goal_cell {
            out.push(start);
            out.push(goal);
            return PathResult::Success;
        }

        let cells = self.blocked.len();
        let mut g_score = vec![f32::INFINITY; cells];
        let mut came_from = vec![u32::MAX; cells];
        let mut closed = vec![false; cells];
        let mut open = BinaryHeap::with_capacity(256);
        let mut next_token: u32 = 0;

        let mut token = |rng: &mut Option<&mut dyn RngCore>| -> u32 {
            match rng {
                Some(rng) => rng.next_u32(),
                None => {
                    next_token += 1;
                    next_token
                }
            }
        };

        g_score[start_cell as usize] = 0.0;
        let h0 = self.octile(sx, sy, gx, gy);
        let t0 = token(&mut rng);
        open.push(OpenNode {
            f: h0,
            h: h0,
            token: t0,
            cell: start_cell,
        });

        let mut iterations = 0u32;
        while let Some(node) = open.pop() {
            iterations += 1;
            if iterations > self.iteration_cap {
                return PathResult::Timeout;
            }

            let cell = node.cell;
            if closed[cell as usize] {
                continue;
            }
            closed[cell as usize] = true;

            if cell == goal_cell {
                self.reconstruct(&came_from, cell, start, goal, out);
                self.smooth(out);
                return PathResult::Success;
            }

            let cx = cell % self.width;
            let cy = cell / self.width;
            for (dx, dy) in NEIGHBORS {
                let nx = cx as i64 + i64::from(dx);
                let ny = cy as i64 + i64::from(dy);
                if nx < 0 || ny < 0 || nx >= i64::from(self.width) || ny >= i64::from(self.height) {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                if self.is_blocked(nx, ny) {
                    continue;
                }
                // Diagonal movement may not cut a blocked corner.
                if dx != 0 && dy != 0 && (self.is_blocked(nx, cy) || self.is_blocked(cx, ny)) {
                    continue;
                }

                let neighbor = self.index(nx, ny);
                if closed[neighbor] {
                    continue;
                }
                let step = if dx != 0 && dy != 0 { SQRT_2 } else { 1.0 };
                let tentative = g_score[cell as usize] + step * self.weight[neighbor];
                if tentative < g_score[neighbor] {
                    g_score[neighbor] = tentative;
                    came_from[neighbor] = cell;
                    let h = self.octile(nx, ny, gx, gy);
                    let t = token(&mut rng);
                    open.push(OpenNode {
                        f: tentative + h,
                        h,
                        token: t,
                        cell: neighbor as u32,
                    });
                }
            }
        }

        PathResult::Blocked
    }

    fn octile(&self, x: u32, y: u32, gx: u32, gy: u32) -> f32 {
        let dx = (i64::from(x) - i64::from(gx)).unsigned_abs() as f32;
        let dy = (i64::from(y) - i64::from(gy)).unsigned_abs() as f32;
        dx.max(dy) + (SQRT_2 - 1.0) * dx.min(dy)
    }

    fn reconstruct(&self, came_from: &[u32], goal_cell: u32, start: Vec2, goal: Vec2, out: &mut Vec<Vec2>) {
        let mut cell = goal_cell;
        while cell != u32::MAX {
            let x = cell % self.width;
            let y = cell / self.width;
            out.push(self.cell_center(x, y));
            cell = came_from[cell as usize];
        }
        out.reverse();
        // Exact endpoints replace the terminal cell centers.
        if let Some(first) = out.first_mut() {
            *first = start;
        }
        if let Some(last) = out.last_mut() {
            *last = goal;
        }
    }

    /// Removes intermediate waypoints whose neighbors see each other.
    fn smooth(&self, waypoints: &mut Vec<Vec2>) {
        let mut i = 0;
        while i + 2 < waypoints.len() {
            if self.line_of_sight(waypoints[i], waypoints[i + 2]) {
                waypoints.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }

    /// Bresenham walk over the cells between two world points; `false`
    /// when any visited cell blocks.
    #[must_use]
    pub fn line_of_sight(&self, from: Vec2, to: Vec2) -> bool {
        let (Some((fx, fy)), Some((tx, ty))) = (self.world_to_cell(from), self.world_to_cell(to))
        else {
            return false;
        };

        let mut x0 = fx as i64;
        let mut y0 = fy as i64;
        let x1 = tx as i64;
        let y1 = ty as i64;

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            if self.is_blocked(x0 as u32, y0 as u32) {
                return false;
            }
            if x0 == x1 && y0 == y1 {
                return true;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }
}

/// 8-connected neighborhood offsets.
const NEIGHBORS: [(i8, i8); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
