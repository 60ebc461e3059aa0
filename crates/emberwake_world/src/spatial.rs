//! # Small-Grid Spatial Index
//!
//! Simple grid hash optimized for small pickup-radius queries. Cell size
//! is 64 px, twice the typical 32 px pickup radius, so most queries touch
//! four cells. A reverse `entity -> cell` map makes removal O(1).
//!
//! Each world owns its own index; cross-world queries cannot happen by
//! construction.

use std::collections::HashMap;

use emberwake_shared::{constants::WORLD_INDEX_CELL_SIZE, Vec2};

/// Grid hash over entity-store indices.
pub struct SpatialIndex {
    cell_size: f32,
    cells: HashMap<u64, Vec<u32>>,
    entity_to_cell: HashMap<u32, u64>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(WORLD_INDEX_CELL_SIZE)
    }
}

impl SpatialIndex {
    /// Creates an index with an explicit cell size.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::with_capacity(128),
            entity_to_cell: HashMap::with_capacity(512),
        }
    }

    fn to_cell(&self, coordinate: f32) -> i32 {
        (coordinate / self.cell_size).floor() as i32
    }

    fn make_key(x: i32, y: i32) -> u64 {
        ((y as u32 as u64) << 32) | (x as u32 as u64)
    }

    /// Registers an entity index at a position. An index already present
    /// is moved.
    pub fn insert(&mut self, index: u32, position: Vec2) {
        if self.entity_to_cell.contains_key(&index) {
            self.remove(index);
        }
        let key = Self::make_key(self.to_cell(position.x), self.to_cell(position.y));
        self.cells.entry(key).or_default().push(index);
        self.entity_to_cell.insert(index, key);
    }

    /// Removes an entity index. Returns `false` when it was not present.
    pub fn remove(&mut self, index: u32) -> bool {
        let Some(key) = self.entity_to_cell.remove(&index) else {
            return false;
        };
        if let Some(cell) = self.cells.get_mut(&key) {
            cell.retain(|&e| e != index);
            // Empty cells are dropped so the map never accumulates.
            if cell.is_empty() {
                self.cells.remove(&key);
            }
        }
        true
    }

    /// Appends every index in cells touching the radius to `out`.
    ///
    /// Cell-level approximation: the caller filters by precise distance
    /// against store positions.
    pub fn query_radius(&self, center: Vec2, radius: f32, out: &mut Vec<u32>) {
        let min_x = self.to_cell(center.x - radius);
        let max_x = self.to_cell(center.x + radius);
        let min_y = self.to_cell(center.y - radius);
        let max_y = self.to_cell(center.y + radius);

        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                if let Some(cell) = self.cells.get(&Self::make_key(cx, cy)) {
                    out.extend_from_slice(cell);
                }
            }
        }
    }

    /// Registered entity count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entity_to_cell.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity_to_cell.is_empty()
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.entity_to_cell.clear();
    }

    /// Debug check: every registered index appears in exactly the cell the
    /// reverse map names, and in no other cell.
    #[must_use]
    pub fn validate(&self) -> bool {
        for (&index, &key) in &self.entity_to_cell {
            let in_named = self
                .cells
                .get(&key)
                .is_some_and(|cell| cell.contains(&index));
            if !in_named {
                return false;
            }
            let appearances: usize = self
                .cells
                .values()
                .map(|cell| cell.iter().filter(|&&e| e == index).count())
                .sum();
            if appearances != 1 {
                return false;
            }
        }
        true
    }
}
