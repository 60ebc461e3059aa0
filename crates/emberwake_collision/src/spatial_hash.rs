//! # Spatial Hash
//!
//! Uniform grid of small buckets keyed by integer cell coordinates. A body
//! spanning several cells appears in every overlapped cell; queries dedupe
//! through a thread-local seen-set.
//!
//! The movement threshold keeps jittering bodies cheap: below it, only the
//! stored AABB refreshes and cell membership is left alone.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use emberwake_shared::{Aabb, EntityId};

/// Cell key packing (x, y) into one map key.
#[inline]
fn make_key(x: i32, y: i32) -> u64 {
    ((x as u32 as u64) << 32) | (y as u32 as u64)
}

/// Integer cell range covered by an AABB at a given cell size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CellRange {
    min_x: i32,
    max_x: i32,
    min_y: i32,
    max_y: i32,
}

impl CellRange {
    fn of(aabb: &Aabb, cell_size: f32) -> Self {
        Self {
            min_x: (aabb.left() / cell_size).floor() as i32,
            max_x: (aabb.right() / cell_size).floor() as i32,
            min_y: (aabb.top() / cell_size).floor() as i32,
            max_y: (aabb.bottom() / cell_size).floor() as i32,
        }
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

thread_local! {
    // Query dedup scratch; reused so queries never allocate a fresh set.
    static SEEN: RefCell<HashSet<EntityId>> = RefCell::new(HashSet::with_capacity(64));
}

/// Grid spatial index over entity ids.
pub struct SpatialHash {
    cell_size: f32,
    movement_threshold: f32,
    aabbs: HashMap<EntityId, Aabb>,
    cells: HashMap<u64, Vec<EntityId>>,
}

impl SpatialHash {
    /// Creates a hash with the given cell size and movement threshold.
    #[must_use]
    pub fn new(cell_size: f32, movement_threshold: f32) -> Self {
        Self {
            cell_size,
            movement_threshold,
            aabbs: HashMap::new(),
            cells: HashMap::new(),
        }
    }

    /// Cell size in world units.
    #[inline]
    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aabbs.len()
    }

    /// True when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aabbs.is_empty()
    }

    /// Latest bounds stored for an id.
    #[must_use]
    pub fn bounds(&self, id: EntityId) -> Option<Aabb> {
        self.aabbs.get(&id).copied()
    }

    /// Inserts an id under its AABB. Re-inserting an existing id behaves
    /// like [`Self::update`].
    pub fn insert(&mut self, id: EntityId, aabb: Aabb) {
        if self.aabbs.contains_key(&id) {
            self.update(id, aabb);
            return;
        }
        let range = CellRange::of(&aabb, self.cell_size);
        for y in range.min_y..=range.max_y {
            for x in range.min_x..=range.max_x {
                let cell = self.cells.entry(make_key(x, y)).or_insert_with(|| {
                    // Typical cell holds 4-8 entities.
                    Vec::with_capacity(8)
                });
                cell.push(id);
            }
        }
        self.aabbs.insert(id, aabb);
    }

    /// Removes an id from every cell it occupies. No-op for unknown ids.
    pub fn remove(&mut self, id: EntityId) {
        let Some(aabb) = self.aabbs.remove(&id) else {
            return;
        };
        let range = CellRange::of(&aabb, self.cell_size);
        for y in range.min_y..=range.max_y {
            for x in range.min_x..=range.max_x {
                let key = make_key(x, y);
                if let Some(cell) = self.cells.get_mut(&key) {
                    cell.retain(|&e| e != id);
                    if cell.is_empty() {
                        self.cells.remove(&key);
                    }
                }
            }
        }
    }

    /// Moves an id to a new AABB.
    ///
    /// Centers that moved less than the movement threshold refresh the
    /// stored AABB without touching cell membership; larger moves diff the
    /// old and new cell ranges and only touch the difference.
    pub fn update(&mut self, id: EntityId, new_aabb: Aabb) {
        let Some(old_aabb) = self.aabbs.get(&id).copied() else {
            self.insert(id, new_aabb);
            return;
        };

        let moved_sq = new_aabb.center.distance_squared(old_aabb.center);
        if moved_sq <= self.movement_threshold * self.movement_threshold {
            self.aabbs.insert(id, new_aabb);
            return;
        }

        let old_range = CellRange::of(&old_aabb, self.cell_size);
        let new_range = CellRange::of(&new_aabb, self.cell_size);
        if old_range == new_range {
            self.aabbs.insert(id, new_aabb);
            return;
        }

        // Leave cells that no longer overlap.
        for y in old_range.min_y..=old_range.max_y {
            for x in old_range.min_x..=old_range.max_x {
                if new_range.contains(x, y) {
                    continue;
                }
                let key = make_key(x, y);
                if let Some(cell) = self.cells.get_mut(&key) {
                    cell.retain(|&e| e != id);
                    if cell.is_empty() {
                        self.cells.remove(&key);
                    }
                }
            }
        }
        // Join newly overlapped cells.
        for y in new_range.min_y..=new_range.max_y {
            for x in new_range.min_x..=new_range.max_x {
                if old_range.contains(x, y) {
                    continue;
                }
                self.cells.entry(make_key(x, y)).or_default().push(id);
            }
        }

        self.aabbs.insert(id, new_aabb);
    }

    /// Appends every id whose cells intersect `area` to `out`, each id at
    /// most once. `out` is cleared first.
    pub fn query(&self, area: &Aabb, out: &mut Vec<EntityId>) {
        out.clear();
        let range = CellRange::of(area, self.cell_size);
        SEEN.with(|seen| {
            let mut seen = seen.borrow_mut();
            seen.clear();
            for y in range.min_y..=range.max_y {
                for x in range.min_x..=range.max_x {
                    let Some(cell) = self.cells.get(&make_key(x, y)) else {
                        continue;
                    };
                    for &id in cell {
                        if seen.insert(id) {
                            out.push(id);
                        }
                    }
                }
            }
        });
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.aabbs.clear();
        self.cells.clear();
    }

    /// Total cell-membership entries (an id spanning N cells counts N
    /// times). Diagnostic only.
    #[must_use]
    pub fn total_entries(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// Debug check: every id appears in exactly the cells its AABB
    /// overlaps, and in no others.
    #[must_use]
    pub fn validate(&self) -> bool {
        for (&id, aabb) in &self.aabbs {
            let range = CellRange::of(aabb, self.cell_size);
            for (&key, cell) in &self.cells {
                let x = (key >> 32) as u32 as i32;
                let y = key as u32 as i32;
                let expected = range.contains(x, y);
                let present = cell.iter().filter(|&&e| e == id).count();
                if present != usize::from(expected) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> SpatialHash {
        SpatialHash::new(64.0, 2.0)
    }

    #[test]
    fn test_insert_query_remove() {
        let mut h = hash();
        h.insert(1, Aabb::new(10.0, 10.0, 5.0, 5.0));
        h.insert(2, Aabb::new(500.0, 500.0, 5.0, 5.0));

        let mut out = Vec::new();
        h.query(&Aabb::new(0.0, 0.0, 64.0, 64.0), &mut out);
        assert_eq!(out, vec![1]);

        h.remove(1);
        h.query(&Aabb::new(0.0, 0.0, 64.0, 64.0), &mut out);
        assert!(out.is_empty());
        assert_eq!(h.len(), 1);
        assert!(h.validate());
    }

    #[test]
    fn test_spanning_body_returned_once() {
        let mut h = hash();
        // Straddles the cell boundary at x = 64.
        h.insert(7, Aabb::new(64.0, 32.0, 10.0, 10.0));

        let mut out = Vec::new();
        h.query(&Aabb::new(64.0, 32.0, 128.0, 64.0), &mut out);
        assert_eq!(out, vec![7]);
        assert!(h.total_entries() >= 2);
        assert!(h.validate());
    }

    #[test]
    fn test_movement_below_threshold_keeps_cells() {
        let mut h = hash();
        h.insert(3, Aabb::new(63.0, 0.0, 2.0, 2.0));
        let entries_before = h.total_entries();

        // Exactly at the threshold: no rehash even though the AABB now
        // leans into the next cell.
        h.update(3, Aabb::new(65.0, 0.0, 2.0, 2.0));
        assert_eq!(h.total_entries(), entries_before);
        assert_eq!(h.bounds(3).unwrap().center.x, 65.0);

        // Past the threshold: membership is recomputed.
        h.update(3, Aabb::new(130.0, 0.0, 2.0, 2.0));
        assert!(h.validate());
    }

    #[test]
    fn test_update_unknown_inserts() {
        let mut h = hash();
        h.update(9, Aabb::new(0.0, 0.0, 4.0, 4.0));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_cell_diff_update() {
        let mut h = hash();
        h.insert(5, Aabb::new(32.0, 32.0, 8.0, 8.0));
        h.update(5, Aabb::new(200.0, 200.0, 8.0, 8.0));

        let mut out = Vec::new();
        h.query(&Aabb::new(32.0, 32.0, 30.0, 30.0), &mut out);
        assert!(out.is_empty());
        h.query(&Aabb::new(200.0, 200.0, 30.0, 30.0), &mut out);
        assert_eq!(out, vec![5]);
        assert!(h.validate());
    }
}
