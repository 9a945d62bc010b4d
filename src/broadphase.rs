//! Uniform-grid broad phase with persistent pairs.
//!
//! Elements are single shapes of a collision object. The grid maps cell
//! coordinates to the elements overlapping them; elements covering too many
//! cells are kept in a separate "large" list and tested against everyone.
//! `update()` re-tests only elements created, moved or re-flagged since the
//! previous call and diffs their overlaps against the pairs it reported
//! before, so pair creation/removal is edge-triggered.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use log::trace;

use crate::api::NarrowphaseApi;
use crate::arena::{Arena, Handle};
use crate::narrowphase::Narrowphase;
use crate::types::{Aabb, ConstraintId, ObjectId};

/// Elements spanning more cells than this live in the large list.
const LARGE_ELEMENT_CELLS: i64 = 1024;
/// Upper bound on cells visited by one segment walk.
const MAX_WALK_CELLS: usize = 10_000;

pub(crate) type ElementId = Handle;
/// Ordered (lower, higher) element pair.
pub(crate) type PairKey = (ElementId, ElementId);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct CellRange {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

impl CellRange {
    fn count(&self) -> i64 {
        (self.x1 as i64 - self.x0 as i64 + 1) * (self.y1 as i64 - self.y0 as i64 + 1)
    }
}

struct Element {
    owner: ObjectId,
    shape: usize,
    aabb: Aabb,
    is_static: bool,
    /// `None` for large elements.
    cells: Option<CellRange>,
}

/// Pair changes produced by one [`BroadPhase::update`].
#[derive(Default)]
pub(crate) struct PairDelta {
    /// Pairs that stopped overlapping, with whatever was attached to them.
    pub removed: Vec<(PairKey, Option<ConstraintId>)>,
    /// Pairs that started overlapping; attach data with `set_pair_data`.
    pub created: Vec<PairKey>,
}

pub(crate) struct BroadPhase {
    cell_size: f32,
    elements: Arena<Element>,
    grid: BTreeMap<(i32, i32), Vec<ElementId>>,
    large: BTreeSet<ElementId>,
    pairs: BTreeMap<PairKey, Option<ConstraintId>>,
    /// Elements whose pairs must be re-tested on the next update.
    dirty: BTreeSet<ElementId>,
}

fn pair_key(a: ElementId, b: ElementId) -> PairKey {
    if a < b { (a, b) } else { (b, a) }
}

impl BroadPhase {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1e-5),
            elements: Arena::new(),
            grid: BTreeMap::new(),
            large: BTreeSet::new(),
            pairs: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    fn world_to_cell(&self, p: Vec2) -> (i32, i32) {
        let cs = self.cell_size;
        ((p.x / cs).floor() as i32, (p.y / cs).floor() as i32)
    }

    fn cell_range(&self, aabb: &Aabb) -> CellRange {
        let (x0, y0) = self.world_to_cell(aabb.min);
        let (x1, y1) = self.world_to_cell(aabb.max);
        CellRange { x0, y0, x1, y1 }
    }

    fn enter_grid(&mut self, id: ElementId, aabb: &Aabb) -> Option<CellRange> {
        let range = self.cell_range(aabb);
        if range.count() > LARGE_ELEMENT_CELLS {
            self.large.insert(id);
            return None;
        }
        for iy in range.y0..=range.y1 {
            for ix in range.x0..=range.x1 {
                self.grid.entry((ix, iy)).or_default().push(id);
            }
        }
        Some(range)
    }

    fn exit_grid(&mut self, id: ElementId, cells: Option<CellRange>) {
        let Some(range) = cells else {
            self.large.remove(&id);
            return;
        };
        for iy in range.y0..=range.y1 {
            for ix in range.x0..=range.x1 {
                if let Some(list) = self.grid.get_mut(&(ix, iy)) {
                    list.retain(|e| *e != id);
                    if list.is_empty() {
                        self.grid.remove(&(ix, iy));
                    }
                }
            }
        }
    }

    pub fn create(&mut self, owner: ObjectId, shape: usize, aabb: Aabb, is_static: bool) -> ElementId {
        let id = self.elements.insert(Element {
            owner,
            shape,
            aabb,
            is_static,
            cells: None,
        });
        let cells = self.enter_grid(id, &aabb);
        if let Some(e) = self.elements.get_mut(id) {
            e.cells = cells;
        }
        self.dirty.insert(id);
        id
    }

    pub fn move_element(&mut self, id: ElementId, aabb: Aabb) {
        let Some((old, old_aabb)) = self.elements.get(id).map(|e| (e.cells, e.aabb)) else {
            return;
        };
        if old_aabb == aabb {
            return;
        }
        self.dirty.insert(id);
        let new_range = self.cell_range(&aabb);
        let unchanged = match old {
            Some(r) => r == new_range,
            None => new_range.count() > LARGE_ELEMENT_CELLS,
        };
        if !unchanged {
            self.exit_grid(id, old);
            let cells = self.enter_grid(id, &aabb);
            if let Some(e) = self.elements.get_mut(id) {
                e.cells = cells;
            }
        }
        if let Some(e) = self.elements.get_mut(id) {
            e.aabb = aabb;
        }
    }

    pub fn set_static(&mut self, id: ElementId, is_static: bool) {
        if let Some(e) = self.elements.get_mut(id) {
            if e.is_static != is_static {
                e.is_static = is_static;
                self.dirty.insert(id);
            }
        }
    }

    /// Drop an element. Returns its live pairs, which are forgotten.
    pub fn remove(&mut self, id: ElementId) -> Vec<(PairKey, Option<ConstraintId>)> {
        let Some(e) = self.elements.remove(id) else {
            return Vec::new();
        };
        self.dirty.remove(&id);
        self.exit_grid(id, e.cells);
        let keys: Vec<PairKey> = self
            .pairs
            .keys()
            .filter(|(a, b)| *a == id || *b == id)
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|k| self.pairs.remove(&k).map(|data| (k, data)))
            .collect()
    }

    /// Owner and shape index of an element.
    pub fn owner(&self, id: ElementId) -> Option<(ObjectId, usize)> {
        self.elements.get(id).map(|e| (e.owner, e.shape))
    }

    pub fn set_pair_data(&mut self, key: PairKey, data: Option<ConstraintId>) {
        if let Some(slot) = self.pairs.get_mut(&key) {
            *slot = data;
        }
    }

    #[cfg(test)]
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    fn consider(&self, a: ElementId, b: ElementId, out: &mut BTreeSet<PairKey>) {
        let key = pair_key(a, b);
        if out.contains(&key) {
            return;
        }
        let (Some(ea), Some(eb)) = (self.elements.get(a), self.elements.get(b)) else {
            return;
        };
        if ea.owner == eb.owner || (ea.is_static && eb.is_static) {
            return;
        }
        if ea.aabb.intersects(&eb.aabb) {
            out.insert(key);
        }
    }

    /// Re-test dirty elements against their neighbours and report the
    /// pairs that appeared or vanished. Pairs between untouched elements
    /// are left as they are.
    pub fn update(&mut self) -> PairDelta {
        let dirty = std::mem::take(&mut self.dirty);
        let mut current = BTreeSet::new();
        for &id in &dirty {
            let Some(cells) = self.elements.get(id).map(|e| e.cells) else {
                continue;
            };
            let mut near = BTreeSet::new();
            match cells {
                Some(range) => {
                    self.collect_range(range, &mut near);
                    near.extend(self.large.iter().copied());
                }
                None => near.extend(self.elements.iter().map(|(other, _)| other)),
            }
            for other in near {
                if other != id {
                    self.consider(id, other, &mut current);
                }
            }
        }

        let mut delta = PairDelta::default();
        let stale: Vec<PairKey> = self
            .pairs
            .keys()
            .filter(|(a, b)| dirty.contains(a) || dirty.contains(b))
            .filter(|k| !current.contains(*k))
            .copied()
            .collect();
        for key in stale {
            if let Some(data) = self.pairs.remove(&key) {
                delta.removed.push((key, data));
            }
        }
        for key in current {
            if let std::collections::btree_map::Entry::Vacant(v) = self.pairs.entry(key) {
                v.insert(None);
                delta.created.push(key);
            }
        }
        if !delta.created.is_empty() || !delta.removed.is_empty() {
            trace!(
                "broadphase: +{} -{} pairs ({} live)",
                delta.created.len(),
                delta.removed.len(),
                self.pairs.len()
            );
        }
        delta
    }

    fn collect_range(&self, range: CellRange, out: &mut BTreeSet<ElementId>) {
        for iy in range.y0..=range.y1 {
            for ix in range.x0..=range.x1 {
                if let Some(list) = self.grid.get(&(ix, iy)) {
                    out.extend(list.iter().copied());
                }
            }
        }
    }

    fn results(&self, ids: BTreeSet<ElementId>, keep: impl Fn(&Aabb) -> bool) -> Vec<(ObjectId, usize)> {
        ids.into_iter()
            .chain(self.large.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|id| self.elements.get(id))
            .filter(|e| keep(&e.aabb))
            .map(|e| (e.owner, e.shape))
            .collect()
    }

    /// Elements whose bounds overlap `aabb`.
    pub fn cull_aabb(&self, aabb: &Aabb) -> Vec<(ObjectId, usize)> {
        let range = self.cell_range(aabb);
        let mut ids = BTreeSet::new();
        if range.count() > LARGE_ELEMENT_CELLS {
            ids.extend(self.elements.iter().map(|(id, _)| id));
        } else {
            self.collect_range(range, &mut ids);
        }
        self.results(ids, |b| b.intersects(aabb))
    }

    /// Elements whose bounds contain `p`.
    pub fn cull_point(&self, p: Vec2) -> Vec<(ObjectId, usize)> {
        let mut ids = BTreeSet::new();
        if let Some(list) = self.grid.get(&self.world_to_cell(p)) {
            ids.extend(list.iter().copied());
        }
        self.results(ids, |b| b.contains_point(p))
    }

    /// Elements whose bounds are crossed by the segment `from..to`.
    pub fn cull_segment(&self, from: Vec2, to: Vec2) -> Vec<(ObjectId, usize)> {
        let dir = to - from;
        let max_t = 1.0f32;
        let cs = self.cell_size;
        let mut ids = BTreeSet::new();

        let mut cell = self.world_to_cell(from);
        let end_cell = self.world_to_cell(to);
        let step_x = if dir.x > 0.0 { 1 } else if dir.x < 0.0 { -1 } else { 0 };
        let step_y = if dir.y > 0.0 { 1 } else if dir.y < 0.0 { -1 } else { 0 };
        let next_boundary = |c: i32, step: i32| -> f32 {
            if step > 0 { (c as f32 + 1.0) * cs } else { c as f32 * cs }
        };
        let mut t_max_x = if step_x != 0 {
            (next_boundary(cell.0, step_x) - from.x) / dir.x
        } else {
            f32::INFINITY
        };
        let mut t_max_y = if step_y != 0 {
            (next_boundary(cell.1, step_y) - from.y) / dir.y
        } else {
            f32::INFINITY
        };
        let t_delta_x = if step_x != 0 { cs / dir.x.abs() } else { f32::INFINITY };
        let t_delta_y = if step_y != 0 { cs / dir.y.abs() } else { f32::INFINITY };

        let mut t_curr = 0.0f32;
        for _ in 0..MAX_WALK_CELLS {
            if t_curr > max_t {
                break;
            }
            if let Some(list) = self.grid.get(&cell) {
                ids.extend(list.iter().copied());
            }
            if cell == end_cell {
                break;
            }
            if t_max_x < t_max_y {
                cell.0 += step_x;
                t_curr = t_max_x;
                t_max_x += t_delta_x;
            } else {
                cell.1 += step_y;
                t_curr = t_max_y;
                t_max_y += t_delta_y;
            }
        }
        self.results(ids, |b| Narrowphase::segment_aabb(from, to, b.min, b.max).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AreaId, BodyId};

    fn body(i: u32) -> ObjectId {
        ObjectId::Body(BodyId(Handle {
            index: i,
            generation: 0,
        }))
    }

    fn boxed(c: Vec2, h: f32) -> Aabb {
        Aabb::from_center_half(c, Vec2::splat(h))
    }

    #[test]
    fn test_grid_coverage_straddling_origin() {
        let mut bp = BroadPhase::new(1.0);
        bp.create(body(0), 0, boxed(Vec2::ZERO, 0.5), false);
        // With floor indexing, bounds straddling origin cover 4 cells
        assert_eq!(bp.grid.len(), 4);
        for k in [(-1, -1), (-1, 0), (0, -1), (0, 0)] {
            assert_eq!(bp.grid[&k].len(), 1);
        }
    }

    #[test]
    fn test_pairs_are_edge_triggered() {
        let mut bp = BroadPhase::new(1.0);
        let a = bp.create(body(0), 0, boxed(Vec2::ZERO, 0.5), false);
        let b = bp.create(body(1), 0, boxed(Vec2::new(0.8, 0.0), 0.5), false);
        let d = bp.update();
        assert_eq!(d.created, vec![pair_key(a, b)]);
        assert!(d.removed.is_empty());
        // Nothing changed: no new edges.
        let d = bp.update();
        assert!(d.created.is_empty() && d.removed.is_empty());

        bp.move_element(b, boxed(Vec2::new(5.0, 0.0), 0.5));
        let d = bp.update();
        assert_eq!(d.removed.len(), 1);
        assert_eq!(bp.pair_count(), 0);
    }

    #[test]
    fn test_static_and_same_owner_pairs_skipped() {
        let mut bp = BroadPhase::new(1.0);
        bp.create(body(0), 0, boxed(Vec2::ZERO, 0.5), true);
        bp.create(body(1), 0, boxed(Vec2::ZERO, 0.5), true);
        bp.create(body(2), 0, boxed(Vec2::new(10.0, 0.0), 0.5), false);
        bp.create(body(2), 1, boxed(Vec2::new(10.0, 0.0), 0.5), false);
        assert!(bp.update().created.is_empty());
    }

    #[test]
    fn test_large_element_pairs_with_everyone() {
        let mut bp = BroadPhase::new(1.0);
        let floor = bp.create(body(0), 0, Aabb::new(Vec2::new(-1000.0, -1.0), Vec2::new(1000.0, 0.0)), true);
        assert!(bp.large.contains(&floor));
        bp.create(body(1), 0, boxed(Vec2::new(300.0, 0.2), 0.5), false);
        assert_eq!(bp.update().created.len(), 1);
        let removed = bp.remove(floor);
        assert_eq!(removed.len(), 1);
        assert!(bp.large.is_empty());
    }

    #[test]
    fn test_update_retests_only_dirty_elements() {
        let mut bp = BroadPhase::new(1.0);
        let a = bp.create(body(0), 0, boxed(Vec2::ZERO, 0.5), false);
        let b = bp.create(body(1), 0, boxed(Vec2::new(0.8, 0.0), 0.5), false);
        let c = bp.create(body(2), 0, boxed(Vec2::new(5.0, 0.0), 0.5), false);
        bp.update();
        assert!(bp.dirty.is_empty());

        // Same bounds: nothing to re-test.
        bp.move_element(a, boxed(Vec2::ZERO, 0.5));
        assert!(bp.dirty.is_empty());

        bp.move_element(c, boxed(Vec2::new(5.5, 0.0), 0.5));
        let d = bp.update();
        assert!(d.created.is_empty() && d.removed.is_empty());
        assert_eq!(bp.pair_count(), 1);

        // Both static now, so the pair goes away.
        bp.set_static(a, true);
        bp.set_static(b, true);
        let d = bp.update();
        assert_eq!(d.removed.len(), 1);
        assert_eq!(d.removed[0].0, pair_key(a, b));
        bp.set_static(b, false);
        assert_eq!(bp.update().created, vec![pair_key(a, b)]);
    }

    #[test]
    fn test_cull_queries() {
        let mut bp = BroadPhase::new(1.0);
        let area = ObjectId::Area(AreaId(Handle {
            index: 7,
            generation: 0,
        }));
        bp.create(area, 0, boxed(Vec2::new(2.0, 0.0), 0.5), true);
        bp.create(body(1), 0, boxed(Vec2::new(4.0, 0.0), 0.5), false);

        assert_eq!(bp.cull_point(Vec2::new(2.2, 0.1)), vec![(area, 0)]);
        assert_eq!(bp.cull_aabb(&boxed(Vec2::new(3.0, 0.0), 1.2)).len(), 2);
        let hits = bp.cull_segment(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        assert_eq!(hits.len(), 2);
        assert!(bp.cull_segment(Vec2::new(0.0, 0.0), Vec2::new(-10.0, 0.0)).is_empty());
        // Stops at the segment end.
        assert_eq!(bp.cull_segment(Vec2::ZERO, Vec2::new(3.0, 0.0)), vec![(area, 0)]);
    }
}
