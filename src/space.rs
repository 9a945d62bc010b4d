//! One simulated world.
//!
//! A space owns the broad phase and the pair constraints between its
//! objects, plus the bookkeeping lists the stepper works from. Objects
//! themselves live in server arenas and are handed in as [`Objects`].

use std::collections::BTreeSet;

use glam::{Affine2, Vec2};
use log::trace;

use crate::area::Area;
use crate::arena::Arena;
use crate::body::Body;
use crate::broadphase::{BroadPhase, ElementId, PairKey};
use crate::collision_object::CollisionObject;
use crate::collision_solver;
use crate::constraint::{Area2Pair, AreaPair, BodyPair, Constraint, Pair, PairContext};
use crate::shape::{Shape, ShapeType, xform_normal};
use crate::types::{
    Aabb, AreaId, BodyId, BodyMode, CcdMode, ConstraintId, LayerMask, MotionQuery, MotionResult,
    ObjectId, QueryFilter, RayResult, ShapeResult, SpaceConfig, SpaceInfo, SpaceParam,
};

const RECOVER_ATTEMPTS: usize = 4;
const RECOVER_RESULTS: usize = 32;
const MOTION_SEARCH_STEPS: usize = 8;

/// Mutable access to the server's object arenas.
pub(crate) struct Objects<'a> {
    pub bodies: &'a mut Arena<Body>,
    pub areas: &'a mut Arena<Area>,
    pub shapes: &'a Arena<Shape>,
}

/// Collects (point on A, point on B) pairs, keeping the `max` deepest.
pub(crate) struct DeepestPairs {
    max: usize,
    pairs: Vec<(Vec2, Vec2)>,
}

impl DeepestPairs {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            pairs: Vec::with_capacity(max),
        }
    }

    pub fn push(&mut self, a: Vec2, b: Vec2) {
        if self.max == 0 {
            return;
        }
        if self.pairs.len() < self.max {
            self.pairs.push((a, b));
            return;
        }
        let least = self
            .pairs
            .iter()
            .enumerate()
            .map(|(i, (pa, pb))| (i, pa.distance_squared(*pb)))
            .min_by(|x, y| x.1.total_cmp(&y.1));
        if let Some((i, d)) = least {
            if a.distance_squared(b) >= d {
                self.pairs[i] = (a, b);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn into_vec(self) -> Vec<(Vec2, Vec2)> {
        self.pairs
    }
}

pub struct Space {
    pub(crate) config: SpaceConfig,
    pub(crate) active: bool,
    pub(crate) broadphase: BroadPhase,
    pub(crate) constraints: Arena<Constraint>,
    /// Bodies integrated and used as island seeds.
    pub(crate) active_list: BTreeSet<BodyId>,
    /// Areas whose overlaps must be re-tested next step.
    pub(crate) moved_areas: BTreeSet<AreaId>,
    pub(crate) pending_shape_updates: BTreeSet<ObjectId>,
    pub(crate) inertia_updates: BTreeSet<BodyId>,
    pub(crate) monitor_queries: BTreeSet<AreaId>,
    /// Bodies whose force-integration callback runs at the next flush.
    pub(crate) state_queries: BTreeSet<BodyId>,
    pub(crate) bodies: BTreeSet<BodyId>,
    pub(crate) areas: BTreeSet<AreaId>,
    pub(crate) info: SpaceInfo,
}

impl Space {
    pub(crate) fn new(config: SpaceConfig) -> Self {
        Self {
            broadphase: BroadPhase::new(config.cell_size),
            config,
            active: false,
            constraints: Arena::new(),
            active_list: BTreeSet::new(),
            moved_areas: BTreeSet::new(),
            pending_shape_updates: BTreeSet::new(),
            inertia_updates: BTreeSet::new(),
            monitor_queries: BTreeSet::new(),
            state_queries: BTreeSet::new(),
            bodies: BTreeSet::new(),
            areas: BTreeSet::new(),
            info: SpaceInfo::default(),
        }
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn info(&self) -> SpaceInfo {
        self.info
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub(crate) fn set_param(&mut self, param: SpaceParam) {
        self.config.apply(param);
    }

    pub(crate) fn attach_body(&mut self, id: BodyId, body: &mut Body) {
        self.bodies.insert(id);
        body.first_integration = true;
        body.pending_inertia = true;
        body.co.pending_update = true;
        self.refresh_body(id, body);
    }

    pub(crate) fn attach_area(&mut self, id: AreaId, area: &mut Area) {
        self.areas.insert(id);
        area.co.pending_update = true;
        self.refresh_area(id, area);
    }

    /// Pick up flags raised on `body` since the last call.
    pub(crate) fn refresh_body(&mut self, id: BodyId, body: &Body) {
        self.refresh_active(id, body);
        if body.co.pending_update || body.co.needs_reregister {
            self.pending_shape_updates.insert(ObjectId::Body(id));
        }
        if body.pending_inertia {
            self.inertia_updates.insert(id);
        }
    }

    pub(crate) fn refresh_active(&mut self, id: BodyId, body: &Body) {
        if body.active {
            self.active_list.insert(id);
        } else {
            self.active_list.remove(&id);
        }
    }

    pub(crate) fn refresh_area(&mut self, id: AreaId, area: &Area) {
        if area.co.pending_update || area.co.needs_reregister {
            self.pending_shape_updates.insert(ObjectId::Area(id));
            self.moved_areas.insert(id);
        }
    }

    /// Start of a step: bring the broad phase and mass properties up to date.
    pub(crate) fn setup(&mut self, objs: &mut Objects<'_>) {
        self.flush_shape_updates(objs);
        self.update_pairs(objs);
        for id in std::mem::take(&mut self.inertia_updates) {
            if let Some(body) = objs.bodies.get_mut(id.0) {
                body.update_inertias(objs.shapes);
            }
        }
    }

    /// End of a step: publish the new positions to the broad phase.
    pub(crate) fn update(&mut self, objs: &mut Objects<'_>) {
        self.flush_shape_updates(objs);
        self.update_pairs(objs);
    }

    pub(crate) fn flush_shape_updates(&mut self, objs: &mut Objects<'_>) {
        for obj in std::mem::take(&mut self.pending_shape_updates) {
            self.update_object(obj, objs);
        }
    }

    fn object_mut<'o>(objs: &'o mut Objects<'_>, obj: ObjectId) -> Option<&'o mut CollisionObject> {
        match obj {
            ObjectId::Body(id) => objs.bodies.get_mut(id.0).map(|b| &mut b.co),
            ObjectId::Area(id) => objs.areas.get_mut(id.0).map(|a| &mut a.co),
        }
    }

    fn object<'o>(bodies: &'o Arena<Body>, areas: &'o Arena<Area>, obj: ObjectId) -> Option<&'o CollisionObject> {
        match obj {
            ObjectId::Body(id) => bodies.get(id.0).map(|b| &b.co),
            ObjectId::Area(id) => areas.get(id.0).map(|a| &a.co),
        }
    }

    fn layer_mask(objs: &Objects<'_>, obj: ObjectId) -> Option<LayerMask> {
        match obj {
            ObjectId::Body(id) => objs.bodies.get(id.0).map(|b| b.co.layer_mask),
            ObjectId::Area(id) => objs.areas.get(id.0).map(|a| a.co.layer_mask),
        }
    }

    fn update_object(&mut self, obj: ObjectId, objs: &mut Objects<'_>) {
        let stale: Vec<ElementId> = match Self::object_mut(objs, obj) {
            Some(co) => {
                let mut stale = Vec::new();
                if co.needs_reregister {
                    co.needs_reregister = false;
                    stale = co.take_elements(0);
                }
                stale.extend(co.shapes.iter_mut().filter(|s| s.disabled).filter_map(|s| s.bpid.take()));
                stale
            }
            None => return,
        };
        self.remove_elements(&stale, objs);

        let motion = match obj {
            ObjectId::Body(id) => objs
                .bodies
                .get(id.0)
                .filter(|b| b.continuous_cd != CcdMode::Disabled)
                .map_or(Vec2::ZERO, |b| b.motion),
            ObjectId::Area(_) => Vec2::ZERO,
        };
        let shapes = objs.shapes;
        let Some(co) = Self::object_mut(objs, obj) else {
            return;
        };
        co.pending_update = false;
        let xform = co.transform;
        let is_static = co.is_static;
        for (index, slot) in co.shapes.iter_mut().enumerate() {
            if slot.disabled {
                continue;
            }
            let Some(shape) = shapes.get(slot.shape.0) else {
                continue;
            };
            let aabb = shape.aabb(&(xform * slot.xform)).swept(motion);
            match slot.bpid {
                Some(id) => {
                    self.broadphase.move_element(id, aabb);
                    self.broadphase.set_static(id, is_static);
                }
                None => slot.bpid = Some(self.broadphase.create(obj, index, aabb, is_static)),
            }
        }
    }

    /// Drop broad-phase elements and every constraint hanging off them.
    pub(crate) fn remove_elements(&mut self, ids: &[ElementId], objs: &mut Objects<'_>) {
        for &id in ids {
            for (_, data) in self.broadphase.remove(id) {
                if let Some(cid) = data {
                    self.destroy_constraint(cid, objs);
                }
            }
        }
    }

    pub(crate) fn destroy_constraint(&mut self, cid: ConstraintId, objs: &mut Objects<'_>) {
        let Some(mut constraint) = self.constraints.remove(cid.0) else {
            return;
        };
        let mut ctx = PairContext {
            bodies: &mut *objs.bodies,
            areas: &mut *objs.areas,
            shapes: objs.shapes,
            config: &self.config,
            monitor_queries: &mut self.monitor_queries,
        };
        constraint.teardown(&mut ctx);
        match &constraint.pair {
            Pair::BodyBody(p) => {
                for id in [p.a, p.b] {
                    if let Some(body) = objs.bodies.get_mut(id.0) {
                        body.constraint_map.remove(&cid);
                    }
                }
            }
            Pair::BodyArea(p) => {
                if let Some(body) = objs.bodies.get_mut(p.body.0) {
                    body.constraint_map.remove(&cid);
                }
                if let Some(area) = objs.areas.get_mut(p.area.0) {
                    area.constraints.remove(&cid);
                }
            }
            Pair::AreaArea(p) => {
                for id in [p.area_a, p.area_b] {
                    if let Some(area) = objs.areas.get_mut(id.0) {
                        area.constraints.remove(&cid);
                    }
                }
            }
        }
    }

    fn update_pairs(&mut self, objs: &mut Objects<'_>) {
        let delta = self.broadphase.update();
        for (_, data) in delta.removed {
            if let Some(cid) = data {
                self.destroy_constraint(cid, objs);
            }
        }
        for key in delta.created {
            if let Some(cid) = self.create_pair(key, objs) {
                self.broadphase.set_pair_data(key, Some(cid));
            }
        }
    }

    /// Build the constraint for a new broad-phase pair. Areas always come
    /// first, so the pair kind follows from the owner order.
    fn create_pair(&mut self, key: PairKey, objs: &mut Objects<'_>) -> Option<ConstraintId> {
        let mut first = self.broadphase.owner(key.0)?;
        let mut second = self.broadphase.owner(key.1)?;
        if second.0 < first.0 {
            std::mem::swap(&mut first, &mut second);
        }
        let ((oa, sa), (ob, sb)) = (first, second);
        if !Self::layer_mask(objs, oa)?.interacts(Self::layer_mask(objs, ob)?) {
            return None;
        }
        let pair = match (oa, ob) {
            (ObjectId::Area(a), ObjectId::Area(b)) => Pair::AreaArea(Area2Pair::new(b, sb, a, sa)),
            (ObjectId::Area(a), ObjectId::Body(b)) => Pair::BodyArea(AreaPair::new(b, sb, a, sa)),
            (ObjectId::Body(a), ObjectId::Body(b)) => Pair::BodyBody(BodyPair::new(a, sa, b, sb)),
            (ObjectId::Body(_), ObjectId::Area(_)) => return None,
        };
        let cid = ConstraintId(self.constraints.insert(Constraint::new(pair)));
        match (oa, ob) {
            (ObjectId::Area(a), ObjectId::Area(b)) => {
                for id in [a, b] {
                    if let Some(area) = objs.areas.get_mut(id.0) {
                        area.constraints.insert(cid);
                    }
                    self.moved_areas.insert(id);
                }
            }
            (ObjectId::Area(a), ObjectId::Body(b)) => {
                if let Some(area) = objs.areas.get_mut(a.0) {
                    area.constraints.insert(cid);
                }
                self.moved_areas.insert(a);
                if let Some(body) = objs.bodies.get_mut(b.0) {
                    body.constraint_map.insert(cid, 0);
                    // Kinematic bodies must be seeds for the pair to be set up.
                    if body.mode == BodyMode::Kinematic {
                        body.set_active(true);
                        self.active_list.insert(b);
                    }
                }
            }
            (ObjectId::Body(a), ObjectId::Body(b)) => {
                if let Some(body) = objs.bodies.get_mut(a.0) {
                    body.constraint_map.insert(cid, 0);
                }
                if let Some(body) = objs.bodies.get_mut(b.0) {
                    body.constraint_map.insert(cid, 1);
                }
            }
            (ObjectId::Body(_), ObjectId::Area(_)) => {}
        }
        trace!("space: pair {:?}/{} - {:?}/{}", oa, sa, ob, sb);
        Some(cid)
    }

    /// Wake every sleeping body sharing a constraint with `id`.
    pub(crate) fn wake_neighbours(&mut self, id: BodyId, bodies: &mut Arena<Body>) {
        let Some(body) = bodies.get(id.0) else {
            return;
        };
        let cids: Vec<ConstraintId> = body.constraint_map.keys().copied().collect();
        for cid in cids {
            let Some(constraint) = self.constraints.get(cid.0) else {
                continue;
            };
            for other in constraint.bodies().into_iter().flatten().filter(|o| *o != id) {
                if let Some(b) = bodies.get_mut(other.0) {
                    if !b.active {
                        b.wakeup();
                        self.refresh_active(other, b);
                    }
                }
            }
        }
    }

    /// Detach an object: its elements and constraints go away.
    pub(crate) fn remove_object(&mut self, obj: ObjectId, objs: &mut Objects<'_>) {
        if let ObjectId::Body(id) = obj {
            self.wake_neighbours(id, objs.bodies);
        }
        let ids = Self::object_mut(objs, obj).map_or_else(Vec::new, |co| {
            co.pending_update = false;
            co.needs_reregister = false;
            co.take_elements(0)
        });
        self.remove_elements(&ids, objs);
        self.pending_shape_updates.remove(&obj);
        match obj {
            ObjectId::Body(id) => {
                self.bodies.remove(&id);
                self.active_list.remove(&id);
                self.inertia_updates.remove(&id);
                self.state_queries.remove(&id);
            }
            ObjectId::Area(id) => {
                self.areas.remove(&id);
                self.moved_areas.remove(&id);
                self.monitor_queries.remove(&id);
                if let Some(area) = objs.areas.get_mut(id.0) {
                    area.clear_monitored();
                }
            }
        }
    }

    fn passes_filter(filter: &QueryFilter, obj: ObjectId, co: &CollisionObject) -> bool {
        let kind_ok = match obj {
            ObjectId::Body(_) => filter.collide_with_bodies,
            ObjectId::Area(_) => filter.collide_with_areas,
        };
        kind_ok && co.layer_mask.layer & filter.mask != 0 && !filter.exclude.contains(&obj)
    }

    /// Closest hit along `from..to`.
    pub(crate) fn intersect_ray(
        &self,
        from: Vec2,
        to: Vec2,
        filter: &QueryFilter,
        bodies: &Arena<Body>,
        areas: &Arena<Area>,
        shapes: &Arena<Shape>,
    ) -> Option<RayResult> {
        let mut best: Option<(f32, RayResult)> = None;
        for (obj, index) in self.broadphase.cull_segment(from, to) {
            let Some(co) = Self::object(bodies, areas, obj) else {
                continue;
            };
            if !Self::passes_filter(filter, obj, co) || co.is_shape_disabled(index) {
                continue;
            }
            let Some(shape) = co.shape(index).ok().and_then(|s| shapes.get(s.0)) else {
                continue;
            };
            let xform = co.shape_world_xform(index);
            let inv = xform.inverse();
            let Some((p, n)) = shape.intersect_segment(inv.transform_point2(from), inv.transform_point2(to)) else {
                continue;
            };
            let position = xform.transform_point2(p);
            let dist = position.distance_squared(from);
            if best.as_ref().is_none_or(|(d, _)| dist < *d) {
                best = Some((
                    dist,
                    RayResult {
                        position,
                        normal: xform_normal(&xform, n),
                        collider: obj,
                        collider_instance: co.instance_id,
                        shape: index,
                    },
                ));
            }
        }
        best.map(|(_, hit)| hit)
    }

    /// Shapes containing `point`, at most `max_results`.
    pub(crate) fn intersect_point(
        &self,
        point: Vec2,
        filter: &QueryFilter,
        max_results: usize,
        bodies: &Arena<Body>,
        areas: &Arena<Area>,
        shapes: &Arena<Shape>,
    ) -> Vec<ShapeResult> {
        let mut out = Vec::new();
        for (obj, index) in self.broadphase.cull_point(point) {
            if out.len() >= max_results {
                break;
            }
            let Some(co) = Self::object(bodies, areas, obj) else {
                continue;
            };
            if !Self::passes_filter(filter, obj, co) || co.is_shape_disabled(index) {
                continue;
            }
            let Some(shape) = co.shape(index).ok().and_then(|s| shapes.get(s.0)) else {
                continue;
            };
            let local = co.shape_world_xform(index).inverse().transform_point2(point);
            if shape.contains_point(local) {
                out.push(ShapeResult {
                    collider: obj,
                    collider_instance: co.instance_id,
                    shape: index,
                });
            }
        }
        out
    }

    /// Body shapes `id` may collide with inside `aabb`.
    fn cull_for_body(
        &self,
        id: BodyId,
        body: &Body,
        aabb: &Aabb,
        query: &MotionQuery,
        bodies: &Arena<Body>,
    ) -> Vec<(BodyId, usize)> {
        self.broadphase
            .cull_aabb(aabb)
            .into_iter()
            .filter_map(|(obj, shape)| match obj {
                ObjectId::Body(other) => Some((other, shape)),
                ObjectId::Area(_) => None,
            })
            .filter(|&(other, shape)| {
                if other == id || query.exclude.contains(&other) || body.has_exception(other) {
                    return false;
                }
                let Some(o) = bodies.get(other.0) else {
                    return false;
                };
                if o.has_exception(id) || body.co.layer_mask.mask & o.co.layer_mask.layer == 0 {
                    return false;
                }
                if query.infinite_inertia && !o.mode.is_anchor() {
                    return false;
                }
                !o.co.is_shape_disabled(shape)
            })
            .collect()
    }

    fn other_shape<'o>(
        bodies: &'o Arena<Body>,
        shapes: &'o Arena<Shape>,
        other: BodyId,
        index: usize,
    ) -> Option<(&'o Body, &'o Shape, Affine2)> {
        let body = bodies.get(other.0)?;
        let shape = shapes.get(body.co.shape(index).ok()?.0)?;
        Some((body, shape, body.co.shape_world_xform(index)))
    }

    /// Sweep `body` from `query.from` along `query.motion`: first push it
    /// out of anything it overlaps, then binary-search the free fraction,
    /// then gather contact info at the first blocked position.
    pub(crate) fn test_body_motion(
        &self,
        id: BodyId,
        query: &MotionQuery,
        bodies: &Arena<Body>,
        shapes: &Arena<Shape>,
    ) -> Option<MotionResult> {
        let body = bodies.get(id.0)?;
        let local = body.co.local_bounds()?;
        let body_shapes: Vec<(usize, &Shape, Affine2)> = body
            .co
            .shapes
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.disabled)
            .filter_map(|(i, s)| shapes.get(s.shape.0).map(|shape| (i, shape, s.xform)))
            .filter(|(_, shape, _)| !(query.exclude_raycast_shapes && shape.shape_type() == ShapeType::Ray))
            .collect();

        let mut body_aabb = local.transformed(&query.from).grow(query.margin);
        let mut xform = query.from;

        for _ in 0..RECOVER_ATTEMPTS {
            let candidates = self.cull_for_body(id, body, &body_aabb, query, bodies);
            let mut found = DeepestPairs::new(RECOVER_RESULTS);
            for &(_, shape, local_xform) in &body_shapes {
                let shape_xform = xform * local_xform;
                for &(other, other_index) in &candidates {
                    let Some((_, other_shape, other_xform)) = Self::other_shape(bodies, shapes, other, other_index)
                    else {
                        continue;
                    };
                    let cb: &mut dyn FnMut(Vec2, Vec2) = &mut |a, b| found.push(a, b);
                    collision_solver::solve_with_margin(
                        shape,
                        &shape_xform,
                        Vec2::ZERO,
                        other_shape,
                        &other_xform,
                        Vec2::ZERO,
                        Some(cb),
                        None,
                        query.margin,
                        0.0,
                    );
                }
            }
            if found.is_empty() {
                break;
            }
            let recover: Vec2 = found.into_vec().iter().map(|(a, b)| (*b - *a) * 0.4).sum();
            if recover == Vec2::ZERO {
                break;
            }
            xform.translation += recover;
            body_aabb = body_aabb.translated(recover);
        }

        let motion = query.motion;
        let mut safe = 1.0f32;
        let mut unsafe_ = 1.0f32;
        let mut best_shape = None;
        let candidates = self.cull_for_body(id, body, &body_aabb.swept(motion), query, bodies);
        for &(index, shape, local_xform) in &body_shapes {
            let shape_xform = xform * local_xform;
            let mut stuck = false;
            let mut best_safe = 1.0f32;
            let mut best_unsafe = 1.0f32;
            for &(other, other_index) in &candidates {
                let Some((_, other_shape, other_xform)) = Self::other_shape(bodies, shapes, other, other_index) else {
                    continue;
                };
                if !collision_solver::solve(shape, &shape_xform, motion, other_shape, &other_xform, Vec2::ZERO, None) {
                    continue;
                }
                if collision_solver::solve(shape, &shape_xform, Vec2::ZERO, other_shape, &other_xform, Vec2::ZERO, None) {
                    stuck = true;
                    break;
                }
                let (mut low, mut hi) = (0.0f32, 1.0f32);
                let dir = motion.normalize_or_zero();
                for _ in 0..MOTION_SEARCH_STEPS {
                    let ofs = (low + hi) * 0.5;
                    let mut sep = dir;
                    let hit = collision_solver::solve_with_margin(
                        shape,
                        &shape_xform,
                        motion * ofs,
                        other_shape,
                        &other_xform,
                        Vec2::ZERO,
                        None,
                        Some(&mut sep),
                        0.0,
                        0.0,
                    );
                    if hit {
                        hi = ofs;
                    } else {
                        low = ofs;
                    }
                }
                if low < best_safe {
                    best_safe = low;
                    best_unsafe = hi;
                }
            }
            if stuck {
                safe = 0.0;
                unsafe_ = 0.0;
                best_shape = Some(index);
                break;
            }
            if best_safe < safe {
                safe = best_safe;
                unsafe_ = best_unsafe;
                best_shape = Some(index);
            }
        }

        if safe >= 1.0 {
            return None;
        }
        let (index, shape, local_xform) = body_shapes.iter().copied().find(|(i, _, _)| Some(*i) == best_shape)?;
        let mut rest_xform = xform;
        rest_xform.translation += motion * unsafe_;
        let shape_xform = rest_xform * local_xform;

        let mut best_len = 0.0f32;
        let mut best: Option<(BodyId, usize, Vec2, Vec2)> = None;
        let rest_aabb = body_aabb.translated(motion * unsafe_);
        for (other, other_index) in self.cull_for_body(id, body, &rest_aabb, query, bodies) {
            let Some((_, other_shape, other_xform)) = Self::other_shape(bodies, shapes, other, other_index) else {
                continue;
            };
            let cb: &mut dyn FnMut(Vec2, Vec2) = &mut |a, b| {
                let rel = b - a;
                let len = rel.length();
                if len > best_len {
                    best_len = len;
                    best = Some((other, other_index, b, rel / len));
                }
            };
            collision_solver::solve_with_margin(
                shape,
                &shape_xform,
                Vec2::ZERO,
                other_shape,
                &other_xform,
                Vec2::ZERO,
                Some(cb),
                None,
                query.margin,
                0.0,
            );
        }

        let (collider, collider_shape, point, normal) = best?;
        let collider_body = bodies.get(collider.0)?;
        let recovered = xform.translation - query.from.translation;
        Some(MotionResult {
            motion: motion * safe + recovered,
            remainder: motion - motion * safe,
            collision_point: point,
            collision_normal: normal,
            collider_velocity: collider_body.velocity_at(point),
            collision_local_shape: index,
            collider: Some(collider),
            collider_instance: collider_body.co.instance_id,
            collider_shape,
            collision_depth: best_len,
            collision_safe_fraction: safe,
            collision_unsafe_fraction: unsafe_,
        })
    }
}
