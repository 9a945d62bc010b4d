//! Pair constraints created for every overlapping broad-phase pair.
//!
//! Body pairs hold a small persistent contact manifold solved with
//! sequential impulses and warm-started from the previous step. Area pairs
//! only track overlap and feed monitor counters and gravity overrides.

use std::collections::BTreeSet;

use glam::{Affine2, Vec2};

use crate::area::Area;
use crate::arena::Arena;
use crate::body::{Body, BodyContact};
use crate::collision_solver;
use crate::shape::{Shape, basis_xform_inv};
use crate::types::{AreaId, BodyId, CcdMode, ObjectId, SpaceConfig, SpaceOverrideMode};

pub(crate) const MAX_CONTACTS: usize = 2;

/// Everything a pair needs from its space while being set up or torn down.
pub(crate) struct PairContext<'a> {
    pub bodies: &'a mut Arena<Body>,
    pub areas: &'a mut Arena<Area>,
    pub shapes: &'a Arena<Shape>,
    pub config: &'a SpaceConfig,
    /// Areas with monitor counters to deliver at the next flush.
    pub monitor_queries: &'a mut BTreeSet<AreaId>,
}

pub(crate) enum Pair {
    BodyBody(BodyPair),
    BodyArea(AreaPair),
    AreaArea(Area2Pair),
}

pub(crate) struct Constraint {
    /// Step that last claimed this constraint for an island.
    pub island_step: u64,
    pub pair: Pair,
}

impl Constraint {
    pub fn new(pair: Pair) -> Self {
        Self { island_step: 0, pair }
    }

    /// Bodies taking part, used to walk islands.
    pub fn bodies(&self) -> [Option<BodyId>; 2] {
        match &self.pair {
            Pair::BodyBody(p) => [Some(p.a), Some(p.b)],
            Pair::BodyArea(p) => [Some(p.body), None],
            Pair::AreaArea(_) => [None, None],
        }
    }

    /// Returns true when the constraint has impulses to solve this step.
    pub fn setup(&mut self, ctx: &mut PairContext<'_>, dt: f32) -> bool {
        match &mut self.pair {
            Pair::BodyBody(p) => p.setup(ctx, dt),
            Pair::BodyArea(p) => p.setup(ctx),
            Pair::AreaArea(p) => p.setup(ctx),
        }
    }

    pub fn solve(&mut self, bodies: &mut Arena<Body>) {
        if let Pair::BodyBody(p) = &mut self.pair {
            p.solve(bodies);
        }
    }

    /// Undo any overlap state this pair published.
    pub fn teardown(&mut self, ctx: &mut PairContext<'_>) {
        match &mut self.pair {
            Pair::BodyBody(_) => {}
            Pair::BodyArea(p) => p.teardown(ctx),
            Pair::AreaArea(p) => p.teardown(ctx),
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct Contact {
    local_a: Vec2,
    local_b: Vec2,
    /// Points from A's contact point to B's.
    normal: Vec2,
    acc_normal_impulse: f32,
    acc_tangent_impulse: f32,
    acc_bias_impulse: f32,
    mass_normal: f32,
    mass_tangent: f32,
    bias: f32,
    bounce: f32,
    depth: f32,
    active: bool,
    /// Found again by the narrow phase this step.
    reused: bool,
    r_a: Vec2,
    r_b: Vec2,
}

fn tangent(n: Vec2) -> Vec2 {
    Vec2::new(n.y, -n.x)
}

/// Velocity contribution of spin `w` at arm `r`.
fn spin(w: f32, r: Vec2) -> Vec2 {
    Vec2::new(-w * r.y, w * r.x)
}

/// Basis-only transform of `v`.
fn basis_xform(xform: &Affine2, v: Vec2) -> Vec2 {
    xform.matrix2 * v
}

pub(crate) struct BodyPair {
    pub a: BodyId,
    pub shape_a: usize,
    pub b: BodyId,
    pub shape_b: usize,
    offset_b: Vec2,
    sep_axis: Vec2,
    contacts: [Contact; MAX_CONTACTS],
    contact_count: usize,
    collided: bool,
}

impl BodyPair {
    pub fn new(a: BodyId, shape_a: usize, b: BodyId, shape_b: usize) -> Self {
        Self {
            a,
            shape_a,
            b,
            shape_b,
            offset_b: Vec2::ZERO,
            sep_axis: Vec2::ZERO,
            contacts: [Contact::default(); MAX_CONTACTS],
            contact_count: 0,
            collided: false,
        }
    }

    #[cfg(test)]
    pub fn contact_count(&self) -> usize {
        self.contact_count
    }

    /// Drop contacts not found last step or drifted too far apart.
    fn validate_contacts(&mut self, a: &Body, b: &Body, config: &SpaceConfig) {
        let max_sep = config.contact_max_separation;
        let mut i = 0;
        while i < self.contact_count {
            let c = &mut self.contacts[i];
            let mut erase = !c.reused;
            if !erase {
                c.reused = false;
                let global_a = basis_xform(&a.co.transform, c.local_a);
                let global_b = basis_xform(&b.co.transform, c.local_b) + self.offset_b;
                let depth = (global_a - global_b).dot(c.normal);
                erase = depth < -max_sep
                    || (global_b + c.normal * depth - global_a).length_squared() > max_sep * max_sep;
            }
            if erase {
                self.contacts.swap(i, self.contact_count - 1);
                self.contact_count -= 1;
            } else {
                i += 1;
            }
        }
    }

    /// Merge a freshly found (point on A, point on B) pair, both relative
    /// to A's origin, into the manifold.
    fn contact_added(&mut self, a: &Body, b: &Body, point_a: Vec2, point_b: Vec2, config: &SpaceConfig) {
        let local_a = a.co.inv_transform.matrix2 * point_a;
        let local_b = b.co.inv_transform.matrix2 * (point_b - self.offset_b);
        let mut contact = Contact {
            local_a,
            local_b,
            normal: (point_a - point_b).normalize_or_zero(),
            reused: true,
            ..Contact::default()
        };

        let recycle = config.contact_recycle_radius * config.contact_recycle_radius;
        let mut index = self.contact_count;
        for (i, c) in self.contacts[..self.contact_count].iter().enumerate() {
            if c.local_a.distance_squared(local_a) < recycle && c.local_b.distance_squared(local_b) < recycle {
                contact.acc_normal_impulse = c.acc_normal_impulse;
                contact.acc_tangent_impulse = c.acc_tangent_impulse;
                contact.acc_bias_impulse = c.acc_bias_impulse;
                index = i;
                break;
            }
        }

        if index == MAX_CONTACTS {
            // Full: replace the shallowest contact if the new one is deeper.
            let depth_of = |c: &Contact| {
                let global_a = basis_xform(&a.co.transform, c.local_a);
                let global_b = basis_xform(&b.co.transform, c.local_b) + self.offset_b;
                (global_a - global_b).dot(c.normal)
            };
            let mut least = MAX_CONTACTS;
            let mut min_depth = depth_of(&contact);
            for (i, c) in self.contacts.iter().enumerate() {
                let d = depth_of(c);
                if d < min_depth {
                    min_depth = d;
                    least = i;
                }
            }
            if least < MAX_CONTACTS {
                self.contacts[least] = contact;
            }
            return;
        }
        self.contacts[index] = contact;
        if index == self.contact_count {
            self.contact_count += 1;
        }
    }

    /// Cast the fast-moving support point of `mover` along its motion.
    /// Transforms are relative to the pair's origin.
    #[allow(clippy::too_many_arguments)]
    fn test_ccd(
        dt: f32,
        mover: &Body,
        mover_shape: &Shape,
        mover_xform: &Affine2,
        other_shape: &Shape,
        other_xform: &Affine2,
    ) -> Option<(Vec2, Vec2)> {
        let motion = mover.linear_velocity * dt;
        let len = motion.length();
        if len < 1e-5 {
            return None;
        }
        let dir = motion / len;
        let (min, max) = mover_shape.project_range(dir, mover_xform);
        if len <= (max - min) * 0.3 {
            return None;
        }
        let support = *mover_shape
            .supports(basis_xform_inv(mover_xform, dir).normalize_or_zero())
            .as_slice()
            .first()?;
        let from = mover_xform.transform_point2(support);
        let to = from + motion;
        let inv = other_xform.inverse();
        // Start slightly behind the support so grazing starts still hit.
        let local_from = inv.transform_point2(from - dir * len * 0.1);
        let local_to = inv.transform_point2(to);
        let (hit, _) = other_shape.intersect_segment(local_from, local_to)?;
        Some((to, other_xform.transform_point2(hit)))
    }

    pub fn setup(&mut self, ctx: &mut PairContext<'_>, dt: f32) -> bool {
        let Some((a, b)) = ctx.bodies.get2_mut(self.a.0, self.b.0) else {
            self.collided = false;
            return false;
        };
        let both_anchors = a.mode.is_anchor() && b.mode.is_anchor();
        if !a.co.layer_mask.interacts(b.co.layer_mask)
            || a.has_exception(self.b)
            || b.has_exception(self.a)
            || (both_anchors && !a.can_report_contacts() && !b.can_report_contacts())
            || a.co.is_shape_disabled(self.shape_a)
            || b.co.is_shape_disabled(self.shape_b)
        {
            self.collided = false;
            return false;
        }
        let (Some(slot_a), Some(slot_b)) = (a.co.shapes.get(self.shape_a), b.co.shapes.get(self.shape_b)) else {
            self.collided = false;
            return false;
        };
        let (Some(shape_a), Some(shape_b)) = (ctx.shapes.get(slot_a.shape.0), ctx.shapes.get(slot_b.shape.0)) else {
            self.collided = false;
            return false;
        };
        if shape_a.is_query_only() || shape_b.is_query_only() {
            self.collided = false;
            return false;
        }

        let offset_a = a.co.transform.translation;
        self.offset_b = b.co.transform.translation - offset_a;
        self.validate_contacts(a, b, ctx.config);

        let mut xform_au = a.co.transform;
        xform_au.translation = Vec2::ZERO;
        let xform_a = xform_au * slot_a.xform;
        let mut xform_bu = b.co.transform;
        xform_bu.translation -= offset_a;
        let xform_b = xform_bu * slot_b.xform;

        let motion_a = if a.continuous_cd == CcdMode::CastShape { a.motion } else { Vec2::ZERO };
        let motion_b = if b.continuous_cd == CcdMode::CastShape { b.motion } else { Vec2::ZERO };

        let mut found: Vec<(Vec2, Vec2)> = Vec::new();
        let mut collect = |pa: Vec2, pb: Vec2| found.push((pa, pb));
        let callback: &mut dyn FnMut(Vec2, Vec2) = &mut collect;
        self.collided = collision_solver::solve_with_margin(
            shape_a,
            &xform_a,
            motion_a,
            shape_b,
            &xform_b,
            motion_b,
            Some(callback),
            Some(&mut self.sep_axis),
            0.0,
            0.0,
        );

        if !self.collided {
            if a.continuous_cd == CcdMode::CastRay && !a.mode.is_anchor() {
                if let Some(pair) = Self::test_ccd(dt, a, shape_a, &xform_a, shape_b, &xform_b) {
                    found.push(pair);
                    self.collided = true;
                }
            }
            if b.continuous_cd == CcdMode::CastRay && !b.mode.is_anchor() {
                if let Some((pb, pa)) = Self::test_ccd(dt, b, shape_b, &xform_b, shape_a, &xform_a) {
                    found.push((pa, pb));
                    self.collided = true;
                }
            }
            if !self.collided {
                return false;
            }
        }
        for (pa, pb) in found {
            self.contact_added(a, b, pa, pb, ctx.config);
        }

        let max_penetration = ctx.config.contact_max_allowed_penetration;
        let (bias_a, bias_b) = (shape_a.custom_bias(), shape_b.custom_bias());
        let bias = if bias_a == 0.0 && bias_b == 0.0 {
            ctx.config.constraint_default_bias
        } else if bias_a == 0.0 {
            bias_b
        } else if bias_b == 0.0 {
            bias_a
        } else {
            (bias_a + bias_b) * 0.5
        };
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        let bounce = (a.bounce + b.bounce).clamp(0.0, 1.0);

        let mut do_process = false;
        for c in &mut self.contacts[..self.contact_count] {
            let global_a = basis_xform(&xform_au, c.local_a);
            let global_b = xform_bu.transform_point2(c.local_b);
            let depth = c.normal.dot(global_a - global_b);
            if depth <= 0.0 || !c.reused {
                c.active = false;
                continue;
            }
            c.active = true;

            if a.can_report_contacts() {
                let at = global_b + offset_a;
                a.add_contact(BodyContact {
                    local_position: global_a + offset_a,
                    local_normal: -c.normal,
                    depth,
                    local_shape: self.shape_a,
                    collider_position: at,
                    collider_shape: self.shape_b,
                    collider_instance: b.co.instance_id,
                    collider: self.b,
                    collider_velocity_at_position: b.velocity_at(at),
                });
            }
            if b.can_report_contacts() {
                let at = global_a + offset_a;
                b.add_contact(BodyContact {
                    local_position: global_b + offset_a,
                    local_normal: c.normal,
                    depth,
                    local_shape: self.shape_b,
                    collider_position: at,
                    collider_shape: self.shape_a,
                    collider_instance: a.co.instance_id,
                    collider: self.a,
                    collider_velocity_at_position: a.velocity_at(at),
                });
            }
            if both_anchors {
                // Reported only; nothing can move.
                c.active = false;
                continue;
            }
            do_process = true;

            c.r_a = global_a;
            c.r_b = global_b - self.offset_b;
            let rn_a = c.r_a.dot(c.normal);
            let rn_b = c.r_b.dot(c.normal);
            let k_normal = a.inv_mass
                + b.inv_mass
                + a.inv_inertia * (c.r_a.length_squared() - rn_a * rn_a)
                + b.inv_inertia * (c.r_b.length_squared() - rn_b * rn_b);
            c.mass_normal = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

            let t = tangent(c.normal);
            let rt_a = c.r_a.dot(t);
            let rt_b = c.r_b.dot(t);
            let k_tangent = a.inv_mass
                + b.inv_mass
                + a.inv_inertia * (c.r_a.length_squared() - rt_a * rt_a)
                + b.inv_inertia * (c.r_b.length_squared() - rt_b * rt_b);
            c.mass_tangent = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

            c.bias = -bias * inv_dt * (max_penetration - depth).min(0.0);
            c.depth = depth;

            // Warm start.
            let p = c.normal * c.acc_normal_impulse + t * c.acc_tangent_impulse;
            a.apply_impulse(c.r_a, -p);
            b.apply_impulse(c.r_b, p);

            c.bounce = bounce;
            if c.bounce != 0.0 {
                let dv = b.linear_velocity + spin(b.angular_velocity, c.r_b)
                    - a.linear_velocity
                    - spin(a.angular_velocity, c.r_a);
                c.bounce *= dv.dot(c.normal);
            }
        }
        do_process
    }

    pub fn solve(&mut self, bodies: &mut Arena<Body>) {
        if !self.collided {
            return;
        }
        let Some((a, b)) = bodies.get2_mut(self.a.0, self.b.0) else {
            return;
        };
        let friction = a.friction.min(b.friction).abs();
        for c in self.contacts[..self.contact_count].iter_mut().filter(|c| c.active) {
            let dv = b.linear_velocity + spin(b.angular_velocity, c.r_b)
                - a.linear_velocity
                - spin(a.angular_velocity, c.r_a);
            let dbv = b.biased_linear_velocity + spin(b.biased_angular_velocity, c.r_b)
                - a.biased_linear_velocity
                - spin(a.biased_angular_velocity, c.r_a);
            let vn = dv.dot(c.normal);
            let vbn = dbv.dot(c.normal);
            let t = tangent(c.normal);
            let vt = dv.dot(t);

            let jbn = (c.bias - vbn) * c.mass_normal;
            let jbn_old = c.acc_bias_impulse;
            c.acc_bias_impulse = (jbn_old + jbn).max(0.0);
            let jb = c.normal * (c.acc_bias_impulse - jbn_old);
            a.apply_bias_impulse(c.r_a, -jb);
            b.apply_bias_impulse(c.r_b, jb);

            let jn = -(c.bounce + vn) * c.mass_normal;
            let jn_old = c.acc_normal_impulse;
            c.acc_normal_impulse = (jn_old + jn).max(0.0);

            let jt_max = friction * c.acc_normal_impulse;
            let jt = -vt * c.mass_tangent;
            let jt_old = c.acc_tangent_impulse;
            c.acc_tangent_impulse = (jt_old + jt).clamp(-jt_max, jt_max);

            let j = c.normal * (c.acc_normal_impulse - jn_old) + t * (c.acc_tangent_impulse - jt_old);
            a.apply_impulse(c.r_a, -j);
            b.apply_impulse(c.r_b, j);
        }
    }
}

/// Body overlapping an area.
pub(crate) struct AreaPair {
    pub body: BodyId,
    pub body_shape: usize,
    pub area: AreaId,
    pub area_shape: usize,
    colliding: bool,
}

impl AreaPair {
    pub fn new(body: BodyId, body_shape: usize, area: AreaId, area_shape: usize) -> Self {
        Self {
            body,
            body_shape,
            area,
            area_shape,
            colliding: false,
        }
    }

    fn publish(&self, ctx: &mut PairContext<'_>, entered: bool) {
        let (Some(body), Some(area)) = (ctx.bodies.get_mut(self.body.0), ctx.areas.get_mut(self.area.0)) else {
            return;
        };
        if area.override_mode != SpaceOverrideMode::Disabled {
            if entered {
                body.add_area(self.area);
            } else {
                body.remove_area(self.area);
            }
        }
        if area.has_monitor_callback() {
            let other = ObjectId::Body(self.body);
            let instance = body.co.instance_id;
            if entered {
                area.add_body_to_query(other, instance, self.body_shape, self.area_shape);
            } else {
                area.remove_body_from_query(other, instance, self.body_shape, self.area_shape);
            }
            ctx.monitor_queries.insert(self.area);
        }
    }

    fn overlaps(&self, ctx: &PairContext<'_>) -> bool {
        let (Some(body), Some(area)) = (ctx.bodies.get(self.body.0), ctx.areas.get(self.area.0)) else {
            return false;
        };
        if area.co.is_shape_disabled(self.area_shape) || body.co.is_shape_disabled(self.body_shape) {
            return false;
        }
        if !area.co.layer_mask.interacts(body.co.layer_mask) {
            return false;
        }
        let (Ok(bs), Ok(ash)) = (body.co.shape(self.body_shape), area.co.shape(self.area_shape)) else {
            return false;
        };
        let (Some(body_shape), Some(area_shape)) = (ctx.shapes.get(bs.0), ctx.shapes.get(ash.0)) else {
            return false;
        };
        collision_solver::solve(
            body_shape,
            &body.co.shape_world_xform(self.body_shape),
            Vec2::ZERO,
            area_shape,
            &area.co.shape_world_xform(self.area_shape),
            Vec2::ZERO,
            None,
        )
    }

    /// Never asks for solving.
    pub fn setup(&mut self, ctx: &mut PairContext<'_>) -> bool {
        let result = self.overlaps(ctx);
        if result != self.colliding {
            self.publish(ctx, result);
            self.colliding = result;
        }
        false
    }

    pub fn teardown(&mut self, ctx: &mut PairContext<'_>) {
        if self.colliding {
            self.publish(ctx, false);
            self.colliding = false;
        }
    }
}

/// Two overlapping areas. Bookkeeping only.
pub(crate) struct Area2Pair {
    pub area_a: AreaId,
    pub shape_a: usize,
    pub area_b: AreaId,
    pub shape_b: usize,
    colliding: bool,
}

impl Area2Pair {
    pub fn new(area_a: AreaId, shape_a: usize, area_b: AreaId, shape_b: usize) -> Self {
        Self {
            area_a,
            shape_a,
            area_b,
            shape_b,
            colliding: false,
        }
    }

    fn overlaps(&self, areas: &Arena<Area>, shapes: &Arena<Shape>) -> bool {
        let (Some(a), Some(b)) = (areas.get(self.area_a.0), areas.get(self.area_b.0)) else {
            return false;
        };
        if a.co.is_shape_disabled(self.shape_a) || b.co.is_shape_disabled(self.shape_b) {
            return false;
        }
        if !a.co.layer_mask.interacts(b.co.layer_mask) {
            return false;
        }
        let (Ok(sa), Ok(sb)) = (a.co.shape(self.shape_a), b.co.shape(self.shape_b)) else {
            return false;
        };
        let (Some(shape_a), Some(shape_b)) = (shapes.get(sa.0), shapes.get(sb.0)) else {
            return false;
        };
        collision_solver::solve(
            shape_a,
            &a.co.shape_world_xform(self.shape_a),
            Vec2::ZERO,
            shape_b,
            &b.co.shape_world_xform(self.shape_b),
            Vec2::ZERO,
            None,
        )
    }

    fn publish(&self, ctx: &mut PairContext<'_>, entered: bool) {
        let Some((a, b)) = ctx.areas.get2_mut(self.area_a.0, self.area_b.0) else {
            return;
        };
        if b.has_area_monitor_callback() && a.monitorable {
            let other = ObjectId::Area(self.area_a);
            if entered {
                b.add_area_to_query(other, a.co.instance_id, self.shape_a, self.shape_b);
            } else {
                b.remove_area_from_query(other, a.co.instance_id, self.shape_a, self.shape_b);
            }
            ctx.monitor_queries.insert(self.area_b);
        }
        if a.has_area_monitor_callback() && b.monitorable {
            let other = ObjectId::Area(self.area_b);
            if entered {
                a.add_area_to_query(other, b.co.instance_id, self.shape_b, self.shape_a);
            } else {
                a.remove_area_from_query(other, b.co.instance_id, self.shape_b, self.shape_a);
            }
            ctx.monitor_queries.insert(self.area_a);
        }
    }

    /// Never asks for solving.
    pub fn setup(&mut self, ctx: &mut PairContext<'_>) -> bool {
        let result = self.overlaps(ctx.areas, ctx.shapes);
        if result != self.colliding {
            self.publish(ctx, result);
            self.colliding = result;
        }
        false
    }

    pub fn teardown(&mut self, ctx: &mut PairContext<'_>) {
        if self.colliding {
            self.publish(ctx, false);
            self.colliding = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Handle;
    use crate::shape::ShapeData;
    use crate::types::{BodyMode, ShapeId, SpaceId};

    struct Fixture {
        bodies: Arena<Body>,
        areas: Arena<Area>,
        shapes: Arena<Shape>,
        config: SpaceConfig,
        queries: BTreeSet<AreaId>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                bodies: Arena::new(),
                areas: Arena::new(),
                shapes: Arena::new(),
                config: SpaceConfig::default(),
                queries: BTreeSet::new(),
            }
        }

        fn shape(&mut self, data: ShapeData) -> ShapeId {
            ShapeId(self.shapes.insert(Shape::new(data).unwrap()))
        }

        fn body(&mut self, shape: ShapeId, at: Vec2, mode: BodyMode) -> BodyId {
            let mut b = Body::new();
            b.co.space = Some(SpaceId(Handle {
                index: 0,
                generation: 0,
            }));
            let s = self.shapes.get(shape.0).unwrap().clone();
            b.co.add_shape(shape, &s, Affine2::IDENTITY);
            b.co.set_transform(Affine2::from_translation(at));
            b.set_mode(mode);
            b.update_inertias(&self.shapes);
            BodyId(self.bodies.insert(b))
        }

        fn ctx(&mut self) -> PairContext<'_> {
            PairContext {
                bodies: &mut self.bodies,
                areas: &mut self.areas,
                shapes: &self.shapes,
                config: &self.config,
                monitor_queries: &mut self.queries,
            }
        }
    }

    #[test]
    fn test_overlapping_circles_push_apart() {
        let mut f = Fixture::new();
        let circle = f.shape(ShapeData::Circle { radius: 1.0 });
        let a = f.body(circle, Vec2::ZERO, BodyMode::Rigid);
        let b = f.body(circle, Vec2::new(1.5, 0.0), BodyMode::Rigid);
        let mut pair = BodyPair::new(a, 0, b, 0);
        assert!(pair.setup(&mut f.ctx(), 1.0 / 60.0));
        assert_eq!(pair.contact_count(), 1);
        for _ in 0..8 {
            pair.solve(&mut f.bodies);
        }
        let ba = f.bodies.get(a.0).unwrap();
        let bb = f.bodies.get(b.0).unwrap();
        // Bias pushes A left and B right; real velocities stay at rest.
        assert!(ba.biased_linear_velocity.x < 0.0);
        assert!(bb.biased_linear_velocity.x > 0.0);
        assert!(ba.linear_velocity.x.abs() < 1e-4);
    }

    #[test]
    fn test_approaching_bodies_stop() {
        let mut f = Fixture::new();
        let circle = f.shape(ShapeData::Circle { radius: 1.0 });
        let a = f.body(circle, Vec2::ZERO, BodyMode::Rigid);
        let b = f.body(circle, Vec2::new(1.9, 0.0), BodyMode::Rigid);
        f.bodies.get_mut(a.0).unwrap().linear_velocity = Vec2::new(2.0, 0.0);
        f.bodies.get_mut(b.0).unwrap().linear_velocity = Vec2::new(-2.0, 0.0);
        let mut pair = BodyPair::new(a, 0, b, 0);
        assert!(pair.setup(&mut f.ctx(), 1.0 / 60.0));
        for _ in 0..8 {
            pair.solve(&mut f.bodies);
        }
        let va = f.bodies.get(a.0).unwrap().linear_velocity;
        let vb = f.bodies.get(b.0).unwrap().linear_velocity;
        assert!(vb.x - va.x >= -1e-4);
    }

    #[test]
    fn test_exceptions_and_static_pairs_skip() {
        let mut f = Fixture::new();
        let circle = f.shape(ShapeData::Circle { radius: 1.0 });
        let a = f.body(circle, Vec2::ZERO, BodyMode::Rigid);
        let b = f.body(circle, Vec2::new(0.5, 0.0), BodyMode::Rigid);
        f.bodies.get_mut(a.0).unwrap().exceptions.insert(b);
        let mut pair = BodyPair::new(a, 0, b, 0);
        assert!(!pair.setup(&mut f.ctx(), 1.0 / 60.0));

        let s = f.body(circle, Vec2::ZERO, BodyMode::Static);
        let k = f.body(circle, Vec2::new(0.5, 0.0), BodyMode::Kinematic);
        let mut pair = BodyPair::new(s, 0, k, 0);
        assert!(!pair.setup(&mut f.ctx(), 1.0 / 60.0));
    }

    #[test]
    fn test_segment_shapes_get_no_response() {
        let mut f = Fixture::new();
        let circle = f.shape(ShapeData::Circle { radius: 1.0 });
        let seg = f.shape(ShapeData::Segment {
            a: Vec2::new(-2.0, 0.0),
            b: Vec2::new(2.0, 0.0),
        });
        let a = f.body(circle, Vec2::new(0.0, 0.5), BodyMode::Rigid);
        let b = f.body(seg, Vec2::ZERO, BodyMode::Static);
        let mut pair = BodyPair::new(a, 0, b, 0);
        assert!(!pair.setup(&mut f.ctx(), 1.0 / 60.0));
    }

    #[test]
    fn test_area_pair_counts_once_per_transition() {
        let mut f = Fixture::new();
        let circle = f.shape(ShapeData::Circle { radius: 1.0 });
        let b = f.body(circle, Vec2::ZERO, BodyMode::Rigid);
        let mut area = Area::new();
        let s = f.shapes.get(circle.0).unwrap().clone();
        area.co.add_shape(circle, &s, Affine2::IDENTITY);
        area.monitor_callback = Some(crate::area::MonitorCallback::new(1, |_| {}));
        area.set_space_override_mode(SpaceOverrideMode::Combine);
        let a = AreaId(f.areas.insert(area));

        let mut pair = AreaPair::new(b, 0, a, 0);
        assert!(!pair.setup(&mut f.ctx()));
        assert!(!pair.setup(&mut f.ctx()));
        assert!(f.queries.contains(&a));
        assert_eq!(f.bodies.get(b.0).unwrap().areas.get(&a), Some(&1));
        assert_eq!(f.areas.get(a.0).unwrap().monitored_bodies.values().sum::<i32>(), 1);

        pair.teardown(&mut f.ctx());
        assert!(f.bodies.get(b.0).unwrap().areas.is_empty());
        assert_eq!(f.areas.get(a.0).unwrap().monitored_bodies.values().sum::<i32>(), 0);
    }
}
