//! Rigid bodies: mass properties, integration, sleeping, contact reports.
//!
//! Body methods only touch the body itself. Anything that needs the space
//! (active list, broad phase, inertia queue) is signalled through flags and
//! reconciled by the space afterwards.

use std::collections::{BTreeMap, BTreeSet};

use glam::{Affine2, Mat2, Vec2};

use crate::area::Area;
use crate::arena::Arena;
use crate::collision_object::CollisionObject;
use crate::error::{PhysicsError, Result};
use crate::shape::Shape;
use crate::types::{
    AreaId, AreaParams, BodyId, BodyMode, BodyParam, BodyState, CcdMode, ConstraintId, InstanceId,
    SpaceConfig, SpaceOverrideMode, Transform2D,
};

/// Contact reported to a body with `max_contacts_reported > 0`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BodyContact {
    pub local_position: Vec2,
    pub local_normal: Vec2,
    pub depth: f32,
    pub local_shape: usize,
    pub collider_position: Vec2,
    pub collider_shape: usize,
    pub collider_instance: InstanceId,
    pub collider: BodyId,
    pub collider_velocity_at_position: Vec2,
}

/// Custom integration hook run from `flush_queries`.
pub type ForceIntegrationCallback = Box<dyn FnMut(&mut BodyDirectState<'_>)>;

pub struct Body {
    pub(crate) co: CollisionObject,
    pub(crate) mode: BodyMode,

    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    pub(crate) inertia: f32,
    pub(crate) inv_inertia: f32,
    pub(crate) user_inertia: bool,
    pub(crate) pending_inertia: bool,

    pub(crate) bounce: f32,
    pub(crate) friction: f32,
    pub(crate) gravity_scale: f32,
    pub(crate) linear_damp: f32,
    pub(crate) angular_damp: f32,

    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f32,
    pub(crate) biased_linear_velocity: Vec2,
    pub(crate) biased_angular_velocity: f32,
    pub(crate) applied_force: Vec2,
    pub(crate) applied_torque: f32,

    /// Results of the last area evaluation.
    pub(crate) gravity: Vec2,
    pub(crate) area_linear_damp: f32,
    pub(crate) area_angular_damp: f32,

    pub(crate) still_time: f32,
    pub(crate) can_sleep: bool,
    pub(crate) active: bool,
    pub(crate) first_integration: bool,
    pub(crate) omit_force_integration: bool,
    pub(crate) continuous_cd: CcdMode,
    /// Motion over the current step, used by shape casting.
    pub(crate) motion: Vec2,

    pub(crate) exceptions: BTreeSet<BodyId>,
    /// Constraint -> this body's index inside it.
    pub(crate) constraint_map: BTreeMap<ConstraintId, usize>,
    /// Overriding areas currently overlapping, with overlap counts.
    pub(crate) areas: BTreeMap<AreaId, u32>,
    pub(crate) contacts: Vec<BodyContact>,
    pub(crate) max_contacts_reported: usize,
    pub(crate) island_step: u64,
    pub(crate) force_integration: Option<ForceIntegrationCallback>,
}

impl Default for Body {
    fn default() -> Self {
        Self::new()
    }
}

impl Body {
    pub fn new() -> Self {
        Self {
            co: CollisionObject::new(false),
            mode: BodyMode::Rigid,
            mass: 1.0,
            inv_mass: 1.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            user_inertia: false,
            pending_inertia: true,
            bounce: 0.0,
            friction: 1.0,
            gravity_scale: 1.0,
            linear_damp: -1.0,
            angular_damp: -1.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            biased_linear_velocity: Vec2::ZERO,
            biased_angular_velocity: 0.0,
            applied_force: Vec2::ZERO,
            applied_torque: 0.0,
            gravity: Vec2::ZERO,
            area_linear_damp: 0.0,
            area_angular_damp: 0.0,
            still_time: 0.0,
            can_sleep: true,
            active: true,
            first_integration: false,
            omit_force_integration: false,
            continuous_cd: CcdMode::Disabled,
            motion: Vec2::ZERO,
            exceptions: BTreeSet::new(),
            constraint_map: BTreeMap::new(),
            areas: BTreeMap::new(),
            contacts: Vec::new(),
            max_contacts_reported: 0,
            island_step: 0,
            force_integration: None,
        }
    }

    pub fn collision_object(&self) -> &CollisionObject {
        &self.co
    }

    pub fn mode(&self) -> BodyMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn inverse_mass(&self) -> f32 {
        self.inv_mass
    }

    pub fn inverse_inertia(&self) -> f32 {
        self.inv_inertia
    }

    pub fn contacts(&self) -> &[BodyContact] {
        &self.contacts
    }

    /// Rotation angle of the body's basis.
    pub fn rotation(&self) -> f32 {
        let x = self.co.transform.matrix2.x_axis;
        x.y.atan2(x.x)
    }

    pub fn has_exception(&self, other: BodyId) -> bool {
        self.exceptions.contains(&other)
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        if active && self.mode == BodyMode::Static {
            return;
        }
        self.active = active;
    }

    /// Reset the sleep timer and mark active. Anchors and bodies outside a
    /// space are left alone.
    pub(crate) fn wakeup(&mut self) {
        if self.co.space.is_none() || self.mode.is_anchor() {
            return;
        }
        self.still_time = 0.0;
        self.set_active(true);
    }

    pub(crate) fn set_mode(&mut self, mode: BodyMode) {
        self.mode = mode;
        match mode {
            BodyMode::Static | BodyMode::Kinematic => {
                self.inv_mass = 0.0;
                self.inv_inertia = 0.0;
                self.co.is_static = mode == BodyMode::Static;
                self.active = false;
                self.linear_velocity = Vec2::ZERO;
                self.angular_velocity = 0.0;
            }
            BodyMode::Rigid => {
                self.inv_mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };
                self.inv_inertia = if self.inertia > 0.0 { 1.0 / self.inertia } else { 0.0 };
                self.co.is_static = false;
                self.active = true;
            }
            BodyMode::Character => {
                self.inv_mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };
                self.inv_inertia = 0.0;
                self.co.is_static = false;
                self.active = true;
                self.angular_velocity = 0.0;
            }
        }
        self.pending_inertia = true;
        self.co.pending_update = true;
    }

    pub(crate) fn set_param(&mut self, param: BodyParam) -> Result<()> {
        match param {
            BodyParam::Bounce(v) => self.bounce = v,
            BodyParam::Friction(v) => self.friction = v,
            BodyParam::Mass(v) => {
                if !(v.is_finite() && v > 0.0) {
                    return Err(PhysicsError::InvalidConfiguration("mass must be positive"));
                }
                self.mass = v;
                if matches!(self.mode, BodyMode::Rigid | BodyMode::Character) {
                    self.inv_mass = 1.0 / v;
                }
                self.pending_inertia = true;
            }
            BodyParam::Inertia(v) => {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(PhysicsError::InvalidConfiguration("inertia must be non-negative"));
                }
                if v == 0.0 {
                    self.user_inertia = false;
                } else {
                    self.user_inertia = true;
                    self.inertia = v;
                    if self.mode == BodyMode::Rigid {
                        self.inv_inertia = 1.0 / v;
                    }
                }
                self.pending_inertia = true;
            }
            BodyParam::GravityScale(v) => self.gravity_scale = v,
            BodyParam::LinearDamp(v) => self.linear_damp = v,
            BodyParam::AngularDamp(v) => self.angular_damp = v,
        }
        Ok(())
    }

    /// Current value of the parameter `param` names (its payload is ignored).
    pub fn param(&self, param: BodyParam) -> f32 {
        match param {
            BodyParam::Bounce(_) => self.bounce,
            BodyParam::Friction(_) => self.friction,
            BodyParam::Mass(_) => self.mass,
            BodyParam::Inertia(_) => self.inertia,
            BodyParam::GravityScale(_) => self.gravity_scale,
            BodyParam::LinearDamp(_) => self.linear_damp,
            BodyParam::AngularDamp(_) => self.angular_damp,
        }
    }

    pub(crate) fn set_state(&mut self, state: BodyState) {
        match state {
            BodyState::Transform(xform) => {
                self.co.set_transform(xform);
                if self.mode == BodyMode::Kinematic {
                    self.set_active(true);
                }
                self.wakeup();
            }
            BodyState::LinearVelocity(v) => {
                self.linear_velocity = v;
                self.wakeup();
            }
            BodyState::AngularVelocity(w) => {
                self.angular_velocity = w;
                self.wakeup();
            }
            BodyState::Sleeping(sleep) => {
                if self.mode.is_anchor() {
                    return;
                }
                if sleep {
                    self.linear_velocity = Vec2::ZERO;
                    self.angular_velocity = 0.0;
                    self.set_active(false);
                } else {
                    self.set_active(true);
                }
            }
            BodyState::CanSleep(can_sleep) => {
                self.can_sleep = can_sleep;
                if self.mode == BodyMode::Rigid && !self.active && !can_sleep {
                    self.set_active(true);
                }
            }
        }
    }

    /// Recompute mass properties from the shape list.
    pub(crate) fn update_inertias(&mut self, shapes: &Arena<Shape>) {
        self.pending_inertia = false;
        match self.mode {
            BodyMode::Rigid => {
                if self.user_inertia {
                    self.inv_inertia = if self.inertia > 0.0 { 1.0 / self.inertia } else { 0.0 };
                    return;
                }
                let total_area: f32 = self.co.shapes.iter().map(|s| s.aabb_cache.area()).sum();
                self.inertia = 0.0;
                if total_area > 0.0 {
                    for slot in self.co.shapes.iter().filter(|s| !s.disabled) {
                        let Some(shape) = shapes.get(slot.shape.0) else {
                            continue;
                        };
                        let mass = slot.aabb_cache.area() * self.mass / total_area;
                        self.inertia += shape.moment_of_inertia(mass)
                            + mass * slot.xform.translation.length_squared();
                    }
                }
                self.inv_inertia = if self.inertia > 0.0 { 1.0 / self.inertia } else { 0.0 };
            }
            BodyMode::Static | BodyMode::Kinematic => {
                self.inv_inertia = 0.0;
                self.inv_mass = 0.0;
            }
            BodyMode::Character => {
                self.inv_inertia = 0.0;
                self.inv_mass = 1.0 / self.mass;
            }
        }
    }

    pub(crate) fn add_area(&mut self, area: AreaId) {
        *self.areas.entry(area).or_insert(0) += 1;
    }

    pub(crate) fn remove_area(&mut self, area: AreaId) {
        if let Some(count) = self.areas.get_mut(&area) {
            *count -= 1;
            if *count == 0 {
                self.areas.remove(&area);
            }
        }
    }

    fn accumulate_area(&mut self, params: &AreaParams, area_xform: &Affine2) {
        if params.gravity_is_point {
            let v = area_xform.transform_point2(params.gravity_vector) - self.co.transform.translation;
            let mut g = params.gravity;
            if params.gravity_distance_scale > 0.0 {
                g /= (v.length() * params.gravity_distance_scale + 1.0).powi(2);
            }
            self.gravity += v.normalize_or_zero() * g;
        } else {
            self.gravity += params.gravity_vector * params.gravity;
        }
        self.area_linear_damp += params.linear_damp;
        self.area_angular_damp += params.angular_damp;
    }

    /// Evaluate area overrides and apply gravity, damping and applied forces
    /// to the velocities. Anchors keep their velocity.
    pub(crate) fn integrate_forces(&mut self, dt: f32, areas: &Arena<Area>, default_area: &AreaParams) {
        if self.mode == BodyMode::Static {
            return;
        }
        self.gravity = Vec2::ZERO;
        self.area_linear_damp = 0.0;
        self.area_angular_damp = 0.0;

        let mut overrides: Vec<&Area> = self.areas.keys().filter_map(|id| areas.get(id.0)).collect();
        overrides.sort_by(|a, b| a.params.priority.total_cmp(&b.params.priority));
        let mut stopped = false;
        for area in overrides.iter().rev() {
            match area.override_mode {
                SpaceOverrideMode::Combine | SpaceOverrideMode::CombineReplace => {
                    self.accumulate_area(&area.params, &area.co.transform);
                    stopped = area.override_mode == SpaceOverrideMode::CombineReplace;
                }
                SpaceOverrideMode::Replace | SpaceOverrideMode::ReplaceCombine => {
                    self.gravity = Vec2::ZERO;
                    self.area_linear_damp = 0.0;
                    self.area_angular_damp = 0.0;
                    self.accumulate_area(&area.params, &area.co.transform);
                    stopped = area.override_mode == SpaceOverrideMode::Replace;
                }
                SpaceOverrideMode::Disabled => {}
            }
            if stopped {
                break;
            }
        }
        if !stopped {
            self.accumulate_area(default_area, &Affine2::IDENTITY);
        }
        self.gravity *= self.gravity_scale;
        if self.angular_damp >= 0.0 {
            self.area_angular_damp = self.angular_damp;
        }
        if self.linear_damp >= 0.0 {
            self.area_linear_damp = self.linear_damp;
        }

        self.motion = Vec2::ZERO;
        if self.mode != BodyMode::Kinematic {
            if !self.omit_force_integration && !self.first_integration {
                let force = self.gravity * self.mass + self.applied_force;
                let damp = (1.0 - dt * self.area_linear_damp).max(0.0);
                let angular_damp = (1.0 - dt * self.area_angular_damp).max(0.0);
                self.linear_velocity *= damp;
                self.angular_velocity *= angular_damp;
                self.linear_velocity += force * self.inv_mass * dt;
                self.angular_velocity += self.applied_torque * self.inv_inertia * dt;
            }
            if self.continuous_cd != CcdMode::Disabled {
                self.motion = self.linear_velocity * dt;
            }
        }
        self.first_integration = false;
        self.biased_linear_velocity = Vec2::ZERO;
        self.biased_angular_velocity = 0.0;
        self.contacts.clear();
    }

    /// Advance the transform by the solved velocities. Kinematic bodies
    /// never move here; they go inactive once their velocity is zero.
    /// Returns true when the transform changed.
    pub(crate) fn integrate_velocities(&mut self, dt: f32) -> bool {
        match self.mode {
            BodyMode::Static => false,
            BodyMode::Kinematic => {
                if self.linear_velocity == Vec2::ZERO && self.angular_velocity == 0.0 {
                    self.set_active(false);
                }
                false
            }
            BodyMode::Rigid | BodyMode::Character => {
                let lv = self.linear_velocity + self.biased_linear_velocity;
                let av = self.angular_velocity + self.biased_angular_velocity;
                let mut xform = self.co.transform;
                xform.matrix2 = Mat2::from_angle(av * dt) * xform.matrix2;
                xform.translation += lv * dt;
                self.co.transform = xform;
                self.co.inv_transform = xform.inverse();
                true
            }
        }
    }

    /// Has this body been still long enough to sleep?
    pub(crate) fn sleep_test(&mut self, dt: f32, cfg: &SpaceConfig) -> bool {
        match self.mode {
            BodyMode::Static | BodyMode::Kinematic => return true,
            BodyMode::Character => return !self.active,
            BodyMode::Rigid => {}
        }
        if !self.can_sleep {
            return false;
        }
        let lin = cfg.body_linear_velocity_sleep_threshold;
        if self.angular_velocity.abs() < cfg.body_angular_velocity_sleep_threshold
            && self.linear_velocity.length_squared() < lin * lin
        {
            self.still_time += dt;
            self.still_time > cfg.body_time_to_sleep
        } else {
            self.still_time = 0.0;
            false
        }
    }

    pub(crate) fn can_report_contacts(&self) -> bool {
        self.max_contacts_reported > 0
    }

    /// Keep the deepest `max_contacts_reported` contacts of this step.
    pub(crate) fn add_contact(&mut self, contact: BodyContact) {
        let max = self.max_contacts_reported;
        if max == 0 {
            return;
        }
        if self.contacts.len() < max {
            self.contacts.push(contact);
            return;
        }
        let least = self
            .contacts
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.depth.total_cmp(&b.1.depth))
            .map(|(i, c)| (i, c.depth));
        if let Some((i, depth)) = least {
            if depth < contact.depth {
                self.contacts[i] = contact;
            }
        }
    }

    // Impulses used by the solver. They never wake the body.

    pub(crate) fn apply_impulse(&mut self, offset: Vec2, j: Vec2) {
        self.linear_velocity += j * self.inv_mass;
        self.angular_velocity += self.inv_inertia * offset.perp_dot(j);
    }

    pub(crate) fn apply_bias_impulse(&mut self, offset: Vec2, j: Vec2) {
        self.biased_linear_velocity += j * self.inv_mass;
        self.biased_angular_velocity += self.inv_inertia * offset.perp_dot(j);
    }

    pub(crate) fn apply_central_impulse(&mut self, j: Vec2) {
        self.linear_velocity += j * self.inv_mass;
    }

    pub(crate) fn apply_torque_impulse(&mut self, torque: f32) {
        self.angular_velocity += self.inv_inertia * torque;
    }

    pub(crate) fn add_central_force(&mut self, force: Vec2) {
        self.applied_force += force;
    }

    pub(crate) fn add_force(&mut self, offset: Vec2, force: Vec2) {
        self.applied_force += force;
        self.applied_torque += offset.perp_dot(force);
    }

    pub(crate) fn add_torque(&mut self, torque: f32) {
        self.applied_torque += torque;
    }

    /// Replace the velocity component along `axis_velocity`'s direction.
    pub(crate) fn set_axis_velocity(&mut self, axis_velocity: Vec2) {
        let axis = axis_velocity.normalize_or_zero();
        let mut v = self.linear_velocity;
        v -= axis * axis.dot(v);
        v += axis_velocity;
        self.linear_velocity = v;
    }

    /// Velocity of the body material at world point `p`.
    pub(crate) fn velocity_at(&self, p: Vec2) -> Vec2 {
        let r = p - self.co.transform.translation;
        Vec2::new(-self.angular_velocity * r.y, self.angular_velocity * r.x) + self.linear_velocity
    }
}

/// Read/write access to one body from inside its force-integration callback.
pub struct BodyDirectState<'a> {
    pub(crate) id: BodyId,
    pub(crate) body: &'a mut Body,
    pub(crate) step: f32,
}

impl BodyDirectState<'_> {
    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn transform(&self) -> Transform2D {
        self.body.co.transform
    }

    pub fn set_transform(&mut self, xform: Transform2D) {
        self.body.set_state(BodyState::Transform(xform));
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.body.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, v: Vec2) {
        self.body.set_state(BodyState::LinearVelocity(v));
    }

    pub fn angular_velocity(&self) -> f32 {
        self.body.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, w: f32) {
        self.body.set_state(BodyState::AngularVelocity(w));
    }

    pub fn applied_force(&self) -> Vec2 {
        self.body.applied_force
    }

    pub fn set_applied_force(&mut self, force: Vec2) {
        self.body.applied_force = force;
        self.body.wakeup();
    }

    pub fn applied_torque(&self) -> f32 {
        self.body.applied_torque
    }

    pub fn set_applied_torque(&mut self, torque: f32) {
        self.body.applied_torque = torque;
        self.body.wakeup();
    }

    pub fn add_central_force(&mut self, force: Vec2) {
        self.body.add_central_force(force);
        self.body.wakeup();
    }

    pub fn add_force(&mut self, offset: Vec2, force: Vec2) {
        self.body.add_force(offset, force);
        self.body.wakeup();
    }

    pub fn add_torque(&mut self, torque: f32) {
        self.body.add_torque(torque);
        self.body.wakeup();
    }

    pub fn apply_central_impulse(&mut self, j: Vec2) {
        self.body.apply_central_impulse(j);
        self.body.wakeup();
    }

    pub fn apply_impulse(&mut self, offset: Vec2, j: Vec2) {
        self.body.apply_impulse(offset, j);
        self.body.wakeup();
    }

    pub fn apply_torque_impulse(&mut self, torque: f32) {
        self.body.apply_torque_impulse(torque);
        self.body.wakeup();
    }

    pub fn total_gravity(&self) -> Vec2 {
        self.body.gravity
    }

    pub fn total_linear_damp(&self) -> f32 {
        self.body.area_linear_damp
    }

    pub fn total_angular_damp(&self) -> f32 {
        self.body.area_angular_damp
    }

    pub fn inverse_mass(&self) -> f32 {
        self.body.inv_mass
    }

    pub fn inverse_inertia(&self) -> f32 {
        self.body.inv_inertia
    }

    pub fn is_sleeping(&self) -> bool {
        !self.body.active
    }

    pub fn set_sleep_state(&mut self, sleep: bool) {
        self.body.set_state(BodyState::Sleeping(sleep));
    }

    pub fn contacts(&self) -> &[BodyContact] {
        &self.body.contacts
    }

    /// Apply gravity and damping the way built-in integration does,
    /// for bodies with `omit_force_integration` set.
    pub fn integrate_forces(&mut self) {
        let step = self.step;
        let body = &mut *self.body;
        let mut lv = body.linear_velocity + body.gravity * step;
        let mut av = body.angular_velocity;
        lv *= (1.0 - step * body.area_linear_damp).max(0.0);
        av *= (1.0 - step * body.area_angular_damp).max(0.0);
        body.linear_velocity = lv;
        body.angular_velocity = av;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Handle;
    use crate::shape::ShapeData;
    use crate::types::{ShapeId, SpaceId};

    fn in_space(mut b: Body) -> Body {
        b.co.space = Some(SpaceId(Handle {
            index: 0,
            generation: 0,
        }));
        b
    }

    fn no_damp() -> AreaParams {
        AreaParams {
            linear_damp: 0.0,
            angular_damp: 0.0,
            gravity: 10.0,
            ..AreaParams::default()
        }
    }

    #[test]
    fn test_gravity_integration() {
        let mut b = in_space(Body::new());
        let areas = Arena::new();
        b.integrate_forces(0.5, &areas, &no_damp());
        assert!((b.linear_velocity.y + 5.0).abs() < 1e-6);
        assert!(b.integrate_velocities(0.5));
        assert!((b.co.transform.translation.y + 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_first_integration_skips_forces() {
        let mut b = in_space(Body::new());
        b.first_integration = true;
        b.integrate_forces(0.5, &Arena::new(), &no_damp());
        assert_eq!(b.linear_velocity, Vec2::ZERO);
        assert!(!b.first_integration);
    }

    #[test]
    fn test_anchors_keep_velocity_and_transform() {
        for mode in [BodyMode::Static, BodyMode::Kinematic] {
            let mut b = in_space(Body::new());
            b.set_mode(mode);
            b.linear_velocity = Vec2::new(3.0, 0.0);
            let before = b.co.transform;
            b.integrate_forces(0.1, &Arena::new(), &no_damp());
            assert!(!b.integrate_velocities(0.1));
            assert_eq!(b.linear_velocity, Vec2::new(3.0, 0.0));
            assert_eq!(b.co.transform, before);
        }
    }

    #[test]
    fn test_kinematic_goes_inactive_when_still() {
        let mut b = in_space(Body::new());
        b.set_mode(BodyMode::Kinematic);
        b.set_state(BodyState::Transform(Affine2::from_translation(Vec2::new(1.0, 0.0))));
        assert!(b.active);
        b.integrate_velocities(0.1);
        assert!(!b.active);
    }

    #[test]
    fn test_sleep_test_accumulates_still_time() {
        let cfg = SpaceConfig::default();
        let mut b = in_space(Body::new());
        assert!(!b.sleep_test(0.3, &cfg));
        assert!(b.sleep_test(0.3, &cfg));
        b.linear_velocity = Vec2::new(10.0, 0.0);
        assert!(!b.sleep_test(0.3, &cfg));
        assert_eq!(b.still_time, 0.0);
        b.can_sleep = false;
        b.linear_velocity = Vec2::ZERO;
        assert!(!b.sleep_test(10.0, &cfg));
    }

    #[test]
    fn test_wakeup_needs_space() {
        let mut b = Body::new();
        b.active = false;
        b.wakeup();
        assert!(!b.active);
        let mut b = in_space(b);
        b.still_time = 1.0;
        b.wakeup();
        assert!(b.active);
        assert_eq!(b.still_time, 0.0);
    }

    #[test]
    fn test_inertia_from_offset_shapes() {
        let mut shapes = Arena::new();
        let circle = Shape::new(ShapeData::Circle { radius: 1.0 }).unwrap();
        let h = ShapeId(shapes.insert(circle.clone()));
        let mut b = Body::new();
        b.co.add_shape(h, &circle, Affine2::IDENTITY);
        b.update_inertias(&shapes);
        let centered = b.inertia;
        assert!((centered - 0.5).abs() < 1e-6);

        b.co.set_shape_transform(0, Affine2::from_translation(Vec2::new(2.0, 0.0)), &circle).unwrap();
        b.update_inertias(&shapes);
        assert!((b.inertia - (centered + 4.0)).abs() < 1e-5);

        b.set_mode(BodyMode::Character);
        b.update_inertias(&shapes);
        assert_eq!(b.inv_inertia, 0.0);
    }

    #[test]
    fn test_mass_must_be_positive() {
        let mut b = Body::new();
        assert!(b.set_param(BodyParam::Mass(0.0)).is_err());
        b.set_param(BodyParam::Mass(4.0)).unwrap();
        assert_eq!(b.inv_mass, 0.25);
        assert_eq!(b.param(BodyParam::Mass(0.0)), 4.0);
    }

    #[test]
    fn test_axis_velocity_replaces_component() {
        let mut b = Body::new();
        b.linear_velocity = Vec2::new(3.0, -4.0);
        b.set_axis_velocity(Vec2::new(0.0, 5.0));
        assert_eq!(b.linear_velocity, Vec2::new(3.0, 5.0));
    }

    #[test]
    fn test_contact_reports_keep_deepest() {
        let mut b = Body::new();
        b.max_contacts_reported = 1;
        let mut c = BodyContact {
            local_position: Vec2::ZERO,
            local_normal: Vec2::Y,
            depth: 0.1,
            local_shape: 0,
            collider_position: Vec2::ZERO,
            collider_shape: 0,
            collider_instance: 0,
            collider: BodyId(Handle {
                index: 1,
                generation: 0,
            }),
            collider_velocity_at_position: Vec2::ZERO,
        };
        b.add_contact(c);
        c.depth = 0.05;
        b.add_contact(c);
        assert_eq!(b.contacts[0].depth, 0.1);
        c.depth = 0.3;
        b.add_contact(c);
        assert_eq!(b.contacts.len(), 1);
        assert_eq!(b.contacts[0].depth, 0.3);
    }
}
