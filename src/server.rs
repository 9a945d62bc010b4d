//! The physics server: owns every shape, space, body and area and exposes
//! the handle-based API hosts drive the simulation through.

use std::collections::BTreeSet;

use glam::Vec2;
use log::{debug, warn};

use crate::api::PhysicsServerApi;
use crate::area::{Area, MonitorCallback};
use crate::arena::{Arena, Handle};
use crate::body::{Body, BodyDirectState, ForceIntegrationCallback};
use crate::collision_object::CollisionObject;
use crate::collision_solver;
use crate::error::{PhysicsError, Result};
use crate::shape::{Shape, ShapeData, ShapeType};
use crate::space::{DeepestPairs, Objects, Space};
use crate::step::Stepper;
use crate::types::{
    AreaId, AreaParam, AreaParams, BodyId, BodyMode, BodyParam, BodyState, CcdMode, InstanceId,
    LayerMask, MotionQuery, MotionResult, ObjectId, QueryFilter, RayResult, ServerConfig, ShapeId,
    ShapeResult, SpaceConfig, SpaceId, SpaceInfo, SpaceOverrideMode, SpaceParam, Transform2D,
};

fn get<'a, T>(arena: &'a Arena<T>, handle: Handle, kind: &'static str) -> Result<&'a T> {
    arena.get(handle).ok_or(PhysicsError::InvalidHandle { kind, handle })
}

fn get_mut<'a, T>(arena: &'a mut Arena<T>, handle: Handle, kind: &'static str) -> Result<&'a mut T> {
    arena.get_mut(handle).ok_or(PhysicsError::InvalidHandle { kind, handle })
}

fn object_ref<'a>(bodies: &'a Arena<Body>, areas: &'a Arena<Area>, obj: ObjectId) -> Result<&'a CollisionObject> {
    match obj {
        ObjectId::Body(id) => Ok(&get(bodies, id.0, BodyId::KIND)?.co),
        ObjectId::Area(id) => Ok(&get(areas, id.0, AreaId::KIND)?.co),
    }
}

fn object_mut<'a>(
    bodies: &'a mut Arena<Body>,
    areas: &'a mut Arena<Area>,
    obj: ObjectId,
) -> Result<&'a mut CollisionObject> {
    match obj {
        ObjectId::Body(id) => Ok(&mut get_mut(bodies, id.0, BodyId::KIND)?.co),
        ObjectId::Area(id) => Ok(&mut get_mut(areas, id.0, AreaId::KIND)?.co),
    }
}

pub struct PhysicsServer {
    iterations: usize,
    active: bool,
    doing_sync: bool,
    flushing_queries: bool,
    last_step: f32,
    space_defaults: SpaceConfig,
    stepper: Stepper,
    shapes: Arena<Shape>,
    spaces: Arena<Space>,
    bodies: Arena<Body>,
    areas: Arena<Area>,
    active_spaces: BTreeSet<SpaceId>,
    info: SpaceInfo,
}

impl Default for PhysicsServer {
    fn default() -> Self {
        <Self as PhysicsServerApi>::new(ServerConfig::default())
    }
}

impl PhysicsServer {
    fn split_space(&mut self, sid: SpaceId) -> Option<(&mut Space, Objects<'_>)> {
        let space = self.spaces.get_mut(sid.0)?;
        Some((
            space,
            Objects {
                bodies: &mut self.bodies,
                areas: &mut self.areas,
                shapes: &self.shapes,
            },
        ))
    }

    /// Let the object's space pick up whatever flags an edit raised.
    fn refresh(&mut self, obj: ObjectId) {
        match obj {
            ObjectId::Body(id) => {
                let Some(body) = self.bodies.get(id.0) else {
                    return;
                };
                if let Some(space) = body.co.space.and_then(|s| self.spaces.get_mut(s.0)) {
                    space.refresh_body(id, body);
                }
            }
            ObjectId::Area(id) => {
                let Some(area) = self.areas.get(id.0) else {
                    return;
                };
                if let Some(space) = area.co.space.and_then(|s| self.spaces.get_mut(s.0)) {
                    space.refresh_area(id, area);
                }
            }
        }
    }

    fn with_body<R>(&mut self, id: BodyId, f: impl FnOnce(&mut Body) -> R) -> Result<R> {
        let out = f(get_mut(&mut self.bodies, id.0, BodyId::KIND)?);
        self.refresh(ObjectId::Body(id));
        Ok(out)
    }

    fn with_area<R>(&mut self, id: AreaId, f: impl FnOnce(&mut Area) -> R) -> Result<R> {
        let out = f(get_mut(&mut self.areas, id.0, AreaId::KIND)?);
        self.refresh(ObjectId::Area(id));
        Ok(out)
    }

    fn body_ref(&self, id: BodyId) -> Result<&Body> {
        get(&self.bodies, id.0, BodyId::KIND)
    }

    fn area_ref(&self, id: AreaId) -> Result<&Area> {
        get(&self.areas, id.0, AreaId::KIND)
    }

    /// Mass properties depend on the shape list.
    fn mark_mass_dirty(&mut self, obj: ObjectId) {
        if let ObjectId::Body(id) = obj {
            if let Some(body) = self.bodies.get_mut(id.0) {
                body.pending_inertia = true;
            }
        }
    }

    /// Remove an object's elements `from..` right away, tearing down
    /// their pairs while the object's current settings still apply.
    fn unregister_elements(&mut self, obj: ObjectId, from: usize) -> Result<()> {
        let co = object_mut(&mut self.bodies, &mut self.areas, obj)?;
        let stale = co.take_elements(from);
        let Some(sid) = co.space else {
            return Ok(());
        };
        if let Some((space, mut objs)) = self.split_space(sid) {
            space.remove_elements(&stale, &mut objs);
        }
        Ok(())
    }

    // --- Shapes --------------------------------------------------------------

    pub fn shape_create(&mut self, data: ShapeData) -> Result<ShapeId> {
        let shape = Shape::new(data)?;
        Ok(ShapeId(self.shapes.insert(shape)))
    }

    pub fn ray_shape_create(&mut self) -> Result<ShapeId> {
        self.shape_create(ShapeData::default_for(ShapeType::Ray))
    }

    pub fn segment_shape_create(&mut self) -> Result<ShapeId> {
        self.shape_create(ShapeData::default_for(ShapeType::Segment))
    }

    pub fn circle_shape_create(&mut self) -> Result<ShapeId> {
        self.shape_create(ShapeData::default_for(ShapeType::Circle))
    }

    pub fn rectangle_shape_create(&mut self) -> Result<ShapeId> {
        self.shape_create(ShapeData::default_for(ShapeType::Rectangle))
    }

    pub fn capsule_shape_create(&mut self) -> Result<ShapeId> {
        self.shape_create(ShapeData::default_for(ShapeType::Capsule))
    }

    pub fn convex_polygon_shape_create(&mut self) -> Result<ShapeId> {
        self.shape_create(ShapeData::default_for(ShapeType::ConvexPolygon))
    }

    /// Replace a shape's geometry. Every owner refreshes its bounds and
    /// mass properties before the next step.
    pub fn shape_set_data(&mut self, id: ShapeId, data: ShapeData) -> Result<()> {
        get_mut(&mut self.shapes, id.0, ShapeId::KIND)?.set_data(data)?;
        let owners = self.shape_owners(id);
        for (obj, _) in &owners {
            if let Ok(co) = object_mut(&mut self.bodies, &mut self.areas, *obj) {
                co.refresh_shape_bounds(&self.shapes);
            }
            self.mark_mass_dirty(*obj);
            self.refresh(*obj);
        }
        Ok(())
    }

    pub fn shape_get_data(&self, id: ShapeId) -> Result<ShapeData> {
        Ok(get(&self.shapes, id.0, ShapeId::KIND)?.get_data())
    }

    pub fn shape_get_type(&self, id: ShapeId) -> Result<ShapeType> {
        Ok(get(&self.shapes, id.0, ShapeId::KIND)?.shape_type())
    }

    pub fn shape_set_custom_solver_bias(&mut self, id: ShapeId, bias: f32) -> Result<()> {
        get_mut(&mut self.shapes, id.0, ShapeId::KIND)?.set_custom_bias(bias);
        Ok(())
    }

    pub fn shape_get_custom_solver_bias(&self, id: ShapeId) -> Result<f32> {
        Ok(get(&self.shapes, id.0, ShapeId::KIND)?.custom_bias())
    }

    /// Objects using `shape`, with the slot indices, highest first.
    fn shape_owners(&self, shape: ShapeId) -> Vec<(ObjectId, usize)> {
        let slots = |co: &CollisionObject| -> Vec<usize> {
            (0..co.shapes.len()).rev().filter(|&i| co.shapes[i].shape == shape).collect()
        };
        let mut out = Vec::new();
        for (h, body) in self.bodies.iter() {
            out.extend(slots(&body.co).into_iter().map(|i| (ObjectId::Body(BodyId(h)), i)));
        }
        for (h, area) in self.areas.iter() {
            out.extend(slots(&area.co).into_iter().map(|i| (ObjectId::Area(AreaId(h)), i)));
        }
        out
    }

    /// Free a shape. Objects still using it lose those slots.
    pub fn shape_free(&mut self, id: ShapeId) -> Result<()> {
        get(&self.shapes, id.0, ShapeId::KIND)?;
        let owners = self.shape_owners(id);
        if !owners.is_empty() {
            warn!("freeing shape {:?} still used by {} slot(s)", id, owners.len());
        }
        for (obj, index) in owners {
            self.object_remove_shape(obj, index)?;
        }
        self.shapes.remove(id.0);
        Ok(())
    }

    // --- Shared collision-object edits --------------------------------------

    fn object_add_shape(&mut self, obj: ObjectId, shape: ShapeId, xform: Transform2D) -> Result<()> {
        let s = get(&self.shapes, shape.0, ShapeId::KIND)?;
        object_mut(&mut self.bodies, &mut self.areas, obj)?.add_shape(shape, s, xform);
        self.mark_mass_dirty(obj);
        self.refresh(obj);
        Ok(())
    }

    fn object_set_shape(&mut self, obj: ObjectId, index: usize, shape: ShapeId) -> Result<()> {
        let s = get(&self.shapes, shape.0, ShapeId::KIND)?;
        object_mut(&mut self.bodies, &mut self.areas, obj)?.set_shape(index, shape, s)?;
        self.mark_mass_dirty(obj);
        self.refresh(obj);
        Ok(())
    }

    fn object_set_shape_transform(&mut self, obj: ObjectId, index: usize, xform: Transform2D) -> Result<()> {
        let co = object_mut(&mut self.bodies, &mut self.areas, obj)?;
        let s = get(&self.shapes, co.shape(index)?.0, ShapeId::KIND)?;
        co.set_shape_transform(index, xform, s)?;
        self.mark_mass_dirty(obj);
        self.refresh(obj);
        Ok(())
    }

    fn object_set_shape_disabled(&mut self, obj: ObjectId, index: usize, disabled: bool) -> Result<()> {
        object_mut(&mut self.bodies, &mut self.areas, obj)?.set_shape_disabled(index, disabled)?;
        self.mark_mass_dirty(obj);
        self.refresh(obj);
        Ok(())
    }

    fn object_remove_shape(&mut self, obj: ObjectId, index: usize) -> Result<()> {
        object_ref(&self.bodies, &self.areas, obj)?.shape(index)?;
        self.unregister_elements(obj, index)?;
        object_mut(&mut self.bodies, &mut self.areas, obj)?.remove_shape(index)?;
        self.mark_mass_dirty(obj);
        self.refresh(obj);
        Ok(())
    }

    fn object_clear_shapes(&mut self, obj: ObjectId) -> Result<()> {
        while let Some(last) = object_ref(&self.bodies, &self.areas, obj)?.shape_count().checked_sub(1) {
            self.object_remove_shape(obj, last)?;
        }
        Ok(())
    }

    fn object_set_layer_mask(&mut self, obj: ObjectId, f: impl FnOnce(&mut LayerMask)) -> Result<()> {
        let co = object_mut(&mut self.bodies, &mut self.areas, obj)?;
        let mut lm = co.layer_mask;
        f(&mut lm);
        co.set_layer_mask(lm);
        self.refresh(obj);
        Ok(())
    }

    /// Move an object between spaces (or out of any).
    fn object_set_space(&mut self, obj: ObjectId, space: Option<SpaceId>) -> Result<()> {
        if let Some(sid) = space {
            get(&self.spaces, sid.0, SpaceId::KIND)?;
        }
        let current = object_ref(&self.bodies, &self.areas, obj)?.space;
        if current == space {
            return Ok(());
        }
        if let Some(old) = current {
            if let Some((sp, mut objs)) = self.split_space(old) {
                sp.remove_object(obj, &mut objs);
            }
        }
        object_mut(&mut self.bodies, &mut self.areas, obj)?.space = space;
        let Some(sid) = space else {
            return Ok(());
        };
        let Some(sp) = self.spaces.get_mut(sid.0) else {
            return Ok(());
        };
        match obj {
            ObjectId::Body(id) => {
                if let Some(body) = self.bodies.get_mut(id.0) {
                    sp.attach_body(id, body);
                }
            }
            ObjectId::Area(id) => {
                if let Some(area) = self.areas.get_mut(id.0) {
                    sp.attach_area(id, area);
                }
            }
        }
        Ok(())
    }

    // --- Spaces ----------------------------------------------------------------

    pub fn space_create(&mut self) -> SpaceId {
        let id = SpaceId(self.spaces.insert(Space::new(self.space_defaults)));
        debug!("space {:?} created", id);
        id
    }

    pub fn space_set_active(&mut self, id: SpaceId, active: bool) -> Result<()> {
        get_mut(&mut self.spaces, id.0, SpaceId::KIND)?.active = active;
        if active {
            self.active_spaces.insert(id);
        } else {
            self.active_spaces.remove(&id);
        }
        debug!("space {:?} active={}", id, active);
        Ok(())
    }

    pub fn space_is_active(&self, id: SpaceId) -> Result<bool> {
        Ok(get(&self.spaces, id.0, SpaceId::KIND)?.is_active())
    }

    pub fn space_set_param(&mut self, id: SpaceId, param: SpaceParam) -> Result<()> {
        get_mut(&mut self.spaces, id.0, SpaceId::KIND)?.set_param(param);
        Ok(())
    }

    pub fn space_get_param(&self, id: SpaceId, param: SpaceParam) -> Result<f32> {
        Ok(get(&self.spaces, id.0, SpaceId::KIND)?.config().get(param))
    }

    /// Replace the gravity and damping applied outside overriding areas.
    pub fn space_set_default_area(&mut self, id: SpaceId, params: AreaParams) -> Result<()> {
        get_mut(&mut self.spaces, id.0, SpaceId::KIND)?.config.default_area = params;
        Ok(())
    }

    pub fn space_get_info(&self, id: SpaceId) -> Result<SpaceInfo> {
        Ok(get(&self.spaces, id.0, SpaceId::KIND)?.info())
    }

    fn flush_space(&mut self, id: SpaceId) -> Result<()> {
        get(&self.spaces, id.0, SpaceId::KIND)?;
        if let Some((space, mut objs)) = self.split_space(id) {
            space.flush_shape_updates(&mut objs);
        }
        Ok(())
    }

    pub fn space_intersect_ray(
        &mut self,
        id: SpaceId,
        from: Vec2,
        to: Vec2,
        filter: &QueryFilter,
    ) -> Result<Option<RayResult>> {
        self.flush_space(id)?;
        let space = get(&self.spaces, id.0, SpaceId::KIND)?;
        Ok(space.intersect_ray(from, to, filter, &self.bodies, &self.areas, &self.shapes))
    }

    pub fn space_intersect_point(
        &mut self,
        id: SpaceId,
        point: Vec2,
        filter: &QueryFilter,
        max_results: usize,
    ) -> Result<Vec<ShapeResult>> {
        self.flush_space(id)?;
        let space = get(&self.spaces, id.0, SpaceId::KIND)?;
        Ok(space.intersect_point(point, filter, max_results, &self.bodies, &self.areas, &self.shapes))
    }

    /// Free a space, detaching everything inside it first.
    pub fn space_free(&mut self, id: SpaceId) -> Result<()> {
        let space = get(&self.spaces, id.0, SpaceId::KIND)?;
        let bodies: Vec<BodyId> = space.bodies.iter().copied().collect();
        let areas: Vec<AreaId> = space.areas.iter().copied().collect();
        for body in bodies {
            self.object_set_space(ObjectId::Body(body), None)?;
        }
        for area in areas {
            self.object_set_space(ObjectId::Area(area), None)?;
        }
        self.active_spaces.remove(&id);
        self.spaces.remove(id.0);
        debug!("space {:?} freed", id);
        Ok(())
    }

    // --- Areas -----------------------------------------------------------------

    pub fn area_create(&mut self) -> AreaId {
        let id = AreaId(self.areas.insert(Area::new()));
        debug!("area {:?} created", id);
        id
    }

    pub fn area_set_space(&mut self, id: AreaId, space: Option<SpaceId>) -> Result<()> {
        self.object_set_space(ObjectId::Area(id), space)
    }

    pub fn area_get_space(&self, id: AreaId) -> Result<Option<SpaceId>> {
        Ok(self.area_ref(id)?.co.space)
    }

    pub fn area_add_shape(&mut self, id: AreaId, shape: ShapeId, xform: Transform2D) -> Result<()> {
        self.object_add_shape(ObjectId::Area(id), shape, xform)
    }

    pub fn area_set_shape(&mut self, id: AreaId, index: usize, shape: ShapeId) -> Result<()> {
        self.object_set_shape(ObjectId::Area(id), index, shape)
    }

    pub fn area_set_shape_transform(&mut self, id: AreaId, index: usize, xform: Transform2D) -> Result<()> {
        self.object_set_shape_transform(ObjectId::Area(id), index, xform)
    }

    pub fn area_set_shape_disabled(&mut self, id: AreaId, index: usize, disabled: bool) -> Result<()> {
        self.object_set_shape_disabled(ObjectId::Area(id), index, disabled)
    }

    pub fn area_remove_shape(&mut self, id: AreaId, index: usize) -> Result<()> {
        self.object_remove_shape(ObjectId::Area(id), index)
    }

    pub fn area_clear_shapes(&mut self, id: AreaId) -> Result<()> {
        self.object_clear_shapes(ObjectId::Area(id))
    }

    pub fn area_get_shape_count(&self, id: AreaId) -> Result<usize> {
        Ok(self.area_ref(id)?.co.shape_count())
    }

    pub fn area_get_shape(&self, id: AreaId, index: usize) -> Result<ShapeId> {
        self.area_ref(id)?.co.shape(index)
    }

    pub fn area_get_shape_transform(&self, id: AreaId, index: usize) -> Result<Transform2D> {
        self.area_ref(id)?.co.shape_transform(index)
    }

    pub fn area_set_transform(&mut self, id: AreaId, xform: Transform2D) -> Result<()> {
        self.with_area(id, |a| a.co.set_transform(xform))
    }

    pub fn area_get_transform(&self, id: AreaId) -> Result<Transform2D> {
        Ok(self.area_ref(id)?.co.transform())
    }

    pub fn area_set_param(&mut self, id: AreaId, param: AreaParam) -> Result<()> {
        get_mut(&mut self.areas, id.0, AreaId::KIND)?.set_param(param);
        Ok(())
    }

    pub fn area_get_params(&self, id: AreaId) -> Result<AreaParams> {
        Ok(*self.area_ref(id)?.params())
    }

    /// Switching between overriding and not re-registers the area's shapes
    /// so bodies inside pick the change up.
    pub fn area_set_space_override_mode(&mut self, id: AreaId, mode: SpaceOverrideMode) -> Result<()> {
        let area = self.area_ref(id)?;
        let was = area.override_mode != SpaceOverrideMode::Disabled;
        if was != (mode != SpaceOverrideMode::Disabled) {
            self.unregister_elements(ObjectId::Area(id), 0)?;
        }
        self.with_area(id, |a| {
            a.set_space_override_mode(mode);
        })
    }

    pub fn area_get_space_override_mode(&self, id: AreaId) -> Result<SpaceOverrideMode> {
        Ok(self.area_ref(id)?.space_override_mode())
    }

    pub fn area_set_collision_layer(&mut self, id: AreaId, layer: u32) -> Result<()> {
        self.object_set_layer_mask(ObjectId::Area(id), |lm| lm.layer = layer)
    }

    pub fn area_set_collision_mask(&mut self, id: AreaId, mask: u32) -> Result<()> {
        self.object_set_layer_mask(ObjectId::Area(id), |lm| lm.mask = mask)
    }

    pub fn area_get_layer_mask(&self, id: AreaId) -> Result<LayerMask> {
        Ok(self.area_ref(id)?.co.layer_mask())
    }

    pub fn area_set_monitorable(&mut self, id: AreaId, monitorable: bool) -> Result<()> {
        self.with_area(id, |a| a.set_monitorable(monitorable))
    }

    pub fn area_attach_object_instance_id(&mut self, id: AreaId, instance: InstanceId) -> Result<()> {
        get_mut(&mut self.areas, id.0, AreaId::KIND)?.co.instance_id = instance;
        Ok(())
    }

    pub fn area_get_object_instance_id(&self, id: AreaId) -> Result<InstanceId> {
        Ok(self.area_ref(id)?.co.instance_id())
    }

    /// Install (or clear) the body monitor callback. A callback with a new
    /// receiver drops all pending transitions and re-tests every overlap.
    pub fn area_set_monitor_callback(&mut self, id: AreaId, callback: Option<MonitorCallback>) -> Result<()> {
        self.set_monitor(id, callback, false)
    }

    /// Same as [`Self::area_set_monitor_callback`] for overlapping areas.
    pub fn area_set_area_monitor_callback(&mut self, id: AreaId, callback: Option<MonitorCallback>) -> Result<()> {
        self.set_monitor(id, callback, true)
    }

    fn set_monitor(&mut self, id: AreaId, callback: Option<MonitorCallback>, areas: bool) -> Result<()> {
        let area = get_mut(&mut self.areas, id.0, AreaId::KIND)?;
        let current = if areas {
            &area.area_monitor_callback
        } else {
            &area.monitor_callback
        };
        if !Area::monitor_scope_changes(current, &callback) {
            if areas {
                area.area_monitor_callback = callback;
            } else {
                area.monitor_callback = callback;
            }
            area.update_static();
            return Ok(());
        }
        self.unregister_elements(ObjectId::Area(id), 0)?;
        self.with_area(id, |a| {
            if areas {
                a.area_monitor_callback = callback;
            } else {
                a.monitor_callback = callback;
            }
            a.clear_monitored();
            a.update_static();
            a.co.pending_update = true;
        })
    }

    pub fn area_free(&mut self, id: AreaId) -> Result<()> {
        self.area_set_space(id, None)?;
        self.areas.remove(id.0);
        debug!("area {:?} freed", id);
        Ok(())
    }

    // --- Bodies ----------------------------------------------------------------

    pub fn body_create(&mut self) -> BodyId {
        let id = BodyId(self.bodies.insert(Body::new()));
        debug!("body {:?} created", id);
        id
    }

    pub fn body_set_space(&mut self, id: BodyId, space: Option<SpaceId>) -> Result<()> {
        self.object_set_space(ObjectId::Body(id), space)
    }

    pub fn body_get_space(&self, id: BodyId) -> Result<Option<SpaceId>> {
        Ok(self.body_ref(id)?.co.space)
    }

    pub fn body_set_mode(&mut self, id: BodyId, mode: BodyMode) -> Result<()> {
        self.with_body(id, |b| b.set_mode(mode))
    }

    pub fn body_get_mode(&self, id: BodyId) -> Result<BodyMode> {
        Ok(self.body_ref(id)?.mode())
    }

    pub fn body_add_shape(&mut self, id: BodyId, shape: ShapeId, xform: Transform2D) -> Result<()> {
        self.object_add_shape(ObjectId::Body(id), shape, xform)
    }

    pub fn body_set_shape(&mut self, id: BodyId, index: usize, shape: ShapeId) -> Result<()> {
        self.object_set_shape(ObjectId::Body(id), index, shape)
    }

    pub fn body_set_shape_transform(&mut self, id: BodyId, index: usize, xform: Transform2D) -> Result<()> {
        self.object_set_shape_transform(ObjectId::Body(id), index, xform)
    }

    pub fn body_set_shape_disabled(&mut self, id: BodyId, index: usize, disabled: bool) -> Result<()> {
        self.object_set_shape_disabled(ObjectId::Body(id), index, disabled)
    }

    pub fn body_remove_shape(&mut self, id: BodyId, index: usize) -> Result<()> {
        self.object_remove_shape(ObjectId::Body(id), index)
    }

    pub fn body_clear_shapes(&mut self, id: BodyId) -> Result<()> {
        self.object_clear_shapes(ObjectId::Body(id))
    }

    pub fn body_get_shape_count(&self, id: BodyId) -> Result<usize> {
        Ok(self.body_ref(id)?.co.shape_count())
    }

    pub fn body_get_shape(&self, id: BodyId, index: usize) -> Result<ShapeId> {
        self.body_ref(id)?.co.shape(index)
    }

    pub fn body_get_shape_transform(&self, id: BodyId, index: usize) -> Result<Transform2D> {
        self.body_ref(id)?.co.shape_transform(index)
    }

    pub fn body_is_shape_disabled(&self, id: BodyId, index: usize) -> Result<bool> {
        let co = &self.body_ref(id)?.co;
        co.shape(index)?;
        Ok(co.is_shape_disabled(index))
    }

    pub fn body_set_collision_layer(&mut self, id: BodyId, layer: u32) -> Result<()> {
        self.object_set_layer_mask(ObjectId::Body(id), |lm| lm.layer = layer)
    }

    pub fn body_set_collision_mask(&mut self, id: BodyId, mask: u32) -> Result<()> {
        self.object_set_layer_mask(ObjectId::Body(id), |lm| lm.mask = mask)
    }

    pub fn body_get_layer_mask(&self, id: BodyId) -> Result<LayerMask> {
        Ok(self.body_ref(id)?.co.layer_mask())
    }

    pub fn body_attach_object_instance_id(&mut self, id: BodyId, instance: InstanceId) -> Result<()> {
        get_mut(&mut self.bodies, id.0, BodyId::KIND)?.co.instance_id = instance;
        Ok(())
    }

    pub fn body_get_object_instance_id(&self, id: BodyId) -> Result<InstanceId> {
        Ok(self.body_ref(id)?.co.instance_id())
    }

    pub fn body_set_continuous_collision_detection_mode(&mut self, id: BodyId, mode: CcdMode) -> Result<()> {
        self.with_body(id, |b| {
            b.continuous_cd = mode;
            b.co.pending_update = true;
        })
    }

    pub fn body_get_continuous_collision_detection_mode(&self, id: BodyId) -> Result<CcdMode> {
        Ok(self.body_ref(id)?.continuous_cd)
    }

    pub fn body_set_param(&mut self, id: BodyId, param: BodyParam) -> Result<()> {
        let res = self.with_body(id, |b| b.set_param(param))?;
        if let Err(e) = &res {
            warn!("body {:?}: rejected {:?}: {}", id, param, e);
        }
        res
    }

    pub fn body_get_param(&self, id: BodyId, param: BodyParam) -> Result<f32> {
        Ok(self.body_ref(id)?.param(param))
    }

    /// Write one piece of state. Moving a static body wakes whatever rests
    /// on it.
    pub fn body_set_state(&mut self, id: BodyId, state: BodyState) -> Result<()> {
        self.with_body(id, |b| b.set_state(state))?;
        let body = self.body_ref(id)?;
        let (mode, space) = (body.mode, body.co.space);
        if matches!(state, BodyState::Transform(_)) && mode == BodyMode::Static {
            if let Some(sid) = space {
                if let Some(space) = self.spaces.get_mut(sid.0) {
                    space.wake_neighbours(id, &mut self.bodies);
                }
            }
        }
        Ok(())
    }

    /// Current value of the state `state` names (its payload is ignored).
    pub fn body_get_state(&self, id: BodyId, state: BodyState) -> Result<BodyState> {
        let b = self.body_ref(id)?;
        Ok(match state {
            BodyState::Transform(_) => BodyState::Transform(b.co.transform),
            BodyState::LinearVelocity(_) => BodyState::LinearVelocity(b.linear_velocity),
            BodyState::AngularVelocity(_) => BodyState::AngularVelocity(b.angular_velocity),
            BodyState::Sleeping(_) => BodyState::Sleeping(!b.active),
            BodyState::CanSleep(_) => BodyState::CanSleep(b.can_sleep),
        })
    }

    pub fn body_get_transform(&self, id: BodyId) -> Result<Transform2D> {
        Ok(self.body_ref(id)?.co.transform())
    }

    pub fn body_get_linear_velocity(&self, id: BodyId) -> Result<Vec2> {
        Ok(self.body_ref(id)?.linear_velocity())
    }

    pub fn body_get_angular_velocity(&self, id: BodyId) -> Result<f32> {
        Ok(self.body_ref(id)?.angular_velocity())
    }

    pub fn body_is_sleeping(&self, id: BodyId) -> Result<bool> {
        Ok(!self.body_ref(id)?.is_active())
    }

    // Every force and impulse call wakes the body before returning.

    pub fn body_apply_central_impulse(&mut self, id: BodyId, impulse: Vec2) -> Result<()> {
        self.with_body(id, |b| {
            b.apply_central_impulse(impulse);
            b.wakeup();
        })
    }

    pub fn body_apply_impulse(&mut self, id: BodyId, offset: Vec2, impulse: Vec2) -> Result<()> {
        self.with_body(id, |b| {
            b.apply_impulse(offset, impulse);
            b.wakeup();
        })
    }

    pub fn body_apply_torque_impulse(&mut self, id: BodyId, torque: f32) -> Result<()> {
        self.with_body(id, |b| {
            b.apply_torque_impulse(torque);
            b.wakeup();
        })
    }

    pub fn body_add_central_force(&mut self, id: BodyId, force: Vec2) -> Result<()> {
        self.with_body(id, |b| {
            b.add_central_force(force);
            b.wakeup();
        })
    }

    pub fn body_add_force(&mut self, id: BodyId, offset: Vec2, force: Vec2) -> Result<()> {
        self.with_body(id, |b| {
            b.add_force(offset, force);
            b.wakeup();
        })
    }

    pub fn body_add_torque(&mut self, id: BodyId, torque: f32) -> Result<()> {
        self.with_body(id, |b| {
            b.add_torque(torque);
            b.wakeup();
        })
    }

    pub fn body_set_applied_force(&mut self, id: BodyId, force: Vec2) -> Result<()> {
        self.with_body(id, |b| {
            b.applied_force = force;
            b.wakeup();
        })
    }

    pub fn body_get_applied_force(&self, id: BodyId) -> Result<Vec2> {
        Ok(self.body_ref(id)?.applied_force)
    }

    pub fn body_set_applied_torque(&mut self, id: BodyId, torque: f32) -> Result<()> {
        self.with_body(id, |b| {
            b.applied_torque = torque;
            b.wakeup();
        })
    }

    pub fn body_get_applied_torque(&self, id: BodyId) -> Result<f32> {
        Ok(self.body_ref(id)?.applied_torque)
    }

    pub fn body_set_axis_velocity(&mut self, id: BodyId, axis_velocity: Vec2) -> Result<()> {
        self.with_body(id, |b| {
            b.set_axis_velocity(axis_velocity);
            b.wakeup();
        })
    }

    pub fn body_add_collision_exception(&mut self, id: BodyId, other: BodyId) -> Result<()> {
        self.body_ref(other)?;
        self.with_body(id, |b| {
            b.exceptions.insert(other);
            b.wakeup();
        })
    }

    pub fn body_remove_collision_exception(&mut self, id: BodyId, other: BodyId) -> Result<()> {
        self.with_body(id, |b| {
            b.exceptions.remove(&other);
            b.wakeup();
        })
    }

    pub fn body_get_collision_exceptions(&self, id: BodyId) -> Result<Vec<BodyId>> {
        Ok(self.body_ref(id)?.exceptions.iter().copied().collect())
    }

    pub fn body_set_max_contacts_reported(&mut self, id: BodyId, max: usize) -> Result<()> {
        self.with_body(id, |b| {
            b.max_contacts_reported = max;
            b.contacts.truncate(max);
        })
    }

    pub fn body_get_max_contacts_reported(&self, id: BodyId) -> Result<usize> {
        Ok(self.body_ref(id)?.max_contacts_reported)
    }

    pub fn body_set_omit_force_integration(&mut self, id: BodyId, omit: bool) -> Result<()> {
        self.with_body(id, |b| b.omit_force_integration = omit)
    }

    pub fn body_is_omitting_force_integration(&self, id: BodyId) -> Result<bool> {
        Ok(self.body_ref(id)?.omit_force_integration)
    }

    /// Install (or clear) the hook run for this body by `flush_queries`
    /// after every step it was simulated in.
    pub fn body_set_force_integration_callback(
        &mut self,
        id: BodyId,
        callback: Option<ForceIntegrationCallback>,
    ) -> Result<()> {
        let body = get_mut(&mut self.bodies, id.0, BodyId::KIND)?;
        body.force_integration = callback;
        let space = body.co.space;
        if let Some(space) = space.and_then(|s| self.spaces.get_mut(s.0)) {
            space.state_queries.remove(&id);
        }
        Ok(())
    }

    /// Run `f` against the body's direct state outside of any callback.
    pub fn body_with_direct_state<R>(&mut self, id: BodyId, f: impl FnOnce(&mut BodyDirectState<'_>) -> R) -> Result<R> {
        let step = self.last_step;
        self.with_body(id, |body| {
            let mut state = BodyDirectState { id, body, step };
            f(&mut state)
        })
    }

    pub fn body_get_contacts(&self, id: BodyId) -> Result<Vec<crate::body::BodyContact>> {
        Ok(self.body_ref(id)?.contacts().to_vec())
    }

    pub fn body_free(&mut self, id: BodyId) -> Result<()> {
        self.body_set_space(id, None)?;
        self.bodies.remove(id.0);
        debug!("body {:?} freed", id);
        Ok(())
    }

    // --- Server ----------------------------------------------------------------

    pub fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations;
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn is_syncing(&self) -> bool {
        self.doing_sync
    }

    pub fn is_flushing_queries(&self) -> bool {
        self.flushing_queries
    }
}

impl PhysicsServerApi for PhysicsServer {
    fn new(cfg: ServerConfig) -> Self {
        Self {
            iterations: cfg.iterations,
            active: true,
            doing_sync: false,
            flushing_queries: false,
            last_step: 0.001,
            space_defaults: cfg.space,
            stepper: Stepper::new(),
            shapes: Arena::new(),
            spaces: Arena::new(),
            bodies: Arena::new(),
            areas: Arena::new(),
            active_spaces: BTreeSet::new(),
            info: SpaceInfo::default(),
        }
    }

    fn step(&mut self, dt: f32) {
        if !self.active {
            return;
        }
        self.doing_sync = false;
        self.last_step = dt;
        let mut info = SpaceInfo::default();
        for sid in self.active_spaces.iter().copied().collect::<Vec<_>>() {
            let Some(space) = self.spaces.get_mut(sid.0) else {
                continue;
            };
            let mut objs = Objects {
                bodies: &mut self.bodies,
                areas: &mut self.areas,
                shapes: &self.shapes,
            };
            self.stepper.step(space, &mut objs, dt, self.iterations);
            info.active_objects += space.info.active_objects;
            info.collision_pairs += space.info.collision_pairs;
            info.island_count += space.info.island_count;
        }
        self.info = info;
    }

    fn flush_queries(&mut self) {
        if !self.active {
            return;
        }
        self.flushing_queries = true;
        let step = self.last_step;
        for sid in self.active_spaces.iter().copied().collect::<Vec<_>>() {
            let Some(space) = self.spaces.get_mut(sid.0) else {
                continue;
            };
            let state_queries = std::mem::take(&mut space.state_queries);
            let monitor_queries = std::mem::take(&mut space.monitor_queries);

            for id in state_queries {
                let Some(body) = self.bodies.get_mut(id.0) else {
                    continue;
                };
                let Some(mut callback) = body.force_integration.take() else {
                    continue;
                };
                callback(&mut BodyDirectState {
                    id,
                    body: &mut *body,
                    step,
                });
                if body.force_integration.is_none() {
                    body.force_integration = Some(callback);
                }
                space.refresh_body(id, body);
            }
            for id in monitor_queries {
                if let Some(area) = self.areas.get_mut(id.0) {
                    area.call_queries();
                }
            }
        }
        self.flushing_queries = false;
    }

    fn sync(&mut self) {
        self.doing_sync = true;
    }

    fn end_sync(&mut self) {
        self.doing_sync = false;
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn get_process_info(&self) -> SpaceInfo {
        self.info
    }

    fn body_test_motion(&mut self, body: BodyId, query: &MotionQuery) -> Result<Option<MotionResult>> {
        let sid = self.body_ref(body)?.co.space.ok_or(PhysicsError::NotInSpace)?;
        self.flush_space(sid)?;
        let space = get(&self.spaces, sid.0, SpaceId::KIND)?;
        Ok(space.test_body_motion(body, query, &self.bodies, &self.shapes))
    }

    fn shape_collide(
        &self,
        shape_a: ShapeId,
        xform_a: Transform2D,
        motion_a: Vec2,
        shape_b: ShapeId,
        xform_b: Transform2D,
        motion_b: Vec2,
        max_results: usize,
    ) -> Result<Option<Vec<(Vec2, Vec2)>>> {
        let a = get(&self.shapes, shape_a.0, ShapeId::KIND)?;
        let b = get(&self.shapes, shape_b.0, ShapeId::KIND)?;
        let mut found = DeepestPairs::new(max_results);
        let hit = {
            let cb: &mut dyn FnMut(Vec2, Vec2) = &mut |p: Vec2, q: Vec2| found.push(p, q);
            collision_solver::solve(a, &xform_a, motion_a, b, &xform_b, motion_b, Some(cb))
        };
        Ok(hit.then(|| found.into_vec()))
    }
}
