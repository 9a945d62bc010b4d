//! State shared by bodies and areas: shape slots, transform, layers.
//!
//! Edits never touch the broad phase directly. They raise `pending_update`
//! (bounds must be refreshed) or `needs_reregister` (elements must be
//! recreated so pairs are rebuilt); the owning space reconciles both before
//! the next step or query.

use glam::Affine2;

use crate::arena::Arena;
use crate::broadphase::ElementId;
use crate::error::{PhysicsError, Result};
use crate::shape::Shape;
use crate::types::{Aabb, InstanceId, LayerMask, ShapeId, SpaceId, Transform2D};

pub(crate) struct ShapeSlot {
    pub shape: ShapeId,
    pub xform: Affine2,
    /// Shape bounds in the object's frame.
    pub aabb_cache: Aabb,
    pub disabled: bool,
    pub bpid: Option<ElementId>,
}

pub struct CollisionObject {
    pub(crate) instance_id: InstanceId,
    pub(crate) shapes: Vec<ShapeSlot>,
    pub(crate) transform: Transform2D,
    pub(crate) inv_transform: Transform2D,
    pub(crate) space: Option<SpaceId>,
    pub(crate) layer_mask: LayerMask,
    /// Broad-phase static flag: static elements never pair with each other.
    pub(crate) is_static: bool,
    pub(crate) pending_update: bool,
    pub(crate) needs_reregister: bool,
}

impl CollisionObject {
    pub(crate) fn new(is_static: bool) -> Self {
        Self {
            instance_id: 0,
            shapes: Vec::new(),
            transform: Affine2::IDENTITY,
            inv_transform: Affine2::IDENTITY,
            space: None,
            layer_mask: LayerMask::default(),
            is_static,
            pending_update: false,
            needs_reregister: false,
        }
    }

    fn slot(&self, index: usize) -> Result<&ShapeSlot> {
        let count = self.shapes.len();
        self.shapes
            .get(index)
            .ok_or(PhysicsError::ShapeIndexOutOfRange { index, count })
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut ShapeSlot> {
        let count = self.shapes.len();
        self.shapes
            .get_mut(index)
            .ok_or(PhysicsError::ShapeIndexOutOfRange { index, count })
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn transform(&self) -> Transform2D {
        self.transform
    }

    pub fn space(&self) -> Option<SpaceId> {
        self.space
    }

    pub fn layer_mask(&self) -> LayerMask {
        self.layer_mask
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn shape(&self, index: usize) -> Result<ShapeId> {
        Ok(self.slot(index)?.shape)
    }

    pub fn shape_transform(&self, index: usize) -> Result<Transform2D> {
        Ok(self.slot(index)?.xform)
    }

    pub fn is_shape_disabled(&self, index: usize) -> bool {
        self.shapes.get(index).is_none_or(|s| s.disabled)
    }

    /// World transform of shape `index`.
    pub(crate) fn shape_world_xform(&self, index: usize) -> Affine2 {
        self.shapes
            .get(index)
            .map_or(self.transform, |s| self.transform * s.xform)
    }

    /// Bounds of every enabled shape in the object's frame.
    pub(crate) fn local_bounds(&self) -> Option<Aabb> {
        self.shapes
            .iter()
            .filter(|s| !s.disabled)
            .map(|s| s.aabb_cache)
            .reduce(Aabb::merge)
    }

    pub(crate) fn set_transform(&mut self, xform: Transform2D) {
        self.transform = xform;
        self.inv_transform = xform.inverse();
        self.pending_update = true;
    }

    pub(crate) fn set_layer_mask(&mut self, layer_mask: LayerMask) {
        if self.layer_mask != layer_mask {
            self.layer_mask = layer_mask;
            self.needs_reregister = true;
        }
    }

    pub(crate) fn add_shape(&mut self, id: ShapeId, shape: &Shape, xform: Transform2D) {
        self.shapes.push(ShapeSlot {
            shape: id,
            xform,
            aabb_cache: shape.aabb(&xform),
            disabled: false,
            bpid: None,
        });
        self.pending_update = true;
    }

    /// Swap the shape in a slot. Its element must be recreated.
    pub(crate) fn set_shape(&mut self, index: usize, id: ShapeId, shape: &Shape) -> Result<()> {
        let slot = self.slot_mut(index)?;
        slot.shape = id;
        slot.aabb_cache = shape.aabb(&slot.xform);
        self.needs_reregister = true;
        Ok(())
    }

    pub(crate) fn set_shape_transform(&mut self, index: usize, xform: Transform2D, shape: &Shape) -> Result<()> {
        let slot = self.slot_mut(index)?;
        slot.xform = xform;
        slot.aabb_cache = shape.aabb(&xform);
        self.pending_update = true;
        Ok(())
    }

    pub(crate) fn set_shape_disabled(&mut self, index: usize, disabled: bool) -> Result<()> {
        self.slot_mut(index)?.disabled = disabled;
        self.pending_update = true;
        Ok(())
    }

    /// Recompute cached bounds after a shape's geometry changed.
    pub(crate) fn refresh_shape_bounds(&mut self, shapes: &Arena<Shape>) {
        for slot in &mut self.shapes {
            if let Some(shape) = shapes.get(slot.shape.0) {
                slot.aabb_cache = shape.aabb(&slot.xform);
            }
        }
        self.pending_update = true;
    }

    /// Detach broad-phase elements of slots `from..`. Later slots shift down
    /// on removal, so every element past the edit point is recreated.
    pub(crate) fn take_elements(&mut self, from: usize) -> Vec<ElementId> {
        let ids = self
            .shapes
            .iter_mut()
            .skip(from)
            .filter_map(|s| s.bpid.take())
            .collect();
        if from < self.shapes.len() {
            self.pending_update = true;
        }
        ids
    }

    pub(crate) fn remove_shape(&mut self, index: usize) -> Result<ShapeSlot> {
        self.slot(index)?;
        self.pending_update = true;
        Ok(self.shapes.remove(index))
    }
}
