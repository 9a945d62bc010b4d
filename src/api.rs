use glam::Vec2;

use crate::error::Result;
use crate::types::*;

/// Per-tick driver and raw query contract of the physics server.
pub trait PhysicsServerApi {
    /// Construct a server with the given configuration.
    fn new(cfg: ServerConfig) -> Self
    where
        Self: Sized;

    // --- Tick lifecycle ----------------------------------------------------

    /// Advance every active space by `dt` seconds.
    fn step(&mut self, dt: f32);

    /// Deliver queued force-integration and monitor callbacks.
    /// Must be called after `step` returns, never from inside it.
    fn flush_queries(&mut self);

    /// Mark the start of the window where hosts read back physics state.
    fn sync(&mut self);

    /// Close the read-back window opened by `sync`.
    fn end_sync(&mut self);

    /// Enable or disable stepping globally.
    fn set_active(&mut self, active: bool);

    /// Statistics summed over active spaces for the last step.
    fn get_process_info(&self) -> SpaceInfo;

    // --- Queries -----------------------------------------------------------

    /// Sweep `body` from `query.from` along `query.motion`.
    /// Returns `Some` when the motion is blocked.
    fn body_test_motion(&mut self, body: BodyId, query: &MotionQuery) -> Result<Option<MotionResult>>;

    /// Raw shape-vs-shape test. `None` when the shapes do not touch,
    /// otherwise up to `max_results` (point on A, point on B) pairs.
    #[allow(clippy::too_many_arguments)]
    fn shape_collide(
        &self,
        shape_a: ShapeId,
        xform_a: Transform2D,
        motion_a: Vec2,
        shape_b: ShapeId,
        xform_b: Transform2D,
        motion_b: Vec2,
        max_results: usize,
    ) -> Result<Option<Vec<(Vec2, Vec2)>>>;
}

/// Primitive segment and point tests used by shapes and space queries.
pub trait NarrowphaseApi {
    // Segments --------------------------------------------------------------

    fn segment_aabb(a: Vec2, b: Vec2, aabb_min: Vec2, aabb_max: Vec2) -> Option<SegmentHit>;
    fn segment_circle(a: Vec2, b: Vec2, center: Vec2, r: f32) -> Option<SegmentHit>;
    /// Intersection fraction along `a0..a1` and the point.
    fn segment_segment(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> Option<(f32, Vec2)>;

    // Points ----------------------------------------------------------------

    fn point_in_aabb(p: Vec2, c: Vec2, h: Vec2) -> bool;
    fn point_in_circle(p: Vec2, c: Vec2, r: f32) -> bool;
    fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2;
}
