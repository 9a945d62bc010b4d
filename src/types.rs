use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use crate::arena::Handle;

/// Host-side object key echoed in monitor events and query results.
pub type InstanceId = u64;

/// World or local 2D transform (basis + origin).
pub type Transform2D = Affine2;

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub Handle);

        impl $name {
            pub(crate) const KIND: &'static str = $kind;
        }
    };
}

typed_handle!(
    /// Handle to a shape created by one of the shape factories.
    ShapeId,
    "shape"
);
typed_handle!(
    /// Handle to a simulated world.
    SpaceId,
    "space"
);
typed_handle!(
    /// Handle to a body.
    BodyId,
    "body"
);
typed_handle!(
    /// Handle to an area.
    AreaId,
    "area"
);
typed_handle!(
    /// Handle to a pair constraint inside its space.
    ConstraintId,
    "constraint"
);

/// Either kind of collision object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectId {
    Area(AreaId),
    Body(BodyId),
}

impl From<BodyId> for ObjectId {
    fn from(id: BodyId) -> Self {
        ObjectId::Body(id)
    }
}

impl From<AreaId> for ObjectId {
    fn from(id: AreaId) -> Self {
        ObjectId::Area(id)
    }
}

/// Axis-aligned bounding box (min/max corners).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_center_half(center: Vec2, half: Vec2) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Smallest box containing all points. Empty input gives a zero box.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut it = points.into_iter();
        let Some(first) = it.next() else {
            return Self::default();
        };
        let mut out = Self::new(first, first);
        for p in it {
            out.min = out.min.min(p);
            out.max = out.max.max(p);
        }
        out
    }

    pub fn merge(self, other: Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn grow(self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    /// Extend the box to also cover itself translated by `motion`.
    pub fn swept(self, motion: Vec2) -> Aabb {
        self.merge(Aabb {
            min: self.min + motion,
            max: self.max + motion,
        })
    }

    pub fn translated(self, by: Vec2) -> Aabb {
        Aabb {
            min: self.min + by,
            max: self.max + by,
        }
    }

    /// Bounds of this box's corners under `xform`.
    pub fn transformed(self, xform: &Transform2D) -> Aabb {
        Aabb::from_points(
            [
                self.min,
                Vec2::new(self.max.x, self.min.y),
                self.max,
                Vec2::new(self.min.x, self.max.y),
            ]
            .map(|p| xform.transform_point2(p)),
        )
    }

    /// Inclusive overlap test (touching boxes intersect).
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn area(&self) -> f32 {
        let s = self.size();
        s.x * s.y
    }
}

/// Collision layer/mask pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LayerMask {
    /// Layer(s) this object lives on.
    pub layer: u32,
    /// Layers this object scans.
    pub mask: u32,
}

impl Default for LayerMask {
    fn default() -> Self {
        Self { layer: 1, mask: 1 }
    }
}

impl LayerMask {
    pub fn simple(layer: u32, mask: u32) -> Self {
        Self { layer, mask }
    }

    /// Two objects interact when either one scans a layer of the other.
    pub fn interacts(self, other: LayerMask) -> bool {
        (self.mask & other.layer) != 0 || (other.mask & self.layer) != 0
    }
}

/// Simulation mode of a body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BodyMode {
    Static,
    Kinematic,
    Rigid,
    /// Rigid without rotation.
    Character,
}

impl BodyMode {
    /// Static and kinematic bodies anchor islands and never move under the solver.
    pub fn is_anchor(self) -> bool {
        matches!(self, BodyMode::Static | BodyMode::Kinematic)
    }
}

/// Continuous collision strategy used by body pairs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CcdMode {
    #[default]
    Disabled,
    /// Cast a ray from the leading support along the step motion.
    CastRay,
    /// Sweep the shape along the step motion inside the SAT test.
    CastShape,
}

/// Tunable body parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BodyParam {
    Bounce(f32),
    Friction(f32),
    Mass(f32),
    /// Zero means "derive from shapes".
    Inertia(f32),
    GravityScale(f32),
    /// Negative means "use area/space value".
    LinearDamp(f32),
    /// Negative means "use area/space value".
    AngularDamp(f32),
}

/// Writable body state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BodyState {
    Transform(Transform2D),
    LinearVelocity(Vec2),
    AngularVelocity(f32),
    Sleeping(bool),
    CanSleep(bool),
}

/// How an area's gravity/damping combine with the ambient values.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SpaceOverrideMode {
    #[default]
    Disabled,
    /// Add to what has been computed so far.
    Combine,
    /// Add, then stop evaluating lower priority areas.
    CombineReplace,
    /// Replace what has been computed so far and stop.
    Replace,
    /// Replace what has been computed so far and keep going.
    ReplaceCombine,
}

/// Single area parameter write.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AreaParam {
    Gravity(f32),
    GravityVector(Vec2),
    GravityIsPoint(bool),
    GravityDistanceScale(f32),
    GravityPointAttenuation(f32),
    LinearDamp(f32),
    AngularDamp(f32),
    Priority(f32),
}

/// Gravity/damping block carried by areas and by each space's default area.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaParams {
    pub gravity: f32,
    /// Direction, or the attraction point (local) when `gravity_is_point`.
    pub gravity_vector: Vec2,
    pub gravity_is_point: bool,
    pub gravity_distance_scale: f32,
    pub gravity_point_attenuation: f32,
    pub linear_damp: f32,
    pub angular_damp: f32,
    pub priority: f32,
}

impl Default for AreaParams {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            gravity_vector: Vec2::new(0.0, -1.0),
            gravity_is_point: false,
            gravity_distance_scale: 0.0,
            gravity_point_attenuation: 1.0,
            linear_damp: 0.1,
            angular_damp: 1.0,
            priority: 0.0,
        }
    }
}

impl AreaParams {
    pub fn apply(&mut self, param: AreaParam) {
        match param {
            AreaParam::Gravity(v) => self.gravity = v,
            AreaParam::GravityVector(v) => self.gravity_vector = v,
            AreaParam::GravityIsPoint(v) => self.gravity_is_point = v,
            AreaParam::GravityDistanceScale(v) => self.gravity_distance_scale = v,
            AreaParam::GravityPointAttenuation(v) => self.gravity_point_attenuation = v,
            AreaParam::LinearDamp(v) => self.linear_damp = v,
            AreaParam::AngularDamp(v) => self.angular_damp = v,
            AreaParam::Priority(v) => self.priority = v,
        }
    }
}

/// Runtime-tunable space settings.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SpaceParam {
    ContactRecycleRadius(f32),
    ContactMaxSeparation(f32),
    ContactMaxAllowedPenetration(f32),
    BodyLinearVelocitySleepThreshold(f32),
    BodyAngularVelocitySleepThreshold(f32),
    BodyTimeToSleep(f32),
    ConstraintDefaultBias(f32),
}

/// Per-space solver and broad-phase settings.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Contacts closer than this to an old one inherit its impulses.
    pub contact_recycle_radius: f32,
    /// Contacts drifting further apart than this are dropped.
    pub contact_max_separation: f32,
    /// Penetration left uncorrected by the position bias.
    pub contact_max_allowed_penetration: f32,
    pub body_linear_velocity_sleep_threshold: f32,
    /// Radians per second.
    pub body_angular_velocity_sleep_threshold: f32,
    /// Seconds a body must stay below both thresholds before sleeping.
    pub body_time_to_sleep: f32,
    /// Fraction of penetration corrected per step.
    pub constraint_default_bias: f32,
    /// Broad-phase grid cell size in world units.
    pub cell_size: f32,
    /// Gravity and damping applied outside of any overriding area.
    pub default_area: AreaParams,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            // World units are metres.
            contact_recycle_radius: 0.01,
            contact_max_separation: 0.05,
            contact_max_allowed_penetration: 0.01,
            body_linear_velocity_sleep_threshold: 0.1,
            body_angular_velocity_sleep_threshold: 8.0_f32.to_radians(),
            body_time_to_sleep: 0.5,
            constraint_default_bias: 0.3,
            cell_size: 8.0,
            default_area: AreaParams::default(),
        }
    }
}

impl SpaceConfig {
    pub fn apply(&mut self, param: SpaceParam) {
        match param {
            SpaceParam::ContactRecycleRadius(v) => self.contact_recycle_radius = v,
            SpaceParam::ContactMaxSeparation(v) => self.contact_max_separation = v,
            SpaceParam::ContactMaxAllowedPenetration(v) => self.contact_max_allowed_penetration = v,
            SpaceParam::BodyLinearVelocitySleepThreshold(v) => {
                self.body_linear_velocity_sleep_threshold = v
            }
            SpaceParam::BodyAngularVelocitySleepThreshold(v) => {
                self.body_angular_velocity_sleep_threshold = v
            }
            SpaceParam::BodyTimeToSleep(v) => self.body_time_to_sleep = v,
            SpaceParam::ConstraintDefaultBias(v) => self.constraint_default_bias = v,
        }
    }

    /// Reads back the value `param` would write (the payload is ignored).
    pub fn get(&self, param: SpaceParam) -> f32 {
        match param {
            SpaceParam::ContactRecycleRadius(_) => self.contact_recycle_radius,
            SpaceParam::ContactMaxSeparation(_) => self.contact_max_separation,
            SpaceParam::ContactMaxAllowedPenetration(_) => self.contact_max_allowed_penetration,
            SpaceParam::BodyLinearVelocitySleepThreshold(_) => {
                self.body_linear_velocity_sleep_threshold
            }
            SpaceParam::BodyAngularVelocitySleepThreshold(_) => {
                self.body_angular_velocity_sleep_threshold
            }
            SpaceParam::BodyTimeToSleep(_) => self.body_time_to_sleep,
            SpaceParam::ConstraintDefaultBias(_) => self.constraint_default_bias,
        }
    }
}

/// Server-wide configuration.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Sequential-impulse passes per island per step.
    pub iterations: usize,
    /// Settings copied into every newly created space.
    pub space: SpaceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            iterations: 8,
            space: SpaceConfig::default(),
        }
    }
}

/// Aggregate statistics from the last step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SpaceInfo {
    pub active_objects: usize,
    pub collision_pairs: usize,
    pub island_count: usize,
}

/// Monitor transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MonitorStatus {
    Added,
    Removed,
}

/// One coalesced overlap transition delivered by `flush_queries`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MonitorEvent {
    pub status: MonitorStatus,
    pub other: ObjectId,
    pub other_instance: InstanceId,
    pub other_shape: usize,
    pub self_shape: usize,
}

/// Hit returned by segment-style tests and ray queries.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SegmentHit {
    /// Fraction along the segment in [0,1].
    pub toi: f32,
    pub point: Vec2,
    /// Surface normal at the hit (zero when starting inside).
    pub normal: Vec2,
}

/// Closest hit of `space_intersect_ray`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayResult {
    pub position: Vec2,
    pub normal: Vec2,
    pub collider: ObjectId,
    pub collider_instance: InstanceId,
    pub shape: usize,
}

/// One shape found by `space_intersect_point`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShapeResult {
    pub collider: ObjectId,
    pub collider_instance: InstanceId,
    pub shape: usize,
}

/// Filters for direct space queries.
#[derive(Clone, Debug)]
pub struct QueryFilter {
    pub mask: u32,
    pub exclude: Vec<ObjectId>,
    pub collide_with_bodies: bool,
    pub collide_with_areas: bool,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            mask: u32::MAX,
            exclude: Vec::new(),
            collide_with_bodies: true,
            collide_with_areas: false,
        }
    }
}

/// Outcome of `body_test_motion`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MotionResult {
    /// Motion that can be applied without colliding (includes recovery).
    pub motion: Vec2,
    /// Part of the requested motion that was blocked.
    pub remainder: Vec2,
    pub collision_point: Vec2,
    pub collision_normal: Vec2,
    pub collider_velocity: Vec2,
    pub collision_local_shape: usize,
    pub collider: Option<BodyId>,
    pub collider_instance: InstanceId,
    pub collider_shape: usize,
    pub collision_depth: f32,
    pub collision_safe_fraction: f32,
    pub collision_unsafe_fraction: f32,
}

/// Parameters of `body_test_motion`.
#[derive(Clone, Debug)]
pub struct MotionQuery {
    pub from: Transform2D,
    pub motion: Vec2,
    /// Treat rigid bodies as pushable (ignored by the test).
    pub infinite_inertia: bool,
    pub margin: f32,
    pub exclude_raycast_shapes: bool,
    pub exclude: Vec<BodyId>,
}

impl MotionQuery {
    pub fn new(from: Transform2D, motion: Vec2) -> Self {
        Self {
            from,
            motion,
            infinite_inertia: false,
            margin: 0.08,
            exclude_raycast_shapes: true,
            exclude: Vec::new(),
        }
    }
}
