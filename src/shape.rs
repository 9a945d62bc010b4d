//! Geometric primitives.
//!
//! A [`Shape`] is immutable once built; reconfiguring it replaces the whole
//! geometry through [`Shape::set_data`]. All geometry is stored in the shape's
//! local frame; callers pass the world transform into each primitive.

use glam::{Affine2, Vec2};

use crate::api::NarrowphaseApi;
use crate::error::{PhysicsError, Result};
use crate::narrowphase::Narrowphase;
use crate::types::Aabb;

/// Dot product above which an edge counts as facing a direction.
pub const SEGMENT_SUPPORT_THRESHOLD: f32 = 0.99998;

/// Shape kinds. The order is used to canonicalise solver pairs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeType {
    Ray,
    Segment,
    Circle,
    Rectangle,
    Capsule,
    ConvexPolygon,
}

/// Configuration payload for `set_data`/`get_data`.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeData {
    /// Ray from the local origin along local +Y.
    Ray { length: f32, slips_on_slope: bool },
    Segment { a: Vec2, b: Vec2 },
    Circle { radius: f32 },
    Rectangle { half_extents: Vec2 },
    /// Vertical capsule; `height` is the distance between the cap centers.
    Capsule { radius: f32, height: f32 },
    ConvexPolygon { points: Vec<Vec2> },
}

impl ShapeData {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            ShapeData::Ray { .. } => ShapeType::Ray,
            ShapeData::Segment { .. } => ShapeType::Segment,
            ShapeData::Circle { .. } => ShapeType::Circle,
            ShapeData::Rectangle { .. } => ShapeType::Rectangle,
            ShapeData::Capsule { .. } => ShapeType::Capsule,
            ShapeData::ConvexPolygon { .. } => ShapeType::ConvexPolygon,
        }
    }

    /// Geometry a freshly created shape of `ty` starts with.
    pub fn default_for(ty: ShapeType) -> ShapeData {
        match ty {
            ShapeType::Ray => ShapeData::Ray {
                length: 1.0,
                slips_on_slope: false,
            },
            ShapeType::Segment => ShapeData::Segment {
                a: Vec2::ZERO,
                b: Vec2::X,
            },
            ShapeType::Circle => ShapeData::Circle { radius: 0.5 },
            ShapeType::Rectangle => ShapeData::Rectangle {
                half_extents: Vec2::splat(0.5),
            },
            ShapeType::Capsule => ShapeData::Capsule {
                radius: 0.5,
                height: 1.0,
            },
            ShapeType::ConvexPolygon => ShapeData::ConvexPolygon {
                points: vec![
                    Vec2::new(-0.5, -0.5),
                    Vec2::new(0.5, -0.5),
                    Vec2::new(0.5, 0.5),
                    Vec2::new(-0.5, 0.5),
                ],
            },
        }
    }
}

/// Up to two support points.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Supports {
    pts: [Vec2; 2],
    len: usize,
}

impl Supports {
    fn one(p: Vec2) -> Self {
        Self {
            pts: [p, Vec2::ZERO],
            len: 1,
        }
    }

    fn two(a: Vec2, b: Vec2) -> Self {
        Self { pts: [a, b], len: 2 }
    }

    pub fn as_slice(&self) -> &[Vec2] {
        &self.pts[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn map(mut self, f: impl Fn(Vec2) -> Vec2) -> Self {
        for p in &mut self.pts[..self.len] {
            *p = f(*p);
        }
        self
    }

    pub(crate) fn translated(self, by: Vec2) -> Self {
        self.map(|p| p + by)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Geometry {
    Ray { length: f32, slips_on_slope: bool },
    Segment { a: Vec2, b: Vec2, normal: Vec2 },
    Circle { radius: f32 },
    Rectangle { half_extents: Vec2 },
    Capsule { radius: f32, height: f32 },
    ConvexPolygon { points: Vec<Vec2>, normals: Vec<Vec2> },
}

/// Immutable geometric descriptor shared by collision objects.
#[derive(Clone, Debug)]
pub struct Shape {
    geom: Geometry,
    custom_bias: f32,
    local_aabb: Aabb,
}

/// `basisᵀ · v`: a world direction expressed in the local frame (unnormalized).
pub(crate) fn basis_xform_inv(xform: &Affine2, v: Vec2) -> Vec2 {
    Vec2::new(xform.matrix2.x_axis.dot(v), xform.matrix2.y_axis.dot(v))
}

/// Transform a local normal to world space (inverse transpose), normalized.
pub(crate) fn xform_normal(xform: &Affine2, n: Vec2) -> Vec2 {
    (xform.matrix2.inverse().transpose() * n).normalize_or_zero()
}

fn check_scalar(shape: ShapeType, v: f32, what: &str) -> Result<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(PhysicsError::InvalidShapeData {
            shape,
            reason: format!("{what} must be finite and non-negative, got {v}"),
        });
    }
    Ok(())
}

fn check_point(shape: ShapeType, p: Vec2, what: &str) -> Result<()> {
    if !p.is_finite() {
        return Err(PhysicsError::InvalidShapeData {
            shape,
            reason: format!("{what} must be finite, got {p}"),
        });
    }
    Ok(())
}

fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].perp_dot(points[(i + 1) % n]))
        .sum::<f32>()
        * 0.5
}

fn build_geometry(data: ShapeData) -> Result<Geometry> {
    let ty = data.shape_type();
    Ok(match data {
        ShapeData::Ray {
            length,
            slips_on_slope,
        } => {
            check_scalar(ty, length, "length")?;
            Geometry::Ray {
                length,
                slips_on_slope,
            }
        }
        ShapeData::Segment { a, b } => {
            check_point(ty, a, "a")?;
            check_point(ty, b, "b")?;
            let d = b - a;
            Geometry::Segment {
                a,
                b,
                normal: Vec2::new(d.y, -d.x).normalize_or_zero(),
            }
        }
        ShapeData::Circle { radius } => {
            check_scalar(ty, radius, "radius")?;
            Geometry::Circle { radius }
        }
        ShapeData::Rectangle { half_extents } => {
            check_scalar(ty, half_extents.x, "half_extents.x")?;
            check_scalar(ty, half_extents.y, "half_extents.y")?;
            Geometry::Rectangle { half_extents }
        }
        ShapeData::Capsule { radius, height } => {
            check_scalar(ty, radius, "radius")?;
            check_scalar(ty, height, "height")?;
            Geometry::Capsule { radius, height }
        }
        ShapeData::ConvexPolygon { mut points } => {
            if points.len() < 3 {
                return Err(PhysicsError::InvalidShapeData {
                    shape: ty,
                    reason: format!("need at least 3 points, got {}", points.len()),
                });
            }
            for (i, p) in points.iter().enumerate() {
                check_point(ty, *p, &format!("point {i}"))?;
            }
            if signed_area(&points) < 0.0 {
                points.reverse();
            }
            let n = points.len();
            let normals = (0..n)
                .map(|i| {
                    let d = points[(i + 1) % n] - points[i];
                    Vec2::new(d.y, -d.x).normalize_or_zero()
                })
                .collect();
            Geometry::ConvexPolygon { points, normals }
        }
    })
}

fn compute_local_aabb(geom: &Geometry) -> Aabb {
    match geom {
        Geometry::Ray { length, .. } => {
            Aabb::from_points([Vec2::ZERO, Vec2::new(0.0, *length)]).grow(0.1)
        }
        Geometry::Segment { a, b, .. } => Aabb::from_points([*a, *b]),
        Geometry::Circle { radius } => Aabb::from_center_half(Vec2::ZERO, Vec2::splat(*radius)),
        Geometry::Rectangle { half_extents } => Aabb::from_center_half(Vec2::ZERO, *half_extents),
        Geometry::Capsule { radius, height } => {
            Aabb::from_center_half(Vec2::ZERO, Vec2::new(*radius, height * 0.5 + radius))
        }
        Geometry::ConvexPolygon { points, .. } => Aabb::from_points(points.iter().copied()),
    }
}

impl Shape {
    pub fn new(data: ShapeData) -> Result<Shape> {
        let geom = build_geometry(data)?;
        let local_aabb = compute_local_aabb(&geom);
        Ok(Shape {
            geom,
            custom_bias: 0.0,
            local_aabb,
        })
    }

    /// Replace the geometry. The shape type cannot change.
    pub fn set_data(&mut self, data: ShapeData) -> Result<()> {
        if data.shape_type() != self.shape_type() {
            return Err(PhysicsError::InvalidShapeData {
                shape: self.shape_type(),
                reason: format!("got {:?} data", data.shape_type()),
            });
        }
        self.geom = build_geometry(data)?;
        self.local_aabb = compute_local_aabb(&self.geom);
        Ok(())
    }

    pub fn get_data(&self) -> ShapeData {
        match &self.geom {
            Geometry::Ray {
                length,
                slips_on_slope,
            } => ShapeData::Ray {
                length: *length,
                slips_on_slope: *slips_on_slope,
            },
            Geometry::Segment { a, b, .. } => ShapeData::Segment { a: *a, b: *b },
            Geometry::Circle { radius } => ShapeData::Circle { radius: *radius },
            Geometry::Rectangle { half_extents } => ShapeData::Rectangle {
                half_extents: *half_extents,
            },
            Geometry::Capsule { radius, height } => ShapeData::Capsule {
                radius: *radius,
                height: *height,
            },
            Geometry::ConvexPolygon { points, .. } => ShapeData::ConvexPolygon {
                points: points.clone(),
            },
        }
    }

    pub fn shape_type(&self) -> ShapeType {
        match self.geom {
            Geometry::Ray { .. } => ShapeType::Ray,
            Geometry::Segment { .. } => ShapeType::Segment,
            Geometry::Circle { .. } => ShapeType::Circle,
            Geometry::Rectangle { .. } => ShapeType::Rectangle,
            Geometry::Capsule { .. } => ShapeType::Capsule,
            Geometry::ConvexPolygon { .. } => ShapeType::ConvexPolygon,
        }
    }

    pub(crate) fn geometry(&self) -> &Geometry {
        &self.geom
    }

    /// Rays and segments never produce a rigid contact response.
    pub fn is_query_only(&self) -> bool {
        matches!(self.geom, Geometry::Ray { .. } | Geometry::Segment { .. })
    }

    pub fn custom_bias(&self) -> f32 {
        self.custom_bias
    }

    pub fn set_custom_bias(&mut self, bias: f32) {
        self.custom_bias = bias;
    }

    pub fn local_aabb(&self) -> Aabb {
        self.local_aabb
    }

    /// World bounds under `xform`.
    pub fn aabb(&self, xform: &Affine2) -> Aabb {
        if let Geometry::Circle { radius } = self.geom {
            let s = Vec2::new(
                xform.matrix2.x_axis.length(),
                xform.matrix2.y_axis.length(),
            )
            .max_element();
            return Aabb::from_center_half(xform.translation, Vec2::splat(radius * s));
        }
        let a = self.local_aabb;
        Aabb::from_points(
            [
                a.min,
                Vec2::new(a.max.x, a.min.y),
                a.max,
                Vec2::new(a.min.x, a.max.y),
            ]
            .map(|p| xform.transform_point2(p)),
        )
    }

    /// Interval covered by the shape along the unit `axis`.
    pub fn project_range(&self, axis: Vec2, xform: &Affine2) -> (f32, f32) {
        match &self.geom {
            Geometry::Ray { length, .. } => {
                let a = axis.dot(xform.translation);
                let b = axis.dot(xform.transform_point2(Vec2::new(0.0, *length)));
                (a.min(b), a.max(b))
            }
            Geometry::Segment { a, b, .. } => {
                let a = axis.dot(xform.transform_point2(*a));
                let b = axis.dot(xform.transform_point2(*b));
                (a.min(b), a.max(b))
            }
            Geometry::Circle { radius } => {
                let d = axis.dot(xform.translation);
                let r = radius * basis_xform_inv(xform, axis).length();
                (d - r, d + r)
            }
            Geometry::Rectangle { half_extents } => {
                let len = basis_xform_inv(xform, axis).abs().dot(*half_extents);
                let d = axis.dot(xform.translation);
                (d - len, d + len)
            }
            Geometry::Capsule { radius, height } => {
                let mut n = basis_xform_inv(xform, axis).normalize_or_zero();
                let h = if n.y > 0.0 { *height } else { -*height };
                n *= *radius;
                n.y += h * 0.5;
                let hi = axis.dot(xform.transform_point2(n));
                let lo = axis.dot(xform.transform_point2(-n));
                (lo.min(hi), lo.max(hi))
            }
            Geometry::ConvexPolygon { points, .. } => {
                let mut lo = f32::INFINITY;
                let mut hi = f32::NEG_INFINITY;
                for p in points {
                    let d = axis.dot(xform.transform_point2(*p));
                    lo = lo.min(d);
                    hi = hi.max(d);
                }
                (lo, hi)
            }
        }
    }

    /// Interval along `axis` swept by the shape over `cast`.
    pub fn project_range_cast(&self, cast: Vec2, axis: Vec2, xform: &Affine2) -> (f32, f32) {
        let (lo, hi) = self.project_range(axis, xform);
        if cast == Vec2::ZERO {
            return (lo, hi);
        }
        let moved = Affine2 {
            matrix2: xform.matrix2,
            translation: xform.translation + cast,
        };
        let (lo2, hi2) = self.project_range(axis, &moved);
        (lo.min(lo2), hi.max(hi2))
    }

    /// Furthest feature along the local unit `n`: one point, or an edge when
    /// the edge faces `n`.
    pub fn supports(&self, n: Vec2) -> Supports {
        match &self.geom {
            Geometry::Ray { length, .. } => {
                if n.y > 0.0 {
                    Supports::one(Vec2::new(0.0, *length))
                } else {
                    Supports::one(Vec2::ZERO)
                }
            }
            Geometry::Segment { a, b, normal } => {
                if normal.dot(n).abs() > SEGMENT_SUPPORT_THRESHOLD {
                    Supports::two(*a, *b)
                } else if n.dot(*a) > n.dot(*b) {
                    Supports::one(*a)
                } else {
                    Supports::one(*b)
                }
            }
            Geometry::Circle { radius } => Supports::one(n * *radius),
            Geometry::Rectangle { half_extents } => {
                let he = *half_extents;
                for i in 0..2 {
                    let dp = n[i];
                    if dp.abs() < SEGMENT_SUPPORT_THRESHOLD {
                        continue;
                    }
                    let sgn = if dp > 0.0 { 1.0 } else { -1.0 };
                    let j = i ^ 1;
                    let mut p0 = Vec2::ZERO;
                    let mut p1 = Vec2::ZERO;
                    p0[i] = he[i] * sgn;
                    p0[j] = he[j];
                    p1[i] = he[i] * sgn;
                    p1[j] = -he[j];
                    return Supports::two(p0, p1);
                }
                Supports::one(Vec2::new(
                    if n.x < 0.0 { -he.x } else { he.x },
                    if n.y < 0.0 { -he.y } else { he.y },
                ))
            }
            Geometry::Capsule { radius, height } => {
                if n.y.abs() < 1.0 - SEGMENT_SUPPORT_THRESHOLD {
                    let side = Vec2::new(n.x, 0.0).normalize_or_zero() * *radius;
                    Supports::two(
                        side + Vec2::new(0.0, height * 0.5),
                        side - Vec2::new(0.0, height * 0.5),
                    )
                } else {
                    let h = if n.y > 0.0 { *height } else { -*height };
                    Supports::one(n * *radius + Vec2::new(0.0, h * 0.5))
                }
            }
            Geometry::ConvexPolygon { points, normals } => {
                let count = points.len();
                let mut best = 0;
                let mut best_d = f32::NEG_INFINITY;
                for i in 0..count {
                    if normals[i].dot(n) > SEGMENT_SUPPORT_THRESHOLD {
                        return Supports::two(points[i], points[(i + 1) % count]);
                    }
                    let d = n.dot(points[i]);
                    if d > best_d {
                        best_d = d;
                        best = i;
                    }
                }
                Supports::one(points[best])
            }
        }
    }

    /// World-space supports along world `normal`, extended by `cast`.
    pub fn supports_transformed_cast(&self, cast: Vec2, normal: Vec2, xform: &Affine2) -> Supports {
        let local_n = basis_xform_inv(xform, normal).normalize_or_zero();
        let mut s = self.supports(local_n).map(|p| xform.transform_point2(p));
        if cast == Vec2::ZERO {
            return s;
        }
        let parallel = normal.dot(cast.normalize_or_zero()).abs() < 1.0 - SEGMENT_SUPPORT_THRESHOLD;
        if s.len == 1 {
            if parallel {
                s = Supports::two(s.pts[0], s.pts[0] + cast);
            } else if cast.dot(normal) > 0.0 {
                s.pts[0] += cast;
            }
        } else if parallel {
            if (s.pts[1] - s.pts[0]).dot(cast) > 0.0 {
                s.pts[1] += cast;
            } else {
                s.pts[0] += cast;
            }
        } else if cast.dot(normal) > 0.0 {
            s.pts[0] += cast;
            s.pts[1] += cast;
        }
        s
    }

    /// First entry point of the local segment `from..to` and the surface normal.
    pub fn intersect_segment(&self, from: Vec2, to: Vec2) -> Option<(Vec2, Vec2)> {
        match &self.geom {
            Geometry::Ray { .. } => None,
            Geometry::Segment { a, b, normal } => {
                let (_, p) = Narrowphase::segment_segment(from, to, *a, *b)?;
                let n = if normal.dot(from) > normal.dot(*a) {
                    *normal
                } else {
                    -*normal
                };
                Some((p, n))
            }
            Geometry::Circle { radius } => {
                Narrowphase::segment_circle(from, to, Vec2::ZERO, *radius).map(|h| (h.point, h.normal))
            }
            Geometry::Rectangle { half_extents } => {
                Narrowphase::segment_aabb(from, to, -*half_extents, *half_extents)
                    .map(|h| (h.point, h.normal))
            }
            Geometry::Capsule { radius, height } => {
                let mut best: Option<crate::types::SegmentHit> = None;
                let mut consider = |h: Option<crate::types::SegmentHit>| {
                    if let Some(h) = h {
                        if best.is_none_or(|b| h.toi < b.toi) {
                            best = Some(h);
                        }
                    }
                };
                for ofs in [-height * 0.5, height * 0.5] {
                    consider(Narrowphase::segment_circle(from, to, Vec2::new(0.0, ofs), *radius));
                }
                let he = Vec2::new(*radius, height * 0.5);
                consider(Narrowphase::segment_aabb(from, to, -he, he));
                best.map(|h| (h.point, h.normal))
            }
            Geometry::ConvexPolygon { points, normals } => {
                let count = points.len();
                let mut best: Option<(f32, Vec2, Vec2)> = None;
                for i in 0..count {
                    let Some((t, p)) =
                        Narrowphase::segment_segment(from, to, points[i], points[(i + 1) % count])
                    else {
                        continue;
                    };
                    if best.is_none_or(|(bt, _, _)| t < bt) {
                        best = Some((t, p, normals[i]));
                    }
                }
                best.map(|(_, p, mut n)| {
                    if n.dot(to - from) > 0.0 {
                        n = -n;
                    }
                    (p, n)
                })
            }
        }
    }

    /// Local point containment. Rays and segments contain nothing.
    pub fn contains_point(&self, p: Vec2) -> bool {
        match &self.geom {
            Geometry::Ray { .. } | Geometry::Segment { .. } => false,
            Geometry::Circle { radius } => Narrowphase::point_in_circle(p, Vec2::ZERO, *radius),
            Geometry::Rectangle { half_extents } => {
                Narrowphase::point_in_aabb(p, Vec2::ZERO, *half_extents)
            }
            Geometry::Capsule { radius, height } => {
                let q = Narrowphase::closest_point_on_segment(
                    p,
                    Vec2::new(0.0, -height * 0.5),
                    Vec2::new(0.0, height * 0.5),
                );
                (p - q).length_squared() <= radius * radius
            }
            Geometry::ConvexPolygon { points, normals } => points
                .iter()
                .zip(normals)
                .all(|(v, n)| n.dot(p - *v) <= 0.0),
        }
    }

    /// Moment of inertia about the local origin for a uniform `mass`.
    pub fn moment_of_inertia(&self, mass: f32) -> f32 {
        match &self.geom {
            Geometry::Ray { .. } => 0.0,
            Geometry::Segment { a, b, .. } => mass * (*b - *a).length_squared() / 12.0,
            Geometry::Circle { radius } => mass * radius * radius * 0.5,
            Geometry::Rectangle { half_extents } => mass * half_extents.length_squared() / 3.0,
            Geometry::Capsule { radius, height } => {
                let size = Vec2::new(radius * 2.0, height + radius * 2.0);
                mass * size.length_squared() / 12.0
            }
            Geometry::ConvexPolygon { .. } => {
                let size = self.local_aabb.size();
                mass * size.length_squared() / 12.0
            }
        }
    }

    /// World-space corners of rectangles and polygons, counter-clockwise in
    /// local space.
    pub(crate) fn world_vertices(&self, xform: &Affine2) -> Option<Vec<Vec2>> {
        match &self.geom {
            Geometry::Rectangle { half_extents } => {
                let he = *half_extents;
                Some(
                    [
                        Vec2::new(-he.x, -he.y),
                        Vec2::new(he.x, -he.y),
                        Vec2::new(he.x, he.y),
                        Vec2::new(-he.x, he.y),
                    ]
                    .iter()
                    .map(|p| xform.transform_point2(*p))
                    .collect(),
                )
            }
            Geometry::ConvexPolygon { points, .. } => {
                Some(points.iter().map(|p| xform.transform_point2(*p)).collect())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(data: ShapeData) -> Shape {
        Shape::new(data).unwrap()
    }

    #[test]
    fn test_polygon_requires_three_points() {
        let err = Shape::new(ShapeData::ConvexPolygon {
            points: vec![Vec2::ZERO, Vec2::X],
        })
        .unwrap_err();
        assert!(matches!(
            err,
            PhysicsError::InvalidShapeData {
                shape: ShapeType::ConvexPolygon,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_radius_rejected() {
        assert!(Shape::new(ShapeData::Circle { radius: -1.0 }).is_err());
        assert!(Shape::new(ShapeData::Circle { radius: f32::NAN }).is_err());
    }

    #[test]
    fn test_set_data_keeps_type() {
        let mut s = shape(ShapeData::Circle { radius: 1.0 });
        assert!(s
            .set_data(ShapeData::Rectangle {
                half_extents: Vec2::ONE
            })
            .is_err());
        s.set_data(ShapeData::Circle { radius: 2.0 }).unwrap();
        assert_eq!(s.get_data(), ShapeData::Circle { radius: 2.0 });
        assert_eq!(s.local_aabb().max, Vec2::splat(2.0));
    }

    #[test]
    fn test_clockwise_polygon_rewound() {
        let s = shape(ShapeData::ConvexPolygon {
            points: vec![
                Vec2::new(-1.0, -1.0),
                Vec2::new(-1.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, -1.0),
            ],
        });
        // Outward normals: every vertex lies on the inner side of every edge.
        assert!(s.contains_point(Vec2::ZERO));
        assert!(!s.contains_point(Vec2::new(1.5, 0.0)));
        let sup = s.supports(Vec2::Y);
        assert_eq!(sup.len(), 2);
        assert!(sup.as_slice().iter().all(|p| p.y == 1.0));
    }

    #[test]
    fn test_rectangle_project_range_rotated() {
        let s = shape(ShapeData::Rectangle {
            half_extents: Vec2::new(1.0, 1.0),
        });
        let xf = Affine2::from_angle_translation(core::f32::consts::FRAC_PI_4, Vec2::new(3.0, 0.0));
        let (lo, hi) = s.project_range(Vec2::X, &xf);
        let d = 2.0_f32.sqrt();
        assert!((lo - (3.0 - d)).abs() < 1e-5);
        assert!((hi - (3.0 + d)).abs() < 1e-5);
    }

    #[test]
    fn test_capsule_supports_side_and_cap() {
        let s = shape(ShapeData::Capsule {
            radius: 0.5,
            height: 2.0,
        });
        let side = s.supports(Vec2::X);
        assert_eq!(side.len(), 2);
        assert_eq!(side.as_slice()[0], Vec2::new(0.5, 1.0));
        let cap = s.supports(Vec2::Y);
        assert_eq!(cap.as_slice(), &[Vec2::new(0.0, 1.5)]);
        let (lo, hi) = s.project_range(Vec2::Y, &Affine2::IDENTITY);
        assert!((lo + 1.5).abs() < 1e-6 && (hi - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_cast_support_extends_along_motion() {
        let s = shape(ShapeData::Circle { radius: 1.0 });
        let sup = s.supports_transformed_cast(Vec2::new(3.0, 0.0), Vec2::X, &Affine2::IDENTITY);
        assert_eq!(sup.as_slice(), &[Vec2::new(4.0, 0.0)]);
        let (lo, hi) = s.project_range_cast(Vec2::new(3.0, 0.0), Vec2::X, &Affine2::IDENTITY);
        assert_eq!((lo, hi), (-1.0, 4.0));
    }

    #[test]
    fn test_intersect_segment_polygon_and_capsule() {
        let poly = shape(ShapeData::default_for(ShapeType::ConvexPolygon));
        let (p, n) = poly
            .intersect_segment(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0))
            .unwrap();
        assert!((p.x + 0.5).abs() < 1e-5);
        assert!((n.x + 1.0).abs() < 1e-5);

        let cap = shape(ShapeData::Capsule {
            radius: 0.5,
            height: 2.0,
        });
        let (p, n) = cap
            .intersect_segment(Vec2::new(0.0, 5.0), Vec2::new(0.0, -5.0))
            .unwrap();
        assert!((p.y - 1.5).abs() < 1e-5);
        assert!((n.y - 1.0).abs() < 1e-5);
        assert!(cap
            .intersect_segment(Vec2::new(2.0, 5.0), Vec2::new(2.0, -5.0))
            .is_none());
    }

    #[test]
    fn test_moments_positive_for_solids() {
        for ty in [
            ShapeType::Circle,
            ShapeType::Rectangle,
            ShapeType::Capsule,
            ShapeType::ConvexPolygon,
        ] {
            let s = shape(ShapeData::default_for(ty));
            assert!(s.moment_of_inertia(2.0) > 0.0, "{ty:?}");
        }
        assert_eq!(shape(ShapeData::default_for(ShapeType::Ray)).moment_of_inertia(1.0), 0.0);
    }
}
