//! Narrow phase between two transformed shapes.
//!
//! Contacts are reported as `(point_on_a, point_on_b)` where the point on A
//! is A's deepest point inside B and the point on B lies on B's surface, so
//! `point_on_a - point_on_b` points from A towards B.

use glam::{Affine2, Vec2};

use crate::api::NarrowphaseApi;
use crate::narrowphase::Narrowphase;
use crate::shape::{Geometry, Shape, ShapeType, xform_normal};

const CMP_EPSILON: f32 = 0.00001;

struct Collector<'c, 'f> {
    cb: Option<&'c mut (dyn FnMut(Vec2, Vec2) + 'f)>,
    swap: bool,
}

impl Collector<'_, '_> {
    fn wants_contacts(&self) -> bool {
        self.cb.is_some()
    }

    fn call(&mut self, swap: bool, a: Vec2, b: Vec2) {
        if let Some(cb) = self.cb.as_mut() {
            if swap {
                cb(b, a);
            } else {
                cb(a, b);
            }
        }
    }
}

/// Do the two shapes (optionally swept by their motions) touch?
/// Every contact pair found is passed to `callback` before returning.
pub fn solve(
    shape_a: &Shape,
    xform_a: &Affine2,
    motion_a: Vec2,
    shape_b: &Shape,
    xform_b: &Affine2,
    motion_b: Vec2,
    callback: Option<&mut dyn FnMut(Vec2, Vec2)>,
) -> bool {
    solve_with_margin(
        shape_a, xform_a, motion_a, shape_b, xform_b, motion_b, callback, None, 0.0, 0.0,
    )
}

/// [`solve`] with inflated shapes and a cached separating axis.
///
/// A non-zero `sep_axis` is tried first; whenever the shapes are found to be
/// apart along some axis, that axis is written back.
#[allow(clippy::too_many_arguments)]
pub fn solve_with_margin(
    shape_a: &Shape,
    xform_a: &Affine2,
    motion_a: Vec2,
    shape_b: &Shape,
    xform_b: &Affine2,
    motion_b: Vec2,
    callback: Option<&mut dyn FnMut(Vec2, Vec2)>,
    sep_axis: Option<&mut Vec2>,
    margin_a: f32,
    margin_b: f32,
) -> bool {
    let mut collector = Collector {
        cb: callback,
        swap: false,
    };
    let (mut a, mut xa, mut ma, mut mga) = (shape_a, xform_a, motion_a, margin_a);
    let (mut b, mut xb, mut mb, mut mgb) = (shape_b, xform_b, motion_b, margin_b);
    if a.shape_type() > b.shape_type() {
        core::mem::swap(&mut a, &mut b);
        core::mem::swap(&mut xa, &mut xb);
        core::mem::swap(&mut ma, &mut mb);
        core::mem::swap(&mut mga, &mut mgb);
        collector.swap = true;
    }

    if a.shape_type() == ShapeType::Ray {
        if b.shape_type() == ShapeType::Ray {
            return false;
        }
        return solve_raycast(a, xa, ma, b, xb, &mut collector, sep_axis);
    }

    let plain = ma == Vec2::ZERO && mb == Vec2::ZERO && mga == 0.0 && mgb == 0.0;
    if plain {
        if let Some(hit) = solve_closest_point(a, xa, b, xb, &mut collector) {
            return hit;
        }
    }

    let mut sep = Separator {
        a,
        xa,
        ma,
        b,
        xb,
        mb,
        margin_a: mga,
        margin_b: mgb,
        best_depth: f32::MAX,
        best_axis: Vec2::ZERO,
        separating: None,
    };
    let hint = sep_axis.as_deref().copied().unwrap_or(Vec2::ZERO);
    let overlap = (hint == Vec2::ZERO || sep.test_hint(hint)) && sep.test_cast() && sep.test_shape_axes();
    if let (Some(out), Some(axis)) = (sep_axis, sep.separating) {
        *out = axis;
    }
    if !overlap {
        return false;
    }
    sep.generate_contacts(&mut collector);
    true
}

/// Segment cast of a ray shape against any non-ray shape.
fn solve_raycast(
    ray: &Shape,
    xa: &Affine2,
    motion: Vec2,
    other: &Shape,
    xb: &Affine2,
    collector: &mut Collector<'_, '_>,
    sep_axis: Option<&mut Vec2>,
) -> bool {
    let Geometry::Ray {
        length,
        slips_on_slope,
    } = *ray.geometry()
    else {
        return false;
    };
    let from = xa.translation;
    let mut to = xa.transform_point2(Vec2::new(0.0, length));
    if motion != Vec2::ZERO {
        let n = (to - from).normalize_or_zero();
        to += n * n.dot(motion).max(0.0);
    }
    let support_a = to;
    let inv = xb.inverse();
    let Some((p, n)) = other.intersect_segment(inv.transform_point2(from), inv.transform_point2(to))
    else {
        if let Some(axis) = sep_axis {
            *axis = xa.matrix2.y_axis.normalize_or_zero();
        }
        return false;
    };
    let mut support_b = xb.transform_point2(p);
    if slips_on_slope {
        let gn = xform_normal(xb, n);
        support_b = support_a + gn * (support_b - support_a).length();
    }
    let swap = collector.swap;
    collector.call(swap, support_a, support_b);
    true
}

/// Exact distance tests for circle vs circle and circle vs polygonal shapes.
/// `None` means the pair is not handled here.
fn solve_closest_point(
    a: &Shape,
    xa: &Affine2,
    b: &Shape,
    xb: &Affine2,
    collector: &mut Collector<'_, '_>,
) -> Option<bool> {
    let Geometry::Circle { radius } = *a.geometry() else {
        return None;
    };
    let ca = xa.translation;
    let ra = radius * xa.matrix2.x_axis.length();
    let swap = collector.swap;
    match b.geometry() {
        Geometry::Circle { radius: rb } => {
            let cb = xb.translation;
            let rb = rb * xb.matrix2.x_axis.length();
            let d = cb - ca;
            let dist2 = d.length_squared();
            let rsum = ra + rb;
            if dist2 > rsum * rsum {
                return Some(false);
            }
            if collector.wants_contacts() {
                let n = if dist2 > 0.0 { d / dist2.sqrt() } else { Vec2::Y };
                collector.call(swap, ca + n * ra, cb - n * rb);
            }
            Some(true)
        }
        Geometry::Rectangle { .. } | Geometry::ConvexPolygon { .. } => {
            let mut verts = b.world_vertices(xb)?;
            let n = verts.len();
            let area: f32 = (0..n).map(|i| verts[i].perp_dot(verts[(i + 1) % n])).sum::<f32>() * 0.5;
            if area.abs() <= CMP_EPSILON {
                // Degenerate polygon, the separating-axis path copes with it.
                return None;
            }
            if area < 0.0 {
                verts.reverse();
            }

            let mut best_sep = f32::NEG_INFINITY;
            let mut best_n = Vec2::Y;
            for i in 0..n {
                let e = verts[(i + 1) % n] - verts[i];
                let nrm = Vec2::new(e.y, -e.x).normalize_or_zero();
                let s = nrm.dot(ca - verts[i]);
                if s > best_sep {
                    best_sep = s;
                    best_n = nrm;
                }
            }
            if best_sep > ra {
                return Some(false);
            }
            if best_sep <= 0.0 {
                collector.call(swap, ca - best_n * ra, ca - best_n * best_sep);
                return Some(true);
            }
            let mut q = verts[0];
            let mut best_d2 = f32::INFINITY;
            for i in 0..n {
                let p = Narrowphase::closest_point_on_segment(ca, verts[i], verts[(i + 1) % n]);
                let d2 = (ca - p).length_squared();
                if d2 < best_d2 {
                    best_d2 = d2;
                    q = p;
                }
            }
            if best_d2 > ra * ra {
                return Some(false);
            }
            let dir = (q - ca).try_normalize().unwrap_or(-best_n);
            collector.call(swap, ca + dir * ra, q);
            Some(true)
        }
        _ => None,
    }
}

struct Separator<'s> {
    a: &'s Shape,
    xa: &'s Affine2,
    ma: Vec2,
    b: &'s Shape,
    xb: &'s Affine2,
    mb: Vec2,
    margin_a: f32,
    margin_b: f32,
    best_depth: f32,
    /// Points from B towards A.
    best_axis: Vec2,
    separating: Option<Vec2>,
}

fn capsule_centers(height: f32, xform: &Affine2) -> [Vec2; 2] {
    [
        xform.transform_point2(Vec2::new(0.0, -height * 0.5)),
        xform.transform_point2(Vec2::new(0.0, height * 0.5)),
    ]
}

/// Axis from `point` to the rectangle corner in its quadrant.
fn rect_corner_axis(half_extents: Vec2, xform: &Affine2, point: Vec2) -> Vec2 {
    let local = xform.inverse().transform_point2(point);
    let he = Vec2::new(
        if local.x < 0.0 { -half_extents.x } else { half_extents.x },
        if local.y < 0.0 { -half_extents.y } else { half_extents.y },
    );
    (xform.transform_point2(he) - point).normalize_or_zero()
}

impl Separator<'_> {
    /// Returns false when `axis` separates the shapes.
    fn test_axis(&mut self, axis: Vec2) -> bool {
        let axis = if axis.x.abs() < CMP_EPSILON && axis.y.abs() < CMP_EPSILON {
            Vec2::Y
        } else {
            axis.normalize()
        };
        let (mut min_a, mut max_a) = self.a.project_range_cast(self.ma, axis, self.xa);
        let (mut min_b, mut max_b) = self.b.project_range_cast(self.mb, axis, self.xb);
        min_a -= self.margin_a;
        max_a += self.margin_a;
        min_b -= self.margin_b;
        max_b += self.margin_b;

        let half_a = (max_a - min_a) * 0.5;
        let center_a = (max_a + min_a) * 0.5;
        let dmin = min_b - half_a - center_a;
        let dmax = max_b + half_a - center_a;
        if dmin > 0.0 || dmax < 0.0 {
            self.separating = Some(axis);
            return false;
        }
        let dmin = -dmin;
        // Strict comparisons keep the first axis on ties.
        if dmax < dmin {
            if dmax < self.best_depth {
                self.best_depth = dmax;
                self.best_axis = axis;
            }
        } else if dmin < self.best_depth {
            self.best_depth = dmin;
            self.best_axis = -axis;
        }
        true
    }

    /// Separation-only check along a cached axis.
    fn test_hint(&mut self, axis: Vec2) -> bool {
        let (best_depth, best_axis) = (self.best_depth, self.best_axis);
        let overlap = self.test_axis(axis);
        self.best_depth = best_depth;
        self.best_axis = best_axis;
        overlap
    }

    fn test_cast(&mut self) -> bool {
        for m in [self.ma, self.mb] {
            if m == Vec2::ZERO {
                continue;
            }
            let n = m.normalize();
            if !self.test_axis(n) || !self.test_axis(n.perp()) {
                return false;
            }
        }
        true
    }

    fn test_all(&mut self, axes: impl IntoIterator<Item = Vec2>) -> bool {
        axes.into_iter().all(|axis| self.test_axis(axis))
    }

    fn test_shape_axes(&mut self) -> bool {
        let (a, xa, b, xb) = (self.a, self.xa, self.b, self.xb);
        let poly_normals = |shape: &Shape, xf: &Affine2| -> Vec<Vec2> {
            match shape.geometry() {
                Geometry::ConvexPolygon { normals, .. } => {
                    normals.iter().map(|n| xform_normal(xf, *n)).collect()
                }
                _ => Vec::new(),
            }
        };
        let rect_axes = |xf: &Affine2| [xf.matrix2.x_axis, xf.matrix2.y_axis];

        match (a.geometry(), b.geometry()) {
            (Geometry::Segment { normal: na, .. }, Geometry::Segment { normal: nb, .. }) => {
                self.test_all([xform_normal(xa, *na), xform_normal(xb, *nb)])
            }
            (Geometry::Segment { a: p0, b: p1, normal }, Geometry::Circle { .. }) => {
                let c = xb.translation;
                self.test_all([
                    xform_normal(xa, *normal),
                    c - xa.transform_point2(*p0),
                    c - xa.transform_point2(*p1),
                ])
            }
            (Geometry::Segment { normal, .. }, Geometry::Rectangle { .. }) => {
                self.test_axis(xform_normal(xa, *normal)) && self.test_all(rect_axes(xb))
            }
            (Geometry::Segment { a: p0, b: p1, normal }, Geometry::Capsule { height, .. }) => {
                let (w0, w1) = (xa.transform_point2(*p0), xa.transform_point2(*p1));
                let [c0, c1] = capsule_centers(*height, xb);
                self.test_all([
                    xform_normal(xa, *normal),
                    xb.matrix2.x_axis,
                    c0 - w0,
                    c0 - w1,
                    c1 - w0,
                    c1 - w1,
                ])
            }
            (Geometry::Segment { normal, .. }, Geometry::ConvexPolygon { .. }) => {
                self.test_axis(xform_normal(xa, *normal)) && self.test_all(poly_normals(b, xb))
            }
            (Geometry::Circle { .. }, Geometry::Circle { .. }) => {
                self.test_axis(xa.translation - xb.translation)
            }
            (Geometry::Circle { .. }, Geometry::Rectangle { half_extents }) => {
                let he = *half_extents;
                let c = xa.translation;
                if !self.test_all(rect_axes(xb)) || !self.test_axis(rect_corner_axis(he, xb, c)) {
                    return false;
                }
                let (ma, mb) = (self.ma, self.mb);
                if ma != Vec2::ZERO && !self.test_axis(rect_corner_axis(he, xb, c + ma)) {
                    return false;
                }
                if mb != Vec2::ZERO && !self.test_axis(rect_corner_axis(he, xb, c - mb)) {
                    return false;
                }
                if ma != Vec2::ZERO
                    && mb != Vec2::ZERO
                    && !self.test_axis(rect_corner_axis(he, xb, c - mb + ma))
                {
                    return false;
                }
                true
            }
            (Geometry::Circle { .. }, Geometry::Capsule { height, .. }) => {
                let c = xa.translation;
                let [c0, c1] = capsule_centers(*height, xb);
                self.test_all([xb.matrix2.x_axis, c - c0, c - c1])
            }
            (Geometry::Circle { .. }, Geometry::ConvexPolygon { points, .. }) => {
                let c = xa.translation;
                self.test_all(poly_normals(b, xb))
                    && self.test_all(points.iter().map(|p| c - xb.transform_point2(*p)))
            }
            (Geometry::Rectangle { .. }, Geometry::Rectangle { .. }) => {
                self.test_all(rect_axes(xa)) && self.test_all(rect_axes(xb))
            }
            (Geometry::Rectangle { half_extents }, Geometry::Capsule { height, .. }) => {
                let he = *half_extents;
                let [c0, c1] = capsule_centers(*height, xb);
                self.test_all(rect_axes(xa))
                    && self.test_all([
                        xb.matrix2.x_axis,
                        rect_corner_axis(he, xa, c0),
                        rect_corner_axis(he, xa, c1),
                    ])
            }
            (Geometry::Rectangle { .. }, Geometry::ConvexPolygon { .. }) => {
                self.test_all(rect_axes(xa)) && self.test_all(poly_normals(b, xb))
            }
            (Geometry::Capsule { height: ha, .. }, Geometry::Capsule { height: hb, .. }) => {
                let ca = capsule_centers(*ha, xa);
                let cb = capsule_centers(*hb, xb);
                self.test_all([xa.matrix2.x_axis, xb.matrix2.x_axis])
                    && self.test_all(
                        ca.iter()
                            .flat_map(|p| cb.iter().map(move |q| *p - *q))
                            .collect::<Vec<_>>(),
                    )
            }
            (Geometry::Capsule { height, .. }, Geometry::ConvexPolygon { points, .. }) => {
                let centers = capsule_centers(*height, xa);
                let verts: Vec<Vec2> = points.iter().map(|p| xb.transform_point2(*p)).collect();
                self.test_axis(xa.matrix2.x_axis)
                    && self.test_all(poly_normals(b, xb))
                    && self.test_all(
                        centers
                            .iter()
                            .flat_map(|c| verts.iter().map(move |v| *c - *v))
                            .collect::<Vec<_>>(),
                    )
            }
            (Geometry::ConvexPolygon { .. }, Geometry::ConvexPolygon { .. }) => {
                self.test_all(poly_normals(a, xa)) && self.test_all(poly_normals(b, xb))
            }
            // Canonical ordering rules out the remaining combinations.
            _ => false,
        }
    }

    fn generate_contacts(&self, collector: &mut Collector<'_, '_>) {
        if !collector.wants_contacts() || self.best_axis == Vec2::ZERO {
            return;
        }
        let axis = self.best_axis;
        let mut sa = self.a.supports_transformed_cast(self.ma, -axis, self.xa);
        let mut sb = self.b.supports_transformed_cast(self.mb, axis, self.xb);
        if self.margin_a != 0.0 {
            sa = sa.translated(-axis * self.margin_a);
        }
        if self.margin_b != 0.0 {
            sb = sb.translated(axis * self.margin_b);
        }
        contacts_from_supports(sa.as_slice(), sb.as_slice(), axis, collector);
    }
}

/// Turn the support features of both shapes along `normal` (B towards A)
/// into contact pairs.
fn contacts_from_supports(
    points_a: &[Vec2],
    points_b: &[Vec2],
    normal: Vec2,
    collector: &mut Collector<'_, '_>,
) {
    let mut swap = collector.swap;
    let (mut pa, mut pb, mut n) = (points_a, points_b, normal);
    if pa.len() > pb.len() {
        core::mem::swap(&mut pa, &mut pb);
        swap = !swap;
        n = -n;
    }
    match (pa.len(), pb.len()) {
        (1, 1) => collector.call(swap, pa[0], pb[0]),
        (1, 2) => {
            let q = Narrowphase::closest_point_on_segment(pa[0], pb[0], pb[1]);
            collector.call(swap, pa[0], q);
        }
        (2, 2) => {
            let t = Vec2::new(n.y, -n.x);
            let d_a = n.dot(pa[0]);
            let d_b = n.dot(pb[0]);
            // (tangent coordinate, from A, index)
            let mut dvec = [
                (t.dot(pa[0]), true, 0usize),
                (t.dot(pa[1]), true, 1),
                (t.dot(pb[0]), false, 0),
                (t.dot(pb[1]), false, 1),
            ];
            dvec.sort_by(|x, y| x.0.total_cmp(&y.0));
            let plane_project = |d: f32, v: Vec2| v - n * (n.dot(v) - d);
            for &(_, from_a, idx) in &dvec[1..=2] {
                let (a, b) = if from_a {
                    let a = pa[idx];
                    (a, plane_project(d_b, a))
                } else {
                    let b = pb[idx];
                    (plane_project(d_a, b), b)
                };
                if n.dot(a) > n.dot(b) - CMP_EPSILON {
                    continue;
                }
                collector.call(swap, a, b);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeData;

    fn circle(r: f32) -> Shape {
        Shape::new(ShapeData::Circle { radius: r }).unwrap()
    }

    fn rect(hx: f32, hy: f32) -> Shape {
        Shape::new(ShapeData::Rectangle {
            half_extents: Vec2::new(hx, hy),
        })
        .unwrap()
    }

    fn at(x: f32, y: f32) -> Affine2 {
        Affine2::from_translation(Vec2::new(x, y))
    }

    fn collect(a: &Shape, xa: &Affine2, ma: Vec2, b: &Shape, xb: &Affine2, mb: Vec2) -> Option<Vec<(Vec2, Vec2)>> {
        let mut out = Vec::new();
        let hit = solve(a, xa, ma, b, xb, mb, Some(&mut |p: Vec2, q: Vec2| out.push((p, q))));
        hit.then_some(out)
    }

    #[test]
    fn test_circle_circle_contact_points() {
        let c = circle(1.0);
        let contacts = collect(&c, &at(0.0, 0.0), Vec2::ZERO, &c, &at(1.5, 0.0), Vec2::ZERO).unwrap();
        assert_eq!(contacts.len(), 1);
        let (pa, pb) = contacts[0];
        assert!((pa - Vec2::new(1.0, 0.0)).length() < 1e-5);
        assert!((pb - Vec2::new(0.5, 0.0)).length() < 1e-5);
        assert!(collect(&c, &at(0.0, 0.0), Vec2::ZERO, &c, &at(2.5, 0.0), Vec2::ZERO).is_none());
    }

    #[test]
    fn test_box_resting_on_box_gives_two_contacts() {
        let top = rect(1.0, 1.0);
        let floor = rect(5.0, 1.0);
        let contacts =
            collect(&top, &at(0.0, 1.9), Vec2::ZERO, &floor, &at(0.0, 0.0), Vec2::ZERO).unwrap();
        assert_eq!(contacts.len(), 2);
        for (pa, pb) in &contacts {
            assert!((pa.y - 0.9).abs() < 1e-5);
            assert!((pb.y - 1.0).abs() < 1e-5);
            // A's point minus B's point points from A towards B (down).
            assert!((*pa - *pb).y < 0.0);
        }
    }

    #[test]
    fn test_swapped_order_swaps_points() {
        let c = circle(0.5);
        let r = rect(1.0, 1.0);
        let ab = collect(&c, &at(0.0, 1.4), Vec2::ZERO, &r, &at(0.0, 0.0), Vec2::ZERO).unwrap();
        let ba = collect(&r, &at(0.0, 0.0), Vec2::ZERO, &c, &at(0.0, 1.4), Vec2::ZERO).unwrap();
        assert_eq!(ab.len(), 1);
        assert_eq!(ba.len(), 1);
        assert!((ab[0].0 - ba[0].1).length() < 1e-5);
        assert!((ab[0].1 - ba[0].0).length() < 1e-5);
        assert!((ab[0].0.y - 0.9).abs() < 1e-5);
        assert!((ab[0].1.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_circle_center_inside_polygon() {
        let c = circle(0.5);
        let r = rect(2.0, 1.0);
        let contacts = collect(&c, &at(0.0, 0.8), Vec2::ZERO, &r, &at(0.0, 0.0), Vec2::ZERO).unwrap();
        let (pa, pb) = contacts[0];
        assert!((pa.y - 0.3).abs() < 1e-5);
        assert!((pb.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_motion_detects_tunnelling() {
        let c = circle(0.25);
        let wall = rect(0.1, 2.0);
        assert!(!solve(&c, &at(-2.0, 0.0), Vec2::ZERO, &wall, &at(0.0, 0.0), Vec2::ZERO, None));
        assert!(solve(&c, &at(-2.0, 0.0), Vec2::new(4.0, 0.0), &wall, &at(0.0, 0.0), Vec2::ZERO, None));
        // Moving away never hits.
        assert!(!solve(&c, &at(-2.0, 0.0), Vec2::new(-4.0, 0.0), &wall, &at(0.0, 0.0), Vec2::ZERO, None));
    }

    #[test]
    fn test_capsule_against_circles_at_caps_and_side() {
        let cap = Shape::new(ShapeData::Capsule {
            radius: 0.5,
            height: 2.0,
        })
        .unwrap();
        let c = circle(0.5);
        // Above the top cap.
        assert!(solve(&c, &at(0.0, 1.9), Vec2::ZERO, &cap, &at(0.0, 0.0), Vec2::ZERO, None));
        assert!(!solve(&c, &at(0.0, 2.1), Vec2::ZERO, &cap, &at(0.0, 0.0), Vec2::ZERO, None));
        // Beside the straight part.
        assert!(solve(&c, &at(0.9, 0.0), Vec2::ZERO, &cap, &at(0.0, 0.0), Vec2::ZERO, None));
        // Diagonal from the cap: outside the rounded corner.
        assert!(!solve(&c, &at(0.8, 1.8), Vec2::ZERO, &cap, &at(0.0, 0.0), Vec2::ZERO, None));
    }

    #[test]
    fn test_ray_reports_end_and_surface() {
        let ray = Shape::new(ShapeData::Ray {
            length: 2.0,
            slips_on_slope: false,
        })
        .unwrap();
        let floor = rect(5.0, 0.5);
        // Ray pointing down (local +Y flipped by a half turn).
        let xf = Affine2::from_angle_translation(core::f32::consts::PI, Vec2::new(0.0, 2.0));
        let contacts = collect(&ray, &xf, Vec2::ZERO, &floor, &at(0.0, 0.0), Vec2::ZERO).unwrap();
        let (pa, pb) = contacts[0];
        assert!(pa.y.abs() < 1e-5);
        assert!((pb.y - 0.5).abs() < 1e-5);
        // Ray vs ray never collides.
        assert!(!solve(&ray, &xf, Vec2::ZERO, &ray, &xf, Vec2::ZERO, None));
    }

    #[test]
    fn test_equal_overlap_prefers_first_axis() {
        // Square exactly on the diagonal: x and y overlaps are equal.
        let r = rect(1.0, 1.0);
        let mut axis_hits = Vec::new();
        let hit = solve(
            &r,
            &at(0.0, 0.0),
            Vec2::ZERO,
            &r,
            &at(1.5, 1.5),
            Vec2::ZERO,
            Some(&mut |p: Vec2, q: Vec2| axis_hits.push(p - q)),
        );
        assert!(hit);
        assert!(!axis_hits.is_empty());
        // A's own x axis is tested first, so the contact normal is along x.
        for d in axis_hits {
            assert!(d.y.abs() < 1e-5 && d.x > 0.0);
        }
    }

    #[test]
    fn test_separating_axis_written_back() {
        let r = rect(1.0, 1.0);
        let mut axis = Vec2::ZERO;
        let hit = solve_with_margin(
            &r,
            &at(0.0, 0.0),
            Vec2::ZERO,
            &r,
            &at(3.0, 0.0),
            Vec2::ZERO,
            None,
            Some(&mut axis),
            0.0,
            0.0,
        );
        assert!(!hit);
        assert!(axis.x.abs() > 0.99);
        // Margins make the gap of 1.0 disappear.
        assert!(solve_with_margin(
            &r,
            &at(0.0, 0.0),
            Vec2::ZERO,
            &r,
            &at(3.0, 0.0),
            Vec2::ZERO,
            None,
            None,
            0.6,
            0.6,
        ));
    }

    #[test]
    fn test_polygon_polygon_rotated() {
        let tri = Shape::new(ShapeData::ConvexPolygon {
            points: vec![Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
        })
        .unwrap();
        let xa = at(0.0, 0.0);
        let xb = Affine2::from_angle_translation(core::f32::consts::PI, Vec2::new(0.0, 1.8));
        // Two apexes pointing at each other, overlapping by 0.2.
        assert!(solve(&tri, &xa, Vec2::ZERO, &tri, &xb, Vec2::ZERO, None));
        let xb_far = Affine2::from_angle_translation(core::f32::consts::PI, Vec2::new(0.0, 2.2));
        assert!(!solve(&tri, &xa, Vec2::ZERO, &tri, &xb_far, Vec2::ZERO, None));
    }
}
