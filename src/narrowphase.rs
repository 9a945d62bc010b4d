use glam::Vec2;

use crate::api::NarrowphaseApi;
use crate::types::*;

/// Primitive segment/point tests shared by shapes and space queries.
pub struct Narrowphase;

/// Clip `[tmin, tmax]` against one slab. Returns false when the slab is missed.
fn clip_slab(
    origin: f32,
    dir: f32,
    lo: f32,
    hi: f32,
    axis_normal: Vec2,
    tmin: &mut f32,
    tmax: &mut f32,
    n_enter: &mut Vec2,
) -> bool {
    if dir.abs() < f32::EPSILON {
        return origin >= lo && origin <= hi;
    }
    let inv = 1.0 / dir;
    let mut t1 = (lo - origin) * inv;
    let mut t2 = (hi - origin) * inv;
    let mut sign = -1.0;
    if t1 > t2 {
        core::mem::swap(&mut t1, &mut t2);
        sign = 1.0;
    }
    if t1 > *tmin {
        *tmin = t1;
        *n_enter = axis_normal * sign;
    }
    if t2 < *tmax {
        *tmax = t2;
    }
    *tmin <= *tmax
}

impl NarrowphaseApi for Narrowphase {
    fn segment_aabb(a: Vec2, b: Vec2, aabb_min: Vec2, aabb_max: Vec2) -> Option<SegmentHit> {
        let d = b - a;
        let mut tmin = f32::NEG_INFINITY;
        let mut tmax = f32::INFINITY;
        let mut n_enter = Vec2::ZERO;
        if !clip_slab(a.x, d.x, aabb_min.x, aabb_max.x, Vec2::X, &mut tmin, &mut tmax, &mut n_enter) {
            return None;
        }
        if !clip_slab(a.y, d.y, aabb_min.y, aabb_max.y, Vec2::Y, &mut tmin, &mut tmax, &mut n_enter) {
            return None;
        }
        if tmax < 0.0 || tmin > 1.0 {
            return None;
        }
        // Starting inside reports an immediate hit without a normal.
        if tmin < 0.0 {
            return Some(SegmentHit {
                toi: 0.0,
                point: a,
                normal: Vec2::ZERO,
            });
        }
        Some(SegmentHit {
            toi: tmin,
            point: a + d * tmin,
            normal: n_enter,
        })
    }

    fn segment_circle(a: Vec2, b: Vec2, center: Vec2, r: f32) -> Option<SegmentHit> {
        // |a + t d - c|^2 = r^2, entering root only
        let d = b - a;
        let m = a - center;
        let acoef = d.length_squared();
        if acoef == 0.0 {
            return None;
        }
        let bcoef = 2.0 * m.dot(d);
        let ccoef = m.length_squared() - r * r;
        let disc = bcoef * bcoef - 4.0 * acoef * ccoef;
        if disc < 0.0 {
            return None;
        }
        let t = (-bcoef - disc.sqrt()) / (2.0 * acoef);
        if !(0.0..=1.0 + f32::EPSILON).contains(&t) {
            return None;
        }
        let point = a + d * t;
        Some(SegmentHit {
            toi: t,
            point,
            normal: (point - center).normalize_or_zero(),
        })
    }

    fn segment_segment(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> Option<(f32, Vec2)> {
        let r = a1 - a0;
        let s = b1 - b0;
        let denom = r.perp_dot(s);
        if denom.abs() < f32::EPSILON {
            return None;
        }
        let qp = b0 - a0;
        let t = qp.perp_dot(s) / denom;
        let u = qp.perp_dot(r) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some((t, a0 + r * t))
        } else {
            None
        }
    }

    fn point_in_aabb(p: Vec2, c: Vec2, h: Vec2) -> bool {
        let min = c - h;
        let max = c + h;
        p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
    }

    fn point_in_circle(p: Vec2, c: Vec2, r: f32) -> bool {
        (p - c).length_squared() <= r * r
    }

    fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
        let ab = b - a;
        let len2 = ab.length_squared();
        if len2 == 0.0 {
            return a;
        }
        let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
        a + ab * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_in_aabb() {
        let c = Vec2::new(0.0, 0.0);
        let h = Vec2::new(1.0, 2.0);
        assert!(Narrowphase::point_in_aabb(Vec2::new(0.0, 0.0), c, h));
        assert!(Narrowphase::point_in_aabb(Vec2::new(1.0, 2.0), c, h));
        assert!(!Narrowphase::point_in_aabb(Vec2::new(1.1, 0.0), c, h));
    }

    #[test]
    fn test_point_in_circle() {
        let c = Vec2::new(1.0, -1.0);
        assert!(Narrowphase::point_in_circle(Vec2::new(3.0, -1.0), c, 2.0));
        assert!(!Narrowphase::point_in_circle(Vec2::new(3.1, -1.0), c, 2.0));
    }

    #[test]
    fn test_segment_aabb_hit_and_miss() {
        let min = Vec2::new(-1.0, -1.0);
        let max = Vec2::new(1.0, 1.0);
        let hit = Narrowphase::segment_aabb(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0), min, max)
            .unwrap();
        assert!((hit.toi - 0.25).abs() < 1e-5);
        assert!((hit.normal.x + 1.0).abs() < 1e-5);
        assert!((hit.point.x + 1.0).abs() < 1e-5);
        assert!(
            Narrowphase::segment_aabb(Vec2::new(-2.0, 2.0), Vec2::new(2.0, 2.0), min, max).is_none()
        );
        // Too short to reach the box
        assert!(
            Narrowphase::segment_aabb(Vec2::new(-3.0, 0.0), Vec2::new(-2.0, 0.0), min, max)
                .is_none()
        );
    }

    #[test]
    fn test_segment_aabb_starting_inside() {
        let hit = Narrowphase::segment_aabb(
            Vec2::ZERO,
            Vec2::new(5.0, 0.0),
            Vec2::splat(-1.0),
            Vec2::splat(1.0),
        )
        .unwrap();
        assert_eq!(hit.toi, 0.0);
        assert_eq!(hit.normal, Vec2::ZERO);
    }

    #[test]
    fn test_segment_circle_entering_root() {
        let hit = Narrowphase::segment_circle(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0), Vec2::ZERO, 1.0)
            .unwrap();
        assert!((hit.point.x + 1.0).abs() < 1e-5);
        assert!((hit.normal.x + 1.0).abs() < 1e-5);
        // From inside there is no entering root
        assert!(Narrowphase::segment_circle(Vec2::ZERO, Vec2::new(2.0, 0.0), Vec2::ZERO, 1.0).is_none());
    }

    #[test]
    fn test_segment_segment_cross() {
        let (t, p) = Narrowphase::segment_segment(
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, -1.0),
            Vec2::new(0.0, 1.0),
        )
        .unwrap();
        assert!((t - 0.5).abs() < 1e-6);
        assert!(p.length() < 1e-6);
        assert!(
            Narrowphase::segment_segment(
                Vec2::new(-1.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(-1.0, 1.0),
                Vec2::new(1.0, 1.0),
            )
            .is_none()
        );
    }

    #[test]
    fn test_closest_point_on_segment_clamps() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(2.0, 0.0);
        assert_eq!(Narrowphase::closest_point_on_segment(Vec2::new(1.0, 3.0), a, b), Vec2::new(1.0, 0.0));
        assert_eq!(Narrowphase::closest_point_on_segment(Vec2::new(-5.0, 1.0), a, b), a);
        assert_eq!(Narrowphase::closest_point_on_segment(Vec2::new(1.0, 1.0), a, a), a);
    }
}
