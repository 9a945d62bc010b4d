use bonk2d::collision_solver;
use bonk2d::*;
use glam::{Affine2, Vec2};
use proptest::prelude::*;

const DT: f32 = 1.0 / 60.0;

fn weightless() -> (PhysicsServer, SpaceId) {
    let mut cfg = ServerConfig::default();
    cfg.space.default_area.gravity = 0.0;
    let mut server = PhysicsServer::new(cfg);
    let space = server.space_create();
    server.space_set_active(space, true).unwrap();
    (server, space)
}

fn unit_circle(server: &mut PhysicsServer, space: SpaceId, at: Vec2, layer: LayerMask) -> BodyId {
    let shape = server.shape_create(ShapeData::Circle { radius: 1.0 }).unwrap();
    let body = server.body_create();
    server.body_add_shape(body, shape, Affine2::IDENTITY).unwrap();
    server.body_set_collision_layer(body, layer.layer).unwrap();
    server.body_set_collision_mask(body, layer.mask).unwrap();
    server
        .body_set_state(body, BodyState::Transform(Affine2::from_translation(at)))
        .unwrap();
    server.body_set_space(body, Some(space)).unwrap();
    body
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn overlapping_circles_always_separate(dist in 0.3f32..1.9, angle in 0.0f32..std::f32::consts::TAU) {
        let (mut server, space) = weightless();
        let offset = Vec2::from_angle(angle) * dist;
        prop_assume!(offset.length() > 0.25);
        let a = unit_circle(&mut server, space, Vec2::ZERO, LayerMask::default());
        let b = unit_circle(&mut server, space, offset, LayerMask::default());
        for _ in 0..90 {
            server.step(DT);
            server.flush_queries();
        }
        let pa = server.body_get_transform(a).unwrap().translation;
        let pb = server.body_get_transform(b).unwrap().translation;
        let allowed = SpaceConfig::default().contact_max_allowed_penetration;
        prop_assert!(pa.distance(pb) >= 2.0 - allowed - 1e-3, "distance {}", pa.distance(pb));
        // Equal masses share the correction.
        prop_assert!((pa + pb - offset).length() < 1e-2);
    }

    #[test]
    fn circles_collide_iff_within_reach(
        ax in -20.0f32..20.0,
        ay in -20.0f32..20.0,
        bx in -20.0f32..20.0,
        by in -20.0f32..20.0,
        ra in 0.05f32..8.0,
        rb in 0.05f32..8.0,
    ) {
        let (ca, cb) = (Vec2::new(ax, ay), Vec2::new(bx, by));
        let reach = ra + rb;
        let expected = ca.distance_squared(cb) <= reach * reach;
        let hit = collision_solver::solve(
            &Shape::new(ShapeData::Circle { radius: ra }).unwrap(),
            &Affine2::from_translation(ca),
            Vec2::ZERO,
            &Shape::new(ShapeData::Circle { radius: rb }).unwrap(),
            &Affine2::from_translation(cb),
            Vec2::ZERO,
            None,
        );
        prop_assert_eq!(hit, expected);
    }

    #[test]
    fn touching_circles_collide(
        x in -64i32..64,
        y in -64i32..64,
        ra in 1i32..32,
        rb in 1i32..32,
        vertical in any::<bool>(),
    ) {
        // Eighths keep every coordinate exact, so the centres sit exactly
        // one sum of radii apart.
        let (ra, rb) = (ra as f32 / 8.0, rb as f32 / 8.0);
        let ca = Vec2::new(x as f32 / 8.0, y as f32 / 8.0);
        let axis = if vertical { Vec2::Y } else { Vec2::X };
        let cb = ca + axis * (ra + rb);
        let a = Shape::new(ShapeData::Circle { radius: ra }).unwrap();
        let b = Shape::new(ShapeData::Circle { radius: rb }).unwrap();
        prop_assert!(collision_solver::solve(
            &a,
            &Affine2::from_translation(ca),
            Vec2::ZERO,
            &b,
            &Affine2::from_translation(cb),
            Vec2::ZERO,
            None,
        ));
        // Any gap at all separates them.
        prop_assert!(!collision_solver::solve(
            &a,
            &Affine2::from_translation(ca),
            Vec2::ZERO,
            &b,
            &Affine2::from_translation(cb + axis * 0.125),
            Vec2::ZERO,
            None,
        ));
    }

    #[test]
    fn pairs_follow_layer_masks(la in 0u32..4, ma in 0u32..4, lb in 0u32..4, mb in 0u32..4) {
        let (mut server, space) = weightless();
        let first = LayerMask::simple(la, ma);
        let second = LayerMask::simple(lb, mb);
        unit_circle(&mut server, space, Vec2::ZERO, first);
        unit_circle(&mut server, space, Vec2::new(1.0, 0.0), second);
        server.step(DT);
        let expected = usize::from(first.interacts(second));
        prop_assert_eq!(server.get_process_info().collision_pairs, expected);
    }
}

#[test]
fn test_server_config_from_json_keeps_defaults() {
    let cfg: ServerConfig = serde_json::from_str(
        r#"{
            "iterations": 4,
            "space": {
                "body_time_to_sleep": 1.5,
                "default_area": { "gravity": 20.0 }
            }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.iterations, 4);
    assert_eq!(cfg.space.body_time_to_sleep, 1.5);
    assert_eq!(cfg.space.default_area.gravity, 20.0);
    assert_eq!(cfg.space.default_area.gravity_vector, Vec2::new(0.0, -1.0));
    assert_eq!(cfg.space.cell_size, SpaceConfig::default().cell_size);
}

#[test]
fn test_space_config_round_trips_through_json() {
    let mut cfg = SpaceConfig::default();
    cfg.apply(SpaceParam::ContactRecycleRadius(0.25));
    let text = serde_json::to_string(&cfg).unwrap();
    let back: SpaceConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn test_new_spaces_copy_server_config() {
    let mut cfg = ServerConfig::default();
    cfg.space.body_time_to_sleep = 3.0;
    let mut server = PhysicsServer::new(cfg);
    let space = server.space_create();
    assert_eq!(
        server.space_get_param(space, SpaceParam::BodyTimeToSleep(0.0)).unwrap(),
        3.0
    );
    server
        .space_set_param(space, SpaceParam::BodyTimeToSleep(0.25))
        .unwrap();
    let other = server.space_create();
    assert_eq!(
        server.space_get_param(other, SpaceParam::BodyTimeToSleep(0.0)).unwrap(),
        3.0
    );
}
