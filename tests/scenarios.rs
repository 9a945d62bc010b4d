use std::cell::RefCell;
use std::rc::Rc;

use bonk2d::*;
use glam::{Affine2, Vec2};

const DT: f32 = 1.0 / 60.0;

fn server(gravity: f32) -> (PhysicsServer, SpaceId) {
    let mut cfg = ServerConfig::default();
    cfg.space.default_area.gravity = gravity;
    let mut server = PhysicsServer::new(cfg);
    let space = server.space_create();
    server.space_set_active(space, true).unwrap();
    (server, space)
}

fn tick(server: &mut PhysicsServer) {
    server.step(DT);
    server.flush_queries();
}

fn circle_body(server: &mut PhysicsServer, space: SpaceId, radius: f32, at: Vec2, mode: BodyMode) -> BodyId {
    let shape = server.shape_create(ShapeData::Circle { radius }).unwrap();
    let body = server.body_create();
    server.body_set_mode(body, mode).unwrap();
    server.body_add_shape(body, shape, Affine2::IDENTITY).unwrap();
    server
        .body_set_state(body, BodyState::Transform(Affine2::from_translation(at)))
        .unwrap();
    server.body_set_space(body, Some(space)).unwrap();
    body
}

fn floor(server: &mut PhysicsServer, space: SpaceId) -> BodyId {
    let shape = server
        .shape_create(ShapeData::Rectangle {
            half_extents: Vec2::new(20.0, 0.5),
        })
        .unwrap();
    let body = server.body_create();
    server.body_set_mode(body, BodyMode::Static).unwrap();
    server.body_add_shape(body, shape, Affine2::IDENTITY).unwrap();
    server
        .body_set_state(body, BodyState::Transform(Affine2::from_translation(Vec2::new(0.0, -0.5))))
        .unwrap();
    server.body_set_space(body, Some(space)).unwrap();
    body
}

fn box_body(server: &mut PhysicsServer, space: SpaceId, half: f32, at: Vec2) -> BodyId {
    let shape = server
        .shape_create(ShapeData::Rectangle {
            half_extents: Vec2::splat(half),
        })
        .unwrap();
    let body = server.body_create();
    server.body_add_shape(body, shape, Affine2::IDENTITY).unwrap();
    server
        .body_set_state(body, BodyState::Transform(Affine2::from_translation(at)))
        .unwrap();
    server.body_set_space(body, Some(space)).unwrap();
    body
}

fn allowed_penetration(server: &PhysicsServer, space: SpaceId) -> f32 {
    server
        .space_get_param(space, SpaceParam::ContactMaxAllowedPenetration(0.0))
        .unwrap()
}

fn position(server: &PhysicsServer, body: BodyId) -> Vec2 {
    server.body_get_transform(body).unwrap().translation
}

type Events = Rc<RefCell<Vec<MonitorEvent>>>;

/// Area covering [0,10]x[0,10] recording every monitor event.
fn monitored_area(server: &mut PhysicsServer, space: SpaceId) -> (AreaId, Events) {
    let shape = server
        .shape_create(ShapeData::Rectangle {
            half_extents: Vec2::splat(5.0),
        })
        .unwrap();
    let area = server.area_create();
    server.area_add_shape(area, shape, Affine2::IDENTITY).unwrap();
    server
        .area_set_transform(area, Affine2::from_translation(Vec2::splat(5.0)))
        .unwrap();
    server.area_set_monitorable(area, true).unwrap();
    server.area_attach_object_instance_id(area, 1).unwrap();
    let events: Events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    server
        .area_set_monitor_callback(
            area,
            Some(MonitorCallback::new(1, move |e| sink.borrow_mut().push(e))),
        )
        .unwrap();
    server.area_set_space(area, Some(space)).unwrap();
    (area, events)
}

fn teleport(server: &mut PhysicsServer, body: BodyId, to: Vec2) {
    server
        .body_set_state(body, BodyState::Transform(Affine2::from_translation(to)))
        .unwrap();
}

#[test]
fn test_overlapping_circles_are_pushed_apart() {
    let (mut server, space) = server(0.0);
    let allowed = allowed_penetration(&server, space);
    let a = circle_body(&mut server, space, 1.0, Vec2::ZERO, BodyMode::Rigid);
    let b = circle_body(&mut server, space, 1.0, Vec2::new(1.5, 0.0), BodyMode::Rigid);
    for _ in 0..120 {
        tick(&mut server);
    }
    let d = position(&server, a).distance(position(&server, b));
    assert!(d >= 2.0 - allowed - 1e-3, "still overlapping, distance {d}");
    // Pushed along the line between centers only.
    assert!(position(&server, a).y.abs() < 1e-3);
    assert!(position(&server, a).x < 0.0);
    assert!(position(&server, b).x > 1.5);
}

#[test]
fn test_dropped_circle_never_sinks_into_floor() {
    let (mut server, space) = server(10.0);
    floor(&mut server, space);
    let ball = circle_body(&mut server, space, 0.5, Vec2::new(0.0, 10.0), BodyMode::Rigid);
    let allowed = allowed_penetration(&server, space);
    // Without CCD the impact step may overshoot by one step of travel.
    let impact_speed = (2.0f32 * 10.0 * 9.5).sqrt();
    let mut lowest = f32::MAX;
    for _ in 0..120 {
        tick(&mut server);
        lowest = lowest.min(position(&server, ball).y);
    }
    assert!(lowest >= 0.5 - impact_speed * DT - allowed, "sank to {lowest}");

    let mut resting = f32::MAX;
    for _ in 0..180 {
        tick(&mut server);
        resting = resting.min(position(&server, ball).y);
    }
    assert!(resting >= 0.5 - allowed - 2e-3, "sank to {resting} at rest");
    let y = position(&server, ball).y;
    assert!(y < 0.5 + 1e-2, "never landed, y={y}");
    assert!(server.body_get_linear_velocity(ball).unwrap().length() < 0.1);
    assert!(server.body_is_sleeping(ball).unwrap());
}

#[test]
fn test_kinematic_body_crossing_area_reports_once_each_way() {
    let (mut server, space) = server(0.0);
    let (_area, events) = monitored_area(&mut server, space);
    let body = circle_body(&mut server, space, 0.5, Vec2::new(-1.0, 5.0), BodyMode::Kinematic);
    server.body_attach_object_instance_id(body, 77).unwrap();

    tick(&mut server);
    assert!(events.borrow().is_empty());

    teleport(&mut server, body, Vec2::new(5.0, 5.0));
    tick(&mut server);
    {
        let ev = events.borrow();
        assert_eq!(ev.len(), 1);
        assert_eq!(ev[0].status, MonitorStatus::Added);
        assert_eq!(ev[0].other, ObjectId::Body(body));
        assert_eq!(ev[0].other_instance, 77);
    }

    // Staying inside reports nothing new.
    tick(&mut server);
    assert_eq!(events.borrow().len(), 1);

    teleport(&mut server, body, Vec2::new(15.0, 5.0));
    tick(&mut server);
    let ev = events.borrow();
    assert_eq!(ev.len(), 2);
    assert_eq!(ev[1].status, MonitorStatus::Removed);
    assert_eq!(ev[1].other, ObjectId::Body(body));
}

#[test]
fn test_listening_area_reports_static_bodies() {
    let (mut server, space) = server(0.0);
    let (area, events) = monitored_area(&mut server, space);
    server.area_set_monitorable(area, false).unwrap();
    let post = circle_body(&mut server, space, 0.5, Vec2::new(5.0, 5.0), BodyMode::Static);
    for _ in 0..3 {
        tick(&mut server);
    }
    let ev = events.borrow();
    assert_eq!(ev.len(), 1);
    assert_eq!(ev[0].status, MonitorStatus::Added);
    assert_eq!(ev[0].other, ObjectId::Body(post));
}

#[test]
fn test_enter_and_exit_between_flushes_is_silent() {
    let (mut server, space) = server(0.0);
    let (_area, events) = monitored_area(&mut server, space);
    let body = circle_body(&mut server, space, 0.5, Vec2::new(-1.0, 5.0), BodyMode::Kinematic);
    tick(&mut server);

    teleport(&mut server, body, Vec2::new(5.0, 5.0));
    server.step(DT);
    teleport(&mut server, body, Vec2::new(15.0, 5.0));
    server.step(DT);
    server.flush_queries();
    assert!(events.borrow().is_empty());
}

#[test]
fn test_freeing_body_inside_area_reports_removal() {
    let (mut server, space) = server(0.0);
    let (_area, events) = monitored_area(&mut server, space);
    let body = circle_body(&mut server, space, 0.5, Vec2::new(5.0, 5.0), BodyMode::Kinematic);
    tick(&mut server);
    assert_eq!(events.borrow().len(), 1);
    server.body_free(body).unwrap();
    tick(&mut server);
    let ev = events.borrow();
    assert_eq!(ev.len(), 2);
    assert_eq!(ev[1].status, MonitorStatus::Removed);
}

#[test]
fn test_area_gravity_replaces_space_gravity() {
    let (mut server, space) = server(10.0);
    let (area, _events) = monitored_area(&mut server, space);
    server.area_set_param(area, AreaParam::Gravity(0.0)).unwrap();
    server
        .area_set_space_override_mode(area, SpaceOverrideMode::Replace)
        .unwrap();
    let inside = circle_body(&mut server, space, 0.5, Vec2::new(5.0, 5.0), BodyMode::Rigid);
    let outside = circle_body(&mut server, space, 0.5, Vec2::new(-5.0, 5.0), BodyMode::Rigid);
    for _ in 0..30 {
        tick(&mut server);
    }
    assert!((position(&server, inside).y - 5.0).abs() < 1e-4);
    assert!(position(&server, outside).y < 4.5);
}

#[test]
fn test_box_stack_settles_sleeps_and_wakes_together() {
    let (mut server, space) = server(10.0);
    floor(&mut server, space);
    let allowed = allowed_penetration(&server, space);
    let stack: Vec<BodyId> = (0..3)
        .map(|i| {
            let y = 0.5 + i as f32 - 0.005 * (i + 1) as f32;
            box_body(&mut server, space, 0.5, Vec2::new(0.0, y))
        })
        .collect();
    for _ in 0..180 {
        tick(&mut server);
    }
    for (i, &b) in stack.iter().enumerate() {
        let p = position(&server, b);
        let expected = 0.5 + i as f32;
        let slack = allowed * (i + 1) as f32 + 5e-3;
        assert!((p.y - expected).abs() <= slack, "box {i} at {p}");
        assert!(p.x.abs() < 1e-2, "box {i} drifted to {p}");
        assert!(server.body_is_sleeping(b).unwrap(), "box {i} still awake");
    }

    server
        .body_apply_central_impulse(stack[0], Vec2::new(3.0, 0.0))
        .unwrap();
    tick(&mut server);
    tick(&mut server);
    for (i, &b) in stack.iter().enumerate() {
        assert!(!server.body_is_sleeping(b).unwrap(), "box {i} slept through the kick");
    }
}

#[test]
fn test_sleeping_is_idempotent() {
    let (mut server, space) = server(10.0);
    let body = circle_body(&mut server, space, 0.5, Vec2::new(0.0, 3.0), BodyMode::Rigid);
    server.body_set_state(body, BodyState::Sleeping(true)).unwrap();
    server.body_set_state(body, BodyState::Sleeping(true)).unwrap();
    assert_eq!(
        server.body_get_state(body, BodyState::Sleeping(false)).unwrap(),
        BodyState::Sleeping(true)
    );
    for _ in 0..10 {
        tick(&mut server);
    }
    assert!(server.body_is_sleeping(body).unwrap());
    assert_eq!(position(&server, body), Vec2::new(0.0, 3.0));
}

#[test]
fn test_impulse_wakes_sleeping_body() {
    let (mut server, space) = server(0.0);
    let body = circle_body(&mut server, space, 0.5, Vec2::ZERO, BodyMode::Rigid);
    server.body_set_state(body, BodyState::Sleeping(true)).unwrap();
    server
        .body_apply_central_impulse(body, Vec2::new(2.0, 0.0))
        .unwrap();
    assert!(!server.body_is_sleeping(body).unwrap());
    tick(&mut server);
    assert!(position(&server, body).x > 0.0);
}

#[test]
fn test_moving_static_floor_wakes_resting_body() {
    let (mut server, space) = server(10.0);
    let ground = floor(&mut server, space);
    let ball = circle_body(&mut server, space, 0.5, Vec2::new(0.0, 0.6), BodyMode::Rigid);
    for _ in 0..240 {
        tick(&mut server);
    }
    assert!(server.body_is_sleeping(ball).unwrap());
    server
        .body_set_state(ground, BodyState::Transform(Affine2::from_translation(Vec2::new(0.0, -0.6))))
        .unwrap();
    assert!(!server.body_is_sleeping(ball).unwrap());
}

#[test]
fn test_anchors_are_not_moved_by_the_stepper() {
    let (mut server, space) = server(10.0);
    let wall = circle_body(&mut server, space, 1.0, Vec2::new(3.0, 0.0), BodyMode::Static);
    let mover = circle_body(&mut server, space, 1.0, Vec2::new(-3.0, 0.0), BodyMode::Kinematic);
    server
        .body_set_state(mover, BodyState::LinearVelocity(Vec2::new(4.0, 0.0)))
        .unwrap();
    for _ in 0..60 {
        tick(&mut server);
    }
    assert_eq!(position(&server, wall), Vec2::new(3.0, 0.0));
    assert_eq!(position(&server, mover), Vec2::new(-3.0, 0.0));
}

#[test]
fn test_shape_transform_round_trips_exactly() {
    let (mut server, space) = server(10.0);
    let body = circle_body(&mut server, space, 0.5, Vec2::ZERO, BodyMode::Rigid);
    let xform = Affine2::from_angle_translation(0.7, Vec2::new(1.25, -2.5));
    server.body_set_shape_transform(body, 0, xform).unwrap();
    for _ in 0..5 {
        tick(&mut server);
    }
    assert_eq!(server.body_get_shape_transform(body, 0).unwrap(), xform);
    assert!(matches!(
        server.body_get_shape_transform(body, 1),
        Err(PhysicsError::ShapeIndexOutOfRange { index: 1, count: 1 })
    ));
}

#[test]
fn test_landing_reports_floor_contact() {
    let (mut server, space) = server(10.0);
    let ground = floor(&mut server, space);
    server.body_attach_object_instance_id(ground, 9).unwrap();
    let ball = circle_body(&mut server, space, 0.5, Vec2::new(0.0, 1.0), BodyMode::Rigid);
    server.body_set_max_contacts_reported(ball, 4).unwrap();
    for _ in 0..40 {
        tick(&mut server);
    }
    let contacts = server.body_get_contacts(ball).unwrap();
    assert!(!contacts.is_empty());
    assert_eq!(contacts[0].collider, ground);
    assert_eq!(contacts[0].collider_instance, 9);
}

#[test]
fn test_force_integration_callback_runs_on_flush() {
    let (mut server, space) = server(0.0);
    let body = circle_body(&mut server, space, 0.5, Vec2::ZERO, BodyMode::Rigid);
    let calls = Rc::new(RefCell::new(0));
    let seen = calls.clone();
    server
        .body_set_force_integration_callback(
            body,
            Some(Box::new(move |state: &mut BodyDirectState<'_>| {
                *seen.borrow_mut() += 1;
                state.set_linear_velocity(Vec2::new(0.0, 1.0));
            })),
        )
        .unwrap();
    server.step(DT);
    assert_eq!(*calls.borrow(), 0);
    server.flush_queries();
    assert_eq!(*calls.borrow(), 1);
    assert_eq!(server.body_get_linear_velocity(body).unwrap(), Vec2::new(0.0, 1.0));
    tick(&mut server);
    assert_eq!(*calls.borrow(), 2);
    assert!(position(&server, body).y > 0.0);
}

#[test]
fn test_ray_and_motion_queries_find_the_floor() {
    let (mut server, space) = server(10.0);
    let ground = floor(&mut server, space);
    let hit = server
        .space_intersect_ray(space, Vec2::new(1.0, 5.0), Vec2::new(1.0, -5.0), &QueryFilter::default())
        .unwrap()
        .unwrap();
    assert_eq!(hit.collider, ObjectId::Body(ground));
    assert!(hit.position.y.abs() < 1e-4);
    assert!((hit.normal - Vec2::Y).length() < 1e-4);

    let ball = circle_body(&mut server, space, 0.5, Vec2::new(0.0, 5.0), BodyMode::Rigid);
    let query = MotionQuery::new(Affine2::from_translation(Vec2::new(0.0, 5.0)), Vec2::new(0.0, -10.0));
    let result = server.body_test_motion(ball, &query).unwrap().unwrap();
    assert_eq!(result.collider, Some(ground));
    assert!(result.motion.y < -4.0 && result.motion.y > -4.6);
    let free = MotionQuery::new(Affine2::from_translation(Vec2::new(0.0, 5.0)), Vec2::new(3.0, 0.0));
    assert!(server.body_test_motion(ball, &free).unwrap().is_none());
}

#[test]
fn test_inactive_server_does_not_step() {
    let (mut server, space) = server(10.0);
    let ball = circle_body(&mut server, space, 0.5, Vec2::new(0.0, 5.0), BodyMode::Rigid);
    server.set_active(false);
    for _ in 0..10 {
        tick(&mut server);
    }
    assert_eq!(position(&server, ball), Vec2::new(0.0, 5.0));
    server.set_active(true);
    for _ in 0..10 {
        tick(&mut server);
    }
    assert!(position(&server, ball).y < 5.0);
    assert_eq!(server.get_process_info().active_objects, 1);
}
