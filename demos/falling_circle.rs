use bonk2d::*;
use glam::{Affine2, Vec2};

fn main() {
    env_logger::init();

    let mut cfg = ServerConfig::default();
    cfg.space.default_area.gravity = 10.0;
    let mut server = PhysicsServer::new(cfg);
    let space = server.space_create();
    server.space_set_active(space, true).unwrap();

    let ground_shape = server
        .shape_create(ShapeData::Rectangle {
            half_extents: Vec2::new(10.0, 0.5),
        })
        .unwrap();
    let ground = server.body_create();
    server.body_set_mode(ground, BodyMode::Static).unwrap();
    server.body_add_shape(ground, ground_shape, Affine2::IDENTITY).unwrap();
    server
        .body_set_state(ground, BodyState::Transform(Affine2::from_translation(Vec2::new(0.0, -0.5))))
        .unwrap();
    server.body_set_space(ground, Some(space)).unwrap();

    let ball_shape = server.shape_create(ShapeData::Circle { radius: 0.5 }).unwrap();
    let ball = server.body_create();
    server.body_add_shape(ball, ball_shape, Affine2::IDENTITY).unwrap();
    server.body_set_param(ball, BodyParam::Bounce(0.3)).unwrap();
    server
        .body_set_state(ball, BodyState::Transform(Affine2::from_translation(Vec2::new(0.0, 10.0))))
        .unwrap();
    server.body_set_space(ball, Some(space)).unwrap();

    println!("Inserted ground={:?} ball={:?}", ground, ball);

    let dt = 1.0 / 60.0;
    for frame in 0..300 {
        server.step(dt);
        server.flush_queries();
        if frame % 20 == 0 {
            let p = server.body_get_transform(ball).unwrap().translation;
            let v = server.body_get_linear_velocity(ball).unwrap();
            let info = server.get_process_info();
            println!(
                "frame {:3}: y={:6.3} vy={:7.3} sleeping={} islands={} pairs={}",
                frame,
                p.y,
                v.y,
                server.body_is_sleeping(ball).unwrap(),
                info.island_count,
                info.collision_pairs
            );
        }
    }
}
