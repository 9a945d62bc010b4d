use bonk2d::*;
use glam::{Affine2, Vec2};

fn main() {
    env_logger::init();

    let mut server = PhysicsServer::new(ServerConfig::default());
    let space = server.space_create();
    server.space_set_active(space, true).unwrap();

    let zone_shape = server
        .shape_create(ShapeData::Rectangle {
            half_extents: Vec2::splat(5.0),
        })
        .unwrap();
    let zone = server.area_create();
    server.area_add_shape(zone, zone_shape, Affine2::IDENTITY).unwrap();
    server
        .area_set_transform(zone, Affine2::from_translation(Vec2::splat(5.0)))
        .unwrap();
    server.area_set_monitorable(zone, true).unwrap();
    server
        .area_set_monitor_callback(
            zone,
            Some(MonitorCallback::new(1, |ev| {
                println!(
                    "{:?}: {:?} (instance {}) shape {} vs zone shape {}",
                    ev.status, ev.other, ev.other_instance, ev.other_shape, ev.self_shape
                );
            })),
        )
        .unwrap();
    server.area_set_space(zone, Some(space)).unwrap();

    let visitor_shape = server.shape_create(ShapeData::Circle { radius: 0.5 }).unwrap();
    let visitor = server.body_create();
    server.body_set_mode(visitor, BodyMode::Kinematic).unwrap();
    server.body_add_shape(visitor, visitor_shape, Affine2::IDENTITY).unwrap();
    server.body_attach_object_instance_id(visitor, 42).unwrap();
    server.body_set_space(visitor, Some(space)).unwrap();

    let dt = 1.0 / 60.0;
    for x in [-1.0, 5.0, 6.0, 15.0] {
        println!("visitor -> ({x}, 5)");
        server
            .body_set_state(visitor, BodyState::Transform(Affine2::from_translation(Vec2::new(x, 5.0))))
            .unwrap();
        server.step(dt);
        server.flush_queries();
    }
}
