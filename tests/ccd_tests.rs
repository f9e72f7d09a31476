use rigid2d::{BodyDef, FixtureDef, PhysicsWorld, Shape, SimulationConfig, Vec2};

const DT: f32 = 1.0 / 60.0;

fn make_world(continuous: bool) -> PhysicsWorld {
    let config = SimulationConfig {
        continuous_physics: continuous,
        ..SimulationConfig::default()
    };
    PhysicsWorld::new(Vec2::ZERO, config).expect("default config is valid")
}

/// Thin static wall at the origin and a small ball flying at it at 100 m/s.
fn build_scene(world: &mut PhysicsWorld, bullet: bool) -> rigid2d::BodyId {
    let wall = world.create_body(&BodyDef::fixed());
    world
        .create_fixture(wall, FixtureDef::new(Shape::cuboid(0.05, 2.0)))
        .expect("wall fixture");

    let ball = world.create_body(
        &BodyDef::dynamic()
            .with_position(Vec2::new(-1.0, 0.0))
            .with_linear_velocity(Vec2::new(100.0, 0.0))
            .with_bullet(bullet),
    );
    world
        .create_fixture(ball, FixtureDef::new(Shape::circle(0.1)))
        .expect("ball fixture");
    ball
}

#[test]
fn fast_ball_tunnels_without_continuous_collision() {
    let mut world = make_world(false);
    let ball = build_scene(&mut world, false);

    world.step(DT);

    let x = world.body(ball).expect("ball exists").position().x;
    assert!(x > 0.5, "ball should have jumped past the wall, x = {x}");
}

#[test]
fn fast_ball_stops_at_thin_wall() {
    let mut world = make_world(true);
    let ball = build_scene(&mut world, false);

    world.step(DT);
    assert!(world.profile().toi_events > 0, "impact should be handled by the TOI pass");

    for _ in 0..30 {
        world.step(DT);
    }

    let body = world.body(ball).expect("ball exists");
    assert!(body.position().x < 0.0, "ball tunneled, x = {}", body.position().x);
    assert!(body.linear_velocity().x < 1.0);
}

#[test]
fn bullet_flag_keeps_ball_in_front_of_wall() {
    let mut world = make_world(true);
    let ball = build_scene(&mut world, true);

    for _ in 0..10 {
        world.step(DT);
    }

    let x = world.body(ball).expect("ball exists").position().x;
    assert!(x < 0.0, "bullet tunneled, x = {x}");
}
