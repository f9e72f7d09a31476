use rigid2d::*;

fn main() {
    let mut world = PhysicsWorld::default();

    let ground = world.create_body(&BodyDef::fixed());
    world
        .create_fixture(ground, FixtureDef::new(Shape::cuboid(10.0, 0.5)))
        .expect("ground fixture");

    let ball = world.create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 4.0)));
    world
        .create_fixture(ball, FixtureDef::new(Shape::circle(0.5)).with_restitution(0.5))
        .expect("ball fixture");

    for frame in 0..120 {
        world.step(1.0 / 60.0);
        if frame % 20 == 0 {
            if let Some(body) = world.body(ball) {
                println!("frame {frame:3}: position {:?} awake {}", body.position(), body.is_awake());
            }
        }
    }
}
