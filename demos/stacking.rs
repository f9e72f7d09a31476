use rigid2d::*;

fn main() {
    let mut world = PhysicsWorld::default();

    let ground = world.create_body(&BodyDef::fixed());
    world
        .create_fixture(ground, FixtureDef::new(Shape::cuboid(20.0, 0.5)))
        .expect("ground fixture");

    let mut boxes = Vec::new();
    for level in 0..10 {
        let body = world.create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 1.0 + level as f32)));
        world
            .create_fixture(body, FixtureDef::new(Shape::cuboid(0.5, 0.5)).with_friction(0.6))
            .expect("box fixture");
        boxes.push(body);
    }

    let mut steps = 0;
    while steps < 600 {
        steps += world.advance(1.0 / 30.0);
    }

    let profile = world.profile();
    println!(
        "after {steps} steps: {} contacts, {} islands",
        profile.contact_count, profile.island_count
    );
    for (level, id) in boxes.iter().enumerate() {
        if let Some(body) = world.body(*id) {
            println!("box {level}: {:?} awake {}", body.position(), body.is_awake());
        }
    }
}
