use rigid2d::*;

fn main() {
    let mut world = PhysicsWorld::with_gravity(Vec2::ZERO);

    for i in 0..5 {
        let body = world.create_body(&BodyDef::fixed().with_position(Vec2::new(i as f32 * 3.0, 0.0)));
        let shape = if i % 2 == 0 { Shape::circle(1.0) } else { Shape::cuboid(0.5, 1.0) };
        world.create_fixture(body, FixtureDef::new(shape)).expect("fixture");
    }

    let query = RaycastQuery::new(Vec2::new(-5.0, 0.0), Vec2::X, 30.0);
    let hits = world.ray_cast(&query);
    println!("Ray hits: {}", hits.len());
    for hit in &hits {
        println!("  {:?} at {:?} normal {:?}", hit.body_id, hit.point, hit.normal);
    }

    if let Some(closest) = world.ray_cast_closest(&query) {
        println!("Closest hit at distance {:.2}", closest.distance);
    }
}
