use approx::assert_abs_diff_eq;
use rigid2d::{Aabb, BodyDef, FixtureDef, FixtureId, PhysicsWorld, RaycastQuery, Shape, Vec2};

fn add_static(world: &mut PhysicsWorld, position: Vec2, def: FixtureDef) -> FixtureId {
    let body = world.create_body(&BodyDef::fixed().with_position(position));
    world.create_fixture(body, def).expect("fixture")
}

fn make_scene() -> (PhysicsWorld, FixtureId, FixtureId, FixtureId) {
    let mut world = PhysicsWorld::with_gravity(Vec2::ZERO);
    let near = add_static(&mut world, Vec2::ZERO, FixtureDef::new(Shape::cuboid(0.5, 0.5)));
    let far = add_static(&mut world, Vec2::new(5.0, 0.0), FixtureDef::new(Shape::circle(1.0)));
    let sensor = add_static(
        &mut world,
        Vec2::new(-4.0, 0.0),
        FixtureDef::new(Shape::cuboid(0.5, 2.0)).sensor(true),
    );
    (world, near, far, sensor)
}

#[test]
fn ray_reports_every_hit_nearest_first() {
    let (world, near, far, sensor) = make_scene();
    let query = RaycastQuery::new(Vec2::new(-10.0, 0.0), Vec2::X, 20.0);

    let hits = world.ray_cast(&query);
    let order: Vec<FixtureId> = hits.iter().map(|hit| hit.fixture_id).collect();
    assert_eq!(order, vec![sensor, near, far]);

    let box_hit = &hits[1];
    assert_abs_diff_eq!(box_hit.point.x, -0.5, epsilon = 1.0e-3);
    assert_abs_diff_eq!(box_hit.normal.x, -1.0, epsilon = 1.0e-4);
    assert_abs_diff_eq!(box_hit.distance, 9.5, epsilon = 1.0e-3);
    assert_abs_diff_eq!(box_hit.fraction, 9.5 / 20.0, epsilon = 1.0e-4);

    let circle_hit = &hits[2];
    assert_abs_diff_eq!(circle_hit.point.x, 4.0, epsilon = 1.0e-3);
}

#[test]
fn ray_filter_skips_sensors() {
    let (world, near, _, _) = make_scene();
    let query = RaycastQuery::new(Vec2::new(-10.0, 0.0), Vec2::X, 20.0);

    let hits = world.ray_cast_with_filter(&query, |_, fixture| !fixture.is_sensor());
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].fixture_id, near);
}

#[test]
fn closest_hit_respects_max_distance() {
    let (world, near, _, _) = make_scene();

    let hit = world
        .ray_cast_closest(&RaycastQuery::segment(Vec2::new(2.0, 0.0), Vec2::new(-2.0, 0.0)))
        .expect("box is on the segment");
    assert_eq!(hit.fixture_id, near);
    assert_abs_diff_eq!(hit.point.x, 0.5, epsilon = 1.0e-3);

    let short = RaycastQuery::new(Vec2::new(2.0, 0.0), -Vec2::X, 1.0);
    assert!(world.ray_cast_closest(&short).is_none());
}

#[test]
fn degenerate_rays_hit_nothing() {
    let (world, _, _, _) = make_scene();
    assert!(world.ray_cast(&RaycastQuery::new(Vec2::ZERO, Vec2::ZERO, 10.0)).is_empty());
    assert!(world.ray_cast(&RaycastQuery::new(Vec2::new(-10.0, 0.0), Vec2::X, 0.0)).is_empty());
}

#[test]
fn point_and_region_queries() {
    let (world, near, far, sensor) = make_scene();

    assert_eq!(world.query_point(Vec2::new(0.2, 0.2)), vec![near]);
    assert_eq!(world.query_point(Vec2::new(5.5, 0.5)), vec![far]);
    assert!(world.query_point(Vec2::new(2.5, 0.0)).is_empty());

    let mut found = world.query_aabb(&Aabb::new(Vec2::new(-4.0, -1.0), Vec2::new(0.0, 1.0)));
    found.sort();
    let mut expected = vec![near, sensor];
    expected.sort();
    assert_eq!(found, expected);
}
