use std::f32::consts::PI;

use approx::assert_abs_diff_eq;
use rigid2d::{
    BodyDef, BodyId, DistanceJointDef, FixtureDef, JointDef, PhysicsError, PhysicsWorld, PrismaticJointDef,
    RevoluteJointDef, Shape, Vec2,
};

const DT: f32 = 1.0 / 60.0;

fn make_world(gravity: Vec2) -> PhysicsWorld {
    PhysicsWorld::with_gravity(gravity)
}

fn add_dynamic(world: &mut PhysicsWorld, position: Vec2, shape: Shape, density: f32) -> BodyId {
    let body = world.create_body(&BodyDef::dynamic().with_position(position).with_allow_sleep(false));
    world
        .create_fixture(body, FixtureDef::new(shape).with_density(density))
        .expect("fixture");
    body
}

fn joint_between(world: &mut PhysicsWorld, make: impl FnOnce(&PhysicsWorld) -> JointDef) -> rigid2d::JointId {
    let def = make(&*world);
    world.create_joint(def).expect("joint bodies exist")
}

#[test]
fn revolute_motor_spins_up_to_target_speed() {
    let mut world = make_world(Vec2::ZERO);
    let base = world.create_body(&BodyDef::fixed());
    // Unit mass and inertia 0.5 about the center.
    let wheel = add_dynamic(&mut world, Vec2::ZERO, Shape::circle(1.0), 1.0 / PI);

    joint_between(&mut world, |w| {
        RevoluteJointDef::new(w.body(base).unwrap(), w.body(wheel).unwrap(), Vec2::ZERO)
            .with_motor(10.0, 2.5)
            .into()
    });

    // 2.5 N·m on inertia 0.5 accelerates at 5 rad/s².
    for _ in 0..60 {
        world.step(DT);
    }
    let speed = world.body(wheel).unwrap().angular_velocity();
    assert!(speed > 4.5 && speed < 5.5, "speed {speed} expected ~5.0");

    for _ in 0..120 {
        world.step(DT);
    }
    let speed = world.body(wheel).unwrap().angular_velocity();
    assert!((speed - 10.0).abs() < 0.2, "speed {speed} should settle at 10.0");
}

#[test]
fn revolute_limit_holds_falling_arm() {
    let mut world = make_world(Vec2::new(0.0, -10.0));
    let base = world.create_body(&BodyDef::fixed());
    let arm = add_dynamic(&mut world, Vec2::new(1.0, 0.0), Shape::cuboid(1.0, 0.1), 1.0);

    let joint = joint_between(&mut world, |w| {
        RevoluteJointDef::new(w.body(base).unwrap(), w.body(arm).unwrap(), Vec2::ZERO)
            .with_limit(-0.5, 0.5)
            .into()
    });

    for _ in 0..120 {
        world.step(DT);
    }

    let body = world.body(arm).unwrap();
    assert!(
        body.angle() > -0.56 && body.angle() < -0.44,
        "arm angle {} should rest on the lower limit",
        body.angle()
    );
    // The anchor stays pinned to the origin.
    assert!(body.world_point(Vec2::new(-1.0, 0.0)).length() < 0.02);
    assert!(world.joint(joint).unwrap().reaction_force(1.0 / DT).length() > 0.0);
}

#[test]
fn distance_joint_keeps_pendulum_length() {
    let mut world = make_world(Vec2::new(0.0, -10.0));
    let pivot = Vec2::new(0.0, 5.0);
    let ceiling = world.create_body(&BodyDef::fixed().with_position(pivot));
    let bob = add_dynamic(&mut world, Vec2::new(3.0, 5.0), Shape::circle(0.25), 1.0);

    joint_between(&mut world, |w| {
        let a = w.body(ceiling).unwrap();
        let b = w.body(bob).unwrap();
        DistanceJointDef::new(a, b, pivot, b.position()).into()
    });

    let mut lowest = f32::MAX;
    for _ in 0..120 {
        world.step(DT);
        let position = world.body(bob).unwrap().position();
        lowest = lowest.min(position.y);
        assert_abs_diff_eq!((position - pivot).length(), 3.0, epsilon = 0.05);
    }
    // The bob swung through the bottom of its arc.
    assert!(lowest < 2.2, "lowest point {lowest}");
}

#[test]
fn prismatic_joint_constrains_motion_to_axis() {
    let mut world = make_world(Vec2::ZERO);
    let base = world.create_body(&BodyDef::fixed());
    let slider = add_dynamic(&mut world, Vec2::ZERO, Shape::cuboid(0.5, 0.5), 1.0);
    world
        .body_mut(slider)
        .unwrap()
        .set_linear_velocity(Vec2::new(5.0, 3.0));

    joint_between(&mut world, |w| {
        PrismaticJointDef::new(w.body(base).unwrap(), w.body(slider).unwrap(), Vec2::ZERO, Vec2::X)
            .with_limit(-1.0, 1.0)
            .into()
    });

    for _ in 0..60 {
        world.step(DT);
    }

    let body = world.body(slider).unwrap();
    assert!(
        body.position().x > 0.95 && body.position().x < 1.03,
        "slider should stop at the upper limit, x = {}",
        body.position().x
    );
    assert_abs_diff_eq!(body.position().y, 0.0, epsilon = 0.01);
    assert_abs_diff_eq!(body.angle(), 0.0, epsilon = 0.01);
}

#[test]
fn prismatic_motor_drives_slider() {
    let mut world = make_world(Vec2::ZERO);
    let base = world.create_body(&BodyDef::fixed());
    // Unit mass.
    let slider = add_dynamic(&mut world, Vec2::ZERO, Shape::cuboid(0.5, 0.5), 1.0);

    joint_between(&mut world, |w| {
        PrismaticJointDef::new(w.body(base).unwrap(), w.body(slider).unwrap(), Vec2::ZERO, Vec2::X)
            .with_motor(2.0, 10.0)
            .into()
    });

    for _ in 0..30 {
        world.step(DT);
    }

    let velocity = world.body(slider).unwrap().linear_velocity();
    assert_abs_diff_eq!(velocity.x, 2.0, epsilon = 0.05);
    assert_abs_diff_eq!(velocity.y, 0.0, epsilon = 1.0e-3);
}

#[test]
fn jointed_bodies_skip_collision_unless_requested() {
    let mut world = make_world(Vec2::ZERO);
    let a = add_dynamic(&mut world, Vec2::ZERO, Shape::cuboid(0.5, 0.5), 1.0);
    let b = add_dynamic(&mut world, Vec2::new(0.5, 0.0), Shape::cuboid(0.5, 0.5), 1.0);

    let joint = joint_between(&mut world, |w| {
        RevoluteJointDef::new(w.body(a).unwrap(), w.body(b).unwrap(), Vec2::new(0.25, 0.0)).into()
    });
    world.step(DT);
    assert_eq!(world.contact_count(), 0);

    world.destroy_joint(joint).expect("joint exists");
    world.step(DT);
    assert_eq!(world.contact_count(), 1);
}

#[test]
fn joint_to_same_body_is_rejected() {
    let mut world = make_world(Vec2::ZERO);
    let a = add_dynamic(&mut world, Vec2::ZERO, Shape::circle(0.5), 1.0);
    let def = RevoluteJointDef::new(world.body(a).unwrap(), world.body(a).unwrap(), Vec2::ZERO);

    assert!(matches!(world.create_joint(def), Err(PhysicsError::SameBody(_))));
    assert_eq!(world.joint_count(), 0);
}
