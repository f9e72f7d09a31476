use std::sync::{Arc, Mutex};
use std::thread;

use rigid2d::{BodyDef, FixtureDef, PhysicsWorld, Shape, Vec2};

const DT: f32 = 1.0 / 60.0;

fn pile_world() -> PhysicsWorld {
    let mut world = PhysicsWorld::default();
    let ground = world.create_body(&BodyDef::fixed());
    world
        .create_fixture(ground, FixtureDef::new(Shape::cuboid(30.0, 0.5)))
        .expect("ground");

    // Several separate piles so the step solves more than one island.
    for pile in 0..4 {
        for level in 0..6 {
            let x = pile as f32 * 6.0 - 9.0 + (level % 2) as f32 * 0.1;
            let body = world.create_body(&BodyDef::dynamic().with_position(Vec2::new(x, 1.0 + level as f32 * 1.1)));
            let shape = if level % 2 == 0 { Shape::cuboid(0.5, 0.5) } else { Shape::circle(0.5) };
            world
                .create_fixture(body, FixtureDef::new(shape).with_friction(0.4))
                .expect("fixture");
        }
    }
    world
}

fn snapshot(world: &PhysicsWorld) -> Vec<(Vec2, f32)> {
    world.bodies().map(|(_, body)| (body.position(), body.angle())).collect()
}

#[test]
fn physics_world_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<PhysicsWorld>();
}

#[test]
fn identical_worlds_step_identically() {
    let mut first = pile_world();
    let mut second = pile_world();

    for _ in 0..120 {
        first.step(DT);
        second.step(DT);
    }

    assert_eq!(snapshot(&first), snapshot(&second));
}

#[test]
fn world_can_be_stepped_from_other_threads() {
    let world = Arc::new(Mutex::new(pile_world()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let world = Arc::clone(&world);
            thread::spawn(move || {
                let mut world = world.lock().unwrap();
                for _ in 0..10 {
                    world.step(DT);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let reference = {
        let mut world = pile_world();
        for _ in 0..40 {
            world.step(DT);
        }
        snapshot(&world)
    };
    assert_eq!(snapshot(&world.lock().unwrap()), reference);
}
