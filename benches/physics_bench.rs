use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rigid2d::{
    collision::{
        distance::{distance, DistanceInput, SimplexCache},
        narrowphase::{collide, ContactKind},
    },
    *,
};
use std::hint::black_box;

const DT: f32 = 1.0 / 60.0;

fn pyramid_world(base: usize) -> PhysicsWorld {
    let mut world = PhysicsWorld::default();
    let ground = world.create_body(&BodyDef::fixed());
    world
        .create_fixture(ground, FixtureDef::new(Shape::cuboid(50.0, 0.5)))
        .expect("ground");

    for row in 0..base {
        for i in 0..(base - row) {
            let x = (i as f32 - (base - row) as f32 * 0.5) * 1.05 + 0.5;
            let y = 1.0 + row as f32 * 1.0;
            let body = world.create_body(&BodyDef::dynamic().with_position(Vec2::new(x, y)));
            world
                .create_fixture(body, FixtureDef::new(Shape::cuboid(0.5, 0.5)).with_friction(0.6))
                .expect("box");
        }
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for &base in &[10usize, 20, 40] {
        group.bench_with_input(BenchmarkId::new("pyramid", base), &base, |b, &base| {
            let mut world = pyramid_world(base);
            // Let contacts form before timing.
            for _ in 0..10 {
                world.step(DT);
            }
            b.iter(|| {
                world.step(black_box(DT));
            })
        });
    }
    group.finish();
}

fn bench_broad_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_phase");
    for &count in &[1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::new("create_fixtures", count), &count, |b, &count| {
            b.iter(|| {
                let mut world = PhysicsWorld::with_gravity(Vec2::ZERO);
                let side = (count as f32).sqrt() as usize;
                for i in 0..count {
                    let position = Vec2::new((i % side) as f32 * 1.2, (i / side) as f32 * 1.2);
                    let body = world.create_body(&BodyDef::dynamic().with_position(position));
                    world
                        .create_fixture(body, FixtureDef::new(Shape::circle(0.5)))
                        .expect("circle");
                }
                world.step(0.0);
                black_box(world.contact_count())
            })
        });
    }
    group.finish();
}

fn bench_narrow_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("narrow_phase");
    let count = 1000;
    let shape = Shape::cuboid(0.5, 0.5);
    let transforms: Vec<(Transform, Transform)> = (0..count)
        .map(|i| {
            let angle = i as f32 * 0.01;
            (
                Transform::new(Vec2::ZERO, 0.0),
                Transform::new(Vec2::new(0.8, 0.1), angle),
            )
        })
        .collect();

    group.bench_function("polygon_manifold", |b| {
        b.iter(|| {
            for (xf_a, xf_b) in &transforms {
                black_box(collide(ContactKind::PolygonPolygon, &shape, 0, xf_a, &shape, xf_b));
            }
        })
    });

    group.bench_function("gjk_distance", |b| {
        let proxy = shape.distance_proxy(0);
        b.iter(|| {
            for (xf_a, xf_b) in &transforms {
                let mut cache = SimplexCache::default();
                let input = DistanceInput::new(proxy, *xf_a, proxy, Transform::new(xf_b.position * 3.0, 0.0));
                black_box(distance(&input, &mut cache));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_world_step, bench_broad_phase, bench_narrow_phase);
criterion_main!(benches);
