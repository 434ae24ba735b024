use criterion::*;
use std::hint::black_box;

use pulse_ecs::prelude::*;

#[derive(Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy)]
struct Velocity {
    x: f32,
    y: f32,
}

const ENTITIES: u32 = 10_000;

fn populated_world() -> World {
    let mut world = World::new(ENTITIES);
    for index in 0..ENTITIES {
        let entity = world.create_entity().unwrap();
        world.set(entity, Position { x: index as f32, y: 0.0 }).unwrap();
        world.set(entity, Velocity { x: 1.0, y: 2.0 }).unwrap();
    }
    world
}

fn churn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");

    group.bench_function("spawn_10k", |b| {
        b.iter_batched(
            || World::new(ENTITIES),
            |mut world| {
                for _ in 0..ENTITIES {
                    let entity = world.create_entity().unwrap();
                    world.set(entity, Position { x: 0.0, y: 0.0 }).unwrap();
                    world.set(entity, Velocity { x: 1.0, y: 2.0 }).unwrap();
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("dispose_10k", |b| {
        b.iter_batched(
            populated_world,
            |mut world| {
                for entity in world.entities() {
                    world.dispose_entity(entity);
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("iterate_tracked_10k", |b| {
        b.iter_batched(
            || {
                let mut world = populated_world();
                let set = world.query().with::<Position>().with::<Velocity>().as_set();
                (world, set)
            },
            |(world, set)| {
                let mut sum = 0.0f32;
                for entity in set.entities().iter() {
                    let position = world.get::<Position>(*entity).unwrap();
                    let velocity = world.get::<Velocity>(*entity).unwrap();
                    sum += position.x + velocity.y;
                }
                black_box(sum);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, churn_benchmark);
criterion_main!(benches);
