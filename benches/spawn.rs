use std::hint::black_box;

use bytemuck::{Pod, Zeroable};
use criterion::*;

use engine_core::World;

#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    vx: f32,
    vy: f32,
    vz: f32,
}

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    group.bench_function("spawn_10k_bare", |b| {
        b.iter_batched(
            World::new,
            |mut world| {
                for _ in 0..10_000 {
                    black_box(world.spawn());
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("spawn_10k_two_components", |b| {
        b.iter_batched(
            World::new,
            |mut world| {
                for i in 0..10_000 {
                    let e = world.spawn();
                    world.add_component(e, Position { x: i as f32, y: 0.0, z: 0.0 });
                    world.add_component(e, Velocity { vx: 1.0, vy: 0.0, vz: 0.0 });
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("spawn_despawn_churn_10k", |b| {
        b.iter_batched(
            || {
                let mut world = World::new();
                let entities: Vec<_> = (0..10_000)
                    .map(|_| {
                        let e = world.spawn();
                        world.add_component(e, Position::default());
                        e
                    })
                    .collect();
                (world, entities)
            },
            |(mut world, entities)| {
                for e in entities {
                    world.despawn(e);
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
