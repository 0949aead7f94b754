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

#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct Tag {
    group: u32,
}

fn populated_world(entities: u32) -> World {
    let mut world = World::new();
    for i in 0..entities {
        let e = world.spawn();
        world.add_component(e, Position { x: i as f32, y: 0.0, z: 0.0 });
        world.add_component(e, Velocity { vx: 1.0, vy: 0.5, vz: 0.0 });
        // Half the entities land in a second archetype.
        if i % 2 == 0 {
            world.add_component(e, Tag { group: i % 7 });
        }
    }
    world
}

fn iterate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");
    group.throughput(Throughput::Elements(100_000));

    let mut world = populated_world(100_000);

    group.bench_function("integrate_100k", |b| {
        b.iter(|| {
            world.query().for_each2::<Position, Velocity>(|_, p, v| {
                p.x += v.vx;
                p.y += v.vy;
            });
        });
    });

    group.bench_function("read_100k_filtered", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            world
                .query()
                .without::<Tag>()
                .for_each::<Position>(|_, p| sum += p.x);
            black_box(sum);
        });
    });

    group.finish();
}

criterion_group!(benches, iterate_benchmark);
criterion_main!(benches);
