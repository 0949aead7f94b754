use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::*;

use engine_core::{JobSystem, TaskGraph};

fn graph_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_graph");

    let pool = JobSystem::with_workers(4);

    group.bench_function("fan_out_64", |b| {
        b.iter(|| {
            let work = Arc::new(AtomicU64::new(0));
            let mut graph = TaskGraph::new(&pool);
            for i in 0..64 {
                let work = Arc::clone(&work);
                graph.add(format!("node-{i}"), move || {
                    work.fetch_add(1, Ordering::Relaxed);
                });
            }
            graph.execute();
            assert_eq!(work.load(Ordering::Relaxed), 64);
        });
    });

    group.bench_function("diamond_chain_32", |b| {
        b.iter(|| {
            let work = Arc::new(AtomicU64::new(0));
            let mut graph = TaskGraph::new(&pool);
            let mut previous = None;
            for i in 0..32 {
                let left_work = Arc::clone(&work);
                let left = graph.add(format!("left-{i}"), move || {
                    left_work.fetch_add(1, Ordering::Relaxed);
                });
                let right_work = Arc::clone(&work);
                let right = graph.add(format!("right-{i}"), move || {
                    right_work.fetch_add(1, Ordering::Relaxed);
                });
                let join = graph.add(format!("join-{i}"), || {});
                graph.depends_on(join, left);
                graph.depends_on(join, right);
                if let Some(tail) = previous {
                    graph.depends_on(left, tail);
                    graph.depends_on(right, tail);
                }
                previous = Some(join);
            }
            graph.execute();
            assert_eq!(work.load(Ordering::Relaxed), 64);
        });
    });

    group.finish();
}

criterion_group!(benches, graph_benchmark);
criterion_main!(benches);
