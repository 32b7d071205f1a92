//! Benchmarks for broadphase and world stepping.
//!
//! Run with: cargo bench -p sim2d-physics
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p sim2d-physics -- --save-baseline main
//! 2. After changes: cargo bench -p sim2d-physics -- --baseline main

#![allow(missing_docs, clippy::unwrap_used, clippy::cast_precision_loss)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sim2d_physics::prelude::*;

// =============================================================================
// Scene Generation
// =============================================================================

/// A `side × side` lattice of circles and boxes above a ground plane,
/// close enough for neighbours to touch.
fn lattice(side: usize) -> Vec<Body> {
    let mut bodies = vec![Body::new_static().with_shape(Shape::plane())];
    for i in 0..side {
        for j in 0..side {
            let shape = if (i + j) % 2 == 0 {
                Shape::circle(0.5)
            } else {
                Shape::rectangle(0.9, 0.9)
            };
            let mut body = Body::new(1.0)
                .with_position(Vec2::new(i as f64 * 0.95, 0.5 + j as f64 * 0.95))
                .with_shape(shape);
            body.update_aabb();
            bodies.push(body);
        }
    }
    bodies
}

fn world_with(broadphase: BroadphaseConfig, side: usize) -> World {
    let mut world = World::new(WorldConfig::default().with_broadphase(broadphase)).unwrap();
    for body in lattice(side) {
        world.add_body(body);
    }
    world
}

// =============================================================================
// Broadphase Benchmarks
// =============================================================================

fn bench_broadphase(c: &mut Criterion) {
    let mut group = c.benchmark_group("Broadphase");

    for side in [8, 16, 32] {
        let bodies = lattice(side);
        group.throughput(Throughput::Elements(bodies.len() as u64));

        group.bench_with_input(BenchmarkId::new("naive", side), &bodies, |b, bodies| {
            let mut broadphase = NaiveBroadphase::new();
            b.iter(|| broadphase.collision_pairs(black_box(bodies)));
        });

        group.bench_with_input(BenchmarkId::new("sweep_and_prune", side), &bodies, |b, bodies| {
            let mut broadphase = SweepAndPrune::default();
            b.iter(|| broadphase.collision_pairs(black_box(bodies)));
        });

        group.bench_with_input(BenchmarkId::new("grid", side), &bodies, |b, bodies| {
            let mut broadphase = GridBroadphase::new(GridConfig::new(-1.0, 32.0, -1.0, 32.0, 32, 32)).unwrap();
            b.iter(|| broadphase.collision_pairs(black_box(bodies)));
        });
    }

    group.finish();
}

// =============================================================================
// Step Benchmarks
// =============================================================================

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("Step");

    for side in [4, 8, 16] {
        group.throughput(Throughput::Elements((side * side) as u64));

        group.bench_function(BenchmarkId::new("lattice", side), |b| {
            let mut world = world_with(BroadphaseConfig::default(), side);
            b.iter(|| world.step(black_box(1.0 / 60.0)).unwrap());
        });

        group.bench_function(BenchmarkId::new("lattice_sleeping", side), |b| {
            let mut world = world_with(BroadphaseConfig::default(), side);
            world.set_sleep_mode(SleepMode::IslandSleeping);
            b.iter(|| world.step(black_box(1.0 / 60.0)).unwrap());
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_broadphase, bench_step);

criterion_main!(benches);
