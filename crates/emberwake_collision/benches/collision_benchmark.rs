//! Collision tick throughput with a mixed static/dynamic population.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use emberwake_collision::{BodyKind, CollisionEngine};
use emberwake_core::EntityDataStore;
use emberwake_shared::{Aabb, EventBus, Vec2};

fn populate(body_count: usize) -> (CollisionEngine, EntityDataStore) {
    let (tx, rx) = EventBus::channel(16_384);
    // Keep the receiver alive for the benchmark's lifetime.
    std::mem::forget(rx);

    let mut engine = CollisionEngine::new(tx);
    let mut store = EntityDataStore::new(body_count * 2, body_count + 16);

    // A sparse field of walls.
    for i in 0..body_count / 10 {
        let position = Vec2::new((i % 64) as f32 * 128.0, (i / 64) as f32 * 128.0);
        let handle = store.create_static_obstacle(position, Vec2::new(16.0, 16.0)).unwrap();
        engine.add_body(handle, Aabb::from_center(position, Vec2::new(16.0, 16.0)), BodyKind::Static);
    }

    // Roaming bodies scattered over the same field, all moving.
    for i in 0..body_count {
        let position = Vec2::new(
            ((i * 37) % 8192) as f32 + 7.0,
            ((i * 101) % 8192) as f32 + 3.0,
        );
        let handle = store
            .create_npc(position, Vec2::new(12.0, 12.0), 100.0, 0, 2, "bench")
            .unwrap();
        engine.add_body(handle, Aabb::from_center(position, Vec2::new(12.0, 12.0)), BodyKind::Dynamic);
        let index = store.get_index(handle).unwrap();
        let direction = if i % 2 == 0 { 1.0 } else { -1.0 };
        store.set_velocity(index, Vec2::new(60.0 * direction, 30.0));
    }

    (engine, store)
}

fn bench_collision_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("collision_tick");
    for &body_count in &[1_000usize, 5_000, 10_000] {
        let (mut engine, mut store) = populate(body_count);
        group.bench_with_input(BenchmarkId::from_parameter(body_count), &body_count, |b, _| {
            b.iter(|| engine.update(1.0 / 60.0, &mut store));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_collision_tick);
criterion_main!(benches);
