//! # Tick Benchmark
//!
//! Measures spawn throughput, component attach/detach, a full tick over
//! subscribed entities, and signal draining.
//!
//! Run with: `cargo bench --package tessera_core`

// Benchmarks don't need docs
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_core::{
    ComponentDesc, ComponentId, Engine, Entity, Signal, Storage, System, SystemFlags, World,
};

#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct Motion {
    position: [f32; 3],
    velocity: [f32; 3],
}

struct Integrate {
    motion: ComponentId,
}

impl System for Integrate {
    fn process(&mut self, world: &mut World, entity: Entity, delta: f32) {
        let _ = world.update(entity, self.motion, |m: &mut Motion| {
            for axis in 0..3 {
                m.position[axis] += m.velocity[axis] * delta;
            }
        });
    }
}

/// Builds an engine with `count` active entities carrying `Motion`.
fn populated(count: u32) -> Engine {
    let mut engine = Engine::new();
    let motion = engine
        .create_component(ComponentDesc::of::<Motion>("motion", Storage::Inline))
        .unwrap();
    let system = engine
        .create_system("integrate", Integrate { motion }, SystemFlags::NONE)
        .unwrap();
    engine.watch(system, motion).unwrap();
    engine.initialize().unwrap();

    let world = engine.world_mut();
    world.reserve(count).unwrap();
    for i in 0..count {
        let e = world.spawn().unwrap();
        let m = Motion {
            position: [0.0; 3],
            velocity: [i as f32, 1.0, 0.5],
        };
        world.set(e, motion, &m).unwrap();
        world.signal(e, Signal::Added).unwrap();
    }
    engine.process(0.0).unwrap();
    engine
}

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");
    for count in [1_000u32, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut world = World::new();
                world.create_component(ComponentDesc::inline("tag", 4)).unwrap();
                world.initialize().unwrap();
                for _ in 0..count {
                    black_box(world.spawn().unwrap());
                }
                world.entity_count()
            });
        });
    }
    group.finish();
}

fn bench_attach(c: &mut Criterion) {
    let mut world = World::new();
    let hits = world
        .create_component(ComponentDesc::of::<u32>("hits", Storage::Multiple))
        .unwrap();
    let ammo = world
        .create_component(ComponentDesc::of::<u32>("ammo", Storage::Indexed))
        .unwrap();
    world.initialize().unwrap();
    let entities: Vec<Entity> = (0..1_000).map(|_| world.spawn().unwrap()).collect();

    c.bench_function("attach_detach_1k", |b| {
        b.iter(|| {
            for &e in &entities {
                world.set(e, ammo, &7u32).unwrap();
                world.append(e, hits, &1u32).unwrap();
                world.append(e, hits, &2u32).unwrap();
            }
            for &e in &entities {
                world.remove_component(e, ammo).unwrap();
                world.remove_components(e, hits).unwrap();
            }
        });
    });
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for count in [1_000u32, 100_000] {
        let mut engine = populated(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| engine.process(black_box(1.0 / 60.0)).unwrap());
        });
    }
    group.finish();
}

fn bench_signal_churn(c: &mut Criterion) {
    let mut engine = populated(10_000);
    c.bench_function("disable_enable_10k", |b| {
        b.iter(|| {
            for signal in [Signal::Disabled, Signal::Enabled] {
                for i in 0..10_000 {
                    engine.world_mut().signal(Entity::new(i), signal).unwrap();
                }
                engine.process(0.0).unwrap();
            }
        });
    });
}

criterion_group!(benches, bench_spawn, bench_attach, bench_tick, bench_signal_churn);
criterion_main!(benches);
