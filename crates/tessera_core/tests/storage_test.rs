//! # Storage Integration Test
//!
//! Allocator accounting, configuration loading and a randomized comparison
//! of component storage against a plain model.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tessera_core::{
    BudgetAllocator, ComponentDesc, ComponentId, EcsConfig, EcsError, Engine, Entity, ErrorKind,
    Signal, Storage, World,
};

#[test]
fn test_refused_growth_leaves_world_usable() {
    let budget = BudgetAllocator::new(64);
    let mut world = World::with_allocator(budget.clone());
    let c = world.create_component(ComponentDesc::inline("c", 7)).unwrap();
    world.initialize().unwrap();

    // 8-byte rows: capacity 1, 3, 6, then 10 rows would exceed the budget.
    let mut spawned = Vec::new();
    let err = loop {
        match world.spawn() {
            Ok(e) => spawned.push(e),
            Err(err) => break err,
        }
    };
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    assert_eq!(spawned.len(), 6);
    assert_eq!(world.entity_count(), 6);
    assert_eq!(budget.in_use(), 48);

    for &e in &spawned {
        world.set_component(e, c, Some(&[1; 7])).unwrap();
    }
    assert_eq!(world.get_component(spawned[5], c).unwrap(), &[1; 7]);
}

#[test]
fn test_refused_pool_growth() {
    // Three 5-byte rows plus room for exactly one 16-byte slot.
    let budget = BudgetAllocator::new(15 + 16);
    let mut world = World::with_allocator(budget.clone());
    let blob = world
        .create_component(ComponentDesc::indexed("blob", 16))
        .unwrap();
    world.initialize().unwrap();
    let a = world.spawn().unwrap();
    let b = world.spawn().unwrap();
    world.spawn().unwrap();
    assert_eq!(budget.in_use(), 15);

    world.set_component(a, blob, None).unwrap();
    assert_eq!(
        world.set_component(b, blob, None),
        Err(EcsError::OutOfMemory { bytes: 16 })
    );
    assert!(world.has_component(a, blob).unwrap());
    assert!(!world.has_component(b, blob).unwrap());
    assert_eq!(budget.remaining(), 0);
}

#[test]
fn test_teardown_returns_every_byte() {
    let budget = BudgetAllocator::new(1 << 20);
    {
        let mut engine = Engine::with_allocator(budget.clone());
        let pos = engine
            .create_component(ComponentDesc::of::<[f32; 3]>("pos", Storage::Inline))
            .unwrap();
        let ammo = engine
            .create_component(ComponentDesc::of::<u32>("ammo", Storage::Indexed).limited(32))
            .unwrap();
        let hits = engine
            .create_component(ComponentDesc::of::<u64>("hits", Storage::Multiple))
            .unwrap();
        engine.initialize().unwrap();

        for i in 0..20u32 {
            let world = engine.world_mut();
            let e = world.spawn().unwrap();
            world.set(e, pos, &[i as f32; 3]).unwrap();
            world.set(e, ammo, &i).unwrap();
            for h in 0..(i % 4) {
                world.append(e, hits, &u64::from(h)).unwrap();
            }
            world.signal(e, Signal::Added).unwrap();
        }
        engine.process(0.0).unwrap();
        for i in (0..20).step_by(3) {
            engine.world_mut().signal(Entity::new(i), Signal::Deleted).unwrap();
        }
        engine.process(0.0).unwrap();

        assert!(budget.in_use() > 0);
        assert!(budget.peak() >= budget.in_use());
    }
    assert_eq!(budget.in_use(), 0);
}

#[test]
fn test_engine_from_config() {
    let config = EcsConfig::from_toml_str(
        r#"
        initial_entity_capacity = 64

        [[components]]
        name = "position"
        size = 12

        [[components]]
        name = "cargo"
        size = 4
        storage = "multiple"
        limit = 8
        "#,
    )
    .unwrap();

    let budget = BudgetAllocator::new(4096);
    let mut engine = Engine::from_config(&config, budget.clone()).unwrap();
    engine.initialize().unwrap();

    let world = engine.world();
    assert_eq!(world.table().capacity(), 64);
    let cargo = world.find_component("cargo").unwrap();
    assert_eq!(cargo, ComponentId::new(1));
    assert_eq!(world.component_desc(cargo).unwrap().storage, Storage::Multiple);
    let stats = world.pool_stats(cargo).unwrap().unwrap();
    assert_eq!((stats.capacity, stats.limit), (8, Some(8)));
    // 64 rows of 1 + 12 + 8 bytes, plus the preallocated pool.
    assert_eq!(budget.in_use(), 64 * 21 + 8 * 4);
}

#[test]
fn test_config_rejects_limited_inline() {
    let config = EcsConfig {
        initial_entity_capacity: 0,
        components: vec![ComponentDesc::inline("pos", 12).limited(4)],
    };
    let err = Engine::from_config(&config, tessera_core::SystemAllocator).unwrap_err();
    assert!(matches!(err, EcsError::InvalidDescriptor(_)));
}

/// Random attach/detach/overwrite traffic checked against a `HashMap` model.
#[test]
fn test_random_traffic_matches_model() {
    const ENTITIES: u32 = 32;
    let mut rng = ChaCha8Rng::seed_from_u64(0x7E55_E7A);
    let mut world = World::new();
    let inline = world
        .create_component(ComponentDesc::of::<u32>("inline", Storage::Inline))
        .unwrap();
    let indexed = world
        .create_component(ComponentDesc::of::<u32>("indexed", Storage::Indexed))
        .unwrap();
    let multiple = world
        .create_component(ComponentDesc::of::<u32>("multiple", Storage::Multiple))
        .unwrap();
    world.initialize().unwrap();
    let components = [inline, indexed, multiple];
    for _ in 0..ENTITIES {
        world.spawn().unwrap();
    }

    let mut model: HashMap<(u32, u32), Vec<u32>> = HashMap::new();
    for step in 0..5_000u32 {
        let e = Entity::new(rng.gen_range(0..ENTITIES));
        let c = components[rng.gen_range(0..components.len())];
        let values = model.entry((e.index(), c.index())).or_default();
        let multi = c == multiple;

        match rng.gen_range(0..4) {
            0 => {
                let index = world.append(e, c, &step).unwrap();
                if multi {
                    assert_eq!(index as usize, values.len());
                    values.push(step);
                } else {
                    *values = vec![step];
                }
            }
            1 if !values.is_empty() => {
                let index = rng.gen_range(0..values.len());
                let at = if multi { index as u32 } else { 0 };
                world.remove_component_at(e, c, at).unwrap();
                values.remove(if multi { index } else { 0 });
            }
            2 => {
                world.remove_components(e, c).unwrap();
                values.clear();
            }
            _ if !values.is_empty() => {
                let index = if multi { rng.gen_range(0..values.len()) } else { 0 };
                world
                    .set_component_at(e, c, index as u32, Some(&step.to_ne_bytes()))
                    .unwrap();
                values[index] = step;
            }
            _ => {}
        }

        let values = &model[&(e.index(), c.index())];
        assert_eq!(world.component_count(e, c).unwrap() as usize, values.len());
        assert_eq!(world.has_component(e, c).unwrap(), !values.is_empty());
        for (i, &expected) in values.iter().enumerate() {
            assert_eq!(world.read_at::<u32>(e, c, i as u32).unwrap(), expected);
        }
    }

    for c in [indexed, multiple] {
        let live: usize = model
            .iter()
            .filter(|((_, comp), _)| *comp == c.index())
            .map(|(_, values)| values.len())
            .sum();
        let stats = world.pool_stats(c).unwrap().unwrap();
        assert_eq!(stats.live as usize, live);
        assert_eq!(stats.live + stats.free, stats.capacity);
    }
}
