//! # Engine
//!
//! Owns a [`World`] plus the system and manager registries, and runs ticks.
//!
//! A full tick drains the lifecycle queues in order (added, enabled,
//! disabled, deleted), then runs every non-passive system in registration
//! order. Spawns made while the tick runs land in the overflow buffer and are
//! merged into the table once the tick is over.
//!
//! Hooks receive `&mut World`, never the engine, so a tick cannot be started
//! from inside another.

use super::component::ComponentDesc;
use super::entity::{ComponentId, Entity, ManagerId, SystemId};
use super::manager::{Manager, ManagerEntry};
use super::signal::Signal;
use super::system::{System, SystemEntry, SystemFlags};
use super::world::World;
use crate::config::EcsConfig;
use crate::error::{EcsError, EcsResult};
use crate::memory::{Allocator, SystemAllocator};

/// A world plus the behaviour that runs over it.
///
/// # Example
///
/// ```rust
/// use tessera_core::{ComponentDesc, Engine, Entity, Signal, System, SystemFlags, World};
///
/// struct Gravity {
///     seen: u32,
/// }
///
/// impl System for Gravity {
///     fn process(&mut self, _world: &mut World, _entity: Entity, _delta: f32) {
///         self.seen += 1;
///     }
/// }
///
/// let mut engine = Engine::new();
/// let velocity = engine.create_component(ComponentDesc::inline("velocity", 8)).unwrap();
/// let gravity = engine
///     .create_system("gravity", Gravity { seen: 0 }, SystemFlags::NONE)
///     .unwrap();
/// engine.watch(gravity, velocity).unwrap();
/// engine.initialize().unwrap();
///
/// let world = engine.world_mut();
/// let entity = world.spawn().unwrap();
/// world.set_component(entity, velocity, None).unwrap();
/// world.signal(entity, Signal::Added).unwrap();
///
/// engine.process(0.016).unwrap();
/// assert!(engine.is_subscribed(gravity, entity).unwrap());
/// ```
pub struct Engine {
    world: World,
    systems: Vec<SystemEntry>,
    managers: Vec<ManagerEntry>,
    /// Rows reserved by [`Engine::initialize`].
    initial_capacity: u32,
}

impl Engine {
    /// Creates an engine backed by the system allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(SystemAllocator)
    }

    /// Creates an engine that charges every allocation to `allocator`.
    #[must_use]
    pub fn with_allocator(allocator: impl Allocator + 'static) -> Self {
        Self {
            world: World::with_allocator(allocator),
            systems: Vec::new(),
            managers: Vec::new(),
            initial_capacity: 0,
        }
    }

    /// Creates an engine with every component of `config` registered.
    ///
    /// Systems and managers still have to be registered before
    /// [`Engine::initialize`], which reserves the configured row capacity.
    ///
    /// # Errors
    ///
    /// Returns the first registration error.
    pub fn from_config(config: &EcsConfig, allocator: impl Allocator + 'static) -> EcsResult<Self> {
        let mut engine = Self::with_allocator(allocator);
        engine.initial_capacity = config.initial_entity_capacity;
        for desc in &config.components {
            engine.create_component(desc.clone())?;
        }
        tracing::info!(
            "Engine configured with {} components, {} initial rows",
            config.components.len(),
            config.initial_entity_capacity
        );
        Ok(engine)
    }

    /// The world.
    #[inline]
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The world, mutably.
    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a component type. See [`World::create_component`].
    ///
    /// # Errors
    ///
    /// As [`World::create_component`].
    pub fn create_component(&mut self, desc: ComponentDesc) -> EcsResult<ComponentId> {
        self.world.create_component(desc)
    }

    /// Registers a system with an empty filter, which matches every entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyInitialized`] after initialization.
    pub fn create_system(
        &mut self,
        name: impl Into<String>,
        system: impl System + 'static,
        flags: SystemFlags,
    ) -> EcsResult<SystemId> {
        self.ensure_building()?;
        let id = SystemId::new(self.systems.len() as u32);
        self.systems.try_reserve(1)?;
        self.systems
            .push(SystemEntry::new(name.into(), Box::new(system), flags));
        Ok(id)
    }

    /// Requires `component` on every entity `system` processes.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyInitialized`] after initialization, or an
    /// error naming the unknown id.
    pub fn watch(&mut self, system: SystemId, component: ComponentId) -> EcsResult<()> {
        self.filter(system, component)?.watch.insert(component.index())?;
        Ok(())
    }

    /// Rejects every entity carrying `component` from `system`.
    ///
    /// # Errors
    ///
    /// As [`Engine::watch`].
    pub fn exclude(&mut self, system: SystemId, component: ComponentId) -> EcsResult<()> {
        self.filter(system, component)?.exclude.insert(component.index())?;
        Ok(())
    }

    fn filter(&mut self, system: SystemId, component: ComponentId) -> EcsResult<&mut SystemEntry> {
        self.ensure_building()?;
        self.world.component_desc(component)?;
        self.systems
            .get_mut(system.index() as usize)
            .ok_or(EcsError::InvalidSystem(system))
    }

    /// Registers a manager.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyInitialized`] after initialization.
    pub fn create_manager(
        &mut self,
        name: impl Into<String>,
        manager: impl Manager + 'static,
    ) -> EcsResult<ManagerId> {
        self.ensure_building()?;
        let id = ManagerId::new(self.managers.len() as u32);
        self.managers.try_reserve(1)?;
        self.managers.push(ManagerEntry {
            name: name.into(),
            hooks: Box::new(manager),
        });
        Ok(id)
    }

    /// Seals registration and reserves the initial row capacity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyInitialized`] if called twice, or an
    /// out-of-memory error if the initial reservation is refused.
    pub fn initialize(&mut self) -> EcsResult<()> {
        self.world.initialize()?;
        if self.initial_capacity > 0 {
            self.world.reserve(self.initial_capacity)?;
        }
        tracing::debug!(
            "Engine initialized: {} systems, {} managers",
            self.systems.len(),
            self.managers.len()
        );
        Ok(())
    }

    fn ensure_building(&self) -> EcsResult<()> {
        if self.world.is_initialized() {
            Err(EcsError::AlreadyInitialized)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of registered systems.
    #[inline]
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Number of registered managers.
    #[inline]
    #[must_use]
    pub fn manager_count(&self) -> usize {
        self.managers.len()
    }

    /// Name `system` was registered with.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidSystem`] for an unknown id.
    pub fn system_name(&self, system: SystemId) -> EcsResult<&str> {
        self.system(system).map(|entry| entry.name.as_str())
    }

    /// Name `manager` was registered with.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidManager`] for an unknown id.
    pub fn manager_name(&self, manager: ManagerId) -> EcsResult<&str> {
        self.managers
            .get(manager.index() as usize)
            .map(|entry| entry.name.as_str())
            .ok_or(EcsError::InvalidManager(manager))
    }

    /// Number of entities `system` currently processes.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidSystem`] for an unknown id.
    pub fn subscriber_count(&self, system: SystemId) -> EcsResult<usize> {
        self.system(system).map(|entry| entry.entities.len())
    }

    /// Checks whether `system` currently processes `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidSystem`] for an unknown id.
    pub fn is_subscribed(&self, system: SystemId, entity: Entity) -> EcsResult<bool> {
        self.system(system)
            .map(|entry| entry.entities.contains(entity.index()))
    }

    /// Entities `system` processes, in processing order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidSystem`] for an unknown id.
    pub fn subscribers(&self, system: SystemId) -> EcsResult<impl Iterator<Item = Entity> + '_> {
        self.system(system)
            .map(|entry| entry.entities.iter().map(Entity::new))
    }

    fn system(&self, system: SystemId) -> EcsResult<&SystemEntry> {
        self.systems
            .get(system.index() as usize)
            .ok_or(EcsError::InvalidSystem(system))
    }

    // =========================================================================
    // Ticks
    // =========================================================================

    /// Runs one full tick.
    ///
    /// # Arguments
    ///
    /// * `delta` - Elapsed time handed to every `process` hook
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NotInitialized`] before initialization, or the
    /// first storage error hit while draining. Overflow rows are merged
    /// even when the tick fails.
    pub fn process(&mut self, delta: f32) -> EcsResult<()> {
        self.world.ensure_initialized()?;
        self.world.set_processing(true);
        let outcome = self.tick(delta);
        self.world.set_processing(false);
        let merged = self.world.finalize();
        outcome?;
        merged.map(drop)
    }

    /// Runs a single system without draining the lifecycle queues.
    ///
    /// Passive systems may be run this way.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NotInitialized`] or [`EcsError::InvalidSystem`].
    pub fn process_system(&mut self, system: SystemId, delta: f32) -> EcsResult<()> {
        self.world.ensure_initialized()?;
        let Self { world, systems, .. } = self;
        let entry = systems
            .get_mut(system.index() as usize)
            .ok_or(EcsError::InvalidSystem(system))?;

        world.set_processing(true);
        entry.run(world, delta);
        world.set_processing(false);
        world.finalize().map(drop)
    }

    fn tick(&mut self, delta: f32) -> EcsResult<()> {
        self.drain()?;
        let Self { world, systems, .. } = self;
        for system in systems.iter_mut().filter(|s| !s.is_passive()) {
            system.run(world, delta);
        }
        Ok(())
    }

    /// Drains the four lifecycle queues in order.
    ///
    /// Each queue is detached while it is drained; signals raised by hooks
    /// meanwhile are kept for the next drain of their queue.
    fn drain(&mut self) -> EcsResult<()> {
        let mut drained = [0usize; 4];
        for (count, signal) in drained.iter_mut().zip(Signal::DRAIN_ORDER) {
            let queue = self.world.take_signals(signal);
            *count = queue.len();
            let outcome = queue
                .iter()
                .try_for_each(|index| self.apply(signal, Entity::new(index)));
            self.world.restore_signals(signal, queue);
            outcome?;
        }

        if drained.iter().any(|&n| n > 0) {
            tracing::debug!(
                "Drained signals: {} added, {} enabled, {} disabled, {} deleted",
                drained[0],
                drained[1],
                drained[2],
                drained[3]
            );
        }
        Ok(())
    }

    fn apply(&mut self, signal: Signal, entity: Entity) -> EcsResult<()> {
        let Self {
            world,
            systems,
            managers,
            ..
        } = self;
        match signal {
            Signal::Added => {}
            Signal::Enabled => {
                for system in systems.iter_mut() {
                    system.check(world, entity)?;
                }
            }
            Signal::Disabled | Signal::Deleted => {
                for system in systems.iter_mut() {
                    system.unsubscribe(world, entity);
                }
            }
        }

        for manager in managers.iter_mut() {
            manager.notify(world, entity, signal);
        }

        match signal {
            Signal::Added => Ok(()),
            Signal::Enabled => world.activate(entity),
            Signal::Disabled => {
                world.deactivate(entity);
                Ok(())
            }
            Signal::Deleted => world.release_entity(entity),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("world", &self.world)
            .field("systems", &self.systems.len())
            .field("managers", &self.managers.len())
            .finish()
    }
}
