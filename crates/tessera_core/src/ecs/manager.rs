//! # Managers
//!
//! Lifecycle observers with no component filter. Every manager sees every
//! drained signal, in registration order.

use super::entity::Entity;
use super::signal::Signal;
use super::world::World;

/// Lifecycle hooks of a manager. Every hook defaults to a no-op.
pub trait Manager {
    /// An added signal was drained for `entity`.
    fn added(&mut self, _world: &mut World, _entity: Entity) {}

    /// An enabled signal was drained; `entity` is about to become active.
    fn enabled(&mut self, _world: &mut World, _entity: Entity) {}

    /// A disabled signal was drained; `entity` is about to become inactive.
    fn disabled(&mut self, _world: &mut World, _entity: Entity) {}

    /// A deleted signal was drained; `entity`'s components are about to be
    /// released and its id recycled.
    fn deleted(&mut self, _world: &mut World, _entity: Entity) {}
}

pub(crate) struct ManagerEntry {
    pub name: String,
    pub hooks: Box<dyn Manager>,
}

impl ManagerEntry {
    pub(crate) fn notify(&mut self, world: &mut World, entity: Entity, signal: Signal) {
        match signal {
            Signal::Added => self.hooks.added(world, entity),
            Signal::Enabled => self.hooks.enabled(world, entity),
            Signal::Disabled => self.hooks.disabled(world, entity),
            Signal::Deleted => self.hooks.deleted(world, entity),
        }
    }
}
