//! # Systems
//!
//! A system watches a set of components and excludes another. An entity is
//! subscribed when its presence bitset carries every watched component and
//! none of the excluded ones; the match is re-evaluated each time the
//! entity's enable signal is drained.

use std::ops::BitOr;

use super::entity::Entity;
use super::world::World;
use crate::collections::{test_bit, SparseSet};
use crate::error::EcsResult;

/// Behaviour hooks of a system. Every hook defaults to a no-op.
///
/// Hooks receive the [`World`] so they can read and write components,
/// spawn entities and raise signals. Spawns and signals are buffered until
/// the tick finishes.
pub trait System {
    /// Runs once before the system iterates its subscribers.
    fn starting(&mut self, _world: &mut World) {}

    /// Runs once per subscribed entity.
    fn process(&mut self, _world: &mut World, _entity: Entity, _delta: f32) {}

    /// Runs once after the system iterated its subscribers.
    fn ending(&mut self, _world: &mut World) {}

    /// An entity started matching this system.
    fn subscribed(&mut self, _world: &mut World, _entity: Entity) {}

    /// An entity stopped matching this system.
    fn unsubscribed(&mut self, _world: &mut World, _entity: Entity) {}
}

/// Registration flags for systems.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SystemFlags(u32);

impl SystemFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Skipped by the full tick; only runs through a manual system run.
    pub const PASSIVE: Self = Self(1);

    /// Checks whether every flag in `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SystemFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

pub(crate) struct SystemEntry {
    pub name: String,
    pub flags: SystemFlags,
    pub watch: SparseSet,
    pub exclude: SparseSet,
    pub entities: SparseSet,
    pub hooks: Box<dyn System>,
}

impl SystemEntry {
    pub(crate) fn new(name: String, hooks: Box<dyn System>, flags: SystemFlags) -> Self {
        Self {
            name,
            flags,
            watch: SparseSet::new(),
            exclude: SparseSet::new(),
            entities: SparseSet::new(),
            hooks,
        }
    }

    #[inline]
    pub(crate) fn is_passive(&self) -> bool {
        self.flags.contains(SystemFlags::PASSIVE)
    }

    /// Matches a presence bitset against the watch and exclude sets.
    pub(crate) fn wants(&self, presence: &[u8]) -> bool {
        self.watch.iter().all(|c| test_bit(presence, c))
            && !self.exclude.iter().any(|c| test_bit(presence, c))
    }

    /// Subscribes or unsubscribes `entity` according to its current row.
    pub(crate) fn check(&mut self, world: &mut World, entity: Entity) -> EcsResult<()> {
        let wanted = world.presence(entity).is_some_and(|p| self.wants(p));
        if wanted {
            self.subscribe(world, entity)
        } else {
            self.unsubscribe(world, entity);
            Ok(())
        }
    }

    fn subscribe(&mut self, world: &mut World, entity: Entity) -> EcsResult<()> {
        if !self.entities.insert(entity.index())? {
            tracing::trace!("Entity {} subscribed to system '{}'", entity, self.name);
            self.hooks.subscribed(world, entity);
        }
        Ok(())
    }

    pub(crate) fn unsubscribe(&mut self, world: &mut World, entity: Entity) {
        if self.entities.remove(entity.index()) {
            tracing::trace!("Entity {} unsubscribed from system '{}'", entity, self.name);
            self.hooks.unsubscribed(world, entity);
        }
    }

    /// Runs `starting`, `process` for every subscriber, then `ending`.
    pub(crate) fn run(&mut self, world: &mut World, delta: f32) {
        self.hooks.starting(world);
        for index in self.entities.iter() {
            self.hooks.process(world, Entity::new(index), delta);
        }
        self.hooks.ending(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;
    impl System for Idle {}

    fn entry(watch: &[u32], exclude: &[u32]) -> SystemEntry {
        let mut entry = SystemEntry::new("idle".into(), Box::new(Idle), SystemFlags::NONE);
        for &c in watch {
            entry.watch.insert(c).unwrap();
        }
        for &c in exclude {
            entry.exclude.insert(c).unwrap();
        }
        entry
    }

    #[test]
    fn test_wants_watch_and_exclude() {
        let entry = entry(&[0, 2], &[9]);
        assert!(entry.wants(&[0b0000_0101, 0]));
        assert!(entry.wants(&[0b0000_0111, 0]));
        assert!(!entry.wants(&[0b0000_0001, 0]));
        assert!(!entry.wants(&[0b0000_0101, 0b10]));
    }

    #[test]
    fn test_empty_filter_wants_everything() {
        assert!(entry(&[], &[]).wants(&[]));
    }

    #[test]
    fn test_flags() {
        let flags = SystemFlags::NONE | SystemFlags::PASSIVE;
        assert!(flags.contains(SystemFlags::PASSIVE));
        assert!(!SystemFlags::NONE.contains(SystemFlags::PASSIVE));
        assert!(SystemFlags::PASSIVE.contains(SystemFlags::NONE));
    }
}
