//! # Lifecycle Signals
//!
//! Signals are buffered, never applied in place. Each kind has its own
//! queue; a tick drains them in the order added, enabled, disabled, deleted.
//!
//! | signal   | added  | enabled | disabled | deleted |
//! |----------|--------|---------|----------|---------|
//! | Added    | insert | insert  | remove   | remove  |
//! | Enabled  |        | insert  | remove   | remove  |
//! | Disabled |        | remove  | insert   | remove  |
//! | Deleted  | remove | remove  | insert   | insert  |

use super::entity::Entity;
use crate::collections::SparseSet;
use crate::error::{EcsError, EcsResult};

/// Lifecycle transition requested for an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Signal {
    /// Entity enters the world. Also queues [`Signal::Enabled`].
    Added = 0,
    /// Entity becomes active and is matched against systems.
    Enabled = 1,
    /// Entity becomes inactive and leaves every system.
    Disabled = 2,
    /// Entity is torn down and its id recycled. Also queues [`Signal::Disabled`].
    Deleted = 3,
}

impl Signal {
    /// All kinds, in drain order.
    pub const DRAIN_ORDER: [Self; 4] = [Self::Added, Self::Enabled, Self::Disabled, Self::Deleted];
}

impl TryFrom<u32> for Signal {
    type Error = EcsError;

    fn try_from(raw: u32) -> EcsResult<Self> {
        match raw {
            0 => Ok(Self::Added),
            1 => Ok(Self::Enabled),
            2 => Ok(Self::Disabled),
            3 => Ok(Self::Deleted),
            other => Err(EcsError::InvalidSignal(other)),
        }
    }
}

/// The four deferred lifecycle queues.
#[derive(Debug, Default)]
pub struct SignalQueue {
    added: SparseSet,
    enabled: SparseSet,
    disabled: SparseSet,
    deleted: SparseSet,
}

impl SignalQueue {
    /// Creates empty queues.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            added: SparseSet::new(),
            enabled: SparseSet::new(),
            disabled: SparseSet::new(),
            deleted: SparseSet::new(),
        }
    }

    /// Records `signal` for `entity` according to the transition table.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Reserve`] if a queue cannot grow.
    pub fn push(&mut self, entity: Entity, signal: Signal) -> EcsResult<()> {
        let index = entity.index();
        match signal {
            Signal::Added => {
                self.added.insert(index)?;
                self.enabled.insert(index)?;
                self.disabled.remove(index);
                self.deleted.remove(index);
            }
            Signal::Enabled => {
                self.enabled.insert(index)?;
                self.disabled.remove(index);
                self.deleted.remove(index);
            }
            Signal::Disabled => {
                self.enabled.remove(index);
                self.disabled.insert(index)?;
                self.deleted.remove(index);
            }
            Signal::Deleted => {
                self.added.remove(index);
                self.enabled.remove(index);
                self.disabled.insert(index)?;
                self.deleted.insert(index)?;
            }
        }
        Ok(())
    }

    /// Checks whether `entity` is waiting in the `signal` queue.
    #[must_use]
    pub fn is_pending(&self, entity: Entity, signal: Signal) -> bool {
        self.queue(signal).contains(entity.index())
    }

    /// Number of entities waiting in the `signal` queue.
    #[must_use]
    pub fn len(&self, signal: Signal) -> usize {
        self.queue(signal).len()
    }

    /// Returns `true` if every queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Signal::DRAIN_ORDER.iter().all(|&s| self.queue(s).is_empty())
    }

    /// Detaches the `signal` queue for draining, leaving an empty one behind
    /// to collect signals raised meanwhile.
    pub(crate) fn take(&mut self, signal: Signal) -> SparseSet {
        std::mem::take(self.queue_mut(signal))
    }

    /// Hands a drained queue back. Its storage is reused unless new signals
    /// arrived while it was detached.
    pub(crate) fn restore(&mut self, signal: Signal, mut drained: SparseSet) {
        drained.clear();
        let queue = self.queue_mut(signal);
        if queue.is_empty() {
            *queue = drained;
        }
    }

    const fn queue(&self, signal: Signal) -> &SparseSet {
        match signal {
            Signal::Added => &self.added,
            Signal::Enabled => &self.enabled,
            Signal::Disabled => &self.disabled,
            Signal::Deleted => &self.deleted,
        }
    }

    fn queue_mut(&mut self, signal: Signal) -> &mut SparseSet {
        match signal {
            Signal::Added => &mut self.added,
            Signal::Enabled => &mut self.enabled,
            Signal::Disabled => &mut self.disabled,
            Signal::Deleted => &mut self.deleted,
        }
    }
}
