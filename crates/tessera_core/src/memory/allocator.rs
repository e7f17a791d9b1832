//! # Allocator Collaborator
//!
//! The world charges every growth of row, pool and bag storage to an
//! [`Allocator`] before reserving it, and releases the same amounts when the
//! storage shrinks or the world is dropped. The host decides whether a
//! request is granted.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{EcsError, EcsResult};

/// Host-supplied gatekeeper for world storage.
pub trait Allocator {
    /// Requests `bytes` more bytes of storage.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::OutOfMemory`] to refuse the request.
    fn allocate(&mut self, bytes: usize) -> EcsResult<()>;

    /// Returns `bytes` previously granted by [`allocate`](Self::allocate).
    fn release(&mut self, bytes: usize);
}

/// Grants every request. Real failures still surface through `try_reserve`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    #[inline]
    fn allocate(&mut self, _bytes: usize) -> EcsResult<()> {
        Ok(())
    }

    #[inline]
    fn release(&mut self, _bytes: usize) {}
}

#[derive(Debug, Default)]
struct BudgetState {
    limit: usize,
    in_use: usize,
    peak: usize,
}

/// Allocator with a fixed byte budget.
///
/// Clones share the same counters, so the host can keep a handle to watch
/// usage while the world owns another.
///
/// # Example
///
/// ```rust
/// use tessera_core::{Allocator, BudgetAllocator};
///
/// let budget = BudgetAllocator::new(64);
/// let mut handle = budget.clone();
/// handle.allocate(48).unwrap();
/// assert!(handle.allocate(32).is_err());
/// assert_eq!(budget.in_use(), 48);
/// ```
#[derive(Clone, Debug, Default)]
pub struct BudgetAllocator {
    state: Arc<Mutex<BudgetState>>,
}

impl BudgetAllocator {
    /// Creates a budget of `limit` bytes.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BudgetState {
                limit,
                ..BudgetState::default()
            })),
        }
    }

    /// Budget size in bytes.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.state.lock().limit
    }

    /// Bytes currently granted.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    /// Highest value `in_use` has reached.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.state.lock().peak
    }

    /// Bytes still available.
    #[must_use]
    pub fn remaining(&self) -> usize {
        let state = self.state.lock();
        state.limit - state.in_use
    }
}

impl Allocator for BudgetAllocator {
    fn allocate(&mut self, bytes: usize) -> EcsResult<()> {
        let mut state = self.state.lock();
        match state.in_use.checked_add(bytes) {
            Some(total) if total <= state.limit => {
                state.in_use = total;
                state.peak = state.peak.max(total);
                Ok(())
            }
            _ => Err(EcsError::OutOfMemory { bytes }),
        }
    }

    fn release(&mut self, bytes: usize) {
        let mut state = self.state.lock();
        debug_assert!(bytes <= state.in_use, "released more than was granted");
        state.in_use = state.in_use.saturating_sub(bytes);
    }
}
