//! # Component Pool
//!
//! Fixed-size slot allocator for pooled component storage.

use super::allocator::Allocator;
use crate::collections::SparseSet;
use crate::ecs::ComponentId;
use crate::error::{EcsError, EcsResult};

/// Handle to a slot in a [`ComponentPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SlotIndex(u32);

impl SlotIndex {
    /// Wraps a raw slot index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Occupancy snapshot of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Slots handed out and not yet released.
    pub live: u32,
    /// Slots waiting on the free list.
    pub free: u32,
    /// Slots ever created (`live + free`).
    pub capacity: u32,
    /// Hard cap for limited pools.
    pub limit: Option<u32>,
}

/// Slot storage for one pooled component type.
///
/// Slots live back to back in a single byte buffer. Released slots go onto
/// a [`SparseSet`] free list and are handed out again before the buffer
/// grows. The buffer never shrinks.
///
/// Free slots and live slots always partition `[0, capacity)`.
#[derive(Debug)]
pub struct ComponentPool {
    /// Owning component, for error reporting.
    component: ComponentId,
    /// Bytes per slot.
    element_size: usize,
    /// `capacity * element_size` bytes.
    data: Vec<u8>,
    /// Released slot indices.
    free: SparseSet,
    /// Number of slots ever created.
    capacity: u32,
    /// Hard cap; the whole cap is reserved up front.
    limit: Option<u32>,
}

impl ComponentPool {
    /// Creates an empty, growable pool.
    #[must_use]
    pub const fn new(component: ComponentId, element_size: usize) -> Self {
        Self {
            component,
            element_size,
            data: Vec::new(),
            free: SparseSet::new(),
            capacity: 0,
            limit: None,
        }
    }

    /// Creates a pool capped at `limit` slots, reserving all of them now.
    ///
    /// Slots are handed out in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an out-of-memory error if the allocator refuses the
    /// reservation or the buffer cannot be reserved.
    pub fn limited(
        component: ComponentId,
        element_size: usize,
        limit: u32,
        allocator: &mut dyn Allocator,
    ) -> EcsResult<Self> {
        let bytes = element_size * limit as usize;
        allocator.allocate(bytes)?;

        let mut pool = Self::new(component, element_size);
        pool.limit = Some(limit);
        let reserved = pool.reserve_limited(bytes, limit);
        if let Err(err) = reserved {
            allocator.release(bytes);
            return Err(err);
        }
        Ok(pool)
    }

    fn reserve_limited(&mut self, bytes: usize, limit: u32) -> EcsResult<()> {
        self.data.try_reserve_exact(bytes)?;
        self.data.resize(bytes, 0);
        for index in (0..limit).rev() {
            self.free.insert(index)?;
        }
        self.capacity = limit;
        Ok(())
    }

    /// Bytes per slot.
    #[inline]
    #[must_use]
    pub const fn element_size(&self) -> usize {
        self.element_size
    }

    /// Slots ever created.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Hard cap, if any.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Number of slots currently handed out.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> u32 {
        self.capacity - self.free.len() as u32
    }

    /// Checks whether `slot` is on the free list.
    #[inline]
    #[must_use]
    pub fn is_free(&self, slot: SlotIndex) -> bool {
        self.free.contains(slot.0)
    }

    /// Occupancy snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live: self.live_count(),
            free: self.free.len() as u32,
            capacity: self.capacity,
            limit: self.limit,
        }
    }

    /// Bytes charged to the allocator for this pool.
    #[inline]
    #[must_use]
    pub(crate) const fn charged_bytes(&self) -> usize {
        self.capacity as usize * self.element_size
    }

    /// Hands out a zeroed slot.
    ///
    /// Reuses the most recently released slot if there is one; otherwise
    /// grows the buffer by one slot.
    ///
    /// # Errors
    ///
    /// - [`EcsError::FullComponent`] if the pool is limited and exhausted
    /// - an out-of-memory error if growth is refused
    pub fn acquire(&mut self, allocator: &mut dyn Allocator) -> EcsResult<SlotIndex> {
        if let Some(index) = self.free.pop() {
            let slot = SlotIndex(index);
            self.slot_mut(slot).fill(0);
            return Ok(slot);
        }

        if let Some(limit) = self.limit {
            tracing::warn!("Component {} pool exhausted at {} slots", self.component, limit);
            return Err(EcsError::FullComponent {
                component: self.component,
                limit,
            });
        }

        allocator.allocate(self.element_size)?;
        if let Err(err) = self.data.try_reserve(self.element_size) {
            allocator.release(self.element_size);
            return Err(err.into());
        }
        self.data.resize(self.data.len() + self.element_size, 0);

        let slot = SlotIndex(self.capacity);
        self.capacity += 1;
        Ok(slot)
    }

    /// Returns `slot` to the free list.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Reserve`] if the free list cannot grow.
    pub fn release(&mut self, slot: SlotIndex) -> EcsResult<()> {
        debug_assert!(slot.0 < self.capacity, "slot outside pool");
        self.free.insert(slot.0)?;
        Ok(())
    }

    /// Bytes of a slot.
    #[inline]
    #[must_use]
    pub fn slot(&self, slot: SlotIndex) -> &[u8] {
        let start = slot.0 as usize * self.element_size;
        &self.data[start..start + self.element_size]
    }

    /// Mutable bytes of a slot.
    #[inline]
    pub fn slot_mut(&mut self, slot: SlotIndex) -> &mut [u8] {
        let start = slot.0 as usize * self.element_size;
        &mut self.data[start..start + self.element_size]
    }
}
