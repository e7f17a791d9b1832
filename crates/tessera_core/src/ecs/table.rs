//! # Entity Table
//!
//! Row-major byte storage, one fixed-width row per entity:
//!
//! ```text
//! ┌──────────────────┬────────────┬────────────┬─────┐
//! │ presence bitset  │ component 0│ component 1│ ... │
//! └──────────────────┴────────────┴────────────┴─────┘
//! ```
//!
//! Outside a tick the main buffer grows in place. During a tick it must not
//! move, so rows spawned past its capacity go to an overflow list and are
//! merged back by [`EntityTable::finalize`].

use super::entity::Entity;
use crate::collections::{grown_capacity, SparseSet};
use crate::error::EcsResult;
use crate::memory::Allocator;

/// Row storage plus entity id allocation.
#[derive(Debug, Default)]
pub struct EntityTable {
    /// Bytes per row.
    row_width: usize,
    /// Main buffer, `capacity * row_width` bytes.
    rows: Vec<u8>,
    /// Rows allocated in the main buffer.
    capacity: u32,
    /// Ids handed out so far; every id below this has a row.
    height: u32,
    /// Rows for ids `overflow_base..height` spawned during a tick.
    overflow: Vec<Box<[u8]>>,
    /// Main capacity when the first pending overflow row was pushed.
    overflow_base: u32,
    /// Ids released by deletion, reused before new ids.
    free_ids: SparseSet,
}

impl EntityTable {
    /// Creates an empty table with rows of `row_width` bytes.
    #[must_use]
    pub const fn new(row_width: usize) -> Self {
        Self {
            row_width,
            rows: Vec::new(),
            capacity: 0,
            height: 0,
            overflow: Vec::new(),
            overflow_base: 0,
            free_ids: SparseSet::new(),
        }
    }

    /// Bytes per row.
    #[inline]
    #[must_use]
    pub const fn row_width(&self) -> usize {
        self.row_width
    }

    /// Rows allocated in the main buffer.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of ids ever handed out (live, pending or freed).
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Rows waiting in the overflow buffer.
    #[inline]
    #[must_use]
    pub fn overflow_len(&self) -> usize {
        self.overflow.len()
    }

    /// Ids waiting for reuse.
    #[inline]
    #[must_use]
    pub fn free_len(&self) -> usize {
        self.free_ids.len()
    }

    /// Checks whether `entity` has a row.
    #[inline]
    #[must_use]
    pub const fn contains(&self, entity: Entity) -> bool {
        entity.index() < self.height
    }

    /// Bytes charged to the allocator for rows.
    #[inline]
    #[must_use]
    pub(crate) fn charged_bytes(&self) -> usize {
        (self.capacity as usize + self.overflow.len()) * self.row_width
    }

    /// Grows the main buffer to hold at least `rows` rows.
    ///
    /// Pending overflow rows are merged first, so ids keep addressing the
    /// same bytes across the growth.
    ///
    /// # Errors
    ///
    /// Returns an out-of-memory error if the merge or the growth is refused.
    /// Rows and ids stay addressable either way.
    pub fn reserve(&mut self, rows: u32, allocator: &mut dyn Allocator) -> EcsResult<()> {
        self.finalize(allocator)?;
        self.grow(rows, allocator)
    }

    fn grow(&mut self, rows: u32, allocator: &mut dyn Allocator) -> EcsResult<()> {
        if rows <= self.capacity {
            return Ok(());
        }
        let extra = (rows - self.capacity) as usize * self.row_width;
        allocator.allocate(extra)?;
        if let Err(err) = self.rows.try_reserve_exact(extra) {
            allocator.release(extra);
            return Err(err.into());
        }
        self.rows.resize(rows as usize * self.row_width, 0);
        self.capacity = rows;
        Ok(())
    }

    /// Hands out an entity id with a zeroed row.
    ///
    /// Freed ids are reused first, most recently freed first. A new id that
    /// falls past the main buffer grows it by `1.5×`, unless `processing`
    /// is set, in which case the row is appended to the overflow buffer.
    /// Outside a tick, rows left pending by an earlier failed merge are
    /// merged before the main buffer grows.
    ///
    /// # Errors
    ///
    /// Returns an out-of-memory error if the row cannot be allocated. No id
    /// is consumed in that case.
    pub fn spawn(&mut self, processing: bool, allocator: &mut dyn Allocator) -> EcsResult<Entity> {
        if let Some(index) = self.free_ids.pop() {
            return Ok(Entity::new(index));
        }

        let index = self.height;
        let overflow = index >= self.capacity && processing;
        if overflow {
            self.push_overflow(allocator)?;
        } else if index >= self.capacity || !self.overflow.is_empty() {
            self.finalize(allocator)?;
            if index >= self.capacity {
                let rows = grown_capacity(index as usize) as u32;
                self.grow(rows, allocator)?;
            }
        }
        self.height += 1;

        tracing::trace!(
            "Spawned entity #{} ({})",
            index,
            if overflow { "overflow" } else { "main" }
        );
        Ok(Entity::new(index))
    }

    fn push_overflow(&mut self, allocator: &mut dyn Allocator) -> EcsResult<()> {
        allocator.allocate(self.row_width)?;
        if let Err(err) = self.overflow.try_reserve(1) {
            allocator.release(self.row_width);
            return Err(err.into());
        }
        if self.overflow.is_empty() {
            self.overflow_base = self.capacity;
        }
        self.overflow.push(vec![0; self.row_width].into_boxed_slice());
        Ok(())
    }

    /// Moves overflow rows into the main buffer, growing it if needed.
    ///
    /// # Returns
    ///
    /// Number of rows merged; zero when there was nothing to do.
    ///
    /// # Errors
    ///
    /// Returns an out-of-memory error if the main buffer cannot grow. The
    /// overflow rows stay where they are and remain addressable.
    pub fn finalize(&mut self, allocator: &mut dyn Allocator) -> EcsResult<usize> {
        if self.overflow.is_empty() {
            return Ok(0);
        }

        let base = self.overflow_base as usize;
        let merged = self.overflow.len();
        let needed = self.overflow_base + merged as u32;
        if needed > self.capacity {
            let rows = grown_capacity(needed as usize - 1) as u32;
            self.grow(rows, allocator)?;
        }

        for (offset, row) in self.overflow.drain(..).enumerate() {
            let start = (base + offset) * self.row_width;
            self.rows[start..start + self.row_width].copy_from_slice(&row);
        }
        allocator.release(merged * self.row_width);

        tracing::debug!(
            "Merged {} overflow rows into entity table (capacity {})",
            merged,
            self.capacity
        );
        Ok(merged)
    }

    /// Zeroes `entity`'s row and queues its id for reuse.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Reserve`](crate::EcsError::Reserve) if the free
    /// list cannot grow.
    pub fn release(&mut self, entity: Entity) -> EcsResult<()> {
        if let Some(row) = self.row_mut(entity) {
            row.fill(0);
        }
        self.free_ids.insert(entity.index())?;
        Ok(())
    }

    /// Bytes of `entity`'s row, wherever it currently lives.
    #[must_use]
    pub fn row(&self, entity: Entity) -> Option<&[u8]> {
        if !self.contains(entity) {
            return None;
        }
        let index = entity.index();
        if let Some(slot) = self.overflow_slot(index) {
            self.overflow.get(slot).map(|row| &row[..])
        } else {
            let start = index as usize * self.row_width;
            self.rows.get(start..start + self.row_width)
        }
    }

    /// Position in the overflow buffer of the row for id `index`, if any.
    fn overflow_slot(&self, index: u32) -> Option<usize> {
        if !self.overflow.is_empty() && index >= self.overflow_base {
            Some((index - self.overflow_base) as usize)
        } else {
            None
        }
    }

    /// Mutable bytes of `entity`'s row, wherever it currently lives.
    pub fn row_mut(&mut self, entity: Entity) -> Option<&mut [u8]> {
        if !self.contains(entity) {
            return None;
        }
        let index = entity.index();
        if let Some(slot) = self.overflow_slot(index) {
            self.overflow.get_mut(slot).map(|row| &mut row[..])
        } else {
            let start = index as usize * self.row_width;
            self.rows.get_mut(start..start + self.row_width)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BudgetAllocator, SystemAllocator};

    fn spawn(table: &mut EntityTable, processing: bool) -> Entity {
        table.spawn(processing, &mut SystemAllocator).unwrap()
    }

    #[test]
    fn test_sequential_ids_and_growth() {
        let mut table = EntityTable::new(4);
        let ids: Vec<u32> = (0..4).map(|_| spawn(&mut table, false).index()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(table.height(), 4);
        // 1 -> 3 -> 6
        assert_eq!(table.capacity(), 6);
        assert!(table.row(Entity::new(3)).unwrap().iter().all(|&b| b == 0));
        assert!(table.row(Entity::new(4)).is_none());
    }

    #[test]
    fn test_released_ids_reused_lifo() {
        let mut table = EntityTable::new(2);
        for _ in 0..3 {
            spawn(&mut table, false);
        }
        table.row_mut(Entity::new(1)).unwrap().copy_from_slice(&[7, 7]);
        table.release(Entity::new(1)).unwrap();
        table.release(Entity::new(2)).unwrap();

        assert_eq!(spawn(&mut table, false).index(), 2);
        let reused = spawn(&mut table, false);
        assert_eq!(reused.index(), 1);
        assert_eq!(table.row(reused).unwrap(), &[0, 0]);
        assert_eq!(spawn(&mut table, false).index(), 3);
    }

    #[test]
    fn test_processing_spawns_go_to_overflow() {
        let mut table = EntityTable::new(3);
        spawn(&mut table, false);
        assert_eq!(table.capacity(), 1);
        table.row_mut(Entity::new(0)).unwrap().copy_from_slice(&[1, 2, 3]);

        let a = spawn(&mut table, true);
        let b = spawn(&mut table, true);
        assert_eq!(table.capacity(), 1);
        assert_eq!(table.overflow_len(), 2);
        table.row_mut(a).unwrap().copy_from_slice(&[4, 4, 4]);
        table.row_mut(b).unwrap().copy_from_slice(&[5, 5, 5]);

        assert_eq!(table.finalize(&mut SystemAllocator).unwrap(), 2);
        assert_eq!(table.overflow_len(), 0);
        assert!(table.capacity() >= 3);
        assert_eq!(table.row(Entity::new(0)).unwrap(), &[1, 2, 3]);
        assert_eq!(table.row(a).unwrap(), &[4, 4, 4]);
        assert_eq!(table.row(b).unwrap(), &[5, 5, 5]);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut table = EntityTable::new(1);
        spawn(&mut table, true);
        assert_eq!(table.finalize(&mut SystemAllocator).unwrap(), 1);
        let capacity = table.capacity();
        assert_eq!(table.finalize(&mut SystemAllocator).unwrap(), 0);
        assert_eq!(table.capacity(), capacity);
    }

    #[test]
    fn test_processing_spawn_within_capacity_stays_in_main() {
        let mut table = EntityTable::new(1);
        table.reserve(8, &mut SystemAllocator).unwrap();
        spawn(&mut table, true);
        assert_eq!(table.overflow_len(), 0);
    }

    #[test]
    fn test_refused_growth_consumes_no_id() {
        let budget = BudgetAllocator::new(4);
        let mut alloc = budget.clone();
        let mut table = EntityTable::new(4);

        assert_eq!(table.spawn(false, &mut alloc).unwrap().index(), 0);
        assert!(table.spawn(false, &mut alloc).is_err());
        assert_eq!(table.height(), 1);
        assert_eq!(budget.in_use(), 4);
        assert_eq!(table.charged_bytes(), 4);
    }

    #[test]
    fn test_reserve_merges_pending_rows_first() {
        let mut table = EntityTable::new(2);
        spawn(&mut table, false);
        let late = spawn(&mut table, true);
        table.row_mut(late).unwrap().copy_from_slice(&[7, 7]);

        table.reserve(64, &mut SystemAllocator).unwrap();
        assert_eq!(table.overflow_len(), 0);
        assert_eq!(table.capacity(), 64);
        assert_eq!(table.row(late).unwrap(), &[7, 7]);
        assert_eq!(spawn(&mut table, true).index(), 2);
        assert_eq!(table.overflow_len(), 0);
    }

    #[test]
    fn test_spawn_after_failed_merge() {
        let budget = BudgetAllocator::new(8);
        let mut alloc = budget.clone();
        let mut table = EntityTable::new(4);
        table.spawn(false, &mut alloc).unwrap();
        let a = table.spawn(true, &mut alloc).unwrap();
        table.row_mut(a).unwrap().copy_from_slice(&[1, 2, 3, 4]);

        // Growing to 3 rows needs 8 more bytes than the budget holds.
        assert!(table.finalize(&mut alloc).is_err());
        assert!(table.spawn(false, &mut alloc).is_err());
        assert_eq!(table.height(), 2);
        assert_eq!(table.overflow_len(), 1);
        assert_eq!(table.row(a).unwrap(), &[1, 2, 3, 4]);

        let b = spawn(&mut table, false);
        assert_eq!(b.index(), 2);
        assert_eq!(table.overflow_len(), 0);
        assert_eq!(table.row(a).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(table.row(b).unwrap(), &[0; 4]);
    }
}
