//! Index lists for multi-valued components.
//!
//! Each entity carrying a multi-valued component owns one bag: an ordered
//! list of pool slots. A row stores only the bag's handle and length.

use super::allocator::Allocator;
use super::pool::SlotIndex;
use crate::collections::SparseSet;
use crate::error::EcsResult;

/// Bytes charged per bag entry.
const ENTRY_BYTES: usize = std::mem::size_of::<u32>();

/// Handle to a bag. Zero is reserved for "no bag" so a zeroed row is empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BagHandle(u32);

impl BagHandle {
    #[inline]
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub(crate) const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    const fn slot(self) -> usize {
        self.0 as usize - 1
    }
}

/// Recycling store of bags for one component.
#[derive(Debug, Default)]
pub(crate) struct BagArena {
    bags: Vec<Vec<u32>>,
    /// Closed bags, by position in `bags`.
    free: SparseSet,
    /// Entries across all bags.
    entries: usize,
}

impl BagArena {
    pub(crate) const fn new() -> Self {
        Self {
            bags: Vec::new(),
            free: SparseSet::new(),
            entries: 0,
        }
    }

    /// Opens an empty bag.
    pub(crate) fn open(&mut self) -> EcsResult<BagHandle> {
        if let Some(slot) = self.free.pop() {
            return Ok(BagHandle(slot + 1));
        }
        self.bags.try_reserve(1)?;
        self.bags.push(Vec::new());
        Ok(BagHandle(self.bags.len() as u32))
    }

    /// Slots held by `bag`, in append order.
    pub(crate) fn get(&self, bag: BagHandle) -> &[u32] {
        &self.bags[bag.slot()]
    }

    /// Appends a slot to `bag`.
    pub(crate) fn push(
        &mut self,
        bag: BagHandle,
        slot: SlotIndex,
        allocator: &mut dyn Allocator,
    ) -> EcsResult<()> {
        allocator.allocate(ENTRY_BYTES)?;
        let entries = &mut self.bags[bag.slot()];
        if let Err(err) = entries.try_reserve(1) {
            allocator.release(ENTRY_BYTES);
            return Err(err.into());
        }
        entries.push(slot.index());
        self.entries += 1;
        Ok(())
    }

    /// Removes entry `index`, shifting later entries down by one.
    pub(crate) fn remove(
        &mut self,
        bag: BagHandle,
        index: usize,
        allocator: &mut dyn Allocator,
    ) -> SlotIndex {
        let slot = self.bags[bag.slot()].remove(index);
        self.entries -= 1;
        allocator.release(ENTRY_BYTES);
        SlotIndex::new(slot)
    }

    /// Empties `bag` and recycles it, returning the slots it held.
    pub(crate) fn close(
        &mut self,
        bag: BagHandle,
        allocator: &mut dyn Allocator,
    ) -> EcsResult<Vec<u32>> {
        self.free.insert(bag.raw() - 1)?;
        let slots = std::mem::take(&mut self.bags[bag.slot()]);
        self.entries -= slots.len();
        allocator.release(slots.len() * ENTRY_BYTES);
        Ok(slots)
    }

    pub(crate) const fn charged_bytes(&self) -> usize {
        self.entries * ENTRY_BYTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SystemAllocator;

    fn filled(arena: &mut BagArena, slots: &[u32]) -> BagHandle {
        let bag = arena.open().unwrap();
        for &slot in slots {
            arena.push(bag, SlotIndex::new(slot), &mut SystemAllocator).unwrap();
        }
        bag
    }

    #[test]
    fn test_handles_are_never_zero() {
        let mut arena = BagArena::new();
        let bag = arena.open().unwrap();
        assert!(!bag.is_none());
        assert!(BagHandle::from_raw(0).is_none());
        assert_eq!(BagHandle::from_raw(bag.raw()), bag);
    }

    #[test]
    fn test_remove_compacts_in_order() {
        let mut arena = BagArena::new();
        let bag = filled(&mut arena, &[10, 11, 12, 13, 14]);

        // Removing from the middle must shift exactly one entry's worth.
        assert_eq!(arena.remove(bag, 1, &mut SystemAllocator).index(), 11);
        assert_eq!(arena.get(bag), &[10, 12, 13, 14]);
        assert_eq!(arena.remove(bag, 3, &mut SystemAllocator).index(), 14);
        assert_eq!(arena.remove(bag, 0, &mut SystemAllocator).index(), 10);
        assert_eq!(arena.get(bag), &[12, 13]);
    }

    #[test]
    fn test_close_recycles_bag() {
        let mut arena = BagArena::new();
        let bag = filled(&mut arena, &[1, 2]);
        assert_eq!(arena.charged_bytes(), 8);

        assert_eq!(arena.close(bag, &mut SystemAllocator).unwrap(), vec![1, 2]);
        assert_eq!(arena.charged_bytes(), 0);

        let reopened = arena.open().unwrap();
        assert_eq!(reopened, bag);
        assert!(arena.get(reopened).is_empty());
    }
}
