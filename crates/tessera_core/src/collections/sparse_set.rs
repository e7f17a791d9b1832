//! Sparse integer set with a packed member list.

use super::grown_capacity;
use crate::error::EcsResult;

/// Set of `u32` values backed by a sparse/dense index pair.
///
/// `dense[..population]` holds the members in insertion order (until a
/// removal swaps the last member into the hole); `sparse[v]` points back
/// into `dense`. Clearing only resets the population, so the backing
/// arrays are never touched again until they need to grow.
///
/// # Example
///
/// ```rust
/// use tessera_core::SparseSet;
///
/// let mut set = SparseSet::new();
/// assert!(!set.insert(4).unwrap());
/// assert!(set.insert(4).unwrap());
/// assert_eq!(set.pop(), Some(4));
/// assert!(set.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct SparseSet {
    /// Members, packed at the front.
    dense: Vec<u32>,
    /// Value -> position in `dense`. Stale entries are harmless.
    sparse: Vec<u32>,
    /// Number of live members.
    population: u32,
}

impl SparseSet {
    /// Creates an empty set without allocating.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dense: Vec::new(),
            sparse: Vec::new(),
            population: 0,
        }
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.population as usize
    }

    /// Returns `true` if the set has no members.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.population == 0
    }

    /// Largest value + 1 the set can hold without growing.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sparse.len()
    }

    /// Checks membership.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: u32) -> bool {
        match self.sparse.get(value as usize) {
            Some(&slot) => slot < self.population && self.dense[slot as usize] == value,
            None => false,
        }
    }

    /// Inserts `value`, growing the backing arrays to `1.5 × (value + 1)`
    /// when it does not fit.
    ///
    /// # Returns
    ///
    /// `true` if the value was already present.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Reserve`](crate::EcsError::Reserve) if the arrays
    /// cannot grow. The set is unchanged in that case.
    pub fn insert(&mut self, value: u32) -> EcsResult<bool> {
        if value as usize >= self.sparse.len() {
            self.grow(value as usize)?;
        }
        if self.contains(value) {
            return Ok(true);
        }
        let slot = self.population;
        self.sparse[value as usize] = slot;
        self.dense[slot as usize] = value;
        self.population = slot + 1;
        Ok(false)
    }

    /// Removes `value`, moving the last member into its place.
    ///
    /// # Returns
    ///
    /// `true` if the value was present.
    pub fn remove(&mut self, value: u32) -> bool {
        if !self.contains(value) {
            return false;
        }
        let slot = self.sparse[value as usize];
        let last = self.population - 1;
        let moved = self.dense[last as usize];
        self.dense[slot as usize] = moved;
        self.sparse[moved as usize] = slot;
        self.population = last;
        true
    }

    /// Removes and returns the most recently packed member.
    pub fn pop(&mut self) -> Option<u32> {
        if self.population == 0 {
            return None;
        }
        self.population -= 1;
        Some(self.dense[self.population as usize])
    }

    /// Forgets every member. Backing storage is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.population = 0;
    }

    /// Members in packed order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.dense[..self.population as usize]
    }

    /// Iterates over the members in packed order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.as_slice().iter().copied()
    }

    fn grow(&mut self, value: usize) -> EcsResult<()> {
        let capacity = grown_capacity(value);
        let extra = capacity - self.sparse.len();
        self.dense.try_reserve_exact(extra)?;
        self.sparse.try_reserve_exact(extra)?;
        self.dense.resize(capacity, 0);
        self.sparse.resize(capacity, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    #[test]
    fn test_insert_is_idempotent() {
        let mut set = SparseSet::new();
        assert!(!set.insert(3).unwrap());
        assert!(set.insert(3).unwrap());
        assert_eq!(set.len(), 1);
        assert!(set.contains(3));
        assert!(!set.contains(2));
        assert!(!set.contains(100));
    }

    #[test]
    fn test_growth_rule() {
        let mut set = SparseSet::new();
        set.insert(9).unwrap();
        assert_eq!(set.capacity(), 15);
        set.insert(14).unwrap();
        assert_eq!(set.capacity(), 15);
        set.insert(15).unwrap();
        assert_eq!(set.capacity(), 24);
        assert!(set.contains(9) && set.contains(14) && set.contains(15));
    }

    #[test]
    fn test_remove_swaps_last_into_hole() {
        let mut set = SparseSet::new();
        for v in [5, 6, 7] {
            set.insert(v).unwrap();
        }
        assert!(set.remove(5));
        assert!(!set.remove(5));
        assert_eq!(set.as_slice(), &[7, 6]);
        assert!(set.contains(7) && set.contains(6));
    }

    #[test]
    fn test_pop_is_lifo() {
        let mut set = SparseSet::new();
        for v in [1, 2, 3] {
            set.insert(v).unwrap();
        }
        assert_eq!(set.pop(), Some(3));
        assert_eq!(set.pop(), Some(2));
        assert_eq!(set.pop(), Some(1));
        assert_eq!(set.pop(), None);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut set = SparseSet::new();
        for v in 0..10 {
            set.insert(v).unwrap();
        }
        let capacity = set.capacity();
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.capacity(), capacity);
        assert!(!set.contains(4));
        assert_eq!(set.iter().count(), 0);
    }

    #[test]
    fn test_matches_reference_set() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
        let mut set = SparseSet::new();
        let mut reference = BTreeSet::new();

        for _ in 0..5_000 {
            let value = rng.gen_range(0..200u32);
            match rng.gen_range(0..3) {
                0 => {
                    let was = set.insert(value).unwrap();
                    assert_eq!(was, !reference.insert(value));
                }
                1 => {
                    assert_eq!(set.remove(value), reference.remove(&value));
                }
                _ => {
                    if let Some(popped) = set.pop() {
                        assert!(reference.remove(&popped));
                    } else {
                        assert!(reference.is_empty());
                    }
                }
            }
        }

        assert_eq!(set.len(), reference.len());
        let visited: BTreeSet<u32> = set.iter().collect();
        assert_eq!(visited.len(), set.len());
        assert_eq!(visited, reference);
    }
}
