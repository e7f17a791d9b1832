//! # Integer Sets
//!
//! The two set primitives every other structure is built from.
//!
//! - [`SparseSet`]: O(1) insert/remove/pop, population tracking, O(1) clear.
//!   Free-id pools, free-slot pools, lifecycle queues and subscriber sets.
//! - [`BitSet`]: one bit per member. The active-entity set; the same bit
//!   helpers address the presence bitset embedded at the head of every row.

mod bitset;
mod sparse_set;

pub use bitset::BitSet;
pub(crate) use bitset::{clear_bit, set_bit, test_bit};
pub use sparse_set::SparseSet;

/// Capacity after growing to hold `index`: `1.5 × (index + 1)`.
#[inline]
#[must_use]
pub(crate) const fn grown_capacity(index: usize) -> usize {
    let needed = index + 1;
    let grown = needed + needed / 2;
    if grown > needed {
        grown
    } else {
        needed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grown_capacity() {
        assert_eq!(grown_capacity(0), 1);
        assert_eq!(grown_capacity(1), 3);
        assert_eq!(grown_capacity(9), 15);
    }
}
