//! Bit-packed integer set.
//!
//! The free functions operate on raw byte slices so the presence bitset at
//! the head of an entity row can be addressed in place.

use super::grown_capacity;
use crate::error::EcsResult;

/// Sets `bit`, returning its previous value.
#[inline]
pub(crate) fn set_bit(bytes: &mut [u8], bit: u32) -> bool {
    let (byte, mask) = locate(bit);
    let was = bytes[byte] & mask != 0;
    bytes[byte] |= mask;
    was
}

/// Tests `bit`.
#[inline]
pub(crate) fn test_bit(bytes: &[u8], bit: u32) -> bool {
    let (byte, mask) = locate(bit);
    bytes[byte] & mask != 0
}

/// Clears `bit`, returning its previous value.
#[inline]
pub(crate) fn clear_bit(bytes: &mut [u8], bit: u32) -> bool {
    let (byte, mask) = locate(bit);
    let was = bytes[byte] & mask != 0;
    bytes[byte] &= !mask;
    was
}

#[inline]
const fn locate(bit: u32) -> (usize, u8) {
    ((bit >> 3) as usize, 1 << (bit & 7))
}

/// Growable bitset of `u32` members.
///
/// Capacity is tracked in bits and grows by the same `1.5 × (i + 1)` rule
/// as [`SparseSet`](super::SparseSet).
#[derive(Clone, Debug, Default)]
pub struct BitSet {
    /// Packed bits, `(capacity + 7) / 8` bytes.
    bytes: Vec<u8>,
    /// Capacity in bits.
    capacity: usize,
}

impl BitSet {
    /// Creates an empty bitset without allocating.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            capacity: 0,
        }
    }

    /// Capacity in bits.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Checks membership.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: u32) -> bool {
        (value as usize) < self.capacity && test_bit(&self.bytes, value)
    }

    /// Inserts `value`, returning whether it was already present.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Reserve`](crate::EcsError::Reserve) if the bitset
    /// cannot grow.
    pub fn insert(&mut self, value: u32) -> EcsResult<bool> {
        if value as usize >= self.capacity {
            let capacity = grown_capacity(value as usize);
            let bytes = (capacity + 7) >> 3;
            self.bytes.try_reserve_exact(bytes - self.bytes.len())?;
            self.bytes.resize(bytes, 0);
            self.capacity = capacity;
        }
        Ok(set_bit(&mut self.bytes, value))
    }

    /// Removes `value`, returning whether it was present.
    pub fn remove(&mut self, value: u32) -> bool {
        (value as usize) < self.capacity && clear_bit(&mut self.bytes, value)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    /// Iterates over members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bytes.iter().enumerate().flat_map(|(byte, &bits)| {
            (0..8u32)
                .filter(move |bit| bits & (1 << bit) != 0)
                .map(move |bit| ((byte as u32) << 3) | bit)
        })
    }
}
