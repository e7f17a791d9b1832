//! # Component Descriptors
//!
//! A component is registered as a named block of bytes with a storage
//! strategy. Element contents are opaque to the world; the typed helpers on
//! [`World`](super::World) use [`bytemuck::Pod`] to move values in and out.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::entity::ComponentId;
use crate::error::{EcsError, EcsResult};
use crate::memory::{Allocator, BagArena, BagHandle, ComponentPool, SlotIndex};

/// Where a component's elements live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    /// Element bytes embedded in the entity row.
    #[default]
    Inline,
    /// Row holds a 4-byte slot index into the component's pool.
    Indexed,
    /// Row holds a bag header; zero or more pooled elements per entity.
    Multiple,
}

impl Storage {
    /// Bytes this strategy occupies in every row.
    #[inline]
    #[must_use]
    pub const fn row_bytes(self, element_size: usize) -> usize {
        match self {
            Self::Inline => element_size,
            Self::Indexed => std::mem::size_of::<u32>(),
            Self::Multiple => std::mem::size_of::<BagHeader>(),
        }
    }

    /// Returns `true` for strategies backed by a pool.
    #[inline]
    #[must_use]
    pub const fn is_pooled(self) -> bool {
        !matches!(self, Self::Inline)
    }
}

/// Registration request for a component type.
///
/// # Example
///
/// ```rust
/// use tessera_core::{ComponentDesc, Storage};
///
/// let hits = ComponentDesc::of::<u32>("hits", Storage::Multiple).limited(64);
/// assert_eq!(hits.size, 4);
/// assert_eq!(hits.limit, Some(64));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDesc {
    /// Human-readable name.
    pub name: String,
    /// Element size in bytes.
    pub size: usize,
    /// Storage strategy.
    #[serde(default)]
    pub storage: Storage,
    /// Pool capacity cap. Only valid for pooled strategies.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ComponentDesc {
    /// Describes a component of `size` bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, size: usize, storage: Storage) -> Self {
        Self {
            name: name.into(),
            size,
            storage,
            limit: None,
        }
    }

    /// Describes an inline component.
    #[must_use]
    pub fn inline(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, size, Storage::Inline)
    }

    /// Describes a pooled, single-valued component.
    #[must_use]
    pub fn indexed(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, size, Storage::Indexed)
    }

    /// Describes a pooled, multi-valued component.
    #[must_use]
    pub fn multiple(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, size, Storage::Multiple)
    }

    /// Describes a component sized for `T`.
    #[must_use]
    pub fn of<T: Pod>(name: impl Into<String>, storage: Storage) -> Self {
        Self::new(name, std::mem::size_of::<T>(), storage)
    }

    /// Caps the pool at `limit` elements.
    #[must_use]
    pub fn limited(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn validate(&self) -> EcsResult<()> {
        if self.limit.is_some() && !self.storage.is_pooled() {
            return Err(EcsError::InvalidDescriptor(format!(
                "inline component '{}' cannot be capacity-limited",
                self.name
            )));
        }
        Ok(())
    }
}

/// Row header of a multi-valued component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct BagHeader {
    /// Number of elements in the bag.
    pub count: u32,
    /// Raw [`BagHandle`]; zero when empty.
    pub bag: u32,
}

impl BagHeader {
    const SIZE: usize = std::mem::size_of::<Self>();

    #[inline]
    pub(crate) fn read(row: &[u8], offset: usize) -> Self {
        bytemuck::pod_read_unaligned(&row[offset..offset + Self::SIZE])
    }

    #[inline]
    pub(crate) fn write(self, row: &mut [u8], offset: usize) {
        row[offset..offset + Self::SIZE].copy_from_slice(bytemuck::bytes_of(&self));
    }

    #[inline]
    pub(crate) const fn handle(self) -> BagHandle {
        BagHandle::from_raw(self.bag)
    }
}

/// Reads the pool slot stored in an indexed component's row region.
#[inline]
pub(crate) fn read_slot(row: &[u8], offset: usize) -> SlotIndex {
    SlotIndex::new(bytemuck::pod_read_unaligned(&row[offset..offset + 4]))
}

/// Stores a pool slot in an indexed component's row region.
#[inline]
pub(crate) fn write_slot(row: &mut [u8], offset: usize, slot: SlotIndex) {
    row[offset..offset + 4].copy_from_slice(&slot.index().to_ne_bytes());
}

/// Element storage behind a component.
#[derive(Debug)]
pub(crate) enum Backing {
    Inline,
    Indexed(ComponentPool),
    Multiple { pool: ComponentPool, bags: BagArena },
}

/// Registered component: descriptor, row placement and backing storage.
#[derive(Debug)]
pub(crate) struct ComponentInfo {
    pub desc: ComponentDesc,
    /// Byte offset within a row, including the presence bitset once the
    /// world is initialized.
    pub offset: usize,
    pub backing: Backing,
}

impl ComponentInfo {
    pub(crate) fn new(
        id: ComponentId,
        desc: ComponentDesc,
        offset: usize,
        allocator: &mut dyn Allocator,
    ) -> EcsResult<Self> {
        desc.validate()?;
        let backing = match desc.storage {
            Storage::Inline => Backing::Inline,
            Storage::Indexed => Backing::Indexed(Self::pool_for(id, &desc, allocator)?),
            Storage::Multiple => Backing::Multiple {
                pool: Self::pool_for(id, &desc, allocator)?,
                bags: BagArena::new(),
            },
        };
        Ok(Self {
            desc,
            offset,
            backing,
        })
    }

    fn pool_for(
        id: ComponentId,
        desc: &ComponentDesc,
        allocator: &mut dyn Allocator,
    ) -> EcsResult<ComponentPool> {
        match desc.limit {
            Some(limit) => ComponentPool::limited(id, desc.size, limit, allocator),
            None => Ok(ComponentPool::new(id, desc.size)),
        }
    }

    #[inline]
    pub(crate) fn row_bytes(&self) -> usize {
        self.desc.storage.row_bytes(self.desc.size)
    }

    pub(crate) fn pool(&self) -> Option<&ComponentPool> {
        match &self.backing {
            Backing::Inline => None,
            Backing::Indexed(pool) | Backing::Multiple { pool, .. } => Some(pool),
        }
    }

    pub(crate) fn charged_bytes(&self) -> usize {
        match &self.backing {
            Backing::Inline => 0,
            Backing::Indexed(pool) => pool.charged_bytes(),
            Backing::Multiple { pool, bags } => pool.charged_bytes() + bags.charged_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SystemAllocator;

    #[test]
    fn test_row_bytes() {
        assert_eq!(Storage::Inline.row_bytes(12), 12);
        assert_eq!(Storage::Indexed.row_bytes(12), 4);
        assert_eq!(Storage::Multiple.row_bytes(12), 8);
        assert_eq!(std::mem::size_of::<BagHeader>(), 8);
    }

    #[test]
    fn test_inline_cannot_be_limited() {
        let desc = ComponentDesc::inline("position", 12).limited(4);
        let err = ComponentInfo::new(ComponentId::new(0), desc, 0, &mut SystemAllocator)
            .unwrap_err();
        assert!(matches!(err, EcsError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_pooled_info_has_storage() {
        let info = ComponentInfo::new(
            ComponentId::new(1),
            ComponentDesc::multiple("tags", 2).limited(3),
            0,
            &mut SystemAllocator,
        )
        .unwrap();
        assert_eq!(info.pool().unwrap().limit(), Some(3));
        assert!(matches!(info.backing, Backing::Multiple { .. }));
        assert_eq!(info.charged_bytes(), 6);
    }

    #[test]
    fn test_row_codecs() {
        let mut row = [0u8; 16];
        write_slot(&mut row, 3, SlotIndex::new(0xABCD));
        assert_eq!(read_slot(&row, 3), SlotIndex::new(0xABCD));

        let header = BagHeader { count: 2, bag: 7 };
        header.write(&mut row, 8);
        assert_eq!(BagHeader::read(&row, 8), header);
        assert_eq!(header.handle().raw(), 7);
    }

    #[test]
    fn test_desc_from_toml() {
        let desc: ComponentDesc =
            toml::from_str("name = \"ammo\"\nsize = 4\nstorage = \"indexed\"\nlimit = 16\n")
                .unwrap();
        assert_eq!(desc, ComponentDesc::indexed("ammo", 4).limited(16));
    }
}
