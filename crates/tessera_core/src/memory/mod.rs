//! # Memory Management
//!
//! Storage behind pooled components, and the allocator every growth is
//! charged to.
//!
//! ## Design Philosophy
//!
//! - Pools hand out fixed-size slots and recycle them through a free list
//! - Storage only grows; released slots wait for reuse
//! - Every byte the world keeps is granted by the host's [`Allocator`]

mod allocator;
mod bag;
mod pool;

pub use allocator::{Allocator, BudgetAllocator, SystemAllocator};
pub(crate) use bag::{BagArena, BagHandle};
pub use pool::{ComponentPool, PoolStats, SlotIndex};
