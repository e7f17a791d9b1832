//! # Tessera Core
//!
//! Embeddable entity-component-system storage engine:
//! - Entities are integer ids over a single row-major byte table
//! - Components are opaque byte blocks, stored inline or in pools
//! - Lifecycle transitions are buffered and applied once per tick
//! - Every allocation is charged to an injectable [`Allocator`]
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{ComponentDesc, Engine, Signal, Storage};
//!
//! let mut engine = Engine::new();
//! let health = engine
//!     .create_component(ComponentDesc::of::<u32>("health", Storage::Inline))
//!     .unwrap();
//! engine.initialize().unwrap();
//!
//! let world = engine.world_mut();
//! let player = world.spawn().unwrap();
//! world.set(player, health, &100u32).unwrap();
//! world.signal(player, Signal::Added).unwrap();
//!
//! engine.process(1.0 / 60.0).unwrap();
//! assert!(engine.world().is_active(player));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod collections;
pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use collections::{BitSet, SparseSet};
pub use config::EcsConfig;
pub use ecs::{
    ComponentDesc, ComponentId, Engine, Entity, EntityTable, Manager, ManagerId, Signal,
    SignalQueue, Storage, System, SystemFlags, SystemId, World,
};
pub use error::{EcsError, EcsResult, ErrorKind};
pub use memory::{Allocator, BudgetAllocator, ComponentPool, PoolStats, SlotIndex, SystemAllocator};
