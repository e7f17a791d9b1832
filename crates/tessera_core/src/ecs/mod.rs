//! # Entity Component System
//!
//! Row-oriented ECS with deferred lifecycle transitions.
//!
//! ## Design
//!
//! - Every entity owns one fixed-width byte row: a presence bitset followed
//!   by one region per registered component
//! - Small components live inline; others live in pools and the row keeps
//!   a slot index or a bag header
//! - Lifecycle changes are queued as signals and applied at the start of
//!   the next tick, so no running system sees its subscriber set change
//! - Spawns during a tick go to an overflow buffer; the main table never
//!   moves while systems run

mod component;
mod engine;
mod entity;
mod manager;
mod signal;
mod system;
mod table;
mod world;

pub use component::{ComponentDesc, Storage};
pub use engine::Engine;
pub use entity::{ComponentId, Entity, ManagerId, SystemId};
pub use manager::Manager;
pub use signal::{Signal, SignalQueue};
pub use system::{System, SystemFlags};
pub use table::EntityTable;
pub use world::World;
