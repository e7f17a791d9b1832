//! # Error Types
//!
//! Every fallible operation in the crate returns [`EcsResult`]. Variants carry
//! enough context to diagnose the failure; [`EcsError::kind`] collapses them
//! into the four coarse categories callers usually branch on.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::ecs::{ComponentId, Entity, ManagerId, SystemId};

/// Coarse classification of an [`EcsError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The allocator refused a request, or a reservation failed.
    OutOfMemory,
    /// The call is not allowed in the current state of the world.
    InvalidOperation,
    /// An argument is out of range or malformed.
    InvalidValue,
    /// A capacity-limited pool has no free slot left.
    FullComponent,
}

/// Errors that can occur while registering, mutating or ticking a world.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The injected allocator refused to hand out more bytes.
    #[error("allocator refused {bytes} bytes")]
    OutOfMemory {
        /// Size of the refused request.
        bytes: usize,
    },

    /// A backing vector could not reserve room for growth.
    #[error("storage reservation failed: {0}")]
    Reserve(#[from] TryReserveError),

    /// Registration was attempted after `initialize`, or `initialize` ran twice.
    #[error("world is already initialized")]
    AlreadyInitialized,

    /// A runtime call was made before `initialize`.
    #[error("world is not initialized")]
    NotInitialized,

    /// The main entity table cannot be resized while a tick is running.
    #[error("entity table cannot be resized during a tick")]
    TickInProgress,

    /// Attempted to change the component set of an active entity.
    #[error("entity {entity} is active; component {component} cannot be attached or detached")]
    EntityActive {
        /// The active entity.
        entity: Entity,
        /// The component that was touched.
        component: ComponentId,
    },

    /// Entity handle outside the table.
    #[error("entity {0} is out of range")]
    InvalidEntity(Entity),

    /// Component id that was never registered.
    #[error("component {0} is not registered")]
    InvalidComponent(ComponentId),

    /// System id that was never registered.
    #[error("system {0} is not registered")]
    InvalidSystem(SystemId),

    /// Manager id that was never registered.
    #[error("manager {0} is not registered")]
    InvalidManager(ManagerId),

    /// Raw signal code that does not name a lifecycle transition.
    #[error("unknown signal kind {0}")]
    InvalidSignal(u32),

    /// Component descriptor that cannot be registered.
    #[error("invalid component descriptor: {0}")]
    InvalidDescriptor(String),

    /// Payload length differs from the registered element size.
    #[error("component {component} stores {expected} bytes, got {actual}")]
    SizeMismatch {
        /// The component written or read.
        component: ComponentId,
        /// Registered element size.
        expected: usize,
        /// Size of the supplied payload or type.
        actual: usize,
    },

    /// The entity does not carry the requested component instance.
    #[error("entity {entity} has no instance {index} of component {component}")]
    ComponentMissing {
        /// The queried entity.
        entity: Entity,
        /// The queried component.
        component: ComponentId,
        /// Requested instance index.
        index: u32,
    },

    /// A capacity-limited pool is exhausted.
    #[error("component {component} is full ({limit} slots)")]
    FullComponent {
        /// The exhausted component.
        component: ComponentId,
        /// Its configured capacity.
        limit: u32,
    },

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EcsError {
    /// Returns the coarse category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfMemory { .. } | Self::Reserve(_) => ErrorKind::OutOfMemory,
            Self::AlreadyInitialized
            | Self::NotInitialized
            | Self::TickInProgress
            | Self::EntityActive { .. } => ErrorKind::InvalidOperation,
            Self::FullComponent { .. } => ErrorKind::FullComponent,
            Self::InvalidEntity(_)
            | Self::InvalidComponent(_)
            | Self::InvalidSystem(_)
            | Self::InvalidManager(_)
            | Self::InvalidSignal(_)
            | Self::InvalidDescriptor(_)
            | Self::SizeMismatch { .. }
            | Self::ComponentMissing { .. }
            | Self::InvalidConfig(_) => ErrorKind::InvalidValue,
        }
    }
}

/// Result type for world operations.
pub type EcsResult<T> = Result<T, EcsError>;
