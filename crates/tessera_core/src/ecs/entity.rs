//! # Handles
//!
//! Entities are plain row indices. Registry handles index the component,
//! system and manager tables in registration order.

use std::fmt;

/// Handle to one row of the entity table.
///
/// Carries no data itself. An index is reused only after the entity has
/// been deleted and its row cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Creates an entity handle from a row index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the row index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

macro_rules! registry_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Creates a handle from a registration index.
            #[inline]
            #[must_use]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Returns the registration index.
            #[inline]
            #[must_use]
            pub const fn index(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

registry_id!(
    /// Handle to a registered component type.
    ComponentId
);

registry_id!(
    /// Handle to a registered system.
    SystemId
);

registry_id!(
    /// Handle to a registered manager.
    ManagerId
);
