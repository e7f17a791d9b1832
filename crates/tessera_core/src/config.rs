//! # Configuration
//!
//! Component layouts can be declared in TOML and loaded once at startup:
//!
//! ```toml
//! initial_entity_capacity = 1024
//!
//! [[components]]
//! name = "position"
//! size = 12
//!
//! [[components]]
//! name = "inventory"
//! size = 8
//! storage = "multiple"
//! limit = 4096
//! ```
//!
//! `storage` defaults to `inline`; `limit` is only accepted for pooled
//! storage.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::ComponentDesc;
use crate::error::{EcsError, EcsResult};

/// Startup configuration for an [`Engine`](crate::Engine).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcsConfig {
    /// Rows reserved when the engine is initialized.
    pub initial_entity_capacity: u32,
    /// Components registered in order; ids follow list position.
    pub components: Vec<ComponentDesc>,
}

impl EcsConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the text is not valid TOML or
    /// does not match the schema.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the file cannot be read or
    /// parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            EcsError::InvalidConfig(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Storage;

    #[test]
    fn test_parse_config() {
        let config = EcsConfig::from_toml_str(
            r#"
            initial_entity_capacity = 64

            [[components]]
            name = "position"
            size = 12

            [[components]]
            name = "hits"
            size = 4
            storage = "multiple"
            limit = 32
            "#,
        )
        .unwrap();

        assert_eq!(config.initial_entity_capacity, 64);
        assert_eq!(config.components.len(), 2);
        assert_eq!(config.components[0].storage, Storage::Inline);
        assert_eq!(
            config.components[1],
            ComponentDesc::multiple("hits", 4).limited(32)
        );
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(EcsConfig::from_toml_str("").unwrap(), EcsConfig::default());
    }

    #[test]
    fn test_bad_storage_is_invalid_config() {
        let err = EcsConfig::from_toml_str(
            "[[components]]\nname = \"x\"\nsize = 1\nstorage = \"sideways\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EcsConfig::from_toml_file("/nonexistent/tessera.toml").unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(msg) if msg.contains("tessera.toml")));
    }
}
