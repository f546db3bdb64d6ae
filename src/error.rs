//! Error types for schema migration

use serde::Serialize;
use thiserror::Error;

use crate::registry::RegistryError;

/// Result type for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Schema migration errors
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Invalid configuration for '{key}': {reason}")]
    Configuration { key: String, reason: String },

    #[error("Failed to parse schema '{source_id}': {message}")]
    Parse { source_id: String, message: String },

    #[error("Failed to read schema '{source_id}': {message}")]
    ReadSource { source_id: String, message: String },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrationError {
    /// Build a configuration error naming the offending setting
    pub fn configuration(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must stop the run before any registry call
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Config(_))
    }

    /// Coarse classification used in outcome reports
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } | Self::Config(_) => ErrorKind::Configuration,
            Self::Parse { .. } | Self::Json(_) => ErrorKind::Parse,
            Self::ReadSource { .. } | Self::Io(_) => ErrorKind::Io,
            Self::Registry(_) => ErrorKind::Transport,
        }
    }
}

/// Error category attached to a failed outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Parse,
    Io,
    Transport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_names_key() {
        let err = MigrationError::configuration("registry.url", "missing");
        assert!(err.is_fatal());
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("registry.url"));
    }

    #[test]
    fn test_registry_error_is_transport() {
        let err: MigrationError = RegistryError::Decode("bad body".to_string()).into();
        assert!(!err.is_fatal());
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
