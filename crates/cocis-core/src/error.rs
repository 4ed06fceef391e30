//! Error types for COCIS Core
//!
//! [`CocisError`] wraps the construction taxonomy together with the failures
//! of the ambient layers:
//! - configuration loading and parsing
//! - file I/O
//! - report serialization

use cocis_types::{ConstructionError, ErrorKind};
use std::path::Path;

/// Main COCIS error type
#[derive(Debug, thiserror::Error)]
pub enum CocisError {
    /// A factory, builder, cache or guard operation failed
    #[error("construction failed: {0}")]
    Construction(#[from] ConstructionError),

    /// Configuration could not be parsed or applied
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O failed
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CocisError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Create an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn invalid_config(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Config(format!("{}: {reason}", path.display()))
    }

    /// Construction error kind, if this wraps one
    #[inline]
    #[must_use]
    pub fn construction_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Construction(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for CocisError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for CocisError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CocisError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for COCIS Core operations
pub type CocisResult<T> = Result<T, CocisError>;
