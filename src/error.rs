//! Error taxonomy for loading, merging and saving configuration.
//!
//! Only some of these are ever returned to the caller. Source, parse,
//! directive and include-cycle errors are collected into reports while the
//! cascade carries on; see [`ConfigError::is_recoverable`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while working with a configuration tree.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Read or delete of a key that is not present.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A file in the cascade could not be opened or read.
    #[error("cannot read {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A dotted path crosses a value that is not a mapping.
    #[error("'{0}' is not a mapping")]
    NotANode(String),

    /// A file was readable but its contents are not a valid document.
    #[error("cannot parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// YAML was requested but the crate was built without the `yaml` feature.
    #[error("YAML support is not available (built without the `yaml` feature)")]
    YamlUnsupported,

    /// A merge directive could not be applied to its target.
    #[error("cannot apply {directive} to '{path}': {reason}")]
    Directive {
        path: String,
        directive: &'static str,
        reason: String,
    },

    /// A file includes itself, directly or through other includes.
    #[error("include cycle through {}", .0.display())]
    IncludeCycle(PathBuf),

    /// The tree could not be serialized.
    #[error("cannot encode configuration: {0}")]
    Encode(String),

    /// Writing the configuration file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound(key.into())
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn directive(path: impl Into<String>, directive: &'static str, reason: impl Into<String>) -> Self {
        Self::Directive {
            path: path.into(),
            directive,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether loading or merging may skip past this error and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigError::SourceUnavailable { .. }
                | ConfigError::Parse { .. }
                | ConfigError::Directive { .. }
                | ConfigError::IncludeCycle(_)
        )
    }

    /// True for a source that simply does not exist, which is the normal
    /// case for most tiers of the cascade.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ConfigError::SourceUnavailable { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
