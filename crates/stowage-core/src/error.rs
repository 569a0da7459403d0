//! Error types for stowage.
//!
//! A cache miss is never an error: lookups report it as `None` and deletions
//! as `false`. The variants here cover the conditions a caller must be able to
//! tell apart from a miss, namely a broken storage layer, a missing host
//! capability, or a bad argument at the report layer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the stowage library.
#[derive(Debug, Error)]
pub enum StowageError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Unwritable cache folder: {path}")]
    UnwritableFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Host capability errors
    #[error("Unsupported by the shared store: {capability}")]
    Unsupported { capability: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Report layer errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for stowage operations.
pub type Result<T> = std::result::Result<T, StowageError>;

impl From<std::io::Error> for StowageError {
    fn from(err: std::io::Error) -> Self {
        StowageError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for StowageError {
    fn from(err: serde_json::Error) -> Self {
        StowageError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl StowageError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        StowageError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a capability error for a missing shared-store feature.
    pub fn unsupported(capability: impl Into<String>) -> Self {
        StowageError::Unsupported {
            capability: capability.into(),
        }
    }

    /// Process exit status for the command line front end.
    ///
    /// - 2: invalid argument given by the operator
    /// - 1: any other failure
    pub fn exit_code(&self) -> i32 {
        match self {
            StowageError::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}
