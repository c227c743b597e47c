use std::path::PathBuf;

use thiserror::Error;

use crate::status::StatusCode;

/// Errors raised by the TiXI binding
///
/// `InvalidArgument`, `MissingHandle` and `AlreadyBound` are local precondition
/// failures: they are detected before any native call and never change the
/// document's last error. `Native` carries the status a native call returned.
#[derive(Error, Debug)]
pub enum TixiError {
    #[error("{operation}: invalid argument `{argument}` ({reason})")]
    InvalidArgument {
        operation: &'static str,
        argument: &'static str,
        reason: &'static str,
    },

    #[error("{operation}: no document handle (open or import a document first)")]
    MissingHandle { operation: &'static str },

    #[error("{operation}: a document is already bound to this instance")]
    AlreadyBound { operation: &'static str },

    #[error("{operation} failed with native status {status}")]
    Native {
        operation: &'static str,
        status: StatusCode,
    },

    #[error("Failed to load native library {library}: {details}")]
    LibraryLoad { library: String, details: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TixiError {
    /// True when the failure was caught before reaching the native library
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            TixiError::InvalidArgument { .. }
                | TixiError::MissingHandle { .. }
                | TixiError::AlreadyBound { .. }
        )
    }

    /// Native status carried by this error, if it came from a native call
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TixiError::Native { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Configuration-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for convenience
pub type TixiResult<T> = std::result::Result<T, TixiError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
