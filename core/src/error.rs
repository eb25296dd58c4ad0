//! Error type shared by the backend manager and converter implementations.

use thiserror::Error;

/// Errors surfaced by the backend layer.
///
/// Directory-creation failures and "context not created yet" are *not*
/// errors here: the former degrades to running without a user directory and
/// the latter is reported as `false` from `apply_configuration`.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error ({kind}) at {path}: {message}")]
    Io {
        kind: std::io::ErrorKind,
        path: String,
        message: String,
    },

    #[error("failed to encode or decode user history: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("converter library error during {operation}: {details}")]
    Library {
        operation: &'static str,
        details: String,
    },
}

impl BackendError {
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn library(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Library {
            operation,
            details: details.into(),
        }
    }
}

impl From<bincode::Error> for BackendError {
    fn from(err: bincode::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BackendError {
    fn from(err: toml::de::Error) -> Self {
        BackendError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BackendError {
    fn from(err: toml::ser::Error) -> Self {
        BackendError::Config(err.to_string())
    }
}
