//! Shared error type across meterline crates.

use thiserror::Error;

/// Stable error categories (used in logs and by tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration or constructor arguments.
    Config,
    /// Filesystem or socket failure.
    Io,
    /// Operation not valid in the current lifecycle state.
    InvalidState,
    /// Statistics could not be encoded.
    Encode,
}

impl ErrorKind {
    /// String representation used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "CONFIG",
            ErrorKind::Io => "IO",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::Encode => "ENCODE",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MeterError>;

/// Unified error type used by core and reporter.
#[derive(Debug, Error)]
pub enum MeterError {
    #[error("config: {0}")]
    Config(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("encode: {0}")]
    Encode(String),
}

impl MeterError {
    /// Map the error to its stable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeterError::Config(_) => ErrorKind::Config,
            MeterError::Io(_) => ErrorKind::Io,
            MeterError::InvalidState(_) => ErrorKind::InvalidState,
            MeterError::Encode(_) => ErrorKind::Encode,
        }
    }
}

impl From<serde_json::Error> for MeterError {
    fn from(e: serde_json::Error) -> Self {
        MeterError::Encode(e.to_string())
    }
}
