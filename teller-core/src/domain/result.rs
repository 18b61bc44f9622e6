//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    /// A precondition checked before any side effect failed. Never audited.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The actor may not run a money-outbound operation. Always audited as a denial.
    #[error("Unauthorized operation: {0}")]
    Unauthorized(String),

    /// Login failed. Unknown user and wrong password are deliberately the same
    /// error; the audit trail keeps them apart.
    #[error("Unknown user or bad password")]
    UnknownIdentityOrCredential,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A system identity the bank relies on (e.g. the interest authority) is missing
    #[error("Missing system identity: {0}")]
    MissingIdentity(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    /// Whether the ops layer may reasonably retry the whole call.
    ///
    /// Nothing in the core retries on its own; only storage faults are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
