//! Error types for Viarte.

use thiserror::Error;

/// Main error type for Viarte operations.
#[derive(Error, Debug)]
pub enum ViarteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A codec or device configuration the runtime cannot honour.
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfig(String),

    /// An operation was issued in a lifecycle state that does not allow it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Viarte operations.
pub type Result<T> = std::result::Result<T, ViarteError>;
