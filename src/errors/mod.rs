//! # Error Handling
//!
//! Error types for the Flowplane snapshot sanitization pipeline, defined with
//! `thiserror`. Configuration errors are fatal and surface at startup; the
//! remaining variants are per-cycle and leave the last good snapshot in place.

/// Custom result type for sanitizer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the sanitization pipeline
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors (invalid policy values, unparseable settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Field-level validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A sanitizer in the chain failed for this cycle
    #[error("Sanitizer '{sanitizer}' failed: {message}")]
    Sanitizer { sanitizer: &'static str, message: String },

    /// The snapshot contains references that do not resolve within it
    #[error("Inconsistent snapshot: {0}")]
    InconsistentSnapshot(String),

    /// Service discovery errors
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Failure decoding a typed protobuf payload
    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new sanitizer error attributed to the named sanitizer
    pub fn sanitizer<S: Into<String>>(sanitizer: &'static str, message: S) -> Self {
        Self::Sanitizer { sanitizer, message: message.into() }
    }

    /// Create a new inconsistent snapshot error
    pub fn inconsistent<S: Into<String>>(message: S) -> Self {
        Self::InconsistentSnapshot(message.into())
    }

    /// Create a new discovery error
    pub fn discovery<S: Into<String>>(message: S) -> Self {
        Self::Discovery(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Configuration errors block startup; everything else only fails the current cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Validation(_) | Error::Yaml(_))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
