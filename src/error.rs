//! Error types for graph composition and live reloading.

use thiserror::Error;

/// Errors raised while composing, loading or hot-reloading a composition.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter failed validation (tempo, sequence, key lookup, constant).
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse composition: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to encode composition: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Reported by the external render engine.
    #[error("Render engine error: {0}")]
    Engine(String),
}

impl Error {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for validation failures raised by the composer itself.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Error::InvalidParameter { .. })
    }
}

/// Result type for sonograph operations
pub type Result<T> = std::result::Result<T, Error>;
