//! Error types for the viewer.
//!
//! Load and runtime failures are recovered locally and surfaced through the
//! notification bus; only configuration mistakes are fatal and returned
//! synchronously from construction.

use thiserror::Error;

/// Result type for viewer operations.
pub type ViewerResult<T> = Result<T, ViewerError>;

/// Errors raised by the viewer and its engines.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// A specific model or image asset could not be decoded. Sibling loads
    /// continue; the message is also published on the load-failure channel.
    #[error("failed to load model asset: {0}")]
    AssetLoad(String),

    /// Texture replacement was requested but the model carries no material
    /// whose name contains the placeholder marker. Aborts only the
    /// replacement step for that model.
    #[error("no placeholder texture slot found in model \"{0}\"")]
    MissingTextureSlot(String),

    /// The active engine lacks the requested capability.
    #[error("{operation} is not supported by the {engine} engine")]
    Unsupported {
        operation: String,
        engine: &'static str,
    },

    /// A required construction parameter is missing.
    #[error("configuration error: {0}")]
    Configuration(String),
}
