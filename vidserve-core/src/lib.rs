//! Vidserve Core - Range-request media streaming
//!
//! This crate provides the building blocks for serving large media files
//! over HTTP with byte-range support: category-scoped path resolution,
//! `Range` header parsing and validation, a pull-driven chunked body
//! stream, CSV-backed user and measurement records, and configuration
//! management.

pub mod config;
pub mod media;
pub mod range;
pub mod records;
pub mod streaming;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{ConfigError, VidserveConfig};
pub use media::{MediaCategory, MediaFile, MediaLibrary, ResolveError};
pub use range::{ByteRange, RangeError, RangeSpec};
pub use records::{RecordError, RecordService, RecordStore};
pub use streaming::{
    ChunkStream, MediaResponse, MediaService, RangeStreamingEngine, StreamChunk, StreamingError,
};

/// Core errors that can bubble up from any Vidserve subsystem.
#[derive(Debug, thiserror::Error)]
pub enum VidserveError {
    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VidserveError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            VidserveError::Streaming(e) => e.client_message().to_string(),
            VidserveError::Resolve(ResolveError::CategoryNotFound { category }) => {
                format!("Unknown category: {category}")
            }
            VidserveError::Resolve(ResolveError::DirectoryNotFound { category, path }) => {
                format!(
                    "Directory for category {category} does not exist: {}",
                    path.display()
                )
            }
            VidserveError::Resolve(_) => "Media lookup failed".to_string(),
            VidserveError::Configuration(e) => format!("Invalid configuration: {e}"),
            VidserveError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            VidserveError::Configuration(_)
                | VidserveError::Resolve(ResolveError::CategoryNotFound { .. })
                | VidserveError::Streaming(StreamingError::Range(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, VidserveError>;
