//! Error type definitions for the avatar service

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the avatar engine
///
/// Validation variants are raised before anything is written to disk.
/// `NotFound` never reaches a client: the thumbnail cache turns it into the
/// default avatar fallback.
#[derive(Error, Debug)]
pub enum AvatarError {
    /// Email address does not have the `local@domain.tld` shape
    #[error("Invalid email address: {address:?}")]
    InvalidAddress { address: String },

    /// Identifier is not 32 characters of `[a-zA-Z0-9_-]`
    #[error("Invalid fingerprint: {value:?}")]
    InvalidFingerprint { value: String },

    /// Requested thumbnail size is outside 1..=512
    #[error("Invalid size: {size}")]
    InvalidSize { size: i64 },

    /// Uploaded payload exceeds the upload limit
    #[error("Payload too large: {size} bytes (max: {max_size})")]
    PayloadTooLarge { size: usize, max_size: usize },

    /// Payload could not be decoded as one of the supported image formats
    #[error("Unsupported image format: {message}")]
    UnsupportedFormat { message: String },

    /// No original stored for this fingerprint
    #[error("No original stored for {fingerprint}")]
    NotFound { fingerprint: String },

    /// Filesystem failure while reading, writing or creating directories
    #[error("Storage I/O error at {}: {source}", path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image codec failed to encode a resized image
    #[error("Failed to encode {format} image: {message}")]
    Encode { format: String, message: String },

    /// A blocking codec task panicked or was cancelled
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// I/O errors outside the avatar store (config files, sockets)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AvatarError {
    /// Create a storage error for the given path
    pub fn storage<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::StorageIo {
            path: path.into(),
            source,
        }
    }

    /// Create an unsupported format error
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::UnsupportedFormat {
            message: message.into(),
        }
    }

    /// Whether the error was caused by the caller's input rather than the server
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. }
                | Self::InvalidFingerprint { .. }
                | Self::InvalidSize { .. }
                | Self::PayloadTooLarge { .. }
                | Self::UnsupportedFormat { .. }
        )
    }
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
