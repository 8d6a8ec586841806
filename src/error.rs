//! Custom error types for the cardscan library
//!
//! This module provides structured error handling for all identification
//! operations. Only catalog availability is a hard error surface; matching
//! quality failures resolve to a `None` identification plus diagnostics and
//! never travel through this type.

use thiserror::Error;

/// Main error type for the cardscan library
#[derive(Error, Debug)]
pub enum ScanError {
    /// The backing catalog or hash index could not be retrieved or parsed.
    /// Fatal for the scan attempt: no partial catalog is ever exposed.
    #[error("catalog unavailable: {message}")]
    CatalogUnavailable { message: String },

    /// Errors related to file I/O operations
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors related to the card-type keyword table
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Errors related to hex-encoded hash fields
    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Errors related to decoding source images for hashing
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Custom errors with context
    #[error("Error: {message}")]
    Custom { message: String },
}

impl ScanError {
    /// Create a catalog-unavailable error with a message
    pub fn catalog_unavailable<S: Into<String>>(message: S) -> Self {
        Self::CatalogUnavailable {
            message: message.into(),
        }
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }
}

/// Result type alias for cardscan operations
pub type ScanResult<T> = Result<T, ScanError>;
