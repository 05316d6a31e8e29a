use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the photo-sorter library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding/encoding error
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Manifest or hash-record serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote catalog transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The on-disk layout violates the required folder convention
    #[error("Invalid structure: {0}")]
    Structure(String),

    /// Remote reconciliation could not be completed or verified
    #[error("Sync failed: {0}")]
    Sync(String),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}
