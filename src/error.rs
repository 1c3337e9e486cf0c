//! Error types for the receipt binder library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the receipt binder library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raster decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Extension is neither PDF nor a supported raster format
    #[error("Unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Password-protected PDF
    #[error("PDF is encrypted: {}", .0.display())]
    Encrypted(PathBuf),

    /// Page size that cannot carry an overlay
    #[error("Invalid page geometry: {width} x {height}")]
    InvalidGeometry { width: f32, height: f32 },

    /// Page (and its ancestors) declare no MediaBox
    #[error("Page has no MediaBox")]
    MissingMediaBox,

    /// General error
    #[error("{0}")]
    General(String),
}
