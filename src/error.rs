//! Error types for segpdf.

use std::io;
use thiserror::Error;

/// Result type alias for segpdf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading, decoding or assembling pages.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialisation error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// A caller supplied argument is out of range (e.g. page number).
    #[error("{0}")]
    InvalidArgument(String),

    /// Operation issued against an unloaded or never loaded document.
    #[error("{0}")]
    State(String),

    /// The engine refused to load the document.
    #[error("Failed to load document: {0}")]
    Load(String),

    /// The engine returned no record for a requested page.
    #[error("Failed to decode page: {0}")]
    Decode(String),

    /// Engine output omits a substructure the request implied must exist.
    #[error("Engine contract violation: {0}")]
    ContractViolation(String),
}

impl Error {
    /// Page number outside `[1, max]`.
    pub fn page_out_of_range(page_no: usize, key: &str, max: usize) -> Self {
        Error::InvalidArgument(format!(
            "incorrect page_no: {} for key={} (min:1, max:{})",
            page_no, key, max
        ))
    }

    pub fn not_loaded(key: &str) -> Self {
        Error::State(format!("document with key={} is not loaded", key))
    }

    pub(crate) fn missing(what: &str) -> Self {
        Error::ContractViolation(format!("missing `{}` in engine output", what))
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::PdfParse(err.to_string()),
        }
    }
}
