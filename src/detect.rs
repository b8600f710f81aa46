//! PDF header detection.
//!
//! Engines call into this before handing bytes to the PDF parser, so that
//! obviously foreign inputs fail fast with a load error.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Version found in the `%PDF-x.y` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// e.g. "1.7", "2.0"
    pub version: String,
    /// Offset of the `%` of the header; non-zero when junk precedes it.
    pub header_offset: usize,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3;
/// Readers accept the header anywhere in the first KiB.
const HEADER_WINDOW: usize = 1024;

/// Detect the PDF header of a file.
///
/// # Example
/// ```no_run
/// use segpdf::detect::detect_format_from_path;
///
/// let format = detect_format_from_path("document.pdf")?;
/// println!("PDF version: {}", format.version);
/// # Ok::<(), segpdf::Error>(())
/// ```
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PdfFormat> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(HEADER_WINDOW + PDF_MAGIC.len() + VERSION_LEN);
    file.take((HEADER_WINDOW + PDF_MAGIC.len() + VERSION_LEN) as u64)
        .read_to_end(&mut head)?;
    detect_format_from_bytes(&head)
}

/// Detect the PDF header in the leading bytes of a document.
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    let window = &data[..data.len().min(HEADER_WINDOW + PDF_MAGIC.len() + VERSION_LEN)];
    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .filter(|&p| p <= HEADER_WINDOW)
        .ok_or(Error::UnknownFormat)?;

    let start = offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(start..start + VERSION_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    Ok(PdfFormat {
        version,
        header_offset: offset,
    })
}

fn is_valid_version(version: &str) -> bool {
    let b = version.as_bytes();
    b.len() == 3 && matches!(b[0], b'1' | b'2') && b[1] == b'.' && b[2].is_ascii_digit()
}

pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    detect_format_from_path(path).is_ok()
}

pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}
