//! # segpdf
//!
//! Page-oriented PDF segmentation for Rust.
//!
//! Every page is turned into a [`SegmentedPage`]: positioned char, word and
//! text line cells, vector shapes and placed bitmaps, all in one canonical
//! model regardless of which decoding engine or pipeline produced them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use segpdf::{DecodeConfig, DecodeMode, DocumentParser, LoadOptions};
//!
//! fn main() -> segpdf::Result<()> {
//!     let parser = DocumentParser::new();
//!     let mut session = parser.open("paper.pdf")?;
//!
//!     for page in session.iterate_pages(DecodeMode::Structured, &DecodeConfig::default())? {
//!         let (page_no, page) = page?;
//!         println!("page {}: {} words", page_no, page.word_cells().len());
//!     }
//!
//!     if let Some(toc) = session.get_table_of_contents()? {
//!         for entry in toc.walk() {
//!             println!("{}{}", "  ".repeat(entry.level.unwrap_or(0) as usize), entry.title);
//!         }
//!     }
//!
//!     session.unload();
//!     Ok(())
//! }
//! ```
//!
//! ## Layers
//!
//! - **engine**: the [`PdfEngine`] boundary and the bundled [`LopdfEngine`]
//! - **assemble**: raw engine records into canonical pages, for both the
//!   structured and the serialized pipeline
//! - **segment**: word and line derivation when an engine gives only glyphs
//! - **parser**: [`DocumentParser`] and per-document [`DocumentSession`]s
//!   with a page cache, timings and document-level facts

pub mod assemble;
pub mod detect;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod segment;
pub mod timings;

pub use assemble::{Assembled, AssemblyReport, CellOrigin, PageAssembler};
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use engine::{EngineRegistry, EngineSource, LopdfEngine, PdfEngine, RawPage};
pub use error::{Error, Result};
pub use model::{
    BitmapImage, BitmapResource, BoundaryType, BoundingBox, BoundingRectangle, Coord2D,
    CoordOrigin, DocumentAnnotations, ImagePlacement, PageBoxes, PageGeometry, PdfMetadata,
    SegmentedPage, Shape, ShapeStyle, TextCell, TextCellUnit, TextDirection, TocEntry,
};
pub use parser::{
    DecodeConfig, DecodeMode, DocumentParser, DocumentSession, DocumentSource, LoadOptions,
    PageIter,
};
pub use segment::{FallbackOutcome, FallbackSegmenter, MergeParams, MergeSanitizer, Sanitizer};
pub use timings::{TimingCollector, Timings};

use std::io::Cursor;
use std::path::Path;

/// Open a PDF file in a lazy session backed by [`LopdfEngine`].
///
/// # Example
///
/// ```no_run
/// let mut session = segpdf::open("report.pdf").unwrap();
/// println!("Pages: {}", session.number_of_pages().unwrap());
/// ```
pub fn open<P: AsRef<Path>>(path: P) -> Result<DocumentSession> {
    DocumentParser::new().open(path)
}

/// Open in-memory PDF bytes; the session handle is their SHA-256 digest.
pub fn open_bytes(data: &[u8]) -> Result<DocumentSession> {
    let mut cursor = Cursor::new(data);
    DocumentParser::new().load(DocumentSource::stream(&mut cursor), &LoadOptions::default())
}

/// Text of every page, pages separated by a blank line.
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut session = open(path)?;
    let config = DecodeConfig::chars_only().with_line_cells(true);
    let mut texts = Vec::new();
    for page in session.iterate_pages(DecodeMode::Structured, &config)? {
        let (_, page) = page?;
        texts.push(page.text());
    }
    session.unload();
    Ok(texts.join("\n\n"))
}
