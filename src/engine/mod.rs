//! The decoding engine boundary.
//!
//! An engine owns a table of loaded documents keyed by string handles and
//! decodes pages on request. It is not reentrant: concurrent calls against
//! the same handle are undefined unless an engine states otherwise, so the
//! crate only ever reaches it through [`EngineRegistry`].

mod lopdf_engine;
mod records;
mod registry;

use std::fmt;
use std::path::Path;

pub use lopdf_engine::LopdfEngine;
pub use records::{
    BitmapIter, BitmapRecord, BitmapRow, CellIter, CellRecord, CellRow, DecodedPage,
    DimensionRecord, DimensionRow, PageDecoder, ShapeIter, ShapeRecord, ShapeRow, CELL_HEADER,
    IMAGE_HEADER,
};
pub use registry::EngineRegistry;

use crate::parser::{DecodeConfig, DecodeMode};

/// Where the engine reads a document from.
#[derive(Debug, Clone, Copy)]
pub enum EngineSource<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

/// Raw output of a single page decode.
pub enum RawPage {
    /// Tabular JSON page record (summed timings only).
    Serialized(serde_json::Value),
    /// Field-accessor records (summed and raw timings).
    Structured(Box<dyn PageDecoder>),
}

impl RawPage {
    pub fn mode(&self) -> DecodeMode {
        match self {
            RawPage::Serialized(_) => DecodeMode::Serialized,
            RawPage::Structured(_) => DecodeMode::Structured,
        }
    }
}

impl fmt::Debug for RawPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawPage::Serialized(v) => f.debug_tuple("Serialized").field(v).finish(),
            RawPage::Structured(d) => f
                .debug_struct("Structured")
                .field("page_number", &d.page_number())
                .finish_non_exhaustive(),
        }
    }
}

/// Contract of a native PDF decoding engine.
///
/// Page indices are 0-based. Methods report failure through `bool`/`None`;
/// the session layer turns those into typed errors.
pub trait PdfEngine: Send {
    fn load_document(
        &mut self,
        handle: &str,
        source: EngineSource<'_>,
        password: Option<&str>,
    ) -> bool;

    fn unload_document(&mut self, handle: &str) -> bool;

    /// Drop engine-side state kept for one page.
    fn unload_page(&mut self, handle: &str, page_index: usize) -> bool;

    fn is_loaded(&self, handle: &str) -> bool;

    /// `None` when `handle` is not loaded.
    fn number_of_pages(&self, handle: &str) -> Option<usize>;

    fn decode_page(
        &mut self,
        handle: &str,
        page_index: usize,
        config: &DecodeConfig,
        mode: DecodeMode,
    ) -> Option<RawPage>;

    /// Decode every page in one call: `{"timings": {...}, "pages": [...]}`,
    /// each page in the serialized page layout.
    fn decode_document(&mut self, handle: &str, config: &DecodeConfig)
        -> Option<serde_json::Value>;

    fn get_meta_xml(&self, handle: &str) -> Option<String>;

    /// Outline as a list of `{title, level, page, children}` objects.
    fn get_table_of_contents(&self, handle: &str) -> Option<serde_json::Value>;

    /// `{form, language, meta_xml, table_of_contents}`.
    fn get_annotations(&self, handle: &str) -> Option<serde_json::Value>;

    fn list_loaded_handles(&self) -> Vec<String>;
}
