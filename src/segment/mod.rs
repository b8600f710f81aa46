//! Word and text line derivation from char cells.
//!
//! Used when the engine did not supply word/line groupings for a page. The
//! heavy lifting is done by a [`Sanitizer`]; [`FallbackSegmenter`] decides
//! whether to run it and feeds its output back through the canonical cell
//! constructor.

mod merge;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use merge::MergeSanitizer;

use crate::engine::CellRow;
use crate::error::Result;
use crate::model::{SegmentedPage, TextCell};

/// Numeric merge configuration handed to a sanitizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeParams {
    /// Forwarded to the sanitizer; [`MergeSanitizer`] does not consult it.
    pub horizontal_cell_tolerance: f64,
    /// Maximal gap, in average glyph widths, for two cells to merge.
    pub space_width_factor_for_merge: f64,
    /// Gap, in average glyph widths, above which a space is inserted.
    pub space_width_factor_for_merge_with_space: f64,
    pub enforce_same_font: bool,
}

/// Geometric merge component.
pub trait Sanitizer {
    fn set_char_cells(&mut self, cells: Vec<CellRow>);
    fn create_word_cells(&mut self, params: &MergeParams) -> Vec<CellRow>;
    fn create_line_cells(&mut self, params: &MergeParams) -> Vec<CellRow>;
}

/// Builds a fresh sanitizer per derivation.
pub type SanitizerFactory = Arc<dyn Fn() -> Box<dyn Sanitizer> + Send + Sync>;

/// What a fallback call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// Target list was already populated; nothing ran.
    AlreadyPresent,
    /// No char cells to derive from; target list left empty.
    NoCharCells,
    /// The sanitizer ran and produced this many cells.
    Derived(usize),
}

/// Derives word and text line cells from a page's char cells.
///
/// Calls are idempotent: once the target list is non-empty, later calls
/// leave the page untouched.
#[derive(Clone)]
pub struct FallbackSegmenter {
    factory: SanitizerFactory,
}

impl Default for FallbackSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FallbackSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackSegmenter").finish_non_exhaustive()
    }
}

impl FallbackSegmenter {
    /// Segmenter backed by [`MergeSanitizer`].
    pub fn new() -> Self {
        Self::with_sanitizer(Arc::new(|| Box::new(MergeSanitizer::new()) as Box<dyn Sanitizer>))
    }

    pub fn with_sanitizer(factory: SanitizerFactory) -> Self {
        Self { factory }
    }

    pub fn create_word_cells(
        &self,
        page: &mut SegmentedPage,
        params: &MergeParams,
    ) -> Result<FallbackOutcome> {
        if page.has_words() {
            return Ok(FallbackOutcome::AlreadyPresent);
        }
        let Some(mut sanitizer) = self.prepare(page) else {
            return Ok(FallbackOutcome::NoCharCells);
        };
        let cells = to_cells(&sanitizer.create_word_cells(params))?;
        let n = cells.len();
        page.set_word_cells(cells);
        Ok(FallbackOutcome::Derived(n))
    }

    pub fn create_textline_cells(
        &self,
        page: &mut SegmentedPage,
        params: &MergeParams,
    ) -> Result<FallbackOutcome> {
        if page.has_lines() {
            return Ok(FallbackOutcome::AlreadyPresent);
        }
        let Some(mut sanitizer) = self.prepare(page) else {
            return Ok(FallbackOutcome::NoCharCells);
        };
        let cells = to_cells(&sanitizer.create_line_cells(params))?;
        let n = cells.len();
        page.set_textline_cells(cells);
        Ok(FallbackOutcome::Derived(n))
    }

    fn prepare(&self, page: &SegmentedPage) -> Option<Box<dyn Sanitizer>> {
        if !page.has_chars() {
            return None;
        }
        let mut sanitizer = (self.factory)();
        sanitizer.set_char_cells(page.char_cells().iter().map(CellRow::from_record).collect());
        Some(sanitizer)
    }
}

/// Sanitizer rows into canonical cells, re-indexed from zero.
fn to_cells(rows: &[CellRow]) -> Result<Vec<TextCell>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| TextCell::from_record(row, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingRectangle, PageGeometry, TextDirection};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn glyph(index: usize, text: &str, x: f64) -> TextCell {
        TextCell {
            index,
            rect: BoundingRectangle::from_corners([
                x,
                0.0,
                x + 5.0,
                0.0,
                x + 5.0,
                10.0,
                x,
                10.0,
            ]),
            text: text.to_string(),
            orig: text.to_string(),
            font_key: "F1".to_string(),
            font_name: "Helvetica".to_string(),
            widget: false,
            text_direction: TextDirection::LeftToRight,
            rendering_mode: 0,
        }
    }

    fn page_with_chars() -> SegmentedPage {
        let mut page = SegmentedPage::new(PageGeometry::default());
        page.set_char_cells(vec![
            glyph(0, "H", 0.0),
            glyph(1, "i", 5.0),
            glyph(2, " ", 10.0),
            glyph(3, "y", 15.0),
            glyph(4, "o", 20.0),
        ]);
        page
    }

    fn word_params() -> MergeParams {
        crate::parser::DecodeConfig::default().word_merge()
    }

    fn line_params() -> MergeParams {
        crate::parser::DecodeConfig::default().line_merge()
    }

    #[test]
    fn test_derives_words_and_lines() {
        let seg = FallbackSegmenter::new();
        let mut page = page_with_chars();

        let out = seg.create_word_cells(&mut page, &word_params()).unwrap();
        assert_eq!(out, FallbackOutcome::Derived(2));
        let words: Vec<_> = page.word_cells().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(words, vec!["Hi", "yo"]);
        assert_eq!(page.word_cells()[1].index, 1);
        assert!(page.has_words());

        let out = seg.create_textline_cells(&mut page, &line_params()).unwrap();
        assert_eq!(out, FallbackOutcome::Derived(1));
        assert_eq!(page.textline_cells()[0].text, "Hi yo");
    }

    #[test]
    fn test_second_call_is_noop() {
        let seg = FallbackSegmenter::new();
        let mut page = page_with_chars();
        seg.create_word_cells(&mut page, &word_params()).unwrap();
        let once = page.clone();

        let out = seg.create_word_cells(&mut page, &word_params()).unwrap();
        assert_eq!(out, FallbackOutcome::AlreadyPresent);
        assert_eq!(page, once);
    }

    #[test]
    fn test_no_chars_degrades_to_empty() {
        let seg = FallbackSegmenter::new();
        let mut page = SegmentedPage::new(PageGeometry::default());
        let out = seg.create_textline_cells(&mut page, &line_params()).unwrap();
        assert_eq!(out, FallbackOutcome::NoCharCells);
        assert!(!page.has_lines());
    }

    struct CountingSanitizer {
        calls: Arc<AtomicUsize>,
        inner: MergeSanitizer,
    }

    impl Sanitizer for CountingSanitizer {
        fn set_char_cells(&mut self, cells: Vec<CellRow>) {
            self.inner.set_char_cells(cells);
        }

        fn create_word_cells(&mut self, params: &MergeParams) -> Vec<CellRow> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.create_word_cells(params)
        }

        fn create_line_cells(&mut self, params: &MergeParams) -> Vec<CellRow> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.create_line_cells(params)
        }
    }

    #[test]
    fn test_custom_sanitizer_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let seg = FallbackSegmenter::with_sanitizer(Arc::new(move || {
            Box::new(CountingSanitizer {
                calls: counter.clone(),
                inner: MergeSanitizer::new(),
            }) as Box<dyn Sanitizer>
        }));

        let mut page = page_with_chars();
        seg.create_word_cells(&mut page, &word_params()).unwrap();
        seg.create_word_cells(&mut page, &word_params()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
