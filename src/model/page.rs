//! The segmented page: geometry plus cells, shapes and bitmaps.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::bitmap::BitmapResource;
use super::cell::{TextCell, TextCellUnit};
use super::geometry::PageGeometry;
use super::shape::Shape;
use crate::error::Result;

/// One decoded page.
///
/// The presence flags always equal the non-emptiness of their lists; lists
/// are only replaced through setters that keep them in sync, and
/// deserialisation recomputes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SegmentedPageRepr")]
pub struct SegmentedPage {
    geometry: PageGeometry,
    char_cells: Vec<TextCell>,
    word_cells: Vec<TextCell>,
    textline_cells: Vec<TextCell>,
    shapes: Vec<Shape>,
    bitmap_resources: Vec<BitmapResource>,
    has_chars: bool,
    has_words: bool,
    has_lines: bool,
}

#[derive(Deserialize)]
struct SegmentedPageRepr {
    geometry: PageGeometry,
    #[serde(default)]
    char_cells: Vec<TextCell>,
    #[serde(default)]
    word_cells: Vec<TextCell>,
    #[serde(default)]
    textline_cells: Vec<TextCell>,
    #[serde(default)]
    shapes: Vec<Shape>,
    #[serde(default)]
    bitmap_resources: Vec<BitmapResource>,
}

impl From<SegmentedPageRepr> for SegmentedPage {
    fn from(repr: SegmentedPageRepr) -> Self {
        let mut page = SegmentedPage::new(repr.geometry);
        page.set_char_cells(repr.char_cells);
        page.set_word_cells(repr.word_cells);
        page.set_textline_cells(repr.textline_cells);
        page.shapes = repr.shapes;
        page.bitmap_resources = repr.bitmap_resources;
        page
    }
}

impl SegmentedPage {
    /// An empty page with the given geometry.
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            char_cells: Vec::new(),
            word_cells: Vec::new(),
            textline_cells: Vec::new(),
            shapes: Vec::new(),
            bitmap_resources: Vec::new(),
            has_chars: false,
            has_words: false,
            has_lines: false,
        }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn char_cells(&self) -> &[TextCell] {
        &self.char_cells
    }

    pub fn word_cells(&self) -> &[TextCell] {
        &self.word_cells
    }

    pub fn textline_cells(&self) -> &[TextCell] {
        &self.textline_cells
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Shapes painted without graphics state.
    pub fn lines(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().filter(|s| s.is_line())
    }

    pub fn bitmap_resources(&self) -> &[BitmapResource] {
        &self.bitmap_resources
    }

    pub fn has_chars(&self) -> bool {
        self.has_chars
    }

    pub fn has_words(&self) -> bool {
        self.has_words
    }

    pub fn has_lines(&self) -> bool {
        self.has_lines
    }

    pub fn cells(&self, unit: TextCellUnit) -> &[TextCell] {
        match unit {
            TextCellUnit::Char => &self.char_cells,
            TextCellUnit::Word => &self.word_cells,
            TextCellUnit::Line => &self.textline_cells,
        }
    }

    pub fn set_char_cells(&mut self, cells: Vec<TextCell>) {
        self.has_chars = !cells.is_empty();
        self.char_cells = cells;
    }

    pub fn set_word_cells(&mut self, cells: Vec<TextCell>) {
        self.has_words = !cells.is_empty();
        self.word_cells = cells;
    }

    pub fn set_textline_cells(&mut self, cells: Vec<TextCell>) {
        self.has_lines = !cells.is_empty();
        self.textline_cells = cells;
    }

    pub fn set_shapes(&mut self, shapes: Vec<Shape>) {
        self.shapes = shapes;
    }

    pub fn set_bitmap_resources(&mut self, bitmaps: Vec<BitmapResource>) {
        self.bitmap_resources = bitmaps;
    }

    /// Text lines joined by newlines; falls back to words, then chars.
    pub fn text(&self) -> String {
        let (cells, sep) = if self.has_lines {
            (&self.textline_cells, "\n")
        } else if self.has_words {
            (&self.word_cells, " ")
        } else {
            (&self.char_cells, "")
        };
        cells
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(sep)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the page as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json(true)?)?;
        Ok(())
    }

    /// Read a page previously written with [`SegmentedPage::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
