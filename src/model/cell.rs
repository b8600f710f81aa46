//! Text cells: glyphs, words and text lines.

use serde::{Deserialize, Serialize};

use super::geometry::{BoundingBox, BoundingRectangle};
use crate::engine::CellRecord;
use crate::error::{Error, Result};

/// Reading direction of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl TextDirection {
    pub fn from_left_to_right(ltr: bool) -> Self {
        if ltr {
            TextDirection::LeftToRight
        } else {
            TextDirection::RightToLeft
        }
    }

    pub fn is_left_to_right(&self) -> bool {
        matches!(self, TextDirection::LeftToRight)
    }
}

/// Granularity of text cells on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCellUnit {
    Char,
    Word,
    Line,
}

/// A positioned run of text: one glyph, one word or one text line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCell {
    /// Zero-based position within the owning list.
    pub index: usize,

    /// Four explicit corners in bottom-left coordinates.
    pub rect: BoundingRectangle,

    /// Display text (sanitised when sanitisation was requested).
    pub text: String,

    /// Text as decoded from the content stream.
    pub orig: String,

    /// Resource name of the font, e.g. `F1`.
    pub font_key: String,

    /// Base font name, e.g. `Helvetica-Bold`.
    pub font_name: String,

    /// Whether the text belongs to a form widget.
    pub widget: bool,

    pub text_direction: TextDirection,

    /// PDF text rendering mode (`Tr`), 0 = fill.
    pub rendering_mode: i32,
}

impl TextCell {
    /// Build a cell from any engine record.
    ///
    /// Every cell on a page, whatever its source, goes through here so engine
    /// supplied and locally derived cells are indistinguishable.
    pub fn from_record<R: CellRecord + ?Sized>(record: &R, index: usize) -> Result<Self> {
        let rect = record.rect();
        if !rect.is_finite() {
            return Err(Error::ContractViolation(format!(
                "cell {} has non-finite coordinates",
                index
            )));
        }

        Ok(Self {
            index,
            rect,
            text: record.text().to_string(),
            orig: record.orig().to_string(),
            font_key: record.font_key().to_string(),
            font_name: record.font_name().to_string(),
            widget: record.widget(),
            text_direction: TextDirection::from_left_to_right(record.left_to_right()),
            rendering_mode: record.rendering_mode(),
        })
    }

    pub fn bbox(&self) -> BoundingBox {
        self.rect.to_bounding_box()
    }

    /// Text with runs of whitespace collapsed to a single space.
    pub fn normalized_text(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn is_left_to_right(&self) -> bool {
        self.text_direction.is_left_to_right()
    }
}

impl CellRecord for TextCell {
    fn rect(&self) -> BoundingRectangle {
        self.rect
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn orig(&self) -> &str {
        &self.orig
    }

    fn font_key(&self) -> &str {
        &self.font_key
    }

    fn font_name(&self) -> &str {
        &self.font_name
    }

    fn widget(&self) -> bool {
        self.widget
    }

    fn left_to_right(&self) -> bool {
        self.is_left_to_right()
    }

    fn rendering_mode(&self) -> i32 {
        self.rendering_mode
    }
}
