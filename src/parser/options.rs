//! Decode and load configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::BoundaryType;
use crate::segment::MergeParams;

/// Which raw record shape the engine should hand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    /// Field-accessor records, no intermediate serialisation.
    #[default]
    Structured,
    /// Tabular JSON: header plus rows.
    Serialized,
}

/// Options applied to every page decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Page box defining the page extent; `None` uses the session's box.
    pub page_boundary: Option<BoundaryType>,

    /// Normalise display text (NFKC); the decoded text stays in `orig`.
    pub do_sanitization: bool,

    pub keep_char_cells: bool,
    pub keep_shapes: bool,
    pub keep_bitmaps: bool,

    /// Cap on emitted shapes (`None` = no cap).
    pub max_num_shapes: Option<usize>,
    /// Cap on emitted bitmaps (`None` = no cap).
    pub max_num_bitmaps: Option<usize>,

    pub create_word_cells: bool,
    pub create_line_cells: bool,

    /// Only merge glyphs sharing a font.
    pub enforce_same_font: bool,

    pub horizontal_cell_tolerance: f64,

    /// Gap (in average glyph widths) below which glyphs join a word.
    pub word_space_width_factor_for_merge: f64,

    /// Gap (in average glyph widths) below which cells join a line.
    pub line_space_width_factor_for_merge: f64,

    /// Gap above which a space is inserted while joining a line.
    pub line_space_width_factor_for_merge_with_space: f64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            page_boundary: None,
            do_sanitization: false,
            keep_char_cells: true,
            keep_shapes: true,
            keep_bitmaps: true,
            max_num_shapes: None,
            max_num_bitmaps: None,
            create_word_cells: true,
            create_line_cells: true,
            enforce_same_font: true,
            horizontal_cell_tolerance: 1.0,
            word_space_width_factor_for_merge: 0.33,
            line_space_width_factor_for_merge: 1.0,
            line_space_width_factor_for_merge_with_space: 0.33,
        }
    }
}

impl DecodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_boundary(mut self, boundary: BoundaryType) -> Self {
        self.page_boundary = Some(boundary);
        self
    }

    pub fn with_sanitization(mut self, enabled: bool) -> Self {
        self.do_sanitization = enabled;
        self
    }

    pub fn with_char_cells(mut self, keep: bool) -> Self {
        self.keep_char_cells = keep;
        self
    }

    pub fn with_shapes(mut self, keep: bool) -> Self {
        self.keep_shapes = keep;
        self
    }

    pub fn with_bitmaps(mut self, keep: bool) -> Self {
        self.keep_bitmaps = keep;
        self
    }

    pub fn with_max_shapes(mut self, max: usize) -> Self {
        self.max_num_shapes = Some(max);
        self
    }

    pub fn with_max_bitmaps(mut self, max: usize) -> Self {
        self.max_num_bitmaps = Some(max);
        self
    }

    pub fn with_word_cells(mut self, create: bool) -> Self {
        self.create_word_cells = create;
        self
    }

    pub fn with_line_cells(mut self, create: bool) -> Self {
        self.create_line_cells = create;
        self
    }

    pub fn with_same_font(mut self, enforce: bool) -> Self {
        self.enforce_same_font = enforce;
        self
    }

    /// Char cells only: no shapes, no bitmaps, no derived cells.
    pub fn chars_only() -> Self {
        Self::default()
            .with_shapes(false)
            .with_bitmaps(false)
            .with_word_cells(false)
            .with_line_cells(false)
    }

    /// Merge parameters for word cells.
    ///
    /// The with-space factor is twice the merge factor, so nothing that
    /// qualifies for merging ever gets a space inserted.
    pub fn word_merge(&self) -> MergeParams {
        MergeParams {
            horizontal_cell_tolerance: self.horizontal_cell_tolerance,
            space_width_factor_for_merge: self.word_space_width_factor_for_merge,
            space_width_factor_for_merge_with_space: 2.0 * self.word_space_width_factor_for_merge,
            enforce_same_font: self.enforce_same_font,
        }
    }

    /// Merge parameters for text line cells.
    pub fn line_merge(&self) -> MergeParams {
        MergeParams {
            horizontal_cell_tolerance: self.horizontal_cell_tolerance,
            space_width_factor_for_merge: self.line_space_width_factor_for_merge,
            space_width_factor_for_merge_with_space: self
                .line_space_width_factor_for_merge_with_space,
            enforce_same_font: self.enforce_same_font,
        }
    }

    /// Load from a JSON file; missing keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Options for opening a document.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Decode pages on demand instead of all at load time.
    pub lazy: bool,

    /// Default page box for the session's pages.
    pub boundary_type: BoundaryType,

    /// Password for encrypted documents.
    pub password: Option<String>,
}

impl Default for LoadOptions {
    /// Lazy, crop box, no password.
    fn default() -> Self {
        Self {
            lazy: true,
            boundary_type: BoundaryType::CropBox,
            password: None,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every page while loading.
    pub fn eager(mut self) -> Self {
        self.lazy = false;
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryType) -> Self {
        self.boundary_type = boundary;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_config_defaults() {
        let config = DecodeConfig::default();
        assert!(config.keep_char_cells);
        assert!(config.create_word_cells);
        assert!(!config.do_sanitization);
        assert_eq!(config.page_boundary, None);
        assert_eq!(config.max_num_shapes, None);
        assert_eq!(config.line_merge().space_width_factor_for_merge, 1.0);
        assert_eq!(config.word_merge().space_width_factor_for_merge_with_space, 0.66);
    }

    #[test]
    fn test_decode_config_builder() {
        let config = DecodeConfig::new()
            .with_page_boundary(BoundaryType::MediaBox)
            .with_bitmaps(false)
            .with_max_shapes(10)
            .with_same_font(false);
        assert_eq!(config.page_boundary, Some(BoundaryType::MediaBox));
        assert!(!config.keep_bitmaps);
        assert_eq!(config.max_num_shapes, Some(10));
        assert!(!config.line_merge().enforce_same_font);

        let chars = DecodeConfig::chars_only();
        assert!(chars.keep_char_cells && !chars.keep_shapes && !chars.create_line_cells);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DecodeConfig =
            serde_json::from_str(r#"{"page_boundary": "media_box", "keep_shapes": false}"#)
                .unwrap();
        assert_eq!(config.page_boundary, Some(BoundaryType::MediaBox));
        assert!(!config.keep_shapes);
        assert!(config.keep_bitmaps);
        assert_eq!(config.horizontal_cell_tolerance, 1.0);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decode.json");
        let config = DecodeConfig::new().with_sanitization(true).with_max_bitmaps(3);
        config.to_json_file(&path).unwrap();
        assert_eq!(DecodeConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_load_options() {
        let opts = LoadOptions::new();
        assert!(opts.lazy);
        assert_eq!(opts.boundary_type, BoundaryType::CropBox);

        let opts = LoadOptions::new()
            .eager()
            .with_boundary(BoundaryType::ArtBox)
            .with_password("secret");
        assert!(!opts.lazy);
        assert_eq!(opts.password.as_deref(), Some("secret"));
    }
}
