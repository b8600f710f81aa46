//! Page assembly: raw engine output into a [`SegmentedPage`].
//!
//! Both raw shapes go through the same record traits, so the serialized and
//! structured pipelines share every rule below:
//!
//! - a substructure is only populated when the config requested it, and a
//!   requested one missing from the engine output is a contract violation;
//! - page, cell and image geometry always ends up as four explicit corners
//!   with a bottom-left origin;
//! - engine supplied word/line cells are kept when the config asks for them,
//!   otherwise requested ones are derived from char cells by the
//!   [`FallbackSegmenter`].

mod tabular;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::engine::{
    BitmapRecord, CellRecord, DimensionRecord, DimensionRow, PageDecoder, RawPage, ShapeRecord,
    ShapeRow,
};
use crate::error::{Error, Result};
use crate::model::{
    BitmapImage, BitmapResource, BoundaryType, BoundingRectangle, Coord2D, CoordOrigin,
    ImagePlacement, PageGeometry, SegmentedPage, Shape, TextCell,
};
use crate::parser::DecodeConfig;
use crate::segment::{FallbackOutcome, FallbackSegmenter, MergeParams};
use crate::timings::{TimingCollector, Timings, CREATE_LINE_CELLS, CREATE_WORD_CELLS};

use tabular::Table;

/// Where a page's word or line cells came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOrigin {
    /// Supplied by the engine.
    Engine,
    /// Derived locally from char cells.
    Derived,
    /// Requested, but no char cells were available to derive from.
    Unavailable,
    NotRequested,
}

impl CellOrigin {
    /// Whether the slow fallback path was involved.
    pub fn is_fallback(&self) -> bool {
        matches!(self, CellOrigin::Derived | CellOrigin::Unavailable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyReport {
    pub words: CellOrigin,
    pub lines: CellOrigin,
}

/// An assembled page with the timings of the call that produced it.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub page: SegmentedPage,
    pub timings: Timings,
    pub report: AssemblyReport,
}

/// Engine output after adaptation, before the shared rules run.
struct Parts {
    geometry: PageGeometry,
    chars: Option<Vec<TextCell>>,
    words: Option<Vec<TextCell>>,
    lines: Option<Vec<TextCell>>,
    shapes: Option<Vec<Shape>>,
    bitmaps: Option<Vec<BitmapResource>>,
}

/// Converts raw engine records into canonical pages.
#[derive(Debug, Clone, Default)]
pub struct PageAssembler {
    segmenter: FallbackSegmenter,
}

impl PageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segmenter(segmenter: FallbackSegmenter) -> Self {
        Self { segmenter }
    }

    pub fn assemble(&self, raw: RawPage, config: &DecodeConfig) -> Result<Assembled> {
        match raw {
            RawPage::Serialized(value) => self.assemble_serialized(&value, config),
            RawPage::Structured(decoder) => self.assemble_structured(decoder.as_ref(), config),
        }
    }

    /// Tabular page record; timings carry summed values only.
    pub fn assemble_serialized(&self, value: &Value, config: &DecodeConfig) -> Result<Assembled> {
        let original = value.get("original").ok_or_else(|| Error::missing("original"))?;

        let dimension: DimensionRow = serde_json::from_value(
            original
                .get("dimension")
                .cloned()
                .ok_or_else(|| Error::missing("dimension"))?,
        )
        .map_err(|e| Error::ContractViolation(format!("malformed `dimension`: {}", e)))?;

        let geometry = geometry(&dimension, config);
        let height = geometry.height();

        let cell_table = |key: &'static str| -> Result<Option<Vec<TextCell>>> {
            original
                .get(key)
                .map(|v| {
                    Table::parse(key, v)?
                        .cells()
                        .and_then(|rows| build_cells(&rows, height))
                })
                .transpose()
        };

        let chars = if config.keep_char_cells {
            Some(cell_table("cells")?.ok_or_else(|| Error::missing("cells"))?)
        } else {
            None
        };

        let shapes = if config.keep_shapes {
            let rows: Vec<ShapeRow> = serde_json::from_value(
                original
                    .get("shapes")
                    .cloned()
                    .ok_or_else(|| Error::missing("shapes"))?,
            )
            .map_err(|e| Error::ContractViolation(format!("malformed `shapes`: {}", e)))?;
            Some(build_shapes(&rows)?)
        } else {
            None
        };

        let bitmaps = if config.keep_bitmaps {
            let images = original.get("images").ok_or_else(|| Error::missing("images"))?;
            Some(build_bitmaps(
                &Table::parse("images", images)?.bitmaps()?,
                height,
            ))
        } else {
            None
        };

        let parts = Parts {
            geometry,
            chars,
            words: if config.create_word_cells {
                cell_table("word_cells")?
            } else {
                None
            },
            lines: if config.create_line_cells {
                cell_table("line_cells")?
            } else {
                None
            },
            shapes,
            bitmaps,
        };

        let summed: BTreeMap<String, f64> = match value.get("timings") {
            Some(t) => serde_json::from_value(t.clone())
                .map_err(|e| Error::ContractViolation(format!("malformed `timings`: {}", e)))?,
            None => BTreeMap::new(),
        };

        self.finish(parts, config, Timings::from_summed(summed), false)
    }

    /// Field-accessor records; timings carry summed values and raw samples.
    pub fn assemble_structured(
        &self,
        decoder: &dyn PageDecoder,
        config: &DecodeConfig,
    ) -> Result<Assembled> {
        let geometry = geometry(decoder.dimension(), config);
        let height = geometry.height();

        let chars = if config.keep_char_cells {
            let cells = decoder.char_cells().ok_or_else(|| Error::missing("cells"))?;
            Some(build_cells(cells, height)?)
        } else {
            None
        };

        let shapes = if config.keep_shapes {
            let shapes = decoder.shapes().ok_or_else(|| Error::missing("shapes"))?;
            Some(build_shapes(shapes)?)
        } else {
            None
        };

        let bitmaps = if config.keep_bitmaps {
            let bitmaps = decoder.bitmaps().ok_or_else(|| Error::missing("images"))?;
            Some(build_bitmaps(bitmaps, height))
        } else {
            None
        };

        let words = match decoder.word_cells() {
            Some(cells) if config.create_word_cells => Some(build_cells(cells, height)?),
            _ => None,
        };
        let lines = match decoder.line_cells() {
            Some(cells) if config.create_line_cells => Some(build_cells(cells, height)?),
            _ => None,
        };

        let parts = Parts {
            geometry,
            chars,
            words,
            lines,
            shapes,
            bitmaps,
        };

        self.finish(parts, config, decoder.timings(), true)
    }

    fn finish(
        &self,
        parts: Parts,
        config: &DecodeConfig,
        mut timings: Timings,
        with_raw: bool,
    ) -> Result<Assembled> {
        let mut page = SegmentedPage::new(parts.geometry);

        if let Some(chars) = parts.chars {
            page.set_char_cells(chars);
        }
        if let Some(shapes) = parts.shapes {
            page.set_shapes(shapes);
        }
        if let Some(bitmaps) = parts.bitmaps {
            page.set_bitmap_resources(bitmaps);
        }

        let mut local = TimingCollector::new();

        let words = match parts.words.filter(|w| !w.is_empty()) {
            Some(words) => {
                page.set_word_cells(words);
                CellOrigin::Engine
            }
            None if config.create_word_cells => {
                let params = config.word_merge();
                let outcome = local.time(CREATE_WORD_CELLS, || {
                    self.segmenter.create_word_cells(&mut page, &params)
                })?;
                fallback_origin(outcome)
            }
            None => CellOrigin::NotRequested,
        };

        let lines = match parts.lines.filter(|l| !l.is_empty()) {
            Some(lines) => {
                page.set_textline_cells(lines);
                CellOrigin::Engine
            }
            None if config.create_line_cells => {
                let params: MergeParams = config.line_merge();
                let outcome = local.time(CREATE_LINE_CELLS, || {
                    self.segmenter.create_textline_cells(&mut page, &params)
                })?;
                fallback_origin(outcome)
            }
            None => CellOrigin::NotRequested,
        };

        fold_timings(&mut timings, &local, with_raw);

        Ok(Assembled {
            page,
            timings,
            report: AssemblyReport { words, lines },
        })
    }
}

fn fallback_origin(outcome: FallbackOutcome) -> CellOrigin {
    match outcome {
        FallbackOutcome::AlreadyPresent => CellOrigin::Engine,
        FallbackOutcome::NoCharCells => CellOrigin::Unavailable,
        FallbackOutcome::Derived(_) => CellOrigin::Derived,
    }
}

/// Add local samples to engine timings, keeping the pipeline's timing form.
fn fold_timings(timings: &mut Timings, local: &TimingCollector, with_raw: bool) {
    if with_raw {
        let samples = local.to_timings();
        for (key, values) in samples.raw_data {
            timings.raw_data.entry(key).or_default().extend(values);
        }
    }
    for (key, total) in local.totals() {
        *timings.data.entry(key.clone()).or_insert(0.0) += total;
    }
}

/// Requested boundary, else the one the engine reported.
fn geometry(dimension: &dyn DimensionRecord, config: &DecodeConfig) -> PageGeometry {
    let boundary: BoundaryType = config
        .page_boundary
        .unwrap_or_else(|| dimension.page_boundary());
    PageGeometry::new(dimension.angle(), boundary, &dimension.boxes())
}

/// Cells in bottom-left coordinates of a page `page_height` tall.
fn build_cells<'a, I, R>(records: I, page_height: f64) -> Result<Vec<TextCell>>
where
    I: IntoIterator<Item = &'a R>,
    R: CellRecord + ?Sized + 'a,
{
    records
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let mut cell = TextCell::from_record(r, i)?;
            cell.rect = cell.rect.to_bottom_left_origin(page_height);
            Ok(cell)
        })
        .collect()
}

/// One shape per `[start, end)` pair; `parent_id` is the source path.
fn build_shapes<'a, I, R>(records: I) -> Result<Vec<Shape>>
where
    I: IntoIterator<Item = &'a R>,
    R: ShapeRecord + ?Sized + 'a,
{
    let mut shapes = Vec::new();

    for (parent_id, record) in records.into_iter().enumerate() {
        let (xs, ys, segments) = (record.xs(), record.ys(), record.segments());
        if xs.len() != ys.len() || segments.len() % 2 != 0 {
            return Err(Error::ContractViolation(format!(
                "shape {}: {} x, {} y values and {} segment bounds",
                parent_id,
                xs.len(),
                ys.len(),
                segments.len()
            )));
        }

        let style = record.style();
        for pair in segments.chunks_exact(2) {
            let (start, end) = (pair[0], pair[1]);
            if start > end || end > xs.len() {
                return Err(Error::ContractViolation(format!(
                    "shape {}: segment [{}, {}) outside {} points",
                    parent_id,
                    start,
                    end,
                    xs.len()
                )));
            }
            if end - start < 2 {
                continue;
            }
            shapes.push(Shape {
                index: shapes.len(),
                parent_id,
                points: (start..end).map(|k| Coord2D::new(xs[k], ys[k])).collect(),
                coord_origin: CoordOrigin::BottomLeft,
                style: style.clone(),
            });
        }
    }

    Ok(shapes)
}

fn build_bitmaps<'a, I, R>(records: I, page_height: f64) -> Vec<BitmapResource>
where
    I: IntoIterator<Item = &'a R>,
    R: BitmapRecord + ?Sized + 'a,
{
    records
        .into_iter()
        .enumerate()
        .map(|(index, r)| {
            let image = r.payload().map(|(mimetype, data)| BitmapImage {
                mimetype: mimetype.to_string(),
                data: data.to_vec(),
            });
            BitmapResource {
                index,
                rect: BoundingRectangle::from_bbox(&r.bbox().to_bottom_left_origin(page_height)),
                xobject_key: r.xobject_key().to_string(),
                width: r.image_width(),
                height: r.image_height(),
                bits_per_component: r.bits_per_component(),
                color_space: r.color_space().to_string(),
                mode: if image.is_some() {
                    ImagePlacement::Embedded
                } else {
                    ImagePlacement::Placeholder
                },
                image,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BitmapRow, CellRow, DecodedPage};
    use crate::model::{BoundingBox, PageBoxes, ShapeStyle};
    use crate::parser::DecodeMode;

    fn glyph(text: &str, x: f64) -> CellRow {
        CellRow {
            rect: BoundingRectangle::from_corners([
                x,
                700.0,
                x + 6.0,
                700.0,
                x + 6.0,
                712.0,
                x,
                712.0,
            ]),
            text: text.to_string(),
            orig: text.to_string(),
            font_key: "F1".to_string(),
            font_name: "Helvetica".to_string(),
            widget: false,
            left_to_right: true,
            rendering_mode: 0,
        }
    }

    fn decoded() -> DecodedPage {
        let media = [0.0, 0.0, 612.0, 792.0];
        let crop = [10.0, 10.0, 602.0, 782.0];
        let mut timings = TimingCollector::new();
        timings.add("decode_page", 0.25);
        timings.add("decode_font: Helvetica", 0.5);
        timings.add("decode_font: Helvetica", 0.25);

        DecodedPage {
            page_number: 1,
            dimension: DimensionRow {
                page_boundary: BoundaryType::CropBox,
                angle: 0.0,
                rectangles: PageBoxes {
                    media,
                    crop,
                    bleed: crop,
                    trim: crop,
                    art: crop,
                },
            },
            char_cells: Some(vec![
                glyph("O", 72.0),
                glyph("K", 78.0),
                glyph(" ", 84.0),
                glyph("g", 90.0),
                glyph("o", 96.0),
            ]),
            word_cells: None,
            line_cells: None,
            shapes: Some(vec![
                ShapeRow {
                    x: vec![0.0, 100.0, 100.0, 0.0, 0.0, 1.0],
                    y: vec![0.0, 0.0, 50.0, 50.0, 0.0, 1.0],
                    i: vec![0, 4, 4, 6],
                    ..ShapeRow::line(&[])
                }
                .with_style(&ShapeStyle::default()),
                ShapeRow::line(&[(0.0, 10.0), (300.0, 10.0)]),
            ]),
            bitmaps: Some(vec![BitmapRow {
                bbox: BoundingBox::new(100.0, 100.0, 200.0, 180.0),
                xobject_key: "Im0".to_string(),
                image_width: 10,
                image_height: 8,
                bits_per_component: 8,
                color_space: "DeviceRGB".to_string(),
                payload: None,
            }]),
            timings,
        }
    }

    fn raw(page: &DecodedPage, mode: DecodeMode) -> RawPage {
        match mode {
            DecodeMode::Serialized => RawPage::Serialized(page.to_serialized()),
            DecodeMode::Structured => RawPage::Structured(Box::new(page.clone())),
        }
    }

    #[test]
    fn test_both_pipelines_agree() {
        let assembler = PageAssembler::new();
        let config = DecodeConfig::default();
        let page = decoded();

        let a = assembler.assemble(raw(&page, DecodeMode::Serialized), &config).unwrap();
        let b = assembler.assemble(raw(&page, DecodeMode::Structured), &config).unwrap();

        assert_eq!(a.page, b.page);
        assert_eq!(a.page.text(), "OK go");
        assert_eq!(a.report, b.report);
        assert_eq!(a.report.words, CellOrigin::Derived);
    }

    #[test]
    fn test_geometry_uses_selected_box() {
        let assembler = PageAssembler::new();
        let page = decoded();

        let crop = assembler
            .assemble(raw(&page, DecodeMode::Structured), &DecodeConfig::default())
            .unwrap();
        assert_eq!(crop.page.geometry().width(), 592.0);

        let media = assembler
            .assemble(
                raw(&page, DecodeMode::Structured),
                &DecodeConfig::default().with_page_boundary(BoundaryType::MediaBox),
            )
            .unwrap();
        let rect = media.page.geometry().rect;
        assert_eq!(rect.to_array(), [0.0, 0.0, 612.0, 0.0, 612.0, 792.0, 0.0, 792.0]);
        assert_eq!(rect.coord_origin, CoordOrigin::BottomLeft);
    }

    #[test]
    fn test_shapes_split_per_segment() {
        let out = PageAssembler::new()
            .assemble(raw(&decoded(), DecodeMode::Structured), &DecodeConfig::default())
            .unwrap();
        let shapes = out.page.shapes();
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[0].len(), 4);
        assert_eq!(shapes[1].parent_id, 0);
        assert_eq!(shapes[2].parent_id, 1);
        assert_eq!(shapes[2].index, 2);
        assert_eq!(out.page.lines().count(), 1);
        assert_eq!(out.page.bitmap_resources()[0].mode, ImagePlacement::Placeholder);
    }

    #[test]
    fn test_timing_forms_differ_by_pipeline() {
        let assembler = PageAssembler::new();
        let config = DecodeConfig::default();
        let page = decoded();

        let serialized = assembler.assemble(raw(&page, DecodeMode::Serialized), &config).unwrap();
        assert!(!serialized.timings.has_raw_samples());
        assert_eq!(serialized.timings.get("decode_font: Helvetica"), 0.75);
        assert!(serialized.timings.get(CREATE_WORD_CELLS) >= 0.0);
        assert!(serialized.timings.data.contains_key(CREATE_LINE_CELLS));

        let structured = assembler.assemble(raw(&page, DecodeMode::Structured), &config).unwrap();
        assert_eq!(structured.timings.get_count("decode_font: Helvetica"), 2);
        assert_eq!(structured.timings.get_count(CREATE_WORD_CELLS), 1);
    }

    #[test]
    fn test_unrequested_parts_are_dropped() {
        let config = DecodeConfig::default()
            .with_shapes(false)
            .with_bitmaps(false)
            .with_word_cells(false);
        let out = PageAssembler::new()
            .assemble(raw(&decoded(), DecodeMode::Serialized), &config)
            .unwrap();
        assert!(out.page.shapes().is_empty());
        assert!(out.page.bitmap_resources().is_empty());
        assert!(!out.page.has_words());
        assert!(out.page.has_lines());
        assert_eq!(out.report.words, CellOrigin::NotRequested);
    }

    #[test]
    fn test_missing_requested_part_is_contract_violation() {
        let mut page = decoded();
        page.shapes = None;
        let assembler = PageAssembler::new();
        for mode in [DecodeMode::Serialized, DecodeMode::Structured] {
            let err = assembler
                .assemble(raw(&page, mode), &DecodeConfig::default())
                .unwrap_err();
            assert!(matches!(err, Error::ContractViolation(_)), "{:?}", mode);
        }

        let ok = assembler.assemble(
            raw(&page, DecodeMode::Structured),
            &DecodeConfig::default().with_shapes(false),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_engine_words_used_verbatim() {
        let mut page = decoded();
        page.word_cells = Some(vec![glyph("engine-word", 0.0)]);
        let out = PageAssembler::new()
            .assemble(raw(&page, DecodeMode::Serialized), &DecodeConfig::default())
            .unwrap();
        assert_eq!(out.report.words, CellOrigin::Engine);
        assert_eq!(out.page.word_cells()[0].text, "engine-word");
        assert_eq!(out.report.lines, CellOrigin::Derived);
    }

    #[test]
    fn test_unrequested_engine_cells_are_dropped() {
        let mut page = decoded();
        page.word_cells = Some(vec![glyph("engine-word", 0.0)]);
        page.line_cells = Some(vec![glyph("engine-line", 0.0)]);
        let config = DecodeConfig::default()
            .with_word_cells(false)
            .with_line_cells(false);

        for mode in [DecodeMode::Structured, DecodeMode::Serialized] {
            let out = PageAssembler::new().assemble(raw(&page, mode), &config).unwrap();
            assert!(!out.page.has_words(), "{:?}", mode);
            assert!(!out.page.has_lines(), "{:?}", mode);
            assert_eq!(out.report.words, CellOrigin::NotRequested);
            assert_eq!(out.report.lines, CellOrigin::NotRequested);
        }
    }

    #[test]
    fn test_top_left_geometry_is_flipped() {
        let mut page = decoded();
        let mut cell = glyph("X", 72.0);
        cell.rect = BoundingRectangle {
            coord_origin: CoordOrigin::TopLeft,
            ..BoundingRectangle::from_corners([72.0, 22.0, 78.0, 22.0, 78.0, 10.0, 72.0, 10.0])
        };
        page.char_cells = Some(vec![cell]);
        page.bitmaps.as_mut().unwrap()[0].bbox = BoundingBox {
            coord_origin: CoordOrigin::TopLeft,
            ..BoundingBox::new(100.0, 20.0, 200.0, 80.0)
        };

        let assembler = PageAssembler::new();
        let config = DecodeConfig::default();
        let structured = assembler.assemble(raw(&page, DecodeMode::Structured), &config).unwrap();
        let serialized = assembler.assemble(raw(&page, DecodeMode::Serialized), &config).unwrap();
        assert_eq!(structured.page, serialized.page);

        // crop box is 772pt tall
        let out = structured.page;
        let rect = out.char_cells()[0].rect;
        assert_eq!(rect.coord_origin, CoordOrigin::BottomLeft);
        assert_eq!(rect.to_array(), [72.0, 750.0, 78.0, 750.0, 78.0, 762.0, 72.0, 762.0]);
        assert_eq!(out.word_cells()[0].rect.coord_origin, CoordOrigin::BottomLeft);

        let image = out.bitmap_resources()[0].rect;
        assert_eq!(image.coord_origin, CoordOrigin::BottomLeft);
        assert_eq!(image.to_array(), [100.0, 692.0, 200.0, 692.0, 200.0, 752.0, 100.0, 752.0]);
    }

    #[test]
    fn test_fallback_without_chars_degrades() {
        let config = DecodeConfig::default().with_char_cells(false);
        let out = PageAssembler::new()
            .assemble(raw(&decoded(), DecodeMode::Structured), &config)
            .unwrap();
        assert!(!out.page.has_chars());
        assert!(!out.page.has_words());
        assert_eq!(out.report.words, CellOrigin::Unavailable);
        assert!(out.report.lines.is_fallback());
    }
}
