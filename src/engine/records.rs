//! Raw engine records.
//!
//! The accessor traits are what the page assembler consumes. Engines that
//! hand back structured output implement them directly; tabular output is
//! wrapped in adapters implementing the same traits.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{BoundaryType, BoundingBox, BoundingRectangle, PageBoxes, ShapeStyle};
use crate::timings::{TimingCollector, Timings};

/// Column names of tabular cell rows, in emission order.
pub const CELL_HEADER: &[&str] = &[
    "x0",
    "y0",
    "x1",
    "y1",
    "r_x0",
    "r_y0",
    "r_x1",
    "r_y1",
    "r_x2",
    "r_y2",
    "r_x3",
    "r_y3",
    "text",
    "orig",
    "rendering-mode",
    "font-key",
    "font-name",
    "widget",
    "left_to_right",
    "coord-origin",
];

/// Column names of tabular image rows, in emission order.
pub const IMAGE_HEADER: &[&str] = &[
    "x0",
    "y0",
    "x1",
    "y1",
    "xobject-key",
    "image-width",
    "image-height",
    "bits-per-component",
    "color-space",
    "mimetype",
    "data",
    "coord-origin",
];

/// One text cell as produced by the engine.
pub trait CellRecord {
    fn rect(&self) -> BoundingRectangle;
    fn text(&self) -> &str;
    /// Decoded text before sanitisation; defaults to `text`.
    fn orig(&self) -> &str {
        self.text()
    }
    fn font_key(&self) -> &str;
    fn font_name(&self) -> &str;
    fn widget(&self) -> bool;
    fn left_to_right(&self) -> bool;
    fn rendering_mode(&self) -> i32;
}

/// One painted path: flat point arrays plus `[start, end)` segment pairs.
pub trait ShapeRecord {
    fn xs(&self) -> &[f64];
    fn ys(&self) -> &[f64];
    fn segments(&self) -> &[usize];
    /// Graphics state, `None` for plain lines.
    fn style(&self) -> Option<ShapeStyle>;
}

/// One placed image.
pub trait BitmapRecord {
    fn bbox(&self) -> BoundingBox;
    fn xobject_key(&self) -> &str;
    fn image_width(&self) -> u32;
    fn image_height(&self) -> u32;
    fn bits_per_component(&self) -> u32;
    fn color_space(&self) -> &str;
    /// Encoded bytes and their MIME type, when the engine extracted them.
    fn payload(&self) -> Option<(&str, &[u8])>;
}

/// Page boxes and rotation.
pub trait DimensionRecord {
    fn angle(&self) -> f64;
    fn page_boundary(&self) -> BoundaryType;
    fn boxes(&self) -> PageBoxes;
}

pub type CellIter<'a> = Box<dyn Iterator<Item = &'a dyn CellRecord> + 'a>;
pub type ShapeIter<'a> = Box<dyn Iterator<Item = &'a dyn ShapeRecord> + 'a>;
pub type BitmapIter<'a> = Box<dyn Iterator<Item = &'a dyn BitmapRecord> + 'a>;

/// Structured (zero-copy) access to one decoded page.
///
/// A `None` list means the engine did not produce that substructure.
pub trait PageDecoder: Send {
    /// 1-based page number.
    fn page_number(&self) -> usize;
    fn dimension(&self) -> &dyn DimensionRecord;
    fn char_cells(&self) -> Option<CellIter<'_>>;
    fn word_cells(&self) -> Option<CellIter<'_>>;
    fn line_cells(&self) -> Option<CellIter<'_>>;
    fn shapes(&self) -> Option<ShapeIter<'_>>;
    fn bitmaps(&self) -> Option<BitmapIter<'_>>;
    /// Summed timings plus raw samples.
    fn timings(&self) -> Timings;
}

/// Owned cell row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRow {
    pub rect: BoundingRectangle,
    pub text: String,
    pub orig: String,
    pub font_key: String,
    pub font_name: String,
    pub widget: bool,
    pub left_to_right: bool,
    pub rendering_mode: i32,
}

impl CellRow {
    /// Copy any cell record into an owned row.
    pub fn from_record<R: CellRecord + ?Sized>(record: &R) -> Self {
        Self {
            rect: record.rect(),
            text: record.text().to_string(),
            orig: record.orig().to_string(),
            font_key: record.font_key().to_string(),
            font_name: record.font_name().to_string(),
            widget: record.widget(),
            left_to_right: record.left_to_right(),
            rendering_mode: record.rendering_mode(),
        }
    }

    fn to_tabular(&self) -> Value {
        let bbox = self.rect.to_bounding_box();
        let r = self.rect;
        json!([
            round3(bbox.l),
            round3(bbox.b),
            round3(bbox.r),
            round3(bbox.t),
            round3(r.r_x0),
            round3(r.r_y0),
            round3(r.r_x1),
            round3(r.r_y1),
            round3(r.r_x2),
            round3(r.r_y2),
            round3(r.r_x3),
            round3(r.r_y3),
            self.text,
            self.orig,
            self.rendering_mode,
            self.font_key,
            self.font_name,
            self.widget,
            self.left_to_right,
            r.coord_origin,
        ])
    }
}

impl CellRecord for CellRow {
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
        self.left_to_right
    }

    fn rendering_mode(&self) -> i32 {
        self.rendering_mode
    }
}

/// Owned shape row; also the serialized shape format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRow {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub i: Vec<usize>,
    #[serde(rename = "has-graphics-state", default)]
    pub has_graphics_state: bool,
    #[serde(rename = "line-width", default)]
    pub line_width: f64,
    #[serde(rename = "miter-limit", default)]
    pub miter_limit: f64,
    #[serde(rename = "line-cap", default)]
    pub line_cap: i32,
    #[serde(rename = "line-join", default)]
    pub line_join: i32,
    #[serde(rename = "dash-phase", default)]
    pub dash_phase: f64,
    #[serde(rename = "dash-array", default)]
    pub dash_array: Vec<f64>,
    #[serde(default)]
    pub flatness: f64,
    #[serde(rename = "rgb-stroking", default)]
    pub rgb_stroking: [u8; 3],
    #[serde(rename = "rgb-filling", default)]
    pub rgb_filling: [u8; 3],
}

impl ShapeRow {
    /// Unstyled path from a list of points, as a single segment.
    pub fn line(points: &[(f64, f64)]) -> Self {
        Self {
            x: points.iter().map(|p| p.0).collect(),
            y: points.iter().map(|p| p.1).collect(),
            i: vec![0, points.len()],
            has_graphics_state: false,
            line_width: 0.0,
            miter_limit: 0.0,
            line_cap: 0,
            line_join: 0,
            dash_phase: 0.0,
            dash_array: Vec::new(),
            flatness: 0.0,
            rgb_stroking: [0, 0, 0],
            rgb_filling: [0, 0, 0],
        }
    }

    /// Unstyled path with one segment per subpath; subpaths under two
    /// points are dropped. `None` when nothing is left.
    pub fn from_subpaths(subpaths: &[Vec<(f64, f64)>]) -> Option<Self> {
        let mut row = Self::line(&[]);
        row.i.clear();
        for sub in subpaths.iter().filter(|s| s.len() >= 2) {
            let start = row.x.len();
            row.x.extend(sub.iter().map(|p| p.0));
            row.y.extend(sub.iter().map(|p| p.1));
            row.i.push(start);
            row.i.push(row.x.len());
        }
        (!row.i.is_empty()).then_some(row)
    }

    pub fn with_style(mut self, style: &ShapeStyle) -> Self {
        self.has_graphics_state = true;
        self.line_width = style.line_width;
        self.miter_limit = style.miter_limit;
        self.line_cap = style.line_cap;
        self.line_join = style.line_join;
        self.dash_phase = style.dash_phase;
        self.dash_array = style.dash_array.clone();
        self.flatness = style.flatness;
        self.rgb_stroking = style.rgb_stroking;
        self.rgb_filling = style.rgb_filling;
        self
    }

    fn rounded(&self) -> ShapeRow {
        ShapeRow {
            x: self.x.iter().copied().map(round3).collect(),
            y: self.y.iter().copied().map(round3).collect(),
            ..self.clone()
        }
    }
}

impl ShapeRecord for ShapeRow {
    fn xs(&self) -> &[f64] {
        &self.x
    }

    fn ys(&self) -> &[f64] {
        &self.y
    }

    fn segments(&self) -> &[usize] {
        &self.i
    }

    fn style(&self) -> Option<ShapeStyle> {
        self.has_graphics_state.then(|| ShapeStyle {
            line_width: self.line_width,
            miter_limit: self.miter_limit,
            line_cap: self.line_cap,
            line_join: self.line_join,
            dash_phase: self.dash_phase,
            dash_array: self.dash_array.clone(),
            flatness: self.flatness,
            rgb_stroking: self.rgb_stroking,
            rgb_filling: self.rgb_filling,
        })
    }
}

/// Owned image row.
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapRow {
    pub bbox: BoundingBox,
    pub xobject_key: String,
    pub image_width: u32,
    pub image_height: u32,
    pub bits_per_component: u32,
    pub color_space: String,
    /// `(mimetype, bytes)` of the encoded image.
    pub payload: Option<(String, Vec<u8>)>,
}

impl BitmapRow {
    fn to_tabular(&self) -> Value {
        let (mimetype, data) = match &self.payload {
            Some((m, d)) => (Value::from(m.as_str()), Value::from(hex::encode(d))),
            None => (Value::Null, Value::Null),
        };
        json!([
            round3(self.bbox.l),
            round3(self.bbox.b),
            round3(self.bbox.r),
            round3(self.bbox.t),
            self.xobject_key,
            self.image_width,
            self.image_height,
            self.bits_per_component,
            self.color_space,
            mimetype,
            data,
            self.bbox.coord_origin,
        ])
    }
}

impl BitmapRecord for BitmapRow {
    fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    fn xobject_key(&self) -> &str {
        &self.xobject_key
    }

    fn image_width(&self) -> u32 {
        self.image_width
    }

    fn image_height(&self) -> u32 {
        self.image_height
    }

    fn bits_per_component(&self) -> u32 {
        self.bits_per_component
    }

    fn color_space(&self) -> &str {
        &self.color_space
    }

    fn payload(&self) -> Option<(&str, &[u8])> {
        self.payload
            .as_ref()
            .map(|(m, d)| (m.as_str(), d.as_slice()))
    }
}

/// Owned dimension record; also the serialized dimension format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRow {
    pub page_boundary: BoundaryType,
    #[serde(default)]
    pub angle: f64,
    pub rectangles: PageBoxes,
}

impl DimensionRecord for DimensionRow {
    fn angle(&self) -> f64 {
        self.angle
    }

    fn page_boundary(&self) -> BoundaryType {
        self.page_boundary
    }

    fn boxes(&self) -> PageBoxes {
        self.rectangles
    }
}

/// A page fully decoded by an engine, held as owned rows.
///
/// Hands itself out through [`PageDecoder`] for the structured pipeline and
/// renders itself as tabular JSON for the serialized one.
#[derive(Debug, Clone)]
pub struct DecodedPage {
    pub page_number: usize,
    pub dimension: DimensionRow,
    pub char_cells: Option<Vec<CellRow>>,
    pub word_cells: Option<Vec<CellRow>>,
    pub line_cells: Option<Vec<CellRow>>,
    pub shapes: Option<Vec<ShapeRow>>,
    pub bitmaps: Option<Vec<BitmapRow>>,
    pub timings: TimingCollector,
}

impl DecodedPage {
    /// Tabular page record: `{page_number, timings, original: {...}}`.
    ///
    /// Only summed timings are carried; numbers are rounded to 3 decimals.
    pub fn to_serialized(&self) -> Value {
        let boxes = self.dimension.rectangles;
        let bbox = boxes.get(self.dimension.page_boundary);
        let round_box = |b: [f64; 4]| b.map(round3);

        let mut original = serde_json::Map::new();
        original.insert(
            "dimension".to_string(),
            json!({
                "page_boundary": self.dimension.page_boundary,
                "angle": self.dimension.angle,
                "bbox": round_box(bbox),
                "width": round3(bbox[2] - bbox[0]),
                "height": round3(bbox[3] - bbox[1]),
                "rectangles": {
                    "media-bbox": round_box(boxes.media),
                    "crop-bbox": round_box(boxes.crop),
                    "bleed-bbox": round_box(boxes.bleed),
                    "trim-bbox": round_box(boxes.trim),
                    "art-bbox": round_box(boxes.art),
                },
            }),
        );
        if let Some(cells) = &self.char_cells {
            original.insert("cells".to_string(), cells_table(cells));
        }
        if let Some(cells) = &self.word_cells {
            original.insert("word_cells".to_string(), cells_table(cells));
        }
        if let Some(cells) = &self.line_cells {
            original.insert("line_cells".to_string(), cells_table(cells));
        }
        if let Some(shapes) = &self.shapes {
            let rows: Vec<ShapeRow> = shapes.iter().map(ShapeRow::rounded).collect();
            original.insert("shapes".to_string(), json!(rows));
        }
        if let Some(bitmaps) = &self.bitmaps {
            original.insert(
                "images".to_string(),
                json!({
                    "header": IMAGE_HEADER,
                    "data": bitmaps.iter().map(BitmapRow::to_tabular).collect::<Vec<_>>(),
                }),
            );
        }

        json!({
            "page_number": self.page_number,
            "timings": self.timings.totals(),
            "original": Value::Object(original),
        })
    }
}

fn cells_table(cells: &[CellRow]) -> Value {
    json!({
        "header": CELL_HEADER,
        "data": cells.iter().map(CellRow::to_tabular).collect::<Vec<_>>(),
    })
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn cell_iter(cells: &[CellRow]) -> CellIter<'_> {
    Box::new(cells.iter().map(|c| c as &dyn CellRecord))
}

impl PageDecoder for DecodedPage {
    fn page_number(&self) -> usize {
        self.page_number
    }

    fn dimension(&self) -> &dyn DimensionRecord {
        &self.dimension
    }

    fn char_cells(&self) -> Option<CellIter<'_>> {
        self.char_cells.as_deref().map(cell_iter)
    }

    fn word_cells(&self) -> Option<CellIter<'_>> {
        self.word_cells.as_deref().map(cell_iter)
    }

    fn line_cells(&self) -> Option<CellIter<'_>> {
        self.line_cells.as_deref().map(cell_iter)
    }

    fn shapes(&self) -> Option<ShapeIter<'_>> {
        self.shapes.as_deref().map(|rows| -> ShapeIter<'_> {
            Box::new(rows.iter().map(|r| r as &dyn ShapeRecord))
        })
    }

    fn bitmaps(&self) -> Option<BitmapIter<'_>> {
        self.bitmaps.as_deref().map(|rows| -> BitmapIter<'_> {
            Box::new(rows.iter().map(|r| r as &dyn BitmapRecord))
        })
    }

    fn timings(&self) -> Timings {
        self.timings.to_timings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter() -> DimensionRow {
        let b = [0.0, 0.0, 612.0, 792.0];
        DimensionRow {
            page_boundary: BoundaryType::CropBox,
            angle: 0.0,
            rectangles: PageBoxes {
                media: b,
                crop: b,
                bleed: b,
                trim: b,
                art: b,
            },
        }
    }

    fn page() -> DecodedPage {
        let mut timings = TimingCollector::new();
        timings.add("decode_page", 0.5);
        DecodedPage {
            page_number: 1,
            dimension: letter(),
            char_cells: Some(vec![CellRow {
                rect: BoundingRectangle::from_corners([
                    1.00049, 2.0, 7.0, 2.0, 7.0, 12.0, 1.00049, 12.0,
                ]),
                text: "A".to_string(),
                orig: "A".to_string(),
                font_key: "F1".to_string(),
                font_name: "Helvetica".to_string(),
                widget: false,
                left_to_right: true,
                rendering_mode: 0,
            }]),
            word_cells: None,
            line_cells: None,
            shapes: Some(vec![ShapeRow::line(&[(0.0, 0.0), (10.0, 0.0)])]),
            bitmaps: Some(vec![BitmapRow {
                bbox: BoundingBox::new(0.0, 0.0, 50.0, 50.0),
                xobject_key: "Im0".to_string(),
                image_width: 4,
                image_height: 4,
                bits_per_component: 8,
                color_space: "DeviceGray".to_string(),
                payload: Some(("image/jpeg".to_string(), vec![0xFF, 0xD8])),
            }]),
            timings,
        }
    }

    #[test]
    fn test_serialized_layout() {
        let v = page().to_serialized();
        assert_eq!(v["page_number"], 1);
        assert_eq!(v["timings"]["decode_page"], 0.5);

        let original = &v["original"];
        assert_eq!(original["dimension"]["page_boundary"], "crop_box");
        assert_eq!(original["dimension"]["width"], 612.0);
        assert_eq!(original["cells"]["header"][12], "text");
        assert_eq!(original["cells"]["data"][0][4], 1.0);
        assert!(original.get("word_cells").is_none());
        assert_eq!(original["shapes"][0]["i"], json!([0, 2]));
        assert_eq!(original["images"]["data"][0][10], "ffd8");
        assert_eq!(original["cells"]["data"][0][19], "BOTTOMLEFT");
        assert_eq!(original["images"]["data"][0][11], "BOTTOMLEFT");
    }

    #[test]
    fn test_structured_access() {
        let p = page();
        assert_eq!(p.char_cells().unwrap().count(), 1);
        assert!(p.word_cells().is_none());
        let shape = p.shapes().unwrap().next().unwrap();
        assert!(shape.style().is_none());
        let bitmap = p.bitmaps().unwrap().next().unwrap();
        assert_eq!(bitmap.payload().unwrap().0, "image/jpeg");
        assert_eq!(p.timings().get_count("decode_page"), 1);
    }

    #[test]
    fn test_shape_row_style() {
        let style = ShapeStyle {
            line_width: 2.5,
            dash_array: vec![2.0],
            ..ShapeStyle::default()
        };
        let row = ShapeRow::line(&[(0.0, 0.0), (1.0, 1.0)]).with_style(&style);
        assert_eq!(row.style(), Some(style));

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["has-graphics-state"], true);
        assert_eq!(json["line-width"], 2.5);
    }
}
