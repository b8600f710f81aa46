//! Adapters over the tabular (serialized) page layout.
//!
//! Tables are `{"header": [...], "data": [[...], ...]}`. Columns are found by
//! name, so engines may reorder them or add columns of their own.

use serde_json::Value;

use crate::engine::{BitmapRecord, CellRecord};
use crate::error::{Error, Result};
use crate::model::{BoundingBox, BoundingRectangle, CoordOrigin};

/// A header/rows table borrowed from a page record.
pub(crate) struct Table<'a> {
    name: &'static str,
    header: Vec<&'a str>,
    rows: &'a [Value],
}

impl<'a> Table<'a> {
    pub(crate) fn parse(name: &'static str, value: &'a Value) -> Result<Self> {
        let header = value
            .get("header")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::missing(&format!("{}.header", name)))?
            .iter()
            .map(|h| {
                h.as_str().ok_or_else(|| {
                    Error::ContractViolation(format!("non-string column name in `{}`", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let rows = value
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::missing(&format!("{}.data", name)))?;

        Ok(Self {
            name,
            header,
            rows: rows.as_slice(),
        })
    }

    fn column(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|h| *h == column)
    }

    fn require(&self, column: &str) -> Result<usize> {
        self.column(column)
            .ok_or_else(|| Error::missing(&format!("{}.{}", self.name, column)))
    }

    fn row(&self, i: usize) -> Result<&'a [Value]> {
        let row = self.rows[i].as_array().ok_or_else(|| {
            Error::ContractViolation(format!("row {} of `{}` is not an array", i, self.name))
        })?;
        if row.len() < self.header.len() {
            return Err(Error::ContractViolation(format!(
                "row {} of `{}` has {} values for {} columns",
                i,
                self.name,
                row.len(),
                self.header.len()
            )));
        }
        Ok(row.as_slice())
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Every row read as a text cell.
    pub(crate) fn cells(&self) -> Result<Vec<TabularCell<'a>>> {
        let columns = CellColumns::locate(self)?;
        (0..self.len())
            .map(|i| columns.read(self.name, i, self.row(i)?))
            .collect()
    }

    /// Every row read as an image placement.
    pub(crate) fn bitmaps(&self) -> Result<Vec<TabularBitmap<'a>>> {
        let columns = ImageColumns::locate(self)?;
        (0..self.len())
            .map(|i| columns.read(self.name, i, self.row(i)?))
            .collect()
    }
}

const QUAD: [&str; 8] = [
    "r_x0", "r_y0", "r_x1", "r_y1", "r_x2", "r_y2", "r_x3", "r_y3",
];
const BOX: [&str; 4] = ["x0", "y0", "x1", "y1"];

/// Where the geometry of a cell row lives.
enum Corners {
    /// Explicit four corners.
    Quad([usize; 8]),
    /// Min/max box only; corners are derived.
    Box([usize; 4]),
}

struct CellColumns {
    corners: Corners,
    text: usize,
    orig: Option<usize>,
    rendering_mode: Option<usize>,
    font_key: Option<usize>,
    font_name: Option<usize>,
    widget: Option<usize>,
    left_to_right: Option<usize>,
    coord_origin: Option<usize>,
}

impl CellColumns {
    fn locate(table: &Table<'_>) -> Result<Self> {
        let quad: Option<Vec<usize>> = QUAD.iter().map(|c| table.column(c)).collect();
        let corners = match quad {
            Some(q) => Corners::Quad([q[0], q[1], q[2], q[3], q[4], q[5], q[6], q[7]]),
            None => {
                let b = BOX
                    .iter()
                    .map(|c| table.require(c))
                    .collect::<Result<Vec<_>>>()?;
                Corners::Box([b[0], b[1], b[2], b[3]])
            }
        };

        Ok(Self {
            corners,
            text: table.require("text")?,
            orig: table.column("orig"),
            rendering_mode: table.column("rendering-mode"),
            font_key: table.column("font-key"),
            font_name: table.column("font-name"),
            widget: table.column("widget"),
            left_to_right: table.column("left_to_right"),
            coord_origin: table.column("coord-origin"),
        })
    }

    fn read<'a>(&self, table: &str, i: usize, row: &'a [Value]) -> Result<TabularCell<'a>> {
        let at = Cursor { table, row: i, values: row };
        let mut rect = match &self.corners {
            Corners::Quad(q) => {
                let mut c = [0.0; 8];
                for (slot, &col) in c.iter_mut().zip(q.iter()) {
                    *slot = at.number(col)?;
                }
                BoundingRectangle::from_corners(c)
            }
            Corners::Box(b) => BoundingRectangle::from_bbox(&BoundingBox::new(
                at.number(b[0])?,
                at.number(b[1])?,
                at.number(b[2])?,
                at.number(b[3])?,
            )),
        };
        rect.coord_origin = at.origin(self.coord_origin)?;

        let text = at.string(self.text)?;
        Ok(TabularCell {
            rect,
            text,
            orig: self.orig.map(|c| at.string(c)).transpose()?.unwrap_or(text),
            font_key: self.font_key.map(|c| at.string(c)).transpose()?.unwrap_or(""),
            font_name: self.font_name.map(|c| at.string(c)).transpose()?.unwrap_or(""),
            widget: self.widget.map(|c| at.boolean(c)).transpose()?.unwrap_or(false),
            left_to_right: self
                .left_to_right
                .map(|c| at.boolean(c))
                .transpose()?
                .unwrap_or(true),
            rendering_mode: self
                .rendering_mode
                .map(|c| at.integer(c))
                .transpose()?
                .unwrap_or(0) as i32,
        })
    }
}

struct ImageColumns {
    bbox: [usize; 4],
    xobject_key: Option<usize>,
    width: Option<usize>,
    height: Option<usize>,
    bits_per_component: Option<usize>,
    color_space: Option<usize>,
    mimetype: Option<usize>,
    data: Option<usize>,
    coord_origin: Option<usize>,
}

impl ImageColumns {
    fn locate(table: &Table<'_>) -> Result<Self> {
        Ok(Self {
            bbox: [
                table.require("x0")?,
                table.require("y0")?,
                table.require("x1")?,
                table.require("y1")?,
            ],
            xobject_key: table.column("xobject-key"),
            width: table.column("image-width"),
            height: table.column("image-height"),
            bits_per_component: table.column("bits-per-component"),
            color_space: table.column("color-space"),
            mimetype: table.column("mimetype"),
            data: table.column("data"),
            coord_origin: table.column("coord-origin"),
        })
    }

    fn read<'a>(&self, table: &str, i: usize, row: &'a [Value]) -> Result<TabularBitmap<'a>> {
        let at = Cursor { table, row: i, values: row };
        let [l, b, r, t] = self.bbox;
        let bbox = BoundingBox {
            coord_origin: at.origin(self.coord_origin)?,
            ..BoundingBox::new(at.number(l)?, at.number(b)?, at.number(r)?, at.number(t)?)
        };

        let mimetype = self.mimetype.map(|c| at.optional_string(c)).transpose()?.flatten();
        let data = self.data.map(|c| at.optional_string(c)).transpose()?.flatten();
        let payload = match (mimetype, data) {
            (Some(m), Some(hex_data)) => {
                let bytes = hex::decode(hex_data).map_err(|e| {
                    Error::ContractViolation(format!(
                        "row {} of `{}` carries undecodable image data: {}",
                        i, table, e
                    ))
                })?;
                Some((m, bytes))
            }
            _ => None,
        };

        let dim = |col: Option<usize>| -> Result<u32> {
            Ok(col.map(|c| at.integer(c)).transpose()?.unwrap_or(0).max(0) as u32)
        };

        Ok(TabularBitmap {
            bbox,
            xobject_key: self.xobject_key.map(|c| at.string(c)).transpose()?.unwrap_or(""),
            image_width: dim(self.width)?,
            image_height: dim(self.height)?,
            bits_per_component: dim(self.bits_per_component)?,
            color_space: self.color_space.map(|c| at.string(c)).transpose()?.unwrap_or(""),
            payload,
        })
    }
}

/// Typed access to one row, with row/column context on failure.
struct Cursor<'t, 'a> {
    table: &'t str,
    row: usize,
    values: &'a [Value],
}

impl<'t, 'a> Cursor<'t, 'a> {
    fn bad(&self, col: usize, expected: &str) -> Error {
        Error::ContractViolation(format!(
            "row {} of `{}`: column {} is not {}",
            self.row, self.table, col, expected
        ))
    }

    fn number(&self, col: usize) -> Result<f64> {
        self.values[col]
            .as_f64()
            .ok_or_else(|| self.bad(col, "a number"))
    }

    fn integer(&self, col: usize) -> Result<i64> {
        let v = &self.values[col];
        v.as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .ok_or_else(|| self.bad(col, "an integer"))
    }

    fn string(&self, col: usize) -> Result<&'a str> {
        self.values[col]
            .as_str()
            .ok_or_else(|| self.bad(col, "a string"))
    }

    fn optional_string(&self, col: usize) -> Result<Option<&'a str>> {
        match &self.values[col] {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.as_str())),
            _ => Err(self.bad(col, "a string or null")),
        }
    }

    /// Rows without the column are in PDF user space.
    fn origin(&self, col: Option<usize>) -> Result<CoordOrigin> {
        match col {
            Some(c) => serde_json::from_value(self.values[c].clone())
                .map_err(|_| self.bad(c, "a coordinate origin")),
            None => Ok(CoordOrigin::BottomLeft),
        }
    }

    /// Booleans may also come as 0/1.
    fn boolean(&self, col: usize) -> Result<bool> {
        let v = &self.values[col];
        v.as_bool()
            .or_else(|| v.as_i64().map(|n| n != 0))
            .ok_or_else(|| self.bad(col, "a boolean"))
    }
}

/// One row of a cell table.
#[derive(Debug, Clone)]
pub(crate) struct TabularCell<'a> {
    rect: BoundingRectangle,
    text: &'a str,
    orig: &'a str,
    font_key: &'a str,
    font_name: &'a str,
    widget: bool,
    left_to_right: bool,
    rendering_mode: i32,
}

impl CellRecord for TabularCell<'_> {
    fn rect(&self) -> BoundingRectangle {
        self.rect
    }

    fn text(&self) -> &str {
        self.text
    }

    fn orig(&self) -> &str {
        self.orig
    }

    fn font_key(&self) -> &str {
        self.font_key
    }

    fn font_name(&self) -> &str {
        self.font_name
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

/// One row of an image table.
#[derive(Debug, Clone)]
pub(crate) struct TabularBitmap<'a> {
    bbox: BoundingBox,
    xobject_key: &'a str,
    image_width: u32,
    image_height: u32,
    bits_per_component: u32,
    color_space: &'a str,
    payload: Option<(&'a str, Vec<u8>)>,
}

impl BitmapRecord for TabularBitmap<'_> {
    fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    fn xobject_key(&self) -> &str {
        self.xobject_key
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
        self.color_space
    }

    fn payload(&self) -> Option<(&str, &[u8])> {
        self.payload.as_ref().map(|(m, d)| (*m, d.as_slice()))
    }
}
