//! Vector shapes. A line is a shape without style.

use serde::{Deserialize, Serialize};

use super::geometry::{BoundingBox, Coord2D, CoordOrigin};

/// Stroke and fill state captured when the path was painted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub line_width: f64,
    pub miter_limit: f64,
    /// 0 butt, 1 round, 2 projecting square.
    pub line_cap: i32,
    /// 0 miter, 1 round, 2 bevel.
    pub line_join: i32,
    pub dash_phase: f64,
    pub dash_array: Vec<f64>,
    pub flatness: f64,
    pub rgb_stroking: [u8; 3],
    pub rgb_filling: [u8; 3],
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            miter_limit: 10.0,
            line_cap: 0,
            line_join: 0,
            dash_phase: 0.0,
            dash_array: Vec::new(),
            flatness: 0.0,
            rgb_stroking: [0, 0, 0],
            rgb_filling: [0, 0, 0],
        }
    }
}

/// A polyline on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Zero-based position within the page's shape list.
    pub index: usize,
    /// Index of the painted path this polyline was split from.
    pub parent_id: usize,
    pub points: Vec<Coord2D>,
    #[serde(default)]
    pub coord_origin: CoordOrigin,
    #[serde(default)]
    pub style: Option<ShapeStyle>,
}

impl Shape {
    /// Whether this is a plain line (no graphics state).
    pub fn is_line(&self) -> bool {
        self.style.is_none()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total polyline length.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let init = BoundingBox::new(first.x, first.y, first.x, first.y);
        Some(self.points.iter().fold(init, |acc, p| {
            acc.union(&BoundingBox::new(p.x, p.y, p.x, p.y))
        }))
    }
}
