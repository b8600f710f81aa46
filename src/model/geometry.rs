//! Coordinates, boxes and page geometry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A point in page space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord2D {
    pub x: f64,
    pub y: f64,
}

impl Coord2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Coord2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Where the y axis starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordOrigin {
    /// PDF user space: y grows upwards.
    #[default]
    #[serde(rename = "BOTTOMLEFT")]
    BottomLeft,
    /// Image space: y grows downwards.
    #[serde(rename = "TOPLEFT")]
    TopLeft,
}

/// Axis-aligned box given by its left, bottom, right and top edges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub l: f64,
    pub b: f64,
    pub r: f64,
    pub t: f64,
    #[serde(default)]
    pub coord_origin: CoordOrigin,
}

impl BoundingBox {
    /// Box in bottom-left coordinates; edges are normalised so `l <= r`, `b <= t`.
    pub fn new(l: f64, b: f64, r: f64, t: f64) -> Self {
        Self {
            l: l.min(r),
            b: b.min(t),
            r: l.max(r),
            t: b.max(t),
            coord_origin: CoordOrigin::BottomLeft,
        }
    }

    /// From a PDF rectangle array `[x0, y0, x1, y1]`.
    pub fn from_array(a: [f64; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.l, self.b, self.r, self.t]
    }

    pub fn width(&self) -> f64 {
        (self.r - self.l).abs()
    }

    pub fn height(&self) -> f64 {
        (self.t - self.b).abs()
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            l: self.l.min(other.l),
            b: self.b.min(other.b),
            r: self.r.max(other.r),
            t: self.t.max(other.t),
            coord_origin: self.coord_origin,
        }
    }

    /// Flip a top-left box into bottom-left coordinates for a page of `page_height`.
    pub fn to_bottom_left_origin(&self, page_height: f64) -> BoundingBox {
        match self.coord_origin {
            CoordOrigin::BottomLeft => *self,
            CoordOrigin::TopLeft => BoundingBox {
                l: self.l,
                b: page_height - self.b,
                r: self.r,
                t: page_height - self.t,
                coord_origin: CoordOrigin::BottomLeft,
            }
            .normalized(),
        }
    }

    fn normalized(self) -> BoundingBox {
        BoundingBox {
            coord_origin: self.coord_origin,
            ..BoundingBox::new(self.l, self.b, self.r, self.t)
        }
    }
}

/// Four explicit corners, counter-clockwise from the glyph origin.
///
/// `r0` is the baseline start, `r1` the baseline end, `r2` the top end and
/// `r3` the top start. Rotated text keeps its orientation in the corner order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingRectangle {
    pub r_x0: f64,
    pub r_y0: f64,
    pub r_x1: f64,
    pub r_y1: f64,
    pub r_x2: f64,
    pub r_y2: f64,
    pub r_x3: f64,
    pub r_y3: f64,
    #[serde(default)]
    pub coord_origin: CoordOrigin,
}

impl BoundingRectangle {
    /// From the eight corner coordinates `[x0, y0, x1, y1, x2, y2, x3, y3]`.
    pub fn from_corners(c: [f64; 8]) -> Self {
        Self {
            r_x0: c[0],
            r_y0: c[1],
            r_x1: c[2],
            r_y1: c[3],
            r_x2: c[4],
            r_y2: c[5],
            r_x3: c[6],
            r_y3: c[7],
            coord_origin: CoordOrigin::BottomLeft,
        }
    }

    /// Expand a min/max box into explicit corners.
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self {
            r_x0: bbox.l,
            r_y0: bbox.b,
            r_x1: bbox.r,
            r_y1: bbox.b,
            r_x2: bbox.r,
            r_y2: bbox.t,
            r_x3: bbox.l,
            r_y3: bbox.t,
            coord_origin: bbox.coord_origin,
        }
    }

    pub fn corners(&self) -> [Coord2D; 4] {
        [
            Coord2D::new(self.r_x0, self.r_y0),
            Coord2D::new(self.r_x1, self.r_y1),
            Coord2D::new(self.r_x2, self.r_y2),
            Coord2D::new(self.r_x3, self.r_y3),
        ]
    }

    pub fn to_array(&self) -> [f64; 8] {
        [
            self.r_x0, self.r_y0, self.r_x1, self.r_y1, self.r_x2, self.r_y2, self.r_x3, self.r_y3,
        ]
    }

    /// Length of the baseline `r0 -> r1`.
    pub fn width(&self) -> f64 {
        Coord2D::new(self.r_x0, self.r_y0).distance(&Coord2D::new(self.r_x1, self.r_y1))
    }

    /// Length of the left edge `r0 -> r3`.
    pub fn height(&self) -> f64 {
        Coord2D::new(self.r_x0, self.r_y0).distance(&Coord2D::new(self.r_x3, self.r_y3))
    }

    /// Baseline angle in degrees.
    pub fn angle(&self) -> f64 {
        (self.r_y1 - self.r_y0).atan2(self.r_x1 - self.r_x0).to_degrees()
    }

    pub fn to_bounding_box(&self) -> BoundingBox {
        let xs = [self.r_x0, self.r_x1, self.r_x2, self.r_x3];
        let ys = [self.r_y0, self.r_y1, self.r_y2, self.r_y3];
        BoundingBox {
            l: xs.iter().copied().fold(f64::INFINITY, f64::min),
            b: ys.iter().copied().fold(f64::INFINITY, f64::min),
            r: xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            t: ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            coord_origin: self.coord_origin,
        }
    }

    /// Axis-aligned rectangle covering both.
    pub fn union(&self, other: &BoundingRectangle) -> BoundingRectangle {
        BoundingRectangle::from_bbox(&self.to_bounding_box().union(&other.to_bounding_box()))
    }

    pub fn to_bottom_left_origin(&self, page_height: f64) -> BoundingRectangle {
        match self.coord_origin {
            CoordOrigin::BottomLeft => *self,
            CoordOrigin::TopLeft => BoundingRectangle {
                r_y0: page_height - self.r_y0,
                r_y1: page_height - self.r_y1,
                r_y2: page_height - self.r_y2,
                r_y3: page_height - self.r_y3,
                coord_origin: CoordOrigin::BottomLeft,
                ..*self
            },
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Which PDF page box defines the page extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryType {
    ArtBox,
    BleedBox,
    #[default]
    CropBox,
    MediaBox,
    TrimBox,
}

impl BoundaryType {
    pub const ALL: [BoundaryType; 5] = [
        BoundaryType::ArtBox,
        BoundaryType::BleedBox,
        BoundaryType::CropBox,
        BoundaryType::MediaBox,
        BoundaryType::TrimBox,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryType::ArtBox => "art_box",
            BoundaryType::BleedBox => "bleed_box",
            BoundaryType::CropBox => "crop_box",
            BoundaryType::MediaBox => "media_box",
            BoundaryType::TrimBox => "trim_box",
        }
    }
}

impl fmt::Display for BoundaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundaryType {
    type Err = Error;

    /// Accepts `crop`, `crop_box`, `crop-box` and `CropBox` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match norm.trim_end_matches("box") {
            "art" => Ok(BoundaryType::ArtBox),
            "bleed" => Ok(BoundaryType::BleedBox),
            "crop" => Ok(BoundaryType::CropBox),
            "media" => Ok(BoundaryType::MediaBox),
            "trim" => Ok(BoundaryType::TrimBox),
            _ => Err(Error::InvalidArgument(format!(
                "unknown page boundary: {}",
                s
            ))),
        }
    }
}

/// The five page boxes as `[x0, y0, x1, y1]` arrays.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageBoxes {
    #[serde(rename = "media-bbox")]
    pub media: [f64; 4],
    #[serde(rename = "crop-bbox")]
    pub crop: [f64; 4],
    #[serde(rename = "bleed-bbox")]
    pub bleed: [f64; 4],
    #[serde(rename = "trim-bbox")]
    pub trim: [f64; 4],
    #[serde(rename = "art-bbox")]
    pub art: [f64; 4],
}

impl PageBoxes {
    pub fn get(&self, boundary: BoundaryType) -> [f64; 4] {
        match boundary {
            BoundaryType::ArtBox => self.art,
            BoundaryType::BleedBox => self.bleed,
            BoundaryType::CropBox => self.crop,
            BoundaryType::MediaBox => self.media,
            BoundaryType::TrimBox => self.trim,
        }
    }
}

/// Page extent, rotation and all five boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Rotation in degrees as given by `/Rotate`.
    pub angle: f64,
    pub boundary_type: BoundaryType,
    /// Page rectangle for `boundary_type`, always in bottom-left coordinates.
    pub rect: BoundingRectangle,
    pub art_bbox: BoundingBox,
    pub media_bbox: BoundingBox,
    pub bleed_bbox: BoundingBox,
    pub trim_bbox: BoundingBox,
    pub crop_bbox: BoundingBox,
}

impl PageGeometry {
    pub fn new(angle: f64, boundary_type: BoundaryType, boxes: &PageBoxes) -> Self {
        let bbox = BoundingBox::from_array(boxes.get(boundary_type));
        Self {
            angle,
            boundary_type,
            rect: BoundingRectangle::from_bbox(&bbox),
            art_bbox: BoundingBox::from_array(boxes.art),
            media_bbox: BoundingBox::from_array(boxes.media),
            bleed_bbox: BoundingBox::from_array(boxes.bleed),
            trim_bbox: BoundingBox::from_array(boxes.trim),
            crop_bbox: BoundingBox::from_array(boxes.crop),
        }
    }

    /// The box selected by `boundary_type`.
    pub fn boundary_bbox(&self) -> &BoundingBox {
        match self.boundary_type {
            BoundaryType::ArtBox => &self.art_bbox,
            BoundaryType::BleedBox => &self.bleed_bbox,
            BoundaryType::CropBox => &self.crop_bbox,
            BoundaryType::MediaBox => &self.media_bbox,
            BoundaryType::TrimBox => &self.trim_bbox,
        }
    }

    pub fn width(&self) -> f64 {
        self.rect.width()
    }

    pub fn height(&self) -> f64 {
        self.rect.height()
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        let letter = [0.0, 0.0, 612.0, 792.0];
        let boxes = PageBoxes {
            media: letter,
            crop: letter,
            bleed: letter,
            trim: letter,
            art: letter,
        };
        Self::new(0.0, BoundaryType::CropBox, &boxes)
    }
}
