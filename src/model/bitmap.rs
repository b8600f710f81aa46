//! Bitmap resources placed on a page.

use serde::{Deserialize, Serialize};

use super::geometry::BoundingRectangle;

/// How the image bytes are carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagePlacement {
    /// Encoded image data is attached.
    Embedded,
    /// Only the placement is known.
    #[default]
    Placeholder,
}

/// Encoded image bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitmapImage {
    /// MIME type of `data`, e.g. `image/jpeg`.
    pub mimetype: String,
    pub data: Vec<u8>,
}

/// An image XObject drawn on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitmapResource {
    pub index: usize,
    pub rect: BoundingRectangle,
    /// Resource name of the XObject, e.g. `Im0`.
    pub xobject_key: String,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    pub bits_per_component: u32,
    pub color_space: String,
    pub image: Option<BitmapImage>,
    pub mode: ImagePlacement,
}

impl BitmapResource {
    pub fn is_embedded(&self) -> bool {
        self.mode == ImagePlacement::Embedded
    }
}
