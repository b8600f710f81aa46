//! Canonical page and document model.
//!
//! Both decode pipelines produce these types; nothing here depends on
//! which pipeline (or which engine) supplied the data.

mod bitmap;
mod cell;
mod document;
mod geometry;
mod page;
mod shape;

pub use bitmap::{BitmapImage, BitmapResource, ImagePlacement};
pub use cell::{TextCell, TextCellUnit, TextDirection};
pub use document::{DocumentAnnotations, PdfMetadata, TocEntry, TOC_ROOT_TITLE};
pub use geometry::{
    BoundaryType, BoundingBox, BoundingRectangle, Coord2D, CoordOrigin, PageBoxes, PageGeometry,
};
pub use page::SegmentedPage;
pub use shape::{Shape, ShapeStyle};
