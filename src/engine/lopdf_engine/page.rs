//! Decoding of a single page into a [`DecodedPage`].

use std::time::Instant;

use lopdf::{Dictionary, Document, Object, ObjectId};
use unicode_normalization::UnicodeNormalization;

use super::content::{appearance_matrix, form_bbox, form_matrix, Interpreter, Matrix};
use super::fonts::FontCache;
use super::objects::{get, get_dict, get_name, inherited, number, rect, resolve};
use crate::engine::{CellRow, DecodedPage, DimensionRow};
use crate::error::Result;
use crate::model::{BoundaryType, PageBoxes};
use crate::parser::DecodeConfig;
use crate::segment::{MergeSanitizer, Sanitizer};
use crate::timings::{
    TimingCollector, CREATE_LINE_CELLS, CREATE_WORD_CELLS, DECODE_ANNOTS, DECODE_CONTENTS,
    DECODE_DIMENSIONS, DECODE_PAGE, DECODE_RESOURCES, SANITISE_CONTENTS,
};

/// Media box of pages that have none.
const US_LETTER: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Decode page `index` (0-based) of `doc`.
pub(super) fn decode_page(
    doc: &Document,
    page_id: ObjectId,
    index: usize,
    fonts: &mut FontCache,
    config: &DecodeConfig,
) -> Result<DecodedPage> {
    let start = Instant::now();
    let mut timings = TimingCollector::new();
    let page = doc.get_dictionary(page_id)?;

    let boundary = config.page_boundary.unwrap_or_default();
    let dimension = timings.time(DECODE_DIMENSIONS, || dimension(doc, page, boundary));

    let resources = timings.time(DECODE_RESOURCES, || {
        inherited(doc, page, b"Resources").and_then(|r| match r {
            Object::Dictionary(d) => Some(d),
            _ => None,
        })
    });

    let mut interp = Interpreter::new(doc, fonts);
    let page_resources = interp.resources(resources);

    let contents_start = Instant::now();
    interp.run(&page_content(doc, page), &page_resources, Matrix::IDENTITY, 0)?;
    let contents_elapsed = contents_start.elapsed().as_secs_f64();

    let annots_start = Instant::now();
    paint_widgets(doc, page, &mut interp);
    let annots_elapsed = annots_start.elapsed().as_secs_f64();

    let (content, resource_timings) = interp.finish();
    timings.merge(&resource_timings);
    timings.add(DECODE_CONTENTS, contents_elapsed);
    timings.add(DECODE_ANNOTS, annots_elapsed);

    let mut chars = content.chars;
    if config.do_sanitization {
        timings.time(SANITISE_CONTENTS, || sanitise(&mut chars));
    }

    let word_cells = config.create_word_cells.then(|| {
        timings.time(CREATE_WORD_CELLS, || {
            let mut sanitizer = MergeSanitizer::new();
            sanitizer.set_char_cells(chars.clone());
            sanitizer.create_word_cells(&config.word_merge())
        })
    });
    let line_cells = config.create_line_cells.then(|| {
        timings.time(CREATE_LINE_CELLS, || {
            let mut sanitizer = MergeSanitizer::new();
            sanitizer.set_char_cells(chars.clone());
            sanitizer.create_line_cells(&config.line_merge())
        })
    });

    let mut shapes = content.shapes;
    if let Some(max) = config.max_num_shapes {
        shapes.truncate(max);
    }
    let mut bitmaps = content.bitmaps;
    if let Some(max) = config.max_num_bitmaps {
        bitmaps.truncate(max);
    }

    timings.add(DECODE_PAGE, start.elapsed().as_secs_f64());
    log::trace!(
        "page {}: {} chars, {} shapes, {} bitmaps",
        index + 1,
        chars.len(),
        shapes.len(),
        bitmaps.len()
    );

    Ok(DecodedPage {
        page_number: index + 1,
        dimension,
        char_cells: config.keep_char_cells.then_some(chars),
        word_cells,
        line_cells,
        shapes: config.keep_shapes.then_some(shapes),
        bitmaps: config.keep_bitmaps.then_some(bitmaps),
        timings,
    })
}

/// All five boxes, falling back crop -> media and bleed/trim/art -> crop.
fn dimension(doc: &Document, page: &Dictionary, boundary: BoundaryType) -> DimensionRow {
    let page_box = |key: &[u8]| inherited(doc, page, key).and_then(|o| rect(doc, o));

    let media = page_box(b"MediaBox").unwrap_or(US_LETTER);
    let crop = page_box(b"CropBox").unwrap_or(media);
    let rectangles = PageBoxes {
        media,
        crop,
        bleed: page_box(b"BleedBox").unwrap_or(crop),
        trim: page_box(b"TrimBox").unwrap_or(crop),
        art: page_box(b"ArtBox").unwrap_or(crop),
    };
    let angle = inherited(doc, page, b"Rotate").and_then(number).unwrap_or(0.0);

    DimensionRow {
        page_boundary: boundary,
        angle,
        rectangles,
    }
}

/// Concatenated, decompressed `/Contents` streams.
fn page_content(doc: &Document, page: &Dictionary) -> Vec<u8> {
    let streams: Vec<&Object> = match get(doc, page, b"Contents") {
        Some(Object::Array(parts)) => parts.iter().map(|p| resolve(doc, p)).collect(),
        Some(single) => vec![single],
        None => Vec::new(),
    };

    let mut content = Vec::new();
    for obj in streams {
        if let Object::Stream(s) = obj {
            let data = s.decompressed_content().unwrap_or_else(|_| s.content.clone());
            content.extend_from_slice(&data);
            content.push(b'\n');
        }
    }
    content
}

/// Paint the normal appearance of every widget annotation on the page.
fn paint_widgets<'d>(doc: &'d Document, page: &'d Dictionary, interp: &mut Interpreter<'d, '_>) {
    let Some(Object::Array(annots)) = get(doc, page, b"Annots") else {
        return;
    };

    for annot in annots {
        let Object::Dictionary(annot) = resolve(doc, annot) else {
            continue;
        };
        if get_name(doc, annot, b"Subtype").as_deref() != Some("Widget") {
            continue;
        }
        let Some(stream) = appearance_stream(doc, annot) else {
            continue;
        };
        let Some(area) = annot.get(b"Rect").ok().and_then(|r| rect(doc, r)) else {
            continue;
        };
        let bbox = form_bbox(doc, &stream.dict).unwrap_or(area);
        let ctm = appearance_matrix(bbox, form_matrix(doc, &stream.dict), area);
        if let Err(e) = interp.run_appearance(stream, ctm) {
            log::debug!("widget appearance skipped: {}", e);
        }
    }
}

/// `/AP /N`, picking the `/AS` state when the appearance has several.
fn appearance_stream<'d>(doc: &'d Document, annot: &'d Dictionary) -> Option<&'d lopdf::Stream> {
    let ap = get_dict(doc, annot, b"AP")?;
    match get(doc, ap, b"N")? {
        Object::Stream(s) => Some(s),
        Object::Dictionary(states) => {
            let state = get_name(doc, annot, b"AS")?;
            match get(doc, states, state.as_bytes())? {
                Object::Stream(s) => Some(s),
                _ => None,
            }
        }
        _ => None,
    }
}

/// NFKC-normalise display text; `orig` keeps the decoded text.
fn sanitise(cells: &mut [CellRow]) {
    for cell in cells {
        cell.text = cell.orig.nfkc().collect();
    }
}
