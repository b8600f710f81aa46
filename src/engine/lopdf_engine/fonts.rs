//! Font resources: glyph widths and code-to-text decoding.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::objects::{decode_text_simple, get, get_dict, get_name, get_number, number, resolve};
use crate::timings::{font_key, TimingCollector};

/// Glyph advance of simple fonts without a width entry, in 1/1000 em.
const DEFAULT_WIDTH: f64 = 500.0;
/// `/DW` default of CID fonts.
const DEFAULT_CID_WIDTH: f64 = 1000.0;
/// Widest `/W` range expanded into the width table.
const MAX_W_RANGE: u32 = 0xFFFF;

pub(super) const ASCENT: f64 = 0.8;
pub(super) const DESCENT: f64 = -0.2;

/// Where a font dictionary lives; the cache key of decoded fonts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) enum FontSlot {
    Object(ObjectId),
    /// Direct dictionary inside a resource dictionary, keyed by resource name.
    Inline(String),
}

/// Decoded fonts of one page.
pub(super) type FontCache = HashMap<FontSlot, Arc<FontMetrics>>;

/// What the interpreter needs from a font, independent of the document.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct FontMetrics {
    pub base_font: String,
    /// Type0 fonts address glyphs with two-byte codes.
    pub two_byte: bool,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    default_width: f64,
}

impl FontMetrics {
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let base_font = get_name(doc, font, b"BaseFont").unwrap_or_else(|| "unknown".to_string());
        let two_byte = get_name(doc, font, b"Subtype").as_deref() == Some("Type0");

        if two_byte {
            let descendant = match get(doc, font, b"DescendantFonts") {
                Some(Object::Array(arr)) => arr.first().and_then(|o| match resolve(doc, o) {
                    Object::Dictionary(d) => Some(d),
                    _ => None,
                }),
                _ => None,
            };
            let default_width = descendant
                .and_then(|d| get_number(doc, d, b"DW"))
                .unwrap_or(DEFAULT_CID_WIDTH);
            let cid_widths = descendant
                .and_then(|d| match get(doc, d, b"W") {
                    Some(Object::Array(w)) => Some(parse_cid_widths(doc, w)),
                    _ => None,
                })
                .unwrap_or_default();
            return Self {
                base_font,
                two_byte,
                first_char: 0,
                widths: Vec::new(),
                cid_widths,
                default_width,
            };
        }

        let first_char = get_number(doc, font, b"FirstChar").unwrap_or(0.0).max(0.0) as u32;
        let widths = match get(doc, font, b"Widths") {
            Some(Object::Array(arr)) => arr
                .iter()
                .map(|o| number(resolve(doc, o)).unwrap_or(0.0))
                .collect(),
            _ => Vec::new(),
        };
        let default_width = get_dict(doc, font, b"FontDescriptor")
            .and_then(|d| get_number(doc, d, b"MissingWidth"))
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_WIDTH);

        Self {
            base_font,
            two_byte,
            first_char,
            widths,
            cid_widths: HashMap::new(),
            default_width,
        }
    }

    /// Advance of `code` in 1/1000 em.
    pub fn width(&self, code: u32) -> f64 {
        if self.two_byte {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    /// Split a shown string into character codes.
    pub fn codes<'b>(&self, bytes: &'b [u8]) -> Vec<(u32, &'b [u8])> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| {
                    let code = c.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                    (code, c)
                })
                .collect()
        } else {
            bytes.chunks(1).map(|c| (c[0] as u32, c)).collect()
        }
    }
}

/// `/W` array: `c [w1 w2 ...]` and `c_first c_last w` runs.
fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f64> {
    let mut out = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(resolve(doc, &w[i])) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match w.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(run)) => {
                for (k, o) in run.iter().enumerate() {
                    let code = u32::try_from(k).ok().and_then(|k| first.checked_add(k));
                    if let (Some(code), Some(width)) = (code, number(resolve(doc, o))) {
                        out.insert(code, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = number(last).map(|l| l.max(0.0) as u32);
                let width = w.get(i + 2).and_then(|o| number(resolve(doc, o)));
                if let (Some(last), Some(width)) = (last, width) {
                    if last >= first && last - first <= MAX_W_RANGE {
                        for code in first..=last {
                            out.insert(code, width);
                        }
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    out
}

/// Resolve font resource `name` from a `/Font` resource dictionary, decoding
/// its metrics on a cache miss.
///
/// Misses are timed under `decode_font: <BaseFont>`; the elapsed seconds are
/// returned alongside so callers can keep a running total.
pub(super) fn load_font<'d>(
    doc: &'d Document,
    font_resources: &'d Dictionary,
    name: &str,
    cache: &mut FontCache,
    timings: &mut TimingCollector,
) -> Option<(&'d Dictionary, Arc<FontMetrics>, f64)> {
    let entry = font_resources.get(name.as_bytes()).ok()?;
    let (slot, dict) = match entry {
        Object::Reference(id) => (FontSlot::Object(*id), doc.get_dictionary(*id).ok()?),
        Object::Dictionary(d) => (FontSlot::Inline(name.to_string()), d),
        _ => return None,
    };

    if let Some(metrics) = cache.get(&slot) {
        return Some((dict, metrics.clone(), 0.0));
    }

    let start = Instant::now();
    let metrics = Arc::new(FontMetrics::from_dict(doc, dict));
    let elapsed = start.elapsed().as_secs_f64();
    timings.add(font_key(&metrics.base_font), elapsed);
    log::trace!("decoded font {} ({})", name, metrics.base_font);

    cache.insert(slot, metrics.clone());
    Some((dict, metrics, elapsed))
}

/// Decode the glyphs of a shown string as `(code, text)` pairs.
///
/// Codes that the font encoding cannot map fall back to a plain decode of
/// their bytes.
pub(super) fn decode_glyphs(
    doc: &Document,
    font: &Dictionary,
    metrics: &FontMetrics,
    bytes: &[u8],
) -> Vec<(u32, String)> {
    let encoding = font.get_font_encoding(doc).ok();
    metrics
        .codes(bytes)
        .into_iter()
        .map(|(code, raw)| {
            let decoded = encoding
                .as_ref()
                .and_then(|enc| Document::decode_text(enc, raw).ok())
                .filter(|s| !s.is_empty());
            let text = match decoded {
                Some(s) => s,
                None if metrics.two_byte => char::from_u32(code)
                    .map(String::from)
                    .unwrap_or_default(),
                None => decode_text_simple(raw),
            };
            (code, text)
        })
        .collect()
}
