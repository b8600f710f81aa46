//! Content stream interpretation.
//!
//! Walks the operators of a page (and of the form XObjects it paints),
//! tracking the graphics and text state, and emits one cell per glyph,
//! one shape per painted path and one bitmap per placed image.

use std::sync::Arc;
use std::time::Instant;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, Stream};
use unicode_bidi::{bidi_class, BidiClass};

use super::fonts::{decode_glyphs, load_font, FontCache, FontMetrics, ASCENT, DESCENT};
use super::objects::{get, get_dict, get_name, get_number, name, number, rect, resolve};
use crate::engine::{BitmapRow, CellRow, ShapeRow};
use crate::error::Result;
use crate::model::{BoundingBox, BoundingRectangle, ShapeStyle};
use crate::timings::{TimingCollector, DECODE_FONTS, DECODE_FONTS_TOTAL, DECODE_GRPHS, DECODE_XOBJECTS};

/// Form XObjects nested deeper than this are not painted.
pub(super) const MAX_FORM_DEPTH: usize = 8;

/// Affine transform `[a b c d e f]` acting on row vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// `self` applied first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn from_operands(args: &[Object]) -> Option<Matrix> {
        if args.len() < 6 {
            return None;
        }
        let v: Vec<f64> = args[..6].iter().map(number).collect::<Option<_>>()?;
        Some(Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }

    pub(super) fn from_object(doc: &Document, obj: &Object) -> Option<Matrix> {
        match resolve(doc, obj) {
            Object::Array(arr) => {
                let resolved: Vec<Object> = arr.iter().map(|o| resolve(doc, o).clone()).collect();
                Matrix::from_operands(&resolved)
            }
            _ => None,
        }
    }
}

/// The resource dictionaries a content stream can refer to by name.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Resources<'d> {
    fonts: Option<&'d Dictionary>,
    ext_gstates: Option<&'d Dictionary>,
    xobjects: Option<&'d Dictionary>,
}

impl<'d> Resources<'d> {
    /// Resolve the sub-dictionaries of a `/Resources` dictionary.
    ///
    /// Fonts named here are decoded up front so that their cost shows up in
    /// the font timings rather than in content decoding.
    pub fn resolve(
        doc: &'d Document,
        dict: Option<&'d Dictionary>,
        fonts: &mut FontCache,
        timings: &mut TimingCollector,
    ) -> Self {
        let Some(dict) = dict else {
            return Self::default();
        };
        let ext_gstates = timings.time(DECODE_GRPHS, || get_dict(doc, dict, b"ExtGState"));
        let xobjects = timings.time(DECODE_XOBJECTS, || get_dict(doc, dict, b"XObject"));

        let start = Instant::now();
        let font_dict = get_dict(doc, dict, b"Font");
        let mut fonts_total = 0.0;
        if let Some(font_dict) = font_dict {
            let keys: Vec<String> = font_dict
                .iter()
                .map(|(k, _)| String::from_utf8_lossy(k).into_owned())
                .collect();
            for key in keys {
                if let Some((_, _, elapsed)) = load_font(doc, font_dict, &key, fonts, timings) {
                    fonts_total += elapsed;
                }
            }
        }
        timings.add(DECODE_FONTS, start.elapsed().as_secs_f64());
        timings.add(DECODE_FONTS_TOTAL, fonts_total);

        Self {
            fonts: font_dict,
            ext_gstates,
            xobjects,
        }
    }
}

/// Font selected by `Tf`.
#[derive(Debug, Clone)]
struct ActiveFont<'d> {
    key: String,
    dict: &'d Dictionary,
    metrics: Arc<FontMetrics>,
}

#[derive(Debug, Clone)]
struct TextState<'d> {
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    font_size: f64,
    rise: f64,
    render_mode: i32,
    font: Option<ActiveFont<'d>>,
}

impl Default for TextState<'_> {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            font_size: 0.0,
            rise: 0.0,
            render_mode: 0,
            font: None,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState<'d> {
    ctm: Matrix,
    style: ShapeStyle,
    text: TextState<'d>,
}

/// Subpaths under construction, already in page space.
#[derive(Debug, Default)]
struct PathBuilder {
    subpaths: Vec<Vec<(f64, f64)>>,
}

impl PathBuilder {
    fn move_to(&mut self, p: (f64, f64)) {
        self.subpaths.push(vec![p]);
    }

    fn line_to(&mut self, p: (f64, f64)) {
        match self.subpaths.last_mut() {
            Some(sub) => sub.push(p),
            None => self.subpaths.push(vec![p]),
        }
    }

    fn close(&mut self) {
        if let Some(sub) = self.subpaths.last_mut() {
            if let (Some(&first), Some(&last)) = (sub.first(), sub.last()) {
                if sub.len() > 1 && first != last {
                    sub.push(first);
                }
            }
        }
    }

    fn take(&mut self) -> Vec<Vec<(f64, f64)>> {
        std::mem::take(&mut self.subpaths)
    }
}

/// Everything painted on a page.
#[derive(Debug, Default)]
pub(super) struct PageContent {
    pub chars: Vec<CellRow>,
    pub shapes: Vec<ShapeRow>,
    pub bitmaps: Vec<BitmapRow>,
}

/// Runs content streams against a shared output.
///
/// Font decodes go through the page's font cache; resource timings are
/// collected locally and handed back by [`Interpreter::finish`].
pub(super) struct Interpreter<'d, 'c> {
    doc: &'d Document,
    fonts: &'c mut FontCache,
    timings: TimingCollector,
    /// Cells come from a widget annotation appearance.
    widget: bool,
    out: PageContent,
}

impl<'d, 'c> Interpreter<'d, 'c> {
    pub fn new(doc: &'d Document, fonts: &'c mut FontCache) -> Self {
        Self {
            doc,
            fonts,
            timings: TimingCollector::new(),
            widget: false,
            out: PageContent::default(),
        }
    }

    pub fn resources(&mut self, dict: Option<&'d Dictionary>) -> Resources<'d> {
        Resources::resolve(self.doc, dict, self.fonts, &mut self.timings)
    }

    pub fn finish(self) -> (PageContent, TimingCollector) {
        (self.out, self.timings)
    }

    /// Paint a widget appearance stream; its glyphs are flagged as widget
    /// cells.
    pub fn run_appearance(&mut self, stream: &'d Stream, ctm: Matrix) -> Result<()> {
        self.widget = true;
        let result = self.run_form(stream, &Resources::default(), ctm, 1);
        self.widget = false;
        result
    }

    fn run_form(
        &mut self,
        stream: &'d Stream,
        inherited: &Resources<'d>,
        ctm: Matrix,
        depth: usize,
    ) -> Result<()> {
        let resources = match get_dict(self.doc, &stream.dict, b"Resources") {
            Some(dict) => self.resources(Some(dict)),
            None => *inherited,
        };
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        self.run(&content, &resources, ctm, depth)
    }

    /// Interpret one content stream under `ctm`.
    pub fn run(
        &mut self,
        content: &[u8],
        resources: &Resources<'d>,
        ctm: Matrix,
        depth: usize,
    ) -> Result<()> {
        let content = Content::decode(content)?;

        let mut gs = GraphicsState {
            ctm,
            style: ShapeStyle::default(),
            text: TextState::default(),
        };
        let mut stack: Vec<GraphicsState<'d>> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;
        let mut path = PathBuilder::default();

        for op in &content.operations {
            let args = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(args) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }

                // graphics state
                "w" => set(&mut gs.style.line_width, args, 0),
                "M" => set(&mut gs.style.miter_limit, args, 0),
                "i" => set(&mut gs.style.flatness, args, 0),
                "J" => {
                    if let Some(v) = arg(args, 0) {
                        gs.style.line_cap = v as i32;
                    }
                }
                "j" => {
                    if let Some(v) = arg(args, 0) {
                        gs.style.line_join = v as i32;
                    }
                }
                "d" => {
                    if let (Some(Object::Array(dashes)), Some(phase)) = (args.first(), arg(args, 1)) {
                        gs.style.dash_array = dashes.iter().filter_map(number).collect();
                        gs.style.dash_phase = phase;
                    }
                }
                "gs" => {
                    if let Some(state) = args
                        .first()
                        .and_then(name)
                        .and_then(|n| resources.ext_gstates.and_then(|d| get_dict(self.doc, d, n.as_bytes())))
                    {
                        apply_ext_gstate(self.doc, state, &mut gs.style);
                    }
                }
                "RG" | "G" | "K" | "SC" | "SCN" => {
                    if let Some(rgb) = color(args) {
                        gs.style.rgb_stroking = rgb;
                    }
                }
                "rg" | "g" | "k" | "sc" | "scn" => {
                    if let Some(rgb) = color(args) {
                        gs.style.rgb_filling = rgb;
                    }
                }

                // text objects and state
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tc" => set(&mut gs.text.char_spacing, args, 0),
                "Tw" => set(&mut gs.text.word_spacing, args, 0),
                "Tz" => {
                    if let Some(v) = arg(args, 0) {
                        gs.text.h_scale = v / 100.0;
                    }
                }
                "TL" => set(&mut gs.text.leading, args, 0),
                "Ts" => set(&mut gs.text.rise, args, 0),
                "Tr" => {
                    if let Some(v) = arg(args, 0) {
                        gs.text.render_mode = v as i32;
                    }
                }
                "Tf" => {
                    let key = args.first().and_then(name);
                    gs.text.font = key.and_then(|k| self.select_font(resources, &k));
                    if let Some(size) = arg(args, 1) {
                        gs.text.font_size = size;
                    }
                }

                // text positioning
                "Td" | "TD" => {
                    if let (Some(tx), Some(ty)) = (arg(args, 0), arg(args, 1)) {
                        if op.operator == "TD" {
                            gs.text.leading = -ty;
                        }
                        tlm = Matrix::translate(tx, ty).then(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(args) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                }

                // text showing
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = args.first() {
                        self.show(bytes, &gs, &mut tm);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = args.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes, &gs, &mut tm),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0 * gs.text.font_size * gs.text.h_scale;
                                        tm = Matrix::translate(tx, 0.0).then(&tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "'" | "\"" => {
                    let text_idx = if op.operator == "\"" {
                        set(&mut gs.text.word_spacing, args, 0);
                        set(&mut gs.text.char_spacing, args, 1);
                        2
                    } else {
                        0
                    };
                    tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = args.get(text_idx) {
                        self.show(bytes, &gs, &mut tm);
                    }
                }

                // path construction
                "m" => {
                    if let (Some(x), Some(y)) = (arg(args, 0), arg(args, 1)) {
                        path.move_to(gs.ctm.apply(x, y));
                    }
                }
                "l" => {
                    if let (Some(x), Some(y)) = (arg(args, 0), arg(args, 1)) {
                        path.line_to(gs.ctm.apply(x, y));
                    }
                }
                "c" | "v" | "y" => {
                    let end = if op.operator == "c" { 4 } else { 2 };
                    if let (Some(x), Some(y)) = (arg(args, end), arg(args, end + 1)) {
                        path.line_to(gs.ctm.apply(x, y));
                    }
                }
                "h" => path.close(),
                "re" => {
                    if let (Some(x), Some(y), Some(w), Some(h)) =
                        (arg(args, 0), arg(args, 1), arg(args, 2), arg(args, 3))
                    {
                        path.move_to(gs.ctm.apply(x, y));
                        path.line_to(gs.ctm.apply(x + w, y));
                        path.line_to(gs.ctm.apply(x + w, y + h));
                        path.line_to(gs.ctm.apply(x, y + h));
                        path.close();
                    }
                }

                // path painting
                "S" | "f" | "F" | "f*" | "B" | "B*" => self.paint(&mut path, &gs.style),
                "s" | "b" | "b*" => {
                    path.close();
                    self.paint(&mut path, &gs.style);
                }
                "n" => {
                    path.take();
                }

                "Do" => {
                    if let Some(key) = args.first().and_then(name) {
                        self.paint_xobject(&key, resources, &gs, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn select_font(&mut self, resources: &Resources<'d>, key: &str) -> Option<ActiveFont<'d>> {
        let font_dict = resources.fonts?;
        match load_font(self.doc, font_dict, key, self.fonts, &mut self.timings) {
            Some((dict, metrics, _)) => Some(ActiveFont {
                key: key.to_string(),
                dict,
                metrics,
            }),
            None => {
                log::debug!("font resource /{} not found", key);
                None
            }
        }
    }

    /// Emit one cell per glyph of `bytes` and advance the text matrix.
    fn show(&mut self, bytes: &[u8], gs: &GraphicsState<'d>, tm: &mut Matrix) {
        let Some(font) = &gs.text.font else {
            return;
        };
        let ts = &gs.text;
        let y0 = ts.rise + DESCENT * ts.font_size;
        let y1 = ts.rise + ASCENT * ts.font_size;

        for (code, text) in decode_glyphs(self.doc, font.dict, &font.metrics, bytes) {
            let w0 = font.metrics.width(code) / 1000.0;
            let x1 = w0 * ts.font_size * ts.h_scale;

            if !text.is_empty() {
                let m = tm.then(&gs.ctm);
                let p0 = m.apply(0.0, y0);
                let p1 = m.apply(x1, y0);
                let p2 = m.apply(x1, y1);
                let p3 = m.apply(0.0, y1);
                self.out.chars.push(CellRow {
                    rect: BoundingRectangle::from_corners([
                        p0.0, p0.1, p1.0, p1.1, p2.0, p2.1, p3.0, p3.1,
                    ]),
                    left_to_right: left_to_right(&text),
                    orig: text.clone(),
                    text,
                    font_key: font.key.clone(),
                    font_name: font.metrics.base_font.clone(),
                    widget: self.widget,
                    rendering_mode: ts.render_mode,
                });
            }

            let word_spacing = if !font.metrics.two_byte && code == 32 {
                ts.word_spacing
            } else {
                0.0
            };
            let tx = (w0 * ts.font_size + ts.char_spacing + word_spacing) * ts.h_scale;
            *tm = Matrix::translate(tx, 0.0).then(tm);
        }
    }

    fn paint(&mut self, path: &mut PathBuilder, style: &ShapeStyle) {
        if let Some(row) = ShapeRow::from_subpaths(&path.take()) {
            self.out.shapes.push(row.with_style(style));
        }
    }

    fn paint_xobject(
        &mut self,
        key: &str,
        resources: &Resources<'d>,
        gs: &GraphicsState<'d>,
        depth: usize,
    ) -> Result<()> {
        let doc = self.doc;
        let Some(Object::Stream(stream)) = resources
            .xobjects
            .and_then(|d| get(doc, d, key.as_bytes()))
        else {
            return Ok(());
        };

        match get_name(doc, &stream.dict, b"Subtype").as_deref() {
            Some("Image") => {
                self.out.bitmaps.push(image_row(doc, key, stream, &gs.ctm));
                Ok(())
            }
            Some("Form") if depth >= MAX_FORM_DEPTH => {
                log::debug!("form /{} nested deeper than {}, skipped", key, MAX_FORM_DEPTH);
                Ok(())
            }
            Some("Form") => {
                let matrix = form_matrix(doc, &stream.dict);
                self.run_form(stream, resources, matrix.then(&gs.ctm), depth + 1)
            }
            _ => Ok(()),
        }
    }
}

/// Image XObject placed by the unit square under `ctm`.
fn image_row(doc: &Document, key: &str, stream: &Stream, ctm: &Matrix) -> BitmapRow {
    let corners = [
        ctm.apply(0.0, 0.0),
        ctm.apply(1.0, 0.0),
        ctm.apply(1.0, 1.0),
        ctm.apply(0.0, 1.0),
    ];
    let (mut l, mut b, mut r, mut t) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for (x, y) in corners {
        l = l.min(x);
        b = b.min(y);
        r = r.max(x);
        t = t.max(y);
    }

    let dict = &stream.dict;
    let dim = |k: &[u8]| get_number(doc, dict, k).unwrap_or(0.0).max(0.0) as u32;
    let color_space = match get(doc, dict, b"ColorSpace") {
        Some(Object::Name(n)) => String::from_utf8_lossy(n).into_owned(),
        Some(Object::Array(arr)) => arr.first().and_then(name).unwrap_or_default(),
        _ => String::new(),
    };
    let filters: Vec<String> = match get(doc, dict, b"Filter") {
        Some(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Some(Object::Array(arr)) => arr.iter().filter_map(name).collect(),
        _ => Vec::new(),
    };
    let payload = match filters.last().map(String::as_str) {
        Some("DCTDecode") => Some(("image/jpeg".to_string(), stream.content.clone())),
        Some("JPXDecode") => Some(("image/jp2".to_string(), stream.content.clone())),
        _ => None,
    };

    BitmapRow {
        bbox: BoundingBox::new(l, b, r, t),
        xobject_key: key.to_string(),
        image_width: dim(b"Width"),
        image_height: dim(b"Height"),
        bits_per_component: dim(b"BitsPerComponent"),
        color_space,
        payload,
    }
}

fn apply_ext_gstate(doc: &Document, state: &Dictionary, style: &mut ShapeStyle) {
    if let Some(v) = get_number(doc, state, b"LW") {
        style.line_width = v;
    }
    if let Some(v) = get_number(doc, state, b"LC") {
        style.line_cap = v as i32;
    }
    if let Some(v) = get_number(doc, state, b"LJ") {
        style.line_join = v as i32;
    }
    if let Some(v) = get_number(doc, state, b"ML") {
        style.miter_limit = v;
    }
    if let Some(v) = get_number(doc, state, b"FL") {
        style.flatness = v;
    }
    if let Some(Object::Array(dash)) = get(doc, state, b"D") {
        if let (Some(Object::Array(arr)), Some(phase)) = (dash.first(), dash.get(1).and_then(number)) {
            style.dash_array = arr.iter().filter_map(number).collect();
            style.dash_phase = phase;
        }
    }
}

fn arg(args: &[Object], i: usize) -> Option<f64> {
    args.get(i).and_then(number)
}

fn set(slot: &mut f64, args: &[Object], i: usize) {
    if let Some(v) = arg(args, i) {
        *slot = v;
    }
}

/// Gray, RGB or CMYK components as 8-bit RGB; pattern names are ignored.
fn color(args: &[Object]) -> Option<[u8; 3]> {
    let v: Vec<f64> = args.iter().filter_map(number).collect();
    let to_u8 = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    match v.as_slice() {
        [g] => Some([to_u8(*g); 3]),
        [r, g, b] => Some([to_u8(*r), to_u8(*g), to_u8(*b)]),
        [c, m, y, k] => Some([
            to_u8((1.0 - c) * (1.0 - k)),
            to_u8((1.0 - m) * (1.0 - k)),
            to_u8((1.0 - y) * (1.0 - k)),
        ]),
        _ => None,
    }
}

fn left_to_right(text: &str) -> bool {
    !text
        .chars()
        .any(|c| matches!(bidi_class(c), BidiClass::R | BidiClass::AL))
}

/// Map a form bounding box onto an annotation rectangle.
pub(super) fn appearance_matrix(form_bbox: [f64; 4], form_matrix: Matrix, rect: [f64; 4]) -> Matrix {
    let corners = [
        form_matrix.apply(form_bbox[0], form_bbox[1]),
        form_matrix.apply(form_bbox[2], form_bbox[1]),
        form_matrix.apply(form_bbox[2], form_bbox[3]),
        form_matrix.apply(form_bbox[0], form_bbox[3]),
    ];
    let l = corners.iter().map(|p| p.0).fold(f64::MAX, f64::min);
    let b = corners.iter().map(|p| p.1).fold(f64::MAX, f64::min);
    let r = corners.iter().map(|p| p.0).fold(f64::MIN, f64::max);
    let t = corners.iter().map(|p| p.1).fold(f64::MIN, f64::max);

    let sx = if r > l { (rect[2] - rect[0]) / (r - l) } else { 1.0 };
    let sy = if t > b { (rect[3] - rect[1]) / (t - b) } else { 1.0 };
    form_matrix
        .then(&Matrix::translate(-l, -b))
        .then(&Matrix::scale(sx, sy))
        .then(&Matrix::translate(rect[0], rect[1]))
}

/// Bounding box of a form, `/BBox` or nothing.
pub(super) fn form_bbox(doc: &Document, dict: &Dictionary) -> Option<[f64; 4]> {
    dict.get(b"BBox").ok().and_then(|b| rect(doc, b))
}

pub(super) fn form_matrix(doc: &Document, dict: &Dictionary) -> Matrix {
    dict.get(b"Matrix")
        .ok()
        .and_then(|m| Matrix::from_object(doc, m))
        .unwrap_or(Matrix::IDENTITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn helvetica(doc: &mut Document) -> Dictionary {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        dictionary! { "Font" => dictionary! { "F1" => font_id } }
    }

    fn interpret(doc: &Document, resources: &Dictionary, content: &[u8]) -> PageContent {
        let mut fonts = FontCache::new();
        let mut interp = Interpreter::new(doc, &mut fonts);
        let res = interp.resources(Some(resources));
        interp.run(content, &res, Matrix::IDENTITY, 0).unwrap();
        interp.finish().0
    }

    #[test]
    fn test_matrix_composition() {
        let m = Matrix::scale(2.0, 2.0).then(&Matrix::translate(10.0, 5.0));
        assert_eq!(m.apply(1.0, 1.0), (12.0, 7.0));
        let m = Matrix::translate(10.0, 5.0).then(&Matrix::scale(2.0, 2.0));
        assert_eq!(m.apply(1.0, 1.0), (22.0, 12.0));
    }

    #[test]
    fn test_glyph_cells_advance() {
        let mut doc = Document::with_version("1.5");
        let res = helvetica(&mut doc);
        let out = interpret(&doc, &res, b"BT /F1 10 Tf 100 700 Td (AB) Tj ET");

        assert_eq!(out.chars.len(), 2);
        let a = &out.chars[0];
        assert_eq!(a.text, "A");
        assert_eq!(a.font_key, "F1");
        assert_eq!(a.font_name, "Helvetica");
        assert!(a.left_to_right);
        // default width 500/1000 em at 10pt
        assert_eq!(a.rect.r_x0, 100.0);
        assert_eq!(a.rect.r_x1, 105.0);
        assert_eq!(a.rect.r_y0, 698.0);
        assert_eq!(a.rect.r_y2, 708.0);
        assert_eq!(out.chars[1].rect.r_x0, 105.0);
    }

    #[test]
    fn test_tj_adjustment_and_next_line() {
        let mut doc = Document::with_version("1.5");
        let res = helvetica(&mut doc);
        let out = interpret(
            &doc,
            &res,
            b"BT /F1 10 Tf 12 TL 0 100 Td [(A) -1000 (B)] TJ T* (C) Tj ET",
        );
        let xs: Vec<f64> = out.chars.iter().map(|c| c.rect.r_x0).collect();
        assert_eq!(xs, vec![0.0, 15.0, 0.0]);
        assert_eq!(out.chars[2].rect.r_y0, 100.0 - 12.0 - 2.0);
    }

    #[test]
    fn test_ctm_and_state_stack() {
        let mut doc = Document::with_version("1.5");
        let res = helvetica(&mut doc);
        let out = interpret(
            &doc,
            &res,
            b"q 2 0 0 2 50 50 cm BT /F1 10 Tf (A) Tj ET Q BT /F1 10 Tf (B) Tj ET",
        );
        assert_eq!(out.chars[0].rect.r_x0, 50.0);
        assert_eq!(out.chars[0].rect.r_x1, 60.0);
        assert_eq!(out.chars[1].rect.r_x0, 0.0);
    }

    #[test]
    fn test_paths_with_graphics_state() {
        let doc = Document::with_version("1.5");
        let out = interpret(
            &doc,
            &Dictionary::new(),
            b"2 w 1 0 0 RG 10 10 m 100 10 l S 0 0 50 20 re f 5 5 m 6 6 l n",
        );
        assert_eq!(out.shapes.len(), 2);

        let line = &out.shapes[0];
        assert_eq!(line.x, vec![10.0, 100.0]);
        assert_eq!(line.i, vec![0, 2]);
        assert!(line.has_graphics_state);
        assert_eq!(line.line_width, 2.0);
        assert_eq!(line.rgb_stroking, [255, 0, 0]);

        let rect = &out.shapes[1];
        assert_eq!(rect.x.len(), 5);
        assert_eq!(rect.x[4], rect.x[0]);
    }

    #[test]
    fn test_image_and_form_xobjects() {
        let mut doc = Document::with_version("1.5");
        let image_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4i64,
                "Height" => 2i64,
                "BitsPerComponent" => 8i64,
                "ColorSpace" => "DeviceRGB",
                "Filter" => "DCTDecode",
            },
            vec![0xFF, 0xD8, 0xFF, 0xD9],
        )));
        let form_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im1" => image_id },
                },
            },
            b"q 20 0 0 10 0 0 cm /Im1 Do Q".to_vec(),
        )));
        let res = dictionary! {
            "XObject" => dictionary! { "Fm1" => form_id, "Im1" => image_id },
        };
        let out = interpret(
            &doc,
            &res,
            b"q 100 0 0 50 10 10 cm /Im1 Do Q q 1 0 0 1 300 300 cm /Fm1 Do Q",
        );

        assert_eq!(out.bitmaps.len(), 2);
        let placed = &out.bitmaps[0];
        assert_eq!(placed.bbox, BoundingBox::new(10.0, 10.0, 110.0, 60.0));
        assert_eq!(placed.xobject_key, "Im1");
        assert_eq!(placed.image_width, 4);
        assert_eq!(placed.color_space, "DeviceRGB");
        assert_eq!(placed.payload.as_ref().unwrap().0, "image/jpeg");
        assert_eq!(out.bitmaps[1].bbox, BoundingBox::new(300.0, 300.0, 320.0, 310.0));
    }

    #[test]
    fn test_rtl_detection() {
        assert!(left_to_right("abc"));
        assert!(!left_to_right("\u{05D0}"));
        assert!(!left_to_right("\u{0627}"));
    }

    #[test]
    fn test_colors() {
        assert_eq!(color(&[Object::Real(0.5)]), Some([128, 128, 128]));
        assert_eq!(
            color(&[Object::Integer(0), Object::Integer(0), Object::Integer(0), Object::Integer(1)]),
            Some([0, 0, 0])
        );
        assert_eq!(color(&[Object::Name(b"P1".to_vec())]), None);
    }

    #[test]
    fn test_appearance_matrix_maps_bbox_to_rect() {
        let m = appearance_matrix([0.0, 0.0, 20.0, 10.0], Matrix::IDENTITY, [100.0, 200.0, 140.0, 220.0]);
        assert_eq!(m.apply(0.0, 0.0), (100.0, 200.0));
        assert_eq!(m.apply(20.0, 10.0), (140.0, 220.0));
    }
}
