//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use segpdf::engine::{CellRow, DecodedPage, DimensionRow, EngineSource, PdfEngine, RawPage};
use segpdf::{BoundaryType, BoundingRectangle, DecodeConfig, DecodeMode, PageBoxes, TimingCollector};
use serde_json::{json, Value};

pub const PAGE_TEXT: [&str; 3] = ["Introduction to models", "Dense and sparse", "The end"];

fn string(s: &str) -> Object {
    Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
}

fn outline_item(
    doc: &mut Document,
    id: ObjectId,
    title: &str,
    parent: ObjectId,
    page: ObjectId,
    links: &[(&str, ObjectId)],
) {
    let mut dict = dictionary! {
        "Title" => string(title),
        "Parent" => parent,
        "Dest" => vec![Object::from(page), "Fit".into()],
    };
    for (key, target) in links {
        dict.set(*key, *target);
    }
    doc.objects.insert(id, Object::Dictionary(dict));
}

/// Three US Letter pages, each with one line of Helvetica text and a
/// stroked rectangle, plus the outline
/// `Introduction, Model Architecture -> [Dense Models, Mixture-of-Expert
/// models], Conclusion`.
pub fn fixture_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut page_ids = Vec::new();
    for text in PAGE_TEXT {
        let content = format!(
            "BT /F1 12 Tf 72 720 Td ({}) Tj ET 1 w 0 0 1 RG 72 700 200 10 re S",
            text
        );
        let content_id = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            content.into_bytes(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "CropBox" => vec![10.into(), 10.into(), 602.into(), 782.into()],
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::from(*id)).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        }),
    );

    let outlines = doc.new_object_id();
    let intro = doc.new_object_id();
    let arch = doc.new_object_id();
    let dense = doc.new_object_id();
    let moe = doc.new_object_id();
    let conclusion = doc.new_object_id();
    let (p1, p2, p3) = (page_ids[0], page_ids[1], page_ids[2]);

    outline_item(&mut doc, intro, "Introduction", outlines, p1, &[("Next", arch)]);
    outline_item(
        &mut doc,
        arch,
        "Model Architecture",
        outlines,
        p2,
        &[("Prev", intro), ("Next", conclusion), ("First", dense), ("Last", moe)],
    );
    outline_item(&mut doc, dense, "Dense Models", arch, p2, &[("Next", moe)]);
    outline_item(&mut doc, moe, "Mixture-of-Expert models", arch, p2, &[("Prev", dense)]);
    outline_item(&mut doc, conclusion, "Conclusion", outlines, p3, &[("Prev", arch)]);
    doc.objects.insert(
        outlines,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => intro,
            "Last" => conclusion,
            "Count" => 5i64,
        }),
    );

    let metadata_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
        br#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF><rdf:Description><dc:format>application/pdf</dc:format><dc:title><rdf:Alt><rdf:li xml:lang="x-default">Fixture</rdf:li></rdf:Alt></dc:title></rdf:Description></rdf:RDF></x:xmpmeta>"#
            .to_vec(),
    )));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Outlines" => outlines,
        "Metadata" => metadata_id,
        "Lang" => string("en-US"),
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("fixture serialises");
    buf
}

/// Write the fixture into `dir` and return its path.
pub fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("fixture.pdf");
    std::fs::write(&path, fixture_pdf()).expect("fixture written");
    path
}

/// Collapse runs of whitespace, for text comparisons across pipelines.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Engine serving fixed glyph rows only, never words or lines, so the
/// fallback segmenter has to run.
pub struct ScriptedEngine {
    loaded: Vec<String>,
    pages: Vec<Vec<(&'static str, f64)>>,
    bulk_decode: bool,
}

impl ScriptedEngine {
    /// One page per entry; each glyph is `(text, x)`, 5pt wide, on y 100..110.
    pub fn new(pages: Vec<Vec<(&'static str, f64)>>) -> Self {
        Self {
            loaded: Vec::new(),
            pages,
            bulk_decode: true,
        }
    }

    /// Make `decode_document` report failure.
    pub fn without_bulk_decode(mut self) -> Self {
        self.bulk_decode = false;
        self
    }

    fn page(&self, index: usize, config: &DecodeConfig) -> Option<DecodedPage> {
        let glyphs = self.pages.get(index)?;
        let b = [0.0, 0.0, 300.0, 200.0];
        let chars = glyphs
            .iter()
            .map(|(text, x)| CellRow {
                rect: BoundingRectangle::from_corners([
                    *x,
                    100.0,
                    x + 5.0,
                    100.0,
                    x + 5.0,
                    110.0,
                    *x,
                    110.0,
                ]),
                text: text.to_string(),
                orig: text.to_string(),
                font_key: "F1".to_string(),
                font_name: "Scripted".to_string(),
                widget: false,
                left_to_right: true,
                rendering_mode: 0,
            })
            .collect();
        let mut timings = TimingCollector::new();
        timings.add("decode_page", 0.001);
        timings.add("decode_font: Scripted", 0.0005);
        Some(DecodedPage {
            page_number: index + 1,
            dimension: DimensionRow {
                page_boundary: config.page_boundary.unwrap_or(BoundaryType::CropBox),
                angle: 0.0,
                rectangles: PageBoxes {
                    media: b,
                    crop: b,
                    bleed: b,
                    trim: b,
                    art: b,
                },
            },
            char_cells: Some(chars),
            word_cells: None,
            line_cells: None,
            shapes: config.keep_shapes.then(Vec::new),
            bitmaps: config.keep_bitmaps.then(Vec::new),
            timings,
        })
    }
}

impl PdfEngine for ScriptedEngine {
    fn load_document(&mut self, handle: &str, _: EngineSource<'_>, _: Option<&str>) -> bool {
        if !self.loaded.iter().any(|h| h == handle) {
            self.loaded.push(handle.to_string());
        }
        true
    }

    fn unload_document(&mut self, handle: &str) -> bool {
        let before = self.loaded.len();
        self.loaded.retain(|h| h != handle);
        before != self.loaded.len()
    }

    fn unload_page(&mut self, handle: &str, page_index: usize) -> bool {
        self.is_loaded(handle) && page_index < self.pages.len()
    }

    fn is_loaded(&self, handle: &str) -> bool {
        self.loaded.iter().any(|h| h == handle)
    }

    fn number_of_pages(&self, handle: &str) -> Option<usize> {
        self.is_loaded(handle).then_some(self.pages.len())
    }

    fn decode_page(
        &mut self,
        handle: &str,
        page_index: usize,
        config: &DecodeConfig,
        mode: DecodeMode,
    ) -> Option<RawPage> {
        if !self.is_loaded(handle) {
            return None;
        }
        let page = self.page(page_index, config)?;
        Some(match mode {
            DecodeMode::Structured => RawPage::Structured(Box::new(page)),
            DecodeMode::Serialized => RawPage::Serialized(page.to_serialized()),
        })
    }

    fn decode_document(&mut self, handle: &str, config: &DecodeConfig) -> Option<Value> {
        if !self.bulk_decode || !self.is_loaded(handle) {
            return None;
        }
        let pages: Option<Vec<Value>> = (0..self.pages.len())
            .map(|i| self.page(i, config).map(|p| p.to_serialized()))
            .collect();
        Some(json!({
            "timings": {"decode_document": 0.002},
            "pages": pages?,
        }))
    }

    fn get_meta_xml(&self, _: &str) -> Option<String> {
        None
    }

    fn get_table_of_contents(&self, _: &str) -> Option<Value> {
        None
    }

    fn get_annotations(&self, _: &str) -> Option<Value> {
        None
    }

    fn list_loaded_handles(&self) -> Vec<String> {
        self.loaded.clone()
    }
}
