//! Integration tests running the bundled engine through both decode
//! pipelines.

mod common;

use std::io::Cursor;

use common::{fixture_pdf, normalize_ws, write_fixture, PAGE_TEXT};
use segpdf::{
    BoundaryType, DecodeConfig, DecodeMode, DocumentParser, DocumentSource, LoadOptions,
    SegmentedPage, TextCellUnit,
};
use tempfile::TempDir;

const TOLERANCE: f64 = 1.0e-3;

fn open_fixture(parser: &DocumentParser, options: &LoadOptions) -> segpdf::DocumentSession {
    let mut cursor = Cursor::new(fixture_pdf());
    parser
        .load(DocumentSource::stream(&mut cursor), options)
        .unwrap()
}

fn assert_same_geometry(a: &SegmentedPage, b: &SegmentedPage) {
    for unit in [TextCellUnit::Char, TextCellUnit::Word, TextCellUnit::Line] {
        let (xs, ys) = (a.cells(unit), b.cells(unit));
        assert_eq!(xs.len(), ys.len(), "{:?} count", unit);
        for (x, y) in xs.iter().zip(ys) {
            for (p, q) in x.rect.to_array().iter().zip(y.rect.to_array()) {
                assert!((p - q).abs() <= TOLERANCE, "{:?} {} vs {}", unit, p, q);
            }
        }
    }
}

#[test]
fn test_page_text_and_cells() {
    let parser = DocumentParser::new();
    let mut session = open_fixture(&parser, &LoadOptions::default());
    assert_eq!(session.number_of_pages().unwrap(), 3);

    let page = session
        .get_page(1, DecodeMode::Structured, &DecodeConfig::default())
        .unwrap();
    assert_eq!(page.char_cells().len(), PAGE_TEXT[0].chars().count());
    let words: Vec<&str> = page.word_cells().iter().map(|c| c.text.as_str()).collect();
    assert_eq!(words, vec!["Introduction", "to", "models"]);
    assert_eq!(page.textline_cells().len(), 1);
    assert_eq!(page.text(), PAGE_TEXT[0]);

    let first = &page.char_cells()[0];
    assert_eq!(first.text, "I");
    assert_eq!(first.font_key, "F1");
    assert_eq!(first.font_name, "Helvetica");
    assert!((first.rect.r_x0 - 72.0).abs() < TOLERANCE);
    assert!((first.rect.r_y0 - 717.6).abs() < TOLERANCE);
    assert!((first.rect.r_y3 - 729.6).abs() < TOLERANCE);

    for (i, cell) in page.char_cells().iter().enumerate() {
        assert_eq!(cell.index, i);
    }
}

#[test]
fn test_page_geometry_and_shapes() {
    let parser = DocumentParser::new();
    let mut session = open_fixture(&parser, &LoadOptions::default());
    let page = session
        .get_page(2, DecodeMode::Structured, &DecodeConfig::default())
        .unwrap();

    let geometry = page.geometry();
    assert_eq!(geometry.boundary_type, BoundaryType::CropBox);
    assert_eq!(
        geometry.rect.to_array(),
        [10.0, 10.0, 602.0, 10.0, 602.0, 782.0, 10.0, 782.0]
    );
    assert_eq!(geometry.media_bbox.to_array(), [0.0, 0.0, 612.0, 792.0]);
    assert_eq!(geometry.width(), 592.0);

    assert!(!page.shapes().is_empty());
    for shape in page.shapes() {
        let style = shape.style.as_ref().expect("painted with graphics state");
        assert_eq!(style.line_width, 1.0);
        assert_eq!(style.rgb_stroking, [0, 0, 255]);
        let bbox = shape.bbox().unwrap();
        assert!(bbox.l >= 72.0 - TOLERANCE && bbox.r <= 272.0 + TOLERANCE);
    }
    assert_eq!(page.lines().count(), 0);

    let (media, _) = session
        .get_page_with_timings(
            2,
            DecodeMode::Structured,
            &DecodeConfig::default().with_page_boundary(BoundaryType::MediaBox),
        )
        .unwrap();
    assert_eq!(media.geometry().boundary_type, BoundaryType::MediaBox);
    assert_eq!(media.geometry().height(), 792.0);
}

#[test]
fn test_structured_and_serialized_agree() {
    let parser = DocumentParser::new();
    let mut session = open_fixture(&parser, &LoadOptions::default());
    let config = DecodeConfig::default();

    for page_no in 1..=3 {
        let (structured, _) = session
            .get_page_with_timings(page_no, DecodeMode::Structured, &config)
            .unwrap();
        let (serialized, _) = session
            .get_page_with_timings(page_no, DecodeMode::Serialized, &config)
            .unwrap();

        assert_eq!(normalize_ws(&structured.text()), normalize_ws(&serialized.text()));
        assert_same_geometry(&structured, &serialized);
        assert_eq!(structured.shapes().len(), serialized.shapes().len());
        assert_eq!(structured.geometry(), serialized.geometry());
    }
}

#[test]
fn test_lazy_then_load_all_matches_eager() {
    let parser = DocumentParser::new();
    let mut lazy = open_fixture(&parser, &LoadOptions::default());
    assert!(lazy.cached_pages().is_empty());
    lazy.load_all_pages(&DecodeConfig::default()).unwrap();

    let eager_parser = DocumentParser::new();
    let mut eager = open_fixture(&eager_parser, &LoadOptions::default().eager());
    assert_eq!(eager.cached_pages(), vec![1, 2, 3]);

    for page_no in 1..=3 {
        let a = lazy
            .get_page(page_no, DecodeMode::Structured, &DecodeConfig::default())
            .unwrap();
        let b = eager
            .get_page(page_no, DecodeMode::Structured, &DecodeConfig::default())
            .unwrap();
        assert_eq!(*a, *b);
    }
}

#[test]
fn test_path_and_stream_agree() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());
    let parser = DocumentParser::new();

    let mut by_path = parser.open(&path).unwrap();
    let mut by_stream = open_fixture(&parser, &LoadOptions::default());
    assert_eq!(by_path.handle(), path.to_string_lossy());
    assert_ne!(by_path.handle(), by_stream.handle());
    assert_eq!(parser.list_loaded_keys().unwrap().len(), 2);

    let n = by_path.number_of_pages().unwrap();
    assert_eq!(n, by_stream.number_of_pages().unwrap());
    for page_no in 1..=n {
        let a = by_path
            .get_page(page_no, DecodeMode::Structured, &DecodeConfig::default())
            .unwrap();
        let b = by_stream
            .get_page(page_no, DecodeMode::Structured, &DecodeConfig::default())
            .unwrap();
        assert_eq!(*a, *b);
    }
}

#[test]
fn test_config_limits_output() {
    let parser = DocumentParser::new();
    let mut session = open_fixture(&parser, &LoadOptions::default());

    let (page, _) = session
        .get_page_with_timings(1, DecodeMode::Serialized, &DecodeConfig::chars_only())
        .unwrap();
    assert!(page.has_chars());
    assert!(!page.has_words());
    assert!(!page.has_lines());
    assert!(page.shapes().is_empty());

    let config = DecodeConfig::default().with_max_shapes(0).with_char_cells(false);
    let (page, _) = session
        .get_page_with_timings(1, DecodeMode::Structured, &config)
        .unwrap();
    assert!(page.shapes().is_empty());
    assert!(!page.has_chars());
    // words and lines still come from the engine
    assert!(page.has_words());
    assert!(page.has_lines());
}

#[test]
fn test_extract_text() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());
    let text = segpdf::extract_text(&path).unwrap();
    assert_eq!(text, PAGE_TEXT.join("\n\n"));
}
