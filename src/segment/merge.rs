//! Native merge sanitizer: contracts glyph cells into word or line cells.

use super::{MergeParams, Sanitizer};
use crate::engine::CellRow;
use crate::model::{BoundingRectangle, Coord2D};

/// Corner coordinates closer than this count as axis aligned.
const AXIS_EPS: f64 = 1.0e-3;

/// Geometric merge heuristics over a list of cells in content order.
///
/// Three sweeps run in sequence: left-to-right, right-to-left, then
/// left-to-right again allowing reversed pairs. Within a sweep a cell keeps
/// absorbing its neighbours until the first one that does not qualify.
#[derive(Debug, Clone, Default)]
pub struct MergeSanitizer {
    cells: Vec<CellRow>,
}

impl MergeSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn contract(&self, mut cells: Vec<CellRow>, params: &MergeParams) -> Vec<CellRow> {
        left_to_right(&mut cells, params, false);
        right_to_left(&mut cells, params);
        left_to_right(&mut cells, params, true);
        cells
    }
}

impl Sanitizer for MergeSanitizer {
    fn set_char_cells(&mut self, cells: Vec<CellRow>) {
        self.cells = cells;
    }

    fn create_word_cells(&mut self, params: &MergeParams) -> Vec<CellRow> {
        let cells: Vec<CellRow> = self
            .cells
            .iter()
            .filter(|c| !c.text.trim().is_empty())
            .cloned()
            .collect();
        log::trace!("create_word_cells: {} non-space char cells", cells.len());
        self.contract(cells, params)
    }

    fn create_line_cells(&mut self, params: &MergeParams) -> Vec<CellRow> {
        log::trace!("create_line_cells: {} char cells", self.cells.len());
        self.contract(self.cells.clone(), params)
    }
}

fn left_to_right(cells: &mut Vec<CellRow>, params: &MergeParams, allow_reverse: bool) {
    let mut active = vec![true; cells.len()];

    for i in 0..cells.len() {
        if !active[i] {
            continue;
        }
        for j in (i + 1)..cells.len() {
            if !applicable_for_merge(&cells[i], &cells[j], active[i], active[j], params) {
                break;
            }

            let avg = average_char_width(&cells[i]);
            let delta_0 = avg * params.space_width_factor_for_merge;
            let delta_1 = avg * params.space_width_factor_for_merge_with_space;

            if is_adjacent_to(&cells[i], &cells[j], delta_0) {
                let other = cells[j].clone();
                merge_with(&mut cells[i], &other, delta_1);
                active[j] = false;
            } else if allow_reverse && is_adjacent_to(&cells[j], &cells[i], delta_0) {
                let other = cells[i].clone();
                merge_with(&mut cells[j], &other, delta_1);
                active[i] = false;
            } else {
                break;
            }
        }
    }

    retain_active(cells, &active);
}

fn right_to_left(cells: &mut Vec<CellRow>, params: &MergeParams) {
    let mut active = vec![true; cells.len()];

    for i in (0..cells.len()).rev() {
        if !active[i] {
            continue;
        }
        for j in (0..i).rev() {
            if !applicable_for_merge(&cells[i], &cells[j], active[i], active[j], params) {
                break;
            }

            let avg = average_char_width(&cells[i]);
            let delta_0 = avg * params.space_width_factor_for_merge;
            let delta_1 = avg * params.space_width_factor_for_merge_with_space;

            if is_adjacent_to(&cells[j], &cells[i], delta_0) {
                let other = cells[i].clone();
                merge_with(&mut cells[j], &other, delta_1);
                active[i] = false;
            } else {
                break;
            }
        }
    }

    retain_active(cells, &active);
}

fn retain_active(cells: &mut Vec<CellRow>, active: &[bool]) {
    let mut flags = active.iter();
    cells.retain(|_| flags.next().copied().unwrap_or(false));
}

fn applicable_for_merge(
    a: &CellRow,
    b: &CellRow,
    a_active: bool,
    b_active: bool,
    params: &MergeParams,
) -> bool {
    a_active
        && b_active
        && (!params.enforce_same_font || a.font_name == b.font_name)
        && same_reading_orientation(a, b)
}

/// Punctuation and spaces fit either reading direction.
fn same_reading_orientation(a: &CellRow, b: &CellRow) -> bool {
    a.left_to_right == b.left_to_right || is_punctuation_or_space(&a.text) || is_punctuation_or_space(&b.text)
}

fn is_punctuation_or_space(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_whitespace() || c.is_ascii_punctuation() || is_unicode_punctuation(c))
}

fn is_unicode_punctuation(c: char) -> bool {
    matches!(
        c,
        '\u{2010}'..='\u{2027}' | '\u{2030}'..='\u{205E}' | '\u{3001}'..='\u{3003}' | '\u{00A1}' | '\u{00BF}' | '\u{00AB}' | '\u{00BB}'
    )
}

fn corner(x: f64, y: f64) -> Coord2D {
    Coord2D::new(x, y)
}

fn average_char_width(cell: &CellRow) -> f64 {
    let n = cell.text.chars().count();
    if n == 0 {
        0.0
    } else {
        cell.rect.width() / n as f64
    }
}

/// `b` starts where `a` ends: both the baseline and the top edge meet within `eps`.
fn is_adjacent_to(a: &CellRow, b: &CellRow, eps: f64) -> bool {
    let d0 = corner(a.rect.r_x1, a.rect.r_y1).distance(&corner(b.rect.r_x0, b.rect.r_y0));
    let d1 = corner(a.rect.r_x2, a.rect.r_y2).distance(&corner(b.rect.r_x3, b.rect.r_y3));
    d0 < eps && d1 < eps
}

fn is_axis_aligned(r: &BoundingRectangle) -> bool {
    (r.r_y0 - r.r_y1).abs() < AXIS_EPS
        && (r.r_y2 - r.r_y3).abs() < AXIS_EPS
        && (r.r_x0 - r.r_x3).abs() < AXIS_EPS
        && (r.r_x1 - r.r_x2).abs() < AXIS_EPS
        && r.r_x1 >= r.r_x0
}

/// Append `other` to `cell`, inserting a space when the gap exceeds `delta`.
fn merge_with(cell: &mut CellRow, other: &CellRow, delta: f64) {
    let gap = corner(cell.rect.r_x1, cell.rect.r_y1)
        .distance(&corner(other.rect.r_x0, other.rect.r_y0));
    let sep = if delta < gap { " " } else { "" };

    if !cell.left_to_right || !other.left_to_right {
        cell.text = format!("{}{}{}", other.text, sep, cell.text);
        cell.orig = format!("{}{}{}", other.orig, sep, cell.orig);
        cell.left_to_right = false;
    } else {
        cell.text = format!("{}{}{}", cell.text, sep, other.text);
        cell.orig = format!("{}{}{}", cell.orig, sep, other.orig);
        cell.left_to_right = true;
    }

    if is_axis_aligned(&cell.rect) && is_axis_aligned(&other.rect) {
        cell.rect = cell.rect.union(&other.rect);
    } else {
        cell.rect.r_x1 = other.rect.r_x1;
        cell.rect.r_y1 = other.rect.r_y1;
        cell.rect.r_x2 = other.rect.r_x2;
        cell.rect.r_y2 = other.rect.r_y2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A glyph of width `w` at `x`, 10 units tall.
    fn glyph(text: &str, x: f64, w: f64) -> CellRow {
        CellRow {
            rect: BoundingRectangle::from_corners([
                x,
                100.0,
                x + w,
                100.0,
                x + w,
                110.0,
                x,
                110.0,
            ]),
            text: text.to_string(),
            orig: text.to_string(),
            font_key: "F1".to_string(),
            font_name: "Helvetica".to_string(),
            widget: false,
            left_to_right: true,
            rendering_mode: 0,
        }
    }

    fn params(factor: f64, with_space: f64) -> MergeParams {
        MergeParams {
            horizontal_cell_tolerance: 1.0,
            space_width_factor_for_merge: factor,
            space_width_factor_for_merge_with_space: with_space,
            enforce_same_font: true,
        }
    }

    /// "ab cd" laid out glyph by glyph with a real space glyph.
    fn ab_cd() -> Vec<CellRow> {
        vec![
            glyph("a", 0.0, 5.0),
            glyph("b", 5.0, 5.0),
            glyph(" ", 10.0, 3.0),
            glyph("c", 13.0, 5.0),
            glyph("d", 18.0, 5.0),
        ]
    }

    #[test]
    fn test_words_split_on_space_glyph() {
        let mut s = MergeSanitizer::new();
        s.set_char_cells(ab_cd());
        let words = s.create_word_cells(&params(0.33, 0.66));
        let texts: Vec<_> = words.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["ab", "cd"]);
        assert_eq!(words[0].rect.to_bounding_box().to_array(), [0.0, 100.0, 10.0, 110.0]);
        assert_eq!(words[1].rect.to_bounding_box().to_array(), [13.0, 100.0, 23.0, 110.0]);
    }

    #[test]
    fn test_lines_keep_space_glyph() {
        let mut s = MergeSanitizer::new();
        s.set_char_cells(ab_cd());
        let lines = s.create_line_cells(&params(1.0, 0.33));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "ab cd");
        assert_eq!(lines[0].rect.to_bounding_box().to_array(), [0.0, 100.0, 23.0, 110.0]);
    }

    #[test]
    fn test_gap_inserts_space_in_lines() {
        let mut s = MergeSanitizer::new();
        // 2 unit gap, glyph width 5: merges under factor 1.0, gap > 0.33 * 5
        s.set_char_cells(vec![glyph("a", 0.0, 5.0), glyph("b", 7.0, 5.0)]);
        let lines = s.create_line_cells(&params(1.0, 0.33));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "a b");
    }

    #[test]
    fn test_font_change_blocks_merge() {
        let mut b = glyph("b", 5.0, 5.0);
        b.font_name = "Helvetica-Bold".to_string();
        let mut s = MergeSanitizer::new();
        s.set_char_cells(vec![glyph("a", 0.0, 5.0), b.clone()]);
        assert_eq!(s.create_word_cells(&params(0.33, 0.66)).len(), 2);

        let mut relaxed = params(0.33, 0.66);
        relaxed.enforce_same_font = false;
        s.set_char_cells(vec![glyph("a", 0.0, 5.0), b]);
        assert_eq!(s.create_word_cells(&relaxed).len(), 1);
    }

    #[test]
    fn test_right_to_left_text_is_prepended() {
        let mut s = MergeSanitizer::new();
        let mut alef = glyph("\u{5D0}", 0.0, 5.0);
        let mut bet = glyph("\u{5D1}", 5.0, 5.0);
        alef.left_to_right = false;
        bet.left_to_right = false;
        s.set_char_cells(vec![alef, bet]);
        let words = s.create_word_cells(&params(0.33, 0.66));
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "\u{5D1}\u{5D0}");
        assert!(!words[0].left_to_right);
    }

    #[test]
    fn test_out_of_order_glyphs_merge_in_reverse_sweep() {
        let mut s = MergeSanitizer::new();
        s.set_char_cells(vec![glyph("b", 5.0, 5.0), glyph("a", 0.0, 5.0)]);
        let words = s.create_word_cells(&params(0.33, 0.66));
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "ab");
    }

    #[test]
    fn test_punctuation_bridges_directions() {
        let a = glyph("a", 0.0, 5.0);
        let mut dot = glyph(".", 5.0, 2.0);
        dot.left_to_right = false;
        assert!(same_reading_orientation(&a, &dot));
        assert!(is_punctuation_or_space("\u{2014} "));
        assert!(!is_punctuation_or_space("a."));
    }
}
