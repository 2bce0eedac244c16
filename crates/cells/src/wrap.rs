// Chunk: docs/chunks/cell_line_model - Typed cells, logical lines, wrap-to-width

//! Wrapping logical lines onto physical rows.
//!
//! `wrap_to_width` is the single source of truth for how a logical line
//! breaks across screen rows. It is pure and deterministic in the cell
//! *content* — any `wrapped` flags already present are ignored and rewritten
//! — so wrapping at one width and re-wrapping the same cells at another
//! yields exactly the rows a direct wrap would.
//!
//! Wide glyphs are never split: when a two-cell pair would straddle the row
//! edge, the row is cut one column short and the pair starts the next row.
//! Short rows carry no explicit pad cell; the renderer pads rows to the
//! viewport width when assembling the grid.

use crate::cell::Cell;

/// One physical row's slice of a logical line: `cells[start..end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowSpan {
    start: usize,
    end: usize,
}

/// Computes the row boundaries of `cells` at `width` without copying.
/// An empty line still occupies one (empty) row. A width of zero is treated
/// as one.
fn row_spans(cells: &[Cell], width: usize) -> Vec<RowSpan> {
    let width = width.max(1);
    let mut spans = Vec::new();
    let mut start = 0;

    while start < cells.len() {
        let mut end = start;
        while end < cells.len() && end - start < width {
            if cells[end].is_wide() && end + 1 < cells.len() && width >= 2 {
                // A wide pair must land entirely on this row
                if width - (end - start) < 2 {
                    break;
                }
                end += 2;
            } else {
                end += 1;
            }
        }
        spans.push(RowSpan { start, end });
        start = end;
    }

    if spans.is_empty() {
        spans.push(RowSpan { start: 0, end: 0 });
    }
    spans
}

/// Wraps a logical line's cells into physical rows of at most `width`
/// columns.
///
/// The last cell of every row except the final one is marked `wrapped`;
/// every other cell has the flag cleared. Rows cut short ahead of a wide
/// pair simply contain fewer cells.
pub fn wrap_to_width(cells: &[Cell], width: usize) -> Vec<Vec<Cell>> {
    let spans = row_spans(cells, width);
    let last = spans.len() - 1;

    spans
        .iter()
        .enumerate()
        .map(|(i, span)| {
            let mut row: Vec<Cell> = cells[span.start..span.end].to_vec();
            for cell in row.iter_mut() {
                cell.wrapped = false;
            }
            if i != last {
                if let Some(cell) = row.last_mut() {
                    cell.wrapped = true;
                }
            }
            row
        })
        .collect()
}

/// Maps a logical cell offset to its `(row, col)` at `width`.
///
/// Offsets at or past the end of the line land on the conceptual position
/// they would occupy after extension, continuing past the last row in
/// `width`-sized steps.
pub fn offset_to_row_col(cells: &[Cell], width: usize, offset: usize) -> (usize, usize) {
    let width = width.max(1);
    let spans = row_spans(cells, width);

    for (row, span) in spans.iter().enumerate() {
        if offset >= span.start && offset < span.end {
            return (row, offset - span.start);
        }
    }

    // At or past the end: continue from the last row
    let last = spans.len() - 1;
    let span = spans[last];
    let mut row = last;
    let mut col = offset - span.start;
    while col >= width {
        col -= width;
        row += 1;
    }
    (row, col)
}

/// Maps a physical `(row, col)` back to a logical cell offset at `width`.
///
/// Positions past a row's populated cells map past its end (writes extend
/// the line); rows past the content map into the conceptual extension
/// region.
pub fn row_col_to_offset(cells: &[Cell], width: usize, row: usize, col: usize) -> usize {
    let width = width.max(1);
    let spans = row_spans(cells, width);

    if row < spans.len() {
        let span = spans[row];
        let is_last = row + 1 == spans.len();
        if is_last {
            span.start + col
        } else {
            // Interior rows are fixed width; a column on a short row's pad
            // clamps to the row's last cell
            (span.start + col).min(span.end - 1)
        }
    } else {
        // Past the content: rows continue from the final row's start in
        // width-sized steps, mirroring offset_to_row_col
        let last = spans[spans.len() - 1];
        last.start + (row - (spans.len() - 1)) * width + col
    }
}

/// Returns the offset of the first cell of the row containing `offset`.
/// This is what carriage return targets: column 0 of the *current physical
/// row*, not of the whole logical line.
pub fn row_start_of_offset(cells: &[Cell], width: usize, offset: usize) -> usize {
    let width = width.max(1);
    let spans = row_spans(cells, width);

    for span in &spans {
        if offset >= span.start && offset < span.end {
            return span.start;
        }
    }

    let last = spans[spans.len() - 1];
    if offset < last.start + width.max(last.end - last.start) {
        // On the (possibly still growing) final row
        return last.start;
    }
    // Conceptual rows past the content
    let past = offset - last.start;
    last.start + (past / width) * width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellAttrs;
    use crate::line::LogicalLine;

    fn wide_pair(ch: char) -> Vec<Cell> {
        let mut lead = Cell::new(ch);
        lead.attrs.insert(CellAttrs::WIDE);
        vec![lead, Cell::wide_placeholder()]
    }

    fn text_cells(text: &str) -> Vec<Cell> {
        LogicalLine::from_text(text).cells
    }

    // ==================== Wrapping Tests ====================

    #[test]
    fn test_empty_line_is_one_empty_row() {
        let rows = wrap_to_width(&[], 80);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_empty());
    }

    #[test]
    fn test_exact_fit_is_one_row() {
        let rows = wrap_to_width(&text_cells("abcde"), 5);
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].last().unwrap().wrapped);
    }

    #[test]
    fn test_wrap_marks_row_boundaries() {
        let rows = wrap_to_width(&text_cells("aaaaaaaaaaaaaaa"), 10);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 10);
        assert_eq!(rows[1].len(), 5);
        assert!(rows[0][9].wrapped);
        assert!(!rows[1].last().unwrap().wrapped);
        assert!(rows[0][..9].iter().all(|c| !c.wrapped));
    }

    #[test]
    fn test_wrap_clears_stale_flags() {
        let mut cells = text_cells("abcdef");
        for cell in cells.iter_mut() {
            cell.wrapped = true;
        }
        let rows = wrap_to_width(&cells, 3);
        assert!(rows[0][2].wrapped);
        assert!(!rows[0][0].wrapped);
        assert!(!rows[1][2].wrapped);
    }

    #[test]
    fn test_wide_pair_never_splits() {
        // "ab" + wide pair at width 3: the pair will not fit after "ab"
        let mut cells = text_cells("ab");
        cells.extend(wide_pair('界'));
        let rows = wrap_to_width(&cells, 3);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2, "row cut short ahead of the pair");
        assert!(rows[0][1].wrapped);
        assert!(rows[1][0].is_wide());
        assert_eq!(rows[1][1].rune, '\0');
    }

    #[test]
    fn test_wide_pair_fits_exactly() {
        let mut cells = text_cells("a");
        cells.extend(wide_pair('界'));
        let rows = wrap_to_width(&cells, 3);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_width_one_degenerate() {
        let mut cells = wide_pair('界');
        cells.extend(text_cells("x"));
        let rows = wrap_to_width(&cells, 1);
        // One cell per row; nothing lost
        let flat: Vec<Cell> = rows.into_iter().flatten().collect();
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn test_flatten_preserves_cells() {
        let mut cells = text_cells("hello wide ");
        cells.extend(wide_pair('世'));
        cells.extend(wide_pair('界'));
        cells.extend(text_cells(" tail"));

        for width in 1..12 {
            let rows = wrap_to_width(&cells, width);
            let flat: Vec<char> = rows.iter().flatten().map(|c| c.rune).collect();
            let orig: Vec<char> = cells.iter().map(|c| c.rune).collect();
            assert_eq!(flat, orig, "width {}", width);
        }
    }

    // ==================== Offset Mapping Tests ====================

    #[test]
    fn test_offset_round_trip() {
        let cells = text_cells("abcdefghij");
        for offset in 0..cells.len() {
            let (row, col) = offset_to_row_col(&cells, 4, offset);
            assert_eq!(row_col_to_offset(&cells, 4, row, col), offset);
        }
    }

    #[test]
    fn test_offset_at_end_of_full_row() {
        let cells = text_cells("abcd");
        // Offset 4 (== len) on a just-full row conceptually starts row 1
        assert_eq!(offset_to_row_col(&cells, 4, 4), (1, 0));
    }

    #[test]
    fn test_row_start_after_soft_wrap() {
        // width 10, 13 cells: cursor at offset 13 sits on row 1; CR must
        // target offset 10, not 0
        let cells = text_cells("aaaaaaaaaaaaa");
        assert_eq!(row_start_of_offset(&cells, 10, 13), 10);
        assert_eq!(row_start_of_offset(&cells, 10, 5), 0);
    }

    #[test]
    fn test_row_col_past_content() {
        let cells = text_cells("ab");
        // Row 2 does not exist yet; the mapping round-trips with
        // offset_to_row_col through the conceptual extension region
        let offset = row_col_to_offset(&cells, 5, 2, 1);
        assert_eq!(offset_to_row_col(&cells, 5, offset), (2, 1));
    }
}
