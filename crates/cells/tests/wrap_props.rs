// Chunk: docs/chunks/cell_line_model - Typed cells, logical lines, wrap-to-width

//! Property tests for wrapping and the line codec.

use proptest::prelude::*;

use txterm_cells::{
    decode_line, encode_line, wrap_to_width, Cell, CellAttrs, Color, LogicalLine,
};

/// Generates a cell sequence mixing narrow cells, empty cells and wide
/// pairs, the way real terminal output looks.
fn arb_cells() -> impl Strategy<Value = Vec<Cell>> {
    prop::collection::vec(
        prop_oneof![
            // Narrow printable
            (32u32..127).prop_map(|c| vec![Cell::new(char::from_u32(c).unwrap())]),
            // Empty (cursor-skipped) cell
            Just(vec![Cell::default()]),
            // Wide pair
            Just({
                let mut lead = Cell::new('\u{4E2D}');
                lead.attrs.insert(CellAttrs::WIDE);
                vec![lead, Cell::wide_placeholder()]
            }),
            // Styled narrow cell
            (0u8..=255, 0u8..=255, 0u8..=255).prop_map(|(r, g, b)| {
                let mut cell = Cell::new('x');
                cell.fg = Color::Rgb { r, g, b };
                cell.attrs = CellAttrs::BOLD;
                vec![cell]
            }),
        ],
        0..60,
    )
    .prop_map(|chunks| chunks.into_iter().flatten().collect())
}

proptest! {
    /// Wrap/unwrap round-trip: reading the rows of a wrap at one width in
    /// row-major order and re-wrapping at another width equals wrapping the
    /// original cells at that width directly.
    #[test]
    fn prop_wrap_rewrap_round_trip(
        cells in arb_cells(),
        w1 in 1usize..40,
        w2 in 1usize..40,
    ) {
        let flattened: Vec<Cell> = wrap_to_width(&cells, w1)
            .into_iter()
            .flatten()
            .collect();
        prop_assert_eq!(wrap_to_width(&flattened, w2), wrap_to_width(&cells, w2));
    }

    /// Every row except the last ends in a wrapped-marked cell, and no
    /// other cell carries the flag.
    #[test]
    fn prop_wrap_flag_placement(cells in arb_cells(), width in 1usize..40) {
        let rows = wrap_to_width(&cells, width);
        let last = rows.len() - 1;
        for (i, row) in rows.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                let is_boundary = i != last && j + 1 == row.len();
                prop_assert_eq!(cell.wrapped, is_boundary, "row {} col {}", i, j);
            }
        }
    }

    /// No row exceeds the width, and no wide pair is ever split across rows
    /// (for widths that can hold a pair at all).
    #[test]
    fn prop_wrap_respects_width_and_pairs(cells in arb_cells(), width in 2usize..40) {
        let rows = wrap_to_width(&cells, width);
        for row in &rows {
            prop_assert!(row.len() <= width);
            if let Some(last) = row.last() {
                prop_assert!(!last.is_wide(), "wide lead split from its placeholder");
            }
        }
    }

    /// Encode/decode round-trip for arbitrary lines.
    #[test]
    fn prop_line_codec_round_trip(cells in arb_cells(), fixed_width in 0u32..200) {
        let line = LogicalLine { cells, fixed_width, synthetic: false, overlay: None };
        let mut buf = Vec::new();
        encode_line(&line, &mut buf);
        let (decoded, consumed) = decode_line(&buf).unwrap();
        prop_assert_eq!(decoded, line);
        prop_assert_eq!(consumed, buf.len());
    }
}
