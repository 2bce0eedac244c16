// Chunk: docs/chunks/display_buffer - Display buffer, viewport and reflow

//! Property tests over the whole emulator: reflow stability and dirty-set
//! conservatism.

use proptest::prelude::*;

use txterm_term::{Cell, Term, TermConfig};

fn grid_text(term: &Term) -> Vec<String> {
    term.grid()
        .iter()
        .map(|row| row.iter().map(Cell::display_rune).collect::<String>())
        .collect()
}

fn scrollback_text(term: &Term) -> Vec<String> {
    (0..term.total_scrollback())
        .filter_map(|i| term.scrollback_line(i))
        .map(|line| line.text())
        .collect()
}

/// Printable input batches: words, CRs and LFs.
fn arb_input() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            "[ -~]{1,12}".prop_map(|s| s.into_bytes()),
            Just(b"\r".to_vec()),
            Just(b"\r\n".to_vec()),
            Just("é界x".as_bytes().to_vec()),
        ],
        1..30,
    )
    .prop_map(|chunks| chunks.concat())
}

/// A small alphabet of editing sequences for the dirty-tracking property.
fn arb_edit() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        "[ -~]{1,8}".prop_map(|s| s.into_bytes()),
        Just(b"\r\n".to_vec()),
        (1u8..20, 1u8..20).prop_map(|(r, c)| format!("\x1b[{};{}H", r, c).into_bytes()),
        Just(b"\x1b[2K".to_vec()),
        Just(b"\x1b[K".to_vec()),
        (1u8..5).prop_map(|n| format!("\x1b[{}@", n).into_bytes()),
        (1u8..5).prop_map(|n| format!("\x1b[{}P", n).into_bytes()),
        Just(b"\x1b[1;31m".to_vec()),
        Just(b"\x1b[0m".to_vec()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Reflow preserves content: resizing to another width and back leaves
    /// both the committed lines and the visible grid unchanged.
    #[test]
    fn prop_reflow_round_trip(
        input in arb_input(),
        w1 in 8usize..60,
        w2 in 8usize..60,
        h in 4usize..20,
    ) {
        let mut t = Term::new(TermConfig::new(w1, h)).unwrap();
        t.feed(&input);

        let lines_before = scrollback_text(&t);
        let grid_before = grid_text(&t);

        t.resize(w2, h);
        t.resize(w1, h);

        prop_assert_eq!(scrollback_text(&t), lines_before);
        prop_assert_eq!(grid_text(&t), grid_before);
    }

    /// The dirty set is a conservative over-approximation: every cell that
    /// changed between two grid snapshots lies in a reported-dirty row.
    #[test]
    fn prop_dirty_covers_changes(
        setup in arb_input(),
        edits in prop::collection::vec(arb_edit(), 1..10),
    ) {
        let mut t = Term::new(TermConfig::new(20, 8)).unwrap();
        t.feed(&setup);

        let before = t.grid();
        t.take_dirty(); // clear

        for edit in &edits {
            t.feed(edit);
        }

        let (dirty, all) = t.take_dirty();
        let after = t.grid();

        for (row, (a, b)) in before.iter().zip(after.iter()).enumerate() {
            if a != b {
                prop_assert!(
                    all || dirty.contains(&row),
                    "row {} changed but was not reported dirty",
                    row
                );
            }
        }
    }

    /// Feeding a byte stream in arbitrary chunkings produces identical
    /// state (UTF-8 and escape sequences stash across boundaries).
    #[test]
    fn prop_chunking_invariant(input in arb_input(), cut in 1usize..40) {
        let mut whole = Term::new(TermConfig::new(24, 8)).unwrap();
        whole.feed(&input);

        let mut pieces = Term::new(TermConfig::new(24, 8)).unwrap();
        for chunk in input.chunks(cut) {
            pieces.feed(chunk);
        }

        prop_assert_eq!(grid_text(&whole), grid_text(&pieces));
        prop_assert_eq!(scrollback_text(&whole), scrollback_text(&pieces));
    }
}
