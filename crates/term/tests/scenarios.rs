// Chunk: docs/chunks/vt_state_machine - VT semantics

//! End-to-end scenarios driving the whole emulator through `feed`.
//!
//! These reproduce real-world interaction patterns (prompt overwrites,
//! htop-style menu repaints, TUIs inside scroll regions) at the byte level.

use txterm_term::{Cell, Term, TermConfig};

fn term(width: usize, height: usize) -> Term {
    Term::new(TermConfig::new(width, height)).unwrap()
}

fn row_text(term: &Term, row: usize) -> String {
    term.grid()[row].iter().map(Cell::display_rune).collect()
}

fn row_trimmed(term: &Term, row: usize) -> String {
    row_text(term, row).trim_end().to_string()
}

#[test]
fn scenario_overwrite_column_zero() {
    let mut t = term(40, 10);
    t.feed(b"> ");
    t.feed(b"\r");
    t.feed(b"X");

    let grid = t.grid();
    assert_eq!(grid[0][0].rune, 'X');
    assert_eq!(grid[0][1].rune, ' ');
}

#[test]
fn scenario_long_line_wrap() {
    let mut t = term(10, 5);
    t.feed(&[b'A'; 15]);

    assert_eq!(row_text(&t, 0), "AAAAAAAAAA");
    assert_eq!(row_text(&t, 1), "AAAAA     ");
    assert!(t.grid()[0][9].wrapped, "soft-wrap flag on the row boundary");
}

#[test]
fn scenario_el2_after_overflow() {
    let mut t = term(80, 24);
    // Cursor to row 2, column 51 (1-indexed), then overflow the row
    t.feed(b"\x1b[2;51H");
    t.feed(&[b'x'; 70]);
    t.feed(b"\r\x1b[2K");
    t.feed(b"Menu item 1");

    assert_eq!(&row_text(&t, 1)[..11], "Menu item 1");
    assert!(
        !row_text(&t, 1).contains('x'),
        "no overflow residue on the menu row"
    );
    assert_eq!(row_trimmed(&t, 1), "Menu item 1");
}

#[test]
fn scenario_wide_glyph() {
    let mut t = term(20, 5);
    t.feed("A🎉B".as_bytes());

    let grid = t.grid();
    assert_eq!(grid[0][0].rune, 'A');
    assert_eq!(grid[0][1].rune, '🎉');
    assert!(grid[0][1].is_wide());
    assert_eq!(grid[0][2].rune, '\0', "placeholder behind the wide glyph");
    assert!(!grid[0][2].is_wide());
    assert_eq!(grid[0][3].rune, 'B');
    assert_eq!(t.cursor(), (4, 0));
}

#[test]
fn scenario_scroll_region_preserves_scrollback() {
    let mut t = term(80, 24);
    for i in 0..50 {
        t.feed(format!("Pre-TUI line {}\r\n", i).as_bytes());
    }
    let committed = t.total_scrollback();
    assert!(committed >= 50);

    // A TUI takes over rows 1..=12 for in-app scrolling
    t.feed(b"\x1b[1;12r");
    for i in 0..10 {
        t.feed(format!("Codex UI line {}\r\n", i).as_bytes());
    }
    assert_eq!(
        t.total_scrollback(),
        committed,
        "region output must not pollute scrollback"
    );

    t.feed(b"\x1b[r");
    assert!(t.total_scrollback() >= 50);

    // Scrolling up reveals the original shell output
    t.scroll_up(20);
    assert!(
        row_trimmed(&t, 0).starts_with("Pre-TUI line"),
        "got {:?}",
        row_trimmed(&t, 0)
    );
}

#[test]
fn scenario_insert_delete_round_trip() {
    let mut t = term(80, 24);
    t.feed(b"ABCDEFGH");
    t.feed(b"\x1b[1;3H"); // column 3, 1-indexed
    t.feed(b"\x1b[3@");
    assert_eq!(row_trimmed(&t, 0), "AB   CDEFGH");

    t.feed(b"\x1b[3P");
    assert_eq!(row_trimmed(&t, 0), "ABCDEFGH");
}

// ==================== Companion regression checks ====================

#[test]
fn cr_after_soft_wrap_targets_second_row() {
    // Write width + k printable characters, CR, then overwrite: only the
    // second physical row may change
    let width = 10;
    let mut t = term(width, 5);
    t.feed(&[b'x'; 13]);
    t.feed(b"\r");
    assert_eq!(t.cursor(), (0, 1), "CR lands on the wrapped row");

    t.feed(b"ZZ");
    assert_eq!(row_text(&t, 0), "x".repeat(width));
    assert_eq!(row_trimmed(&t, 1), "ZZx");
}

#[test]
fn alt_screen_is_invisible_afterwards() {
    let mut t = term(20, 6);
    for i in 0..4 {
        t.feed(format!("before {}\r\n", i).as_bytes());
    }
    let scrollback = t.total_scrollback();
    let grid_before: Vec<String> = (0..6).map(|r| row_text(&t, r)).collect();

    t.feed(b"\x1b[?1049h");
    t.feed(b"\x1b[2J\x1b[H");
    for i in 0..30 {
        t.feed(format!("noise {}\r\n", i).as_bytes());
    }
    t.feed(b"\x1b[?1049l");

    let grid_after: Vec<String> = (0..6).map(|r| row_text(&t, r)).collect();
    assert_eq!(grid_before, grid_after, "grid restored exactly");
    assert_eq!(t.total_scrollback(), scrollback, "scrollback untouched");
}

#[test]
fn el2_leaves_no_more_than_width_cells() {
    let mut t = term(20, 6);
    t.feed(&[b'y'; 55]); // wraps over three rows
    t.feed(b"\x1b[2K");

    for row in 0..6 {
        let text = row_trimmed(&t, row);
        assert!(text.len() <= 20);
        assert!(text.is_empty(), "row {} still has {:?}", row, text);
    }
    let grid = t.grid();
    assert_eq!(grid[0][0].rune, '\0');
}

#[test]
fn scrollback_is_readable_while_tui_active() {
    let mut t = term(40, 10);
    for i in 0..30 {
        t.feed(format!("log entry {}\r\n", i).as_bytes());
    }
    t.feed(b"\x1b[1;5r"); // region active
    t.feed(b"menu\r\n");

    // The committed lines are still individually addressable
    assert_eq!(
        t.scrollback_line(3).unwrap().text().trim_end(),
        "log entry 3"
    );
}

#[test]
fn find_line_at_walks_timestamps() {
    let mut t = term(40, 5);
    t.feed(b"first\r\n");
    t.feed(b"second\r\n");
    let found = t.find_line_at(i64::MAX).unwrap();
    assert_eq!(found, t.total_scrollback() - 1);
}

#[test]
fn live_edge_row_tracks_content() {
    let mut t = term(20, 10);
    assert_eq!(t.live_edge_row(), 0);
    t.feed(b"one\r\ntwo\r\n");
    assert_eq!(t.live_edge_row(), 2);
    assert!(t.at_live_edge());

    // Scrolling with nothing above the viewport is a no-op
    t.scroll_up(5);
    assert!(t.at_live_edge());

    for i in 0..15 {
        t.feed(format!("fill {}\r\n", i).as_bytes());
    }
    t.scroll_up(1);
    assert!(!t.at_live_edge());
    t.scroll_to_bottom();
    assert!(t.at_live_edge());
}
