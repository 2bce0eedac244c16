// Chunk: docs/chunks/display_buffer - Display buffer, viewport and reflow
// Chunk: docs/chunks/escape_parser - Byte-stream escape parser
// Chunk: docs/chunks/vt_state_machine - VT semantics
// Chunk: docs/chunks/scroll_region_overlay - Scroll regions and the alt screen
// Chunk: docs/chunks/shell_integration - OSC 133 prompt marks

//! txterm-term: the terminal emulator core.
//!
//! This crate consumes a PTY byte stream and maintains a faithful cell-grid
//! model of a VT-family terminal, on top of the scrollback layers in
//! `txterm-history`:
//!
//! ```text
//! PTY bytes ─▶ Parser ─▶ VT semantics ─▶ DisplayBuffer ─▶ Scrollback ─▶ pages
//!                                │
//!                  (alt screen / region overlay grids)
//! ```
//!
//! The host wires callbacks through [`TermHooks`] (title, clipboard, shell
//! marks, PTY replies) and drives everything through [`Term::feed`]. The
//! renderer consumes [`Term::grid`] and [`Term::take_dirty`].
//!
//! # Example
//!
//! ```
//! use txterm_term::{Term, TermConfig};
//!
//! let mut term = Term::new(TermConfig::new(80, 24)).unwrap();
//! term.feed(b"hello \x1b[1mworld\x1b[0m\r\n");
//!
//! let grid = term.grid();
//! assert_eq!(grid[0][0].rune, 'h');
//! let (dirty_rows, all_dirty) = term.take_dirty();
//! assert!(all_dirty || !dirty_rows.is_empty());
//! ```
//!
//! # Concurrency
//!
//! The emulator is single-threaded and never blocks inside `feed` except
//! for page-store writes at commit boundaries. A host with a render thread
//! wraps the terminal in its own lock, held across whole `feed` batches on
//! one side and `grid` + `take_dirty` on the other, so the renderer sees
//! batch-atomic state.

mod dirty;
mod display;
mod grid;
mod hooks;
mod parser;
mod term;

pub use display::DisplayBuffer;
pub use hooks::TermHooks;
pub use parser::{Parser, VtActions};
pub use term::{Term, TermConfig, DEFAULT_SCROLLBACK_LINES};

// Re-export the model types hosts need to consume the grid
pub use txterm_cells::{Cell, CellAttrs, Color, LogicalLine};
pub use txterm_history::{Scrollback, ScrollbackConfig, SessionMeta, StoreConfig};
