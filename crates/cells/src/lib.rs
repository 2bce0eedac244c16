// Chunk: docs/chunks/cell_line_model - Typed cells, logical lines, wrap-to-width

//! txterm-cells: the cell and logical-line model for txterm.
//!
//! This crate provides the value types the rest of the emulator is built
//! from, plus the two pure algorithms everything else leans on:
//!
//! - a stable binary codec for cells and lines (18-byte cells, versioned
//!   line records), used by the on-disk page format
//! - [`wrap_to_width`], which projects one unwrapped logical line onto
//!   physical rows at a given viewport width
//!
//! # Model
//!
//! ```text
//! LogicalLine ─ wrap_to_width(w) ─▶ [physical row; n]   (n ≥ 1)
//!      │
//!      └─ encode_line / decode_line ─▶ on-disk bytes
//! ```
//!
//! A logical line is one line of terminal *output* regardless of how many
//! screen rows it spans. Wrapping is recomputed whenever the width changes;
//! the stored cells are never rewritten, which is what makes resize reflow
//! lossless.
//!
//! # Example
//!
//! ```
//! use txterm_cells::{Cell, LogicalLine, wrap_to_width};
//!
//! let mut line = LogicalLine::new();
//! for ch in "hello world".chars() {
//!     line.push(Cell::new(ch));
//! }
//!
//! let rows = wrap_to_width(line.display_cells(), 6);
//! assert_eq!(rows.len(), 2);
//! assert!(rows[0].last().unwrap().wrapped);
//! ```

mod cell;
mod codec;
mod line;
mod wrap;

pub use cell::{Cell, CellAttrs, Color};
pub use codec::{
    decode_cell, decode_line, decode_line_v1, encode_cell, encode_line, encoded_line_len,
    CELL_ENCODED_LEN,
};
pub use line::{LogicalLine, Overlay};
pub use wrap::{offset_to_row_col, row_col_to_offset, row_start_of_offset, wrap_to_width};
