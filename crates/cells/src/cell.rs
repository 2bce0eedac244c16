// Chunk: docs/chunks/cell_line_model - Typed cells, logical lines, wrap-to-width

//! Cell, color and attribute types.
//!
//! A cell is one column of one row. It is a plain value type: cells have no
//! lifetime independent of the line (or grid row) containing them.

/// Terminal color in one of four modes.
///
/// The wire encoding (see `codec`) stores a one-byte mode tag plus a
/// four-byte value; palette modes use only the low byte, RGB packs
/// `(r<<16)|(g<<8)|b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    /// The terminal's configured default foreground/background.
    #[default]
    Default,
    /// 16-color palette (0..=15; 8..=15 are the bright variants).
    Palette(u8),
    /// 256-color palette.
    Palette256(u8),
    /// Direct 24-bit color.
    Rgb { r: u8, g: u8, b: u8 },
}

/// Cell attribute bitmask.
///
/// Matches the single `attr` byte of the cell encoding. `WIDE` marks the
/// *first* half of a two-cell glyph; its trailing half is a placeholder cell
/// with `rune == '\0'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellAttrs(u8);

impl CellAttrs {
    pub const BOLD: CellAttrs = CellAttrs(0x01);
    pub const UNDERLINE: CellAttrs = CellAttrs(0x02);
    pub const REVERSE: CellAttrs = CellAttrs(0x04);
    pub const ITALIC: CellAttrs = CellAttrs(0x08);
    pub const DIM: CellAttrs = CellAttrs(0x10);
    pub const STRIKETHROUGH: CellAttrs = CellAttrs(0x20);
    pub const HIDDEN: CellAttrs = CellAttrs(0x40);
    pub const WIDE: CellAttrs = CellAttrs(0x80);

    /// The empty attribute set.
    pub const fn empty() -> Self {
        CellAttrs(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Reconstructs an attribute set from its encoded byte. All eight bits
    /// are meaningful, so no masking is required.
    pub const fn from_bits(bits: u8) -> Self {
        CellAttrs(bits)
    }

    pub const fn contains(self, other: CellAttrs) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: CellAttrs) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: CellAttrs) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: CellAttrs, on: bool) {
        if on {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for CellAttrs {
    type Output = CellAttrs;

    fn bitor(self, rhs: CellAttrs) -> CellAttrs {
        CellAttrs(self.0 | rhs.0)
    }
}

/// One column × one row of the grid.
///
/// `rune == '\0'` means the cell is empty (never written, or the trailing
/// placeholder of a wide glyph). Erased cells are written as spaces so they
/// keep their erase background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// The displayed code point; `'\0'` for empty / wide placeholder.
    pub rune: char,
    pub fg: Color,
    pub bg: Color,
    pub attrs: CellAttrs,
    /// The line soft-wraps after this cell (set on the last cell of every
    /// physical row except the final one).
    pub wrapped: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            rune: '\0',
            fg: Color::Default,
            bg: Color::Default,
            attrs: CellAttrs::empty(),
            wrapped: false,
        }
    }
}

impl Cell {
    /// A cell displaying `rune` with default colors and no attributes.
    pub fn new(rune: char) -> Self {
        Cell {
            rune,
            ..Cell::default()
        }
    }

    /// An erased cell: a space carrying the given erase background.
    pub fn erased(bg: Color) -> Self {
        Cell {
            rune: ' ',
            bg,
            ..Cell::default()
        }
    }

    /// The trailing placeholder of a wide glyph.
    pub fn wide_placeholder() -> Self {
        Cell::default()
    }

    /// The rune to draw: empty cells and wide placeholders render as
    /// spaces.
    pub fn display_rune(&self) -> char {
        if self.rune == '\0' {
            ' '
        } else {
            self.rune
        }
    }

    /// True if this cell starts a two-column glyph.
    pub fn is_wide(&self) -> bool {
        self.attrs.contains(CellAttrs::WIDE)
    }
}
