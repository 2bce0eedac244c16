// Chunk: docs/chunks/vt_state_machine - VT semantics
// Chunk: docs/chunks/scroll_region_overlay - Scroll regions and the alt screen

//! The terminal: VT semantics driving the display buffer.
//!
//! [`Term`] owns the parser and the full emulator state. Bytes go in
//! through [`Term::feed`]; the renderer reads [`Term::grid`] and
//! [`Term::take_dirty`]; replies the terminal must send upstream (DSR, DA,
//! DECRQM, clipboard queries) come out through the `on_pty_write` hook or
//! [`Term::take_pending_replies`].
//!
//! Three surfaces can be active:
//!
//! - the **primary screen** — the scrollback-backed display buffer
//! - the **scroll-region overlay** — a materialized grid activated by a
//!   non-default DECSTBM on the primary screen; commits are suppressed so
//!   TUIs scrolling inside margins cannot pollute scrollback
//! - the **alt screen** (?1049) — a plain grid with its own cursor and pen
//!
//! Everything here is single-threaded: one `feed` call runs to completion
//! with no suspension points, and the renderer coordinates with the host's
//! lock around whole batches.

use std::collections::BTreeSet;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use unicode_width::UnicodeWidthChar;

use txterm_cells::{Cell, CellAttrs, Color, LogicalLine};
use txterm_history::{PageStore, Scrollback, ScrollbackConfig, StoreConfig};

use crate::dirty::DirtyRows;
use crate::display::DisplayBuffer;
use crate::grid::Grid;
use crate::hooks::TermHooks;
use crate::parser::{Parser, VtActions};

/// Default scrollback window when the host does not configure one.
pub const DEFAULT_SCROLLBACK_LINES: usize = 2000;

/// Tab stops start every this many columns.
const TAB_INTERVAL: usize = 8;

/// Terminal construction parameters.
#[derive(Debug)]
pub struct TermConfig {
    pub width: usize,
    pub height: usize,
    pub scrollback: ScrollbackConfig,
    /// When set, committed lines persist through a page store.
    pub persist: Option<StoreConfig>,
}

impl TermConfig {
    pub fn new(width: usize, height: usize) -> Self {
        TermConfig {
            width,
            height,
            scrollback: ScrollbackConfig::new()
                .with_max_memory_lines(DEFAULT_SCROLLBACK_LINES),
            persist: None,
        }
    }

    pub fn with_scrollback(mut self, scrollback: ScrollbackConfig) -> Self {
        self.scrollback = scrollback;
        self
    }

    pub fn with_persistence(mut self, store: StoreConfig) -> Self {
        self.persist = Some(store);
        self
    }
}

/// Current SGR state applied to printed cells.
#[derive(Debug, Clone, Copy, Default)]
struct Pen {
    fg: Color,
    bg: Color,
    attrs: CellAttrs,
}

impl Pen {
    fn cell(&self, rune: char) -> Cell {
        Cell {
            rune,
            fg: self.fg,
            bg: self.bg,
            attrs: self.attrs,
            wrapped: false,
        }
    }
}

/// Cursor snapshot for DECSC/DECRC and CSI s/u (one per screen).
#[derive(Debug, Clone, Copy)]
struct SavedCursor {
    col: usize,
    row: usize,
    pen: Pen,
    origin_mode: bool,
}

/// OSC 133 shell-integration state.
#[derive(Debug, Clone, Copy, Default)]
struct ShellMarks {
    in_prompt: bool,
    in_input: bool,
    in_command: bool,
    last_exit: Option<i32>,
}

/// The terminal emulator.
pub struct Term {
    parser: Parser,
    inner: Inner,
}

/// Everything but the parser; implements the parser's action trait.
struct Inner {
    display: DisplayBuffer,
    /// Alt screen grid while ?1049 is active.
    alt: Option<Grid>,
    /// Scroll-region overlay while a non-default DECSTBM is active on the
    /// primary screen.
    overlay: Option<Grid>,
    /// Dirty rows for the grid surfaces (the display buffer tracks its own).
    grid_dirty: DirtyRows,

    /// DECSTBM margins, 0-indexed inclusive. `None` = full screen.
    margins: Option<(usize, usize)>,
    pen: Pen,
    insert_mode: bool,
    autowrap: bool,
    origin_mode: bool,
    app_cursor_keys: bool,
    cursor_visible: bool,
    synchronized: bool,
    wrap_pending: bool,
    tabs: BTreeSet<usize>,

    saved_primary: Option<SavedCursor>,
    saved_alt: Option<SavedCursor>,
    /// Primary cursor + pen stashed on alt-screen entry.
    alt_entry: Option<SavedCursor>,

    title: Option<String>,
    bell: bool,
    default_fg: Option<Color>,
    default_bg: Option<Color>,
    marks: ShellMarks,
    hooks: TermHooks,
    /// Replies buffered when no `on_pty_write` hook is installed.
    pending_replies: Vec<u8>,
}

impl Term {
    /// A terminal with no host callbacks.
    pub fn new(config: TermConfig) -> std::io::Result<Self> {
        Term::with_hooks(config, TermHooks::new())
    }

    pub fn with_hooks(config: TermConfig, hooks: TermHooks) -> std::io::Result<Self> {
        let history = match config.persist {
            Some(store_config) => {
                let store = PageStore::create(store_config)?;
                Scrollback::with_store(config.scrollback, store)
            }
            None => Scrollback::new(config.scrollback),
        };

        let width = config.width.max(1);
        let height = config.height.max(1);

        Ok(Term {
            parser: Parser::new(),
            inner: Inner {
                display: DisplayBuffer::new(width, height, history),
                alt: None,
                overlay: None,
                grid_dirty: DirtyRows::new(),
                margins: None,
                pen: Pen::default(),
                insert_mode: false,
                autowrap: true,
                origin_mode: false,
                app_cursor_keys: false,
                cursor_visible: true,
                synchronized: false,
                wrap_pending: false,
                tabs: default_tabs(width),
                saved_primary: None,
                saved_alt: None,
                alt_entry: None,
                title: None,
                bell: false,
                default_fg: None,
                default_bg: None,
                marks: ShellMarks::default(),
                hooks,
                pending_replies: Vec::new(),
            },
        })
    }

    // =========================================================================
    // Byte input
    // =========================================================================

    /// Feeds PTY output through the parser. Split escape sequences and
    /// UTF-8 across calls are handled.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.inner, bytes);
    }

    // =========================================================================
    // Renderer interface
    // =========================================================================

    /// The current viewport as a height × width cell matrix.
    pub fn grid(&self) -> Vec<Vec<Cell>> {
        self.inner.grid()
    }

    /// Rows changed since the last call, plus the all-dirty bit. Consumed
    /// and cleared.
    pub fn take_dirty(&mut self) -> (BTreeSet<usize>, bool) {
        self.inner.take_dirty()
    }

    /// Physical cursor `(col, row)`.
    pub fn cursor(&self) -> (usize, usize) {
        self.inner.cursor_pos()
    }

    pub fn cursor_visible(&self) -> bool {
        self.inner.cursor_visible
    }

    pub fn size(&self) -> (usize, usize) {
        (self.inner.display.width(), self.inner.display.height())
    }

    /// Resize recomputes the wrap of the primary screen and clips the grid
    /// surfaces; no content is rewritten.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.inner.resize(width, height);
    }

    // =========================================================================
    // Viewport scrolling
    // =========================================================================

    pub fn scroll_up(&mut self, n: usize) {
        self.inner.display.scroll_up(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.inner.display.scroll_down(n);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.inner.display.scroll_to_bottom();
    }

    pub fn at_live_edge(&self) -> bool {
        self.inner.display.at_live_edge()
    }

    pub fn live_edge_row(&self) -> usize {
        self.inner.display.live_edge_row()
    }

    // =========================================================================
    // State queries
    // =========================================================================

    pub fn is_alt_screen(&self) -> bool {
        self.inner.alt.is_some()
    }

    pub fn title(&self) -> Option<&str> {
        self.inner.title.as_deref()
    }

    /// True once BEL arrived; cleared by the call.
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.inner.bell)
    }

    /// ?2026 synchronized-update state, for renderers that batch frames.
    pub fn synchronized_update(&self) -> bool {
        self.inner.synchronized
    }

    pub fn app_cursor_keys(&self) -> bool {
        self.inner.app_cursor_keys
    }

    pub fn shell_in_prompt(&self) -> bool {
        self.inner.marks.in_prompt
    }

    pub fn shell_in_input(&self) -> bool {
        self.inner.marks.in_input
    }

    pub fn shell_in_command(&self) -> bool {
        self.inner.marks.in_command
    }

    pub fn last_command_exit(&self) -> Option<i32> {
        self.inner.marks.last_exit
    }

    /// Total committed scrollback lines (disk included).
    pub fn total_scrollback(&self) -> u64 {
        self.inner.display.history().total_len()
    }

    /// Committed line lookup by global index.
    pub fn scrollback_line(&self, index: u64) -> Option<LogicalLine> {
        self.inner.display.history().get(index)
    }

    /// Last committed line at or before `t` (Unix nanoseconds).
    pub fn find_line_at(&self, t: i64) -> Option<u64> {
        self.inner.display.history().find_line_at(t)
    }

    /// Replies accumulated while no `on_pty_write` hook was installed.
    pub fn take_pending_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.inner.pending_replies)
    }

    /// A disk failure parked by the scrollback, if any. The session runs
    /// memory-only after the first failure.
    pub fn take_disk_error(&mut self) -> Option<std::io::Error> {
        self.inner.display.history_mut().take_disk_error()
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Flushes the page store.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.inner.display.history_mut().flush()
    }

    /// Flushes and drops the store.
    pub fn close(self) -> std::io::Result<()> {
        let Term { inner, .. } = self;
        let Inner { display, .. } = inner;
        display.into_history().close()
    }
}

fn default_tabs(width: usize) -> BTreeSet<usize> {
    (0..width.max(1)).step_by(TAB_INTERVAL).collect()
}

/// First parameter, with `0` meaning `default`.
fn param(params: &[u16], i: usize, default: usize) -> usize {
    match params.get(i).copied() {
        Some(0) | None => default,
        Some(v) => v as usize,
    }
}

impl Inner {
    fn width(&self) -> usize {
        self.display.width()
    }

    fn height(&self) -> usize {
        self.display.height()
    }

    /// Margins as concrete rows, full screen when unset.
    fn margin_rows(&self) -> (usize, usize) {
        match self.margins {
            Some((top, bottom)) => (top, bottom.min(self.height() - 1)),
            None => (0, self.height() - 1),
        }
    }

    fn grid(&self) -> Vec<Vec<Cell>> {
        if let Some(grid) = &self.alt {
            grid.rows().to_vec()
        } else if let Some(grid) = &self.overlay {
            grid.rows().to_vec()
        } else {
            self.display.viewport_cells()
        }
    }

    fn take_dirty(&mut self) -> (BTreeSet<usize>, bool) {
        if self.alt.is_some() || self.overlay.is_some() {
            self.grid_dirty.take()
        } else {
            self.display.take_dirty()
        }
    }

    fn cursor_pos(&self) -> (usize, usize) {
        if let Some(grid) = &self.alt {
            (grid.cursor_col, grid.cursor_row)
        } else if let Some(grid) = &self.overlay {
            (grid.cursor_col, grid.cursor_row)
        } else {
            self.display.cursor_pos()
        }
    }

    /// The active grid surface, if any (alt wins over overlay).
    fn active_grid(&mut self) -> Option<&mut Grid> {
        if self.alt.is_some() {
            self.alt.as_mut()
        } else {
            self.overlay.as_mut()
        }
    }

    fn reply(&mut self, bytes: &[u8]) {
        match self.hooks.on_pty_write.as_mut() {
            Some(f) => f(bytes),
            None => self.pending_replies.extend_from_slice(bytes),
        }
    }

    fn resize(&mut self, width: usize, height: usize) {
        let width = width.max(1);
        let height = height.max(1);
        self.display.resize(width, height);
        if let Some(grid) = self.alt.as_mut() {
            grid.resize(width, height);
        }
        if let Some(grid) = self.overlay.as_mut() {
            grid.resize(width, height);
        }
        if let Some((top, bottom)) = self.margins {
            let bottom = bottom.min(height - 1);
            self.margins = if top < bottom { Some((top, bottom)) } else { None };
        }
        self.tabs = default_tabs(width);
        self.wrap_pending = false;
        self.grid_dirty.mark_all();
        self.display.mark_all_dirty();
    }

    // =========================================================================
    // Printing
    // =========================================================================

    fn print_char(&mut self, ch: char) {
        let cw = match ch.width() {
            Some(0) => return, // combining marks: out of scope, dropped
            Some(w) => w.min(2),
            None => return,
        };

        if self.alt.is_some() || self.overlay.is_some() {
            self.grid_print(ch, cw);
        } else {
            self.primary_print(ch, cw);
        }
    }

    fn primary_print(&mut self, ch: char, cw: usize) {
        let width = self.width();
        let mut offset = self.display.cursor_offset();

        if self.wrap_pending {
            self.wrap_pending = false;
            if self.autowrap {
                // Soft wrap: flag the boundary cell and continue on the
                // next physical row — same logical line, no commit
                self.display.mark_wrapped(offset);
                offset += 1;
            }
            // Without autowrap the cursor stays put and overwrites
        }

        let lead = {
            let mut cell = self.pen.cell(ch);
            if cw == 2 {
                cell.attrs.insert(CellAttrs::WIDE);
            }
            cell
        };

        if self.insert_mode {
            self.display.insert_cell(offset, lead);
            if cw == 2 {
                self.display.insert_cell(offset + 1, Cell::wide_placeholder());
            }
        } else {
            self.display.set_cell(offset, lead);
            if cw == 2 {
                self.display.set_cell(offset + 1, Cell::wide_placeholder());
            }
        }

        let end = offset + cw;
        // Delayed wrap: when the written glyph ended exactly at the last
        // column, the cursor holds there until the next printable
        if self.display.col_of_offset(end - 1) == width - 1 {
            self.display.set_cursor_offset(end - 1);
            self.wrap_pending = self.autowrap;
        } else {
            self.display.set_cursor_offset(end);
        }
    }

    fn grid_print(&mut self, ch: char, cw: usize) {
        let (top, bottom) = self.margin_rows();
        let bg = self.pen.bg;
        let pen = self.pen;
        let insert = self.insert_mode;
        let autowrap = self.autowrap;
        let mut pending = self.wrap_pending;

        let grid = match self.active_grid() {
            Some(grid) => grid,
            None => return,
        };
        let width = grid.width();

        if pending {
            pending = false;
            if autowrap {
                grid.cursor_col = 0;
                if grid.cursor_row >= bottom {
                    grid.scroll_up(top, bottom, 1, bg);
                } else {
                    grid.cursor_row += 1;
                }
            }
        }

        // A wide glyph that cannot fit wraps whole, leaving a blank
        if cw == 2 && grid.cursor_col + 2 > width {
            if autowrap {
                grid.cursor_col = 0;
                if grid.cursor_row >= bottom {
                    grid.scroll_up(top, bottom, 1, bg);
                } else {
                    grid.cursor_row += 1;
                }
            } else {
                grid.cursor_col = width.saturating_sub(2);
            }
        }

        let (col, row) = (grid.cursor_col, grid.cursor_row);
        if insert {
            grid.insert_cells(col, row, cw, bg);
        }
        let mut lead = pen.cell(ch);
        if cw == 2 {
            lead.attrs.insert(CellAttrs::WIDE);
        }
        grid.set_cell(col, row, lead);
        if cw == 2 {
            grid.set_cell(col + 1, row, Cell::wide_placeholder());
        }

        let end = col + cw;
        if end >= width {
            grid.cursor_col = width - 1;
            pending = autowrap;
        } else {
            grid.cursor_col = end;
        }

        self.grid_dirty.mark(row);
        self.wrap_pending = pending;
    }

    // =========================================================================
    // C0 controls
    // =========================================================================

    fn control(&mut self, byte: u8) {
        match byte {
            0x07 => self.bell = true,
            0x08 => self.backspace(),
            0x09 => self.horizontal_tab(1),
            0x0A | 0x0B | 0x0C => self.line_feed(),
            0x0D => self.carriage_return(),
            _ => log::trace!("ignored control byte {:#04x}", byte),
        }
    }

    fn backspace(&mut self) {
        self.wrap_pending = false;
        if let Some(grid) = self.active_grid() {
            grid.cursor_col = grid.cursor_col.saturating_sub(1);
            return;
        }
        let offset = self.display.cursor_offset();
        if self.display.col_of_offset(offset) > 0 {
            self.display.set_cursor_offset(offset - 1);
        }
    }

    fn horizontal_tab(&mut self, n: usize) {
        self.wrap_pending = false;
        let width = self.width();
        let (col, _) = self.cursor_pos();
        let mut target = col;
        for _ in 0..n {
            target = match self.tabs.range(target + 1..).next() {
                Some(&stop) => stop,
                None => width - 1,
            };
        }
        self.move_cursor_col(target);
    }

    fn backward_tab(&mut self, n: usize) {
        let (col, _) = self.cursor_pos();
        let mut target = col;
        for _ in 0..n {
            target = match self.tabs.range(..target).next_back() {
                Some(&stop) => stop,
                None => 0,
            };
        }
        self.move_cursor_col(target);
    }

    fn line_feed(&mut self) {
        self.wrap_pending = false;
        let (top, bottom) = self.margin_rows();
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            if grid.cursor_row >= bottom {
                grid.scroll_up(top, bottom, 1, bg);
            } else {
                grid.cursor_row += 1;
            }
            self.grid_dirty.mark_all();
            return;
        }
        self.display.line_feed();
    }

    fn carriage_return(&mut self) {
        self.wrap_pending = false;
        if let Some(grid) = self.active_grid() {
            grid.cursor_col = 0;
            return;
        }
        self.display.carriage_return();
    }

    // =========================================================================
    // Cursor movement
    // =========================================================================

    fn move_cursor_to(&mut self, row: usize, col: usize) {
        self.wrap_pending = false;
        let row = row.min(self.height() - 1);
        let col = col.min(self.width() - 1);
        if let Some(grid) = self.active_grid() {
            let old = grid.cursor_row;
            grid.cursor_row = row;
            grid.cursor_col = col;
            self.grid_dirty.mark(old);
            self.grid_dirty.mark(row);
            return;
        }
        self.display.move_to(row, col);
    }

    fn move_cursor_col(&mut self, col: usize) {
        let (_, row) = self.cursor_pos();
        self.move_cursor_to(row, col);
    }

    fn move_cursor_rel(&mut self, d_row: isize, d_col: isize) {
        let (col, row) = self.cursor_pos();
        let (top, bottom) = self.margin_rows();

        // Vertical moves clamp at the margins when starting inside them
        let (min_row, max_row) = if row >= top && row <= bottom {
            (top, bottom)
        } else {
            (0, self.height() - 1)
        };

        let new_row = (row as isize + d_row).clamp(min_row as isize, max_row as isize) as usize;
        let new_col = (col as isize + d_col).clamp(0, self.width() as isize - 1) as usize;
        self.move_cursor_to(new_row, new_col);
    }

    /// Row parameter adjusted for origin mode (?6): rows count from the
    /// top margin while it is set.
    fn origin_row(&self, row: usize) -> usize {
        if self.origin_mode {
            let (top, bottom) = self.margin_rows();
            (top + row).min(bottom)
        } else {
            row
        }
    }

    fn reverse_index(&mut self) {
        let (top, bottom) = self.margin_rows();
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            if grid.cursor_row == top {
                grid.scroll_down(top, bottom, 1, bg);
            } else {
                grid.cursor_row -= 1;
            }
            self.grid_dirty.mark_all();
            return;
        }
        let (col, row) = self.display.cursor_pos();
        if row > 0 {
            self.display.move_to(row - 1, col);
        } else {
            log::debug!("reverse index at top of primary screen ignored");
        }
    }

    // =========================================================================
    // Save / restore cursor
    // =========================================================================

    fn save_cursor(&mut self) {
        let (col, row) = self.cursor_pos();
        let saved = SavedCursor {
            col,
            row,
            pen: self.pen,
            origin_mode: self.origin_mode,
        };
        if self.alt.is_some() {
            self.saved_alt = Some(saved);
        } else {
            self.saved_primary = Some(saved);
        }
    }

    fn restore_cursor(&mut self) {
        let saved = if self.alt.is_some() {
            self.saved_alt
        } else {
            self.saved_primary
        };
        if let Some(saved) = saved {
            self.pen = saved.pen;
            self.origin_mode = saved.origin_mode;
            self.move_cursor_to(saved.row, saved.col);
        } else {
            self.move_cursor_to(0, 0);
        }
    }

    // =========================================================================
    // Erase
    // =========================================================================

    fn erase_display(&mut self, mode: usize) {
        self.wrap_pending = false;
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            let (col, row) = (grid.cursor_col, grid.cursor_row);
            let width = grid.width();
            let height = grid.height();
            match mode {
                0 => {
                    grid.erase_in_row(row, col, width, bg);
                    for r in row + 1..height {
                        grid.erase_row(r, bg);
                    }
                }
                1 => {
                    for r in 0..row {
                        grid.erase_row(r, bg);
                    }
                    grid.erase_in_row(row, 0, col + 1, bg);
                }
                2 | 3 => grid.erase_all(bg),
                _ => log::debug!("unknown ED mode {}", mode),
            }
            self.grid_dirty.mark_all();
            return;
        }

        self.display.set_erase_color(bg);
        match mode {
            0 => self.display.erase_below(),
            1 => self.display.erase_above(),
            2 => self.display.erase_all(),
            3 => {
                self.display.erase_all();
                self.display.erase_scrollback();
            }
            _ => log::debug!("unknown ED mode {}", mode),
        }
    }

    fn erase_line(&mut self, mode: usize) {
        self.wrap_pending = false;
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            let (col, row) = (grid.cursor_col, grid.cursor_row);
            let width = grid.width();
            match mode {
                0 => grid.erase_in_row(row, col, width, bg),
                1 => grid.erase_in_row(row, 0, col + 1, bg),
                2 => grid.erase_row(row, bg),
                _ => log::debug!("unknown EL mode {}", mode),
            }
            self.grid_dirty.mark(row);
            return;
        }

        self.display.set_erase_color(bg);
        let offset = self.display.cursor_offset();
        match mode {
            0 => self.display.truncate_to(offset),
            1 => self.display.erase_chars(0, offset + 1),
            2 => {
                // The whole logical line goes, soft-wrapped overflow
                // included; the cursor keeps its column on the now-empty
                // line
                let col = self.display.col_of_offset(offset);
                self.display.clear_line();
                self.display.set_cursor_offset(col);
            }
            _ => log::debug!("unknown EL mode {}", mode),
        }
    }

    // =========================================================================
    // Insert / delete cells and lines
    // =========================================================================

    fn insert_chars(&mut self, n: usize) {
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            let (col, row) = (grid.cursor_col, grid.cursor_row);
            grid.insert_cells(col, row, n, bg);
            self.grid_dirty.mark(row);
            return;
        }
        self.display.set_erase_color(bg);
        let offset = self.display.cursor_offset();
        for _ in 0..n {
            self.display.insert_cell(offset, Cell::erased(bg));
        }
    }

    fn delete_chars(&mut self, n: usize) {
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            let (col, row) = (grid.cursor_col, grid.cursor_row);
            grid.delete_cells(col, row, n, bg);
            self.grid_dirty.mark(row);
            return;
        }
        let offset = self.display.cursor_offset();
        self.display.delete_chars(offset, n);
    }

    fn erase_chars(&mut self, n: usize) {
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            let (col, row) = (grid.cursor_col, grid.cursor_row);
            grid.erase_cells(col, row, n, bg);
            self.grid_dirty.mark(row);
            return;
        }
        self.display.set_erase_color(bg);
        let offset = self.display.cursor_offset();
        self.display.erase_chars(offset, n);
    }

    fn insert_lines(&mut self, n: usize) {
        let (top, bottom) = self.margin_rows();
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            let row = grid.cursor_row;
            if row >= top && row <= bottom {
                grid.insert_lines(row, n, bottom, bg);
                grid.cursor_col = 0;
            }
            self.grid_dirty.mark_all();
            return;
        }
        self.display.set_erase_color(bg);
        self.display.insert_blank_lines(n);
    }

    fn delete_lines(&mut self, n: usize) {
        let (top, bottom) = self.margin_rows();
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            let row = grid.cursor_row;
            if row >= top && row <= bottom {
                grid.delete_lines(row, n, bottom, bg);
                grid.cursor_col = 0;
            }
            self.grid_dirty.mark_all();
            return;
        }
        self.display.set_erase_color(bg);
        self.display.delete_lines_at_tail();
    }

    fn scroll_region_up(&mut self, n: usize) {
        let (top, bottom) = self.margin_rows();
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            grid.scroll_up(top, bottom, n, bg);
            self.grid_dirty.mark_all();
            return;
        }
        self.display.set_erase_color(bg);
        self.display.scroll_content_up(n);
    }

    fn scroll_region_down(&mut self, n: usize) {
        let (top, bottom) = self.margin_rows();
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            grid.scroll_down(top, bottom, n, bg);
            self.grid_dirty.mark_all();
            return;
        }
        log::debug!("scroll-down on the primary screen without a region ignored");
    }

    // =========================================================================
    // Margins / scroll-region overlay
    // =========================================================================

    fn set_margins(&mut self, top_1: usize, bottom_1: usize) {
        let height = self.height();
        let top = top_1.max(1) - 1;
        let bottom = bottom_1.clamp(1, height) - 1;

        let full = top == 0 && bottom == height - 1;
        if top >= bottom || full {
            self.margins = None;
            self.drop_overlay();
        } else {
            self.margins = Some((top, bottom));
            if self.alt.is_none() {
                self.enter_overlay();
            }
        }

        // DECSTBM homes the cursor (to the origin when ?6 is set)
        let home_row = self.origin_row(0);
        if self.alt.is_some() || self.overlay.is_some() {
            self.move_cursor_to(home_row, 0);
        }
        // On the primary screen the cursor returns to the live edge so
        // output keeps appending to scrollback
    }

    /// Materializes the viewport into the overlay grid. While active, all
    /// edits land on the grid and nothing is committed — a TUI scrolling
    /// inside its margins cannot pollute scrollback.
    fn enter_overlay(&mut self) {
        if self.overlay.is_some() {
            return;
        }
        let rows = self.display.viewport_cells();
        let mut grid = Grid::from_rows(rows, self.width(), self.height());
        let (col, row) = self.display.cursor_pos();
        grid.cursor_col = col;
        grid.cursor_row = row;
        self.overlay = Some(grid);
        self.grid_dirty.mark_all();
    }

    fn drop_overlay(&mut self) {
        if self.overlay.take().is_some() {
            self.display.mark_all_dirty();
            self.display.scroll_to_bottom();
        }
    }

    // =========================================================================
    // Alt screen
    // =========================================================================

    fn enter_alt_screen(&mut self) {
        if self.alt.is_some() {
            return;
        }
        let (col, row) = self.cursor_pos();
        self.alt_entry = Some(SavedCursor {
            col,
            row,
            pen: self.pen,
            origin_mode: self.origin_mode,
        });
        // The alt screen starts cleared, with its own pen and no margins
        self.alt = Some(Grid::new(self.width(), self.height()));
        self.pen = Pen::default();
        self.margins = None;
        self.wrap_pending = false;
        self.grid_dirty.mark_all();
    }

    fn leave_alt_screen(&mut self) {
        if self.alt.take().is_none() {
            return;
        }
        if let Some(saved) = self.alt_entry.take() {
            self.pen = saved.pen;
            self.origin_mode = saved.origin_mode;
        }
        self.margins = None;
        self.wrap_pending = false;
        // The primary screen (scrollback included) is exactly as we left
        // it; everything repaints
        self.display.mark_all_dirty();
        self.grid_dirty.mark_all();
        if let Some(f) = self.hooks.on_screen_restored.as_mut() {
            f();
        }
    }

    // =========================================================================
    // Modes
    // =========================================================================

    fn set_mode(&mut self, private: bool, mode: u16, on: bool) {
        if private {
            match mode {
                1 => self.app_cursor_keys = on,
                6 => {
                    self.origin_mode = on;
                    let home = self.origin_row(0);
                    if self.alt.is_some() || self.overlay.is_some() {
                        self.move_cursor_to(home, 0);
                    }
                }
                7 => self.autowrap = on,
                12 => {} // cursor blink: accepted, ignored
                25 => self.cursor_visible = on,
                1049 => {
                    if on {
                        self.enter_alt_screen();
                    } else {
                        self.leave_alt_screen();
                    }
                }
                2004 => {} // bracketed paste: host concern, accepted
                2026 => self.synchronized = on,
                other => log::debug!("ignored private mode ?{} {}", other, if on { "h" } else { "l" }),
            }
        } else {
            match mode {
                4 => self.insert_mode = on,
                other => log::debug!("ignored mode {} {}", other, if on { "h" } else { "l" }),
            }
        }
    }

    // =========================================================================
    // SGR
    // =========================================================================

    fn apply_sgr(&mut self, params: &[u16]) {
        let mut i = 0;
        while i < params.len() {
            let advanced = match params[i] {
                0 => {
                    self.pen = Pen::default();
                    1
                }
                1 => self.set_attr(CellAttrs::BOLD, true),
                2 => self.set_attr(CellAttrs::DIM, true),
                3 => self.set_attr(CellAttrs::ITALIC, true),
                4 => self.set_attr(CellAttrs::UNDERLINE, true),
                7 => self.set_attr(CellAttrs::REVERSE, true),
                8 => self.set_attr(CellAttrs::HIDDEN, true),
                9 => self.set_attr(CellAttrs::STRIKETHROUGH, true),
                22 => {
                    self.pen.attrs.remove(CellAttrs::BOLD);
                    self.pen.attrs.remove(CellAttrs::DIM);
                    1
                }
                23 => self.set_attr(CellAttrs::ITALIC, false),
                24 => self.set_attr(CellAttrs::UNDERLINE, false),
                27 => self.set_attr(CellAttrs::REVERSE, false),
                28 => self.set_attr(CellAttrs::HIDDEN, false),
                29 => self.set_attr(CellAttrs::STRIKETHROUGH, false),
                30..=37 => {
                    self.pen.fg = Color::Palette((params[i] - 30) as u8);
                    1
                }
                38 => match Self::extended_color(&params[i..]) {
                    Some((color, used)) => {
                        self.pen.fg = color;
                        used
                    }
                    None => break,
                },
                39 => {
                    self.pen.fg = Color::Default;
                    1
                }
                40..=47 => {
                    self.pen.bg = Color::Palette((params[i] - 40) as u8);
                    1
                }
                48 => match Self::extended_color(&params[i..]) {
                    Some((color, used)) => {
                        self.pen.bg = color;
                        used
                    }
                    None => break,
                },
                49 => {
                    self.pen.bg = Color::Default;
                    1
                }
                90..=97 => {
                    self.pen.fg = Color::Palette((params[i] - 90 + 8) as u8);
                    1
                }
                100..=107 => {
                    self.pen.bg = Color::Palette((params[i] - 100 + 8) as u8);
                    1
                }
                other => {
                    log::debug!("ignored SGR {}", other);
                    1
                }
            };
            i += advanced;
        }
    }

    fn set_attr(&mut self, attr: CellAttrs, on: bool) -> usize {
        self.pen.attrs.set(attr, on);
        1
    }

    /// `38;5;n` / `38;2;r;g;b` (and the 48 analogs). Returns the color and
    /// the number of parameters consumed.
    fn extended_color(params: &[u16]) -> Option<(Color, usize)> {
        match *params.get(1)? {
            5 => {
                let idx = *params.get(2)? as u8;
                Some((Color::Palette256(idx), 3))
            }
            2 => {
                let r = *params.get(2)? as u8;
                let g = *params.get(3)? as u8;
                let b = *params.get(4)? as u8;
                Some((Color::Rgb { r, g, b }, 5))
            }
            other => {
                log::debug!("ignored extended color mode {}", other);
                None
            }
        }
    }

    // =========================================================================
    // Replies
    // =========================================================================

    fn device_status_report(&mut self, kind: usize) {
        match kind {
            5 => self.reply(b"\x1b[0n"),
            6 => {
                let (col, row) = self.cursor_pos();
                let reply = format!("\x1b[{};{}R", row + 1, col + 1);
                self.reply(reply.as_bytes());
            }
            other => log::debug!("ignored DSR {}", other),
        }
    }

    fn device_attributes(&mut self) {
        self.reply(b"\x1b[?6c");
    }

    fn report_mode(&mut self, mode: usize) {
        // DECRQM: 2026 is the one mode whose support we advertise
        let value = match mode {
            2026 => {
                if self.synchronized {
                    1
                } else {
                    2
                }
            }
            _ => 0,
        };
        let reply = format!("\x1b[?{};{}$y", mode, value);
        self.reply(reply.as_bytes());
    }

    // =========================================================================
    // OSC
    // =========================================================================

    fn osc(&mut self, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        let (code, rest) = match text.split_once(';') {
            Some((code, rest)) => (code, rest),
            None => (text.as_ref(), ""),
        };

        match code {
            "0" | "2" => {
                let title = rest.to_string();
                if let Some(f) = self.hooks.on_title.as_mut() {
                    f(&title);
                }
                self.title = Some(title);
            }
            "10" => self.osc_default_color(rest, false),
            "11" => self.osc_default_color(rest, true),
            "52" => self.osc_clipboard(rest),
            "133" => self.osc_shell_mark(rest),
            other => log::debug!("ignored OSC {}", other),
        }
    }

    /// OSC 52: `<selection>;<base64 payload>`. The clipboard selection is
    /// `c` or empty; all others are ignored.
    fn osc_clipboard(&mut self, rest: &str) {
        let (selection, payload) = match rest.split_once(';') {
            Some(parts) => parts,
            None => {
                log::debug!("malformed OSC 52");
                return;
            }
        };
        if !(selection.is_empty() || selection.contains('c')) {
            return;
        }

        if payload == "?" {
            let data = match self.hooks.on_clipboard_get.as_mut() {
                Some(f) => f(),
                None => None,
            };
            if let Some(data) = data {
                let reply = format!("\x1b]52;c;{}\x07", BASE64.encode(&data));
                self.reply(reply.as_bytes());
            }
            return;
        }

        match BASE64.decode(payload) {
            Ok(decoded) => {
                if let Some(f) = self.hooks.on_clipboard_set.as_mut() {
                    f(&decoded);
                }
            }
            Err(err) => log::warn!("undecodable OSC 52 payload: {}", err),
        }
    }

    /// OSC 133 shell-integration marks.
    fn osc_shell_mark(&mut self, rest: &str) {
        let (mark, args) = match rest.split_once(';') {
            Some(parts) => parts,
            None => (rest, ""),
        };
        match mark {
            "A" => {
                self.marks.in_prompt = true;
                self.marks.in_input = false;
                self.marks.in_command = false;
                if let Some(f) = self.hooks.on_prompt_start.as_mut() {
                    f();
                }
            }
            "B" => {
                self.marks.in_prompt = false;
                self.marks.in_input = true;
                if let Some(f) = self.hooks.on_input_start.as_mut() {
                    f();
                }
            }
            "C" => {
                self.marks.in_input = false;
                self.marks.in_command = true;
                if let Some(f) = self.hooks.on_command_start.as_mut() {
                    f();
                }
            }
            "D" => {
                self.marks.in_command = false;
                let exit = args.split(';').next().and_then(|s| s.parse().ok());
                self.marks.last_exit = exit;
                if let Some(f) = self.hooks.on_command_end.as_mut() {
                    f(exit);
                }
            }
            other => log::debug!("ignored OSC 133 mark {:?}", other),
        }
    }

    /// OSC 10/11: set or query the default foreground/background.
    fn osc_default_color(&mut self, rest: &str, is_bg: bool) {
        if rest == "?" {
            let current = if is_bg { self.default_bg } else { self.default_fg };
            let (r, g, b) = match current {
                Some(Color::Rgb { r, g, b }) => (r, g, b),
                _ if is_bg => (0, 0, 0),
                _ => (0xE5, 0xE5, 0xE5),
            };
            let code = if is_bg { 11 } else { 10 };
            let reply = format!(
                "\x1b]{};rgb:{:02x}{:02x}/{:02x}{:02x}/{:02x}{:02x}\x07",
                code, r, r, g, g, b, b
            );
            self.reply(reply.as_bytes());
            return;
        }

        let color = match parse_color_spec(rest) {
            Some(color) => color,
            None => {
                log::debug!("unparseable OSC color spec {:?}", rest);
                return;
            }
        };
        if is_bg {
            self.default_bg = Some(color);
            if let Some(f) = self.hooks.on_default_bg_changed.as_mut() {
                f(color);
            }
        } else {
            self.default_fg = Some(color);
            if let Some(f) = self.hooks.on_default_fg_changed.as_mut() {
                f(color);
            }
        }
    }

    // =========================================================================
    // Resets
    // =========================================================================

    fn full_reset(&mut self) {
        self.leave_alt_screen();
        self.overlay = None;
        self.margins = None;
        self.pen = Pen::default();
        self.insert_mode = false;
        self.autowrap = true;
        self.origin_mode = false;
        self.app_cursor_keys = false;
        self.cursor_visible = true;
        self.synchronized = false;
        self.wrap_pending = false;
        self.tabs = default_tabs(self.width());
        self.saved_primary = None;
        self.saved_alt = None;
        self.marks = ShellMarks::default();
        self.display.set_erase_color(Color::Default);
        self.display.erase_all();
        self.grid_dirty.mark_all();
    }

    fn back_index(&mut self) {
        let (top, bottom) = self.margin_rows();
        let bg = self.pen.bg;
        if let Some(grid) = self.active_grid() {
            if grid.cursor_col == 0 {
                grid.shift_columns_right(top, bottom, bg);
            } else {
                grid.cursor_col -= 1;
            }
            self.grid_dirty.mark_all();
            return;
        }
        self.backspace();
    }

    fn forward_index(&mut self) {
        let (top, bottom) = self.margin_rows();
        let bg = self.pen.bg;
        let width = self.width();
        if let Some(grid) = self.active_grid() {
            if grid.cursor_col + 1 >= width {
                grid.shift_columns_left(top, bottom, bg);
            } else {
                grid.cursor_col += 1;
            }
            self.grid_dirty.mark_all();
            return;
        }
        self.move_cursor_rel(0, 1);
    }
}

/// `#rrggbb`, `rgb:rr/gg/bb` and `rgb:rrrr/gggg/bbbb` color specs.
fn parse_color_spec(spec: &str) -> Option<Color> {
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some(Color::Rgb { r, g, b });
        }
        return None;
    }

    let rgb = spec.strip_prefix("rgb:")?;
    let mut parts = rgb.split('/');
    let mut channel = |s: Option<&str>| -> Option<u8> {
        let s = s?;
        match s.len() {
            2 => u8::from_str_radix(s, 16).ok(),
            4 => u16::from_str_radix(s, 16).ok().map(|v| (v >> 8) as u8),
            _ => None,
        }
    };
    let r = channel(parts.next())?;
    let g = channel(parts.next())?;
    let b = channel(parts.next())?;
    Some(Color::Rgb { r, g, b })
}

impl VtActions for Inner {
    fn print(&mut self, ch: char) {
        self.print_char(ch);
    }

    fn execute(&mut self, byte: u8) {
        self.control(byte);
    }

    fn csi_dispatch(&mut self, params: &[u16], private: Option<u8>, intermediates: &[u8], final_byte: u8) {
        // Intermediate-qualified finals first
        if intermediates == b"$" && final_byte == b'p' {
            self.report_mode(param(params, 0, 0));
            return;
        }
        if !intermediates.is_empty() {
            log::debug!(
                "ignored CSI with intermediates {:?} final {:?}",
                intermediates,
                final_byte as char
            );
            return;
        }

        match final_byte {
            b'A' => self.move_cursor_rel(-(param(params, 0, 1) as isize), 0),
            b'B' => self.move_cursor_rel(param(params, 0, 1) as isize, 0),
            b'C' => self.move_cursor_rel(0, param(params, 0, 1) as isize),
            b'D' => self.move_cursor_rel(0, -(param(params, 0, 1) as isize)),
            b'E' => {
                self.move_cursor_rel(param(params, 0, 1) as isize, 0);
                self.move_cursor_col(0);
            }
            b'F' => {
                self.move_cursor_rel(-(param(params, 0, 1) as isize), 0);
                self.move_cursor_col(0);
            }
            b'G' => self.move_cursor_col(param(params, 0, 1) - 1),
            b'd' => {
                let row = self.origin_row(param(params, 0, 1) - 1);
                let (col, _) = self.cursor_pos();
                self.move_cursor_to(row, col);
            }
            b'H' | b'f' => {
                let row = self.origin_row(param(params, 0, 1) - 1);
                let col = param(params, 1, 1) - 1;
                self.move_cursor_to(row, col);
            }
            b'I' => self.horizontal_tab(param(params, 0, 1)),
            b'Z' => self.backward_tab(param(params, 0, 1)),
            b'J' => self.erase_display(param(params, 0, 0)),
            b'K' => self.erase_line(param(params, 0, 0)),
            b'L' => self.insert_lines(param(params, 0, 1)),
            b'M' => self.delete_lines(param(params, 0, 1)),
            b'@' => self.insert_chars(param(params, 0, 1)),
            b'P' => self.delete_chars(param(params, 0, 1)),
            b'X' => self.erase_chars(param(params, 0, 1)),
            b'S' => self.scroll_region_up(param(params, 0, 1)),
            b'T' => self.scroll_region_down(param(params, 0, 1)),
            b'r' => {
                let top = param(params, 0, 1);
                let bottom = param(params, 1, self.height());
                self.set_margins(top, bottom);
            }
            b's' => self.save_cursor(),
            b'u' => self.restore_cursor(),
            b'm' => self.apply_sgr(params),
            b'h' => {
                for &mode in params {
                    self.set_mode(private == Some(b'?'), mode, true);
                }
            }
            b'l' => {
                for &mode in params {
                    self.set_mode(private == Some(b'?'), mode, false);
                }
            }
            b'n' => self.device_status_report(param(params, 0, 0)),
            b'c' => self.device_attributes(),
            other => log::debug!("ignored CSI final {:?}", other as char),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], byte: u8) {
        if !intermediates.is_empty() {
            // Charset designations and friends: accepted, ignored
            log::trace!("ignored ESC {:?} {:?}", intermediates, byte as char);
            return;
        }
        match byte {
            b'c' => self.full_reset(),
            b'M' => self.reverse_index(),
            b'D' => self.line_feed(),
            b'E' => {
                self.carriage_return();
                self.line_feed();
            }
            b'7' => self.save_cursor(),
            b'8' => self.restore_cursor(),
            b'=' | b'>' => {} // keypad modes: accepted, ignored
            b'6' => self.back_index(),
            b'9' => self.forward_index(),
            other => log::debug!("ignored ESC {:?}", other as char),
        }
    }

    fn osc_dispatch(&mut self, data: &[u8]) {
        self.osc(data);
    }
}
