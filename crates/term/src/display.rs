// Chunk: docs/chunks/display_buffer - Display buffer, viewport and reflow

//! The display buffer: logical lines projected onto the physical viewport.
//!
//! Exactly one logical line is mutable at a time — the *current* line —
//! addressed by a logical cell offset. Committed lines live in scrollback.
//! When the cursor moves onto a committed row, that line is *reopened*: its
//! cells become the current line, and edits flush back through the store's
//! update path when the cursor leaves.
//!
//! The visible grid is derived, never stored: wrap the committed tail plus
//! the current line at the viewport width, bottom-anchor once the live
//! content exceeds the height, then apply the scroll offset. Resize changes
//! the wrap and nothing else, which is what makes reflow lossless.
//!
//! ```text
//!   scrollback (logical lines)          viewport (physical rows)
//!   ┌────────────────────────┐
//!   │ …older lines… (disk)   │ ◀── scroll_offset reaches here
//!   │ line 97                │      ┌──────────────────────┐
//!   │ line 98 (wraps ×2)     │ ───▶ │ row 0: line 98 [0]   │
//!   │ line 99                │      │ row 1: line 98 [1]   │
//!   └────────────────────────┘      │ row 2: line 99       │
//!   current line ──────────────────▶│ row 3: current ◀ cursor
//!                                   │ row 4: (blank)       │
//!                                   └──────────────────────┘
//! ```

use txterm_cells::{
    offset_to_row_col, row_col_to_offset, row_start_of_offset, wrap_to_width, Cell, Color,
    LogicalLine,
};
use txterm_history::Scrollback;

use crate::dirty::DirtyRows;

/// Which logical line a viewport row displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowSource {
    /// A committed line (possibly the reopened one).
    Committed(u64),
    /// The uncommitted current line.
    Current,
}

/// One materialized viewport row.
struct LayoutRow {
    source: RowSource,
    subrow: usize,
    cells: Vec<Cell>,
}

/// A computed window over the physical row stream.
struct Layout {
    /// The visible rows, oldest first. At most `height`; short when content
    /// underfills the viewport.
    rows: Vec<LayoutRow>,
    /// Window row of the current line's first physical row (may be
    /// negative when scrolled past it).
    cur_row0: isize,
    /// Global index of the line at the top of the live (unscrolled) window.
    live_edge_base: u64,
    /// Physical rows available above the live window (scroll ceiling).
    max_scroll: usize,
}

/// The display buffer / viewport (see module docs).
pub struct DisplayBuffer {
    width: usize,
    height: usize,
    history: Scrollback,
    current: LogicalLine,
    /// Set when the current line is a committed line being re-edited.
    reopened: Option<u64>,
    /// Logical cell offset of the cursor within the current line.
    cursor: usize,
    /// Physical rows scrolled up from the live edge.
    scroll_offset: usize,
    /// Oldest global index the live view may show; raised by erase-display
    /// so cleared content stays reachable only by scrolling.
    view_floor: u64,
    erase_bg: Color,
    dirty: DirtyRows,
}

impl DisplayBuffer {
    pub fn new(width: usize, height: usize, history: Scrollback) -> Self {
        let mut dirty = DirtyRows::new();
        dirty.mark_all();
        DisplayBuffer {
            width: width.max(1),
            height: height.max(1),
            history,
            current: LogicalLine::new(),
            reopened: None,
            cursor: 0,
            scroll_offset: 0,
            view_floor: 0,
            erase_bg: Color::Default,
            dirty,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn history(&self) -> &Scrollback {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut Scrollback {
        &mut self.history
    }

    /// Consumes the buffer for shutdown, handing back the scrollback.
    pub fn into_history(self) -> Scrollback {
        self.history
    }

    pub fn current_line(&self) -> &LogicalLine {
        &self.current
    }

    pub fn set_erase_color(&mut self, bg: Color) {
        self.erase_bg = bg;
    }

    pub fn erase_color(&self) -> Color {
        self.erase_bg
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Number of physical rows `cells` occupies at the current width.
    fn rows_of(&self, cells: &[Cell]) -> usize {
        if cells.is_empty() {
            1
        } else {
            offset_to_row_col(cells, self.width, cells.len() - 1).0 + 1
        }
    }

    fn layout(&self) -> Layout {
        let width = self.width;
        let height = self.height;
        let want = height + self.scroll_offset;
        let total = self.history.total_len();
        let floor = self.history.floor();
        // Prefetch margins: extra lines materialized past the window edge
        // so small scroll steps stay cheap
        let config = self.history.config();
        let margin_above = config.margin_above
            + if self.scroll_offset > 0 {
                config.margin_below
            } else {
                0
            };

        // Collect whole-line row blocks from newest to oldest until the
        // window (plus the prefetch margin) is covered.
        let mut blocks: Vec<Vec<LayoutRow>> = Vec::new();
        let mut rows_count = 0usize;
        let mut live_rows = 0usize;
        let mut extra_lines = 0usize;

        if self.reopened.is_none() {
            let block = self.line_block(RowSource::Current, self.current.display_cells());
            rows_count += block.len();
            live_rows += block.len();
            blocks.push(block);
        }

        let mut g = total;
        while g > floor {
            if rows_count >= want {
                extra_lines += 1;
                if extra_lines > margin_above {
                    break;
                }
            }
            g -= 1;

            let block = if Some(g) == self.reopened {
                self.line_block(RowSource::Committed(g), self.current.display_cells())
            } else {
                match self.history.get(g) {
                    Some(line) => {
                        let cells = line.display_cells().to_vec();
                        self.line_block(RowSource::Committed(g), &cells)
                    }
                    None => continue,
                }
            };
            rows_count += block.len();
            if g >= self.view_floor {
                live_rows += block.len();
            }
            blocks.push(block);
        }

        // Chronological order
        blocks.reverse();
        let rows: Vec<LayoutRow> = blocks.into_iter().flatten().collect();
        let m = rows.len();

        // Live window start within the collected rows
        let s0 = if live_rows < height {
            m - live_rows
        } else {
            m - height
        };
        let s = s0.saturating_sub(self.scroll_offset);
        let window_end = (s + height).min(m);

        let live_edge_base = match rows.get(s0).map(|r| r.source) {
            Some(RowSource::Committed(g)) => g,
            _ => total,
        };

        let cur_row0 = rows
            .iter()
            .position(|row| {
                row.subrow == 0
                    && match row.source {
                        RowSource::Current => true,
                        RowSource::Committed(g) => Some(g) == self.reopened,
                    }
            })
            .map(|idx| idx as isize - s as isize)
            .unwrap_or(height as isize);

        let window: Vec<LayoutRow> = rows.into_iter().skip(s).take(window_end - s).collect();

        Layout {
            rows: window,
            cur_row0,
            live_edge_base,
            max_scroll: s0,
        }
    }

    fn line_block(&self, source: RowSource, cells: &[Cell]) -> Vec<LayoutRow> {
        wrap_to_width(cells, self.width)
            .into_iter()
            .enumerate()
            .map(|(subrow, cells)| LayoutRow {
                source,
                subrow,
                cells,
            })
            .collect()
    }

    /// The viewport as a full `height × width` cell matrix, rows padded
    /// with empty cells.
    pub fn viewport_cells(&self) -> Vec<Vec<Cell>> {
        let layout = self.layout();
        let mut grid: Vec<Vec<Cell>> = layout
            .rows
            .into_iter()
            .map(|row| {
                let mut cells = row.cells;
                cells.resize(self.width, Cell::default());
                cells
            })
            .collect();
        grid.resize(self.height, vec![Cell::default(); self.width]);
        grid
    }

    /// Global line index at the top of the live viewport.
    pub fn live_edge_base(&self) -> u64 {
        self.layout().live_edge_base
    }

    /// Viewport row where new output appears (the current line's first
    /// row; clamps into the viewport when scrolled away).
    pub fn live_edge_row(&self) -> usize {
        let layout = self.layout();
        layout.cur_row0.clamp(0, self.height as isize - 1) as usize
    }

    // =========================================================================
    // Cursor
    // =========================================================================

    pub fn cursor_offset(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor_offset(&mut self, offset: usize) {
        self.cursor = offset;
    }

    /// Column the given logical offset maps to at the current width.
    pub fn col_of_offset(&self, offset: usize) -> usize {
        offset_to_row_col(&self.current.cells, self.width, offset).1
    }

    /// Physical `(col, row)` of the cursor, derived from the logical offset
    /// and clamped into the viewport.
    pub fn cursor_pos(&self) -> (usize, usize) {
        let (subrow, col) = offset_to_row_col(&self.current.cells, self.width, self.cursor);
        let layout = self.layout();
        let row = layout.cur_row0 + subrow as isize;
        (
            col.min(self.width - 1),
            row.clamp(0, self.height as isize - 1) as usize,
        )
    }

    /// Moves the cursor to a viewport position. Landing on a committed row
    /// reopens that line; landing below the live edge commits blank lines
    /// until the target row exists.
    pub fn move_to(&mut self, row: usize, col: usize) {
        let row = row.min(self.height - 1);
        let col = col.min(self.width - 1);
        self.mark_cursor_row();

        let mut guard = self.height + 1;
        loop {
            let layout = self.layout();
            if row < layout.rows.len() {
                let target = &layout.rows[row];
                let subrow = target.subrow;
                match target.source {
                    RowSource::Current => {
                        self.cursor =
                            row_col_to_offset(&self.current.cells, self.width, subrow, col);
                    }
                    RowSource::Committed(g) if Some(g) == self.reopened => {
                        self.cursor =
                            row_col_to_offset(&self.current.cells, self.width, subrow, col);
                    }
                    RowSource::Committed(g) => {
                        // A fresh current line with content is visible on
                        // screen; commit it before leaving it behind
                        self.flush_current();
                        if !self.current.is_empty() {
                            self.commit_current_line();
                        }
                        self.reopen(g);
                        self.cursor =
                            row_col_to_offset(&self.current.cells, self.width, subrow, col);
                    }
                }
                break;
            }

            // Below the live edge: grow committed content one row at a
            // time. Flushing a reopened line already surfaces the fresh
            // tail row; otherwise commit the current line
            if self.reopened.is_some() {
                self.flush_current();
            } else {
                self.commit_current_line();
            }
            guard -= 1;
            if guard == 0 {
                self.cursor = col;
                break;
            }
        }
        self.mark_cursor_row();
    }

    /// Carriage return: back to the start of the physical row containing
    /// the cursor — not to offset zero, which after a soft wrap would be a
    /// different row entirely.
    pub fn carriage_return(&mut self) {
        self.cursor = row_start_of_offset(&self.current.cells, self.width, self.cursor);
    }

    /// Line feed, preserving the column. Within a wrapped line this moves
    /// to the next physical row; on the last row it commits and opens the
    /// next line.
    pub fn line_feed(&mut self) {
        let (subrow, col) = offset_to_row_col(&self.current.cells, self.width, self.cursor);
        let line_rows = self.rows_of(&self.current.cells);
        self.mark_cursor_row();

        if subrow + 1 < line_rows {
            self.cursor = row_col_to_offset(&self.current.cells, self.width, subrow + 1, col);
        } else {
            self.commit_current_line();
            if self.reopened.is_some() {
                self.cursor = row_col_to_offset(&self.current.cells, self.width, 0, col);
            } else {
                self.cursor = col;
            }
        }
        self.mark_cursor_row();
    }

    /// Commits the current line (append, or update when reopened) and
    /// opens the next one. Inside a reopened region the next committed
    /// line is reopened in turn; at the tail a fresh line starts.
    pub fn commit_current_line(&mut self) {
        let mut line = std::mem::take(&mut self.current);
        line.fixed_width = self.width as u32;
        self.cursor = 0;

        match self.reopened.take() {
            Some(g) => {
                self.history.update(g, line);
                if g + 1 < self.history.total_len() {
                    self.reopen(g + 1);
                }
            }
            None => {
                self.history.append(line);
                // Committing shifts every row once the view is full
                if self.scroll_offset == 0 {
                    self.dirty.mark_all();
                }
            }
        }
    }

    /// Writes a reopened line back and returns to a fresh tail line.
    fn flush_current(&mut self) {
        if let Some(g) = self.reopened.take() {
            let mut line = std::mem::take(&mut self.current);
            line.fixed_width = self.width as u32;
            self.history.update(g, line);
        }
    }

    fn reopen(&mut self, g: u64) {
        self.current = self.history.get(g).unwrap_or_default();
        self.reopened = Some(g);
    }

    // =========================================================================
    // Current-line edits
    // =========================================================================

    pub fn set_cell(&mut self, offset: usize, cell: Cell) {
        self.current.set_cell(offset, cell);
        self.mark_current_rows();
    }

    pub fn insert_cell(&mut self, offset: usize, cell: Cell) {
        self.current.insert_cell(offset, cell);
        self.mark_current_rows();
    }

    /// ECH: replace `n` cells with erased cells.
    pub fn erase_chars(&mut self, offset: usize, n: usize) {
        let bg = self.erase_bg;
        self.current.erase_cells(offset, n, bg);
        self.mark_current_rows();
    }

    /// DCH: delete `n` cells, shifting the remainder left.
    pub fn delete_chars(&mut self, offset: usize, n: usize) {
        self.current.delete_cells(offset, n);
        self.mark_current_rows();
    }

    /// EL-0: drop everything from `offset` onward.
    pub fn truncate_to(&mut self, offset: usize) {
        self.mark_current_rows();
        self.current.truncate_to(offset);
    }

    /// EL-2: empty the whole current logical line, every physical row of
    /// it. Overflow that soft-wrapped onto later rows is gone too.
    pub fn clear_line(&mut self) {
        self.mark_current_rows();
        self.current.clear();
        self.cursor = 0;
    }

    /// Flags the cell at `offset` as a soft-wrap boundary.
    pub fn mark_wrapped(&mut self, offset: usize) {
        if let Some(cell) = self.current.cells.get_mut(offset) {
            cell.wrapped = true;
        }
    }

    // =========================================================================
    // Erase display
    // =========================================================================

    /// ED-0: cursor to end of screen. Truncates the current line at the
    /// cursor and blanks committed rows below it.
    pub fn erase_below(&mut self) {
        self.current.truncate_to(self.cursor);
        let after: Vec<u64> = self.committed_rows_where(|layout_row, cur_row0| {
            layout_row > cur_row0
        });
        for g in after {
            self.history.update(g, LogicalLine::new());
        }
        self.dirty.mark_all();
    }

    /// ED-1: start of screen through the cursor.
    pub fn erase_above(&mut self) {
        let bg = self.erase_bg;
        self.current.erase_cells(0, self.cursor + 1, bg);
        let before: Vec<u64> = self.committed_rows_where(|layout_row, cur_row0| {
            layout_row < cur_row0
        });
        for g in before {
            self.history.update(g, LogicalLine::new());
        }
        self.dirty.mark_all();
    }

    /// ED-2: clear the screen without touching scrollback. The view floor
    /// rises past the committed content, so the cleared lines stay
    /// reachable by scrolling up.
    pub fn erase_all(&mut self) {
        self.flush_current();
        if !self.current.is_empty() {
            self.commit_current_line();
        }
        self.view_floor = self.history.total_len();
        self.current = LogicalLine::new();
        self.reopened = None;
        self.cursor = 0;
        self.scroll_offset = 0;
        self.dirty.mark_all();
    }

    /// ED-3: clear screen and scrollback both.
    pub fn erase_scrollback(&mut self) {
        self.history.clear();
        self.view_floor = self.history.total_len();
        self.dirty.mark_all();
    }

    /// Committed lines whose rows satisfy `pred(window_row, cur_row0)`,
    /// excluding the reopened line itself.
    fn committed_rows_where(&self, pred: impl Fn(isize, isize) -> bool) -> Vec<u64> {
        let layout = self.layout();
        let mut out = Vec::new();
        for (i, row) in layout.rows.iter().enumerate() {
            if let RowSource::Committed(g) = row.source {
                if Some(g) != self.reopened
                    && pred(i as isize, layout.cur_row0)
                    && !out.contains(&g)
                {
                    out.push(g);
                }
            }
        }
        out
    }

    // =========================================================================
    // Scroll-region helpers on the primary screen
    // =========================================================================

    /// Full-screen scroll up: old rows move into scrollback, blank rows
    /// appear at the live edge. This is the only region scroll that feeds
    /// scrollback; bounded regions run on the overlay grid instead.
    pub fn scroll_content_up(&mut self, n: usize) {
        for _ in 0..n {
            self.flush_current();
            self.commit_current_line();
        }
        self.dirty.mark_all();
    }

    /// Inserts `n` blank lines above the current line (IL at the tail with
    /// nothing committed below the cursor).
    pub fn insert_blank_lines(&mut self, n: usize) {
        if self.reopened.is_some() {
            log::debug!("insert-lines over committed rows ignored on the primary screen");
            return;
        }
        let save = std::mem::take(&mut self.current);
        let save_cursor = self.cursor;
        for _ in 0..n {
            self.history.append(LogicalLine::new());
        }
        self.current = save;
        self.cursor = save_cursor;
        self.dirty.mark_all();
    }

    /// Deletes the current line's content (DL at the tail: rows below are
    /// blank, so deleting pulls blank up).
    pub fn delete_lines_at_tail(&mut self) {
        self.mark_current_rows();
        self.current.clear();
        self.cursor = 0;
    }

    // =========================================================================
    // Viewport scrolling
    // =========================================================================

    pub fn scroll_up(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(n);
        let layout = self.layout();
        self.scroll_offset = self.scroll_offset.min(layout.max_scroll);
        self.dirty.mark_all();
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
        self.dirty.mark_all();
    }

    pub fn scroll_to_bottom(&mut self) {
        if self.scroll_offset != 0 {
            self.scroll_offset = 0;
            self.dirty.mark_all();
        }
    }

    pub fn at_live_edge(&self) -> bool {
        self.scroll_offset == 0
    }

    // =========================================================================
    // Resize / dirty
    // =========================================================================

    /// Resize recomputes the wrap; no logical line is rewritten. The
    /// cursor's logical offset is untouched, so its physical position
    /// follows the new wrap.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width.max(1);
        self.height = height.max(1);
        let layout = self.layout();
        self.scroll_offset = self.scroll_offset.min(layout.max_scroll);
        self.dirty.mark_all();
    }

    pub fn take_dirty(&mut self) -> (std::collections::BTreeSet<usize>, bool) {
        self.dirty.take()
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.mark_all();
    }

    /// Marks the row currently holding the cursor.
    pub fn mark_cursor_row(&mut self) {
        let (_, row) = self.cursor_pos();
        self.dirty.mark(row);
    }

    /// Marks every row the current line spans (conservative: edits may
    /// change the line's row count).
    fn mark_current_rows(&mut self) {
        let layout = self.layout();
        let rows = self.rows_of(self.current.display_cells());
        let first = layout.cur_row0;
        for row in first..first + rows as isize + 1 {
            if (0..self.height as isize).contains(&row) {
                self.dirty.mark(row as usize);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txterm_history::ScrollbackConfig;

    fn display(width: usize, height: usize) -> DisplayBuffer {
        DisplayBuffer::new(width, height, Scrollback::new(ScrollbackConfig::default()))
    }

    fn write_text(d: &mut DisplayBuffer, text: &str) {
        for ch in text.chars() {
            let offset = d.cursor_offset();
            d.set_cell(offset, Cell::new(ch));
            d.set_cursor_offset(offset + 1);
        }
    }

    fn row_text(d: &DisplayBuffer, row: usize) -> String {
        d.viewport_cells()[row]
            .iter()
            .map(Cell::display_rune)
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    // ==================== Viewport Derivation Tests ====================

    #[test]
    fn test_empty_viewport() {
        let d = display(10, 4);
        assert_eq!(d.viewport_cells().len(), 4);
        assert_eq!(row_text(&d, 0), "");
        assert_eq!(d.cursor_pos(), (0, 0));
        assert!(d.at_live_edge());
    }

    #[test]
    fn test_content_fills_from_top() {
        let mut d = display(10, 4);
        write_text(&mut d, "one");
        d.commit_current_line();
        write_text(&mut d, "two");
        assert_eq!(row_text(&d, 0), "one");
        assert_eq!(row_text(&d, 1), "two");
        assert_eq!(d.cursor_pos(), (3, 1));
        assert_eq!(d.live_edge_row(), 1);
    }

    #[test]
    fn test_bottom_anchoring_when_full() {
        let mut d = display(10, 3);
        for i in 0..5 {
            write_text(&mut d, &format!("line {}", i));
            d.commit_current_line();
        }
        // 5 committed + current = 6 rows; the last 3 are visible
        assert_eq!(row_text(&d, 0), "line 3");
        assert_eq!(row_text(&d, 1), "line 4");
        assert_eq!(row_text(&d, 2), "");
        assert_eq!(d.cursor_pos(), (0, 2));
    }

    #[test]
    fn test_long_line_wraps() {
        let mut d = display(10, 5);
        write_text(&mut d, &"A".repeat(15));
        assert_eq!(row_text(&d, 0), "AAAAAAAAAA");
        assert_eq!(row_text(&d, 1), "AAAAA");
        let cells = d.viewport_cells();
        assert!(cells[0][9].wrapped);
        assert_eq!(d.cursor_pos(), (5, 1));
    }

    #[test]
    fn test_scroll_up_reveals_history() {
        let mut d = display(10, 3);
        for i in 0..10 {
            write_text(&mut d, &format!("line {}", i));
            d.commit_current_line();
        }
        d.scroll_up(4);
        assert!(!d.at_live_edge());
        assert_eq!(row_text(&d, 0), "line 4");
        d.scroll_to_bottom();
        assert!(d.at_live_edge());
        assert_eq!(row_text(&d, 1), "line 9");
    }

    #[test]
    fn test_scroll_clamps_at_top() {
        let mut d = display(10, 3);
        for i in 0..5 {
            write_text(&mut d, &format!("line {}", i));
            d.commit_current_line();
        }
        d.scroll_up(100);
        assert_eq!(row_text(&d, 0), "line 0");
    }

    // ==================== Cursor / CR / LF Tests ====================

    #[test]
    fn test_carriage_return_to_physical_row_start() {
        let mut d = display(10, 5);
        write_text(&mut d, &"x".repeat(13));
        d.carriage_return();
        // Start of the second physical row, not offset 0
        assert_eq!(d.cursor_offset(), 10);
        assert_eq!(d.cursor_pos(), (0, 1));
    }

    #[test]
    fn test_cr_then_overwrite_touches_second_row_only() {
        let mut d = display(10, 5);
        write_text(&mut d, &"x".repeat(13));
        d.carriage_return();
        write_text(&mut d, "YY");
        assert_eq!(row_text(&d, 0), "xxxxxxxxxx");
        assert_eq!(row_text(&d, 1), "YYx");
    }

    #[test]
    fn test_line_feed_preserves_column() {
        let mut d = display(10, 5);
        write_text(&mut d, "ab");
        d.line_feed();
        assert_eq!(d.history().total_len(), 1);
        write_text(&mut d, "c");
        assert_eq!(row_text(&d, 1), "  c");
    }

    #[test]
    fn test_line_feed_inside_wrapped_line_moves_one_row() {
        let mut d = display(10, 5);
        write_text(&mut d, &"x".repeat(25));
        // Cursor on subrow 2; move to subrow 1 col 0, then LF
        d.set_cursor_offset(3);
        d.line_feed();
        assert_eq!(d.history().total_len(), 0, "no commit inside the line");
        assert_eq!(d.cursor_offset(), 13);
    }

    #[test]
    fn test_move_below_live_edge_commits_blanks() {
        let mut d = display(10, 6);
        write_text(&mut d, "top");
        d.move_to(3, 2);
        assert_eq!(d.cursor_pos(), (2, 3));
        // "top" plus two blank lines committed
        assert_eq!(d.history().total_len(), 3);
        assert_eq!(row_text(&d, 0), "top");
        write_text(&mut d, "X");
        assert_eq!(row_text(&d, 3), "  X");
    }

    #[test]
    fn test_move_up_reopens_committed_line() {
        let mut d = display(10, 6);
        for i in 0..3 {
            write_text(&mut d, &format!("line {}", i));
            d.commit_current_line();
        }
        d.move_to(1, 0);
        write_text(&mut d, "X");
        assert_eq!(row_text(&d, 1), "Xine 1");
        // Moving away flushes the edit into history
        d.move_to(3, 0);
        assert_eq!(d.history().get(1).unwrap().text(), "Xine 1");
        assert_eq!(d.history().total_len(), 3);
    }

    // ==================== Erase Tests ====================

    #[test]
    fn test_clear_line_kills_wrapped_overflow() {
        let mut d = display(10, 5);
        write_text(&mut d, &"x".repeat(23));
        d.clear_line();
        for row in 0..5 {
            assert_eq!(row_text(&d, row), "", "row {}", row);
        }
        assert_eq!(d.cursor_offset(), 0);
    }

    #[test]
    fn test_erase_all_preserves_scrollback() {
        let mut d = display(10, 3);
        for i in 0..5 {
            write_text(&mut d, &format!("line {}", i));
            d.commit_current_line();
        }
        let before = d.history().total_len();
        d.erase_all();
        assert_eq!(row_text(&d, 0), "");
        assert_eq!(row_text(&d, 1), "");
        assert!(d.history().total_len() >= before, "scrollback intact");
        // Scrolling up reveals the cleared content
        d.scroll_up(3);
        assert_eq!(row_text(&d, 0), "line 2");
    }

    #[test]
    fn test_erase_below_truncates_at_cursor() {
        let mut d = display(10, 5);
        write_text(&mut d, "abcdef");
        d.set_cursor_offset(3);
        d.erase_below();
        assert_eq!(row_text(&d, 0), "abc");
    }

    // ==================== Reflow Tests ====================

    #[test]
    fn test_resize_rewraps_content() {
        let mut d = display(10, 5);
        write_text(&mut d, &"A".repeat(15));
        d.resize(5, 5);
        assert_eq!(row_text(&d, 0), "AAAAA");
        assert_eq!(row_text(&d, 1), "AAAAA");
        assert_eq!(row_text(&d, 2), "AAAAA");
        d.resize(15, 5);
        assert_eq!(row_text(&d, 0), "AAAAAAAAAAAAAAA");
        assert_eq!(row_text(&d, 1), "");
    }

    #[test]
    fn test_height_growth_keeps_cursor_at_live_edge() {
        let mut d = display(10, 3);
        write_text(&mut d, "a");
        d.commit_current_line();
        write_text(&mut d, "b");
        d.commit_current_line();
        assert_eq!(d.cursor_pos().1, 2);
        d.resize(10, 10);
        // Content does not fill the taller viewport: cursor stays on the
        // live edge row, not the bottom row
        assert_eq!(d.cursor_pos().1, 2);
        assert_eq!(d.live_edge_row(), 2);
    }

    // ==================== Dirty Tests ====================

    #[test]
    fn test_edits_mark_dirty() {
        let mut d = display(10, 3);
        d.take_dirty();
        write_text(&mut d, "x");
        let (rows, all) = d.take_dirty();
        assert!(all || rows.contains(&0));
    }

    #[test]
    fn test_commit_marks_all_dirty_when_scrolling() {
        let mut d = display(10, 2);
        for i in 0..4 {
            write_text(&mut d, &format!("{}", i));
            d.commit_current_line();
        }
        d.take_dirty();
        write_text(&mut d, "x");
        d.commit_current_line();
        let (_, all) = d.take_dirty();
        assert!(all);
    }
}
