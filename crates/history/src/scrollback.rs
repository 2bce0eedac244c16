// Chunk: docs/chunks/scrollback_window - Bounded in-memory scrollback window

//! The bounded in-memory scrollback window over the page store.

use std::collections::VecDeque;
use std::io;

use txterm_cells::LogicalLine;

use crate::now_nanos;
use crate::store::PageStore;

/// Sizing of the in-memory window.
#[derive(Debug, Clone, Copy)]
pub struct ScrollbackConfig {
    /// Most recent lines kept in memory.
    pub max_memory_lines: usize,
    /// Extra lines the display buffer materializes above the viewport.
    pub margin_above: usize,
    /// Extra lines materialized below when scrolled up.
    pub margin_below: usize,
}

impl Default for ScrollbackConfig {
    fn default() -> Self {
        ScrollbackConfig {
            max_memory_lines: 2000,
            margin_above: 100,
            margin_below: 50,
        }
    }
}

impl ScrollbackConfig {
    pub fn new() -> Self {
        ScrollbackConfig::default()
    }

    pub fn with_max_memory_lines(mut self, lines: usize) -> Self {
        self.max_memory_lines = lines.max(1);
        self
    }

    pub fn with_margins(mut self, above: usize, below: usize) -> Self {
        self.margin_above = above;
        self.margin_below = below;
        self
    }
}

/// Committed scrollback: a ring of the most recent lines, backed by the
/// page store for everything older.
///
/// Global line indices are monotone for the life of a session; `clear`
/// raises a floor instead of renumbering.
pub struct Scrollback {
    config: ScrollbackConfig,
    ring: VecDeque<(LogicalLine, i64)>,
    /// Global index of `ring[0]`.
    base_index: u64,
    /// Next global index (== total lines ever committed).
    total: u64,
    /// Indices below this are cleared and no longer readable.
    floor: u64,
    store: Option<PageStore>,
    disk_error: Option<io::Error>,
    degraded: bool,
}

impl Scrollback {
    /// Memory-only scrollback (no persistence).
    pub fn new(config: ScrollbackConfig) -> Self {
        Scrollback {
            config,
            ring: VecDeque::new(),
            base_index: 0,
            total: 0,
            floor: 0,
            store: None,
            disk_error: None,
            degraded: false,
        }
    }

    /// Scrollback over an open page store; the global index continues from
    /// the store's.
    pub fn with_store(config: ScrollbackConfig, store: PageStore) -> Self {
        let total = store.next_global_index();
        Scrollback {
            config,
            ring: VecDeque::new(),
            base_index: total,
            total,
            floor: 0,
            store: Some(store),
            disk_error: None,
            degraded: false,
        }
    }

    pub fn config(&self) -> &ScrollbackConfig {
        &self.config
    }

    /// Lines currently held in memory.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total == self.floor
    }

    /// Total committed lines, on disk included.
    pub fn total_len(&self) -> u64 {
        self.total
    }

    /// Oldest readable global index.
    pub fn floor(&self) -> u64 {
        self.floor
    }

    /// Commits a line, stamping it with the current time. The line always
    /// lands in the ring; a store failure degrades the session to
    /// memory-only without losing it.
    pub fn append(&mut self, line: LogicalLine) -> u64 {
        let timestamp = now_nanos();
        let index = self.total;

        self.ring.push_back((line.clone(), timestamp));
        while self.ring.len() > self.config.max_memory_lines {
            self.ring.pop_front();
            self.base_index += 1;
        }

        if let Some(store) = &mut self.store {
            if !self.degraded {
                if let Err(err) = store.append(line, timestamp) {
                    log::error!("scrollback append failed, going memory-only: {}", err);
                    self.degraded = true;
                    self.disk_error = Some(err);
                }
            }
        }

        self.total += 1;
        index
    }

    /// Rewrites a committed line in place (cursor re-entered its row).
    pub fn update(&mut self, index: u64, line: LogicalLine) {
        if index < self.floor || index >= self.total {
            return;
        }
        let timestamp = now_nanos();

        if index >= self.base_index {
            let slot = (index - self.base_index) as usize;
            self.ring[slot] = (line.clone(), timestamp);
        }

        if let Some(store) = &mut self.store {
            if !self.degraded && index < store.next_global_index() {
                if let Err(err) = store.update(index, line, timestamp) {
                    log::error!("scrollback update failed, going memory-only: {}", err);
                    self.degraded = true;
                    self.disk_error = Some(err);
                }
            }
        }
    }

    /// Reads a committed line by global index. Absent for cleared,
    /// out-of-range, or unreadable lines — never an error.
    pub fn get(&self, index: u64) -> Option<LogicalLine> {
        self.entry(index).map(|(line, _)| line)
    }

    /// Reads a line by window-relative index: 0 is the oldest line still
    /// held in memory.
    pub fn window_line(&self, index: usize) -> Option<LogicalLine> {
        self.ring.get(index).map(|(line, _)| line.clone())
    }

    /// Reads a line with its commit timestamp.
    pub fn entry(&self, index: u64) -> Option<(LogicalLine, i64)> {
        if index < self.floor || index >= self.total {
            return None;
        }
        if index >= self.base_index {
            return self.ring.get((index - self.base_index) as usize).cloned();
        }

        let store = self.store.as_ref()?;
        match store.read(index) {
            Ok(entry) => entry,
            Err(err) => {
                log::error!("scrollback read of line {} failed: {}", index, err);
                None
            }
        }
    }

    pub fn timestamp(&self, index: u64) -> Option<i64> {
        if index >= self.base_index && index < self.total {
            return self
                .ring
                .get((index - self.base_index) as usize)
                .map(|(_, ts)| *ts);
        }
        self.entry(index).map(|(_, ts)| ts)
    }

    /// Index of the last line committed at or before `t` (Unix nanos).
    /// Binary search over the per-line timestamps.
    pub fn find_line_at(&self, t: i64) -> Option<u64> {
        let mut lo = self.floor;
        let mut hi = self.total;
        if lo >= hi {
            return None;
        }

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.timestamp(mid) {
                Some(ts) if ts <= t => lo = mid + 1,
                Some(_) => hi = mid,
                None => return None,
            }
        }

        if lo > self.floor {
            Some(lo - 1)
        } else {
            None
        }
    }

    /// Drops all committed content. Indices stay monotone: the floor rises
    /// to the current end instead of renumbering.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.base_index = self.total;
        self.floor = self.total;
    }

    /// True once a disk failure has switched the session to memory-only.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// The parked error from the first disk failure, if any. Taking it
    /// clears the report but not the degraded state.
    pub fn take_disk_error(&mut self) -> Option<io::Error> {
        self.disk_error.take()
    }

    /// Flushes the underlying store, if any.
    pub fn flush(&mut self) -> io::Result<()> {
        match &mut self.store {
            Some(store) if !self.degraded => store.flush(),
            _ => Ok(()),
        }
    }

    /// Flushes and drops the store.
    pub fn close(mut self) -> io::Result<()> {
        match self.store.take() {
            Some(store) if !self.degraded => store.close(),
            _ => Ok(()),
        }
    }
}
