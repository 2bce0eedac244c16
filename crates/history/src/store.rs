// Chunk: docs/chunks/page_store - 64 KiB page store with atomic rewrites

//! The on-disk page store.
//!
//! Pages live under `<base>/terminals/<terminal_id>/pages/NNNNNNNN.page`.
//! One process owns the directory. The write page stays in memory and is
//! sealed to disk — temp file, then rename — when the next line would push
//! it past the target size, or on an explicit flush. After every successful
//! flush the directory contains only complete `.page` files.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use txterm_cells::{encoded_line_len, LogicalLine};

use crate::meta::SessionMeta;
use crate::page::{Page, PageState, TARGET_PAGE_SIZE};

/// Where a store lives and how hard it syncs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base: PathBuf,
    pub terminal_id: String,
    /// fsync files and the directory after writes.
    pub sync_writes: bool,
}

impl StoreConfig {
    pub fn new(base: impl Into<PathBuf>, terminal_id: impl Into<String>) -> Self {
        StoreConfig {
            base: base.into(),
            terminal_id: terminal_id.into(),
            sync_writes: false,
        }
    }

    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }
}

/// Index entry for one sealed page.
#[derive(Debug, Clone, Copy)]
struct SealedPage {
    id: u64,
    start: u64,
    count: u32,
}

/// Durable, append-mostly store of committed logical lines.
pub struct PageStore {
    dir: PathBuf,
    sync_writes: bool,
    /// Sealed pages in global-index order.
    sealed: Vec<SealedPage>,
    /// The in-memory write page.
    current: Page,
    next_page_id: u64,
    next_global_index: u64,
    meta: SessionMeta,
    meta_path: PathBuf,
}

fn page_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{:08}.page", id))
}

impl PageStore {
    /// Creates a fresh store, clearing any stale `.page` files.
    pub fn create(config: StoreConfig) -> io::Result<Self> {
        let terminal_dir = config.base.join("terminals").join(&config.terminal_id);
        let dir = terminal_dir.join("pages");
        fs::create_dir_all(&dir)?;

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "page") {
                fs::remove_file(&path)?;
            }
        }

        let meta = SessionMeta::new(&config.terminal_id);
        let meta_path = terminal_dir.join("meta.json");
        meta.save(&meta_path)?;

        Ok(PageStore {
            dir,
            sync_writes: config.sync_writes,
            sealed: Vec::new(),
            current: Page::new(1, 0),
            next_page_id: 2,
            next_global_index: 0,
            meta,
            meta_path,
        })
    }

    /// Opens an existing store, rebuilding the index from page headers.
    ///
    /// A final page smaller than the target size is reopened as the write
    /// page. A torn tail on the final page is discarded and the global
    /// index rewound past the decodable prefix.
    pub fn open(config: StoreConfig) -> io::Result<Self> {
        let terminal_dir = config.base.join("terminals").join(&config.terminal_id);
        let dir = terminal_dir.join("pages");

        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "page"))
            .collect();
        paths.sort();

        let meta_path = terminal_dir.join("meta.json");
        let meta = SessionMeta::load(&meta_path)
            .unwrap_or_else(|_| SessionMeta::new(&config.terminal_id));

        let mut store = PageStore {
            dir,
            sync_writes: config.sync_writes,
            sealed: Vec::new(),
            current: Page::new(1, 0),
            next_page_id: 2,
            next_global_index: 0,
            meta,
            meta_path,
        };

        if paths.is_empty() {
            return Ok(store);
        }

        // Index every page but the last from its header alone
        for path in &paths[..paths.len() - 1] {
            let bytes = fs::read(path)?;
            let (id, start, count, _state) = Page::decode_header(&bytes)?;
            if start != store.next_global_index {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "page {} starts at {} but expected {}",
                        id, start, store.next_global_index
                    ),
                ));
            }
            store.sealed.push(SealedPage { id, start, count });
            store.next_global_index = start + count as u64;
            store.next_page_id = id + 1;
        }

        // The last page may be reopenable and may have a torn tail
        let last_path = &paths[paths.len() - 1];
        let bytes = fs::read(last_path)?;
        let decoded = Page::decode(&bytes, true)?;
        let mut last = decoded.page;
        if last.start_index != store.next_global_index {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "page {} starts at {} but expected {}",
                    last.id, last.start_index, store.next_global_index
                ),
            ));
        }
        if decoded.dropped > 0 {
            log::warn!(
                "page {}: rewound global index by {} torn line(s)",
                last.id,
                decoded.dropped
            );
        }

        store.next_global_index = last.end_index();
        store.next_page_id = last.id + 1;

        if decoded.dropped == 0 && bytes.len() >= TARGET_PAGE_SIZE {
            // Full page: seal it in the index, start fresh
            store.sealed.push(SealedPage {
                id: last.id,
                start: last.start_index,
                count: last.line_count(),
            });
            store.current = Page::new(store.next_page_id, store.next_global_index);
            store.next_page_id += 1;
        } else {
            // Short (or rewound) page: reopen as the write page
            last.state = PageState::Warm;
            store.current = last;
        }

        Ok(store)
    }

    /// Next global line index (== total lines ever appended).
    pub fn next_global_index(&self) -> u64 {
        self.next_global_index
    }

    pub fn session_meta(&self) -> &SessionMeta {
        &self.meta
    }

    /// Appends a committed line, returning its global index.
    pub fn append(&mut self, line: LogicalLine, timestamp: i64) -> io::Result<u64> {
        let encoded = encoded_line_len(&line);
        if self.current.line_count() > 0 && self.current.would_overflow(encoded) {
            self.seal_current()?;
        }
        // An oversize line lands alone on its (oversize) page
        self.current.push(line, timestamp);
        let index = self.next_global_index;
        self.next_global_index += 1;
        Ok(index)
    }

    /// Rewrites the line at `index` in place.
    pub fn update(&mut self, index: u64, line: LogicalLine, timestamp: i64) -> io::Result<()> {
        if index >= self.next_global_index {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("update past end of store: {}", index),
            ));
        }

        if index >= self.current.start_index {
            let slot = (index - self.current.start_index) as usize;
            self.current.replace(slot, line, timestamp);
            return Ok(());
        }

        // Sealed page: load, patch, atomic rewrite
        let sealed = self.sealed[self.locate_sealed(index)];
        let path = page_path(&self.dir, sealed.id);
        let bytes = fs::read(&path)?;
        let mut page = Page::decode(&bytes, false)?.page;
        page.replace((index - sealed.start) as usize, line, timestamp);
        self.write_page_file(&page)
    }

    /// Reads one line. Out-of-range indices are absent, not errors.
    pub fn read(&self, index: u64) -> io::Result<Option<(LogicalLine, i64)>> {
        if index >= self.next_global_index {
            return Ok(None);
        }
        if index >= self.current.start_index {
            let entry = &self.current.entries[(index - self.current.start_index) as usize];
            return Ok(Some((entry.line.clone(), entry.timestamp)));
        }

        let sealed = self.sealed[self.locate_sealed(index)];
        let bytes = fs::read(page_path(&self.dir, sealed.id))?;
        let page = Page::decode(&bytes, false)?.page;
        let entry = &page.entries[(index - sealed.start) as usize];
        Ok(Some((entry.line.clone(), entry.timestamp)))
    }

    /// Reads `[lo, hi)`, loading each touched page once. Out-of-range slots
    /// come back as `None`.
    pub fn read_range(&self, lo: u64, hi: u64) -> io::Result<Vec<Option<(LogicalLine, i64)>>> {
        let mut out: Vec<Option<(LogicalLine, i64)>> = Vec::new();
        let mut index = lo;

        while index < hi {
            if index >= self.next_global_index {
                out.push(None);
                index += 1;
                continue;
            }
            if index >= self.current.start_index {
                let entry = &self.current.entries[(index - self.current.start_index) as usize];
                out.push(Some((entry.line.clone(), entry.timestamp)));
                index += 1;
                continue;
            }

            let sealed = self.sealed[self.locate_sealed(index)];
            let bytes = fs::read(page_path(&self.dir, sealed.id))?;
            let page = Page::decode(&bytes, false)?.page;
            let page_end = (sealed.start + sealed.count as u64).min(hi);
            while index < page_end {
                let entry = &page.entries[(index - sealed.start) as usize];
                out.push(Some((entry.line.clone(), entry.timestamp)));
                index += 1;
            }
        }

        Ok(out)
    }

    /// Writes the current page as if full and opens a fresh one at the
    /// current global index.
    pub fn flush(&mut self) -> io::Result<()> {
        self.seal_current()?;
        self.meta.touch();
        self.meta.save(&self.meta_path)?;
        Ok(())
    }

    /// Flushes and consumes the store.
    pub fn close(mut self) -> io::Result<()> {
        self.flush()
    }

    fn locate_sealed(&self, index: u64) -> usize {
        // partition_point: first page whose start is past the index, minus 1
        self.sealed.partition_point(|p| p.start <= index) - 1
    }

    fn seal_current(&mut self) -> io::Result<()> {
        self.current.state = PageState::Cold;
        self.write_page_file(&self.current)?;
        self.sealed.push(SealedPage {
            id: self.current.id,
            start: self.current.start_index,
            count: self.current.line_count(),
        });
        self.current = Page::new(self.next_page_id, self.next_global_index);
        self.next_page_id += 1;
        Ok(())
    }

    /// Atomic page write: temp file in the same directory, then rename.
    /// The temp file is removed on any failure.
    fn write_page_file(&self, page: &Page) -> io::Result<()> {
        let path = page_path(&self.dir, page.id);
        let tmp = path.with_extension("page.tmp");

        let result = (|| -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&page.encode())?;
            if self.sync_writes {
                file.sync_all()?;
            }
            drop(file);
            fs::rename(&tmp, &path)?;
            if self.sync_writes {
                File::open(&self.dir)?.sync_all()?;
            }
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}
