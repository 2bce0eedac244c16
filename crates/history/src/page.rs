// Chunk: docs/chunks/page_store - 64 KiB page store with atomic rewrites

//! In-memory pages and the on-disk page format.
//!
//! File layout (little-endian):
//!
//! ```text
//! [0..8)    magic "TXPAGE02"
//! [8..16)   u64: page_id
//! [16..24)  u64: start_global_index
//! [24..28)  u32: line_count
//! [28]      u8:  state (0 = cold/sealed, 1 = warm/reopenable)
//! [29..32)  reserved
//! then:     u32 × line_count   absolute byte offset of each encoded line
//! then:     the encoded lines (v2), concatenated
//! then:     i64 × line_count   per-line Unix-nanosecond timestamps
//! ```

use std::io;

use txterm_cells::{decode_line, encode_line, encoded_line_len, LogicalLine};

/// Page file magic.
pub const PAGE_MAGIC: &[u8; 8] = b"TXPAGE02";

/// Target encoded size of one page. Pages seal once the next line would
/// push them past this; a single oversize line still gets written.
pub const TARGET_PAGE_SIZE: usize = 64 * 1024;

/// Fixed header length, before the offset table.
const HEADER_LEN: usize = 8 + 8 + 8 + 4 + 1 + 3;

/// Whether a page is sealed on disk or still accepting lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Cold = 0,
    Warm = 1,
}

/// One committed line plus its commit timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    pub line: LogicalLine,
    pub timestamp: i64,
}

/// A page of consecutive logical lines.
///
/// The write page lives in memory in this form; sealed pages are decoded
/// back into it for reads and updates.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: u64,
    pub start_index: u64,
    pub state: PageState,
    pub entries: Vec<PageEntry>,
    /// Running encoded size of the entries (lines only, no header).
    lines_size: usize,
}

/// Result of decoding a page file. `dropped` counts trailing lines that
/// could not be decoded (torn write at the tail).
pub(crate) struct DecodedPage {
    pub page: Page,
    pub dropped: u32,
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

impl Page {
    pub fn new(id: u64, start_index: u64) -> Self {
        Page {
            id,
            start_index,
            state: PageState::Warm,
            entries: Vec::new(),
            lines_size: 0,
        }
    }

    pub fn line_count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// First global index past this page.
    pub fn end_index(&self) -> u64 {
        self.start_index + self.entries.len() as u64
    }

    /// Encoded size of the whole page file as it stands.
    pub fn encoded_size(&self) -> usize {
        HEADER_LEN + self.entries.len() * (4 + 8) + self.lines_size
    }

    /// Would appending a line of `encoded_len` bytes push the page past the
    /// target size?
    pub fn would_overflow(&self, encoded_len: usize) -> bool {
        self.encoded_size() + encoded_len + 4 + 8 > TARGET_PAGE_SIZE
    }

    /// Appends a line. The caller decides overflow policy first.
    pub fn push(&mut self, line: LogicalLine, timestamp: i64) {
        self.lines_size += encoded_line_len(&line);
        self.entries.push(PageEntry { line, timestamp });
    }

    /// Replaces the line in `slot`, keeping the size accounting right.
    pub fn replace(&mut self, slot: usize, line: LogicalLine, timestamp: i64) {
        let entry = &mut self.entries[slot];
        self.lines_size -= encoded_line_len(&entry.line);
        self.lines_size += encoded_line_len(&line);
        entry.line = line;
        entry.timestamp = timestamp;
    }

    /// Serializes the page file.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());

        buf.extend_from_slice(PAGE_MAGIC);
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.start_index.to_le_bytes());
        buf.extend_from_slice(&self.line_count().to_le_bytes());
        buf.push(self.state as u8);
        buf.extend_from_slice(&[0u8; 3]);

        // Offset table: absolute offsets, filled in as lines are encoded
        let table_at = buf.len();
        buf.resize(table_at + self.entries.len() * 4, 0);

        for (i, entry) in self.entries.iter().enumerate() {
            let offset = buf.len() as u32;
            buf[table_at + i * 4..table_at + i * 4 + 4].copy_from_slice(&offset.to_le_bytes());
            encode_line(&entry.line, &mut buf);
        }

        for entry in &self.entries {
            buf.extend_from_slice(&entry.timestamp.to_le_bytes());
        }

        buf
    }

    /// Parses just the fixed header: `(page_id, start_index, line_count,
    /// state)`. Used by `open` to build the index without decoding lines.
    pub fn decode_header(data: &[u8]) -> io::Result<(u64, u64, u32, PageState)> {
        if data.len() < HEADER_LEN {
            return Err(invalid("page file too short for header"));
        }
        if &data[0..8] != PAGE_MAGIC {
            return Err(invalid("bad page magic"));
        }

        let id = u64::from_le_bytes(data[8..16].try_into().unwrap());
        let start_index = u64::from_le_bytes(data[16..24].try_into().unwrap());
        let line_count = u32::from_le_bytes(data[24..28].try_into().unwrap());
        let state = if data[28] == PageState::Warm as u8 {
            PageState::Warm
        } else {
            PageState::Cold
        };
        Ok((id, start_index, line_count, state))
    }

    /// Decodes a full page file.
    ///
    /// With `tolerate_tail` set, lines that fail to decode at the tail of
    /// the file (torn final write) are dropped and counted instead of
    /// failing; timestamps that are missing for surviving lines decode as
    /// zero. Header corruption is always an error.
    pub(crate) fn decode(data: &[u8], tolerate_tail: bool) -> io::Result<DecodedPage> {
        let (id, start_index, line_count, state) = Self::decode_header(data)?;
        let line_count = line_count as usize;

        let table_at = HEADER_LEN;
        let table_len = line_count
            .checked_mul(4)
            .ok_or_else(|| invalid("line count overflow"))?;
        if data.len() < table_at + table_len {
            return Err(invalid("page file too short for offset table"));
        }

        let mut page = Page::new(id, start_index);
        page.state = state;
        let mut dropped = 0u32;
        let mut lines_end = table_at + table_len;

        let mut lines = Vec::with_capacity(line_count);
        for i in 0..line_count {
            let off =
                u32::from_le_bytes(data[table_at + i * 4..table_at + i * 4 + 4].try_into().unwrap())
                    as usize;
            match data.get(off..).ok_or_else(|| invalid("line offset out of range")) {
                Ok(slice) => match decode_line(slice) {
                    Ok((line, consumed)) => {
                        lines_end = off + consumed;
                        lines.push(line);
                    }
                    Err(err) if tolerate_tail => {
                        dropped = (line_count - i) as u32;
                        log::warn!(
                            "page {}: dropping {} undecodable trailing line(s): {}",
                            id,
                            dropped,
                            err
                        );
                        break;
                    }
                    Err(err) => return Err(err),
                },
                Err(err) => {
                    if tolerate_tail {
                        dropped = (line_count - i) as u32;
                        log::warn!("page {}: dropping {} trailing line(s)", id, dropped);
                        break;
                    }
                    return Err(err);
                }
            }
        }

        // Timestamps follow the last encoded line. If the tail was torn the
        // timestamp block never made it to disk in a locatable position, so
        // surviving lines get zero timestamps.
        let ts_at = lines_end;
        for (i, line) in lines.into_iter().enumerate() {
            let ts = if dropped > 0 {
                0
            } else {
                match data.get(ts_at + i * 8..ts_at + i * 8 + 8) {
                    Some(bytes) => i64::from_le_bytes(bytes.try_into().unwrap()),
                    None if tolerate_tail => 0,
                    None => return Err(invalid("page file too short for timestamps")),
                }
            };
            page.push(line, ts);
        }

        Ok(DecodedPage { page, dropped })
    }
}
