// Chunk: docs/chunks/page_store - 64 KiB page store with atomic rewrites

//! Read-only import of the legacy single-file history format.
//!
//! The legacy format is the magic `"TXHIST01"` followed by concatenated
//! v1-encoded lines until end of file. No offsets, no timestamps. It is
//! accepted for import only; txterm always writes the page format.

use std::fs;
use std::io;
use std::path::Path;

use txterm_cells::{decode_line_v1, LogicalLine};

/// Legacy single-file history magic.
pub const LEGACY_MAGIC: &[u8; 8] = b"TXHIST01";

/// Imports a legacy history file as a sequence of logical lines.
///
/// A truncated tail is dropped with a warning; everything before it is
/// returned. A missing or wrong magic is an error.
pub fn import_legacy(path: &Path) -> io::Result<Vec<LogicalLine>> {
    let bytes = fs::read(path)?;

    if bytes.len() < LEGACY_MAGIC.len() || &bytes[..LEGACY_MAGIC.len()] != LEGACY_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "not a legacy history file",
        ));
    }

    let mut lines = Vec::new();
    let mut offset = LEGACY_MAGIC.len();

    while offset < bytes.len() {
        match decode_line_v1(&bytes[offset..]) {
            Ok((line, consumed)) => {
                lines.push(line);
                offset += consumed;
            }
            Err(err) => {
                log::warn!(
                    "legacy import: dropping truncated tail at byte {}: {}",
                    offset,
                    err
                );
                break;
            }
        }
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use txterm_cells::encode_cell;

    fn encode_v1_line(text: &str, buf: &mut Vec<u8>) {
        let line = LogicalLine::from_text(text);
        buf.extend_from_slice(&(line.cells.len() as u32).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        for cell in &line.cells {
            encode_cell(cell, buf);
        }
    }

    #[test]
    fn test_import_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txhist");

        let mut bytes = LEGACY_MAGIC.to_vec();
        encode_v1_line("old line one", &mut bytes);
        encode_v1_line("old line two", &mut bytes);
        fs::write(&path, &bytes).unwrap();

        let lines = import_legacy(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "old line one");
        assert_eq!(lines[1].text(), "old line two");
    }

    #[test]
    fn test_import_rejects_wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.txhist");
        fs::write(&path, b"NOTMAGIC").unwrap();
        assert!(import_legacy(&path).is_err());
    }

    #[test]
    fn test_import_drops_truncated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.txhist");

        let mut bytes = LEGACY_MAGIC.to_vec();
        encode_v1_line("intact", &mut bytes);
        encode_v1_line("torn away", &mut bytes);
        fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

        let lines = import_legacy(&path).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "intact");
    }

    #[test]
    fn test_import_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txhist");
        fs::write(&path, LEGACY_MAGIC).unwrap();
        assert!(import_legacy(&path).unwrap().is_empty());
    }
}
