// Chunk: docs/chunks/cell_line_model - Typed cells, logical lines, wrap-to-width

//! Binary (de)serialization of cells and logical lines.
//!
//! Cell record, fixed 18 bytes little-endian:
//!
//! ```text
//! u32: rune (code point)
//! u8:  fg_mode   0=default 1=palette-16 2=palette-256 3=rgb
//! u32: fg_value  palette modes use the low byte; rgb packs (r<<16)|(g<<8)|b
//! u8:  bg_mode
//! u32: bg_value
//! u8:  attr bitmask
//! u8:  wrapped (0/1)
//! u16: reserved
//! ```
//!
//! Line record, version 2:
//!
//! ```text
//! u32: cell_count
//! u32: fixed_width
//! u32: flags       bit 0: overlay present, bit 1: synthetic
//! [cell; cell_count]
//! if overlay: u32 overlay_count · u32 overlay_width · [cell; overlay_count]
//! ```
//!
//! Version 1 is the first two fields plus the cells — no flags, no overlay.
//! Readers accept both; missing fields decode as zero.

use std::io;

use crate::cell::{Cell, CellAttrs, Color};
use crate::line::{LogicalLine, Overlay};

/// Encoded size of one cell.
pub const CELL_ENCODED_LEN: usize = 18;

const FLAG_OVERLAY: u32 = 0x01;
const FLAG_SYNTHETIC: u32 = 0x02;

const COLOR_DEFAULT: u8 = 0;
const COLOR_PALETTE: u8 = 1;
const COLOR_PALETTE256: u8 = 2;
const COLOR_RGB: u8 = 3;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn color_to_wire(color: Color) -> (u8, u32) {
    match color {
        Color::Default => (COLOR_DEFAULT, 0),
        Color::Palette(idx) => (COLOR_PALETTE, idx as u32),
        Color::Palette256(idx) => (COLOR_PALETTE256, idx as u32),
        Color::Rgb { r, g, b } => (COLOR_RGB, ((r as u32) << 16) | ((g as u32) << 8) | b as u32),
    }
}

fn color_from_wire(mode: u8, value: u32) -> io::Result<Color> {
    match mode {
        COLOR_DEFAULT => Ok(Color::Default),
        COLOR_PALETTE => Ok(Color::Palette(value as u8)),
        COLOR_PALETTE256 => Ok(Color::Palette256(value as u8)),
        COLOR_RGB => Ok(Color::Rgb {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        }),
        other => Err(invalid(format!("unknown color mode: {}", other))),
    }
}

/// Appends one encoded cell to `buf`.
pub fn encode_cell(cell: &Cell, buf: &mut Vec<u8>) {
    let (fg_mode, fg_value) = color_to_wire(cell.fg);
    let (bg_mode, bg_value) = color_to_wire(cell.bg);

    buf.extend_from_slice(&(cell.rune as u32).to_le_bytes());
    buf.push(fg_mode);
    buf.extend_from_slice(&fg_value.to_le_bytes());
    buf.push(bg_mode);
    buf.extend_from_slice(&bg_value.to_le_bytes());
    buf.push(cell.attrs.bits());
    buf.push(cell.wrapped as u8);
    buf.extend_from_slice(&[0u8; 2]);
}

/// Decodes one cell from the front of `data`.
pub fn decode_cell(data: &[u8]) -> io::Result<Cell> {
    if data.len() < CELL_ENCODED_LEN {
        return Err(invalid("data too short for cell"));
    }

    let rune_raw = u32::from_le_bytes(data[0..4].try_into().unwrap());
    let rune = char::from_u32(rune_raw)
        .ok_or_else(|| invalid(format!("invalid code point: {:#x}", rune_raw)))?;

    let fg_value = u32::from_le_bytes(data[5..9].try_into().unwrap());
    let bg_value = u32::from_le_bytes(data[10..14].try_into().unwrap());

    Ok(Cell {
        rune,
        fg: color_from_wire(data[4], fg_value)?,
        bg: color_from_wire(data[9], bg_value)?,
        attrs: CellAttrs::from_bits(data[14]),
        wrapped: data[15] != 0,
    })
}

fn encode_cells(cells: &[Cell], buf: &mut Vec<u8>) {
    for cell in cells {
        encode_cell(cell, buf);
    }
}

fn decode_cells(data: &[u8], count: usize) -> io::Result<(Vec<Cell>, usize)> {
    let need = count
        .checked_mul(CELL_ENCODED_LEN)
        .ok_or_else(|| invalid("cell count overflow"))?;
    if data.len() < need {
        return Err(invalid("data too short for cell array"));
    }
    let mut cells = Vec::with_capacity(count);
    for i in 0..count {
        cells.push(decode_cell(&data[i * CELL_ENCODED_LEN..])?);
    }
    Ok((cells, need))
}

/// Encoded size of a line in the v2 format, without encoding it.
pub fn encoded_line_len(line: &LogicalLine) -> usize {
    let mut len = 12 + line.cells.len() * CELL_ENCODED_LEN;
    if let Some(overlay) = &line.overlay {
        len += 8 + overlay.cells.len() * CELL_ENCODED_LEN;
    }
    len
}

/// Appends one v2-encoded line to `buf`.
pub fn encode_line(line: &LogicalLine, buf: &mut Vec<u8>) {
    let mut flags = 0u32;
    if line.overlay.is_some() {
        flags |= FLAG_OVERLAY;
    }
    if line.synthetic {
        flags |= FLAG_SYNTHETIC;
    }

    buf.extend_from_slice(&(line.cells.len() as u32).to_le_bytes());
    buf.extend_from_slice(&line.fixed_width.to_le_bytes());
    buf.extend_from_slice(&flags.to_le_bytes());
    encode_cells(&line.cells, buf);

    if let Some(overlay) = &line.overlay {
        buf.extend_from_slice(&(overlay.cells.len() as u32).to_le_bytes());
        buf.extend_from_slice(&overlay.width.to_le_bytes());
        encode_cells(&overlay.cells, buf);
    }
}

/// Decodes a v2 line from the front of `data`, returning the line and the
/// number of bytes consumed.
pub fn decode_line(data: &[u8]) -> io::Result<(LogicalLine, usize)> {
    if data.len() < 12 {
        return Err(invalid("data too short for line header"));
    }

    let cell_count = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    let fixed_width = u32::from_le_bytes(data[4..8].try_into().unwrap());
    let flags = u32::from_le_bytes(data[8..12].try_into().unwrap());
    let mut offset = 12;

    let (cells, consumed) = decode_cells(&data[offset..], cell_count)?;
    offset += consumed;

    let overlay = if flags & FLAG_OVERLAY != 0 {
        if data.len() < offset + 8 {
            return Err(invalid("data too short for overlay header"));
        }
        let overlay_count =
            u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
        let width = u32::from_le_bytes(data[offset + 4..offset + 8].try_into().unwrap());
        offset += 8;
        let (cells, consumed) = decode_cells(&data[offset..], overlay_count)?;
        offset += consumed;
        Some(Overlay { cells, width })
    } else {
        None
    };

    Ok((
        LogicalLine {
            cells,
            fixed_width,
            synthetic: flags & FLAG_SYNTHETIC != 0,
            overlay,
        },
        offset,
    ))
}

/// Decodes a v1 line (count + fixed width + cells; no flags, no overlay).
/// Still reachable through legacy history import.
pub fn decode_line_v1(data: &[u8]) -> io::Result<(LogicalLine, usize)> {
    if data.len() < 8 {
        return Err(invalid("data too short for v1 line header"));
    }

    let cell_count = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    let fixed_width = u32::from_le_bytes(data[4..8].try_into().unwrap());
    let (cells, consumed) = decode_cells(&data[8..], cell_count)?;

    Ok((
        LogicalLine {
            cells,
            fixed_width,
            synthetic: false,
            overlay: None,
        },
        8 + consumed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Cell Codec Tests ====================

    #[test]
    fn test_cell_round_trip_plain() {
        let cell = Cell::new('A');
        let mut buf = Vec::new();
        encode_cell(&cell, &mut buf);
        assert_eq!(buf.len(), CELL_ENCODED_LEN);
        assert_eq!(decode_cell(&buf).unwrap(), cell);
    }

    #[test]
    fn test_cell_round_trip_styled() {
        let mut cell = Cell::new('界');
        cell.fg = Color::Rgb { r: 10, g: 200, b: 77 };
        cell.bg = Color::Palette256(142);
        cell.attrs = CellAttrs::BOLD | CellAttrs::WIDE | CellAttrs::UNDERLINE;
        cell.wrapped = true;

        let mut buf = Vec::new();
        encode_cell(&cell, &mut buf);
        assert_eq!(decode_cell(&buf).unwrap(), cell);
    }

    #[test]
    fn test_cell_rgb_packing() {
        let mut cell = Cell::new('x');
        cell.fg = Color::Rgb { r: 0x12, g: 0x34, b: 0x56 };
        let mut buf = Vec::new();
        encode_cell(&cell, &mut buf);
        let value = u32::from_le_bytes(buf[5..9].try_into().unwrap());
        assert_eq!(value, 0x123456);
    }

    #[test]
    fn test_cell_rejects_truncation() {
        let mut buf = Vec::new();
        encode_cell(&Cell::new('A'), &mut buf);
        assert!(decode_cell(&buf[..CELL_ENCODED_LEN - 1]).is_err());
    }

    #[test]
    fn test_cell_rejects_bad_rune() {
        let mut buf = Vec::new();
        encode_cell(&Cell::new('A'), &mut buf);
        // Surrogate code point
        buf[0..4].copy_from_slice(&0xD800u32.to_le_bytes());
        assert!(decode_cell(&buf).is_err());
    }

    #[test]
    fn test_cell_rejects_bad_color_mode() {
        let mut buf = Vec::new();
        encode_cell(&Cell::new('A'), &mut buf);
        buf[4] = 9;
        assert!(decode_cell(&buf).is_err());
    }

    // ==================== Line Codec Tests ====================

    #[test]
    fn test_line_round_trip_empty() {
        let line = LogicalLine::new();
        let mut buf = Vec::new();
        encode_line(&line, &mut buf);
        let (decoded, consumed) = decode_line(&buf).unwrap();
        assert_eq!(decoded, line);
        assert_eq!(consumed, buf.len());
        assert_eq!(consumed, encoded_line_len(&line));
    }

    #[test]
    fn test_line_round_trip_text() {
        let mut line = LogicalLine::from_text("Hello, 世界!");
        line.fixed_width = 80;
        let mut buf = Vec::new();
        encode_line(&line, &mut buf);
        let (decoded, consumed) = decode_line(&buf).unwrap();
        assert_eq!(decoded, line);
        assert_eq!(consumed, encoded_line_len(&line));
    }

    #[test]
    fn test_line_round_trip_overlay_and_synthetic() {
        let mut line = LogicalLine::from_text("raw output");
        line.synthetic = true;
        line.overlay = Some(Overlay {
            cells: "formatted".chars().map(Cell::new).collect(),
            width: 120,
        });

        let mut buf = Vec::new();
        encode_line(&line, &mut buf);
        let (decoded, _) = decode_line(&buf).unwrap();
        assert!(decoded.synthetic);
        assert_eq!(decoded.overlay, line.overlay);
        assert_eq!(decoded.cells, line.cells);
    }

    #[test]
    fn test_line_consumed_allows_concatenation() {
        let a = LogicalLine::from_text("first");
        let b = LogicalLine::from_text("second line");
        let mut buf = Vec::new();
        encode_line(&a, &mut buf);
        encode_line(&b, &mut buf);

        let (first, used) = decode_line(&buf).unwrap();
        let (second, _) = decode_line(&buf[used..]).unwrap();
        assert_eq!(first, a);
        assert_eq!(second, b);
    }

    #[test]
    fn test_v1_line_decodes_without_flags() {
        // Build a v1 record by hand: count, fixed_width, cells
        let cells: Vec<Cell> = "v1".chars().map(Cell::new).collect();
        let mut buf = Vec::new();
        buf.extend_from_slice(&(cells.len() as u32).to_le_bytes());
        buf.extend_from_slice(&40u32.to_le_bytes());
        for cell in &cells {
            encode_cell(cell, &mut buf);
        }

        let (line, consumed) = decode_line_v1(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(line.cells, cells);
        assert_eq!(line.fixed_width, 40);
        assert!(!line.synthetic);
        assert!(line.overlay.is_none());
    }

    #[test]
    fn test_line_rejects_truncated_cells() {
        let line = LogicalLine::from_text("truncate me");
        let mut buf = Vec::new();
        encode_line(&line, &mut buf);
        assert!(decode_line(&buf[..buf.len() - 3]).is_err());
    }
}
