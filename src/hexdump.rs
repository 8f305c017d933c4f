//! Hex dump formatting for `-x`/`--hexdump`.
//!
//! Renders 16-byte rows as `OFFSET  HEX...HEX  |ascii|`, matching the
//! classic netcat/tcpdump-style layout: offset as an 8-digit hex counter,
//! bytes split into two groups of 8 separated by an extra space, and a
//! printable-ASCII (`0x20..=0x7e`) rendering of the same row with
//! everything else shown as `.`.

use std::io::{self, Write};

/// Writes a hex dump of `data` to `out`, with running offsets starting at
/// `base_offset` (so a caller relaying multiple chunks can keep one
/// continuous dump across calls).
pub fn write_hexdump<W: Write>(out: &mut W, data: &[u8], base_offset: usize) -> io::Result<()> {
    for (row_idx, chunk) in data.chunks(16).enumerate() {
        let offset = base_offset + row_idx * 16;
        write!(out, "{:08x}  ", offset)?;

        for i in 0..16 {
            if i == 8 {
                write!(out, " ")?;
            }
            match chunk.get(i) {
                Some(b) => write!(out, "{:02x} ", b)?,
                None => write!(out, "   ")?,
            }
        }

        write!(out, " |")?;
        for &b in chunk {
            let c = if (0x20..=0x7e).contains(&b) { b as char } else { '.' };
            write!(out, "{}", c)?;
        }
        writeln!(out, "|")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_short_row() {
        let mut out = Vec::new();
        write_hexdump(&mut out, b"hi", 0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("00000000  "));
        assert!(text.contains("68 69"));
        assert!(text.contains("|hi|"));
    }

    #[test]
    fn test_full_row_has_two_groups() {
        let mut out = Vec::new();
        let data: Vec<u8> = (0u8..16).collect();
        write_hexdump(&mut out, &data, 0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("00 01 02 03 04 05 06 07  08 09 0a 0b 0c 0d 0e 0f"));
    }

    #[test]
    fn test_non_printable_shown_as_dot() {
        let mut out = Vec::new();
        write_hexdump(&mut out, &[0x00, 0x1f, 0x7f], 0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("|...|"));
    }

    #[test]
    fn test_offset_continues_across_rows() {
        let mut out = Vec::new();
        let data = vec![0u8; 20];
        write_hexdump(&mut out, &data, 16).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("00000010"));
        assert!(text.contains("00000020"));
    }
}
