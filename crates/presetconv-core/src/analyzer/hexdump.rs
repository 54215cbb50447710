//! Hex dump formatting.
//!
//! Every line has the shape `AAAAAAAA  XXXX XXXX ...  |ascii|`: an 8-digit
//! address, bytes grouped in pairs, and the printable ASCII view with `.` for
//! everything else. Short final lines are padded so the ASCII column lines up.

use super::is_printable;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

/// Marker appended to lines whose chunks differ in [`HexDumper::dump_comparison`]
pub const DIFF_MARKER: &str = " DIFF";

/// Marker appended to the target line in [`HexDumper::dump_around`]
pub const TARGET_MARKER: &str = " <-- TARGET";

/// Formats binary data as hex dump lines
#[derive(Debug, Clone, Copy)]
pub struct HexDumper {
    bytes_per_line: usize,
}

impl Default for HexDumper {
    fn default() -> Self {
        Self { bytes_per_line: 16 }
    }
}

impl HexDumper {
    /// Creates a dumper with 16 bytes per line
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of bytes per line (at least 1)
    pub fn bytes_per_line(mut self, n: usize) -> Self {
        self.bytes_per_line = n.max(1);
        self
    }

    /// Dumps `data`, numbering lines from `base_offset`
    pub fn dump(&self, data: &[u8], base_offset: usize, max_bytes: Option<usize>) -> String {
        let data = limit(data, max_bytes);
        data.chunks(self.bytes_per_line)
            .enumerate()
            .map(|(i, chunk)| self.format_line(chunk, base_offset + i * self.bytes_per_line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Dumps two buffers line by line, marking chunks that differ
    pub fn dump_comparison(&self, a: &[u8], b: &[u8], max_bytes: Option<usize>) -> String {
        let a = limit(a, max_bytes);
        let b = limit(b, max_bytes);
        let blank = " ".repeat(self.line_width());

        let mut lines = vec![format!(
            "{:<width$}  === B ===",
            "=== A ===",
            width = self.line_width()
        )];

        let longest = a.len().max(b.len());
        let mut offset = 0;
        while offset < longest {
            let chunk_a = chunk_at(a, offset, self.bytes_per_line);
            let chunk_b = chunk_at(b, offset, self.bytes_per_line);
            let marker = if chunk_a != chunk_b { DIFF_MARKER } else { "" };

            for chunk in [chunk_a, chunk_b] {
                let line = if chunk.is_empty() {
                    blank.clone()
                } else {
                    self.format_line(chunk, offset)
                };
                lines.push(format!("{}{}", line, marker));
            }
            lines.push(String::new());
            offset += self.bytes_per_line;
        }

        lines.join("\n")
    }

    /// Dumps `data` with `  @ OFFS: note` lines under the line holding each offset
    pub fn dump_with_annotations(
        &self,
        data: &[u8],
        annotations: &BTreeMap<usize, String>,
        max_bytes: Option<usize>,
    ) -> String {
        let data = limit(data, max_bytes);
        let mut lines = Vec::new();

        for (i, chunk) in data.chunks(self.bytes_per_line).enumerate() {
            let start = i * self.bytes_per_line;
            lines.push(self.format_line(chunk, start));
            for (offset, note) in annotations.range(start..start + chunk.len()) {
                lines.push(format!("  @ {:04X}: {}", offset, note));
            }
        }

        lines.join("\n")
    }

    /// Dumps `context_lines` lines around `offset`, marking the line holding it
    pub fn dump_around(&self, data: &[u8], offset: usize, context_lines: usize) -> String {
        let bpl = self.bytes_per_line;
        let start = offset.saturating_sub(context_lines * bpl) / bpl * bpl;
        let end = data.len().min(offset.saturating_add((context_lines + 1) * bpl));

        let mut lines = Vec::new();
        let mut line_start = start;
        while line_start < end {
            let chunk = chunk_at(data, line_start, bpl);
            let mut line = self.format_line(chunk, line_start);
            if (line_start..line_start + bpl).contains(&offset) {
                line.push_str(TARGET_MARKER);
            }
            lines.push(line);
            line_start += bpl;
        }

        lines.join("\n")
    }

    /// Formats one line of at most `bytes_per_line` bytes
    pub fn format_line(&self, chunk: &[u8], address: usize) -> String {
        let mut hex = String::with_capacity(self.hex_width());
        for i in 0..self.bytes_per_line {
            if i > 0 && i % 2 == 0 {
                hex.push(' ');
            }
            match chunk.get(i) {
                Some(byte) => {
                    let _ = write!(hex, "{:02X}", byte);
                }
                None => hex.push_str("  "),
            }
        }

        let ascii: String = chunk
            .iter()
            .map(|&b| if is_printable(b) { char::from(b) } else { '.' })
            .collect();

        format!("{:08X}  {}  |{}|", address, hex, ascii)
    }

    fn hex_width(&self) -> usize {
        self.bytes_per_line * 2 + self.bytes_per_line.saturating_sub(1) / 2
    }

    fn line_width(&self) -> usize {
        8 + 2 + self.hex_width() + 2 + self.bytes_per_line + 2
    }
}

/// Returns every offset where `needle` starts, overlapping matches included
pub fn find_pattern(data: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > data.len() {
        return Vec::new();
    }
    data.windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(i, _)| i)
        .collect()
}

fn limit(data: &[u8], max_bytes: Option<usize>) -> &[u8] {
    match max_bytes {
        Some(max) => &data[..data.len().min(max)],
        None => data,
    }
}

fn chunk_at(data: &[u8], offset: usize, len: usize) -> &[u8] {
    if offset >= data.len() {
        return &[];
    }
    &data[offset..data.len().min(offset + len)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_line() {
        let data: Vec<u8> = (0x41..0x51).collect();
        let dump = HexDumper::new().dump(&data, 0, None);
        assert_eq!(
            dump,
            "00000000  4142 4344 4546 4748 494A 4B4C 4D4E 4F50  |ABCDEFGHIJKLMNOP|"
        );
    }

    #[test]
    fn test_short_line_is_padded() {
        let dump = HexDumper::new().dump(b"GP5\x00\xff", 0x20, None);
        assert_eq!(
            dump,
            "00000020  4750 3500 FF                             |GP5..|"
        );
        let full = HexDumper::new().dump(&[0u8; 16], 0, None);
        assert_eq!(dump.find('|'), full.find('|'));
    }

    #[test]
    fn test_max_bytes_and_line_count() {
        let data = [0xAAu8; 100];
        let dump = HexDumper::new().dump(&data, 0, Some(40));
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("00000020"));
        assert_eq!(HexDumper::new().dump(&[], 0, None), "");
    }

    #[test]
    fn test_comparison_marks_differences() {
        let a = [1u8; 32];
        let mut b = [1u8; 32];
        b[20] = 2;
        let dump = HexDumper::new().dump_comparison(&a, &b, None);
        let lines: Vec<_> = dump.lines().collect();
        assert!(lines[0].contains("=== A ===") && lines[0].contains("=== B ==="));
        assert!(!lines[1].ends_with(DIFF_MARKER));
        assert!(lines[4].ends_with(DIFF_MARKER));
        assert!(lines[5].ends_with(DIFF_MARKER));
    }

    #[test]
    fn test_comparison_uneven_lengths() {
        let dump = HexDumper::new().dump_comparison(&[0u8; 20], &[0u8; 4], None);
        let lines: Vec<_> = dump.lines().collect();
        // second block: A has 4 bytes, B has none
        assert!(lines[4].starts_with("00000010"));
        assert!(lines[5].trim() == DIFF_MARKER.trim());
    }

    #[test]
    fn test_annotations() {
        let mut notes = BTreeMap::new();
        notes.insert(0, "signature".to_string());
        notes.insert(0x14, "name".to_string());
        notes.insert(0x200, "past the end".to_string());

        let dump = HexDumper::new().dump_with_annotations(&[0u8; 32], &notes, None);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "  @ 0000: signature");
        assert_eq!(lines[3], "  @ 0014: name");
    }

    #[test]
    fn test_dump_around_marks_target() {
        let data = [0u8; 256];
        let dump = HexDumper::new().dump_around(&data, 100, 2);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("00000040"));
        assert!(lines[2].starts_with("00000060"));
        assert!(lines[2].ends_with(TARGET_MARKER));
        assert_eq!(lines.iter().filter(|l| l.ends_with(TARGET_MARKER)).count(), 1);
    }

    #[test]
    fn test_dump_around_clamps_to_buffer() {
        let dump = HexDumper::new().dump_around(&[7u8; 20], 2, 3);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(TARGET_MARKER));
    }

    #[test]
    fn test_find_pattern() {
        assert_eq!(find_pattern(b"aaaa", b"aa"), vec![0, 1, 2]);
        assert_eq!(find_pattern(b"xGP50yGP50", b"GP50"), vec![1, 6]);
        assert!(find_pattern(b"abc", b"").is_empty());
        assert!(find_pattern(b"ab", b"abc").is_empty());
    }
}
