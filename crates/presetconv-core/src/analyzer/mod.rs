//! Structural analysis of unknown preset binaries.
//!
//! This module inspects raw buffers without knowing their format, to help
//! infer headers, field boundaries and repeating records.
//!
//! ## Heuristics
//!
//! 1. Signature: the first 16 bytes, independent of any known format
//! 2. Byte distribution over non-zero bytes, null bytes counted separately
//! 3. Printable ASCII runs (candidate names and labels)
//! 4. Repeating fixed-size byte patterns (candidate record markers)
//! 5. Runs of zero bytes (candidate padding between sections)
//! 6. Header size: the first common size after which the null density changes
//!
//! Analysis is a pure function of the buffer; reading files is the caller's
//! job.

pub mod hexdump;

use indexmap::IndexMap;
use std::fmt::Write as FmtWrite;
use tracing::debug;

pub use hexdump::HexDumper;

/// Configuration for the analyzer
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Leading bytes rendered as the signature
    pub signature_len: usize,
    /// Minimum printable run reported as a string
    pub min_string_len: usize,
    /// Maximum number of strings reported
    pub max_strings: usize,
    /// Window size for repeating patterns
    pub pattern_size: usize,
    /// Maximum number of patterns reported
    pub max_patterns: usize,
    /// Minimum zero run reported as a section boundary
    pub min_null_run: usize,
    /// Maximum number of null runs reported
    pub max_null_runs: usize,
    /// Header sizes tried, in order
    pub header_candidates: Vec<usize>,
    /// Size of the body window compared against each header candidate
    pub header_window: usize,
    /// Null percentage difference (in points) that marks a header boundary
    pub header_threshold: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            signature_len: 16,
            min_string_len: 4,
            max_strings: 20,
            pattern_size: 4,
            max_patterns: 10,
            min_null_run: 4,
            max_null_runs: 10,
            header_candidates: vec![64, 128, 256, 512],
            header_window: 64,
            header_threshold: 20.0,
        }
    }
}

impl AnalyzerConfig {
    /// Creates a new analyzer config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum string length
    pub fn min_string_len(mut self, len: usize) -> Self {
        self.min_string_len = len;
        self
    }

    /// Sets the pattern window size
    pub fn pattern_size(mut self, size: usize) -> Self {
        self.pattern_size = size;
        self
    }

    /// Sets the header size candidates
    pub fn header_candidates(mut self, candidates: Vec<usize>) -> Self {
        self.header_candidates = candidates;
        self
    }
}

/// Byte value statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ByteDistribution {
    /// Smallest non-zero byte (0 if none)
    pub min: u8,
    /// Largest non-zero byte (0 if none)
    pub max: u8,
    /// Mean of non-zero bytes (0 if none)
    pub mean: f64,
    /// Number of zero bytes in the whole buffer
    pub null_bytes: usize,
    /// Percentage of zero bytes in the whole buffer
    pub null_percentage: f64,
}

/// A byte pattern and how often it occurs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// The pattern bytes
    pub bytes: Vec<u8>,
    /// Number of (possibly overlapping) occurrences
    pub count: usize,
}

impl Pattern {
    /// Pattern bytes as spaced uppercase hex
    pub fn hex(&self) -> String {
        to_hex(&self.bytes)
    }
}

/// Result of [`Analyzer::analyze`]
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    /// Buffer length in bytes
    pub size: usize,
    /// Leading bytes as spaced uppercase hex
    pub signature: String,
    /// Byte value statistics
    pub distribution: ByteDistribution,
    /// Printable strings in order of appearance
    pub strings: Vec<String>,
    /// Most frequent repeating patterns
    pub patterns: Vec<Pattern>,
    /// Zero runs as `(start, end)`, end exclusive
    pub null_runs: Vec<(usize, usize)>,
    /// Guessed header size, 0 if unknown
    pub header_size_guess: usize,
}

/// One differing byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteDifference {
    /// Offset of the byte
    pub offset: usize,
    /// Byte in the first buffer
    pub a: u8,
    /// Byte in the second buffer
    pub b: u8,
}

/// Result of [`Analyzer::compare`]
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Length of the first buffer
    pub size_a: usize,
    /// Length of the second buffer
    pub size_b: usize,
    /// `size_a - size_b`
    pub size_difference: i64,
    /// Number of differing bytes within the shorter length
    pub byte_differences: usize,
    /// The first differing bytes
    pub first_differences: Vec<ByteDifference>,
    /// `(1 - differences / max(len)) * 100`, 0 when both are empty
    pub similarity_percentage: f64,
}

/// Maximum number of differences kept by [`Analyzer::compare`]
pub const MAX_REPORTED_DIFFERENCES: usize = 50;

/// Format-agnostic binary analyzer
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    /// Creates an analyzer with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an analyzer with custom configuration
    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Runs every heuristic over `data`
    pub fn analyze(&self, data: &[u8]) -> AnalysisReport {
        debug!("analyzing {} bytes", data.len());

        let report = AnalysisReport {
            size: data.len(),
            signature: to_hex(&data[..data.len().min(self.config.signature_len)]),
            distribution: byte_distribution(data),
            strings: self.extract_strings(data),
            patterns: self.find_repeating_patterns(data),
            null_runs: self.find_null_runs(data),
            header_size_guess: self.guess_header_size(data),
        };

        debug!(
            "analysis: {} strings, {} patterns, {} null runs, header guess {}",
            report.strings.len(),
            report.patterns.len(),
            report.null_runs.len(),
            report.header_size_guess
        );
        report
    }

    /// Extracts runs of printable ASCII
    pub fn extract_strings(&self, data: &[u8]) -> Vec<String> {
        let min = self.config.min_string_len;
        let mut strings = Vec::new();
        let mut start = None;

        for (i, &byte) in data.iter().enumerate() {
            if is_printable(byte) {
                start.get_or_insert(i);
            } else if let Some(s) = start.take() {
                if i - s >= min {
                    strings.push(ascii(&data[s..i]));
                }
            }
        }
        if let Some(s) = start {
            if data.len() - s >= min {
                strings.push(ascii(&data[s..]));
            }
        }

        strings.truncate(self.config.max_strings);
        strings
    }

    /// Counts every fixed-size window and returns the most frequent
    pub fn find_repeating_patterns(&self, data: &[u8]) -> Vec<Pattern> {
        let size = self.config.pattern_size;
        if size == 0 || data.len() < size {
            return Vec::new();
        }

        // Insertion order doubles as first-seen order for tie breaking
        let mut counts: IndexMap<&[u8], usize> = IndexMap::new();
        for window in data.windows(size) {
            *counts.entry(window).or_insert(0) += 1;
        }

        let mut patterns: Vec<Pattern> = counts
            .into_iter()
            .filter(|(bytes, count)| {
                *count > 2 && !bytes.iter().all(|&b| b == 0) && !bytes.iter().all(|&b| b == 0xFF)
            })
            .map(|(bytes, count)| Pattern {
                bytes: bytes.to_vec(),
                count,
            })
            .collect();

        // Stable sort keeps first-seen order among equal counts
        patterns.sort_by(|a, b| b.count.cmp(&a.count));
        patterns.truncate(self.config.max_patterns);
        patterns
    }

    /// Finds runs of zero bytes at least `min_null_run` long.
    ///
    /// A run only counts once a non-zero byte closes it; trailing zero
    /// padding at the end of the buffer is not reported.
    pub fn find_null_runs(&self, data: &[u8]) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut start = None;

        for (i, &byte) in data.iter().enumerate() {
            if byte == 0 {
                start.get_or_insert(i);
            } else if let Some(s) = start.take() {
                if i - s >= self.config.min_null_run {
                    runs.push((s, i));
                    if runs.len() == self.config.max_null_runs {
                        break;
                    }
                }
            }
        }

        runs
    }

    /// Guesses the header size from a change in null density
    pub fn guess_header_size(&self, data: &[u8]) -> usize {
        let window = self.config.header_window;
        for &candidate in &self.config.header_candidates {
            if data.len() <= candidate + window {
                continue;
            }

            let header = null_percentage(&data[..candidate]);
            let body = null_percentage(&data[candidate..candidate + window]);
            if (header - body).abs() > self.config.header_threshold {
                return candidate;
            }
        }
        0
    }

    /// Byte-level comparison of two buffers
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Comparison {
        let mut byte_differences = 0;
        let mut first_differences = Vec::new();

        for (offset, (&x, &y)) in a.iter().zip(b.iter()).enumerate() {
            if x != y {
                byte_differences += 1;
                if first_differences.len() < MAX_REPORTED_DIFFERENCES {
                    first_differences.push(ByteDifference { offset, a: x, b: y });
                }
            }
        }

        let longest = a.len().max(b.len());
        let similarity_percentage = if longest == 0 {
            0.0
        } else {
            (1.0 - byte_differences as f64 / longest as f64) * 100.0
        };

        Comparison {
            size_a: a.len(),
            size_b: b.len(),
            size_difference: a.len() as i64 - b.len() as i64,
            byte_differences,
            first_differences,
            similarity_percentage,
        }
    }
}

/// Computes byte statistics for `data`
pub fn byte_distribution(data: &[u8]) -> ByteDistribution {
    if data.is_empty() {
        return ByteDistribution::default();
    }

    let mut min = u8::MAX;
    let mut max = 0u8;
    let mut sum = 0u64;
    let mut non_zero = 0usize;

    for &byte in data.iter().filter(|&&b| b != 0) {
        min = min.min(byte);
        max = max.max(byte);
        sum += byte as u64;
        non_zero += 1;
    }

    let null_bytes = data.len() - non_zero;
    if non_zero == 0 {
        min = 0;
    }

    ByteDistribution {
        min,
        max,
        mean: if non_zero == 0 { 0.0 } else { sum as f64 / non_zero as f64 },
        null_bytes,
        null_percentage: null_bytes as f64 / data.len() as f64 * 100.0,
    }
}

/// Formats bytes as spaced uppercase hex
pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

fn null_percentage(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().filter(|&&b| b == 0).count() as f64 / data.len() as f64 * 100.0
}

pub(crate) fn is_printable(byte: u8) -> bool {
    (32..=126).contains(&byte)
}

fn ascii(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_signature_hex() {
        let report = Analyzer::new().analyze(b"GP50\x00\x01\xAB");
        assert_eq!(report.signature, "47 50 35 30 00 01 AB");
        assert_eq!(report.size, 7);

        let long = [0x11u8; 40];
        assert_eq!(Analyzer::new().analyze(&long).signature.split(' ').count(), 16);
    }

    #[test]
    fn test_extract_strings() {
        let strings = Analyzer::new().extract_strings(b"AAAA\x00BBBB\x00\x00C");
        assert_eq!(strings, vec!["AAAA".to_string(), "BBBB".to_string()]);
    }

    #[test]
    fn test_extract_strings_trailing_run_and_cap() {
        let analyzer = Analyzer::new();
        assert_eq!(analyzer.extract_strings(b"\x01Lead"), vec!["Lead".to_string()]);

        let mut data = Vec::new();
        for i in 0..30 {
            data.extend_from_slice(format!("name{:02}", i).as_bytes());
            data.push(0);
        }
        let strings = analyzer.extract_strings(&data);
        assert_eq!(strings.len(), 20);
        assert_eq!(strings[0], "name00");
        assert_eq!(strings[19], "name19");
    }

    #[test]
    fn test_distribution_ignores_nulls() {
        let dist = byte_distribution(&[0, 0, 10, 20, 0, 30]);
        assert_eq!(dist.min, 10);
        assert_eq!(dist.max, 30);
        assert_eq!(dist.mean, 20.0);
        assert_eq!(dist.null_bytes, 3);
        assert_eq!(dist.null_percentage, 50.0);

        assert_eq!(byte_distribution(&[]), ByteDistribution::default());
        let zeros = byte_distribution(&[0; 8]);
        assert_eq!((zeros.min, zeros.max, zeros.mean), (0, 0, 0.0));
        assert_eq!(zeros.null_percentage, 100.0);
    }

    #[test]
    fn test_repeating_patterns() {
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
            data.extend_from_slice(&[0; 8]);
        }
        data.extend_from_slice(&[0xFF; 12]);

        let patterns = Analyzer::new().find_repeating_patterns(&data);
        assert_eq!(patterns[0].bytes, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(patterns[0].count, 4);
        assert_eq!(patterns[0].hex(), "DE AD BE EF");
        assert!(patterns.iter().all(|p| p.count > 2));
        assert!(patterns.iter().all(|p| p.bytes != [0; 4] && p.bytes != [0xFF; 4]));
        assert!(patterns.len() <= 10);
    }

    #[test]
    fn test_pattern_ties_keep_first_seen_order() {
        // "abcd" and "wxyz" both occur three times; "abcd" appears first
        let data = b"abcd.wxyz.abcd.wxyz.abcd.wxyz.";
        let patterns = Analyzer::new().find_repeating_patterns(data);
        let hexes: Vec<_> = patterns.iter().map(|p| p.bytes.clone()).collect();
        let abcd = hexes.iter().position(|p| p == b"abcd").unwrap();
        let wxyz = hexes.iter().position(|p| p == b"wxyz").unwrap();
        assert!(abcd < wxyz);
    }

    #[test]
    fn test_null_runs() {
        let data = [1, 0, 0, 0, 0, 2, 0, 0, 3, 0, 0, 0, 0, 0, 9];
        let runs = Analyzer::new().find_null_runs(&data);
        assert_eq!(runs, vec![(1, 5), (9, 14)]);

        let mut many = Vec::new();
        for _ in 0..15 {
            many.extend_from_slice(&[7, 0, 0, 0, 0]);
        }
        many.push(7);
        assert_eq!(Analyzer::new().find_null_runs(&many).len(), 10);
    }

    #[test]
    fn test_trailing_null_run_is_not_reported() {
        let analyzer = Analyzer::new();
        assert!(analyzer.find_null_runs(&[1, 0, 0, 0, 0, 0]).is_empty());
        assert!(analyzer.find_null_runs(&[0; 32]).is_empty());
        assert_eq!(analyzer.find_null_runs(&[0, 0, 0, 0, 5, 0, 0, 0, 0]), vec![(0, 4)]);
    }

    #[test]
    fn test_header_guess() {
        let mut data = vec![0u8; 64];
        data.extend(std::iter::repeat(0x5A).take(600));
        assert_eq!(Analyzer::new().guess_header_size(&data), 64);

        // Uniform data has no boundary
        assert_eq!(Analyzer::new().guess_header_size(&[0x42; 1024]), 0);
        // Too short for any candidate
        assert_eq!(Analyzer::new().guess_header_size(&[0; 100]), 0);
    }

    #[test]
    fn test_header_guess_later_candidate() {
        let mut data = vec![0x33u8; 128];
        data.extend(std::iter::repeat(0).take(200));
        // 64: header 0% null vs body 0% -> no; 128: header 0% vs body 100% -> yes
        assert_eq!(Analyzer::new().guess_header_size(&data), 128);
    }

    #[test]
    fn test_compare() {
        let analyzer = Analyzer::new();
        let cmp = analyzer.compare(b"GP5\x00abcd", b"GP50abXdEXTRA");
        assert_eq!(cmp.byte_differences, 2);
        assert_eq!(cmp.first_differences[0], ByteDifference { offset: 3, a: 0, b: b'0' });
        assert_eq!(cmp.size_difference, -5);
        assert!((cmp.similarity_percentage - (1.0 - 2.0 / 13.0) * 100.0).abs() < 1e-9);

        assert_eq!(analyzer.compare(b"", b"").similarity_percentage, 0.0);
        assert_eq!(analyzer.compare(b"same", b"same").similarity_percentage, 100.0);
    }

    #[test]
    fn test_compare_keeps_first_fifty() {
        let cmp = Analyzer::new().compare(&[0u8; 80], &[1u8; 80]);
        assert_eq!(cmp.byte_differences, 80);
        assert_eq!(cmp.first_differences.len(), MAX_REPORTED_DIFFERENCES);
        assert_eq!(cmp.similarity_percentage, 0.0);
    }

    proptest! {
        #[test]
        fn compare_is_symmetric(a in prop::collection::vec(any::<u8>(), 0..256),
                                b in prop::collection::vec(any::<u8>(), 0..256)) {
            let analyzer = Analyzer::new();
            let ab = analyzer.compare(&a, &b);
            let ba = analyzer.compare(&b, &a);
            prop_assert_eq!(ab.byte_differences, ba.byte_differences);
            prop_assert_eq!(ab.similarity_percentage, ba.similarity_percentage);
            prop_assert_eq!(ab.size_difference, -ba.size_difference);
        }
    }
}
