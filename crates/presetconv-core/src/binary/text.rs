//! Text decoding and encoding for fixed-width preset fields.
//!
//! Decoding tries UTF-8 first and falls back to Latin-1, where every byte maps
//! to the code point of the same value. The fallback cannot fail, so decoding
//! arbitrary bytes always yields a string.

/// Decode bytes as text, truncated at the first NUL byte.
pub fn decode_until_nul(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    decode(&data[..end])
}

/// Decode bytes as UTF-8, falling back to Latin-1.
pub fn decode(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(s) => s.to_owned(),
        Err(_) => data.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Encode `text` as UTF-8, cut to at most `max` bytes on a char boundary.
pub fn encode_truncated(text: &str, max: usize) -> &[u8] {
    if text.len() <= max {
        return text.as_bytes();
    }

    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text.as_bytes()[..end]
}
