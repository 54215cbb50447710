//! Bounds-checked binary reading and writing.
//!
//! [`ByteReader`] walks a borrowed buffer and fails with
//! [`Error::OutOfBounds`] instead of returning short reads. [`ByteWriter`]
//! only ever appends. Both support fixed-width integers, 32-bit floats,
//! fixed-width strings and NUL-terminated strings in either byte order.
//!
//! ```
//! use presetconv_core::binary::{ByteReader, ByteWriter, Endian};
//!
//! let mut writer = ByteWriter::new();
//! writer.write_u16(0x1234, Endian::Big);
//! writer.write_string("Lead", 8, 0);
//!
//! let mut reader = ByteReader::new(writer.as_bytes());
//! assert_eq!(reader.read_u16(Endian::Big)?, 0x1234);
//! assert_eq!(reader.read_string(8)?, "Lead");
//! assert!(reader.read_u8().is_err());
//! # Ok::<(), presetconv_core::Error>(())
//! ```

mod text;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

pub use text::{decode, decode_until_nul, encode_truncated};

/// Byte order for multi-byte values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    /// Least significant byte first
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

macro_rules! read_int {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&mut self, endian: Endian) -> Result<$ty> {
            let bytes: [u8; std::mem::size_of::<$ty>()] = self.read_array()?;
            Ok(match endian {
                Endian::Little => <$ty>::from_le_bytes(bytes),
                Endian::Big => <$ty>::from_be_bytes(bytes),
            })
        }
    };
}

macro_rules! write_int {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&mut self, value: $ty, endian: Endian) {
            match endian {
                Endian::Little => self.data.extend_from_slice(&value.to_le_bytes()),
                Endian::Big => self.data.extend_from_slice(&value.to_be_bytes()),
            }
        }
    };
}

/// Positional reader over an immutable byte buffer
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Reads exactly `count` bytes, failing if fewer remain
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if count > available {
            return Err(Error::out_of_bounds(self.offset, count, available));
        }

        let start = self.offset;
        self.offset += count;
        trace!("read {} bytes at offset {}", count, start);
        Ok(&self.data[start..self.offset])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads a single unsigned byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Reads a single signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    read_int!(
        /// Reads an unsigned 16-bit integer
        read_u16, u16
    );
    read_int!(
        /// Reads a signed 16-bit integer
        read_i16, i16
    );
    read_int!(
        /// Reads an unsigned 32-bit integer
        read_u32, u32
    );
    read_int!(
        /// Reads a signed 32-bit integer
        read_i32, i32
    );

    /// Reads an IEEE 754 single-precision float
    pub fn read_f32(&mut self, endian: Endian) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32(endian)?))
    }

    /// Reads a fixed-width string field, truncated at the first NUL
    pub fn read_string(&mut self, length: usize) -> Result<String> {
        let bytes = self.read_bytes(length)?;
        Ok(decode_until_nul(bytes))
    }

    /// Reads a NUL-terminated string, consuming the terminator.
    ///
    /// Stops at end of buffer if no terminator is present.
    pub fn read_cstring(&mut self) -> String {
        let rest = &self.data[self.offset..];
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                self.offset += end + 1;
                decode(&rest[..end])
            }
            None => {
                self.offset = self.data.len();
                decode(rest)
            }
        }
    }

    /// Advances the cursor by `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    /// Moves the cursor to an absolute position (at most the buffer length)
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(Error::out_of_bounds(position, 0, 0));
        }
        self.offset = position;
        Ok(())
    }

    /// Returns the current cursor position
    pub fn tell(&self) -> usize {
        self.offset
    }

    /// Returns the number of unread bytes
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Returns true if every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the whole underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// Append-only binary writer
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    data: Vec<u8>,
}

impl ByteWriter {
    /// Creates an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with preallocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Appends raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Appends a single unsigned byte
    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Appends a single signed byte
    pub fn write_i8(&mut self, value: i8) {
        self.data.push(value as u8);
    }

    write_int!(
        /// Appends an unsigned 16-bit integer
        write_u16, u16
    );
    write_int!(
        /// Appends a signed 16-bit integer
        write_i16, i16
    );
    write_int!(
        /// Appends an unsigned 32-bit integer
        write_u32, u32
    );
    write_int!(
        /// Appends a signed 32-bit integer
        write_i32, i32
    );

    /// Appends an IEEE 754 single-precision float
    pub fn write_f32(&mut self, value: f32, endian: Endian) {
        self.write_u32(value.to_bits(), endian);
    }

    /// Appends `text` as exactly `length` bytes, truncated or padded with `padding`
    pub fn write_string(&mut self, text: &str, length: usize, padding: u8) {
        let encoded = encode_truncated(text, length);
        self.data.extend_from_slice(encoded);
        self.data
            .resize(self.data.len() + (length - encoded.len()), padding);
    }

    /// Appends `text` followed by a NUL terminator
    pub fn write_cstring(&mut self, text: &str) {
        self.data.extend_from_slice(text.as_bytes());
        self.data.push(0);
    }

    /// Returns the current write position (the number of bytes written)
    pub fn tell(&self) -> usize {
        self.data.len()
    }

    /// Discards everything written so far
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Returns the bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the writer and returns its buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bytes_never_short() {
        let data = [1u8, 2, 3];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_bytes(2).unwrap(), &[1, 2]);

        let err = reader.read_bytes(2).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfBounds {
                offset: 2,
                requested: 2,
                available: 1
            }
        ));
        // A failed read does not move the cursor
        assert_eq!(reader.tell(), 2);
        assert_eq!(reader.read_u8().unwrap(), 3);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_integer_endianness() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u16(Endian::Little).unwrap(), 0x0201);
        assert_eq!(reader.read_u16(Endian::Big).unwrap(), 0x0304);

        reader.seek(0).unwrap();
        assert_eq!(reader.read_u32(Endian::Big).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_signed_values() {
        let mut writer = ByteWriter::new();
        writer.write_i8(-5);
        writer.write_i16(-300, Endian::Little);
        writer.write_i32(-70_000, Endian::Big);

        let mut reader = ByteReader::new(writer.as_bytes());
        assert_eq!(reader.read_i8().unwrap(), -5);
        assert_eq!(reader.read_i16(Endian::Little).unwrap(), -300);
        assert_eq!(reader.read_i32(Endian::Big).unwrap(), -70_000);
    }

    #[test]
    fn test_float() {
        let mut writer = ByteWriter::new();
        writer.write_f32(0.75, Endian::Little);
        writer.write_f32(-12.5, Endian::Big);
        assert_eq!(&writer.as_bytes()[..4], &0.75f32.to_le_bytes());

        let mut reader = ByteReader::new(writer.as_bytes());
        assert_eq!(reader.read_f32(Endian::Little).unwrap(), 0.75);
        assert_eq!(reader.read_f32(Endian::Big).unwrap(), -12.5);
    }

    #[test]
    fn test_fixed_string_padding_and_truncation() {
        let mut writer = ByteWriter::new();
        writer.write_string("Lead", 6, 0);
        writer.write_string("Overlong", 4, 0);
        assert_eq!(writer.as_bytes(), b"Lead\0\0Over");
        assert_eq!(writer.tell(), 10);

        let mut reader = ByteReader::new(writer.as_bytes());
        assert_eq!(reader.read_string(6).unwrap(), "Lead");
        assert_eq!(reader.read_string(4).unwrap(), "Over");
    }

    #[test]
    fn test_cstring() {
        let mut writer = ByteWriter::new();
        writer.write_cstring("amp");
        writer.write_bytes(b"tail");

        let mut reader = ByteReader::new(writer.as_bytes());
        assert_eq!(reader.read_cstring(), "amp");
        assert_eq!(reader.tell(), 4);
        // No terminator: stops at end of buffer
        assert_eq!(reader.read_cstring(), "tail");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_seek_and_skip_bounds() {
        let data = [0u8; 4];
        let mut reader = ByteReader::new(&data);
        assert!(reader.seek(4).is_ok());
        assert!(reader.seek(5).is_err());
        reader.seek(1).unwrap();
        assert!(reader.skip(3).is_ok());
        assert!(reader.skip(1).is_err());
    }

    #[test]
    fn test_writer_clear() {
        let mut writer = ByteWriter::new();
        writer.write_u32(7, Endian::Little);
        writer.clear();
        assert_eq!(writer.tell(), 0);
        writer.write_u8(9);
        assert_eq!(writer.into_bytes(), vec![9]);
    }
}
