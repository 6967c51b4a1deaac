//! Growable byte sink for outbound request data.

use bytes::{BufMut, Bytes, BytesMut};

/// PLP length marker for a NULL value.
pub const PLP_NULL: u64 = 0xFFFF_FFFF_FFFF_FFFF;

/// PLP length marker for a value whose total length is not sent up front.
pub const PLP_UNKNOWN_LENGTH: u64 = 0xFFFF_FFFF_FFFF_FFFE;

/// A writable tracking buffer.
///
/// Single-owner and synchronous; the position is the number of bytes written.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Take the written bytes, leaving the writer empty.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Consume the writer and return its bytes.
    #[must_use]
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Write an unsigned byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Write a signed byte.
    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    /// Write a little-endian `u16`.
    pub fn write_u16_le(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    /// Write a big-endian `u16`.
    pub fn write_u16_be(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    /// Write a little-endian `i16`.
    pub fn write_i16_le(&mut self, value: i16) {
        self.buf.put_i16_le(value);
    }

    /// Write the low three bytes of `value`, little-endian.
    pub fn write_u24_le(&mut self, value: u32) {
        self.buf.put_slice(&value.to_le_bytes()[..3]);
    }

    /// Write a little-endian `u32`.
    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Write a big-endian `u32`.
    pub fn write_u32_be(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    /// Write a little-endian `i32`.
    pub fn write_i32_le(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    /// Write the low five bytes of `value`, little-endian.
    pub fn write_u40_le(&mut self, value: u64) {
        self.buf.put_slice(&value.to_le_bytes()[..5]);
    }

    /// Write a little-endian `u64`.
    pub fn write_u64_le(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    /// Write a little-endian `i64`.
    pub fn write_i64_le(&mut self, value: i64) {
        self.buf.put_i64_le(value);
    }

    /// Write a little-endian `f32`.
    pub fn write_f32_le(&mut self, value: f32) {
        self.buf.put_f32_le(value);
    }

    /// Write a little-endian `f64`.
    pub fn write_f64_le(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Write text as UTF-16LE without a length prefix.
    pub fn write_utf16(&mut self, value: &str) {
        for unit in value.encode_utf16() {
            self.buf.put_u16_le(unit);
        }
    }

    /// Write a B_VARCHAR. Text longer than 255 UTF-16 units is truncated.
    pub fn write_b_varchar(&mut self, value: &str) {
        let units: Vec<u16> = value.encode_utf16().take(u8::MAX as usize).collect();
        self.buf.put_u8(units.len() as u8);
        for unit in units {
            self.buf.put_u16_le(unit);
        }
    }

    /// Write a US_VARCHAR. Text longer than 65535 UTF-16 units is truncated.
    pub fn write_us_varchar(&mut self, value: &str) {
        let units: Vec<u16> = value.encode_utf16().take(u16::MAX as usize).collect();
        self.buf.put_u16_le(units.len() as u16);
        for unit in units {
            self.buf.put_u16_le(unit);
        }
    }

    /// Write a B_VARBYTE. Data longer than 255 bytes is truncated.
    pub fn write_b_varbyte(&mut self, data: &[u8]) {
        let data = &data[..data.len().min(u8::MAX as usize)];
        self.buf.put_u8(data.len() as u8);
        self.buf.put_slice(data);
    }

    /// Write a US_VARBYTE. Data longer than 65535 bytes is truncated.
    pub fn write_us_varbyte(&mut self, data: &[u8]) {
        let data = &data[..data.len().min(u16::MAX as usize)];
        self.buf.put_u16_le(data.len() as u16);
        self.buf.put_slice(data);
    }

    /// Write the PLP "unknown total length" marker.
    pub fn write_plp_unknown_length(&mut self) {
        self.buf.put_u64_le(PLP_UNKNOWN_LENGTH);
    }

    /// Write the PLP NULL marker.
    pub fn write_plp_null(&mut self) {
        self.buf.put_u64_le(PLP_NULL);
    }

    /// Write one PLP chunk: `u32` length, then the bytes.
    pub fn write_plp_chunk(&mut self, chunk: &[u8]) {
        self.buf.put_u32_le(chunk.len() as u32);
        self.buf.put_slice(chunk);
    }

    /// Write the PLP terminator (a zero-length chunk).
    pub fn write_plp_terminator(&mut self) {
        self.buf.put_u32_le(0);
    }
}

/// Number of bytes `value` occupies as UTF-16.
#[must_use]
pub fn utf16_byte_len(value: &str) -> usize {
    value.encode_utf16().count() * 2
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cursor::ByteCursor;

    #[test]
    fn test_b_varchar_roundtrip() {
        let mut writer = ByteWriter::new();
        writer.write_b_varchar("hello");
        assert_eq!(writer.position(), 1 + 10);

        let bytes = writer.freeze();
        let mut cursor = ByteCursor::from(&bytes[..]);
        assert_eq!(cursor.read_b_varchar().unwrap(), "hello");
    }

    #[test]
    fn test_us_varchar_non_ascii() {
        let mut writer = ByteWriter::new();
        writer.write_us_varchar("日本語");

        let bytes = writer.freeze();
        let mut cursor = ByteCursor::from(&bytes[..]);
        assert_eq!(cursor.read_us_varchar().unwrap(), "日本語");
    }

    #[test]
    fn test_odd_width_integers() {
        let mut writer = ByteWriter::new();
        writer.write_u24_le(0x0A_0B0C);
        writer.write_u40_le(0x01_0203_0405);
        assert_eq!(
            writer.as_slice(),
            &[0x0C, 0x0B, 0x0A, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_plp_framing() {
        let mut writer = ByteWriter::new();
        writer.write_plp_unknown_length();
        writer.write_plp_chunk(b"abc");
        writer.write_plp_terminator();

        assert_eq!(
            writer.as_slice(),
            &[
                0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // unknown length
                0x03, 0x00, 0x00, 0x00, b'a', b'b', b'c', // chunk
                0x00, 0x00, 0x00, 0x00, // terminator
            ]
        );
    }

    #[test]
    fn test_take_resets_writer() {
        let mut writer = ByteWriter::new();
        writer.write_u32_le(7);
        let first = writer.take();
        assert_eq!(first.len(), 4);
        assert_eq!(writer.position(), 0);
    }

    #[test]
    fn test_utf16_byte_len() {
        assert_eq!(utf16_byte_len("abc"), 6);
        assert_eq!(utf16_byte_len("𝄞"), 4);
    }
}
