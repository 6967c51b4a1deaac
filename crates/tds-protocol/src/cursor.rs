//! Position-tracking read cursor over buffered response bytes.
//!
//! Every read is atomic: it either advances the position by exactly the width
//! it consumed and returns a value, or it leaves the position untouched and
//! returns [`ProtocolError::Incomplete`]. The token parser relies on this to
//! retry a decode once more bytes have been appended with
//! [`ByteCursor::concat`].

use bytes::{Buf, Bytes, BytesMut};

use crate::error::ProtocolError;

/// A readable tracking buffer.
#[derive(Debug, Default, Clone)]
pub struct ByteCursor {
    buf: BytesMut,
    position: usize,
}

impl ByteCursor {
    /// Create an empty cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly received bytes.
    ///
    /// The already-consumed prefix is released first, so the buffer only ever
    /// holds unread data plus the new chunk.
    pub fn concat(&mut self, chunk: &[u8]) {
        if self.position > 0 {
            self.buf.advance(self.position);
            self.position = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Current read position relative to the start of the retained buffer.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Save the current position for a later [`rewind`](Self::rewind).
    #[must_use]
    pub fn mark(&self) -> usize {
        self.position
    }

    /// Move the read position back to a previously observed position.
    ///
    /// Positions are only valid until the next [`concat`](Self::concat).
    pub fn rewind(&mut self, position: usize) {
        debug_assert!(position <= self.buf.len());
        self.position = position.min(self.buf.len());
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.position
    }

    /// Whether every buffered byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread bytes, without consuming them.
    #[must_use]
    pub fn unread(&self) -> &[u8] {
        &self.buf[self.position..]
    }

    /// Run a composite read, restoring the position if any part of it fails.
    pub fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        let start = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = start;
        }
        result
    }

    /// Fail with [`ProtocolError::Incomplete`] unless `len` bytes are buffered.
    pub fn ensure(&self, len: usize) -> Result<(), ProtocolError> {
        let available = self.remaining();
        if available < len {
            return Err(ProtocolError::Incomplete {
                needed: len,
                available,
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&[u8], ProtocolError> {
        self.ensure(len)?;
        let start = self.position;
        self.position += len;
        Ok(&self.buf[start..start + len])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        self.take(len).map(|_| ())
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf[self.position])
    }

    /// Read an unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a signed byte.
    pub fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u16`.
    pub fn read_u16_le(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a big-endian `u16`.
    pub fn read_u16_be(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read a little-endian `i16`.
    pub fn read_i16_le(&mut self) -> Result<i16, ProtocolError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian 3-byte unsigned integer.
    pub fn read_u24_le(&mut self) -> Result<u32, ProtocolError> {
        let [b0, b1, b2] = self.read_array()?;
        Ok(u32::from_le_bytes([b0, b1, b2, 0]))
    }

    /// Read a little-endian `u32`.
    pub fn read_u32_le(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a big-endian `u32`.
    pub fn read_u32_be(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Read a little-endian `i32`.
    pub fn read_i32_le(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian 5-byte unsigned integer.
    pub fn read_u40_le(&mut self) -> Result<u64, ProtocolError> {
        let [b0, b1, b2, b3, b4] = self.read_array()?;
        Ok(u64::from_le_bytes([b0, b1, b2, b3, b4, 0, 0, 0]))
    }

    /// Read a little-endian `u64`.
    pub fn read_u64_le(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `i64`.
    pub fn read_i64_le(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `f32`.
    pub fn read_f32_le(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `f64`.
    pub fn read_f64_le(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, ProtocolError> {
        self.take(len).map(Bytes::copy_from_slice)
    }

    /// Read `byte_len` bytes of UTF-16LE text.
    pub fn read_utf16(&mut self, byte_len: usize) -> Result<String, ProtocolError> {
        self.atomically(|cursor| decode_utf16(cursor.take(byte_len)?))
    }

    /// Read a B_VARCHAR: 1-byte character count, then UTF-16LE text.
    pub fn read_b_varchar(&mut self) -> Result<String, ProtocolError> {
        self.atomically(|cursor| {
            let chars = cursor.read_u8()? as usize;
            cursor.read_utf16(chars * 2)
        })
    }

    /// Read a US_VARCHAR: 2-byte character count, then UTF-16LE text.
    pub fn read_us_varchar(&mut self) -> Result<String, ProtocolError> {
        self.atomically(|cursor| {
            let chars = cursor.read_u16_le()? as usize;
            cursor.read_utf16(chars * 2)
        })
    }

    /// Read a B_VARBYTE: 1-byte length, then raw bytes.
    pub fn read_b_varbyte(&mut self) -> Result<Bytes, ProtocolError> {
        self.atomically(|cursor| {
            let len = cursor.read_u8()? as usize;
            cursor.read_bytes(len)
        })
    }

    /// Read a US_VARBYTE: 2-byte length, then raw bytes.
    pub fn read_us_varbyte(&mut self) -> Result<Bytes, ProtocolError> {
        self.atomically(|cursor| {
            let len = cursor.read_u16_le()? as usize;
            cursor.read_bytes(len)
        })
    }
}

impl From<&[u8]> for ByteCursor {
    fn from(data: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(data),
            position: 0,
        }
    }
}

/// Decode UTF-16LE bytes into a `String`.
pub fn decode_utf16(data: &[u8]) -> Result<String, ProtocolError> {
    if data.len() % 2 != 0 {
        return Err(ProtocolError::StringEncoding(format!(
            "odd UTF-16 byte length {}",
            data.len()
        )));
    }

    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|e| ProtocolError::StringEncoding(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_reads() {
        let mut cursor = ByteCursor::from(
            &[
                0x01, // u8
                0x34, 0x12, // u16
                0x78, 0x56, 0x34, 0x12, // u32
                0xFF, 0xFF, // i16 = -1
            ][..],
        );

        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x1234);
        assert_eq!(cursor.read_u32_le().unwrap(), 0x1234_5678);
        assert_eq!(cursor.read_i16_le().unwrap(), -1);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_odd_width_integers() {
        let mut cursor = ByteCursor::from(&[0x01, 0x02, 0x03, 0x01, 0x02, 0x03, 0x04, 0x05][..]);
        assert_eq!(cursor.read_u24_le().unwrap(), 0x03_0201);
        assert_eq!(cursor.read_u40_le().unwrap(), 0x05_0403_0201);
    }

    #[test]
    fn test_insufficient_data_leaves_position() {
        let mut cursor = ByteCursor::from(&[0x01, 0x02, 0x03][..]);
        cursor.read_u8().unwrap();

        let err = cursor.read_u32_le().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Incomplete {
                needed: 4,
                available: 2
            }
        ));
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x0302);
    }

    #[test]
    fn test_b_varchar_is_atomic() {
        // Length says 2 characters, only one is buffered.
        let mut cursor = ByteCursor::from(&[0x02, b'h', 0x00][..]);
        assert!(cursor.read_b_varchar().unwrap_err().is_incomplete());
        assert_eq!(cursor.position(), 0);

        cursor.concat(&[b'i', 0x00]);
        assert_eq!(cursor.read_b_varchar().unwrap(), "hi");
    }

    #[test]
    fn test_us_varchar() {
        let mut cursor = ByteCursor::from(&[0x03, 0x00, b'a', 0, b'b', 0, b'c', 0][..]);
        assert_eq!(cursor.read_us_varchar().unwrap(), "abc");
    }

    #[test]
    fn test_varbyte() {
        let mut cursor = ByteCursor::from(&[0x02, 0xAA, 0xBB, 0x01, 0x00, 0xCC][..]);
        assert_eq!(&cursor.read_b_varbyte().unwrap()[..], &[0xAA, 0xBB]);
        assert_eq!(&cursor.read_us_varbyte().unwrap()[..], &[0xCC]);
    }

    #[test]
    fn test_concat_discards_consumed_prefix() {
        let mut cursor = ByteCursor::from(&[0x01, 0x02, 0x03][..]);
        cursor.read_u16_le().unwrap();
        cursor.concat(&[0x04]);

        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.unread(), &[0x03, 0x04]);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x0403);
    }

    #[test]
    fn test_rewind() {
        let mut cursor = ByteCursor::from(&[0x01, 0x02][..]);
        let mark = cursor.mark();
        cursor.read_u16_le().unwrap();
        cursor.rewind(mark);
        assert_eq!(cursor.remaining(), 2);
    }

    #[test]
    fn test_floats() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-2.25f64).to_le_bytes());
        let mut cursor = ByteCursor::from(&data[..]);
        assert_eq!(cursor.read_f32_le().unwrap(), 1.5);
        assert_eq!(cursor.read_f64_le().unwrap(), -2.25);
    }

    #[test]
    fn test_decode_utf16_rejects_odd_length() {
        assert!(decode_utf16(&[0x41]).is_err());
        assert_eq!(decode_utf16(&[0x41, 0x00, 0x42, 0x00]).unwrap(), "AB");
    }
}
