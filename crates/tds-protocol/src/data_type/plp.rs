//! Partially length-prefixed (PLP) framing for `max` types.
//!
//! ```text
//! u64 total length   0xFFFFFFFFFFFFFFFF = NULL
//!                    0xFFFFFFFFFFFFFFFE = total not sent
//! ( u32 chunk length, chunk bytes )*
//! u32 0              terminator
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::writer::{ByteWriter, PLP_NULL, PLP_UNKNOWN_LENGTH};

/// Read a complete PLP value. `None` is the NULL marker.
pub(crate) fn read(src: &mut ByteCursor) -> Result<Option<Bytes>, ProtocolError> {
    let total = src.read_u64_le()?;
    if total == PLP_NULL {
        return Ok(None);
    }

    let mut data = match total {
        PLP_UNKNOWN_LENGTH => BytesMut::new(),
        known => BytesMut::with_capacity(known.min(64 * 1024) as usize),
    };

    loop {
        let chunk_len = src.read_u32_le()? as usize;
        if chunk_len == 0 {
            break;
        }
        data.extend_from_slice(&src.read_bytes(chunk_len)?);
    }

    if total != PLP_UNKNOWN_LENGTH && total != data.len() as u64 {
        return Err(ProtocolError::PlpLengthMismatch {
            declared: total,
            actual: data.len() as u64,
        });
    }

    Ok(Some(data.freeze()))
}

/// Write the PLP length header of a parameter value.
pub(crate) fn write_length(is_null: bool, dst: &mut ByteWriter) {
    if is_null {
        dst.write_plp_null();
    } else {
        dst.write_plp_unknown_length();
    }
}

/// Frame a non-NULL value as PLP chunks plus the terminator.
pub(crate) fn chunks(data: &[u8]) -> Vec<Bytes> {
    let mut out = Vec::with_capacity(2);
    if !data.is_empty() {
        let mut chunk = BytesMut::with_capacity(4 + data.len());
        chunk.put_u32_le(data.len() as u32);
        chunk.put_slice(data);
        out.push(chunk.freeze());
    }
    out.push(Bytes::from_static(&[0, 0, 0, 0]));
    out
}
