//! UNIQUEIDENTIFIER.
//!
//! GUIDs are sent in the mixed-endian layout SQL Server uses: the first three
//! fields little-endian, the last eight bytes as-is.

use bytes::Bytes;
use tds_types::{SqlValue, TypeError};
use uuid::Uuid;

use super::{DataType, TypeCodec, read_byte_len, write_byte_len};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::writer::ByteWriter;

const GUID_LENGTH: u8 = 16;

pub(super) struct GuidCodec;

pub(super) static GUID: GuidCodec = GuidCodec;

impl TypeCodec for GuidCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        "uniqueidentifier".to_string()
    }

    fn type_info(
        &self,
        ty: &DataType,
        _param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(ty.id.as_u8());
        dst.write_u8(GUID_LENGTH);
        Ok(())
    }

    fn parameter_length(
        &self,
        _ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        write_byte_len(param, GUID_LENGTH, dst);
        Ok(())
    }

    fn parameter_data(&self, ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        match &param.value {
            SqlValue::Null => Ok(Vec::new()),
            SqlValue::Uuid(uuid) => Ok(vec![Bytes::copy_from_slice(&uuid.to_bytes_le())]),
            other => Err(TypeError::mismatch(ty.name, other.type_name())),
        }
    }

    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        _collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        match value {
            SqlValue::Null => Ok(SqlValue::Null),
            SqlValue::Uuid(uuid) => Ok(SqlValue::Uuid(uuid)),
            SqlValue::String(s) => Uuid::parse_str(s.trim())
                .map(SqlValue::Uuid)
                .map_err(|e| TypeError::InvalidUuid(format!("{s:?}: {e}"))),
            other => Err(TypeError::mismatch(ty.name, other.type_name())),
        }
    }

    fn decode(
        &self,
        _ty: &DataType,
        src: &mut ByteCursor,
        _column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        match read_byte_len(src)? {
            None => Ok(SqlValue::Null),
            Some(len) if len == usize::from(GUID_LENGTH) => read_guid(src),
            Some(len) => Err(ProtocolError::InvalidValue {
                field: "uniqueidentifier length",
                value: len as u64,
            }),
        }
    }
}

/// Read 16 GUID bytes.
pub(super) fn read_guid(src: &mut ByteCursor) -> Result<SqlValue, ProtocolError> {
    let bytes = src.read_bytes(usize::from(GUID_LENGTH))?;
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&bytes);
    Ok(SqlValue::Uuid(Uuid::from_bytes_le(raw)))
}
