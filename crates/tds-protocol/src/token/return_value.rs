//! RETURNVALUE.

use tds_types::SqlValue;

use super::DecodeContext;
use crate::codec::decode_value;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::{ColumnMetadata, TypeInfo, read_user_type};

/// Return value status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnValueStatus {
    /// Value of an OUTPUT parameter.
    OutputParam,
    /// Return value of a user-defined function.
    UdfReturn,
    /// Any other status byte.
    Other(u8),
}

impl From<u8> for ReturnValueStatus {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::OutputParam,
            0x02 => Self::UdfReturn,
            other => Self::Other(other),
        }
    }
}

/// Output parameter or UDF return value.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnValue {
    /// Parameter ordinal.
    pub param_ordinal: u16,
    /// Parameter name without the leading `@`.
    pub param_name: String,
    /// Status.
    pub status: ReturnValueStatus,
    /// Type of the value. `col_name` holds the parameter name.
    pub metadata: ColumnMetadata,
    /// The value.
    pub value: SqlValue,
}

impl ReturnValue {
    /// Decode a RETURNVALUE token body.
    pub fn decode(src: &mut ByteCursor, ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let param_ordinal = src.read_u16_le()?;
        let raw_name = src.read_b_varchar()?;
        let param_name = raw_name.strip_prefix('@').unwrap_or(&raw_name).to_string();
        let status = ReturnValueStatus::from(src.read_u8()?);
        let user_type = read_user_type(src, ctx.version)?;
        let flags = src.read_u16_le()?;
        let info = TypeInfo::decode(src, ctx.registry)?;

        let mut metadata = ColumnMetadata::from_type_info(info, user_type, flags);
        metadata.col_name.clone_from(&param_name);
        let value = decode_value(src, &metadata)?;

        Ok(Self {
            param_ordinal,
            param_name,
            status,
            metadata,
            value,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::TypeId;
    use crate::version::TdsVersion;
    use crate::writer::ByteWriter;

    #[test]
    fn test_output_int() {
        let mut w = ByteWriter::new();
        w.write_u16_le(1);
        w.write_b_varchar("@total");
        w.write_u8(0x01);
        w.write_u32_le(0);
        w.write_u16_le(0x0009);
        w.write_bytes(&[0x26, 0x04]);
        w.write_bytes(&[0x04, 0x2A, 0x00, 0x00, 0x00]);

        let mut cursor = ByteCursor::from(w.as_slice());
        let ret = ReturnValue::decode(&mut cursor, &DecodeContext::new(TdsVersion::V7_4)).unwrap();

        assert_eq!(ret.param_ordinal, 1);
        assert_eq!(ret.param_name, "total");
        assert_eq!(ret.status, ReturnValueStatus::OutputParam);
        assert_eq!(ret.metadata.data_type.id, TypeId::IntN);
        assert_eq!(ret.metadata.col_name, "total");
        assert_eq!(ret.value, SqlValue::Int(42));
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_legacy_user_type() {
        let mut w = ByteWriter::new();
        w.write_u16_le(0);
        w.write_b_varchar("");
        w.write_u8(0x02);
        w.write_u16_le(0);
        w.write_u16_le(0);
        w.write_bytes(&[0x26, 0x04, 0x00]);

        let mut cursor = ByteCursor::from(w.as_slice());
        let ret = ReturnValue::decode(&mut cursor, &DecodeContext::new(TdsVersion::V7_1)).unwrap();
        assert_eq!(ret.status, ReturnValueStatus::UdfReturn);
        assert_eq!(ret.value, SqlValue::Null);
        assert!(cursor.is_empty());
    }
}
