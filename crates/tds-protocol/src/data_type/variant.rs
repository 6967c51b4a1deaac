//! sql_variant.
//!
//! ```text
//! u32  total length        0 = NULL
//! u8   base type id
//! u8   property byte count
//! ...  type properties     precision/scale, scale, collation + max length
//! ...  value               total - 2 - property count bytes
//! ```
//!
//! Variants are only ever received; they cannot be sent as parameters.

use bytes::Bytes;
use tds_types::{SqlValue, TypeError};

use super::datetime::read_datetime;
use super::decimal::read_decimal;
use super::float::read_float;
use super::guid::read_guid;
use super::integer::read_integer;
use super::money::read_money;
use super::string::decode_text;
use super::time::{Temporal, read_temporal};
use super::{DataType, TypeCodec, decode_only};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::types::TypeId;
use crate::writer::ByteWriter;

pub(super) struct VariantCodec;

pub(super) static VARIANT: VariantCodec = VariantCodec;

impl TypeCodec for VariantCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        "sql_variant".to_string()
    }

    fn type_info(
        &self,
        ty: &DataType,
        _param: &Parameter,
        _dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        Err(decode_only(ty))
    }

    fn parameter_length(
        &self,
        ty: &DataType,
        _param: &Parameter,
        _dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        Err(decode_only(ty))
    }

    fn parameter_data(&self, ty: &DataType, _param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        Err(decode_only(ty))
    }

    fn validate(
        &self,
        ty: &DataType,
        _value: SqlValue,
        _collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        Err(decode_only(ty))
    }

    fn decode(
        &self,
        _ty: &DataType,
        src: &mut ByteCursor,
        _column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        let total = src.read_u32_le()? as usize;
        if total == 0 {
            return Ok(SqlValue::Null);
        }
        if total < 2 {
            return Err(ProtocolError::InvalidValue {
                field: "sql_variant length",
                value: total as u64,
            });
        }

        let body = src.read_bytes(total)?;
        let mut body = ByteCursor::from(&body[..]);
        let value = read_variant(&mut body)?;
        if !body.is_empty() {
            return Err(ProtocolError::InvalidValue {
                field: "sql_variant trailing bytes",
                value: body.remaining() as u64,
            });
        }
        Ok(value)
    }
}

/// Decode a complete variant body (base type onwards).
fn read_variant(src: &mut ByteCursor) -> Result<SqlValue, ProtocolError> {
    let base = src.read_u8()?;
    let prop_count = usize::from(src.read_u8()?);
    let value_len = src
        .remaining()
        .checked_sub(prop_count)
        .ok_or(ProtocolError::InvalidValue {
            field: "sql_variant property count",
            value: prop_count as u64,
        })?;

    let id = TypeId::from_u8(base).ok_or(ProtocolError::UnknownDataType(base))?;
    match id {
        TypeId::TinyInt | TypeId::SmallInt | TypeId::Int | TypeId::BigInt => {
            read_integer(src, value_len)
        }
        TypeId::Bit => Ok(SqlValue::Bool(src.read_u8()? != 0)),
        TypeId::Real | TypeId::Float => read_float(src, value_len),
        TypeId::Money | TypeId::SmallMoney => read_money(src, value_len),
        TypeId::DateTime | TypeId::SmallDateTime => read_datetime(src, value_len),
        TypeId::DecimalN | TypeId::NumericN => {
            let _precision = src.read_u8()?;
            let scale = src.read_u8()?;
            read_decimal(src, value_len, scale)
        }
        TypeId::UniqueIdentifier => read_guid(src),
        TypeId::Binary | TypeId::VarBinary => {
            let _max_length = src.read_u16_le()?;
            Ok(SqlValue::Binary(src.read_bytes(value_len)?))
        }
        TypeId::Char | TypeId::VarChar | TypeId::NChar | TypeId::NVarChar => {
            let collation = Collation::decode(src)?;
            let _max_length = src.read_u16_le()?;
            let bytes = src.read_bytes(value_len)?;
            let text = decode_text(&bytes, id.is_unicode(), Some(&collation))?;
            Ok(SqlValue::String(text))
        }
        TypeId::Date => read_temporal(Temporal::Date, src, 0),
        TypeId::Time | TypeId::DateTime2 | TypeId::DateTimeOffset => {
            let scale = src.read_u8()?;
            let kind = match id {
                TypeId::Time => Temporal::Time,
                TypeId::DateTime2 => Temporal::DateTime2,
                _ => Temporal::DateTimeOffset,
            };
            read_temporal(kind, src, scale)
        }
        _ => Err(ProtocolError::InvalidValue {
            field: "sql_variant base type",
            value: u64::from(base),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::data_type::DataTypeRegistry;
    use crate::metadata::TypeInfo;

    fn column() -> ColumnMetadata {
        let mut cursor = ByteCursor::from(&[0x62, 0x10, 0x1F, 0x00, 0x00][..]);
        let info = TypeInfo::decode(&mut cursor, DataTypeRegistry::standard()).unwrap();
        ColumnMetadata::from_type_info(info, 0, 0)
    }

    fn decode(value: &[u8]) -> Result<SqlValue, ProtocolError> {
        let mut w = ByteWriter::new();
        w.write_u32_le(value.len() as u32);
        w.write_bytes(value);
        let column = column();
        let mut cursor = ByteCursor::from(w.as_slice());
        column.data_type.decode(&mut cursor, &column)
    }

    #[test]
    fn test_null_variant() {
        let column = column();
        let mut cursor = ByteCursor::from(&[0, 0, 0, 0][..]);
        assert_eq!(
            column.data_type.decode(&mut cursor, &column).unwrap(),
            SqlValue::Null
        );
    }

    #[test]
    fn test_int_variant() {
        assert_eq!(
            decode(&[0x38, 0x00, 0x2A, 0x00, 0x00, 0x00]).unwrap(),
            SqlValue::Int(42)
        );
    }

    #[test]
    fn test_decimal_variant() {
        // decimal(5, 2) 123.45
        assert_eq!(
            decode(&[0x6A, 0x02, 0x05, 0x02, 0x01, 0x39, 0x30, 0x00, 0x00]).unwrap(),
            SqlValue::Decimal(rust_decimal::Decimal::new(12_345, 2))
        );
    }

    #[test]
    fn test_varchar_variant_uses_own_collation() {
        let mut value = vec![0xA7, 0x07];
        value.extend_from_slice(&Collation::default().to_bytes());
        value.extend_from_slice(&[0x0A, 0x00, b'h', 0xE9]);
        assert_eq!(decode(&value).unwrap(), SqlValue::String("hé".into()));
    }

    #[test]
    fn test_nvarchar_variant() {
        let mut value = vec![0xE7, 0x07];
        value.extend_from_slice(&Collation::default().to_bytes());
        value.extend_from_slice(&[0x0A, 0x00, b'o', 0x00, b'k', 0x00]);
        assert_eq!(decode(&value).unwrap(), SqlValue::String("ok".into()));
    }

    #[test]
    fn test_date_variant() {
        assert_eq!(
            decode(&[0x28, 0x00, 0x01, 0x00, 0x00]).unwrap(),
            SqlValue::Date(NaiveDate::from_ymd_opt(1, 1, 2).unwrap())
        );
    }

    #[test]
    fn test_unsupported_base_type() {
        assert!(matches!(
            decode(&[0xF1, 0x00, 0x00]),
            Err(ProtocolError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_variant_is_decode_only() {
        assert!(Parameter::typed("@v", "Variant", 1).is_err());
    }
}
