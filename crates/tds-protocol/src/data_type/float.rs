//! Floating point types, sent as FloatN with width 4 or 8.

use bytes::Bytes;
use tds_types::{SqlValue, TypeError};

use super::{DataType, TypeCodec, read_byte_len, write_byte_len};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::types::TypeId;
use crate::writer::ByteWriter;

pub(super) struct FloatCodec {
    width: u8,
}

pub(super) static REAL: FloatCodec = FloatCodec { width: 4 };
pub(super) static FLOAT: FloatCodec = FloatCodec { width: 8 };

impl TypeCodec for FloatCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        if self.width == 4 { "real" } else { "float" }.to_string()
    }

    fn type_info(
        &self,
        _ty: &DataType,
        _param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(TypeId::FloatN.as_u8());
        dst.write_u8(self.width);
        Ok(())
    }

    fn parameter_length(
        &self,
        _ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        write_byte_len(param, self.width, dst);
        Ok(())
    }

    fn parameter_data(&self, ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        let bytes = match param.value {
            SqlValue::Null => return Ok(Vec::new()),
            SqlValue::Real(v) => v.to_le_bytes().to_vec(),
            SqlValue::Float(v) => v.to_le_bytes().to_vec(),
            ref other => return Err(TypeError::mismatch(ty.name, other.type_name())),
        };
        Ok(vec![Bytes::from(bytes)])
    }

    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        _collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        let v = match &value {
            SqlValue::Null => return Ok(SqlValue::Null),
            SqlValue::String(s) => s.trim().parse::<f64>().map_err(|_| TypeError::InvalidFormat {
                target_type: ty.name,
                value: s.clone(),
            })?,
            other => other
                .as_f64()
                .ok_or_else(|| TypeError::mismatch(ty.name, other.type_name()))?,
        };

        if !v.is_finite() {
            return Err(TypeError::OutOfRange {
                target_type: ty.name,
            });
        }

        if self.width == 4 {
            if v.abs() > f64::from(f32::MAX) {
                return Err(TypeError::OutOfRange {
                    target_type: ty.name,
                });
            }
            Ok(SqlValue::Real(v as f32))
        } else {
            Ok(SqlValue::Float(v))
        }
    }

    fn decode(
        &self,
        ty: &DataType,
        src: &mut ByteCursor,
        _column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        let width = if ty.fixed_length {
            usize::from(self.width)
        } else {
            match read_byte_len(src)? {
                Some(width) => width,
                None => return Ok(SqlValue::Null),
            }
        };
        read_float(src, width)
    }
}

pub(super) fn read_float(src: &mut ByteCursor, width: usize) -> Result<SqlValue, ProtocolError> {
    match width {
        4 => Ok(SqlValue::Real(src.read_f32_le()?)),
        8 => Ok(SqlValue::Float(src.read_f64_le()?)),
        other => Err(ProtocolError::InvalidValue {
            field: "float length",
            value: other as u64,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tds_types::{SqlValue, TypeError};

    use crate::data_type::DataTypeRegistry;

    #[test]
    fn test_real_range() {
        let real = DataTypeRegistry::standard().by_name("Real").unwrap();
        assert_eq!(
            real.validate(SqlValue::Float(1.5), None).unwrap(),
            SqlValue::Real(1.5)
        );
        assert!(matches!(
            real.validate(SqlValue::Float(1e300), None),
            Err(TypeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_float_rejects_nan() {
        let float = DataTypeRegistry::standard().by_name("Float").unwrap();
        assert!(float.validate(SqlValue::Float(f64::NAN), None).is_err());
        assert_eq!(
            float.validate(SqlValue::Int(3), None).unwrap(),
            SqlValue::Float(3.0)
        );
        assert_eq!(
            float.validate(SqlValue::String("2.5".into()), None).unwrap(),
            SqlValue::Float(2.5)
        );
    }
}
