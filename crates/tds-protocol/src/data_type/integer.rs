//! Integer and bit types.
//!
//! Parameters are always sent as the nullable IntN / BitN forms. Columns may
//! arrive either as the fixed form (no length prefix, `NOT NULL` columns) or
//! as the N form with a 1-byte length where zero means NULL.

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

pub(super) struct IntegerCodec {
    width: u8,
    declaration: &'static str,
}

pub(super) static TINY_INT: IntegerCodec = IntegerCodec {
    width: 1,
    declaration: "tinyint",
};
pub(super) static SMALL_INT: IntegerCodec = IntegerCodec {
    width: 2,
    declaration: "smallint",
};
pub(super) static INT: IntegerCodec = IntegerCodec {
    width: 4,
    declaration: "int",
};
pub(super) static BIG_INT: IntegerCodec = IntegerCodec {
    width: 8,
    declaration: "bigint",
};
pub(super) static INT_N: IntegerCodec = IntegerCodec {
    width: 8,
    declaration: "bigint",
};

pub(super) static BIT: BitCodec = BitCodec;

impl IntegerCodec {
    fn range(&self) -> (i64, i64) {
        match self.width {
            1 => (0, i64::from(u8::MAX)),
            2 => (i64::from(i16::MIN), i64::from(i16::MAX)),
            4 => (i64::from(i32::MIN), i64::from(i32::MAX)),
            _ => (i64::MIN, i64::MAX),
        }
    }

    fn canonical(&self, value: i64) -> SqlValue {
        match self.width {
            1 => SqlValue::TinyInt(value as u8),
            2 => SqlValue::SmallInt(value as i16),
            4 => SqlValue::Int(value as i32),
            _ => SqlValue::BigInt(value),
        }
    }
}

impl TypeCodec for IntegerCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        self.declaration.to_string()
    }

    fn type_info(
        &self,
        _ty: &DataType,
        _param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(TypeId::IntN.as_u8());
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
        let bytes = match &param.value {
            SqlValue::Null => return Ok(Vec::new()),
            SqlValue::TinyInt(v) => vec![*v],
            SqlValue::SmallInt(v) => v.to_le_bytes().to_vec(),
            SqlValue::Int(v) => v.to_le_bytes().to_vec(),
            SqlValue::BigInt(v) => v.to_le_bytes().to_vec(),
            other => return Err(TypeError::mismatch(ty.name, other.type_name())),
        };
        Ok(vec![Bytes::from(bytes)])
    }

    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        _collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        if value.is_null() {
            return Ok(SqlValue::Null);
        }

        let n = to_i64(ty, &value)?;
        let (min, max) = self.range();
        if n < min || n > max {
            return Err(TypeError::OutOfRange {
                target_type: ty.name,
            });
        }
        Ok(self.canonical(n))
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
        read_integer(src, width)
    }
}

/// Read a little-endian integer of the given width.
pub(super) fn read_integer(src: &mut ByteCursor, width: usize) -> Result<SqlValue, ProtocolError> {
    match width {
        1 => Ok(SqlValue::TinyInt(src.read_u8()?)),
        2 => Ok(SqlValue::SmallInt(src.read_i16_le()?)),
        4 => Ok(SqlValue::Int(src.read_i32_le()?)),
        8 => Ok(SqlValue::BigInt(src.read_i64_le()?)),
        other => Err(ProtocolError::InvalidValue {
            field: "integer length",
            value: other as u64,
        }),
    }
}

fn to_i64(ty: &DataType, value: &SqlValue) -> Result<i64, TypeError> {
    match value {
        SqlValue::Bool(v) => Ok(i64::from(*v)),
        SqlValue::Real(_) | SqlValue::Float(_) => {
            let v = value.as_f64().unwrap_or(f64::NAN);
            if !v.is_finite() || v.fract() != 0.0 {
                return Err(TypeError::InvalidFormat {
                    target_type: ty.name,
                    value: v.to_string(),
                });
            }
            if v < i64::MIN as f64 || v >= i64::MAX as f64 {
                return Err(TypeError::OutOfRange {
                    target_type: ty.name,
                });
            }
            Ok(v as i64)
        }
        SqlValue::String(s) => s.trim().parse().map_err(|_| TypeError::InvalidFormat {
            target_type: ty.name,
            value: s.clone(),
        }),
        other => other
            .as_i64()
            .ok_or_else(|| TypeError::mismatch(ty.name, other.type_name())),
    }
}

pub(super) struct BitCodec;

impl TypeCodec for BitCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        "bit".to_string()
    }

    fn type_info(
        &self,
        _ty: &DataType,
        _param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(TypeId::BitN.as_u8());
        dst.write_u8(1);
        Ok(())
    }

    fn parameter_length(
        &self,
        _ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        write_byte_len(param, 1, dst);
        Ok(())
    }

    fn parameter_data(&self, ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        match &param.value {
            SqlValue::Null => Ok(Vec::new()),
            SqlValue::Bool(v) => Ok(vec![Bytes::from(vec![u8::from(*v)])]),
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
            SqlValue::Bool(v) => Ok(SqlValue::Bool(v)),
            SqlValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(SqlValue::Bool(true)),
                "0" | "false" => Ok(SqlValue::Bool(false)),
                _ => Err(TypeError::InvalidFormat {
                    target_type: ty.name,
                    value: s,
                }),
            },
            other => match other.as_i64() {
                Some(n) => Ok(SqlValue::Bool(n != 0)),
                None => Err(TypeError::mismatch(ty.name, other.type_name())),
            },
        }
    }

    fn decode(
        &self,
        ty: &DataType,
        src: &mut ByteCursor,
        _column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        if !ty.fixed_length {
            match read_byte_len(src)? {
                None => return Ok(SqlValue::Null),
                Some(1) => {}
                Some(other) => {
                    return Err(ProtocolError::InvalidValue {
                        field: "bit length",
                        value: other as u64,
                    });
                }
            }
        }
        Ok(SqlValue::Bool(src.read_u8()? != 0))
    }
}
