//! Decimal and numeric types.
//!
//! The value is a sign byte (1 = non-negative) followed by the unsigned
//! magnitude at the declared scale, little-endian, in 4, 8, 12 or 16 bytes
//! depending on the precision.

use bytes::{BufMut, Bytes, BytesMut};
use rust_decimal::Decimal;
use tds_types::{SqlValue, TypeError};

use super::{DataType, TypeCodec, read_byte_len, write_byte_len};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::types::TypeId;
use crate::writer::ByteWriter;

/// Precision used when a parameter does not declare one.
pub const DEFAULT_PRECISION: u8 = 18;

/// Largest precision SQL Server supports.
pub const MAX_PRECISION: u8 = 38;

pub(super) struct DecimalCodec {
    declaration: &'static str,
    wire_id: TypeId,
}

pub(super) static DECIMAL: DecimalCodec = DecimalCodec {
    declaration: "decimal",
    wire_id: TypeId::DecimalN,
};
pub(super) static NUMERIC: DecimalCodec = DecimalCodec {
    declaration: "numeric",
    wire_id: TypeId::NumericN,
};

/// Data length (sign byte included) for a precision.
pub(crate) fn data_length(precision: u8) -> u8 {
    match precision {
        0..=9 => 5,
        10..=19 => 9,
        20..=28 => 13,
        _ => 17,
    }
}

/// Magnitude of `mantissa / 10^current` at `scale`, rounded half away
/// from zero.
fn magnitude(mantissa: i128, current: u32, scale: u8) -> Option<u128> {
    let mantissa = mantissa.unsigned_abs();
    let target = u32::from(scale);

    if target >= current {
        10u128
            .checked_pow(target - current)
            .and_then(|factor| mantissa.checked_mul(factor))
    } else {
        let divisor = 10u128.checked_pow(current - target)?;
        let (quotient, remainder) = (mantissa / divisor, mantissa % divisor);
        Some(if remainder >= divisor - remainder {
            quotient + 1
        } else {
            quotient
        })
    }
}

/// Mantissa and scale of a validated decimal value.
fn numeric_parts(value: &SqlValue) -> Option<(i128, u32)> {
    match value {
        SqlValue::Decimal(_) | SqlValue::Numeric { .. } => value.as_numeric(),
        _ => None,
    }
}

fn precision_and_scale(param: &Parameter) -> (u8, u8) {
    (
        param.precision.unwrap_or(DEFAULT_PRECISION),
        param.scale.unwrap_or(0),
    )
}

impl TypeCodec for DecimalCodec {
    fn declare(&self, _ty: &DataType, param: &Parameter) -> String {
        let (precision, scale) = precision_and_scale(param);
        format!("{}({}, {})", self.declaration, precision, scale)
    }

    fn resolve(&self, ty: &DataType, param: &mut Parameter) -> Result<(), TypeError> {
        let (precision, scale) = precision_and_scale(param);
        if precision == 0 || precision > MAX_PRECISION || scale > precision {
            return Err(TypeError::OutOfRange {
                target_type: ty.name,
            });
        }
        param.precision = Some(precision);
        param.scale = Some(scale);

        if let Some((mantissa, current)) = numeric_parts(&param.value) {
            let fits = magnitude(mantissa, current, scale)
                .zip(10u128.checked_pow(u32::from(precision)))
                .is_some_and(|(m, limit)| m < limit);
            if !fits {
                return Err(TypeError::OutOfRange {
                    target_type: ty.name,
                });
            }
        }
        Ok(())
    }

    fn type_info(
        &self,
        _ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        let (precision, scale) = precision_and_scale(param);
        dst.write_u8(self.wire_id.as_u8());
        dst.write_u8(data_length(precision));
        dst.write_u8(precision);
        dst.write_u8(scale);
        Ok(())
    }

    fn parameter_length(
        &self,
        _ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        let (precision, _) = precision_and_scale(param);
        write_byte_len(param, data_length(precision), dst);
        Ok(())
    }

    fn parameter_data(&self, ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        if param.value.is_null() {
            return Ok(Vec::new());
        }
        let (mantissa, current) = numeric_parts(&param.value)
            .ok_or_else(|| TypeError::mismatch(ty.name, param.value.type_name()))?;

        let (precision, scale) = precision_and_scale(param);
        let magnitude = magnitude(mantissa, current, scale).ok_or(TypeError::OutOfRange {
            target_type: ty.name,
        })?;
        let width = usize::from(data_length(precision)) - 1;

        let mut buf = BytesMut::with_capacity(width + 1);
        buf.put_u8(u8::from(mantissa >= 0 || magnitude == 0));
        buf.put_slice(&magnitude.to_le_bytes()[..width]);
        Ok(vec![buf.freeze()])
    }

    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        _collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        let decimal = match &value {
            SqlValue::Null | SqlValue::Numeric { .. } => return Ok(value),
            SqlValue::Real(_) | SqlValue::Float(_) => {
                let v = value.as_f64().unwrap_or(f64::NAN);
                Decimal::try_from(v).map_err(|e| TypeError::InvalidDecimal(e.to_string()))?
            }
            SqlValue::String(s) => s
                .trim()
                .parse::<Decimal>()
                .map_err(|e| TypeError::InvalidDecimal(format!("{s:?}: {e}")))?,
            other => other
                .as_decimal()
                .ok_or_else(|| TypeError::mismatch(ty.name, other.type_name()))?,
        };
        Ok(SqlValue::Decimal(decimal))
    }

    fn decode(
        &self,
        _ty: &DataType,
        src: &mut ByteCursor,
        column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        match read_byte_len(src)? {
            None => Ok(SqlValue::Null),
            Some(len) => read_decimal(src, len, column.scale.unwrap_or(0)),
        }
    }
}

/// Read a sign byte plus `len - 1` bytes of magnitude.
pub(super) fn read_decimal(
    src: &mut ByteCursor,
    len: usize,
    scale: u8,
) -> Result<SqlValue, ProtocolError> {
    if !(2..=17).contains(&len) {
        return Err(ProtocolError::InvalidValue {
            field: "decimal length",
            value: len as u64,
        });
    }

    let positive = src.read_u8()? == 1;
    let mut magnitude = [0u8; 16];
    magnitude[..len - 1].copy_from_slice(&src.read_bytes(len - 1)?);
    let magnitude = u128::from_le_bytes(magnitude);

    let mantissa = i128::try_from(magnitude)
        .map_err(|_| TypeError::InvalidDecimal("magnitude exceeds 127 bits".to_string()))?;
    let mantissa = if positive { mantissa } else { -mantissa };

    // Beyond 96 bits or scale 28 the raw mantissa is kept.
    Ok(
        match Decimal::try_from_i128_with_scale(mantissa, u32::from(scale)) {
            Ok(value) => SqlValue::Decimal(value),
            Err(_) => SqlValue::Numeric { mantissa, scale },
        },
    )
}
