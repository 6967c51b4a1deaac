//! Money types.
//!
//! Values are fixed point with four decimal places. MONEY is an `i64` count
//! of 1/10000 units sent as two little-endian halves, high half first;
//! SMALLMONEY is an `i32` count.

use bytes::{BufMut, Bytes, BytesMut};
use rust_decimal::{Decimal, RoundingStrategy};
use tds_types::{SqlValue, TypeError};

use super::{DataType, TypeCodec, read_byte_len, write_byte_len};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::types::TypeId;
use crate::writer::ByteWriter;

const MONEY_SCALE: u32 = 4;

pub(super) struct MoneyCodec {
    width: u8,
}

pub(super) static MONEY: MoneyCodec = MoneyCodec { width: 8 };
pub(super) static SMALL_MONEY: MoneyCodec = MoneyCodec { width: 4 };

impl MoneyCodec {
    fn units(&self, ty: &DataType, value: Decimal) -> Result<i64, TypeError> {
        let out_of_range = || TypeError::OutOfRange {
            target_type: ty.name,
        };

        let mut scaled =
            value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        scaled.rescale(MONEY_SCALE);
        if scaled.scale() != MONEY_SCALE {
            return Err(out_of_range());
        }

        let units = scaled.mantissa();
        let (min, max) = if self.width == 4 {
            (i128::from(i32::MIN), i128::from(i32::MAX))
        } else {
            (i128::from(i64::MIN), i128::from(i64::MAX))
        };
        if units < min || units > max {
            return Err(out_of_range());
        }
        Ok(units as i64)
    }
}

impl TypeCodec for MoneyCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        if self.width == 4 { "smallmoney" } else { "money" }.to_string()
    }

    fn type_info(
        &self,
        _ty: &DataType,
        _param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(TypeId::MoneyN.as_u8());
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
        let value = match param.value {
            SqlValue::Null => return Ok(Vec::new()),
            SqlValue::Money(v) => v,
            ref other => return Err(TypeError::mismatch(ty.name, other.type_name())),
        };

        let units = self.units(ty, value)?;
        let mut buf = BytesMut::with_capacity(usize::from(self.width));
        if self.width == 4 {
            buf.put_i32_le(units as i32);
        } else {
            buf.put_i32_le((units >> 32) as i32);
            buf.put_u32_le(units as u32);
        }
        Ok(vec![buf.freeze()])
    }

    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        _collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        let decimal = match &value {
            SqlValue::Null => return Ok(SqlValue::Null),
            SqlValue::Real(_) | SqlValue::Float(_) => {
                let v = value.as_f64().unwrap_or(f64::NAN);
                Decimal::try_from(v).map_err(|_| TypeError::OutOfRange {
                    target_type: ty.name,
                })?
            }
            SqlValue::String(s) => s.trim().parse::<Decimal>().map_err(|_| {
                TypeError::InvalidFormat {
                    target_type: ty.name,
                    value: s.clone(),
                }
            })?,
            other => other
                .as_decimal()
                .ok_or_else(|| TypeError::mismatch(ty.name, other.type_name()))?,
        };

        let units = self.units(ty, decimal)?;
        Ok(SqlValue::Money(Decimal::new(units, MONEY_SCALE)))
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
        read_money(src, width)
    }
}

pub(super) fn read_money(src: &mut ByteCursor, width: usize) -> Result<SqlValue, ProtocolError> {
    let units = match width {
        4 => i64::from(src.read_i32_le()?),
        8 => {
            let high = src.read_i32_le()?;
            let low = src.read_u32_le()?;
            (i64::from(high) << 32) | i64::from(low)
        }
        other => {
            return Err(ProtocolError::InvalidValue {
                field: "money length",
                value: other as u64,
            });
        }
    };
    Ok(SqlValue::Money(Decimal::new(units, MONEY_SCALE)))
}
