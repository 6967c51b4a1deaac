//! Legacy DATETIME and SMALLDATETIME.
//!
//! DATETIME is an `i32` day count since 1900-01-01 plus a `u32` count of
//! 1/300 second ticks since midnight. SMALLDATETIME is a `u16` day count plus
//! a `u16` minute count. Both are sent as DateTimeN.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tds_types::{SqlValue, TypeError};

use super::{DataType, TypeCodec, read_byte_len, write_byte_len};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::types::TypeId;
use crate::writer::ByteWriter;

/// `num_days_from_ce` of 1900-01-01.
const DAYS_TO_1900: i32 = 693_596;

const TICKS_PER_DAY: u64 = 300 * 86_400;
const MINUTES_PER_DAY: u64 = 1_440;
const NANOS_PER_SEC: u64 = 1_000_000_000;

pub(super) struct DateTimeCodec {
    width: u8,
}

pub(super) static DATE_TIME: DateTimeCodec = DateTimeCodec { width: 8 };
pub(super) static SMALL_DATE_TIME: DateTimeCodec = DateTimeCodec { width: 4 };

/// Nanoseconds since midnight; a leap second folds into the last second.
pub(super) fn nanos_of_day(time: NaiveTime) -> u64 {
    u64::from(time.num_seconds_from_midnight()) * NANOS_PER_SEC
        + u64::from(time.nanosecond().min(999_999_999))
}

/// Parse the textual date/time forms SQL Server accepts in ISO order.
pub(super) fn parse_datetime(ty: &DataType, s: &str) -> Result<NaiveDateTime, TypeError> {
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| TypeError::InvalidFormat {
            target_type: ty.name,
            value: s.to_string(),
        })
}

/// Coerce a value to a local date and time.
pub(super) fn to_naive_datetime(
    ty: &DataType,
    value: &SqlValue,
) -> Result<NaiveDateTime, TypeError> {
    match value {
        SqlValue::DateTime(v) => Ok(*v),
        SqlValue::Date(v) => Ok(v.and_time(NaiveTime::MIN)),
        SqlValue::DateTimeOffset(v) => Ok(v.naive_local()),
        SqlValue::String(s) => parse_datetime(ty, s),
        other => Err(TypeError::mismatch(ty.name, other.type_name())),
    }
}

impl DateTimeCodec {
    /// Split into the wire day count and time-of-day count, rounding the
    /// time to the type's precision.
    fn to_wire(&self, ty: &DataType, value: NaiveDateTime) -> Result<(i32, u32), TypeError> {
        let out_of_range = || TypeError::OutOfRange {
            target_type: ty.name,
        };
        let mut days = value
            .date()
            .num_days_from_ce()
            .checked_sub(DAYS_TO_1900)
            .ok_or_else(out_of_range)?;
        let nanos = nanos_of_day(value.time());

        let units = if self.width == 4 {
            let minutes = (nanos + 30 * NANOS_PER_SEC) / (60 * NANOS_PER_SEC);
            if minutes >= MINUTES_PER_DAY {
                days += 1;
                minutes - MINUTES_PER_DAY
            } else {
                minutes
            }
        } else {
            let ticks = (nanos * 300 + NANOS_PER_SEC / 2) / NANOS_PER_SEC;
            if ticks >= TICKS_PER_DAY {
                days += 1;
                ticks - TICKS_PER_DAY
            } else {
                ticks
            }
        };

        let (min_days, max_days) = if self.width == 4 {
            (0, i32::from(u16::MAX))
        } else {
            // 1753-01-01 ..= 9999-12-31
            (-53_690, 2_958_463)
        };
        if days < min_days || days > max_days {
            return Err(out_of_range());
        }

        Ok((days, units as u32))
    }
}

impl TypeCodec for DateTimeCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        if self.width == 4 { "smalldatetime" } else { "datetime" }.to_string()
    }

    fn type_info(
        &self,
        _ty: &DataType,
        _param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(TypeId::DateTimeN.as_u8());
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
            SqlValue::DateTime(v) => v,
            ref other => return Err(TypeError::mismatch(ty.name, other.type_name())),
        };

        let (days, units) = self.to_wire(ty, value)?;
        let mut buf = BytesMut::with_capacity(usize::from(self.width));
        if self.width == 4 {
            buf.put_u16_le(days as u16);
            buf.put_u16_le(units as u16);
        } else {
            buf.put_i32_le(days);
            buf.put_u32_le(units);
        }
        Ok(vec![buf.freeze()])
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
        let datetime = to_naive_datetime(ty, &value)?;
        self.to_wire(ty, datetime)?;
        Ok(SqlValue::DateTime(datetime))
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
        read_datetime(src, width)
    }
}

/// Read a DATETIME (8 bytes) or SMALLDATETIME (4 bytes) value.
pub(super) fn read_datetime(src: &mut ByteCursor, width: usize) -> Result<SqlValue, ProtocolError> {
    let (days, nanos) = match width {
        4 => {
            let days = i32::from(src.read_u16_le()?);
            let minutes = u64::from(src.read_u16_le()?);
            if minutes >= MINUTES_PER_DAY {
                return Err(invalid(format!("{minutes} minutes past midnight")));
            }
            (days, minutes * 60 * NANOS_PER_SEC)
        }
        8 => {
            let days = src.read_i32_le()?;
            let ticks = u64::from(src.read_u32_le()?);
            if ticks >= TICKS_PER_DAY {
                return Err(invalid(format!("{ticks} ticks past midnight")));
            }
            // Millisecond resolution, rounded.
            let millis = (ticks * 10 + 1) / 3;
            (days, millis * 1_000_000)
        }
        other => {
            return Err(ProtocolError::InvalidValue {
                field: "datetime length",
                value: other as u64,
            });
        }
    };

    let date = days
        .checked_add(DAYS_TO_1900)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| invalid(format!("day {days} since 1900-01-01")))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(
        (nanos / NANOS_PER_SEC) as u32,
        (nanos % NANOS_PER_SEC) as u32,
    )
    .ok_or_else(|| invalid(format!("{nanos} ns past midnight")))?;

    Ok(SqlValue::DateTime(date.and_time(time)))
}

fn invalid(detail: String) -> ProtocolError {
    ProtocolError::Type(TypeError::InvalidDateTime(detail))
}
