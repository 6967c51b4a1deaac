//! DATE, TIME, DATETIME2 and DATETIMEOFFSET.
//!
//! Dates are a 3-byte day count since 0001-01-01. Times are a tick count in
//! units of 10^-scale seconds, stored in 3, 4 or 5 bytes depending on the
//! scale. DATETIMEOFFSET stores the UTC date and time followed by the offset
//! in minutes as an `i16`.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use tds_types::{SqlValue, TypeError};

use super::datetime::{nanos_of_day, parse_datetime, to_naive_datetime};
use super::{DataType, TypeCodec, read_byte_len};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::writer::ByteWriter;

/// Scale used when a parameter does not declare one.
pub const DEFAULT_SCALE: u8 = 7;

/// Largest fractional-second scale.
pub const MAX_SCALE: u8 = 7;

const MAX_OFFSET_MINUTES: i32 = 14 * 60;
const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Temporal {
    Date,
    Time,
    DateTime2,
    DateTimeOffset,
}

pub(super) struct TemporalCodec {
    kind: Temporal,
}

pub(super) static DATE: TemporalCodec = TemporalCodec {
    kind: Temporal::Date,
};
pub(super) static TIME: TemporalCodec = TemporalCodec {
    kind: Temporal::Time,
};
pub(super) static DATE_TIME2: TemporalCodec = TemporalCodec {
    kind: Temporal::DateTime2,
};
pub(super) static DATE_TIME_OFFSET: TemporalCodec = TemporalCodec {
    kind: Temporal::DateTimeOffset,
};

/// Bytes used by the time part at a scale.
pub(crate) fn time_length(scale: u8) -> u8 {
    match scale {
        0..=2 => 3,
        3..=4 => 4,
        _ => 5,
    }
}

fn ticks_per_second(scale: u8) -> u64 {
    10u64.pow(u32::from(scale.min(MAX_SCALE)))
}

fn out_of_range(ty: &DataType) -> TypeError {
    TypeError::OutOfRange {
        target_type: ty.name,
    }
}

/// Days since 0001-01-01, if the date is within 0001..=9999.
fn days_since_year_one(date: NaiveDate) -> Option<u32> {
    if (1..=9999).contains(&date.year()) {
        u32::try_from(date.num_days_from_ce() - 1).ok()
    } else {
        None
    }
}

impl Temporal {
    fn declaration(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime2 => "datetime2",
            Self::DateTimeOffset => "datetimeoffset",
        }
    }

    fn data_length(self, scale: u8) -> u8 {
        match self {
            Self::Date => 3,
            Self::Time => time_length(scale),
            Self::DateTime2 => time_length(scale) + 3,
            Self::DateTimeOffset => time_length(scale) + 5,
        }
    }
}

impl TemporalCodec {
    fn scale(&self, param: &Parameter) -> u8 {
        param.scale.unwrap_or(DEFAULT_SCALE)
    }

    /// Write `value` (already canonical for this kind) without a length prefix.
    fn write_value(
        &self,
        ty: &DataType,
        value: &SqlValue,
        scale: u8,
        dst: &mut BytesMut,
    ) -> Result<(), TypeError> {
        match (self.kind, value) {
            (Temporal::Date, SqlValue::Date(date)) => {
                let days = days_since_year_one(*date).ok_or_else(|| out_of_range(ty))?;
                dst.put_uint_le(u64::from(days), 3);
            }
            (Temporal::Time, SqlValue::Time(time)) => {
                let per_day = SECONDS_PER_DAY * ticks_per_second(scale);
                // Rounding up past midnight stays on the last tick of the day.
                let ticks = match time_ticks(*time, scale) {
                    (_, true) => per_day - 1,
                    (ticks, false) => ticks,
                };
                dst.put_uint_le(ticks, usize::from(time_length(scale)));
            }
            (Temporal::DateTime2, SqlValue::DateTime(datetime)) => {
                write_datetime2(ty, *datetime, scale, dst)?;
            }
            (Temporal::DateTimeOffset, SqlValue::DateTimeOffset(value)) => {
                write_datetime2(ty, value.naive_utc(), scale, dst)?;
                let offset = value.offset().local_minus_utc() / 60;
                dst.put_i16_le(offset as i16);
            }
            (_, other) => return Err(TypeError::mismatch(ty.name, other.type_name())),
        }
        Ok(())
    }
}

/// Ticks since midnight at `scale`, rounded, plus whether the rounding
/// carried into the next day.
fn time_ticks(time: NaiveTime, scale: u8) -> (u64, bool) {
    let unit = 10u64.pow(9 - u32::from(scale.min(MAX_SCALE)));
    let ticks = (nanos_of_day(time) + unit / 2) / unit;
    let per_day = SECONDS_PER_DAY * ticks_per_second(scale);
    if ticks >= per_day {
        (ticks - per_day, true)
    } else {
        (ticks, false)
    }
}

fn write_datetime2(
    ty: &DataType,
    value: NaiveDateTime,
    scale: u8,
    dst: &mut BytesMut,
) -> Result<(), TypeError> {
    let (ticks, carry) = time_ticks(value.time(), scale);
    let date = if carry {
        value.date().succ_opt().ok_or_else(|| out_of_range(ty))?
    } else {
        value.date()
    };
    let days = days_since_year_one(date).ok_or_else(|| out_of_range(ty))?;

    dst.put_uint_le(ticks, usize::from(time_length(scale)));
    dst.put_uint_le(u64::from(days), 3);
    Ok(())
}

fn parse_time(ty: &DataType, s: &str) -> Result<NaiveTime, TypeError> {
    let s = s.trim();
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(s, format).ok())
        .map_or_else(|| parse_datetime(ty, s).map(|v| v.time()), Ok)
}

fn utc(value: NaiveDateTime) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&value).into()
}

fn parse_datetime_offset(ty: &DataType, s: &str) -> Result<DateTime<FixedOffset>, TypeError> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f %:z"))
        .or_else(|_| parse_datetime(ty, s).map(utc))
        .map_err(|_| TypeError::InvalidFormat {
            target_type: ty.name,
            value: s.to_string(),
        })
}

impl TypeCodec for TemporalCodec {
    fn declare(&self, _ty: &DataType, param: &Parameter) -> String {
        match self.kind {
            Temporal::Date => self.kind.declaration().to_string(),
            kind => format!("{}({})", kind.declaration(), self.scale(param)),
        }
    }

    fn resolve(&self, ty: &DataType, param: &mut Parameter) -> Result<(), TypeError> {
        if self.kind == Temporal::Date {
            return Ok(());
        }
        let scale = self.scale(param);
        if scale > MAX_SCALE {
            return Err(out_of_range(ty));
        }
        param.scale = Some(scale);
        Ok(())
    }

    fn type_info(
        &self,
        ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(ty.id.as_u8());
        if self.kind != Temporal::Date {
            dst.write_u8(self.scale(param));
        }
        Ok(())
    }

    fn parameter_length(
        &self,
        _ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        if param.value.is_null() {
            dst.write_u8(0);
        } else {
            dst.write_u8(self.kind.data_length(self.scale(param)));
        }
        Ok(())
    }

    fn parameter_data(&self, ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        if param.value.is_null() {
            return Ok(Vec::new());
        }
        let scale = self.scale(param);
        let mut buf = BytesMut::with_capacity(usize::from(self.kind.data_length(scale)));
        self.write_value(ty, &param.value, scale, &mut buf)?;
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

        let canonical = match self.kind {
            Temporal::Date => {
                let date = match &value {
                    SqlValue::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                        .or_else(|_| parse_datetime(ty, s).map(|v| v.date()))?,
                    other => to_naive_datetime(ty, other)?.date(),
                };
                days_since_year_one(date).ok_or_else(|| out_of_range(ty))?;
                SqlValue::Date(date)
            }
            Temporal::Time => match &value {
                SqlValue::Time(time) => SqlValue::Time(*time),
                SqlValue::String(s) => SqlValue::Time(parse_time(ty, s)?),
                SqlValue::DateTime(v) => SqlValue::Time(v.time()),
                SqlValue::DateTimeOffset(v) => SqlValue::Time(v.time()),
                other => return Err(TypeError::mismatch(ty.name, other.type_name())),
            },
            Temporal::DateTime2 => {
                let datetime = to_naive_datetime(ty, &value)?;
                days_since_year_one(datetime.date()).ok_or_else(|| out_of_range(ty))?;
                SqlValue::DateTime(datetime)
            }
            Temporal::DateTimeOffset => {
                let value = match &value {
                    SqlValue::DateTimeOffset(v) => *v,
                    SqlValue::String(s) => parse_datetime_offset(ty, s)?,
                    other => utc(to_naive_datetime(ty, other)?),
                };
                let offset = value.offset().local_minus_utc();
                if offset % 60 != 0 || (offset / 60).abs() > MAX_OFFSET_MINUTES {
                    return Err(out_of_range(ty));
                }
                days_since_year_one(value.naive_utc().date()).ok_or_else(|| out_of_range(ty))?;
                SqlValue::DateTimeOffset(value)
            }
        };
        Ok(canonical)
    }

    fn decode(
        &self,
        _ty: &DataType,
        src: &mut ByteCursor,
        column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        let Some(len) = read_byte_len(src)? else {
            return Ok(SqlValue::Null);
        };

        let scale = column.scale.unwrap_or(DEFAULT_SCALE);
        let expected = usize::from(self.kind.data_length(scale));
        if len != expected {
            return Err(ProtocolError::InvalidValue {
                field: "date/time length",
                value: len as u64,
            });
        }
        read_temporal(self.kind, src, scale)
    }
}

/// Read a date/time value of `kind` at `scale`, without a length prefix.
pub(super) fn read_temporal(
    kind: Temporal,
    src: &mut ByteCursor,
    scale: u8,
) -> Result<SqlValue, ProtocolError> {
    match kind {
        Temporal::Date => Ok(SqlValue::Date(read_date(src)?)),
        Temporal::Time => Ok(SqlValue::Time(read_time(src, scale)?)),
        Temporal::DateTime2 => {
            let time = read_time(src, scale)?;
            let date = read_date(src)?;
            Ok(SqlValue::DateTime(date.and_time(time)))
        }
        Temporal::DateTimeOffset => {
            let time = read_time(src, scale)?;
            let date = read_date(src)?;
            let minutes = src.read_i16_le()?;
            let offset = FixedOffset::east_opt(i32::from(minutes) * 60).ok_or(
                ProtocolError::InvalidValue {
                    field: "datetimeoffset offset",
                    value: u64::from(minutes as u16),
                },
            )?;
            Ok(SqlValue::DateTimeOffset(
                offset.from_utc_datetime(&date.and_time(time)),
            ))
        }
    }
}

fn read_date(src: &mut ByteCursor) -> Result<NaiveDate, ProtocolError> {
    let days = src.read_u24_le()?;
    i32::try_from(days)
        .ok()
        .and_then(|days| days.checked_add(1))
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| invalid(format!("day {days} since 0001-01-01")))
}

fn read_time(src: &mut ByteCursor, scale: u8) -> Result<NaiveTime, ProtocolError> {
    if scale > MAX_SCALE {
        return Err(ProtocolError::InvalidValue {
            field: "time scale",
            value: u64::from(scale),
        });
    }

    let ticks = match time_length(scale) {
        3 => u64::from(src.read_u24_le()?),
        4 => u64::from(src.read_u32_le()?),
        _ => src.read_u40_le()?,
    };
    let per_second = ticks_per_second(scale);
    let seconds = ticks / per_second;
    let nanos = (ticks % per_second) * 10u64.pow(9 - u32::from(scale));

    u32::try_from(seconds)
        .ok()
        .and_then(|seconds| NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos as u32))
        .ok_or_else(|| invalid(format!("{ticks} ticks at scale {scale}")))
}

fn invalid(detail: String) -> ProtocolError {
    ProtocolError::Type(TypeError::InvalidDateTime(detail))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::data_type::DataTypeRegistry;

    fn encode(param: &Parameter) -> Vec<u8> {
        let ty = param.data_type();
        let mut w = ByteWriter::new();
        ty.type_info(param, &mut w).unwrap();
        ty.parameter_length(param, &mut w).unwrap();
        for chunk in ty.parameter_data(param).unwrap() {
            w.write_bytes(&chunk);
        }
        w.as_slice().to_vec()
    }

    fn scaled(type_name: &str, value: impl Into<SqlValue>, scale: u8) -> Parameter {
        let ty = DataTypeRegistry::standard().by_name(type_name).unwrap();
        Parameter::builder("@t", ty)
            .value(value)
            .scale(scale)
            .build()
            .unwrap()
    }

    #[test]
    fn test_time_length_by_scale() {
        assert_eq!(time_length(0), 3);
        assert_eq!(time_length(2), 3);
        assert_eq!(time_length(3), 4);
        assert_eq!(time_length(4), 4);
        assert_eq!(time_length(5), 5);
        assert_eq!(time_length(7), 5);
    }

    #[test]
    fn test_date_encoding() {
        let date = NaiveDate::from_ymd_opt(1, 1, 2).unwrap();
        let param = Parameter::typed("@d", "Date", date).unwrap();
        assert_eq!(encode(&param), [0x28, 0x03, 0x01, 0x00, 0x00]);
        assert_eq!(param.data_type().declare(&param), "date");
    }

    #[test]
    fn test_time_encoding_at_scale() {
        let time = NaiveTime::from_hms_milli_opt(0, 0, 1, 500).unwrap();
        let param = scaled("Time", time, 1);
        // 15 ticks of 0.1 s
        assert_eq!(encode(&param), [0x29, 0x01, 0x03, 0x0F, 0x00, 0x00]);
        assert_eq!(param.data_type().declare(&param), "time(1)");
    }

    #[test]
    fn test_default_scale() {
        let time = NaiveTime::from_hms_opt(0, 0, 1).unwrap();
        let param = Parameter::typed("@t", "Time", time).unwrap();
        assert_eq!(param.scale(), Some(7));
        assert_eq!(param.data_type().declare(&param), "time(7)");
        // 10^7 ticks in 5 bytes
        assert_eq!(
            encode(&param),
            [0x29, 0x07, 0x05, 0x80, 0x96, 0x98, 0x00, 0x00]
        );
    }

    #[test]
    fn test_scale_above_seven_is_rejected() {
        let ty = DataTypeRegistry::standard().by_name("DateTime2").unwrap();
        let result = Parameter::builder("@t", ty)
            .value(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .scale(8)
            .build();
        assert!(matches!(result, Err(TypeError::OutOfRange { .. })));
    }

    #[test]
    fn test_datetime2_carries_into_next_day() {
        let value = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap();
        let param = scaled("DateTime2", value, 0);
        let data = param.data_type().parameter_data(&param).unwrap();

        let mut cursor = ByteCursor::from(&data[0][..]);
        assert_eq!(
            read_temporal(Temporal::DateTime2, &mut cursor, 0).unwrap(),
            SqlValue::DateTime(
                NaiveDate::from_ymd_opt(2020, 1, 2)
                    .unwrap()
                    .and_time(NaiveTime::MIN)
            )
        );
    }

    #[test]
    fn test_datetimeoffset_stores_utc() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 6, 1)
                    .unwrap()
                    .and_hms_opt(1, 0, 0)
                    .unwrap(),
            )
            .unwrap();
        let param = scaled("DateTimeOffset", local, 0);
        let data = param.data_type().parameter_data(&param).unwrap();
        let bytes = &data[0][..];
        assert_eq!(bytes.len(), 8);
        // 23:00:00 UTC, previous day
        assert_eq!(&bytes[..3], &82_800u32.to_le_bytes()[..3]);
        assert_eq!(&bytes[6..], &120i16.to_le_bytes());

        let mut cursor = ByteCursor::from(bytes);
        assert_eq!(
            read_temporal(Temporal::DateTimeOffset, &mut cursor, 0).unwrap(),
            SqlValue::DateTimeOffset(local)
        );
    }

    #[test]
    fn test_offset_range() {
        let dto = DataTypeRegistry::standard()
            .by_name("DateTimeOffset")
            .unwrap();
        let far = FixedOffset::east_opt(15 * 3600).unwrap();
        let value = far.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_time(NaiveTime::MIN),
        );
        assert!(dto.validate(SqlValue::DateTimeOffset(value), None).is_err());
    }

    #[test]
    fn test_string_coercion() {
        let registry = DataTypeRegistry::standard();
        assert_eq!(
            registry
                .by_name("Date")
                .unwrap()
                .validate(SqlValue::String("2024-02-29".into()), None)
                .unwrap(),
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(
            registry
                .by_name("Time")
                .unwrap()
                .validate(SqlValue::String("12:30:15.25".into()), None)
                .unwrap(),
            SqlValue::Time(NaiveTime::from_hms_milli_opt(12, 30, 15, 250).unwrap())
        );
        let dto = registry
            .by_name("DateTimeOffset")
            .unwrap()
            .validate(SqlValue::String("2024-01-01T10:00:00+05:30".into()), None)
            .unwrap();
        assert!(matches!(
            dto,
            SqlValue::DateTimeOffset(v) if v.offset().local_minus_utc() == 19_800
        ));
    }

    #[test]
    fn test_null_encoding() {
        let param = Parameter::typed("@t", "DateTime2", SqlValue::Null).unwrap();
        assert_eq!(encode(&param), [0x2A, 0x07, 0x00]);
    }
}
