//! SQL value representation.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

/// A SQL value that can represent any SQL Server data type.
///
/// Decoded column values, return values and outbound parameter values all
/// use this representation. `Null` is distinct from every non-null value,
/// including empty strings and zero-length binaries.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    /// NULL value.
    #[default]
    Null,
    /// Boolean value (BIT).
    Bool(bool),
    /// 8-bit unsigned integer (TINYINT).
    TinyInt(u8),
    /// 16-bit signed integer (SMALLINT).
    SmallInt(i16),
    /// 32-bit signed integer (INT).
    Int(i32),
    /// 64-bit signed integer (BIGINT).
    BigInt(i64),
    /// 32-bit floating point (REAL).
    Real(f32),
    /// 64-bit floating point (FLOAT).
    Float(f64),
    /// Exact numeric (DECIMAL, NUMERIC).
    Decimal(Decimal),
    /// Exact numeric outside [`Decimal`]'s range, as a raw mantissa and scale.
    ///
    /// Precision 29 through 38 columns can hold magnitudes above 2^96 or
    /// scales above 28. The value is `mantissa / 10^scale`.
    Numeric {
        /// Signed unscaled value.
        mantissa: i128,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Currency amount with four decimal places (MONEY, SMALLMONEY).
    Money(Decimal),
    /// String value (CHAR, VARCHAR, NCHAR, NVARCHAR, TEXT, NTEXT).
    String(String),
    /// Binary value (BINARY, VARBINARY, IMAGE, UDT).
    Binary(Bytes),
    /// UUID value (UNIQUEIDENTIFIER).
    Uuid(Uuid),
    /// Date value (DATE).
    Date(NaiveDate),
    /// Time value (TIME).
    Time(NaiveTime),
    /// Date and time without offset (DATETIME, SMALLDATETIME, DATETIME2).
    DateTime(NaiveDateTime),
    /// Date and time with offset (DATETIMEOFFSET).
    DateTimeOffset(DateTime<FixedOffset>),
    /// XML value (XML type).
    Xml(String),
    /// Table-valued parameter payload.
    Table(Box<TableValue>),
}

impl SqlValue {
    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as a bool, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get any exact integer value widened to `i64`.
    ///
    /// Decimals and money qualify when they carry no fractional part.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::TinyInt(v) => Some(i64::from(*v)),
            Self::SmallInt(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(i64::from(*v)),
            Self::BigInt(v) => Some(*v),
            Self::Decimal(v) | Self::Money(v) if v.fract().is_zero() => v.to_i64(),
            Self::Numeric { mantissa, scale } => {
                let factor = 10i128.checked_pow(u32::from(*scale))?;
                if mantissa % factor == 0 {
                    i64::try_from(mantissa / factor).ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Get any numeric value as an `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(f64::from(*v)),
            Self::Float(v) => Some(*v),
            Self::Decimal(v) | Self::Money(v) => v.to_f64(),
            Self::Numeric { mantissa, scale } => {
                Some(*mantissa as f64 / 10f64.powi(i32::from(*scale)))
            }
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Get any exact numeric value as a [`Decimal`].
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(v) | Self::Money(v) => Some(*v),
            Self::TinyInt(v) => Some(Decimal::from(*v)),
            Self::SmallInt(v) => Some(Decimal::from(*v)),
            Self::Int(v) => Some(Decimal::from(*v)),
            Self::BigInt(v) => Some(Decimal::from(*v)),
            Self::Numeric { mantissa, scale } => {
                Decimal::try_from_i128_with_scale(*mantissa, u32::from(*scale)).ok()
            }
            _ => None,
        }
    }

    /// Get any exact numeric value as an unscaled mantissa and its scale.
    ///
    /// Unlike [`as_decimal`](Self::as_decimal) this covers the full
    /// 38-digit range.
    #[must_use]
    pub fn as_numeric(&self) -> Option<(i128, u32)> {
        match self {
            Self::Numeric { mantissa, scale } => Some((*mantissa, u32::from(*scale))),
            other => other.as_decimal().map(|v| (v.mantissa(), v.scale())),
        }
    }

    /// Get the value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::Xml(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as bytes, if it is binary.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(v) => Some(v),
            _ => None,
        }
    }

    /// Get the table payload, if this is a table-valued parameter.
    #[must_use]
    pub fn as_table(&self) -> Option<&TableValue> {
        match self {
            Self::Table(v) => Some(v),
            _ => None,
        }
    }

    /// Get the type name as a string.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BIT",
            Self::TinyInt(_) => "TINYINT",
            Self::SmallInt(_) => "SMALLINT",
            Self::Int(_) => "INT",
            Self::BigInt(_) => "BIGINT",
            Self::Real(_) => "REAL",
            Self::Float(_) => "FLOAT",
            Self::Decimal(_) | Self::Numeric { .. } => "DECIMAL",
            Self::Money(_) => "MONEY",
            Self::String(_) => "NVARCHAR",
            Self::Binary(_) => "VARBINARY",
            Self::Uuid(_) => "UNIQUEIDENTIFIER",
            Self::Date(_) => "DATE",
            Self::Time(_) => "TIME",
            Self::DateTime(_) => "DATETIME2",
            Self::DateTimeOffset(_) => "DATETIMEOFFSET",
            Self::Xml(_) => "XML",
            Self::Table(_) => "TABLE",
        }
    }
}

/// Column definition of a table-valued parameter.
///
/// `type_name` names a registered data type (`"Int"`, `"NVarChar"`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    /// Column name.
    pub name: String,
    /// Registered data type name.
    pub type_name: String,
    /// Declared length, for sized types.
    pub length: Option<u32>,
    /// Declared precision, for decimal types.
    pub precision: Option<u8>,
    /// Declared scale, for decimal and time types.
    pub scale: Option<u8>,
}

impl TableColumn {
    /// Create a column with the given name and registered type name.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            length: None,
            precision: None,
            scale: None,
        }
    }

    /// Set the declared length.
    #[must_use]
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Set the declared precision and scale.
    #[must_use]
    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Set the declared scale.
    #[must_use]
    pub fn with_scale(mut self, scale: u8) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// A table-valued parameter: a user-defined table type plus its rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableValue {
    /// Schema owning the table type (empty for the default schema).
    pub schema: String,
    /// Name of the table type.
    pub type_name: String,
    /// Column definitions.
    pub columns: Vec<TableColumn>,
    /// Row values, one entry per column in each row.
    pub rows: Vec<Vec<SqlValue>>,
}

impl TableValue {
    /// Create an empty table value for the given type.
    pub fn new(schema: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            type_name: type_name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Append a column definition.
    #[must_use]
    pub fn column(mut self, column: TableColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Append a row.
    #[must_use]
    pub fn row(mut self, values: Vec<SqlValue>) -> Self {
        self.rows.push(values);
        self
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for SqlValue {
    fn from(v: u8) -> Self {
        Self::TinyInt(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        Self::SmallInt(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        Self::Real(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(v))
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        Self::Binary(Bytes::copy_from_slice(v))
    }
}

impl From<Bytes> for SqlValue {
    fn from(v: Bytes) -> Self {
        Self::Binary(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for SqlValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Self::DateTimeOffset(v)
    }
}

impl From<TableValue> for SqlValue {
    fn from(v: TableValue) -> Self {
        Self::Table(Box::new(v))
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}
