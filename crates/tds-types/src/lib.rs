//! # tds-types
//!
//! Rust value model for data carried over the TDS protocol.
//!
//! This crate holds the in-memory side of the codec: the [`SqlValue`] enum
//! that every decoded column or return value turns into, the
//! [`TableValue`] shape used for table-valued parameters, and the
//! [`TypeError`] returned when a caller-supplied value cannot be coerced
//! into a SQL Server type.
//!
//! The wire formats themselves live in `tds-protocol`.
//!
//! ## Type Mappings
//!
//! | SQL Server Type | Rust Type |
//! |-----------------|-----------|
//! | `BIT` | `bool` |
//! | `TINYINT` | `u8` |
//! | `SMALLINT` | `i16` |
//! | `INT` | `i32` |
//! | `BIGINT` | `i64` |
//! | `REAL` | `f32` |
//! | `FLOAT` | `f64` |
//! | `DECIMAL`/`NUMERIC` | `rust_decimal::Decimal` |
//! | `MONEY`/`SMALLMONEY` | `rust_decimal::Decimal` |
//! | `CHAR`/`VARCHAR`/`NCHAR`/`NVARCHAR`/`TEXT`/`NTEXT` | `String` |
//! | `BINARY`/`VARBINARY`/`IMAGE`/`UDT` | `bytes::Bytes` |
//! | `DATE` | `chrono::NaiveDate` |
//! | `TIME` | `chrono::NaiveTime` |
//! | `DATETIME`/`SMALLDATETIME`/`DATETIME2` | `chrono::NaiveDateTime` |
//! | `DATETIMEOFFSET` | `chrono::DateTime<FixedOffset>` |
//! | `UNIQUEIDENTIFIER` | `uuid::Uuid` |
//! | `XML` | `String` |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod value;

pub use error::TypeError;
pub use value::{SqlValue, TableColumn, TableValue};
