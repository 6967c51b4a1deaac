//! Value validation error types.

use thiserror::Error;

/// Errors raised while coercing a value into a SQL Server type.
///
/// These are local to one parameter: they are reported to whoever builds the
/// request and never affect the token parser.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TypeError {
    /// Value is null when non-null was expected.
    #[error("unexpected null value")]
    UnexpectedNull,

    /// The value has the wrong shape for the target type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        actual: String,
    },

    /// Value is out of range for target type.
    #[error("value out of range for {target_type}")]
    OutOfRange {
        /// Target type name.
        target_type: &'static str,
    },

    /// A string could not be parsed as the target type.
    #[error("cannot parse {value:?} as {target_type}")]
    InvalidFormat {
        /// Target type name.
        target_type: &'static str,
        /// The rejected input.
        value: String,
    },

    /// Invalid date/time value.
    #[error("invalid date/time: {0}")]
    InvalidDateTime(String),

    /// Invalid decimal value.
    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),

    /// Invalid UUID value.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// A single-byte character type was used without a collation.
    #[error("no collation available to encode {type_name}")]
    MissingCollation {
        /// Type that needed the collation.
        type_name: &'static str,
    },

    /// The collation does not map to a known code page.
    #[error("collation (lcid {lcid:#07x}, sort id {sort_id}) has no known code page")]
    UnsupportedCollation {
        /// Locale id of the collation.
        lcid: u32,
        /// Sort id of the collation.
        sort_id: u8,
    },

    /// The code page is known but has no character encoding available.
    #[error("code page {code_page} has no supported encoding (sort id {sort_id})")]
    UnsupportedCodePage {
        /// Code page number.
        code_page: u16,
        /// Locale id of the collation.
        lcid: u32,
        /// Sort id of the collation.
        sort_id: u8,
    },

    /// Unsupported type conversion.
    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedConversion {
        /// Source type.
        from: String,
        /// Target type.
        to: &'static str,
    },

    /// A table-valued parameter cell failed validation.
    #[error("table-valued parameter row {row}, column {column}: {source}")]
    Tvp {
        /// Zero-based row index.
        row: usize,
        /// Zero-based column index.
        column: usize,
        /// The underlying validation failure.
        #[source]
        source: Box<TypeError>,
    },
}

impl TypeError {
    /// Shorthand for [`TypeError::TypeMismatch`].
    pub fn mismatch(expected: &'static str, actual: &str) -> Self {
        Self::TypeMismatch {
            expected,
            actual: actual.to_string(),
        }
    }

    /// Wrap this error with the table-valued parameter cell it came from.
    #[must_use]
    pub fn in_tvp_cell(self, row: usize, column: usize) -> Self {
        Self::Tvp {
            row,
            column,
            source: Box::new(self),
        }
    }
}
