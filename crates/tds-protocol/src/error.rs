//! Protocol-level error types.

use tds_types::TypeError;
use thiserror::Error;

/// Errors raised while decoding or encoding TDS wire data.
///
/// [`ProtocolError::Incomplete`] is the cursor's "insufficient data" signal.
/// The token parser consumes it internally (rewind and wait for more input)
/// and never surfaces it. Every other variant read from the server stream is
/// fatal for that stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Not enough bytes are buffered to complete the read.
    #[error("insufficient data: need {needed} bytes, have {available}")]
    Incomplete {
        /// Bytes required by the read.
        needed: usize,
        /// Bytes currently buffered past the read position.
        available: usize,
    },

    /// The input ended in the middle of a token.
    #[error("input ended with {pending} bytes of an incomplete token")]
    UnexpectedEof {
        /// Bytes left unconsumed.
        pending: usize,
    },

    /// Unknown token type byte.
    #[error("invalid token type: 0x{0:02X}")]
    InvalidTokenType(u8),

    /// A ROUTING environment change used a protocol other than TCP.
    #[error("invalid routing protocol: {0}")]
    InvalidRoutingProtocol(u8),

    /// A known-length PLP value did not match the sum of its chunks.
    #[error("PLP length mismatch: declared {declared} bytes, received {actual}")]
    PlpLengthMismatch {
        /// Length declared in the PLP header.
        declared: u64,
        /// Sum of the chunk lengths.
        actual: u64,
    },

    /// Unknown data type byte in TYPE_INFO.
    #[error("unknown data type: 0x{0:02X}")]
    UnknownDataType(u8),

    /// The collation does not resolve to a code page.
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

    /// A single-byte character column arrived without a collation.
    #[error("character data without collation")]
    MissingCollation,

    /// A row arrived before any column metadata.
    #[error("row token received before column metadata")]
    MissingColumnMetadata,

    /// A field holds a value the protocol does not allow.
    #[error("invalid {field}: {value}")]
    InvalidValue {
        /// Field that was being decoded.
        field: &'static str,
        /// The offending value.
        value: u64,
    },

    /// A LOGINACK named an interface other than SQL_DFLT / SQL_TSQL.
    #[error("unsupported interface: {0}")]
    UnsupportedInterface(u8),

    /// A LOGINACK acknowledged an unknown TDS version.
    #[error("unsupported TDS version: 0x{0:08X}")]
    UnsupportedTdsVersion(u32),

    /// Byte data could not be decoded as text.
    #[error("string encoding error: {0}")]
    StringEncoding(String),

    /// A decoded value could not be represented.
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl ProtocolError {
    /// Whether this is the recoverable "insufficient data" signal.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}
