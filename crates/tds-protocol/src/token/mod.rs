//! TDS token definitions and decoders.
//!
//! Tokens are the fundamental units of TDS response data. The server sends
//! a stream of tokens that describe metadata, rows, errors, and other information.
//!
//! ## Token Structure
//!
//! Each token begins with a 1-byte token type identifier, followed by
//! token-specific data. Some tokens have fixed lengths, while others
//! have length prefixes.
//!
//! Decoders read from a [`ByteCursor`] and may fail part-way with
//! [`ProtocolError::Incomplete`]. They never rewind themselves and never
//! touch parser state: the caller marks the token start and rewinds on an
//! incomplete read. Length-prefixed tokens are read in full before their
//! body is parsed, so a body that is shorter than its fields is reported as
//! malformed rather than incomplete.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tds_protocol::token::{DecodeContext, Token};
//!
//! let ctx = DecodeContext::new(TdsVersion::V7_4);
//! while let Some(token) = Token::decode(&mut cursor, &ctx)? {
//!     match token {
//!         Token::Done(done) => println!("rows affected: {:?}", done.row_count),
//!         Token::Error(err) => eprintln!("error {}: {}", err.number, err.message),
//!         _ => {}
//!     }
//! }
//! ```

mod done;
mod env_change;
mod login_ack;
mod message;
mod result;
mod return_value;
mod session;

pub use done::{Done, DoneStatus};
pub use env_change::{EnvChange, EnvChangeType, EnvChangeValue};
pub use login_ack::{LoginAck, TdsInterface};
pub use message::ServerMessage;
pub use result::{ColMetadata, Order, Row};
pub use return_value::{ReturnValue, ReturnValueStatus};
pub use session::{FeatureAck, FeatureExtAck, FedAuthInfo, SessionState, SspiToken};

use bytes::Bytes;

use crate::cursor::ByteCursor;
use crate::data_type::DataTypeRegistry;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::version::TdsVersion;

/// Token type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenType {
    /// Column metadata (COLMETADATA).
    ColMetadata = 0x81,
    /// Error message (ERROR).
    Error = 0xAA,
    /// Informational message (INFO).
    Info = 0xAB,
    /// Login acknowledgment (LOGINACK).
    LoginAck = 0xAD,
    /// Row data (ROW).
    Row = 0xD1,
    /// Null bitmap compressed row (NBCROW).
    NbcRow = 0xD2,
    /// Environment change (ENVCHANGE).
    EnvChange = 0xE3,
    /// SSPI authentication (SSPI).
    Sspi = 0xED,
    /// Done (DONE).
    Done = 0xFD,
    /// Done in procedure (DONEINPROC).
    DoneInProc = 0xFF,
    /// Done procedure (DONEPROC).
    DoneProc = 0xFE,
    /// Return status (RETURNSTATUS).
    ReturnStatus = 0x79,
    /// Return value (RETURNVALUE).
    ReturnValue = 0xAC,
    /// Order (ORDER).
    Order = 0xA9,
    /// Feature extension acknowledgment (FEATUREEXTACK).
    FeatureExtAck = 0xAE,
    /// Session state (SESSIONSTATE).
    SessionState = 0xE4,
    /// Federated authentication info (FEDAUTHINFO).
    FedAuthInfo = 0xEE,
}

impl TokenType {
    /// Create a token type from a raw byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x81 => Some(Self::ColMetadata),
            0xAA => Some(Self::Error),
            0xAB => Some(Self::Info),
            0xAD => Some(Self::LoginAck),
            0xD1 => Some(Self::Row),
            0xD2 => Some(Self::NbcRow),
            0xE3 => Some(Self::EnvChange),
            0xED => Some(Self::Sspi),
            0xFD => Some(Self::Done),
            0xFF => Some(Self::DoneInProc),
            0xFE => Some(Self::DoneProc),
            0x79 => Some(Self::ReturnStatus),
            0xAC => Some(Self::ReturnValue),
            0xA9 => Some(Self::Order),
            0xAE => Some(Self::FeatureExtAck),
            0xE4 => Some(Self::SessionState),
            0xEE => Some(Self::FedAuthInfo),
            _ => None,
        }
    }

    /// Token name as used in the protocol documentation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ColMetadata => "COLMETADATA",
            Self::Error => "ERROR",
            Self::Info => "INFO",
            Self::LoginAck => "LOGINACK",
            Self::Row => "ROW",
            Self::NbcRow => "NBCROW",
            Self::EnvChange => "ENVCHANGE",
            Self::Sspi => "SSPI",
            Self::Done => "DONE",
            Self::DoneInProc => "DONEINPROC",
            Self::DoneProc => "DONEPROC",
            Self::ReturnStatus => "RETURNSTATUS",
            Self::ReturnValue => "RETURNVALUE",
            Self::Order => "ORDER",
            Self::FeatureExtAck => "FEATUREEXTACK",
            Self::SessionState => "SESSIONSTATE",
            Self::FedAuthInfo => "FEDAUTHINFO",
        }
    }
}

/// Parsed TDS token.
///
/// This enum represents all tokens the parser yields. Each variant owns its
/// decoded data.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Column metadata describing the following rows.
    ColMetadata(ColMetadata),
    /// Row data.
    Row(Row),
    /// Null bitmap compressed row.
    NbcRow(Row),
    /// Completion of a SQL statement.
    Done(Done),
    /// Completion of a stored procedure.
    DoneProc(Done),
    /// Completion of a statement within a stored procedure.
    DoneInProc(Done),
    /// Environment change notification.
    EnvChange(EnvChange),
    /// Informational message from server.
    Info(ServerMessage),
    /// Error message from server.
    Error(ServerMessage),
    /// Login acknowledgment.
    LoginAck(LoginAck),
    /// Column ordering of the result set.
    Order(Order),
    /// Return status from stored procedure.
    ReturnStatus(i32),
    /// Output parameter or UDF return value.
    ReturnValue(ReturnValue),
    /// SSPI authentication data.
    Sspi(SspiToken),
    /// Feature extension acknowledgment.
    FeatureExtAck(FeatureExtAck),
    /// Federated authentication information.
    FedAuthInfo(FedAuthInfo),
    /// Session state.
    SessionState(SessionState),
}

impl Token {
    /// Get the token type.
    #[must_use]
    pub fn token_type(&self) -> TokenType {
        match self {
            Self::ColMetadata(_) => TokenType::ColMetadata,
            Self::Row(_) => TokenType::Row,
            Self::NbcRow(_) => TokenType::NbcRow,
            Self::Done(_) => TokenType::Done,
            Self::DoneProc(_) => TokenType::DoneProc,
            Self::DoneInProc(_) => TokenType::DoneInProc,
            Self::EnvChange(_) => TokenType::EnvChange,
            Self::Info(_) => TokenType::Info,
            Self::Error(_) => TokenType::Error,
            Self::LoginAck(_) => TokenType::LoginAck,
            Self::Order(_) => TokenType::Order,
            Self::ReturnStatus(_) => TokenType::ReturnStatus,
            Self::ReturnValue(_) => TokenType::ReturnValue,
            Self::Sspi(_) => TokenType::Sspi,
            Self::FeatureExtAck(_) => TokenType::FeatureExtAck,
            Self::FedAuthInfo(_) => TokenType::FedAuthInfo,
            Self::SessionState(_) => TokenType::SessionState,
        }
    }

    /// Decode the next token, type byte included.
    ///
    /// Returns `Ok(None)` if the token was consumed but produces nothing
    /// (an ENVCHANGE of a sub-type the codec does not interpret).
    pub fn decode(
        src: &mut ByteCursor,
        ctx: &DecodeContext<'_>,
    ) -> Result<Option<Self>, ProtocolError> {
        let byte = src.read_u8()?;
        let token_type = TokenType::from_u8(byte).ok_or(ProtocolError::InvalidTokenType(byte))?;
        decode_token(token_type, src, ctx)
    }
}

/// Everything a token decoder may need besides the bytes themselves.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    /// Negotiated TDS version.
    pub version: TdsVersion,
    /// Columns of the current result set, if metadata has been received.
    pub columns: Option<&'a [ColumnMetadata]>,
    /// Registry used to resolve TYPE_INFO.
    pub registry: &'static DataTypeRegistry,
}

impl DecodeContext<'static> {
    /// A context with no current result set and the standard registry.
    #[must_use]
    pub fn new(version: TdsVersion) -> Self {
        Self {
            version,
            columns: None,
            registry: DataTypeRegistry::standard(),
        }
    }
}

impl<'a> DecodeContext<'a> {
    /// Use `columns` as the current result set.
    #[must_use]
    pub fn with_columns(self, columns: &'a [ColumnMetadata]) -> DecodeContext<'a> {
        DecodeContext {
            version: self.version,
            columns: Some(columns),
            registry: self.registry,
        }
    }

    fn columns(&self) -> Result<&'a [ColumnMetadata], ProtocolError> {
        self.columns.ok_or(ProtocolError::MissingColumnMetadata)
    }
}

/// Decode the body of a token whose type byte has already been read.
pub fn decode_token(
    token_type: TokenType,
    src: &mut ByteCursor,
    ctx: &DecodeContext<'_>,
) -> Result<Option<Token>, ProtocolError> {
    let token = match token_type {
        TokenType::ColMetadata => Token::ColMetadata(ColMetadata::decode(src, ctx)?),
        TokenType::Row => Token::Row(Row::decode(src, ctx.columns()?)?),
        TokenType::NbcRow => Token::NbcRow(Row::decode_nbc(src, ctx.columns()?)?),
        TokenType::Done => Token::Done(Done::decode(src, ctx.version)?),
        TokenType::DoneProc => Token::DoneProc(Done::decode(src, ctx.version)?),
        TokenType::DoneInProc => Token::DoneInProc(Done::decode(src, ctx.version)?),
        TokenType::EnvChange => match EnvChange::decode(src)? {
            Some(change) => Token::EnvChange(change),
            None => return Ok(None),
        },
        TokenType::Info => Token::Info(ServerMessage::decode(src, ctx.version)?),
        TokenType::Error => Token::Error(ServerMessage::decode(src, ctx.version)?),
        TokenType::LoginAck => Token::LoginAck(LoginAck::decode(src)?),
        TokenType::Order => Token::Order(Order::decode(src)?),
        TokenType::ReturnStatus => Token::ReturnStatus(src.read_i32_le()?),
        TokenType::ReturnValue => Token::ReturnValue(ReturnValue::decode(src, ctx)?),
        TokenType::Sspi => Token::Sspi(SspiToken::decode(src)?),
        TokenType::FeatureExtAck => Token::FeatureExtAck(FeatureExtAck::decode(src)?),
        TokenType::FedAuthInfo => Token::FedAuthInfo(FedAuthInfo::decode(src)?),
        TokenType::SessionState => Token::SessionState(SessionState::decode(src)?),
    };
    Ok(Some(token))
}

/// Parse the body of a length-prefixed token.
///
/// The whole body is taken from `src` first. A read past the end of the body
/// means the length field lied, which is malformed data rather than a
/// reason to wait for more input.
pub(crate) fn with_body<T>(
    body: Bytes,
    field: &'static str,
    parse: impl FnOnce(&mut ByteCursor) -> Result<T, ProtocolError>,
) -> Result<T, ProtocolError> {
    let len = body.len();
    let mut cursor = ByteCursor::from(&body[..]);
    parse(&mut cursor).map_err(|err| {
        if err.is_incomplete() {
            ProtocolError::InvalidValue {
                field,
                value: len as u64,
            }
        } else {
            err
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_type_from_u8() {
        for byte in 0..=u8::MAX {
            if let Some(token_type) = TokenType::from_u8(byte) {
                assert_eq!(token_type as u8, byte);
            }
        }
        assert_eq!(TokenType::from_u8(0xFD), Some(TokenType::Done));
        assert_eq!(TokenType::from_u8(0x00), None);
    }

    #[test]
    fn test_decode_return_status() {
        let mut cursor = ByteCursor::from(&[0x79, 0xFF, 0xFF, 0xFF, 0xFF][..]);
        let token = Token::decode(&mut cursor, &DecodeContext::new(TdsVersion::V7_4))
            .unwrap()
            .unwrap();
        assert_eq!(token, Token::ReturnStatus(-1));
        assert_eq!(token.token_type().name(), "RETURNSTATUS");
    }

    #[test]
    fn test_invalid_token_type() {
        let mut cursor = ByteCursor::from(&[0x01][..]);
        assert!(matches!(
            Token::decode(&mut cursor, &DecodeContext::new(TdsVersion::V7_4)),
            Err(ProtocolError::InvalidTokenType(0x01))
        ));
    }

    #[test]
    fn test_row_without_metadata() {
        let mut cursor = ByteCursor::from(&[0xD1, 0x01][..]);
        assert!(matches!(
            Token::decode(&mut cursor, &DecodeContext::new(TdsVersion::V7_4)),
            Err(ProtocolError::MissingColumnMetadata)
        ));
    }

    #[test]
    fn test_short_body_is_malformed() {
        let err = with_body(Bytes::from_static(&[0x01]), "test body", |src| {
            src.read_u32_le()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidValue {
                field: "test body",
                value: 1
            }
        ));
    }
}
