//! Incremental token stream parser.
//!
//! The server's response arrives as arbitrarily sized chunks. The parser
//! buffers them in a [`ByteCursor`] and decodes one token at a time. When a
//! decoder runs out of bytes the cursor is rewound to the token's type byte
//! and the parser suspends until more input is fed; the partially decoded
//! token is discarded and decoded again from the start. The sequence of
//! tokens produced is therefore the same however the input is split.
//!
//! | State | Leaves on | To |
//! |-------|-----------|----|
//! | `AwaitingType` | type byte read | `Decoding` |
//! | `AwaitingType` | no byte buffered | `Suspended` |
//! | `Decoding` | token decoded | `AwaitingType` |
//! | `Decoding` | insufficient data (rewound) | `Suspended` |
//! | `Suspended` | [`feed`](TokenStreamParser::feed) | `AwaitingType` |
//! | any | unknown type byte or malformed token | `Error` |
//!
//! [`TokenStreamParser::finish`] moves to `Done` when no partial token is
//! pending.

use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::cursor::ByteCursor;
use crate::data_type::DataTypeRegistry;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::token::{DecodeContext, Token, TokenType, decode_token};
use crate::version::TdsVersion;

/// Parser configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// TDS version assumed until a LOGINACK says otherwise.
    pub tds_version: TdsVersion,
}

impl ParserConfig {
    /// Default configuration (TDS 7.4).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial TDS version.
    #[must_use]
    pub fn with_tds_version(mut self, version: TdsVersion) -> Self {
        self.tds_version = version;
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            tds_version: TdsVersion::V7_4,
        }
    }
}

/// Parser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Ready to read the next token type byte.
    AwaitingType,
    /// Running the decoder of a token.
    Decoding(TokenType),
    /// Waiting for more input.
    Suspended,
    /// Input finished cleanly.
    Done,
    /// Malformed input; no further tokens are produced.
    Error,
}

/// Push-driven token stream parser.
///
/// ```rust,ignore
/// let mut parser = TokenStreamParser::new(ParserConfig::default());
/// for chunk in chunks {
///     parser.feed(&chunk);
///     while let Some(token) = parser.next_token()? {
///         handle(token);
///     }
/// }
/// parser.finish()?;
/// ```
#[derive(Debug)]
pub struct TokenStreamParser {
    cursor: ByteCursor,
    version: TdsVersion,
    registry: &'static DataTypeRegistry,
    columns: Option<Arc<[ColumnMetadata]>>,
    state: ParserState,
}

impl TokenStreamParser {
    /// Create a parser using the standard data type registry.
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        Self::with_registry(config, DataTypeRegistry::standard())
    }

    /// Create a parser resolving TYPE_INFO through `registry`.
    #[must_use]
    pub fn with_registry(config: ParserConfig, registry: &'static DataTypeRegistry) -> Self {
        Self {
            cursor: ByteCursor::new(),
            version: config.tds_version,
            registry,
            columns: None,
            state: ParserState::AwaitingType,
        }
    }

    /// Append a chunk of input.
    ///
    /// Input fed after [`finish`](Self::finish) or after a decode error is
    /// ignored.
    pub fn feed(&mut self, chunk: &[u8]) {
        match self.state {
            ParserState::Done | ParserState::Error => {
                warn!(
                    len = chunk.len(),
                    state = ?self.state,
                    "ignoring input fed to a terminated parser"
                );
                return;
            }
            ParserState::Suspended => {
                debug!(
                    len = chunk.len(),
                    buffered = self.cursor.remaining(),
                    "resuming token parser"
                );
                self.state = ParserState::AwaitingType;
            }
            ParserState::AwaitingType | ParserState::Decoding(_) => {}
        }
        self.cursor.concat(chunk);
    }

    /// Decode the next complete token.
    ///
    /// Returns `Ok(None)` when the buffered input holds no complete token
    /// (the parser is then suspended) or the parser has terminated. A decode
    /// error terminates the parser; later calls return `Ok(None)`.
    pub fn next_token(&mut self) -> Result<Option<Token>, ProtocolError> {
        loop {
            if matches!(
                self.state,
                ParserState::Done | ParserState::Error | ParserState::Suspended
            ) {
                return Ok(None);
            }

            let start = self.cursor.mark();
            let byte = match self.cursor.read_u8() {
                Ok(byte) => byte,
                Err(err) if err.is_incomplete() => {
                    self.suspend(start);
                    return Ok(None);
                }
                Err(err) => return Err(self.fail(err)),
            };
            let Some(token_type) = TokenType::from_u8(byte) else {
                return Err(self.fail(ProtocolError::InvalidTokenType(byte)));
            };
            self.state = ParserState::Decoding(token_type);

            let ctx = DecodeContext {
                version: self.version,
                columns: self.columns.as_deref(),
                registry: self.registry,
            };
            match decode_token(token_type, &mut self.cursor, &ctx) {
                Ok(Some(token)) => {
                    trace!(
                        token_type = token_type.name(),
                        consumed = self.cursor.position() - start,
                        "decoded token"
                    );
                    self.apply(&token);
                    self.state = ParserState::AwaitingType;
                    return Ok(Some(token));
                }
                Ok(None) => {
                    self.state = ParserState::AwaitingType;
                }
                Err(err) if err.is_incomplete() => {
                    self.suspend(start);
                    return Ok(None);
                }
                Err(err) => return Err(self.fail(err)),
            }
        }
    }

    /// Iterate over the complete tokens currently buffered.
    pub fn tokens(&mut self) -> Tokens<'_> {
        Tokens { parser: self }
    }

    /// Signal the end of input.
    ///
    /// Call once [`next_token`](Self::next_token) has returned `Ok(None)`.
    /// Any bytes still buffered then belong to a token that was never
    /// completed.
    pub fn finish(&mut self) -> Result<(), ProtocolError> {
        match self.state {
            ParserState::Done | ParserState::Error => return Ok(()),
            _ => {}
        }

        let pending = self.cursor.remaining();
        if pending > 0 {
            return Err(self.fail(ProtocolError::UnexpectedEof { pending }));
        }

        debug!("token stream finished");
        self.state = ParserState::Done;
        Ok(())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// TDS version used for version-dependent layouts.
    #[must_use]
    pub fn tds_version(&self) -> TdsVersion {
        self.version
    }

    /// Columns of the current result set.
    #[must_use]
    pub fn columns(&self) -> Option<&Arc<[ColumnMetadata]>> {
        self.columns.as_ref()
    }

    /// Number of buffered, not yet decoded bytes.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.cursor.remaining()
    }

    /// Whether the parser has reached `Done` or `Error`.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, ParserState::Done | ParserState::Error)
    }

    fn apply(&mut self, token: &Token) {
        match token {
            Token::ColMetadata(metadata) => {
                self.columns = Some(Arc::clone(&metadata.columns));
            }
            Token::LoginAck(ack) if ack.tds_version != self.version => {
                debug!(
                    from = %self.version,
                    to = %ack.tds_version,
                    "adopting negotiated TDS version"
                );
                self.version = ack.tds_version;
            }
            _ => {}
        }
    }

    fn suspend(&mut self, start: usize) {
        self.cursor.rewind(start);
        self.state = ParserState::Suspended;
        debug!(
            buffered = self.cursor.remaining(),
            "token incomplete, waiting for more input"
        );
    }

    fn fail(&mut self, err: ProtocolError) -> ProtocolError {
        error!(error = %err, buffered = self.cursor.remaining(), "malformed token stream");
        self.state = ParserState::Error;
        err
    }
}

/// Iterator over buffered tokens, see [`TokenStreamParser::tokens`].
#[derive(Debug)]
pub struct Tokens<'a> {
    parser: &'a mut TokenStreamParser,
}

impl Iterator for Tokens<'_> {
    type Item = Result<Token, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_token().transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tds_types::SqlValue;

    use super::*;
    use crate::token::{DoneStatus, EnvChangeValue};
    use crate::writer::ByteWriter;

    const DONE_PROC: [u8; 13] = [
        0xFE, 0x00, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    fn parser() -> TokenStreamParser {
        TokenStreamParser::new(ParserConfig::default())
    }

    fn int_result() -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_u8(0x81);
        w.write_u16_le(1);
        w.write_u32_le(0);
        w.write_u16_le(0x0001);
        w.write_u8(0x38);
        w.write_b_varchar("id");
        for id in [1, 2] {
            w.write_u8(0xD1);
            w.write_i32_le(id);
        }
        w.write_u8(0xFD);
        w.write_u16_le(0x0010);
        w.write_u16_le(0xC1);
        w.write_u64_le(2);
        w.as_slice().to_vec()
    }

    #[test]
    fn test_done_proc_sequence() {
        let mut p = parser();
        for _ in 0..3 {
            p.feed(&DONE_PROC);
        }
        let tokens: Vec<_> = p.tokens().collect::<Result<_, _>>().unwrap();
        assert_eq!(tokens.len(), 3);
        for token in tokens {
            let Token::DoneProc(done) = token else {
                unreachable!("expected DONEPROC")
            };
            assert_eq!(done.cur_cmd, 0xE0);
            assert_eq!(done.row_count, None);
        }
        assert_eq!(p.state(), ParserState::Suspended);
        p.finish().unwrap();
        assert_eq!(p.state(), ParserState::Done);
    }

    #[test]
    fn test_result_set() {
        let mut p = parser();
        p.feed(&int_result());
        let tokens: Vec<_> = p.tokens().collect::<Result<_, _>>().unwrap();

        assert_eq!(tokens.len(), 4);
        assert!(matches!(tokens[0], Token::ColMetadata(_)));
        assert_eq!(p.columns().unwrap().len(), 1);
        assert_eq!(
            tokens[2],
            Token::Row(crate::token::Row {
                values: vec![SqlValue::Int(2)]
            })
        );
        let Token::Done(done) = &tokens[3] else {
            unreachable!("expected DONE")
        };
        assert_eq!(done.status, DoneStatus::COUNT);
        assert_eq!(done.row_count, Some(2));
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = int_result();
        let mut whole = parser();
        whole.feed(&bytes);
        let expected: Vec<_> = whole.tokens().collect::<Result<_, _>>().unwrap();

        let mut p = parser();
        let mut tokens = Vec::new();
        for byte in &bytes {
            p.feed(std::slice::from_ref(byte));
            for token in p.tokens() {
                tokens.push(token.unwrap());
            }
        }
        p.finish().unwrap();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_suspends_and_rewinds() {
        let mut p = parser();
        p.feed(&DONE_PROC[..5]);
        assert!(p.next_token().unwrap().is_none());
        assert_eq!(p.state(), ParserState::Suspended);
        assert_eq!(p.buffered(), 5);

        p.feed(&DONE_PROC[5..]);
        assert_eq!(p.state(), ParserState::AwaitingType);
        assert!(matches!(p.next_token().unwrap(), Some(Token::DoneProc(_))));
    }

    #[test]
    fn test_partial_token_at_end_of_input() {
        let mut p = parser();
        p.feed(&DONE_PROC[..7]);
        assert!(p.next_token().unwrap().is_none());
        assert!(matches!(
            p.finish(),
            Err(ProtocolError::UnexpectedEof { pending: 7 })
        ));
        assert_eq!(p.state(), ParserState::Error);
    }

    #[test]
    fn test_invalid_token_type_terminates() {
        let mut p = parser();
        p.feed(&[0x01]);
        p.feed(&DONE_PROC);
        assert!(matches!(
            p.next_token(),
            Err(ProtocolError::InvalidTokenType(0x01))
        ));
        assert_eq!(p.state(), ParserState::Error);
        assert!(p.next_token().unwrap().is_none());
        p.feed(&DONE_PROC);
        assert!(p.next_token().unwrap().is_none());
    }

    #[test]
    fn test_row_before_metadata() {
        let mut p = parser();
        p.feed(&[0xD1, 0x01, 0x00, 0x00, 0x00]);
        assert!(matches!(
            p.next_token(),
            Err(ProtocolError::MissingColumnMetadata)
        ));
    }

    #[test]
    fn test_unknown_env_change_yields_nothing() {
        let mut p = parser();
        // sub-type 5 (unicode sorting locale) is not interpreted
        p.feed(&[0xE3, 0x03, 0x00, 0x05, 0x00, 0x00]);
        p.feed(&DONE_PROC);
        let tokens: Vec<_> = p.tokens().collect::<Result<_, _>>().unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0], Token::DoneProc(_)));
    }

    #[test]
    fn test_packet_size_change() {
        let mut body = ByteWriter::new();
        body.write_u8(4);
        body.write_b_varchar("2048");
        body.write_b_varchar("1024");
        let mut w = ByteWriter::new();
        w.write_u8(0xE3);
        w.write_u16_le(body.position() as u16);
        w.write_bytes(body.as_slice());

        let mut p = parser();
        p.feed(w.as_slice());
        let Some(Token::EnvChange(change)) = p.next_token().unwrap() else {
            unreachable!("expected ENVCHANGE")
        };
        assert_eq!(change.new_value, EnvChangeValue::Integer(2048));
        assert_eq!(change.old_value, EnvChangeValue::Integer(1024));
    }

    #[test]
    fn test_login_ack_updates_version() {
        let mut body = ByteWriter::new();
        body.write_u8(1);
        body.write_u32_be(0x7100_0001);
        body.write_b_varchar("SQL");
        body.write_bytes(&[8, 0, 0, 1]);
        let mut w = ByteWriter::new();
        w.write_u8(0xAD);
        w.write_u16_le(body.position() as u16);
        w.write_bytes(body.as_slice());
        // legacy DONE: 32-bit row count
        w.write_bytes(&[0xFD, 0x10, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00]);

        let mut p = parser();
        p.feed(w.as_slice());
        let tokens: Vec<_> = p.tokens().collect::<Result<_, _>>().unwrap();

        assert_eq!(p.tds_version(), TdsVersion::V7_1_REV1);
        let Token::Done(done) = &tokens[1] else {
            unreachable!("expected DONE")
        };
        assert_eq!(done.row_count, Some(3));
        p.finish().unwrap();
    }

    #[test]
    fn test_initial_version_from_config() {
        let config = ParserConfig::new().with_tds_version(TdsVersion::V7_1);
        let mut p = TokenStreamParser::new(config);
        p.feed(&[0xFD, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert!(matches!(p.next_token().unwrap(), Some(Token::Done(_))));
        assert_eq!(p.buffered(), 0);
    }
}
