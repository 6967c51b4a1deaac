//! ERROR and INFO.

use super::with_body;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::version::TdsVersion;

/// A server message, carried by both ERROR and INFO tokens.
///
/// INFO messages have the same structure as errors with a severity of 10
/// or less.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    /// Message number.
    pub number: i32,
    /// Message state.
    pub state: u8,
    /// Severity class.
    pub class: u8,
    /// Message text.
    pub message: String,
    /// Server name.
    pub server: String,
    /// Procedure name.
    pub procedure: String,
    /// Line number.
    pub line: u32,
}

impl ServerMessage {
    /// Decode an ERROR or INFO token body.
    pub fn decode(src: &mut ByteCursor, version: TdsVersion) -> Result<Self, ProtocolError> {
        // length (2) + number (4) + state (1) + class (1) + message (us_varchar)
        // + server (b_varchar) + procedure (b_varchar) + line (2 or 4)
        let length = usize::from(src.read_u16_le()?);
        let body = src.read_bytes(length)?;

        with_body(body, "message length", |src| {
            let number = src.read_i32_le()?;
            let state = src.read_u8()?;
            let class = src.read_u8()?;
            let message = src.read_us_varchar()?;
            let server = src.read_b_varchar()?;
            let procedure = src.read_b_varchar()?;
            let line = if version.has_wide_line_number() {
                src.read_u32_le()?
            } else {
                u32::from(src.read_u16_le()?)
            };

            Ok(Self {
                number,
                state,
                class,
                message,
                server,
                procedure,
                line,
            })
        })
    }

    /// Check if this is a fatal error (severity >= 20).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.class >= 20
    }

    /// Check if this error indicates the batch was aborted (severity >= 16).
    #[must_use]
    pub const fn is_batch_abort(&self) -> bool {
        self.class >= 16
    }
}
