//! DONE, DONEPROC and DONEINPROC.

use bitflags::bitflags;

use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::version::TdsVersion;

bitflags! {
    /// Done token status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DoneStatus: u16 {
        /// More results follow.
        const MORE = 0x0001;
        /// The statement failed.
        const ERROR = 0x0002;
        /// A transaction is in progress.
        const INXACT = 0x0004;
        /// The row count is valid.
        const COUNT = 0x0010;
        /// Acknowledges an attention (cancel) request.
        const ATTN = 0x0020;
        /// A server error aborted the batch.
        const SRVERROR = 0x0100;
    }
}

/// Completion of a statement, procedure or statement within a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Done {
    /// Status flags.
    pub status: DoneStatus,
    /// Token of the current command.
    pub cur_cmd: u16,
    /// Affected row count, present only when [`DoneStatus::COUNT`] is set.
    pub row_count: Option<u64>,
}

impl Done {
    /// Size of the token body for TDS 7.2 and later.
    pub const SIZE: usize = 12;

    /// Size of the token body before TDS 7.2.
    pub const LEGACY_SIZE: usize = 8;

    /// Decode a DONE-family token body.
    pub fn decode(src: &mut ByteCursor, version: TdsVersion) -> Result<Self, ProtocolError> {
        let status = DoneStatus::from_bits_retain(src.read_u16_le()?);
        let cur_cmd = src.read_u16_le()?;
        let count = if version.has_wide_row_count() {
            src.read_u64_le()?
        } else {
            u64::from(src.read_u32_le()?)
        };

        Ok(Self {
            status,
            cur_cmd,
            row_count: status.contains(DoneStatus::COUNT).then_some(count),
        })
    }

    /// Check if more results follow this DONE token.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.status.contains(DoneStatus::MORE)
    }

    /// Check if an error occurred.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.status.contains(DoneStatus::ERROR)
    }

    /// Check if this acknowledges an attention request.
    #[must_use]
    pub const fn is_attention(&self) -> bool {
        self.status.contains(DoneStatus::ATTN)
    }
}
