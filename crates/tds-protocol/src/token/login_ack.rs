//! LOGINACK.

use super::with_body;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::version::TdsVersion;

/// Language interface acknowledged by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TdsInterface {
    /// SQL_DFLT.
    Default = 0,
    /// SQL_TSQL.
    TransactSql = 1,
}

/// Login acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAck {
    /// Interface type.
    pub interface: TdsInterface,
    /// Negotiated TDS version.
    pub tds_version: TdsVersion,
    /// Server program name.
    pub prog_name: String,
    /// Server program version: major, minor, build high, build low.
    pub prog_version: [u8; 4],
}

impl LoginAck {
    /// Decode a LOGINACK token body.
    pub fn decode(src: &mut ByteCursor) -> Result<Self, ProtocolError> {
        // length (2) + interface (1) + tds_version (4, big-endian)
        // + prog_name (b_varchar) + prog_version (4)
        let length = usize::from(src.read_u16_le()?);
        let body = src.read_bytes(length)?;

        with_body(body, "LOGINACK length", |src| {
            let interface = match src.read_u8()? {
                0 => TdsInterface::Default,
                1 => TdsInterface::TransactSql,
                other => return Err(ProtocolError::UnsupportedInterface(other)),
            };

            let raw_version = src.read_u32_be()?;
            let tds_version = TdsVersion::new(raw_version);
            if !tds_version.is_known() {
                return Err(ProtocolError::UnsupportedTdsVersion(raw_version));
            }

            let prog_name = src.read_b_varchar()?;
            let mut prog_version = [0u8; 4];
            prog_version.copy_from_slice(&src.read_bytes(4)?);

            Ok(Self {
                interface,
                tds_version,
                prog_name,
                prog_version,
            })
        })
    }

    /// Server version as `major.minor.build`.
    #[must_use]
    pub fn server_version(&self) -> String {
        let [major, minor, hi, lo] = self.prog_version;
        format!("{major}.{minor}.{}", u16::from_be_bytes([hi, lo]))
    }
}
