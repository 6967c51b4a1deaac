//! ENVCHANGE.
//!
//! ```text
//! u16  length
//! u8   sub-type
//! ...  new value, old value (shape depends on the sub-type)
//! ```
//!
//! The body is read in full before it is interpreted, so trailing padding
//! and sub-types the codec does not interpret are skipped by the length.

use bytes::Bytes;

use super::with_body;
use crate::collation::{COLLATION_SIZE, Collation};
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;

/// Environment change sub-types interpreted by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvChangeType {
    /// Current database.
    Database = 1,
    /// Session language.
    Language = 2,
    /// Character set.
    CharacterSet = 3,
    /// Network packet size.
    PacketSize = 4,
    /// SQL collation.
    SqlCollation = 7,
    /// Transaction started.
    BeginTransaction = 8,
    /// Transaction committed.
    CommitTransaction = 9,
    /// Transaction rolled back.
    RollbackTransaction = 10,
    /// Database mirroring failover partner.
    DatabaseMirroringPartner = 13,
    /// Transaction ended.
    TransactionEnded = 17,
    /// Connection reset acknowledged.
    ResetConnection = 18,
    /// Client must reconnect to another server.
    Routing = 20,
}

impl EnvChangeType {
    /// Create from raw byte value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Database),
            2 => Some(Self::Language),
            3 => Some(Self::CharacterSet),
            4 => Some(Self::PacketSize),
            7 => Some(Self::SqlCollation),
            8 => Some(Self::BeginTransaction),
            9 => Some(Self::CommitTransaction),
            10 => Some(Self::RollbackTransaction),
            13 => Some(Self::DatabaseMirroringPartner),
            17 => Some(Self::TransactionEnded),
            18 => Some(Self::ResetConnection),
            20 => Some(Self::Routing),
            _ => None,
        }
    }
}

/// Environment change value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvChangeValue {
    /// String value (database, language, character set, partner).
    String(String),
    /// Integer value (packet size).
    Integer(u32),
    /// Collation value.
    Collation(Collation),
    /// Binary value (transaction descriptors, collations of unusual size).
    Binary(Bytes),
    /// Routing target.
    Routing {
        /// Host name.
        host: String,
        /// TCP port.
        port: u16,
    },
}

/// Environment change token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvChange {
    /// Sub-type.
    pub env_type: EnvChangeType,
    /// New value.
    pub new_value: EnvChangeValue,
    /// Old value.
    pub old_value: EnvChangeValue,
}

impl EnvChange {
    /// Decode an ENVCHANGE token.
    ///
    /// Returns `Ok(None)` for sub-types the codec does not interpret. Their
    /// bytes are consumed.
    pub fn decode(src: &mut ByteCursor) -> Result<Option<Self>, ProtocolError> {
        let length = usize::from(src.read_u16_le()?);
        let body = src.read_bytes(length)?;

        with_body(body, "ENVCHANGE length", |src| {
            let byte = src.read_u8()?;
            let Some(env_type) = EnvChangeType::from_u8(byte) else {
                tracing::warn!(
                    env_type = byte,
                    length,
                    "skipping unsupported ENVCHANGE sub-type"
                );
                return Ok(None);
            };

            let (new_value, old_value) = match env_type {
                EnvChangeType::Database
                | EnvChangeType::Language
                | EnvChangeType::CharacterSet
                | EnvChangeType::DatabaseMirroringPartner => (
                    EnvChangeValue::String(src.read_b_varchar()?),
                    EnvChangeValue::String(src.read_b_varchar()?),
                ),
                EnvChangeType::PacketSize => (
                    parse_integer(&src.read_b_varchar()?)?,
                    parse_integer(&src.read_b_varchar()?)?,
                ),
                EnvChangeType::SqlCollation => (
                    collation_value(src.read_b_varbyte()?),
                    collation_value(src.read_b_varbyte()?),
                ),
                EnvChangeType::BeginTransaction
                | EnvChangeType::CommitTransaction
                | EnvChangeType::RollbackTransaction
                | EnvChangeType::TransactionEnded
                | EnvChangeType::ResetConnection => (
                    EnvChangeValue::Binary(src.read_b_varbyte()?),
                    EnvChangeValue::Binary(src.read_b_varbyte()?),
                ),
                EnvChangeType::Routing => (
                    Self::decode_routing_value(src)?,
                    EnvChangeValue::Binary(src.read_us_varbyte()?),
                ),
            };

            Ok(Some(Self {
                env_type,
                new_value,
                old_value,
            }))
        })
    }

    fn decode_routing_value(src: &mut ByteCursor) -> Result<EnvChangeValue, ProtocolError> {
        let length = usize::from(src.read_u16_le()?);
        let body = src.read_bytes(length)?;

        // protocol, port, then the host as us_varchar; nothing may trail
        with_body(body, "ENVCHANGE routing length", |src| {
            let protocol = src.read_u8()?;
            if protocol != 0 {
                return Err(ProtocolError::InvalidRoutingProtocol(protocol));
            }
            let port = src.read_u16_le()?;
            let host = src.read_us_varchar()?;
            if !src.is_empty() {
                return Err(ProtocolError::InvalidValue {
                    field: "ENVCHANGE routing length",
                    value: length as u64,
                });
            }
            Ok(EnvChangeValue::Routing { host, port })
        })
    }

    /// Check if this is a routing redirect.
    #[must_use]
    pub fn is_routing(&self) -> bool {
        self.env_type == EnvChangeType::Routing
    }

    /// Get routing information if this is a routing change.
    #[must_use]
    pub fn routing_info(&self) -> Option<(&str, u16)> {
        if let EnvChangeValue::Routing { host, port } = &self.new_value {
            Some((host, *port))
        } else {
            None
        }
    }

    /// Get the new database name if this is a database change.
    #[must_use]
    pub fn new_database(&self) -> Option<&str> {
        match (&self.env_type, &self.new_value) {
            (EnvChangeType::Database, EnvChangeValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get the new packet size if this is a packet size change.
    #[must_use]
    pub fn new_packet_size(&self) -> Option<u32> {
        match (&self.env_type, &self.new_value) {
            (EnvChangeType::PacketSize, EnvChangeValue::Integer(size)) => Some(*size),
            _ => None,
        }
    }
}

fn parse_integer(s: &str) -> Result<EnvChangeValue, ProtocolError> {
    s.trim()
        .parse()
        .map(EnvChangeValue::Integer)
        .map_err(|_| ProtocolError::StringEncoding(format!("invalid packet size {s:?}")))
}

fn collation_value(bytes: Bytes) -> EnvChangeValue {
    match <[u8; COLLATION_SIZE]>::try_from(&bytes[..]) {
        Ok(raw) => EnvChangeValue::Collation(Collation::from_bytes(raw)),
        Err(_) => EnvChangeValue::Binary(bytes),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::writer::ByteWriter;

    fn token(body: impl FnOnce(&mut ByteWriter)) -> ByteCursor {
        let mut inner = ByteWriter::new();
        body(&mut inner);
        let mut w = ByteWriter::new();
        w.write_u16_le(inner.position() as u16);
        w.write_bytes(inner.as_slice());
        ByteCursor::from(w.as_slice())
    }

    #[test]
    fn test_database_change() {
        let mut cursor = token(|w| {
            w.write_u8(1);
            w.write_b_varchar("sales");
            w.write_b_varchar("master");
        });
        let change = EnvChange::decode(&mut cursor).unwrap().unwrap();
        assert_eq!(change.env_type, EnvChangeType::Database);
        assert_eq!(change.new_database(), Some("sales"));
        assert_eq!(change.old_value, EnvChangeValue::String("master".into()));
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_packet_size_parsed_as_integers() {
        let mut cursor = token(|w| {
            w.write_u8(4);
            w.write_b_varchar("2048");
            w.write_b_varchar("1024");
        });
        let change = EnvChange::decode(&mut cursor).unwrap().unwrap();
        assert_eq!(change.new_value, EnvChangeValue::Integer(2048));
        assert_eq!(change.old_value, EnvChangeValue::Integer(1024));
        assert_eq!(change.new_packet_size(), Some(2048));
    }

    #[test]
    fn test_collation_change() {
        let mut cursor = token(|w| {
            w.write_u8(7);
            w.write_b_varbyte(&Collation::default().to_bytes());
            w.write_b_varbyte(&[]);
        });
        let change = EnvChange::decode(&mut cursor).unwrap().unwrap();
        assert_eq!(
            change.new_value,
            EnvChangeValue::Collation(Collation::default())
        );
        assert_eq!(change.old_value, EnvChangeValue::Binary(Bytes::new()));
    }

    #[test]
    fn test_begin_transaction() {
        let descriptor = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut cursor = token(|w| {
            w.write_u8(8);
            w.write_b_varbyte(&descriptor);
            w.write_b_varbyte(&[]);
        });
        let change = EnvChange::decode(&mut cursor).unwrap().unwrap();
        assert_eq!(
            change.new_value,
            EnvChangeValue::Binary(Bytes::copy_from_slice(&descriptor))
        );
    }

    #[test]
    fn test_routing() {
        let mut cursor = token(|w| {
            w.write_u8(20);
            w.write_u16_le(0x17);
            w.write_u8(0);
            w.write_u16_le(1433);
            w.write_us_varchar("replica01");
            w.write_u16_le(0);
        });
        let change = EnvChange::decode(&mut cursor).unwrap().unwrap();
        assert!(change.is_routing());
        assert_eq!(change.routing_info(), Some(("replica01", 1433)));
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_routing_rejects_non_tcp() {
        let mut cursor = token(|w| {
            w.write_u8(20);
            w.write_u16_le(5);
            w.write_u8(2);
            w.write_u16_le(1433);
            w.write_us_varchar("");
            w.write_u16_le(0);
        });
        assert!(matches!(
            EnvChange::decode(&mut cursor),
            Err(ProtocolError::InvalidRoutingProtocol(2))
        ));
    }

    #[test]
    fn test_routing_length_must_match_value() {
        for routing_len in [0x16u16, 0x18] {
            let mut cursor = token(|w| {
                w.write_u8(20);
                w.write_u16_le(routing_len);
                w.write_u8(0);
                w.write_u16_le(1433);
                w.write_us_varchar("replica01");
                w.write_u8(0);
                w.write_u16_le(0);
            });
            assert!(matches!(
                EnvChange::decode(&mut cursor),
                Err(ProtocolError::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_sub_type_is_skipped() {
        let mut cursor = token(|w| {
            w.write_u8(5);
            w.write_b_varchar("1033");
            w.write_b_varchar("");
        });
        assert_eq!(EnvChange::decode(&mut cursor).unwrap(), None);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_incomplete_body() {
        let mut cursor = ByteCursor::from(&[0x0B, 0x00, 0x01, 0x02][..]);
        assert!(EnvChange::decode(&mut cursor).unwrap_err().is_incomplete());
    }

    #[test]
    fn test_length_shorter_than_values() {
        let mut cursor = token(|w| {
            w.write_u8(1);
            w.write_u8(5);
        });
        assert!(matches!(
            EnvChange::decode(&mut cursor),
            Err(ProtocolError::InvalidValue { .. })
        ));
    }
}
