//! Authentication and session tokens: SSPI, FEATUREEXTACK, FEDAUTHINFO and
//! SESSIONSTATE. Their payloads are handed to the authentication and session
//! layers without further interpretation.

use bytes::Bytes;

use super::with_body;
use crate::cursor::{ByteCursor, decode_utf16};
use crate::error::ProtocolError;

/// SSPI authentication data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SspiToken {
    /// Opaque security blob.
    pub data: Bytes,
}

impl SspiToken {
    /// Decode an SSPI token body.
    pub fn decode(src: &mut ByteCursor) -> Result<Self, ProtocolError> {
        Ok(Self {
            data: src.read_us_varbyte()?,
        })
    }
}

/// One acknowledged feature extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureAck {
    /// Feature id.
    pub feature_id: u8,
    /// Feature acknowledgment data.
    pub data: Bytes,
}

/// Feature extension acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureExtAck {
    /// Acknowledged features.
    pub features: Vec<FeatureAck>,
}

impl FeatureExtAck {
    /// Feature terminator byte.
    pub const TERMINATOR: u8 = 0xFF;

    /// Decode a FEATUREEXTACK token body.
    pub fn decode(src: &mut ByteCursor) -> Result<Self, ProtocolError> {
        let mut features = Vec::new();

        loop {
            let feature_id = src.read_u8()?;
            if feature_id == Self::TERMINATOR {
                break;
            }

            let data_len = src.read_u32_le()? as usize;
            let data = src.read_bytes(data_len)?;
            features.push(FeatureAck { feature_id, data });
        }

        Ok(Self { features })
    }

    /// Find the acknowledgment of a feature.
    #[must_use]
    pub fn feature(&self, feature_id: u8) -> Option<&FeatureAck> {
        self.features.iter().find(|f| f.feature_id == feature_id)
    }
}

/// Federated authentication information.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FedAuthInfo {
    /// Security token service URL.
    pub sts_url: String,
    /// Service principal name.
    pub spn: String,
}

impl FedAuthInfo {
    const STS_URL: u8 = 0x01;
    const SPN: u8 = 0x02;

    /// Decode a FEDAUTHINFO token body.
    ///
    /// Option data offsets are relative to the start of the body, after the
    /// length field.
    pub fn decode(src: &mut ByteCursor) -> Result<Self, ProtocolError> {
        let length = src.read_u32_le()? as usize;
        let body = src.read_bytes(length)?;

        with_body(body.clone(), "FEDAUTHINFO length", |src| {
            let count = src.read_u32_le()?;
            let mut info = Self::default();

            for _ in 0..count {
                let info_id = src.read_u8()?;
                let info_len = src.read_u32_le()? as usize;
                let offset = src.read_u32_le()? as usize;

                let data = offset
                    .checked_add(info_len)
                    .and_then(|end| body.get(offset..end))
                    .ok_or(ProtocolError::InvalidValue {
                        field: "FEDAUTHINFO offset",
                        value: offset as u64,
                    })?;

                match info_id {
                    Self::STS_URL => info.sts_url = decode_utf16(data)?,
                    Self::SPN => info.spn = decode_utf16(data)?,
                    _ => {}
                }
            }

            Ok(info)
        })
    }
}

/// Session state for connection resiliency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Opaque state data.
    pub data: Bytes,
}

impl SessionState {
    /// Decode a SESSIONSTATE token body.
    pub fn decode(src: &mut ByteCursor) -> Result<Self, ProtocolError> {
        let length = src.read_u32_le()? as usize;
        Ok(Self {
            data: src.read_bytes(length)?,
        })
    }
}
