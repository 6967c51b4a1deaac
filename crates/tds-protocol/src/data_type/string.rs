//! Character types.
//!
//! CHAR and VARCHAR carry text in the code page of their collation, NCHAR
//! and NVARCHAR carry UTF-16LE. Variable-length parameters longer than the
//! type's short maximum (8000 bytes, or 4000 characters for the Unicode
//! forms) are declared `max` and sent PLP-framed.

use bytes::Bytes;
use encoding_rs::Encoding;
use tds_types::{SqlValue, TypeError};

use super::{DataType, TypeCodec, effective_length, plp};
use crate::collation::Collation;
use crate::cursor::{ByteCursor, decode_utf16};
use crate::error::ProtocolError;
use crate::metadata::{ColumnMetadata, PLP_MARKER};
use crate::param::Parameter;
use crate::writer::ByteWriter;

/// Length value marking a NULL short (non-PLP) value.
const NULL_LENGTH: u16 = 0xFFFF;

pub(super) struct StringCodec {
    declaration: &'static str,
    unicode: bool,
    fixed: bool,
}

pub(super) static VAR_CHAR: StringCodec = StringCodec {
    declaration: "varchar",
    unicode: false,
    fixed: false,
};
pub(super) static CHAR: StringCodec = StringCodec {
    declaration: "char",
    unicode: false,
    fixed: true,
};
pub(super) static NVAR_CHAR: StringCodec = StringCodec {
    declaration: "nvarchar",
    unicode: true,
    fixed: false,
};
pub(super) static NCHAR: StringCodec = StringCodec {
    declaration: "nchar",
    unicode: true,
    fixed: true,
};

/// Render a scalar value as text for a character parameter.
pub(super) fn to_text(ty: &DataType, value: &SqlValue) -> Result<String, TypeError> {
    let text = match value {
        SqlValue::String(s) | SqlValue::Xml(s) => s.clone(),
        SqlValue::Bool(v) => u8::from(*v).to_string(),
        SqlValue::TinyInt(v) => v.to_string(),
        SqlValue::SmallInt(v) => v.to_string(),
        SqlValue::Int(v) => v.to_string(),
        SqlValue::BigInt(v) => v.to_string(),
        SqlValue::Real(v) => v.to_string(),
        SqlValue::Float(v) => v.to_string(),
        SqlValue::Decimal(v) | SqlValue::Money(v) => v.to_string(),
        SqlValue::Numeric { mantissa, scale } => numeric_text(*mantissa, *scale),
        SqlValue::Uuid(v) => v.to_string().to_uppercase(),
        SqlValue::Date(v) => v.format("%Y-%m-%d").to_string(),
        SqlValue::Time(v) => v.format("%H:%M:%S%.f").to_string(),
        SqlValue::DateTime(v) => v.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        SqlValue::DateTimeOffset(v) => v.format("%Y-%m-%d %H:%M:%S%.f %:z").to_string(),
        other => return Err(TypeError::mismatch(ty.name, other.type_name())),
    };
    Ok(text)
}

fn numeric_text(mantissa: i128, scale: u8) -> String {
    let digits = mantissa.unsigned_abs().to_string();
    let scale = usize::from(scale);
    let digits = format!("{digits:0>width$}", width = scale + 1);
    let (whole, fraction) = digits.split_at(digits.len() - scale);
    let sign = if mantissa < 0 { "-" } else { "" };
    if fraction.is_empty() {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{fraction}")
    }
}

/// Encode text for a character type.
///
/// Single-byte types need a collation that resolves to a code page.
pub(super) fn encode_text(
    ty: &DataType,
    text: &str,
    unicode: bool,
    collation: Option<&Collation>,
) -> Result<Bytes, TypeError> {
    if unicode {
        let bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        return Ok(Bytes::from(bytes));
    }

    let (encoded, _, _) = single_byte_encoding(ty, collation)?.encode(text);
    Ok(Bytes::copy_from_slice(&encoded))
}

/// Code page encoding of a collation, for single-byte character types.
pub(super) fn single_byte_encoding(
    ty: &DataType,
    collation: Option<&Collation>,
) -> Result<&'static Encoding, TypeError> {
    let collation = collation.ok_or(TypeError::MissingCollation { type_name: ty.name })?;
    collation.encoding().ok_or_else(|| match collation.code_page_number() {
        Some(code_page) => TypeError::UnsupportedCodePage {
            code_page,
            lcid: collation.lcid,
            sort_id: collation.sort_id,
        },
        None => TypeError::UnsupportedCollation {
            lcid: collation.lcid,
            sort_id: collation.sort_id,
        },
    })
}

/// Decode character data received from the server.
pub(super) fn decode_text(
    bytes: &[u8],
    unicode: bool,
    collation: Option<&Collation>,
) -> Result<String, ProtocolError> {
    if unicode {
        return decode_utf16(bytes);
    }

    let encoding = collation
        .ok_or(ProtocolError::MissingCollation)?
        .require_encoding()?;
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    Ok(text.into_owned())
}

/// Non-PLP data length, which must fit the u16 prefix.
pub(super) fn data_length(ty: &DataType, len: usize) -> Result<u16, TypeError> {
    u16::try_from(len)
        .ok()
        .filter(|&len| len != NULL_LENGTH)
        .ok_or(TypeError::OutOfRange {
            target_type: ty.name,
        })
}

impl StringCodec {
    /// Natural length of the value: characters for Unicode, bytes otherwise.
    fn natural_length(&self, ty: &DataType, param: &Parameter) -> Result<Option<usize>, TypeError> {
        match &param.value {
            SqlValue::Null => Ok(None),
            SqlValue::String(s) if self.unicode => Ok(Some(s.encode_utf16().count())),
            SqlValue::String(s) => Ok(Some(
                encode_text(ty, s, false, param.collation.as_ref())?.len(),
            )),
            other => Err(TypeError::mismatch(ty.name, other.type_name())),
        }
    }

    fn length(&self, param: &Parameter) -> u32 {
        param.length.unwrap_or(1)
    }

    fn is_plp(&self, ty: &DataType, param: &Parameter) -> bool {
        !self.fixed && ty.max_length.is_some_and(|max| self.length(param) > max)
    }

    fn bytes(&self, ty: &DataType, param: &Parameter) -> Result<Option<Bytes>, TypeError> {
        match &param.value {
            SqlValue::Null => Ok(None),
            SqlValue::String(s) => {
                encode_text(ty, s, self.unicode, param.collation.as_ref()).map(Some)
            }
            other => Err(TypeError::mismatch(ty.name, other.type_name())),
        }
    }
}

impl TypeCodec for StringCodec {
    fn declare(&self, ty: &DataType, param: &Parameter) -> String {
        if self.is_plp(ty, param) {
            format!("{}(max)", self.declaration)
        } else {
            format!("{}({})", self.declaration, self.length(param))
        }
    }

    fn resolve(&self, ty: &DataType, param: &mut Parameter) -> Result<(), TypeError> {
        let natural = self.natural_length(ty, param)?;
        let length = effective_length(param, natural);
        if self.fixed && ty.max_length.is_some_and(|max| length > max) {
            return Err(TypeError::OutOfRange {
                target_type: ty.name,
            });
        }
        param.length = Some(length);

        // Outside PLP the value must fit the declared length.
        if !self.is_plp(ty, param) && natural.is_some_and(|n| n > length as usize) {
            return Err(TypeError::OutOfRange {
                target_type: ty.name,
            });
        }
        Ok(())
    }

    fn type_info(
        &self,
        ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(ty.id.as_u8());
        if self.is_plp(ty, param) {
            dst.write_u16_le(PLP_MARKER as u16);
        } else {
            let length = self.length(param);
            dst.write_u16_le(if self.unicode { length * 2 } else { length } as u16);
        }

        match (&param.collation, self.unicode) {
            (Some(collation), _) => collation.encode(dst),
            (None, true) => Collation::default().encode(dst),
            (None, false) => {
                return Err(TypeError::MissingCollation { type_name: ty.name });
            }
        }
        Ok(())
    }

    fn parameter_length(
        &self,
        ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        if self.is_plp(ty, param) {
            plp::write_length(param.value.is_null(), dst);
            return Ok(());
        }
        match self.bytes(ty, param)? {
            None => dst.write_u16_le(NULL_LENGTH),
            Some(bytes) => dst.write_u16_le(data_length(ty, bytes.len())?),
        }
        Ok(())
    }

    fn parameter_data(&self, ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        let Some(bytes) = self.bytes(ty, param)? else {
            return Ok(Vec::new());
        };
        if self.is_plp(ty, param) {
            Ok(plp::chunks(&bytes))
        } else {
            Ok(vec![bytes])
        }
    }

    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        if !self.unicode {
            single_byte_encoding(ty, collation)?;
        }
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        Ok(SqlValue::String(to_text(ty, &value)?))
    }

    fn decode(
        &self,
        _ty: &DataType,
        src: &mut ByteCursor,
        column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        let bytes = if column.is_plp() {
            plp::read(src)?
        } else {
            match src.read_u16_le()? {
                NULL_LENGTH => None,
                len => Some(src.read_bytes(usize::from(len))?),
            }
        };

        match bytes {
            None => Ok(SqlValue::Null),
            Some(bytes) => Ok(SqlValue::String(decode_text(
                &bytes,
                self.unicode,
                column.collation.as_ref(),
            )?)),
        }
    }
}
