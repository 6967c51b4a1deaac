//! XML, always PLP-framed UTF-16LE.

use bytes::Bytes;
use tds_types::{SqlValue, TypeError};

use super::string::{decode_text, encode_text, to_text};
use super::{DataType, TypeCodec, plp};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::writer::ByteWriter;

pub(super) struct XmlCodec;

pub(super) static XML: XmlCodec = XmlCodec;

impl TypeCodec for XmlCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        "xml".to_string()
    }

    fn type_info(
        &self,
        ty: &DataType,
        _param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(ty.id.as_u8());
        // No schema collection.
        dst.write_u8(0);
        Ok(())
    }

    fn parameter_length(
        &self,
        _ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        plp::write_length(param.value.is_null(), dst);
        Ok(())
    }

    fn parameter_data(&self, ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        match &param.value {
            SqlValue::Null => Ok(Vec::new()),
            SqlValue::Xml(s) => Ok(plp::chunks(&encode_text(ty, s, true, None)?)),
            other => Err(TypeError::mismatch(ty.name, other.type_name())),
        }
    }

    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        _collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        match value {
            SqlValue::Null => Ok(SqlValue::Null),
            SqlValue::Xml(s) | SqlValue::String(s) => Ok(SqlValue::Xml(s)),
            other => Ok(SqlValue::Xml(to_text(ty, &other)?)),
        }
    }

    fn decode(
        &self,
        _ty: &DataType,
        src: &mut ByteCursor,
        _column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        match plp::read(src)? {
            None => Ok(SqlValue::Null),
            Some(bytes) => Ok(SqlValue::Xml(decode_text(&bytes, true, None)?)),
        }
    }
}
