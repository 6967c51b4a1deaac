//! Legacy large types: TEXT, NTEXT and IMAGE.
//!
//! Column values are preceded by a text pointer (`B_VARBYTE`, empty for
//! NULL) and an 8-byte timestamp, then a `u32` length and the data.
//! Parameter values use an `i32` length where -1 is NULL.

use bytes::Bytes;
use tds_types::{SqlValue, TypeError};

use super::string::{decode_text, encode_text, single_byte_encoding, to_text};
use super::{DataType, TypeCodec};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::writer::ByteWriter;

const TIMESTAMP_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    NText,
    Image,
}

pub(super) struct LegacyCodec {
    kind: Kind,
}

pub(super) static TEXT: LegacyCodec = LegacyCodec { kind: Kind::Text };
pub(super) static NTEXT: LegacyCodec = LegacyCodec { kind: Kind::NText };
pub(super) static IMAGE: LegacyCodec = LegacyCodec { kind: Kind::Image };

impl LegacyCodec {
    fn bytes(&self, ty: &DataType, param: &Parameter) -> Result<Option<Bytes>, TypeError> {
        match (&param.value, self.kind) {
            (SqlValue::Null, _) => Ok(None),
            (SqlValue::Binary(bytes), Kind::Image) => Ok(Some(bytes.clone())),
            (SqlValue::String(s), Kind::Text) => {
                encode_text(ty, s, false, param.collation.as_ref()).map(Some)
            }
            (SqlValue::String(s), Kind::NText) => encode_text(ty, s, true, None).map(Some),
            (other, _) => Err(TypeError::mismatch(ty.name, other.type_name())),
        }
    }
}

impl TypeCodec for LegacyCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        match self.kind {
            Kind::Text => "text",
            Kind::NText => "ntext",
            Kind::Image => "image",
        }
        .to_string()
    }

    fn resolve(&self, ty: &DataType, param: &mut Parameter) -> Result<(), TypeError> {
        let natural = self.bytes(ty, param)?.map_or(0, |bytes| bytes.len());
        let length = param.length.unwrap_or(natural.max(1) as u32);
        if ty.max_length.is_some_and(|max| length > max) {
            return Err(TypeError::OutOfRange {
                target_type: ty.name,
            });
        }
        param.length = Some(length);
        Ok(())
    }

    fn type_info(
        &self,
        ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(ty.id.as_u8());
        dst.write_u32_le(param.length.unwrap_or(1));
        match self.kind {
            Kind::Image => {}
            Kind::NText => param.collation.unwrap_or_default().encode(dst),
            Kind::Text => param
                .collation
                .ok_or(TypeError::MissingCollation { type_name: ty.name })?
                .encode(dst),
        }
        Ok(())
    }

    fn parameter_length(
        &self,
        ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        match self.bytes(ty, param)? {
            None => dst.write_i32_le(-1),
            Some(bytes) => dst.write_i32_le(bytes.len() as i32),
        }
        Ok(())
    }

    fn parameter_data(&self, ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        Ok(self.bytes(ty, param)?.into_iter().collect())
    }

    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        if self.kind == Kind::Text {
            single_byte_encoding(ty, collation)?;
        }
        match (value, self.kind) {
            (SqlValue::Null, _) => Ok(SqlValue::Null),
            (SqlValue::Binary(bytes), Kind::Image) => Ok(SqlValue::Binary(bytes)),
            (other, Kind::Image) => Err(TypeError::mismatch(ty.name, other.type_name())),
            (other, _) => Ok(SqlValue::String(to_text(ty, &other)?)),
        }
    }

    fn decode(
        &self,
        _ty: &DataType,
        src: &mut ByteCursor,
        column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        let text_pointer_len = src.read_u8()?;
        if text_pointer_len == 0 {
            return Ok(SqlValue::Null);
        }
        src.skip(usize::from(text_pointer_len) + TIMESTAMP_LENGTH)?;

        let len = src.read_u32_le()? as usize;
        let data = src.read_bytes(len)?;

        match self.kind {
            Kind::Image => Ok(SqlValue::Binary(data)),
            Kind::Text => Ok(SqlValue::String(decode_text(
                &data,
                false,
                column.collation.as_ref(),
            )?)),
            Kind::NText => Ok(SqlValue::String(decode_text(&data, true, None)?)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::data_type::DataTypeRegistry;
    use crate::metadata::TypeInfo;

    fn column(type_info: &[u8]) -> ColumnMetadata {
        let mut cursor = ByteCursor::from(type_info);
        let info = TypeInfo::decode(&mut cursor, DataTypeRegistry::standard()).unwrap();
        ColumnMetadata::from_type_info(info, 0, 0)
    }

    fn value_bytes(data: &[u8]) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_b_varbyte(&[0xAA; 16]);
        w.write_bytes(&[0x11; TIMESTAMP_LENGTH]);
        w.write_u32_le(data.len() as u32);
        w.write_bytes(data);
        w.as_slice().to_vec()
    }

    #[test]
    fn test_decode_text_value() {
        let mut type_info = vec![0x23, 0xFF, 0xFF, 0xFF, 0x7F];
        type_info.extend_from_slice(&Collation::default().to_bytes());
        let column = column(&type_info);

        let bytes = value_bytes(b"hello");
        let mut cursor = ByteCursor::from(&bytes[..]);
        assert_eq!(
            column.data_type.decode(&mut cursor, &column).unwrap(),
            SqlValue::String("hello".into())
        );
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_decode_null_text_pointer() {
        let column = column(&[0x22, 0xFF, 0xFF, 0xFF, 0x7F]);
        let mut cursor = ByteCursor::from(&[0x00][..]);
        assert_eq!(
            column.data_type.decode(&mut cursor, &column).unwrap(),
            SqlValue::Null
        );
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_decode_image_and_ntext() {
        let image = column(&[0x22, 0xFF, 0xFF, 0xFF, 0x7F]);
        let bytes = value_bytes(&[1, 2, 3]);
        let mut cursor = ByteCursor::from(&bytes[..]);
        assert_eq!(
            image.data_type.decode(&mut cursor, &image).unwrap(),
            SqlValue::Binary(Bytes::from_static(&[1, 2, 3]))
        );

        let mut type_info = vec![0x63, 0xFE, 0xFF, 0xFF, 0x7F];
        type_info.extend_from_slice(&Collation::default().to_bytes());
        let ntext = column(&type_info);
        let bytes = value_bytes(&[b'o', 0, b'k', 0]);
        let mut cursor = ByteCursor::from(&bytes[..]);
        assert_eq!(
            ntext.data_type.decode(&mut cursor, &ntext).unwrap(),
            SqlValue::String("ok".into())
        );
    }

    #[test]
    fn test_parameter_null_length() {
        let param = Parameter::typed("@i", "Image", SqlValue::Null).unwrap();
        let mut w = ByteWriter::new();
        param.data_type().type_info(&param, &mut w).unwrap();
        param.data_type().parameter_length(&param, &mut w).unwrap();
        assert_eq!(
            w.as_slice(),
            &[0x22, 0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert!(param.data_type().parameter_data(&param).unwrap().is_empty());
    }

    #[test]
    fn test_ntext_parameter() {
        let param = Parameter::typed("@n", "NText", "ab").unwrap();
        let ty = param.data_type();
        assert_eq!(ty.declare(&param), "ntext");

        let mut w = ByteWriter::new();
        ty.parameter_length(&param, &mut w).unwrap();
        assert_eq!(w.as_slice(), &4i32.to_le_bytes());
        assert_eq!(
            &ty.parameter_data(&param).unwrap()[0][..],
            &[b'a', 0, b'b', 0]
        );
    }

    #[test]
    fn test_text_requires_collation() {
        assert!(matches!(
            Parameter::typed("@t", "Text", "abc"),
            Err(TypeError::MissingCollation { .. })
        ));
    }
}
