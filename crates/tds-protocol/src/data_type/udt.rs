//! CLR user-defined types. Values are returned as their serialized bytes;
//! sending them as parameters is not supported.

use bytes::Bytes;
use tds_types::{SqlValue, TypeError};

use super::{DataType, TypeCodec, decode_only, plp};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::writer::ByteWriter;

pub(super) struct UdtCodec;

pub(super) static UDT: UdtCodec = UdtCodec;

impl TypeCodec for UdtCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        "varbinary(max)".to_string()
    }

    fn type_info(
        &self,
        ty: &DataType,
        _param: &Parameter,
        _dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        Err(decode_only(ty))
    }

    fn parameter_length(
        &self,
        ty: &DataType,
        _param: &Parameter,
        _dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        Err(decode_only(ty))
    }

    fn parameter_data(&self, ty: &DataType, _param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        Err(decode_only(ty))
    }

    fn validate(
        &self,
        ty: &DataType,
        _value: SqlValue,
        _collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        Err(decode_only(ty))
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
                0xFFFF => None,
                len => Some(src.read_bytes(usize::from(len))?),
            }
        };
        Ok(bytes.map_or(SqlValue::Null, SqlValue::Binary))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::data_type::DataTypeRegistry;
    use crate::metadata::TypeInfo;

    #[test]
    fn test_udt_is_decode_only() {
        let udt = DataTypeRegistry::standard().by_name("UDT").unwrap();
        assert!(matches!(
            udt.validate(SqlValue::Binary(Bytes::new()), None),
            Err(TypeError::UnsupportedConversion { .. })
        ));
        assert!(Parameter::typed("@u", "UDT", SqlValue::Null).is_err());
    }

    #[test]
    fn test_udt_decode() {
        let mut w = ByteWriter::new();
        w.write_u8(0xF0);
        w.write_u16_le(0xFFFF);
        w.write_b_varchar("db");
        w.write_b_varchar("sys");
        w.write_b_varchar("hierarchyid");
        w.write_us_varchar("Microsoft.SqlServer.Types.SqlHierarchyId");
        let mut cursor = ByteCursor::from(w.as_slice());
        let info = TypeInfo::decode(&mut cursor, DataTypeRegistry::standard()).unwrap();
        let column = ColumnMetadata::from_type_info(info, 0, 0);
        assert!(column.is_plp());

        let mut w = ByteWriter::new();
        w.write_u64_le(2);
        w.write_plp_chunk(&[0x58, 0x40]);
        w.write_plp_terminator();
        let mut cursor = ByteCursor::from(w.as_slice());
        assert_eq!(
            column.data_type.decode(&mut cursor, &column).unwrap(),
            SqlValue::Binary(Bytes::from_static(&[0x58, 0x40]))
        );
    }
}
