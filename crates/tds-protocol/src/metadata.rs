//! Column metadata and TYPE_INFO decoding.
//!
//! TYPE_INFO is the self-describing type header shared by COLMETADATA and
//! RETURNVALUE. Its shape is driven entirely by the registered descriptor for
//! the leading type byte: the width of the length field, whether precision
//! and scale follow, whether a collation follows, and the extra UDT / XML
//! schema blocks.

use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::data_type::{DataTypeRef, DataTypeRegistry, LengthField};
use crate::error::ProtocolError;
use crate::types::{ColumnFlags, TypeId};
use crate::version::TdsVersion;

/// Length field value that marks a PLP (max) column.
pub const PLP_MARKER: u32 = 0xFFFF;

/// Assembly information of a CLR user-defined type column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UdtInfo {
    /// Maximum serialized size, `0xFFFF` for unlimited.
    pub max_byte_size: u16,
    /// Database holding the type.
    pub db_name: String,
    /// Schema holding the type.
    pub schema_name: String,
    /// Type name.
    pub type_name: String,
    /// Assembly-qualified CLR type name.
    pub assembly_qualified_name: String,
}

/// XML schema collection bound to an XML column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlSchema {
    /// Database holding the schema collection.
    pub db_name: String,
    /// Schema owning the collection.
    pub owning_schema: String,
    /// Schema collection name.
    pub collection: String,
}

/// A decoded TYPE_INFO block.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    /// Descriptor for the wire type.
    pub data_type: DataTypeRef,
    /// Length field value, or the fixed width for fixed-length types.
    pub data_length: Option<u32>,
    /// Precision, for decimal types.
    pub precision: Option<u8>,
    /// Scale, for decimal and time types.
    pub scale: Option<u8>,
    /// Collation, for character types.
    pub collation: Option<Collation>,
    /// CLR type information, for UDT columns.
    pub udt_info: Option<UdtInfo>,
    /// Bound schema collection, for typed XML columns.
    pub xml_schema: Option<XmlSchema>,
}

impl TypeInfo {
    /// Decode a TYPE_INFO block.
    pub fn decode(
        src: &mut ByteCursor,
        registry: &DataTypeRegistry,
    ) -> Result<Self, ProtocolError> {
        let id = src.read_u8()?;
        let data_type = registry
            .by_id(id)
            .ok_or(ProtocolError::UnknownDataType(id))?;

        if data_type.id == TypeId::Tvp {
            return Err(ProtocolError::InvalidValue {
                field: "column data type",
                value: u64::from(id),
            });
        }

        let data_length = match data_type.length_field {
            LengthField::None => data_type.id.fixed_size().map(|size| size as u32),
            LengthField::Byte => Some(u32::from(src.read_u8()?)),
            LengthField::UShort => Some(u32::from(src.read_u16_le()?)),
            LengthField::Long => Some(src.read_u32_le()?),
        };

        let mut info = Self {
            data_type,
            data_length,
            precision: None,
            scale: None,
            collation: None,
            udt_info: None,
            xml_schema: None,
        };

        if data_type.id.is_decimal() {
            info.precision = Some(src.read_u8()?);
            info.scale = Some(src.read_u8()?);
        } else if data_type.id.is_scaled_time() {
            let scale = src.read_u8()?;
            if scale > 7 {
                return Err(ProtocolError::InvalidValue {
                    field: "time scale",
                    value: u64::from(scale),
                });
            }
            info.scale = Some(scale);
        }

        if data_type.has_collation {
            info.collation = Some(Collation::decode(src)?);
        }

        match data_type.id {
            TypeId::Udt => {
                info.udt_info = Some(UdtInfo {
                    max_byte_size: data_length.unwrap_or(PLP_MARKER) as u16,
                    db_name: src.read_b_varchar()?,
                    schema_name: src.read_b_varchar()?,
                    type_name: src.read_b_varchar()?,
                    assembly_qualified_name: src.read_us_varchar()?,
                });
            }
            TypeId::Xml => {
                if src.read_u8()? != 0 {
                    info.xml_schema = Some(XmlSchema {
                        db_name: src.read_b_varchar()?,
                        owning_schema: src.read_b_varchar()?,
                        collection: src.read_us_varchar()?,
                    });
                }
            }
            _ => {}
        }

        Ok(info)
    }
}

/// Metadata of one result set column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    /// User type id.
    pub user_type: u32,
    /// Raw column flags, see [`ColumnFlags`].
    pub flags: u16,
    /// Descriptor for the wire type.
    pub data_type: DataTypeRef,
    /// Collation, for character types.
    pub collation: Option<Collation>,
    /// Precision, for decimal types.
    pub precision: Option<u8>,
    /// Scale, for decimal and time types.
    pub scale: Option<u8>,
    /// Length field value, or the fixed width for fixed-length types.
    pub data_length: Option<u32>,
    /// Table name parts, for TEXT/NTEXT/IMAGE columns.
    pub table_name: Option<Vec<String>>,
    /// Column name.
    pub col_name: String,
    /// CLR type information, for UDT columns.
    pub udt_info: Option<UdtInfo>,
    /// Bound schema collection, for typed XML columns.
    pub xml_schema: Option<XmlSchema>,
}

impl ColumnMetadata {
    /// Build column metadata from a decoded TYPE_INFO block.
    #[must_use]
    pub fn from_type_info(info: TypeInfo, user_type: u32, flags: u16) -> Self {
        Self {
            user_type,
            flags,
            data_type: info.data_type,
            collation: info.collation,
            precision: info.precision,
            scale: info.scale,
            data_length: info.data_length,
            table_name: None,
            col_name: String::new(),
            udt_info: info.udt_info,
            xml_schema: info.xml_schema,
        }
    }

    /// Decode one column definition of a COLMETADATA token.
    pub fn decode(
        src: &mut ByteCursor,
        version: TdsVersion,
        registry: &DataTypeRegistry,
    ) -> Result<Self, ProtocolError> {
        let user_type = read_user_type(src, version)?;
        let flags = src.read_u16_le()?;
        let info = TypeInfo::decode(src, registry)?;

        let mut column = Self::from_type_info(info, user_type, flags);
        if column.data_type.has_table_name {
            column.table_name = Some(read_table_name(src, version)?);
        }
        column.col_name = src.read_b_varchar()?;

        Ok(column)
    }

    /// Decoded view of [`flags`](Self::flags).
    #[must_use]
    pub fn column_flags(&self) -> ColumnFlags {
        ColumnFlags::from_bits(self.flags)
    }

    /// Whether the column may hold NULL.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.column_flags().nullable
    }

    /// Whether values of this column are PLP-framed.
    #[must_use]
    pub fn is_plp(&self) -> bool {
        match self.data_type.id {
            TypeId::Xml => true,
            TypeId::VarChar
            | TypeId::NVarChar
            | TypeId::VarBinary
            | TypeId::Char
            | TypeId::NChar
            | TypeId::Binary
            | TypeId::Udt => self.data_length == Some(PLP_MARKER),
            _ => false,
        }
    }
}

/// Read a user type: `u16` before TDS 7.2, `u32` from 7.2 on.
pub(crate) fn read_user_type(
    src: &mut ByteCursor,
    version: TdsVersion,
) -> Result<u32, ProtocolError> {
    if version.has_wide_user_type() {
        src.read_u32_le()
    } else {
        src.read_u16_le().map(u32::from)
    }
}

fn read_table_name(
    src: &mut ByteCursor,
    version: TdsVersion,
) -> Result<Vec<String>, ProtocolError> {
    if !version.has_multipart_table_name() {
        return Ok(vec![src.read_us_varchar()?]);
    }

    let parts = src.read_u8()?;
    (0..parts).map(|_| src.read_us_varchar()).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::writer::ByteWriter;

    fn registry() -> &'static DataTypeRegistry {
        DataTypeRegistry::standard()
    }

    #[test]
    fn test_decode_int_column() {
        let mut w = ByteWriter::new();
        w.write_u32_le(7); // user type
        w.write_u16_le(0x0009); // nullable | updateable
        w.write_u8(0x38); // INT
        w.write_b_varchar("id");

        let mut cursor = ByteCursor::from(w.as_slice());
        let column = ColumnMetadata::decode(&mut cursor, TdsVersion::V7_4, registry()).unwrap();

        assert_eq!(column.user_type, 7);
        assert_eq!(column.flags, 0x0009);
        assert_eq!(column.data_type.id, TypeId::Int);
        assert_eq!(column.data_length, Some(4));
        assert_eq!(column.col_name, "id");
        assert!(column.is_nullable());
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_decode_nvarchar_max_column() {
        let mut w = ByteWriter::new();
        w.write_u32_le(0);
        w.write_u16_le(0x0001);
        w.write_u8(0xE7);
        w.write_u16_le(0xFFFF);
        Collation::SQL_LATIN1_GENERAL_CP1_CI_AS.encode(&mut w);
        w.write_b_varchar("body");

        let mut cursor = ByteCursor::from(w.as_slice());
        let column = ColumnMetadata::decode(&mut cursor, TdsVersion::V7_4, registry()).unwrap();

        assert!(column.is_plp());
        assert_eq!(
            column.collation,
            Some(Collation::SQL_LATIN1_GENERAL_CP1_CI_AS)
        );
    }

    #[test]
    fn test_decode_decimal_type_info() {
        let mut cursor = ByteCursor::from(&[0x6A, 0x09, 0x12, 0x02][..]);
        let info = TypeInfo::decode(&mut cursor, registry()).unwrap();
        assert_eq!(info.data_type.id, TypeId::DecimalN);
        assert_eq!(info.data_length, Some(9));
        assert_eq!(info.precision, Some(18));
        assert_eq!(info.scale, Some(2));
    }

    #[test]
    fn test_text_column_table_name_by_version() {
        let mut w = ByteWriter::new();
        w.write_u16_le(0); // narrow user type
        w.write_u16_le(0);
        w.write_u8(0x23); // TEXT
        w.write_u32_le(0x7FFF_FFFF);
        Collation::SQL_LATIN1_GENERAL_CP1_CI_AS.encode(&mut w);
        w.write_us_varchar("notes");
        w.write_b_varchar("body");

        let mut cursor = ByteCursor::from(w.as_slice());
        let column = ColumnMetadata::decode(&mut cursor, TdsVersion::V7_1, registry()).unwrap();
        assert_eq!(column.table_name, Some(vec!["notes".to_string()]));

        let mut w = ByteWriter::new();
        w.write_u32_le(0);
        w.write_u16_le(0);
        w.write_u8(0x23);
        w.write_u32_le(0x7FFF_FFFF);
        Collation::SQL_LATIN1_GENERAL_CP1_CI_AS.encode(&mut w);
        w.write_u8(2);
        w.write_us_varchar("dbo");
        w.write_us_varchar("notes");
        w.write_b_varchar("body");

        let mut cursor = ByteCursor::from(w.as_slice());
        let column = ColumnMetadata::decode(&mut cursor, TdsVersion::V7_4, registry()).unwrap();
        assert_eq!(
            column.table_name,
            Some(vec!["dbo".to_string(), "notes".to_string()])
        );
    }

    #[test]
    fn test_decode_typed_xml() {
        let mut w = ByteWriter::new();
        w.write_u8(0xF1);
        w.write_u8(1);
        w.write_b_varchar("db");
        w.write_b_varchar("dbo");
        w.write_us_varchar("Orders");

        let mut cursor = ByteCursor::from(w.as_slice());
        let info = TypeInfo::decode(&mut cursor, registry()).unwrap();
        let schema = info.xml_schema.unwrap();
        assert_eq!(schema.collection, "Orders");
    }

    #[test]
    fn test_decode_udt() {
        let mut w = ByteWriter::new();
        w.write_u8(0xF0);
        w.write_u16_le(0xFFFF);
        w.write_b_varchar("db");
        w.write_b_varchar("sys");
        w.write_b_varchar("hierarchyid");
        w.write_us_varchar("Microsoft.SqlServer.Types.SqlHierarchyId");

        let mut cursor = ByteCursor::from(w.as_slice());
        let info = TypeInfo::decode(&mut cursor, registry()).unwrap();
        let udt = info.udt_info.unwrap();
        assert_eq!(udt.type_name, "hierarchyid");
        assert_eq!(udt.max_byte_size, 0xFFFF);
    }

    #[test]
    fn test_unknown_type_byte() {
        let mut cursor = ByteCursor::from(&[0x99][..]);
        assert!(matches!(
            TypeInfo::decode(&mut cursor, registry()),
            Err(ProtocolError::UnknownDataType(0x99))
        ));
    }

    #[test]
    fn test_type_info_is_incomplete_without_collation() {
        let mut cursor = ByteCursor::from(&[0xA7, 0x10, 0x00, 0x09][..]);
        assert!(TypeInfo::decode(&mut cursor, registry())
            .unwrap_err()
            .is_incomplete());
    }
}
