//! Data type registry.
//!
//! Every SQL Server type the codec understands is described by one static
//! [`DataType`] entry. Entries are looked up by wire id on the decode path
//! (TYPE_INFO of a column or return value) and by case-insensitive name on
//! the encode path (the caller picks the type a parameter is sent as).
//!
//! Each entry delegates its behaviors to a per-family codec:
//!
//! | Family | Types |
//! |--------|-------|
//! | `integer` | TinyInt, SmallInt, Int, BigInt, IntN, Bit, BitN |
//! | `float` | Real, Float, FloatN |
//! | `money` | Money, SmallMoney, MoneyN |
//! | `decimal` | Decimal, Numeric, DecimalN, NumericN |
//! | `datetime` | DateTime, SmallDateTime, DateTimeN |
//! | `time` | Date, Time, DateTime2, DateTimeOffset |
//! | `string` | Char, VarChar, NChar, NVarChar |
//! | `binary` | Binary, VarBinary |
//! | `text` | Text, NText, Image |
//! | `guid` | UniqueIdentifier |
//! | `xml` | Xml |
//! | `udt` | UDT (decode only) |
//! | `variant` | Variant (decode only) |
//! | `tvp` | TVP (encode only) |

mod binary;
mod datetime;
mod decimal;
mod float;
mod guid;
mod integer;
mod money;
mod plp;
mod string;
mod text;
mod time;
mod tvp;
mod udt;
mod variant;
mod xml;

use core::fmt;

use bytes::Bytes;
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use tds_types::{SqlValue, TypeError};

use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::types::TypeId;
use crate::writer::ByteWriter;

/// Reference to a registered data type.
pub type DataTypeRef = &'static DataType;

/// Width of the length field that follows the type byte in TYPE_INFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthField {
    /// No length field.
    None,
    /// 1-byte length.
    Byte,
    /// 2-byte length.
    UShort,
    /// 4-byte length.
    Long,
}

impl LengthField {
    /// Width of the field in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::None => 0,
            Self::Byte => 1,
            Self::UShort => 2,
            Self::Long => 4,
        }
    }
}

/// Wire behaviors of one type family.
pub(crate) trait TypeCodec: Send + Sync {
    /// T-SQL declaration of the parameter.
    fn declare(&self, ty: &DataType, param: &Parameter) -> String;

    /// Fill in defaults and check parameter-level constraints.
    fn resolve(&self, _ty: &DataType, _param: &mut Parameter) -> Result<(), TypeError> {
        Ok(())
    }

    /// Write the TYPE_INFO for the parameter.
    fn type_info(
        &self,
        ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError>;

    /// Write the length prefix of the parameter value.
    fn parameter_length(
        &self,
        ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError>;

    /// Produce the value bytes, in one or more chunks.
    fn parameter_data(&self, ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError>;

    /// Coerce a caller-supplied value to the canonical representation.
    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError>;

    /// Decode one value of a column of this type.
    fn decode(
        &self,
        ty: &DataType,
        src: &mut ByteCursor,
        column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError>;
}

/// A registered SQL Server data type.
pub struct DataType {
    /// Wire type id.
    pub id: TypeId,
    /// Registered name.
    pub name: &'static str,
    /// Values have a fixed width and no length prefix.
    pub fixed_length: bool,
    /// TYPE_INFO carries a collation.
    pub has_collation: bool,
    /// COLMETADATA carries a table name after TYPE_INFO.
    pub has_table_name: bool,
    /// Width of the TYPE_INFO length field.
    pub length_field: LengthField,
    /// Largest declarable length before the type switches to `max`, if sized.
    pub max_length: Option<u32>,
    codec: &'static dyn TypeCodec,
}

impl DataType {
    /// T-SQL declaration of the parameter (`int`, `nvarchar(50)`, ...).
    #[must_use]
    pub fn declare(&self, param: &Parameter) -> String {
        self.codec.declare(self, param)
    }

    /// Write the TYPE_INFO for the parameter.
    pub fn type_info(&self, param: &Parameter, dst: &mut ByteWriter) -> Result<(), TypeError> {
        self.codec.type_info(self, param, dst)
    }

    /// Write the length prefix of the parameter value.
    ///
    /// For PLP types this is the 8-byte NULL marker or the unknown-length
    /// sentinel.
    pub fn parameter_length(
        &self,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        self.codec.parameter_length(self, param, dst)
    }

    /// Produce the value bytes.
    ///
    /// Fixed and short types yield one chunk; PLP types yield framed chunks
    /// followed by the zero-length terminator.
    pub fn parameter_data(&self, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        self.codec.parameter_data(self, param)
    }

    /// Coerce a value to this type's canonical representation.
    pub fn validate(
        &self,
        value: SqlValue,
        collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        self.codec.validate(self, value, collation)
    }

    /// Decode one value of a column of this type.
    pub fn decode(
        &self,
        src: &mut ByteCursor,
        column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        self.codec.decode(self, src, column)
    }

    pub(crate) fn resolve(&self, param: &mut Parameter) -> Result<(), TypeError> {
        self.codec.resolve(self, param)
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataType")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for DataType {}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

const fn fixed(id: TypeId, name: &'static str, codec: &'static dyn TypeCodec) -> DataType {
    DataType {
        id,
        name,
        fixed_length: true,
        has_collation: false,
        has_table_name: false,
        length_field: LengthField::None,
        max_length: None,
        codec,
    }
}

const fn sized(
    id: TypeId,
    name: &'static str,
    length_field: LengthField,
    codec: &'static dyn TypeCodec,
) -> DataType {
    DataType {
        id,
        name,
        fixed_length: false,
        has_collation: false,
        has_table_name: false,
        length_field,
        max_length: None,
        codec,
    }
}

const fn character(
    id: TypeId,
    name: &'static str,
    length_field: LengthField,
    max_length: u32,
    codec: &'static dyn TypeCodec,
) -> DataType {
    DataType {
        id,
        name,
        fixed_length: false,
        has_collation: true,
        has_table_name: false,
        length_field,
        max_length: Some(max_length),
        codec,
    }
}

const fn bounded(
    id: TypeId,
    name: &'static str,
    length_field: LengthField,
    max_length: u32,
    codec: &'static dyn TypeCodec,
) -> DataType {
    DataType {
        id,
        name,
        fixed_length: false,
        has_collation: false,
        has_table_name: false,
        length_field,
        max_length: Some(max_length),
        codec,
    }
}

const fn legacy_large(
    id: TypeId,
    name: &'static str,
    has_collation: bool,
    max_length: u32,
    codec: &'static dyn TypeCodec,
) -> DataType {
    DataType {
        id,
        name,
        fixed_length: false,
        has_collation,
        has_table_name: true,
        length_field: LengthField::Long,
        max_length: Some(max_length),
        codec,
    }
}

static NULL_CODEC: NullCodec = NullCodec;

static DATA_TYPES: [DataType; 39] = [
    fixed(TypeId::Null, "Null", &NULL_CODEC),
    fixed(TypeId::TinyInt, "TinyInt", &integer::TINY_INT),
    fixed(TypeId::Bit, "Bit", &integer::BIT),
    fixed(TypeId::SmallInt, "SmallInt", &integer::SMALL_INT),
    fixed(TypeId::Int, "Int", &integer::INT),
    fixed(TypeId::SmallDateTime, "SmallDateTime", &datetime::SMALL_DATE_TIME),
    fixed(TypeId::Real, "Real", &float::REAL),
    fixed(TypeId::Money, "Money", &money::MONEY),
    fixed(TypeId::DateTime, "DateTime", &datetime::DATE_TIME),
    fixed(TypeId::Float, "Float", &float::FLOAT),
    sized(TypeId::Decimal, "Decimal", LengthField::Byte, &decimal::DECIMAL),
    sized(TypeId::Numeric, "Numeric", LengthField::Byte, &decimal::NUMERIC),
    fixed(TypeId::SmallMoney, "SmallMoney", &money::SMALL_MONEY),
    fixed(TypeId::BigInt, "BigInt", &integer::BIG_INT),
    legacy_large(TypeId::Image, "Image", false, 0x7FFF_FFFF, &text::IMAGE),
    legacy_large(TypeId::Text, "Text", true, 0x7FFF_FFFF, &text::TEXT),
    sized(TypeId::UniqueIdentifier, "UniqueIdentifier", LengthField::Byte, &guid::GUID),
    sized(TypeId::IntN, "IntN", LengthField::Byte, &integer::INT_N),
    legacy_large(TypeId::NText, "NText", true, 0x3FFF_FFFF, &text::NTEXT),
    sized(TypeId::BitN, "BitN", LengthField::Byte, &integer::BIT),
    sized(TypeId::DecimalN, "DecimalN", LengthField::Byte, &decimal::DECIMAL),
    sized(TypeId::NumericN, "NumericN", LengthField::Byte, &decimal::NUMERIC),
    sized(TypeId::FloatN, "FloatN", LengthField::Byte, &float::FLOAT),
    sized(TypeId::MoneyN, "MoneyN", LengthField::Byte, &money::MONEY),
    sized(TypeId::DateTimeN, "DateTimeN", LengthField::Byte, &datetime::DATE_TIME),
    bounded(TypeId::VarBinary, "VarBinary", LengthField::UShort, 8000, &binary::VAR_BINARY),
    character(TypeId::VarChar, "VarChar", LengthField::UShort, 8000, &string::VAR_CHAR),
    bounded(TypeId::Binary, "Binary", LengthField::UShort, 8000, &binary::BINARY),
    character(TypeId::Char, "Char", LengthField::UShort, 8000, &string::CHAR),
    character(TypeId::NVarChar, "NVarChar", LengthField::UShort, 4000, &string::NVAR_CHAR),
    character(TypeId::NChar, "NChar", LengthField::UShort, 4000, &string::NCHAR),
    sized(TypeId::Xml, "Xml", LengthField::None, &xml::XML),
    bounded(TypeId::Udt, "UDT", LengthField::UShort, 8000, &udt::UDT),
    sized(TypeId::Tvp, "TVP", LengthField::None, &tvp::TVP),
    sized(TypeId::Variant, "Variant", LengthField::Long, &variant::VARIANT),
    sized(TypeId::Date, "Date", LengthField::None, &time::DATE),
    sized(TypeId::Time, "Time", LengthField::None, &time::TIME),
    sized(TypeId::DateTime2, "DateTime2", LengthField::None, &time::DATE_TIME2),
    sized(TypeId::DateTimeOffset, "DateTimeOffset", LengthField::None, &time::DATE_TIME_OFFSET),
];

static STANDARD: Lazy<DataTypeRegistry> = Lazy::new(|| DataTypeRegistry::from_types(&DATA_TYPES));

/// Lookup table of registered data types.
///
/// Read-only after construction; [`DataTypeRegistry::standard`] is built
/// once per process and shared.
#[derive(Debug)]
pub struct DataTypeRegistry {
    by_id: HashMap<u8, DataTypeRef>,
    by_name: HashMap<String, DataTypeRef>,
}

impl DataTypeRegistry {
    fn from_types(types: &'static [DataType]) -> Self {
        let mut by_id = HashMap::with_capacity(types.len());
        let mut by_name = HashMap::with_capacity(types.len());
        for data_type in types {
            by_id.insert(data_type.id.as_u8(), data_type);
            by_name.insert(data_type.name.to_ascii_lowercase(), data_type);
        }
        Self { by_id, by_name }
    }

    /// The registry of every standard SQL Server type.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Look up a type by its wire id.
    #[must_use]
    pub fn by_id(&self, id: u8) -> Option<DataTypeRef> {
        self.by_id.get(&id).copied()
    }

    /// Look up a type by name, ignoring ASCII case.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<DataTypeRef> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    /// Look up a type by [`TypeId`].
    #[must_use]
    pub fn get(&self, id: TypeId) -> Option<DataTypeRef> {
        self.by_id(id.as_u8())
    }

    /// Iterate over every registered type.
    pub fn iter(&self) -> impl Iterator<Item = DataTypeRef> + '_ {
        self.by_id.values().copied()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

struct NullCodec;

impl TypeCodec for NullCodec {
    fn declare(&self, _ty: &DataType, _param: &Parameter) -> String {
        "null".to_string()
    }

    fn type_info(
        &self,
        ty: &DataType,
        _param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(ty.id.as_u8());
        Ok(())
    }

    fn parameter_length(
        &self,
        _ty: &DataType,
        _param: &Parameter,
        _dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        Ok(())
    }

    fn parameter_data(&self, _ty: &DataType, _param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        Ok(Vec::new())
    }

    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        _collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        match value {
            SqlValue::Null => Ok(SqlValue::Null),
            other => Err(TypeError::mismatch(ty.name, other.type_name())),
        }
    }

    fn decode(
        &self,
        _ty: &DataType,
        _src: &mut ByteCursor,
        _column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        Ok(SqlValue::Null)
    }
}

/// Reject encoding for decode-only types.
pub(crate) fn decode_only(ty: &DataType) -> TypeError {
    TypeError::UnsupportedConversion {
        from: "parameter".to_string(),
        to: ty.name,
    }
}

/// Read the 1-byte length prefix of a nullable ("N") value.
///
/// Returns `None` for the zero-length NULL marker.
pub(crate) fn read_byte_len(src: &mut ByteCursor) -> Result<Option<usize>, ProtocolError> {
    match src.read_u8()? {
        0 => Ok(None),
        len => Ok(Some(usize::from(len))),
    }
}

/// Write the 1-byte length prefix of a nullable ("N") value.
pub(crate) fn write_byte_len(param: &Parameter, width: u8, dst: &mut ByteWriter) {
    dst.write_u8(if param.value.is_null() { 0 } else { width });
}

/// Resolve the effective length of a sized parameter.
///
/// The declared length wins; otherwise the natural length of the value,
/// with a minimum of one.
pub(crate) fn effective_length(param: &Parameter, natural: Option<usize>) -> u32 {
    param
        .length
        .unwrap_or_else(|| natural.map_or(1, |len| len.max(1) as u32))
}
