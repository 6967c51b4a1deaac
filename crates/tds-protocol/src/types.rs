//! TDS data type identifiers and column flags.
//!
//! The identifiers are the type bytes that appear in TYPE_INFO, both in
//! server column metadata and in outbound RPC parameter definitions.

/// TDS data type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeId {
    // Fixed-length types (no length prefix)
    /// Null type.
    Null = 0x1F,
    /// 8-bit unsigned integer.
    TinyInt = 0x30,
    /// Bit (boolean).
    Bit = 0x32,
    /// 16-bit signed integer.
    SmallInt = 0x34,
    /// 32-bit signed integer.
    Int = 0x38,
    /// 4-byte small datetime.
    SmallDateTime = 0x3A,
    /// 32-bit floating point.
    Real = 0x3B,
    /// 8-byte money.
    Money = 0x3C,
    /// 8-byte datetime.
    DateTime = 0x3D,
    /// 64-bit floating point.
    Float = 0x3E,
    /// 4-byte money.
    SmallMoney = 0x7A,
    /// 64-bit signed integer.
    BigInt = 0x7F,

    // Legacy precision-bearing types
    /// Legacy decimal.
    Decimal = 0x37,
    /// Legacy numeric.
    Numeric = 0x3F,

    // Nullable types with a 1-byte length
    /// GUID.
    UniqueIdentifier = 0x24,
    /// Nullable integer.
    IntN = 0x26,
    /// Nullable bit.
    BitN = 0x68,
    /// Nullable decimal.
    DecimalN = 0x6A,
    /// Nullable numeric.
    NumericN = 0x6C,
    /// Nullable float.
    FloatN = 0x6D,
    /// Nullable money.
    MoneyN = 0x6E,
    /// Nullable datetime.
    DateTimeN = 0x6F,

    // Types with a 2-byte length
    /// Variable-length binary.
    VarBinary = 0xA5,
    /// Variable-length character.
    VarChar = 0xA7,
    /// Fixed-length binary.
    Binary = 0xAD,
    /// Fixed-length character.
    Char = 0xAF,
    /// Variable-length Unicode character.
    NVarChar = 0xE7,
    /// Fixed-length Unicode character.
    NChar = 0xEF,

    // Types with a 4-byte length
    /// Image (legacy large binary).
    Image = 0x22,
    /// Text (legacy large character).
    Text = 0x23,
    /// NText (legacy large Unicode character).
    NText = 0x63,
    /// SQL variant.
    Variant = 0x62,

    // Date/time types (SQL Server 2008+)
    /// Date (3 bytes).
    Date = 0x28,
    /// Time with variable scale.
    Time = 0x29,
    /// DateTime2 with variable scale.
    DateTime2 = 0x2A,
    /// DateTimeOffset with variable scale.
    DateTimeOffset = 0x2B,

    // Special types
    /// User-defined CLR type.
    Udt = 0xF0,
    /// XML.
    Xml = 0xF1,
    /// Table-valued parameter.
    Tvp = 0xF3,
}

impl TypeId {
    /// Create a type ID from a raw byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x1F => Some(Self::Null),
            0x30 => Some(Self::TinyInt),
            0x32 => Some(Self::Bit),
            0x34 => Some(Self::SmallInt),
            0x38 => Some(Self::Int),
            0x3A => Some(Self::SmallDateTime),
            0x3B => Some(Self::Real),
            0x3C => Some(Self::Money),
            0x3D => Some(Self::DateTime),
            0x3E => Some(Self::Float),
            0x7A => Some(Self::SmallMoney),
            0x7F => Some(Self::BigInt),
            0x37 => Some(Self::Decimal),
            0x3F => Some(Self::Numeric),
            0x24 => Some(Self::UniqueIdentifier),
            0x26 => Some(Self::IntN),
            0x68 => Some(Self::BitN),
            0x6A => Some(Self::DecimalN),
            0x6C => Some(Self::NumericN),
            0x6D => Some(Self::FloatN),
            0x6E => Some(Self::MoneyN),
            0x6F => Some(Self::DateTimeN),
            0xA5 => Some(Self::VarBinary),
            0xA7 => Some(Self::VarChar),
            0xAD => Some(Self::Binary),
            0xAF => Some(Self::Char),
            0xE7 => Some(Self::NVarChar),
            0xEF => Some(Self::NChar),
            0x22 => Some(Self::Image),
            0x23 => Some(Self::Text),
            0x63 => Some(Self::NText),
            0x62 => Some(Self::Variant),
            0x28 => Some(Self::Date),
            0x29 => Some(Self::Time),
            0x2A => Some(Self::DateTime2),
            0x2B => Some(Self::DateTimeOffset),
            0xF0 => Some(Self::Udt),
            0xF1 => Some(Self::Xml),
            0xF3 => Some(Self::Tvp),
            _ => None,
        }
    }

    /// The raw wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this type carries no length in TYPE_INFO.
    #[must_use]
    pub const fn is_fixed_length(&self) -> bool {
        self.fixed_size().is_some()
    }

    /// Check if this type uses UTF-16 text.
    #[must_use]
    pub const fn is_unicode(&self) -> bool {
        matches!(self, Self::NChar | Self::NVarChar | Self::NText | Self::Xml)
    }

    /// Check if this type carries single-byte, collation-coded text.
    #[must_use]
    pub const fn is_single_byte_text(&self) -> bool {
        matches!(self, Self::Char | Self::VarChar | Self::Text)
    }

    /// Check if this type is one of the precision/scale bearing numerics.
    #[must_use]
    pub const fn is_decimal(&self) -> bool {
        matches!(
            self,
            Self::Decimal | Self::Numeric | Self::DecimalN | Self::NumericN
        )
    }

    /// Check if this type carries a scale byte in TYPE_INFO.
    #[must_use]
    pub const fn is_scaled_time(&self) -> bool {
        matches!(self, Self::Time | Self::DateTime2 | Self::DateTimeOffset)
    }

    /// Check if this is a date/time type.
    #[must_use]
    pub const fn is_datetime(&self) -> bool {
        matches!(
            self,
            Self::DateTime
                | Self::SmallDateTime
                | Self::DateTimeN
                | Self::Date
                | Self::Time
                | Self::DateTime2
                | Self::DateTimeOffset
        )
    }

    /// Get the fixed size of this type in bytes, if applicable.
    #[must_use]
    pub const fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Null => Some(0),
            Self::TinyInt => Some(1),
            Self::Bit => Some(1),
            Self::SmallInt => Some(2),
            Self::Int => Some(4),
            Self::BigInt => Some(8),
            Self::Real => Some(4),
            Self::Float => Some(8),
            Self::Money => Some(8),
            Self::SmallMoney => Some(4),
            Self::DateTime => Some(8),
            Self::SmallDateTime => Some(4),
            Self::Date => Some(3),
            _ => None,
        }
    }
}

/// Column flags from COLMETADATA and RETURNVALUE.
///
/// The raw `u16` is kept on the column; this is a decoded view of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnFlags {
    /// Column is nullable.
    pub nullable: bool,
    /// Column allows case-sensitive comparison.
    pub case_sensitive: bool,
    /// Column is updateable.
    pub updateable: Updateable,
    /// Column is an identity column.
    pub identity: bool,
    /// Column is computed.
    pub computed: bool,
    /// Column has fixed-length CLR type.
    pub fixed_len_clr_type: bool,
    /// Column is a sparse column set.
    pub sparse_column_set: bool,
    /// Column is encrypted.
    pub encrypted: bool,
    /// Column is hidden.
    pub hidden: bool,
    /// Column is a key column.
    pub key: bool,
    /// Nullability unknown.
    pub nullable_unknown: bool,
}

/// Update mode for a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Updateable {
    /// Column is read-only.
    #[default]
    ReadOnly,
    /// Column is read-write.
    ReadWrite,
    /// Updateability unknown.
    Unknown,
}

impl ColumnFlags {
    /// Parse column flags from the 2-byte flags field.
    #[must_use]
    pub fn from_bits(flags: u16) -> Self {
        Self {
            nullable: (flags & 0x0001) != 0,
            case_sensitive: (flags & 0x0002) != 0,
            updateable: match (flags >> 2) & 0x03 {
                0 => Updateable::ReadOnly,
                1 => Updateable::ReadWrite,
                _ => Updateable::Unknown,
            },
            identity: (flags & 0x0010) != 0,
            computed: (flags & 0x0020) != 0,
            fixed_len_clr_type: (flags & 0x0100) != 0,
            sparse_column_set: (flags & 0x0400) != 0,
            encrypted: (flags & 0x0800) != 0,
            hidden: (flags & 0x2000) != 0,
            key: (flags & 0x4000) != 0,
            nullable_unknown: (flags & 0x8000) != 0,
        }
    }

    /// Convert flags back to bits.
    #[must_use]
    pub fn to_bits(&self) -> u16 {
        let updateable = match self.updateable {
            Updateable::ReadOnly => 0,
            Updateable::ReadWrite => 1 << 2,
            Updateable::Unknown => 2 << 2,
        };

        [
            (self.nullable, 0x0001),
            (self.case_sensitive, 0x0002),
            (self.identity, 0x0010),
            (self.computed, 0x0020),
            (self.fixed_len_clr_type, 0x0100),
            (self.sparse_column_set, 0x0400),
            (self.encrypted, 0x0800),
            (self.hidden, 0x2000),
            (self.key, 0x4000),
            (self.nullable_unknown, 0x8000),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .fold(updateable, |acc, (_, bit)| acc | bit)
    }
}
