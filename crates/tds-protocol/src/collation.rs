//! SQL Server collation decoding and code page resolution.
//!
//! A collation travels as five bytes:
//!
//! ```text
//! byte 0..2  LCID, little-endian, low 20 bits
//! byte 2     high nibble: flags bits 0-3
//! byte 3     low nibble: flags bits 4-7, high nibble: version
//! byte 4     sort id
//! ```
//!
//! Single-byte character data (`CHAR`, `VARCHAR`, `TEXT`) is encoded in the
//! code page the collation selects. A non-zero sort id (SQL collations such as
//! `SQL_Latin1_General_CP1_CI_AS`) determines the code page; otherwise the
//! LCID does. A collation that resolves to nothing is reported to the caller
//! rather than replaced by a default code page.
//!
//! | Code Page | Encoding | Languages |
//! |-----------|----------|-----------|
//! | 874 | Windows-874 | Thai |
//! | 932 | Shift_JIS | Japanese |
//! | 936 | GBK | Simplified Chinese |
//! | 949 | EUC-KR | Korean |
//! | 950 | Big5 | Traditional Chinese |
//! | 1250 | Windows-1250 | Central/Eastern European |
//! | 1251 | Windows-1251 | Cyrillic |
//! | 1252 | Windows-1252 | Western European |
//! | 1253 | Windows-1253 | Greek |
//! | 1254 | Windows-1254 | Turkish |
//! | 1255 | Windows-1255 | Hebrew |
//! | 1256 | Windows-1256 | Arabic |
//! | 1257 | Windows-1257 | Baltic |
//! | 1258 | Windows-1258 | Vietnamese |
//!
//! Code pages 437 and 850 (old DOS sort orders) resolve to a name but have no
//! `encoding_rs` encoding. Character data under them fails with
//! [`ProtocolError::UnsupportedCodePage`].

use bitflags::bitflags;
use encoding_rs::Encoding;

use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::writer::ByteWriter;

/// Wire size of a collation.
pub const COLLATION_SIZE: usize = 5;

/// Mask selecting the 20-bit LCID.
pub const LCID_MASK: u32 = 0x000F_FFFF;

/// Mask selecting the language part of an LCID used for code page lookup.
pub const PRIMARY_LANGUAGE_MASK: u32 = 0x0000_FFFF;

bitflags! {
    /// Comparison flags of a collation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CollationFlags: u8 {
        /// Case-insensitive.
        const IGNORE_CASE = 0x01;
        /// Accent-insensitive.
        const IGNORE_ACCENT = 0x02;
        /// Kana-insensitive.
        const IGNORE_KANA = 0x04;
        /// Width-insensitive.
        const IGNORE_WIDTH = 0x08;
        /// Binary sort.
        const BINARY = 0x10;
        /// Code-point binary sort.
        const BINARY2 = 0x20;
        /// Character data is UTF-8 (SQL Server 2019+).
        const UTF8 = 0x40;
    }
}

/// A decoded SQL Server collation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Collation {
    /// Locale id (20 bits).
    pub lcid: u32,
    /// Comparison flags.
    pub flags: CollationFlags,
    /// Collation version (4 bits).
    pub version: u8,
    /// SQL sort order id, 0 for Windows collations.
    pub sort_id: u8,
}

impl Collation {
    /// `SQL_Latin1_General_CP1_CI_AS`, the server default on most installs.
    pub const SQL_LATIN1_GENERAL_CP1_CI_AS: Self = Self {
        lcid: 0x0409,
        flags: CollationFlags::IGNORE_CASE
            .union(CollationFlags::IGNORE_KANA)
            .union(CollationFlags::IGNORE_WIDTH),
        version: 0,
        sort_id: 52,
    };

    /// Build a collation from its five wire bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; COLLATION_SIZE]) -> Self {
        let lcid = (u32::from(bytes[2] & 0x0F) << 16)
            | (u32::from(bytes[1]) << 8)
            | u32::from(bytes[0]);
        let flags = (bytes[2] >> 4) | ((bytes[3] & 0x0F) << 4);

        Self {
            lcid,
            flags: CollationFlags::from_bits_retain(flags),
            version: bytes[3] >> 4,
            sort_id: bytes[4],
        }
    }

    /// The five wire bytes of this collation.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; COLLATION_SIZE] {
        let lcid = self.lcid & LCID_MASK;
        let flags = self.flags.bits();
        [
            (lcid & 0xFF) as u8,
            ((lcid >> 8) & 0xFF) as u8,
            ((lcid >> 16) & 0x0F) as u8 | ((flags & 0x0F) << 4),
            (flags >> 4) | ((self.version & 0x0F) << 4),
            self.sort_id,
        ]
    }

    /// Read a collation from the cursor.
    pub fn decode(cursor: &mut ByteCursor) -> Result<Self, ProtocolError> {
        let bytes = cursor.read_bytes(COLLATION_SIZE)?;
        let mut raw = [0u8; COLLATION_SIZE];
        raw.copy_from_slice(&bytes);
        Ok(Self::from_bytes(raw))
    }

    /// Write the collation's wire bytes.
    pub fn encode(&self, dst: &mut ByteWriter) {
        dst.write_bytes(&self.to_bytes());
    }

    /// Whether character data under this collation is UTF-8.
    #[must_use]
    pub fn is_utf8(&self) -> bool {
        self.flags.contains(CollationFlags::UTF8)
    }

    /// Windows code page number, sort id first, then LCID.
    ///
    /// Returns `None` for UTF-8 collations and for unknown collations.
    #[must_use]
    pub fn code_page_number(&self) -> Option<u16> {
        if self.is_utf8() {
            return None;
        }
        code_page_for_sort_id(self.sort_id).or_else(|| code_page_for_lcid(self.lcid))
    }

    /// Code page name such as `"CP1252"`, or `"UTF-8"` for UTF-8 collations.
    #[must_use]
    pub fn code_page(&self) -> Option<&'static str> {
        if self.is_utf8() {
            return Some("UTF-8");
        }
        self.code_page_number().and_then(code_page_name)
    }

    /// Character encoding for single-byte character data.
    #[must_use]
    pub fn encoding(&self) -> Option<&'static Encoding> {
        if self.is_utf8() {
            return Some(encoding_rs::UTF_8);
        }
        self.code_page_number().and_then(encoding_for_code_page)
    }

    /// Like [`encoding`](Self::encoding), reporting an unresolvable collation
    /// as an error.
    pub fn require_encoding(&self) -> Result<&'static Encoding, ProtocolError> {
        self.encoding().ok_or_else(|| match self.code_page_number() {
            Some(code_page) => ProtocolError::UnsupportedCodePage {
                code_page,
                lcid: self.lcid,
                sort_id: self.sort_id,
            },
            None => ProtocolError::UnsupportedCollation {
                lcid: self.lcid,
                sort_id: self.sort_id,
            },
        })
    }
}

impl Default for Collation {
    fn default() -> Self {
        Self::SQL_LATIN1_GENERAL_CP1_CI_AS
    }
}

/// Code page selected by a SQL sort order id.
#[must_use]
pub fn code_page_for_sort_id(sort_id: u8) -> Option<u16> {
    match sort_id {
        30..=35 => Some(437),
        40..=45 | 49 | 55..=61 => Some(850),
        50..=54 | 71..=75 | 183..=186 | 210..=217 => Some(1252),
        80..=98 => Some(1250),
        104..=108 => Some(1251),
        112..=114 | 120..=122 | 124 => Some(1253),
        128..=130 => Some(1254),
        136..=138 => Some(1255),
        144..=146 => Some(1256),
        152..=160 => Some(1257),
        192 | 193 | 200 => Some(932),
        194 | 195 | 201 => Some(949),
        196 | 197 | 202 => Some(950),
        198 | 199 | 203 => Some(936),
        204..=206 => Some(874),
        _ => None,
    }
}

/// Code page selected by a Windows LCID.
///
/// Locales that only exist as Unicode (Hindi, Georgian, ...) have no code
/// page and return `None`.
#[must_use]
pub fn code_page_for_lcid(lcid: u32) -> Option<u16> {
    match lcid & PRIMARY_LANGUAGE_MASK {
        0x0411 => Some(932),
        0x0804 | 0x1004 => Some(936),
        0x0412 => Some(949),
        0x0404 | 0x0C04 | 0x1404 => Some(950),
        0x041E => Some(874),
        0x042A => Some(1258),
        0x0408 => Some(1253),
        0x040D => Some(1255),
        0x041F | 0x042C | 0x0443 => Some(1254),
        0x0425..=0x0427 | 0x0827 => Some(1257),

        // Central European
        0x0405 | 0x040E | 0x0415 | 0x0418 | 0x041A | 0x041B | 0x041C | 0x0424 | 0x0442
        | 0x081A | 0x101A | 0x141A | 0x181A => Some(1250),

        // Cyrillic
        0x0402 | 0x0419 | 0x0422 | 0x0423 | 0x0428 | 0x042F | 0x043F | 0x0440 | 0x0444
        | 0x0450 | 0x046D | 0x0485 | 0x082C | 0x0843 | 0x0850 | 0x0C1A | 0x1C1A | 0x201A => {
            Some(1251)
        }

        // Arabic
        0x0401 | 0x0420 | 0x0429 | 0x0480 | 0x048C | 0x0801 | 0x0C01 | 0x1001 | 0x1401
        | 0x1801 | 0x1C01 | 0x2001 | 0x2401 | 0x2801 | 0x2C01 | 0x3001 | 0x3401 | 0x3801
        | 0x3C01 | 0x4001 => Some(1256),

        // Western European and the Latin-script locales grouped with it
        0x0403 | 0x0406 | 0x0407 | 0x0409 | 0x040A | 0x040B | 0x040C | 0x040F | 0x0410
        | 0x0413 | 0x0414 | 0x0416 | 0x0417 | 0x041D | 0x0421 | 0x042B | 0x042D | 0x042E
        | 0x0432 | 0x0434..=0x0438 | 0x043B | 0x043E | 0x0441 | 0x0452 | 0x0456 | 0x045D
        | 0x045E | 0x0462 | 0x0464 | 0x0468 | 0x046A..=0x046C | 0x046E..=0x0470 | 0x0478
        | 0x047A | 0x047C | 0x047E | 0x0482..=0x0484 | 0x0486..=0x0488 | 0x0807 | 0x0809
        | 0x080A | 0x080C | 0x0810 | 0x0813 | 0x0814 | 0x0816 | 0x081D | 0x082E | 0x083B
        | 0x083C | 0x083E | 0x085D | 0x085F | 0x086B | 0x0C07 | 0x0C09 | 0x0C0A | 0x0C0C
        | 0x0C3B | 0x0C6B | 0x1007 | 0x1009 | 0x100A | 0x100C | 0x103B | 0x1407 | 0x1409
        | 0x140A | 0x140C | 0x143B | 0x1809 | 0x180A | 0x180C | 0x183B | 0x1C09 | 0x1C0A
        | 0x1C3B | 0x2009 | 0x200A | 0x203B | 0x2409 | 0x240A | 0x243B | 0x2809 | 0x280A
        | 0x2C09 | 0x2C0A | 0x3009 | 0x300A | 0x3409 | 0x340A | 0x380A | 0x3C0A | 0x4009
        | 0x400A | 0x4409 | 0x440A | 0x4809 | 0x480A | 0x4C0A | 0x500A | 0x540A => Some(1252),

        _ => None,
    }
}

/// Name of a code page in `CPnnnn` form.
#[must_use]
pub fn code_page_name(code_page: u16) -> Option<&'static str> {
    match code_page {
        437 => Some("CP437"),
        850 => Some("CP850"),
        874 => Some("CP874"),
        932 => Some("CP932"),
        936 => Some("CP936"),
        949 => Some("CP949"),
        950 => Some("CP950"),
        1250 => Some("CP1250"),
        1251 => Some("CP1251"),
        1252 => Some("CP1252"),
        1253 => Some("CP1253"),
        1254 => Some("CP1254"),
        1255 => Some("CP1255"),
        1256 => Some("CP1256"),
        1257 => Some("CP1257"),
        1258 => Some("CP1258"),
        _ => None,
    }
}

/// `encoding_rs` encoding for a Windows code page.
#[must_use]
pub fn encoding_for_code_page(code_page: u16) -> Option<&'static Encoding> {
    match code_page {
        874 => Some(encoding_rs::WINDOWS_874),
        932 => Some(encoding_rs::SHIFT_JIS),
        936 => Some(encoding_rs::GBK),
        949 => Some(encoding_rs::EUC_KR),
        950 => Some(encoding_rs::BIG5),
        1250 => Some(encoding_rs::WINDOWS_1250),
        1251 => Some(encoding_rs::WINDOWS_1251),
        1252 => Some(encoding_rs::WINDOWS_1252),
        1253 => Some(encoding_rs::WINDOWS_1253),
        1254 => Some(encoding_rs::WINDOWS_1254),
        1255 => Some(encoding_rs::WINDOWS_1255),
        1256 => Some(encoding_rs::WINDOWS_1256),
        1257 => Some(encoding_rs::WINDOWS_1257),
        1258 => Some(encoding_rs::WINDOWS_1258),
        _ => None,
    }
}
