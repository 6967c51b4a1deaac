//! TDS protocol version definitions.
//!
//! Several token layouts changed in TDS 7.2 (SQL Server 2005): row counts in
//! the DONE family widened from 32 to 64 bits, INFO/ERROR line numbers from
//! 16 to 32 bits, column user types from 16 to 32 bits, and TEXT/NTEXT/IMAGE
//! table names became multi-part. The `has_*` predicates below encode that
//! cutoff so that decoders never compare raw version numbers themselves.

use core::fmt;

/// TDS protocol version.
///
/// The raw value is the big-endian `u32` exchanged in LOGIN7 / LOGINACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TdsVersion(u32);

impl TdsVersion {
    /// TDS 7.0 (SQL Server 7.0)
    pub const V7_0: Self = Self(0x70000000);

    /// TDS 7.1 (SQL Server 2000)
    pub const V7_1: Self = Self(0x71000000);

    /// TDS 7.1 Revision 1 (SQL Server 2000 SP1)
    pub const V7_1_REV1: Self = Self(0x71000001);

    /// TDS 7.2 (SQL Server 2005)
    pub const V7_2: Self = Self(0x72090002);

    /// TDS 7.3A (SQL Server 2008)
    pub const V7_3A: Self = Self(0x730A0003);

    /// TDS 7.3B (SQL Server 2008 R2)
    pub const V7_3B: Self = Self(0x730B0003);

    /// TDS 7.4 (SQL Server 2012+)
    pub const V7_4: Self = Self(0x74000004);

    /// TDS 8.0 (SQL Server 2022+ strict encryption mode)
    pub const V8_0: Self = Self(0x08000000);

    /// Create a new TDS version from its raw value.
    #[must_use]
    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    /// Get the raw version value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is TDS 8.0.
    #[must_use]
    pub const fn is_tds_8(self) -> bool {
        self.0 == Self::V8_0.0
    }

    /// Check if this is one of the versions a server may acknowledge.
    #[must_use]
    pub const fn is_known(self) -> bool {
        matches!(
            self.0,
            0x70000000
                | 0x71000000
                | 0x71000001
                | 0x72090002
                | 0x730A0003
                | 0x730B0003
                | 0x74000004
                | 0x08000000
        )
    }

    /// Ordering key that places TDS 8.0 above every 7.x version.
    const fn rank(self) -> u64 {
        if self.is_tds_8() {
            u64::MAX
        } else {
            self.0 as u64
        }
    }

    /// Check whether this version is at least `other`.
    #[must_use]
    pub const fn at_least(self, other: Self) -> bool {
        self.rank() >= other.rank()
    }

    /// DONE, DONEPROC and DONEINPROC carry a 64-bit row count.
    #[must_use]
    pub const fn has_wide_row_count(self) -> bool {
        self.at_least(Self::V7_2)
    }

    /// INFO and ERROR carry a 32-bit line number.
    #[must_use]
    pub const fn has_wide_line_number(self) -> bool {
        self.at_least(Self::V7_2)
    }

    /// COLMETADATA and RETURNVALUE carry a 32-bit user type.
    #[must_use]
    pub const fn has_wide_user_type(self) -> bool {
        self.at_least(Self::V7_2)
    }

    /// TEXT, NTEXT and IMAGE columns carry a multi-part table name.
    #[must_use]
    pub const fn has_multipart_table_name(self) -> bool {
        self.at_least(Self::V7_2)
    }

    /// Get the lower of two versions.
    #[must_use]
    pub const fn min(self, other: Self) -> Self {
        if self.rank() <= other.rank() {
            self
        } else {
            other
        }
    }

    /// Get the SQL Server version name for this TDS version.
    #[must_use]
    pub const fn sql_server_version_name(&self) -> &'static str {
        match self.0 {
            0x70000000 => "SQL Server 7.0",
            0x71000000 | 0x71000001 => "SQL Server 2000",
            0x72090002 => "SQL Server 2005",
            0x730A0003 => "SQL Server 2008",
            0x730B0003 => "SQL Server 2008 R2",
            0x74000004 => "SQL Server 2012+",
            0x08000000 => "SQL Server 2022+ (strict mode)",
            _ => "Unknown SQL Server version",
        }
    }

    /// Parse a TDS version from a string.
    ///
    /// Accepts dotted (`"7.2"`, `"7.3b"`) and underscore (`"7_2"`, `"7_3_B"`)
    /// spellings, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| *c != '_' && *c != '.')
            .collect();
        match normalized.as_str() {
            "70" => Some(Self::V7_0),
            "71" => Some(Self::V7_1),
            "72" => Some(Self::V7_2),
            "73" | "73a" => Some(Self::V7_3A),
            "73b" => Some(Self::V7_3B),
            "74" => Some(Self::V7_4),
            "80" | "8" => Some(Self::V8_0),
            _ => None,
        }
    }

    /// Get the major version number.
    #[must_use]
    pub const fn major(self) -> u8 {
        if self.is_tds_8() { 8 } else { 7 }
    }

    /// Get the minor version number.
    #[must_use]
    pub const fn minor(self) -> u8 {
        if self.is_tds_8() {
            0
        } else {
            ((self.0 >> 24) & 0x0F) as u8
        }
    }

    /// Revision suffix for the two TDS 7.3 flavours.
    #[must_use]
    pub const fn revision_suffix(self) -> Option<char> {
        match self.0 {
            0x730A0003 => Some('A'),
            0x730B0003 => Some('B'),
            _ => None,
        }
    }
}

impl Default for TdsVersion {
    fn default() -> Self {
        Self::V7_4
    }
}

impl PartialOrd for TdsVersion {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TdsVersion {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for TdsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_tds_8() {
            write!(f, "TDS 8.0")
        } else if let Some(suffix) = self.revision_suffix() {
            write!(f, "TDS {}.{}{}", self.major(), self.minor(), suffix)
        } else {
            write!(f, "TDS {}.{}", self.major(), self.minor())
        }
    }
}

impl From<u32> for TdsVersion {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<TdsVersion> for u32 {
    fn from(version: TdsVersion) -> Self {
        version.0
    }
}
