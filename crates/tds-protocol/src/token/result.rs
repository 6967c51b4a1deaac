//! Result set tokens: COLMETADATA, ROW, NBCROW and ORDER.

use std::sync::Arc;

use tds_types::SqlValue;

use super::{DecodeContext, with_body};
use crate::codec::decode_value;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;

/// Column count that announces "no metadata".
const NO_METADATA: u16 = 0xFFFF;

/// Column metadata token.
#[derive(Debug, Clone, PartialEq)]
pub struct ColMetadata {
    /// Column definitions, in result set order.
    pub columns: Arc<[ColumnMetadata]>,
}

impl ColMetadata {
    /// Decode a COLMETADATA token body.
    pub fn decode(src: &mut ByteCursor, ctx: &DecodeContext<'_>) -> Result<Self, ProtocolError> {
        let count = src.read_u16_le()?;
        if count == NO_METADATA {
            return Ok(Self {
                columns: Arc::from(Vec::new()),
            });
        }

        let columns = (0..count)
            .map(|_| ColumnMetadata::decode(src, ctx.version, ctx.registry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            columns: columns.into(),
        })
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the token carries no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One row of values, decoded against the current column metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Values, one per column.
    pub values: Vec<SqlValue>,
}

impl Row {
    /// Decode a ROW token body.
    pub fn decode(src: &mut ByteCursor, columns: &[ColumnMetadata]) -> Result<Self, ProtocolError> {
        let values = columns
            .iter()
            .map(|column| decode_value(src, column))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { values })
    }

    /// Decode an NBCROW token body.
    ///
    /// The null bitmap (`ceil(n / 8)` bytes, least significant bit first) is
    /// read in full before any value. Columns whose bit is set are NULL and
    /// have no bytes on the wire.
    pub fn decode_nbc(
        src: &mut ByteCursor,
        columns: &[ColumnMetadata],
    ) -> Result<Self, ProtocolError> {
        let bitmap = src.read_bytes(columns.len().div_ceil(8))?;

        let values = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                    Ok(SqlValue::Null)
                } else {
                    decode_value(src, column)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { values })
    }

    /// Get a value by column index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Column ordering of a result set (ORDER BY columns, 1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Ordered column numbers.
    pub columns: Vec<u16>,
}

impl Order {
    /// Decode an ORDER token body.
    pub fn decode(src: &mut ByteCursor) -> Result<Self, ProtocolError> {
        let length = usize::from(src.read_u16_le()?);
        let body = src.read_bytes(length)?;

        with_body(body, "ORDER length", |src| {
            let columns = (0..length / 2)
                .map(|_| src.read_u16_le())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Self { columns })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::collation::Collation;
    use crate::types::TypeId;
    use crate::version::TdsVersion;
    use crate::writer::ByteWriter;

    fn ctx() -> DecodeContext<'static> {
        DecodeContext::new(TdsVersion::V7_4)
    }

    fn metadata(columns: &[(u8, &[u8], &str)]) -> ColMetadata {
        let mut w = ByteWriter::new();
        w.write_u16_le(columns.len() as u16);
        for (type_id, type_info, name) in columns {
            w.write_u32_le(0);
            w.write_u16_le(0x0009);
            w.write_u8(*type_id);
            w.write_bytes(type_info);
            w.write_b_varchar(name);
        }
        let mut cursor = ByteCursor::from(w.as_slice());
        let metadata = ColMetadata::decode(&mut cursor, &ctx()).unwrap();
        assert!(cursor.is_empty());
        metadata
    }

    #[test]
    fn test_no_metadata() {
        let mut cursor = ByteCursor::from(&[0xFF, 0xFF][..]);
        let metadata = ColMetadata::decode(&mut cursor, &ctx()).unwrap();
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_single_int_column() {
        let metadata = metadata(&[(0x38, &[], "id")]);
        assert_eq!(metadata.len(), 1);
        let column = &metadata.columns[0];
        assert_eq!(column.user_type, 0);
        assert_eq!(column.flags, 0x0009);
        assert_eq!(column.data_type.id, TypeId::Int);
        assert_eq!(column.col_name, "id");
    }

    #[test]
    fn test_row_decode() {
        let mut nvarchar = vec![0x14, 0x00];
        nvarchar.extend_from_slice(&Collation::default().to_bytes());
        let metadata = metadata(&[
            (0x38, &[], "id"),
            (0xE7, &nvarchar, "name"),
            (0x26, &[0x04], "score"),
        ]);

        let mut w = ByteWriter::new();
        w.write_i32_le(7);
        w.write_u16_le(4);
        w.write_utf16("ab");
        w.write_u8(0);
        let mut cursor = ByteCursor::from(w.as_slice());
        let row = Row::decode(&mut cursor, &metadata.columns).unwrap();

        assert_eq!(
            row.values,
            vec![
                SqlValue::Int(7),
                SqlValue::String("ab".into()),
                SqlValue::Null
            ]
        );
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_nbc_row_bitmap() {
        let metadata = metadata(&[(0x26, &[0x04], "a"), (0x26, &[0x04], "b")]);
        // column 0 NULL, column 1 = 5
        let bytes = [0b0000_0001, 0x04, 0x05, 0x00, 0x00, 0x00];
        let mut cursor = ByteCursor::from(&bytes[..]);
        let row = Row::decode_nbc(&mut cursor, &metadata.columns).unwrap();

        assert_eq!(row.values, vec![SqlValue::Null, SqlValue::Int(5)]);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_nbc_row_spanning_bitmap_bytes() {
        let columns: Vec<(u8, &[u8], &str)> = (0..9).map(|_| (0x26, &[0x04][..], "c")).collect();
        let metadata = metadata(&columns);
        // every column NULL except the ninth
        let bytes = [0xFF, 0x00, 0x04, 0x09, 0x00, 0x00, 0x00];
        let mut cursor = ByteCursor::from(&bytes[..]);
        let row = Row::decode_nbc(&mut cursor, &metadata.columns).unwrap();

        assert_eq!(row.len(), 9);
        assert!(row.values[..8].iter().all(SqlValue::is_null));
        assert_eq!(row.get(8), Some(&SqlValue::Int(9)));
    }

    #[test]
    fn test_incomplete_row() {
        let metadata = metadata(&[(0x38, &[], "id"), (0x38, &[], "n")]);
        let mut cursor = ByteCursor::from(&[0x01, 0x00, 0x00, 0x00, 0x02][..]);
        assert!(Row::decode(&mut cursor, &metadata.columns)
            .unwrap_err()
            .is_incomplete());
    }

    #[test]
    fn test_order() {
        let mut cursor = ByteCursor::from(
            &[0x08, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00][..],
        );
        let order = Order::decode(&mut cursor).unwrap();
        assert_eq!(order.columns, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_varbinary_row_value() {
        let metadata = metadata(&[(0xA5, &[0x10, 0x00], "blob")]);
        let mut cursor = ByteCursor::from(&[0x02, 0x00, 0xCA, 0xFE][..]);
        let row = Row::decode(&mut cursor, &metadata.columns).unwrap();
        assert_eq!(
            row.values,
            vec![SqlValue::Binary(Bytes::from_static(&[0xCA, 0xFE]))]
        );
    }
}
