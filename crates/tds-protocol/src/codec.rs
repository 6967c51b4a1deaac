//! Value codec: the glue between column metadata / parameters and the
//! per-type codecs of the data type registry.

use tds_types::{SqlValue, TypeError};

use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::writer::ByteWriter;

/// Decode one column value.
///
/// Either the whole value is consumed or the cursor is left where it was.
pub fn decode_value(
    src: &mut ByteCursor,
    column: &ColumnMetadata,
) -> Result<SqlValue, ProtocolError> {
    src.atomically(|src| column.data_type.decode(src, column))
}

/// Write an RPC parameter record.
///
/// ```text
/// B_VARCHAR  name
/// u8         status flags
/// TYPE_INFO
/// length     type-specific width, PLP marker for max types
/// data
/// ```
///
/// Nothing is written to `dst` if encoding fails.
pub fn encode_parameter(param: &Parameter, dst: &mut ByteWriter) -> Result<(), TypeError> {
    let ty = param.data_type();
    let mut record = ByteWriter::new();

    record.write_b_varchar(&param.sql_name());
    record.write_u8(param.status().bits());
    ty.type_info(param, &mut record)?;
    ty.parameter_length(param, &mut record)?;
    for chunk in ty.parameter_data(param)? {
        record.write_bytes(&chunk);
    }

    dst.write_bytes(record.as_slice());
    Ok(())
}

/// Build the `@params` declaration list of an `sp_executesql` call.
///
/// `[@id int, @name nvarchar(5) output]` becomes
/// `"@id int, @name nvarchar(5) output"`.
#[must_use]
pub fn declare_parameters(params: &[Parameter]) -> String {
    params
        .iter()
        .map(|param| {
            let mut decl = format!("{} {}", param.sql_name(), param.data_type().declare(param));
            if param.is_output() {
                decl.push_str(" output");
            }
            decl
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::data_type::DataTypeRegistry;
    use crate::metadata::TypeInfo;

    fn int_column() -> ColumnMetadata {
        let mut cursor = ByteCursor::from(&[0x26, 0x04][..]);
        let info = TypeInfo::decode(&mut cursor, DataTypeRegistry::standard()).unwrap();
        ColumnMetadata::from_type_info(info, 0, 0x0001)
    }

    #[test]
    fn test_decode_value_is_atomic() {
        let column = int_column();
        let mut cursor = ByteCursor::from(&[0x04, 0x2A, 0x00][..]);
        let err = decode_value(&mut cursor, &column).unwrap_err();
        assert!(err.is_incomplete());
        assert_eq!(cursor.position(), 0);

        cursor.concat(&[0x00, 0x00]);
        assert_eq!(decode_value(&mut cursor, &column).unwrap(), SqlValue::Int(42));
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_decode_null_value() {
        let column = int_column();
        let mut cursor = ByteCursor::from(&[0x00][..]);
        assert_eq!(decode_value(&mut cursor, &column).unwrap(), SqlValue::Null);
    }

    #[test]
    fn test_encode_int_parameter() {
        let param = Parameter::typed("id", "Int", 7).unwrap();
        let mut w = ByteWriter::new();
        encode_parameter(&param, &mut w).unwrap();
        assert_eq!(
            w.as_slice(),
            &[
                0x03, b'@', 0x00, b'i', 0x00, b'd', 0x00, // name
                0x00, // status
                0x26, 0x04, // TYPE_INFO
                0x04, 0x07, 0x00, 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn test_encode_output_parameter_status() {
        let int = DataTypeRegistry::standard().by_name("Int").unwrap();
        let param = Parameter::builder("@out", int).output().build().unwrap();
        let mut w = ByteWriter::new();
        encode_parameter(&param, &mut w).unwrap();
        // name is 1 + 4 * 2 bytes
        assert_eq!(w.as_slice()[9], 0x01);
        // NULL IntN
        assert_eq!(&w.as_slice()[10..], &[0x26, 0x04, 0x00]);
    }

    #[test]
    fn test_declare_parameters() {
        let nvarchar = DataTypeRegistry::standard().by_name("NVarChar").unwrap();
        let params = vec![
            Parameter::typed("@id", "Int", 1).unwrap(),
            Parameter::builder("name", nvarchar)
                .value("hello")
                .output()
                .build()
                .unwrap(),
        ];
        assert_eq!(
            declare_parameters(&params),
            "@id int, @name nvarchar(5) output"
        );
        assert_eq!(declare_parameters(&[]), "");
    }
}
