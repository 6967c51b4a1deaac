//! BINARY and VARBINARY.

use bytes::Bytes;
use tds_types::{SqlValue, TypeError};

use super::string::data_length;
use super::{DataType, TypeCodec, effective_length, plp};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::{ColumnMetadata, PLP_MARKER};
use crate::param::Parameter;
use crate::writer::ByteWriter;

const NULL_LENGTH: u16 = 0xFFFF;

pub(super) struct BinaryCodec {
    declaration: &'static str,
    fixed: bool,
}

pub(super) static VAR_BINARY: BinaryCodec = BinaryCodec {
    declaration: "varbinary",
    fixed: false,
};
pub(super) static BINARY: BinaryCodec = BinaryCodec {
    declaration: "binary",
    fixed: true,
};

impl BinaryCodec {
    fn length(&self, param: &Parameter) -> u32 {
        param.length.unwrap_or(1)
    }

    fn is_plp(&self, ty: &DataType, param: &Parameter) -> bool {
        !self.fixed && ty.max_length.is_some_and(|max| self.length(param) > max)
    }
}

impl TypeCodec for BinaryCodec {
    fn declare(&self, ty: &DataType, param: &Parameter) -> String {
        if self.is_plp(ty, param) {
            format!("{}(max)", self.declaration)
        } else {
            format!("{}({})", self.declaration, self.length(param))
        }
    }

    fn resolve(&self, ty: &DataType, param: &mut Parameter) -> Result<(), TypeError> {
        let natural = param.value.as_bytes().map(<[u8]>::len);
        let length = effective_length(param, natural);
        if self.fixed && ty.max_length.is_some_and(|max| length > max) {
            return Err(TypeError::OutOfRange {
                target_type: ty.name,
            });
        }
        param.length = Some(length);

        if !self.is_plp(ty, param) && natural.is_some_and(|n| n > length as usize) {
            return Err(TypeError::OutOfRange {
                target_type: ty.name,
            });
        }
        Ok(())
    }

    fn type_info(
        &self,
        ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        dst.write_u8(ty.id.as_u8());
        if self.is_plp(ty, param) {
            dst.write_u16_le(PLP_MARKER as u16);
        } else {
            dst.write_u16_le(self.length(param) as u16);
        }
        Ok(())
    }

    fn parameter_length(
        &self,
        ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        if self.is_plp(ty, param) {
            plp::write_length(param.value.is_null(), dst);
        } else {
            match param.value.as_bytes() {
                Some(bytes) => dst.write_u16_le(data_length(ty, bytes.len())?),
                None => dst.write_u16_le(NULL_LENGTH),
            }
        }
        Ok(())
    }

    fn parameter_data(&self, ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        match &param.value {
            SqlValue::Null => Ok(Vec::new()),
            SqlValue::Binary(bytes) if self.is_plp(ty, param) => Ok(plp::chunks(bytes)),
            SqlValue::Binary(bytes) => Ok(vec![bytes.clone()]),
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
            SqlValue::Binary(bytes) => Ok(SqlValue::Binary(bytes)),
            other => Err(TypeError::mismatch(ty.name, other.type_name())),
        }
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
                NULL_LENGTH => None,
                len => Some(src.read_bytes(usize::from(len))?),
            }
        };
        Ok(bytes.map_or(SqlValue::Null, SqlValue::Binary))
    }
}
