//! Table-valued parameters.
//!
//! ```text
//! TYPE_INFO   0xF3, B_VARCHAR db (empty), B_VARCHAR schema, B_VARCHAR type
//! length      u16 column count, 0xFFFF for a NULL table
//! columns     per column: u32 user type, u16 flags, TYPE_INFO, B_VARCHAR name
//!             0x00
//! rows        per row: 0x01, then each cell's length and data
//!             0x00
//! ```
//!
//! Column names are sent empty: the server binds cells by position.

use bytes::Bytes;
use tds_types::{SqlValue, TableValue, TypeError};

use super::{DataType, DataTypeRef, DataTypeRegistry, TypeCodec};
use crate::collation::Collation;
use crate::cursor::ByteCursor;
use crate::error::ProtocolError;
use crate::metadata::ColumnMetadata;
use crate::param::Parameter;
use crate::types::TypeId;
use crate::writer::ByteWriter;

const NULL_TABLE: u16 = 0xFFFF;
const ROW_TOKEN: u8 = 0x01;
const END_TOKEN: u8 = 0x00;

pub(super) struct TvpCodec;

pub(super) static TVP: TvpCodec = TvpCodec;

fn column_types(table: &TableValue) -> Result<Vec<DataTypeRef>, TypeError> {
    let registry = DataTypeRegistry::standard();
    table
        .columns
        .iter()
        .map(|column| {
            registry
                .by_name(&column.type_name)
                .filter(|ty| ty.id != TypeId::Tvp)
                .ok_or_else(|| TypeError::UnsupportedConversion {
                    from: column.type_name.clone(),
                    to: "table-valued parameter column",
                })
        })
        .collect()
}

/// Cell parameters for every row, plus one NULL parameter per column that
/// describes the column metadata. Cells share their column's length.
fn layout(
    table: &TableValue,
    collation: Option<Collation>,
) -> Result<(Vec<Parameter>, Vec<Vec<Parameter>>), TypeError> {
    let types = column_types(table)?;

    let mut lengths: Vec<Option<u32>> = table.columns.iter().map(|c| c.length).collect();
    for (r, row) in table.rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            let column = &table.columns[c];
            if column.length.is_some() {
                continue;
            }
            let cell = Parameter::cell(
                types[c],
                value.clone(),
                None,
                column.precision,
                column.scale,
                collation,
            )
            .map_err(|e| e.in_tvp_cell(r, c))?;
            lengths[c] = lengths[c].max(cell.length);
        }
    }

    let cell = |c: usize, value: SqlValue| {
        let column = &table.columns[c];
        Parameter::cell(
            types[c],
            value,
            lengths[c],
            column.precision,
            column.scale,
            collation,
        )
    };

    let columns = (0..table.columns.len())
        .map(|c| cell(c, SqlValue::Null))
        .collect::<Result<Vec<_>, _>>()?;
    let rows = table
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(|(c, value)| cell(c, value.clone()).map_err(|e| e.in_tvp_cell(r, c)))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((columns, rows))
}

impl TypeCodec for TvpCodec {
    fn declare(&self, _ty: &DataType, param: &Parameter) -> String {
        match param.value.as_table() {
            Some(table) if !table.schema.is_empty() => {
                format!("{}.{} readonly", table.schema, table.type_name)
            }
            Some(table) => format!("{} readonly", table.type_name),
            None => "table readonly".to_string(),
        }
    }

    fn type_info(
        &self,
        ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        let (schema, type_name) = param
            .value
            .as_table()
            .map_or(("", ""), |t| (t.schema.as_str(), t.type_name.as_str()));
        dst.write_u8(ty.id.as_u8());
        dst.write_b_varchar("");
        dst.write_b_varchar(schema);
        dst.write_b_varchar(type_name);
        Ok(())
    }

    fn parameter_length(
        &self,
        _ty: &DataType,
        param: &Parameter,
        dst: &mut ByteWriter,
    ) -> Result<(), TypeError> {
        match param.value.as_table() {
            Some(table) => dst.write_u16_le(table.columns.len() as u16),
            None => dst.write_u16_le(NULL_TABLE),
        }
        Ok(())
    }

    fn parameter_data(&self, _ty: &DataType, param: &Parameter) -> Result<Vec<Bytes>, TypeError> {
        let mut dst = ByteWriter::new();
        let Some(table) = param.value.as_table() else {
            dst.write_u8(END_TOKEN);
            dst.write_u8(END_TOKEN);
            return Ok(vec![dst.freeze()]);
        };

        let (columns, rows) = layout(table, param.collation)?;
        for column in &columns {
            dst.write_u32_le(0);
            dst.write_u16_le(0);
            column.data_type.type_info(column, &mut dst)?;
            dst.write_b_varchar("");
        }
        dst.write_u8(END_TOKEN);

        for (r, row) in rows.iter().enumerate() {
            dst.write_u8(ROW_TOKEN);
            for (c, cell) in row.iter().enumerate() {
                let cell_ty = cell.data_type;
                cell_ty
                    .parameter_length(cell, &mut dst)
                    .map_err(|e| e.in_tvp_cell(r, c))?;
                for chunk in cell_ty
                    .parameter_data(cell)
                    .map_err(|e| e.in_tvp_cell(r, c))?
                {
                    dst.write_bytes(&chunk);
                }
            }
        }
        dst.write_u8(END_TOKEN);

        Ok(vec![dst.freeze()])
    }

    fn validate(
        &self,
        ty: &DataType,
        value: SqlValue,
        collation: Option<&Collation>,
    ) -> Result<SqlValue, TypeError> {
        let mut table = match value {
            SqlValue::Null => return Ok(SqlValue::Null),
            SqlValue::Table(table) => table,
            other => return Err(TypeError::mismatch(ty.name, other.type_name())),
        };

        let types = column_types(&table)?;
        let width = types.len();
        for (r, row) in table.rows.iter_mut().enumerate() {
            if row.len() != width {
                return Err(TypeError::TypeMismatch {
                    expected: "row with one value per column",
                    actual: format!("{} values for {} columns", row.len(), width),
                }
                .in_tvp_cell(r, row.len().min(width)));
            }
            for (c, cell) in row.iter_mut().enumerate() {
                let value = std::mem::take(cell);
                *cell = types[c]
                    .validate(value, collation)
                    .map_err(|e| e.in_tvp_cell(r, c))?;
            }
        }

        // Length, precision and scale checks run per cell.
        layout(&table, collation.copied())?;
        Ok(SqlValue::Table(table))
    }

    fn decode(
        &self,
        ty: &DataType,
        _src: &mut ByteCursor,
        _column: &ColumnMetadata,
    ) -> Result<SqlValue, ProtocolError> {
        Err(ProtocolError::InvalidValue {
            field: "column data type",
            value: u64::from(ty.id.as_u8()),
        })
    }
}
