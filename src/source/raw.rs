// src/source/raw.rs

use arrow::{
    array::{ArrayRef, Float64Builder, Int64Builder, StringBuilder},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::debug;

use super::cell::{clean_code, clean_str, parse_decimal, parse_integer};
use crate::error::{PulseError, Result};
use crate::schema::{build_arrow_schema, Column, ColumnType, Descriptor, Role};

/// Untyped rows as read from a text or SQL source.
#[derive(Debug, Default)]
pub struct RawTable {
    /// Column names as the source spells them.
    pub headers: Vec<String>,
    /// One entry per row, one optional cell per header; empty cells are `None`.
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Type the rows against `descriptor`.
    ///
    /// Required columns must be present; optional ones are kept when present;
    /// anything else the source carries is dropped.
    pub fn into_batch(self, descriptor: &Descriptor) -> Result<RecordBatch> {
        let table = descriptor.category.table_name();

        let mut resolved: Vec<(Column, usize)> = Vec::with_capacity(descriptor.columns.len());
        for col in &descriptor.columns {
            match self.headers.iter().position(|h| col.matches(h)) {
                Some(idx) => resolved.push((*col, idx)),
                None if col.required => {
                    return Err(PulseError::malformed(
                        table,
                        format!("missing column `{}` (headers: {:?})", col.name, self.headers),
                    ))
                }
                None => debug!(table, column = col.name, "optional column absent"),
            }
        }

        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(resolved.len());
        for (col, idx) in &resolved {
            arrays.push(self.build_column(table, col, *idx)?);
        }

        let columns: Vec<Column> = resolved.iter().map(|(c, _)| *c).collect();
        RecordBatch::try_new(build_arrow_schema(&columns), arrays).map_err(Into::into)
    }

    fn build_column(&self, table: &str, col: &Column, idx: usize) -> Result<ArrayRef> {
        let cells = self.rows.iter().map(|cells| cells.get(idx).and_then(|c| c.as_deref()));
        type_cells(table, col, cells)
    }
}

/// Build one typed column from text cells. Cells are cleaned first and empty
/// ones become null; anything that does not parse as the column type is
/// `MalformedTable`.
pub(crate) fn type_cells<'a>(
    table: &str,
    col: &Column,
    cells: impl Iterator<Item = Option<&'a str>>,
) -> Result<ArrayRef> {
    let cells = cells
        .enumerate()
        .map(|(row, cell)| (row, cell.map(clean_str).filter(|c| !c.is_empty())));
    let bad = |row: usize, raw: &str, what: &str| {
        PulseError::malformed(
            table,
            format!("row {} column `{}`: `{}` is {}", row + 1, col.name, raw, what),
        )
    };

    let array: ArrayRef = match col.ty {
        ColumnType::Text => {
            let mut b = StringBuilder::new();
            for (_, cell) in cells {
                b.append_option(cell);
            }
            Arc::new(b.finish())
        }
        ColumnType::Code => {
            let mut b = StringBuilder::new();
            for (_, cell) in cells {
                b.append_option(cell.map(|c| clean_code(&c)));
            }
            Arc::new(b.finish())
        }
        ColumnType::Integer => {
            let mut b = Int64Builder::new();
            for (row, cell) in cells {
                match cell {
                    Some(raw) => {
                        let v = parse_integer(&raw)
                            .ok_or_else(|| bad(row, &raw, "not an integer"))?;
                        b.append_value(v);
                    }
                    None => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Decimal => {
            let mut b = Float64Builder::new();
            for (row, cell) in cells {
                match cell {
                    Some(raw) => {
                        let v = parse_decimal(&raw).ok_or_else(|| bad(row, &raw, "not a number"))?;
                        if col.role == Role::Measure && v < 0.0 {
                            return Err(bad(row, &raw, "a negative measure"));
                        }
                        b.append_value(v);
                    }
                    None => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
    };
    Ok(array)
}
