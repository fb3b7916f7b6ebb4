// src/table.rs

use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray},
    compute::{cast, cast_with_options, CastOptions},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{PulseError, Result};
use crate::schema::{
    build_arrow_schema, map_to_arrow_type, Category, Column, ColumnType, Descriptor, Role,
};
use crate::source::{cell::clean_code, raw::type_cells, RawTable};

/// An immutable, schema-checked table for one category.
#[derive(Debug, Clone)]
pub struct RecordTable {
    category: Category,
    batch: RecordBatch,
    loaded_at: DateTime<Utc>,
}

impl RecordTable {
    /// Type raw text rows against the category schema.
    pub fn from_raw(category: Category, raw: RawTable) -> Result<Self> {
        let batch = raw.into_batch(&category.descriptor())?;
        Ok(Self::stamp(category, batch))
    }

    /// Normalise an Arrow batch from a typed source: headers are matched by
    /// name or alias, cast to the schema types, extras dropped.
    pub fn from_batch(category: Category, batch: RecordBatch) -> Result<Self> {
        let descriptor = category.descriptor();
        let table = category.table_name();
        let schema = batch.schema();

        let mut columns: Vec<Column> = Vec::with_capacity(descriptor.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(descriptor.columns.len());
        for col in &descriptor.columns {
            let Some(idx) = schema.fields().iter().position(|f| col.matches(f.name())) else {
                if col.required {
                    return Err(PulseError::malformed(
                        table,
                        format!("missing column `{}`", col.name),
                    ));
                }
                continue;
            };
            let array = retype(table, col, batch.column(idx))?;
            if col.role == Role::Measure {
                check_non_negative(table, col, &array)?;
            }
            columns.push(*col);
            arrays.push(array);
        }

        let batch = RecordBatch::try_new(build_arrow_schema(&columns), arrays)?;
        Ok(Self::stamp(category, batch))
    }

    fn stamp(category: Category, batch: RecordBatch) -> Self {
        RecordTable {
            category,
            batch,
            loaded_at: Utc::now(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn descriptor(&self) -> Descriptor {
        self.category.descriptor()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Convert one source column to the schema type without losing cells: text is
/// parsed the same way raw rows are, fractional floats never become integers,
/// and any other conversion that would null a present cell is malformed.
fn retype(table: &str, col: &Column, array: &ArrayRef) -> Result<ArrayRef> {
    let bad = |detail: String| {
        PulseError::malformed(table, format!("column `{}`: {}", col.name, detail))
    };

    if matches!(array.data_type(), DataType::Utf8 | DataType::LargeUtf8) {
        let text = cast(array, &DataType::Utf8)?;
        let text = text
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| bad(format!("cannot read {} as text", array.data_type())))?;
        return type_cells(table, col, text.iter());
    }

    if col.ty == ColumnType::Integer && array.data_type().is_floating() {
        let floats = cast(array, &DataType::Float64)?;
        if let Some(values) = floats.as_any().downcast_ref::<Float64Array>() {
            if let Some(row) = values
                .iter()
                .position(|v| v.is_some_and(|v| !v.is_finite() || v.fract() != 0.0))
            {
                let detail = format!("row {}: `{}` is not an integer", row + 1, values.value(row));
                return Err(bad(detail));
            }
        }
    }

    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let typed = cast_with_options(array, &map_to_arrow_type(col.ty), &options)
        .map_err(|e| bad(e.to_string()))?;
    if typed.null_count() > array.null_count() {
        let lost = typed.null_count() - array.null_count();
        return Err(bad(format!("{lost} cells could not be converted")));
    }
    Ok(match col.ty {
        ColumnType::Code => normalise_codes(&typed),
        _ => typed,
    })
}

fn normalise_codes(array: &ArrayRef) -> ArrayRef {
    match array.as_any().downcast_ref::<StringArray>() {
        Some(sarr) => {
            let cleaned: StringArray = sarr.iter().map(|opt| opt.map(clean_code)).collect();
            Arc::new(cleaned)
        }
        None => array.clone(),
    }
}

fn check_non_negative(table: &str, col: &Column, array: &ArrayRef) -> Result<()> {
    let values = array
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| PulseError::UnsupportedType {
            column: col.name.to_string(),
            data_type: array.data_type().clone(),
        })?;
    if let Some(row) = values
        .iter()
        .position(|v| v.map_or(false, |v| v < 0.0 || !v.is_finite()))
    {
        return Err(PulseError::malformed(
            table,
            format!("row {} column `{}` is not a non-negative number", row + 1, col.name),
        ));
    }
    Ok(())
}
