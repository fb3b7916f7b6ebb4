// src/schema/arrow.rs

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};
use std::sync::Arc;

use super::types::{Column, ColumnType};

/// Map a column type into an Arrow DataType.
///
/// - Text, Code → Utf8
/// - Integer    → Int64
/// - Decimal    → Float64
pub fn map_to_arrow_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::Text | ColumnType::Code => DataType::Utf8,
        ColumnType::Integer => DataType::Int64,
        ColumnType::Decimal => DataType::Float64,
    }
}

/// Build an ArrowSchema (inside an Arc) from a slice of `Column`s.
pub fn build_arrow_schema(cols: &[Column]) -> Arc<ArrowSchema> {
    let fields: Vec<ArrowField> = cols
        .iter()
        .map(|col| ArrowField::new(col.name, map_to_arrow_type(col.ty), /* nullable = */ true))
        .collect();

    Arc::new(ArrowSchema::new(fields))
}
