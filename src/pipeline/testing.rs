// src/pipeline/testing.rs

use arrow::{
    array::{ArrayRef, Float64Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

pub(crate) fn batch(
    states: &[&str],
    years: &[i64],
    quarters: &[i64],
    types: &[&str],
    amounts: &[f64],
) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("State", DataType::Utf8, true),
        Field::new("Year", DataType::Int64, true),
        Field::new("Quarter", DataType::Int64, true),
        Field::new("Transaction_type", DataType::Utf8, true),
        Field::new("Amount", DataType::Float64, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(states.to_vec())),
        Arc::new(Int64Array::from(years.to_vec())),
        Arc::new(Int64Array::from(quarters.to_vec())),
        Arc::new(StringArray::from(types.to_vec())),
        Arc::new(Float64Array::from(amounts.to_vec())),
    ];
    RecordBatch::try_new(schema, columns).expect("fixture batch")
}

/// The three rows of the worked example: MH 100, MH 50, KA 30, all 2022 Q1 Recharge.
pub(crate) fn worked_example() -> RecordBatch {
    batch(
        &["MH", "MH", "KA"],
        &[2022, 2022, 2022],
        &[1, 1, 1],
        &["Recharge", "Recharge", "Recharge"],
        &[100.0, 50.0, 30.0],
    )
}

/// Six rows over two years, three states and two transaction types.
pub(crate) fn transactions() -> RecordBatch {
    batch(
        &["MH", "MH", "KA", "TN", "KA", "TN"],
        &[2022, 2022, 2022, 2021, 2022, 2021],
        &[1, 1, 1, 2, 2, 1],
        &["Recharge", "Recharge", "Recharge", "Payments", "Payments", "Recharge"],
        &[100.0, 50.0, 30.0, 20.0, 60.0, 70.0],
    )
}
