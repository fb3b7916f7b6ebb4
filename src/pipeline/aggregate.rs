// src/pipeline/aggregate.rs

use arrow::{
    array::{ArrayRef, Float64Array, Int64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use super::value::{column, numbers, to_array, value_type, values, Value};
use crate::error::{PulseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggOp {
    Sum,
    Mean,
    /// Number of defined measure cells.
    Count,
    /// Number of distinct defined measure values.
    NUnique,
}

impl AggOp {
    pub const fn name(&self) -> &'static str {
        match self {
            AggOp::Sum => "sum",
            AggOp::Mean => "mean",
            AggOp::Count => "count",
            AggOp::NUnique => "nunique",
        }
    }

    fn output_type(&self) -> DataType {
        match self {
            AggOp::Sum | AggOp::Mean => DataType::Float64,
            AggOp::Count | AggOp::NUnique => DataType::Int64,
        }
    }
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggOp {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(AggOp::Sum),
            "mean" | "avg" => Ok(AggOp::Mean),
            "count" => Ok(AggOp::Count),
            "nunique" => Ok(AggOp::NUnique),
            other => Err(PulseError::InvalidQuery(format!(
                "unknown aggregation `{}`",
                other
            ))),
        }
    }
}

/// One output column of a grouping: `op(column)`, named `alias` or `column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggSpec {
    pub column: String,
    pub op: AggOp,
    pub alias: Option<String>,
}

impl AggSpec {
    pub fn new(column: impl Into<String>, op: AggOp) -> Self {
        AggSpec {
            column: column.into(),
            op,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

impl FromStr for AggSpec {
    type Err = PulseError;

    /// `column:op` or `column:op:alias`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':').map(str::trim);
        let (Some(column), Some(op)) = (parts.next(), parts.next()) else {
            return Err(PulseError::InvalidQuery(format!(
                "aggregation `{}` is not of the form column:op",
                s
            )));
        };
        if column.is_empty() {
            return Err(PulseError::InvalidQuery(format!("aggregation `{}` has no column", s)));
        }
        let spec = AggSpec::new(column, op.parse()?);
        match (parts.next(), parts.next()) {
            (None, _) => Ok(spec),
            (Some(alias), None) if !alias.is_empty() => Ok(spec.with_alias(alias)),
            _ => Err(PulseError::InvalidQuery(format!("aggregation `{}` has a bad alias", s))),
        }
    }
}

/// Group by `group_keys` and reduce `measure` with `op`.
pub fn aggregate<S: AsRef<str>>(
    batch: &RecordBatch,
    group_keys: &[S],
    measure: &str,
    op: AggOp,
) -> Result<RecordBatch> {
    aggregate_many(batch, group_keys, &[AggSpec::new(measure, op)])
}

/// Group by `group_keys` and compute every spec in one pass.
///
/// One output row per key combination present in the input, in ascending key
/// order. Undefined (null) measure cells are skipped; sum and mean of a group
/// with no defined cells are null. Sums are taken over the group's values in
/// sorted order, so the result does not depend on row order.
pub fn aggregate_many<S: AsRef<str>>(
    batch: &RecordBatch,
    group_keys: &[S],
    specs: &[AggSpec],
) -> Result<RecordBatch> {
    if specs.is_empty() {
        return Err(PulseError::InvalidQuery("no aggregation requested".into()));
    }
    let mut out_names: Vec<&str> = group_keys.iter().map(|k| k.as_ref()).collect();
    for spec in specs {
        if out_names.contains(&spec.output_name()) {
            return Err(PulseError::InvalidQuery(format!(
                "duplicate output column `{}`",
                spec.output_name()
            )));
        }
        out_names.push(spec.output_name());
    }

    let mut keys: Vec<(&str, DataType, Vec<Value>)> = Vec::with_capacity(group_keys.len());
    for key in group_keys {
        let key = key.as_ref();
        let array = column(batch, key)?;
        let ty = value_type(array.data_type()).ok_or_else(|| PulseError::UnsupportedType {
            column: key.to_string(),
            data_type: array.data_type().clone(),
        })?;
        keys.push((key, ty, values(array, key)?));
    }
    let measures: Vec<Vec<Option<f64>>> = specs
        .iter()
        .map(|s| numbers(column(batch, &s.column)?, &s.column))
        .collect::<Result<_>>()?;

    let mut groups: BTreeMap<Vec<Value>, Vec<Vec<f64>>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let key: Vec<Value> = keys.iter().map(|(_, _, vals)| vals[row].clone()).collect();
        let acc = groups
            .entry(key)
            .or_insert_with(|| vec![Vec::new(); specs.len()]);
        for (slot, measure) in acc.iter_mut().zip(&measures) {
            if let Some(v) = measure[row] {
                slot.push(v);
            }
        }
    }

    let mut fields = Vec::with_capacity(keys.len() + specs.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(keys.len() + specs.len());
    for (i, (name, ty, _)) in keys.iter().enumerate() {
        let column_values: Vec<Value> = groups.keys().map(|k| k[i].clone()).collect();
        fields.push(Field::new(*name, ty.clone(), true));
        arrays.push(to_array(&column_values, name, ty)?);
    }
    for (i, spec) in specs.iter().enumerate() {
        fields.push(Field::new(spec.output_name(), spec.op.output_type(), true));
        let reduced = groups.values().map(|acc| reduce(spec.op, &acc[i]));
        let array: ArrayRef = match spec.op.output_type() {
            DataType::Int64 => Arc::new(
                reduced
                    .map(|v| v.map(|f| f as i64))
                    .collect::<Int64Array>(),
            ),
            _ => Arc::new(reduced.collect::<Float64Array>()),
        };
        arrays.push(array);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

fn reduce(op: AggOp, values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().map(|v| v + 0.0).collect();
    sorted.sort_by(f64::total_cmp);
    match op {
        AggOp::Count => Some(sorted.len() as f64),
        AggOp::NUnique => {
            sorted.dedup_by(|a, b| a.to_bits() == b.to_bits());
            Some(sorted.len() as f64)
        }
        AggOp::Sum if sorted.is_empty() => None,
        AggOp::Sum => Some(sorted.iter().sum()),
        AggOp::Mean if sorted.is_empty() => None,
        AggOp::Mean => Some(sorted.iter().sum::<f64>() / sorted.len() as f64),
    }
}
