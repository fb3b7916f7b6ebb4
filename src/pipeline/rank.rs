// src/pipeline/rank.rs

use arrow::{array::UInt32Array, compute::take_record_batch, record_batch::RecordBatch};
use serde::{Deserialize, Serialize};

use super::value::{column, numbers};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Largest first.
    Top,
    /// Smallest first.
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rank {
    pub measure: String,
    pub n: usize,
    pub order: Order,
}

impl Rank {
    pub fn top(measure: impl Into<String>, n: usize) -> Self {
        Rank {
            measure: measure.into(),
            n,
            order: Order::Top,
        }
    }

    pub fn bottom(measure: impl Into<String>, n: usize) -> Self {
        Rank {
            measure: measure.into(),
            n,
            order: Order::Bottom,
        }
    }

    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        apply_rank(batch, &self.measure, self.n, self.order)
    }
}

/// The `n` rows with the largest `measure`, largest first.
///
/// The sort is stable, so ties keep their input order. Rows whose measure is
/// undefined are never ranked.
pub fn top_n(batch: &RecordBatch, measure: &str, n: usize) -> Result<RecordBatch> {
    apply_rank(batch, measure, n, Order::Top)
}

/// The `n` rows with the smallest `measure`, smallest first.
pub fn bottom_n(batch: &RecordBatch, measure: &str, n: usize) -> Result<RecordBatch> {
    apply_rank(batch, measure, n, Order::Bottom)
}

pub fn apply_rank(
    batch: &RecordBatch,
    measure: &str,
    n: usize,
    order: Order,
) -> Result<RecordBatch> {
    let nums = numbers(column(batch, measure)?, measure)?;
    let mut ranked: Vec<(u32, f64)> = nums
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|f| !f.is_nan()).map(|f| (i as u32, f)))
        .collect();
    match order {
        Order::Top => ranked.sort_by(|a, b| b.1.total_cmp(&a.1)),
        Order::Bottom => ranked.sort_by(|a, b| a.1.total_cmp(&b.1)),
    }
    ranked.truncate(n);
    let indices = UInt32Array::from_iter_values(ranked.into_iter().map(|(i, _)| i));
    Ok(take_record_batch(batch, &indices)?)
}
