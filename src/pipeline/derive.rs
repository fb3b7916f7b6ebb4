// src/pipeline/derive.rs

use arrow::{
    array::{Array, ArrayRef, Float64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{str::FromStr, sync::Arc};
use tracing::debug;

use super::value::{column, numbers};
use crate::error::{PulseError, Result};

/// `numerator / denominator`, appended as a Float64 column named `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ratio {
    pub numerator: String,
    pub denominator: String,
    pub output: String,
}

impl Ratio {
    /// Output column defaults to `<numerator>_per_<denominator>`.
    pub fn new(numerator: impl Into<String>, denominator: impl Into<String>) -> Self {
        let numerator = numerator.into();
        let denominator = denominator.into();
        let output = format!("{}_per_{}", numerator, denominator);
        Ratio {
            numerator,
            denominator,
            output,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}

impl FromStr for Ratio {
    type Err = PulseError;

    /// `Numerator/Denominator` or `Numerator/Denominator:output`.
    fn from_str(s: &str) -> Result<Self> {
        let (expr, output) = match s.split_once(':') {
            Some((expr, out)) => (expr, Some(out.trim())),
            None => (s, None),
        };
        let Some((num, den)) = expr.split_once('/') else {
            return Err(PulseError::InvalidQuery(format!(
                "ratio `{}` is not of the form A/B",
                s
            )));
        };
        let (num, den) = (num.trim(), den.trim());
        if num.is_empty() || den.is_empty() || output.is_some_and(str::is_empty) {
            return Err(PulseError::InvalidQuery(format!("ratio `{}` is incomplete", s)));
        }
        let ratio = Ratio::new(num, den);
        Ok(match output {
            Some(out) => ratio.with_output(out),
            None => ratio,
        })
    }
}

/// A batch with a derived column, and how many of its cells are undefined.
#[derive(Debug, Clone)]
pub struct Derived {
    pub batch: RecordBatch,
    pub undefined: usize,
}

/// Append `ratio` as a new column.
///
/// A zero or missing denominator, a missing numerator or a non-finite quotient
/// gives an undefined (null) cell rather than an error or infinity.
pub fn derive(batch: &RecordBatch, ratio: &Ratio) -> Result<RecordBatch> {
    derive_counted(batch, ratio).map(|d| d.batch)
}

pub fn derive_counted(batch: &RecordBatch, ratio: &Ratio) -> Result<Derived> {
    if batch.column_by_name(&ratio.output).is_some() {
        return Err(PulseError::InvalidQuery(format!(
            "derived column `{}` already exists",
            ratio.output
        )));
    }
    let num = numbers(column(batch, &ratio.numerator)?, &ratio.numerator)?;
    let den = numbers(column(batch, &ratio.denominator)?, &ratio.denominator)?;

    let quotient: Float64Array = num
        .into_iter()
        .zip(den)
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) if d != 0.0 => Some(n / d).filter(|q| q.is_finite()),
            _ => None,
        })
        .collect();
    let undefined = quotient.null_count();
    if undefined > 0 {
        debug!(
            column = %ratio.output,
            undefined,
            "ratio undefined for some rows"
        );
    }

    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(&ratio.output, DataType::Float64, true));
    let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();
    arrays.push(Arc::new(quotient));

    let batch = RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        arrays,
    )?;
    Ok(Derived { batch, undefined })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::aggregate::{aggregate_many, AggOp, AggSpec};
    use crate::pipeline::rank::top_n;
    use crate::pipeline::value::{values, Value};
    use arrow::array::StringArray;

    fn table(states: &[&str], num: &[Option<f64>], den: &[Option<f64>]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("State", DataType::Utf8, true),
            Field::new("Amount", DataType::Float64, true),
            Field::new("Count", DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(states.to_vec())),
                Arc::new(Float64Array::from(num.to_vec())),
                Arc::new(Float64Array::from(den.to_vec())),
            ],
        )
        .unwrap()
    }

    #[test]
    fn zero_or_missing_denominator_is_undefined() -> anyhow::Result<()> {
        let b = table(
            &["a", "b", "c", "d"],
            &[Some(10.0), Some(5.0), None, Some(9.0)],
            &[Some(4.0), Some(0.0), Some(1.0), None],
        );
        let d = derive_counted(&b, &Ratio::new("Amount", "Count").with_output("avg"))?;
        assert_eq!(d.undefined, 3);
        let avg = d.batch.column_by_name("avg").unwrap();
        assert_eq!(avg.null_count(), 3);
        assert_eq!(
            values(avg, "avg")?,
            vec![Value::Float(2.5), Value::Null, Value::Null, Value::Null]
        );
        Ok(())
    }

    #[test]
    fn undefined_cells_never_rank() -> anyhow::Result<()> {
        let b = table(
            &["a", "b", "c"],
            &[Some(10.0), Some(5.0), Some(1.0)],
            &[Some(10.0), Some(0.0), Some(2.0)],
        );
        let derived = derive(&b, &"Amount/Count:avg".parse()?)?;
        let ranked = top_n(&derived, "avg", 10)?;
        assert_eq!(
            values(ranked.column(0), "State")?,
            vec![Value::from("a"), Value::from("c")]
        );

        let grouped = aggregate_many(&derived, &["State"], &[AggSpec::new("avg", AggOp::Count)])?;
        assert_eq!(
            values(grouped.column(1), "avg")?,
            vec![Value::Int(1), Value::Int(0), Value::Int(1)]
        );
        Ok(())
    }

    #[test]
    fn parses_and_rejects() {
        let r: Ratio = "Transaction_amount / Transaction_count".parse().unwrap();
        assert_eq!(r.output, "Transaction_amount_per_Transaction_count");
        assert!("Amount".parse::<Ratio>().is_err());
        assert!("Amount/".parse::<Ratio>().is_err());
        assert!("Amount/Count:".parse::<Ratio>().is_err());

        let b = table(&["a"], &[Some(1.0)], &[Some(1.0)]);
        assert!(matches!(
            derive(&b, &Ratio::new("Amount", "Count").with_output("State")),
            Err(PulseError::InvalidQuery(_))
        ));
    }
}
