// src/pipeline/filter.rs

use arrow::{array::BooleanArray, compute::filter_record_batch, record_batch::RecordBatch};
use std::collections::BTreeSet;

use super::value::{column, values, Value};
use crate::error::{PulseError, Result};
use crate::schema::{ColumnType, Dimension};
use crate::source::cell::clean_code;

/// What a predicate admits. `All` is the "no filter" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Equals(Value),
    OneOf(Vec<Value>),
    /// Inclusive on both bounds.
    Between(Value, Value),
}

impl Selection {
    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    /// Parse the textual form used by the command line:
    /// `All` (or empty), `lo..hi`, `a,b,c`, or a single value.
    /// Values stay text here and are coerced to the column type when applied.
    pub fn parse(text: &str) -> Selection {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("all") {
            return Selection::All;
        }
        if let Some((lo, hi)) = text.split_once("..") {
            return Selection::Between(Value::from(lo.trim()), Value::from(hi.trim()));
        }
        if text.contains(',') {
            return Selection::OneOf(
                text.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(Value::from)
                    .collect(),
            );
        }
        Selection::Equals(Value::from(text))
    }

    fn coerce(&self, column: &str, data_type: &arrow::datatypes::DataType) -> Result<Selection> {
        Ok(match self {
            Selection::All => Selection::All,
            Selection::Equals(v) => Selection::Equals(v.coerce(column, data_type)?),
            Selection::OneOf(vs) => Selection::OneOf(
                vs.iter()
                    .map(|v| v.coerce(column, data_type))
                    .collect::<Result<_>>()?,
            ),
            Selection::Between(lo, hi) => {
                Selection::Between(lo.coerce(column, data_type)?, hi.coerce(column, data_type)?)
            }
        })
    }

    /// Spell text values the way code columns store them, so `560001.0`
    /// selects `560001`.
    fn normalise_codes(self) -> Selection {
        let clean = |v: Value| match v {
            Value::Str(s) => Value::Str(clean_code(&s)),
            other => other,
        };
        match self {
            Selection::All => Selection::All,
            Selection::Equals(v) => Selection::Equals(clean(v)),
            Selection::OneOf(vs) => Selection::OneOf(vs.into_iter().map(clean).collect()),
            Selection::Between(lo, hi) => Selection::Between(clean(lo), clean(hi)),
        }
    }

    /// Null cells only pass `All` or an explicit null.
    fn admits(&self, v: &Value) -> bool {
        match self {
            Selection::All => true,
            Selection::Equals(want) => want == v,
            Selection::OneOf(set) => set.contains(v),
            Selection::Between(lo, hi) => !v.is_null() && lo <= v && v <= hi,
        }
    }
}

/// A (column, selection) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: String,
    pub selection: Selection,
    /// The column may be absent from a table; an absent column reads as all
    /// null instead of failing.
    pub optional: bool,
}

impl Predicate {
    pub fn new(column: impl Into<String>, selection: Selection) -> Self {
        Predicate {
            column: column.into(),
            selection,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Selection::Equals(value.into()))
    }

    pub fn one_of<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::new(
            column,
            Selection::OneOf(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn between(column: impl Into<String>, lo: impl Into<Value>, hi: impl Into<Value>) -> Self {
        Self::new(column, Selection::Between(lo.into(), hi.into()))
    }
}

/// Keep the rows that satisfy every predicate, in their original order.
///
/// No match is an empty batch with the same schema, not an error. A predicate
/// naming a column the batch lacks is an error unless its selection is `All`
/// or the predicate is optional. Text values aimed at a code column are
/// cleaned the same way loaded codes are.
pub fn filter(batch: &RecordBatch, predicates: &[Predicate]) -> Result<RecordBatch> {
    let mut mask = vec![true; batch.num_rows()];
    let mut narrowed = false;

    for p in predicates.iter().filter(|p| !p.selection.is_all()) {
        let array = match column(batch, &p.column) {
            Ok(array) => array,
            Err(PulseError::MissingColumn { .. }) if p.optional => {
                if !p.selection.admits(&Value::Null) {
                    narrowed |= mask.iter().any(|keep| *keep);
                    mask.fill(false);
                }
                continue;
            }
            Err(e) => return Err(e),
        };
        let mut selection = p.selection.coerce(&p.column, array.data_type())?;
        if is_code_column(&p.column) {
            selection = selection.normalise_codes();
        }
        for (keep, v) in mask.iter_mut().zip(values(array, &p.column)?) {
            if *keep && !selection.admits(&v) {
                *keep = false;
                narrowed = true;
            }
        }
    }

    if !narrowed {
        return Ok(batch.clone());
    }
    let mask = BooleanArray::from(mask);
    Ok(filter_record_batch(batch, &mask)?)
}

fn is_code_column(name: &str) -> bool {
    Dimension::from_name(name).is_some_and(|d| d.column().ty == ColumnType::Code)
}

/// Smallest and largest non-null value of a column, for slider domains.
/// Call it on the unfiltered table. `None` when the column has no values.
pub fn bounds(batch: &RecordBatch, name: &str) -> Result<Option<(Value, Value)>> {
    let vals = values(column(batch, name)?, name)?;
    let mut present = vals.into_iter().filter(|v| !v.is_null());
    let Some(first) = present.next() else {
        return Ok(None);
    };
    let (lo, hi) = present.fold((first.clone(), first), |(lo, hi), v| {
        if v < lo {
            (v, hi)
        } else if v > hi {
            (lo, v)
        } else {
            (lo, hi)
        }
    });
    Ok(Some((lo, hi)))
}

/// Sorted distinct non-null values of a column, for dropdowns.
pub fn distinct(batch: &RecordBatch, name: &str) -> Result<Vec<Value>> {
    let set: BTreeSet<Value> = values(column(batch, name)?, name)?
        .into_iter()
        .filter(|v| !v.is_null())
        .collect();
    Ok(set.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PulseError;
    use crate::pipeline::testing::transactions;

    #[test]
    fn parses_selection_text() {
        assert_eq!(Selection::parse("All"), Selection::All);
        assert_eq!(Selection::parse(""), Selection::All);
        assert_eq!(
            Selection::parse("2019..2021"),
            Selection::Between(Value::from("2019"), Value::from("2021"))
        );
        assert_eq!(
            Selection::parse("goa, kerala"),
            Selection::OneOf(vec![Value::from("goa"), Value::from("kerala")])
        );
        assert_eq!(Selection::parse("3"), Selection::Equals(Value::from("3")));
    }

    #[test]
    fn every_kept_row_matches_and_every_dropped_row_fails() -> anyhow::Result<()> {
        let batch = transactions();
        let preds = vec![
            Predicate::equals("Year", 2022),
            Predicate::one_of("State", ["MH", "KA"]),
        ];
        let out = filter(&batch, &preds)?;
        assert_eq!(out.num_rows(), 4);

        let years = values(column(&batch, "Year")?, "Year")?;
        let states = values(column(&batch, "State")?, "State")?;
        let kept = values(column(&out, "Amount")?, "Amount")?;
        let all_amounts = values(column(&batch, "Amount")?, "Amount")?;
        for row in 0..batch.num_rows() {
            let passes = years[row] == Value::Int(2022)
                && (states[row] == Value::from("MH") || states[row] == Value::from("KA"));
            assert_eq!(passes, kept.contains(&all_amounts[row]), "row {}", row);
        }
        Ok(())
    }

    #[test]
    fn preserves_order_and_is_idempotent() -> anyhow::Result<()> {
        let batch = transactions();
        let preds = vec![Predicate::equals("Quarter", "1")];
        let once = filter(&batch, &preds)?;
        let twice = filter(&once, &preds)?;
        assert_eq!(once, twice);
        assert_eq!(
            values(column(&once, "Amount")?, "Amount")?,
            vec![Value::Float(100.0), Value::Float(50.0), Value::Float(30.0), Value::Float(70.0)]
        );
        Ok(())
    }

    #[test]
    fn range_is_inclusive() -> anyhow::Result<()> {
        let batch = transactions();
        let out = filter(&batch, &[Predicate::between("Year", 2021, 2022)])?;
        assert_eq!(out.num_rows(), batch.num_rows());
        let out = filter(&batch, &[Predicate::between("Year", 2022, 2022)])?;
        assert_eq!(out.num_rows(), 4);
        Ok(())
    }

    #[test]
    fn no_match_is_empty_not_error() -> anyhow::Result<()> {
        let batch = transactions();
        let out = filter(&batch, &[Predicate::equals("Year", 1999)])?;
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.schema(), batch.schema());

        let empty = filter(&out, &[Predicate::equals("State", "MH")])?;
        assert_eq!(empty.num_rows(), 0);
        Ok(())
    }

    #[test]
    fn all_sentinel_is_skipped_and_missing_column_errors() -> anyhow::Result<()> {
        let batch = transactions();
        let out = filter(&batch, &[Predicate::new("Nope", Selection::All)])?;
        assert_eq!(out.num_rows(), batch.num_rows());

        let err = filter(&batch, &[Predicate::equals("Nope", 1)]).unwrap_err();
        assert!(matches!(err, PulseError::MissingColumn { .. }));

        let err = filter(&batch, &[Predicate::equals("Year", "last")]).unwrap_err();
        assert!(matches!(err, PulseError::TypeMismatch { .. }));
        Ok(())
    }

    #[test]
    fn absent_optional_column_reads_as_null() -> anyhow::Result<()> {
        let batch = transactions();
        let out = filter(&batch, &[Predicate::equals("District", "pune").optional()])?;
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.schema(), batch.schema());

        let out = filter(&batch, &[Predicate::equals("District", Value::Null).optional()])?;
        assert_eq!(out.num_rows(), batch.num_rows());

        let err = filter(&batch, &[Predicate::equals("District", "pune")]).unwrap_err();
        assert!(matches!(err, PulseError::MissingColumn { .. }));
        Ok(())
    }

    #[test]
    fn code_filters_match_cleaned_codes() -> anyhow::Result<()> {
        use arrow::array::StringArray;
        use arrow::datatypes::{DataType, Field, Schema};
        use std::sync::Arc;

        let schema = Arc::new(Schema::new(vec![Field::new("Pincode", DataType::Utf8, true)]));
        let pins = StringArray::from(vec![Some("560001"), Some("403001"), None]);
        let batch = RecordBatch::try_new(schema, vec![Arc::new(pins)])?;

        let out = filter(&batch, &[Predicate::equals("Pincode", "560001.0")])?;
        assert_eq!(out.num_rows(), 1);
        let out = filter(&batch, &[Predicate::one_of("Pincode", [" 403001 ", "560001.0"])])?;
        assert_eq!(out.num_rows(), 2);
        let out = filter(&batch, &[Predicate::equals("Pincode", 403001)])?;
        assert_eq!(out.num_rows(), 1);
        Ok(())
    }

    #[test]
    fn bounds_and_distinct_use_the_whole_column() -> anyhow::Result<()> {
        let batch = transactions();
        assert_eq!(
            bounds(&batch, "Year")?,
            Some((Value::Int(2021), Value::Int(2022)))
        );
        assert_eq!(
            distinct(&batch, "State")?,
            vec![Value::from("KA"), Value::from("MH"), Value::from("TN")]
        );
        let none = filter(&batch, &[Predicate::equals("Year", 1999)])?;
        assert_eq!(bounds(&none, "Year")?, None);
        Ok(())
    }
}
