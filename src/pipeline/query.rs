// src/pipeline/query.rs

use arrow::{datatypes::SchemaRef, record_batch::RecordBatch};
use std::fmt;
use tracing::{debug, warn};

use super::aggregate::{aggregate_many, AggSpec};
use super::context::FilterContext;
use super::derive::{derive_counted, Ratio};
use super::filter::{filter, Predicate};
use super::rank::Rank;
use super::value::Value;
use crate::error::Result;
use crate::schema::{Descriptor, Measure};

/// Group keys plus the reductions to compute per group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub keys: Vec<String>,
    pub specs: Vec<AggSpec>,
}

/// A full pipeline run: filter, row-level ratio, aggregate, group-level ratio, rank.
/// Every stage is optional except the filter, which may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<Predicate>,
    pub row_ratio: Option<Ratio>,
    pub aggregation: Option<Aggregation>,
    pub group_ratio: Option<Ratio>,
    pub rank: Option<Rank>,
}

/// Terminal state of a query. An empty result is not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(RecordBatch),
    /// No row survived; the schema the rows would have had.
    Empty(SchemaRef),
}

impl Outcome {
    pub fn from_batch(batch: RecordBatch) -> Self {
        if batch.num_rows() == 0 {
            Outcome::Empty(batch.schema())
        } else {
            Outcome::Rows(batch)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty(_))
    }

    pub fn schema(&self) -> SchemaRef {
        match self {
            Outcome::Rows(b) => b.schema(),
            Outcome::Empty(s) => s.clone(),
        }
    }

    pub fn num_rows(&self) -> usize {
        match self {
            Outcome::Rows(b) => b.num_rows(),
            Outcome::Empty(_) => 0,
        }
    }

    pub fn into_batch(self) -> RecordBatch {
        match self {
            Outcome::Rows(b) => b,
            Outcome::Empty(s) => RecordBatch::new_empty(s),
        }
    }
}

/// A recoverable condition reported next to a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Rows (or groups) whose ratio was undefined and which were left out of ranking.
    UndefinedDerivedMetric { column: String, rows: usize },
    /// A dimension value that could not be mapped; its rows were excluded.
    UnknownDimensionValue { column: String, value: String },
    /// The table has none of the columns a view needs.
    MissingOptionalColumns { columns: Vec<String> },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::UndefinedDerivedMetric { column, rows } => {
                write!(f, "`{}` undefined for {} row(s)", column, rows)
            }
            Notice::UnknownDimensionValue { column, value } => {
                write!(f, "unrecognised {} `{}` left out", column, value)
            }
            Notice::MissingOptionalColumns { columns } => {
                write!(f, "table has no {} column", columns.join("/"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub outcome: Outcome,
    pub notices: Vec<Notice>,
}

impl QueryResult {
    pub fn new(outcome: Outcome) -> Self {
        QueryResult {
            outcome,
            notices: Vec::new(),
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn filters(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.filters.extend(predicates);
        self
    }

    pub fn row_ratio(mut self, ratio: Ratio) -> Self {
        self.row_ratio = Some(ratio);
        self
    }

    pub fn group_by<S: Into<String>>(
        mut self,
        keys: impl IntoIterator<Item = S>,
        specs: impl IntoIterator<Item = AggSpec>,
    ) -> Self {
        self.aggregation = Some(Aggregation {
            keys: keys.into_iter().map(Into::into).collect(),
            specs: specs.into_iter().collect(),
        });
        self
    }

    pub fn group_ratio(mut self, ratio: Ratio) -> Self {
        self.group_ratio = Some(ratio);
        self
    }

    pub fn rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Totals of every measure per overview key, with the average transaction
    /// value where the category has both count and amount.
    pub fn overview(descriptor: &Descriptor, ctx: &FilterContext) -> Self {
        Self::view(descriptor, ctx, descriptor.overview.name())
    }

    /// Like `overview` but grouped by the drill-down key, for use once a
    /// single state is selected.
    pub fn drill_down(descriptor: &Descriptor, ctx: &FilterContext) -> Self {
        Self::view(descriptor, ctx, descriptor.drill_down.name())
    }

    fn view(descriptor: &Descriptor, ctx: &FilterContext, key: &str) -> Self {
        let specs = descriptor
            .measures()
            .map(|m| AggSpec::new(m.name(), m.default_op()));
        let query = Query::new()
            .filters(ctx.predicates_for(descriptor))
            .group_by([key], specs);
        let measures: Vec<Measure> = descriptor.measures().collect();
        if measures.contains(&Measure::TransactionAmount)
            && measures.contains(&Measure::TransactionCount)
        {
            query.group_ratio(
                Ratio::new(Measure::TransactionAmount.name(), Measure::TransactionCount.name())
                    .with_output("Average_transaction_value"),
            )
        } else {
            query
        }
    }

    /// Run the fixed chain over `batch`. Pure: the same inputs give the same result.
    #[tracing::instrument(level = "debug", skip(self, batch), fields(rows = batch.num_rows()))]
    pub fn run(&self, batch: &RecordBatch) -> Result<QueryResult> {
        let mut notices = Vec::new();

        let mut current = filter(batch, &self.filters)?;
        debug!(rows = current.num_rows(), "filtered");

        if let Some(ratio) = &self.row_ratio {
            current = apply_ratio(&current, ratio, &mut notices)?;
        }
        if let Some(agg) = &self.aggregation {
            current = aggregate_many(&current, &agg.keys, &agg.specs)?;
            debug!(groups = current.num_rows(), keys = ?agg.keys, "aggregated");
        }
        if let Some(ratio) = &self.group_ratio {
            current = apply_ratio(&current, ratio, &mut notices)?;
        }
        if let Some(rank) = &self.rank {
            current = rank.apply(&current)?;
        }

        Ok(QueryResult {
            outcome: Outcome::from_batch(current),
            notices,
        })
    }
}

fn apply_ratio(
    batch: &RecordBatch,
    ratio: &Ratio,
    notices: &mut Vec<Notice>,
) -> Result<RecordBatch> {
    let derived = derive_counted(batch, ratio)?;
    if derived.undefined > 0 {
        warn!(
            column = %ratio.output,
            rows = derived.undefined,
            "derived metric undefined, excluded from ranking"
        );
        notices.push(Notice::UndefinedDerivedMetric {
            column: ratio.output.clone(),
            rows: derived.undefined,
        });
    }
    Ok(derived.batch)
}

/// Pairs of (key, measure) from the first and last columns of a result, as
/// handed to charts.
pub fn key_value_pairs(
    batch: &RecordBatch,
    key: &str,
    measure: &str,
) -> Result<Vec<(Value, Value)>> {
    use super::value::{column, values};
    let keys = values(column(batch, key)?, key)?;
    let vals = values(column(batch, measure)?, measure)?;
    Ok(keys.into_iter().zip(vals).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::aggregate::AggOp;
    use crate::pipeline::testing::{transactions, worked_example};
    use crate::schema::{Category, Dimension, Domain, Level};
    use arrow::{
        array::{Float64Array, Int64Array, StringArray},
        datatypes::{DataType, Field, Schema},
    };
    use std::sync::Arc;

    #[test]
    fn worked_example_end_to_end() -> anyhow::Result<()> {
        let query = Query::new()
            .filter(Predicate::equals("Year", 2022))
            .group_by(["State"], [AggSpec::new("Amount", AggOp::Sum)]);
        let result = query.run(&worked_example())?;
        let Outcome::Rows(batch) = &result.outcome else {
            panic!("expected rows");
        };
        assert_eq!(
            key_value_pairs(batch, "State", "Amount")?,
            vec![
                (Value::from("KA"), Value::Float(30.0)),
                (Value::from("MH"), Value::Float(150.0)),
            ]
        );
        assert!(result.notices.is_empty());

        let top = query.rank(Rank::top("Amount", 1)).run(&worked_example())?;
        assert_eq!(
            key_value_pairs(&top.outcome.into_batch(), "State", "Amount")?,
            vec![(Value::from("MH"), Value::Float(150.0))]
        );
        Ok(())
    }

    #[test]
    fn no_match_is_empty_outcome_with_schema() -> anyhow::Result<()> {
        let result = Query::new()
            .filter(Predicate::equals("Year", 1999))
            .group_by(["State"], [AggSpec::new("Amount", AggOp::Sum)])
            .run(&transactions())?;
        assert!(result.outcome.is_empty());
        let schema = result.outcome.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["State", "Amount"]);
        Ok(())
    }

    #[test]
    fn same_query_same_result() -> anyhow::Result<()> {
        let query = Query::new()
            .filter(Predicate::one_of("State", ["MH", "KA", "TN"]))
            .group_by(
                ["Transaction_type", "State"],
                [
                    AggSpec::new("Amount", AggOp::Sum),
                    AggSpec::new("Amount", AggOp::Count).with_alias("n"),
                ],
            )
            .rank(Rank::top("Amount", 3));
        let b = transactions();
        assert_eq!(query.run(&b)?, query.run(&b)?);
        Ok(())
    }

    fn tx_table() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Year", DataType::Int64, true),
            Field::new("Quarter", DataType::Int64, true),
            Field::new("State", DataType::Utf8, true),
            Field::new("Transaction_type", DataType::Utf8, true),
            Field::new("Transaction_count", DataType::Float64, true),
            Field::new("Transaction_amount", DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![2022, 2022, 2022, 2022])),
                Arc::new(Int64Array::from(vec![1, 1, 1, 2])),
                Arc::new(StringArray::from(vec!["goa", "goa", "kerala", "goa"])),
                Arc::new(StringArray::from(vec!["Recharge", "Payments", "Recharge", "Recharge"])),
                Arc::new(Float64Array::from(vec![2.0, 0.0, 0.0, 6.0])),
                Arc::new(Float64Array::from(vec![10.0, 5.0, 0.0, 12.0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn overview_groups_by_state_and_flags_undefined_average() -> anyhow::Result<()> {
        let d = Category::new(Level::Aggregated, Domain::Transaction).descriptor();
        let ctx = FilterContext::new().year(2022).quarter(1);
        let result = Query::overview(&d, &ctx).run(&tx_table())?;
        let batch = result.outcome.into_batch();
        assert_eq!(
            key_value_pairs(&batch, "State", "Average_transaction_value")?,
            vec![(Value::from("goa"), Value::Float(7.5)), (Value::from("kerala"), Value::Null)]
        );
        assert_eq!(
            result.notices,
            vec![Notice::UndefinedDerivedMetric {
                column: "Average_transaction_value".into(),
                rows: 1
            }]
        );
        Ok(())
    }

    #[test]
    fn drill_down_uses_entity_key() -> anyhow::Result<()> {
        let d = Category::new(Level::Aggregated, Domain::Transaction).descriptor();
        let ctx = FilterContext::new()
            .with(Dimension::State, crate::pipeline::Selection::parse("goa"));
        let batch = Query::drill_down(&d, &ctx).run(&tx_table())?.outcome.into_batch();
        assert_eq!(
            key_value_pairs(&batch, "Transaction_type", "Transaction_amount")?,
            vec![
                (Value::from("Payments"), Value::Float(5.0)),
                (Value::from("Recharge"), Value::Float(22.0)),
            ]
        );
        Ok(())
    }
}
