// src/pipeline/context.rs

use std::collections::BTreeMap;

use super::filter::{Predicate, Selection};
use super::value::Value;
use crate::schema::{Descriptor, Dimension};

static ALL: Selection = Selection::All;

/// The current selection for every dimension. Dimensions never set are `All`.
///
/// Each interaction builds a new context; nothing reads selections from
/// shared state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterContext {
    selections: BTreeMap<Dimension, Selection>,
}

impl FilterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dim: Dimension, selection: Selection) -> Self {
        if selection.is_all() {
            self.selections.remove(&dim);
        } else {
            self.selections.insert(dim, selection);
        }
        self
    }

    pub fn year(self, year: i64) -> Self {
        self.with(Dimension::Year, Selection::Equals(Value::Int(year)))
    }

    pub fn quarter(self, quarter: i64) -> Self {
        self.with(Dimension::Quarter, Selection::Equals(Value::Int(quarter)))
    }

    pub fn state(self, state: &str) -> Self {
        self.with(Dimension::State, Selection::Equals(Value::from(state)))
    }

    pub fn transaction_type(self, kind: &str) -> Self {
        self.with(Dimension::TransactionType, Selection::Equals(Value::from(kind)))
    }

    pub fn selection(&self, dim: Dimension) -> &Selection {
        self.selections.get(&dim).unwrap_or(&ALL)
    }

    /// True when a single state is selected, which switches views to drill-down.
    pub fn single_state(&self) -> Option<&Value> {
        match self.selection(Dimension::State) {
            Selection::Equals(v) => Some(v),
            _ => None,
        }
    }

    /// Predicates for the dimensions this category has, in the fixed order
    /// Year, Quarter, State, Transaction_type, District, Brand, Pincode.
    /// Dimensions the category only optionally carries yield optional
    /// predicates.
    pub fn predicates_for(&self, descriptor: &Descriptor) -> Vec<Predicate> {
        Dimension::ALL
            .into_iter()
            .filter_map(|d| Some((d, descriptor.column(d.name())?)))
            .filter_map(|(d, col)| {
                let selection = self.selection(d);
                if selection.is_all() {
                    return None;
                }
                let predicate = Predicate::new(d.name(), selection.clone());
                Some(if col.required { predicate } else { predicate.optional() })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Category, Domain, Level};

    #[test]
    fn predicates_follow_fixed_order_and_skip_absent_dimensions() {
        let ctx = FilterContext::new()
            .with(Dimension::Brand, Selection::parse("Xiaomi"))
            .state("Kerala")
            .transaction_type("Recharge")
            .year(2021);

        let tx = Category::new(Level::Aggregated, Domain::Transaction).descriptor();
        let cols: Vec<String> = ctx.predicates_for(&tx).into_iter().map(|p| p.column).collect();
        assert_eq!(cols, vec!["Year", "State", "Transaction_type"]);

        let user = Category::new(Level::Aggregated, Domain::User).descriptor();
        let cols: Vec<String> = ctx.predicates_for(&user).into_iter().map(|p| p.column).collect();
        assert_eq!(cols, vec!["Year", "State", "Brand"]);
    }

    #[test]
    fn optional_district_does_not_fail_top_tables() -> anyhow::Result<()> {
        use crate::pipeline::filter::filter;
        use arrow::array::{Float64Array, Int64Array, StringArray};
        use arrow::record_batch::RecordBatch;
        use std::sync::Arc;

        let top = Category::new(Level::Top, Domain::User).descriptor();
        let ctx = FilterContext::new()
            .year(2022)
            .with(Dimension::District, Selection::parse("bengaluru urban"));
        let preds = ctx.predicates_for(&top);
        assert_eq!(preds.len(), 2);
        assert!(!preds[0].optional);
        assert!(preds[1].optional);

        let schema = top.arrow_schema();
        let without_district = Arc::new(schema.project(&[0, 1, 2, 3, 4])?);
        assert!(without_district.column_with_name("District").is_none());
        let batch = RecordBatch::try_new(
            without_district,
            vec![
                Arc::new(Int64Array::from(vec![2022, 2022])),
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec!["karnataka", "goa"])),
                Arc::new(StringArray::from(vec!["560001", "403001"])),
                Arc::new(Float64Array::from(vec![10.0, 20.0])),
            ],
        )?;
        assert_eq!(filter(&batch, &preds)?.num_rows(), 0);
        let by_year = FilterContext::new().year(2022).predicates_for(&top);
        assert_eq!(filter(&batch, &by_year)?.num_rows(), 2);
        Ok(())
    }

    #[test]
    fn all_clears_a_selection() {
        let ctx = FilterContext::new().quarter(2).with(Dimension::Quarter, Selection::All);
        assert_eq!(ctx, FilterContext::new());
        assert!(ctx.selection(Dimension::Quarter).is_all());
        assert!(ctx.single_state().is_none());
        assert_eq!(FilterContext::new().state("Goa").single_state(), Some(&Value::from("Goa")));
    }
}
