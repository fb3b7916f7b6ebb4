// src/pipeline/charts.rs

use std::fmt;

use super::aggregate::{AggOp, AggSpec};
use super::filter::Predicate;
use super::query::Query;
use super::rank::Rank;
use crate::error::{PulseError, Result};
use crate::schema::{Category, Dimension, Domain, Level, Measure};

/// The ten canned "top charts" questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopChart {
    AggregatedInsurance,
    MapInsurance,
    TopInsurance,
    AggregatedTransaction,
    MapTransaction,
    TopTransaction,
    AggregatedUserCount,
    MapUserRegistered,
    MapUserAppOpens,
    TopUserRegistered,
}

/// One chart: a heading and the query that fills it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub heading: String,
    pub query: Query,
}

impl TopChart {
    pub const ALL: [TopChart; 10] = [
        TopChart::AggregatedInsurance,
        TopChart::MapInsurance,
        TopChart::TopInsurance,
        TopChart::AggregatedTransaction,
        TopChart::MapTransaction,
        TopChart::TopTransaction,
        TopChart::AggregatedUserCount,
        TopChart::MapUserRegistered,
        TopChart::MapUserAppOpens,
        TopChart::TopUserRegistered,
    ];

    /// Questions are numbered from 1.
    pub fn from_number(n: usize) -> Option<Self> {
        n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn number(self) -> usize {
        Self::ALL.iter().position(|c| *c == self).map_or(0, |i| i + 1)
    }

    pub fn title(self) -> &'static str {
        match self {
            TopChart::AggregatedInsurance => "Transaction Amount and Count of Aggregated Insurance",
            TopChart::MapInsurance => "Transaction Amount and Count of Map Insurance",
            TopChart::TopInsurance => "Transaction Amount and Count of Top Insurance",
            TopChart::AggregatedTransaction => {
                "Transaction Amount and Count of Aggregated Transaction"
            }
            TopChart::MapTransaction => "Transaction Amount and Count of Map Transaction",
            TopChart::TopTransaction => "Transaction Amount and Count of Top Transaction",
            TopChart::AggregatedUserCount => "Transaction Count of Aggregated User",
            TopChart::MapUserRegistered => "Registered users of Map User",
            TopChart::MapUserAppOpens => "App opens of Map User",
            TopChart::TopUserRegistered => "Registered users of Top User",
        }
    }

    pub fn category(self) -> Category {
        use Domain::*;
        use Level::*;
        match self {
            TopChart::AggregatedInsurance => Category::new(Aggregated, Insurance),
            TopChart::MapInsurance => Category::new(Map, Insurance),
            TopChart::TopInsurance => Category::new(Top, Insurance),
            TopChart::AggregatedTransaction => Category::new(Aggregated, Transaction),
            TopChart::MapTransaction => Category::new(Map, Transaction),
            TopChart::TopTransaction => Category::new(Top, Transaction),
            TopChart::AggregatedUserCount => Category::new(Aggregated, User),
            TopChart::MapUserRegistered | TopChart::MapUserAppOpens => Category::new(Map, User),
            TopChart::TopUserRegistered => Category::new(Top, User),
        }
    }

    fn measures(self) -> &'static [Measure] {
        match self {
            TopChart::AggregatedUserCount => &[Measure::TransactionCount],
            TopChart::MapUserRegistered | TopChart::TopUserRegistered => {
                &[Measure::RegisteredUsers]
            }
            TopChart::MapUserAppOpens => &[Measure::AppOpens],
            _ => &[Measure::TransactionAmount, Measure::TransactionCount],
        }
    }

    /// The map-user questions look at one state's districts.
    pub fn needs_state(self) -> bool {
        matches!(self, TopChart::MapUserRegistered | TopChart::MapUserAppOpens)
    }

    /// Three panels per measure: the `n` largest groups, the `n` smallest,
    /// and the mean per group.
    pub fn panels(self, state: Option<&str>, n: usize) -> Result<Vec<Panel>> {
        let mut filters = Vec::new();
        let key = if self.needs_state() {
            let state = state.ok_or_else(|| {
                PulseError::InvalidQuery(format!("question {} needs a state", self.number()))
            })?;
            filters.push(Predicate::equals(Dimension::State.name(), state));
            Dimension::District
        } else {
            Dimension::State
        };

        let mut panels = Vec::with_capacity(self.measures().len() * 3);
        for measure in self.measures() {
            let label = measure.name().to_uppercase();
            let base = Query::new().filters(filters.clone());
            let total = AggSpec::new(measure.name(), AggOp::Sum);
            panels.push(Panel {
                heading: format!("{} (top {})", label, n),
                query: base
                    .clone()
                    .group_by([key.name()], [total.clone()])
                    .rank(Rank::top(measure.name(), n)),
            });
            panels.push(Panel {
                heading: format!("{} (bottom {})", label, n),
                query: base
                    .clone()
                    .group_by([key.name()], [total])
                    .rank(Rank::bottom(measure.name(), n)),
            });
            panels.push(Panel {
                heading: format!("{} (average)", label),
                query: base.group_by([key.name()], [AggSpec::new(measure.name(), AggOp::Mean)]),
            });
        }
        Ok(panels)
    }
}

impl fmt::Display for TopChart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number(), self.title())
    }
}
