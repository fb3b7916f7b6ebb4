// src/pipeline/mod.rs

pub mod aggregate;
pub mod charts;
pub mod context;
pub mod derive;
pub mod filter;
pub mod query;
pub mod rank;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{aggregate, aggregate_many, AggOp, AggSpec};
pub use charts::{Panel, TopChart};
pub use context::FilterContext;
pub use derive::{derive, derive_counted, Derived, Ratio};
pub use filter::{bounds, distinct, filter, Predicate, Selection};
pub use query::{key_value_pairs, Aggregation, Notice, Outcome, Query, QueryResult};
pub use rank::{apply_rank, bottom_n, top_n, Order, Rank};
pub use value::Value;
