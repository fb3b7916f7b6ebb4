pub mod config;
pub mod error;
pub mod geo;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod source;
pub mod table;

pub use error::{PulseError, Result};
pub use pipeline::{FilterContext, Outcome, Query, QueryResult};
pub use schema::{Category, Domain, Level};
pub use session::Session;
pub use table::RecordTable;
