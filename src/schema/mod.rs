pub mod arrow;
pub mod category;
pub mod descriptor;
pub mod types;

pub use arrow::{build_arrow_schema, map_to_arrow_type};
pub use category::{Category, Domain, Level};
pub use descriptor::Descriptor;
pub use types::{header_key, Column, ColumnType, Dimension, Measure, Role, LATITUDE, LONGITUDE};
