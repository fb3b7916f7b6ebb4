// src/geo/mod.rs

pub mod boundary;
pub mod points;
pub mod region;

pub use boundary::Boundaries;
pub use points::map_points;
pub use region::{
    canonical_key, canonicalize, key_by_region, region_totals, Keyed, Region, REGIONS,
    REGION_COLUMN,
};
