// src/schema/descriptor.rs

use arrow::datatypes::SchemaRef;

use super::arrow::build_arrow_schema;
use super::category::{Category, Domain, Level};
use super::types::{Column, Dimension, Measure, Role, LATITUDE, LONGITUDE};

/// Everything the pipeline needs to know about one category's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub category: Category,
    /// Columns in canonical order: dimensions, measures, then optional extras.
    pub columns: Vec<Column>,
    /// Group key of the overview view.
    pub overview: Dimension,
    /// Group key once a single state has been selected.
    pub drill_down: Dimension,
}

impl Descriptor {
    pub fn for_category(category: Category) -> Self {
        use Dimension::*;

        let mut columns = vec![Year.column(), Quarter.column(), State.column()];
        let (entity, overview, drill_down) = match (category.level, category.domain) {
            (Level::Aggregated, Domain::User) => (Brand, Brand, Brand),
            (Level::Aggregated, _) => (TransactionType, State, TransactionType),
            (Level::Map, _) => (District, State, District),
            (Level::Top, _) => (Pincode, State, Pincode),
        };
        columns.push(entity.column());

        let measures: &[Measure] = match (category.level, category.domain) {
            (Level::Aggregated, Domain::User) => &[Measure::TransactionCount, Measure::Percentage],
            (Level::Map, Domain::User) => &[Measure::RegisteredUsers, Measure::AppOpens],
            (Level::Top, Domain::User) => &[Measure::RegisteredUsers],
            _ => &[Measure::TransactionCount, Measure::TransactionAmount],
        };
        columns.extend(measures.iter().map(|m| m.column()));

        match category.level {
            Level::Map => columns.extend([LATITUDE, LONGITUDE]),
            Level::Top => columns.push(District.column().optional()),
            Level::Aggregated => {}
        }

        Descriptor {
            category,
            columns,
            overview,
            drill_down,
        }
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.columns
            .iter()
            .filter(|c| c.role == Role::Dimension)
            .filter_map(|c| Dimension::from_name(c.name))
    }

    pub fn measures(&self) -> impl Iterator<Item = Measure> + '_ {
        self.columns
            .iter()
            .filter(|c| c.role == Role::Measure)
            .filter_map(|c| Measure::from_name(c.name))
    }

    pub fn has_dimension(&self, dim: Dimension) -> bool {
        self.dimensions().any(|d| d == dim)
    }

    /// Look a column up by canonical name or alias.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.matches(name))
    }

    /// Arrow schema with every column, optional ones included.
    pub fn arrow_schema(&self) -> SchemaRef {
        build_arrow_schema(&self.columns)
    }
}
