// src/schema/types.rs

use serde::{Deserialize, Serialize};

use crate::pipeline::AggOp;

/// What a column is used for by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Categorical, used for filtering and grouping.
    Dimension,
    /// Numeric, used for aggregation. Never negative.
    Measure,
    /// Latitude/longitude carried by some map tables.
    Coordinate,
}

/// Storage type of a column once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    /// Text identifier that sources sometimes hand over as a float (`560001.0`).
    Code,
    Integer,
    Decimal,
}

/// A single column definition of a category schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: &'static str,
    /// Alternative header spellings seen across sources.
    pub aliases: &'static [&'static str],
    pub role: Role,
    pub ty: ColumnType,
    pub required: bool,
}

impl Column {
    const fn new(
        name: &'static str,
        aliases: &'static [&'static str],
        role: Role,
        ty: ColumnType,
    ) -> Self {
        Column {
            name,
            aliases,
            role,
            ty,
            required: true,
        }
    }

    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Whether a source header names this column.
    pub fn matches(&self, header: &str) -> bool {
        let key = header_key(header);
        if key.is_empty() {
            return false;
        }
        key == header_key(self.name) || self.aliases.iter().any(|a| header_key(a) == key)
    }
}

/// Lowercase alphanumeric form used to compare headers (`Transaction_type` ≡ `transaction type`).
pub fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Dimension columns. Declaration order is the order filters are applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimension {
    Year,
    Quarter,
    State,
    TransactionType,
    District,
    Brand,
    Pincode,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Year,
        Dimension::Quarter,
        Dimension::State,
        Dimension::TransactionType,
        Dimension::District,
        Dimension::Brand,
        Dimension::Pincode,
    ];

    pub const fn column(self) -> Column {
        use ColumnType::*;
        match self {
            Dimension::Year => Column::new("Year", &["Years"], Role::Dimension, Integer),
            Dimension::Quarter => Column::new("Quarter", &["Quarters"], Role::Dimension, Integer),
            Dimension::State => Column::new("State", &["States"], Role::Dimension, Text),
            Dimension::TransactionType => Column::new(
                "Transaction_type",
                &["Transaction_types", "Type"],
                Role::Dimension,
                Text,
            ),
            Dimension::District => Column::new("District", &["Districts"], Role::Dimension, Text),
            Dimension::Brand => Column::new("Brand", &["Brands"], Role::Dimension, Text),
            Dimension::Pincode => Column::new("Pincode", &["Pincodes"], Role::Dimension, Code),
        }
    }

    pub const fn name(self) -> &'static str {
        self.column().name
    }

    /// Resolve a column name or any of its aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.column().matches(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Measure {
    TransactionCount,
    TransactionAmount,
    RegisteredUsers,
    AppOpens,
    Percentage,
}

impl Measure {
    pub const ALL: [Measure; 5] = [
        Measure::TransactionCount,
        Measure::TransactionAmount,
        Measure::RegisteredUsers,
        Measure::AppOpens,
        Measure::Percentage,
    ];

    pub const fn column(self) -> Column {
        use ColumnType::Decimal;
        match self {
            Measure::TransactionCount => {
                Column::new("Transaction_count", &["Count"], Role::Measure, Decimal)
            }
            Measure::TransactionAmount => {
                Column::new("Transaction_amount", &["Amount"], Role::Measure, Decimal)
            }
            Measure::RegisteredUsers => {
                Column::new("RegisteredUsers", &["RegisteredUser"], Role::Measure, Decimal)
            }
            Measure::AppOpens => Column::new("AppOpens", &["App_opens"], Role::Measure, Decimal),
            Measure::Percentage => Column::new("Percentage", &[], Role::Measure, Decimal),
        }
    }

    pub const fn name(self) -> &'static str {
        self.column().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.column().matches(name))
    }

    /// Percentages are shares, so they are averaged rather than summed.
    pub const fn default_op(self) -> AggOp {
        match self {
            Measure::Percentage => AggOp::Mean,
            _ => AggOp::Sum,
        }
    }
}

pub const LATITUDE: Column =
    Column::new("Latitude", &["Lat"], Role::Coordinate, ColumnType::Decimal).optional();
pub const LONGITUDE: Column = Column::new(
    "Longitude",
    &["Lon", "Lng", "Long"],
    Role::Coordinate,
    ColumnType::Decimal,
)
.optional();
