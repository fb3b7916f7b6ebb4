// src/schema/category.rs

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::descriptor::Descriptor;

/// Granularity of a record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// State-level totals split by transaction type or device brand.
    Aggregated,
    /// District-level totals.
    Map,
    /// Leading pincodes (and districts) per state.
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Transaction,
    User,
    Insurance,
}

/// One of the nine record categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category {
    pub level: Level,
    pub domain: Domain,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::new(Level::Aggregated, Domain::Transaction),
        Category::new(Level::Aggregated, Domain::User),
        Category::new(Level::Aggregated, Domain::Insurance),
        Category::new(Level::Map, Domain::Transaction),
        Category::new(Level::Map, Domain::User),
        Category::new(Level::Map, Domain::Insurance),
        Category::new(Level::Top, Domain::Transaction),
        Category::new(Level::Top, Domain::User),
        Category::new(Level::Top, Domain::Insurance),
    ];

    pub const fn new(level: Level, domain: Domain) -> Self {
        Category { level, domain }
    }

    /// Table (and file stem) name, e.g. `map_user`.
    pub const fn table_name(&self) -> &'static str {
        match (self.level, self.domain) {
            (Level::Aggregated, Domain::Transaction) => "aggregated_transaction",
            (Level::Aggregated, Domain::User) => "aggregated_user",
            (Level::Aggregated, Domain::Insurance) => "aggregated_insurance",
            (Level::Map, Domain::Transaction) => "map_transaction",
            (Level::Map, Domain::User) => "map_user",
            (Level::Map, Domain::Insurance) => "map_insurance",
            (Level::Top, Domain::Transaction) => "top_transaction",
            (Level::Top, Domain::User) => "top_user",
            (Level::Top, Domain::Insurance) => "top_insurance",
        }
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor::for_category(*self)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Category::ALL
            .into_iter()
            .find(|c| c.table_name() == wanted)
            .ok_or_else(|| format!("unknown category `{}`", s))
    }
}

impl Serialize for Category {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.table_name())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_names_are_unique_and_parse_back() {
        let names: HashSet<&str> = Category::ALL.iter().map(|c| c.table_name()).collect();
        assert_eq!(names.len(), 9);
        for c in Category::ALL {
            assert_eq!(c.table_name().parse::<Category>().unwrap(), c);
        }
        assert_eq!(
            "Map-User".parse::<Category>().unwrap(),
            Category::new(Level::Map, Domain::User)
        );
        assert!("map_things".parse::<Category>().is_err());
    }
}
