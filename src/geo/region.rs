// src/geo/region.rs

use arrow::{
    array::{ArrayRef, BooleanArray, StringArray},
    compute::filter_record_batch,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};
use tracing::warn;

use crate::error::Result;
use crate::pipeline::value::{column, values, Value};
use crate::pipeline::{aggregate_many, AggSpec, Notice, Outcome, QueryResult};

/// Name of the column `key_by_region` appends.
pub const REGION_COLUMN: &str = "Region";

/// A state or union territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// Display form, as used by the boundary set.
    pub name: &'static str,
    /// ISO 3166-2:IN subdivision code without the `IN-` prefix.
    pub code: &'static str,
    /// Other spellings seen in sources, besides the hyphenated slug of `name`.
    pub variants: &'static [&'static str],
}

const fn region(
    name: &'static str,
    code: &'static str,
    variants: &'static [&'static str],
) -> Region {
    Region {
        name,
        code,
        variants,
    }
}

pub static REGIONS: [Region; 36] = [
    region(
        "Andaman & Nicobar",
        "AN",
        &["andaman-&-nicobar-islands", "Andaman and Nicobar Islands"],
    ),
    region("Andhra Pradesh", "AP", &[]),
    region("Arunachal Pradesh", "AR", &[]),
    region("Assam", "AS", &[]),
    region("Bihar", "BR", &[]),
    region("Chandigarh", "CH", &[]),
    region("Chhattisgarh", "CT", &["Chattisgarh"]),
    region(
        "Dadra and Nagar Haveli and Daman and Diu",
        "DH",
        &["dadra-&-nagar-haveli-&-daman-&-diu", "Dadra & Nagar Haveli", "Daman & Diu"],
    ),
    region("Delhi", "DL", &["NCT of Delhi", "National Capital Territory of Delhi"]),
    region("Goa", "GA", &[]),
    region("Gujarat", "GJ", &[]),
    region("Haryana", "HR", &[]),
    region("Himachal Pradesh", "HP", &[]),
    region("Jammu & Kashmir", "JK", &["jammu-&-kashmir"]),
    region("Jharkhand", "JH", &[]),
    region("Karnataka", "KA", &[]),
    region("Kerala", "KL", &[]),
    region("Ladakh", "LA", &[]),
    region("Lakshadweep", "LD", &[]),
    region("Madhya Pradesh", "MP", &[]),
    region("Maharashtra", "MH", &[]),
    region("Manipur", "MN", &[]),
    region("Meghalaya", "ML", &[]),
    region("Mizoram", "MZ", &[]),
    region("Nagaland", "NL", &[]),
    region("Odisha", "OR", &["Orissa"]),
    region("Puducherry", "PY", &["Pondicherry"]),
    region("Punjab", "PB", &[]),
    region("Rajasthan", "RJ", &[]),
    region("Sikkim", "SK", &[]),
    region("Tamil Nadu", "TN", &[]),
    region("Telangana", "TG", &["Telengana"]),
    region("Tripura", "TR", &[]),
    region("Uttar Pradesh", "UP", &[]),
    region("Uttarakhand", "UT", &["Uttaranchal"]),
    region("West Bengal", "WB", &[]),
];

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

/// canonical key -> index into REGIONS
static INDEX: Lazy<HashMap<String, usize>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for (i, r) in REGIONS.iter().enumerate() {
        index.insert(canonical_key(r.name), i);
        for v in r.variants {
            index.insert(canonical_key(v), i);
        }
    }
    index
});

/// Case- and punctuation-insensitive key: lowercase, `&` read as `and`,
/// everything but letters and digits removed.
pub fn canonical_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace('&', "and");
    NON_ALNUM.replace_all(&lowered, "").into_owned()
}

pub fn lookup(raw: &str) -> Option<&'static Region> {
    INDEX.get(&canonical_key(raw)).map(|&i| &REGIONS[i])
}

/// Canonical display name for a raw state label.
pub fn canonicalize(raw: &str) -> Option<&'static str> {
    lookup(raw).map(|r| r.name)
}

pub fn by_code(code: &str) -> Option<&'static Region> {
    let code = code.trim().trim_start_matches("IN-");
    REGIONS.iter().find(|r| r.code.eq_ignore_ascii_case(code))
}

/// Rows keyed by canonical region, plus what could not be keyed.
#[derive(Debug, Clone)]
pub struct Keyed {
    pub batch: RecordBatch,
    pub notices: Vec<Notice>,
}

/// Append a `Region` column holding the canonical name of `column`'s value.
///
/// Rows whose value has no canonical form are left out; each distinct such
/// value is logged once and reported as a notice.
pub fn key_by_region(batch: &RecordBatch, column_name: &str) -> Result<Keyed> {
    let raw = values(column(batch, column_name)?, column_name)?;
    let mut unmapped: BTreeSet<String> = BTreeSet::new();
    let mut keep = Vec::with_capacity(raw.len());
    let mut names: Vec<Option<&'static str>> = Vec::with_capacity(raw.len());

    for v in &raw {
        let name = match v {
            Value::Null => None,
            other => {
                let text = other.to_string();
                let found = canonicalize(&text);
                if found.is_none() {
                    unmapped.insert(text);
                }
                found
            }
        };
        keep.push(name.is_some());
        if name.is_some() {
            names.push(name);
        }
    }

    for value in &unmapped {
        warn!(column = column_name, %value, "no region for value, rows excluded");
    }

    let kept = filter_record_batch(batch, &BooleanArray::from(keep))?;
    let schema = kept.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(REGION_COLUMN, DataType::Utf8, false));
    let mut arrays: Vec<ArrayRef> = kept.columns().to_vec();
    arrays.push(Arc::new(names.into_iter().collect::<StringArray>()));

    Ok(Keyed {
        batch: RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?,
        notices: unmapped
            .into_iter()
            .map(|value| Notice::UnknownDimensionValue {
                column: column_name.to_string(),
                value,
            })
            .collect(),
    })
}

/// Aggregate `batch` once per canonical region of `state_column`.
///
/// Rows are keyed before grouping, so every spelling of a region lands in one
/// group and each region appears at most once in the result.
pub fn region_totals(
    batch: &RecordBatch,
    state_column: &str,
    specs: &[AggSpec],
) -> Result<QueryResult> {
    let keyed = key_by_region(batch, state_column)?;
    let totals = aggregate_many(&keyed.batch, &[REGION_COLUMN], specs)?;
    let mut result = QueryResult::new(Outcome::from_batch(totals));
    result.notices = keyed.notices;
    Ok(result)
}
