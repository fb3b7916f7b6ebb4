// src/error.rs

use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use thiserror::Error;

pub type Result<T, E = PulseError> = std::result::Result<T, E>;

/// Failures that abort the current request.
///
/// Empty results, unmapped region names and undefined ratios are not errors;
/// they surface as [`crate::pipeline::Outcome::Empty`] and
/// [`crate::pipeline::Notice`] instead.
#[derive(Debug, Error)]
pub enum PulseError {
    /// The file or database behind a table could not be reached.
    #[error("source `{location}` unavailable: {reason}")]
    SourceUnavailable { location: String, reason: String },

    /// The table was reachable but does not match its category schema.
    #[error("table `{table}` is malformed: {detail}")]
    MalformedTable { table: String, detail: String },

    #[error("column `{column}` not found")]
    MissingColumn { column: String },

    #[error("column `{column}` has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: DataType },

    #[error("value `{value}` cannot be compared with column `{column}` of type {data_type}")]
    TypeMismatch {
        column: String,
        value: String,
        data_type: DataType,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl PulseError {
    pub fn unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        PulseError::SourceUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(table: impl Into<String>, detail: impl Into<String>) -> Self {
        PulseError::MalformedTable {
            table: table.into(),
            detail: detail.into(),
        }
    }

    pub fn missing(column: &str) -> Self {
        PulseError::MissingColumn {
            column: column.to_string(),
        }
    }

    /// True for the conditions the caller cannot recover from by changing the selection.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            PulseError::SourceUnavailable { .. } | PulseError::MalformedTable { .. }
        )
    }
}
