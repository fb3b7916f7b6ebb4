// src/source/mod.rs

pub mod cell;
pub mod csv;
pub mod parquet;
pub mod raw;
pub mod sqlite;
pub mod zip;

use glob::glob;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::debug;

use crate::config::SourceConfig;
use crate::error::{PulseError, Result};
use crate::schema::Category;
use crate::table::RecordTable;

pub use self::csv::CsvDirSource;
pub use self::parquet::ParquetDirSource;
pub use self::sqlite::SqliteSource;
pub use self::zip::ZipSource;
pub use raw::RawTable;

/// Where record tables come from. Loading either yields a schema-checked
/// table or fails the request; it never substitutes an empty table.
pub trait TableSource: Send + Sync {
    /// Human-readable location, used in logs and error messages.
    fn describe(&self) -> String;

    fn load(&self, category: Category) -> Result<RecordTable>;
}

/// Build the configured source.
pub fn open(config: &SourceConfig) -> Arc<dyn TableSource> {
    match config {
        SourceConfig::Csv { path } => Arc::new(CsvDirSource::new(path)),
        SourceConfig::Parquet { path } => Arc::new(ParquetDirSource::new(path)),
        SourceConfig::Zip { path } => Arc::new(ZipSource::new(path)),
        SourceConfig::Sqlite { path } => Arc::new(SqliteSource::new(path)),
    }
}

/// Find `<dir>/**/<table>.<ext>`; the lexically first match wins.
pub(crate) fn find_table_file(dir: &Path, category: Category, ext: &str) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(PulseError::unavailable(
            dir.display().to_string(),
            "not a directory",
        ));
    }
    let pattern = format!("{}/**/{}.{}", dir.display(), category.table_name(), ext);
    let mut found: Vec<PathBuf> = glob(&pattern)
        .map_err(|e| PulseError::unavailable(pattern.clone(), e))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    found.sort();
    if found.len() > 1 {
        debug!(?found, "several files for {}, using the first", category);
    }
    found.into_iter().next().ok_or_else(|| {
        PulseError::unavailable(pattern, format!("no {} file for `{}`", ext, category))
    })
}
