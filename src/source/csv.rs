// src/source/csv.rs

use ::csv::{ReaderBuilder, Trim};
use std::{
    fs::File,
    io::{BufReader, Read},
    path::PathBuf,
};
use tracing::info;

use super::{find_table_file, RawTable, TableSource};
use crate::error::{PulseError, Result};
use crate::schema::Category;
use crate::table::RecordTable;

/// Read a headed CSV into a `RawTable`. Ragged rows are rejected.
pub fn read_raw_csv<R: Read>(reader: R, label: &str) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| PulseError::malformed(label, format!("header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result
            .map_err(|e| PulseError::malformed(label, format!("record {}: {}", idx + 1, e)))?;
        rows.push(
            record
                .iter()
                .map(|s| (!s.is_empty()).then(|| s.to_string()))
                .collect(),
        );
    }

    Ok(RawTable { headers, rows })
}

/// A directory of `<table>.csv` files, searched recursively.
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvDirSource { dir: dir.into() }
    }
}

impl TableSource for CsvDirSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.dir.display())
    }

    #[tracing::instrument(level = "info", skip(self), fields(dir = %self.dir.display()))]
    fn load(&self, category: Category) -> Result<RecordTable> {
        let path = find_table_file(&self.dir, category, "csv")?;
        let file = File::open(&path)
            .map_err(|e| PulseError::unavailable(path.display().to_string(), e))?;
        let raw = read_raw_csv(BufReader::new(file), category.table_name())?;
        let table = RecordTable::from_raw(category, raw)?;
        info!(path = %path.display(), rows = table.num_rows(), "loaded");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Domain, Level};
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn reads_headers_and_empty_cells() -> anyhow::Result<()> {
        let data = "State,Year,Quarter\n goa ,2022,\nbihar,2021,3\n";
        let raw = read_raw_csv(Cursor::new(data), "t")?;
        assert_eq!(raw.headers, vec!["State", "Year", "Quarter"]);
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[0][0].as_deref(), Some("goa"));
        assert_eq!(raw.rows[0][2], None);
        Ok(())
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let data = "State,Year\ngoa,2022,extra\n";
        let err = read_raw_csv(Cursor::new(data), "t").unwrap_err();
        assert!(matches!(err, PulseError::MalformedTable { .. }));
    }

    #[test]
    fn loads_from_nested_directory() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("2022");
        fs::create_dir_all(&nested)?;
        fs::write(
            nested.join("aggregated_insurance.csv"),
            "States,Years,Quarter,Transaction_type,Transaction_count,Transaction_amount\n\
             goa,2022,1,Insurance,10,1500.5\n\
             kerala,2022,1,Insurance,4,400\n",
        )?;

        let source = CsvDirSource::new(dir.path());
        let table = source.load(Category::new(Level::Aggregated, Domain::Insurance))?;
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.batch().num_columns(), 6);

        let missing = source.load(Category::new(Level::Top, Domain::User)).unwrap_err();
        assert!(matches!(missing, PulseError::SourceUnavailable { .. }));
        Ok(())
    }
}
