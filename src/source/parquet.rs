// src/source/parquet.rs

use arrow::{compute::concat_batches, record_batch::RecordBatch};
use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{fs::File, path::PathBuf};
use tracing::info;

use super::{find_table_file, TableSource};
use crate::error::{PulseError, Result};
use crate::schema::Category;
use crate::table::RecordTable;

/// A directory of `<table>.parquet` files, searched recursively.
#[derive(Debug, Clone)]
pub struct ParquetDirSource {
    dir: PathBuf,
}

impl ParquetDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ParquetDirSource { dir: dir.into() }
    }
}

impl TableSource for ParquetDirSource {
    fn describe(&self) -> String {
        format!("parquet:{}", self.dir.display())
    }

    #[tracing::instrument(level = "info", skip(self), fields(dir = %self.dir.display()))]
    fn load(&self, category: Category) -> Result<RecordTable> {
        let table_name = category.table_name();
        let path = find_table_file(&self.dir, category, "parquet")?;
        let file = File::open(&path)
            .map_err(|e| PulseError::unavailable(path.display().to_string(), e))?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| PulseError::malformed(table_name, e.to_string()))?;
        let schema = builder.schema().clone();
        let reader = builder
            .build()
            .map_err(|e| PulseError::malformed(table_name, e.to_string()))?;

        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| PulseError::malformed(table_name, e.to_string()))?;
        let batch = concat_batches(&schema, &batches)?;

        let table = RecordTable::from_batch(category, batch)?;
        info!(path = %path.display(), rows = table.num_rows(), "loaded");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Domain, Level};
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use ::parquet::arrow::ArrowWriter;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn loads_written_parquet() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let schema = Arc::new(Schema::new(vec![
            Field::new("States", DataType::Utf8, false),
            Field::new("Years", DataType::Int64, false),
            Field::new("Quarter", DataType::Int64, false),
            Field::new("District", DataType::Utf8, false),
            Field::new("RegisteredUser", DataType::Float64, false),
            Field::new("AppOpens", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["goa", "goa"])),
                Arc::new(Int64Array::from(vec![2022, 2022])),
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec!["north goa district", "south goa district"])),
                Arc::new(Float64Array::from(vec![100.0, 50.0])),
                Arc::new(Float64Array::from(vec![900.0, 0.0])),
            ],
        )?;
        let file = File::create(dir.path().join("map_user.parquet"))?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;

        let table =
            ParquetDirSource::new(dir.path()).load(Category::new(Level::Map, Domain::User))?;
        assert_eq!(table.num_rows(), 2);
        assert!(table.batch().column_by_name("RegisteredUsers").is_some());
        assert!(table.batch().column_by_name("Latitude").is_none());
        Ok(())
    }
}
