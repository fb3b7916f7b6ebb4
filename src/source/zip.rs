// src/source/zip.rs

use ::zip::ZipArchive;
use std::{
    fs::File,
    io::{Cursor, Read},
    path::{Path, PathBuf},
};
use tracing::info;

use super::{csv::read_raw_csv, TableSource};
use crate::error::{PulseError, Result};
use crate::schema::Category;
use crate::table::RecordTable;

/// One zip archive holding a `<table>.csv` entry per category, in any folder.
#[derive(Debug, Clone)]
pub struct ZipSource {
    path: PathBuf,
}

impl ZipSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ZipSource { path: path.into() }
    }

    fn read_entry(&self, category: Category) -> Result<(String, Vec<u8>)> {
        let location = self.path.display().to_string();
        let file = File::open(&self.path).map_err(|e| PulseError::unavailable(&location, e))?;
        let mut archive = ZipArchive::new(file).map_err(|e| PulseError::unavailable(&location, e))?;

        let wanted = format!("{}.csv", category.table_name());
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| PulseError::unavailable(&location, e))?;
            let name = entry.name().to_string();
            let file_name = Path::new(&name)
                .file_name()
                .map(|f| f.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if entry.is_file() && file_name == wanted {
                let mut buf = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut buf)
                    .map_err(|e| PulseError::unavailable(format!("{}!{}", location, name), e))?;
                return Ok((name, buf));
            }
        }

        Err(PulseError::unavailable(
            location,
            format!("archive has no `{}` entry", wanted),
        ))
    }
}

impl TableSource for ZipSource {
    fn describe(&self) -> String {
        format!("zip:{}", self.path.display())
    }

    #[tracing::instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    fn load(&self, category: Category) -> Result<RecordTable> {
        // the archive handle is dropped once the entry is buffered
        let (entry, data) = self.read_entry(category)?;
        let raw = read_raw_csv(Cursor::new(data), category.table_name())?;
        let table = RecordTable::from_raw(category, raw)?;
        info!(entry = %entry, rows = table.num_rows(), "loaded");
        Ok(table)
    }
}
