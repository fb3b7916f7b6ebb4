// src/source/sqlite.rs

use rusqlite::{types::ValueRef, Connection, OpenFlags};
use std::path::PathBuf;
use tracing::info;

use super::{RawTable, TableSource};
use crate::error::{PulseError, Result};
use crate::schema::Category;
use crate::table::RecordTable;

/// A SQLite database with one table per category, named after it.
///
/// A connection is opened read-only per load, so the source can be shared
/// across threads without pooling.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteSource { path: path.into() }
    }

    fn read_raw(&self, category: Category) -> Result<RawTable> {
        let location = format!("{}#{}", self.path.display(), category.table_name());
        let unavailable = |e: rusqlite::Error| PulseError::unavailable(location.clone(), e);

        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(unavailable)?;

        // table names come from the fixed category list, never from user input
        let sql = format!("SELECT * FROM \"{}\"", category.table_name());
        let mut stmt = conn.prepare(&sql).map_err(unavailable)?;
        let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = headers.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([]).map_err(unavailable)?;
        while let Some(row) = cursor.next().map_err(unavailable)? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                let cell = match row.get_ref(i).map_err(unavailable)? {
                    ValueRef::Null => None,
                    ValueRef::Integer(v) => Some(v.to_string()),
                    ValueRef::Real(v) => Some(v.to_string()),
                    ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(_) => {
                        return Err(PulseError::malformed(
                            category.table_name(),
                            format!("column `{}` holds a blob", headers[i]),
                        ))
                    }
                };
                cells.push(cell);
            }
            rows.push(cells);
        }

        Ok(RawTable { headers, rows })
    }
}

impl TableSource for SqliteSource {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    #[tracing::instrument(level = "info", skip(self), fields(db = %self.path.display()))]
    fn load(&self, category: Category) -> Result<RecordTable> {
        let raw = self.read_raw(category)?;
        let table = RecordTable::from_raw(category, raw)?;
        info!(rows = table.num_rows(), "loaded");
        Ok(table)
    }
}
