// src/session.rs

use rayon::prelude::*;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, info};

use crate::error::Result;
use crate::pipeline::{Query, QueryResult};
use crate::schema::Category;
use crate::source::TableSource;
use crate::table::RecordTable;

/// One user's view of the data: a source plus the tables loaded from it.
///
/// Tables are loaded once per session and then reused; loading is assumed to
/// give the same table every time within a session. Sessions never share a
/// cache, so two sessions may hold different snapshots.
pub struct Session {
    source: Arc<dyn TableSource>,
    cache: Mutex<HashMap<Category, Arc<RecordTable>>>,
}

impl Session {
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        Session {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &dyn TableSource {
        self.source.as_ref()
    }

    fn cached(&self, category: Category) -> Option<Arc<RecordTable>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&category)
            .cloned()
    }

    /// The table for `category`, loading it on first use.
    pub fn table(&self, category: Category) -> Result<Arc<RecordTable>> {
        if let Some(table) = self.cached(category) {
            debug!(%category, "cache hit");
            return Ok(table);
        }
        // Load outside the lock so other categories are not held up.
        let loaded = Arc::new(self.source.load(category)?);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(category).or_insert(loaded).clone())
    }

    /// Load several categories in parallel. Fails if any of them fails.
    pub fn preload(&self, categories: &[Category]) -> Result<()> {
        let loaded: Vec<Arc<RecordTable>> = categories
            .par_iter()
            .map(|&c| self.table(c))
            .collect::<Result<_>>()?;
        for table in loaded {
            info!(
                category = %table.category(),
                rows = table.num_rows(),
                loaded_at = %table.loaded_at(),
                "ready"
            );
        }
        Ok(())
    }

    pub fn query(&self, category: Category, query: &Query) -> Result<QueryResult> {
        let table = self.table(category)?;
        query.run(table.batch())
    }

    /// Drop a cached table so the next use reloads it.
    pub fn invalidate(&self, category: Category) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&category)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PulseError;
    use crate::pipeline::{AggOp, AggSpec, Predicate};
    use crate::schema::{Domain, Level};
    use crate::source::CsvDirSource;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Counting {
        inner: CsvDirSource,
        loads: AtomicUsize,
    }

    impl TableSource for Counting {
        fn describe(&self) -> String {
            self.inner.describe()
        }

        fn load(&self, category: Category) -> Result<RecordTable> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(category)
        }
    }

    fn write_fixtures(dir: &std::path::Path) -> anyhow::Result<()> {
        fs::write(
            dir.join("aggregated_transaction.csv"),
            "State,Year,Quarter,Transaction_type,Transaction_count,Transaction_amount\n\
             maharashtra,2022,1,Recharge,3,100\n\
             maharashtra,2022,1,Recharge,2,50\n\
             karnataka,2022,1,Recharge,1,30\n",
        )?;
        fs::write(
            dir.join("top_user.csv"),
            "States,Years,Quarter,Pincodes,RegisteredUsers\n\
             goa,2022,1,403001.0,500\n",
        )?;
        Ok(())
    }

    #[test]
    fn loads_once_and_answers_queries() -> anyhow::Result<()> {
        let dir = tempdir()?;
        write_fixtures(dir.path())?;
        let source = Arc::new(Counting {
            inner: CsvDirSource::new(dir.path()),
            loads: AtomicUsize::new(0),
        });
        let session = Session::new(source.clone());
        let tx = Category::new(Level::Aggregated, Domain::Transaction);
        let top_user = Category::new(Level::Top, Domain::User);

        session.preload(&[tx, top_user])?;
        session.table(tx)?;
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);

        let result = session.query(
            tx,
            &Query::new()
                .filter(Predicate::equals("Year", "2022"))
                .group_by(["State"], [AggSpec::new("Transaction_amount", AggOp::Sum)]),
        )?;
        assert_eq!(result.outcome.num_rows(), 2);

        assert!(session.invalidate(tx));
        session.table(tx)?;
        assert_eq!(source.loads.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[test]
    fn preload_fails_when_a_table_is_missing() -> anyhow::Result<()> {
        let dir = tempdir()?;
        write_fixtures(dir.path())?;
        let session = Session::new(Arc::new(CsvDirSource::new(dir.path())));
        let err = session.preload(&Category::ALL).unwrap_err();
        assert!(matches!(err, PulseError::SourceUnavailable { .. }));
        Ok(())
    }
}
