//! Catalog storage
//!
//! The import pipeline only needs the write side described by [`ImportStore`]:
//! create one job, create endpoints and exchanges in batches, and update a
//! job's progress field. [`SqliteStore`] implements it and adds the read
//! accessors used by the API.

mod catalog_store;

pub use catalog_store::SqliteStore;

use crate::models::{CapturedExchange, NewEndpoint, NewImportJob};
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode headers: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

/// Write operations the import pipeline relies on.
///
/// Each call stands alone: a batch is committed when the call returns, and
/// nothing ties separate calls into one transaction.
pub trait ImportStore {
    /// Create a job row with progress 0 and return its id.
    fn create_job(&self, job: &NewImportJob) -> Result<i64, StoreError>;

    /// Overwrite a job's progress field.
    fn update_job_progress(&self, job_id: i64, progress: u8) -> Result<(), StoreError>;

    /// Insert endpoints, returning their ids in input order.
    fn create_endpoints(&self, batch: &[NewEndpoint]) -> Result<Vec<i64>, StoreError>;

    /// Insert exchanges for a job, returning their ids in input order.
    fn create_exchanges(
        &self,
        job_id: i64,
        program_id: i64,
        batch: &[CapturedExchange],
    ) -> Result<Vec<i64>, StoreError>;
}

impl<S: ImportStore + ?Sized> ImportStore for Arc<S> {
    fn create_job(&self, job: &NewImportJob) -> Result<i64, StoreError> {
        (**self).create_job(job)
    }

    fn update_job_progress(&self, job_id: i64, progress: u8) -> Result<(), StoreError> {
        (**self).update_job_progress(job_id, progress)
    }

    fn create_endpoints(&self, batch: &[NewEndpoint]) -> Result<Vec<i64>, StoreError> {
        (**self).create_endpoints(batch)
    }

    fn create_exchanges(
        &self,
        job_id: i64,
        program_id: i64,
        batch: &[CapturedExchange],
    ) -> Result<Vec<i64>, StoreError> {
        (**self).create_exchanges(job_id, program_id, batch)
    }
}

static STORE: Lazy<Mutex<Option<Arc<SqliteStore>>>> = Lazy::new(|| Mutex::new(None));

/// Initialize the global catalog store if not already present
pub fn init_catalog_store(storage_path: impl AsRef<Path>) -> anyhow::Result<()> {
    let mut guard = STORE
        .lock()
        .map_err(|e| anyhow::anyhow!("lock poisoned: {}", e))?;
    if guard.is_some() {
        return Ok(());
    }
    let store = Arc::new(SqliteStore::open(storage_path)?);
    *guard = Some(store);
    Ok(())
}

/// Open the catalog at `storage_path` and make it the global store,
/// replacing any store already open.
pub fn reopen_catalog_store(storage_path: impl AsRef<Path>) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::open(storage_path)?);
    let mut guard = STORE
        .lock()
        .map_err(|e| anyhow::anyhow!("lock poisoned: {}", e))?;
    *guard = Some(store);
    Ok(())
}

/// Handle to the global store
pub fn store() -> anyhow::Result<Arc<SqliteStore>> {
    let guard = STORE
        .lock()
        .map_err(|e| anyhow::anyhow!("lock poisoned: {}", e))?;
    guard
        .clone()
        .ok_or_else(|| anyhow::anyhow!("catalog store not initialized"))
}
