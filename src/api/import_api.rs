//! Import API
//!
//! Async entry points for embedding the importer. The pipeline itself is
//! synchronous, so each import runs on a blocking task against the global
//! catalog store.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::level_filters::LevelFilter;

use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::import::{self, ImportRequest};
use crate::models::{ImportFormat, ImportJob, JobSummary, StoredExchange};
use crate::storage;

/// Get the version of the traffic import library
pub fn get_version() -> String {
    crate::VERSION.to_string()
}

/// Initialize logging (call once at startup).
///
/// With `log_dir` set, logs go to a daily rolling file in that directory;
/// otherwise to stderr. The level comes from `RUST_LOG` and defaults to info.
pub fn init_core(log_dir: Option<&Path>) -> anyhow::Result<()> {
    let level = resolve_log_level();

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "traffic_import");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // logging lasts until process exit
            std::mem::forget(guard);
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(non_blocking)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }

    tracing::info!("Traffic import core initialized v{}", get_version());
    Ok(())
}

fn resolve_log_level() -> LevelFilter {
    match std::env::var("RUST_LOG") {
        Ok(val) => match val.to_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" | "warning" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            _ => LevelFilter::INFO,
        },
        Err(_) => LevelFilter::INFO,
    }
}

/// Open the catalog database under `storage_path`.
pub fn init_store(storage_path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = storage_path.as_ref();
    storage::init_catalog_store(path)
        .with_context(|| format!("opening catalog store at {}", path.display()))
}

/// Parameters of an uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub program_id: i64,
    /// Comma-separated header names to leave out
    pub ignored_headers: String,
}

/// Import an upload in the given format and return the job id.
pub async fn import_upload(format: ImportFormat, upload: Upload) -> anyhow::Result<i64> {
    let store = storage::store()?;
    let config = ImportConfig::from_env();
    let job_id = task::spawn_blocking(move || {
        let request = ImportRequest {
            format,
            bytes: &upload.bytes,
            filename: &upload.filename,
            program_id: upload.program_id,
            ignored_headers: &upload.ignored_headers,
        };
        import::run_import(&*store, &request, &config)
    })
    .await
    .context("import task panicked")??;
    Ok(job_id)
}

pub async fn import_har_bytes(upload: Upload) -> anyhow::Result<i64> {
    import_upload(ImportFormat::Har, upload).await
}

pub async fn import_burp_xml_bytes(upload: Upload) -> anyhow::Result<i64> {
    import_upload(ImportFormat::BurpXml, upload).await
}

/// Read a `.har` or `.xml` file from disk and import it.
pub async fn import_file_from_path(
    path: impl Into<PathBuf>,
    program_id: i64,
    ignored_headers: &str,
) -> anyhow::Result<i64> {
    let path = path.into();
    let filename = path.to_string_lossy().to_string();
    let format = ImportFormat::from_filename(&filename)
        .ok_or_else(|| ImportError::UnsupportedFormat(filename.clone()))?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(ImportError::from)
        .with_context(|| format!("reading {}", path.display()))?;
    import_upload(
        format,
        Upload {
            bytes,
            filename,
            program_id,
            ignored_headers: ignored_headers.to_string(),
        },
    )
    .await
}

/// Summaries of every import job
pub async fn list_import_jobs() -> anyhow::Result<Vec<JobSummary>> {
    let store = storage::store()?;
    let jobs = task::spawn_blocking(move || import::list_jobs(&store)).await??;
    Ok(jobs)
}

pub async fn get_import_job(id: i64) -> anyhow::Result<ImportJob> {
    let store = storage::store()?;
    let job = task::spawn_blocking(move || import::get_job(&store, id)).await??;
    Ok(job)
}

/// Exchanges of a job with their linked endpoints
pub async fn list_job_exchanges(job_id: i64) -> anyhow::Result<Vec<StoredExchange>> {
    let store = storage::store()?;
    let exchanges = task::spawn_blocking(move || store.list_exchanges(job_id)).await??;
    Ok(exchanges)
}
