use crate::models::{
    CapturedExchange, Endpoint, EndpointType, ExchangeHashes, HeaderField, ImportJob,
    NewEndpoint, NewImportJob, StoredExchange,
};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{ImportStore, StoreError};

const DB_FILE_NAME: &str = "traffic_catalog.sqlite";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS import_jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        program_id INTEGER,
        job_type TEXT NOT NULL,
        title TEXT NOT NULL,
        progress INTEGER NOT NULL DEFAULT 0,
        description TEXT NOT NULL DEFAULT '',
        ignored_headers TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS endpoints (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        program_id INTEGER NOT NULL,
        method TEXT NOT NULL,
        domain TEXT NOT NULL,
        uri TEXT NOT NULL,
        endpoint_type TEXT NOT NULL DEFAULT 'API',
        note TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_endpoints_program
        ON endpoints(program_id);
    CREATE TABLE IF NOT EXISTS exchanges (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        program_id INTEGER,
        import_job_id INTEGER NOT NULL,
        endpoint_id INTEGER,
        sequence INTEGER NOT NULL,
        url TEXT NOT NULL,
        method TEXT NOT NULL,
        domain TEXT NOT NULL,
        req_headers TEXT NOT NULL,
        req_body TEXT NOT NULL,
        res_status INTEGER NOT NULL,
        res_headers TEXT NOT NULL,
        res_body TEXT NOT NULL,
        resp_size INTEGER NOT NULL,
        latency_ms INTEGER NOT NULL,
        request_time TEXT NOT NULL,
        req_hash TEXT NOT NULL,
        req_identity_hash TEXT NOT NULL,
        res_hash TEXT NOT NULL,
        res_body_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_exchanges_job
        ON exchanges(import_job_id);
    CREATE INDEX IF NOT EXISTS idx_exchanges_endpoint
        ON exchanges(endpoint_id);
    CREATE INDEX IF NOT EXISTS idx_exchanges_req_hash
        ON exchanges(req_hash);
    CREATE INDEX IF NOT EXISTS idx_exchanges_req_identity_hash
        ON exchanges(req_identity_hash);
    CREATE INDEX IF NOT EXISTS idx_exchanges_res_hash
        ON exchanges(res_hash);
    CREATE INDEX IF NOT EXISTS idx_exchanges_res_body_hash
        ON exchanges(res_body_hash);
";

const JOB_COLUMNS: &str = "id, program_id, job_type, title, progress, description, \
     ignored_headers, created_at, updated_at";

const ENDPOINT_COLUMNS: &str =
    "id, program_id, domain, method, uri, endpoint_type, note, created_at";

fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// SQLite-backed catalog of import jobs, endpoints and exchanges
pub struct SqliteStore {
    db: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the catalog database under `base_path`.
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = base_path.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let db_path = dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)?;
        Self::with_connection(conn, Some(db_path))
    }

    /// Private in-memory catalog
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            db: Mutex::new(conn),
            db_path,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// All jobs, oldest first
    pub fn list_jobs(&self) -> Result<Vec<ImportJob>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM import_jobs ORDER BY id", JOB_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], job_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_job(&self, id: i64) -> Result<ImportJob, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM import_jobs WHERE id = ?1", JOB_COLUMNS);
        conn.query_row(&sql, params![id], job_from_row)
            .optional()?
            .ok_or(StoreError::NotFound {
                entity: "import job",
                id,
            })
    }

    /// Endpoints of a program in creation order
    pub fn list_endpoints(&self, program_id: i64) -> Result<Vec<Endpoint>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM endpoints WHERE program_id = ?1 ORDER BY id",
            ENDPOINT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![program_id], |row| endpoint_from_row(row, 0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Exchanges of a job in sequence order, each with its endpoint loaded.
    pub fn list_exchanges(&self, job_id: i64) -> Result<Vec<StoredExchange>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT x.id, x.import_job_id, x.program_id, x.endpoint_id, x.sequence, x.url,
                    x.method, x.domain, x.req_headers, x.req_body, x.res_status,
                    x.res_headers, x.res_body, x.resp_size, x.latency_ms, x.request_time,
                    x.req_hash, x.req_identity_hash, x.res_hash, x.res_body_hash,
                    e.id, e.program_id, e.domain, e.method, e.uri, e.endpoint_type,
                    e.note, e.created_at
             FROM exchanges x
             LEFT JOIN endpoints e ON e.id = x.endpoint_id
             WHERE x.import_job_id = ?1
             ORDER BY x.sequence, x.id",
        )?;
        let rows = stmt.query_map(params![job_id], stored_exchange_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_exchanges(&self, job_id: i64) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM exchanges WHERE import_job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

impl ImportStore for SqliteStore {
    fn create_job(&self, job: &NewImportJob) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        let now = now_text();
        conn.execute(
            "INSERT INTO import_jobs
               (program_id, job_type, title, progress, description, ignored_headers,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?6)",
            params![
                job.program_id,
                job.format.job_type(),
                job.title,
                job.description,
                job.ignored_headers,
                now
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_job_progress(&self, job_id: i64, progress: u8) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE import_jobs SET progress = ?1, updated_at = ?2 WHERE id = ?3",
            params![progress as i64, now_text(), job_id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "import job",
                id: job_id,
            });
        }
        Ok(())
    }

    fn create_endpoints(&self, batch: &[NewEndpoint]) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = now_text();
        let mut ids = Vec::with_capacity(batch.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO endpoints
                   (program_id, method, domain, uri, endpoint_type, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for endpoint in batch {
                stmt.execute(params![
                    endpoint.program_id,
                    endpoint.key.method,
                    endpoint.key.domain,
                    endpoint.key.path,
                    endpoint.endpoint_type.as_str(),
                    endpoint.description,
                    now
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn create_exchanges(
        &self,
        job_id: i64,
        program_id: i64,
        batch: &[CapturedExchange],
    ) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = now_text();
        let mut ids = Vec::with_capacity(batch.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO exchanges
                   (program_id, import_job_id, endpoint_id, sequence, url, method, domain,
                    req_headers, req_body, res_status, res_headers, res_body, resp_size,
                    latency_ms, request_time, req_hash, req_identity_hash, res_hash,
                    res_body_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20)",
            )?;
            for ex in batch {
                let req_headers = ex.request_headers.to_stored()?;
                let res_headers = ex.response_headers.to_stored()?;
                stmt.execute(params![
                    program_id,
                    job_id,
                    ex.endpoint_id,
                    ex.sequence,
                    ex.url,
                    ex.method,
                    ex.domain,
                    req_headers,
                    ex.request_body,
                    ex.response_status,
                    res_headers,
                    ex.response_body,
                    ex.size,
                    ex.latency_ms,
                    ex.request_time,
                    ex.hashes.request_hash,
                    ex.hashes.request_identity_hash,
                    ex.hashes.response_hash,
                    ex.hashes.response_body_hash,
                    now
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<ImportJob> {
    let program_id: Option<i64> = row.get(1)?;
    let progress: i64 = row.get(4)?;
    Ok(ImportJob {
        id: row.get(0)?,
        program_id: program_id.unwrap_or_default(),
        job_type: row.get(2)?,
        title: row.get(3)?,
        progress: progress.clamp(0, 100) as u8,
        description: row.get(5)?,
        ignored_headers: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Endpoint columns starting at `offset`, in `ENDPOINT_COLUMNS` order.
fn endpoint_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Endpoint> {
    let endpoint_type: String = row.get(offset + 5)?;
    Ok(Endpoint {
        id: row.get(offset)?,
        program_id: row.get(offset + 1)?,
        domain: row.get(offset + 2)?,
        method: row.get(offset + 3)?,
        path: row.get(offset + 4)?,
        endpoint_type: EndpointType::from_str_lossy(&endpoint_type),
        description: row.get(offset + 6)?,
        created_at: row.get(offset + 7)?,
    })
}

fn stored_exchange_from_row(row: &Row<'_>) -> rusqlite::Result<StoredExchange> {
    let program_id: Option<i64> = row.get(2)?;
    let req_headers: String = row.get(8)?;
    let res_headers: String = row.get(11)?;
    let joined_endpoint: Option<i64> = row.get(20)?;
    let endpoint = match joined_endpoint {
        Some(_) => Some(endpoint_from_row(row, 20)?),
        None => None,
    };
    Ok(StoredExchange {
        id: row.get(0)?,
        import_job_id: row.get(1)?,
        program_id: program_id.unwrap_or_default(),
        exchange: CapturedExchange {
            endpoint_id: row.get(3)?,
            sequence: row.get(4)?,
            url: row.get(5)?,
            method: row.get(6)?,
            domain: row.get(7)?,
            request_headers: HeaderField::from_stored(&req_headers),
            request_body: row.get(9)?,
            response_status: row.get(10)?,
            response_headers: HeaderField::from_stored(&res_headers),
            response_body: row.get(12)?,
            size: row.get(13)?,
            latency_ms: row.get(14)?,
            request_time: row.get(15)?,
            hashes: ExchangeHashes {
                request_hash: row.get(16)?,
                request_identity_hash: row.get(17)?,
                response_hash: row.get(18)?,
                response_body_hash: row.get(19)?,
            },
        },
        endpoint,
    })
}
