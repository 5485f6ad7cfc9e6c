//! Import orchestration
//!
//! One call to [`run_import`] drives a job through its checkpoints:
//!
//! ```text
//! Created (0) -> Loaded (10) -> Parsed (30) -> EndpointsPersisted (60) -> Completed (100)
//! ```
//!
//! Progress writes are separate from the data writes they follow. If a step
//! fails the error is returned and the job keeps the last progress written;
//! rows committed by earlier batches stay in place.

pub mod burp;
pub mod endpoints;
pub mod har;
pub mod url_parts;

use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::hashing;
use crate::models::{
    CapturedExchange, IgnoreList, ImportFormat, ImportJob, JobStage, JobSummary, NewImportJob,
};
use crate::storage::{ImportStore, SqliteStore, StoreError};

use burp::BurpOptions;
use endpoints::EndpointScope;

/// How a parser treats bad input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePolicy {
    /// A document that does not decode yields nothing; entries are never dropped
    AllOrNothing,
    /// Bad items are skipped and the rest of the document is imported
    SkipInvalidItems,
}

impl ParsePolicy {
    pub fn for_format(format: ImportFormat) -> Self {
        match format {
            ImportFormat::Har => ParsePolicy::AllOrNothing,
            ImportFormat::BurpXml => ParsePolicy::SkipInvalidItems,
        }
    }
}

/// Everything the boundary supplies for one import
#[derive(Debug, Clone, Copy)]
pub struct ImportRequest<'a> {
    pub format: ImportFormat,
    pub bytes: &'a [u8],
    pub filename: &'a str,
    pub program_id: i64,
    /// Comma-separated header names to leave out
    pub ignored_headers: &'a str,
}

/// Writes job checkpoints and keeps progress from moving backwards.
pub struct JobTracker<'s, S: ImportStore + ?Sized> {
    store: &'s S,
    job_id: i64,
    stage: JobStage,
}

impl<'s, S: ImportStore + ?Sized> JobTracker<'s, S> {
    /// Create the job row at `Created`.
    pub fn start(store: &'s S, job: &NewImportJob) -> Result<Self> {
        let job_id = store.create_job(job)?;
        Ok(Self {
            store,
            job_id,
            stage: JobStage::Created,
        })
    }

    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    /// Move to `stage` and write its progress. Earlier or equal stages are
    /// ignored. A failed write is logged; the stage still counts as reached
    /// since the work behind it is already committed.
    pub fn advance(&mut self, stage: JobStage) {
        if stage <= self.stage {
            return;
        }
        self.stage = stage;
        if let Err(err) = self.store.update_job_progress(self.job_id, stage.progress()) {
            tracing::warn!(
                "Import job {}: failed to record progress {}%: {}",
                self.job_id,
                stage.progress(),
                err
            );
        }
    }
}

/// Run one import to completion and return the job id.
pub fn run_import<S: ImportStore + ?Sized>(
    store: &S,
    request: &ImportRequest<'_>,
    config: &ImportConfig,
) -> Result<i64> {
    let job = NewImportJob::for_upload(
        request.format,
        request.filename,
        request.program_id,
        request.ignored_headers,
    );
    let mut tracker = JobTracker::start(store, &job)?;
    tracing::info!(
        "Import job {} started: {} ({} bytes, program {})",
        tracker.job_id(),
        job.title,
        request.bytes.len(),
        request.program_id
    );

    run_stages(store, &mut tracker, request, config).map_err(|err| {
        tracing::warn!(
            "Import job {} stopped at {}%: {}",
            tracker.job_id(),
            tracker.stage().progress(),
            err
        );
        err
    })
}

fn run_stages<S: ImportStore + ?Sized>(
    store: &S,
    tracker: &mut JobTracker<'_, S>,
    request: &ImportRequest<'_>,
    config: &ImportConfig,
) -> Result<i64> {
    let job_id = tracker.job_id();
    let batch_size = config.batch_size.max(1);
    tracker.advance(JobStage::Loaded);

    let ignore = IgnoreList::parse(request.ignored_headers);
    let mut exchanges = parse_exchanges(request, &ignore, config)?;
    tracker.advance(JobStage::Parsed);
    tracing::info!(
        "Import job {}: parsed {} exchanges ({:?})",
        job_id,
        exchanges.len(),
        ParsePolicy::for_format(request.format)
    );

    let scope = EndpointScope::derive(
        request.program_id,
        request.format,
        request.filename,
        &exchanges,
    );
    let mut endpoint_ids = Vec::with_capacity(scope.len());
    for batch in scope.candidates().chunks(batch_size) {
        endpoint_ids.extend(store.create_endpoints(batch)?);
    }
    tracker.advance(JobStage::EndpointsPersisted);

    let links = scope.into_links(&endpoint_ids);
    let linked = links.link(&mut exchanges);
    for batch in exchanges.chunks(batch_size) {
        store.create_exchanges(job_id, request.program_id, batch)?;
    }
    tracker.advance(JobStage::Completed);

    tracing::info!(
        "Import job {} completed: {} endpoints, {} exchanges ({} linked)",
        job_id,
        endpoint_ids.len(),
        exchanges.len(),
        linked
    );
    Ok(job_id)
}

fn parse_exchanges(
    request: &ImportRequest<'_>,
    ignore: &IgnoreList,
    config: &ImportConfig,
) -> Result<Vec<CapturedExchange>> {
    match request.format {
        ImportFormat::Har => har::parse_har(request.bytes, ignore, hashing::canonical_texts),
        ImportFormat::BurpXml => {
            let options = BurpOptions {
                ignore,
                header_storage_limit: config.header_storage_limit,
            };
            burp::parse_burp_xml(request.bytes, &options, hashing::canonical_texts)
        }
    }
}

/// Summaries of every job, including ones that stopped part way.
pub fn list_jobs(store: &SqliteStore) -> Result<Vec<JobSummary>> {
    Ok(store
        .list_jobs()?
        .into_iter()
        .map(JobSummary::from)
        .collect())
}

pub fn get_job(store: &SqliteStore, id: i64) -> Result<ImportJob> {
    store.get_job(id).map_err(|err| match err {
        StoreError::NotFound { entity, id } => ImportError::NotFound { entity, id },
        other => ImportError::Storage(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EndpointType, HeaderList, NewEndpoint};
    use base64::{engine::general_purpose, Engine as _};
    use std::cell::{Cell, RefCell};

    /// Delegates to an in-memory catalog, recording calls and failing on demand.
    struct RecordingStore {
        inner: SqliteStore,
        progress: RefCell<Vec<u8>>,
        endpoint_calls: Cell<usize>,
        exchange_calls: Cell<usize>,
        fail_exchange_call: Option<usize>,
        fail_progress: bool,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: SqliteStore::open_in_memory().expect("in-memory store"),
                progress: RefCell::new(Vec::new()),
                endpoint_calls: Cell::new(0),
                exchange_calls: Cell::new(0),
                fail_exchange_call: None,
                fail_progress: false,
            }
        }
    }

    impl ImportStore for RecordingStore {
        fn create_job(&self, job: &NewImportJob) -> std::result::Result<i64, StoreError> {
            self.progress.borrow_mut().push(0);
            self.inner.create_job(job)
        }

        fn update_job_progress(
            &self,
            job_id: i64,
            progress: u8,
        ) -> std::result::Result<(), StoreError> {
            if self.fail_progress {
                return Err(StoreError::LockPoisoned);
            }
            self.progress.borrow_mut().push(progress);
            self.inner.update_job_progress(job_id, progress)
        }

        fn create_endpoints(
            &self,
            batch: &[NewEndpoint],
        ) -> std::result::Result<Vec<i64>, StoreError> {
            self.endpoint_calls.set(self.endpoint_calls.get() + 1);
            self.inner.create_endpoints(batch)
        }

        fn create_exchanges(
            &self,
            job_id: i64,
            program_id: i64,
            batch: &[CapturedExchange],
        ) -> std::result::Result<Vec<i64>, StoreError> {
            let call = self.exchange_calls.get() + 1;
            self.exchange_calls.set(call);
            if self.fail_exchange_call == Some(call) {
                return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.inner.create_exchanges(job_id, program_id, batch)
        }
    }

    fn har_entry(method: &str, url: &str, headers: &str) -> String {
        format!(
            r#"{{"startedDateTime":"2024-05-01T00:00:00Z","time":5,
               "request":{{"method":"{method}","url":"{url}","headers":[{headers}]}},
               "response":{{"status":200,"headers":[],"content":{{"text":""}}}}}}"#
        )
    }

    fn har(entries: &[String]) -> String {
        format!(r#"{{"log":{{"entries":[{}]}}}}"#, entries.join(","))
    }

    fn request<'a>(format: ImportFormat, bytes: &'a [u8], ignored: &'a str) -> ImportRequest<'a> {
        ImportRequest {
            format,
            bytes,
            filename: "upload.har",
            program_id: 9,
            ignored_headers: ignored,
        }
    }

    #[test]
    fn single_get_creates_linked_endpoint_and_full_progress() {
        let doc = har(&[har_entry("GET", "https://api.example.com/v1/users", "")]);
        let store = RecordingStore::new();
        let job_id = run_import(
            &store,
            &request(ImportFormat::Har, doc.as_bytes(), ""),
            &ImportConfig::default(),
        )
        .unwrap();

        assert_eq!(*store.progress.borrow(), vec![0, 10, 30, 60, 100]);
        let endpoints = store.inner.list_endpoints(9).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].domain, "api.example.com");
        assert_eq!(endpoints[0].method, "GET");
        assert_eq!(endpoints[0].path, "/v1/users");
        assert_eq!(endpoints[0].endpoint_type, EndpointType::Api);
        assert_eq!(
            endpoints[0].description,
            "Auto-generated from HAR import: upload.har"
        );

        let exchanges = store.inner.list_exchanges(job_id).unwrap();
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].exchange.endpoint_id, Some(endpoints[0].id));
        assert_eq!(exchanges[0].endpoint.as_ref(), Some(&endpoints[0]));
        assert_eq!(get_job(&store.inner, job_id).unwrap().progress, 100);
    }

    #[test]
    fn invalid_base64_item_still_completes_job() {
        let xml = "<items><item><url>https://a.example.com/</url>\
                   <request base64=\"true\">@@@</request>\
                   <response base64=\"true\">SFRUUC8xLjEgMjAwIE9LDQoNCg==</response></item></items>";
        let store = RecordingStore::new();
        let job_id = run_import(
            &store,
            &request(ImportFormat::BurpXml, xml.as_bytes(), ""),
            &ImportConfig::default(),
        )
        .unwrap();

        assert_eq!(store.inner.count_exchanges(job_id).unwrap(), 0);
        assert!(store.inner.list_endpoints(9).unwrap().is_empty());
        assert_eq!(store.inner.get_job(job_id).unwrap().progress, 100);
        assert_eq!(store.inner.get_job(job_id).unwrap().job_type, "import_burp_xml");
    }

    #[test]
    fn shared_key_yields_one_endpoint_for_both_exchanges() {
        let doc = har(&[
            har_entry("GET", "https://api.example.com/items?page=1", ""),
            har_entry("GET", "https://api.example.com/items?page=2", ""),
        ]);
        let store = RecordingStore::new();
        let job_id = run_import(
            &store,
            &request(ImportFormat::Har, doc.as_bytes(), ""),
            &ImportConfig::default(),
        )
        .unwrap();

        let endpoints = store.inner.list_endpoints(9).unwrap();
        assert_eq!(endpoints.len(), 1);
        let exchanges = store.inner.list_exchanges(job_id).unwrap();
        assert_eq!(exchanges.len(), 2);
        assert!(exchanges
            .iter()
            .all(|x| x.exchange.endpoint_id == Some(endpoints[0].id)));
        let seq: Vec<_> = exchanges.iter().map(|x| x.exchange.sequence).collect();
        assert_eq!(seq, vec![1, 2]);
    }

    #[test]
    fn ignored_headers_are_dropped_from_stored_burp_headers() {
        let raw_request = "GET /p HTTP/1.1\r\nHost: a.example.com\r\nauthorization: x\r\nAccept: */*\r\nCOOKIE: c=1\r\nX-Last: 1\r\n\r\n";
        let raw_response = "HTTP/1.1 200 OK\r\nSet-Cookie: s=1\r\nCookie: weird\r\nAuthorization: echo\r\nServer: t\r\n\r\nok";
        let xml = format!(
            "<items><item><host>a.example.com</host><port>443</port><protocol>https</protocol>\
             <request base64=\"true\">{}</request><response base64=\"true\">{}</response></item></items>",
            general_purpose::STANDARD.encode(raw_request),
            general_purpose::STANDARD.encode(raw_response)
        );
        let store = RecordingStore::new();
        let job_id = run_import(
            &store,
            &request(ImportFormat::BurpXml, xml.as_bytes(), "Authorization,Cookie"),
            &ImportConfig::default(),
        )
        .unwrap();

        let stored = &store.inner.list_exchanges(job_id).unwrap()[0].exchange;
        let mut expected_request = HeaderList::new();
        expected_request.push("Host", "a.example.com");
        expected_request.push("Accept", "*/*");
        expected_request.push("X-Last", "1");
        assert_eq!(stored.request_headers.pairs(), Some(&expected_request));

        let mut expected_response = HeaderList::new();
        expected_response.push("Set-Cookie", "s=1");
        expected_response.push("Server", "t");
        assert_eq!(stored.response_headers.pairs(), Some(&expected_response));
        assert_eq!(stored.url, "https://a.example.com/p");
    }

    #[test]
    fn malformed_har_freezes_job_after_load() {
        let store = RecordingStore::new();
        let err = run_import(
            &store,
            &request(ImportFormat::Har, b"{\"log\": [", ""),
            &ImportConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::Decode { .. }));
        assert_eq!(*store.progress.borrow(), vec![0, 10]);

        let jobs = list_jobs(&store.inner).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].progress, 10);
        assert_eq!(jobs[0].job_type, "import_har");
    }

    #[test]
    fn exchange_batch_failure_keeps_committed_endpoints() {
        let entries: Vec<String> = (0..5)
            .map(|i| har_entry("GET", &format!("https://api.example.com/r{i}"), ""))
            .collect();
        let doc = har(&entries);
        let mut store = RecordingStore::new();
        store.fail_exchange_call = Some(2);
        let config = ImportConfig {
            batch_size: 2,
            ..ImportConfig::default()
        };

        let err = run_import(&store, &request(ImportFormat::Har, doc.as_bytes(), ""), &config)
            .unwrap_err();
        assert!(matches!(err, ImportError::Storage(_)));

        assert_eq!(store.endpoint_calls.get(), 3);
        assert_eq!(store.inner.list_endpoints(9).unwrap().len(), 5);
        let job = &store.inner.list_jobs().unwrap()[0];
        assert_eq!(job.progress, 60);
        // first batch of two exchanges was already committed
        assert_eq!(store.inner.count_exchanges(job.id).unwrap(), 2);
    }

    #[test]
    fn inserts_are_batched() {
        let entries: Vec<String> = (0..5)
            .map(|i| har_entry("GET", &format!("https://api.example.com/r{i}"), ""))
            .collect();
        let doc = har(&entries);
        let store = RecordingStore::new();
        let config = ImportConfig {
            batch_size: 2,
            ..ImportConfig::default()
        };
        let job_id =
            run_import(&store, &request(ImportFormat::Har, doc.as_bytes(), ""), &config).unwrap();
        assert_eq!(store.endpoint_calls.get(), 3);
        assert_eq!(store.exchange_calls.get(), 3);
        assert_eq!(store.inner.count_exchanges(job_id).unwrap(), 5);
    }

    #[test]
    fn failed_progress_writes_do_not_abort() {
        let doc = har(&[har_entry("GET", "https://api.example.com/", "")]);
        let mut store = RecordingStore::new();
        store.fail_progress = true;
        let job_id = run_import(
            &store,
            &request(ImportFormat::Har, doc.as_bytes(), ""),
            &ImportConfig::default(),
        )
        .unwrap();
        assert_eq!(store.inner.count_exchanges(job_id).unwrap(), 1);
        assert_eq!(store.inner.get_job(job_id).unwrap().progress, 0);
    }

    #[test]
    fn tracker_never_moves_backwards() {
        let store = RecordingStore::new();
        let job = NewImportJob::for_upload(ImportFormat::Har, "f.har", 1, "");
        let mut tracker = JobTracker::start(&store, &job).unwrap();
        tracker.advance(JobStage::Parsed);
        tracker.advance(JobStage::Loaded);
        tracker.advance(JobStage::Parsed);
        assert_eq!(tracker.stage(), JobStage::Parsed);
        assert_eq!(*store.progress.borrow(), vec![0, 30]);
    }

    #[test]
    fn unknown_job_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = get_job(&store, 77).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, ImportError::NotFound { id: 77, .. }));
    }

    #[test]
    fn parse_policies_are_named_per_format() {
        assert_eq!(
            ParsePolicy::for_format(ImportFormat::Har),
            ParsePolicy::AllOrNothing
        );
        assert_eq!(
            ParsePolicy::for_format(ImportFormat::BurpXml),
            ParsePolicy::SkipInvalidItems
        );
    }
}
