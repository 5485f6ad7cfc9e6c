//! Captured exchange model
//!
//! One HTTP request/response pair recovered from an import source.

use serde::{Deserialize, Serialize};

use super::endpoint::Endpoint;
use super::header::HeaderField;

/// Fingerprints computed once when an exchange is parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeHashes {
    /// Method, URL, body and every stored request header
    pub request_hash: String,
    /// Same formula over ignore-filtered request headers
    pub request_identity_hash: String,
    /// Status, response headers and body
    pub response_hash: String,
    /// Response body only
    pub response_body_hash: String,
}

/// Parser output, before persistence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapturedExchange {
    /// 1-based position in the source document
    pub sequence: u32,
    pub url: String,
    pub method: String,
    pub domain: String,
    pub request_headers: HeaderField,
    pub request_body: String,
    pub response_status: i64,
    pub response_headers: HeaderField,
    pub response_body: String,
    /// Response body length in bytes
    pub size: i64,
    pub latency_ms: i64,
    /// Source timestamp as text
    pub request_time: String,
    pub hashes: ExchangeHashes,
    /// Endpoint row this exchange was linked to, if any
    pub endpoint_id: Option<i64>,
}

/// A persisted exchange as returned by read accessors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredExchange {
    pub id: i64,
    pub import_job_id: i64,
    pub program_id: i64,
    pub exchange: CapturedExchange,
    /// Linked endpoint, loaded with the exchange
    pub endpoint: Option<Endpoint>,
}
