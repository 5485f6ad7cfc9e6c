//! HAR (browser network log) parser
//!
//! Parsing is all-or-nothing at the document level: if the JSON cannot be
//! decoded into `{log:{entries:[...]}}` nothing is returned. Below that every
//! value may be missing or `null` and falls back to its zero value: a `null`
//! entries list is empty, a `null` entry or block is an empty one. No entry is
//! ever dropped.

use serde::Deserialize;

use crate::error::{ImportError, Result};
use crate::hashing::{self, CanonicalTexts};
use crate::models::{CapturedExchange, Header, HeaderField, HeaderList, IgnoreList, ImportFormat};

use super::url_parts;

#[derive(Deserialize)]
struct RawHar {
    log: RawHarLog,
}

#[derive(Deserialize)]
struct RawHarLog {
    #[serde(default)]
    entries: Option<Vec<Option<RawHarEntry>>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawHarEntry {
    #[serde(rename = "startedDateTime")]
    started_datetime: Option<String>,
    time: Option<f64>,
    request: Option<RawHarRequest>,
    response: Option<RawHarResponse>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawHarRequest {
    method: Option<String>,
    url: Option<String>,
    headers: Option<Vec<Option<RawHarHeader>>>,
    #[serde(rename = "postData")]
    post_data: Option<RawHarText>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawHarResponse {
    status: Option<i64>,
    headers: Option<Vec<Option<RawHarHeader>>>,
    content: Option<RawHarText>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawHarHeader {
    name: Option<String>,
    value: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawHarText {
    text: Option<String>,
}

fn to_header_list(headers: Option<Vec<Option<RawHarHeader>>>) -> HeaderList {
    headers
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .map(|h| Header::new(h.name.unwrap_or_default(), h.value.unwrap_or_default()))
        .collect()
}

/// Parse a HAR document into exchanges numbered from 1 in entry order.
///
/// `canonical` receives each built exchange and returns the texts behind its
/// request and response hashes. The identity hash is computed here over the
/// request headers with `ignore` applied; stored headers are left unfiltered.
pub fn parse_har<F>(bytes: &[u8], ignore: &IgnoreList, canonical: F) -> Result<Vec<CapturedExchange>>
where
    F: Fn(&CapturedExchange) -> CanonicalTexts,
{
    let raw: RawHar =
        serde_json::from_slice(bytes).map_err(|err| ImportError::decode(ImportFormat::Har, err))?;

    let exchanges = raw
        .log
        .entries
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            entry_to_exchange(index, entry.unwrap_or_default(), ignore, &canonical)
        })
        .collect();
    Ok(exchanges)
}

fn entry_to_exchange<F>(
    index: usize,
    entry: RawHarEntry,
    ignore: &IgnoreList,
    canonical: &F,
) -> CapturedExchange
where
    F: Fn(&CapturedExchange) -> CanonicalTexts,
{
    let request = entry.request.unwrap_or_default();
    let response = entry.response.unwrap_or_default();
    let url = request.url.unwrap_or_default();
    let request_headers = to_header_list(request.headers);
    let response_headers = to_header_list(response.headers);
    let response_body = response
        .content
        .and_then(|c| c.text)
        .unwrap_or_default();

    let identity_headers = request_headers.without(ignore);

    let mut exchange = CapturedExchange {
        sequence: (index + 1) as u32,
        domain: url_parts::domain_of(&url),
        url,
        method: request.method.unwrap_or_default(),
        request_headers: HeaderField::Structured(request_headers),
        request_body: request
            .post_data
            .and_then(|p| p.text)
            .unwrap_or_default(),
        response_status: response.status.unwrap_or_default(),
        response_headers: HeaderField::Structured(response_headers),
        size: response_body.len() as i64,
        response_body,
        latency_ms: entry.time.unwrap_or_default() as i64,
        request_time: entry.started_datetime.unwrap_or_default(),
        ..Default::default()
    };

    let texts = canonical(&exchange);
    exchange.hashes = hashing::fingerprint(&exchange, &texts, &identity_headers);
    exchange
}
