//! Exchange fingerprints
//!
//! All digests are SHA-256 rendered as lowercase hex. Canonical texts are
//! built from the exchange fields without normalizing header order, so the
//! same headers in a different order fingerprint differently.

use sha2::{Digest, Sha256};

use crate::models::{CapturedExchange, ExchangeHashes, HeaderList};

/// Digest of arbitrary text as 64 lowercase hex characters.
pub fn digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Canonical texts behind `request_hash` and `response_hash`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTexts {
    pub request: String,
    pub response: String,
}

/// `method url body headers-echo`
pub fn request_text(method: &str, url: &str, body: &str, headers: &HeaderList) -> String {
    format!("{} {} {} {}", method, url, body, headers.echo_all())
}

/// `status headers-echo` immediately followed by the body
pub fn response_text(status: i64, headers: &HeaderList, body: &str) -> String {
    format!("{} {}{}", status, headers.echo_all(), body)
}

/// Canonical texts over the headers stored on the exchange.
pub fn canonical_texts(exchange: &CapturedExchange) -> CanonicalTexts {
    let empty = HeaderList::new();
    let request_headers = exchange.request_headers.pairs().unwrap_or(&empty);
    let response_headers = exchange.response_headers.pairs().unwrap_or(&empty);
    CanonicalTexts {
        request: request_text(
            &exchange.method,
            &exchange.url,
            &exchange.request_body,
            request_headers,
        ),
        response: response_text(
            exchange.response_status,
            response_headers,
            &exchange.response_body,
        ),
    }
}

/// Fill in all four fingerprints.
///
/// `texts` supplies the request/response canonical texts; the identity hash is
/// always taken over `identity_headers`, the ignore-filtered request headers.
pub fn fingerprint(
    exchange: &CapturedExchange,
    texts: &CanonicalTexts,
    identity_headers: &HeaderList,
) -> ExchangeHashes {
    ExchangeHashes {
        request_hash: digest(&texts.request),
        request_identity_hash: digest(&request_text(
            &exchange.method,
            &exchange.url,
            &exchange.request_body,
            identity_headers,
        )),
        response_hash: digest(&texts.response),
        response_body_hash: digest(&exchange.response_body),
    }
}
