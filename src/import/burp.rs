//! Burp Suite XML export parser
//!
//! Each `<item>` carries base64 encoded raw request and response messages.
//! Unlike HAR, recovery is per item: an item whose payloads do not decode or
//! whose request line is malformed is skipped and the rest of the document
//! is still imported. Only a document that is not valid XML is fatal.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use crate::error::{ImportError, Result};
use crate::hashing::{self, CanonicalTexts};
use crate::models::{CapturedExchange, HeaderField, HeaderList, IgnoreList, ImportFormat};

use super::url_parts;

/// Timestamp layout of the `<time>` element, e.g. `Mon Oct 17 10:20:30 GMT+02:00 2022`
const BURP_TIME_FORMAT: &str = "%a %b %d %H:%M:%S GMT%:z %Y";

#[derive(Deserialize, Default)]
struct BurpItems {
    #[serde(rename = "item", default)]
    items: Vec<BurpItem>,
}

/// Element text, ignoring attributes such as `base64="true"` or `ip="..."`
#[derive(Deserialize, Default)]
struct XmlText {
    #[serde(rename = "$text", default)]
    text: String,
}

/// One exported item. `method`, `path` and `comment` are also present in the
/// export but the raw request line is authoritative, so they are not read.
#[derive(Deserialize, Default)]
#[serde(default)]
struct BurpItem {
    time: XmlText,
    url: XmlText,
    host: XmlText,
    port: XmlText,
    protocol: XmlText,
    request: XmlText,
    response: XmlText,
}

/// Options that shape how items are stored
#[derive(Debug, Clone)]
pub struct BurpOptions<'a> {
    /// Header names dropped from both requests and responses
    pub ignore: &'a IgnoreList,
    /// Serialized header text above this many bytes is truncated
    pub header_storage_limit: usize,
}

/// Why an item was left out of the import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    RequestEncoding,
    ResponseEncoding,
    TooFewLines,
    BadRequestLine,
}

struct RawRequest {
    method: String,
    target: String,
    headers: HeaderList,
    body: String,
}

struct RawResponse {
    status: i64,
    headers: HeaderList,
    body: String,
}

/// Parse a Burp XML export.
///
/// Emitted exchanges are numbered 1.. contiguously in document order; skipped
/// items consume no sequence number.
///
/// Hashes are computed over the full filtered headers before oversized header
/// blocks are truncated to [`HeaderField::Raw`]. A pipeline that truncates
/// first hashes an empty echo for such blocks, so request and response hashes
/// of oversized items will not match one produced that way.
pub fn parse_burp_xml<F>(
    bytes: &[u8],
    options: &BurpOptions<'_>,
    canonical: F,
) -> Result<Vec<CapturedExchange>>
where
    F: Fn(&CapturedExchange) -> CanonicalTexts,
{
    let text = std::str::from_utf8(bytes)
        .map_err(|err| ImportError::decode(ImportFormat::BurpXml, err))?;
    let document: BurpItems = quick_xml::de::from_str(text)
        .map_err(|err| ImportError::decode(ImportFormat::BurpXml, err))?;

    let total = document.items.len();
    let mut exchanges = Vec::with_capacity(total);
    for (index, item) in document.items.into_iter().enumerate() {
        let sequence = exchanges.len() as u32 + 1;
        match item_to_exchange(sequence, item, options, &canonical) {
            Ok(exchange) => exchanges.push(exchange),
            Err(reason) => {
                tracing::debug!("Burp XML: skipping item {} ({:?})", index + 1, reason);
            }
        }
    }

    if exchanges.len() < total {
        tracing::info!(
            "Burp XML: skipped {} of {} items",
            total - exchanges.len(),
            total
        );
    }
    Ok(exchanges)
}

fn item_to_exchange<F>(
    sequence: u32,
    item: BurpItem,
    options: &BurpOptions<'_>,
    canonical: &F,
) -> std::result::Result<CapturedExchange, SkipReason>
where
    F: Fn(&CapturedExchange) -> CanonicalTexts,
{
    let request_bytes = decode_base64(&item.request.text).ok_or(SkipReason::RequestEncoding)?;
    let response_bytes =
        decode_base64(&item.response.text).ok_or(SkipReason::ResponseEncoding)?;

    let request = parse_raw_request(&String::from_utf8_lossy(&request_bytes))?;
    let response = parse_raw_response(&String::from_utf8_lossy(&response_bytes));

    let url = item_url(&item, &request.target);
    let domain = url_parts::parse_host(&url).unwrap_or_else(|| item.host.text.trim().to_string());

    let request_headers = request.headers.without(options.ignore);
    let response_headers = response.headers.without(options.ignore);

    let mut exchange = CapturedExchange {
        sequence,
        url,
        method: request.method,
        domain,
        request_headers: HeaderField::Structured(request_headers),
        request_body: request.body,
        response_status: response.status,
        response_headers: HeaderField::Structured(response_headers),
        size: response.body.len() as i64,
        response_body: response.body,
        // the export has no response timing
        latency_ms: 0,
        request_time: parse_item_time(&item.time.text),
        ..Default::default()
    };

    let texts = canonical(&exchange);
    let identity_headers = exchange
        .request_headers
        .pairs()
        .cloned()
        .unwrap_or_default();
    exchange.hashes = hashing::fingerprint(&exchange, &texts, &identity_headers);

    exchange.request_headers =
        cap_header_field(exchange.request_headers, options.header_storage_limit);
    exchange.response_headers =
        cap_header_field(exchange.response_headers, options.header_storage_limit);
    Ok(exchange)
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    general_purpose::STANDARD.decode(text.trim()).ok()
}

/// Split a raw message into header lines and body on the first blank line.
///
/// Returns the header pairs and the body; lines without a colon are ignored.
fn split_message(lines: &[&str], blank: impl Fn(&str) -> bool) -> (HeaderList, String) {
    let mut headers = HeaderList::new();
    let mut body_start = None;
    for (i, line) in lines.iter().copied().enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if blank(line) {
            body_start = Some(i + 1);
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push(name.trim(), value.trim());
        }
    }
    let body = match body_start {
        Some(start) if start < lines.len() => lines[start..].join("\n"),
        _ => String::new(),
    };
    (headers, body)
}

fn parse_raw_request(text: &str) -> std::result::Result<RawRequest, SkipReason> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < 2 {
        return Err(SkipReason::TooFewLines);
    }
    let parts: Vec<&str> = lines[0].split(' ').collect();
    if parts.len() < 3 {
        return Err(SkipReason::BadRequestLine);
    }
    let (headers, body) = split_message(&lines[1..], str::is_empty);
    Ok(RawRequest {
        method: parts[0].to_string(),
        target: parts[1].to_string(),
        headers,
        body,
    })
}

fn parse_raw_response(text: &str) -> RawResponse {
    let lines: Vec<&str> = text.split('\n').collect();
    let status = lines
        .first()
        .filter(|line| line.starts_with("HTTP/"))
        .and_then(|line| line.split(' ').nth(1))
        .and_then(|code| code.trim().parse::<i64>().ok())
        .unwrap_or(200);
    let (headers, body) = if lines.len() > 1 {
        split_message(&lines[1..], |line| line.trim().is_empty())
    } else {
        (HeaderList::new(), String::new())
    };
    RawResponse {
        status,
        headers,
        body,
    }
}

/// The item's own URL, or one rebuilt from protocol, host and port.
fn item_url(item: &BurpItem, target: &str) -> String {
    let explicit = item.url.text.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    let scheme = if item.protocol.text.trim() == "https" {
        "https"
    } else {
        "http"
    };
    let port = item.port.text.trim().parse::<u32>().unwrap_or(0);
    let port = match port {
        0 | 80 | 443 => String::new(),
        p => format!(":{}", p),
    };
    format!("{}://{}{}{}", scheme, item.host.text.trim(), port, target)
}

fn parse_item_time(text: &str) -> String {
    match DateTime::parse_from_str(text.trim(), BURP_TIME_FORMAT) {
        Ok(time) => time.to_rfc3339_opts(SecondsFormat::Secs, true),
        Err(_) => Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Hard-truncate an oversized serialized header block.
///
/// The cut lands on the nearest character boundary at or below `limit`; the
/// result no longer decodes, so it is carried as raw text.
fn cap_header_field(field: HeaderField, limit: usize) -> HeaderField {
    let encoded = match field.to_stored() {
        Ok(encoded) => encoded,
        Err(_) => return field,
    };
    if encoded.len() <= limit {
        return field;
    }
    let mut cut = limit;
    while !encoded.is_char_boundary(cut) {
        cut -= 1;
    }
    HeaderField::Raw(encoded[..cut].to_string())
}
