//! URL helpers shared by the parsers and the endpoint deriver

use percent_encoding::percent_decode_str;
use url::Url;

/// Host of a well-formed URL, without port or IPv6 brackets.
///
/// Hosts come back lowercased, so `API.example.com` and `api.example.com`
/// share endpoints.
pub fn parse_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Domain for a captured URL.
///
/// Captured URLs are sometimes malformed, so when proper parsing yields no host
/// the scheme is stripped by hand and the authority is cut at the first `/`
/// and at its port separator.
pub fn domain_of(url: &str) -> String {
    if let Some(host) = parse_host(url) {
        return host;
    }
    let remainder = if let Some(rest) = url.strip_prefix("https://") {
        rest
    } else if let Some(rest) = url.strip_prefix("http://") {
        rest
    } else {
        return String::new();
    };
    let authority = remainder.split('/').next().unwrap_or_default();
    split_port(authority).to_string()
}

fn split_port(authority: &str) -> &str {
    match authority.find(':') {
        Some(pos) => &authority[..pos],
        None => authority,
    }
}

/// Decoded path of a well-formed URL, empty path normalized to `/`.
///
/// Dot segments are resolved by the URL parser (`/a/../b` is `/b`) and
/// percent escapes are decoded (`/a%20b` is `/a b`). Invalid UTF-8 after
/// decoding is replaced rather than rejected.
pub fn endpoint_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = percent_decode_str(parsed.path()).decode_utf8_lossy();
    Some(if path.is_empty() {
        "/".to_string()
    } else {
        path.into_owned()
    })
}
