//! Ordered HTTP header model
//!
//! Headers are kept as an ordered list of name/value pairs exactly as they
//! appeared in the source document. Duplicates are allowed and order is never
//! normalized, so echo output and hashes follow source order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single header pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    fn echo_into(&self, out: &mut String) {
        out.push_str(&self.name);
        out.push_str(": ");
        out.push_str(&self.value);
        out.push('\n');
    }
}

/// Case-insensitive set of header names excluded from storage and identity hashing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    names: HashSet<String>,
}

impl IgnoreList {
    /// Parse a comma-separated list such as `"Authorization, Cookie"`.
    pub fn parse(list: &str) -> Self {
        Self::from_names(list.split(','))
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_ascii_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_ascii_lowercase())
    }
}

/// Ordered header pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderList(pub Vec<Header>);

impl HeaderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(Header::new(name, value));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.0.iter()
    }

    /// `"Name: Value\n"` for every pair, in order.
    pub fn echo_all(&self) -> String {
        self.echo_where(|_| true)
    }

    /// Echo every pair whose name is not in `exclude`.
    pub fn echo_filtered<S: AsRef<str>>(&self, exclude: &[S]) -> String {
        let exclude = IgnoreList::from_names(exclude);
        self.echo_where(|h| !exclude.contains(&h.name))
    }

    /// Echo only the pairs whose name is in `include`.
    pub fn echo_matched<S: AsRef<str>>(&self, include: &[S]) -> String {
        let include = IgnoreList::from_names(include);
        self.echo_where(|h| include.contains(&h.name))
    }

    /// Copy of the list with ignored names removed, relative order kept.
    pub fn without(&self, ignore: &IgnoreList) -> HeaderList {
        if ignore.is_empty() {
            return self.clone();
        }
        HeaderList(
            self.0
                .iter()
                .filter(|h| !ignore.contains(&h.name))
                .cloned()
                .collect(),
        )
    }

    /// Encode as a JSON array of `{"name", "value"}` objects.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    fn echo_where(&self, keep: impl Fn(&Header) -> bool) -> String {
        let mut out = String::new();
        for header in self.0.iter().filter(|h| keep(h)) {
            header.echo_into(&mut out);
        }
        out
    }
}

impl From<Vec<Header>> for HeaderList {
    fn from(headers: Vec<Header>) -> Self {
        Self(headers)
    }
}

impl FromIterator<Header> for HeaderList {
    fn from_iter<T: IntoIterator<Item = Header>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Header block as it crosses an ingestion boundary.
///
/// Stored text that decodes as a header array becomes `Structured`; anything
/// else (for example a block truncated at the storage ceiling) stays `Raw` and
/// is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderField {
    Structured(HeaderList),
    Raw(String),
}

impl HeaderField {
    /// Resolve stored header text.
    pub fn from_stored(text: &str) -> Self {
        match HeaderList::from_json(text) {
            Ok(list) => HeaderField::Structured(list),
            Err(_) => HeaderField::Raw(text.to_string()),
        }
    }

    /// Encode for storage. `Raw` text is written back verbatim.
    pub fn to_stored(&self) -> serde_json::Result<String> {
        match self {
            HeaderField::Structured(list) => list.to_json(),
            HeaderField::Raw(text) => Ok(text.clone()),
        }
    }

    /// Structured pairs, or `None` for a raw block.
    pub fn pairs(&self) -> Option<&HeaderList> {
        match self {
            HeaderField::Structured(list) => Some(list),
            HeaderField::Raw(_) => None,
        }
    }

    /// Echo of the structured pairs; a raw block echoes as empty.
    pub fn echo_all(&self) -> String {
        self.pairs().map(HeaderList::echo_all).unwrap_or_default()
    }
}

impl Default for HeaderField {
    fn default() -> Self {
        HeaderField::Structured(HeaderList::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HeaderList {
        let mut headers = HeaderList::new();
        headers.push("Host", "api.example.com");
        headers.push("Authorization", "Bearer abc");
        headers.push("Accept", "application/json");
        headers.push("cookie", "session=1");
        headers.push("X-Trace", "42");
        headers
    }

    #[test]
    fn echo_all_preserves_order() {
        assert_eq!(
            sample().echo_all(),
            "Host: api.example.com\nAuthorization: Bearer abc\nAccept: application/json\ncookie: session=1\nX-Trace: 42\n"
        );
        assert_eq!(HeaderList::new().echo_all(), "");
    }

    #[test]
    fn echo_filtered_is_case_insensitive() {
        let echo = sample().echo_filtered(&["AUTHORIZATION", "Cookie"]);
        assert_eq!(
            echo,
            "Host: api.example.com\nAccept: application/json\nX-Trace: 42\n"
        );
    }

    #[test]
    fn echo_matched_keeps_only_requested() {
        let echo = sample().echo_matched(&["x-trace", "host"]);
        assert_eq!(echo, "Host: api.example.com\nX-Trace: 42\n");
    }

    #[test]
    fn ignore_list_trims_and_skips_empty_segments() {
        let ignore = IgnoreList::parse(" Authorization , ,Cookie,");
        assert!(ignore.contains("authorization"));
        assert!(ignore.contains("COOKIE"));
        assert!(!ignore.contains(""));
        assert!(IgnoreList::parse("").is_empty());
    }

    #[test]
    fn without_removes_ignored_and_keeps_relative_order() {
        let filtered = sample().without(&IgnoreList::parse("Authorization,Cookie"));
        let names: Vec<_> = filtered.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Host", "Accept", "X-Trace"]);
    }

    #[test]
    fn json_encoding_round_trips_duplicates_and_order() {
        let mut headers = sample();
        headers.push("Accept", "text/html");
        let encoded = headers.to_json().unwrap();
        assert!(encoded.starts_with(r#"[{"name":"Host","value":"api.example.com"}"#));
        assert_eq!(HeaderList::from_json(&encoded).unwrap(), headers);
    }

    #[test]
    fn header_field_falls_back_to_raw_text() {
        let truncated = r#"[{"name":"Host","val"#;
        let field = HeaderField::from_stored(truncated);
        assert_eq!(field, HeaderField::Raw(truncated.to_string()));
        assert_eq!(field.echo_all(), "");
        assert_eq!(field.to_stored().unwrap(), truncated);

        let structured = HeaderField::from_stored(&sample().to_json().unwrap());
        assert_eq!(structured.pairs(), Some(&sample()));
    }
}
