//! Endpoint derivation
//!
//! Exchanges are grouped by `(domain, method, path)`. The index lives in an
//! [`EndpointScope`] owned by a single import job and dropped with it; there is
//! no index shared across jobs, so two jobs may each create the same endpoint.

use std::collections::HashMap;

use crate::models::{CapturedExchange, EndpointKey, EndpointType, ImportFormat, NewEndpoint};

use super::url_parts;

/// Key of an exchange, or `None` when it has no domain or its URL has no path.
pub fn key_for(exchange: &CapturedExchange) -> Option<EndpointKey> {
    if exchange.domain.is_empty() {
        return None;
    }
    let path = url_parts::endpoint_path(&exchange.url)?;
    Some(EndpointKey::new(&exchange.domain, &exchange.method, &path))
}

/// Job-scoped endpoint index
#[derive(Debug)]
pub struct EndpointScope {
    program_id: i64,
    description: String,
    index: HashMap<EndpointKey, usize>,
    candidates: Vec<NewEndpoint>,
}

impl EndpointScope {
    pub fn new(program_id: i64, format: ImportFormat, filename: &str) -> Self {
        Self {
            program_id,
            description: format!("Auto-generated from {} import: {}", format.label(), filename),
            index: HashMap::new(),
            candidates: Vec::new(),
        }
    }

    /// Build a scope over every exchange of a job.
    pub fn derive(
        program_id: i64,
        format: ImportFormat,
        filename: &str,
        exchanges: &[CapturedExchange],
    ) -> Self {
        let mut scope = Self::new(program_id, format, filename);
        for exchange in exchanges {
            if scope.observe(exchange).is_none() {
                tracing::debug!(
                    "No endpoint key for exchange {} ({:?})",
                    exchange.sequence,
                    exchange.url
                );
            }
        }
        scope
    }

    /// Record an exchange. The first exchange seen for a key defines the
    /// candidate; later ones leave it untouched.
    pub fn observe(&mut self, exchange: &CapturedExchange) -> Option<EndpointKey> {
        let key = key_for(exchange)?;
        if !self.index.contains_key(&key) {
            self.index.insert(key.clone(), self.candidates.len());
            self.candidates.push(NewEndpoint {
                program_id: self.program_id,
                key: key.clone(),
                endpoint_type: EndpointType::Api,
                description: self.description.clone(),
            });
        }
        Some(key)
    }

    /// Candidates in first-seen order
    pub fn candidates(&self) -> &[NewEndpoint] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Pair candidates with the ids storage assigned, in candidate order.
    pub fn into_links(self, ids: &[i64]) -> EndpointLinks {
        let ids = self
            .candidates
            .into_iter()
            .zip(ids.iter().copied())
            .map(|(candidate, id)| (candidate.key, id))
            .collect();
        EndpointLinks { ids }
    }
}

/// Endpoint ids by key, for linking exchanges after persistence
#[derive(Debug, Default)]
pub struct EndpointLinks {
    ids: HashMap<EndpointKey, i64>,
}

impl EndpointLinks {
    pub fn get(&self, key: &EndpointKey) -> Option<i64> {
        self.ids.get(key).copied()
    }

    /// Set `endpoint_id` on every exchange whose key resolves. Unmatched
    /// exchanges stay unlinked. Returns how many were linked.
    pub fn link(&self, exchanges: &mut [CapturedExchange]) -> usize {
        let mut linked = 0;
        for exchange in exchanges.iter_mut() {
            exchange.endpoint_id = key_for(exchange).and_then(|key| self.get(&key));
            if exchange.endpoint_id.is_some() {
                linked += 1;
            }
        }
        linked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(sequence: u32, method: &str, url: &str) -> CapturedExchange {
        CapturedExchange {
            sequence,
            method: method.to_string(),
            url: url.to_string(),
            domain: url_parts::domain_of(url),
            ..Default::default()
        }
    }

    fn sample() -> Vec<CapturedExchange> {
        vec![
            exchange(1, "GET", "https://api.example.com/v1/users?page=1"),
            exchange(2, "GET", "https://api.example.com/v1/users?page=2"),
            exchange(3, "POST", "https://api.example.com/v1/users"),
            exchange(4, "GET", "https://api.example.com"),
            exchange(5, "GET", "https://cdn.example.com/v1/users"),
        ]
    }

    #[test]
    fn first_occurrence_defines_each_key() {
        let scope = EndpointScope::derive(3, ImportFormat::Har, "site.har", &sample());
        let keys: Vec<String> = scope.candidates().iter().map(|c| c.key.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "api.example.com:GET:/v1/users",
                "api.example.com:POST:/v1/users",
                "api.example.com:GET:/",
                "cdn.example.com:GET:/v1/users",
            ]
        );
        let first = &scope.candidates()[0];
        assert_eq!(first.program_id, 3);
        assert_eq!(first.endpoint_type, EndpointType::Api);
        assert_eq!(first.description, "Auto-generated from HAR import: site.har");
    }

    #[test]
    fn derivation_is_idempotent() {
        let exchanges = sample();
        let a = EndpointScope::derive(1, ImportFormat::BurpXml, "x.xml", &exchanges);
        let b = EndpointScope::derive(1, ImportFormat::BurpXml, "x.xml", &exchanges);
        assert_eq!(a.candidates(), b.candidates());
    }

    #[test]
    fn exchanges_without_domain_or_url_get_no_key() {
        let mut no_domain = exchange(1, "GET", "https://api.example.com/a");
        no_domain.domain.clear();
        assert!(key_for(&no_domain).is_none());

        // manual domain fallback succeeds but the URL itself never parses
        let malformed = exchange(2, "GET", "https://bad.example.com:99999/a");
        assert_eq!(malformed.domain, "bad.example.com");
        assert!(key_for(&malformed).is_none());

        let scope = EndpointScope::derive(1, ImportFormat::Har, "f", &[no_domain, malformed]);
        assert!(scope.is_empty());
    }

    #[test]
    fn links_resolve_by_key_and_leave_unmatched_unlinked() {
        let mut exchanges = sample();
        exchanges.push(exchange(6, "GET", "not a url"));
        let scope = EndpointScope::derive(1, ImportFormat::Har, "f", &exchanges);
        assert_eq!(scope.len(), 4);

        let links = scope.into_links(&[10, 11, 12, 13]);
        assert_eq!(links.link(&mut exchanges), 5);
        let ids: Vec<_> = exchanges.iter().map(|e| e.endpoint_id).collect();
        assert_eq!(
            ids,
            vec![Some(10), Some(10), Some(11), Some(12), Some(13), None]
        );
    }

    #[test]
    fn missing_ids_leave_exchanges_unlinked() {
        let mut exchanges = sample();
        let scope = EndpointScope::derive(1, ImportFormat::Har, "f", &exchanges);
        let links = scope.into_links(&[7]);
        assert_eq!(links.link(&mut exchanges), 2);
        assert_eq!(exchanges[2].endpoint_id, None);
    }
}
