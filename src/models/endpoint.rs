//! Endpoint model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Endpoint classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndpointType {
    Web,
    #[default]
    Api,
    GraphQl,
}

impl EndpointType {
    /// Convert from string (lossy, defaults to API)
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "web" => EndpointType::Web,
            "graphql" => EndpointType::GraphQl,
            _ => EndpointType::Api,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointType::Web => "Web",
            EndpointType::Api => "API",
            EndpointType::GraphQl => "GraphQL",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplication key: domain, method and normalized path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointKey {
    pub domain: String,
    pub method: String,
    pub path: String,
}

impl EndpointKey {
    pub fn new(domain: &str, method: &str, path: &str) -> Self {
        Self {
            domain: domain.to_string(),
            method: method.to_string(),
            path: normalize_path(path),
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.domain, self.method, self.path)
    }
}

/// An empty path is the root path.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Endpoint candidate, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEndpoint {
    pub program_id: i64,
    pub key: EndpointKey,
    pub endpoint_type: EndpointType,
    /// Provenance of an auto-generated endpoint
    pub description: String,
}

/// Persisted endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub program_id: i64,
    pub domain: String,
    pub method: String,
    pub path: String,
    pub endpoint_type: EndpointType,
    pub description: String,
    pub created_at: String,
}

impl Endpoint {
    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(&self.domain, &self.method, &self.path)
    }
}
