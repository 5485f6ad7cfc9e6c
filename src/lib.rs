//! # Traffic Import
//!
//! Turns captured HTTP traffic into a persistent catalog of endpoints and
//! exchanges.
//!
//! ## Features
//!
//! - HAR 1.2 JSON import
//! - Burp Suite XML export import (base64 raw messages)
//! - Content hashes for request identity and response dedup
//! - Endpoint derivation keyed by domain, method and path
//! - Import jobs with progress checkpoints
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              CLI / async API (tokio)                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                 Import orchestrator                      │
//! │  ┌─────────┐  ┌──────────┐  ┌──────────┐  ┌───────────┐ │
//! │  │ Parsers │──│ Hashing  │──│Endpoints │──│  Storage  │ │
//! │  │HAR/Burp │  │ (SHA-256)│  │          │  │ (SQLite)  │ │
//! │  └─────────┘  └──────────┘  └──────────┘  └───────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod hashing;
pub mod import;
pub mod models;
pub mod storage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
