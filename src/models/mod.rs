//! Data models for the traffic import pipeline

pub mod endpoint;
pub mod exchange;
pub mod header;
pub mod job;

pub use endpoint::*;
pub use exchange::*;
pub use header::*;
pub use job::*;
