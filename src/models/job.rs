//! Import job model
//!
//! A job is the unit of progress tracking for one import run. It is created
//! when an import starts and advanced through fixed checkpoints. There is no
//! failed state: an aborted import leaves its job at the last checkpoint that
//! was written.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Source format of an import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportFormat {
    /// Browser network log (JSON)
    Har,
    /// Burp Suite item export (XML)
    BurpXml,
}

impl ImportFormat {
    /// Value stored in the job's type column
    pub fn job_type(&self) -> &'static str {
        match self {
            ImportFormat::Har => "import_har",
            ImportFormat::BurpXml => "import_burp_xml",
        }
    }

    /// Human readable name used in titles and descriptions
    pub fn label(&self) -> &'static str {
        match self {
            ImportFormat::Har => "HAR",
            ImportFormat::BurpXml => "Burp XML",
        }
    }

    /// Guess the format from a file extension (`.har` or `.xml`).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "har" => Some(ImportFormat::Har),
            "xml" => Some(ImportFormat::BurpXml),
            _ => None,
        }
    }
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Checkpoints of the import pipeline, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobStage {
    Created,
    Loaded,
    Parsed,
    EndpointsPersisted,
    Completed,
}

impl JobStage {
    /// Progress percentage written when the stage is reached
    pub fn progress(&self) -> u8 {
        match self {
            JobStage::Created => 0,
            JobStage::Loaded => 10,
            JobStage::Parsed => 30,
            JobStage::EndpointsPersisted => 60,
            JobStage::Completed => 100,
        }
    }
}

/// Job row to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImportJob {
    pub program_id: i64,
    pub format: ImportFormat,
    pub title: String,
    pub description: String,
    pub ignored_headers: String,
}

impl NewImportJob {
    pub fn for_upload(
        format: ImportFormat,
        filename: &str,
        program_id: i64,
        ignored_headers: &str,
    ) -> Self {
        let base = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(filename);
        Self {
            program_id,
            format,
            title: format!("Import {}: {}", format.label(), base),
            description: format!("Importing {} file: {}", format.label(), filename),
            ignored_headers: ignored_headers.to_string(),
        }
    }
}

/// Persisted import job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: i64,
    pub program_id: i64,
    pub job_type: String,
    pub title: String,
    /// 0-100, never decreases
    pub progress: u8,
    pub description: String,
    pub ignored_headers: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Listing view of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: i64,
    pub job_type: String,
    pub title: String,
    pub progress: u8,
    pub created_at: String,
    pub description: String,
}

impl From<ImportJob> for JobSummary {
    fn from(job: ImportJob) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type,
            title: job.title,
            progress: job.progress,
            created_at: job.created_at,
            description: job.description,
        }
    }
}
