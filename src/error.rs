//! Error types for the import pipeline

use thiserror::Error;

use crate::models::ImportFormat;
use crate::storage::StoreError;

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Error, Debug)]
pub enum ImportError {
    /// The document as a whole could not be decoded; nothing was parsed
    #[error("failed to parse {format} file: {reason}")]
    Decode {
        format: ImportFormat,
        reason: String,
    },

    /// A write to the catalog failed; earlier batches stay committed
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("unsupported import file: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    pub fn decode(format: ImportFormat, reason: impl ToString) -> Self {
        ImportError::Decode {
            format,
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ImportError::NotFound { .. } | ImportError::Storage(StoreError::NotFound { .. })
        )
    }
}
