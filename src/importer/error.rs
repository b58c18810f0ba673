// ==========================================
// NEXO work-planning - importer errors
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file content is not a readable spreadsheet: {0}")]
    UnreadableFile(String),

    #[error("csv parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("excel parse error: {0}")]
    Excel(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ImportResult<T> = Result<T, ImportError>;
