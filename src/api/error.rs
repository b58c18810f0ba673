// ==========================================
// NEXO work-planning - API layer errors
// ==========================================

use crate::domain::types::ImportStatus;
use crate::i18n;
use crate::repository::RepositoryError;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("import log not found: {id}")]
    NotFound { id: String },

    #[error("import {id} already reached a terminal state ({status})")]
    AlreadyTerminal { id: String, status: ImportStatus },

    #[error("an import is already in progress: {id}")]
    AlreadyInProgress {
        id: String,
        started_at: Option<NaiveDateTime>,
        started_by: Option<String>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// Operator-facing message, localized like the import log itself.
    pub fn localized_message(&self) -> String {
        match self {
            ApiError::NotFound { id } => {
                i18n::t_with_args("import.not_found", &[("id", id.clone())])
            }
            ApiError::AlreadyTerminal { id, status } => i18n::t_with_args(
                "import.already_terminal",
                &[("id", id.clone()), ("status", status.as_str().to_string())],
            ),
            ApiError::AlreadyInProgress {
                id,
                started_at,
                started_by,
            } => i18n::t_with_args(
                "import.already_in_progress",
                &[
                    ("id", id.clone()),
                    (
                        "started_at",
                        started_at.map(|d| d.to_string()).unwrap_or_default(),
                    ),
                    ("started_by", started_by.clone().unwrap_or_default()),
                ],
            ),
            other => other.to_string(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
