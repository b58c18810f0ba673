// ==========================================
// NEXO work-planning - import API
// ==========================================
// Entry points for the import workflow: register an upload batch,
// start a run, poll its log. Starting is asynchronous: preconditions
// are checked synchronously, then the orchestrator runs detached and
// the caller polls the log for progress.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::import_log::{ImportFile, ImportLog};
use crate::domain::types::{ImportStatus, NexoFileType};
use crate::engine::ImportOrchestrator;
use crate::i18n;
use crate::repository::{
    ImportLogRepository, ImportLogRepositoryImpl, StorageRepository, StorageRepositoryImpl,
};
use anyhow::anyhow;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// One uploaded spreadsheet, as received from the caller.
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub file_type: NexoFileType,
    pub data: Vec<u8>,
}

pub struct ImportApi {
    db_path: String,
    import_log_repo: Arc<dyn ImportLogRepository>,
    storage_repo: Arc<dyn StorageRepository>,
    config_manager: ConfigManager,
}

impl ImportApi {
    pub fn new(db_path: &str) -> ApiResult<Self> {
        Ok(ImportApi {
            db_path: db_path.to_string(),
            import_log_repo: Arc::new(ImportLogRepositoryImpl::new(db_path)?),
            storage_repo: Arc::new(StorageRepositoryImpl::new(db_path)?),
            config_manager: ConfigManager::new(db_path)
                .map_err(|e| ApiError::Other(anyhow!("{}", e)))?,
        })
    }

    /// Stores the uploaded blobs and creates a PENDING import log.
    /// The batch must open with the interventions file; dependent
    /// files are optional and at most one of each kind is accepted.
    pub async fn register_import(
        &self,
        uploads: Vec<FileUpload>,
        created_by: &str,
    ) -> ApiResult<ImportLog> {
        let first_type = uploads.first().map(|u| u.file_type).ok_or_else(|| {
            ApiError::InvalidRequest(i18n::t_with_args(
                "import.first_file_invalid",
                &[("type", "-".to_string())],
            ))
        })?;
        if first_type != NexoFileType::InterventionsSe {
            return Err(ApiError::InvalidRequest(i18n::t_with_args(
                "import.first_file_invalid",
                &[("type", first_type.as_str().to_string())],
            )));
        }
        for (idx, upload) in uploads.iter().enumerate() {
            if uploads[..idx].iter().any(|u| u.file_type == upload.file_type) {
                return Err(ApiError::InvalidRequest(format!(
                    "duplicate file of kind {}",
                    upload.file_type
                )));
            }
        }

        let mut files = Vec::with_capacity(uploads.len());
        for upload in &uploads {
            let storage_id = self
                .storage_repo
                .put(&upload.content_type, &upload.data)
                .await?;
            files.push(ImportFile::new(
                &upload.name,
                &upload.content_type,
                upload.file_type,
                &storage_id,
            ));
        }
        let log = ImportLog::new(files, created_by);
        self.import_log_repo.save(&log).await?;
        info!(import_log_id = %log.id, files = log.files.len(), "import registered");
        Ok(log)
    }

    /// Checks the start preconditions synchronously, then launches the
    /// orchestrator detached and returns immediately. The single-run
    /// check is read-before-write, best effort.
    pub async fn start_import(
        &self,
        import_log_id: &str,
        started_by: &str,
    ) -> ApiResult<ImportLog> {
        let mut log = self
            .import_log_repo
            .find_by_id(import_log_id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                id: import_log_id.to_string(),
            })?;
        if matches!(log.status, ImportStatus::Success | ImportStatus::Failure) {
            return Err(ApiError::AlreadyTerminal {
                id: log.id,
                status: log.status,
            });
        }
        if let Some(running) = self.import_log_repo.find_in_progress().await? {
            return Err(ApiError::AlreadyInProgress {
                id: running.id,
                started_at: running.audit.started_at,
                started_by: running.audit.started_by,
            });
        }

        log.audit.started_at = Some(Utc::now().naive_utc());
        log.audit.started_by = Some(started_by.to_string());
        self.import_log_repo.save(&log).await?;

        let config = self
            .config_manager
            .load_import_config()
            .map_err(|e| ApiError::Other(anyhow!("{}", e)))?;
        let orchestrator = ImportOrchestrator::from_db_path(&self.db_path, config)?;
        let id = log.id.clone();
        tokio::spawn(async move {
            orchestrator.run(&id).await;
        });
        info!(import_log_id = %log.id, started_by, "import started");
        Ok(log)
    }

    pub async fn get_import_log(&self, import_log_id: &str) -> ApiResult<ImportLog> {
        self.import_log_repo
            .find_by_id(import_log_id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                id: import_log_id.to_string(),
            })
    }

    pub async fn list_recent_imports(&self, limit: usize) -> ApiResult<Vec<ImportLog>> {
        Ok(self.import_log_repo.find_recent(limit).await?)
    }
}
