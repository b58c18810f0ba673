// ==========================================
// NEXO work-planning - import log aggregate
// ==========================================
// Persisted trace of one import run: one ImportLog aggregates one
// ImportFile per uploaded spreadsheet, each carrying file-level
// errors and per-row log entries. Statuses visible to pollers are
// derived on read, never cached.
// ==========================================

use crate::domain::types::{ErrorCode, ErrorTarget, ImportStatus, ModificationType, NexoFileType};
use crate::i18n;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// FileError
// ==========================================

/// One structured error, file- or row-scoped. `line` is 0 for
/// file-level errors. Human text is rendered through the fr-CA
/// template table, with three fallback levels (exact code+target,
/// code default, global default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub code: ErrorCode,
    pub target: ErrorTarget,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub line: u32,
}

impl FileError {
    pub fn new(code: ErrorCode, target: ErrorTarget, line: u32) -> Self {
        FileError {
            code,
            target,
            values: BTreeMap::new(),
            line,
        }
    }

    pub fn with_value(mut self, placeholder: &str, value: impl Into<String>) -> Self {
        self.values.insert(placeholder.to_string(), value.into());
        self
    }

    /// Renders the error to a localized message. Lookup order:
    /// `file_error.<code>.<target>`, `file_error.<code>.default`,
    /// `file_error.default` - an unanticipated combination always
    /// yields a coherent message.
    pub fn description(&self) -> String {
        let mut args: Vec<(&str, String)> = self
            .values
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        let line = self.line.to_string();
        args.push(("line", line));

        let candidates = [
            format!(
                "file_error.{}.{}",
                self.code.i18n_key(),
                self.target.i18n_key()
            ),
            format!("file_error.{}.default", self.code.i18n_key()),
            "file_error.default".to_string(),
        ];
        for key in &candidates {
            if let Some(message) = i18n::try_translate_with_args(key, &args) {
                return message;
            }
        }
        // Unreachable while the global default exists in the locale files.
        format!("{:?}/{:?} (ligne {})", self.code, self.target, self.line)
    }
}

// ==========================================
// Log entries
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogEntryKind {
    Intervention,
    Project,
}

/// Row-level outcome projection. `id` is the external dossier value
/// (or the generated internal id once one exists, or NO_ID_PROVIDED).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub kind: LogEntryKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    pub import_status: ImportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_type: Option<ModificationType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub element_errors: Vec<FileError>,
}

impl LogEntry {
    pub fn intervention(
        id: impl Into<String>,
        line_number: u32,
        modification_type: Option<ModificationType>,
        element_errors: Vec<FileError>,
    ) -> Self {
        let import_status = if element_errors.is_empty() {
            ImportStatus::Success
        } else {
            ImportStatus::Failure
        };
        LogEntry {
            kind: LogEntryKind::Intervention,
            id: id.into(),
            line_number: Some(line_number),
            import_status,
            modification_type,
            element_errors,
        }
    }

    pub fn project(
        id: impl Into<String>,
        modification_type: Option<ModificationType>,
    ) -> Self {
        LogEntry {
            kind: LogEntryKind::Project,
            id: id.into(),
            line_number: None,
            import_status: ImportStatus::Success,
            modification_type,
            element_errors: Vec::new(),
        }
    }
}

// ==========================================
// ImportFile
// ==========================================

/// One uploaded file inside an import batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFile {
    pub id: String,
    pub name: String,
    pub content_type: String,
    #[serde(rename = "type")]
    pub file_type: NexoFileType,
    /// Explicitly set progress status; terminal statuses are derived,
    /// see [`ImportFile::derived_status`].
    pub status: ImportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_errors: Vec<FileError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub project_log_entries: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intervention_log_entries: Vec<LogEntry>,
    pub storage_id: String,
}

impl ImportFile {
    pub fn new(
        name: &str,
        content_type: &str,
        file_type: NexoFileType,
        storage_id: &str,
    ) -> Self {
        ImportFile {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            content_type: content_type.to_string(),
            file_type,
            status: ImportStatus::Pending,
            number_of_items: None,
            file_errors: Vec::new(),
            project_log_entries: Vec::new(),
            intervention_log_entries: Vec::new(),
            storage_id: storage_id.to_string(),
        }
    }

    /// Status as observed by pollers. FAILURE wins over everything;
    /// SUCCESS requires all declared items processed and no file
    /// errors; otherwise the explicitly set status stands. Setting
    /// `status` to SUCCESS directly does not override this.
    pub fn derived_status(&self) -> ImportStatus {
        let any_entry_failed = self
            .intervention_log_entries
            .iter()
            .any(|e| e.import_status == ImportStatus::Failure);
        if !self.file_errors.is_empty() || any_entry_failed {
            return ImportStatus::Failure;
        }
        if let Some(expected) = self.number_of_items {
            if expected == self.intervention_log_entries.len() {
                return ImportStatus::Success;
            }
        }
        match self.status {
            ImportStatus::Success | ImportStatus::Failure => ImportStatus::InProgress,
            explicit => explicit,
        }
    }

    pub fn add_file_error(&mut self, error: FileError) {
        self.file_errors.push(error);
    }
}

// ==========================================
// ImportLog aggregate root
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLog {
    pub id: String,
    pub status: ImportStatus,
    pub files: Vec<ImportFile>,
    #[serde(default)]
    pub audit: Audit,
}

impl ImportLog {
    pub fn new(files: Vec<ImportFile>, created_by: &str) -> Self {
        ImportLog {
            id: uuid::Uuid::new_v4().to_string(),
            status: ImportStatus::Pending,
            files,
            audit: Audit {
                created_at: Some(Utc::now().naive_utc()),
                created_by: Some(created_by.to_string()),
                ..Audit::default()
            },
        }
    }

    pub fn file_of_type_mut(&mut self, file_type: NexoFileType) -> Option<&mut ImportFile> {
        self.files.iter_mut().find(|f| f.file_type == file_type)
    }

    pub fn file_of_type(&self, file_type: NexoFileType) -> Option<&ImportFile> {
        self.files.iter().find(|f| f.file_type == file_type)
    }

    /// Final status of the run: FAILURE as soon as one file failed.
    pub fn conclude(&mut self) {
        let any_failed = self
            .files
            .iter()
            .any(|f| f.derived_status() == ImportStatus::Failure);
        self.status = if any_failed {
            ImportStatus::Failure
        } else {
            ImportStatus::Success
        };
        self.audit.ended_at = Some(Utc::now().naive_utc());
    }
}
