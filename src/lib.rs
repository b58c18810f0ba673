// ==========================================
// NEXO work-planning backend
// ==========================================
// Import pipeline for NEXO spreadsheet exports: download, parse,
// validate, reconcile against persisted interventions and projects,
// persist in chunks and log every row. See the api module for the
// workflow entry points.
// ==========================================

rust_i18n::i18n!("locales", fallback = "fr-CA");

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod i18n;
pub mod importer;
pub mod logging;
pub mod repository;

pub use api::{ApiError, ApiResult, FileUpload, ImportApi};
pub use domain::import_log::ImportLog;
pub use domain::types::{ImportStatus, NexoFileType};
