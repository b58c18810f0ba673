// ==========================================
// NEXO work-planning - repository layer
// ==========================================
// Data access only; no business rules. Each repository owns its own
// connection, so a detached import task builds its set from the
// database path alone.
// ==========================================

pub mod counter_repo;
pub mod error;
pub mod import_log_repo;
pub mod intervention_repo;
pub mod project_repo;
pub mod storage_repo;
pub mod taxonomy_repo;

pub use counter_repo::{CounterRepository, CounterRepositoryImpl};
pub use error::{RepositoryError, RepositoryResult};
pub use import_log_repo::{ImportLogRepository, ImportLogRepositoryImpl};
pub use intervention_repo::{InterventionRepository, InterventionRepositoryImpl};
pub use project_repo::{ProjectRepository, ProjectRepositoryImpl};
pub use storage_repo::{StorageObject, StorageRepository, StorageRepositoryImpl};
pub use taxonomy_repo::{TaxonomyRepository, TaxonomyRepositoryImpl};
