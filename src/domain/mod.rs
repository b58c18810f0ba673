// ==========================================
// NEXO work-planning - domain layer
// ==========================================
// Entities and value types. No I/O, no business orchestration.
// ==========================================

pub mod annual_distribution;
pub mod geometry;
pub mod import_log;
pub mod intervention;
pub mod project;
pub mod taxonomy;
pub mod types;

pub use annual_distribution::{AnnualDistribution, AnnualPeriod, DistributionSummary};
pub use geometry::Geometry;
pub use import_log::{Audit, FileError, ImportFile, ImportLog, LogEntry, LogEntryKind};
pub use intervention::{
    Asset, DesignData, Estimate, ExternalReferenceId, ExternalReferenceType, Intervention,
    ModificationSummary, StreetLocation,
};
pub use project::{Project, YearBucket};
pub use taxonomy::{Localized, NexoMatch, TaxonomyEntry};
pub use types::{
    ErrorCode, ErrorTarget, ImportStatus, InterventionStatus, ModificationType, NexoFileType,
    ProjectCategory, ProjectStatus, TaxonomyGroup,
};
