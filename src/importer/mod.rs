// ==========================================
// NEXO work-planning - import pipeline building blocks
// ==========================================
// Parsing, typed rows, field guards and business validators for the
// four NEXO spreadsheet kinds. The orchestration lives in the engine
// module; everything here is side-effect free apart from taxonomy
// lookups.
// ==========================================

pub mod content_validator;
pub mod error;
pub mod file_parser;
pub mod guard;
pub mod rows;
pub mod taxonomy_resolver;
pub mod validators;

pub use content_validator::validate_content;
pub use error::{ImportError, ImportResult};
pub use file_parser::{parse_sheet, ParsedSheet, RawRecord};
pub use rows::{
    budget_se_rows, intervention_se_rows, rehab_aq_rows, rehab_eg_rows, BudgetSeFields,
    BudgetSeRow, InterventionSeFields, InterventionSeRow, NexoRow, RehabAqConceptionFields,
    RehabAqConceptionRow, RehabEgConceptionFields, RehabEgConceptionRow, ResolvedTaxonomy,
};
pub use taxonomy_resolver::TaxonomyResolver;
