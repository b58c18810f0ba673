// ==========================================
// NEXO work-planning - row validators
// ==========================================

pub mod budget_validators;
pub mod intervention_validators;
pub mod rehab_validators;

pub use budget_validators::validate_budget_rows;
pub use intervention_validators::{
    group_key, validate_group_homogeneity, validate_not_stale, validate_taxonomy,
};
pub use rehab_validators::{validate_eg_rows, validate_rehab_rows, RehabConceptionFields};
