// ==========================================
// NEXO work-planning - processing engine
// ==========================================
// Business services above the importer primitives: annual budget
// distribution, reconciliation of typed rows into interventions and
// projects, and the orchestrator driving a whole import run.
// ==========================================

pub mod annual_distribution;
pub mod orchestrator;
pub mod reconciliation;

#[cfg(test)]
pub mod test_support;

pub use orchestrator::ImportOrchestrator;
