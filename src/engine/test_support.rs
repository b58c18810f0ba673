// ==========================================
// NEXO work-planning - shared test fixtures
// ==========================================

use crate::domain::annual_distribution::AnnualDistribution;
use crate::domain::intervention::{Estimate, ExternalReferenceId, Intervention, StreetLocation};
use crate::domain::types::InterventionStatus;
use chrono::Utc;
use std::collections::BTreeMap;

/// A persisted-looking intervention reconciled under `dossier`.
pub fn intervention_fixture(dossier: &str) -> Intervention {
    let now = Utc::now().naive_utc();
    Intervention {
        id: format!("I-{}", dossier),
        name: format!("Intervention {}", dossier),
        status: InterventionStatus::Wished,
        asset_type_id: "aqueductSegment".to_string(),
        work_type_id: "rehabilitation".to_string(),
        requestor_id: "deeu".to_string(),
        executor_id: "di".to_string(),
        borough_id: "vm".to_string(),
        program_id: None,
        planification_year: 2025,
        end_year: 2026,
        estimate: Estimate {
            allowance: 100.0,
            length: 300.0,
        },
        assets: Vec::new(),
        annual_distribution: AnnualDistribution::default(),
        project_id: None,
        external_reference_ids: vec![ExternalReferenceId::dossier(dossier)],
        import_revision_date: None,
        streets: StreetLocation {
            street_name: "de chambly".to_string(),
            street_from: "st-jean".to_string(),
            street_to: "papineau".to_string(),
        },
        comments: Vec::new(),
        geometry: None,
        design_data: None,
        line_number: None,
        code_status_carnet: None,
        code_phase: None,
        modification_summary: BTreeMap::new(),
        decision_required: false,
        modification_type: None,
        created_at: now,
        updated_at: now,
    }
}
