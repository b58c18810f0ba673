// ==========================================
// End-to-end import runs against a real SQLite database
// ==========================================

mod common;

use common::{budget_csv, env_with_taxonomy, lead_csv, run_import, upload};
use nexo_planning::domain::import_log::LogEntryKind;
use nexo_planning::domain::types::{ErrorCode, ErrorTarget, InterventionStatus, ModificationType};
use nexo_planning::repository::{
    InterventionRepository, InterventionRepositoryImpl, ProjectRepository, ProjectRepositoryImpl,
};
use nexo_planning::{ImportStatus, NexoFileType};

const VALID_ROW: &str =
    "D-1,A-7,AQ-01,REH,2,DI,DEEU,VM,de chambly,st-jean,papineau,2025,2026,120,300,2025-06-01";

async fn interventions_of(db_path: &str, dossier: &str) -> Vec<nexo_planning::domain::intervention::Intervention> {
    let repo = InterventionRepositoryImpl::new(db_path).unwrap();
    repo.find_by_nexo_dossiers(&[dossier.to_string()])
        .await
        .unwrap()
}

#[tokio::test]
async fn test_single_valid_row_creates_intervention_and_project() {
    let env = env_with_taxonomy().await;
    let log = run_import(
        &env,
        vec![upload(NexoFileType::InterventionsSe, lead_csv(&[VALID_ROW]))],
    )
    .await;

    assert_eq!(log.status, ImportStatus::Success);
    let file = log.file_of_type(NexoFileType::InterventionsSe).unwrap();
    assert_eq!(file.number_of_items, Some(1));
    assert_eq!(file.intervention_log_entries.len(), 1);
    let entry = &file.intervention_log_entries[0];
    assert_eq!(entry.import_status, ImportStatus::Success);
    assert_eq!(entry.modification_type, Some(ModificationType::Creation));
    assert_eq!(entry.kind, LogEntryKind::Intervention);

    let interventions = interventions_of(&env.db_path, "D-1").await;
    assert_eq!(interventions.len(), 1);
    let intervention = &interventions[0];
    assert!(intervention.id.starts_with('I'));
    assert_eq!(intervention.status, InterventionStatus::Wished);
    assert_eq!(intervention.asset_type_id, "aqueductSegment");
    assert_eq!(intervention.work_type_id, "rehabilitation");
    assert_eq!(intervention.estimate.allowance, 120.0);
    assert!(intervention.has_asset_with_nexo_id("A-7"));
    assert!(intervention.import_revision_date.is_some());

    // The dossier group lands in a freshly derived project.
    let project_repo = ProjectRepositoryImpl::new(&env.db_path).unwrap();
    let project = project_repo
        .find_by_nexo_dossier("D-1")
        .await
        .unwrap()
        .expect("project derived from the dossier group");
    assert_eq!(intervention.project_id.as_deref(), Some(project.id.as_str()));
    assert_eq!(
        file.project_log_entries
            .iter()
            .filter(|e| e.kind == LogEntryKind::Project)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_unknown_asset_code_fails_the_row_and_the_run() {
    let env = env_with_taxonomy().await;
    let row = VALID_ROW.replace("AQ-01", "invalidAsset");
    let log = run_import(
        &env,
        vec![upload(NexoFileType::InterventionsSe, lead_csv(&[&row]))],
    )
    .await;

    assert_eq!(log.status, ImportStatus::Failure);
    let file = log.file_of_type(NexoFileType::InterventionsSe).unwrap();
    let entry = &file.intervention_log_entries[0];
    assert_eq!(entry.import_status, ImportStatus::Failure);
    let error = entry
        .element_errors
        .iter()
        .find(|e| e.code == ErrorCode::NotFound && e.target == ErrorTarget::CodeActif)
        .expect("taxonomy miss on CodeActif");
    assert!(error.description().contains("invalidAsset"));

    assert!(interventions_of(&env.db_path, "D-1").await.is_empty());
}

#[tokio::test]
async fn test_divergent_group_fails_both_rows_without_merging() {
    let env = env_with_taxonomy().await;
    let other = VALID_ROW.replace("de chambly", "de pas chambly");
    let log = run_import(
        &env,
        vec![upload(
            NexoFileType::InterventionsSe,
            lead_csv(&[VALID_ROW, &other]),
        )],
    )
    .await;

    assert_eq!(log.status, ImportStatus::Failure);
    let file = log.file_of_type(NexoFileType::InterventionsSe).unwrap();
    assert_eq!(file.intervention_log_entries.len(), 2);
    for entry in &file.intervention_log_entries {
        assert_eq!(entry.import_status, ImportStatus::Failure);
        let error = entry
            .element_errors
            .iter()
            .find(|e| e.code == ErrorCode::Invalid && e.target == ErrorTarget::Columns)
            .expect("group homogeneity error");
        assert_eq!(error.values.get("value1").map(String::as_str), Some("Rue"));
    }
    assert!(interventions_of(&env.db_path, "D-1").await.is_empty());
}

#[tokio::test]
async fn test_budget_exceeding_estimate_fails_after_dollar_conversion() {
    let env = env_with_taxonomy().await;
    // Estimate of 10 k$; the budget file carries 20000 $ = 20 k$.
    let row = VALID_ROW.replace("2025,2026,120,300", "2025,2026,10,300");
    let log = run_import(
        &env,
        vec![
            upload(NexoFileType::InterventionsSe, lead_csv(&[&row])),
            upload(
                NexoFileType::InterventionsBudgetSe,
                budget_csv(&["D-1,2025,20000,C-123"]),
            ),
        ],
    )
    .await;

    assert_eq!(log.status, ImportStatus::Failure);
    let budget_file = log
        .file_of_type(NexoFileType::InterventionsBudgetSe)
        .unwrap();
    let entry = &budget_file.intervention_log_entries[0];
    let error = entry
        .element_errors
        .iter()
        .find(|e| e.code == ErrorCode::Invalid && e.target == ErrorTarget::PrevTravaux)
        .expect("excessive budget error");
    assert_eq!(error.values.get("value1").map(String::as_str), Some("20"));
    assert_eq!(error.values.get("value2").map(String::as_str), Some("10"));

    // The lead file itself processed cleanly.
    let lead = log.file_of_type(NexoFileType::InterventionsSe).unwrap();
    assert_eq!(lead.derived_status(), ImportStatus::Success);
}

#[tokio::test]
async fn test_budget_within_estimate_updates_the_distribution() {
    let env = env_with_taxonomy().await;
    let log = run_import(
        &env,
        vec![
            upload(NexoFileType::InterventionsSe, lead_csv(&[VALID_ROW])),
            upload(
                NexoFileType::InterventionsBudgetSe,
                budget_csv(&["D-1,2025,4000,C-123", "D-1,2026,5000,C-456"]),
            ),
        ],
    )
    .await;

    assert_eq!(log.status, ImportStatus::Success);
    let interventions = interventions_of(&env.db_path, "D-1").await;
    let distribution = &interventions[0].annual_distribution;
    let by_year: Vec<(i32, f64, Option<&str>)> = distribution
        .annual_periods
        .iter()
        .map(|p| (p.year, p.annual_allowance, p.account_id.as_deref()))
        .collect();
    assert_eq!(
        by_year,
        vec![(2025, 4.0, Some("C-123")), (2026, 5.0, Some("C-456"))]
    );
}

#[tokio::test]
async fn test_cancel_phase_reimport_deletes_intervention_and_empty_project() {
    let env = env_with_taxonomy().await;
    let first = run_import(
        &env,
        vec![upload(NexoFileType::InterventionsSe, lead_csv(&[VALID_ROW]))],
    )
    .await;
    assert_eq!(first.status, ImportStatus::Success);
    assert_eq!(interventions_of(&env.db_path, "D-1").await.len(), 1);

    // Same dossier and asset, cancelled phase, strictly newer date.
    let cancelled = VALID_ROW
        .replace(",2,DI,", ",4,DI,")
        .replace("2025-06-01", "2025-07-01");
    let second = run_import(
        &env,
        vec![upload(
            NexoFileType::InterventionsSe,
            lead_csv(&[&cancelled]),
        )],
    )
    .await;

    assert_eq!(second.status, ImportStatus::Success);
    let file = second.file_of_type(NexoFileType::InterventionsSe).unwrap();
    let entry = &file.intervention_log_entries[0];
    assert_eq!(entry.modification_type, Some(ModificationType::Deletion));

    assert!(interventions_of(&env.db_path, "D-1").await.is_empty());
    let project_repo = ProjectRepositoryImpl::new(&env.db_path).unwrap();
    assert!(project_repo
        .find_by_nexo_dossier("D-1")
        .await
        .unwrap()
        .is_none());
    assert!(file
        .project_log_entries
        .iter()
        .any(|e| e.modification_type == Some(ModificationType::Deletion)));
}

#[tokio::test]
async fn test_stale_reimport_is_rejected() {
    let env = env_with_taxonomy().await;
    run_import(
        &env,
        vec![upload(NexoFileType::InterventionsSe, lead_csv(&[VALID_ROW]))],
    )
    .await;

    // Identical date: not strictly newer, so the re-import is stale.
    let log = run_import(
        &env,
        vec![upload(NexoFileType::InterventionsSe, lead_csv(&[VALID_ROW]))],
    )
    .await;
    assert_eq!(log.status, ImportStatus::Failure);
    let entry = &log
        .file_of_type(NexoFileType::InterventionsSe)
        .unwrap()
        .intervention_log_entries[0];
    assert!(entry
        .element_errors
        .iter()
        .any(|e| e.code == ErrorCode::Conflict && e.target == ErrorTarget::DateMajProjet));
}

#[tokio::test]
async fn test_first_file_must_be_the_lead_kind() {
    let env = env_with_taxonomy().await;
    // Registration enforces the ordering; bypass it by registering a
    // well-formed batch and corrupting the stored order is not
    // possible through the API, so assert at the API boundary.
    let result = env
        .api
        .register_import(
            vec![upload(
                NexoFileType::InterventionsBudgetSe,
                budget_csv(&["D-1,2025,1000,C-1"]),
            )],
            "tester",
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_required_columns_abort_the_run() {
    let env = env_with_taxonomy().await;
    let log = run_import(
        &env,
        vec![upload(
            NexoFileType::InterventionsSe,
            b"NoDossierSE,Rue\nD-1,de chambly\n".to_vec(),
        )],
    )
    .await;

    assert_eq!(log.status, ImportStatus::Failure);
    let file = log.file_of_type(NexoFileType::InterventionsSe).unwrap();
    let error = file
        .file_errors
        .iter()
        .find(|e| e.code == ErrorCode::Missing && e.target == ErrorTarget::Columns)
        .expect("missing columns error");
    assert!(error.values.get("value1").unwrap().contains("CodeActif"));
    // No rows were processed.
    assert!(file.intervention_log_entries.is_empty());
}
