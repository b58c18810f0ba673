// ==========================================
// Shared integration-test fixtures
// ==========================================
// Temp database with schema and a seeded taxonomy matching the NEXO
// codes used by the CSV fixtures (AQ-01, REH, DEEU, VM, DI, C-2025).
// ==========================================

use nexo_planning::config::ImportConfig;
use nexo_planning::db;
use nexo_planning::domain::import_log::ImportLog;
use nexo_planning::domain::taxonomy::TaxonomyEntry;
use nexo_planning::domain::types::TaxonomyGroup;
use nexo_planning::engine::ImportOrchestrator;
use nexo_planning::repository::{TaxonomyRepository, TaxonomyRepositoryImpl};
use nexo_planning::{FileUpload, ImportApi, NexoFileType};
use serde_json::json;
use tempfile::NamedTempFile;

pub struct TestEnv {
    pub _file: NamedTempFile,
    pub db_path: String,
    pub api: ImportApi,
}

pub async fn env_with_taxonomy() -> TestEnv {
    nexo_planning::logging::init_test();
    let file = NamedTempFile::new().unwrap();
    let db_path = file.path().to_str().unwrap().to_string();
    {
        let conn = db::open_sqlite_connection(&db_path).unwrap();
        db::init_schema(&conn).unwrap();
    }
    seed_taxonomy(&db_path).await;
    let api = ImportApi::new(&db_path).unwrap();
    TestEnv {
        _file: file,
        db_path,
        api,
    }
}

async fn seed_taxonomy(db_path: &str) {
    let repo = TaxonomyRepositoryImpl::new(db_path).unwrap();
    let entries = [
        (
            TaxonomyGroup::AssetType,
            "aqueductSegment",
            "Segment d'aqueduc",
            json!({
                "nexoMatches": [{"code": "AQ-01", "description": "Conduite d'aqueduc"}],
                "workTypes": ["rehabilitation"],
                "ownerId": "dre"
            }),
        ),
        (
            TaxonomyGroup::WorkType,
            "rehabilitation",
            "Réhabilitation",
            json!({"nexoMatches": [{"code": "REH"}]}),
        ),
        (
            TaxonomyGroup::Requestor,
            "deeu",
            "Direction de l'eau",
            json!({"nexoMatches": [{"code": "DEEU"}]}),
        ),
        (
            TaxonomyGroup::Borough,
            "vm",
            "Ville-Marie",
            json!({"nexoMatches": [{"code": "VM"}]}),
        ),
        (
            TaxonomyGroup::Executor,
            "di",
            "Direction interne",
            json!({"nexoMatches": [{"code": "DI"}]}),
        ),
        (
            TaxonomyGroup::ProgramBook,
            "c2025",
            "Carnet 2025",
            json!({
                "nexoMatches": [{"code": "C-2025"}],
                "programs": [{"year": 2025, "programId": "pcpr"}]
            }),
        ),
    ];
    for (group, code, label, properties) in entries {
        let mut entry = TaxonomyEntry::new(code, label);
        entry.properties = properties;
        repo.save_entry(group, &entry).await.unwrap();
    }
}

pub const LEAD_HEADER: &str = "NoDossierSE,NoActif,CodeActif,CodeTravaux,CodePhase,CodeExecutant,UniteResponsable,Arrondissement,Rue,De,A,AnneeDebutTravaux,AnneeFinTravaux,Budget,Longueur,DateMAJProjet";

pub fn lead_csv(data_rows: &[&str]) -> Vec<u8> {
    format!("{}\n{}\n", LEAD_HEADER, data_rows.join("\n")).into_bytes()
}

pub fn budget_csv(data_rows: &[&str]) -> Vec<u8> {
    format!(
        "NoDossierSE,AnneePrevTravaux,PrevTravaux,NoCompteBudgetaire\n{}\n",
        data_rows.join("\n")
    )
    .into_bytes()
}

pub fn upload(file_type: NexoFileType, data: Vec<u8>) -> FileUpload {
    let name = format!("{}.csv", file_type);
    FileUpload {
        name,
        content_type: "text/csv".to_string(),
        file_type,
        data,
    }
}

/// Registers the batch and runs the orchestrator to completion on the
/// current task, then returns the reloaded log. The detached-spawn
/// path is exercised by the API unit tests.
pub async fn run_import(env: &TestEnv, uploads: Vec<FileUpload>) -> ImportLog {
    let log = env.api.register_import(uploads, "tester").await.unwrap();
    let orchestrator =
        ImportOrchestrator::from_db_path(&env.db_path, ImportConfig::default()).unwrap();
    orchestrator.run(&log.id).await;
    env.api.get_import_log(&log.id).await.unwrap()
}
