// ==========================================
// NEXO work-planning - typed row model
// ==========================================
// Generic row container plus one fields struct per NEXO file kind.
// Raw field values are set once at construction and never mutated;
// errors accumulate append-only; resolution slots (taxonomy ids,
// matched persisted intervention) are filled by later phases.
// ==========================================

use crate::domain::import_log::FileError;
use crate::domain::intervention::Intervention;
use crate::domain::types::{
    ErrorTarget, ImportStatus, ModificationType, NexoFileType, NO_ID_PROVIDED,
};
use crate::domain::geometry::Geometry;
use crate::importer::file_parser::{ParsedSheet, RawRecord};
use crate::importer::guard::{self, GuardFailure};
use chrono::NaiveDateTime;

// ==========================================
// Generic row container
// ==========================================

#[derive(Debug, Clone)]
pub struct NexoRow<F> {
    pub line_number: u32,
    /// Log-entry key: dossier number, or the generated internal id
    /// once one exists, or NO_ID_PROVIDED.
    pub log_id: String,
    pub fields: F,
    pub modification_type: Option<ModificationType>,
    errors: Vec<FileError>,
}

impl<F> NexoRow<F> {
    pub fn new(line_number: u32, log_id: String, fields: F) -> Self {
        NexoRow {
            line_number,
            log_id,
            fields,
            modification_type: None,
            errors: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// SUCCESS iff no error was ever attached. A failed row is frozen:
    /// validators skip it and it never reaches reconciliation.
    pub fn status(&self) -> ImportStatus {
        if self.errors.is_empty() {
            ImportStatus::Success
        } else {
            ImportStatus::Failure
        }
    }

    pub fn add_error(&mut self, error: FileError) {
        self.errors.push(error);
    }

    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = FileError>) {
        self.errors.extend(errors);
    }

    pub fn errors(&self) -> &[FileError] {
        &self.errors
    }
}

// ==========================================
// InterventionsSE (lead file)
// ==========================================

/// Taxonomy ids resolved during validation, internal codes.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTaxonomy {
    pub asset_type_id: Option<String>,
    pub asset_owner_id: Option<String>,
    pub work_type_id: Option<String>,
    pub requestor_id: Option<String>,
    pub borough_id: Option<String>,
    pub executor_id: Option<String>,
    pub program_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InterventionSeFields {
    pub no_dossier_se: String,
    pub no_actif: Option<String>,
    pub code_actif: String,
    pub code_travaux: String,
    pub code_phase: String,
    pub code_executant: String,
    pub unite_responsable: String,
    pub responsable: Option<String>,
    pub arrondissement: String,
    pub rue: String,
    pub de: String,
    pub a: String,
    pub annee_debut_travaux: i32,
    pub annee_fin_travaux: i32,
    /// k$.
    pub budget: f64,
    /// Metres.
    pub longueur: f64,
    pub carnet: Option<String>,
    pub code_statut_carnet: Option<String>,
    pub date_maj_projet: Option<NaiveDateTime>,
    pub commentaire: Option<String>,
    pub geom: Option<Geometry>,

    // Resolution slots, filled by validation/enrichment phases.
    pub resolved: ResolvedTaxonomy,
    pub matched_intervention: Option<Intervention>,
}

pub type InterventionSeRow = NexoRow<InterventionSeFields>;

pub const INTERVENTIONS_SE_HEADERS: [&str; 21] = [
    "NoDossierSE",
    "NoActif",
    "CodeActif",
    "CodeTravaux",
    "CodePhase",
    "CodeExecutant",
    "UniteResponsable",
    "Responsable",
    "Arrondissement",
    "Rue",
    "De",
    "A",
    "AnneeDebutTravaux",
    "AnneeFinTravaux",
    "Budget",
    "Longueur",
    "Carnet",
    "CodeStatutCarnet",
    "DateMAJProjet",
    "Commentaire",
    "Geom",
];

const INTERVENTIONS_SE_OPTIONAL: [&str; 6] = [
    "NoActif",
    "Responsable",
    "Carnet",
    "CodeStatutCarnet",
    "Commentaire",
    "Geom",
];

impl InterventionSeFields {
    fn from_record(record: &RawRecord) -> (Self, Vec<GuardFailure>) {
        let mut failures = Vec::new();
        let fields = InterventionSeFields {
            no_dossier_se: guard::required_text(
                record,
                "nodossierse",
                ErrorTarget::NoDossierSe,
                &mut failures,
            ),
            no_actif: guard::optional_text(record, "noactif"),
            code_actif: guard::required_text(
                record,
                "codeactif",
                ErrorTarget::CodeActif,
                &mut failures,
            ),
            code_travaux: guard::required_text(
                record,
                "codetravaux",
                ErrorTarget::CodeTravaux,
                &mut failures,
            ),
            code_phase: guard::required_text(
                record,
                "codephase",
                ErrorTarget::CodePhase,
                &mut failures,
            ),
            code_executant: guard::required_text(
                record,
                "codeexecutant",
                ErrorTarget::CodeExecutant,
                &mut failures,
            ),
            unite_responsable: guard::required_text(
                record,
                "uniteresponsable",
                ErrorTarget::UniteResponsable,
                &mut failures,
            ),
            responsable: guard::optional_text(record, "responsable"),
            arrondissement: guard::required_text(
                record,
                "arrondissement",
                ErrorTarget::Arrondissement,
                &mut failures,
            ),
            rue: guard::required_text(record, "rue", ErrorTarget::Rue, &mut failures),
            de: guard::required_text(record, "de", ErrorTarget::De, &mut failures),
            a: guard::required_text(record, "a", ErrorTarget::A, &mut failures),
            annee_debut_travaux: guard::required_year(
                record,
                "anneedebuttravaux",
                ErrorTarget::AnneeDebutTravaux,
                &mut failures,
            ),
            annee_fin_travaux: guard::required_year(
                record,
                "anneefintravaux",
                ErrorTarget::AnneeFinTravaux,
                &mut failures,
            ),
            budget: guard::required_amount(record, "budget", ErrorTarget::Budget, &mut failures),
            longueur: guard::required_amount(
                record,
                "longueur",
                ErrorTarget::Longueur,
                &mut failures,
            ),
            carnet: guard::optional_text(record, "carnet"),
            code_statut_carnet: guard::optional_text(record, "codestatutcarnet"),
            date_maj_projet: guard::required_date(
                record,
                "datemajprojet",
                ErrorTarget::DateMajProjet,
                &mut failures,
            ),
            commentaire: guard::optional_text(record, "commentaire"),
            geom: guard::optional_geometry(record, "geom", ErrorTarget::Geom, &mut failures),
            resolved: ResolvedTaxonomy::default(),
            matched_intervention: None,
        };
        // Years present but inverted is a business error on the end year.
        if fields.annee_debut_travaux > 0
            && fields.annee_fin_travaux > 0
            && fields.annee_fin_travaux < fields.annee_debut_travaux
        {
            failures.push(GuardFailure::invalid(
                ErrorTarget::AnneeFinTravaux,
                &fields.annee_fin_travaux.to_string(),
            ));
        }
        (fields, failures)
    }
}

// ==========================================
// InterventionsBudgetSE
// ==========================================

#[derive(Debug, Clone, Default)]
pub struct BudgetSeFields {
    pub no_dossier_se: String,
    pub annee_prev_travaux: i32,
    /// Dollars; interventions store budgets in k$, compare after /1000.
    pub prev_travaux: f64,
    pub no_compte_budgetaire: Option<String>,
}

pub type BudgetSeRow = NexoRow<BudgetSeFields>;

pub const BUDGET_SE_HEADERS: [&str; 4] = [
    "NoDossierSE",
    "AnneePrevTravaux",
    "PrevTravaux",
    "NoCompteBudgetaire",
];

const BUDGET_SE_OPTIONAL: [&str; 1] = ["NoCompteBudgetaire"];

impl BudgetSeFields {
    fn from_record(record: &RawRecord) -> (Self, Vec<GuardFailure>) {
        let mut failures = Vec::new();
        let fields = BudgetSeFields {
            no_dossier_se: guard::required_text(
                record,
                "nodossierse",
                ErrorTarget::NoDossierSe,
                &mut failures,
            ),
            annee_prev_travaux: guard::required_year(
                record,
                "anneeprevtravaux",
                ErrorTarget::AnneePrevTravaux,
                &mut failures,
            ),
            prev_travaux: guard::required_amount(
                record,
                "prevtravaux",
                ErrorTarget::PrevTravaux,
                &mut failures,
            ),
            no_compte_budgetaire: guard::optional_text(record, "nocomptebudgetaire"),
        };
        (fields, failures)
    }
}

// ==========================================
// Rehabilitation conception files (aq / eg)
// ==========================================

#[derive(Debug, Clone, Default)]
pub struct RehabAqConceptionFields {
    pub no_dossier_se: String,
    pub no_projet: Option<String>,
    pub date_maj: Option<NaiveDateTime>,
    pub code_actif_amont: Option<String>,
    pub code_actif_aval: Option<String>,
    pub contrat: Option<String>,
    pub commentaire: Option<String>,
}

pub type RehabAqConceptionRow = NexoRow<RehabAqConceptionFields>;

pub const REHAB_AQ_HEADERS: [&str; 7] = [
    "NoDossierSE",
    "NoProjet",
    "DateMAJProjet",
    "CodeActifAmont",
    "CodeActifAval",
    "Contrat",
    "Commentaire",
];

const REHAB_AQ_OPTIONAL: [&str; 5] = [
    "NoProjet",
    "CodeActifAmont",
    "CodeActifAval",
    "Contrat",
    "Commentaire",
];

impl RehabAqConceptionFields {
    fn from_record(record: &RawRecord) -> (Self, Vec<GuardFailure>) {
        let mut failures = Vec::new();
        let fields = RehabAqConceptionFields {
            no_dossier_se: guard::required_text(
                record,
                "nodossierse",
                ErrorTarget::NoDossierSe,
                &mut failures,
            ),
            no_projet: guard::optional_text(record, "noprojet"),
            date_maj: guard::required_date(
                record,
                "datemajprojet",
                ErrorTarget::DateMajProjet,
                &mut failures,
            ),
            code_actif_amont: guard::optional_text(record, "codeactifamont"),
            code_actif_aval: guard::optional_text(record, "codeactifaval"),
            contrat: guard::optional_text(record, "contrat"),
            commentaire: guard::optional_text(record, "commentaire"),
        };
        (fields, failures)
    }
}

/// The sewer variant additionally references an existing asset and
/// groups rows by project number for the consistency check.
#[derive(Debug, Clone, Default)]
pub struct RehabEgConceptionFields {
    pub no_dossier_se: String,
    pub no_projet: String,
    pub no_actif: String,
    pub date_maj: Option<NaiveDateTime>,
    pub code_actif_amont: Option<String>,
    pub code_actif_aval: Option<String>,
    pub contrat: Option<String>,
    pub commentaire: Option<String>,
}

pub type RehabEgConceptionRow = NexoRow<RehabEgConceptionFields>;

pub const REHAB_EG_HEADERS: [&str; 8] = [
    "NoDossierSE",
    "NoProjet",
    "NoActif",
    "DateMAJProjet",
    "CodeActifAmont",
    "CodeActifAval",
    "Contrat",
    "Commentaire",
];

const REHAB_EG_OPTIONAL: [&str; 4] = [
    "CodeActifAmont",
    "CodeActifAval",
    "Contrat",
    "Commentaire",
];

impl RehabEgConceptionFields {
    fn from_record(record: &RawRecord) -> (Self, Vec<GuardFailure>) {
        let mut failures = Vec::new();
        let fields = RehabEgConceptionFields {
            no_dossier_se: guard::required_text(
                record,
                "nodossierse",
                ErrorTarget::NoDossierSe,
                &mut failures,
            ),
            no_projet: guard::required_text(
                record,
                "noprojet",
                ErrorTarget::NoProjet,
                &mut failures,
            ),
            no_actif: guard::required_text(record, "noactif", ErrorTarget::NoActif, &mut failures),
            date_maj: guard::required_date(
                record,
                "datemajprojet",
                ErrorTarget::DateMajProjet,
                &mut failures,
            ),
            code_actif_amont: guard::optional_text(record, "codeactifamont"),
            code_actif_aval: guard::optional_text(record, "codeactifaval"),
            contrat: guard::optional_text(record, "contrat"),
            commentaire: guard::optional_text(record, "commentaire"),
        };
        (fields, failures)
    }
}

// ==========================================
// Header templates per file kind
// ==========================================

pub fn headers(file_type: NexoFileType) -> &'static [&'static str] {
    match file_type {
        NexoFileType::InterventionsSe => &INTERVENTIONS_SE_HEADERS,
        NexoFileType::InterventionsBudgetSe => &BUDGET_SE_HEADERS,
        NexoFileType::RehabAqConception => &REHAB_AQ_HEADERS,
        NexoFileType::RehabEgConception => &REHAB_EG_HEADERS,
    }
}

fn optional_headers(file_type: NexoFileType) -> &'static [&'static str] {
    match file_type {
        NexoFileType::InterventionsSe => &INTERVENTIONS_SE_OPTIONAL,
        NexoFileType::InterventionsBudgetSe => &BUDGET_SE_OPTIONAL,
        NexoFileType::RehabAqConception => &REHAB_AQ_OPTIONAL,
        NexoFileType::RehabEgConception => &REHAB_EG_OPTIONAL,
    }
}

/// Columns that must be present: the full header template minus the
/// headers the exporter is allowed to omit.
pub fn minimal_headers(file_type: NexoFileType) -> Vec<&'static str> {
    let optional = optional_headers(file_type);
    headers(file_type)
        .iter()
        .filter(|h| !optional.contains(h))
        .copied()
        .collect()
}

// ==========================================
// Row builders
// ==========================================

fn dossier_log_id(dossier: &str) -> String {
    if dossier.is_empty() {
        NO_ID_PROVIDED.to_string()
    } else {
        dossier.to_string()
    }
}

fn build_row<F>(
    record: &RawRecord,
    fields: F,
    failures: Vec<GuardFailure>,
    log_id: String,
) -> NexoRow<F> {
    let line = record.line_number;
    let mut row = NexoRow::new(line, log_id, fields);
    row.add_errors(failures.into_iter().map(|f| f.into_file_error(line)));
    row
}

pub fn intervention_se_rows(sheet: &ParsedSheet) -> Vec<InterventionSeRow> {
    sheet
        .records
        .iter()
        .map(|record| {
            let (fields, failures) = InterventionSeFields::from_record(record);
            let log_id = dossier_log_id(&fields.no_dossier_se);
            build_row(record, fields, failures, log_id)
        })
        .collect()
}

pub fn budget_se_rows(sheet: &ParsedSheet) -> Vec<BudgetSeRow> {
    sheet
        .records
        .iter()
        .map(|record| {
            let (fields, failures) = BudgetSeFields::from_record(record);
            let log_id = dossier_log_id(&fields.no_dossier_se);
            build_row(record, fields, failures, log_id)
        })
        .collect()
}

pub fn rehab_aq_rows(sheet: &ParsedSheet) -> Vec<RehabAqConceptionRow> {
    sheet
        .records
        .iter()
        .map(|record| {
            let (fields, failures) = RehabAqConceptionFields::from_record(record);
            let log_id = dossier_log_id(&fields.no_dossier_se);
            build_row(record, fields, failures, log_id)
        })
        .collect()
}

pub fn rehab_eg_rows(sheet: &ParsedSheet) -> Vec<RehabEgConceptionRow> {
    sheet
        .records
        .iter()
        .map(|record| {
            let (fields, failures) = RehabEgConceptionFields::from_record(record);
            let log_id = dossier_log_id(&fields.no_dossier_se);
            build_row(record, fields, failures, log_id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ErrorCode;
    use crate::importer::file_parser::parse_sheet;

    pub(crate) const VALID_SE_CSV: &str = "\
NoDossierSE,NoActif,CodeActif,CodeTravaux,CodePhase,CodeExecutant,UniteResponsable,Arrondissement,Rue,De,A,AnneeDebutTravaux,AnneeFinTravaux,Budget,Longueur,Carnet,CodeStatutCarnet,DateMAJProjet
D-1,A-7,AQ-01,REH,2,DI,DEEU,VM,de chambly,st-jean,papineau,2025,2026,120,300,C-2025,2,2025-06-01
";

    #[test]
    fn test_valid_row_has_no_errors() {
        let sheet = parse_sheet(VALID_SE_CSV.as_bytes()).unwrap();
        let rows = intervention_se_rows(&sheet);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!(row.is_valid());
        assert_eq!(row.status(), ImportStatus::Success);
        assert_eq!(row.log_id, "D-1");
        assert_eq!(row.fields.annee_debut_travaux, 2025);
        assert_eq!(row.fields.budget, 120.0);
        assert!(row.fields.date_maj_projet.is_some());
    }

    #[test]
    fn test_guard_is_deterministic() {
        let csv = "NoDossierSE,Rue\n,\n";
        let sheet = parse_sheet(csv.as_bytes()).unwrap();
        let first = intervention_se_rows(&sheet);
        let second = intervention_se_rows(&sheet);
        let codes = |rows: &[InterventionSeRow]| {
            rows[0]
                .errors()
                .iter()
                .map(|e| (e.code, e.target))
                .collect::<Vec<_>>()
        };
        assert_eq!(codes(&first), codes(&second));
        assert_eq!(first[0].status(), ImportStatus::Failure);
    }

    #[test]
    fn test_missing_dossier_uses_sentinel_log_id() {
        let csv = "Rue\nde chambly\n";
        let sheet = parse_sheet(csv.as_bytes()).unwrap();
        let rows = intervention_se_rows(&sheet);
        assert_eq!(rows[0].log_id, NO_ID_PROVIDED);
        assert!(rows[0]
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::Missing && e.target == ErrorTarget::NoDossierSe));
    }

    #[test]
    fn test_inverted_years_flagged() {
        let csv = VALID_SE_CSV.replace("2025,2026", "2026,2025");
        let sheet = parse_sheet(csv.as_bytes()).unwrap();
        let rows = intervention_se_rows(&sheet);
        assert!(rows[0]
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::Invalid && e.target == ErrorTarget::AnneeFinTravaux));
    }

    #[test]
    fn test_minimal_headers_exclude_optional() {
        let minimal = minimal_headers(NexoFileType::InterventionsSe);
        assert!(minimal.contains(&"NoDossierSE"));
        assert!(minimal.contains(&"Rue"));
        assert!(!minimal.contains(&"Geom"));
        assert!(!minimal.contains(&"Commentaire"));
    }

    #[test]
    fn test_budget_rows_parse_dollars() {
        let csv = "NoDossierSE,AnneePrevTravaux,PrevTravaux\nD-1,2025,20000\n";
        let sheet = parse_sheet(csv.as_bytes()).unwrap();
        let rows = budget_se_rows(&sheet);
        assert!(rows[0].is_valid());
        assert_eq!(rows[0].fields.prev_travaux, 20000.0);
    }
}
