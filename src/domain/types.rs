// ==========================================
// NEXO work-planning - shared domain types
// ==========================================
// Enumerations shared by the importer, engine and repositories.
// All enums serialize as strings, which is also the storage
// format in SQLite columns.
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Import lifecycle
// ==========================================

/// State of an import run or of a single imported element.
/// PENDING -> IN_PROGRESS -> {SUCCESS, FAILURE}; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Pending,
    InProgress,
    Success,
    Failure,
}

impl ImportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Success | ImportStatus::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "PENDING",
            ImportStatus::InProgress => "IN_PROGRESS",
            ImportStatus::Success => "SUCCESS",
            ImportStatus::Failure => "FAILURE",
        }
    }

    pub fn parse(raw: &str) -> ImportStatus {
        match raw {
            "PENDING" => ImportStatus::Pending,
            "IN_PROGRESS" => ImportStatus::InProgress,
            "SUCCESS" => ImportStatus::Success,
            _ => ImportStatus::Failure,
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one import run will do to a given entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModificationType {
    Creation,
    Modification,
    Deletion,
}

impl ModificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModificationType::Creation => "CREATION",
            ModificationType::Modification => "MODIFICATION",
            ModificationType::Deletion => "DELETION",
        }
    }
}

// ==========================================
// Error taxonomy
// ==========================================

/// Error kinds attached to rows and files during an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EmptyFile,
    Missing,
    Invalid,
    Conflict,
    Duplicate,
    Inconsistency,
    NotFound,
    Unexpected,
}

impl ErrorCode {
    /// Key fragment used for message template lookup.
    pub fn i18n_key(&self) -> &'static str {
        match self {
            ErrorCode::EmptyFile => "empty_file",
            ErrorCode::Missing => "missing",
            ErrorCode::Invalid => "invalid",
            ErrorCode::Conflict => "conflict",
            ErrorCode::Duplicate => "duplicate",
            ErrorCode::Inconsistency => "inconsistency",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Unexpected => "unexpected",
        }
    }
}

/// The field or scope an error points at. Mostly NEXO spreadsheet
/// column names, plus a few structural targets (FILE, COLUMNS, PROJET).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorTarget {
    File,
    Columns,
    NoDossierSe,
    NoActif,
    CodeActif,
    CodeTravaux,
    CodePhase,
    CodeExecutant,
    UniteResponsable,
    Responsable,
    Arrondissement,
    Rue,
    De,
    A,
    AnneeDebutTravaux,
    AnneeFinTravaux,
    Budget,
    Longueur,
    Carnet,
    CodeStatutCarnet,
    DateMajProjet,
    Geom,
    PrevTravaux,
    AnneePrevTravaux,
    NoCompteBudgetaire,
    NoProjet,
    Contrat,
    CodeActifAmont,
    CodeActifAval,
    Programme,
    Projet,
}

impl ErrorTarget {
    /// Key fragment used for message template lookup.
    pub fn i18n_key(&self) -> &'static str {
        match self {
            ErrorTarget::File => "file",
            ErrorTarget::Columns => "columns",
            ErrorTarget::NoDossierSe => "no_dossier_se",
            ErrorTarget::NoActif => "no_actif",
            ErrorTarget::CodeActif => "code_actif",
            ErrorTarget::CodeTravaux => "code_travaux",
            ErrorTarget::CodePhase => "code_phase",
            ErrorTarget::CodeExecutant => "code_executant",
            ErrorTarget::UniteResponsable => "unite_responsable",
            ErrorTarget::Responsable => "responsable",
            ErrorTarget::Arrondissement => "arrondissement",
            ErrorTarget::Rue => "rue",
            ErrorTarget::De => "de",
            ErrorTarget::A => "a",
            ErrorTarget::AnneeDebutTravaux => "annee_debut_travaux",
            ErrorTarget::AnneeFinTravaux => "annee_fin_travaux",
            ErrorTarget::Budget => "budget",
            ErrorTarget::Longueur => "longueur",
            ErrorTarget::Carnet => "carnet",
            ErrorTarget::CodeStatutCarnet => "code_statut_carnet",
            ErrorTarget::DateMajProjet => "date_maj_projet",
            ErrorTarget::Geom => "geom",
            ErrorTarget::PrevTravaux => "prev_travaux",
            ErrorTarget::AnneePrevTravaux => "annee_prev_travaux",
            ErrorTarget::NoCompteBudgetaire => "no_compte_budgetaire",
            ErrorTarget::NoProjet => "no_projet",
            ErrorTarget::Contrat => "contrat",
            ErrorTarget::CodeActifAmont => "code_actif_amont",
            ErrorTarget::CodeActifAval => "code_actif_aval",
            ErrorTarget::Programme => "programme",
            ErrorTarget::Projet => "projet",
        }
    }

    /// Human-facing column label, as written in the NEXO spreadsheets.
    pub fn column_label(&self) -> &'static str {
        match self {
            ErrorTarget::File => "Fichier",
            ErrorTarget::Columns => "Colonnes",
            ErrorTarget::NoDossierSe => "NoDossierSE",
            ErrorTarget::NoActif => "NoActif",
            ErrorTarget::CodeActif => "CodeActif",
            ErrorTarget::CodeTravaux => "CodeTravaux",
            ErrorTarget::CodePhase => "CodePhase",
            ErrorTarget::CodeExecutant => "CodeExecutant",
            ErrorTarget::UniteResponsable => "UniteResponsable",
            ErrorTarget::Responsable => "Responsable",
            ErrorTarget::Arrondissement => "Arrondissement",
            ErrorTarget::Rue => "Rue",
            ErrorTarget::De => "De",
            ErrorTarget::A => "A",
            ErrorTarget::AnneeDebutTravaux => "AnneeDebutTravaux",
            ErrorTarget::AnneeFinTravaux => "AnneeFinTravaux",
            ErrorTarget::Budget => "Budget",
            ErrorTarget::Longueur => "Longueur",
            ErrorTarget::Carnet => "Carnet",
            ErrorTarget::CodeStatutCarnet => "CodeStatutCarnet",
            ErrorTarget::DateMajProjet => "DateMAJProjet",
            ErrorTarget::Geom => "Geom",
            ErrorTarget::PrevTravaux => "PrevTravaux",
            ErrorTarget::AnneePrevTravaux => "AnneePrevTravaux",
            ErrorTarget::NoCompteBudgetaire => "NoCompteBudgetaire",
            ErrorTarget::NoProjet => "NoProjet",
            ErrorTarget::Contrat => "Contrat",
            ErrorTarget::CodeActifAmont => "CodeActifAmont",
            ErrorTarget::CodeActifAval => "CodeActifAval",
            ErrorTarget::Programme => "Programme",
            ErrorTarget::Projet => "Projet",
        }
    }
}

// ==========================================
// NEXO file kinds
// ==========================================

/// The four spreadsheet kinds of one NEXO export batch.
/// `InterventionsSe` is the mandatory lead file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NexoFileType {
    InterventionsSe,
    InterventionsBudgetSe,
    RehabAqConception,
    RehabEgConception,
}

impl NexoFileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NexoFileType::InterventionsSe => "interventionsSe",
            NexoFileType::InterventionsBudgetSe => "interventionsBudgetSe",
            NexoFileType::RehabAqConception => "rehabAqConception",
            NexoFileType::RehabEgConception => "rehabEgConception",
        }
    }

    pub fn parse(raw: &str) -> Option<NexoFileType> {
        match raw {
            "interventionsSe" => Some(NexoFileType::InterventionsSe),
            "interventionsBudgetSe" => Some(NexoFileType::InterventionsBudgetSe),
            "rehabAqConception" => Some(NexoFileType::RehabAqConception),
            "rehabEgConception" => Some(NexoFileType::RehabEgConception),
            _ => None,
        }
    }
}

impl fmt::Display for NexoFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Intervention / project statuses
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterventionStatus {
    Wished,
    Waiting,
    Integrated,
    Accepted,
    Canceled,
}

impl InterventionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionStatus::Wished => "wished",
            InterventionStatus::Waiting => "waiting",
            InterventionStatus::Integrated => "integrated",
            InterventionStatus::Accepted => "accepted",
            InterventionStatus::Canceled => "canceled",
        }
    }

    pub fn parse(raw: &str) -> InterventionStatus {
        match raw {
            "waiting" => InterventionStatus::Waiting,
            "integrated" => InterventionStatus::Integrated,
            "accepted" => InterventionStatus::Accepted,
            "canceled" => InterventionStatus::Canceled,
            _ => InterventionStatus::Wished,
        }
    }
}

/// PI / PNI split: integrated projects carry program-book linkage,
/// non-integrated projects are single-intervention shells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectCategory {
    Integrated,
    NonIntegrated,
}

impl ProjectCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectCategory::Integrated => "integrated",
            ProjectCategory::NonIntegrated => "nonIntegrated",
        }
    }

    pub fn parse(raw: &str) -> ProjectCategory {
        match raw {
            "nonIntegrated" => ProjectCategory::NonIntegrated,
            _ => ProjectCategory::Integrated,
        }
    }

    pub fn label_fr(&self) -> &'static str {
        match self {
            ProjectCategory::Integrated => "Projet intégré",
            ProjectCategory::NonIntegrated => "Projet non intégré",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectStatus {
    Planned,
    Programmed,
    PreliminaryOrdered,
    FinalOrdered,
    Canceled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planned => "planned",
            ProjectStatus::Programmed => "programmed",
            ProjectStatus::PreliminaryOrdered => "preliminaryOrdered",
            ProjectStatus::FinalOrdered => "finalOrdered",
            ProjectStatus::Canceled => "canceled",
        }
    }

    pub fn parse(raw: &str) -> ProjectStatus {
        match raw {
            "programmed" => ProjectStatus::Programmed,
            "preliminaryOrdered" => ProjectStatus::PreliminaryOrdered,
            "finalOrdered" => ProjectStatus::FinalOrdered,
            "canceled" => ProjectStatus::Canceled,
            _ => ProjectStatus::Planned,
        }
    }

    /// Ordering statuses lock a project against structural changes
    /// coming from an import.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            ProjectStatus::PreliminaryOrdered | ProjectStatus::FinalOrdered
        )
    }
}

// ==========================================
// Taxonomy groups
// ==========================================

/// Taxonomy groups consulted during an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaxonomyGroup {
    AssetType,
    WorkType,
    Requestor,
    Borough,
    Executor,
    ProgramBook,
    ProgramType,
}

impl TaxonomyGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyGroup::AssetType => "assetType",
            TaxonomyGroup::WorkType => "workType",
            TaxonomyGroup::Requestor => "requestor",
            TaxonomyGroup::Borough => "borough",
            TaxonomyGroup::Executor => "executor",
            TaxonomyGroup::ProgramBook => "programBook",
            TaxonomyGroup::ProgramType => "programType",
        }
    }
}

// ==========================================
// NEXO code constants
// ==========================================

/// Sentinel log-entry key used when a row carries no dossier number at all.
pub const NO_ID_PROVIDED: &str = "NO_ID_PROVIDED";

/// `CodePhase` value marking a canceled dossier/asset in NEXO exports.
pub const NEXO_PHASE_CANCELED: &str = "4";

/// `CodeStatutCarnet` value meaning the book was published/received.
pub const NEXO_CARNET_RECEIVED: &str = "2";

/// Executor code of the internal public-works executor.
pub const EXECUTOR_INTERNAL: &str = "di";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_status_round_trip() {
        for s in [
            ImportStatus::Pending,
            ImportStatus::InProgress,
            ImportStatus::Success,
            ImportStatus::Failure,
        ] {
            assert_eq!(ImportStatus::parse(s.as_str()), s);
        }
        assert!(ImportStatus::Success.is_terminal());
        assert!(!ImportStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_file_type_parse() {
        assert_eq!(
            NexoFileType::parse("interventionsSe"),
            Some(NexoFileType::InterventionsSe)
        );
        assert_eq!(NexoFileType::parse("unknown"), None);
    }

    #[test]
    fn test_ordered_statuses_lock_projects() {
        assert!(ProjectStatus::PreliminaryOrdered.is_ordered());
        assert!(ProjectStatus::FinalOrdered.is_ordered());
        assert!(!ProjectStatus::Planned.is_ordered());
    }
}
