// ==========================================
// NEXO work-planning - rehab conception validators
// ==========================================
// Shared checks for both rehabilitation conception files (aqueduct
// and sewer), plus the sewer-specific asset-existence and
// project-agreement rules.
// ==========================================

use crate::domain::import_log::FileError;
use crate::domain::intervention::Intervention;
use crate::domain::types::{ErrorCode, ErrorTarget, TaxonomyGroup};
use crate::importer::rows::{NexoRow, RehabAqConceptionFields, RehabEgConceptionFields, RehabEgConceptionRow};
use crate::importer::taxonomy_resolver::TaxonomyResolver;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

/// Field access shared by the two conception file kinds.
pub trait RehabConceptionFields {
    fn dossier(&self) -> &str;
    fn date_maj(&self) -> Option<NaiveDateTime>;
    fn code_actif_amont(&self) -> Option<&str>;
    fn code_actif_aval(&self) -> Option<&str>;
}

impl RehabConceptionFields for RehabAqConceptionFields {
    fn dossier(&self) -> &str {
        &self.no_dossier_se
    }
    fn date_maj(&self) -> Option<NaiveDateTime> {
        self.date_maj
    }
    fn code_actif_amont(&self) -> Option<&str> {
        self.code_actif_amont.as_deref()
    }
    fn code_actif_aval(&self) -> Option<&str> {
        self.code_actif_aval.as_deref()
    }
}

impl RehabConceptionFields for RehabEgConceptionFields {
    fn dossier(&self) -> &str {
        &self.no_dossier_se
    }
    fn date_maj(&self) -> Option<NaiveDateTime> {
        self.date_maj
    }
    fn code_actif_amont(&self) -> Option<&str> {
        self.code_actif_amont.as_deref()
    }
    fn code_actif_aval(&self) -> Option<&str> {
        self.code_actif_aval.as_deref()
    }
}

/// Common conception checks: single intervention match, update date
/// not older than the last import revision, program whitelist, and
/// upstream/downstream asset-type resolution. Returns the dossier ->
/// matched intervention map.
pub async fn validate_rehab_rows<F: RehabConceptionFields>(
    rows: &mut [NexoRow<F>],
    interventions_by_dossier: &HashMap<String, Vec<Intervention>>,
    resolver: &TaxonomyResolver,
    program_whitelist: &[String],
) -> RepositoryResult<HashMap<String, Intervention>> {
    let mut matched: HashMap<String, Intervention> = HashMap::new();

    for row in rows.iter_mut().filter(|r| r.is_valid()) {
        let line = row.line_number;
        let dossier = row.fields.dossier().to_string();
        let mut errors: Vec<FileError> = Vec::new();

        let candidates = interventions_by_dossier
            .get(&dossier)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let intervention = match candidates {
            [] => {
                row.add_error(
                    FileError::new(ErrorCode::NotFound, ErrorTarget::NoDossierSe, line)
                        .with_value("value1", dossier),
                );
                continue;
            }
            [one] => one,
            _ => {
                row.add_error(
                    FileError::new(ErrorCode::Invalid, ErrorTarget::NoDossierSe, line)
                        .with_value("value1", dossier),
                );
                continue;
            }
        };

        if let (Some(row_date), Some(revision)) =
            (row.fields.date_maj(), intervention.import_revision_date)
        {
            if row_date < revision {
                errors.push(
                    FileError::new(ErrorCode::Conflict, ErrorTarget::DateMajProjet, line)
                        .with_value("value1", row_date.to_string())
                        .with_value("value2", revision.to_string()),
                );
            }
        }

        let program_allowed = intervention
            .program_id
            .as_deref()
            .map(|p| program_whitelist.iter().any(|w| w == p))
            .unwrap_or(false);
        if !program_allowed {
            errors.push(
                FileError::new(ErrorCode::Invalid, ErrorTarget::Programme, line).with_value(
                    "value1",
                    intervention.program_id.clone().unwrap_or_else(|| "-".to_string()),
                ),
            );
        }

        for (code, target) in [
            (row.fields.code_actif_amont(), ErrorTarget::CodeActifAmont),
            (row.fields.code_actif_aval(), ErrorTarget::CodeActifAval),
        ] {
            if let Some(code) = code {
                if resolver
                    .find_by_nexo_code(code, TaxonomyGroup::AssetType)
                    .await?
                    .is_none()
                {
                    errors.push(
                        FileError::new(ErrorCode::NotFound, target, line)
                            .with_value("value1", code.to_string()),
                    );
                }
            }
        }

        matched
            .entry(row.fields.dossier().to_string())
            .or_insert_with(|| intervention.clone());
        row.add_errors(errors);
    }
    Ok(matched)
}

/// Sewer-specific rules: the referenced asset must already exist on
/// the matched intervention, and rows sharing a project number must
/// agree on contract range and update date.
pub fn validate_eg_rows(
    rows: &mut [RehabEgConceptionRow],
    matched: &HashMap<String, Intervention>,
) {
    for row in rows.iter_mut().filter(|r| r.is_valid()) {
        let line = row.line_number;
        if let Some(intervention) = matched.get(&row.fields.no_dossier_se) {
            if !intervention.has_asset_with_nexo_id(&row.fields.no_actif) {
                let no_actif = row.fields.no_actif.clone();
                row.add_error(
                    FileError::new(ErrorCode::NotFound, ErrorTarget::NoActif, line)
                        .with_value("value1", no_actif),
                );
            }
        }
    }

    // Agreement per project number, over still-valid rows.
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if row.is_valid() {
            groups
                .entry(row.fields.no_projet.clone())
                .or_default()
                .push(idx);
        }
    }
    for (no_projet, indexes) in groups {
        if indexes.len() < 2 {
            continue;
        }
        let reference = &rows[indexes[0]].fields;
        let (ref_contrat, ref_date) = (reference.contrat.clone(), reference.date_maj);
        let mut divergent: Vec<&str> = Vec::new();
        for &idx in &indexes[1..] {
            let fields = &rows[idx].fields;
            if fields.contrat != ref_contrat && !divergent.contains(&"Contrat") {
                divergent.push("Contrat");
            }
            if fields.date_maj != ref_date && !divergent.contains(&"DateMAJProjet") {
                divergent.push("DateMAJProjet");
            }
        }
        if divergent.is_empty() {
            continue;
        }
        let names = divergent.join(", ");
        for &idx in &indexes {
            let line = rows[idx].line_number;
            rows[idx].add_error(
                FileError::new(ErrorCode::Inconsistency, ErrorTarget::Projet, line)
                    .with_value("value1", no_projet.clone())
                    .with_value("value2", names.clone()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, open_sqlite_connection};
    use crate::domain::intervention::{Asset, ExternalReferenceId};
    use crate::domain::taxonomy::TaxonomyEntry;
    use crate::engine::test_support::intervention_fixture;
    use crate::importer::file_parser::parse_sheet;
    use crate::importer::rows::{rehab_aq_rows, rehab_eg_rows};
    use crate::repository::taxonomy_repo::{TaxonomyRepositoryImpl, TaxonomyRepository};
    use serde_json::json;
    use std::sync::Arc;

    async fn resolver_with_asset_types() -> (tempfile::NamedTempFile, TaxonomyResolver) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        {
            let conn = open_sqlite_connection(&path).unwrap();
            db::init_schema(&conn).unwrap();
        }
        let repo = TaxonomyRepositoryImpl::new(&path).unwrap();
        let mut entry = TaxonomyEntry::new("sewerSegment", "Segment d'égout");
        entry.properties = json!({"nexoMatches": [{"code": "EG-01", "description": ""}]});
        repo.save_entry(TaxonomyGroup::AssetType, &entry)
            .await
            .unwrap();
        (file, TaxonomyResolver::new(Arc::new(repo)))
    }

    fn rehab_intervention(dossier: &str, program: Option<&str>) -> Intervention {
        let mut intervention = intervention_fixture(dossier);
        intervention.program_id = program.map(str::to_string);
        intervention.import_revision_date = crate::importer::guard::parse_date("2025-01-01");
        intervention
    }

    fn whitelist() -> Vec<String> {
        vec!["pcpr".to_string(), "prcpr".to_string()]
    }

    #[tokio::test]
    async fn test_program_outside_whitelist_rejected() {
        let (_file, resolver) = resolver_with_asset_types().await;
        let csv = "NoDossierSE,DateMAJProjet\nD-1,2025-06-01\n";
        let mut rows = rehab_aq_rows(&parse_sheet(csv.as_bytes()).unwrap());
        let existing =
            HashMap::from([("D-1".to_string(), vec![rehab_intervention("D-1", Some("psr"))])]);
        validate_rehab_rows(&mut rows, &existing, &resolver, &whitelist())
            .await
            .unwrap();
        assert!(rows[0]
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::Invalid && e.target == ErrorTarget::Programme));
    }

    #[tokio::test]
    async fn test_older_update_date_conflicts() {
        let (_file, resolver) = resolver_with_asset_types().await;
        let csv = "NoDossierSE,DateMAJProjet\nD-1,2024-06-01\n";
        let mut rows = rehab_aq_rows(&parse_sheet(csv.as_bytes()).unwrap());
        let existing =
            HashMap::from([("D-1".to_string(), vec![rehab_intervention("D-1", Some("pcpr"))])]);
        validate_rehab_rows(&mut rows, &existing, &resolver, &whitelist())
            .await
            .unwrap();
        assert!(rows[0]
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::Conflict));
    }

    #[tokio::test]
    async fn test_unknown_upstream_asset_type() {
        let (_file, resolver) = resolver_with_asset_types().await;
        let csv = "NoDossierSE,DateMAJProjet,CodeActifAmont\nD-1,2025-06-01,ZZ-99\n";
        let mut rows = rehab_aq_rows(&parse_sheet(csv.as_bytes()).unwrap());
        let existing =
            HashMap::from([("D-1".to_string(), vec![rehab_intervention("D-1", Some("pcpr"))])]);
        validate_rehab_rows(&mut rows, &existing, &resolver, &whitelist())
            .await
            .unwrap();
        assert!(rows[0]
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::NotFound && e.target == ErrorTarget::CodeActifAmont));
    }

    #[tokio::test]
    async fn test_eg_missing_asset_and_project_agreement() {
        let (_file, resolver) = resolver_with_asset_types().await;
        let csv = "\
NoDossierSE,NoProjet,NoActif,DateMAJProjet,Contrat\n\
D-1,P-1,A-7,2025-06-01,C1\n\
D-1,P-1,A-8,2025-06-01,C2\n";
        let mut rows = rehab_eg_rows(&parse_sheet(csv.as_bytes()).unwrap());

        let mut intervention = rehab_intervention("D-1", Some("pcpr"));
        intervention.assets = vec![Asset {
            id: "asset-1".to_string(),
            type_id: "sewerSegment".to_string(),
            owner_id: None,
            geometry: None,
            length_m: None,
            external_reference_ids: vec![ExternalReferenceId::asset("A-7")],
        }];
        let existing = HashMap::from([("D-1".to_string(), vec![intervention])]);

        let matched = validate_rehab_rows(&mut rows, &existing, &resolver, &whitelist())
            .await
            .unwrap();
        validate_eg_rows(&mut rows, &matched);

        // Second row references an asset absent from the intervention.
        assert!(rows[1]
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::NotFound && e.target == ErrorTarget::NoActif));
        // Row 2 is frozen by the asset failure, leaving one valid row
        // in project P-1, so the agreement check has nothing to compare.
        assert!(rows[0].is_valid());
    }
}
