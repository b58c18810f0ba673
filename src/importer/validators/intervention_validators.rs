// ==========================================
// NEXO work-planning - InterventionsSE row validators
// ==========================================
// Cross-row business rules for the lead file. Validators only look
// at still-valid rows; a failed row is frozen and excluded from all
// later group-level checks.
// ==========================================

use crate::domain::import_log::FileError;
use crate::domain::intervention::Intervention;
use crate::domain::types::{ErrorCode, ErrorTarget, TaxonomyGroup, NEXO_PHASE_CANCELED};
use crate::importer::rows::{InterventionSeFields, InterventionSeRow};
use crate::importer::taxonomy_resolver::TaxonomyResolver;
use crate::repository::error::RepositoryResult;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Composite reconciliation key: dossier + resolved asset type +
/// resolved work type (raw codes before resolution).
pub fn group_key(fields: &InterventionSeFields) -> (String, String, String) {
    (
        fields.no_dossier_se.clone(),
        fields
            .resolved
            .asset_type_id
            .clone()
            .unwrap_or_else(|| fields.code_actif.to_lowercase()),
        fields
            .resolved
            .work_type_id
            .clone()
            .unwrap_or_else(|| fields.code_travaux.to_lowercase()),
    )
}

// ==========================================
// Taxonomy resolution
// ==========================================

/// Resolves every NEXO code field against its taxonomy group and
/// fills the row's resolution slots. Each miss is a NOT_FOUND error
/// tagged to the specific column.
pub async fn validate_taxonomy(
    rows: &mut [InterventionSeRow],
    resolver: &TaxonomyResolver,
) -> RepositoryResult<()> {
    for row in rows.iter_mut().filter(|r| r.is_valid()) {
        let line = row.line_number;
        let mut errors: Vec<FileError> = Vec::new();

        let asset_entry = resolver
            .find_by_nexo_code(&row.fields.code_actif, TaxonomyGroup::AssetType)
            .await?;
        match &asset_entry {
            Some(entry) => {
                row.fields.resolved.asset_type_id = Some(entry.code.clone());
                row.fields.resolved.asset_owner_id = entry.owner_id();
            }
            None => errors.push(
                FileError::new(ErrorCode::NotFound, ErrorTarget::CodeActif, line)
                    .with_value("value1", row.fields.code_actif.clone()),
            ),
        }

        let work_entry = resolver
            .find_by_nexo_code(&row.fields.code_travaux, TaxonomyGroup::WorkType)
            .await?;
        match &work_entry {
            Some(entry) => row.fields.resolved.work_type_id = Some(entry.code.clone()),
            None => errors.push(
                FileError::new(ErrorCode::NotFound, ErrorTarget::CodeTravaux, line)
                    .with_value("value1", row.fields.code_travaux.clone()),
            ),
        }

        match resolver
            .find_by_nexo_code(&row.fields.unite_responsable, TaxonomyGroup::Requestor)
            .await?
        {
            Some(entry) => row.fields.resolved.requestor_id = Some(entry.code),
            None => errors.push(
                FileError::new(ErrorCode::NotFound, ErrorTarget::UniteResponsable, line)
                    .with_value("value1", row.fields.unite_responsable.clone()),
            ),
        }

        match resolver
            .find_by_nexo_code(&row.fields.arrondissement, TaxonomyGroup::Borough)
            .await?
        {
            Some(entry) => row.fields.resolved.borough_id = Some(entry.code),
            None => errors.push(
                FileError::new(ErrorCode::NotFound, ErrorTarget::Arrondissement, line)
                    .with_value("value1", row.fields.arrondissement.clone()),
            ),
        }

        match resolver
            .find_by_nexo_code(&row.fields.code_executant, TaxonomyGroup::Executor)
            .await?
        {
            Some(entry) => row.fields.resolved.executor_id = Some(entry.code),
            None => errors.push(
                FileError::new(ErrorCode::NotFound, ErrorTarget::CodeExecutant, line)
                    .with_value("value1", row.fields.code_executant.clone()),
            ),
        }

        // Work-type / asset-type compatibility, only when both resolved.
        if let (Some(asset), Some(work)) = (&asset_entry, &work_entry) {
            if !asset.allowed_work_types().contains(&work.code) {
                errors.push(
                    FileError::new(ErrorCode::Invalid, ErrorTarget::CodeTravaux, line)
                        .with_value("value1", work.label.fr.clone())
                        .with_value("value2", asset.label.fr.clone()),
                );
            }
        }

        // Carnet -> program, year-indexed.
        if let Some(carnet) = row.fields.carnet.clone() {
            let program = match resolver
                .find_by_nexo_code(&carnet, TaxonomyGroup::ProgramBook)
                .await?
            {
                Some(book) => book.program_for_year(row.fields.annee_debut_travaux),
                None => None,
            };
            match program {
                Some(program_id) => row.fields.resolved.program_id = Some(program_id),
                None => errors.push(
                    FileError::new(ErrorCode::NotFound, ErrorTarget::Carnet, line)
                        .with_value("value1", carnet)
                        .with_value("value2", row.fields.annee_debut_travaux.to_string()),
                ),
            }
        }

        row.add_errors(errors);
    }
    Ok(())
}

// ==========================================
// Group homogeneity
// ==========================================

fn compared_fields(fields: &InterventionSeFields) -> Vec<(ErrorTarget, String)> {
    vec![
        (
            ErrorTarget::UniteResponsable,
            fields.unite_responsable.clone(),
        ),
        (
            ErrorTarget::Responsable,
            fields.responsable.clone().unwrap_or_default(),
        ),
        (ErrorTarget::Arrondissement, fields.arrondissement.clone()),
        (ErrorTarget::Rue, fields.rue.clone()),
        (ErrorTarget::De, fields.de.clone()),
        (ErrorTarget::A, fields.a.clone()),
        (ErrorTarget::CodeExecutant, fields.code_executant.clone()),
        (
            ErrorTarget::AnneeDebutTravaux,
            fields.annee_debut_travaux.to_string(),
        ),
        (
            ErrorTarget::AnneeFinTravaux,
            fields.annee_fin_travaux.to_string(),
        ),
        (ErrorTarget::Budget, fields.budget.to_string()),
        (
            ErrorTarget::Carnet,
            fields.carnet.clone().unwrap_or_default(),
        ),
        (
            ErrorTarget::CodeStatutCarnet,
            fields.code_statut_carnet.clone().unwrap_or_default(),
        ),
        (
            ErrorTarget::DateMajProjet,
            fields
                .date_maj_projet
                .map(|d| d.to_string())
                .unwrap_or_default(),
        ),
    ]
}

/// Rows sharing the same dossier/asset/work key must agree on a
/// fixed field list (cancelled rows excluded from the comparison).
/// Every divergent column is named once, comma-joined, on every row
/// of the offending group.
pub fn validate_group_homogeneity(rows: &mut [InterventionSeRow]) {
    let mut groups: BTreeMap<(String, String, String), Vec<usize>> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if row.is_valid() && row.fields.code_phase != NEXO_PHASE_CANCELED {
            groups
                .entry(group_key(&row.fields))
                .or_default()
                .push(idx);
        }
    }

    for indexes in groups.values() {
        if indexes.len() < 2 {
            continue;
        }
        let mut divergent: BTreeSet<&'static str> = BTreeSet::new();
        let reference = compared_fields(&rows[indexes[0]].fields);
        for &idx in &indexes[1..] {
            for (ref_field, row_field) in
                reference.iter().zip(compared_fields(&rows[idx].fields))
            {
                if ref_field.1 != row_field.1 {
                    divergent.insert(ref_field.0.column_label());
                }
            }
        }
        if divergent.is_empty() {
            continue;
        }
        let names = divergent.into_iter().collect::<Vec<_>>().join(", ");
        for &idx in indexes {
            let line = rows[idx].line_number;
            rows[idx].add_error(
                FileError::new(ErrorCode::Invalid, ErrorTarget::Columns, line)
                    .with_value("value1", names.clone()),
            );
        }
    }
}

// ==========================================
// Stale re-import rejection
// ==========================================

/// A row whose update date is not strictly newer than the persisted
/// intervention's last import revision is a stale re-import.
pub fn validate_not_stale(
    rows: &mut [InterventionSeRow],
    existing_by_dossier: &HashMap<String, Vec<Intervention>>,
) {
    for row in rows.iter_mut().filter(|r| r.is_valid()) {
        let row_date = match row.fields.date_maj_projet {
            Some(date) => date,
            None => continue,
        };
        let Some(existing) = existing_by_dossier.get(&row.fields.no_dossier_se) else {
            continue;
        };
        let stale_against = existing
            .iter()
            .filter_map(|i| i.import_revision_date)
            .find(|revision| *revision >= row_date);
        if let Some(revision) = stale_against {
            let line = row.line_number;
            row.add_error(
                FileError::new(ErrorCode::Conflict, ErrorTarget::DateMajProjet, line)
                    .with_value("value1", row_date.to_string())
                    .with_value("value2", revision.to_string()),
            );
        }
    }
}
