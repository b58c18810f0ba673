// ==========================================
// NEXO work-planning - reconciliation service
// ==========================================
// Merges validated InterventionsSE rows into canonical intervention
// entities, matches them against persisted state, derives the
// modification type and status, and recomputes project aggregates.
// Failure isolation is per dossier group: a merge failure marks the
// group's rows UNEXPECTED and never aborts sibling groups.
// ==========================================

use crate::domain::annual_distribution::{AnnualDistribution, AnnualPeriod};
use crate::domain::geometry::Geometry;
use crate::domain::import_log::FileError;
use crate::domain::intervention::{
    summary_fields, Asset, Estimate, ExternalReferenceId, Intervention, ModificationSummary,
    StreetLocation,
};
use crate::domain::project::{Project, YearBucket};
use crate::domain::types::{
    ErrorCode, ErrorTarget, InterventionStatus, ModificationType, ProjectCategory, ProjectStatus,
    EXECUTOR_INTERNAL, NEXO_CARNET_RECEIVED, NEXO_PHASE_CANCELED,
};
use crate::engine::annual_distribution::{
    generate_default_annual_distribution, update_annual_periods,
};
use crate::i18n;
use crate::importer::rows::InterventionSeRow;
use crate::importer::validators::intervention_validators::group_key;
use anyhow::anyhow;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};

// ==========================================
// Enrichment against persisted interventions
// ==========================================

/// Stamps each valid row with the matching persisted intervention
/// (when one exists) and its derived modification type. Matching
/// tries (asset type + the row's own asset id) first, then falls
/// back to (work type + asset type) alone.
pub fn enrich_existing_interventions_rows(
    rows: &mut [InterventionSeRow],
    existing_by_dossier: &HashMap<String, Vec<Intervention>>,
) {
    for row in rows.iter_mut().filter(|r| r.is_valid()) {
        let candidates = existing_by_dossier
            .get(&row.fields.no_dossier_se)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let asset_type = row.fields.resolved.asset_type_id.as_deref();
        let work_type = row.fields.resolved.work_type_id.as_deref();

        let by_own_asset = row.fields.no_actif.as_deref().and_then(|no_actif| {
            candidates.iter().find(|i| {
                Some(i.asset_type_id.as_str()) == asset_type && i.has_asset_with_nexo_id(no_actif)
            })
        });
        let matched = by_own_asset.or_else(|| {
            candidates.iter().find(|i| {
                Some(i.asset_type_id.as_str()) == asset_type
                    && Some(i.work_type_id.as_str()) == work_type
            })
        });

        row.modification_type = Some(derive_modification_type(row, matched));
        row.fields.matched_intervention = matched.cloned();
    }
}

fn derive_modification_type(
    row: &InterventionSeRow,
    matched: Option<&Intervention>,
) -> ModificationType {
    if row.fields.code_phase == NEXO_PHASE_CANCELED {
        return ModificationType::Deletion;
    }
    match matched {
        Some(intervention) => match row.fields.no_actif.as_deref() {
            // Without an asset id the dossier/type match alone makes
            // this an update of the found intervention.
            None => ModificationType::Modification,
            Some(no_actif) if intervention.has_asset_with_nexo_id(no_actif) => {
                ModificationType::Modification
            }
            Some(_) => ModificationType::Creation,
        },
        None => ModificationType::Creation,
    }
}

// ==========================================
// Row group -> intervention merge
// ==========================================

/// Merges valid rows into one intervention per (dossier, asset type,
/// work type) group. A failing group attaches an UNEXPECTED error to
/// each of its rows instead of aborting the batch.
pub fn interventions_se_rows_to_interventions(
    rows: &mut [InterventionSeRow],
) -> Vec<Intervention> {
    let mut groups: BTreeMap<(String, String, String), Vec<usize>> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if row.is_valid() {
            groups.entry(group_key(&row.fields)).or_default().push(idx);
        }
    }

    let mut interventions = Vec::new();
    for indexes in groups.values() {
        let group: Vec<&InterventionSeRow> = indexes.iter().map(|&idx| &rows[idx]).collect();
        match merge_group(&group) {
            Ok(intervention) => interventions.push(intervention),
            Err(e) => {
                let message = e.to_string();
                for &idx in indexes {
                    let line = rows[idx].line_number;
                    rows[idx].add_error(
                        FileError::new(ErrorCode::Unexpected, ErrorTarget::NoDossierSe, line)
                            .with_value("value1", message.clone()),
                    );
                }
            }
        }
    }
    interventions
}

fn merge_group(group: &[&InterventionSeRow]) -> anyhow::Result<Intervention> {
    let reference = group
        .iter()
        .find(|r| r.modification_type != Some(ModificationType::Deletion))
        .or_else(|| group.first())
        .ok_or_else(|| anyhow!("empty row group"))?;
    let existing = group
        .iter()
        .find_map(|r| r.fields.matched_intervention.as_ref());

    let mut intervention = intervention_from_reference(reference, existing);

    // Asset upsert/removal across all rows of the group, matched by
    // external asset id. A cancelled phase on a previously-seen asset
    // removes it.
    for row in group {
        let Some(no_actif) = row.fields.no_actif.as_deref() else {
            continue;
        };
        let already_known = intervention.has_asset_with_nexo_id(no_actif);
        if row.fields.code_phase == NEXO_PHASE_CANCELED {
            if already_known {
                intervention
                    .assets
                    .retain(|a| a.nexo_asset_id() != Some(no_actif));
            }
            continue;
        }
        if already_known {
            if let Some(asset) = intervention
                .assets
                .iter_mut()
                .find(|a| a.nexo_asset_id() == Some(no_actif))
            {
                asset.geometry = row.fields.geom.clone().or(asset.geometry.take());
                asset.length_m = Some(row.fields.longueur);
            }
        } else {
            intervention.assets.push(Asset {
                id: uuid::Uuid::new_v4().to_string(),
                type_id: intervention.asset_type_id.clone(),
                owner_id: row.fields.resolved.asset_owner_id.clone(),
                geometry: row.fields.geom.clone(),
                length_m: Some(row.fields.longueur),
                external_reference_ids: vec![ExternalReferenceId::asset(no_actif)],
            });
        }
    }

    // Comments: union over existing and all rows, deduplicated.
    for row in group {
        if let Some(comment) = row.fields.commentaire.clone() {
            if !intervention.comments.contains(&comment) {
                intervention.comments.push(comment);
            }
        }
    }

    // Work-area geometry from the owned assets, reference row as a
    // fallback when no asset carries one.
    let asset_geometries: Vec<Geometry> = intervention
        .assets
        .iter()
        .filter_map(|a| a.geometry.clone())
        .collect();
    intervention.geometry = Geometry::union(asset_geometries)
        .or_else(|| reference.fields.geom.clone())
        .or(intervention.geometry.take());

    intervention.import_revision_date = group
        .iter()
        .filter_map(|r| r.fields.date_maj_projet)
        .max()
        .or(intervention.import_revision_date);

    intervention.modification_type = Some(group_modification_type(
        group,
        existing,
        intervention.assets.is_empty(),
    ));

    // Annual distribution follows the (possibly changed) duration.
    match existing {
        Some(existing) => {
            let mut distribution = existing.annual_distribution.clone();
            let note = update_annual_periods(
                &mut distribution,
                intervention.planification_year,
                intervention.end_year,
            );
            if let Some(note) = note {
                if !intervention.comments.contains(&note) {
                    intervention.comments.push(note);
                }
            }
            intervention.annual_distribution = distribution;
        }
        None => {
            intervention.annual_distribution = generate_default_annual_distribution(
                intervention.planification_year,
                intervention.end_year,
                intervention.estimate.allowance,
                intervention.estimate.length,
                None,
            );
        }
    }

    let revision = generate_revision_request(existing, &intervention);
    intervention.status = compute_intervention_status(
        existing,
        intervention.program_id.as_deref(),
        intervention.code_status_carnet.as_deref(),
        &intervention.executor_id,
        revision.decision_required,
    );
    intervention.modification_summary = revision.summary;
    intervention.decision_required = revision.decision_required;
    if let Some(note) = revision.note {
        if !intervention.comments.contains(&note) {
            intervention.comments.push(note);
        }
    }

    Ok(intervention)
}

fn intervention_from_reference(
    reference: &InterventionSeRow,
    existing: Option<&Intervention>,
) -> Intervention {
    let fields = &reference.fields;
    let now = Utc::now().naive_utc();
    let resolved = &fields.resolved;
    let work_type_id = resolved
        .work_type_id
        .clone()
        .unwrap_or_else(|| fields.code_travaux.to_lowercase());

    Intervention {
        id: existing.map(|i| i.id.clone()).unwrap_or_default(),
        name: format!(
            "{} - {} ({} à {})",
            work_type_id, fields.rue, fields.de, fields.a
        ),
        status: existing
            .map(|i| i.status)
            .unwrap_or(InterventionStatus::Wished),
        asset_type_id: resolved
            .asset_type_id
            .clone()
            .unwrap_or_else(|| fields.code_actif.to_lowercase()),
        work_type_id,
        requestor_id: resolved
            .requestor_id
            .clone()
            .unwrap_or_else(|| fields.unite_responsable.to_lowercase()),
        executor_id: resolved
            .executor_id
            .clone()
            .unwrap_or_else(|| fields.code_executant.to_lowercase()),
        borough_id: resolved
            .borough_id
            .clone()
            .unwrap_or_else(|| fields.arrondissement.to_lowercase()),
        program_id: resolved
            .program_id
            .clone()
            .or_else(|| existing.and_then(|i| i.program_id.clone())),
        planification_year: fields.annee_debut_travaux,
        end_year: fields.annee_fin_travaux,
        estimate: Estimate {
            allowance: fields.budget,
            length: fields.longueur,
        },
        assets: existing.map(|i| i.assets.clone()).unwrap_or_default(),
        annual_distribution: AnnualDistribution::default(),
        project_id: existing.and_then(|i| i.project_id.clone()),
        external_reference_ids: vec![ExternalReferenceId::dossier(&fields.no_dossier_se)],
        import_revision_date: existing.and_then(|i| i.import_revision_date),
        streets: StreetLocation {
            street_name: fields.rue.clone(),
            street_from: fields.de.clone(),
            street_to: fields.a.clone(),
        },
        comments: existing.map(|i| i.comments.clone()).unwrap_or_default(),
        geometry: existing.and_then(|i| i.geometry.clone()),
        design_data: existing.and_then(|i| i.design_data.clone()),
        line_number: Some(reference.line_number),
        code_status_carnet: fields.code_statut_carnet.clone(),
        code_phase: Some(fields.code_phase.clone()),
        modification_summary: ModificationSummary::new(),
        decision_required: false,
        modification_type: None,
        created_at: existing.map(|i| i.created_at).unwrap_or(now),
        updated_at: now,
    }
}

fn group_modification_type(
    group: &[&InterventionSeRow],
    existing: Option<&Intervention>,
    no_assets_remaining: bool,
) -> ModificationType {
    let all_deletions = group
        .iter()
        .all(|r| r.modification_type == Some(ModificationType::Deletion));
    // Cancelling a subset of a multi-asset intervention only removes
    // those assets; the intervention itself is deleted when nothing
    // remains after the merge.
    if all_deletions && no_assets_remaining {
        ModificationType::Deletion
    } else if existing.is_some() {
        ModificationType::Modification
    } else {
        ModificationType::Creation
    }
}

// ==========================================
// Status computation
// ==========================================

/// Status rules. When the intervention carries both a persisted and
/// a newly resolved program, no revision decision was generated, and
/// the persisted status is not canceled, the existing status sticks.
pub fn compute_intervention_status(
    existing: Option<&Intervention>,
    program_id: Option<&str>,
    code_statut_carnet: Option<&str>,
    executor_id: &str,
    decision_generated: bool,
) -> InterventionStatus {
    if let Some(existing) = existing {
        let sticky = existing.program_id.is_some()
            && program_id.is_some()
            && !decision_generated
            && existing.status != InterventionStatus::Canceled;
        if sticky {
            return existing.status;
        }
    }
    if code_statut_carnet == Some(NEXO_CARNET_RECEIVED) {
        if executor_id == EXECUTOR_INTERNAL {
            InterventionStatus::Waiting
        } else if program_id.is_some() {
            InterventionStatus::Waiting
        } else {
            InterventionStatus::Integrated
        }
    } else {
        InterventionStatus::Wished
    }
}

// ==========================================
// Revision requests
// ==========================================

#[derive(Debug, Default)]
pub struct RevisionOutcome {
    pub summary: ModificationSummary,
    pub decision_required: bool,
    pub note: Option<String>,
}

fn asset_id_set(intervention: &Intervention) -> HashSet<String> {
    intervention
        .assets
        .iter()
        .filter_map(|a| a.nexo_asset_id().map(str::to_string))
        .collect()
}

/// Compares old and new field values into a modification summary and
/// decides whether an advisory revision decision is required.
pub fn generate_revision_request(
    existing: Option<&Intervention>,
    incoming: &Intervention,
) -> RevisionOutcome {
    let mut summary = ModificationSummary::new();
    let Some(existing) = existing else {
        return RevisionOutcome {
            summary,
            decision_required: incoming.program_id.is_some(),
            note: None,
        };
    };

    let old_assets = asset_id_set(existing);
    let new_assets = asset_id_set(incoming);
    summary.insert(
        summary_fields::REQUESTOR.to_string(),
        existing.requestor_id != incoming.requestor_id,
    );
    summary.insert(
        summary_fields::WORK_TYPE.to_string(),
        existing.work_type_id != incoming.work_type_id,
    );
    summary.insert(
        summary_fields::PROGRAM.to_string(),
        existing.program_id != incoming.program_id,
    );
    summary.insert(
        summary_fields::START_YEAR.to_string(),
        existing.planification_year != incoming.planification_year,
    );
    summary.insert(
        summary_fields::END_YEAR.to_string(),
        existing.end_year != incoming.end_year,
    );
    summary.insert(
        summary_fields::BOROUGH.to_string(),
        existing.borough_id != incoming.borough_id,
    );
    summary.insert(
        summary_fields::EXECUTOR.to_string(),
        existing.executor_id != incoming.executor_id,
    );
    summary.insert(
        summary_fields::ASSET_ADDED.to_string(),
        new_assets.difference(&old_assets).next().is_some(),
    );
    summary.insert(
        summary_fields::ASSET_REMOVED.to_string(),
        old_assets.difference(&new_assets).next().is_some(),
    );

    let changed: Vec<&str> = summary
        .iter()
        .filter(|(_, changed)| **changed)
        .map(|(name, _)| name.as_str())
        .collect();

    let advisory_applies = existing.program_id.is_some()
        && incoming.program_id.is_some()
        && !matches!(
            existing.status,
            InterventionStatus::Canceled
                | InterventionStatus::Waiting
                | InterventionStatus::Wished
        );
    let note = if advisory_applies && !changed.is_empty() {
        Some(i18n::t_with_args(
            "import.revision_required",
            &[("value1", changed.join(", "))],
        ))
    } else {
        None
    };

    let cancel_reversed = existing.status == InterventionStatus::Canceled
        && incoming.modification_type != Some(ModificationType::Deletion)
        && incoming.program_id.is_some();
    let program_appeared = existing.program_id.is_none() && incoming.program_id.is_some();
    let decision_required = note.is_some() || cancel_reversed || program_appeared;

    RevisionOutcome {
        summary,
        decision_required,
        note,
    }
}

// ==========================================
// Cross-project update guard
// ==========================================

fn restricted_flags(category: ProjectCategory) -> &'static [&'static str] {
    match category {
        ProjectCategory::Integrated => &[
            summary_fields::START_YEAR,
            summary_fields::END_YEAR,
            summary_fields::BOROUGH,
            summary_fields::WORK_TYPE,
            summary_fields::PROGRAM,
            summary_fields::ASSET_ADDED,
            summary_fields::ASSET_REMOVED,
        ],
        ProjectCategory::NonIntegrated => &[
            summary_fields::START_YEAR,
            summary_fields::END_YEAR,
            summary_fields::BOROUGH,
            summary_fields::REQUESTOR,
            summary_fields::EXECUTOR,
            summary_fields::WORK_TYPE,
            summary_fields::PROGRAM,
            summary_fields::ASSET_ADDED,
            summary_fields::ASSET_REMOVED,
        ],
    }
}

fn guard_applies(project: &Project, incoming_ids: &HashSet<&str>) -> bool {
    match project.category {
        ProjectCategory::NonIntegrated => project.status.is_ordered(),
        ProjectCategory::Integrated => {
            project.program_book_id.is_some()
                || project
                    .intervention_ids
                    .iter()
                    .any(|id| !incoming_ids.contains(id.as_str()))
        }
    }
}

/// Updates/deletions landing inside a locked project invalidate the
/// whole batch of interventions belonging to that project: they are
/// removed from the successful list and every contributing row is
/// re-marked with the offending field names.
pub fn check_for_invalid_updates(
    interventions: Vec<Intervention>,
    projects_by_id: &HashMap<String, Project>,
    rows: &mut [InterventionSeRow],
) -> Vec<Intervention> {
    let mut by_project: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, intervention) in interventions.iter().enumerate() {
        if matches!(
            intervention.modification_type,
            Some(ModificationType::Modification) | Some(ModificationType::Deletion)
        ) {
            if let Some(project_id) = &intervention.project_id {
                by_project.entry(project_id.clone()).or_default().push(idx);
            }
        }
    }

    let mut rejected: HashSet<usize> = HashSet::new();
    for (project_id, indexes) in &by_project {
        let Some(project) = projects_by_id.get(project_id) else {
            continue;
        };
        let incoming_ids: HashSet<&str> = indexes
            .iter()
            .map(|&idx| interventions[idx].id.as_str())
            .collect();
        if !guard_applies(project, &incoming_ids) {
            continue;
        }
        let flags = restricted_flags(project.category);
        let offending: Vec<&str> = flags
            .iter()
            .filter(|flag| {
                indexes.iter().any(|&idx| {
                    interventions[idx]
                        .modification_summary
                        .get(**flag)
                        .copied()
                        .unwrap_or(false)
                })
            })
            .copied()
            .collect();
        if offending.is_empty() {
            continue;
        }

        rejected.extend(indexes.iter().copied());
        let offending_names = offending.join(", ");
        let dossiers: HashSet<&str> = indexes
            .iter()
            .filter_map(|&idx| interventions[idx].nexo_dossier())
            .collect();
        for row in rows.iter_mut() {
            if row.is_valid() && dossiers.contains(row.fields.no_dossier_se.as_str()) {
                let line = row.line_number;
                row.add_error(
                    FileError::new(ErrorCode::Invalid, ErrorTarget::Projet, line)
                        .with_value("value1", project_id.clone())
                        .with_value("value2", offending_names.clone()),
                );
            }
        }
    }

    interventions
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !rejected.contains(idx))
        .map(|(_, intervention)| intervention)
        .collect()
}

// ==========================================
// Project derivation
// ==========================================

fn project_distribution(start_year: i32, end_year: i32, members: &[Intervention]) -> AnnualDistribution {
    let mut distribution = AnnualDistribution::default();
    for (rank, year) in (start_year..=end_year).enumerate() {
        let mut allowance = 0.0;
        let mut length = 0.0;
        for member in members {
            if let Some(period) = member
                .annual_distribution
                .annual_periods
                .iter()
                .find(|p| p.year == year)
            {
                allowance += period.annual_allowance;
                length += period.annual_length;
            }
        }
        distribution.annual_periods.push(AnnualPeriod {
            year,
            rank,
            annual_allowance: allowance,
            annual_length: length,
            account_id: None,
        });
    }
    distribution.refresh_summary();
    distribution
}

fn year_buckets(members: &[Intervention]) -> Vec<YearBucket> {
    let mut buckets: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    for member in members {
        buckets
            .entry(member.planification_year)
            .or_default()
            .push(member.id.clone());
    }
    buckets
        .into_iter()
        .map(|(year, intervention_ids)| YearBucket {
            year,
            intervention_ids,
        })
        .collect()
}

/// Derives a new project from its member interventions. A project is
/// non-integrated iff it wraps exactly one intervention whose book
/// was received and whose program already resolved.
pub fn create_project_from_nexo_interventions(
    id: String,
    members: &[Intervention],
) -> Option<Project> {
    let reference = members.first()?;
    let start_year = members.iter().map(|i| i.planification_year).min()?;
    let end_year = members.iter().map(|i| i.end_year).max()?;

    let non_integrated = members.len() == 1
        && reference.code_status_carnet.as_deref() == Some(NEXO_CARNET_RECEIVED)
        && reference.program_id.is_some();
    let category = if non_integrated {
        ProjectCategory::NonIntegrated
    } else {
        ProjectCategory::Integrated
    };

    let now = Utc::now().naive_utc();
    Some(Project {
        id,
        name: format!(
            "{} - {} ({} à {})",
            category.label_fr(),
            reference.streets.street_name,
            reference.streets.street_from,
            reference.streets.street_to
        ),
        category,
        status: ProjectStatus::Planned,
        start_year,
        end_year,
        geometry: Geometry::union(members.iter().filter_map(|i| i.geometry.clone()).collect()),
        annual_distribution: project_distribution(start_year, end_year, members),
        intervention_ids: members.iter().map(|i| i.id.clone()).collect(),
        interventions_by_year: year_buckets(members),
        program_book_id: None,
        external_reference_ids: reference
            .nexo_dossier()
            .map(|d| vec![ExternalReferenceId::dossier(d)])
            .unwrap_or_default(),
        created_at: now,
        updated_at: now,
    })
}

/// Recomputes every derived project field from the new member set.
/// Returns false when the member set is empty; the caller deletes
/// the project in that case.
pub fn update_project_with_nexo_interventions(
    project: &mut Project,
    members: &[Intervention],
) -> bool {
    let (Some(start_year), Some(end_year)) = (
        members.iter().map(|i| i.planification_year).min(),
        members.iter().map(|i| i.end_year).max(),
    ) else {
        return false;
    };

    project.start_year = start_year;
    project.end_year = end_year;
    project.geometry =
        Geometry::union(members.iter().filter_map(|i| i.geometry.clone()).collect());
    project.annual_distribution = project_distribution(start_year, end_year, members);
    project.intervention_ids = members.iter().map(|i| i.id.clone()).collect();
    project.interventions_by_year = year_buckets(members);
    project.touch();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::intervention_fixture;
    use crate::importer::file_parser::parse_sheet;
    use crate::importer::rows::intervention_se_rows;

    fn se_rows(data_rows: &[&str]) -> Vec<InterventionSeRow> {
        let header = "NoDossierSE,NoActif,CodeActif,CodeTravaux,CodePhase,CodeExecutant,UniteResponsable,Arrondissement,Rue,De,A,AnneeDebutTravaux,AnneeFinTravaux,Budget,Longueur,Commentaire,DateMAJProjet";
        let csv = format!("{}\n{}\n", header, data_rows.join("\n"));
        intervention_se_rows(&parse_sheet(csv.as_bytes()).unwrap())
    }

    fn with_asset(mut intervention: Intervention, nexo_asset_id: &str) -> Intervention {
        intervention.assets.push(Asset {
            id: "asset-1".to_string(),
            type_id: intervention.asset_type_id.clone(),
            owner_id: None,
            geometry: None,
            length_m: None,
            external_reference_ids: vec![ExternalReferenceId::asset(nexo_asset_id)],
        });
        intervention
    }

    #[test]
    fn test_two_rows_merge_into_one_intervention() {
        let mut rows = se_rows(&[
            "D-1,A-7,AQ-01,REH,2,DI,DEEU,VM,de chambly,st-jean,papineau,2025,2026,120,300,premier,2025-06-01",
            "D-1,A-8,AQ-01,REH,2,DI,DEEU,VM,de chambly,st-jean,papineau,2025,2026,120,300,premier,2025-06-01",
        ]);
        let interventions = interventions_se_rows_to_interventions(&mut rows);
        assert_eq!(interventions.len(), 1);
        let merged = &interventions[0];
        assert_eq!(merged.assets.len(), 2);
        // Same comment on both rows is kept once.
        assert_eq!(merged.comments, vec!["premier"]);
        assert_eq!(merged.modification_type, Some(ModificationType::Creation));
        assert_eq!(merged.nexo_dossier(), Some("D-1"));
    }

    #[test]
    fn test_enrichment_marks_known_asset_as_modification() {
        let mut rows = se_rows(&[
            "D-1,A-7,aqueductSegment,rehabilitation,2,di,deeu,vm,de chambly,st-jean,papineau,2025,2026,120,300,,2025-06-01",
        ]);
        rows[0].fields.resolved.asset_type_id = Some("aqueductSegment".to_string());
        rows[0].fields.resolved.work_type_id = Some("rehabilitation".to_string());
        let existing = HashMap::from([(
            "D-1".to_string(),
            vec![with_asset(intervention_fixture("D-1"), "A-7")],
        )]);
        enrich_existing_interventions_rows(&mut rows, &existing);
        assert_eq!(rows[0].modification_type, Some(ModificationType::Modification));
        assert!(rows[0].fields.matched_intervention.is_some());
    }

    #[test]
    fn test_cancelled_phase_removes_asset_and_marks_deletion() {
        let mut rows = se_rows(&[
            "D-1,A-7,aqueductSegment,rehabilitation,4,di,deeu,vm,de chambly,st-jean,papineau,2025,2026,120,300,,2025-06-01",
        ]);
        rows[0].fields.resolved.asset_type_id = Some("aqueductSegment".to_string());
        rows[0].fields.resolved.work_type_id = Some("rehabilitation".to_string());
        let existing = HashMap::from([(
            "D-1".to_string(),
            vec![with_asset(intervention_fixture("D-1"), "A-7")],
        )]);
        enrich_existing_interventions_rows(&mut rows, &existing);
        assert_eq!(rows[0].modification_type, Some(ModificationType::Deletion));

        let interventions = interventions_se_rows_to_interventions(&mut rows);
        assert_eq!(interventions.len(), 1);
        assert_eq!(
            interventions[0].modification_type,
            Some(ModificationType::Deletion)
        );
        assert!(interventions[0].assets.is_empty());
    }

    #[test]
    fn test_cancelling_one_of_two_assets_keeps_the_intervention() {
        let mut rows = se_rows(&[
            "D-1,A-7,aqueductSegment,rehabilitation,4,di,deeu,vm,de chambly,st-jean,papineau,2025,2026,120,300,,2025-06-01",
        ]);
        rows[0].fields.resolved.asset_type_id = Some("aqueductSegment".to_string());
        rows[0].fields.resolved.work_type_id = Some("rehabilitation".to_string());
        let two_assets = with_asset(with_asset(intervention_fixture("D-1"), "A-7"), "A-8");
        let existing = HashMap::from([("D-1".to_string(), vec![two_assets])]);
        enrich_existing_interventions_rows(&mut rows, &existing);
        assert_eq!(rows[0].modification_type, Some(ModificationType::Deletion));

        let interventions = interventions_se_rows_to_interventions(&mut rows);
        assert_eq!(interventions.len(), 1);
        // A-7 is removed but A-8 survives, so the intervention is
        // updated rather than deleted.
        assert_eq!(
            interventions[0].modification_type,
            Some(ModificationType::Modification)
        );
        assert!(!interventions[0].has_asset_with_nexo_id("A-7"));
        assert!(interventions[0].has_asset_with_nexo_id("A-8"));
    }

    #[test]
    fn test_status_rules() {
        // Book received, internal executor: waiting.
        assert_eq!(
            compute_intervention_status(None, None, Some("2"), "di", false),
            InterventionStatus::Waiting
        );
        // Book received, external executor, program resolved: waiting.
        assert_eq!(
            compute_intervention_status(None, Some("pcpr"), Some("2"), "ext", false),
            InterventionStatus::Waiting
        );
        // Book received, external executor, no program: integrated.
        assert_eq!(
            compute_intervention_status(None, None, Some("2"), "ext", false),
            InterventionStatus::Integrated
        );
        // Book not received: wished.
        assert_eq!(
            compute_intervention_status(None, None, Some("1"), "di", false),
            InterventionStatus::Wished
        );
    }

    #[test]
    fn test_status_sticks_when_programs_match_and_no_decision() {
        let mut existing = intervention_fixture("D-1");
        existing.status = InterventionStatus::Accepted;
        existing.program_id = Some("pcpr".to_string());
        assert_eq!(
            compute_intervention_status(Some(&existing), Some("pcpr"), Some("1"), "di", false),
            InterventionStatus::Accepted
        );
        // A generated decision breaks stickiness.
        assert_eq!(
            compute_intervention_status(Some(&existing), Some("pcpr"), Some("1"), "di", true),
            InterventionStatus::Wished
        );
    }

    #[test]
    fn test_revision_request_flags_changed_fields() {
        let mut existing = intervention_fixture("D-1");
        existing.program_id = Some("pcpr".to_string());
        existing.status = InterventionStatus::Accepted;

        let mut incoming = intervention_fixture("D-1");
        incoming.program_id = Some("pcpr".to_string());
        incoming.planification_year = 2027;

        let outcome = generate_revision_request(Some(&existing), &incoming);
        assert_eq!(
            outcome.summary.get(summary_fields::START_YEAR),
            Some(&true)
        );
        assert!(outcome.decision_required);
        assert!(outcome.note.unwrap().contains(summary_fields::START_YEAR));
    }

    #[test]
    fn test_program_appearing_requires_decision_without_note() {
        let existing = intervention_fixture("D-1");
        let mut incoming = intervention_fixture("D-1");
        incoming.program_id = Some("pcpr".to_string());
        let outcome = generate_revision_request(Some(&existing), &incoming);
        assert!(outcome.decision_required);
        assert!(outcome.note.is_none());
    }

    #[test]
    fn test_invalid_update_guard_pulls_whole_project() {
        let mut intervention = intervention_fixture("D-1");
        intervention.project_id = Some("P00001".to_string());
        intervention.modification_type = Some(ModificationType::Modification);
        intervention
            .modification_summary
            .insert(summary_fields::START_YEAR.to_string(), true);

        let mut project =
            create_project_from_nexo_interventions("P00001".to_string(), &[intervention.clone()])
                .unwrap();
        project.category = ProjectCategory::NonIntegrated;
        project.status = ProjectStatus::FinalOrdered;
        let projects = HashMap::from([(project.id.clone(), project)]);

        let mut rows = se_rows(&[
            "D-1,A-7,AQ-01,REH,2,DI,DEEU,VM,de chambly,st-jean,papineau,2025,2026,120,300,,2025-06-01",
        ]);
        let surviving = check_for_invalid_updates(vec![intervention], &projects, &mut rows);
        assert!(surviving.is_empty());
        assert!(rows[0]
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::Invalid && e.target == ErrorTarget::Projet));
    }

    #[test]
    fn test_borough_change_locked_for_ordered_non_integrated_project() {
        let mut intervention = intervention_fixture("D-1");
        intervention.project_id = Some("P00001".to_string());
        intervention.modification_type = Some(ModificationType::Modification);
        intervention
            .modification_summary
            .insert(summary_fields::BOROUGH.to_string(), true);

        let mut project =
            create_project_from_nexo_interventions("P00001".to_string(), &[intervention.clone()])
                .unwrap();
        project.category = ProjectCategory::NonIntegrated;
        project.status = ProjectStatus::FinalOrdered;
        let projects = HashMap::from([(project.id.clone(), project)]);

        let mut rows = se_rows(&[
            "D-1,A-7,AQ-01,REH,2,DI,DEEU,VM,de chambly,st-jean,papineau,2025,2026,120,300,,2025-06-01",
        ]);
        let surviving = check_for_invalid_updates(vec![intervention], &projects, &mut rows);
        assert!(surviving.is_empty());
        let error = rows[0]
            .errors()
            .iter()
            .find(|e| e.code == ErrorCode::Invalid && e.target == ErrorTarget::Projet)
            .unwrap();
        assert!(error
            .values
            .get("value2")
            .unwrap()
            .contains(summary_fields::BOROUGH));
    }

    #[test]
    fn test_project_category_derivation() {
        let mut single = intervention_fixture("D-1");
        single.code_status_carnet = Some(NEXO_CARNET_RECEIVED.to_string());
        single.program_id = Some("pcpr".to_string());
        let project =
            create_project_from_nexo_interventions("P00001".to_string(), &[single]).unwrap();
        assert_eq!(project.category, ProjectCategory::NonIntegrated);
        assert!(project.name.starts_with("Projet non intégré"));

        let members = vec![intervention_fixture("D-1"), intervention_fixture("D-1")];
        let project =
            create_project_from_nexo_interventions("P00002".to_string(), &members).unwrap();
        assert_eq!(project.category, ProjectCategory::Integrated);
    }

    #[test]
    fn test_project_update_recomputes_everything() {
        let mut a = intervention_fixture("D-1");
        a.id = "I00001".to_string();
        a.planification_year = 2025;
        a.end_year = 2025;
        a.annual_distribution =
            generate_default_annual_distribution(2025, 2025, 50.0, 100.0, None);
        let mut b = intervention_fixture("D-1");
        b.id = "I00002".to_string();
        b.planification_year = 2026;
        b.end_year = 2027;
        b.annual_distribution =
            generate_default_annual_distribution(2026, 2027, 80.0, 0.0, None);

        let mut project =
            create_project_from_nexo_interventions("P00001".to_string(), &[a.clone()]).unwrap();
        assert!(update_project_with_nexo_interventions(
            &mut project,
            &[a, b]
        ));
        assert_eq!(project.start_year, 2025);
        assert_eq!(project.end_year, 2027);
        assert_eq!(project.intervention_ids.len(), 2);
        assert_eq!(
            project.annual_distribution.distribution_summary.total_allowance,
            50.0
        );
        assert_eq!(project.interventions_by_year.len(), 2);

        // Empty member set slates the project for deletion.
        assert!(!update_project_with_nexo_interventions(&mut project, &[]));
    }
}
