// ==========================================
// NEXO work-planning - import orchestrator
// ==========================================
// Drives one import run end to end: download, file validation, row
// parsing, business validation, reconciliation, chunked persistence
// and per-row logging. The log is saved after every significant
// phase so pollers observe progress; an uncaught error is converted
// to an UNEXPECTED failure, never left stuck IN_PROGRESS.
// ==========================================

use crate::config::ImportConfig;
use crate::domain::import_log::{FileError, ImportLog, LogEntry};
use crate::domain::intervention::{DesignData, Intervention};
use crate::domain::project::Project;
use crate::domain::types::{ErrorCode, ErrorTarget, ImportStatus, ModificationType, NexoFileType};
use crate::engine::reconciliation::{
    check_for_invalid_updates, create_project_from_nexo_interventions,
    enrich_existing_interventions_rows, interventions_se_rows_to_interventions,
    update_project_with_nexo_interventions,
};
use crate::importer::content_validator::validate_content;
use crate::importer::file_parser::parse_sheet;
use crate::importer::rows::{
    budget_se_rows, intervention_se_rows, rehab_aq_rows, rehab_eg_rows, BudgetSeRow,
    InterventionSeRow, NexoRow, RehabAqConceptionRow, RehabEgConceptionRow,
};
use crate::importer::taxonomy_resolver::TaxonomyResolver;
use crate::importer::validators::budget_validators::{dollars_to_thousands, validate_budget_rows};
use crate::importer::validators::intervention_validators::{
    validate_group_homogeneity, validate_not_stale, validate_taxonomy,
};
use crate::importer::validators::rehab_validators::{validate_eg_rows, validate_rehab_rows};
use crate::repository::{
    CounterRepository, CounterRepositoryImpl, ImportLogRepository, ImportLogRepositoryImpl,
    InterventionRepository, InterventionRepositoryImpl, ProjectRepository, ProjectRepositoryImpl,
    RepositoryResult, StorageRepository, StorageRepositoryImpl, TaxonomyRepositoryImpl,
};
use anyhow::{anyhow, Context};
use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

const INTERVENTION_COUNTER_KEY: &str = "intervention";
const INTERVENTION_ID_PREFIX: &str = "I";
const PROJECT_COUNTER_KEY: &str = "project";
const PROJECT_ID_PREFIX: &str = "P";

pub struct ImportOrchestrator {
    import_log_repo: Arc<dyn ImportLogRepository>,
    intervention_repo: Arc<dyn InterventionRepository>,
    project_repo: Arc<dyn ProjectRepository>,
    counter_repo: Arc<dyn CounterRepository>,
    storage_repo: Arc<dyn StorageRepository>,
    resolver: TaxonomyResolver,
    config: ImportConfig,
}

impl ImportOrchestrator {
    /// Builds a full repository set from the database path; the
    /// orchestrator owns its connections so it can run detached from
    /// the request that started it.
    pub fn from_db_path(db_path: &str, config: ImportConfig) -> RepositoryResult<Self> {
        Ok(ImportOrchestrator {
            import_log_repo: Arc::new(ImportLogRepositoryImpl::new(db_path)?),
            intervention_repo: Arc::new(InterventionRepositoryImpl::new(db_path)?),
            project_repo: Arc::new(ProjectRepositoryImpl::new(db_path)?),
            counter_repo: Arc::new(CounterRepositoryImpl::new(db_path)?),
            storage_repo: Arc::new(StorageRepositoryImpl::new(db_path)?),
            resolver: TaxonomyResolver::new(Arc::new(TaxonomyRepositoryImpl::new(db_path)?)),
            config,
        })
    }

    /// Runs one import to a terminal state. Never returns an error:
    /// any failure escaping the phases is recorded as UNEXPECTED on
    /// the first file and the run is marked FAILURE.
    pub async fn run(&self, import_log_id: &str) {
        info!(import_log_id, "import run starting");
        if let Err(e) = self.execute(import_log_id).await {
            error!(import_log_id, error = %e, "import run failed unexpectedly");
            self.record_unexpected_failure(import_log_id, &e).await;
        }
    }

    async fn record_unexpected_failure(&self, import_log_id: &str, cause: &anyhow::Error) {
        let result = async {
            let mut log = self
                .import_log_repo
                .find_by_id(import_log_id)
                .await?
                .ok_or_else(|| anyhow!("import log {} vanished", import_log_id))?;
            if let Some(first) = log.files.first_mut() {
                first.add_file_error(
                    FileError::new(ErrorCode::Unexpected, ErrorTarget::File, 0)
                        .with_value("value1", cause.to_string()),
                );
            }
            log.status = ImportStatus::Failure;
            log.audit.ended_at = Some(Utc::now().naive_utc());
            self.import_log_repo.save(&log).await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;
        if let Err(e) = result {
            error!(import_log_id, error = %e, "failed to record import failure");
        }
    }

    async fn checkpoint(&self, log: &ImportLog) -> anyhow::Result<()> {
        self.import_log_repo
            .save(log)
            .await
            .context("checkpoint save failed")?;
        Ok(())
    }

    async fn execute(&self, import_log_id: &str) -> anyhow::Result<()> {
        let mut log = self
            .import_log_repo
            .find_by_id(import_log_id)
            .await?
            .ok_or_else(|| anyhow!("import log {} not found", import_log_id))?;

        // Phase 1: the lead file must come first.
        let first_type = log
            .files
            .first()
            .map(|f| f.file_type)
            .ok_or_else(|| anyhow!("import log {} has no files", import_log_id))?;
        if first_type != NexoFileType::InterventionsSe {
            warn!(import_log_id, file_type = %first_type, "first file is not the lead file");
            if let Some(first) = log.files.first_mut() {
                first.add_file_error(
                    FileError::new(ErrorCode::Invalid, ErrorTarget::File, 0)
                        .with_value("value1", first_type.as_str())
                        .with_value("value2", NexoFileType::InterventionsSe.as_str()),
                );
            }
            log.conclude();
            return self.checkpoint(&log).await;
        }

        log.status = ImportStatus::InProgress;
        if log.audit.started_at.is_none() {
            log.audit.started_at = Some(Utc::now().naive_utc());
        }
        for file in &mut log.files {
            file.status = ImportStatus::InProgress;
        }
        self.checkpoint(&log).await?;

        // Phase 2: concurrent downloads; a failure becomes a MISSING
        // error on that file, not a hard abort.
        let downloads = join_all(
            log.files
                .iter()
                .map(|file| self.storage_repo.get(&file.storage_id)),
        )
        .await;
        let mut contents: HashMap<NexoFileType, Vec<u8>> = HashMap::new();
        for (file, download) in log.files.iter_mut().zip(downloads) {
            match download {
                Ok(object) => {
                    contents.insert(file.file_type, object.data);
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "file download failed");
                    file.add_file_error(
                        FileError::new(ErrorCode::Missing, ErrorTarget::File, 0)
                            .with_value("value1", e.to_string()),
                    );
                }
            }
        }
        self.checkpoint(&log).await?;

        // Phase 3: file-level content validation; abort on any error.
        for file in &mut log.files {
            if let Some(data) = contents.get(&file.file_type) {
                for error in validate_content(file.file_type, data) {
                    file.add_file_error(error);
                }
            }
        }
        if log
            .files
            .iter()
            .any(|f| f.derived_status() == ImportStatus::Failure)
        {
            log.conclude();
            return self.checkpoint(&log).await;
        }
        self.checkpoint(&log).await?;

        // Phase 4: parse every file kind into typed rows.
        let lead_data = contents
            .get(&NexoFileType::InterventionsSe)
            .ok_or_else(|| anyhow!("lead file content missing"))?;
        let mut lead_rows = intervention_se_rows(&parse_sheet(lead_data)?);
        let mut budget_rows: Vec<BudgetSeRow> = match contents
            .get(&NexoFileType::InterventionsBudgetSe)
        {
            Some(data) => budget_se_rows(&parse_sheet(data)?),
            None => Vec::new(),
        };
        let mut aq_rows: Vec<RehabAqConceptionRow> =
            match contents.get(&NexoFileType::RehabAqConception) {
                Some(data) => rehab_aq_rows(&parse_sheet(data)?),
                None => Vec::new(),
            };
        let mut eg_rows: Vec<RehabEgConceptionRow> =
            match contents.get(&NexoFileType::RehabEgConception) {
                Some(data) => rehab_eg_rows(&parse_sheet(data)?),
                None => Vec::new(),
            };
        for (file_type, count) in [
            (NexoFileType::InterventionsSe, lead_rows.len()),
            (NexoFileType::InterventionsBudgetSe, budget_rows.len()),
            (NexoFileType::RehabAqConception, aq_rows.len()),
            (NexoFileType::RehabEgConception, eg_rows.len()),
        ] {
            if let Some(file) = log.file_of_type_mut(file_type) {
                if contents.contains_key(&file_type) {
                    file.number_of_items = Some(count);
                }
            }
        }
        self.checkpoint(&log).await?;

        // Phase 5: guard-error log entries, chunked. Lines logged here
        // are skipped by the later full logging pass.
        let mut logged_lead_lines: HashSet<u32> = HashSet::new();
        let guard_failed: Vec<LogEntry> = lead_rows
            .iter()
            .filter(|row| !row.is_valid())
            .map(|row| {
                logged_lead_lines.insert(row.line_number);
                row_log_entry(row.log_id.clone(), row)
            })
            .collect();
        self.append_log_entries(&mut log, NexoFileType::InterventionsSe, guard_failed)
            .await?;

        // Phase 6: taxonomy and business validators, chunked.
        let chunk = self.config.chunk_size.max(1);
        for start in (0..lead_rows.len()).step_by(chunk) {
            let end = (start + chunk).min(lead_rows.len());
            validate_taxonomy(&mut lead_rows[start..end], &self.resolver).await?;
            self.checkpoint(&log).await?;
        }
        let existing = self.existing_interventions_for(&lead_rows).await?;
        validate_not_stale(&mut lead_rows, &existing);
        validate_group_homogeneity(&mut lead_rows);

        // Phase 7: enrichment, merge, cross-project update guard.
        enrich_existing_interventions_rows(&mut lead_rows, &existing);
        let merged = interventions_se_rows_to_interventions(&mut lead_rows);
        let projects_by_id = self.projects_of(&merged).await?;
        let surviving = check_for_invalid_updates(merged, &projects_by_id, &mut lead_rows);
        self.checkpoint(&log).await?;

        // Phase 8: persist projects then interventions, chunked.
        let project_entries = self.persist_interventions(surviving).await?;
        if let Some(file) = log.file_of_type_mut(NexoFileType::InterventionsSe) {
            for (project_id, modification_type) in project_entries {
                file.project_log_entries
                    .push(LogEntry::project(project_id, Some(modification_type)));
            }
        }
        self.checkpoint(&log).await?;

        // Phase 9: log every remaining lead row, chunked.
        let remaining: Vec<LogEntry> = lead_rows
            .iter()
            .filter(|row| !logged_lead_lines.contains(&row.line_number))
            .map(|row| row_log_entry(row.log_id.clone(), row))
            .collect();
        self.append_log_entries(&mut log, NexoFileType::InterventionsSe, remaining)
            .await?;

        // Phase 10: dependent files, strictly after the lead persists.
        let failed_dossiers = failed_dossiers(&lead_rows);
        if log.file_of_type(NexoFileType::InterventionsBudgetSe).is_some() {
            self.process_budget_file(&mut log, &mut budget_rows, &failed_dossiers)
                .await?;
        }
        if log.file_of_type(NexoFileType::RehabAqConception).is_some() {
            self.process_rehab_aq_file(&mut log, &mut aq_rows, &failed_dossiers)
                .await?;
        }
        if log.file_of_type(NexoFileType::RehabEgConception).is_some() {
            self.process_rehab_eg_file(&mut log, &mut eg_rows, &failed_dossiers)
                .await?;
        }

        // Phase 11: terminal status.
        log.conclude();
        self.checkpoint(&log).await?;
        info!(import_log_id, status = %log.status, "import run finished");
        Ok(())
    }

    // ==========================================
    // Lead-file persistence
    // ==========================================

    async fn existing_interventions_for(
        &self,
        rows: &[InterventionSeRow],
    ) -> RepositoryResult<HashMap<String, Vec<Intervention>>> {
        let dossiers: Vec<String> = rows
            .iter()
            .filter(|r| r.is_valid())
            .map(|r| r.fields.no_dossier_se.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let found = self.intervention_repo.find_by_nexo_dossiers(&dossiers).await?;
        Ok(index_by_dossier(found))
    }

    async fn projects_of(
        &self,
        interventions: &[Intervention],
    ) -> RepositoryResult<HashMap<String, Project>> {
        let ids: HashSet<&str> = interventions
            .iter()
            .filter_map(|i| i.project_id.as_deref())
            .collect();
        let mut projects = HashMap::new();
        for id in ids {
            if let Some(project) = self.project_repo.find_by_id(id).await? {
                projects.insert(project.id.clone(), project);
            }
        }
        Ok(projects)
    }

    /// Buckets interventions by modification type, derives and saves
    /// projects first (interventions store their project id), then
    /// persists interventions in chunks. Returns the project log
    /// entries generated along the way.
    async fn persist_interventions(
        &self,
        mut batch: Vec<Intervention>,
    ) -> anyhow::Result<Vec<(String, ModificationType)>> {
        // Fresh sequential ids for creations.
        let creation_count = batch
            .iter()
            .filter(|i| i.modification_type == Some(ModificationType::Creation))
            .count();
        let mut ids = self
            .counter_repo
            .next_ids(INTERVENTION_COUNTER_KEY, INTERVENTION_ID_PREFIX, creation_count)
            .await?
            .into_iter();
        for intervention in &mut batch {
            if intervention.modification_type == Some(ModificationType::Creation) {
                intervention.id = ids
                    .next()
                    .ok_or_else(|| anyhow!("counter returned too few ids"))?;
            }
        }

        let mut by_dossier: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, intervention) in batch.iter().enumerate() {
            if let Some(dossier) = intervention.nexo_dossier() {
                by_dossier.entry(dossier.to_string()).or_default().push(idx);
            }
        }

        let mut project_saves: Vec<Project> = Vec::new();
        let mut project_deletes: Vec<String> = Vec::new();
        let mut project_entries: Vec<(String, ModificationType)> = Vec::new();

        for (dossier, indexes) in &by_dossier {
            let touched: HashSet<String> =
                indexes.iter().map(|&idx| batch[idx].id.clone()).collect();
            let active: Vec<Intervention> = indexes
                .iter()
                .filter(|&&idx| {
                    batch[idx].modification_type != Some(ModificationType::Deletion)
                })
                .map(|&idx| batch[idx].clone())
                .collect();

            match self.project_repo.find_by_nexo_dossier(dossier).await? {
                Some(mut project) => {
                    let current = self
                        .intervention_repo
                        .find_by_project_id(&project.id)
                        .await?;
                    let mut members: Vec<Intervention> = current
                        .into_iter()
                        .filter(|i| !touched.contains(&i.id))
                        .collect();
                    let mut active = active;
                    for intervention in &mut active {
                        intervention.project_id = Some(project.id.clone());
                    }
                    members.extend(active.iter().cloned());

                    if update_project_with_nexo_interventions(&mut project, &members) {
                        for &idx in indexes {
                            if batch[idx].modification_type
                                != Some(ModificationType::Deletion)
                            {
                                batch[idx].project_id = Some(project.id.clone());
                            }
                        }
                        project_entries
                            .push((project.id.clone(), ModificationType::Modification));
                        project_saves.push(project);
                    } else {
                        project_entries
                            .push((project.id.clone(), ModificationType::Deletion));
                        project_deletes.push(project.id.clone());
                    }
                }
                None if !active.is_empty() => {
                    let project_id = self
                        .counter_repo
                        .next_ids(PROJECT_COUNTER_KEY, PROJECT_ID_PREFIX, 1)
                        .await?
                        .into_iter()
                        .next()
                        .ok_or_else(|| anyhow!("counter returned no project id"))?;
                    let mut active = active;
                    for intervention in &mut active {
                        intervention.project_id = Some(project_id.clone());
                    }
                    let project =
                        create_project_from_nexo_interventions(project_id.clone(), &active)
                            .ok_or_else(|| anyhow!("project derivation on empty member set"))?;
                    for &idx in indexes {
                        if batch[idx].modification_type != Some(ModificationType::Deletion) {
                            batch[idx].project_id = Some(project_id.clone());
                        }
                    }
                    project_entries.push((project_id, ModificationType::Creation));
                    project_saves.push(project);
                }
                None => {}
            }
        }

        let chunk = self.config.chunk_size.max(1);
        for slice in project_saves.chunks(chunk) {
            self.project_repo.save_many(slice).await?;
        }
        if !project_deletes.is_empty() {
            self.project_repo.delete_many(&project_deletes).await?;
        }

        let upserts: Vec<Intervention> = batch
            .iter()
            .filter(|i| i.modification_type != Some(ModificationType::Deletion))
            .cloned()
            .collect();
        let deletions: Vec<String> = batch
            .iter()
            .filter(|i| i.modification_type == Some(ModificationType::Deletion))
            .map(|i| i.id.clone())
            .collect();
        for slice in upserts.chunks(chunk) {
            self.intervention_repo.save_many(slice).await?;
        }
        if !deletions.is_empty() {
            self.intervention_repo.delete_many(&deletions).await?;
        }
        Ok(project_entries)
    }

    // ==========================================
    // Dependent files
    // ==========================================

    async fn process_budget_file(
        &self,
        log: &mut ImportLog,
        rows: &mut [BudgetSeRow],
        failed_dossiers: &HashMap<String, Vec<FileError>>,
    ) -> anyhow::Result<()> {
        propagate_errors(rows, failed_dossiers);
        let existing = index_by_dossier(
            self.intervention_repo
                .find_by_nexo_dossiers(&dossiers_of(rows))
                .await?,
        );
        let matched = validate_budget_rows(rows, &existing);

        // Apply yearly allowances onto the matched interventions; only
        // fully-valid dossier groups are applied.
        let mut updates: Vec<Intervention> = Vec::new();
        for (dossier, intervention) in matched {
            let group: Vec<&BudgetSeRow> = rows
                .iter()
                .filter(|r| r.fields.no_dossier_se == dossier)
                .collect();
            if group.iter().any(|r| !r.is_valid()) {
                continue;
            }
            let mut intervention = intervention;
            for row in &group {
                if let Some(period) = intervention
                    .annual_distribution
                    .period_for_year_mut(row.fields.annee_prev_travaux)
                {
                    period.annual_allowance = dollars_to_thousands(row.fields.prev_travaux);
                    period.account_id = row.fields.no_compte_budgetaire.clone();
                }
            }
            intervention.annual_distribution.refresh_summary();
            intervention.touch();
            updates.push(intervention);
        }
        let chunk = self.config.chunk_size.max(1);
        for slice in updates.chunks(chunk) {
            self.intervention_repo.save_many(slice).await?;
        }

        let entries: Vec<LogEntry> = rows
            .iter()
            .map(|row| row_log_entry(row.log_id.clone(), row))
            .collect();
        self.append_log_entries(log, NexoFileType::InterventionsBudgetSe, entries)
            .await
    }

    async fn process_rehab_aq_file(
        &self,
        log: &mut ImportLog,
        rows: &mut [RehabAqConceptionRow],
        failed_dossiers: &HashMap<String, Vec<FileError>>,
    ) -> anyhow::Result<()> {
        propagate_errors(rows, failed_dossiers);
        let existing = index_by_dossier(
            self.intervention_repo
                .find_by_nexo_dossiers(&dossiers_of(rows))
                .await?,
        );
        let matched = validate_rehab_rows(
            rows,
            &existing,
            &self.resolver,
            &self.config.rehab_program_whitelist,
        )
        .await?;
        let updates = apply_design_data(rows, &matched, |fields| DesignData {
            upstream_asset_type: fields.code_actif_amont.clone(),
            downstream_asset_type: fields.code_actif_aval.clone(),
            contract_range: fields.contrat.clone(),
            comment: fields.commentaire.clone(),
        });
        let chunk = self.config.chunk_size.max(1);
        for slice in updates.chunks(chunk) {
            self.intervention_repo.save_many(slice).await?;
        }

        let entries: Vec<LogEntry> = rows
            .iter()
            .map(|row| row_log_entry(row.log_id.clone(), row))
            .collect();
        self.append_log_entries(log, NexoFileType::RehabAqConception, entries)
            .await
    }

    async fn process_rehab_eg_file(
        &self,
        log: &mut ImportLog,
        rows: &mut [RehabEgConceptionRow],
        failed_dossiers: &HashMap<String, Vec<FileError>>,
    ) -> anyhow::Result<()> {
        propagate_errors(rows, failed_dossiers);
        let existing = index_by_dossier(
            self.intervention_repo
                .find_by_nexo_dossiers(&dossiers_of(rows))
                .await?,
        );
        let matched = validate_rehab_rows(
            rows,
            &existing,
            &self.resolver,
            &self.config.rehab_program_whitelist,
        )
        .await?;
        validate_eg_rows(rows, &matched);
        let updates = apply_design_data(rows, &matched, |fields| DesignData {
            upstream_asset_type: fields.code_actif_amont.clone(),
            downstream_asset_type: fields.code_actif_aval.clone(),
            contract_range: fields.contrat.clone(),
            comment: fields.commentaire.clone(),
        });
        let chunk = self.config.chunk_size.max(1);
        for slice in updates.chunks(chunk) {
            self.intervention_repo.save_many(slice).await?;
        }

        let entries: Vec<LogEntry> = rows
            .iter()
            .map(|row| row_log_entry(row.log_id.clone(), row))
            .collect();
        self.append_log_entries(log, NexoFileType::RehabEgConception, entries)
            .await
    }

    /// Appends log entries to a file's collection in chunks, saving
    /// the log after each chunk.
    async fn append_log_entries(
        &self,
        log: &mut ImportLog,
        file_type: NexoFileType,
        entries: Vec<LogEntry>,
    ) -> anyhow::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let chunk = self.config.chunk_size.max(1);
        let mut pending = entries;
        while !pending.is_empty() {
            let take = chunk.min(pending.len());
            let slice: Vec<LogEntry> = pending.drain(..take).collect();
            if let Some(file) = log.file_of_type_mut(file_type) {
                file.intervention_log_entries.extend(slice);
            }
            self.checkpoint(log).await?;
        }
        Ok(())
    }
}

// ==========================================
// Free helpers
// ==========================================

fn row_log_entry<F>(id: String, row: &NexoRow<F>) -> LogEntry {
    LogEntry::intervention(
        id,
        row.line_number,
        row.modification_type,
        row.errors().to_vec(),
    )
}

fn index_by_dossier(interventions: Vec<Intervention>) -> HashMap<String, Vec<Intervention>> {
    let mut by_dossier: HashMap<String, Vec<Intervention>> = HashMap::new();
    for intervention in interventions {
        if let Some(dossier) = intervention.nexo_dossier().map(str::to_string) {
            by_dossier.entry(dossier).or_default().push(intervention);
        }
    }
    by_dossier
}

/// Distinct dossier numbers of a row slice, in first-seen order.
fn dossiers_of<F: DossierKeyed>(rows: &[NexoRow<F>]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    rows.iter()
        .filter(|row| seen.insert(row.fields.dossier_key()))
        .map(|row| row.fields.dossier_key().to_string())
        .collect()
}

fn failed_dossiers(rows: &[InterventionSeRow]) -> HashMap<String, Vec<FileError>> {
    let mut failed: HashMap<String, Vec<FileError>> = HashMap::new();
    for row in rows {
        if !row.is_valid() {
            failed
                .entry(row.fields.no_dossier_se.clone())
                .or_default()
                .extend(row.errors().iter().cloned());
        }
    }
    failed
}

/// Forwards lead-phase failures onto still-valid dependent rows of
/// the same dossier, re-tagged with the dependent row's line number.
fn propagate_errors<F: DossierKeyed>(
    rows: &mut [NexoRow<F>],
    failed_dossiers: &HashMap<String, Vec<FileError>>,
) {
    for row in rows.iter_mut() {
        if !row.is_valid() {
            continue;
        }
        if let Some(errors) = failed_dossiers.get(row.fields.dossier_key()) {
            let line = row.line_number;
            let forwarded: Vec<FileError> = errors
                .iter()
                .map(|e| {
                    let mut error = e.clone();
                    error.line = line;
                    error
                })
                .collect();
            row.add_errors(forwarded);
        }
    }
}

pub trait DossierKeyed {
    fn dossier_key(&self) -> &str;
}

impl DossierKeyed for crate::importer::rows::BudgetSeFields {
    fn dossier_key(&self) -> &str {
        &self.no_dossier_se
    }
}

impl DossierKeyed for crate::importer::rows::RehabAqConceptionFields {
    fn dossier_key(&self) -> &str {
        &self.no_dossier_se
    }
}

impl DossierKeyed for crate::importer::rows::RehabEgConceptionFields {
    fn dossier_key(&self) -> &str {
        &self.no_dossier_se
    }
}

fn apply_design_data<F>(
    rows: &[NexoRow<F>],
    matched: &HashMap<String, Intervention>,
    build: impl Fn(&F) -> DesignData,
) -> Vec<Intervention>
where
    F: DossierKeyed,
{
    let mut updates: HashMap<String, Intervention> = HashMap::new();
    for row in rows.iter().filter(|r| r.is_valid()) {
        let dossier = row.fields.dossier_key();
        let Some(intervention) = matched.get(dossier) else {
            continue;
        };
        let entry = updates
            .entry(dossier.to_string())
            .or_insert_with(|| intervention.clone());
        entry.design_data = Some(build(&row.fields));
        entry.touch();
    }
    updates.into_values().collect()
}
