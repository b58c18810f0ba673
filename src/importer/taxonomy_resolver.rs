// ==========================================
// NEXO work-planning - taxonomy resolver
// ==========================================
// Maps external NEXO codes to internal taxonomy entries. The cache
// is owned by one import run (no ambient global state); groups are
// fetched once and reused for every row.
// ==========================================

use crate::domain::taxonomy::TaxonomyEntry;
use crate::domain::types::TaxonomyGroup;
use crate::repository::error::RepositoryResult;
use crate::repository::taxonomy_repo::TaxonomyRepository;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct TaxonomyResolver {
    repo: Arc<dyn TaxonomyRepository>,
    cache: Mutex<HashMap<TaxonomyGroup, Arc<Vec<TaxonomyEntry>>>>,
}

impl TaxonomyResolver {
    pub fn new(repo: Arc<dyn TaxonomyRepository>) -> Self {
        TaxonomyResolver {
            repo,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// All entries of a group, fetched once per run.
    pub async fn group(&self, group: TaxonomyGroup) -> RepositoryResult<Arc<Vec<TaxonomyEntry>>> {
        {
            let cache = self
                .cache
                .lock()
                .map_err(|e| crate::repository::error::RepositoryError::LockError(e.to_string()))?;
            if let Some(entries) = cache.get(&group) {
                return Ok(Arc::clone(entries));
            }
        }
        let entries = Arc::new(self.repo.get_group(group).await?);
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| crate::repository::error::RepositoryError::LockError(e.to_string()))?;
        Ok(Arc::clone(cache.entry(group).or_insert(entries)))
    }

    /// Resolves an external NEXO code against a group's nexoMatches
    /// tables. None when no entry answers to the code.
    pub async fn find_by_nexo_code(
        &self,
        code: &str,
        group: TaxonomyGroup,
    ) -> RepositoryResult<Option<TaxonomyEntry>> {
        let entries = self.group(group).await?;
        Ok(entries
            .iter()
            .find(|entry| entry.matches_nexo_code(code))
            .cloned())
    }

    /// Entry by internal code.
    pub async fn find_by_code(
        &self,
        code: &str,
        group: TaxonomyGroup,
    ) -> RepositoryResult<Option<TaxonomyEntry>> {
        let entries = self.group(group).await?;
        Ok(entries.iter().find(|entry| entry.code == code).cloned())
    }

    /// French display label for an internal code; falls back to the
    /// code itself when the entry is unknown.
    pub async fn translate(&self, group: TaxonomyGroup, code: &str) -> String {
        match self.find_by_code(code, group).await {
            Ok(Some(entry)) => entry.label.fr,
            _ => code.to_string(),
        }
    }
}
