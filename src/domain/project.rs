// ==========================================
// NEXO work-planning - project entity
// ==========================================
// Aggregation of interventions sharing a dossier number. Start/end
// years, geometry and annual distribution are always derived from
// the member interventions, never patched incrementally.
// ==========================================

use crate::domain::annual_distribution::AnnualDistribution;
use crate::domain::geometry::Geometry;
use crate::domain::intervention::{external_reference_value, ExternalReferenceId, ExternalReferenceType};
use crate::domain::types::{ProjectCategory, ProjectStatus};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub category: ProjectCategory,
    pub status: ProjectStatus,
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub annual_distribution: AnnualDistribution,
    #[serde(default)]
    pub intervention_ids: Vec<String>,
    /// Intervention ids bucketed by their planification year,
    /// recomputed from scratch on every membership change.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interventions_by_year: Vec<YearBucket>,
    /// Program-book linkage; its presence restricts what an import
    /// may change on an integrated project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_book_id: Option<String>,
    #[serde(default)]
    pub external_reference_ids: Vec<ExternalReferenceId>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearBucket {
    pub year: i32,
    pub intervention_ids: Vec<String>,
}

impl Project {
    pub fn nexo_dossier(&self) -> Option<&str> {
        external_reference_value(
            &self.external_reference_ids,
            ExternalReferenceType::NexoReferenceNumber,
        )
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().naive_utc();
    }
}
