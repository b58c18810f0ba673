// ==========================================
// NEXO work-planning - intervention entity
// ==========================================
// One unit of planned infrastructure work, reconciled against NEXO
// rows through its external reference ids (dossier + asset number).
// ==========================================

use crate::domain::annual_distribution::AnnualDistribution;
use crate::domain::geometry::Geometry;
use crate::domain::types::{InterventionStatus, ModificationType};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// External references
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExternalReferenceType {
    NexoReferenceNumber,
    NexoAssetId,
}

/// Link to the partner system. The dossier number reference is the
/// reconciliation key between NEXO rows and persisted interventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalReferenceId {
    #[serde(rename = "type")]
    pub reference_type: ExternalReferenceType,
    pub value: String,
}

impl ExternalReferenceId {
    pub fn dossier(value: &str) -> Self {
        ExternalReferenceId {
            reference_type: ExternalReferenceType::NexoReferenceNumber,
            value: value.to_string(),
        }
    }

    pub fn asset(value: &str) -> Self {
        ExternalReferenceId {
            reference_type: ExternalReferenceType::NexoAssetId,
            value: value.to_string(),
        }
    }
}

/// Finds the value of a given reference type in a list.
pub fn external_reference_value(
    references: &[ExternalReferenceId],
    reference_type: ExternalReferenceType,
) -> Option<&str> {
    references
        .iter()
        .find(|r| r.reference_type == reference_type)
        .map(|r| r.value.as_str())
}

// ==========================================
// Assets
// ==========================================

/// A physical asset (water main, sewer segment, roadway) touched by
/// an intervention. Matched across re-imports by its NexoAssetId.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_m: Option<f64>,
    #[serde(default)]
    pub external_reference_ids: Vec<ExternalReferenceId>,
}

impl Asset {
    pub fn nexo_asset_id(&self) -> Option<&str> {
        external_reference_value(
            &self.external_reference_ids,
            ExternalReferenceType::NexoAssetId,
        )
    }
}

// ==========================================
// Supporting value types
// ==========================================

/// Budget estimate in thousands of dollars plus total length in metres.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub allowance: f64,
    pub length: f64,
}

/// Street triple used for naming and duplicate detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreetLocation {
    pub street_name: String,
    pub street_from: String,
    pub street_to: String,
}

/// Rehabilitation design data carried by the conception files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_asset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downstream_asset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Per-field changed-or-not map produced by comparing an incoming
/// intervention against its persisted counterpart.
pub type ModificationSummary = BTreeMap<String, bool>;

/// Names of the fields tracked by the modification summary.
pub mod summary_fields {
    pub const REQUESTOR: &str = "requestor";
    pub const WORK_TYPE: &str = "workType";
    pub const PROGRAM: &str = "program";
    pub const START_YEAR: &str = "startYear";
    pub const END_YEAR: &str = "endYear";
    pub const BOROUGH: &str = "borough";
    pub const EXECUTOR: &str = "executor";
    pub const ASSET_ADDED: &str = "assetAdded";
    pub const ASSET_REMOVED: &str = "assetRemoved";
}

// ==========================================
// Intervention
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intervention {
    pub id: String,
    pub name: String,
    pub status: InterventionStatus,
    pub asset_type_id: String,
    pub work_type_id: String,
    pub requestor_id: String,
    pub executor_id: String,
    pub borough_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    pub planification_year: i32,
    pub end_year: i32,
    pub estimate: Estimate,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub annual_distribution: AnnualDistribution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub external_reference_ids: Vec<ExternalReferenceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_revision_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub streets: StreetLocation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_data: Option<DesignData>,

    // NEXO-flavored fields, only meaningful during/after an import run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_status_carnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_phase: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub modification_summary: ModificationSummary,
    #[serde(default)]
    pub decision_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_type: Option<ModificationType>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Intervention {
    pub fn nexo_dossier(&self) -> Option<&str> {
        external_reference_value(
            &self.external_reference_ids,
            ExternalReferenceType::NexoReferenceNumber,
        )
    }

    /// True when `nexo_asset_id` is carried by one of the owned assets.
    pub fn has_asset_with_nexo_id(&self, nexo_asset_id: &str) -> bool {
        self.assets
            .iter()
            .any(|a| a.nexo_asset_id() == Some(nexo_asset_id))
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().naive_utc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_reference_lookup() {
        let refs = vec![
            ExternalReferenceId::dossier("D-0042"),
            ExternalReferenceId::asset("A-7"),
        ];
        assert_eq!(
            external_reference_value(&refs, ExternalReferenceType::NexoReferenceNumber),
            Some("D-0042")
        );
        assert_eq!(
            external_reference_value(&refs, ExternalReferenceType::NexoAssetId),
            Some("A-7")
        );
    }
}
