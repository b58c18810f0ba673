// ==========================================
// NEXO work-planning - taxonomy entries
// ==========================================
// Taxonomies are reference data administered outside this system.
// `properties` is free-form JSON; the accessors below expose the
// keys the import pipeline relies on:
// - nexoMatches:    [{code, description}]  external-code mapping table
// - workTypes:      [workTypeCode]         allowed work types (assetType)
// - programs:       [{year, programId}]    year-indexed book -> program
// - consultationOnly, ownerId, ...          domain-specific extras
// ==========================================

use serde::{Deserialize, Serialize};

/// Bilingual display label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Localized {
    pub fr: String,
    pub en: String,
}

/// One taxonomy entry inside a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub code: String,
    pub label: Localized,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// One row of a `nexoMatches` property.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NexoMatch {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

impl TaxonomyEntry {
    pub fn new(code: &str, label_fr: &str) -> Self {
        TaxonomyEntry {
            code: code.to_string(),
            label: Localized {
                fr: label_fr.to_string(),
                en: label_fr.to_string(),
            },
            properties: serde_json::Value::Null,
        }
    }

    /// External NEXO codes this entry answers to.
    pub fn nexo_matches(&self) -> Vec<NexoMatch> {
        self.properties
            .get("nexoMatches")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn matches_nexo_code(&self, code: &str) -> bool {
        self.nexo_matches()
            .iter()
            .any(|m| m.code.eq_ignore_ascii_case(code))
    }

    /// Work-type codes permitted for this asset type.
    pub fn allowed_work_types(&self) -> Vec<String> {
        self.properties
            .get("workTypes")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Program declared for `year` in a book (carnet) entry.
    pub fn program_for_year(&self, year: i32) -> Option<String> {
        let programs = self.properties.get("programs")?.as_array()?;
        programs.iter().find_map(|p| {
            let declared = p.get("year")?.as_i64()? as i32;
            if declared == year {
                p.get("programId")?.as_str().map(str::to_string)
            } else {
                None
            }
        })
    }

    /// Owner organisation for assets of this type, when declared.
    pub fn owner_id(&self) -> Option<String> {
        self.properties
            .get("ownerId")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry_with(properties: serde_json::Value) -> TaxonomyEntry {
        let mut entry = TaxonomyEntry::new("aqueductSegment", "Segment d'aqueduc");
        entry.properties = properties;
        entry
    }

    #[test]
    fn test_nexo_match_is_case_insensitive() {
        let entry = entry_with(json!({
            "nexoMatches": [{"code": "AQ-01", "description": "Conduite"}]
        }));
        assert!(entry.matches_nexo_code("aq-01"));
        assert!(!entry.matches_nexo_code("eg-01"));
    }

    #[test]
    fn test_program_for_year() {
        let entry = entry_with(json!({
            "programs": [
                {"year": 2024, "programId": "pcpr"},
                {"year": 2025, "programId": "prcpr"}
            ]
        }));
        assert_eq!(entry.program_for_year(2025).as_deref(), Some("prcpr"));
        assert_eq!(entry.program_for_year(2023), None);
    }

    #[test]
    fn test_missing_properties_yield_defaults() {
        let entry = TaxonomyEntry::new("x", "X");
        assert!(entry.nexo_matches().is_empty());
        assert!(entry.allowed_work_types().is_empty());
        assert_eq!(entry.owner_id(), None);
    }
}
