// ==========================================
// NEXO work-planning - budget file validators
// ==========================================
// InterventionsBudgetSE rows are validated per dossier group against
// the single matched intervention: one match exactly, no duplicate
// year, total not above the estimate, every year inside the
// planning window.
// ==========================================

use crate::domain::import_log::FileError;
use crate::domain::intervention::Intervention;
use crate::domain::types::{ErrorCode, ErrorTarget};
use crate::importer::rows::BudgetSeRow;
use std::collections::{BTreeMap, HashMap};

/// Budget cells are exported in dollars; estimates are kept in k$.
pub fn dollars_to_thousands(amount: f64) -> f64 {
    amount / 1000.0
}

/// Runs all budget-group checks, mutating row error lists in place.
/// Returns the dossier -> matched intervention map for groups that
/// found exactly one intervention.
pub fn validate_budget_rows(
    rows: &mut [BudgetSeRow],
    interventions_by_dossier: &HashMap<String, Vec<Intervention>>,
) -> HashMap<String, Intervention> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if row.is_valid() {
            groups
                .entry(row.fields.no_dossier_se.clone())
                .or_default()
                .push(idx);
        }
    }

    let mut matched: HashMap<String, Intervention> = HashMap::new();
    for (dossier, indexes) in groups {
        let candidates = interventions_by_dossier
            .get(&dossier)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let intervention = match candidates {
            [] => {
                for &idx in &indexes {
                    let line = rows[idx].line_number;
                    rows[idx].add_error(
                        FileError::new(ErrorCode::NotFound, ErrorTarget::NoDossierSe, line)
                            .with_value("value1", dossier.clone()),
                    );
                }
                continue;
            }
            [one] => one.clone(),
            _ => {
                for &idx in &indexes {
                    let line = rows[idx].line_number;
                    rows[idx].add_error(
                        FileError::new(ErrorCode::Invalid, ErrorTarget::NoDossierSe, line)
                            .with_value("value1", dossier.clone()),
                    );
                }
                continue;
            }
        };

        // Duplicate year within the dossier group.
        let mut year_counts: BTreeMap<i32, usize> = BTreeMap::new();
        for &idx in &indexes {
            *year_counts
                .entry(rows[idx].fields.annee_prev_travaux)
                .or_default() += 1;
        }
        for &idx in &indexes {
            let year = rows[idx].fields.annee_prev_travaux;
            if year_counts.get(&year).copied().unwrap_or(0) > 1 {
                let line = rows[idx].line_number;
                rows[idx].add_error(
                    FileError::new(ErrorCode::Duplicate, ErrorTarget::AnneePrevTravaux, line)
                        .with_value("value1", dossier.clone())
                        .with_value("value2", year.to_string()),
                );
            }
        }

        // Total incoming allowance must fit inside the estimate.
        let total_k: f64 = indexes
            .iter()
            .map(|&idx| dollars_to_thousands(rows[idx].fields.prev_travaux))
            .sum();
        if total_k > intervention.estimate.allowance {
            for &idx in &indexes {
                let line = rows[idx].line_number;
                rows[idx].add_error(
                    FileError::new(ErrorCode::Invalid, ErrorTarget::PrevTravaux, line)
                        .with_value("value1", total_k.to_string())
                        .with_value("value2", intervention.estimate.allowance.to_string()),
                );
            }
        }

        // Every year inside [planificationYear, endYear].
        let window = intervention.planification_year..=intervention.end_year;
        for &idx in &indexes {
            let year = rows[idx].fields.annee_prev_travaux;
            if !window.contains(&year) {
                let line = rows[idx].line_number;
                rows[idx].add_error(
                    FileError::new(ErrorCode::Invalid, ErrorTarget::AnneePrevTravaux, line)
                        .with_value("value1", year.to_string())
                        .with_value(
                            "value2",
                            format!(
                                "{}-{}",
                                intervention.planification_year, intervention.end_year
                            ),
                        ),
                );
            }
        }

        matched.insert(dossier, intervention);
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::intervention_fixture;
    use crate::importer::file_parser::parse_sheet;
    use crate::importer::rows::budget_se_rows;

    fn budget_rows(data_rows: &[&str]) -> Vec<BudgetSeRow> {
        let csv = format!(
            "NoDossierSE,AnneePrevTravaux,PrevTravaux\n{}\n",
            data_rows.join("\n")
        );
        budget_se_rows(&parse_sheet(csv.as_bytes()).unwrap())
    }

    fn one_match(dossier: &str) -> HashMap<String, Vec<Intervention>> {
        let mut intervention = intervention_fixture(dossier);
        intervention.estimate.allowance = 10.0;
        intervention.planification_year = 2025;
        intervention.end_year = 2026;
        HashMap::from([(dossier.to_string(), vec![intervention])])
    }

    #[test]
    fn test_no_matching_intervention() {
        let mut rows = budget_rows(&["D-9,2025,1000"]);
        validate_budget_rows(&mut rows, &HashMap::new());
        assert!(rows[0]
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::NotFound && e.target == ErrorTarget::NoDossierSe));
    }

    #[test]
    fn test_too_many_matches() {
        let mut rows = budget_rows(&["D-1,2025,1000"]);
        let existing = HashMap::from([(
            "D-1".to_string(),
            vec![intervention_fixture("D-1"), intervention_fixture("D-1")],
        )]);
        validate_budget_rows(&mut rows, &existing);
        assert!(rows[0]
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::Invalid && e.target == ErrorTarget::NoDossierSe));
    }

    #[test]
    fn test_duplicate_year() {
        let mut rows = budget_rows(&["D-1,2025,1000", "D-1,2025,2000"]);
        validate_budget_rows(&mut rows, &one_match("D-1"));
        for row in &rows {
            assert!(row
                .errors()
                .iter()
                .any(|e| e.code == ErrorCode::Duplicate
                    && e.target == ErrorTarget::AnneePrevTravaux));
        }
    }

    #[test]
    fn test_excessive_budget_after_conversion() {
        // 20000 $ = 20 k$ against a 10 k$ estimate.
        let mut rows = budget_rows(&["D-1,2025,20000"]);
        validate_budget_rows(&mut rows, &one_match("D-1"));
        let error = rows[0]
            .errors()
            .iter()
            .find(|e| e.code == ErrorCode::Invalid && e.target == ErrorTarget::PrevTravaux)
            .unwrap();
        assert_eq!(error.values.get("value1").map(String::as_str), Some("20"));
        assert_eq!(error.values.get("value2").map(String::as_str), Some("10"));
    }

    #[test]
    fn test_budget_within_estimate_passes() {
        let mut rows = budget_rows(&["D-1,2025,4000", "D-1,2026,5000"]);
        let matched = validate_budget_rows(&mut rows, &one_match("D-1"));
        assert!(rows.iter().all(|r| r.is_valid()));
        assert!(matched.contains_key("D-1"));
    }

    #[test]
    fn test_year_outside_planning_window() {
        let mut rows = budget_rows(&["D-1,2030,1000"]);
        validate_budget_rows(&mut rows, &one_match("D-1"));
        assert!(rows[0]
            .errors()
            .iter()
            .any(|e| e.code == ErrorCode::Invalid && e.target == ErrorTarget::AnneePrevTravaux));
    }
}
