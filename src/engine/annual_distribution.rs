// ==========================================
// NEXO work-planning - annual distribution engine
// ==========================================
// Recomputes per-year budget and length allocations when an entity's
// date range or estimate changes. Two invariants hold after every
// call: year == start_year + rank for all periods, and the summary
// totals equal the sum over periods.
// ==========================================

use crate::domain::annual_distribution::{AnnualDistribution, AnnualPeriod};
use crate::i18n;

/// Builds one period per year in `[start_year, end_year]`. A single-
/// year window receives the full allowance/length; longer windows
/// start at zero, to be filled by budget-file rows later. Account ids
/// already assigned per year are preserved across regeneration.
pub fn generate_default_annual_distribution(
    start_year: i32,
    end_year: i32,
    total_allowance: f64,
    total_length: f64,
    previous: Option<&AnnualDistribution>,
) -> AnnualDistribution {
    let single_year = start_year == end_year;
    let mut distribution = AnnualDistribution::default();
    if let Some(previous) = previous {
        distribution.distribution_summary.note = previous.distribution_summary.note.clone();
    }

    for (rank, year) in (start_year..=end_year).enumerate() {
        let account_id = previous.and_then(|p| {
            p.annual_periods
                .iter()
                .find(|period| period.year == year)
                .and_then(|period| period.account_id.clone())
        });
        distribution.annual_periods.push(AnnualPeriod {
            year,
            rank,
            annual_allowance: if single_year { total_allowance } else { 0.0 },
            annual_length: if single_year { total_length } else { 0.0 },
            account_id,
        });
    }
    distribution.refresh_summary();
    distribution
}

/// Propagates a duration change onto an existing distribution.
/// Equal duration re-stamps years only; growth appends zero-filled
/// periods; shrinking folds the cut-off periods into the last
/// retained one. Returns an audit note when folded periods carried
/// account ids that are dropped by the replanning.
pub fn update_annual_periods(
    distribution: &mut AnnualDistribution,
    new_start_year: i32,
    new_end_year: i32,
) -> Option<String> {
    let new_len = (new_end_year - new_start_year + 1).max(1) as usize;
    distribution.annual_periods.sort_by_key(|p| p.rank);

    while distribution.annual_periods.len() < new_len {
        let rank = distribution.annual_periods.len();
        distribution.annual_periods.push(AnnualPeriod {
            year: 0,
            rank,
            annual_allowance: 0.0,
            annual_length: 0.0,
            account_id: None,
        });
    }

    let mut note = None;
    if distribution.annual_periods.len() > new_len {
        let folded: Vec<AnnualPeriod> = distribution.annual_periods.split_off(new_len);
        let mut orphaned: Vec<String> = Vec::new();
        if let Some(retained) = distribution.annual_periods.last_mut() {
            for period in folded {
                retained.annual_allowance += period.annual_allowance;
                retained.annual_length += period.annual_length;
                if let Some(account_id) = period.account_id {
                    if retained.account_id.as_deref() != Some(account_id.as_str()) {
                        orphaned.push(account_id);
                    }
                }
            }
        }
        if !orphaned.is_empty() {
            note = Some(i18n::t_with_args(
                "import.replanning_accounts_dropped",
                &[("value1", orphaned.join(", "))],
            ));
        }
    }

    for (rank, period) in distribution.annual_periods.iter_mut().enumerate() {
        period.rank = rank;
        period.year = new_start_year + rank as i32;
    }
    distribution.refresh_summary();
    note
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distribution_with(allowances: &[f64], start_year: i32) -> AnnualDistribution {
        let mut distribution = AnnualDistribution::default();
        for (rank, allowance) in allowances.iter().enumerate() {
            distribution.annual_periods.push(AnnualPeriod {
                year: start_year + rank as i32,
                rank,
                annual_allowance: *allowance,
                annual_length: 0.0,
                account_id: None,
            });
        }
        distribution.refresh_summary();
        distribution
    }

    #[test]
    fn test_single_year_receives_full_amount() {
        let d = generate_default_annual_distribution(2025, 2025, 120.0, 300.0, None);
        assert_eq!(d.annual_periods.len(), 1);
        assert_eq!(d.annual_periods[0].annual_allowance, 120.0);
        assert_eq!(d.distribution_summary.total_allowance, 120.0);
    }

    #[test]
    fn test_multi_year_starts_at_zero() {
        let d = generate_default_annual_distribution(2025, 2027, 120.0, 300.0, None);
        assert_eq!(d.annual_periods.len(), 3);
        assert!(d.annual_periods.iter().all(|p| p.annual_allowance == 0.0));
        assert_eq!(d.distribution_summary.total_allowance, 0.0);
    }

    #[test]
    fn test_regeneration_preserves_account_ids() {
        let mut previous = distribution_with(&[5.0, 10.0], 2025);
        previous.annual_periods[1].account_id = Some("C-1".to_string());
        let d = generate_default_annual_distribution(2025, 2027, 0.0, 0.0, Some(&previous));
        assert_eq!(d.annual_periods[1].account_id.as_deref(), Some("C-1"));
        assert_eq!(d.annual_periods[0].account_id, None);
    }

    #[test]
    fn test_equal_duration_restamps_years() {
        let mut d = distribution_with(&[5.0, 10.0], 2025);
        update_annual_periods(&mut d, 2026, 2027);
        assert_eq!(d.annual_periods[0].year, 2026);
        assert_eq!(d.annual_periods[1].year, 2027);
        assert_eq!(d.distribution_summary.total_allowance, 15.0);
    }

    #[test]
    fn test_growth_appends_zero_periods() {
        let mut d = distribution_with(&[5.0], 2025);
        update_annual_periods(&mut d, 2025, 2027);
        assert_eq!(d.annual_periods.len(), 3);
        assert_eq!(d.annual_periods[2].annual_allowance, 0.0);
        for period in &d.annual_periods {
            assert_eq!(period.year, 2025 + period.rank as i32);
        }
    }

    #[test]
    fn test_shrink_conserves_total_allowance() {
        let mut d = distribution_with(&[5.0, 10.0, 20.0, 40.0], 2025);
        let before = d.distribution_summary.total_allowance;
        update_annual_periods(&mut d, 2025, 2026);
        assert_eq!(d.annual_periods.len(), 2);
        assert_eq!(d.distribution_summary.total_allowance, before);
        assert_eq!(d.annual_periods[1].annual_allowance, 70.0);
    }

    #[test]
    fn test_shrink_notes_orphaned_accounts() {
        let mut d = distribution_with(&[5.0, 10.0, 20.0], 2025);
        d.annual_periods[2].account_id = Some("C-9".to_string());
        let note = update_annual_periods(&mut d, 2025, 2026);
        assert!(note.unwrap().contains("C-9"));
    }

    #[test]
    fn test_rank_invariant_after_any_update() {
        let mut d = distribution_with(&[5.0, 10.0, 20.0], 2025);
        update_annual_periods(&mut d, 2030, 2031);
        for period in &d.annual_periods {
            assert_eq!(period.year, 2030 + period.rank as i32);
        }
    }
}
