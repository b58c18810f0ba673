// ==========================================
// NEXO work-planning - annual distribution value type
// ==========================================
// Year-by-year budget/length breakdown owned by interventions and
// projects. The summary is always derived from the periods, never
// stored as independent ground truth.
// ==========================================

use serde::{Deserialize, Serialize};

/// One year of the distribution. Invariant: `year == start_year + rank`
/// for the owning entity's start year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualPeriod {
    pub year: i32,
    pub rank: usize,
    /// Allowance in thousands of dollars (k$).
    pub annual_allowance: f64,
    /// Physical length in metres.
    pub annual_length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

/// Derived totals plus a free-form note (replanning audit trail).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSummary {
    pub total_allowance: f64,
    pub total_length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualDistribution {
    pub annual_periods: Vec<AnnualPeriod>,
    pub distribution_summary: DistributionSummary,
}

impl AnnualDistribution {
    /// Recomputes the summary from the periods, preserving the note.
    /// Called after every mutation of `annual_periods`.
    pub fn refresh_summary(&mut self) {
        self.distribution_summary.total_allowance = self
            .annual_periods
            .iter()
            .map(|p| p.annual_allowance)
            .sum();
        self.distribution_summary.total_length =
            self.annual_periods.iter().map(|p| p.annual_length).sum();
    }

    pub fn period_for_year_mut(&mut self, year: i32) -> Option<&mut AnnualPeriod> {
        self.annual_periods.iter_mut().find(|p| p.year == year)
    }

    pub fn start_year(&self) -> Option<i32> {
        self.annual_periods.first().map(|p| p.year)
    }

    pub fn end_year(&self) -> Option<i32> {
        self.annual_periods.last().map(|p| p.year)
    }
}
