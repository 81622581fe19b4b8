//! Run result and diagnostics assembly.

use std::collections::BTreeMap;

use dfs_calibration::CalibrationMetrics;
use dfs_core::constraint::ConstraintSpec;
use dfs_core::kernel::KernelStatsSnapshot;
use dfs_portfolio::{GeneratedPortfolio, ObjectiveIr, SolveStatus};
use serde::{Deserialize, Serialize};

use crate::state::RunState;

/// Per-lineup solver statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverStat {
    pub status: SolveStatus,
    pub gap: f64,
    pub time_ms: u64,
}

/// Diagnostics bundle attached to every result, complete or partial.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Scenario attempts, including kernel-rejected ones.
    pub n_scenarios_generated: u64,
    pub n_scenarios_accepted: u64,
    pub rejection_rate: f64,
    /// Most frequent kernel rejection reasons, at most five.
    pub top_veto_reasons: Vec<(String, u64)>,
    pub tail_effective_sample_size: usize,
    /// Objective that was asked for when a thin tail forced expected value.
    pub objective_downgraded_from: Option<String>,
    /// Marginal calibration per archetype; offline path only.
    pub calibration: Option<BTreeMap<String, CalibrationMetrics>>,
    /// Final exposure fraction per driver id.
    pub exposure_trajectory: BTreeMap<String, f64>,
    /// Per-lineup solver statistics in emission order.
    pub solver_stats: Vec<SolverStat>,
    pub kernel: KernelStatsSnapshot,
}

/// One lineup in the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupResult {
    pub driver_ids: Vec<String>,
    pub total_salary: u32,
    pub objective_value: f64,
}

/// The full run response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioResult {
    pub run_id: String,
    pub spec_hash: String,
    pub status: RunState,
    pub portfolio: Vec<LineupResult>,
    /// True when the portfolio is shorter than requested (cancellation,
    /// timeout, or an exhausted relaxation ladder).
    pub partial: bool,
    pub diagnostics: Diagnostics,
    pub failure_reason: Option<String>,
}

impl Diagnostics {
    /// Fold scenario-stage numbers into the bundle.
    pub fn record_scenarios(&mut self, accepted: u64, rejected: u64) {
        self.n_scenarios_accepted = accepted;
        self.n_scenarios_generated = accepted + rejected;
        self.rejection_rate = if self.n_scenarios_generated > 0 {
            rejected as f64 / self.n_scenarios_generated as f64
        } else {
            0.0
        };
    }

    /// Fold objective-stage numbers into the bundle.
    pub fn record_objective(&mut self, ir: &ObjectiveIr) {
        self.tail_effective_sample_size = ir.tail_effective_sample_size;
        self.objective_downgraded_from = ir.downgraded_from.map(|k| k.as_str().to_string());
    }

    /// Fold portfolio-stage numbers into the bundle.
    pub fn record_portfolio(&mut self, spec: &ConstraintSpec, portfolio: &GeneratedPortfolio) {
        self.solver_stats = portfolio
            .lineups
            .iter()
            .map(|emitted| SolverStat {
                status: emitted.status,
                gap: emitted.gap,
                time_ms: emitted.wall_time_ms,
            })
            .collect();
        let fractions = portfolio.exposure_fractions();
        self.exposure_trajectory = spec
            .drivers()
            .iter()
            .zip(fractions)
            .map(|(driver, fraction)| (driver.driver_id.clone(), fraction))
            .collect();
    }

    /// Fold the kernel snapshot in, keeping the five loudest reasons.
    pub fn record_kernel(&mut self, snapshot: KernelStatsSnapshot) {
        self.top_veto_reasons = snapshot.top_reasons(5);
        self.kernel = snapshot;
    }
}

/// Map an emitted portfolio into response lineups.
pub fn portfolio_to_results(
    spec: &ConstraintSpec,
    portfolio: &GeneratedPortfolio,
) -> Vec<LineupResult> {
    portfolio
        .lineups
        .iter()
        .map(|emitted| LineupResult {
            driver_ids: emitted
                .lineup
                .driver_ids(spec)
                .into_iter()
                .map(str::to_string)
                .collect(),
            total_salary: emitted.lineup.total_salary(spec),
            objective_value: emitted.objective_value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_accounting_computes_the_rate() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.record_scenarios(1960, 40);
        assert_eq!(diagnostics.n_scenarios_generated, 2000);
        assert!((diagnostics.rejection_rate - 0.02).abs() < 1e-12);
    }

    #[test]
    fn result_serializes_to_stable_json() {
        let result = PortfolioResult {
            run_id: "run-1".to_string(),
            spec_hash: "abc".to_string(),
            status: RunState::Completed,
            portfolio: vec![LineupResult {
                driver_ids: vec!["driver_01".to_string()],
                total_salary: 9_000,
                objective_value: 123.5,
            }],
            partial: false,
            diagnostics: Diagnostics::default(),
            failure_reason: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"status\":\"completed\""));
        let back: PortfolioResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.portfolio[0].total_salary, 9_000);
    }
}
