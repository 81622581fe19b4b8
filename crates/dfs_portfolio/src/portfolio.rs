//! Portfolio generation: N lineups under exposure and overlap discipline.
//!
//! The generator wraps the lineup solver in an iterative loop. Each
//! iteration recomputes exposure room, adds overlap and no-good cuts
//! against everything already emitted, and solves. Recoverable
//! infeasibility walks the overlap cap up a documented ladder; hitting the
//! ceiling stops early with a partial portfolio rather than failing the
//! run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dfs_core::constraint::ConstraintSpec;
use dfs_core::kernel::{validate_lineup, KernelStats, LineupRules};
use dfs_core::lineup::{Lineup, LINEUP_SIZE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PortfolioError;
use crate::infeasibility::InfeasibilityClass;
use crate::matrix::ScoreMatrix;
use crate::objective::ObjectiveIr;
use crate::solver::{solve, LineupProblem, SolveStatus, SolverSettings};

/// Portfolio-level policy for one run.
#[derive(Debug, Clone)]
pub struct PortfolioSettings {
    pub n_lineups: u32,
    /// Max drivers shared between any two lineups.
    pub overlap_cap: u32,
    /// How far the overlap cap may relax before stopping early.
    pub overlap_ceiling: u32,
    /// Exposure cap per driver in canonical order, as a fraction of
    /// `n_lineups`.
    pub exposure_caps: Vec<f64>,
    pub rules: LineupRules,
    pub solver: SolverSettings,
}

impl PortfolioSettings {
    /// Defaults: overlap cap 4 relaxable to 6, uncapped exposure.
    pub fn new(spec: &ConstraintSpec, n_lineups: u32) -> Self {
        Self {
            n_lineups,
            overlap_cap: 4,
            overlap_ceiling: LINEUP_SIZE as u32,
            exposure_caps: vec![1.0; spec.n_drivers()],
            rules: LineupRules::from_spec(spec),
            solver: SolverSettings::default(),
        }
    }
}

/// One emitted lineup with its solve diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmittedLineup {
    pub lineup: Lineup,
    pub objective_value: f64,
    pub status: SolveStatus,
    pub gap: f64,
    pub wall_time_ms: u64,
    /// Overlap cap in force when this lineup solved.
    pub overlap_cap_used: u32,
}

/// Portfolio generation output, possibly partial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPortfolio {
    /// Lineups in emission order.
    pub lineups: Vec<EmittedLineup>,
    /// How many emitted lineups contain each driver.
    pub exposure_counts: Vec<u32>,
    /// Set when generation stopped at the relaxation ceiling
    /// (`PORTFOLIO_INCOMPLETE`), naming the binding constraint layer.
    pub incomplete: Option<InfeasibilityClass>,
    /// True when generation stopped at the cancellation flag.
    pub cancelled: bool,
}

impl GeneratedPortfolio {
    /// Final exposure fraction per driver over the emitted lineups.
    pub fn exposure_fractions(&self) -> Vec<f64> {
        let n = self.lineups.len().max(1) as f64;
        self.exposure_counts
            .iter()
            .map(|&count| count as f64 / n)
            .collect()
    }
}

/// Iterative lineup generator.
pub struct PortfolioGenerator<'a> {
    spec: &'a ConstraintSpec,
    matrix: &'a ScoreMatrix,
    ir: &'a ObjectiveIr,
    settings: PortfolioSettings,
    stats: Arc<KernelStats>,
    cancel: Arc<AtomicBool>,
}

impl<'a> PortfolioGenerator<'a> {
    pub fn new(
        spec: &'a ConstraintSpec,
        matrix: &'a ScoreMatrix,
        ir: &'a ObjectiveIr,
        settings: PortfolioSettings,
        stats: Arc<KernelStats>,
    ) -> Self {
        Self {
            spec,
            matrix,
            ir,
            settings,
            stats,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Generate up to `n_lineups` lineups.
    ///
    /// Returns `Err` only for non-recoverable solver failures and kernel
    /// rejections of emitted lineups (internal inconsistencies). Stopping
    /// early on exhausted relaxation or cancellation returns `Ok` with the
    /// partial portfolio marked accordingly.
    pub fn generate(&self) -> Result<GeneratedPortfolio, PortfolioError> {
        let n_drivers = self.spec.n_drivers();
        let n_lineups = self.settings.n_lineups;
        // Integer exposure budget per driver; a zero cap means never.
        let allowed: Vec<u32> = self
            .settings
            .exposure_caps
            .iter()
            .map(|&cap| (cap * n_lineups as f64 - 1e-9).ceil().max(0.0) as u32)
            .collect();

        let mut portfolio = GeneratedPortfolio {
            lineups: Vec::with_capacity(n_lineups as usize),
            exposure_counts: vec![0; n_drivers],
            incomplete: None,
            cancelled: false,
        };
        let mut overlap_cap = self.settings.overlap_cap;

        for lineup_index in 0..n_lineups {
            if self.cancel.load(Ordering::Relaxed) {
                portfolio.cancelled = true;
                debug!(emitted = portfolio.lineups.len(), "portfolio generation cancelled");
                return Ok(portfolio);
            }

            loop {
                let problem = self.problem_for_iteration(&portfolio, &allowed, overlap_cap);
                match solve(&problem, &self.settings.solver) {
                    Ok(outcome) => {
                        let lineup = outcome
                            .lineup
                            .ok_or_else(|| crate::error::SolverError::Internal(
                                "feasible solve returned no lineup".to_string(),
                            ))?;
                        for &i in lineup.driver_indices() {
                            portfolio.exposure_counts[i] += 1;
                        }
                        portfolio.lineups.push(EmittedLineup {
                            lineup,
                            objective_value: outcome.objective_value,
                            status: outcome.status,
                            gap: outcome.gap,
                            wall_time_ms: outcome.wall_time_ms,
                            overlap_cap_used: overlap_cap,
                        });
                        break;
                    }
                    Err(crate::error::SolverError::Infeasible(class))
                        if class.is_recoverable() =>
                    {
                        if overlap_cap < self.settings.overlap_ceiling {
                            overlap_cap += 1;
                            warn!(
                                lineup_index,
                                overlap_cap,
                                class = class.code(),
                                "relaxing overlap cap after recoverable infeasibility"
                            );
                            continue;
                        }
                        info!(
                            emitted = portfolio.lineups.len(),
                            requested = n_lineups,
                            class = class.code(),
                            "portfolio incomplete at relaxation ceiling"
                        );
                        portfolio.incomplete = Some(class);
                        self.validate_emitted(&portfolio)?;
                        return Ok(portfolio);
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        self.validate_emitted(&portfolio)?;
        Ok(portfolio)
    }

    fn problem_for_iteration(
        &self,
        portfolio: &GeneratedPortfolio,
        allowed: &[u32],
        overlap_cap: u32,
    ) -> LineupProblem<'a> {
        let mut problem =
            LineupProblem::new(self.spec, self.matrix, self.ir, self.settings.rules);
        problem.exposure_excluded = (0..self.spec.n_drivers())
            .filter(|&i| portfolio.exposure_counts[i] >= allowed[i])
            .collect();
        for emitted in &portfolio.lineups {
            let members = emitted.lineup.driver_indices().to_vec();
            if (overlap_cap as usize) < LINEUP_SIZE {
                problem.overlap_cuts.push((members.clone(), overlap_cap));
            }
            problem.no_good_cuts.push(members);
        }
        problem
    }

    /// Re-assert every emitted lineup through the kernel. The solver
    /// enforces the same constraints, so any rejection here fails the run.
    fn validate_emitted(&self, portfolio: &GeneratedPortfolio) -> Result<(), PortfolioError> {
        for (lineup_index, emitted) in portfolio.lineups.iter().enumerate() {
            let verdict = validate_lineup(self.spec, &emitted.lineup, &self.settings.rules);
            self.stats.record(&verdict);
            if !verdict.is_accept() {
                return Err(PortfolioError::LineupRejected {
                    lineup_index,
                    reasons: verdict.reasons().iter().map(|r| r.code().to_string()).collect(),
                });
            }
        }
        Ok(())
    }
}
