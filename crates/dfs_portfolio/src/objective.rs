//! Tail objective builder.
//!
//! Converts the scenario matrix into a solver-agnostic objective
//! representation. Objectives are linear or linearizable so they compose
//! with the lineup solver's integer program:
//!
//! - **CVaR-upside** targets the mean of the top `q` fraction of scenario
//!   scores. The top-`k` average is convex in the score vector, so a single
//!   LP cannot maximize it; the solver linearizes it over a scenario subset
//!   that it refines between master solves (see [`crate::solver`]).
//! - **Chance** counts scenarios at or above a threshold, relaxed with
//!   per-scenario big-M indicators.
//! - **Expected payout** weights scenarios by an externally supplied payout
//!   curve; absent weights it degrades to the chance indicator.
//! - **Expected value** is the plain scenario mean, and the downgrade
//!   target when the tail is too thin.

use dfs_core::constraint::ConstraintSpec;
use dfs_core::kernel::LineupRules;
use dfs_core::lineup::{Lineup, LINEUP_SIZE};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::baseline::{baseline_pool, upper_quantile};
use crate::error::ObjectiveError;
use crate::matrix::ScoreMatrix;

/// Baseline pool size used to anchor the default chance threshold.
const BASELINE_POOL_SIZE: usize = 20;

/// Supported objective families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    CvarUpside,
    Chance,
    ExpectedPayout,
    ExpectedValue,
}

impl ObjectiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectiveKind::CvarUpside => "cvar_upside",
            ObjectiveKind::Chance => "chance",
            ObjectiveKind::ExpectedPayout => "expected_payout",
            ObjectiveKind::ExpectedValue => "expected_value",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cvar_upside" => Some(ObjectiveKind::CvarUpside),
            "chance" => Some(ObjectiveKind::Chance),
            "expected_payout" => Some(ObjectiveKind::ExpectedPayout),
            "expected_value" => Some(ObjectiveKind::ExpectedValue),
            _ => None,
        }
    }

    /// Whether the objective conditions on the upper tail.
    pub fn is_tail_objective(self) -> bool {
        matches!(self, ObjectiveKind::CvarUpside | ObjectiveKind::Chance)
    }
}

/// Objective configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveConfig {
    pub kind: ObjectiveKind,
    /// Tail fraction for CVaR-upside and the default chance threshold.
    pub tail_q: f64,
    /// Chance threshold override; the baseline-pool quantile when `None`.
    pub chance_threshold: Option<f64>,
    /// Per-scenario payout weights for `expected_payout`.
    pub payout_weights: Option<Vec<f64>>,
    /// Tail sample floor below which the objective downgrades (or errors in
    /// strict mode).
    pub min_tail_samples: usize,
    /// Fail instead of downgrading when the tail is too thin.
    pub strict: bool,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        Self {
            kind: ObjectiveKind::CvarUpside,
            tail_q: 0.01,
            chance_threshold: None,
            payout_weights: None,
            // The contest default (q = 0.01 over 2,000 scenarios) yields a
            // 20-scenario tail; the floor sits exactly there so default
            // requests run the tail objective they asked for.
            min_tail_samples: 20,
            strict: false,
        }
    }
}

/// Auxiliary structure the solver needs beyond per-driver coefficients.
#[derive(Debug, Clone, PartialEq)]
pub enum AuxTerms {
    /// Pure linear objective over driver variables.
    None,
    /// Maximize the mean over the `tail_count` best scenarios.
    Cvar { tail_count: usize },
    /// Count scenarios with lineup score `>= threshold`; `big_m[k]` bounds
    /// the indicator constraint for scenario `k`.
    Chance { threshold: f64, big_m: Vec<f64> },
}

/// Solver-agnostic objective representation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveIr {
    /// Objective actually in force (after any downgrade).
    pub kind: ObjectiveKind,
    /// Linear coefficient per driver variable. For tail objectives these
    /// are the warm-start (expected value) coefficients.
    pub driver_terms: Vec<f64>,
    pub aux: AuxTerms,
    /// Scenarios in the effective tail (`ceil(q * N)` for tail objectives,
    /// `N` otherwise).
    pub tail_effective_sample_size: usize,
    /// Set when a thin tail forced a downgrade.
    pub downgraded_from: Option<ObjectiveKind>,
    /// Per-scenario payout weights (`expected_payout` only).
    payout_weights: Option<Vec<f64>>,
}

impl ObjectiveIr {
    /// Deterministic objective value of a lineup under this objective.
    /// Solvers report this number, so re-scoring a persisted portfolio
    /// reproduces it bit-identically.
    pub fn evaluate(&self, matrix: &ScoreMatrix, lineup: &Lineup) -> f64 {
        let scores = matrix.lineup_scores(lineup);
        match &self.aux {
            AuxTerms::None => {
                let n = scores.len().max(1) as f64;
                match self.kind {
                    ObjectiveKind::ExpectedPayout => self
                        .payout_weighted(&scores),
                    _ => scores.iter().sum::<f64>() / n,
                }
            }
            AuxTerms::Cvar { tail_count } => top_k_mean(&scores, *tail_count),
            AuxTerms::Chance { threshold, .. } => {
                scores.iter().filter(|&&s| s >= *threshold).count() as f64
            }
        }
    }

    fn payout_weighted(&self, scores: &[f64]) -> f64 {
        // Weights ride along in driver_terms construction; evaluation
        // recomputes from the stored per-scenario weights.
        match &self.payout_weights {
            Some(weights) => scores.iter().zip(weights).map(|(s, w)| s * w).sum(),
            None => scores.iter().sum::<f64>() / scores.len().max(1) as f64,
        }
    }

    fn new_linear(kind: ObjectiveKind, driver_terms: Vec<f64>, n_scenarios: usize) -> Self {
        Self {
            kind,
            driver_terms,
            aux: AuxTerms::None,
            tail_effective_sample_size: n_scenarios,
            downgraded_from: None,
            payout_weights: None,
        }
    }

    /// Per-scenario payout weights when the objective carries them.
    pub fn payout_weights(&self) -> Option<&[f64]> {
        self.payout_weights.as_deref()
    }
}

/// Mean of the `k` largest values.
pub(crate) fn top_k_mean(scores: &[f64], k: usize) -> f64 {
    if scores.is_empty() || k == 0 {
        return 0.0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
    let k = k.min(sorted.len());
    sorted[..k].iter().sum::<f64>() / k as f64
}

/// Builds [`ObjectiveIr`] from a scenario matrix.
pub struct TailObjectiveBuilder<'a> {
    spec: &'a ConstraintSpec,
    matrix: &'a ScoreMatrix,
    rules: LineupRules,
    config: ObjectiveConfig,
}

impl<'a> TailObjectiveBuilder<'a> {
    pub fn new(
        spec: &'a ConstraintSpec,
        matrix: &'a ScoreMatrix,
        rules: LineupRules,
        config: ObjectiveConfig,
    ) -> Self {
        Self {
            spec,
            matrix,
            rules,
            config,
        }
    }

    pub fn build(&self) -> Result<ObjectiveIr, ObjectiveError> {
        let n = self.matrix.n_scenarios();
        if n == 0 {
            return Err(ObjectiveError::Unsupported(
                "objective requires at least one scenario".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.config.tail_q) || self.config.tail_q <= 0.0 {
            return Err(ObjectiveError::Unsupported(format!(
                "tail_q {} outside (0, 1)",
                self.config.tail_q
            )));
        }

        let means = self.matrix.driver_means();
        match self.config.kind {
            ObjectiveKind::ExpectedValue => {
                Ok(ObjectiveIr::new_linear(ObjectiveKind::ExpectedValue, means, n))
            }
            ObjectiveKind::ExpectedPayout => self.build_expected_payout(means, n),
            ObjectiveKind::CvarUpside => self.build_cvar(means, n),
            ObjectiveKind::Chance => self.build_chance(means, n),
        }
    }

    fn tail_count_or_downgrade(
        &self,
        means: &[f64],
        n: usize,
    ) -> Result<Result<usize, ObjectiveIr>, ObjectiveError> {
        let tail_count = ((self.config.tail_q * n as f64).ceil() as usize).max(1);
        if tail_count >= self.config.min_tail_samples {
            return Ok(Ok(tail_count));
        }
        let err = ObjectiveError::TailSampleTooSmall {
            effective: tail_count,
            floor: self.config.min_tail_samples,
        };
        if self.config.strict {
            return Err(err);
        }
        warn!(
            effective = tail_count,
            floor = self.config.min_tail_samples,
            "tail too thin, downgrading to expected value"
        );
        let mut ir = ObjectiveIr::new_linear(ObjectiveKind::ExpectedValue, means.to_vec(), n);
        ir.tail_effective_sample_size = tail_count;
        ir.downgraded_from = Some(self.config.kind);
        Ok(Err(ir))
    }

    fn build_cvar(&self, means: Vec<f64>, n: usize) -> Result<ObjectiveIr, ObjectiveError> {
        let tail_count = match self.tail_count_or_downgrade(&means, n)? {
            Ok(count) => count,
            Err(downgraded) => return Ok(downgraded),
        };
        Ok(ObjectiveIr {
            kind: ObjectiveKind::CvarUpside,
            driver_terms: means,
            aux: AuxTerms::Cvar { tail_count },
            tail_effective_sample_size: tail_count,
            downgraded_from: None,
            payout_weights: None,
        })
    }

    fn build_chance(&self, means: Vec<f64>, n: usize) -> Result<ObjectiveIr, ObjectiveError> {
        let tail_count = match self.tail_count_or_downgrade(&means, n)? {
            Ok(count) => count,
            Err(downgraded) => return Ok(downgraded),
        };
        let threshold = match self.config.chance_threshold {
            Some(t) => t,
            None => self.default_threshold()?,
        };
        let big_m: Vec<f64> = (0..n)
            .map(|k| (threshold - self.matrix.row_floor(k, LINEUP_SIZE)).max(0.0) + 1.0)
            .collect();
        Ok(ObjectiveIr {
            kind: ObjectiveKind::Chance,
            driver_terms: means,
            aux: AuxTerms::Chance { threshold, big_m },
            tail_effective_sample_size: tail_count,
            downgraded_from: None,
            payout_weights: None,
        })
    }

    fn build_expected_payout(
        &self,
        means: Vec<f64>,
        n: usize,
    ) -> Result<ObjectiveIr, ObjectiveError> {
        let Some(weights) = self.config.payout_weights.clone() else {
            // No payout curve supplied: degrade to the chance indicator.
            return self.build_chance(means, n);
        };
        if weights.len() != n {
            return Err(ObjectiveError::Unsupported(format!(
                "payout weights cover {} scenarios, matrix has {n}",
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ObjectiveError::Unsupported(
                "payout weights must be finite and non-negative".to_string(),
            ));
        }
        // Linear in the driver variables: sum_k w_k * S[k, i].
        let mut terms = vec![0.0; self.matrix.n_drivers()];
        for (k, weight) in weights.iter().enumerate() {
            for (term, score) in terms.iter_mut().zip(self.matrix.row(k)) {
                *term += weight * score;
            }
        }
        Ok(ObjectiveIr {
            kind: ObjectiveKind::ExpectedPayout,
            driver_terms: terms,
            aux: AuxTerms::None,
            tail_effective_sample_size: n,
            downgraded_from: None,
            payout_weights: Some(weights),
        })
    }

    /// Default chance threshold: the `q`-upper-quantile of baseline pool
    /// scores across all scenarios.
    fn default_threshold(&self) -> Result<f64, ObjectiveError> {
        let pool = baseline_pool(self.spec, self.matrix, &self.rules, BASELINE_POOL_SIZE);
        if pool.is_empty() {
            return Err(ObjectiveError::Unsupported(
                "no feasible baseline lineup to anchor the chance threshold".to_string(),
            ));
        }
        let mut samples = Vec::with_capacity(pool.len() * self.matrix.n_scenarios());
        for lineup in &pool {
            samples.extend(self.matrix.lineup_scores(lineup));
        }
        Ok(upper_quantile(&samples, self.config.tail_q))
    }
}
