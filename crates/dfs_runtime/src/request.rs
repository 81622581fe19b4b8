//! Run submission requests and their validation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use dfs_portfolio::ObjectiveKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Contest ceiling; requests may lower the cap but never raise it.
const CONTEST_SALARY_CAP: u32 = 50_000;

/// Minimum scenario count for any run.
const MIN_SCENARIOS: u64 = 2_000;

/// Structured, transport-agnostic run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub slate_id: String,
    #[serde(default = "default_objective")]
    pub objective: ObjectiveKind,
    /// Tail fraction in `(0, 1)`.
    #[serde(default = "default_tail_q")]
    pub tail_q: f64,
    #[serde(default = "default_n_scenarios")]
    pub n_scenarios: u64,
    #[serde(default = "default_n_lineups")]
    pub n_lineups: u32,
    #[serde(default = "default_salary_cap")]
    pub salary_cap: u32,
    /// Per-team lineup cap; the spec default when absent.
    #[serde(default)]
    pub team_cap: Option<u32>,
    /// Exposure caps by driver id; uncapped drivers default to 1.0.
    #[serde(default)]
    pub exposure: BTreeMap<String, f64>,
    #[serde(default = "default_overlap_cap")]
    pub overlap_cap: u32,
    /// Run seed; `RNG_SEED_DEFAULT` applies when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Fail instead of downgrading when the tail is too thin.
    #[serde(default)]
    pub strict: bool,
    /// Persist `scenarios.bin` for reproducibility audits.
    #[serde(default)]
    pub persist_scenarios: bool,
    /// Optional pre-race telemetry artifact (parquet).
    #[serde(default)]
    pub telemetry_path: Option<PathBuf>,
    /// Optional observed results CSV; enables calibration diagnostics on
    /// the offline path.
    #[serde(default)]
    pub observed_results_path: Option<PathBuf>,
    /// Externally supplied payout weights for `expected_payout`.
    #[serde(default)]
    pub payout_weights: Option<Vec<f64>>,
    /// Chance threshold override.
    #[serde(default)]
    pub chance_threshold: Option<f64>,
}

fn default_objective() -> ObjectiveKind {
    ObjectiveKind::CvarUpside
}

fn default_tail_q() -> f64 {
    0.01
}

fn default_n_scenarios() -> u64 {
    MIN_SCENARIOS
}

fn default_n_lineups() -> u32 {
    20
}

fn default_salary_cap() -> u32 {
    CONTEST_SALARY_CAP
}

fn default_overlap_cap() -> u32 {
    4
}

impl RunRequest {
    /// A request with contest defaults for a slate.
    pub fn new(slate_id: &str) -> Self {
        Self {
            slate_id: slate_id.to_string(),
            objective: default_objective(),
            tail_q: default_tail_q(),
            n_scenarios: default_n_scenarios(),
            n_lineups: default_n_lineups(),
            salary_cap: default_salary_cap(),
            team_cap: None,
            exposure: BTreeMap::new(),
            overlap_cap: default_overlap_cap(),
            random_seed: None,
            strict: false,
            persist_scenarios: false,
            telemetry_path: None,
            observed_results_path: None,
            payout_weights: None,
            chance_threshold: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn with_objective(mut self, objective: ObjectiveKind) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_scenarios(mut self, n_scenarios: u64) -> Self {
        self.n_scenarios = n_scenarios;
        self
    }

    pub fn with_lineups(mut self, n_lineups: u32) -> Self {
        self.n_lineups = n_lineups;
        self
    }

    pub fn with_exposure(mut self, driver_id: &str, cap: f64) -> Self {
        self.exposure.insert(driver_id.to_string(), cap);
        self
    }

    /// Schema-level validation. Slate existence and exposure keys are
    /// checked against the compiled spec at submission.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.slate_id.trim().is_empty() {
            return Err(RequestError::InvalidSchema("slate_id is empty".to_string()));
        }
        if !(self.tail_q > 0.0 && self.tail_q < 1.0) {
            return Err(RequestError::InvalidParameterRange(format!(
                "tail_q {} outside (0, 1)",
                self.tail_q
            )));
        }
        if self.n_scenarios < MIN_SCENARIOS {
            return Err(RequestError::InvalidParameterRange(format!(
                "n_scenarios {} below the minimum {MIN_SCENARIOS}",
                self.n_scenarios
            )));
        }
        if self.n_scenarios % 10 != 0 {
            return Err(RequestError::InvalidParameterRange(format!(
                "n_scenarios {} must be divisible by 10",
                self.n_scenarios
            )));
        }
        if !(1..=1000).contains(&self.n_lineups) {
            return Err(RequestError::InvalidParameterRange(format!(
                "n_lineups {} outside [1, 1000]",
                self.n_lineups
            )));
        }
        if self.salary_cap == 0 || self.salary_cap > CONTEST_SALARY_CAP {
            return Err(RequestError::InvalidParameterRange(format!(
                "salary_cap {} outside contest rules (0, {CONTEST_SALARY_CAP}]",
                self.salary_cap
            )));
        }
        if let Some(team_cap) = self.team_cap {
            if !(1..=6).contains(&team_cap) {
                return Err(RequestError::InvalidParameterRange(format!(
                    "team_cap {team_cap} outside [1, 6]"
                )));
            }
        }
        if !(1..=6).contains(&self.overlap_cap) {
            return Err(RequestError::InvalidParameterRange(format!(
                "overlap_cap {} outside [1, 6]",
                self.overlap_cap
            )));
        }
        for (driver_id, cap) in &self.exposure {
            if !(0.0..=1.0).contains(cap) || cap.is_nan() {
                return Err(RequestError::InvalidParameterRange(format!(
                    "exposure[{driver_id}] = {cap} outside [0, 1]"
                )));
            }
        }
        if let Some(weights) = &self.payout_weights {
            if weights.len() as u64 != self.n_scenarios {
                return Err(RequestError::InvalidParameterRange(format!(
                    "payout_weights holds {} entries for {} scenarios",
                    weights.len(),
                    self.n_scenarios
                )));
            }
        }
        Ok(())
    }
}

/// Input errors surfaced immediately by `submit_run`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("INVALID_REQUEST_SCHEMA: {0}")]
    InvalidSchema(String),

    #[error("UNKNOWN_SLATE: {0}")]
    UnknownSlate(String),

    #[error("INVALID_PARAMETER_RANGE: {0}")]
    InvalidParameterRange(String),
}

impl RequestError {
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::InvalidSchema(_) => "INVALID_REQUEST_SCHEMA",
            RequestError::UnknownSlate(_) => "UNKNOWN_SLATE",
            RequestError::InvalidParameterRange(_) => "INVALID_PARAMETER_RANGE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RunRequest::new("daytona-500").validate().is_ok());
    }

    #[test]
    fn scenario_count_rules_are_enforced() {
        let mut request = RunRequest::new("daytona-500");
        request.n_scenarios = 1000;
        assert_eq!(
            request.validate().unwrap_err().code(),
            "INVALID_PARAMETER_RANGE"
        );
        request.n_scenarios = 2005;
        assert!(request.validate().is_err());
        request.n_scenarios = 2000;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn salary_cap_cannot_exceed_contest_rules() {
        let mut request = RunRequest::new("daytona-500");
        request.salary_cap = 60_000;
        assert!(request.validate().is_err());
        request.salary_cap = 45_000;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn exposure_fractions_are_bounded() {
        let request = RunRequest::new("daytona-500").with_exposure("driver_01", 1.5);
        assert!(request.validate().is_err());
        let request = RunRequest::new("daytona-500").with_exposure("driver_01", 0.0);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn json_round_trip_fills_defaults() {
        let parsed: RunRequest =
            serde_json::from_str(r#"{"slate_id": "daytona-500", "random_seed": 42}"#).unwrap();
        assert_eq!(parsed.objective, ObjectiveKind::CvarUpside);
        assert_eq!(parsed.n_scenarios, 2000);
        assert_eq!(parsed.overlap_cap, 4);
        assert_eq!(parsed.random_seed, Some(42));
        assert!(parsed.validate().is_ok());
    }
}
