//! Persisted run configuration.
//!
//! `(spec_hash, sim_params, random_seed)` fully determines a run's
//! scenarios and portfolio up to the solver's documented lexicographic
//! tie-breaks, so the persisted config plus the slate content is enough to
//! replay any run.

use std::collections::BTreeMap;

use dfs_portfolio::ObjectiveKind;
use serde::{Deserialize, Serialize};

use crate::request::RunRequest;

/// Simulation and optimization parameters, canonicalized from the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    pub objective: ObjectiveKind,
    pub tail_q: f64,
    pub n_scenarios: u64,
    pub n_lineups: u32,
    pub salary_cap: u32,
    pub team_cap: Option<u32>,
    /// Sorted by driver id (BTreeMap), so encoding is order-stable.
    pub exposure: BTreeMap<String, f64>,
    pub overlap_cap: u32,
    pub strict: bool,
    pub persist_scenarios: bool,
    pub payout_weights: Option<Vec<f64>>,
    pub chance_threshold: Option<f64>,
}

impl SimParams {
    pub fn from_request(request: &RunRequest) -> Self {
        Self {
            objective: request.objective,
            tail_q: request.tail_q,
            n_scenarios: request.n_scenarios,
            n_lineups: request.n_lineups,
            salary_cap: request.salary_cap,
            team_cap: request.team_cap,
            exposure: request.exposure.clone(),
            overlap_cap: request.overlap_cap,
            strict: request.strict,
            persist_scenarios: request.persist_scenarios,
            payout_weights: request.payout_weights.clone(),
            chance_threshold: request.chance_threshold,
        }
    }
}

/// One run's identity and reproduction key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub run_id: String,
    pub slate_id: String,
    pub spec_hash: String,
    pub sim_params: SimParams,
    pub random_seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_params_mirror_the_request() {
        let request = RunRequest::new("daytona-500")
            .with_seed(7)
            .with_lineups(3)
            .with_exposure("driver_04", 0.25);
        let params = SimParams::from_request(&request);
        assert_eq!(params.n_lineups, 3);
        assert_eq!(params.exposure["driver_04"], 0.25);
        assert_eq!(params.objective, ObjectiveKind::CvarUpside);
    }
}
