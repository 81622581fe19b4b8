//! Scenario score matrix: DK points per scenario per driver.

use dfs_core::constraint::ConstraintSpec;
use dfs_core::lineup::Lineup;
use dfs_core::scenario::Scenario;
use dfs_core::scoring::score_scenario;
use rayon::prelude::*;

/// Row-major `[scenario][driver]` matrix of DK points.
///
/// Columns follow the spec's canonical driver order; rows follow ascending
/// scenario index. Built once per run and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ScoreMatrix {
    n_scenarios: usize,
    n_drivers: usize,
    scores: Vec<f64>,
}

impl ScoreMatrix {
    /// Score every scenario with the spec's fixed scorer.
    pub fn from_scenarios(spec: &ConstraintSpec, scenarios: &[Scenario]) -> Self {
        let n_drivers = spec.n_drivers();
        let scores: Vec<f64> = scenarios
            .par_iter()
            .flat_map_iter(|scenario| score_scenario(spec, scenario))
            .collect();
        Self {
            n_scenarios: scenarios.len(),
            n_drivers,
            scores,
        }
    }

    pub fn n_scenarios(&self) -> usize {
        self.n_scenarios
    }

    pub fn n_drivers(&self) -> usize {
        self.n_drivers
    }

    /// One scenario's scores across all drivers.
    pub fn row(&self, scenario: usize) -> &[f64] {
        let start = scenario * self.n_drivers;
        &self.scores[start..start + self.n_drivers]
    }

    /// Mean DK points per driver across scenarios.
    pub fn driver_means(&self) -> Vec<f64> {
        let mut means = vec![0.0; self.n_drivers];
        for scenario in 0..self.n_scenarios {
            for (mean, score) in means.iter_mut().zip(self.row(scenario)) {
                *mean += score;
            }
        }
        let n = self.n_scenarios.max(1) as f64;
        for mean in &mut means {
            *mean /= n;
        }
        means
    }

    /// A lineup's total score in one scenario.
    pub fn lineup_score(&self, scenario: usize, lineup: &Lineup) -> f64 {
        let row = self.row(scenario);
        lineup.driver_indices().iter().map(|&i| row[i]).sum()
    }

    /// A lineup's score across every scenario, in scenario order.
    pub fn lineup_scores(&self, lineup: &Lineup) -> Vec<f64> {
        (0..self.n_scenarios)
            .map(|k| self.lineup_score(k, lineup))
            .collect()
    }

    /// Sum of the `size` smallest entries in a scenario row: a lower bound
    /// on any lineup's score there. Used for big-M bounds.
    pub fn row_floor(&self, scenario: usize, size: usize) -> f64 {
        let mut row = self.row(scenario).to_vec();
        row.sort_by(|a, b| a.partial_cmp(b).unwrap());
        row.iter().take(size).sum()
    }

    /// Sum of the `size` largest entries in a scenario row: an upper bound
    /// on any lineup's score there.
    pub fn row_ceiling(&self, scenario: usize, size: usize) -> f64 {
        let mut row = self.row(scenario).to_vec();
        row.sort_by(|a, b| b.partial_cmp(a).unwrap());
        row.iter().take(size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_core::constraint::{compile, FixtureStore};
    use dfs_core::kernel::KernelStats;
    use dfs_core::scenario::{ScenarioEngine, SimSettings};
    use std::sync::Arc;

    fn spec_and_matrix() -> (ConstraintSpec, ScoreMatrix) {
        let spec = compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap();
        let engine = ScenarioEngine::new(
            &spec,
            SimSettings::default().with_seed(42),
            Arc::new(KernelStats::default()),
        );
        let set = engine.generate(50).unwrap();
        let matrix = ScoreMatrix::from_scenarios(&spec, &set.scenarios);
        (spec, matrix)
    }

    #[test]
    fn matrix_shape_matches_inputs() {
        let (spec, matrix) = spec_and_matrix();
        assert_eq!(matrix.n_scenarios(), 50);
        assert_eq!(matrix.n_drivers(), spec.n_drivers());
        assert_eq!(matrix.row(0).len(), spec.n_drivers());
    }

    #[test]
    fn lineup_score_is_the_row_sum_over_members() {
        let (_, matrix) = spec_and_matrix();
        let lineup = Lineup::new(vec![0, 2, 4, 6, 8, 10]);
        let row = matrix.row(3);
        let expected: f64 = [0, 2, 4, 6, 8, 10].iter().map(|&i| row[i]).sum();
        assert!((matrix.lineup_score(3, &lineup) - expected).abs() < 1e-12);
        assert_eq!(matrix.lineup_scores(&lineup).len(), 50);
    }

    #[test]
    fn row_bounds_bracket_lineup_scores() {
        let (_, matrix) = spec_and_matrix();
        let lineup = Lineup::new(vec![1, 3, 5, 7, 9, 11]);
        for k in 0..matrix.n_scenarios() {
            let score = matrix.lineup_score(k, &lineup);
            assert!(score >= matrix.row_floor(k, 6) - 1e-9);
            assert!(score <= matrix.row_ceiling(k, 6) + 1e-9);
        }
    }

    #[test]
    fn rescoring_persisted_scenarios_is_bit_identical() {
        let spec = compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap();
        let engine = ScenarioEngine::new(
            &spec,
            SimSettings::default().with_seed(7),
            Arc::new(KernelStats::default()),
        );
        let set = engine.generate(20).unwrap();
        let a = ScoreMatrix::from_scenarios(&spec, &set.scenarios);
        let b = ScoreMatrix::from_scenarios(&spec, &set.scenarios);
        assert_eq!(a.scores, b.scores);
    }
}
