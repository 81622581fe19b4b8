//! Baseline lineup pool for calibrating chance thresholds.
//!
//! A cheap deterministic pool of salary-feasible lineups whose scenario
//! scores anchor the empirical quantile used as the default chance target.

use dfs_core::constraint::ConstraintSpec;
use dfs_core::kernel::{validate_lineup, LineupRules};
use dfs_core::lineup::{Lineup, LINEUP_SIZE};

use crate::matrix::ScoreMatrix;

/// Build a deterministic pool of up to `size` feasible lineups.
///
/// Lineup `j` seeds from the `j`-th driver by mean score and greedily adds
/// the best remaining drivers that keep salary and team caps satisfiable.
pub fn baseline_pool(
    spec: &ConstraintSpec,
    matrix: &ScoreMatrix,
    rules: &LineupRules,
    size: usize,
) -> Vec<Lineup> {
    let means = matrix.driver_means();
    let mut ranked: Vec<usize> = (0..spec.n_drivers())
        .filter(|&i| !spec.is_driver_vetoed(i))
        .collect();
    ranked.sort_by(|&a, &b| {
        means[b]
            .partial_cmp(&means[a])
            .unwrap()
            .then_with(|| a.cmp(&b))
    });

    let mut pool = Vec::new();
    for seed_rank in 0..ranked.len().min(size) {
        if let Some(lineup) = greedy_from_seed(spec, rules, &ranked, seed_rank) {
            if validate_lineup(spec, &lineup, rules).is_accept() && !pool.contains(&lineup) {
                pool.push(lineup);
            }
        }
        if pool.len() >= size {
            break;
        }
    }
    pool
}

fn greedy_from_seed(
    spec: &ConstraintSpec,
    rules: &LineupRules,
    ranked: &[usize],
    seed_rank: usize,
) -> Option<Lineup> {
    let mut chosen: Vec<usize> = vec![ranked[seed_rank]];
    let mut salary = spec.driver(ranked[seed_rank]).salary;

    for &candidate in ranked.iter().filter(|&&i| i != ranked[seed_rank]) {
        if chosen.len() == LINEUP_SIZE {
            break;
        }
        let driver = spec.driver(candidate);
        let next_salary = salary + driver.salary;
        // Leave enough room for the cheapest completions.
        let remaining = (LINEUP_SIZE - chosen.len() - 1) as u32;
        let cheapest_fill = cheapest_remaining(spec, &chosen, candidate, remaining);
        if next_salary + cheapest_fill > rules.salary_cap {
            continue;
        }
        let team_count = chosen
            .iter()
            .filter(|&&i| spec.driver(i).team_id == driver.team_id)
            .count() as u32;
        if team_count + 1 > rules.team_cap {
            continue;
        }
        chosen.push(candidate);
        salary = next_salary;
    }

    (chosen.len() == LINEUP_SIZE).then(|| Lineup::new(chosen))
}

fn cheapest_remaining(
    spec: &ConstraintSpec,
    chosen: &[usize],
    candidate: usize,
    count: u32,
) -> u32 {
    let mut salaries: Vec<u32> = (0..spec.n_drivers())
        .filter(|i| !chosen.contains(i) && *i != candidate && !spec.is_driver_vetoed(*i))
        .map(|i| spec.driver(i).salary)
        .collect();
    salaries.sort_unstable();
    salaries.iter().take(count as usize).sum()
}

/// Empirical `q`-upper-quantile of a sample (the value exceeded by roughly
/// a `q` fraction of observations).
pub fn upper_quantile(samples: &[f64], q: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let rank = ((1.0 - q) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_core::constraint::{compile, FixtureStore};
    use dfs_core::kernel::KernelStats;
    use dfs_core::scenario::{ScenarioEngine, SimSettings};
    use std::sync::Arc;

    #[test]
    fn pool_lineups_are_feasible_and_distinct() {
        let spec = compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap();
        let engine = ScenarioEngine::new(
            &spec,
            SimSettings::default().with_seed(42),
            Arc::new(KernelStats::default()),
        );
        let set = engine.generate(40).unwrap();
        let matrix = ScoreMatrix::from_scenarios(&spec, &set.scenarios);
        let rules = LineupRules::from_spec(&spec);

        let pool = baseline_pool(&spec, &matrix, &rules, 10);
        assert!(!pool.is_empty());
        for lineup in &pool {
            assert!(validate_lineup(&spec, lineup, &rules).is_accept());
        }
        for (i, a) in pool.iter().enumerate() {
            for b in pool.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn upper_quantile_walks_the_tail() {
        let samples: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        assert_eq!(upper_quantile(&samples, 0.01), 99.0);
        // Half rounds up: rank 50 of 0..=99 lands on the 51st value.
        assert_eq!(upper_quantile(&samples, 0.5), 51.0);
        assert_eq!(upper_quantile(&[], 0.1), 0.0);
    }
}
