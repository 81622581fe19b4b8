//! Single-lineup 0/1 integer program.
//!
//! One binary variable per driver in canonical order. Hard constraints:
//! roster size, salary cap, team caps, veto exclusions, plus whatever cuts
//! the portfolio generator injects (exposure exclusions, overlap caps,
//! no-good cuts). A secondary objective `-eps * sum(i * x_i)` breaks value
//! ties lexicographically on the canonical driver order, so solves are
//! reproducible across hosts.
//!
//! Tail handling: the chance objective adds per-scenario big-M indicator
//! binaries; CVaR-upside alternates between solving a linear master over a
//! fixed tail subset and re-selecting the tail of the incumbent, which
//! converges monotonically because both half-steps can only improve the
//! top-q mean.

use std::time::Instant;

use dfs_core::constraint::ConstraintSpec;
use dfs_core::kernel::LineupRules;
use dfs_core::lineup::{Lineup, LINEUP_SIZE};
use good_lp::{
    constraint, default_solver, variable, variables, Expression, ResolutionError, Solution,
    SolverModel, Variable,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SolverError;
use crate::infeasibility::classify;
use crate::matrix::ScoreMatrix;
use crate::objective::{AuxTerms, ObjectiveIr};

/// Solver tunables for one run.
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    /// Wall-clock budget per lineup solve. Master solves are not
    /// interruptible; the budget bounds whether another refinement or
    /// another lineup is attempted.
    pub time_limit_ms: u64,
    /// Coefficient of the lexicographic tie-break term.
    pub tie_break_epsilon: f64,
    /// Upper bound on CVaR tail-refinement iterations.
    pub max_cvar_refinements: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit_ms: 10_000,
            tie_break_epsilon: 1e-6,
            max_cvar_refinements: 8,
        }
    }
}

/// Terminal state of one lineup solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    FeasibleTimeLimit,
    Infeasible,
}

/// Result of one lineup solve.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub lineup: Option<Lineup>,
    /// Objective value as defined by the IR (recomputable from the matrix).
    pub objective_value: f64,
    pub status: SolveStatus,
    /// Optimality gap; zero when the final master solved to optimality.
    pub gap: f64,
    pub wall_time_ms: u64,
}

/// One lineup solve: spec-level constraints plus portfolio-level cuts.
#[derive(Debug, Clone)]
pub struct LineupProblem<'a> {
    pub spec: &'a ConstraintSpec,
    pub matrix: &'a ScoreMatrix,
    pub ir: &'a ObjectiveIr,
    pub rules: LineupRules,
    /// Drivers whose exposure room is spent this iteration.
    pub exposure_excluded: Vec<usize>,
    /// `(prior lineup drivers, max shared)` overlap caps.
    pub overlap_cuts: Vec<(Vec<usize>, u32)>,
    /// Exact-duplicate exclusions (at most `LINEUP_SIZE - 1` shared).
    pub no_good_cuts: Vec<Vec<usize>>,
}

impl<'a> LineupProblem<'a> {
    pub fn new(
        spec: &'a ConstraintSpec,
        matrix: &'a ScoreMatrix,
        ir: &'a ObjectiveIr,
        rules: LineupRules,
    ) -> Self {
        Self {
            spec,
            matrix,
            ir,
            rules,
            exposure_excluded: Vec::new(),
            overlap_cuts: Vec::new(),
            no_good_cuts: Vec::new(),
        }
    }
}

/// Which constraint layers a relaxation solve keeps. Used both by the
/// normal path (everything on) and by infeasibility classification.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Relaxation {
    pub drop_cuts: bool,
    pub drop_exposure: bool,
    pub lift_team_cap: bool,
}

impl Relaxation {
    pub(crate) const NONE: Relaxation = Relaxation {
        drop_cuts: false,
        drop_exposure: false,
        lift_team_cap: false,
    };
}

/// Solve one lineup under the problem's objective.
pub fn solve(problem: &LineupProblem<'_>, settings: &SolverSettings) -> Result<SolveOutcome, SolverError> {
    let start = Instant::now();
    let outcome = match &problem.ir.aux {
        AuxTerms::None => solve_linear_objective(problem, settings, start)?,
        AuxTerms::Chance { threshold, big_m } => {
            solve_chance(problem, settings, *threshold, big_m, start)?
        }
        AuxTerms::Cvar { tail_count } => solve_cvar(problem, settings, *tail_count, start)?,
    };
    debug!(
        status = ?outcome.status,
        objective = outcome.objective_value,
        wall_time_ms = outcome.wall_time_ms,
        "lineup solve finished"
    );
    Ok(outcome)
}

fn solve_linear_objective(
    problem: &LineupProblem<'_>,
    settings: &SolverSettings,
    start: Instant,
) -> Result<SolveOutcome, SolverError> {
    match solve_master(problem, &problem.ir.driver_terms, settings, Relaxation::NONE)? {
        Some(lineup) => {
            let objective_value = problem.ir.evaluate(problem.matrix, &lineup);
            Ok(finished(lineup, objective_value, start, settings))
        }
        None => Err(SolverError::Infeasible(classify(problem, settings)?)),
    }
}

fn solve_cvar(
    problem: &LineupProblem<'_>,
    settings: &SolverSettings,
    tail_count: usize,
    start: Instant,
) -> Result<SolveOutcome, SolverError> {
    // Warm start from the expected-value master.
    let Some(mut incumbent) =
        solve_master(problem, &problem.ir.driver_terms, settings, Relaxation::NONE)?
    else {
        return Err(SolverError::Infeasible(classify(problem, settings)?));
    };
    let mut best_value = problem.ir.evaluate(problem.matrix, &incumbent);

    for refinement in 0..settings.max_cvar_refinements {
        if start.elapsed().as_millis() as u64 >= settings.time_limit_ms {
            debug!(refinement, "cvar refinement stopped at the time limit");
            let mut outcome = finished(incumbent, best_value, start, settings);
            outcome.status = SolveStatus::FeasibleTimeLimit;
            return Ok(outcome);
        }

        let coeffs = tail_coefficients(problem.matrix, &incumbent, tail_count);
        let Some(next) = solve_master(problem, &coeffs, settings, Relaxation::NONE)? else {
            break;
        };
        let next_value = problem.ir.evaluate(problem.matrix, &next);
        if next_value > best_value + 1e-9 {
            incumbent = next;
            best_value = next_value;
        } else {
            break;
        }
    }

    Ok(finished(incumbent, best_value, start, settings))
}

/// Mean row over the incumbent's top-`tail_count` scenarios: the linear
/// master objective for the next refinement.
fn tail_coefficients(matrix: &ScoreMatrix, incumbent: &Lineup, tail_count: usize) -> Vec<f64> {
    let scores = matrix.lineup_scores(incumbent);
    let mut ranked: Vec<usize> = (0..scores.len()).collect();
    ranked.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap()
            .then_with(|| a.cmp(&b))
    });
    let tail = &ranked[..tail_count.min(ranked.len())];

    let mut coeffs = vec![0.0; matrix.n_drivers()];
    for &k in tail {
        for (coeff, score) in coeffs.iter_mut().zip(matrix.row(k)) {
            *coeff += score;
        }
    }
    let count = tail.len().max(1) as f64;
    for coeff in &mut coeffs {
        *coeff /= count;
    }
    coeffs
}

fn solve_chance(
    problem: &LineupProblem<'_>,
    settings: &SolverSettings,
    threshold: f64,
    big_m: &[f64],
    start: Instant,
) -> Result<SolveOutcome, SolverError> {
    let spec = problem.spec;
    let n = spec.n_drivers();
    let n_scenarios = problem.matrix.n_scenarios();

    let mut vars = variables!();
    let x: Vec<Variable> = (0..n).map(|_| vars.add(variable().binary())).collect();
    let y: Vec<Variable> = (0..n_scenarios)
        .map(|_| vars.add(variable().binary()))
        .collect();

    let mut objective = Expression::default();
    for &indicator in &y {
        objective += indicator;
    }
    for (i, &var) in x.iter().enumerate() {
        objective += var * (-settings.tie_break_epsilon * i as f64);
    }

    let mut model = vars.maximise(objective).using(default_solver);
    model = add_lineup_constraints(model, problem, &x, Relaxation::NONE);
    for (k, &m) in big_m.iter().enumerate() {
        // sigma_k(x) >= threshold - M_k * (1 - y_k)
        let mut score = Expression::default();
        for (i, &var) in x.iter().enumerate() {
            score += var * problem.matrix.row(k)[i];
        }
        score += y[k] * (-m);
        model = model.with(constraint!(score >= threshold - m));
    }

    match model.solve() {
        Ok(solution) => {
            let lineup = extract_lineup(&solution, &x);
            let objective_value = problem.ir.evaluate(problem.matrix, &lineup);
            Ok(finished(lineup, objective_value, start, settings))
        }
        Err(ResolutionError::Infeasible) => {
            Err(SolverError::Infeasible(classify(problem, settings)?))
        }
        Err(other) => Err(SolverError::Internal(other.to_string())),
    }
}

/// Solve a linear master over driver variables only. `None` = infeasible.
pub(crate) fn solve_master(
    problem: &LineupProblem<'_>,
    coeffs: &[f64],
    settings: &SolverSettings,
    relax: Relaxation,
) -> Result<Option<Lineup>, SolverError> {
    let n = problem.spec.n_drivers();
    let mut vars = variables!();
    let x: Vec<Variable> = (0..n).map(|_| vars.add(variable().binary())).collect();

    let mut objective = Expression::default();
    for (i, &var) in x.iter().enumerate() {
        objective += var * (coeffs[i] - settings.tie_break_epsilon * i as f64);
    }

    let mut model = vars.maximise(objective).using(default_solver);
    model = add_lineup_constraints(model, problem, &x, relax);

    match model.solve() {
        Ok(solution) => Ok(Some(extract_lineup(&solution, &x))),
        Err(ResolutionError::Infeasible) => Ok(None),
        Err(other) => Err(SolverError::Internal(other.to_string())),
    }
}

fn add_lineup_constraints<M: SolverModel>(
    mut model: M,
    problem: &LineupProblem<'_>,
    x: &[Variable],
    relax: Relaxation,
) -> M {
    let spec = problem.spec;

    let mut roster = Expression::default();
    for &var in x {
        roster += var;
    }
    model = model.with(constraint!(roster == LINEUP_SIZE as f64));

    let mut salary = Expression::default();
    for (i, &var) in x.iter().enumerate() {
        salary += var * spec.driver(i).salary as f64;
    }
    model = model.with(constraint!(salary <= problem.rules.salary_cap as f64));

    let team_cap = if relax.lift_team_cap {
        LINEUP_SIZE as u32
    } else {
        problem.rules.team_cap
    };
    for team in spec.team_ids() {
        let members: Vec<usize> = (0..spec.n_drivers())
            .filter(|&i| spec.driver(i).team_id == team)
            .collect();
        if members.len() as u32 > team_cap {
            let mut stacked = Expression::default();
            for &i in &members {
                stacked += x[i];
            }
            model = model.with(constraint!(stacked <= team_cap as f64));
        }
    }

    // Veto rules compile to exclusion sets.
    for i in 0..spec.n_drivers() {
        if spec.is_driver_vetoed(i) {
            model = model.with(constraint!(x[i] <= 0.0));
        }
    }

    if !relax.drop_exposure {
        for &i in &problem.exposure_excluded {
            model = model.with(constraint!(x[i] <= 0.0));
        }
    }

    if !relax.drop_cuts {
        for (members, cap) in &problem.overlap_cuts {
            let mut shared = Expression::default();
            for &i in members {
                shared += x[i];
            }
            model = model.with(constraint!(shared <= *cap as f64));
        }
        for members in &problem.no_good_cuts {
            let mut shared = Expression::default();
            for &i in members {
                shared += x[i];
            }
            model = model.with(constraint!(shared <= (LINEUP_SIZE - 1) as f64));
        }
    }

    model
}

fn extract_lineup(solution: &impl Solution, x: &[Variable]) -> Lineup {
    let chosen: Vec<usize> = x
        .iter()
        .enumerate()
        .filter(|(_, &var)| solution.value(var) > 0.5)
        .map(|(i, _)| i)
        .collect();
    Lineup::new(chosen)
}

fn finished(
    lineup: Lineup,
    objective_value: f64,
    start: Instant,
    settings: &SolverSettings,
) -> SolveOutcome {
    let wall_time_ms = start.elapsed().as_millis() as u64;
    let status = if wall_time_ms >= settings.time_limit_ms {
        SolveStatus::FeasibleTimeLimit
    } else {
        SolveStatus::Optimal
    };
    SolveOutcome {
        lineup: Some(lineup),
        objective_value,
        status,
        gap: 0.0,
        wall_time_ms,
    }
}
