//! Infeasibility classification.
//!
//! When a lineup solve comes back infeasible, the portfolio generator needs
//! to know which layer binds: portfolio cuts it can relax, exposure caps it
//! can report, or spec-level caps that end the run. Classification re-solves
//! a relaxation ladder, peeling one layer at a time.

use serde::{Deserialize, Serialize};

use crate::error::SolverError;
use crate::solver::{solve_master, LineupProblem, Relaxation, SolverSettings};

/// The outermost constraint layer that makes the program infeasible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfeasibilityClass {
    /// Feasible once overlap and no-good cuts are dropped.
    NoGoods,
    /// Feasible once exposure exclusions are also dropped.
    Exposure,
    /// Feasible once team caps are also lifted.
    TeamCap,
    /// Infeasible even fully relaxed; the salary cap (or roster size
    /// itself) cannot be met.
    Salary,
}

impl InfeasibilityClass {
    pub fn code(self) -> &'static str {
        match self {
            InfeasibilityClass::NoGoods => "INFEAS_NO_GOODS",
            InfeasibilityClass::Exposure => "INFEAS_EXPOSURE",
            InfeasibilityClass::TeamCap => "INFEAS_TEAM_CAP",
            InfeasibilityClass::Salary => "INFEAS_SALARY",
        }
    }

    /// Whether the portfolio generator may respond by relaxing policy.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            InfeasibilityClass::NoGoods | InfeasibilityClass::Exposure
        )
    }
}

/// Walk the relaxation ladder and name the binding layer.
pub(crate) fn classify(
    problem: &LineupProblem<'_>,
    settings: &SolverSettings,
) -> Result<InfeasibilityClass, SolverError> {
    // Any feasible point will do; coefficients are irrelevant here.
    let zeros = vec![0.0; problem.spec.n_drivers()];
    let ladder = [
        (
            Relaxation {
                drop_cuts: true,
                drop_exposure: false,
                lift_team_cap: false,
            },
            InfeasibilityClass::NoGoods,
        ),
        (
            Relaxation {
                drop_cuts: true,
                drop_exposure: true,
                lift_team_cap: false,
            },
            InfeasibilityClass::Exposure,
        ),
        (
            Relaxation {
                drop_cuts: true,
                drop_exposure: true,
                lift_team_cap: true,
            },
            InfeasibilityClass::TeamCap,
        ),
    ];
    for (relaxation, class) in ladder {
        if solve_master(problem, &zeros, settings, relaxation)?.is_some() {
            return Ok(class);
        }
    }
    Ok(InfeasibilityClass::Salary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::ScoreMatrix;
    use crate::objective::{ObjectiveConfig, ObjectiveKind, TailObjectiveBuilder};
    use dfs_core::constraint::{compile, ConstraintSpec, FixtureStore};
    use dfs_core::kernel::{KernelStats, LineupRules};
    use dfs_core::scenario::{ScenarioEngine, SimSettings};
    use std::sync::Arc;

    fn fixture() -> (ConstraintSpec, ScoreMatrix) {
        let spec = compile("daytona-500", &FixtureStore::superspeedway_fixture(12)).unwrap();
        let engine = ScenarioEngine::new(
            &spec,
            SimSettings::default().with_seed(5),
            Arc::new(KernelStats::default()),
        );
        let set = engine.generate(30).unwrap();
        let matrix = ScoreMatrix::from_scenarios(&spec, &set.scenarios);
        (spec, matrix)
    }

    fn ev_ir(spec: &ConstraintSpec, matrix: &ScoreMatrix) -> crate::objective::ObjectiveIr {
        let config = ObjectiveConfig {
            kind: ObjectiveKind::ExpectedValue,
            ..ObjectiveConfig::default()
        };
        TailObjectiveBuilder::new(spec, matrix, LineupRules::from_spec(spec), config)
            .build()
            .unwrap()
    }

    #[test]
    fn exposure_exclusions_dominate_classification() {
        let (spec, matrix) = fixture();
        let ir = ev_ir(&spec, &matrix);
        let mut problem = LineupProblem::new(
            &spec,
            &matrix,
            &ir,
            LineupRules {
                salary_cap: 60_000,
                team_cap: 6,
            },
        );
        // Excluding seven drivers from a twelve-car field leaves only five.
        problem.exposure_excluded = (0..7).collect();
        let class = classify(&problem, &SolverSettings::default()).unwrap();
        assert_eq!(class, InfeasibilityClass::Exposure);
        assert!(class.is_recoverable());
    }

    #[test]
    fn team_caps_are_detected_when_nothing_else_binds() {
        let (spec, matrix) = fixture();
        let ir = ev_ir(&spec, &matrix);
        // A team cap of one admits at most three drivers from twelve cars
        // spread over three teams of four.
        let problem = LineupProblem::new(
            &spec,
            &matrix,
            &ir,
            LineupRules {
                salary_cap: 60_000,
                team_cap: 1,
            },
        );
        let class = classify(&problem, &SolverSettings::default()).unwrap();
        assert_eq!(class, InfeasibilityClass::TeamCap);
        assert!(!class.is_recoverable());
    }

    #[test]
    fn salary_is_the_last_resort() {
        let (spec, matrix) = fixture();
        let ir = ev_ir(&spec, &matrix);
        let problem = LineupProblem::new(
            &spec,
            &matrix,
            &ir,
            LineupRules {
                salary_cap: 100,
                team_cap: 6,
            },
        );
        let class = classify(&problem, &SolverSettings::default()).unwrap();
        assert_eq!(class, InfeasibilityClass::Salary);
    }
}
