//! Optimizer error taxonomy with stable reason codes.

use thiserror::Error;

use crate::infeasibility::InfeasibilityClass;

/// Errors from the tail objective builder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObjectiveError {
    /// The tail holds too few scenarios to estimate anything. Outside
    /// strict mode this downgrades to expected value instead of failing.
    #[error("TAIL_SAMPLE_TOO_SMALL: effective tail holds {effective} scenarios, floor is {floor}")]
    TailSampleTooSmall { effective: usize, floor: usize },

    /// The requested objective cannot be built from the given inputs.
    #[error("OBJECTIVE_UNSUPPORTED: {0}")]
    Unsupported(String),
}

impl ObjectiveError {
    pub fn code(&self) -> &'static str {
        match self {
            ObjectiveError::TailSampleTooSmall { .. } => "TAIL_SAMPLE_TOO_SMALL",
            ObjectiveError::Unsupported(_) => "OBJECTIVE_UNSUPPORTED",
        }
    }
}

/// Errors from a single lineup solve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// The program is infeasible; the class names the binding layer.
    #[error("{}", .0.code())]
    Infeasible(InfeasibilityClass),

    /// The solve exceeded its wall-clock budget with no incumbent.
    #[error("SOLVER_TIMEOUT: no incumbent within {limit_ms} ms")]
    Timeout { limit_ms: u64 },

    /// The backend failed for reasons other than infeasibility.
    #[error("SOLVER_INTERNAL: {0}")]
    Internal(String),
}

impl SolverError {
    pub fn code(&self) -> &'static str {
        match self {
            SolverError::Infeasible(class) => class.code(),
            SolverError::Timeout { .. } => "SOLVER_TIMEOUT",
            SolverError::Internal(_) => "SOLVER_INTERNAL",
        }
    }
}

/// Errors from portfolio generation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
    /// A non-recoverable solver failure.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// The kernel rejected an emitted lineup. The solver enforces the same
    /// constraints, so this is an internal inconsistency and fails the run.
    #[error("INTERNAL_ERROR: kernel rejected emitted lineup {lineup_index}: {reasons:?}")]
    LineupRejected {
        lineup_index: usize,
        reasons: Vec<String>,
    },
}

impl PortfolioError {
    pub fn code(&self) -> &'static str {
        match self {
            PortfolioError::Solver(err) => err.code(),
            PortfolioError::LineupRejected { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_flow_through_wrappers() {
        let err = PortfolioError::Solver(SolverError::Infeasible(InfeasibilityClass::Salary));
        assert_eq!(err.code(), "INFEAS_SALARY");
        assert_eq!(
            ObjectiveError::TailSampleTooSmall {
                effective: 12,
                floor: 200
            }
            .code(),
            "TAIL_SAMPLE_TOO_SMALL"
        );
    }
}
