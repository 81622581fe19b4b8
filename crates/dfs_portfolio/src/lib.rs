//! # NASCAR DFS Portfolio Optimizer
//!
//! The optimization half of the lineup engine: turns a scenario matrix into
//! tail-aware objectives, solves single lineups as 0/1 integer programs,
//! and iterates into a diversified portfolio.
//!
//! ## Overview
//!
//! - **Score matrix**: DK points per scenario per driver
//! - **Tail objectives**: CVaR-upside, chance-style, expected payout, and
//!   plain expected value, emitted as a solver-agnostic representation
//! - **Lineup solver**: roster, salary, team, veto, and portfolio cuts over
//!   binary selection variables, with deterministic tie-breaking
//! - **Portfolio generator**: exposure and overlap discipline with a
//!   documented relaxation ladder
//!
//! Everything downstream of the scenario engine is deterministic: the same
//! matrix, objective, and settings reproduce the same portfolio.

pub mod baseline;
pub mod error;
pub mod infeasibility;
pub mod matrix;
pub mod objective;
pub mod portfolio;
pub mod solver;

pub use error::{ObjectiveError, PortfolioError, SolverError};
pub use infeasibility::InfeasibilityClass;
pub use matrix::ScoreMatrix;
pub use objective::{ObjectiveConfig, ObjectiveIr, ObjectiveKind, TailObjectiveBuilder};
pub use portfolio::{EmittedLineup, GeneratedPortfolio, PortfolioGenerator, PortfolioSettings};
pub use solver::{LineupProblem, SolveOutcome, SolveStatus, SolverSettings};
