//! # Calibration Harness
//!
//! Quantifies how well the scenario engine's marginal and joint
//! distributions match observed race outcomes, per track archetype.
//!
//! The harness runs on the offline validation path: its outputs are
//! diagnostics only and never feed back into the simulator without an
//! explicit configuration change.
//!
//! - [`metrics`]: CRPS, log score, and central coverage for probabilistic
//!   predictions
//! - [`observed`]: observed race results loaded from CSV
//! - [`scenario_eval`]: marginal and joint-event calibration of a scenario
//!   set against observations
//! - [`convergence`]: split-chain R-hat and effective sample size for the
//!   optional Bayesian backend
//! - [`report`]: markdown calibration report including kernel rejection
//!   statistics

pub mod convergence;
pub mod error;
pub mod metrics;
pub mod observed;
pub mod report;
pub mod scenario_eval;

pub use convergence::{mcmc_convergence, ConvergenceSummary};
pub use error::CalibrationError;
pub use metrics::{compute_metrics, CalibrationMetrics};
pub use observed::{load_observed_csv, ObservedResult};
pub use report::{generate_report, ReportInputs};
pub use scenario_eval::{assess_scenario_calibration, joint_event_validation, JointEvent};
