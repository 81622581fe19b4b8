//! # NASCAR DFS Run Orchestration
//!
//! The externally facing layer of the lineup engine: request validation,
//! run lifecycle, background execution, cooperative cancellation, and
//! result assembly.
//!
//! ## Run lifecycle
//!
//! ```text
//! submit_run -> queued -> running (compile | simulate | optimize | finalize)
//!                       -> completed | failed | cancelled
//! ```
//!
//! Each run executes on its own thread against its own compiled spec and
//! scenario matrix; the only cross-run state is the run registry itself.
//! Cancellation and the run timeout share one flag that the scenario
//! engine checks between scenario chunks and the portfolio generator
//! between lineups.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dfs_core::constraint::FixtureStore;
//! use dfs_runtime::{RunManager, RunRequest};
//! use std::sync::Arc;
//!
//! let manager = RunManager::new(
//!     "/tmp/dfs-runs".into(),
//!     Arc::new(FixtureStore::superspeedway_fixture(40)),
//! );
//! let submission = manager
//!     .submit_run(RunRequest::new("daytona-500").with_seed(42))
//!     .unwrap();
//! let state = manager.wait_for_terminal(&submission.run_id, 120_000).unwrap();
//! let result = manager.get_result(&submission.run_id).unwrap();
//! println!("{state:?}: {} lineups", result.portfolio.len());
//! ```

pub mod config;
pub mod diagnostics;
pub mod env;
pub mod orchestrator;
pub mod persist;
mod pipeline;
pub mod request;
pub mod state;

pub use config::{RunConfig, SimParams};
pub use diagnostics::{Diagnostics, LineupResult, PortfolioResult, SolverStat};
pub use env::EnvConfig;
pub use orchestrator::{CancelAck, RunManager, RunSubmission, SubmitError};
pub use persist::RunStore;
pub use request::{RequestError, RunRequest};
pub use state::{RunPhase, RunState, StatusReport};
