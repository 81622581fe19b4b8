//! # NASCAR DFS Engine Core
//!
//! Deterministic core of a DraftKings NASCAR lineup engine.
//!
//! ## Overview
//!
//! This crate provides the simulation half of the engine:
//!
//! - **Constraint Spec**: Immutable, content-hashed slate artifact compiled
//!   from an external ontology store
//! - **Kernel**: Pure feasibility predicates over scenarios and lineups
//! - **Scenario Engine**: Causally structured race-flow generator with
//!   conservation-preserving allocators
//! - **Scoring**: Fixed DraftKings points scorer
//! - **Telemetry**: Columnar per-lap artifact loader with a pre-race
//!   features contract
//!
//! ## Key Concepts
//!
//! - **Feasible by construction**: Allocators emit states that already
//!   satisfy conservation; the kernel is a final assertion, not a filter
//! - **Deterministic**: Every scenario is seeded from `(seed, index)`, so a
//!   run replays bit-identically on any host
//! - **Immutable spec**: Downstream components borrow the compiled spec
//!   read-only; no store queries happen after compilation
//!
//! ## Example
//!
//! ```rust,no_run
//! use dfs_core::constraint::{compile, FixtureStore};
//! use dfs_core::kernel::KernelStats;
//! use dfs_core::scenario::{ScenarioEngine, SimSettings};
//! use std::sync::Arc;
//!
//! let store = FixtureStore::superspeedway_fixture(40);
//! let spec = compile("daytona-500", &store).unwrap();
//! let stats = Arc::new(KernelStats::default());
//! let engine = ScenarioEngine::new(&spec, SimSettings::default().with_seed(42), stats);
//! let scenarios = engine.generate(2000).unwrap();
//! ```

pub mod constraint;
pub mod error;
pub mod kernel;
pub mod lineup;
pub mod rng;
pub mod scenario;
pub mod scoring;
pub mod telemetry;
