//! Run registry and background execution.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dfs_core::constraint::{compile, OntologyStore};
use dfs_core::error::CompileError;
use dfs_core::kernel::KernelStats;
use dfs_core::telemetry::load_telemetry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{RunConfig, SimParams};
use crate::diagnostics::PortfolioResult;
use crate::env::EnvConfig;
use crate::persist::{PersistError, RunStore};
use crate::pipeline::{self, RunContext};
use crate::request::{RequestError, RunRequest};
use crate::state::{RunPhase, RunState, StatusReport};

/// Watchdog poll interval.
const WATCHDOG_TICK: Duration = Duration::from_millis(50);

/// Response to a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSubmission {
    pub run_id: String,
    pub status: RunState,
}

/// Acknowledgement of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAck {
    /// The flag was set; the run will stop at its next check.
    Ok,
    /// The run was already terminal (or unknown).
    Noop,
}

/// Errors surfaced synchronously by `submit_run`.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl SubmitError {
    pub fn code(&self) -> &'static str {
        match self {
            SubmitError::Request(err) => err.code(),
            SubmitError::Compile(err) => err.code(),
            SubmitError::Persist(_) => "INTERNAL_ERROR",
        }
    }
}

/// Per-run mutable state shared between the registry, the worker, and the
/// watchdog.
struct RunHandle {
    state: Mutex<RunState>,
    phase: Mutex<RunPhase>,
    progress: Mutex<f64>,
    cancel: Arc<AtomicBool>,
    timed_out: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    result: Mutex<Option<PortfolioResult>>,
}

impl RunHandle {
    fn new() -> Self {
        Self {
            state: Mutex::new(RunState::Queued),
            phase: Mutex::new(RunPhase::Compile),
            progress: Mutex::new(0.0),
            cancel: Arc::new(AtomicBool::new(false)),
            timed_out: Arc::new(AtomicBool::new(false)),
            done: Arc::new(AtomicBool::new(false)),
            result: Mutex::new(None),
        }
    }

    fn set_state(&self, state: RunState) {
        *self.state.lock().expect("run state lock") = state;
    }

    fn state(&self) -> RunState {
        *self.state.lock().expect("run state lock")
    }
}

/// The run registry: submits, tracks, and cancels runs.
///
/// Each run executes on its own worker thread against its own compiled
/// spec; runs never share mutable state.
pub struct RunManager {
    runs: Mutex<HashMap<String, Arc<RunHandle>>>,
    store: RunStore,
    env: EnvConfig,
    ontology: Arc<dyn OntologyStore + Send + Sync>,
    seq: AtomicU64,
}

impl RunManager {
    pub fn new(store_root: PathBuf, ontology: Arc<dyn OntologyStore + Send + Sync>) -> Self {
        Self::with_env(store_root, ontology, EnvConfig::from_env())
    }

    /// Construct with explicit environment configuration (tests, tooling).
    pub fn with_env(
        store_root: PathBuf,
        ontology: Arc<dyn OntologyStore + Send + Sync>,
        env: EnvConfig,
    ) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            store: RunStore::new(store_root),
            env,
            ontology,
            seq: AtomicU64::new(0),
        }
    }

    /// Validate, compile, persist, and launch a run.
    ///
    /// Input and compile errors surface here; everything after the spawn is
    /// reported through `get_status` / `get_result`.
    pub fn submit_run(&self, request: RunRequest) -> Result<RunSubmission, SubmitError> {
        request.validate()?;

        let spec = compile(&request.slate_id, self.ontology.as_ref()).map_err(|err| match err {
            CompileError::MissingEntity(message) => {
                SubmitError::Request(RequestError::UnknownSlate(message))
            }
            other => SubmitError::Compile(other),
        })?;

        for driver_id in request.exposure.keys() {
            if spec.index_of(driver_id).is_none() {
                return Err(RequestError::InvalidParameterRange(format!(
                    "exposure names unknown driver '{driver_id}'"
                ))
                .into());
            }
        }

        let pace_priors = match &request.telemetry_path {
            Some(path) => {
                let artifact = load_telemetry(path).map_err(|err| {
                    RequestError::InvalidParameterRange(format!("telemetry_path: {err}"))
                })?;
                Some(artifact.pace_priors(&spec))
            }
            None => None,
        };
        let observed_results = match &request.observed_results_path {
            Some(path) => Some(dfs_calibration::load_observed_csv(path).map_err(|err| {
                RequestError::InvalidParameterRange(format!("observed_results_path: {err}"))
            })?),
            None => None,
        };

        let run_id = self.next_run_id();
        let config = RunConfig {
            run_id: run_id.clone(),
            slate_id: request.slate_id.clone(),
            spec_hash: spec.spec_hash().to_string(),
            sim_params: SimParams::from_request(&request),
            random_seed: request.random_seed.unwrap_or(self.env.rng_seed_default),
        };
        self.store.save_run_config(&config)?;

        let handle = Arc::new(RunHandle::new());
        self.runs
            .lock()
            .expect("run registry lock")
            .insert(run_id.clone(), Arc::clone(&handle));

        let ctx = RunContext {
            config,
            spec,
            env: self.env,
            stats: Arc::new(KernelStats::default()),
            cancel: Arc::clone(&handle.cancel),
            timed_out: Arc::clone(&handle.timed_out),
            pace_priors,
            observed_results,
            store: self.store.clone(),
        };
        spawn_worker(Arc::clone(&handle), ctx, self.env.run_timeout());

        info!(run_id = %run_id, "run submitted");
        Ok(RunSubmission {
            run_id,
            status: RunState::Queued,
        })
    }

    pub fn get_status(&self, run_id: &str) -> Option<StatusReport> {
        let handle = self.handle(run_id)?;
        let report = StatusReport {
            status: handle.state(),
            progress: *handle.progress.lock().expect("progress lock"),
            phase: *handle.phase.lock().expect("phase lock"),
        };
        Some(report)
    }

    /// The terminal result, once the run has one.
    pub fn get_result(&self, run_id: &str) -> Option<PortfolioResult> {
        let handle = self.handle(run_id)?;
        let result = handle.result.lock().expect("result lock").clone();
        result
    }

    /// Request cooperative cancellation.
    pub fn cancel_run(&self, run_id: &str) -> CancelAck {
        let Some(handle) = self.handle(run_id) else {
            return CancelAck::Noop;
        };
        if handle.state().is_terminal() {
            return CancelAck::Noop;
        }
        handle.cancel.store(true, Ordering::Relaxed);
        debug!(run_id, "cancellation requested");
        CancelAck::Ok
    }

    /// Poll until the run reaches a terminal state or `timeout_ms` passes.
    pub fn wait_for_terminal(&self, run_id: &str, timeout_ms: u64) -> Option<RunState> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let state = self.handle(run_id)?.state();
            if state.is_terminal() {
                return Some(state);
            }
            if Instant::now() >= deadline {
                return Some(state);
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn handle(&self, run_id: &str) -> Option<Arc<RunHandle>> {
        self.runs
            .lock()
            .expect("run registry lock")
            .get(run_id)
            .cloned()
    }

    fn next_run_id(&self) -> String {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("run-{epoch_ms:013}-{seq:04}")
    }
}

fn spawn_worker(handle: Arc<RunHandle>, ctx: RunContext, timeout: Duration) {
    // Watchdog: converts the run timeout into a cancellation the pipeline
    // observes at its normal check points.
    let watchdog = {
        let cancel = Arc::clone(&handle.cancel);
        let timed_out = Arc::clone(&handle.timed_out);
        let done = Arc::clone(&handle.done);
        thread::spawn(move || {
            let deadline = Instant::now() + timeout;
            while !done.load(Ordering::Relaxed) {
                if Instant::now() >= deadline {
                    timed_out.store(true, Ordering::Relaxed);
                    cancel.store(true, Ordering::Relaxed);
                    return;
                }
                thread::sleep(WATCHDOG_TICK);
            }
        })
    };

    let worker_handle = Arc::clone(&handle);
    thread::spawn(move || {
        worker_handle.set_state(RunState::Running);
        let phase_handle = Arc::clone(&worker_handle);
        let result = pipeline::execute(&ctx, &move |phase, progress| {
            *phase_handle.phase.lock().expect("phase lock") = phase;
            *phase_handle.progress.lock().expect("progress lock") = progress;
        });
        worker_handle.set_state(result.status);
        *worker_handle.result.lock().expect("result lock") = Some(result);
        worker_handle.done.store(true, Ordering::Relaxed);
        let _ = watchdog.join();
    });
}
