//! One run, end to end: simulate, optimize, finalize.
//!
//! `execute` never panics and never returns early without a result: every
//! path, including cancellation, timeout, and failure, assembles a
//! `PortfolioResult` carrying whatever diagnostics exist at that point.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dfs_calibration::{assess_scenario_calibration, ObservedResult};
use dfs_core::constraint::ConstraintSpec;
use dfs_core::kernel::{KernelStats, LineupRules};
use dfs_core::scenario::{ScenarioEngine, ScenarioSet, SimSettings};
use dfs_portfolio::{
    ObjectiveConfig, PortfolioGenerator, PortfolioSettings, ScoreMatrix, SolverSettings,
    TailObjectiveBuilder,
};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::diagnostics::{portfolio_to_results, Diagnostics, PortfolioResult};
use crate::env::EnvConfig;
use crate::persist::RunStore;
use crate::state::{RunPhase, RunState};

/// Everything a worker thread needs to run one submission.
pub(crate) struct RunContext {
    pub config: RunConfig,
    pub spec: ConstraintSpec,
    pub env: EnvConfig,
    pub stats: Arc<KernelStats>,
    pub cancel: Arc<AtomicBool>,
    pub timed_out: Arc<AtomicBool>,
    pub pace_priors: Option<Vec<f64>>,
    pub observed_results: Option<Vec<ObservedResult>>,
    pub store: RunStore,
}

impl RunContext {
    fn interrupted_state(&self) -> (RunState, Option<String>) {
        if self.timed_out.load(Ordering::Relaxed) {
            (RunState::Failed, Some("TIMEOUT".to_string()))
        } else {
            (RunState::Cancelled, Some("CANCELLED".to_string()))
        }
    }
}

/// Run the pipeline to a terminal result. `set_phase` reports
/// `(phase, progress)` back to the orchestrator.
pub(crate) fn execute(ctx: &RunContext, set_phase: &dyn Fn(RunPhase, f64)) -> PortfolioResult {
    let mut diagnostics = Diagnostics::default();
    let params = &ctx.config.sim_params;

    // Simulate.
    set_phase(RunPhase::Simulate, 0.05);
    let sim_settings = SimSettings {
        seed: ctx.config.random_seed,
        threads: ctx.env.scenario_threads,
        ..SimSettings::default()
    };
    let mut engine = ScenarioEngine::new(&ctx.spec, sim_settings, Arc::clone(&ctx.stats))
        .with_cancel_flag(Arc::clone(&ctx.cancel));
    if let Some(priors) = &ctx.pace_priors {
        engine = engine.with_pace_priors(priors.clone());
    }
    let set = match engine.generate(params.n_scenarios) {
        Ok(set) => set,
        Err(err) => {
            return self::failure(ctx, diagnostics, err.code(), &err.to_string());
        }
    };
    diagnostics.record_scenarios(set.len() as u64, set.n_rejected);

    if set.cancelled {
        let (status, failure_reason) = ctx.interrupted_state();
        diagnostics.record_kernel(ctx.stats.snapshot());
        let result = PortfolioResult {
            run_id: ctx.config.run_id.clone(),
            spec_hash: ctx.config.spec_hash.clone(),
            status,
            portfolio: Vec::new(),
            partial: true,
            diagnostics,
            failure_reason,
        };
        persist(ctx, &result);
        return result;
    }

    if params.persist_scenarios {
        if let Err(err) = ctx.store.save_scenarios(&ctx.config.run_id, &set) {
            warn!(run_id = %ctx.config.run_id, error = %err, "scenario persistence failed");
        }
    }

    // Optimize.
    set_phase(RunPhase::Optimize, 0.55);
    let matrix = ScoreMatrix::from_scenarios(&ctx.spec, &set.scenarios);
    let rules = LineupRules {
        salary_cap: params.salary_cap,
        team_cap: params.team_cap.unwrap_or_else(|| ctx.spec.team_cap_default()),
    };
    let objective_config = ObjectiveConfig {
        kind: params.objective,
        tail_q: params.tail_q,
        chance_threshold: params.chance_threshold,
        payout_weights: params.payout_weights.clone(),
        strict: params.strict,
        ..ObjectiveConfig::default()
    };
    let ir = match TailObjectiveBuilder::new(&ctx.spec, &matrix, rules, objective_config).build() {
        Ok(ir) => ir,
        Err(err) => return failure(ctx, diagnostics, err.code(), &err.to_string()),
    };
    diagnostics.record_objective(&ir);

    let portfolio_settings = PortfolioSettings {
        n_lineups: params.n_lineups,
        overlap_cap: params.overlap_cap,
        exposure_caps: exposure_vector(&ctx.spec, &params.exposure),
        rules,
        solver: SolverSettings {
            time_limit_ms: ctx.env.solver_time_limit_ms,
            ..SolverSettings::default()
        },
        ..PortfolioSettings::new(&ctx.spec, params.n_lineups)
    };
    let generator =
        PortfolioGenerator::new(&ctx.spec, &matrix, &ir, portfolio_settings, Arc::clone(&ctx.stats))
            .with_cancel_flag(Arc::clone(&ctx.cancel));
    let portfolio = match generator.generate() {
        Ok(portfolio) => portfolio,
        Err(err) => return failure(ctx, diagnostics, err.code(), &err.to_string()),
    };
    diagnostics.record_portfolio(&ctx.spec, &portfolio);

    // Finalize.
    set_phase(RunPhase::Finalize, 0.9);
    attach_calibration(ctx, &set, &mut diagnostics);
    diagnostics.record_kernel(ctx.stats.snapshot());

    let (status, partial, failure_reason) = if portfolio.cancelled {
        let (status, reason) = ctx.interrupted_state();
        (status, true, reason)
    } else if portfolio.incomplete.is_some() {
        (
            RunState::Completed,
            true,
            Some("PORTFOLIO_INCOMPLETE".to_string()),
        )
    } else {
        (RunState::Completed, false, None)
    };

    let result = PortfolioResult {
        run_id: ctx.config.run_id.clone(),
        spec_hash: ctx.config.spec_hash.clone(),
        status,
        portfolio: portfolio_to_results(&ctx.spec, &portfolio),
        partial,
        diagnostics,
        failure_reason,
    };
    persist(ctx, &result);
    set_phase(RunPhase::Finalize, 1.0);
    info!(
        run_id = %ctx.config.run_id,
        status = status.as_str(),
        lineups = result.portfolio.len(),
        "run finished"
    );
    result
}

fn exposure_vector(spec: &ConstraintSpec, exposure: &BTreeMap<String, f64>) -> Vec<f64> {
    spec.drivers()
        .iter()
        .map(|driver| exposure.get(&driver.driver_id).copied().unwrap_or(1.0))
        .collect()
}

fn attach_calibration(ctx: &RunContext, set: &ScenarioSet, diagnostics: &mut Diagnostics) {
    let Some(observed) = &ctx.observed_results else {
        return;
    };
    let archetype = ctx.spec.track().archetype;
    match assess_scenario_calibration(&ctx.spec, &set.scenarios, observed, archetype) {
        Ok(metrics) => {
            diagnostics.calibration =
                Some(BTreeMap::from([(archetype.as_str().to_string(), metrics)]));
        }
        Err(err) => {
            warn!(run_id = %ctx.config.run_id, error = %err, "calibration skipped");
        }
    }
}

fn failure(
    ctx: &RunContext,
    mut diagnostics: Diagnostics,
    code: &str,
    message: &str,
) -> PortfolioResult {
    warn!(run_id = %ctx.config.run_id, code, message, "run failed");
    diagnostics.record_kernel(ctx.stats.snapshot());
    let result = PortfolioResult {
        run_id: ctx.config.run_id.clone(),
        spec_hash: ctx.config.spec_hash.clone(),
        status: RunState::Failed,
        portfolio: Vec::new(),
        partial: true,
        diagnostics,
        failure_reason: Some(code.to_string()),
    };
    persist(ctx, &result);
    result
}

fn persist(ctx: &RunContext, result: &PortfolioResult) {
    if let Err(err) = ctx.store.save_portfolio(result) {
        warn!(run_id = %ctx.config.run_id, error = %err, "portfolio persistence failed");
    }
    if let Err(err) = ctx.store.save_diagnostics(&ctx.config.run_id, &result.diagnostics) {
        warn!(run_id = %ctx.config.run_id, error = %err, "diagnostics persistence failed");
    }
}
