//! Scenario generation loop: parallel fan-out, deterministic content,
//! cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::constraint::ConstraintSpec;
use crate::error::ScenarioError;
use crate::kernel::{validate_realized, validate_state, KernelStats};
use crate::rng::scenario_rng;
use crate::scenario::finish::realize_finish;
use crate::scenario::laps::allocate_laps_led;
use crate::scenario::pace::allocate_fastest_laps;
use crate::scenario::regime::sample_regime;
use crate::scenario::{ConservationMeta, Scenario, ScenarioSet};

/// Scenarios generated between cancellation checks. Also the parallel
/// batch size, so ordering stays deterministic per chunk.
const CHUNK_SIZE: u64 = 32;

/// Engine tunables for one run.
#[derive(Debug, Clone, Copy)]
pub struct SimSettings {
    /// Run seed; scenario `i` draws from `derive_seed(seed, i)`.
    pub seed: u64,
    /// Worker threads; `None` uses rayon's default.
    pub threads: Option<usize>,
    /// Regime resamples allowed per scenario before the run aborts.
    pub max_regime_resamples: u32,
    /// Kernel rejection rate above which generation is treated as buggy.
    pub rejection_threshold: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            threads: None,
            max_regime_resamples: 5,
            rejection_threshold: 0.02,
        }
    }
}

impl SimSettings {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

/// Race scenario generator for one compiled spec.
pub struct ScenarioEngine<'a> {
    spec: &'a ConstraintSpec,
    settings: SimSettings,
    stats: Arc<KernelStats>,
    cancel: Arc<AtomicBool>,
    pace_priors: Option<Vec<f64>>,
}

impl<'a> ScenarioEngine<'a> {
    pub fn new(spec: &'a ConstraintSpec, settings: SimSettings, stats: Arc<KernelStats>) -> Self {
        Self {
            spec,
            settings,
            stats,
            cancel: Arc::new(AtomicBool::new(false)),
            pace_priors: None,
        }
    }

    /// Share an externally owned cancellation flag (set by the run
    /// orchestrator).
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Telemetry-derived pace priors, one per spec driver in canonical
    /// order (see [`crate::telemetry::TelemetryArtifact::pace_priors`]).
    pub fn with_pace_priors(mut self, priors: Vec<f64>) -> Self {
        debug_assert_eq!(priors.len(), self.spec.n_drivers());
        self.pace_priors = Some(priors);
        self
    }

    /// The flag this engine polls between scenario chunks.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Generate `n` scenarios with indices `0..n`.
    ///
    /// On cancellation the set returned is the contiguous prefix generated
    /// so far, flagged `cancelled`. Scenario content depends only on
    /// `(spec, settings.seed, index)`, never on thread count.
    pub fn generate(&self, n: u64) -> Result<ScenarioSet, ScenarioError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.threads.unwrap_or(0))
            .build()
            .expect("scenario thread pool should build");

        let mut set = ScenarioSet {
            scenarios: Vec::with_capacity(n as usize),
            ..ScenarioSet::default()
        };

        let mut next = 0u64;
        while next < n {
            if self.cancel.load(Ordering::Relaxed) {
                set.cancelled = true;
                debug!(accepted = set.scenarios.len(), "scenario generation cancelled");
                return Ok(set);
            }

            let end = (next + CHUNK_SIZE).min(n);
            let chunk: Vec<Result<(Scenario, u64, u64), ScenarioError>> = pool.install(|| {
                (next..end)
                    .into_par_iter()
                    .map(|index| self.generate_one(index))
                    .collect()
            });
            for result in chunk {
                let (scenario, rejects, resamples) = result?;
                set.n_rejected += rejects;
                set.n_regime_resamples += resamples;
                set.scenarios.push(scenario);
            }
            next = end;
        }

        let rate = set.rejection_rate();
        if rate > self.settings.rejection_threshold {
            return Err(ScenarioError::ExcessiveRejection {
                rate,
                threshold: self.settings.rejection_threshold,
            });
        }
        Ok(set)
    }

    /// Build one scenario. Returns `(scenario, kernel_rejects, regime_resamples)`.
    fn generate_one(&self, index: u64) -> Result<(Scenario, u64, u64), ScenarioError> {
        let mut rng = scenario_rng(self.settings.seed, index);
        let mut rejects = 0u64;
        let mut resamples = 0u64;

        for _attempt in 0..=self.settings.max_regime_resamples {
            let regime = sample_regime(self.spec.track(), &mut rng);
            let laps_led = match allocate_laps_led(self.spec, &regime, &mut rng) {
                Ok(laps) => laps,
                Err(_) => {
                    resamples += 1;
                    continue;
                }
            };
            let priors = self.pace_priors.as_deref();
            let fastest = allocate_fastest_laps(self.spec, &regime, &laps_led, priors, &mut rng);
            let (mut outcomes, incident_count) =
                realize_finish(self.spec, &regime, &laps_led, priors, &mut rng);
            for ((outcome, led), quick) in outcomes.iter_mut().zip(&laps_led).zip(&fastest) {
                outcome.laps_led = *led;
                outcome.fastest_laps = *quick;
            }

            let state = validate_state(self.spec, &regime, &outcomes);
            if !state.is_accept() {
                self.stats.record(&state);
                rejects += 1;
                continue;
            }

            let scenario = Scenario {
                scenario_index: index,
                regime,
                outcomes,
                meta: ConservationMeta {
                    incident_count,
                    caution_laps: regime.caution_laps,
                },
            };
            let verdict = validate_realized(self.spec, &scenario);
            self.stats.record(&verdict);
            if verdict.is_accept() {
                return Ok((scenario, rejects, resamples));
            }
            warn!(
                scenario_index = index,
                reasons = ?verdict.reasons(),
                "kernel rejected a constructed scenario"
            );
            rejects += 1;
        }

        Err(ScenarioError::InfeasibleRegime {
            scenario_index: index,
            attempts: self.settings.max_regime_resamples + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{compile, FixtureStore};

    fn spec() -> ConstraintSpec {
        compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap()
    }

    #[test]
    fn generates_the_requested_count_in_order() {
        let spec = spec();
        let engine = ScenarioEngine::new(
            &spec,
            SimSettings::default().with_seed(42),
            Arc::new(KernelStats::default()),
        );
        let set = engine.generate(100).unwrap();
        assert_eq!(set.len(), 100);
        assert!(!set.cancelled);
        for (expected, scenario) in set.scenarios.iter().enumerate() {
            assert_eq!(scenario.scenario_index, expected as u64);
        }
    }

    #[test]
    fn conservation_holds_for_every_scenario() {
        let spec = spec();
        let engine = ScenarioEngine::new(
            &spec,
            SimSettings::default().with_seed(7),
            Arc::new(KernelStats::default()),
        );
        let set = engine.generate(500).unwrap();
        let race_length = spec.track().race_length_laps;
        for scenario in &set.scenarios {
            let led: u32 = scenario.outcomes.iter().map(|o| o.laps_led).sum();
            assert_eq!(led, race_length);
            let fastest: u32 = scenario.outcomes.iter().map(|o| o.fastest_laps).sum();
            assert!(fastest <= scenario.regime.green_laps);
        }
    }

    #[test]
    fn identical_settings_replay_bit_identical_scenarios() {
        let spec = spec();
        let run = |threads: usize| {
            let engine = ScenarioEngine::new(
                &spec,
                SimSettings::default().with_seed(42).with_threads(threads),
                Arc::new(KernelStats::default()),
            );
            engine.generate(64).unwrap().scenarios
        };
        let single = run(1);
        let parallel = run(4);
        assert_eq!(single, parallel);
    }

    #[test]
    fn rejection_rate_stays_below_the_threshold() {
        let spec = spec();
        let stats = Arc::new(KernelStats::default());
        let engine =
            ScenarioEngine::new(&spec, SimSettings::default().with_seed(42), Arc::clone(&stats));
        let set = engine.generate(1000).unwrap();
        assert!(set.rejection_rate() <= 0.02, "rate = {}", set.rejection_rate());
        assert!(stats.rejection_rate() <= 0.02);
    }

    #[test]
    fn pre_set_cancel_flag_yields_an_empty_partial_set() {
        let spec = spec();
        let engine = ScenarioEngine::new(
            &spec,
            SimSettings::default().with_seed(1),
            Arc::new(KernelStats::default()),
        );
        engine.cancel_flag().store(true, Ordering::Relaxed);
        let set = engine.generate(10_000).unwrap();
        assert!(set.cancelled);
        assert!(set.is_empty());
    }

    #[test]
    fn fragmented_slate_keeps_leader_count_in_bounds() {
        // Superspeedway priors favor fragmented regimes; every scenario
        // must still land between one and three distinct leaders.
        let spec = spec();
        let engine = ScenarioEngine::new(
            &spec,
            SimSettings::default().with_seed(9),
            Arc::new(KernelStats::default()),
        );
        let set = engine.generate(300).unwrap();
        for scenario in &set.scenarios {
            let leaders = scenario.outcomes.iter().filter(|o| o.laps_led > 0).count();
            assert!((1..=3).contains(&leaders), "leaders = {leaders}");
        }
    }
}
