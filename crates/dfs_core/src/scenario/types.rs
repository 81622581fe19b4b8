use serde::{Deserialize, Serialize};

/// Pit strategy the field converges on in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitStrategy {
    Aggressive,
    Conservative,
    Split,
}

/// How concentrated the lap-leading is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DominatorProfile {
    Concentrated,
    Fragmented,
    Mixed,
}

/// Sampled macro state of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceFlowRegime {
    pub n_cautions: u32,
    pub pit_strategy: PitStrategy,
    pub dominator_profile: DominatorProfile,
    /// Laps estimated to run under yellow.
    pub caution_laps: u32,
    /// `race_length_laps - caution_laps`; never negative.
    pub green_laps: u32,
}

/// Realized component outcomes for one driver in one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverOutcome {
    /// 1-based finish position.
    pub finish_position: u32,
    pub laps_led: u32,
    pub fastest_laps: u32,
    /// Whether the driver was collected in an incident.
    pub incident: bool,
    /// Lap of retirement, when the incident ended the run.
    pub dnf_lap: Option<u32>,
}

/// Bookkeeping the kernel checks against the regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConservationMeta {
    pub incident_count: u32,
    pub caution_laps: u32,
}

/// One fully realized scenario.
///
/// `outcomes` is aligned with the spec's canonical driver order; the
/// scenario id is `(run_id, scenario_index)` and needs no storage of its
/// own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_index: u64,
    pub regime: RaceFlowRegime,
    pub outcomes: Vec<DriverOutcome>,
    pub meta: ConservationMeta,
}

/// Output of one generation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioSet {
    /// Accepted scenarios in ascending `scenario_index`.
    pub scenarios: Vec<Scenario>,
    /// True when generation stopped at the cancellation flag; the set is
    /// partial but internally consistent.
    pub cancelled: bool,
    /// Scenarios the kernel rejected (each was regenerated).
    pub n_rejected: u64,
    /// Regime resamples consumed by infeasible clamp reallocations.
    pub n_regime_resamples: u64,
}

impl ScenarioSet {
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Rejections over all kernel validations in this pass.
    pub fn rejection_rate(&self) -> f64 {
        let total = self.scenarios.len() as u64 + self.n_rejected;
        if total == 0 {
            return 0.0;
        }
        self.n_rejected as f64 / total as f64
    }
}
