//! Calibration of a scenario set against observed outcomes.

use std::collections::BTreeMap;

use dfs_core::constraint::{ConstraintSpec, TrackArchetype};
use dfs_core::scenario::Scenario;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CalibrationError;
use crate::metrics::{compute_metrics, CalibrationMetrics};
use crate::observed::ObservedResult;

/// Joint events whose simulated probability is compared with the single
/// observed outcome frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointEvent {
    /// Finished in the top five without retiring.
    Top5NoDnf,
    /// Led at least one lap and finished on the lead lap group (top ten).
    LedAndTop10,
    /// Retired from the race.
    Dnf,
}

impl JointEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            JointEvent::Top5NoDnf => "top5_no_dnf",
            JointEvent::LedAndTop10 => "led_and_top10",
            JointEvent::Dnf => "dnf",
        }
    }

    fn holds_in_scenario(self, finish: u32, laps_led: u32, dnf: bool) -> bool {
        match self {
            JointEvent::Top5NoDnf => finish <= 5 && !dnf,
            JointEvent::LedAndTop10 => laps_led > 0 && finish <= 10,
            JointEvent::Dnf => dnf,
        }
    }
}

/// Marginal finish-position calibration for one archetype.
///
/// Builds, per observed driver, the scenario distribution of finish
/// positions and scores it against the observed finish.
pub fn assess_scenario_calibration(
    spec: &ConstraintSpec,
    scenarios: &[Scenario],
    observed: &[ObservedResult],
    archetype: TrackArchetype,
) -> Result<CalibrationMetrics, CalibrationError> {
    if spec.track().archetype != archetype || scenarios.is_empty() {
        return Err(CalibrationError::EmptyInput);
    }

    let mut predictions = Vec::new();
    let mut outcomes = Vec::new();
    for result in observed {
        let Some(driver_index) = spec.index_of(&result.driver_id) else {
            continue;
        };
        let samples: Vec<f64> = scenarios
            .iter()
            .map(|s| s.outcomes[driver_index].finish_position as f64)
            .collect();
        predictions.push(samples);
        outcomes.push(result.finish_position as f64);
    }
    debug!(
        archetype = archetype.as_str(),
        drivers = outcomes.len(),
        scenarios = scenarios.len(),
        "assessing finish-position calibration"
    );
    compute_metrics(&predictions, &outcomes)
}

/// Joint-event calibration error per event: `|P_sim - P_observed|`
/// averaged over drivers present in both inputs.
pub fn joint_event_validation(
    spec: &ConstraintSpec,
    scenarios: &[Scenario],
    observed: &[ObservedResult],
    events: &[JointEvent],
) -> Result<BTreeMap<String, f64>, CalibrationError> {
    if scenarios.is_empty() || observed.is_empty() {
        return Err(CalibrationError::EmptyInput);
    }

    let mut errors = BTreeMap::new();
    for &event in events {
        let mut total_error = 0.0;
        let mut counted = 0usize;
        for result in observed {
            let Some(driver_index) = spec.index_of(&result.driver_id) else {
                continue;
            };
            let simulated = scenarios
                .iter()
                .filter(|s| {
                    let outcome = &s.outcomes[driver_index];
                    event.holds_in_scenario(
                        outcome.finish_position,
                        outcome.laps_led,
                        outcome.dnf_lap.is_some(),
                    )
                })
                .count() as f64
                / scenarios.len() as f64;
            let actual = if event.holds_in_scenario(
                result.finish_position,
                result.laps_led,
                result.dnf == 1,
            ) {
                1.0
            } else {
                0.0
            };
            total_error += (simulated - actual).abs();
            counted += 1;
        }
        if counted == 0 {
            return Err(CalibrationError::EmptyInput);
        }
        errors.insert(event.as_str().to_string(), total_error / counted as f64);
    }
    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_core::constraint::{compile, FixtureStore};
    use dfs_core::kernel::KernelStats;
    use dfs_core::scenario::{ScenarioEngine, SimSettings};
    use std::sync::Arc;

    fn fixture() -> (ConstraintSpec, Vec<Scenario>) {
        let spec = compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap();
        let engine = ScenarioEngine::new(
            &spec,
            SimSettings::default().with_seed(42),
            Arc::new(KernelStats::default()),
        );
        let set = engine.generate(200).unwrap();
        (spec, set.scenarios)
    }

    fn observed(spec: &ConstraintSpec) -> Vec<ObservedResult> {
        spec.drivers()
            .iter()
            .enumerate()
            .map(|(i, d)| ObservedResult {
                driver_id: d.driver_id.clone(),
                finish_position: (i + 1) as u32,
                laps_led: if i == 0 { 150 } else if i == 1 { 50 } else { 0 },
                fastest_laps: if i < 3 { 20 } else { 0 },
                dnf: 0,
            })
            .collect()
    }

    #[test]
    fn marginal_metrics_are_finite_and_plausible() {
        let (spec, scenarios) = fixture();
        let metrics = assess_scenario_calibration(
            &spec,
            &scenarios,
            &observed(&spec),
            TrackArchetype::Superspeedway,
        )
        .unwrap();
        assert!(metrics.crps.is_finite() && metrics.crps > 0.0);
        assert!(metrics.log_score.is_finite());
        assert!((0.0..=1.0).contains(&metrics.coverage_50));
        assert!(metrics.coverage_95 >= metrics.coverage_50);
    }

    #[test]
    fn wrong_archetype_is_an_input_error() {
        let (spec, scenarios) = fixture();
        let err = assess_scenario_calibration(
            &spec,
            &scenarios,
            &observed(&spec),
            TrackArchetype::RoadCourse,
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationError::EmptyInput));
    }

    #[test]
    fn joint_event_errors_are_probabilities() {
        let (spec, scenarios) = fixture();
        let errors = joint_event_validation(
            &spec,
            &scenarios,
            &observed(&spec),
            &[JointEvent::Top5NoDnf, JointEvent::Dnf],
        )
        .unwrap();
        assert_eq!(errors.len(), 2);
        for (_, error) in errors {
            assert!((0.0..=1.0).contains(&error));
        }
    }
}
