//! Fixed DraftKings points scorer.
//!
//! Coefficients and the finish table live in [`ScoringConstants`], which is
//! part of the compiled spec and therefore of the spec hash: changing a
//! coefficient produces a different slate artifact, never a silently
//! different score for the same one.

use serde::{Deserialize, Serialize};

use crate::constraint::{ConstraintSpec, DriverConstraint};
use crate::scenario::{DriverOutcome, Scenario};

/// Largest starting field the finish table covers.
const MAX_FIELD_SIZE: usize = 43;

/// DK scoring coefficients for one contest ruleset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConstants {
    /// Points by finish position, index 0 = P1. Monotone decreasing.
    pub finish_points: Vec<f64>,
    /// Points per position gained (alpha).
    pub place_diff_point: f64,
    /// Symmetric clamp on total place differential points.
    pub place_diff_clamp: f64,
    /// Points per lap led (beta).
    pub laps_led_point: f64,
    /// Points per fastest lap (gamma).
    pub fastest_lap_point: f64,
    /// Flat subtraction applied on DNF; place differential is also zeroed.
    pub dnf_penalty: f64,
}

impl Default for ScoringConstants {
    fn default() -> Self {
        // P1 = 45, P2 = 42, then one point per position down to a floor of 1.
        let mut finish_points = Vec::with_capacity(MAX_FIELD_SIZE);
        finish_points.push(45.0);
        for position in 2..=MAX_FIELD_SIZE as u32 {
            finish_points.push(f64::max(44.0 - position as f64, 1.0));
        }
        Self {
            finish_points,
            place_diff_point: 1.0,
            place_diff_clamp: 40.0,
            laps_led_point: 0.25,
            fastest_lap_point: 0.45,
            dnf_penalty: 5.0,
        }
    }
}

impl ScoringConstants {
    /// Finish points for a 1-based position. Positions past the table floor
    /// score the final entry.
    pub fn finish_points_for(&self, position: u32) -> f64 {
        let idx = (position.max(1) as usize - 1).min(self.finish_points.len() - 1);
        self.finish_points[idx]
    }
}

/// DK points for one driver's realized outcome.
pub fn score_driver(
    constants: &ScoringConstants,
    driver: &DriverConstraint,
    outcome: &DriverOutcome,
) -> f64 {
    let finish = constants.finish_points_for(outcome.finish_position);
    let volume = constants.laps_led_point * outcome.laps_led as f64
        + constants.fastest_lap_point * outcome.fastest_laps as f64;

    if outcome.dnf_lap.is_some() {
        // A retired car keeps its lap volume but loses the differential.
        return finish + volume - constants.dnf_penalty;
    }

    let raw_diff = constants.place_diff_point
        * (driver.start_position as f64 - outcome.finish_position as f64);
    let place_diff = raw_diff.clamp(-constants.place_diff_clamp, constants.place_diff_clamp);
    finish + place_diff + volume
}

/// DK points for every driver in a scenario, aligned with spec driver order.
pub fn score_scenario(spec: &ConstraintSpec, scenario: &Scenario) -> Vec<f64> {
    spec.drivers()
        .iter()
        .zip(scenario.outcomes.iter())
        .map(|(driver, outcome)| score_driver(spec.scoring(), driver, outcome))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(start_position: u32) -> DriverConstraint {
        DriverConstraint {
            driver_id: "d".to_string(),
            team_id: "t".to_string(),
            salary: 8000,
            start_position,
            skill: 0.5,
            aggression: 0.5,
            shadow_risk: 0.5,
            min_laps_led: 0,
            max_laps_led: 100,
            veto_tags: Vec::new(),
        }
    }

    fn outcome(finish: u32, laps_led: u32, fastest: u32, dnf_lap: Option<u32>) -> DriverOutcome {
        DriverOutcome {
            finish_position: finish,
            laps_led,
            fastest_laps: fastest,
            incident: dnf_lap.is_some(),
            dnf_lap,
        }
    }

    #[test]
    fn finish_table_is_monotone_decreasing() {
        let constants = ScoringConstants::default();
        for pair in constants.finish_points.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        assert_eq!(constants.finish_points_for(1), 45.0);
        assert_eq!(constants.finish_points_for(2), 42.0);
        // Past the table floor every position scores the same.
        assert_eq!(
            constants.finish_points_for(60),
            constants.finish_points_for(43)
        );
    }

    #[test]
    fn winner_from_pole_scores_finish_plus_volume() {
        let constants = ScoringConstants::default();
        let points = score_driver(&constants, &driver(1), &outcome(1, 100, 20, None));
        // 45 finish + 0 differential + 25 laps led + 9 fastest laps.
        assert!((points - 79.0).abs() < 1e-9);
    }

    #[test]
    fn place_differential_is_signed_and_clamped() {
        let constants = ScoringConstants::default();
        let gained = score_driver(&constants, &driver(30), &outcome(5, 0, 0, None));
        let lost = score_driver(&constants, &driver(5), &outcome(30, 0, 0, None));
        assert!(gained > lost);

        let mut tight = ScoringConstants::default();
        tight.place_diff_clamp = 10.0;
        let clamped = score_driver(&tight, &driver(40), &outcome(1, 0, 0, None));
        assert!((clamped - (45.0 + 10.0)).abs() < 1e-9);
    }

    #[test]
    fn dnf_zeroes_differential_and_subtracts_penalty() {
        let constants = ScoringConstants::default();
        let points = score_driver(&constants, &driver(40), &outcome(38, 12, 0, Some(120)));
        let expected = constants.finish_points_for(38) + 0.25 * 12.0 - 5.0;
        assert!((points - expected).abs() < 1e-9);
    }
}
