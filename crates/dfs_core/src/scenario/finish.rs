//! Finish-order and incident realization.
//!
//! A latent performance score turns into a permutation through a
//! competitive sort; incidents are realized afterwards, and fatal ones
//! demote their drivers into the bottom of the running order by retirement
//! lap.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::constraint::ConstraintSpec;
use crate::scenario::{DriverOutcome, PitStrategy, RaceFlowRegime};

/// Cars one caution can collect; keeps incident volume consistent with the
/// sampled caution count.
const MAX_CARS_PER_CAUTION: u32 = 4;

/// Probability that an incident ends the car's day.
const FATAL_SHARE: f64 = 0.5;

/// Multiplier turning the risk blend into a per-race incident probability.
const INCIDENT_SCALE: f64 = 4.0;

/// Weight of the telemetry pace prior in the latent finish score.
const TELEMETRY_FINISH_WEIGHT: f64 = 0.2;

/// Latent finish score, higher is better.
fn performance_score(
    spec: &ConstraintSpec,
    driver_index: usize,
    laps_led: &[u32],
    pace_priors: Option<&[f64]>,
    regime: &RaceFlowRegime,
    rng: &mut StdRng,
) -> f64 {
    let track = spec.track();
    let driver = spec.driver(driver_index);
    let field = track.field_size.max(1) as f64;
    let start_edge = 1.0 - (driver.start_position as f64 - 1.0) / field;
    let led_share = laps_led[driver_index] as f64 / track.race_length_laps.max(1) as f64;
    let prior_edge = pace_priors
        .map(|p| TELEMETRY_FINISH_WEIGHT * (p[driver_index] - 0.5))
        .unwrap_or(0.0);

    // Aggressive pit cycles reward aggressive drivers slightly; split
    // strategies add variance through the start-position term instead.
    let strategy_edge = match regime.pit_strategy {
        PitStrategy::Aggressive => 0.1 * driver.aggression,
        PitStrategy::Conservative => 0.05 * (1.0 - driver.aggression),
        PitStrategy::Split => 0.0,
    };

    let noise = Normal::new(0.0, track.archetype.finish_noise_scale())
        .expect("finish noise scale is positive");
    driver.skill * 1.2
        + start_edge * 0.3
        + led_share * 0.5
        + strategy_edge
        + prior_edge
        + noise.sample(rng)
}

/// Realize finish positions, incidents, and DNFs for one scenario.
///
/// Returns outcomes with `laps_led`/`fastest_laps` zeroed; the engine
/// merges the allocations in. The second element is the incident count.
pub(crate) fn realize_finish(
    spec: &ConstraintSpec,
    regime: &RaceFlowRegime,
    laps_led: &[u32],
    pace_priors: Option<&[f64]>,
    rng: &mut StdRng,
) -> (Vec<DriverOutcome>, u32) {
    let n = spec.n_drivers();
    let track = spec.track();

    // Competitive sort: higher score first, canonical index breaks ties.
    let mut order: Vec<(usize, f64)> = (0..n)
        .map(|i| (i, performance_score(spec, i, laps_led, pace_priors, regime, rng)))
        .collect();
    order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));

    // Incidents. A race with no cautions has no one to collect.
    let caution_budget = regime.n_cautions * MAX_CARS_PER_CAUTION;
    let mut incidents: Vec<(usize, f64)> = Vec::new();
    if caution_budget > 0 {
        for i in 0..n {
            let driver = spec.driver(i);
            let p = (track.caution_rate
                * INCIDENT_SCALE
                * (0.5 * driver.shadow_risk + 0.3 * driver.aggression))
                .min(0.5);
            if rng.gen::<f64>() < p {
                incidents.push((i, p));
            }
        }
        if incidents.len() as u32 > caution_budget {
            // Keep the most exposed cars; deterministic tie-break on index.
            incidents.sort_by(|a, b| {
                b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0))
            });
            incidents.truncate(caution_budget as usize);
        }
    }

    let mut outcome_for = vec![
        DriverOutcome {
            finish_position: 0,
            laps_led: 0,
            fastest_laps: 0,
            incident: false,
            dnf_lap: None,
        };
        n
    ];
    for &(i, _) in &incidents {
        outcome_for[i].incident = true;
        if rng.gen::<f64>() < FATAL_SHARE {
            outcome_for[i].dnf_lap = Some(rng.gen_range(1..=track.race_length_laps));
        }
    }

    // Running cars keep their competitive order at the top; retired cars
    // fill the bottom, earliest retirement last.
    let runners: Vec<usize> = order
        .iter()
        .map(|&(i, _)| i)
        .filter(|&i| outcome_for[i].dnf_lap.is_none())
        .collect();
    let mut retired: Vec<usize> = (0..n).filter(|&i| outcome_for[i].dnf_lap.is_some()).collect();
    retired.sort_by(|&a, &b| {
        outcome_for[b]
            .dnf_lap
            .cmp(&outcome_for[a].dnf_lap)
            .then_with(|| a.cmp(&b))
    });

    for (position, &i) in runners.iter().chain(retired.iter()).enumerate() {
        outcome_for[i].finish_position = (position + 1) as u32;
    }

    let incident_count = incidents.len() as u32;
    (outcome_for, incident_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{compile, FixtureStore};
    use crate::rng::scenario_rng;
    use crate::scenario::sample_regime;

    fn spec() -> ConstraintSpec {
        compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap()
    }

    #[test]
    fn finish_positions_form_a_permutation() {
        let spec = spec();
        let laps = vec![0u32; spec.n_drivers()];
        for index in 0..300 {
            let mut rng = scenario_rng(17, index);
            let regime = sample_regime(spec.track(), &mut rng);
            let (outcomes, _) = realize_finish(&spec, &regime, &laps, None, &mut rng);
            let mut positions: Vec<u32> = outcomes.iter().map(|o| o.finish_position).collect();
            positions.sort_unstable();
            let expected: Vec<u32> = (1..=spec.track().field_size).collect();
            assert_eq!(positions, expected);
        }
    }

    #[test]
    fn retired_cars_finish_behind_runners_ordered_by_retirement_lap() {
        let spec = spec();
        let laps = vec![0u32; spec.n_drivers()];
        for index in 0..300 {
            let mut rng = scenario_rng(29, index);
            let regime = sample_regime(spec.track(), &mut rng);
            let (outcomes, _) = realize_finish(&spec, &regime, &laps, None, &mut rng);
            let worst_runner = outcomes
                .iter()
                .filter(|o| o.dnf_lap.is_none())
                .map(|o| o.finish_position)
                .max()
                .unwrap();
            let mut retired: Vec<(u32, u32)> = outcomes
                .iter()
                .filter_map(|o| o.dnf_lap.map(|lap| (o.finish_position, lap)))
                .collect();
            for &(position, _) in &retired {
                assert!(position > worst_runner);
            }
            // Walking down the retired group, retirement laps never increase.
            retired.sort_by_key(|&(position, _)| position);
            for pair in retired.windows(2) {
                assert!(pair[0].1 >= pair[1].1);
            }
        }
    }

    #[test]
    fn incident_count_respects_caution_budget() {
        let spec = spec();
        let laps = vec![0u32; spec.n_drivers()];
        for index in 0..300 {
            let mut rng = scenario_rng(41, index);
            let regime = sample_regime(spec.track(), &mut rng);
            let (outcomes, incident_count) = realize_finish(&spec, &regime, &laps, None, &mut rng);
            assert!(incident_count <= regime.n_cautions * MAX_CARS_PER_CAUTION);
            assert_eq!(
                outcomes.iter().filter(|o| o.incident).count() as u32,
                incident_count
            );
            if regime.n_cautions == 0 {
                assert_eq!(incident_count, 0);
            }
        }
    }
}
