//! Fastest-lap allocation from a latent clean-air pace score.
//!
//! Pace blends a skill prior with the realized laps-led share; the blend
//! weight is the track's `pace_correlation`. The green-lap budget is spent
//! exactly, via the same largest-remainder integerization as laps led.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::constraint::ConstraintSpec;
use crate::scenario::laps::largest_remainder;
use crate::scenario::RaceFlowRegime;

/// Spread of the idiosyncratic pace term.
const PACE_NOISE_SD: f64 = 0.1;

/// Weight of the telemetry pace prior in the latent pace score.
const TELEMETRY_PACE_WEIGHT: f64 = 0.3;

/// Allocate fastest laps for one scenario, aligned with canonical driver
/// order. The total equals `regime.green_laps` exactly, which satisfies the
/// budget invariant with no slack.
pub(crate) fn allocate_fastest_laps(
    spec: &ConstraintSpec,
    regime: &RaceFlowRegime,
    laps_led: &[u32],
    pace_priors: Option<&[f64]>,
    rng: &mut StdRng,
) -> Vec<u32> {
    let race_length = spec.track().race_length_laps.max(1) as f64;
    let rho = spec.track().pace_correlation;
    let noise = Normal::new(0.0, PACE_NOISE_SD).expect("pace noise sd is positive");

    let weights: Vec<f64> = spec
        .drivers()
        .iter()
        .enumerate()
        .zip(laps_led)
        .map(|((i, driver), &led)| {
            let led_share = led as f64 / race_length;
            let prior_edge = pace_priors
                .map(|p| TELEMETRY_PACE_WEIGHT * (p[i] - 0.5))
                .unwrap_or(0.0);
            let base =
                (1.0 - rho) * (driver.skill + prior_edge + noise.sample(rng)) + rho * led_share;
            // Raising to a power sharpens the share curve: the quickest cars
            // take most green laps, backmarkers take few or none.
            base.max(0.0).powi(3)
        })
        .collect();

    largest_remainder(&weights, regime.green_laps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{compile, FixtureStore};
    use crate::rng::scenario_rng;
    use crate::scenario::laps::allocate_laps_led;
    use crate::scenario::sample_regime;

    fn spec() -> ConstraintSpec {
        compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap()
    }

    #[test]
    fn fastest_laps_spend_the_green_budget_exactly() {
        let spec = spec();
        for index in 0..200 {
            let mut rng = scenario_rng(21, index);
            let regime = sample_regime(spec.track(), &mut rng);
            let laps = allocate_laps_led(&spec, &regime, &mut rng).unwrap();
            let fastest = allocate_fastest_laps(&spec, &regime, &laps, None, &mut rng);
            assert_eq!(fastest.iter().sum::<u32>(), regime.green_laps);
        }
    }

    #[test]
    fn high_correlation_funnels_fastest_laps_to_the_dominator() {
        let spec = compile("charlotte-600", &FixtureStore::intermediate_fixture(40)).unwrap();
        assert!(spec.track().pace_correlation >= 0.7);
        let mut dominator_total = 0u64;
        let mut budget_total = 0u64;
        for index in 0..300 {
            let mut rng = scenario_rng(33, index);
            let regime = sample_regime(spec.track(), &mut rng);
            let laps = allocate_laps_led(&spec, &regime, &mut rng).unwrap();
            let fastest = allocate_fastest_laps(&spec, &regime, &laps, None, &mut rng);
            let top_leader = (0..spec.n_drivers()).max_by_key(|&i| laps[i]).unwrap();
            dominator_total += fastest[top_leader] as u64;
            budget_total += regime.green_laps as u64;
        }
        // The main dominator should take an outsized share of green laps.
        assert!(dominator_total as f64 / budget_total as f64 > 0.1);
    }
}
