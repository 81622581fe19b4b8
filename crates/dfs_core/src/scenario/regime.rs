//! Race-flow regime sampling.
//!
//! The regime is the causal skeleton of a scenario: caution volume, the
//! field's pit approach, and how concentrated the lap-leading will be.
//! Everything downstream conditions on it.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Gamma, Poisson};

use crate::constraint::{TrackArchetype, TrackConstraint};
use crate::scenario::{DominatorProfile, PitStrategy, RaceFlowRegime};

/// Dispersion of the negative-binomial caution count. Smaller values widen
/// the tail relative to a Poisson of the same mean.
const CAUTION_DISPERSION: f64 = 4.0;

/// Categorical priors over pit strategy and dominator profile.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegimePriors {
    pub pit: [(PitStrategy, f64); 3],
    pub dominator: [(DominatorProfile, f64); 3],
}

pub(crate) fn priors_for(archetype: TrackArchetype) -> RegimePriors {
    use DominatorProfile::*;
    use PitStrategy::*;
    match archetype {
        // Pack racing: the lead cycles constantly and strategy splits the field.
        TrackArchetype::Superspeedway => RegimePriors {
            pit: [(Aggressive, 0.25), (Conservative, 0.25), (Split, 0.5)],
            dominator: [(Concentrated, 0.15), (Fragmented, 0.55), (Mixed, 0.3)],
        },
        TrackArchetype::Intermediate => RegimePriors {
            pit: [(Aggressive, 0.35), (Conservative, 0.4), (Split, 0.25)],
            dominator: [(Concentrated, 0.5), (Fragmented, 0.15), (Mixed, 0.35)],
        },
        TrackArchetype::ShortTrack => RegimePriors {
            pit: [(Aggressive, 0.3), (Conservative, 0.45), (Split, 0.25)],
            dominator: [(Concentrated, 0.55), (Fragmented, 0.1), (Mixed, 0.35)],
        },
        TrackArchetype::RoadCourse => RegimePriors {
            pit: [(Aggressive, 0.4), (Conservative, 0.3), (Split, 0.3)],
            dominator: [(Concentrated, 0.45), (Fragmented, 0.2), (Mixed, 0.35)],
        },
        TrackArchetype::Flat => RegimePriors {
            pit: [(Aggressive, 0.3), (Conservative, 0.4), (Split, 0.3)],
            dominator: [(Concentrated, 0.5), (Fragmented, 0.15), (Mixed, 0.35)],
        },
    }
}

fn sample_categorical<T: Copy>(weights: &[(T, f64)], rng: &mut StdRng) -> T {
    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    let mut draw = rng.gen::<f64>() * total;
    for (value, weight) in weights {
        draw -= weight;
        if draw <= 0.0 {
            return *value;
        }
    }
    weights[weights.len() - 1].0
}

/// Negative-binomial caution count via its Gamma-Poisson mixture.
fn sample_caution_count(mean: f64, rng: &mut StdRng) -> u32 {
    if mean <= 0.0 {
        return 0;
    }
    let gamma = Gamma::new(CAUTION_DISPERSION, mean / CAUTION_DISPERSION)
        .expect("caution gamma parameters are positive");
    let lambda: f64 = gamma.sample(rng);
    if lambda <= 0.0 {
        return 0;
    }
    let poisson = Poisson::new(lambda).expect("caution lambda is positive");
    poisson.sample(rng) as u32
}

/// Sample one race-flow regime for a track.
pub fn sample_regime(track: &TrackConstraint, rng: &mut StdRng) -> RaceFlowRegime {
    let race_length = track.race_length_laps;
    let mean_cautions = race_length as f64 * track.caution_rate;
    let cap = (race_length as f64 * 2.0 * track.caution_rate).ceil() as u32;
    let n_cautions = sample_caution_count(mean_cautions, rng).min(cap);

    let laps_per_caution = track.archetype.expected_laps_per_caution();
    let caution_laps =
        ((n_cautions as f64 * laps_per_caution).round() as u32).min(race_length);
    let green_laps = race_length - caution_laps;

    let priors = priors_for(track.archetype);
    RaceFlowRegime {
        n_cautions,
        pit_strategy: sample_categorical(&priors.pit, rng),
        dominator_profile: sample_categorical(&priors.dominator, rng),
        caution_laps,
        green_laps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{compile, FixtureStore};
    use crate::rng::scenario_rng;

    fn track() -> TrackConstraint {
        compile("daytona-500", &FixtureStore::superspeedway_fixture(8))
            .unwrap()
            .track()
            .clone()
    }

    #[test]
    fn regime_respects_lap_accounting() {
        let track = track();
        for index in 0..500 {
            let mut rng = scenario_rng(7, index);
            let regime = sample_regime(&track, &mut rng);
            assert_eq!(
                regime.green_laps + regime.caution_laps,
                track.race_length_laps
            );
            let cap = (track.race_length_laps as f64 * 2.0 * track.caution_rate).ceil() as u32;
            assert!(regime.n_cautions <= cap);
        }
    }

    #[test]
    fn caution_mean_tracks_the_rate() {
        let track = track();
        let total: u64 = (0..2000)
            .map(|index| {
                let mut rng = scenario_rng(11, index);
                sample_regime(&track, &mut rng).n_cautions as u64
            })
            .sum();
        let mean = total as f64 / 2000.0;
        let expected = track.race_length_laps as f64 * track.caution_rate;
        // The cap clips the upper tail, so the realized mean sits below the
        // parameter but well within the same regime.
        assert!(mean > expected * 0.5 && mean < expected * 1.2, "mean = {mean}");
    }

    #[test]
    fn zero_caution_rate_never_throws_a_yellow() {
        let mut track = track();
        track.caution_rate = 0.0;
        for index in 0..50 {
            let mut rng = scenario_rng(3, index);
            let regime = sample_regime(&track, &mut rng);
            assert_eq!(regime.n_cautions, 0);
            assert_eq!(regime.green_laps, track.race_length_laps);
        }
    }

    #[test]
    fn sampling_is_deterministic_per_seed() {
        let track = track();
        let a = sample_regime(&track, &mut scenario_rng(42, 9));
        let b = sample_regime(&track, &mut scenario_rng(42, 9));
        assert_eq!(a, b);
    }
}
