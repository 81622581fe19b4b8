//! Deterministic RNG derivation.
//!
//! Every sampling site derives its own `StdRng` from the run seed and a
//! structural index, so scenario content depends only on
//! `(seed, scenario_index)` and never on thread scheduling.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Mix a base seed with a structural index into an independent stream seed.
///
/// Plain `wrapping_add` leaves adjacent indices correlated through the upper
/// bits; a splitmix64 finalizer scrambles the whole word.
pub fn derive_seed(base: u64, index: u64) -> u64 {
    let mut z = base ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// RNG for one scenario, independent of all other scenarios in the run.
pub fn scenario_rng(seed: u64, scenario_index: u64) -> StdRng {
    StdRng::seed_from_u64(derive_seed(seed, scenario_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn derive_seed_is_deterministic() {
        assert_eq!(derive_seed(42, 7), derive_seed(42, 7));
        assert_ne!(derive_seed(42, 7), derive_seed(42, 8));
        assert_ne!(derive_seed(42, 7), derive_seed(43, 7));
    }

    #[test]
    fn adjacent_indices_produce_distinct_streams() {
        let a: u64 = scenario_rng(1, 0).gen();
        let b: u64 = scenario_rng(1, 1).gen();
        assert_ne!(a, b);
    }

    #[test]
    fn same_inputs_replay_identical_draws() {
        let draws_a: Vec<f64> = {
            let mut rng = scenario_rng(99, 3);
            (0..16).map(|_| rng.gen()).collect()
        };
        let draws_b: Vec<f64> = {
            let mut rng = scenario_rng(99, 3);
            (0..16).map(|_| rng.gen()).collect()
        };
        assert_eq!(draws_a, draws_b);
    }
}
