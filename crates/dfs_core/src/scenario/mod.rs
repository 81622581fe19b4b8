//! Scenario engine: skeleton-narrative race regimes realized into
//! per-driver component outcomes.
//!
//! Generation is feasible by construction. The regime fixes the macro state
//! (cautions, pit strategy, dominator profile); allocators then distribute
//! laps led and fastest laps under exact conservation, assign a finish
//! permutation, and realize incidents. The kernel re-validates every
//! finished scenario before it is accepted.

mod engine;
mod finish;
mod laps;
mod pace;
mod regime;
mod types;

pub use engine::{ScenarioEngine, SimSettings};
pub use regime::sample_regime;
pub use types::{
    ConservationMeta, DominatorProfile, DriverOutcome, PitStrategy, RaceFlowRegime, Scenario,
    ScenarioSet,
};
