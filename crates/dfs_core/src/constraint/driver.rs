use serde::{Deserialize, Serialize};

/// Per-driver constraints and priors for one slate.
///
/// All fields are fixed at compile time; the scenario engine and solver
/// only ever read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConstraint {
    /// Opaque identity, unique within the slate.
    pub driver_id: String,
    /// Team identity used by stacking caps.
    pub team_id: String,
    /// DraftKings salary.
    pub salary: u32,
    /// Grid position at the green flag (1-based).
    pub start_position: u32,
    /// Latent pace prior in `[0, 1]`.
    pub skill: f64,
    /// Risk appetite in `[0, 1]`; raises both upside and incident odds.
    pub aggression: f64,
    /// Exposure to other drivers' incidents in `[0, 1]`.
    pub shadow_risk: f64,
    /// Lower bound on laps led when this driver leads at all.
    pub min_laps_led: u32,
    /// Upper bound on laps led in any scenario.
    pub max_laps_led: u32,
    /// Opaque veto tags; tags shared with the slate veto list exclude the
    /// driver from lineups.
    pub veto_tags: Vec<String>,
}

impl DriverConstraint {
    /// Whether any of this driver's veto tags appears in `active_tags`.
    pub fn is_vetoed_by(&self, active_tags: &[String]) -> bool {
        self.veto_tags.iter().any(|t| active_tags.contains(t))
    }
}
