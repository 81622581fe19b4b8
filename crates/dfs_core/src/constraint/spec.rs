use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constraint::{DriverConstraint, TrackConstraint};
use crate::scoring::ScoringConstants;

/// Slate identity and provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlateMeta {
    pub slate_id: String,
    /// Wall-clock compile time (epoch ms). Provenance only; excluded from
    /// the spec hash so identical inputs hash identically on any host.
    pub compiled_at_ms: u64,
    /// Schema version of the compiled artifact.
    pub version: u32,
}

/// The immutable compiled slate artifact.
///
/// Drivers are stored sorted by `driver_id`, which fixes the canonical
/// order used everywhere downstream: score matrix columns, solver variable
/// order, and lexicographic tie-breaks all follow this array.
///
/// All fields are private; after construction nothing can mutate the spec,
/// so it is safe to share across threads without locking.
#[derive(Debug, Clone)]
pub struct ConstraintSpec {
    slate: SlateMeta,
    drivers: Vec<DriverConstraint>,
    driver_index: BTreeMap<String, usize>,
    tracks: BTreeMap<String, TrackConstraint>,
    race_track_id: String,
    active_veto_tags: Vec<String>,
    scoring: ScoringConstants,
    team_cap_default: u32,
    spec_hash: String,
}

impl ConstraintSpec {
    /// Assembled by [`crate::constraint::compile`] after validation; the
    /// hash is computed over the canonical encoding of everything but
    /// `compiled_at_ms`.
    pub(crate) fn from_parts(
        slate: SlateMeta,
        drivers: Vec<DriverConstraint>,
        tracks: BTreeMap<String, TrackConstraint>,
        race_track_id: String,
        active_veto_tags: Vec<String>,
        scoring: ScoringConstants,
        team_cap_default: u32,
        spec_hash: String,
    ) -> Self {
        debug_assert!(drivers.windows(2).all(|w| w[0].driver_id < w[1].driver_id));
        let driver_index = drivers
            .iter()
            .enumerate()
            .map(|(i, d)| (d.driver_id.clone(), i))
            .collect();
        Self {
            slate,
            drivers,
            driver_index,
            tracks,
            race_track_id,
            active_veto_tags,
            scoring,
            team_cap_default,
            spec_hash,
        }
    }

    pub fn slate(&self) -> &SlateMeta {
        &self.slate
    }

    /// All drivers, sorted by `driver_id`.
    pub fn drivers(&self) -> &[DriverConstraint] {
        &self.drivers
    }

    pub fn n_drivers(&self) -> usize {
        self.drivers.len()
    }

    pub fn driver(&self, index: usize) -> &DriverConstraint {
        &self.drivers[index]
    }

    /// Canonical index for a driver id, if it belongs to this slate.
    pub fn index_of(&self, driver_id: &str) -> Option<usize> {
        self.driver_index.get(driver_id).copied()
    }

    /// The track this slate races on.
    pub fn track(&self) -> &TrackConstraint {
        &self.tracks[&self.race_track_id]
    }

    pub fn tracks(&self) -> &BTreeMap<String, TrackConstraint> {
        &self.tracks
    }

    /// Slate-level veto tags currently in force.
    pub fn active_veto_tags(&self) -> &[String] {
        &self.active_veto_tags
    }

    /// Whether a driver is excluded from lineups by the active veto tags.
    pub fn is_driver_vetoed(&self, index: usize) -> bool {
        self.drivers[index].is_vetoed_by(&self.active_veto_tags)
    }

    pub fn scoring(&self) -> &ScoringConstants {
        &self.scoring
    }

    /// Default per-team lineup cap when the request does not override it.
    pub fn team_cap_default(&self) -> u32 {
        self.team_cap_default
    }

    /// Content hash of the compiled artifact (hex SHA-256).
    pub fn spec_hash(&self) -> &str {
        &self.spec_hash
    }

    /// Distinct team ids, sorted.
    pub fn team_ids(&self) -> Vec<&str> {
        let mut teams: Vec<&str> = self.drivers.iter().map(|d| d.team_id.as_str()).collect();
        teams.sort_unstable();
        teams.dedup();
        teams
    }
}
