//! Spec compilation from the external ontology store.
//!
//! Compilation is the only place the engine talks to the store: one batch
//! read for drivers, one for tracks, one for slate veto tags. Every field is
//! validated on load so downstream code can index and sample without
//! re-checking. After `compile` returns, the store must never be queried
//! again for the run.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constraint::hash::{canonical_encoding, hash_encoding};
use crate::constraint::{
    ConstraintSpec, DriverConstraint, SlateMeta, TrackArchetype, TrackConstraint,
};
use crate::error::CompileError;
use crate::scoring::ScoringConstants;

/// Schema version of the compiled artifact.
const SPEC_VERSION: u32 = 1;

/// Per-team lineup cap applied when a run does not override it.
const DEFAULT_TEAM_CAP: u32 = 3;

/// Driver row as returned by the store, prior to validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDriverRecord {
    pub driver_id: String,
    pub team_id: String,
    pub salary: u32,
    pub start_position: u32,
    pub skill: f64,
    pub aggression: f64,
    pub shadow_risk: f64,
    pub min_laps_led: u32,
    pub max_laps_led: u32,
    pub veto_tags: Vec<String>,
}

/// Track row as returned by the store, prior to validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTrackRecord {
    pub track_id: String,
    /// Archetype string; must parse into [`TrackArchetype`].
    pub archetype: String,
    pub race_length_laps: u32,
    pub difficulty: f64,
    pub aggression_factor: f64,
    pub caution_rate: f64,
    pub pit_window_laps: Vec<u32>,
    pub field_size: u32,
    /// Calibrated laps-led/pace correlation; archetype default when absent.
    pub pace_correlation: Option<f64>,
}

/// Read-only batch interface to the external graph store.
///
/// Implementations must answer each call in a single round trip; compile
/// performs a bounded number of calls and nothing else ever queries the
/// store.
pub trait OntologyStore {
    /// All drivers entered in the slate.
    fn fetch_drivers(&self, slate_id: &str) -> Result<Vec<RawDriverRecord>, CompileError>;

    /// Track rows for the slate; the first row is the track being raced.
    fn fetch_tracks(&self, slate_id: &str) -> Result<Vec<RawTrackRecord>, CompileError>;

    /// Slate-level veto tags in force.
    fn fetch_veto_tags(&self, _slate_id: &str) -> Result<Vec<String>, CompileError> {
        Ok(Vec::new())
    }
}

/// Compile the immutable spec for a slate.
pub fn compile(slate_id: &str, store: &dyn OntologyStore) -> Result<ConstraintSpec, CompileError> {
    let raw_drivers = store.fetch_drivers(slate_id)?;
    let raw_tracks = store.fetch_tracks(slate_id)?;
    let active_veto_tags = store.fetch_veto_tags(slate_id)?;

    if raw_drivers.is_empty() {
        return Err(CompileError::MissingEntity(format!(
            "slate '{slate_id}' has no drivers"
        )));
    }
    let race_track_id = raw_tracks
        .first()
        .map(|t| t.track_id.clone())
        .ok_or_else(|| {
            CompileError::MissingEntity(format!("slate '{slate_id}' has no track"))
        })?;

    let mut tracks = BTreeMap::new();
    for raw in raw_tracks {
        let track = validate_track(raw)?;
        tracks.insert(track.track_id.clone(), track);
    }
    let race_track = &tracks[&race_track_id];

    let mut drivers = Vec::with_capacity(raw_drivers.len());
    let mut seen = BTreeSet::new();
    for raw in raw_drivers {
        if !seen.insert(raw.driver_id.clone()) {
            return Err(CompileError::Invariant(format!(
                "duplicate driver_id '{}'",
                raw.driver_id
            )));
        }
        drivers.push(validate_driver(raw, race_track)?);
    }
    drivers.sort_by(|a, b| a.driver_id.cmp(&b.driver_id));

    if race_track.field_size as usize != drivers.len() {
        return Err(CompileError::Invariant(format!(
            "track field_size {} does not match {} slate drivers",
            race_track.field_size,
            drivers.len()
        )));
    }

    let slate = SlateMeta {
        slate_id: slate_id.to_string(),
        compiled_at_ms: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0),
        version: SPEC_VERSION,
    };
    let scoring = ScoringConstants::default();
    let spec_hash = hash_encoding(&canonical_encoding(
        &slate,
        &drivers,
        &tracks,
        &race_track_id,
        &active_veto_tags,
        &scoring,
        DEFAULT_TEAM_CAP,
    ));
    info!(slate_id, spec_hash = %spec_hash, n_drivers = drivers.len(), "compiled slate spec");

    Ok(ConstraintSpec::from_parts(
        slate,
        drivers,
        tracks,
        race_track_id,
        active_veto_tags,
        scoring,
        DEFAULT_TEAM_CAP,
        spec_hash,
    ))
}

fn check_unit(value: f64, field: &str, owner: &str) -> Result<(), CompileError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(CompileError::RangeViolation(format!(
            "{owner}: {field} = {value} outside [0, 1]"
        )));
    }
    Ok(())
}

fn validate_driver(
    raw: RawDriverRecord,
    track: &TrackConstraint,
) -> Result<DriverConstraint, CompileError> {
    let id = &raw.driver_id;
    if id.trim().is_empty() {
        return Err(CompileError::RangeViolation("empty driver_id".to_string()));
    }
    check_unit(raw.skill, "skill", id)?;
    check_unit(raw.aggression, "aggression", id)?;
    check_unit(raw.shadow_risk, "shadow_risk", id)?;
    if raw.start_position == 0 || raw.start_position > track.field_size {
        return Err(CompileError::RangeViolation(format!(
            "{id}: start_position {} outside [1, {}]",
            raw.start_position, track.field_size
        )));
    }
    if raw.min_laps_led > raw.max_laps_led {
        return Err(CompileError::Invariant(format!(
            "{id}: min_laps_led {} > max_laps_led {}",
            raw.min_laps_led, raw.max_laps_led
        )));
    }
    if raw.max_laps_led > track.race_length_laps {
        return Err(CompileError::RangeViolation(format!(
            "{id}: max_laps_led {} exceeds race length {}",
            raw.max_laps_led, track.race_length_laps
        )));
    }

    Ok(DriverConstraint {
        driver_id: raw.driver_id,
        team_id: raw.team_id,
        salary: raw.salary,
        start_position: raw.start_position,
        skill: raw.skill,
        aggression: raw.aggression,
        shadow_risk: raw.shadow_risk,
        min_laps_led: raw.min_laps_led,
        max_laps_led: raw.max_laps_led,
        veto_tags: raw.veto_tags,
    })
}

fn validate_track(raw: RawTrackRecord) -> Result<TrackConstraint, CompileError> {
    let id = &raw.track_id;
    let archetype = TrackArchetype::parse(&raw.archetype).ok_or_else(|| {
        CompileError::RangeViolation(format!("{id}: unknown archetype '{}'", raw.archetype))
    })?;
    if raw.race_length_laps == 0 {
        return Err(CompileError::RangeViolation(format!(
            "{id}: race_length_laps must be positive"
        )));
    }
    if raw.field_size == 0 {
        return Err(CompileError::RangeViolation(format!(
            "{id}: field_size must be positive"
        )));
    }
    check_unit(raw.difficulty, "difficulty", id)?;
    check_unit(raw.aggression_factor, "aggression_factor", id)?;
    check_unit(raw.caution_rate, "caution_rate", id)?;

    let mut previous = 0u32;
    for &window in &raw.pit_window_laps {
        if window == 0 || window >= raw.race_length_laps {
            return Err(CompileError::RangeViolation(format!(
                "{id}: pit window {window} outside (0, {})",
                raw.race_length_laps
            )));
        }
        if window <= previous {
            return Err(CompileError::Invariant(format!(
                "{id}: pit windows must be strictly ascending"
            )));
        }
        previous = window;
    }

    let pace_correlation = match raw.pace_correlation {
        Some(value) => {
            check_unit(value, "pace_correlation", id)?;
            value
        }
        None => archetype.default_pace_correlation(),
    };

    Ok(TrackConstraint {
        track_id: raw.track_id,
        archetype,
        race_length_laps: raw.race_length_laps,
        difficulty: raw.difficulty,
        aggression_factor: raw.aggression_factor,
        caution_rate: raw.caution_rate,
        pit_window_laps: raw.pit_window_laps,
        field_size: raw.field_size,
        pace_correlation,
    })
}

/// In-memory store for tests and the offline path.
#[derive(Debug, Default, Clone)]
pub struct FixtureStore {
    drivers: BTreeMap<String, Vec<RawDriverRecord>>,
    tracks: BTreeMap<String, Vec<RawTrackRecord>>,
    veto_tags: BTreeMap<String, Vec<String>>,
    /// When set, every fetch fails as if the store were down.
    pub unavailable: bool,
}

impl FixtureStore {
    pub fn insert_slate(
        &mut self,
        slate_id: &str,
        drivers: Vec<RawDriverRecord>,
        tracks: Vec<RawTrackRecord>,
    ) {
        self.drivers.insert(slate_id.to_string(), drivers);
        self.tracks.insert(slate_id.to_string(), tracks);
    }

    pub fn set_veto_tags(&mut self, slate_id: &str, tags: Vec<String>) {
        self.veto_tags.insert(slate_id.to_string(), tags);
    }

    /// Deterministic superspeedway slate sized for `field_size` cars,
    /// registered under slate id `daytona-500`.
    ///
    /// Salaries descend from $11,000 in $150 steps; skill descends with
    /// grid position; teams group four cars each.
    pub fn superspeedway_fixture(field_size: u32) -> Self {
        let track = RawTrackRecord {
            track_id: "daytona".to_string(),
            archetype: "superspeedway".to_string(),
            race_length_laps: 200,
            difficulty: 0.4,
            aggression_factor: 0.8,
            caution_rate: 0.05,
            pit_window_laps: vec![45, 95, 150],
            field_size,
            pace_correlation: None,
        };
        Self::fixture_with_track("daytona-500", track)
    }

    /// Deterministic intermediate-track slate (`charlotte-600`, 400 laps).
    pub fn intermediate_fixture(field_size: u32) -> Self {
        let track = RawTrackRecord {
            track_id: "charlotte".to_string(),
            archetype: "intermediate".to_string(),
            race_length_laps: 400,
            difficulty: 0.6,
            aggression_factor: 0.5,
            caution_rate: 0.02,
            pit_window_laps: vec![55, 110, 170, 230, 290, 350],
            field_size,
            pace_correlation: None,
        };
        Self::fixture_with_track("charlotte-600", track)
    }

    fn fixture_with_track(slate_id: &str, track: RawTrackRecord) -> Self {
        let field_size = track.field_size;
        let race_length = track.race_length_laps;
        let drivers = (0..field_size)
            .map(|i| {
                let skill = 0.95 - 0.018 * i as f64;
                RawDriverRecord {
                    driver_id: format!("driver_{:02}", i + 1),
                    team_id: format!("team_{:02}", i / 4 + 1),
                    salary: 11_000 - 150 * i,
                    start_position: i + 1,
                    skill: skill.max(0.05),
                    aggression: 0.3 + 0.4 * ((i % 5) as f64 / 4.0),
                    shadow_risk: 0.1 + 0.5 * ((i % 7) as f64 / 6.0),
                    min_laps_led: 0,
                    max_laps_led: (race_length as f64 * (0.2 + 0.5 * skill.max(0.05))) as u32,
                    veto_tags: Vec::new(),
                }
            })
            .collect();
        let mut store = Self::default();
        store.insert_slate(slate_id, drivers, vec![track]);
        store
    }
}

impl OntologyStore for FixtureStore {
    fn fetch_drivers(&self, slate_id: &str) -> Result<Vec<RawDriverRecord>, CompileError> {
        if self.unavailable {
            return Err(CompileError::StoreUnavailable("fixture store down".into()));
        }
        self.drivers
            .get(slate_id)
            .cloned()
            .ok_or_else(|| CompileError::MissingEntity(format!("unknown slate '{slate_id}'")))
    }

    fn fetch_tracks(&self, slate_id: &str) -> Result<Vec<RawTrackRecord>, CompileError> {
        if self.unavailable {
            return Err(CompileError::StoreUnavailable("fixture store down".into()));
        }
        self.tracks
            .get(slate_id)
            .cloned()
            .ok_or_else(|| CompileError::MissingEntity(format!("unknown slate '{slate_id}'")))
    }

    fn fetch_veto_tags(&self, slate_id: &str) -> Result<Vec<String>, CompileError> {
        Ok(self.veto_tags.get(slate_id).cloned().unwrap_or_default())
    }
}
