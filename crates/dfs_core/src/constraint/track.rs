use serde::{Deserialize, Serialize};

/// Closed set of track archetypes. Archetype drives regime priors, finish
/// noise, and the laps-per-caution constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackArchetype {
    Superspeedway,
    Intermediate,
    ShortTrack,
    RoadCourse,
    Flat,
}

impl TrackArchetype {
    /// Stable string form used in hashing and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            TrackArchetype::Superspeedway => "superspeedway",
            TrackArchetype::Intermediate => "intermediate",
            TrackArchetype::ShortTrack => "short_track",
            TrackArchetype::RoadCourse => "road_course",
            TrackArchetype::Flat => "flat",
        }
    }

    /// Parse from the ontology store's string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "superspeedway" => Some(TrackArchetype::Superspeedway),
            "intermediate" => Some(TrackArchetype::Intermediate),
            "short_track" => Some(TrackArchetype::ShortTrack),
            "road_course" => Some(TrackArchetype::RoadCourse),
            "flat" => Some(TrackArchetype::Flat),
            _ => None,
        }
    }

    /// Expected caution length in laps. Pack racing at superspeedways
    /// produces long cleanup periods; road courses mostly run local yellows.
    pub fn expected_laps_per_caution(self) -> f64 {
        match self {
            TrackArchetype::Superspeedway => 6.0,
            TrackArchetype::Intermediate => 5.0,
            TrackArchetype::ShortTrack => 5.0,
            TrackArchetype::RoadCourse => 3.0,
            TrackArchetype::Flat => 4.0,
        }
    }

    /// Scale of the noise term in the latent finish score. Drafting tracks
    /// and road courses shuffle the running order far more than short ovals.
    pub fn finish_noise_scale(self) -> f64 {
        match self {
            TrackArchetype::Superspeedway => 0.9,
            TrackArchetype::RoadCourse => 0.6,
            TrackArchetype::Flat => 0.4,
            TrackArchetype::Intermediate => 0.3,
            TrackArchetype::ShortTrack => 0.25,
        }
    }

    /// Default correlation between laps-led share and clean-air pace when the
    /// store does not supply a calibrated value.
    pub fn default_pace_correlation(self) -> f64 {
        match self {
            TrackArchetype::Superspeedway => 0.35,
            TrackArchetype::RoadCourse => 0.5,
            _ => 0.7,
        }
    }
}

/// Per-track constraints and priors for one slate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConstraint {
    /// Opaque identity.
    pub track_id: String,
    pub archetype: TrackArchetype,
    /// Scheduled race distance in laps.
    pub race_length_laps: u32,
    /// Normalized difficulty in `[0, 1]`; weights skill in the dominator score.
    pub difficulty: f64,
    /// Normalized pack-aggression factor in `[0, 1]`.
    pub aggression_factor: f64,
    /// Cautions per lap in `[0, 1]`.
    pub caution_rate: f64,
    /// Scheduled green-flag pit windows, ascending, within the race length.
    pub pit_window_laps: Vec<u32>,
    /// Number of cars taking the green flag.
    pub field_size: u32,
    /// Correlation between laps-led share and clean-air pace in `[0, 1]`.
    pub pace_correlation: f64,
}
