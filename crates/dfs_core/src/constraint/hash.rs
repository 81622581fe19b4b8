//! Canonical encoding and content hash of the compiled spec.
//!
//! The encoding is a line-oriented text form with a fixed field order:
//! sorted driver ids, sorted track ids, integers in base 10, floats in
//! Rust's shortest-round-trip `Display` form. Two hosts compiling the same
//! slate content therefore produce byte-identical encodings and hashes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use crate::constraint::{DriverConstraint, SlateMeta, TrackConstraint};
use crate::scoring::ScoringConstants;

/// Canonical text encoding of the spec content. `compiled_at_ms` is
/// provenance, not content, and is deliberately absent.
pub fn canonical_encoding(
    slate: &SlateMeta,
    drivers: &[DriverConstraint],
    tracks: &BTreeMap<String, TrackConstraint>,
    race_track_id: &str,
    active_veto_tags: &[String],
    scoring: &ScoringConstants,
    team_cap_default: u32,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "spec_version={}", slate.version);
    let _ = writeln!(out, "slate_id={}", slate.slate_id);
    let _ = writeln!(out, "race_track_id={race_track_id}");
    let _ = writeln!(out, "team_cap_default={team_cap_default}");

    let mut veto = active_veto_tags.to_vec();
    veto.sort_unstable();
    let _ = writeln!(out, "veto_tags={}", veto.join(","));

    for d in drivers {
        let _ = writeln!(
            out,
            "driver|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            d.driver_id,
            d.team_id,
            d.salary,
            d.start_position,
            d.skill,
            d.aggression,
            d.shadow_risk,
            d.min_laps_led,
            d.max_laps_led,
            sorted_tags(&d.veto_tags),
        );
    }

    for (track_id, t) in tracks {
        let pit_windows: Vec<String> = t.pit_window_laps.iter().map(|w| w.to_string()).collect();
        let _ = writeln!(
            out,
            "track|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            track_id,
            t.archetype.as_str(),
            t.race_length_laps,
            t.difficulty,
            t.aggression_factor,
            t.caution_rate,
            pit_windows.join(","),
            t.field_size,
            t.pace_correlation,
        );
    }

    let finish_points: Vec<String> = scoring.finish_points.iter().map(|p| p.to_string()).collect();
    let _ = writeln!(
        out,
        "scoring|{}|{}|{}|{}|{}|{}",
        finish_points.join(","),
        scoring.place_diff_point,
        scoring.place_diff_clamp,
        scoring.laps_led_point,
        scoring.fastest_lap_point,
        scoring.dnf_penalty,
    );

    out
}

/// Hex SHA-256 of the canonical encoding.
pub(crate) fn hash_encoding(encoding: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(encoding.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn sorted_tags(tags: &[String]) -> String {
    let mut tags = tags.to_vec();
    tags.sort_unstable();
    tags.join(",")
}
