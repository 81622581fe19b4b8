//! Feasibility predicates for scenario states and lineups.

use crate::constraint::ConstraintSpec;
use crate::kernel::reasons::RejectReason;
use crate::lineup::{Lineup, LINEUP_SIZE};
use crate::scenario::{DriverOutcome, RaceFlowRegime, Scenario};

/// Cars that one caution can plausibly collect. Bounds the incident count
/// the kernel accepts for a given caution total.
const MAX_CARS_PER_CAUTION: u32 = 4;

/// Outcome of a kernel check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(Vec<RejectReason>),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    pub fn reasons(&self) -> &[RejectReason] {
        match self {
            Verdict::Accept => &[],
            Verdict::Reject(reasons) => reasons,
        }
    }

    fn from_reasons(reasons: Vec<RejectReason>) -> Verdict {
        if reasons.is_empty() {
            Verdict::Accept
        } else {
            Verdict::Reject(reasons)
        }
    }
}

/// Lineup-level caps in force for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineupRules {
    pub salary_cap: u32,
    pub team_cap: u32,
}

impl LineupRules {
    pub fn from_spec(spec: &ConstraintSpec) -> Self {
        Self {
            salary_cap: crate::lineup::SALARY_CAP,
            team_cap: spec.team_cap_default(),
        }
    }
}

/// Preconditions on a partial scenario before finalization: per-driver
/// bounds and finish-position uniqueness. Conservation sums are not checked
/// here because a partial state has not settled them yet.
pub fn validate_state(
    spec: &ConstraintSpec,
    regime: &RaceFlowRegime,
    outcomes: &[DriverOutcome],
) -> Verdict {
    let mut reasons = Vec::new();
    let track = spec.track();

    if outcomes.len() != spec.n_drivers() {
        reasons.push(RejectReason::PositionPermutation);
        return Verdict::from_reasons(reasons);
    }

    let mut seen = vec![false; outcomes.len()];
    for (driver, outcome) in spec.drivers().iter().zip(outcomes) {
        let position = outcome.finish_position;
        if position == 0 || position > track.field_size {
            push_unique(&mut reasons, RejectReason::PositionPermutation);
        } else if std::mem::replace(&mut seen[(position - 1) as usize], true) {
            push_unique(&mut reasons, RejectReason::PositionPermutation);
        }

        if outcome.laps_led > driver.max_laps_led
            || (outcome.laps_led > 0 && outcome.laps_led < driver.min_laps_led)
        {
            push_unique(&mut reasons, RejectReason::LapsLedBounds);
        }

        match outcome.dnf_lap {
            Some(lap) if lap > track.race_length_laps => {
                push_unique(&mut reasons, RejectReason::DnfRange);
            }
            Some(_) if !outcome.incident => {
                // A retirement without an incident is inconsistent bookkeeping.
                push_unique(&mut reasons, RejectReason::DnfRange);
            }
            _ => {}
        }
    }

    if regime.green_laps > track.race_length_laps {
        push_unique(&mut reasons, RejectReason::CautionAccounting);
    }

    Verdict::from_reasons(reasons)
}

/// Full conservation checks on a realized scenario.
pub fn validate_realized(spec: &ConstraintSpec, scenario: &Scenario) -> Verdict {
    let mut reasons = match validate_state(spec, &scenario.regime, &scenario.outcomes) {
        Verdict::Accept => Vec::new(),
        Verdict::Reject(reasons) => reasons,
    };
    let track = spec.track();

    let laps_led_total: u64 = scenario.outcomes.iter().map(|o| o.laps_led as u64).sum();
    if laps_led_total != track.race_length_laps as u64 {
        push_unique(&mut reasons, RejectReason::LapsLedConservation);
    }

    let fastest_total: u64 = scenario.outcomes.iter().map(|o| o.fastest_laps as u64).sum();
    if fastest_total > scenario.regime.green_laps as u64 {
        push_unique(&mut reasons, RejectReason::FastestLapsBudget);
    }

    let incident_count = scenario.outcomes.iter().filter(|o| o.incident).count() as u32;
    if incident_count != scenario.meta.incident_count
        || scenario.meta.caution_laps != scenario.regime.caution_laps
        || scenario.regime.green_laps + scenario.regime.caution_laps != track.race_length_laps
        || incident_count > scenario.regime.n_cautions * MAX_CARS_PER_CAUTION
    {
        push_unique(&mut reasons, RejectReason::CautionAccounting);
    }

    Verdict::from_reasons(reasons)
}

/// DraftKings and spec-level lineup feasibility.
pub fn validate_lineup(spec: &ConstraintSpec, lineup: &Lineup, rules: &LineupRules) -> Verdict {
    let mut reasons = Vec::new();

    if lineup.len() != LINEUP_SIZE {
        push_unique(&mut reasons, RejectReason::LineupSize);
    }
    let mut distinct = lineup.driver_indices().to_vec();
    distinct.dedup();
    if distinct.len() != lineup.len() {
        push_unique(&mut reasons, RejectReason::LineupSize);
    }

    let mut salary: u64 = 0;
    let mut team_counts: std::collections::BTreeMap<&str, u32> = std::collections::BTreeMap::new();
    for &index in lineup.driver_indices() {
        if index >= spec.n_drivers() {
            push_unique(&mut reasons, RejectReason::UnknownDriver);
            continue;
        }
        let driver = spec.driver(index);
        salary += driver.salary as u64;
        *team_counts.entry(driver.team_id.as_str()).or_default() += 1;
        if spec.is_driver_vetoed(index) {
            push_unique(&mut reasons, RejectReason::VetoRule);
        }
    }

    if salary > rules.salary_cap as u64 {
        push_unique(&mut reasons, RejectReason::SalaryCap);
    }
    if team_counts.values().any(|&count| count > rules.team_cap) {
        push_unique(&mut reasons, RejectReason::TeamCap);
    }

    Verdict::from_reasons(reasons)
}

fn push_unique(reasons: &mut Vec<RejectReason>, reason: RejectReason) {
    if !reasons.contains(&reason) {
        reasons.push(reason);
    }
}
