use serde::{Deserialize, Serialize};

/// Normalized rejection reasons. Codes are stable strings that appear in
/// diagnostics and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    LapsLedConservation,
    LapsLedBounds,
    FastestLapsBudget,
    PositionPermutation,
    DnfRange,
    CautionAccounting,
    SalaryCap,
    TeamCap,
    LineupSize,
    UnknownDriver,
    VetoRule,
}

impl RejectReason {
    /// Every reason, in counter order.
    pub const ALL: [RejectReason; 11] = [
        RejectReason::LapsLedConservation,
        RejectReason::LapsLedBounds,
        RejectReason::FastestLapsBudget,
        RejectReason::PositionPermutation,
        RejectReason::DnfRange,
        RejectReason::CautionAccounting,
        RejectReason::SalaryCap,
        RejectReason::TeamCap,
        RejectReason::LineupSize,
        RejectReason::UnknownDriver,
        RejectReason::VetoRule,
    ];

    /// Stable reason code.
    pub fn code(self) -> &'static str {
        match self {
            RejectReason::LapsLedConservation => "LAPS_LED_CONSERVATION",
            RejectReason::LapsLedBounds => "LAPS_LED_BOUNDS",
            RejectReason::FastestLapsBudget => "FASTEST_LAPS_BUDGET",
            RejectReason::PositionPermutation => "POSITION_PERMUTATION",
            RejectReason::DnfRange => "DNF_RANGE",
            RejectReason::CautionAccounting => "CAUTION_ACCOUNTING",
            RejectReason::SalaryCap => "SALARY_CAP",
            RejectReason::TeamCap => "TEAM_CAP",
            RejectReason::LineupSize => "LINEUP_SIZE",
            RejectReason::UnknownDriver => "UNKNOWN_DRIVER",
            RejectReason::VetoRule => "VETO_RULE",
        }
    }

    /// Position in [`Self::ALL`], used to index counters.
    pub(crate) fn ordinal(self) -> usize {
        Self::ALL.iter().position(|r| *r == self).expect("reason in ALL")
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_are_unique_and_dense() {
        for (i, reason) in RejectReason::ALL.iter().enumerate() {
            assert_eq!(reason.ordinal(), i);
        }
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(RejectReason::LapsLedConservation.code(), "LAPS_LED_CONSERVATION");
        assert_eq!(RejectReason::SalaryCap.code(), "SALARY_CAP");
        assert_eq!(RejectReason::VetoRule.to_string(), "VETO_RULE");
    }
}
