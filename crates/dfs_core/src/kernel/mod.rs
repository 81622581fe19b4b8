//! Kernel validator: the final arbiter of feasibility.
//!
//! Pure predicates, no I/O. The scenario engine builds states that are
//! feasible by construction; the kernel re-asserts that, and any rejection
//! above the noise floor is an allocator bug, not a sampling accident.

mod reasons;
mod stats;
mod validate;

pub use reasons::RejectReason;
pub use stats::{KernelStats, KernelStatsSnapshot};
pub use validate::{validate_lineup, validate_realized, validate_state, LineupRules, Verdict};
