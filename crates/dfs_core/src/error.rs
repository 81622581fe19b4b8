//! Error taxonomy for the core crate.
//!
//! Every variant maps to a stable reason code that survives serialization
//! into run diagnostics. Codes are part of the external contract and must
//! not change between releases.

use thiserror::Error;

/// Errors raised while compiling a [`crate::constraint::ConstraintSpec`]
/// from the external ontology store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A driver or track referenced by the slate does not exist in the store.
    #[error("COMPILE_MISSING_ENTITY: {0}")]
    MissingEntity(String),

    /// A numeric field was outside its documented range.
    #[error("COMPILE_RANGE_VIOLATION: {0}")]
    RangeViolation(String),

    /// Fields are individually valid but mutually inconsistent
    /// (e.g. `min_laps_led > max_laps_led`).
    #[error("COMPILE_INVARIANT: {0}")]
    Invariant(String),

    /// The store could not be reached or returned a malformed batch.
    #[error("COMPILE_STORE_UNAVAILABLE: {0}")]
    StoreUnavailable(String),
}

impl CompileError {
    /// Stable reason code for diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::MissingEntity(_) => "COMPILE_MISSING_ENTITY",
            CompileError::RangeViolation(_) => "COMPILE_RANGE_VIOLATION",
            CompileError::Invariant(_) => "COMPILE_INVARIANT",
            CompileError::StoreUnavailable(_) => "COMPILE_STORE_UNAVAILABLE",
        }
    }
}

/// Errors raised by the scenario engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    /// A regime could not be realized into a feasible allocation within the
    /// bounded number of resamples.
    #[error("SCENARIO_INFEASIBLE_REGIME: scenario {scenario_index} after {attempts} attempts")]
    InfeasibleRegime {
        scenario_index: u64,
        attempts: u32,
    },

    /// Generation stopped cooperatively; partial scenarios were preserved.
    #[error("SCENARIO_CANCELLED: stopped after {accepted} scenarios")]
    Cancelled { accepted: usize },

    /// Kernel rejection rate exceeded the acceptable threshold, which
    /// indicates an allocator bug rather than bad luck.
    #[error("KERNEL_REJECTION_EXCESSIVE: rejection rate {rate:.4} exceeds {threshold:.4}")]
    ExcessiveRejection { rate: f64, threshold: f64 },
}

impl ScenarioError {
    /// Stable reason code for diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            ScenarioError::InfeasibleRegime { .. } => "SCENARIO_INFEASIBLE_REGIME",
            ScenarioError::Cancelled { .. } => "SCENARIO_CANCELLED",
            ScenarioError::ExcessiveRejection { .. } => "KERNEL_REJECTION_EXCESSIVE",
        }
    }
}

/// Errors raised by the telemetry artifact loader.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The artifact carries a column that leaks post-race information.
    #[error("telemetry artifact contains forbidden post-race feature '{0}'")]
    ForbiddenFeature(String),

    /// A required column is missing or has the wrong type.
    #[error("telemetry artifact is missing required column '{0}'")]
    MissingColumn(String),

    /// A row failed basic range validation.
    #[error("telemetry row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("telemetry artifact I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("telemetry artifact parquet failure: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("telemetry artifact arrow failure: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
