use thiserror::Error;

/// Errors from the calibration harness.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("observed results file could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("observed results row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("observed results CSV is malformed: {0}")]
    Csv(#[from] csv::Error),

    #[error("calibration requires at least one prediction and one observation")]
    EmptyInput,
}
