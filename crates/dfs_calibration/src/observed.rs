//! Observed race results, loaded from CSV.
//!
//! Expected header: `driver_id,finish_position,laps_led,fastest_laps,dnf`.

use std::path::Path;

use serde::Deserialize;

use crate::error::CalibrationError;

/// One driver's observed race outcome.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObservedResult {
    pub driver_id: String,
    pub finish_position: u32,
    pub laps_led: u32,
    pub fastest_laps: u32,
    /// 0 or 1.
    pub dnf: u8,
}

/// Load observed results, validating basic ranges.
pub fn load_observed_csv(path: &Path) -> Result<Vec<ObservedResult>, CalibrationError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut results = Vec::new();
    for (row, record) in reader.deserialize::<ObservedResult>().enumerate() {
        let record = record?;
        if record.finish_position == 0 {
            return Err(CalibrationError::InvalidRow {
                row,
                message: "finish_position must be 1-based".to_string(),
            });
        }
        if record.dnf > 1 {
            return Err(CalibrationError::InvalidRow {
                row,
                message: "dnf must be 0 or 1".to_string(),
            });
        }
        results.push(record);
    }
    if results.is_empty() {
        return Err(CalibrationError::EmptyInput);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_well_formed_results() {
        let file = write_csv(
            "driver_id,finish_position,laps_led,fastest_laps,dnf\n\
             driver_01,1,120,40,0\n\
             driver_02,38,0,0,1\n",
        );
        let results = load_observed_csv(file.path()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].driver_id, "driver_01");
        assert_eq!(results[1].dnf, 1);
    }

    #[test]
    fn zero_finish_position_is_rejected() {
        let file = write_csv(
            "driver_id,finish_position,laps_led,fastest_laps,dnf\n\
             driver_01,0,0,0,0\n",
        );
        let err = load_observed_csv(file.path()).unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidRow { row: 0, .. }));
    }
}
