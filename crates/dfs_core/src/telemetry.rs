//! Columnar telemetry artifact loader.
//!
//! The artifact is a parquet file with one row per driver per lap. Only
//! pre-race-available aggregates leave this module: the features contract
//! rejects any column that could leak race outcomes into the simulator.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray, UInt32Array, UInt64Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tracing::info;

use crate::constraint::ConstraintSpec;
use crate::error::TelemetryError;

/// Column names that would leak post-race information. Loading an artifact
/// carrying any of them fails outright.
pub const FORBIDDEN_FEATURES: [&str; 4] = [
    "race_laps_led",
    "race_finish_position",
    "race_incidents",
    "race_dnf_lap",
];

/// One telemetry row: a driver on a lap.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRow {
    pub driver_id: String,
    pub lap: u32,
    pub position: u32,
    pub lap_time_ms: u64,
    pub green_flag: bool,
    pub pit: bool,
}

/// Pre-race aggregates for one driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverPaceAggregate {
    pub green_lap_count: u64,
    pub avg_green_lap_time_ms: f64,
    pub avg_running_position: f64,
    pub pit_count: u64,
}

/// Validated artifact, reduced to consumable aggregates.
#[derive(Debug, Clone, Default)]
pub struct TelemetryArtifact {
    aggregates: BTreeMap<String, DriverPaceAggregate>,
}

impl TelemetryArtifact {
    pub fn aggregates(&self) -> &BTreeMap<String, DriverPaceAggregate> {
        &self.aggregates
    }

    /// Normalized pace prior per spec driver, in `[0, 1]` with 1 for the
    /// quickest green-flag car. Drivers without telemetry get a neutral 0.5.
    pub fn pace_priors(&self, spec: &ConstraintSpec) -> Vec<f64> {
        let times: Vec<Option<f64>> = spec
            .drivers()
            .iter()
            .map(|d| {
                self.aggregates
                    .get(&d.driver_id)
                    .filter(|a| a.green_lap_count > 0)
                    .map(|a| a.avg_green_lap_time_ms)
            })
            .collect();
        let known: Vec<f64> = times.iter().filter_map(|t| *t).collect();
        let (Some(fastest), Some(slowest)) = (
            known.iter().copied().reduce(f64::min),
            known.iter().copied().reduce(f64::max),
        ) else {
            return vec![0.5; times.len()];
        };
        let span = (slowest - fastest).max(1e-9);
        times
            .iter()
            .map(|t| match t {
                Some(time) => 1.0 - (time - fastest) / span,
                None => 0.5,
            })
            .collect()
    }
}

/// Load and validate a telemetry artifact.
pub fn load_telemetry(path: &Path) -> Result<TelemetryArtifact, TelemetryError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    for field in builder.schema().fields() {
        if FORBIDDEN_FEATURES.contains(&field.name().as_str()) {
            return Err(TelemetryError::ForbiddenFeature(field.name().clone()));
        }
    }

    let mut sums: BTreeMap<String, (u64, u64, u64, u64, u64)> = BTreeMap::new();
    let mut row = 0usize;
    let reader = builder.build()?;
    for batch in reader {
        let batch = batch?;
        let driver_ids = column::<StringArray>(&batch, "driver_id")?;
        let laps = column::<UInt32Array>(&batch, "lap")?;
        let positions = column::<UInt32Array>(&batch, "position")?;
        let lap_times = column::<UInt64Array>(&batch, "lap_time_ms")?;
        let green_flags = column::<UInt8Array>(&batch, "green_flag")?;
        let pits = column::<UInt8Array>(&batch, "pit")?;

        for i in 0..batch.num_rows() {
            if laps.value(i) == 0 {
                return Err(TelemetryError::InvalidRow {
                    row,
                    message: "lap must be 1-based".to_string(),
                });
            }
            if green_flags.value(i) > 1 || pits.value(i) > 1 {
                return Err(TelemetryError::InvalidRow {
                    row,
                    message: "green_flag and pit must be 0 or 1".to_string(),
                });
            }
            let entry = sums.entry(driver_ids.value(i).to_string()).or_default();
            // (green laps, green time, position sum, lap count, pit count)
            if green_flags.value(i) == 1 && pits.value(i) == 0 {
                entry.0 += 1;
                entry.1 += lap_times.value(i);
            }
            entry.2 += positions.value(i) as u64;
            entry.3 += 1;
            entry.4 += pits.value(i) as u64;
            row += 1;
        }
    }

    let aggregates = sums
        .into_iter()
        .map(|(driver_id, (green, green_ms, pos_sum, laps, pits))| {
            let aggregate = DriverPaceAggregate {
                green_lap_count: green,
                avg_green_lap_time_ms: if green > 0 {
                    green_ms as f64 / green as f64
                } else {
                    0.0
                },
                avg_running_position: if laps > 0 {
                    pos_sum as f64 / laps as f64
                } else {
                    0.0
                },
                pit_count: pits,
            };
            (driver_id, aggregate)
        })
        .collect();

    info!(rows = row, path = %path.display(), "loaded telemetry artifact");
    Ok(TelemetryArtifact { aggregates })
}

/// Write rows as a telemetry artifact. Offline tooling and tests only.
pub fn write_telemetry_parquet(path: &Path, rows: &[TelemetryRow]) -> Result<(), TelemetryError> {
    let schema = Schema::new(vec![
        Field::new("driver_id", DataType::Utf8, false),
        Field::new("lap", DataType::UInt32, false),
        Field::new("position", DataType::UInt32, false),
        Field::new("lap_time_ms", DataType::UInt64, false),
        Field::new("green_flag", DataType::UInt8, false),
        Field::new("pit", DataType::UInt8, false),
    ]);

    let driver_ids: StringArray = rows.iter().map(|r| Some(r.driver_id.as_str())).collect();
    let laps: UInt32Array = rows.iter().map(|r| Some(r.lap)).collect();
    let positions: UInt32Array = rows.iter().map(|r| Some(r.position)).collect();
    let lap_times: UInt64Array = rows.iter().map(|r| Some(r.lap_time_ms)).collect();
    let green_flags: UInt8Array = rows.iter().map(|r| Some(r.green_flag as u8)).collect();
    let pits: UInt8Array = rows.iter().map(|r| Some(r.pit as u8)).collect();
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(driver_ids),
        Arc::new(laps),
        Arc::new(positions),
        Arc::new(lap_times),
        Arc::new(green_flags),
        Arc::new(pits),
    ];

    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn column<'a, A: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A, TelemetryError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<A>())
        .ok_or_else(|| TelemetryError::MissingColumn(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{compile, FixtureStore};

    fn rows() -> Vec<TelemetryRow> {
        let mut rows = Vec::new();
        for lap in 1..=20u32 {
            for (driver, base_ms) in [("driver_01", 31_000u64), ("driver_02", 31_400)] {
                rows.push(TelemetryRow {
                    driver_id: driver.to_string(),
                    lap,
                    position: if driver == "driver_01" { 1 } else { 2 },
                    lap_time_ms: base_ms + (lap as u64 % 3) * 50,
                    green_flag: lap % 5 != 0,
                    pit: lap == 10,
                });
            }
        }
        rows
    }

    #[test]
    fn round_trips_aggregates_through_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.parquet");
        write_telemetry_parquet(&path, &rows()).unwrap();

        let artifact = load_telemetry(&path).unwrap();
        let first = &artifact.aggregates()["driver_01"];
        assert!(first.green_lap_count > 0);
        assert!(first.avg_green_lap_time_ms > 30_000.0);
        assert_eq!(first.pit_count, 1);
        assert!(first.avg_running_position < 1.5);
    }

    #[test]
    fn forbidden_columns_fail_the_contract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaky.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("driver_id", DataType::Utf8, false),
            Field::new("race_finish_position", DataType::UInt32, false),
        ]));
        let ids: StringArray = [Some("driver_01")].into_iter().collect();
        let finishes: UInt32Array = [Some(1u32)].into_iter().collect();
        let batch =
            RecordBatch::try_new(schema.clone(), vec![Arc::new(ids), Arc::new(finishes)]).unwrap();
        let file = File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = load_telemetry(&path).unwrap_err();
        assert!(matches!(err, TelemetryError::ForbiddenFeature(name) if name == "race_finish_position"));
    }

    #[test]
    fn pace_priors_rank_the_quicker_driver_higher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.parquet");
        write_telemetry_parquet(&path, &rows()).unwrap();
        let artifact = load_telemetry(&path).unwrap();

        let spec = compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap();
        let priors = artifact.pace_priors(&spec);
        let fast = spec.index_of("driver_01").unwrap();
        let slow = spec.index_of("driver_02").unwrap();
        let neutral = spec.index_of("driver_10").unwrap();
        assert!(priors[fast] > priors[slow]);
        assert_eq!(priors[neutral], 0.5);
        assert_eq!(priors.len(), spec.n_drivers());
    }
}
