//! End-to-end runs against the fixture slate.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use dfs_core::constraint::{compile, FixtureStore};
use dfs_core::telemetry::{write_telemetry_parquet, TelemetryRow};
use dfs_portfolio::ObjectiveKind;
use dfs_runtime::{
    CancelAck, EnvConfig, PortfolioResult, RunManager, RunRequest, RunState, RunStore,
};

fn manager(dir: &tempfile::TempDir) -> RunManager {
    RunManager::with_env(
        dir.path().to_path_buf(),
        Arc::new(FixtureStore::superspeedway_fixture(40)),
        EnvConfig::default(),
    )
}

fn run_to_completion(manager: &RunManager, request: RunRequest) -> PortfolioResult {
    let submission = manager.submit_run(request).expect("submission accepted");
    let state = manager
        .wait_for_terminal(&submission.run_id, 300_000)
        .expect("run registered");
    assert!(state.is_terminal(), "run did not finish: {state:?}");
    manager
        .get_result(&submission.run_id)
        .expect("terminal run has a result")
}

#[test]
fn superspeedway_smoke_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir);
    let result = run_to_completion(
        &manager,
        RunRequest::new("daytona-500").with_seed(42).with_lineups(1),
    );

    assert_eq!(result.status, RunState::Completed);
    assert!(!result.partial);
    assert!(result.diagnostics.rejection_rate <= 0.02);
    assert_eq!(result.diagnostics.n_scenarios_accepted, 2000);
    assert_eq!(result.portfolio.len(), 1);
    let lineup = &result.portfolio[0];
    assert_eq!(lineup.driver_ids.len(), 6);
    assert!(lineup.total_salary <= 50_000);
    assert!(lineup.objective_value > 0.0);
    assert_eq!(result.diagnostics.tail_effective_sample_size, 20);
    assert!(result.diagnostics.objective_downgraded_from.is_none());
}

#[test]
fn identical_inputs_reproduce_scenarios_and_portfolio() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir);
    let request = || {
        let mut request = RunRequest::new("daytona-500").with_seed(42).with_lineups(3);
        request.persist_scenarios = true;
        request
    };

    let first = run_to_completion(&manager, request());
    let second = run_to_completion(&manager, request());

    assert_eq!(first.spec_hash, second.spec_hash);
    assert_eq!(first.portfolio.len(), second.portfolio.len());
    for (a, b) in first.portfolio.iter().zip(&second.portfolio) {
        assert_eq!(a.driver_ids, b.driver_ids);
        assert_eq!(a.objective_value, b.objective_value);
    }

    // Scenario payloads are byte-identical on disk.
    let store = RunStore::new(dir.path().to_path_buf());
    let bytes_a = fs::read(store.run_dir(&first.run_id).join("scenarios.bin")).unwrap();
    let bytes_b = fs::read(store.run_dir(&second.run_id).join("scenarios.bin")).unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn run_config_round_trip_reproduces_spec_hash() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir);
    let result = run_to_completion(
        &manager,
        RunRequest::new("daytona-500").with_seed(7).with_lineups(1),
    );

    let store = RunStore::new(dir.path().to_path_buf());
    let config = store.load_run_config(&result.run_id).unwrap();
    assert_eq!(config.spec_hash, result.spec_hash);

    // Recompiling the same slate content reproduces the persisted hash.
    let spec = compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap();
    assert_eq!(spec.spec_hash(), config.spec_hash);
}

#[test]
fn cancellation_preserves_partial_scenarios() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir);
    let submission = manager
        .submit_run(
            RunRequest::new("daytona-500")
                .with_seed(1)
                .with_scenarios(200_000)
                .with_lineups(1),
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(manager.cancel_run(&submission.run_id), CancelAck::Ok);

    let state = manager
        .wait_for_terminal(&submission.run_id, 60_000)
        .unwrap();
    assert_eq!(state, RunState::Cancelled);
    let result = manager.get_result(&submission.run_id).unwrap();
    assert!(result.partial);
    assert_eq!(result.failure_reason.as_deref(), Some("CANCELLED"));
    assert!(result.diagnostics.n_scenarios_accepted > 0);
    assert!(result.diagnostics.n_scenarios_accepted < 200_000);
    // Cancelling a terminal run is a no-op.
    assert_eq!(manager.cancel_run(&submission.run_id), CancelAck::Noop);
}

#[test]
fn run_timeout_fails_with_partial_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let manager = RunManager::with_env(
        dir.path().to_path_buf(),
        Arc::new(FixtureStore::superspeedway_fixture(40)),
        EnvConfig {
            run_timeout_ms: 150,
            ..EnvConfig::default()
        },
    );
    let submission = manager
        .submit_run(
            RunRequest::new("daytona-500")
                .with_seed(1)
                .with_scenarios(500_000)
                .with_lineups(1),
        )
        .unwrap();

    let state = manager
        .wait_for_terminal(&submission.run_id, 60_000)
        .unwrap();
    assert_eq!(state, RunState::Failed);
    let result = manager.get_result(&submission.run_id).unwrap();
    assert_eq!(result.failure_reason.as_deref(), Some("TIMEOUT"));
    assert!(result.partial);
}

#[test]
fn zero_exposure_drivers_never_enter_the_portfolio() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir);
    let result = run_to_completion(
        &manager,
        RunRequest::new("daytona-500")
            .with_seed(42)
            .with_lineups(5)
            .with_exposure("driver_01", 0.0)
            .with_exposure("driver_02", 0.0),
    );

    assert_eq!(result.status, RunState::Completed);
    for lineup in &result.portfolio {
        assert!(!lineup.driver_ids.contains(&"driver_01".to_string()));
        assert!(!lineup.driver_ids.contains(&"driver_02".to_string()));
    }
    assert_eq!(result.diagnostics.exposure_trajectory["driver_01"], 0.0);
}

#[test]
fn strangling_exposure_yields_an_incomplete_portfolio() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir);
    // Seven drivers available once each; the second lineup cannot form.
    let mut request = RunRequest::new("daytona-500").with_seed(42).with_lineups(5);
    let spec = compile("daytona-500", &FixtureStore::superspeedway_fixture(40)).unwrap();
    for driver in spec.drivers() {
        request.exposure.insert(driver.driver_id.clone(), 0.0);
    }
    // Seven cheap cars so the first lineup itself stays under the cap.
    for driver in spec.drivers().iter().skip(33).take(7) {
        request.exposure.insert(driver.driver_id.clone(), 0.2);
    }

    let result = run_to_completion(&manager, request);
    assert_eq!(result.status, RunState::Completed);
    assert!(result.partial);
    assert_eq!(result.failure_reason.as_deref(), Some("PORTFOLIO_INCOMPLETE"));
    assert!(result.portfolio.len() < 5);
}

#[test]
fn overlap_discipline_holds_across_the_portfolio() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir);
    let result = run_to_completion(
        &manager,
        RunRequest::new("daytona-500").with_seed(9).with_lineups(6),
    );
    assert_eq!(result.status, RunState::Completed);
    for (i, a) in result.portfolio.iter().enumerate() {
        for b in result.portfolio.iter().skip(i + 1) {
            let shared = a
                .driver_ids
                .iter()
                .filter(|id| b.driver_ids.contains(id))
                .count();
            // Default overlap cap; the fixture never forces relaxation.
            assert!(shared <= 4, "lineups share {shared} drivers");
        }
    }
}

#[test]
fn invalid_requests_are_rejected_synchronously() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir);

    let mut too_few = RunRequest::new("daytona-500");
    too_few.n_scenarios = 500;
    assert_eq!(
        manager.submit_run(too_few).unwrap_err().code(),
        "INVALID_PARAMETER_RANGE"
    );

    assert_eq!(
        manager
            .submit_run(RunRequest::new("bristol-night"))
            .unwrap_err()
            .code(),
        "UNKNOWN_SLATE"
    );

    let ghost_exposure = RunRequest::new("daytona-500").with_exposure("driver_99", 0.5);
    assert_eq!(
        manager.submit_run(ghost_exposure).unwrap_err().code(),
        "INVALID_PARAMETER_RANGE"
    );
}

#[test]
fn expected_value_objective_completes() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir);
    let result = run_to_completion(
        &manager,
        RunRequest::new("daytona-500")
            .with_seed(42)
            .with_lineups(2)
            .with_objective(ObjectiveKind::ExpectedValue),
    );
    assert_eq!(result.status, RunState::Completed);
    assert_eq!(result.portfolio.len(), 2);
    assert_eq!(result.diagnostics.tail_effective_sample_size, 2000);
}

#[test]
fn telemetry_and_observed_results_enrich_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir);

    // Pre-race practice telemetry for the two fastest fixture cars.
    let telemetry_path = dir.path().join("practice.parquet");
    let rows: Vec<TelemetryRow> = (1..=25u32)
        .flat_map(|lap| {
            [("driver_01", 30_900u64), ("driver_05", 31_500)].map(|(driver, base)| TelemetryRow {
                driver_id: driver.to_string(),
                lap,
                position: 1,
                lap_time_ms: base + (lap as u64 % 4) * 40,
                green_flag: true,
                pit: false,
            })
        })
        .collect();
    write_telemetry_parquet(&telemetry_path, &rows).unwrap();

    // Observed race results for calibration diagnostics.
    let observed_path = dir.path().join("observed.csv");
    let mut csv = String::from("driver_id,finish_position,laps_led,fastest_laps,dnf\n");
    for i in 0..40 {
        csv.push_str(&format!(
            "driver_{:02},{},{},0,0\n",
            i + 1,
            i + 1,
            if i == 0 { 200 } else { 0 }
        ));
    }
    fs::write(&observed_path, csv).unwrap();

    let mut request = RunRequest::new("daytona-500").with_seed(42).with_lineups(1);
    request.telemetry_path = Some(telemetry_path);
    request.observed_results_path = Some(observed_path);

    let result = run_to_completion(&manager, request);
    assert_eq!(result.status, RunState::Completed);
    let calibration = result.diagnostics.calibration.expect("calibration attached");
    let metrics = &calibration["superspeedway"];
    assert!(metrics.crps.is_finite() && metrics.crps > 0.0);
    assert!((0.0..=1.0).contains(&metrics.coverage_95));
}
