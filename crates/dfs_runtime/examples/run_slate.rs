//! End-to-end demo: compile a fixture slate, simulate, optimize, print the
//! portfolio.
//!
//! ```sh
//! cargo run --example run_slate
//! ```

use std::sync::Arc;
use std::time::Duration;

use dfs_core::constraint::FixtureStore;
use dfs_runtime::{RunManager, RunRequest, RunState};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store_root = std::env::temp_dir().join("dfs-run-slate");
    let manager = RunManager::new(
        store_root.clone(),
        Arc::new(FixtureStore::superspeedway_fixture(40)),
    );

    let request = RunRequest::new("daytona-500")
        .with_seed(42)
        .with_lineups(10);
    let submission = match manager.submit_run(request) {
        Ok(submission) => submission,
        Err(err) => {
            eprintln!("submission rejected: {err}");
            std::process::exit(1);
        }
    };
    println!("submitted {}", submission.run_id);

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    loop {
        let Some(status) = manager.get_status(&submission.run_id) else {
            break;
        };
        bar.set_position((status.progress * 100.0) as u64);
        bar.set_message(status.phase.as_str().to_string());
        if status.status.is_terminal() {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    bar.finish_and_clear();

    let result = manager
        .get_result(&submission.run_id)
        .expect("terminal run has a result");
    println!(
        "status: {} (spec {})",
        result.status.as_str(),
        &result.spec_hash[..12]
    );
    if result.status != RunState::Completed {
        if let Some(reason) = &result.failure_reason {
            println!("failure_reason: {reason}");
        }
    }
    println!(
        "scenarios: {} accepted / {} generated (rejection rate {:.3}%)",
        result.diagnostics.n_scenarios_accepted,
        result.diagnostics.n_scenarios_generated,
        result.diagnostics.rejection_rate * 100.0
    );
    println!(
        "tail effective sample size: {}",
        result.diagnostics.tail_effective_sample_size
    );
    for (index, lineup) in result.portfolio.iter().enumerate() {
        println!(
            "#{:02} [{}] salary {} objective {:.2}",
            index + 1,
            lineup.driver_ids.join(", "),
            lineup.total_salary,
            lineup.objective_value
        );
    }
    println!("artifacts under {}", store_root.display());
}
