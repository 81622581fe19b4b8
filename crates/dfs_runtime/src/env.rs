//! Environment variables the core honors.
//!
//! Only knobs that affect determinism and resource ceilings are read from
//! the environment; everything else arrives in the request.

use std::time::Duration;

/// Resolved environment configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvConfig {
    /// Seed used when a request does not carry one (`RNG_SEED_DEFAULT`).
    pub rng_seed_default: u64,
    /// Scenario worker threads (`SCENARIO_THREADS`); `None` = rayon default.
    pub scenario_threads: Option<usize>,
    /// Per-lineup solver budget (`SOLVER_TIME_LIMIT_MS`).
    pub solver_time_limit_ms: u64,
    /// Whole-run budget (`RUN_TIMEOUT_MS`).
    pub run_timeout_ms: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            rng_seed_default: 0,
            scenario_threads: None,
            solver_time_limit_ms: 10_000,
            run_timeout_ms: 600_000,
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rng_seed_default: parse_var("RNG_SEED_DEFAULT").unwrap_or(defaults.rng_seed_default),
            scenario_threads: parse_var("SCENARIO_THREADS"),
            solver_time_limit_ms: parse_var("SOLVER_TIME_LIMIT_MS")
                .unwrap_or(defaults.solver_time_limit_ms),
            run_timeout_ms: parse_var("RUN_TIMEOUT_MS").unwrap_or(defaults.run_timeout_ms),
        }
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        let config = EnvConfig::default();
        assert_eq!(config.rng_seed_default, 0);
        assert!(config.scenario_threads.is_none());
        assert_eq!(config.run_timeout(), Duration::from_secs(600));
    }
}
