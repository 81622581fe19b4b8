//! Durable per-run state layout.
//!
//! ```text
//! <root>/<run_id>/run_config.bin    canonical bincode
//! <root>/<run_id>/scenarios.bin     optional, for reproducibility audits
//! <root>/<run_id>/portfolio.json
//! <root>/<run_id>/diagnostics.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use dfs_core::scenario::ScenarioSet;
use thiserror::Error;
use tracing::debug;

use crate::config::RunConfig;
use crate::diagnostics::{Diagnostics, PortfolioResult};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("run store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("run store encoding failure: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("run store JSON failure: {0}")]
    Json(#[from] serde_json::Error),
}

/// Filesystem-backed store of run artifacts, keyed by `run_id`.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    fn ensure_dir(&self, run_id: &str) -> Result<PathBuf, PersistError> {
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn save_run_config(&self, config: &RunConfig) -> Result<(), PersistError> {
        let dir = self.ensure_dir(&config.run_id)?;
        fs::write(dir.join("run_config.bin"), bincode::serialize(config)?)?;
        debug!(run_id = %config.run_id, "persisted run config");
        Ok(())
    }

    pub fn load_run_config(&self, run_id: &str) -> Result<RunConfig, PersistError> {
        let bytes = fs::read(self.run_dir(run_id).join("run_config.bin"))?;
        Ok(bincode::deserialize(&bytes)?)
    }

    pub fn save_scenarios(&self, run_id: &str, set: &ScenarioSet) -> Result<(), PersistError> {
        let dir = self.ensure_dir(run_id)?;
        fs::write(dir.join("scenarios.bin"), bincode::serialize(set)?)?;
        Ok(())
    }

    pub fn load_scenarios(&self, run_id: &str) -> Result<ScenarioSet, PersistError> {
        let bytes = fs::read(self.run_dir(run_id).join("scenarios.bin"))?;
        Ok(bincode::deserialize(&bytes)?)
    }

    pub fn save_portfolio(&self, result: &PortfolioResult) -> Result<(), PersistError> {
        let dir = self.ensure_dir(&result.run_id)?;
        fs::write(
            dir.join("portfolio.json"),
            serde_json::to_vec_pretty(result)?,
        )?;
        Ok(())
    }

    pub fn load_portfolio(&self, run_id: &str) -> Result<PortfolioResult, PersistError> {
        let bytes = fs::read(self.run_dir(run_id).join("portfolio.json"))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save_diagnostics(
        &self,
        run_id: &str,
        diagnostics: &Diagnostics,
    ) -> Result<(), PersistError> {
        let dir = self.ensure_dir(run_id)?;
        fs::write(
            dir.join("diagnostics.json"),
            serde_json::to_vec_pretty(diagnostics)?,
        )?;
        Ok(())
    }

    pub fn exists(&self, run_id: &str, file: &str) -> bool {
        Path::new(&self.run_dir(run_id)).join(file).exists()
    }
}
