//! Locations of taskagent state files.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Environment variable that overrides the state directory.
pub const HOME_ENV: &str = "TASKAGENT_HOME";

/// Every file the engine reads or writes lives under one state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPaths {
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    pub last_plan_path: PathBuf,
    pub last_apply_path: PathBuf,
    pub journal_path: PathBuf,
    pub policy_path: PathBuf,
}

impl AgentPaths {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            config_path: state_dir.join("config.toml"),
            last_plan_path: state_dir.join("last_plan.json"),
            last_apply_path: state_dir.join("last_apply.json"),
            journal_path: state_dir.join("agent_replay.json"),
            policy_path: state_dir.join("agent_policy.json"),
            state_dir,
        }
    }

    /// Pick the state directory: explicit flag, then `TASKAGENT_HOME`, then
    /// the platform config directory.
    pub fn resolve(flag: Option<&Path>, env: Option<&str>) -> Result<Self> {
        if let Some(dir) = flag {
            return Ok(Self::new(dir));
        }
        if let Some(dir) = env.map(str::trim).filter(|v| !v.is_empty()) {
            return Ok(Self::new(dir));
        }
        let base = dirs::config_dir()
            .ok_or_else(|| anyhow!("cannot locate a config directory; pass --state-dir"))?;
        Ok(Self::new(base.join("taskagent")))
    }
}
