//! Agent configuration stored in `<state_dir>/config.toml`.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::atomic::write_private;

/// Environment variable naming the planner command.
pub const PLANNER_ENV: &str = "TASKAGENT_PLANNER_CMD";
/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "TASKAGENT_API_TOKEN";

pub const DEFAULT_API_BASE_URL: &str = "https://api.todoist.com/api/v1";

/// Agent configuration (TOML).
///
/// Edited by humans and by `taskagent planner --set`. Missing fields fall
/// back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Shell command that turns a planner request into a plan.
    pub planner_cmd: Option<String>,

    /// Timeout in seconds for the planner process and each API request.
    pub timeout_secs: u64,

    /// Bytes of planner stdout/stderr kept in memory.
    pub planner_output_limit_bytes: usize,

    /// Profile name passed to the planner.
    pub profile: String,

    pub api_base_url: String,

    /// Prefer `TASKAGENT_API_TOKEN`; this is the fallback.
    pub api_token: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            planner_cmd: None,
            timeout_secs: 15,
            planner_output_limit_bytes: 1024 * 1024,
            profile: "default".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.planner_output_limit_bytes == 0 {
            return Err(anyhow!("planner_output_limit_bytes must be > 0"));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(anyhow!("api_base_url must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        return Ok(AgentConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk. The file may hold a token, so it is
/// owner-only.
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_private(path, buf.as_bytes())
}

/// Where the effective planner command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerSource {
    Flag,
    Env,
    Config,
}

impl PlannerSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PlannerSource::Flag => "flag",
            PlannerSource::Env => "env",
            PlannerSource::Config => "config",
        }
    }
}

impl fmt::Display for PlannerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First non-blank planner command in priority order flag > env > config.
pub fn resolve_planner_cmd(
    flag: Option<&str>,
    env: Option<&str>,
    config: Option<&str>,
) -> Option<(String, PlannerSource)> {
    [
        (flag, PlannerSource::Flag),
        (env, PlannerSource::Env),
        (config, PlannerSource::Config),
    ]
    .into_iter()
    .find_map(|(value, source)| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| (v.to_string(), source))
    })
}

/// Environment values the engine consults, captured once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub home: Option<String>,
    pub planner_cmd: Option<String>,
    pub api_token: Option<String>,
}

impl EnvOverrides {
    pub fn from_process() -> Self {
        Self {
            home: std::env::var(crate::io::paths::HOME_ENV).ok(),
            planner_cmd: std::env::var(PLANNER_ENV).ok(),
            api_token: std::env::var(TOKEN_ENV).ok(),
        }
    }
}

/// API token: env first, then config.
pub fn resolve_api_token(env: Option<&str>, cfg: &AgentConfig) -> Option<String> {
    [env, cfg.api_token.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}
