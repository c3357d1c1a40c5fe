//! Policy file discovery and loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::policy::AgentPolicy;
use crate::error::AgentError;

/// Which policy file applies, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyLocation {
    /// `--policy` flag.
    Explicit(PathBuf),
    /// `agent_policy.json` in the state directory.
    Default(PathBuf),
    None,
}

impl PolicyLocation {
    pub fn path(&self) -> Option<&Path> {
        match self {
            PolicyLocation::Explicit(path) | PolicyLocation::Default(path) => Some(path.as_path()),
            PolicyLocation::None => None,
        }
    }
}

/// An explicit path always wins; otherwise the default file is used when present.
pub fn discover_policy(explicit: Option<&Path>, default_path: &Path) -> PolicyLocation {
    match explicit {
        Some(path) => PolicyLocation::Explicit(path.to_path_buf()),
        None if default_path.exists() => PolicyLocation::Default(default_path.to_path_buf()),
        None => PolicyLocation::None,
    }
}

/// Read the discovered policy fresh from disk.
pub fn load_policy(location: &PolicyLocation) -> Result<Option<AgentPolicy>> {
    let Some(path) = location.path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Err(AgentError::usage(format!("policy file not found: {}", path.display())).into());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read policy {}", path.display()))?;
    let policy: AgentPolicy = serde_json::from_str(&raw).map_err(|err| {
        anyhow::Error::from(AgentError::usage(format!(
            "invalid policy JSON in {}: {err}",
            path.display()
        )))
    })?;
    debug!(
        path = %path.display(),
        allow = policy.allow_action_types.len(),
        deny = policy.deny_action_types.len(),
        max_destructive = policy.max_destructive_actions,
        "policy loaded"
    );
    Ok(Some(policy))
}
