//! Planner abstraction for plan generation.
//!
//! The [`Planner`] trait decouples planning from the external process that
//! does it. Production runs a shell command; tests use scripted planners that
//! return predetermined output without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::error::AgentError;
use crate::io::process::run_command_with_timeout;

/// One JSON request in, one JSON plan out.
pub trait Planner {
    /// Feed `input` to the planner and return its raw output.
    fn invoke(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// Runs the configured command through `/bin/sh -c`.
#[derive(Debug, Clone)]
pub struct ShellPlanner {
    pub command: String,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Planner for ShellPlanner {
    #[instrument(skip_all, fields(timeout_secs = self.timeout.as_secs()))]
    fn invoke(&self, input: &[u8]) -> Result<Vec<u8>> {
        info!(command = %self.command, "invoking planner");
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(&self.command);

        let output = run_command_with_timeout(cmd, Some(input), self.timeout, self.output_limit_bytes)
            .context("run planner")?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "planner timed out");
            return Err(
                AgentError::Planner(format!("planner timed out after {:?}", self.timeout)).into(),
            );
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "planner failed");
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = match stderr.trim() {
                "" => format!("exit status {}", describe_status(output.status.code())),
                trimmed => trimmed.to_string(),
            };
            return Err(AgentError::Planner(format!("planner failed: {detail}")).into());
        }

        debug!(bytes = output.stdout.len(), "planner completed successfully");
        Ok(output.stdout)
    }
}

fn describe_status(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}
