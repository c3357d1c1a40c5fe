//! JSON-lines progress events for external observers.
//!
//! Each event is one compact JSON object per line:
//! `{"type": ..., "timestamp": ..., ...fields}`. The stream is optional and
//! best-effort: a failed write is logged and never fails the command.

use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::warn;

use crate::clock::{Clock, rfc3339};
use crate::io::atomic::create_private_dir;

pub const RUN_START: &str = "agent_run_start";
pub const RUN_COMPLETE: &str = "agent_run_complete";
pub const RUN_ERROR: &str = "agent_run_error";
pub const PLAN_LOADED: &str = "agent_plan_loaded";
pub const ACTION_START: &str = "agent_action_start";
pub const ACTION_COMPLETE: &str = "agent_action_complete";
pub const ACTION_ERROR: &str = "agent_action_error";
pub const ACTION_SKIPPED_REPLAY: &str = "agent_action_skipped_replay";
pub const APPLY_SUMMARY: &str = "agent_apply_summary";

/// Path value that routes events to stderr.
pub const STDERR_PATH: &str = "-";

pub struct Progress {
    sink: Option<RefCell<Box<dyn Write>>>,
    clock: Box<dyn Clock>,
}

impl Progress {
    pub fn new(writer: Box<dyn Write>, clock: Box<dyn Clock>) -> Self {
        Self {
            sink: Some(RefCell::new(writer)),
            clock,
        }
    }

    /// Progress that drops every event.
    pub fn disabled(clock: Box<dyn Clock>) -> Self {
        Self { sink: None, clock }
    }

    /// Open the sink named by `--progress-jsonl`: `-` for stderr, otherwise a
    /// file opened for append with owner-only permissions.
    pub fn open(path: Option<&str>, clock: Box<dyn Clock>) -> Result<Self> {
        let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(Self::disabled(clock));
        };
        if path == STDERR_PATH {
            return Ok(Self::new(Box::new(std::io::stderr()), clock));
        }
        let file_path = Path::new(path);
        if let Some(parent) = file_path.parent() {
            create_private_dir(parent)?;
        }
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options
            .open(file_path)
            .with_context(|| format!("open progress file {path}"))?;
        Ok(Self::new(Box::new(file), clock))
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Emit one event. `fields` must be a JSON object; other values are ignored.
    pub fn emit(&self, event_type: &str, fields: Value) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut event = Map::new();
        event.insert("type".to_string(), Value::from(event_type));
        event.insert("timestamp".to_string(), Value::from(rfc3339(self.clock.now())));
        if let Value::Object(extra) = fields {
            for (key, value) in extra {
                if key != "type" && key != "timestamp" {
                    event.insert(key, value);
                }
            }
        }
        let mut line = Value::Object(event).to_string();
        line.push('\n');

        let mut writer = sink.borrow_mut();
        if let Err(err) = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush())
        {
            warn!(%err, event_type, "failed to write progress event");
        }
    }
}
