//! Plan and apply-report load/save helpers with schema validation.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

use crate::core::outcome::ApplyReport;
use crate::core::plan::Plan;
use crate::error::AgentError;
use crate::io::atomic::write_json_private;

/// JSON Schema every plan (file or planner output) must satisfy.
pub const PLAN_SCHEMA: &str = include_str!("../../schemas/plan.v1.schema.json");

/// Path sentinel for reading a plan from standard input.
pub const STDIN_PATH: &str = "-";

/// Parse raw JSON into a plan: syntax, then schema, then typed decode.
pub fn decode_plan(raw: &str) -> Result<Plan> {
    let value: Value = serde_json::from_str(raw).context("parse json")?;
    validate_schema(&value)?;
    let plan: Plan = serde_json::from_value(value).context("decode plan")?;
    Ok(plan)
}

fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).context("parse plan schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(instance) {
        let messages = compiled
            .iter_errors(instance)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "plan schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

/// Read a plan from `path`, or from `stdin` when `path` is `-`.
pub fn read_plan(path: &str, stdin: &mut dyn Read) -> Result<Plan> {
    let raw = if path == STDIN_PATH {
        let mut buf = String::new();
        stdin
            .read_to_string(&mut buf)
            .context("read plan from stdin")?;
        buf
    } else {
        let file = Path::new(path);
        if !file.exists() {
            return Err(AgentError::usage(format!("plan file not found: {path}")).into());
        }
        fs::read_to_string(file).with_context(|| format!("read plan {path}"))?
    };
    debug!(path, bytes = raw.len(), "loaded plan input");
    decode_plan(&raw).map_err(|err| {
        anyhow::Error::from(AgentError::usage(format!(
            "invalid plan JSON in {}: {err:#}",
            display_source(path)
        )))
    })
}

fn display_source(path: &str) -> &str {
    if path == STDIN_PATH { "stdin" } else { path }
}

/// Write a plan as pretty JSON with owner-only permissions.
pub fn write_plan(path: &Path, plan: &Plan) -> Result<()> {
    debug!(path = %path.display(), actions = plan.actions.len(), "writing plan");
    write_json_private(path, plan)
}

/// Load the last persisted plan. Missing is a not-found error.
pub fn load_last_plan(path: &Path) -> Result<Plan> {
    if !path.exists() {
        return Err(AgentError::not_found("no last plan found").into());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    decode_plan(&raw).with_context(|| format!("invalid plan JSON in {}", path.display()))
}

/// Load the last apply report, if one was written.
pub fn load_apply_report(path: &Path) -> Result<Option<ApplyReport>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let report = serde_json::from_str(&raw)
        .with_context(|| format!("parse apply report {}", path.display()))?;
    Ok(Some(report))
}

pub fn write_apply_report(path: &Path, report: &ApplyReport) -> Result<()> {
    debug!(path = %path.display(), results = report.results.len(), "writing apply report");
    write_json_private(path, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use crate::test_support::{plan_with, task_add};

    #[test]
    fn schema_compiles() {
        let schema: Value = serde_json::from_str(PLAN_SCHEMA).expect("parse schema");
        validator_for(&schema).expect("compile schema");
    }

    #[test]
    fn write_then_read_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.json");
        let plan = plan_with("abcd", vec![task_add("Buy milk")]);
        write_plan(&path, &plan).expect("write");

        let path_str = path.to_str().expect("utf8 path");
        let loaded = read_plan(path_str, &mut std::io::empty()).expect("read");
        assert_eq!(loaded, plan);
    }

    #[test]
    fn reads_from_stdin_sentinel() {
        let raw = r#"{"confirm_token":"abcd","actions":[{"type":"task_add","content":"x"}]}"#;
        let plan = read_plan("-", &mut raw.as_bytes()).expect("read");
        assert_eq!(plan.confirm_token, "abcd");
        assert_eq!(plan.actions.len(), 1);
    }

    #[test]
    fn legacy_due_field_passes_schema() {
        let raw = r#"{"actions":[{"type":"task_add","content":"Pay rent","due":"tomorrow"}]}"#;
        let plan = decode_plan(raw).expect("decode");
        assert_eq!(plan.actions[0].due_string.as_deref(), Some("tomorrow"));

        let raw = r#"{"actions":[{"type":"task_add","content":"Pay rent","due":7}]}"#;
        assert!(decode_plan(raw).is_err());
    }

    #[test]
    fn missing_file_is_usage_error() {
        let err = read_plan("/definitely/not/here.json", &mut std::io::empty()).expect_err("missing");
        assert_eq!(
            classify(&err),
            Some(&AgentError::usage("plan file not found: /definitely/not/here.json"))
        );
    }

    #[test]
    fn schema_violation_is_usage_error() {
        let raw = r#"{"actions":[{"content":"no type"}]}"#;
        let err = read_plan("-", &mut raw.as_bytes()).expect_err("invalid");
        let message = err.to_string();
        assert!(message.starts_with("invalid plan JSON in stdin"), "{message}");
        assert!(matches!(classify(&err), Some(AgentError::Usage(_))));
    }

    #[test]
    fn malformed_json_is_usage_error() {
        let err = read_plan("-", &mut "{not json".as_bytes()).expect_err("invalid");
        assert!(matches!(classify(&err), Some(AgentError::Usage(_))));
    }

    #[test]
    fn missing_last_plan_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_last_plan(&temp.path().join("last_plan.json")).expect_err("missing");
        assert_eq!(classify(&err), Some(&AgentError::not_found("no last plan found")));
    }

    #[test]
    fn missing_apply_report_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report = load_apply_report(&temp.path().join("last_apply.json")).expect("load");
        assert!(report.is_none());
    }
}
