//! Command output: JSON documents and their plain-text renderings.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::outcome::{ApplyReport, ApplyResult};
use crate::core::plan::{Plan, PlanSummary};
use crate::core::policy::AgentPolicy;

/// A view that can be printed as text or as JSON.
pub trait Render: Serialize {
    fn text(&self) -> String;
}

/// JSON (pretty, trailing newline) or text, per `--json`.
pub fn render<V: Render>(view: &V, json: bool) -> Result<String> {
    if json {
        let mut out = serde_json::to_string_pretty(view).context("serialize output")?;
        out.push('\n');
        return Ok(out);
    }
    Ok(view.text())
}

/// Plan preview shown by `plan`, `status` and dry runs.
#[derive(Debug, Clone, Serialize)]
pub struct PlanPreview {
    pub plan: Plan,
    pub dry_run: bool,
    pub action_count: usize,
    pub summary: PlanSummary,
}

impl PlanPreview {
    pub fn new(plan: Plan, dry_run: bool) -> Self {
        Self {
            action_count: plan.actions.len(),
            summary: plan.summary,
            plan,
            dry_run,
        }
    }
}

impl Render for PlanPreview {
    fn text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Plan: {}", self.plan.instruction);
        if self.dry_run {
            out.push_str("DRY RUN: no actions applied\n");
        }
        let _ = writeln!(out, "Confirm: {}", self.plan.confirm_token);
        let s = &self.summary;
        let _ = writeln!(
            out,
            "Actions: {} (tasks={} projects={} sections={} labels={} comments={})",
            self.action_count, s.tasks, s.projects, s.sections, s.labels, s.comments
        );
        for (i, action) in self.plan.actions.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, action.action_type);
        }
        out
    }
}

/// Result of an apply or run that reached the API.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedView {
    pub plan: Plan,
    #[serde(flatten)]
    pub report: ApplyReport,
}

impl Render for AppliedView {
    fn text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Applied plan: {}", self.plan.instruction);
        out.push_str(&result_lines(&self.report.results));
        out.push_str(&summary_line(&self.report));
        out
    }
}

/// `status`: the last plan and, when present, the last apply attempt.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    #[serde(flatten)]
    pub preview: PlanPreview,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_apply: Option<ApplyReport>,
}

impl Render for StatusView {
    fn text(&self) -> String {
        let mut out = self.preview.text();
        if let Some(applied_at) = &self.preview.plan.applied_at {
            let _ = writeln!(out, "Applied at: {applied_at}");
        }
        if let Some(report) = &self.last_apply {
            let _ = writeln!(
                out,
                "Last {} finished {} (on-error {})",
                report.command, report.finished_at, report.on_error
            );
            out.push_str(&result_lines(&report.results));
            out.push_str(&summary_line(report));
        }
        out
    }
}

/// `policy`: which file applies and its effective rules.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyView {
    /// `explicit`, `default` or `none`.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<AgentPolicy>,
}

impl Render for PolicyView {
    fn text(&self) -> String {
        let Some(policy) = &self.policy else {
            return "Policy: none (all action types allowed)\n".to_string();
        };
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Policy: {} ({})",
            self.path.as_deref().unwrap_or_default(),
            self.source
        );
        let _ = writeln!(out, "Allow: {}", list_or(&policy.allow_action_types, "all"));
        let _ = writeln!(out, "Deny: {}", list_or(&policy.deny_action_types, "none"));
        let cap = match policy.max_destructive_actions {
            0 => "unlimited".to_string(),
            n => n.to_string(),
        };
        let _ = writeln!(out, "Max destructive actions: {cap}");
        out
    }
}

/// `planner`: effective command and where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct PlannerView {
    pub planner_cmd: Option<String>,
    /// `flag`, `env`, `config` or `none`.
    pub source: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub saved: bool,
}

impl Render for PlannerView {
    fn text(&self) -> String {
        match (&self.planner_cmd, self.saved) {
            (Some(cmd), true) => format!("Planner command set to: {cmd}\n"),
            (Some(cmd), false) => format!("Planner command: {cmd} (source: {})\n", self.source),
            (None, _) => "Planner command: none (source: none)\n".to_string(),
        }
    }
}

fn result_lines(results: &[ApplyResult]) -> String {
    let mut out = String::new();
    for result in results {
        let status = match (&result.error, result.skipped_replay) {
            (Some(err), _) => format!("error: {err}"),
            (None, true) => "skipped (replay)".to_string(),
            (None, false) => "ok".to_string(),
        };
        let _ = writeln!(
            out,
            "{}. {} [{status}]",
            result.index + 1,
            result.action.action_type
        );
    }
    out
}

fn summary_line(report: &ApplyReport) -> String {
    let s = &report.summary;
    let mut line = format!(
        "ok={} failed={} skipped_replay={} of {}",
        s.ok_count, s.failed_count, s.skipped_replay, s.action_count
    );
    if report.aborted {
        line.push_str(" (aborted)");
    }
    line.push('\n');
    line
}

fn list_or(items: &std::collections::BTreeSet<String>, empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

pub const EXAMPLES: &str = "\
Examples:
  taskagent plan \"move overdue errands to Saturday\" --context-project Home
  taskagent apply --confirm 1a2b3c4d
  taskagent apply --plan plan.json --dry-run
  cat plan.json | taskagent apply --plan - --confirm 1a2b3c4d --on-error continue
  taskagent run --instruction \"weekly review\" --force --progress-jsonl -
  taskagent schedule print --weekly \"sat 09:00\" --cron --instruction \"weekly review\" --force
  taskagent planner --set 'my-planner --model small'
  taskagent policy
  taskagent status --json
";

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::core::outcome::{ApplySummary, OnError};
    use crate::core::plan::summarize;
    use crate::test_support::{plan_with, task_add, task_delete};

    fn plan() -> Plan {
        let mut plan = plan_with("abcd", vec![task_add("a"), task_delete("7")]);
        plan.instruction = "tidy up".to_string();
        plan.summary = summarize(&plan.actions);
        plan
    }

    fn report() -> ApplyReport {
        let results = vec![
            ApplyResult::skipped(0, task_add("a")),
            ApplyResult::failed(1, task_delete("7"), "HTTP 500".to_string()),
        ];
        ApplyReport {
            command: "apply".to_string(),
            confirm_token: "abcd".to_string(),
            finished_at: "2026-02-07T09:00:00Z".to_string(),
            on_error: OnError::Continue,
            summary: ApplySummary::from_results(&results, 2),
            results,
            failure: None,
            aborted: false,
        }
    }

    #[test]
    fn preview_json_has_counts() {
        let out = render(&PlanPreview::new(plan(), true), true).expect("render");
        let json: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["action_count"], 2);
        assert_eq!(json["summary"]["tasks"], 2);
        assert_eq!(json["plan"]["confirm_token"], "abcd");
    }

    #[test]
    fn preview_text_lists_actions() {
        let text = PlanPreview::new(plan(), true).text();
        assert_eq!(
            text,
            "Plan: tidy up\nDRY RUN: no actions applied\nConfirm: abcd\n\
             Actions: 2 (tasks=2 projects=0 sections=0 labels=0 comments=0)\n\
             1. task_add\n2. task_delete\n"
        );
    }

    #[test]
    fn applied_text_marks_each_result() {
        let view = AppliedView {
            plan: plan(),
            report: report(),
        };
        let text = view.text();
        assert!(text.contains("1. task_add [skipped (replay)]"));
        assert!(text.contains("2. task_delete [error: HTTP 500]"));
        assert!(text.ends_with("ok=0 failed=1 skipped_replay=1 of 2\n"));

        let json: Value = serde_json::from_str(&render(&view, true).expect("render")).expect("json");
        assert_eq!(json["summary"]["failed_count"], 1);
        assert_eq!(json["results"][0]["skipped_replay"], true);
        assert_eq!(json["plan"]["instruction"], "tidy up");
    }

    #[test]
    fn policy_text_without_policy() {
        let view = PolicyView {
            source: "none".to_string(),
            path: None,
            policy: None,
        };
        assert_eq!(view.text(), "Policy: none (all action types allowed)\n");
    }
}
