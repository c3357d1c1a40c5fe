//! CLI tests for the `taskagent` binary.
//!
//! Spawns the binary against a temporary state directory and verifies exit
//! codes and output for commands that never reach the network.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use taskagent::exit_codes;
use taskagent::io::paths::AgentPaths;
use taskagent::io::plan_store::write_plan;
use taskagent::test_support::{plan_with, task_add, task_delete};

fn taskagent(state_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_taskagent"))
        .arg("--state-dir")
        .arg(state_dir)
        .args(args)
        .env_remove("TASKAGENT_HOME")
        .env_remove("TASKAGENT_API_TOKEN")
        .env_remove("TASKAGENT_PLANNER_CMD")
        .output()
        .expect("spawn taskagent")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn plan_file(dir: &Path) -> String {
    let plan = plan_with("abcd1234", vec![task_add("Buy milk"), task_delete("7")]);
    let path = dir.join("plan.json");
    write_plan(&path, &plan).expect("write plan");
    path.display().to_string()
}

#[test]
fn dry_run_from_file_succeeds_without_token() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan = plan_file(temp.path());
    let output = taskagent(temp.path(), &["apply", "--plan", &plan, "--dry-run"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("DRY RUN: no actions applied"));
    assert!(out.contains("Confirm: abcd1234"));
    assert!(out.contains("2. task_delete"));
}

#[test]
fn dry_run_json_reports_counts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan = plan_file(temp.path());
    let output = taskagent(temp.path(), &["apply", "--plan", &plan, "--dry-run", "--json"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    let json: Value = serde_json::from_str(&stdout(&output)).expect("json output");
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["action_count"], 2);
}

#[test]
fn apply_without_confirm_is_usage_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan = plan_file(temp.path());
    let output = taskagent(temp.path(), &["apply", "--plan", &plan]);

    assert_eq!(output.status.code(), Some(exit_codes::USAGE));
    assert!(stderr(&output).contains("--confirm is required"));
}

#[test]
fn policy_denial_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = AgentPaths::new(temp.path());
    fs::write(&paths.policy_path, r#"{"deny_action_types":["task_delete"]}"#).expect("policy");
    let plan = plan_file(temp.path());
    let output = taskagent(temp.path(), &["apply", "--plan", &plan, "--dry-run"]);

    assert_eq!(output.status.code(), Some(exit_codes::REJECTED));
    assert!(stderr(&output).contains("policy denied action type: task_delete"));
}

#[test]
fn status_without_last_plan_is_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = taskagent(temp.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::NOT_FOUND));
}

#[test]
fn forced_apply_without_token_is_usage_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan = plan_file(temp.path());
    let output = taskagent(temp.path(), &["apply", "--plan", &plan, "--force"]);

    assert_eq!(output.status.code(), Some(exit_codes::USAGE));
    assert!(stderr(&output).contains("missing API token"));
}

#[test]
fn run_without_instruction_emits_progress_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let events = temp.path().join("events.jsonl");
    let events_arg = events.display().to_string();
    let output = taskagent(temp.path(), &["run", "--force", "--progress-jsonl", &events_arg]);

    assert_eq!(output.status.code(), Some(exit_codes::USAGE));
    let contents = fs::read_to_string(&events).expect("events");
    let types: Vec<String> = contents
        .lines()
        .map(|line| {
            let event: Value = serde_json::from_str(line).expect("json line");
            event["type"].as_str().unwrap_or_default().to_string()
        })
        .collect();
    assert_eq!(types, vec!["agent_run_start", "agent_run_error"]);
}

#[test]
fn schedule_prints_cron_line() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = taskagent(
        temp.path(),
        &[
            "schedule",
            "print",
            "--weekly",
            "sat 09:00",
            "--cron",
            "--bin",
            "/usr/local/bin/taskagent",
            "--instruction",
            "weekly review",
            "--force",
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "0 9 * * 6 /usr/local/bin/taskagent run --instruction 'weekly review' --force\n"
    );
}

#[test]
fn schema_prints_plan_schema() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = taskagent(temp.path(), &["schema"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let schema: Value = serde_json::from_str(&stdout(&output)).expect("schema json");
    assert!(schema["properties"]["actions"].is_object());
}

#[test]
fn planner_set_then_show() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = taskagent(temp.path(), &["planner", "--set", "my-planner --fast"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));

    let output = taskagent(temp.path(), &["planner", "--json"]);
    let json: Value = serde_json::from_str(&stdout(&output)).expect("json");
    assert_eq!(json["planner_cmd"], "my-planner --fast");
    assert_eq!(json["source"], "config");
}
