//! Apply results and their aggregate counts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::action::Action;

/// What the apply loop does after an action fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Stop at the first failure.
    #[default]
    Fail,
    /// Record the failure and move on to the next action.
    Continue,
}

impl OnError {
    pub fn as_str(self) -> &'static str {
        match self {
            OnError::Fail => "fail",
            OnError::Continue => "continue",
        }
    }
}

impl fmt::Display for OnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "fail" => Ok(OnError::Fail),
            "continue" => Ok(OnError::Continue),
            other => Err(format!("--on-error must be fail or continue (got {other})")),
        }
    }
}

/// Outcome of one action. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub index: usize,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped_replay: bool,
}

impl ApplyResult {
    pub fn ok(index: usize, action: Action) -> Self {
        Self {
            index,
            action,
            error: None,
            skipped_replay: false,
        }
    }

    pub fn failed(index: usize, action: Action, error: String) -> Self {
        Self {
            index,
            action,
            error: Some(error),
            skipped_replay: false,
        }
    }

    pub fn skipped(index: usize, action: Action) -> Self {
        Self {
            index,
            action,
            error: None,
            skipped_replay: true,
        }
    }
}

/// The action error reported alongside the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub index: usize,
    pub action_type: String,
    pub message: String,
}

impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "action {} ({}): {}",
            self.index, self.action_type, self.message
        )
    }
}

/// Results of one apply run.
///
/// `failure` holds the first action error in both modes; `aborted` is set
/// only when `fail` mode stopped early.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub results: Vec<ApplyResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ApplyFailure>,
    #[serde(default)]
    pub aborted: bool,
}

impl ApplyOutcome {
    pub fn summary(&self, action_count: usize) -> ApplySummary {
        ApplySummary::from_results(&self.results, action_count)
    }
}

/// Persisted record of the last apply attempt (`last_apply.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub command: String,
    pub confirm_token: String,
    pub finished_at: String,
    pub on_error: OnError,
    pub summary: ApplySummary,
    #[serde(default)]
    pub results: Vec<ApplyResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ApplyFailure>,
    #[serde(default)]
    pub aborted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub ok_count: usize,
    pub failed_count: usize,
    pub skipped_replay: usize,
    pub action_count: usize,
}

impl ApplySummary {
    pub fn from_results(results: &[ApplyResult], action_count: usize) -> Self {
        let mut summary = ApplySummary {
            action_count,
            ..ApplySummary::default()
        };
        for result in results {
            if result.error.is_some() {
                summary.failed_count += 1;
            } else if result.skipped_replay {
                summary.skipped_replay += 1;
            } else {
                summary.ok_count += 1;
            }
        }
        summary
    }

    /// At least one action took effect now or in an earlier run.
    pub fn any_applied(&self) -> bool {
        self.ok_count + self.skipped_replay > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::task_add;

    #[test]
    fn summary_counts_each_outcome_once() {
        let results = vec![
            ApplyResult::ok(0, task_add("a")),
            ApplyResult::failed(1, task_add("b"), "boom".to_string()),
            ApplyResult::skipped(2, task_add("c")),
        ];
        let summary = ApplySummary::from_results(&results, 4);
        assert_eq!(
            summary,
            ApplySummary {
                ok_count: 1,
                failed_count: 1,
                skipped_replay: 1,
                action_count: 4,
            }
        );
        assert!(summary.any_applied());
    }

    #[test]
    fn on_error_parses_known_modes() {
        assert_eq!("continue".parse::<OnError>(), Ok(OnError::Continue));
        assert_eq!("".parse::<OnError>(), Ok(OnError::Fail));
        assert!("retry".parse::<OnError>().is_err());
    }

    #[test]
    fn result_json_omits_defaults() {
        let json = serde_json::to_value(ApplyResult::ok(0, task_add("a"))).expect("encode");
        assert_eq!(
            json,
            serde_json::json!({"index": 0, "action": {"type": "task_add", "content": "a"}})
        );
    }
}
