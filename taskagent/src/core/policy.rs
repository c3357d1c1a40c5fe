//! Agent policy: which action types an automated run may apply.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::plan::Plan;
use crate::error::AgentError;

/// Allow/deny lists and a destructive-action cap (0 = unlimited).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPolicy {
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub allow_action_types: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub deny_action_types: BTreeSet<String>,
    pub max_destructive_actions: u32,
}

/// Check a validated plan against an optional policy. `None` permits everything.
///
/// Type checks stop at the first disallowed action; the destructive count
/// covers the whole plan.
pub fn enforce_policy(plan: &Plan, policy: Option<&AgentPolicy>) -> Result<(), AgentError> {
    let Some(policy) = policy else {
        return Ok(());
    };

    let mut destructive = 0u32;
    for action in &plan.actions {
        let action_type = action.action_type.trim();
        if !policy.allow_action_types.is_empty() && !policy.allow_action_types.contains(action_type)
        {
            return Err(AgentError::Policy(format!(
                "policy denied action type: {action_type} (not in allow list)"
            )));
        }
        if policy.deny_action_types.contains(action_type) {
            return Err(AgentError::Policy(format!(
                "policy denied action type: {action_type}"
            )));
        }
        if action.kind().is_ok_and(|kind| kind.is_destructive()) {
            destructive += 1;
        }
    }

    let max = policy.max_destructive_actions;
    if max > 0 && destructive > max {
        return Err(AgentError::Policy(format!(
            "policy exceeded max destructive actions: {destructive} > {max}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{Action, ActionKind};
    use crate::test_support::{plan_with, task_add, task_delete};

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn project_delete(id: &str) -> Action {
        let mut action = Action::new(ActionKind::ProjectDelete);
        action.project_id = Some(id.to_string());
        action
    }

    #[test]
    fn no_policy_permits_everything() {
        let plan = plan_with("tok", vec![task_delete("1"), project_delete("2")]);
        enforce_policy(&plan, None).expect("permitted");
    }

    #[test]
    fn allow_list_rejects_unlisted_types() {
        let policy = AgentPolicy {
            allow_action_types: set(&["task_add"]),
            ..AgentPolicy::default()
        };
        let plan = plan_with("tok", vec![task_add("a"), task_delete("1")]);
        let err = enforce_policy(&plan, Some(&policy)).expect_err("denied");
        assert_eq!(
            err.to_string(),
            "policy denied action type: task_delete (not in allow list)"
        );
    }

    #[test]
    fn deny_wins_over_allow() {
        let policy = AgentPolicy {
            allow_action_types: set(&["task_add", "task_delete"]),
            deny_action_types: set(&["task_delete"]),
            ..AgentPolicy::default()
        };
        let plan = plan_with("tok", vec![task_delete("1")]);
        let err = enforce_policy(&plan, Some(&policy)).expect_err("denied");
        assert_eq!(err.to_string(), "policy denied action type: task_delete");
    }

    #[test]
    fn destructive_cap_counts_whole_plan() {
        let policy = AgentPolicy {
            max_destructive_actions: 1,
            ..AgentPolicy::default()
        };
        let two = plan_with("tok", vec![task_delete("1"), task_add("a"), project_delete("2")]);
        let err = enforce_policy(&two, Some(&policy)).expect_err("too many");
        assert_eq!(err, AgentError::Policy("policy exceeded max destructive actions: 2 > 1".into()));

        let one = plan_with("tok", vec![task_delete("1"), task_add("a")]);
        enforce_policy(&one, Some(&policy)).expect("within cap");
    }

    #[test]
    fn archive_counts_as_destructive() {
        let mut archive = Action::new(ActionKind::ProjectArchive);
        archive.project_id = Some("9".to_string());
        let policy = AgentPolicy {
            max_destructive_actions: 1,
            ..AgentPolicy::default()
        };
        let plan = plan_with("tok", vec![archive, task_delete("1")]);
        enforce_policy(&plan, Some(&policy)).expect_err("archive + delete exceeds 1");
    }

    #[test]
    fn zero_cap_is_unlimited() {
        let plan = plan_with("tok", vec![task_delete("1"), task_delete("2"), task_delete("3")]);
        enforce_policy(&plan, Some(&AgentPolicy::default())).expect("unlimited");
    }
}
