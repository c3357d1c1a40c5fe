//! Plan acquisition and the gates every plan passes before it is applied.

use std::fmt;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::confirm::confirm_plan;
use crate::core::plan::{NormalizeOptions, Plan, normalize_plan, validate_plan};
use crate::core::policy::{AgentPolicy, enforce_policy};
use crate::io::plan_store::STDIN_PATH;

/// Where a prepared plan came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSource {
    Planner,
    File(String),
    Stdin,
    LastPlan,
}

impl PlanSource {
    pub fn from_path(path: &str) -> Self {
        if path == STDIN_PATH {
            PlanSource::Stdin
        } else {
            PlanSource::File(path.to_string())
        }
    }
}

impl fmt::Display for PlanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanSource::Planner => f.write_str("planner"),
            PlanSource::File(path) => write!(f, "file:{path}"),
            PlanSource::Stdin => f.write_str("stdin"),
            PlanSource::LastPlan => f.write_str("last_plan"),
        }
    }
}

/// Supplies raw plans. The CLI backs this with the plan store and the
/// external planner; tests use canned plans.
pub trait PlanProvider {
    /// Read a plan file, or stdin for `-`.
    fn load_file(&mut self, path: &str) -> Result<Plan>;
    fn last_plan(&mut self) -> Result<Plan>;
    /// Plan `instruction` with the planner. The result is already validated.
    fn plan_instruction(&mut self, instruction: &str) -> Result<Plan>;
}

#[derive(Debug, Clone, Default)]
pub struct PrepareRequest<'a> {
    pub plan_path: Option<&'a str>,
    pub instruction: Option<&'a str>,
    pub confirm: Option<&'a str>,
    pub force: bool,
    pub dry_run: bool,
    pub expected_version: u32,
    /// RFC3339 time stamped into plans without `created_at`.
    pub now: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPlan {
    pub plan: Plan,
    pub source: PlanSource,
}

/// Obtain a plan and run normalize, validate, policy and confirmation.
///
/// An explicit plan path wins over an instruction; with neither, the last
/// plan is reused. Dry runs may carry no actions and skip confirmation.
#[instrument(skip_all, fields(dry_run = request.dry_run, force = request.force))]
pub fn prepare_plan(
    request: &PrepareRequest<'_>,
    provider: &mut dyn PlanProvider,
    policy: Option<&AgentPolicy>,
) -> Result<PreparedPlan> {
    let instruction = request
        .instruction
        .map(str::trim)
        .filter(|i| !i.is_empty());

    let (mut plan, source) = match (request.plan_path, instruction) {
        (Some(path), _) => (provider.load_file(path)?, PlanSource::from_path(path)),
        (None, Some(instruction)) => (provider.plan_instruction(instruction)?, PlanSource::Planner),
        (None, None) => (provider.last_plan()?, PlanSource::LastPlan),
    };
    debug!(%source, actions = plan.actions.len(), "plan obtained");

    normalize_plan(
        &mut plan,
        &NormalizeOptions {
            expected_version: request.expected_version,
            instruction: instruction.unwrap_or_default(),
            now: request.now,
            derive_confirm_token: source == PlanSource::Planner,
        },
    )?;
    validate_plan(&plan, request.expected_version, request.dry_run)?;
    enforce_policy(&plan, policy)?;
    if !request.dry_run {
        confirm_plan(&plan, request.confirm, request.force)?;
    }
    Ok(PreparedPlan { plan, source })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::core::plan::PLAN_VERSION;
    use crate::error::{AgentError, classify};
    use crate::test_support::{plan_with, task_add, task_delete};

    const NOW: &str = "2026-02-07T09:00:00Z";

    #[derive(Default)]
    struct CannedPlans {
        file: Option<Plan>,
        last: Option<Plan>,
        planned: Option<Plan>,
        calls: Vec<String>,
    }

    impl PlanProvider for CannedPlans {
        fn load_file(&mut self, path: &str) -> Result<Plan> {
            self.calls.push(format!("file {path}"));
            self.file
                .clone()
                .ok_or_else(|| AgentError::usage(format!("plan file not found: {path}")).into())
        }

        fn last_plan(&mut self) -> Result<Plan> {
            self.calls.push("last".to_string());
            self.last
                .clone()
                .ok_or_else(|| AgentError::not_found("no last plan found").into())
        }

        fn plan_instruction(&mut self, instruction: &str) -> Result<Plan> {
            self.calls.push(format!("planner {instruction}"));
            self.planned
                .clone()
                .ok_or_else(|| AgentError::Planner("planner failed: offline".into()).into())
        }
    }

    fn request<'a>() -> PrepareRequest<'a> {
        PrepareRequest {
            confirm: Some("abcd"),
            expected_version: PLAN_VERSION,
            now: NOW,
            ..PrepareRequest::default()
        }
    }

    #[test]
    fn plan_path_wins_over_instruction() {
        let mut provider = CannedPlans {
            file: Some(plan_with("abcd", vec![task_add("a")])),
            ..CannedPlans::default()
        };
        let req = PrepareRequest {
            plan_path: Some("plan.json"),
            instruction: Some("ignored"),
            ..request()
        };
        let prepared = prepare_plan(&req, &mut provider, None).expect("prepared");
        assert_eq!(prepared.source, PlanSource::File("plan.json".to_string()));
        assert_eq!(prepared.source.to_string(), "file:plan.json");
        assert_eq!(provider.calls, vec!["file plan.json"]);
        assert_eq!(prepared.plan.created_at.as_deref(), Some(NOW));
    }

    #[test]
    fn falls_back_to_last_plan() {
        let mut provider = CannedPlans {
            last: Some(plan_with("abcd", vec![task_add("a")])),
            ..CannedPlans::default()
        };
        let req = PrepareRequest {
            instruction: Some("   "),
            ..request()
        };
        let prepared = prepare_plan(&req, &mut provider, None).expect("prepared");
        assert_eq!(prepared.source, PlanSource::LastPlan);
    }

    #[test]
    fn file_plans_do_not_get_derived_tokens() {
        let mut provider = CannedPlans {
            file: Some(plan_with("", vec![task_add("a")])),
            ..CannedPlans::default()
        };
        let req = PrepareRequest {
            plan_path: Some("-"),
            ..request()
        };
        let err = prepare_plan(&req, &mut provider, None).expect_err("no token");
        assert_eq!(
            classify(&err),
            Some(&AgentError::Validation("plan missing confirm_token".into()))
        );
    }

    #[test]
    fn dry_run_allows_empty_plans_and_skips_confirm() {
        let mut provider = CannedPlans {
            file: Some(plan_with("abcd", Vec::new())),
            ..CannedPlans::default()
        };
        let req = PrepareRequest {
            plan_path: Some("plan.json"),
            confirm: None,
            dry_run: true,
            ..request()
        };
        prepare_plan(&req, &mut provider, None).expect("dry run");

        let req = PrepareRequest {
            dry_run: false,
            ..req
        };
        let err = prepare_plan(&req, &mut provider, None).expect_err("empty");
        assert_eq!(
            classify(&err),
            Some(&AgentError::Validation("plan has no actions".into()))
        );
    }

    #[test]
    fn policy_runs_before_confirmation() {
        let mut provider = CannedPlans {
            file: Some(plan_with("abcd", vec![task_delete("1")])),
            ..CannedPlans::default()
        };
        let policy = AgentPolicy {
            deny_action_types: BTreeSet::from(["task_delete".to_string()]),
            ..AgentPolicy::default()
        };
        let req = PrepareRequest {
            plan_path: Some("plan.json"),
            confirm: None,
            ..request()
        };
        let err = prepare_plan(&req, &mut provider, Some(&policy)).expect_err("denied");
        assert!(matches!(classify(&err), Some(AgentError::Policy(_))));
    }

    #[test]
    fn confirmation_mismatch_is_usage_error() {
        let mut provider = CannedPlans {
            planned: Some(plan_with("abcd", vec![task_add("a")])),
            ..CannedPlans::default()
        };
        let req = PrepareRequest {
            instruction: Some("add a"),
            confirm: Some("zzzz"),
            ..request()
        };
        let err = prepare_plan(&req, &mut provider, None).expect_err("mismatch");
        assert_eq!(
            classify(&err),
            Some(&AgentError::usage("confirmation token does not match plan"))
        );
        assert_eq!(provider.calls, vec!["planner add a"]);
    }
}
