//! Plan model, default filling and structural validation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::action::{Action, Category};
use crate::error::AgentError;

/// Plan schema version understood by this build.
pub const PLAN_VERSION: u32 = 1;

/// An ordered list of actions plus metadata, awaiting application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<String>,
    #[serde(default)]
    pub confirm_token: String,
    #[serde(default)]
    pub summary: PlanSummary,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Action counts per category. Always derived from `actions`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanSummary {
    pub tasks: u32,
    pub projects: u32,
    pub sections: u32,
    pub labels: u32,
    pub comments: u32,
}

impl PlanSummary {
    pub fn is_empty(&self) -> bool {
        *self == PlanSummary::default()
    }

    pub fn total(&self) -> u32 {
        self.tasks + self.projects + self.sections + self.labels + self.comments
    }
}

/// Count actions by category. Unrecognized types are not counted.
pub fn summarize(actions: &[Action]) -> PlanSummary {
    let mut summary = PlanSummary::default();
    for action in actions {
        let Ok(kind) = action.kind() else {
            continue;
        };
        match kind.category() {
            Category::Task => summary.tasks += 1,
            Category::Project => summary.projects += 1,
            Category::Section => summary.sections += 1,
            Category::Label => summary.labels += 1,
            Category::Comment => summary.comments += 1,
        }
    }
    summary
}

/// Inputs for [`normalize_plan`].
#[derive(Debug, Clone)]
pub struct NormalizeOptions<'a> {
    pub expected_version: u32,
    /// Instruction from the request, used when the plan omits one.
    pub instruction: &'a str,
    /// RFC3339 timestamp stamped into `created_at` when missing.
    pub now: &'a str,
    /// Derive a confirm token when the plan has none. Only planner output
    /// gets one; hand-authored plan files must carry their own.
    pub derive_confirm_token: bool,
}

/// Fill defaults in place: version, instruction, `created_at`, confirm token
/// and summary. Existing values are never overwritten.
pub fn normalize_plan(plan: &mut Plan, opts: &NormalizeOptions<'_>) -> Result<(), AgentError> {
    if plan.version == 0 {
        plan.version = 1;
    }
    check_version(plan.version, opts.expected_version)?;
    if plan.instruction.trim().is_empty() && !opts.instruction.trim().is_empty() {
        plan.instruction = opts.instruction.trim().to_string();
    }
    if plan.created_at.as_deref().is_none_or(|v| v.trim().is_empty()) {
        plan.created_at = Some(opts.now.to_string());
    }
    if opts.derive_confirm_token && plan.confirm_token.trim().is_empty() {
        plan.confirm_token = derive_confirm_token(plan);
    }
    if plan.summary.is_empty() {
        plan.summary = summarize(&plan.actions);
    }
    Ok(())
}

/// Short token bound to the plan's content: first 8 hex chars of a sha256
/// over instruction, creation time and actions.
pub fn derive_confirm_token(plan: &Plan) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plan.instruction.as_bytes());
    hasher.update([0]);
    hasher.update(plan.created_at.as_deref().unwrap_or_default().as_bytes());
    hasher.update([0]);
    // Vec<Action> with String/Option fields always serializes.
    let actions = serde_json::to_vec(&plan.actions).unwrap_or_default();
    hasher.update(&actions);
    let digest = hex::encode(hasher.finalize());
    digest[..8].to_string()
}

/// Structural validation: version, confirm token, action count and every
/// action's required fields. Failures are reported, never auto-corrected.
pub fn validate_plan(
    plan: &Plan,
    expected_version: u32,
    allow_empty_actions: bool,
) -> Result<(), AgentError> {
    check_version(plan.version, expected_version)?;
    if plan.confirm_token.trim().is_empty() {
        return Err(AgentError::Validation("plan missing confirm_token".to_string()));
    }
    if plan.actions.is_empty() && !allow_empty_actions {
        return Err(AgentError::Validation("plan has no actions".to_string()));
    }
    for (index, action) in plan.actions.iter().enumerate() {
        let kind = action
            .kind()
            .map_err(|err| AgentError::Validation(format!("action {index}: {err}")))?;
        kind.check_required(action)
            .map_err(|message| AgentError::Validation(format!("action {index}: {message}")))?;
    }
    Ok(())
}

fn check_version(version: u32, expected: u32) -> Result<(), AgentError> {
    if version != expected {
        return Err(AgentError::Validation(format!(
            "unsupported plan version {version} (expected {expected})"
        )));
    }
    Ok(())
}
