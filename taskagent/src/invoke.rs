//! Instruction → validated plan, through the external planner.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::context::PlannerContext;
use crate::core::plan::{NormalizeOptions, Plan, normalize_plan, validate_plan};
use crate::error::AgentError;
use crate::io::plan_store::decode_plan;
use crate::io::planner::Planner;

/// The single JSON object a planner receives on stdin.
#[derive(Debug, Clone, Serialize)]
pub struct PlannerRequest {
    pub instruction: String,
    pub profile: String,
    pub context: PlannerContext,
    /// RFC3339 request time.
    pub now: String,
}

/// Invoke the planner and turn its output into a normalized, validated plan.
///
/// Planner output without a confirm token gets a derived one.
#[instrument(skip_all, fields(profile = %request.profile, expected_version = expected_version))]
pub fn run_planner(
    planner: &dyn Planner,
    request: &PlannerRequest,
    expected_version: u32,
) -> Result<Plan> {
    let payload = serde_json::to_vec(request).context("serialize planner request")?;
    let raw = planner.invoke(&payload)?;

    let text = String::from_utf8(raw)
        .map_err(|err| AgentError::Planner(format!("parse planner output: {err}")))?;
    let mut plan = decode_plan(text.trim())
        .map_err(|err| AgentError::Planner(format!("parse planner output: {err:#}")))?;

    normalize_plan(
        &mut plan,
        &NormalizeOptions {
            expected_version,
            instruction: &request.instruction,
            now: &request.now,
            derive_confirm_token: true,
        },
    )?;
    validate_plan(&plan, expected_version, false)?;
    info!(
        actions = plan.actions.len(),
        confirm_token = %plan.confirm_token,
        "planner produced plan"
    );
    Ok(plan)
}
