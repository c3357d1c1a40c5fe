//! Confirmation gate run after policy and before any mutation.

use crate::core::plan::Plan;
use crate::error::AgentError;

/// Require an operator-supplied token matching the plan's, unless forced.
pub fn confirm_plan(plan: &Plan, confirm: Option<&str>, force: bool) -> Result<(), AgentError> {
    if force {
        return Ok(());
    }
    let confirm = confirm.map(str::trim).unwrap_or_default();
    if confirm.is_empty() {
        return Err(AgentError::usage("--confirm is required (or use --force)"));
    }
    let token = plan.confirm_token.trim();
    if !token.is_empty() && token != confirm {
        return Err(AgentError::usage("confirmation token does not match plan"));
    }
    Ok(())
}
