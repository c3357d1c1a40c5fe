//! Stable exit codes for taskagent CLI commands.

/// Command succeeded (every action applied or skipped as a replay).
pub const OK: i32 = 0;
/// Generic failure: planner error, API error, or a fail-fast apply abort.
pub const ERROR: i32 = 1;
/// Bad flags, missing confirmation, unreadable plan input.
pub const USAGE: i32 = 2;
/// Plan rejected by validation or by the agent policy. Nothing was applied.
pub const REJECTED: i32 = 3;
/// A referenced entity or state file does not exist.
pub const NOT_FOUND: i32 = 4;
/// `--on-error continue` finished the plan but some actions failed.
pub const PARTIAL: i32 = 5;
