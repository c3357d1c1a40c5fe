//! Plan/apply engine for a task-manager CLI driven by an external planner.
//!
//! A natural-language instruction is turned into a plan of typed actions by
//! a planner process, checked, gated on explicit confirmation and applied
//! against the task API one action at a time. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (normalization, validation,
//!   policy, confirmation, replay keys, scheduling). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem state, the REST API,
//!   the planner process, progress events). Isolated to enable fakes in tests.
//!
//! Orchestration modules ([`context`], [`invoke`], [`prepare`], [`apply`],
//! [`dispatch`], [`agent`]) coordinate core logic with I/O to implement CLI
//! commands.

pub mod agent;
pub mod apply;
pub mod clock;
pub mod context;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod exit_codes;
pub mod invoke;
pub mod io;
pub mod logging;
pub mod prepare;
pub mod report;
pub mod schedule;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
