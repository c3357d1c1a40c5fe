//! I/O helpers for taskagent commands.

pub mod api;
pub mod atomic;
pub mod config;
pub mod journal;
pub mod paths;
pub mod plan_store;
pub mod planner;
pub mod policy_store;
pub mod process;
pub mod progress;
pub mod resolver;
pub mod rest;
