//! Deterministic, pure logic for the plan/apply engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.
//! Timestamps come in as arguments; nothing here reads the clock.

pub mod action;
pub mod confirm;
pub mod outcome;
pub mod plan;
pub mod policy;
pub mod replay;
pub mod schedule;
