//! Classified failures surfaced by agent commands.
//!
//! Lower layers return these wrapped in [`anyhow::Error`]; the CLI walks the
//! error chain with [`classify`] to pick an exit code.

use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// Bad flags, missing confirmation, unreadable plan input.
    #[error("{0}")]
    Usage(String),

    /// Plan failed structural or per-action validation.
    #[error("{0}")]
    Validation(String),

    /// Plan rejected by the agent policy.
    #[error("{0}")]
    Policy(String),

    /// A referenced entity or state file does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Planner process failed, timed out or produced malformed output.
    #[error("{0}")]
    Planner(String),

    /// The task API rejected a request.
    #[error("{0}")]
    Api(String),

    /// The dispatcher built a request it cannot execute.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => exit_codes::USAGE,
            Self::Validation(_) | Self::Policy(_) => exit_codes::REJECTED,
            Self::NotFound(_) => exit_codes::NOT_FOUND,
            Self::Planner(_) | Self::Api(_) | Self::Internal(_) => exit_codes::ERROR,
        }
    }
}

/// Find the first [`AgentError`] in an error chain.
pub fn classify(err: &anyhow::Error) -> Option<&AgentError> {
    err.chain().find_map(|cause| cause.downcast_ref::<AgentError>())
}

/// Exit code for an arbitrary command error.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    classify(err).map_or(exit_codes::ERROR, AgentError::exit_code)
}
