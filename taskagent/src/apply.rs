//! Sequential apply loop with replay skipping.

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::clock::{Clock, rfc3339};
use crate::core::action::Action;
use crate::core::outcome::{ApplyFailure, ApplyOutcome, ApplyResult, OnError};
use crate::core::replay::replay_key;
use crate::dispatch::ActionDispatcher;
use crate::error::{AgentError, classify};
use crate::io::journal::JournalStore;
use crate::io::progress::{
    ACTION_COMPLETE, ACTION_ERROR, ACTION_SKIPPED_REPLAY, ACTION_START, Progress,
};

/// Collaborators of one apply run.
pub struct ApplyDeps<'a> {
    pub dispatcher: &'a dyn ActionDispatcher,
    pub journal: &'a dyn JournalStore,
    pub progress: &'a Progress,
    pub clock: &'a dyn Clock,
}

/// Everything an apply loop produced once dispatching started.
#[derive(Debug)]
pub struct ApplyRun {
    pub outcome: ApplyOutcome,
    /// Set when the run ended on an internal error or the journal could not
    /// be saved. `outcome` still describes every action that was sent.
    pub error: Option<anyhow::Error>,
}

impl ApplyRun {
    pub fn into_result(self) -> Result<ApplyOutcome> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.outcome),
        }
    }
}

/// Apply `actions` in order under `confirm`.
///
/// Actions already recorded in the journal are skipped. Each success is
/// journaled, and the journal is saved before returning, including when
/// `fail` mode stops at the first error. API and validation errors are
/// per-action results; an [`AgentError::Internal`] stops the run in either
/// mode and is returned in [`ApplyRun::error`] next to the outcome. Only a
/// journal that cannot be loaded fails the call outright, before anything
/// is sent.
#[instrument(skip_all, fields(confirm = %confirm, actions = actions.len(), on_error = %on_error))]
pub fn apply_actions(
    confirm: &str,
    actions: &[Action],
    on_error: OnError,
    deps: &ApplyDeps<'_>,
) -> Result<ApplyRun> {
    let mut journal = deps.journal.load()?;
    let mut outcome = ApplyOutcome::default();
    let mut halted = None;

    for (index, action) in actions.iter().enumerate() {
        let action_type = action.action_type.as_str();
        deps.progress.emit(
            ACTION_START,
            json!({"index": index, "action_type": action_type}),
        );

        let key = replay_key(confirm, index, action);
        if journal.contains(&key) {
            info!(index, action_type, "skipping replayed action");
            deps.progress.emit(
                ACTION_SKIPPED_REPLAY,
                json!({"index": index, "action_type": action_type}),
            );
            outcome.results.push(ApplyResult::skipped(index, action.clone()));
            continue;
        }

        match deps.dispatcher.dispatch(action) {
            Ok(()) => {
                journal.mark(key, rfc3339(deps.clock.now()));
                deps.progress.emit(
                    ACTION_COMPLETE,
                    json!({"index": index, "action_type": action_type}),
                );
                outcome.results.push(ApplyResult::ok(index, action.clone()));
            }
            Err(err) => {
                let message = format!("{err:#}");
                let internal = matches!(classify(&err), Some(AgentError::Internal(_)));
                if internal {
                    error!(index, action_type, error = %message, "internal error, stopping apply");
                } else {
                    warn!(index, action_type, error = %message, "action failed");
                }
                deps.progress.emit(
                    ACTION_ERROR,
                    json!({"index": index, "action_type": action_type, "error": message}),
                );
                outcome
                    .results
                    .push(ApplyResult::failed(index, action.clone(), message.clone()));
                outcome.failure.get_or_insert(ApplyFailure {
                    index,
                    action_type: action_type.to_string(),
                    message,
                });
                if internal || on_error == OnError::Fail {
                    outcome.aborted = true;
                }
                if internal {
                    halted = Some(err.context(format!("action {index} ({action_type})")));
                    break;
                }
                if outcome.aborted {
                    break;
                }
            }
        }
    }

    let saved = deps.journal.save(&journal).context("save replay journal");
    let error = match (halted, saved) {
        (Some(err), Ok(())) => Some(err),
        (Some(err), Err(save_err)) => {
            error!(error = %format!("{save_err:#}"), "replay journal not saved");
            Some(err)
        }
        (None, Err(save_err)) => Some(save_err),
        (None, Ok(())) => None,
    };
    Ok(ApplyRun { outcome, error })
}
