//! Replay keys and the in-memory idempotency journal.
//!
//! A key identifies one action at one position of one confirmed plan. Rerunning
//! the same plan with the same token finds its keys and skips those actions.
//! Any other plan, token or position hashes to a different key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::action::Action;

#[derive(Serialize)]
struct KeyMaterial<'a> {
    confirm: &'a str,
    index: usize,
    action: &'a Action,
}

/// Hex sha256 of the compact JSON `{"confirm", "index", "action"}`.
pub fn replay_key(confirm: &str, index: usize, action: &Action) -> String {
    let material = KeyMaterial {
        confirm,
        index,
        action,
    };
    // Plain structs of strings/options/ints always serialize.
    let payload = serde_json::to_vec(&material).unwrap_or_default();
    hex::encode(Sha256::digest(&payload))
}

/// Mapping from replay key to the RFC3339 time the action was applied.
///
/// Grows monotonically; entries are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayJournal {
    #[serde(default)]
    pub applied: BTreeMap<String, String>,
}

impl ReplayJournal {
    pub fn contains(&self, key: &str) -> bool {
        self.applied.contains_key(key)
    }

    pub fn mark(&mut self, key: String, applied_at: String) {
        self.applied.insert(key, applied_at);
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}
