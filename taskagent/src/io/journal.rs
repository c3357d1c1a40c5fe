//! Replay journal persistence (`agent_replay.json`).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::replay::ReplayJournal;
use crate::io::atomic::write_json_private;

/// Load/save seam for the replay journal. One load per apply run; saves at
/// the end of the run and before a fail-fast abort.
pub trait JournalStore {
    fn load(&self) -> Result<ReplayJournal>;
    fn save(&self, journal: &ReplayJournal) -> Result<()>;
}

/// Journal stored as one JSON file, rewritten whole on every save.
#[derive(Debug, Clone)]
pub struct FileJournalStore {
    pub path: PathBuf,
}

impl FileJournalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl JournalStore for FileJournalStore {
    fn load(&self) -> Result<ReplayJournal> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no replay journal yet");
            return Ok(ReplayJournal::default());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read replay journal {}", self.path.display()))?;
        let journal: ReplayJournal = serde_json::from_str(&raw)
            .with_context(|| format!("parse replay journal {}", self.path.display()))?;
        debug!(entries = journal.len(), "replay journal loaded");
        Ok(journal)
    }

    fn save(&self, journal: &ReplayJournal) -> Result<()> {
        debug!(path = %self.path.display(), entries = journal.len(), "saving replay journal");
        write_json_private(&self.path, journal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileJournalStore::new(temp.path().join("agent_replay.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileJournalStore::new(temp.path().join("state").join("agent_replay.json"));
        let mut journal = ReplayJournal::default();
        journal.mark("abc".to_string(), "2026-02-07T09:00:00Z".to_string());
        store.save(&journal).expect("save");
        assert_eq!(store.load().expect("load"), journal);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent_replay.json");
        fs::write(&path, "[]").expect("write");
        let err = FileJournalStore::new(&path).load().expect_err("corrupt");
        assert!(err.to_string().contains("parse replay journal"));
    }
}
