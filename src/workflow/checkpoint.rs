//! Per-thread workflow checkpoints.
//!
//! One JSON record per thread id holding the full state plus the
//! paused-stage marker. Writes go through a temp file and an atomic rename
//! so a crash never leaves a partial checkpoint behind.

use crate::error::{Error, Result};
use crate::workflow::machine::Stage;
use crate::workflow::state::WorkflowState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

/// Version for checkpoint format compatibility.
pub const CHECKPOINT_VERSION: u32 = 1;

/// The persisted record for one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: WorkflowState,
    /// Stage the machine will run next when the thread is resumed.
    pub resume_stage: Stage,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
}

impl Checkpoint {
    pub fn new(thread_id: impl Into<String>, state: WorkflowState, resume_stage: Stage) -> Self {
        Self {
            thread_id: thread_id.into(),
            state,
            resume_stage,
            timestamp: Utc::now(),
            version: CHECKPOINT_VERSION,
        }
    }
}

/// File-backed checkpoint store, keyed by thread id. Distinct thread ids
/// never contend; the caller must not double-invoke one thread id.
pub struct CheckpointStore {
    storage_path: PathBuf,
}

impl CheckpointStore {
    pub fn new(storage_path: PathBuf) -> Self {
        Self { storage_path }
    }

    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.path_for(&checkpoint.thread_id);
        let temp_path = path.with_extension("tmp");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to temp file first, then rename atomically.
        let json = serde_json::to_string_pretty(checkpoint)?;
        fs::write(&temp_path, json).await?;
        fs::rename(temp_path, &path).await?;

        info!(
            "saved checkpoint for thread {} at stage {:?}",
            checkpoint.thread_id, checkpoint.resume_stage
        );
        Ok(())
    }

    pub async fn load(&self, thread_id: &str) -> Result<Checkpoint> {
        let path = self.path_for(thread_id);
        if !path.exists() {
            return Err(Error::CheckpointNotFound(thread_id.to_string()));
        }

        let content = fs::read_to_string(&path).await?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)?;

        if checkpoint.version > CHECKPOINT_VERSION {
            return Err(Error::CheckpointVersion {
                found: checkpoint.version,
                supported: CHECKPOINT_VERSION,
            });
        }

        Ok(checkpoint)
    }

    pub async fn delete(&self, thread_id: &str) -> Result<()> {
        let path = self.path_for(thread_id);
        if path.exists() {
            fs::remove_file(path).await?;
            debug!("deleted checkpoint for thread {thread_id}");
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let mut thread_ids = Vec::new();
        if !self.storage_path.exists() {
            return Ok(thread_ids);
        }

        let mut entries = fs::read_dir(&self.storage_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(thread_id) = name.strip_suffix(".checkpoint.json") {
                    thread_ids.push(thread_id.to_string());
                }
            }
        }
        Ok(thread_ids)
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        // Thread ids are opaque; keep only filesystem-safe characters.
        let safe: String = thread_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            })
            .collect();
        self.storage_path.join(format!("{safe}.checkpoint.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::state::ChatMessage;
    use tempfile::TempDir;

    fn store() -> (CheckpointStore, TempDir) {
        let temp = TempDir::new().unwrap();
        (CheckpointStore::new(temp.path().to_path_buf()), temp)
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let (store, _temp) = store();
        let mut state = WorkflowState::default();
        state.messages.push(ChatMessage::user("make pizza"));

        let checkpoint = Checkpoint::new("thread-1", state, Stage::FetchSelectedRecipes);
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load("thread-1").await.unwrap();
        assert_eq!(loaded.thread_id, "thread-1");
        assert_eq!(loaded.resume_stage, Stage::FetchSelectedRecipes);
        assert_eq!(loaded.state.messages.len(), 1);
    }

    #[tokio::test]
    async fn load_missing_thread_is_not_found() {
        let (store, _temp) = store();
        match store.load("no-such-thread").await {
            Err(Error::CheckpointNotFound(id)) => assert_eq!(id, "no-such-thread"),
            other => panic!("expected CheckpointNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn newer_version_is_rejected() {
        let (store, _temp) = store();
        let mut checkpoint =
            Checkpoint::new("thread-1", WorkflowState::default(), Stage::SearchRecipes);
        checkpoint.version = CHECKPOINT_VERSION + 1;
        store.save(&checkpoint).await.unwrap();

        assert!(matches!(
            store.load("thread-1").await,
            Err(Error::CheckpointVersion { .. })
        ));
    }

    #[tokio::test]
    async fn list_returns_saved_threads() {
        let (store, _temp) = store();
        for id in ["a", "b"] {
            store
                .save(&Checkpoint::new(
                    id,
                    WorkflowState::default(),
                    Stage::SearchRecipes,
                ))
                .await
                .unwrap();
        }
        let mut ids = store.list().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);

        store.delete("a").await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["b"]);
    }
}
