// src/state.rs
// Progress state store - persists the single active job across restarts

use crate::provider::types::TranscribeError;
use crate::session::JobStatus;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// The one record the pipeline persists: enough to resume polling a job
/// after a process restart. A missing record, or a terminal status, means
/// there is nothing to resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedJob {
    pub job_id: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub eta_seconds: Option<u64>,
    pub updated_at: String,
}

impl PersistedJob {
    pub fn is_resumable(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Key-value persistence port scoped to the current active job. The pipeline
/// tracks at most one non-terminal job at a time; the batch scheduler
/// serializes work through this single slot.
pub trait StateStore: Send + Sync {
    fn get(&self) -> Result<Option<PersistedJob>, TranscribeError>;
    fn set(&self, job: &PersistedJob) -> Result<(), TranscribeError>;
    fn clear(&self) -> Result<(), TranscribeError>;
}

/// In-memory store for tests and single-run embedding.
#[derive(Default)]
pub struct MemoryStateStore {
    slot: Mutex<Option<PersistedJob>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self) -> Result<Option<PersistedJob>, TranscribeError> {
        Ok(self.slot.lock().map_err(poisoned)?.clone())
    }

    fn set(&self, job: &PersistedJob) -> Result<(), TranscribeError> {
        *self.slot.lock().map_err(poisoned)? = Some(job.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TranscribeError> {
        *self.slot.lock().map_err(poisoned)? = None;
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> TranscribeError {
    TranscribeError::State("state store lock poisoned".to_string())
}

/// File-backed store: one pretty-printed JSON record on disk.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for FileStateStore {
    fn get(&self) -> Result<Option<PersistedJob>, TranscribeError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| TranscribeError::State(format!("Failed to read state: {}", e)))?;

        match serde_json::from_str::<PersistedJob>(&raw) {
            Ok(job) => Ok(Some(job)),
            Err(_) => {
                // Unreadable state: keep a copy for inspection and start fresh
                let backup = self.path.with_extension("json.bak");
                let _ = fs::copy(&self.path, backup);
                let _ = fs::remove_file(&self.path);
                tracing::warn!("Discarded corrupt state file at {:?}", self.path);
                Ok(None)
            }
        }
    }

    fn set(&self, job: &PersistedJob) -> Result<(), TranscribeError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| TranscribeError::State(format!("Failed to create dir: {}", e)))?;
            }
        }

        let json = serde_json::to_string_pretty(job)
            .map_err(|e| TranscribeError::State(format!("Failed to serialize state: {}", e)))?;
        fs::write(&self.path, json)
            .map_err(|e| TranscribeError::State(format!("Failed to save state: {}", e)))
    }

    fn clear(&self) -> Result<(), TranscribeError> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| TranscribeError::State(format!("Failed to clear state: {}", e)))?;
        }
        Ok(())
    }
}
