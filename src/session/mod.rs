// src/session/mod.rs
// Job model: one unit of transcription work and its state machine

use crate::chunk::ChunkTask;
use crate::provider::types::SourceFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod combine;
pub mod progress;

pub use progress::{estimate_eta, ProgressUpdate};

/// A media file handed to the pipeline: metadata plus the raw bytes to move.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn source(&self) -> SourceFile {
        SourceFile {
            name: self.name.clone(),
            byte_size: self.byte_size(),
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Which transcription route a job took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRoute {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Preparing,
    PreparingChunks,
    Uploading,
    ProcessingChunks,
    Transcribing,
    CombiningResults,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed are absorbing: no transitions leave them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One unit of transcription work tracked by the pipeline.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    /// Provider-assigned identifier; absent until upload completes and a
    /// remote job exists.
    pub id: Option<String>,
    pub source: SourceFile,
    pub provider: ProviderRoute,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub eta_seconds: Option<u64>,
    pub chunks: Vec<ChunkTask>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TranscriptionJob {
    pub fn new(source: SourceFile) -> Self {
        Self {
            id: None,
            source,
            provider: ProviderRoute::Primary,
            status: JobStatus::Idle,
            progress_percent: 0,
            eta_seconds: None,
            chunks: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Advance the state machine. Progress is clamped so it never regresses
    /// within one lifecycle, and terminal states absorb further updates.
    pub fn advance(&mut self, status: JobStatus, progress_percent: u8) {
        if self.status.is_terminal() {
            return;
        }

        self.status = status;
        self.progress_percent = self.progress_percent.max(progress_percent.min(100));

        if status.is_terminal() {
            self.completed_at = Some(Utc::now());
            if status == JobStatus::Completed {
                self.progress_percent = 100;
            }
            self.eta_seconds = None;
        }
    }

}

/// Final outcome of one file's trip through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedTranscription {
    pub job_id: Option<String>,
    pub text: String,
    pub duration_secs: f32,
    pub provider: ProviderRoute,
    pub chunk_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> TranscriptionJob {
        TranscriptionJob::new(SourceFile {
            name: "a.mp3".to_string(),
            byte_size: 1024,
            mime_type: "audio/mpeg".to_string(),
        })
    }

    #[test]
    fn test_progress_never_regresses() {
        let mut job = job();
        job.advance(JobStatus::Uploading, 40);
        job.advance(JobStatus::Transcribing, 30);

        assert_eq!(job.status, JobStatus::Transcribing);
        assert_eq!(job.progress_percent, 40);
    }

    #[test]
    fn test_terminal_states_absorb() {
        let mut job = job();
        job.advance(JobStatus::Transcribing, 60);
        job.advance(JobStatus::Failed, 60);
        job.advance(JobStatus::Uploading, 10);

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_completed_forces_full_progress() {
        let mut job = job();
        job.advance(JobStatus::Transcribing, 80);
        job.advance(JobStatus::Completed, 80);

        assert_eq!(job.progress_percent, 100);
    }

    #[test]
    fn test_fresh_lifecycle_starts_from_zero() {
        // a manual retry builds a new job; nothing carries over
        let mut job = job();
        assert_eq!(job.status, JobStatus::Idle);
        assert_eq!(job.progress_percent, 0);
        assert!(job.id.is_none());

        job.advance(JobStatus::Uploading, 10);
        assert_eq!(job.progress_percent, 10);
    }
}
