// src/provider/types.rs
// Provider wire types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata for one media file being submitted for transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
}

/// One transcribed piece as returned by a synchronous transcription call
/// (the fallback route, or a single chunk of a large file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptPart {
    pub text: String,
    pub duration_secs: f32,
}

/// Response from a direct binary upload.
#[derive(Debug, Deserialize)]
pub struct UploadedMedia {
    #[serde(rename = "uploadedUrl")]
    pub uploaded_url: String,
}

/// Request to start an asynchronous transcription job.
#[derive(Debug, Serialize)]
pub struct CreateJobRequest {
    #[serde(rename = "audioRef")]
    pub audio_ref: String,
    #[serde(rename = "speakerLabels")]
    pub speaker_labels: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobResponse {
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Provider-side job state.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RemoteJobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Final result payload of a completed job. The provider's richer schema
/// (speakers, chapters) is out of scope; only the fields the pipeline needs.
#[derive(Debug, Clone, Deserialize)]
pub struct JobResult {
    #[serde(rename = "transcriptText")]
    pub transcript_text: String,
    #[serde(rename = "durationSeconds", default)]
    pub duration_seconds: f32,
}

#[derive(Debug, Deserialize)]
pub struct JobStatusResponse {
    pub status: RemoteJobStatus,
    #[serde(rename = "progressPercent", default)]
    pub progress_percent: Option<u8>,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncTranscribeResponse {
    #[serde(rename = "transcriptText")]
    pub transcript_text: String,
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: f32,
}

/// Pipeline error types with retry classification
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Authentication or billing rejected: {0} - check the provider account and billing status")]
    AuthOrBilling(String),

    #[error("File of {size_bytes} bytes exceeds the direct upload limit ({direct_limit_bytes} bytes) and the fallback limit ({fallback_limit_bytes} bytes)")]
    PayloadTooLarge {
        size_bytes: u64,
        direct_limit_bytes: u64,
        fallback_limit_bytes: u64,
    },

    #[error("Unsupported media format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Transcription job failed: {0}")]
    JobFailed(String),

    #[error("Gave up waiting for job {job_id} after {waited_secs}s without a terminal response")]
    PollExhausted { job_id: String, waited_secs: u64 },

    #[error("Cancelled")]
    Cancelled,

    #[error("State persistence error: {0}")]
    State(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl TranscribeError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranscribeError::Network(_) | TranscribeError::Timeout | TranscribeError::RateLimited
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TranscribeError::Network("reset".to_string()).is_retryable());
        assert!(TranscribeError::Timeout.is_retryable());
        assert!(TranscribeError::RateLimited.is_retryable());

        assert!(!TranscribeError::AuthOrBilling("401".to_string()).is_retryable());
        assert!(!TranscribeError::UnsupportedFormat("midi".to_string()).is_retryable());
        assert!(!TranscribeError::JobFailed("bad audio".to_string()).is_retryable());
        assert!(!TranscribeError::PayloadTooLarge {
            size_bytes: 1,
            direct_limit_bytes: 1,
            fallback_limit_bytes: 1,
        }
        .is_retryable());
    }

    #[test]
    fn test_job_status_response_parsing() {
        let raw = r#"{"status":"processing","progressPercent":42}"#;
        let parsed: JobStatusResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.status, RemoteJobStatus::Processing);
        assert_eq!(parsed.progress_percent, Some(42));
        assert!(parsed.result.is_none());

        let raw = r#"{"status":"completed","result":{"transcriptText":"hello","durationSeconds":3.5}}"#;
        let parsed: JobStatusResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.status, RemoteJobStatus::Completed);
        assert_eq!(parsed.result.unwrap().transcript_text, "hello");
    }
}
