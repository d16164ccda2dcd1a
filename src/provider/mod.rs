// src/provider/mod.rs
// Transcription provider client port and HTTP implementation

mod http;
pub mod types;

pub use http::HttpProviderClient;
pub use types::{
    CreateJobRequest, CreateJobResponse, JobResult, JobStatusResponse, RemoteJobStatus,
    SourceFile, SyncTranscribeResponse, TranscribeError, TranscriptPart, UploadedMedia,
};

use crate::broker::UploadCredential;
use async_trait::async_trait;
use std::time::Duration;

/// Unified provider client port.
///
/// Covers the four provider-facing operations the pipeline performs: raw
/// binary upload against an ephemeral credential, asynchronous job creation
/// and status lookup, and the synchronous size-capped transcription route.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Upload one binary payload (whole file or one chunk) to the
    /// credential's URL. The per-attempt timeout is computed by the caller
    /// from the payload size.
    async fn upload_media(
        &self,
        credential: &UploadCredential,
        bytes: Vec<u8>,
        timeout: Duration,
    ) -> Result<UploadedMedia, TranscribeError>;

    /// Start an asynchronous transcription job against uploaded audio.
    async fn create_job(
        &self,
        audio_ref: &str,
        speaker_labels: bool,
    ) -> Result<String, TranscribeError>;

    /// Fetch the current status of an asynchronous job.
    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, TranscribeError>;

    /// Transcribe a size-capped payload synchronously. Used for the fallback
    /// route and for individual chunks of a large file.
    async fn transcribe_sync(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        timeout: Duration,
    ) -> Result<TranscriptPart, TranscribeError>;
}
