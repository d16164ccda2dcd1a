// src/orchestrator/mod.rs
// Upload orchestrator - executes binary transfers with bounded retries and
// size-scaled timeouts

use crate::broker::UploadCredential;
use crate::chunk::ChunkTask;
use crate::provider::types::{TranscribeError, TranscriptPart, UploadedMedia};
use crate::provider::ProviderClient;
use std::future::Future;
use std::time::Duration;

pub mod retry;

use retry::RetryPolicy;

/// Report issued to the progress callback after every transfer attempt,
/// success or retry.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub operation: String,
    pub attempt: u8,
    pub succeeded: bool,
}

pub struct UploadOrchestrator {
    retry: RetryPolicy,
    timeout_floor: Duration,
    min_throughput_bytes_per_sec: u64,
    timeout_buffer: Duration,
}

impl UploadOrchestrator {
    pub fn new(
        max_attempts: u8,
        timeout_floor_secs: u64,
        min_throughput_bytes_per_sec: u64,
        timeout_buffer_secs: u64,
    ) -> Self {
        Self {
            retry: RetryPolicy::new(max_attempts),
            timeout_floor: Duration::from_secs(timeout_floor_secs),
            min_throughput_bytes_per_sec: min_throughput_bytes_per_sec.max(1),
            timeout_buffer: Duration::from_secs(timeout_buffer_secs),
        }
    }

    /// Attempt timeout scaled to the payload: small transfers fail fast,
    /// large ones get proportionally more time.
    pub fn attempt_timeout(&self, size_bytes: u64) -> Duration {
        let scaled = Duration::from_secs(size_bytes / self.min_throughput_bytes_per_sec)
            + self.timeout_buffer;
        scaled.max(self.timeout_floor)
    }

    /// Transfer one whole-file payload to the credential's URL.
    pub async fn upload_direct(
        &self,
        client: &dyn ProviderClient,
        credential: &UploadCredential,
        bytes: &[u8],
        observe: &mut dyn FnMut(AttemptReport),
    ) -> Result<UploadedMedia, TranscribeError> {
        let timeout = self.attempt_timeout(bytes.len() as u64);

        self.run_with_retries("direct upload", observe, |_| {
            client.upload_media(credential, bytes.to_vec(), timeout)
        })
        .await
    }

    /// Transcribe one size-capped payload through the synchronous endpoint.
    pub async fn transcribe_sync(
        &self,
        client: &dyn ProviderClient,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
        observe: &mut dyn FnMut(AttemptReport),
    ) -> Result<TranscriptPart, TranscribeError> {
        let timeout = self.attempt_timeout(bytes.len() as u64);

        self.run_with_retries("synchronous transcription", observe, |_| {
            client.transcribe_sync(file_name, mime_type, bytes.to_vec(), timeout)
        })
        .await
    }

    /// Create the provider-side job for an uploaded media reference.
    pub async fn start_job(
        &self,
        client: &dyn ProviderClient,
        audio_ref: &str,
        speaker_labels: bool,
    ) -> Result<String, TranscribeError> {
        self.run_with_retries("job creation", &mut |_| {}, |_| {
            client.create_job(audio_ref, speaker_labels)
        })
        .await
    }

    /// Transcribe the chunks of a large file strictly sequentially, never in
    /// parallel: chunk n+1 does not start before chunk n has completed. Each
    /// chunk's partial transcript and duration accumulate for the combine
    /// step after the last chunk.
    pub async fn transcribe_chunks(
        &self,
        client: &dyn ProviderClient,
        file_bytes: &[u8],
        mime_type: &str,
        tasks: &[ChunkTask],
        observe: &mut dyn FnMut(AttemptReport),
        on_chunk_done: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<TranscriptPart>, TranscribeError> {
        let total = tasks.len();
        let mut parts = Vec::with_capacity(total);

        for task in tasks {
            let slice = &file_bytes[task.byte_start as usize..task.byte_end as usize];
            let timeout = self.attempt_timeout(task.len());

            tracing::info!(
                "Transferring chunk {}/{} ({} bytes)",
                task.index + 1,
                total,
                task.len()
            );

            let part = self
                .run_with_retries(&task.derived_filename, observe, |_| {
                    client.transcribe_sync(&task.derived_filename, mime_type, slice.to_vec(), timeout)
                })
                .await?;

            parts.push(part);
            on_chunk_done(task.index as usize + 1, total);
        }

        Ok(parts)
    }

    async fn run_with_retries<T, F, Fut>(
        &self,
        operation: &str,
        observe: &mut dyn FnMut(AttemptReport),
        mut op: F,
    ) -> Result<T, TranscribeError>
    where
        F: FnMut(u8) -> Fut,
        Fut: Future<Output = Result<T, TranscribeError>>,
    {
        let mut attempt = 0u8;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    observe(AttemptReport {
                        operation: operation.to_string(),
                        attempt,
                        succeeded: true,
                    });
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!("{} attempt {} failed: {}", operation, attempt + 1, e);
                    observe(AttemptReport {
                        operation: operation.to_string(),
                        attempt,
                        succeeded: false,
                    });

                    if self.retry.should_retry(attempt, &e) {
                        self.retry.wait_before_retry(attempt).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(e);
                }
            }
        }
    }
}
