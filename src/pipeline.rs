// src/pipeline.rs
// Per-file pipeline driver: plan, authorize, route, transfer, poll, combine

use crate::broker::{CredentialBroker, CredentialGrant, FallbackDirective, UploadCredential};
use crate::chunk::{plan_upload, ChunkTask, UploadPlan};
use crate::config::PipelineConfig;
use crate::orchestrator::UploadOrchestrator;
use crate::poller::{CancelHandle, JobPoller};
use crate::provider::types::TranscribeError;
use crate::provider::ProviderClient;
use crate::session::combine::{clean_transcript, combine_parts};
use crate::session::progress::{
    transcribe_progress, upload_progress, ProgressUpdate, COMBINING_PERCENT,
};
use crate::session::{
    CompletedTranscription, JobStatus, MediaFile, ProviderRoute, TranscriptionJob,
};
use crate::state::{PersistedJob, StateStore};
use chrono::Utc;
use std::cell::Cell;
use std::sync::Arc;

pub type ProgressObserver = Box<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Drives one file at a time through the full transcription lifecycle.
///
/// Owns the poller's dedup set and cancellation flag as explicit state, so
/// multiple independent pipelines can coexist and tests stay deterministic.
pub struct TranscriptionPipeline {
    config: PipelineConfig,
    broker: Arc<dyn CredentialBroker>,
    client: Arc<dyn ProviderClient>,
    store: Arc<dyn StateStore>,
    orchestrator: UploadOrchestrator,
    poller: JobPoller,
    observer: Option<ProgressObserver>,
}

impl TranscriptionPipeline {
    pub fn new(
        config: PipelineConfig,
        broker: Arc<dyn CredentialBroker>,
        client: Arc<dyn ProviderClient>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let orchestrator = UploadOrchestrator::new(
            config.max_attempts,
            config.timeout_floor_secs,
            config.min_throughput_bytes_per_sec,
            config.timeout_buffer_secs,
        );
        let poller = JobPoller::new(config.poll_interval_secs, config.poll_ceiling_secs);

        Self {
            config,
            broker,
            client,
            store,
            orchestrator,
            poller,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.poller.cancel_handle()
    }

    /// Run one file through the pipeline to a terminal state. A non-terminal
    /// job persisted by a previous run is finished first, never overwritten.
    pub async fn process(
        &mut self,
        file: &MediaFile,
    ) -> Result<CompletedTranscription, TranscribeError> {
        self.settle_leftover().await;

        let mut job = TranscriptionJob::new(file.source());
        let result = self.drive(file, &mut job).await;
        self.finish(&mut job, &result);
        result
    }

    /// Explicit manual retry of a file: a fresh job lifecycle begins and
    /// progress restarts from zero.
    pub async fn retry_file(
        &mut self,
        file: &MediaFile,
    ) -> Result<CompletedTranscription, TranscribeError> {
        self.process(file).await
    }

    /// The persisted slot may hold an in-flight job from before a restart;
    /// poll it to its terminal state before taking on new work.
    async fn settle_leftover(&mut self) {
        match self.resume().await {
            Ok(Some(done)) => tracing::info!(
                "Finished job {} left over from a previous run ({} chars)",
                done.job_id.as_deref().unwrap_or("<unknown>"),
                done.text.len()
            ),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Job left over from a previous run did not finish cleanly: {}", e)
            }
        }
    }

    /// Consult the state store at startup: a persisted non-terminal job
    /// restarts the poller against its id instead of losing in-flight work.
    pub async fn resume(&mut self) -> Result<Option<CompletedTranscription>, TranscribeError> {
        let persisted = match self.store.get()? {
            Some(persisted) => persisted,
            None => return Ok(None),
        };

        if !persisted.is_resumable() {
            // stale terminal record: its handling already ran
            self.store.clear()?;
            return Ok(None);
        }

        tracing::info!(
            "Resuming job {} from persisted state at {}%",
            persisted.job_id,
            persisted.progress_percent
        );

        let job_id = persisted.job_id.clone();
        let outcome = {
            let Self {
                poller,
                client,
                store,
                observer,
                ..
            } = self;

            poller
                .poll_to_completion(client.as_ref(), &job_id, &mut |tick| {
                    let record = PersistedJob {
                        job_id: job_id.clone(),
                        status: JobStatus::Transcribing,
                        progress_percent: tick.progress_percent,
                        eta_seconds: tick.eta_seconds,
                        updated_at: Utc::now().to_rfc3339(),
                    };
                    if let Err(e) = store.set(&record) {
                        tracing::warn!("Failed to persist resumed progress: {}", e);
                    }
                    if let Some(observer) = observer {
                        observer(&ProgressUpdate {
                            file_name: job_id.clone(),
                            status: JobStatus::Transcribing,
                            progress_percent: tick.progress_percent,
                            eta_seconds: tick.eta_seconds,
                        });
                    }
                })
                .await
        };

        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear state after resume: {}", e);
        }

        match outcome {
            Ok(Some(result)) => Ok(Some(CompletedTranscription {
                job_id: Some(job_id),
                text: clean_transcript(&result.transcript_text),
                duration_secs: result.duration_seconds,
                provider: ProviderRoute::Primary,
                chunk_count: 1,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn drive(
        &mut self,
        file: &MediaFile,
        job: &mut TranscriptionJob,
    ) -> Result<CompletedTranscription, TranscribeError> {
        let plan = plan_upload(
            &file.name,
            file.byte_size(),
            self.config.direct_limit_bytes,
            self.config.chunk_size_bytes,
        )?;

        let preparing = match &plan {
            UploadPlan::Single(_) => JobStatus::Preparing,
            UploadPlan::Chunked(_) => JobStatus::PreparingChunks,
        };
        tracing::debug!(
            "{}: planned {} transfer(s) for {} bytes",
            file.name,
            plan.chunk_count(),
            file.byte_size()
        );
        self.push(job, preparing, 5, None);

        let grant = self.broker.request_credential(&job.source).await?;

        match grant {
            CredentialGrant::Fallback(directive) => self.run_fallback(file, job, directive).await,
            CredentialGrant::Direct(credential) => match plan {
                UploadPlan::Single(_) => self.run_primary_single(file, job, credential).await,
                UploadPlan::Chunked(tasks) => self.run_primary_chunked(file, job, tasks).await,
            },
        }
    }

    /// Fallback controller: decide the synchronous route or fail fast,
    /// before any bytes are transferred.
    async fn run_fallback(
        &mut self,
        file: &MediaFile,
        job: &mut TranscriptionJob,
        directive: FallbackDirective,
    ) -> Result<CompletedTranscription, TranscribeError> {
        let size = file.byte_size();
        if size > directive.max_fallback_size_bytes {
            tracing::error!(
                "{} ({} bytes) exceeds the fallback cap of {} bytes",
                file.name,
                size,
                directive.max_fallback_size_bytes
            );
            return Err(TranscribeError::PayloadTooLarge {
                size_bytes: size,
                direct_limit_bytes: self.config.direct_limit_bytes,
                fallback_limit_bytes: directive.max_fallback_size_bytes,
            });
        }

        tracing::info!(
            "Routing {} through the fallback path: {}",
            file.name,
            directive.message
        );
        job.provider = ProviderRoute::Fallback;
        self.push(job, JobStatus::Uploading, upload_progress(0, 1), None);

        let part = {
            let Self {
                orchestrator,
                client,
                store,
                observer,
                ..
            } = self;

            orchestrator
                .transcribe_sync(
                    client.as_ref(),
                    &file.name,
                    &file.mime_type,
                    &file.bytes,
                    &mut |_| persist_and_notify(store.as_ref(), observer.as_ref(), job),
                )
                .await?
        };

        Ok(CompletedTranscription {
            job_id: None,
            text: clean_transcript(&part.text),
            duration_secs: part.duration_secs,
            provider: ProviderRoute::Fallback,
            chunk_count: 1,
        })
    }

    async fn run_primary_single(
        &mut self,
        file: &MediaFile,
        job: &mut TranscriptionJob,
        credential: UploadCredential,
    ) -> Result<CompletedTranscription, TranscribeError> {
        job.provider = ProviderRoute::Primary;
        self.push(job, JobStatus::Uploading, upload_progress(0, 1), None);

        let uploaded = {
            let Self {
                orchestrator,
                client,
                store,
                observer,
                ..
            } = self;

            orchestrator
                .upload_direct(client.as_ref(), &credential, &file.bytes, &mut |_| {
                    persist_and_notify(store.as_ref(), observer.as_ref(), job)
                })
                .await?
        };

        self.push(job, JobStatus::Uploading, upload_progress(1, 1), None);

        let job_id = self
            .orchestrator
            .start_job(
                self.client.as_ref(),
                &uploaded.uploaded_url,
                self.config.speaker_labels,
            )
            .await?;

        job.id = Some(job_id.clone());
        self.push(job, JobStatus::Transcribing, transcribe_progress(0), None);

        let outcome = {
            let Self {
                poller,
                client,
                store,
                observer,
                ..
            } = self;

            poller
                .poll_to_completion(client.as_ref(), &job_id, &mut |tick| {
                    job.advance(JobStatus::Transcribing, tick.progress_percent);
                    job.eta_seconds = tick.eta_seconds;
                    persist_and_notify(store.as_ref(), observer.as_ref(), job);
                })
                .await?
        };

        let result = outcome.ok_or_else(|| {
            TranscribeError::Provider(format!("job {} was already finalized", job_id))
        })?;

        self.push(job, JobStatus::CombiningResults, COMBINING_PERCENT, None);

        Ok(CompletedTranscription {
            job_id: Some(job_id),
            text: clean_transcript(&result.transcript_text),
            duration_secs: result.duration_seconds,
            provider: ProviderRoute::Primary,
            chunk_count: 1,
        })
    }

    async fn run_primary_chunked(
        &mut self,
        file: &MediaFile,
        job: &mut TranscriptionJob,
        tasks: Vec<ChunkTask>,
    ) -> Result<CompletedTranscription, TranscribeError> {
        job.provider = ProviderRoute::Primary;
        job.chunks = tasks.clone();
        let total = tasks.len();
        self.push(
            job,
            JobStatus::ProcessingChunks,
            upload_progress(0, total),
            None,
        );

        let parts = {
            let Self {
                orchestrator,
                client,
                store,
                observer,
                ..
            } = self;

            // chunked runs have no provider job id, so the slot stays empty;
            // attempts still reach the observer through this shared percent
            let attempt_percent = Cell::new(job.progress_percent);

            orchestrator
                .transcribe_chunks(
                    client.as_ref(),
                    &file.bytes,
                    &file.mime_type,
                    &tasks,
                    &mut |_| {
                        if let Some(observer) = observer.as_ref() {
                            observer(&ProgressUpdate {
                                file_name: file.name.clone(),
                                status: JobStatus::ProcessingChunks,
                                progress_percent: attempt_percent.get(),
                                eta_seconds: None,
                            });
                        }
                    },
                    &mut |done, total| {
                        job.advance(JobStatus::ProcessingChunks, upload_progress(done, total));
                        attempt_percent.set(job.progress_percent);
                        persist_and_notify(store.as_ref(), observer.as_ref(), job);
                    },
                )
                .await?
        };

        self.push(job, JobStatus::CombiningResults, COMBINING_PERCENT, None);
        let combined = combine_parts(&parts);

        Ok(CompletedTranscription {
            job_id: None,
            text: combined.text,
            duration_secs: combined.duration_secs,
            provider: ProviderRoute::Primary,
            chunk_count: parts.len() as u32,
        })
    }

    fn push(
        &self,
        job: &mut TranscriptionJob,
        status: JobStatus,
        percent: u8,
        eta_seconds: Option<u64>,
    ) {
        job.advance(status, percent);
        if eta_seconds.is_some() {
            job.eta_seconds = eta_seconds;
        }
        persist_and_notify(self.store.as_ref(), self.observer.as_ref(), job);
    }

    /// Terminal handling: runs exactly once per processed file, then clears
    /// the single persisted slot.
    fn finish(
        &self,
        job: &mut TranscriptionJob,
        result: &Result<CompletedTranscription, TranscribeError>,
    ) {
        match result {
            Ok(done) => {
                job.id = done.job_id.clone();
                self.push(job, JobStatus::Completed, 100, None);
                tracing::info!(
                    "{} transcribed: {} chars, {:.1}s of audio",
                    job.source.name,
                    done.text.len(),
                    done.duration_secs
                );
            }
            Err(TranscribeError::Cancelled) => {
                tracing::info!("{} cancelled before completion", job.source.name);
            }
            Err(e) => {
                let reached = job.progress_percent;
                self.push(job, JobStatus::Failed, reached, None);
                tracing::error!("{} failed: {}", job.source.name, e);
            }
        }

        // only this job ever wrote the slot; a run without a provider id has
        // nothing persisted and must not touch another job's record
        if job.id.is_some() {
            if let Err(e) = self.store.clear() {
                tracing::warn!("Failed to clear job state: {}", e);
            }
        }
    }
}

fn persist_and_notify(
    store: &dyn StateStore,
    observer: Option<&ProgressObserver>,
    job: &TranscriptionJob,
) {
    // only jobs with a provider id are worth resuming after a restart
    if let Some(id) = &job.id {
        let record = PersistedJob {
            job_id: id.clone(),
            status: job.status,
            progress_percent: job.progress_percent,
            eta_seconds: job.eta_seconds,
            updated_at: Utc::now().to_rfc3339(),
        };
        if let Err(e) = store.set(&record) {
            tracing::warn!("Failed to persist job progress: {}", e);
        }
    }

    if let Some(observer) = observer {
        observer(&ProgressUpdate {
            file_name: job.source.name.clone(),
            status: job.status,
            progress_percent: job.progress_percent,
            eta_seconds: job.eta_seconds,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::{
        JobResult, JobStatusResponse, RemoteJobStatus, SourceFile, TranscriptPart, UploadedMedia,
    };
    use crate::state::MemoryStateStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    const MB: usize = 1024 * 1024;

    struct FixedBroker {
        grant: CredentialGrant,
    }

    #[async_trait]
    impl CredentialBroker for FixedBroker {
        async fn request_credential(
            &self,
            _file: &SourceFile,
        ) -> Result<CredentialGrant, TranscribeError> {
            Ok(self.grant.clone())
        }
    }

    fn direct_broker() -> Arc<FixedBroker> {
        Arc::new(FixedBroker {
            grant: CredentialGrant::Direct(UploadCredential {
                upload_url: "https://upload.example.com/u/1".to_string(),
                auth_token: "tok".to_string(),
                issued_at: Utc::now(),
            }),
        })
    }

    fn fallback_broker(max_bytes: u64) -> Arc<FixedBroker> {
        Arc::new(FixedBroker {
            grant: CredentialGrant::Fallback(FallbackDirective {
                reason: "secondary".to_string(),
                max_fallback_size_bytes: max_bytes,
                message: "primary unavailable".to_string(),
            }),
        })
    }

    #[derive(Default)]
    struct FakeProvider {
        upload_calls: Mutex<u32>,
        sync_calls: Mutex<Vec<String>>,
        sync_outcomes: Mutex<VecDeque<Result<TranscriptPart, TranscribeError>>>,
        statuses: Mutex<VecDeque<JobStatusResponse>>,
    }

    impl FakeProvider {
        fn with_sync(outcomes: Vec<Result<TranscriptPart, TranscribeError>>) -> Self {
            Self {
                sync_outcomes: Mutex::new(outcomes.into()),
                ..Default::default()
            }
        }

        fn with_statuses(statuses: Vec<JobStatusResponse>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Default::default()
            }
        }

        fn upload_count(&self) -> u32 {
            *self.upload_calls.lock().unwrap()
        }

        fn sync_count(&self) -> usize {
            self.sync_calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProviderClient for FakeProvider {
        async fn upload_media(
            &self,
            _credential: &UploadCredential,
            _bytes: Vec<u8>,
            _timeout: Duration,
        ) -> Result<UploadedMedia, TranscribeError> {
            *self.upload_calls.lock().unwrap() += 1;
            Ok(UploadedMedia {
                uploaded_url: "https://cdn.example.com/stored".to_string(),
            })
        }

        async fn create_job(
            &self,
            _audio_ref: &str,
            _speaker_labels: bool,
        ) -> Result<String, TranscribeError> {
            Ok("job-77".to_string())
        }

        async fn job_status(&self, _job_id: &str) -> Result<JobStatusResponse, TranscribeError> {
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .expect("status script exhausted"))
        }

        async fn transcribe_sync(
            &self,
            file_name: &str,
            _mime_type: &str,
            _bytes: Vec<u8>,
            _timeout: Duration,
        ) -> Result<TranscriptPart, TranscribeError> {
            self.sync_calls.lock().unwrap().push(file_name.to_string());
            self.sync_outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(TranscriptPart {
                        text: format!("text of {}", file_name),
                        duration_secs: 10.0,
                    })
                })
        }
    }

    fn media(name: &str, size: usize) -> MediaFile {
        MediaFile {
            name: name.to_string(),
            mime_type: "audio/mpeg".to_string(),
            bytes: vec![0u8; size],
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            direct_limit_bytes: 32 * MB as u64,
            chunk_size_bytes: 4 * MB as u64,
            ..PipelineConfig::default()
        }
    }

    fn pipeline(
        broker: Arc<dyn CredentialBroker>,
        client: Arc<FakeProvider>,
        store: Arc<MemoryStateStore>,
    ) -> TranscriptionPipeline {
        TranscriptionPipeline::new(config(), broker, client, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_route_within_cap_never_uploads_to_primary() {
        let client = Arc::new(FakeProvider::with_sync(vec![Ok(TranscriptPart {
            text: "fallback transcript".to_string(),
            duration_secs: 42.0,
        })]));
        let store = Arc::new(MemoryStateStore::new());
        let mut pipeline = pipeline(fallback_broker(25 * MB as u64), client.clone(), store);

        let file = media("talk.mp3", 20 * MB);
        let done = pipeline.process(&file).await.unwrap();

        assert_eq!(done.text, "fallback transcript");
        assert_eq!(done.provider, ProviderRoute::Fallback);
        assert!(done.job_id.is_none());
        assert_eq!(client.upload_count(), 0);
        assert_eq!(client.sync_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_over_fallback_cap_fails_fast_with_zero_uploads() {
        let client = Arc::new(FakeProvider::default());
        let store = Arc::new(MemoryStateStore::new());
        let mut pipeline = pipeline(fallback_broker(25 * MB as u64), client.clone(), store);

        let file = media("long.mp3", 30 * MB);
        let err = pipeline.process(&file).await.unwrap_err();

        match err {
            TranscribeError::PayloadTooLarge {
                size_bytes,
                fallback_limit_bytes,
                ..
            } => {
                assert_eq!(size_bytes, 30 * MB as u64);
                assert_eq!(fallback_limit_bytes, 25 * MB as u64);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.upload_count(), 0);
        assert_eq!(client.sync_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_shot_primary_uploads_then_polls() {
        let client = Arc::new(FakeProvider::with_statuses(vec![
            JobStatusResponse {
                status: RemoteJobStatus::Processing,
                progress_percent: Some(50),
                result: None,
                error: None,
            },
            JobStatusResponse {
                status: RemoteJobStatus::Completed,
                progress_percent: Some(100),
                result: Some(JobResult {
                    transcript_text: "primary transcript".to_string(),
                    duration_seconds: 300.0,
                }),
                error: None,
            },
        ]));
        let store = Arc::new(MemoryStateStore::new());
        let mut pipeline = pipeline(direct_broker(), client.clone(), store.clone());

        let file = media("meeting.mp3", 10 * MB);
        let done = pipeline.process(&file).await.unwrap();

        assert_eq!(done.text, "primary transcript");
        assert_eq!(done.job_id.as_deref(), Some("job-77"));
        assert_eq!(done.provider, ProviderRoute::Primary);
        assert_eq!(client.upload_count(), 1);
        // terminal handling cleared the single persisted slot
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunked_upload_combines_in_order_after_retries() {
        // 5MB file with 4MB chunks; second chunk fails twice then succeeds
        let client = Arc::new(FakeProvider::with_sync(vec![
            Ok(TranscriptPart {
                text: "first chunk text".to_string(),
                duration_secs: 180.0,
            }),
            Err(TranscribeError::Network("reset".to_string())),
            Err(TranscribeError::Timeout),
            Ok(TranscriptPart {
                text: "second chunk text".to_string(),
                duration_secs: 45.0,
            }),
        ]));
        let store = Arc::new(MemoryStateStore::new());
        let mut config = config();
        config.direct_limit_bytes = 4 * MB as u64;
        let mut pipeline =
            TranscriptionPipeline::new(config, direct_broker(), client.clone(), store);

        let file = media("big.mp3", 5 * MB);
        let done = pipeline.process(&file).await.unwrap();

        assert_eq!(done.text, "first chunk text second chunk text");
        assert!((done.duration_secs - 225.0).abs() < f32::EPSILON);
        assert_eq!(done.chunk_count, 2);
        // the direct upload endpoint is never touched in chunked mode
        assert_eq!(client.upload_count(), 0);
        assert_eq!(client.sync_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_observer_sees_monotonic_updates() {
        let client = Arc::new(FakeProvider::with_statuses(vec![
            JobStatusResponse {
                status: RemoteJobStatus::Processing,
                progress_percent: Some(20),
                result: None,
                error: None,
            },
            JobStatusResponse {
                status: RemoteJobStatus::Completed,
                progress_percent: Some(100),
                result: Some(JobResult {
                    transcript_text: "done".to_string(),
                    duration_seconds: 5.0,
                }),
                error: None,
            },
        ]));
        let store = Arc::new(MemoryStateStore::new());
        let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut pipeline = pipeline(direct_broker(), client, store).with_observer(Box::new(
            move |update: &ProgressUpdate| {
                sink.lock().unwrap().push(update.progress_percent);
            },
        ));

        pipeline.process(&media("a.mp3", MB)).await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        for pair in seen.windows(2) {
            assert!(pair[1] >= pair[0], "progress regressed: {seen:?}");
        }
        assert_eq!(*seen.last().unwrap(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunked_attempts_reach_the_observer() {
        let client = Arc::new(FakeProvider::with_sync(vec![
            Ok(TranscriptPart {
                text: "first".to_string(),
                duration_secs: 10.0,
            }),
            Err(TranscribeError::Network("reset".to_string())),
            Err(TranscribeError::Timeout),
            Ok(TranscriptPart {
                text: "second".to_string(),
                duration_secs: 5.0,
            }),
        ]));
        let store = Arc::new(MemoryStateStore::new());
        let mut config = config();
        config.direct_limit_bytes = 4 * MB as u64;

        let seen: Arc<Mutex<Vec<(JobStatus, u8)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut pipeline =
            TranscriptionPipeline::new(config, direct_broker(), client, store).with_observer(
                Box::new(move |update: &ProgressUpdate| {
                    sink.lock()
                        .unwrap()
                        .push((update.status, update.progress_percent));
                }),
            );

        pipeline.process(&media("big.mp3", 5 * MB)).await.unwrap();

        // one update entering the phase, one per transfer attempt (four,
        // including the two retries), one per completed chunk
        let seen = seen.lock().unwrap();
        let during_chunks = seen
            .iter()
            .filter(|(status, _)| *status == JobStatus::ProcessingChunks)
            .count();
        assert_eq!(during_chunks, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leftover_job_is_finished_before_new_work() {
        // slot holds a non-terminal job from before a restart; processing an
        // unrelated file must poll it to completion, not wipe its record
        let client = Arc::new(FakeProvider::with_statuses(vec![JobStatusResponse {
            status: RemoteJobStatus::Completed,
            progress_percent: Some(100),
            result: Some(JobResult {
                transcript_text: "left over".to_string(),
                duration_seconds: 30.0,
            }),
            error: None,
        }]));
        let store = Arc::new(MemoryStateStore::new());
        store
            .set(&PersistedJob {
                job_id: "job-inflight".to_string(),
                status: JobStatus::Transcribing,
                progress_percent: 40,
                eta_seconds: Some(60),
                updated_at: Utc::now().to_rfc3339(),
            })
            .unwrap();

        let mut pipeline = pipeline(fallback_broker(25 * MB as u64), client.clone(), store.clone());
        let done = pipeline.process(&media("new.mp3", MB)).await.unwrap();

        assert_eq!(done.provider, ProviderRoute::Fallback);
        // the leftover job's status endpoint was actually consulted
        assert!(client.statuses.lock().unwrap().is_empty());
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_polls_persisted_job_to_completion() {
        let client = Arc::new(FakeProvider::with_statuses(vec![JobStatusResponse {
            status: RemoteJobStatus::Completed,
            progress_percent: Some(100),
            result: Some(JobResult {
                transcript_text: "picked back up".to_string(),
                duration_seconds: 60.0,
            }),
            error: None,
        }]));
        let store = Arc::new(MemoryStateStore::new());
        store
            .set(&PersistedJob {
                job_id: "job-restart".to_string(),
                status: JobStatus::Transcribing,
                progress_percent: 60,
                eta_seconds: Some(90),
                updated_at: Utc::now().to_rfc3339(),
            })
            .unwrap();

        let mut pipeline = pipeline(direct_broker(), client, store.clone());
        let resumed = pipeline.resume().await.unwrap().unwrap();

        assert_eq!(resumed.job_id.as_deref(), Some("job-restart"));
        assert_eq!(resumed.text, "picked back up");
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_ignores_terminal_record() {
        let client = Arc::new(FakeProvider::default());
        let store = Arc::new(MemoryStateStore::new());
        store
            .set(&PersistedJob {
                job_id: "job-old".to_string(),
                status: JobStatus::Completed,
                progress_percent: 100,
                eta_seconds: None,
                updated_at: Utc::now().to_rfc3339(),
            })
            .unwrap();

        let mut pipeline = pipeline(direct_broker(), client, store.clone());
        assert!(pipeline.resume().await.unwrap().is_none());
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_file_rejected_before_any_network_call() {
        let client = Arc::new(FakeProvider::default());
        let store = Arc::new(MemoryStateStore::new());
        let mut pipeline = pipeline(direct_broker(), client.clone(), store);

        let err = pipeline.process(&media("empty.mp3", 0)).await.unwrap_err();

        assert!(matches!(err, TranscribeError::Validation(_)));
        assert_eq!(client.upload_count(), 0);
        assert_eq!(client.sync_count(), 0);
    }
}
