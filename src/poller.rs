// src/poller.rs
// Job poller - watches an asynchronous job until a terminal state

use crate::provider::types::{JobResult, RemoteJobStatus, TranscribeError};
use crate::provider::ProviderClient;
use crate::session::progress::{estimate_eta, transcribe_progress};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Shared handle for cooperative cancellation. Cancelling suppresses further
/// poll ticks; work already in flight at the provider is abandoned, not
/// aborted.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Snapshot passed to the tick callback while a job is still running.
#[derive(Debug, Clone)]
pub struct PollTick {
    pub progress_percent: u8,
    pub eta_seconds: Option<u64>,
}

/// Polls the job-status endpoint on a fixed interval.
///
/// Owns its dedup set of finalized job ids so that terminal handling for a
/// given id runs exactly once, and a safety ceiling on total poll duration
/// so the pipeline never polls forever.
pub struct JobPoller {
    interval: Duration,
    max_duration: Duration,
    finalized: HashSet<String>,
    cancel: Arc<AtomicBool>,
}

impl JobPoller {
    pub fn new(poll_interval_secs: u64, poll_ceiling_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(poll_interval_secs.max(1)),
            max_duration: Duration::from_secs(poll_ceiling_secs),
            finalized: HashSet::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: self.cancel.clone(),
        }
    }

    /// Poll until the job reaches a terminal state.
    ///
    /// Returns `Ok(Some(result))` exactly once per job id; if this id was
    /// already finalized (a duplicate terminal observation), the call is a
    /// no-op returning `Ok(None)`. Transient status-fetch errors are
    /// tolerated and retried on the next tick; the ceiling bounds them.
    pub async fn poll_to_completion(
        &mut self,
        client: &dyn ProviderClient,
        job_id: &str,
        on_tick: &mut dyn FnMut(PollTick),
    ) -> Result<Option<JobResult>, TranscribeError> {
        if self.finalized.contains(job_id) {
            tracing::debug!("Job {} already finalized, skipping poll", job_id);
            return Ok(None);
        }

        let started = tokio::time::Instant::now();
        let mut last_percent = transcribe_progress(0);

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                tracing::info!("Polling cancelled for job {}", job_id);
                return Err(TranscribeError::Cancelled);
            }

            let waited = started.elapsed();
            if waited >= self.max_duration {
                self.finalized.insert(job_id.to_string());
                tracing::error!(
                    "Job {} still not terminal after {}s, giving up",
                    job_id,
                    waited.as_secs()
                );
                return Err(TranscribeError::PollExhausted {
                    job_id: job_id.to_string(),
                    waited_secs: waited.as_secs(),
                });
            }

            let status = match client.job_status(job_id).await {
                Ok(status) => status,
                Err(e) if e.is_retryable() => {
                    tracing::warn!("Status poll for {} failed transiently: {}", job_id, e);
                    sleep(self.interval).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match status.status {
                RemoteJobStatus::Completed => {
                    if !self.finalized.insert(job_id.to_string()) {
                        return Ok(None);
                    }
                    tracing::info!("Job {} completed after {}s", job_id, waited.as_secs());
                    let result = status.result.ok_or_else(|| {
                        TranscribeError::Provider("completed job carried no result".to_string())
                    })?;
                    return Ok(Some(result));
                }
                RemoteJobStatus::Failed => {
                    if !self.finalized.insert(job_id.to_string()) {
                        return Ok(None);
                    }
                    // the provider's reason passes through verbatim
                    let reason = status
                        .error
                        .unwrap_or_else(|| "unspecified provider failure".to_string());
                    return Err(TranscribeError::JobFailed(reason));
                }
                RemoteJobStatus::Queued | RemoteJobStatus::Processing => {
                    let reported = status
                        .progress_percent
                        .unwrap_or_else(|| heuristic_percent(waited));
                    last_percent = last_percent.max(transcribe_progress(reported));

                    on_tick(PollTick {
                        progress_percent: last_percent,
                        eta_seconds: estimate_eta(waited.as_secs(), last_percent),
                    });

                    sleep(self.interval).await;
                }
            }
        }
    }
}

// When the provider reports no progress, creep toward 90% on elapsed time so
// the ETA stays meaningful.
fn heuristic_percent(elapsed: Duration) -> u8 {
    (elapsed.as_secs() * 2).min(90) as u8
}
