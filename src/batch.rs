// src/batch.rs
// Batch scheduler - runs files strictly one at a time, isolating failures

use crate::pipeline::TranscriptionPipeline;
use crate::provider::types::TranscribeError;
use crate::session::{CompletedTranscription, MediaFile};
use serde::Serialize;

/// Snapshot of a batch in flight.
#[derive(Debug, Clone, Serialize)]
pub struct BatchState {
    pub total: usize,
    pub completed_count: usize,
    pub current_file: Option<String>,
}

/// Outcome of one file in a batch. At most one of `result` and `error` is
/// set; a file that failed never blocks the files after it.
#[derive(Debug)]
pub struct FileOutcome {
    pub file_name: String,
    pub result: Option<CompletedTranscription>,
    pub error: Option<TranscribeError>,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_some()
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

/// Processes a queue of files strictly sequentially through one pipeline.
/// File n+1 does not start until file n has reached a terminal state, so
/// the single persisted job slot is never contended.
pub struct BatchScheduler {
    state: BatchState,
    on_state: Option<Box<dyn Fn(&BatchState) + Send + Sync>>,
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self {
            state: BatchState {
                total: 0,
                completed_count: 0,
                current_file: None,
            },
            on_state: None,
        }
    }

    pub fn with_state_observer(
        mut self,
        observer: Box<dyn Fn(&BatchState) + Send + Sync>,
    ) -> Self {
        self.on_state = Some(observer);
        self
    }

    pub async fn run(
        &mut self,
        pipeline: &mut TranscriptionPipeline,
        files: Vec<MediaFile>,
    ) -> BatchSummary {
        let batch_id = uuid::Uuid::new_v4();
        tracing::info!("Starting batch {} with {} files", batch_id, files.len());

        self.state = BatchState {
            total: files.len(),
            completed_count: 0,
            current_file: None,
        };

        let mut summary = BatchSummary::default();

        let cancel = pipeline.cancel_handle();

        for file in files {
            if cancel.is_cancelled() {
                tracing::info!("Batch cancelled before {}", file.name);
                break;
            }

            self.state.current_file = Some(file.name.clone());
            self.notify();

            tracing::info!(
                "Processing {} ({}/{})",
                file.name,
                self.state.completed_count + 1,
                self.state.total
            );

            let outcome = match pipeline.process(&file).await {
                Ok(done) => FileOutcome {
                    file_name: file.name.clone(),
                    result: Some(done),
                    error: None,
                },
                Err(TranscribeError::Cancelled) => {
                    // cancellation stops the whole batch, not just this file
                    tracing::info!("Batch cancelled at {}", file.name);
                    summary.outcomes.push(FileOutcome {
                        file_name: file.name,
                        result: None,
                        error: Some(TranscribeError::Cancelled),
                    });
                    break;
                }
                Err(e) => {
                    tracing::error!("{} failed, continuing with remaining files: {}", file.name, e);
                    FileOutcome {
                        file_name: file.name.clone(),
                        result: None,
                        error: Some(e),
                    }
                }
            };

            summary.outcomes.push(outcome);
            self.state.completed_count += 1;
            self.state.current_file = None;
            self.notify();
        }

        self.state.current_file = None;
        self.notify();
        summary
    }

    fn notify(&self) {
        if let Some(observer) = &self.on_state {
            observer(&self.state);
        }
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new()
    }
}
