// scribe-relay: resilient large-file upload and transcription-job
// orchestration against a primary async provider with a synchronous fallback.

pub mod batch;
pub mod broker;
pub mod chunk;
pub mod config;
pub mod orchestrator;
pub mod pipeline;
pub mod poller;
pub mod provider;
pub mod session;
pub mod state;

pub use batch::{BatchScheduler, BatchState, BatchSummary, FileOutcome};
pub use broker::{CredentialBroker, CredentialGrant, FallbackDirective, HttpCredentialBroker};
pub use chunk::{plan_upload, ChunkTask, UploadPlan};
pub use config::PipelineConfig;
pub use pipeline::{ProgressObserver, TranscriptionPipeline};
pub use poller::{CancelHandle, JobPoller};
pub use provider::types::TranscribeError;
pub use provider::{HttpProviderClient, ProviderClient};
pub use session::{CompletedTranscription, JobStatus, MediaFile, ProviderRoute};
pub use state::{FileStateStore, MemoryStateStore, StateStore};
