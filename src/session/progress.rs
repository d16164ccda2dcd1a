use super::JobStatus;
use serde::Serialize;

/// Snapshot emitted to observers on every meaningful state change.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub file_name: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub eta_seconds: Option<u64>,
}

// Progress bands per phase. Uploading spans 10-50, transcription 50-95;
// combining parks at 95 until terminal handling closes the job out.
const UPLOAD_BASE: u8 = 10;
const UPLOAD_SPAN: u8 = 40;
const TRANSCRIBE_BASE: u8 = 50;
const TRANSCRIBE_SPAN: u8 = 45;
pub const COMBINING_PERCENT: u8 = 95;

/// Overall percentage while `done` of `total` transfers have completed.
pub fn upload_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return UPLOAD_BASE;
    }
    UPLOAD_BASE + ((UPLOAD_SPAN as usize * done) / total) as u8
}

/// Overall percentage for a provider-reported transcription progress.
pub fn transcribe_progress(provider_percent: u8) -> u8 {
    let p = provider_percent.min(100) as u16;
    TRANSCRIBE_BASE + ((TRANSCRIBE_SPAN as u16 * p) / 100) as u8
}

/// Remaining-time estimate from elapsed wall time and overall progress.
/// No estimate until some progress exists.
pub fn estimate_eta(elapsed_secs: u64, progress_percent: u8) -> Option<u64> {
    if progress_percent == 0 || progress_percent >= 100 {
        return None;
    }
    let p = progress_percent as u64;
    Some(elapsed_secs * (100 - p) / p)
}
