// src/chunk.rs
// Chunk planner - pure mapping from file size to an upload plan

use crate::provider::types::TranscribeError;
use serde::{Deserialize, Serialize};

/// One contiguous byte-range slice of a file, uploaded as an independent
/// transfer. `byte_end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkTask {
    pub index: u32,
    pub byte_start: u64,
    pub byte_end: u64,
    pub derived_filename: String,
}

impl ChunkTask {
    pub fn len(&self) -> u64 {
        self.byte_end - self.byte_start
    }

    pub fn is_empty(&self) -> bool {
        self.byte_start == self.byte_end
    }
}

/// Outcome of planning one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPlan {
    /// The whole file fits under the gateway threshold and moves in one
    /// transfer.
    Single(ChunkTask),
    /// The file exceeds the threshold and is split into ordered slices.
    Chunked(Vec<ChunkTask>),
}

impl UploadPlan {
    pub fn chunk_count(&self) -> usize {
        match self {
            UploadPlan::Single(_) => 1,
            UploadPlan::Chunked(tasks) => tasks.len(),
        }
    }

    pub fn tasks(&self) -> Vec<ChunkTask> {
        match self {
            UploadPlan::Single(task) => vec![task.clone()],
            UploadPlan::Chunked(tasks) => tasks.clone(),
        }
    }
}

/// Plan the upload of `byte_size` bytes.
///
/// Deterministic and side-effect free. `direct_limit` is the per-upload
/// ceiling imposed by the gateway in front of the direct path; `chunk_size`
/// is the nominal slice size, chosen well under that ceiling. The returned
/// chunk list partitions `[0, byte_size)` exactly; only the last chunk may
/// be shorter than `chunk_size`.
pub fn plan_upload(
    file_name: &str,
    byte_size: u64,
    direct_limit: u64,
    chunk_size: u64,
) -> Result<UploadPlan, TranscribeError> {
    if byte_size == 0 {
        return Err(TranscribeError::Validation(format!(
            "{} is empty or unreadable",
            file_name
        )));
    }
    if chunk_size == 0 {
        return Err(TranscribeError::Validation(
            "chunk size must be non-zero".to_string(),
        ));
    }

    if byte_size <= direct_limit {
        return Ok(UploadPlan::Single(ChunkTask {
            index: 0,
            byte_start: 0,
            byte_end: byte_size,
            derived_filename: file_name.to_string(),
        }));
    }

    let mut tasks = Vec::new();
    let mut offset = 0u64;
    let mut index = 0u32;

    while offset < byte_size {
        let end = (offset + chunk_size).min(byte_size);
        tasks.push(ChunkTask {
            index,
            byte_start: offset,
            byte_end: end,
            derived_filename: format!("{}.part{:03}", file_name, index + 1),
        });
        offset = end;
        index += 1;
    }

    Ok(UploadPlan::Chunked(tasks))
}
