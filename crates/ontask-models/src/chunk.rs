//! Video chunk types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File name used for the chunk at `index`.
pub fn chunk_file_name(index: usize) -> String {
    format!("temp_chunk_{:03}.mp4", index)
}

/// A bounded-duration slice of the source video.
///
/// Indices are dense and zero-based over accepted chunks only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based index among accepted chunks
    pub index: usize,
    /// Local path of the extracted chunk file
    pub path: PathBuf,
    /// Start offset in the source video (seconds)
    pub start_secs: f64,
    /// Nominal duration (seconds); the last chunk may be shorter on disk
    pub duration_secs: f64,
}

impl Chunk {
    /// Nominal end offset (seconds).
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }

    /// One-based number for progress output.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Why an offset did not produce a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The media transform reported an error.
    ExtractionFailed { message: String },
    /// No output file was written.
    Missing,
    /// The output file is too small to hold any video.
    TooSmall { size: u64, min_size: u64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ExtractionFailed { message } => write!(f, "extraction failed: {}", message),
            SkipReason::Missing => write!(f, "output file missing"),
            SkipReason::TooSmall { size, min_size } => {
                write!(f, "output too small ({} bytes, need more than {})", size, min_size)
            }
        }
    }
}

/// An offset that was attempted but rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedChunk {
    /// Start offset that was attempted (seconds)
    pub offset_secs: f64,
    pub reason: SkipReason,
}
