//! Fixed-size chunking of a source video.
//!
//! Offsets are `0, d, 2d, ...` while below the total duration. Each offset
//! is extracted once; outputs that are missing or too small are recorded
//! as skipped and never retried. Indices are assigned to accepted chunks
//! only, so a skipped offset does not reserve one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use ontask_models::{chunk_file_name, Chunk, SkipReason, SkippedChunk};

use crate::error::{MediaError, MediaResult};
use crate::transform::MediaTransformer;

/// Default assumed duration when probing fails (one hour).
pub const DEFAULT_FALLBACK_DURATION_SECS: f64 = 3600.0;

/// Default minimum accepted chunk size; outputs must be strictly larger.
pub const DEFAULT_MIN_CHUNK_BYTES: u64 = 1000;

/// Start offsets for chunks of `chunk_secs` covering `total_secs`.
///
/// Yields `ceil(total_secs / chunk_secs)` offsets. Empty for non-positive
/// or non-finite inputs.
pub fn chunk_offsets(total_secs: f64, chunk_secs: f64) -> Vec<f64> {
    if !(chunk_secs.is_finite() && chunk_secs > 0.0 && total_secs.is_finite()) {
        return Vec::new();
    }

    let mut offsets = Vec::new();
    let mut i = 0u32;
    loop {
        // Multiply rather than accumulate to avoid drift
        let start = f64::from(i) * chunk_secs;
        if start >= total_secs {
            break;
        }
        offsets.push(start);
        i += 1;
    }
    offsets
}

/// Where the total duration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    Probed,
    Fallback,
}

/// Result of splitting a video.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutcome {
    /// Duration used for offset generation (seconds)
    pub total_duration: f64,
    pub duration_source: DurationSource,
    /// Accepted chunks in increasing offset order
    pub chunks: Vec<Chunk>,
    /// Rejected offsets in increasing order
    pub skipped: Vec<SkippedChunk>,
}

impl SplitOutcome {
    /// Number of offsets attempted.
    pub fn attempted(&self) -> usize {
        self.chunks.len() + self.skipped.len()
    }
}

/// Splits a source video into bounded-length chunk files.
pub struct Chunker {
    transformer: Arc<dyn MediaTransformer>,
    work_dir: PathBuf,
    min_chunk_bytes: u64,
    fallback_duration_secs: f64,
}

impl Chunker {
    /// Create a chunker writing chunk files into `work_dir`.
    pub fn new(transformer: Arc<dyn MediaTransformer>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            transformer,
            work_dir: work_dir.into(),
            min_chunk_bytes: DEFAULT_MIN_CHUNK_BYTES,
            fallback_duration_secs: DEFAULT_FALLBACK_DURATION_SECS,
        }
    }

    pub fn with_min_chunk_bytes(mut self, bytes: u64) -> Self {
        self.min_chunk_bytes = bytes;
        self
    }

    pub fn with_fallback_duration(mut self, secs: f64) -> Self {
        self.fallback_duration_secs = secs;
        self
    }

    /// Probe the total duration, falling back to the assumed ceiling.
    pub async fn total_duration(&self, source: &Path) -> (f64, DurationSource) {
        match self.transformer.probe_duration(source).await {
            Ok(secs) => (secs, DurationSource::Probed),
            Err(e) => {
                warn!(
                    path = %source.display(),
                    error = %e,
                    "Could not detect video duration, assuming {:.0}s",
                    self.fallback_duration_secs
                );
                (self.fallback_duration_secs, DurationSource::Fallback)
            }
        }
    }

    /// Split `source` into chunks of `chunk_secs`.
    pub async fn split(&self, source: &Path, chunk_secs: f64) -> MediaResult<SplitOutcome> {
        if !(chunk_secs.is_finite() && chunk_secs > 0.0) {
            return Err(MediaError::InvalidChunkDuration(chunk_secs));
        }

        info!("Splitting {} into {}s chunks", source.display(), chunk_secs);

        let (total_duration, duration_source) = self.total_duration(source).await;
        info!("Video duration: {:.1} seconds", total_duration);

        let mut chunks = Vec::new();
        let mut skipped = Vec::new();

        for offset in chunk_offsets(total_duration, chunk_secs) {
            let index = chunks.len();
            let path = self.work_dir.join(chunk_file_name(index));

            match self.extract_one(source, &path, offset, chunk_secs).await {
                Ok(()) => chunks.push(Chunk {
                    index,
                    path,
                    start_secs: offset,
                    duration_secs: chunk_secs,
                }),
                Err(reason) => {
                    warn!(offset_secs = offset, %reason, "Skipping chunk");
                    metrics::counter!("ontask_chunks_skipped_total").increment(1);
                    // The next accepted chunk reuses this file name
                    remove_quietly(&path).await;
                    skipped.push(SkippedChunk {
                        offset_secs: offset,
                        reason,
                    });
                }
            }
        }

        info!(
            "Created {} chunks ({} skipped)",
            chunks.len(),
            skipped.len()
        );

        Ok(SplitOutcome {
            total_duration,
            duration_source,
            chunks,
            skipped,
        })
    }

    /// Extract one window and verify the output.
    async fn extract_one(
        &self,
        source: &Path,
        output: &Path,
        offset: f64,
        chunk_secs: f64,
    ) -> Result<(), SkipReason> {
        self.transformer
            .extract_segment(source, output, offset, chunk_secs)
            .await
            .map_err(|e| SkipReason::ExtractionFailed {
                message: e.to_string(),
            })?;

        let size = match tokio::fs::metadata(output).await {
            Ok(meta) => meta.len(),
            Err(_) => return Err(SkipReason::Missing),
        };

        if size <= self.min_chunk_bytes {
            return Err(SkipReason::TooSmall {
                size,
                min_size: self.min_chunk_bytes,
            });
        }

        Ok(())
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove rejected chunk file");
        }
    }
}
