//! FFmpeg CLI wrapper for the annotation pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeout
//! - Duration probing via FFprobe
//! - The privacy transform (compress, rescale, drop audio)
//! - Fixed-size chunking with minimum-size verification

pub mod chunker;
pub mod command;
pub mod error;
pub mod probe;
pub mod transform;

pub use chunker::{
    chunk_offsets, Chunker, DurationSource, SplitOutcome, DEFAULT_FALLBACK_DURATION_SECS,
    DEFAULT_MIN_CHUNK_BYTES,
};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
pub use transform::{
    EncodeSettings, FfmpegTransformer, MediaTransformer, DEFAULT_CRF, DEFAULT_SCALE_FILTER,
};
