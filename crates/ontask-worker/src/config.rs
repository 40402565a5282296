//! Pipeline configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ontask_media::{DEFAULT_CRF, DEFAULT_FALLBACK_DURATION_SECS, DEFAULT_MIN_CHUNK_BYTES, DEFAULT_SCALE_FILTER};

use crate::error::{PipelineError, PipelineResult};

/// Suffix appended to the input's base name for the output document.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_FINAL_ANNOTATIONS.json";

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Source video
    pub input_path: PathBuf,
    /// Directory for the transformed video and chunk files
    pub work_dir: PathBuf,
    /// Output directory; defaults to the input's directory
    pub output_dir: Option<PathBuf>,
    /// Suffix for the output document name
    pub output_suffix: String,
    /// Nominal chunk length in seconds
    pub chunk_duration_secs: f64,
    /// FFmpeg scale filter for the privacy transform
    pub scale_filter: String,
    /// libx264 constant rate factor
    pub crf: u8,
    /// Chunks must be strictly larger than this
    pub min_chunk_bytes: u64,
    /// Assumed duration when probing fails
    pub fallback_duration_secs: f64,
    /// Pause between chunks, skipped after the last
    pub chunk_pause: Duration,
    /// Remote state poll interval
    pub poll_interval: Duration,
    /// Give up waiting for remote processing after this long
    pub poll_timeout: Duration,
    /// Maximum inference attempts per chunk
    pub max_retries: u32,
    /// Rate-limit wait unit; attempt `n` waits `n` times this
    pub rate_limit_backoff: Duration,
    /// Per-invocation FFmpeg timeout
    pub ffmpeg_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("P7.mp4"),
            work_dir: PathBuf::from("."),
            output_dir: None,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            chunk_duration_secs: 300.0, // 5 minutes
            scale_filter: DEFAULT_SCALE_FILTER.to_string(),
            crf: DEFAULT_CRF,
            min_chunk_bytes: DEFAULT_MIN_CHUNK_BYTES,
            fallback_duration_secs: DEFAULT_FALLBACK_DURATION_SECS,
            chunk_pause: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(600),
            max_retries: 3,
            rate_limit_backoff: Duration::from_secs(60),
            ffmpeg_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            input_path: std::env::var("ONTASK_INPUT")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_path),
            work_dir: std::env::var("ONTASK_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("ONTASK_OUTPUT_DIR").ok().map(PathBuf::from),
            output_suffix: std::env::var("ONTASK_OUTPUT_SUFFIX").unwrap_or(defaults.output_suffix),
            chunk_duration_secs: env_or("ONTASK_CHUNK_SECS", defaults.chunk_duration_secs),
            scale_filter: std::env::var("ONTASK_SCALE_FILTER").unwrap_or(defaults.scale_filter),
            crf: env_or("ONTASK_CRF", defaults.crf),
            min_chunk_bytes: env_or("ONTASK_MIN_CHUNK_BYTES", defaults.min_chunk_bytes),
            fallback_duration_secs: env_or(
                "ONTASK_FALLBACK_DURATION_SECS",
                defaults.fallback_duration_secs,
            ),
            chunk_pause: Duration::from_secs(env_or("ONTASK_CHUNK_PAUSE_SECS", 5)),
            poll_interval: Duration::from_secs(env_or("ONTASK_POLL_INTERVAL_SECS", 2)),
            poll_timeout: Duration::from_secs(env_or("ONTASK_POLL_TIMEOUT_SECS", 600)),
            max_retries: env_or("ONTASK_MAX_RETRIES", defaults.max_retries),
            rate_limit_backoff: Duration::from_secs(env_or("ONTASK_RATE_LIMIT_BACKOFF_SECS", 60)),
            ffmpeg_timeout_secs: std::env::var("ONTASK_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if !(self.chunk_duration_secs.is_finite() && self.chunk_duration_secs > 0.0) {
            return Err(PipelineError::config_error(format!(
                "chunk duration must be positive, got {}",
                self.chunk_duration_secs
            )));
        }
        if self.max_retries == 0 {
            return Err(PipelineError::config_error("max_retries must be at least 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(PipelineError::config_error("poll interval must be non-zero"));
        }
        if self.scale_filter.trim().is_empty() {
            return Err(PipelineError::config_error("scale filter must not be empty"));
        }
        Ok(())
    }

    /// Fail fast when the configured input is not an existing file.
    pub fn check_input(&self) -> PipelineResult<()> {
        if self.input_path.is_file() {
            Ok(())
        } else {
            Err(PipelineError::InputNotFound(self.input_path.clone()))
        }
    }

    /// Output document path for `input`: `<dir>/<base name><suffix>`.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let file_name = format!("{}{}", stem, self.output_suffix);

        match &self.output_dir {
            Some(dir) => dir.join(file_name),
            None => input.with_file_name(file_name),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
