//! Annotation pipeline worker.
//!
//! This crate provides:
//! - The sequential run orchestrator with guaranteed temp-file cleanup
//! - Per-chunk analysis with polling and rate-limit retries
//! - Timeline aggregation and persistence
//! - An injectable clock so no test waits in real time

pub mod analyzer;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod poll;
pub mod prompt;
pub mod retry;
pub mod timeline;

pub use analyzer::{AnalysisOutcome, AnalyzerConfig, ChunkAnalysis, RetryingAnalyzer};
pub use clock::{Clock, RecordingClock, TokioClock};
pub use config::{PipelineConfig, DEFAULT_OUTPUT_SUFFIX};
pub use error::{PipelineError, PipelineResult};
pub use logging::ChunkLogger;
pub use pipeline::{FailedChunk, Pipeline, RunSummary, COMPRESSED_FILE_NAME};
pub use poll::{poll_until_terminal, PollError};
pub use prompt::{parse_annotations, strip_code_fences, ANNOTATION_PROMPT};
pub use retry::{retry_rate_limited, RetryConfig, RetryResult};
pub use timeline::{write_timeline, TimelineAggregator};
