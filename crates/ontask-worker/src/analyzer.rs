//! Per-chunk analysis: upload, wait for processing, infer, delete.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use ontask_gemini::{InferenceClient, InferenceError, RemoteFile, RemoteFileState};
use ontask_models::{AnnotationInterval, Chunk};

use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::poll::{poll_until_terminal, PollError};
use crate::prompt::{parse_annotations, ANNOTATION_PROMPT};
use crate::retry::{retry_rate_limited, RetryConfig, RetryResult};

/// How a chunk's analysis ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Inference returned a parseable interval list (possibly empty).
    Annotated,
    /// The chunk never reached the service.
    UploadFailed { message: String },
    /// Checking the remote state errored.
    PollFailed { message: String },
    /// The service reported a terminal processing failure.
    RemoteFailed,
    /// Remote processing did not finish in time.
    PollTimedOut { waited: Duration },
    /// Every inference attempt was rate limited.
    RateLimitExhausted { attempts: u32 },
    /// Inference failed with a non-rate-limit error.
    InferenceFailed { message: String },
    /// The response was not a valid interval array.
    Unparseable { message: String },
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Annotated)
    }

    /// Short name for logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisOutcome::Annotated => "annotated",
            AnalysisOutcome::UploadFailed { .. } => "upload_failed",
            AnalysisOutcome::PollFailed { .. } => "poll_failed",
            AnalysisOutcome::RemoteFailed => "remote_failed",
            AnalysisOutcome::PollTimedOut { .. } => "poll_timed_out",
            AnalysisOutcome::RateLimitExhausted { .. } => "rate_limit_exhausted",
            AnalysisOutcome::InferenceFailed { .. } => "inference_failed",
            AnalysisOutcome::Unparseable { .. } => "unparseable",
        }
    }
}

impl std::fmt::Display for AnalysisOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisOutcome::Annotated => write!(f, "annotated"),
            AnalysisOutcome::UploadFailed { message } => write!(f, "upload failed: {}", message),
            AnalysisOutcome::PollFailed { message } => write!(f, "state check failed: {}", message),
            AnalysisOutcome::RemoteFailed => write!(f, "remote processing failed"),
            AnalysisOutcome::PollTimedOut { waited } => {
                write!(f, "remote processing timed out after {}s", waited.as_secs())
            }
            AnalysisOutcome::RateLimitExhausted { attempts } => {
                write!(f, "rate limited on all {} attempts", attempts)
            }
            AnalysisOutcome::InferenceFailed { message } => write!(f, "inference failed: {}", message),
            AnalysisOutcome::Unparseable { message } => write!(f, "unparseable response: {}", message),
        }
    }
}

/// Result of analyzing one chunk.
#[derive(Debug, Clone)]
pub struct ChunkAnalysis {
    pub chunk_index: usize,
    /// Empty unless `outcome` is `Annotated`
    pub annotations: Vec<AnnotationInterval>,
    pub outcome: AnalysisOutcome,
    /// Number of inference requests issued
    pub inference_calls: u32,
}

impl ChunkAnalysis {
    fn failed(chunk_index: usize, outcome: AnalysisOutcome, inference_calls: u32) -> Self {
        Self {
            chunk_index,
            annotations: Vec::new(),
            outcome,
            inference_calls,
        }
    }
}

/// Analyzer settings.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub max_attempts: u32,
    pub rate_limit_backoff: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for AnalyzerConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            poll_timeout: config.poll_timeout,
            max_attempts: config.max_retries,
            rate_limit_backoff: config.rate_limit_backoff,
        }
    }
}

/// Runs one chunk through the inference service with rate-limit retries.
///
/// Upload happens once. Only the inference call is retried. Whenever an
/// upload succeeded the remote copy is deleted before returning, and a
/// failed delete is logged and ignored.
pub struct RetryingAnalyzer {
    client: Arc<dyn InferenceClient>,
    clock: Arc<dyn Clock>,
    config: AnalyzerConfig,
    prompt: String,
}

impl RetryingAnalyzer {
    pub fn new(client: Arc<dyn InferenceClient>, clock: Arc<dyn Clock>, config: AnalyzerConfig) -> Self {
        Self {
            client,
            clock,
            config,
            prompt: ANNOTATION_PROMPT.to_string(),
        }
    }

    /// Replace the instruction prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub async fn analyze(&self, chunk: &Chunk) -> ChunkAnalysis {
        let file = match self.client.upload(&chunk.path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(chunk = chunk.number(), "Upload failed: {}", e);
                return ChunkAnalysis::failed(
                    chunk.index,
                    AnalysisOutcome::UploadFailed {
                        message: e.to_string(),
                    },
                    0,
                );
            }
        };
        debug!(chunk = chunk.number(), name = %file.name, "Uploaded chunk");

        let analysis = self.analyze_uploaded(chunk, &file).await;

        if let Err(e) = self.client.delete(&file).await {
            warn!(name = %file.name, "Failed to delete remote file: {}", e);
        }

        metrics::counter!("ontask_chunks_analyzed_total", "outcome" => analysis.outcome.as_str())
            .increment(1);
        metrics::counter!("ontask_annotations_total").increment(analysis.annotations.len() as u64);

        analysis
    }

    async fn analyze_uploaded(&self, chunk: &Chunk, file: &RemoteFile) -> ChunkAnalysis {
        let state = poll_until_terminal(
            self.client.as_ref(),
            file,
            self.clock.as_ref(),
            self.config.poll_interval,
            self.config.poll_timeout,
        )
        .await;

        match state {
            Ok(RemoteFileState::Failed) => {
                warn!(chunk = chunk.number(), "Remote processing failed");
                return ChunkAnalysis::failed(chunk.index, AnalysisOutcome::RemoteFailed, 0);
            }
            Ok(_) => {}
            Err(PollError::TimedOut(waited)) => {
                warn!(chunk = chunk.number(), waited_secs = waited.as_secs(), "Remote processing timed out");
                return ChunkAnalysis::failed(chunk.index, AnalysisOutcome::PollTimedOut { waited }, 0);
            }
            Err(PollError::Client(e)) => {
                warn!(chunk = chunk.number(), "State check failed: {}", e);
                return ChunkAnalysis::failed(
                    chunk.index,
                    AnalysisOutcome::PollFailed {
                        message: e.to_string(),
                    },
                    0,
                );
            }
        }

        let retry = RetryConfig::new(format!("infer_chunk_{}", chunk.number()))
            .with_max_attempts(self.config.max_attempts)
            .with_base_delay(self.config.rate_limit_backoff);

        let result = retry_rate_limited(
            &retry,
            self.clock.as_ref(),
            |e: &InferenceError| e.classify(),
            || self.client.infer(file, &self.prompt),
        )
        .await;
        let calls = result.attempts();

        let text = match result {
            RetryResult::Success { value, .. } => value,
            RetryResult::Exhausted { attempts, .. } => {
                return ChunkAnalysis::failed(
                    chunk.index,
                    AnalysisOutcome::RateLimitExhausted { attempts },
                    calls,
                );
            }
            RetryResult::Aborted { error, class, .. } => {
                warn!(chunk = chunk.number(), ?class, "Inference failed: {}", error);
                return ChunkAnalysis::failed(
                    chunk.index,
                    AnalysisOutcome::InferenceFailed {
                        message: error.to_string(),
                    },
                    calls,
                );
            }
        };

        match parse_annotations(&text) {
            Ok(annotations) => {
                info!(
                    chunk = chunk.number(),
                    intervals = annotations.len(),
                    attempts = calls,
                    "Chunk annotated"
                );
                ChunkAnalysis {
                    chunk_index: chunk.index,
                    annotations,
                    outcome: AnalysisOutcome::Annotated,
                    inference_calls: calls,
                }
            }
            Err(e) => {
                warn!(chunk = chunk.number(), "Response is not a valid interval array: {}", e);
                ChunkAnalysis::failed(
                    chunk.index,
                    AnalysisOutcome::Unparseable {
                        message: e.to_string(),
                    },
                    calls,
                )
            }
        }
    }
}
