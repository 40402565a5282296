//! Sequential run orchestration.
//!
//! One run: privacy transform, split, analyze each chunk in order, merge,
//! persist. Chunk failures never abort the run. The only early exits are a
//! missing input, an input that would collide with a temporary file and an
//! invalid configuration, all before any work starts.
//! Every local temporary file is removed before `run` returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn, Instrument};

use ontask_gemini::InferenceClient;
use ontask_media::{Chunker, MediaTransformer, SplitOutcome};
use ontask_models::Chunk;

use crate::analyzer::{AnalysisOutcome, AnalyzerConfig, ChunkAnalysis, RetryingAnalyzer};
use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::ChunkLogger;
use crate::timeline::{write_timeline, TimelineAggregator};

/// File name of the transformed intermediate inside the work directory.
pub const COMPRESSED_FILE_NAME: &str = "temp_compressed.mp4";

/// A chunk that contributed no annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedChunk {
    pub chunk_index: usize,
    pub outcome: AnalysisOutcome,
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub output_path: PathBuf,
    /// Chunks that went through analysis
    pub chunks_processed: usize,
    /// Offsets rejected by the chunker
    pub chunks_skipped: usize,
    /// Intervals in the persisted timeline
    pub annotations: usize,
    pub failed_chunks: Vec<FailedChunk>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.chunks_skipped == 0 && self.failed_chunks.is_empty()
    }
}

/// Orchestrates one annotation run.
pub struct Pipeline {
    config: PipelineConfig,
    transformer: Arc<dyn MediaTransformer>,
    analyzer: RetryingAnalyzer,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        transformer: Arc<dyn MediaTransformer>,
        client: Arc<dyn InferenceClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let analyzer = RetryingAnalyzer::new(client, clock.clone(), AnalyzerConfig::from(&config));
        Self {
            config,
            transformer,
            analyzer,
            clock,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline on `input`.
    pub async fn run(&self, input: &Path) -> PipelineResult<RunSummary> {
        self.config.validate()?;

        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(PipelineError::InputNotFound(input.to_path_buf()));
        }

        if self.collides_with_temp_file(input).await {
            return Err(PipelineError::InputConflict(input.to_path_buf()));
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id);

        async {
            info!(input = %input.display(), "Starting annotation run");

            tokio::fs::create_dir_all(&self.config.work_dir).await?;
            let compressed = self.config.work_dir.join(COMPRESSED_FILE_NAME);

            let result = self.run_inner(input, &compressed, &run_id).await;

            remove_quietly(&compressed).await;
            result
        }
        .instrument(span)
        .await
    }

    /// Whether `input` sits in the work directory under a name the run
    /// writes and later deletes.
    async fn collides_with_temp_file(&self, input: &Path) -> bool {
        let Some(name) = input.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !is_temp_file_name(name) {
            return false;
        }

        let parent = match input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        match (
            tokio::fs::canonicalize(parent).await,
            tokio::fs::canonicalize(&self.config.work_dir).await,
        ) {
            (Ok(parent), Ok(work_dir)) => parent == work_dir,
            _ => false,
        }
    }

    async fn run_inner(&self, input: &Path, compressed: &Path, run_id: &str) -> PipelineResult<RunSummary> {
        let split = match self
            .transformer
            .transform(input, compressed, &self.config.scale_filter)
            .await
        {
            Ok(()) => {
                info!("Privacy transform complete");
                self.split(compressed).await
            }
            Err(e) => {
                error!("Privacy transform failed, no chunks will be analyzed: {}", e);
                None
            }
        };

        let (chunks, chunks_skipped) = match split {
            Some(outcome) => (outcome.chunks, outcome.skipped.len()),
            None => (Vec::new(), 0),
        };

        let mut aggregator = TimelineAggregator::new();
        let mut failed_chunks = Vec::new();
        let total = chunks.len();

        for (position, chunk) in chunks.iter().enumerate() {
            let logger = ChunkLogger::new(run_id, chunk.number(), total);
            let analysis = self
                .analyze_and_remove(chunk, &logger)
                .instrument(logger.create_span())
                .await;

            if !analysis.outcome.is_success() {
                failed_chunks.push(FailedChunk {
                    chunk_index: chunk.index,
                    outcome: analysis.outcome.clone(),
                });
            }
            aggregator.append(analysis.annotations);

            if position + 1 < total {
                self.clock.sleep(self.config.chunk_pause).await;
            }
        }

        let chunks_processed = aggregator.chunks_appended();
        let timeline = aggregator.finalize();
        let output_path = self.config.output_path_for(input);
        write_timeline(&timeline, &output_path).await?;

        info!(
            chunks = chunks_processed,
            skipped = chunks_skipped,
            failed = failed_chunks.len(),
            annotations = timeline.len(),
            output = %output_path.display(),
            "Run complete"
        );

        Ok(RunSummary {
            run_id: run_id.to_string(),
            output_path,
            chunks_processed,
            chunks_skipped,
            annotations: timeline.len(),
            failed_chunks,
        })
    }

    async fn split(&self, compressed: &Path) -> Option<SplitOutcome> {
        let chunker = Chunker::new(self.transformer.clone(), self.config.work_dir.clone())
            .with_min_chunk_bytes(self.config.min_chunk_bytes)
            .with_fallback_duration(self.config.fallback_duration_secs);

        match chunker.split(compressed, self.config.chunk_duration_secs).await {
            Ok(outcome) => {
                for skipped in &outcome.skipped {
                    warn!(
                        offset_secs = skipped.offset_secs,
                        reason = %skipped.reason,
                        "Segment excluded from timeline"
                    );
                }
                Some(outcome)
            }
            Err(e) => {
                error!("Splitting failed: {}", e);
                None
            }
        }
    }

    async fn analyze_and_remove(&self, chunk: &Chunk, logger: &ChunkLogger) -> ChunkAnalysis {
        logger.log_start(&format!(
            "offset {:.0}s to {:.0}s",
            chunk.start_secs,
            chunk.end_secs()
        ));

        logger.log_progress("uploading for analysis");
        let analysis = self.analyzer.analyze(chunk).await;

        match &analysis.outcome {
            AnalysisOutcome::Annotated => {
                logger.log_completion(&format!("{} intervals", analysis.annotations.len()))
            }
            outcome @ (AnalysisOutcome::RateLimitExhausted { .. }
            | AnalysisOutcome::PollTimedOut { .. }
            | AnalysisOutcome::Unparseable { .. }) => {
                logger.log_warning(&format!("no annotations: {}", outcome))
            }
            outcome => logger.log_error(&format!("no annotations: {}", outcome)),
        }

        remove_quietly(&chunk.path).await;
        analysis
    }
}

/// Names the run creates in the work directory.
fn is_temp_file_name(name: &str) -> bool {
    name == COMPRESSED_FILE_NAME || (name.starts_with("temp_chunk_") && name.ends_with(".mp4"))
}

/// Remove a local file, ignoring absence and logging other failures.
async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
        }
    }
}
