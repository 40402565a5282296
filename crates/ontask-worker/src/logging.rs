//! Structured chunk logging.
//!
//! Every line carries the run identifier and the chunk position so that
//! interleaved output from several runs can be separated.

use tracing::{error, info, warn, Span};

/// Logger bound to one chunk of one run.
#[derive(Debug, Clone)]
pub struct ChunkLogger {
    run_id: String,
    chunk: usize,
    total: usize,
}

impl ChunkLogger {
    /// `chunk` is one-based.
    pub fn new(run_id: &str, chunk: usize, total: usize) -> Self {
        Self {
            run_id: run_id.to_string(),
            chunk,
            total,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            chunk = self.chunk,
            total = self.total,
            "Chunk {}/{} started: {}", self.chunk, self.total, message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            chunk = self.chunk,
            total = self.total,
            "Chunk progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            chunk = self.chunk,
            total = self.total,
            "Chunk warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            chunk = self.chunk,
            total = self.total,
            "Chunk error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            chunk = self.chunk,
            total = self.total,
            "Chunk {}/{} completed: {}", self.chunk, self.total, message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    /// Span wrapping all work on this chunk.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "chunk",
            run_id = %self.run_id,
            chunk = self.chunk,
            total = self.total
        )
    }
}
