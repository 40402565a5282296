//! Shared data models for the on-task annotation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Activity labels and annotation intervals returned by inference
//! - Video chunks produced by the chunker
//! - The merged, ordered timeline
//! - HH:MM:SS timestamp parsing and formatting

pub mod annotation;
pub mod chunk;
pub mod timeline;
pub mod timestamp;

// Re-export common types
pub use annotation::{ActivityLabel, AnnotationInterval};
pub use chunk::{chunk_file_name, Chunk, SkipReason, SkippedChunk};
pub use timeline::Timeline;
pub use timestamp::{format_seconds, parse_timestamp, TimestampError};
