//! Timeline aggregation and persistence.

use std::path::Path;

use tracing::info;

use ontask_models::{AnnotationInterval, Timeline};

use crate::error::{PipelineError, PipelineResult};

/// Accumulates per-chunk annotations in append order.
///
/// No sorting, deduplication or overlap resolution happens here; callers
/// append chunks in ascending index order.
#[derive(Debug, Default)]
pub struct TimelineAggregator {
    intervals: Vec<AnnotationInterval>,
    chunks_appended: usize,
}

impl TimelineAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, partial: Vec<AnnotationInterval>) {
        self.intervals.extend(partial);
        self.chunks_appended += 1;
    }

    /// Number of `append` calls so far, including empty ones.
    pub fn chunks_appended(&self) -> usize {
        self.chunks_appended
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn finalize(self) -> Timeline {
        Timeline::new(self.intervals)
    }
}

/// Write `timeline` to `path` as pretty-printed JSON.
///
/// Creates the parent directory when missing.
pub async fn write_timeline(timeline: &Timeline, path: &Path) -> PipelineResult<()> {
    let json = timeline.to_json_pretty()?;

    let persist_err = |source| PipelineError::PersistFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(persist_err)?;
    }
    tokio::fs::write(path, json).await.map_err(persist_err)?;

    info!(path = %path.display(), intervals = timeline.len(), "Timeline written");
    Ok(())
}
