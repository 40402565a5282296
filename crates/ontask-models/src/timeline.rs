//! The merged annotation timeline.

use serde::{Deserialize, Serialize};

use crate::annotation::{ActivityLabel, AnnotationInterval};

/// Ordered sequence of annotation intervals across all chunks.
///
/// Order is chunk index order, then the order returned by inference within
/// each chunk. Serializes as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    intervals: Vec<AnnotationInterval>,
}

impl Timeline {
    pub fn new(intervals: Vec<AnnotationInterval>) -> Self {
        Self { intervals }
    }

    pub fn intervals(&self) -> &[AnnotationInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of intervals carrying `label`.
    pub fn count_label(&self, label: ActivityLabel) -> usize {
        self.intervals.iter().filter(|i| i.label == label).count()
    }

    /// Render as pretty-printed JSON with two-space indentation.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn into_intervals(self) -> Vec<AnnotationInterval> {
        self.intervals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_bare_array() {
        let timeline = Timeline::new(vec![
            AnnotationInterval::new("00:00:00", "00:00:04", ActivityLabel::Task),
            AnnotationInterval::new("00:00:04", "00:00:09", ActivityLabel::OffTask),
        ]);

        let value: serde_json::Value = serde_json::from_str(&timeline.to_json_pretty().unwrap()).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[1]["label"], "Off Task");
        assert_eq!(timeline.count_label(ActivityLabel::Task), 1);
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = Timeline::default();
        assert!(timeline.is_empty());
        assert_eq!(timeline.to_json_pretty().unwrap(), "[]");
    }
}
