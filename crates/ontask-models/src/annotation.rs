//! Activity annotations returned by the inference service.

use serde::{Deserialize, Deserializer, Serialize};

use crate::timestamp::{parse_timestamp, TimestampError};

/// Activity of the subject's dominant hand.
///
/// Serializes as `"Task"` / `"Off Task"`. Parsing ignores case, spaces,
/// hyphens and underscores, so `"off task"` and `"OFF_TASK"` are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActivityLabel {
    /// The hand is actively picking up or placing an item.
    #[serde(rename = "Task")]
    Task,
    /// Anything else: resting, waiting, fidgeting, talking.
    #[serde(rename = "Off Task")]
    OffTask,
}

impl ActivityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLabel::Task => "Task",
            ActivityLabel::OffTask => "Off Task",
        }
    }

    /// Match a label leniently; `None` for anything else.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "task" | "ontask" => Some(ActivityLabel::Task),
            "offtask" => Some(ActivityLabel::OffTask),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ActivityLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ActivityLabel::parse_lenient(&raw).ok_or_else(|| {
            serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(&raw),
                &"\"Task\" or \"Off Task\"",
            )
        })
    }
}

impl std::fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled time span within one chunk.
///
/// Timestamps are kept exactly as returned by inference. They may be read
/// from an in-frame clock or be relative to the chunk start, and are never
/// reconciled against the chunk offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationInterval {
    /// Start timestamp (HH:MM:SS)
    pub start_time: String,
    /// End timestamp (HH:MM:SS)
    pub end_time: String,
    /// Activity label
    pub label: ActivityLabel,
}

impl AnnotationInterval {
    pub fn new(
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        label: ActivityLabel,
    ) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
            label,
        }
    }

    /// Length of the interval in seconds, if both timestamps parse.
    ///
    /// Returns a negative value when the end precedes the start; callers
    /// decide what that means.
    pub fn span_seconds(&self) -> Result<f64, TimestampError> {
        Ok(parse_timestamp(&self.end_time)? - parse_timestamp(&self.start_time)?)
    }
}
