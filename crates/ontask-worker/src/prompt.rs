//! Annotation prompt and response parsing.

use ontask_models::AnnotationInterval;

/// Instruction sent with every chunk.
pub const ANNOTATION_PROMPT: &str = r#"You are a behavioral research assistant reviewing a short clip of a participant doing a chip sorting task.

Classify what the participant's DOMINANT HAND (the one wearing the watch) is doing, using exactly two labels:
1. "Task": the hand is actively picking up a chip or placing one into the box.
2. "Off Task": anything else, such as resting, waiting, fidgeting, adjusting hair or clothes, or talking.

Instructions:
- Read start_time and end_time from the VISIBLE CLOCK in the video.
- If the clock cannot be read, estimate the time relative to the start of this clip.
- Be precise and record short interruptions as their own intervals.
- Respond with ONLY a JSON array. No markdown, no commentary.

Format:
[
  {"start_time": "HH:MM:SS", "end_time": "HH:MM:SS", "label": "Task"},
  {"start_time": "HH:MM:SS", "end_time": "HH:MM:SS", "label": "Off Task"}
]
"#;

/// Remove markdown code-fence markers wrapping a response.
///
/// Every "```json" and "```" occurrence is dropped, then the remainder is
/// trimmed.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse a response into annotation intervals.
pub fn parse_annotations(text: &str) -> Result<Vec<AnnotationInterval>, serde_json::Error> {
    serde_json::from_str(&strip_code_fences(text))
}
