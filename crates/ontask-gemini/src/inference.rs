//! Inference collaborator contract.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::InferenceResult;

/// Handle to media uploaded to the inference service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`
    pub name: String,
    /// URI used to reference the file in prompts
    pub uri: String,
    pub mime_type: String,
}

/// Remote processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteFileState {
    Processing,
    Ready,
    Failed,
}

impl RemoteFileState {
    /// Map a Files API state string.
    ///
    /// Anything other than `PROCESSING` or `FAILED` is usable.
    pub fn from_api(state: Option<&str>) -> Self {
        match state {
            Some("PROCESSING") => RemoteFileState::Processing,
            Some("FAILED") => RemoteFileState::Failed,
            _ => RemoteFileState::Ready,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RemoteFileState::Processing)
    }
}

/// Upload media, track its processing state, run a prompt against it.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Upload a local file; returns once the bytes are accepted.
    async fn upload(&self, path: &Path) -> InferenceResult<RemoteFile>;

    /// Current processing state of an uploaded file.
    async fn get_state(&self, file: &RemoteFile) -> InferenceResult<RemoteFileState>;

    /// Delete an uploaded file.
    async fn delete(&self, file: &RemoteFile) -> InferenceResult<()>;

    /// Run `prompt` against `file`, requesting JSON output. Returns raw text.
    async fn infer(&self, file: &RemoteFile, prompt: &str) -> InferenceResult<String>;
}
