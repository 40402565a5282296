//! Gemini REST client.
//!
//! Media goes through the Files API resumable upload protocol; inference
//! references the uploaded file by URI in a `generateContent` call.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, info, warn};

use crate::error::{InferenceError, InferenceResult};
use crate::inference::{InferenceClient, RemoteFile, RemoteFileState};
use crate::types::{
    Content, FileEnvelope, FileResource, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, Part,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model name without the `models/` prefix
    pub model: String,
    /// API root, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(600),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> InferenceResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| InferenceError::Config("GEMINI_API_KEY not set".to_string()))?;

        Ok(Self {
            api_key,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("GEMINI_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Gemini API client.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> InferenceResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> InferenceResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.config.base_url, name)
    }

    async fn file_resource(&self, file: &RemoteFile) -> InferenceResult<FileResource> {
        let response = self
            .http
            .get(self.file_url(&file.name))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn upload(&self, path: &Path) -> InferenceResult<RemoteFile> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_type_for(path);
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "chunk".to_string());

        info!("Uploading {} ({} bytes)", path.display(), bytes.len());

        // Open a resumable session
        let start = self
            .http
            .post(format!("{}/upload/v1beta/files", self.config.base_url))
            .header(API_KEY_HEADER, &self.config.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = ensure_success(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| InferenceError::upload_failed("missing x-goog-upload-url header"))?;

        // Send the bytes and finalize in one request
        let finalize = self
            .http
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let envelope: FileEnvelope = ensure_success(finalize).await?.json().await?;

        debug!(name = %envelope.file.name, state = ?envelope.file.state, "Upload finalized");

        let file = envelope.file;
        Ok(RemoteFile {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type.unwrap_or_else(|| mime_type.to_string()),
        })
    }

    async fn get_state(&self, file: &RemoteFile) -> InferenceResult<RemoteFileState> {
        let resource = self.file_resource(file).await?;
        Ok(RemoteFileState::from_api(resource.state.as_deref()))
    }

    async fn delete(&self, file: &RemoteFile) -> InferenceResult<()> {
        let response = self
            .http
            .delete(self.file_url(&file.name))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        ensure_success(response).await?;
        debug!(name = %file.name, "Deleted remote file");
        Ok(())
    }

    async fn infer(&self, file: &RemoteFile, prompt: &str) -> InferenceResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::file(file.mime_type.clone(), file.uri.clone()),
                    Part::text(prompt),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let response: GenerateContentResponse = ensure_success(response).await?.json().await?;
        response_text(response)
    }
}

/// Turn non-2xx responses into [`InferenceError::Api`].
async fn ensure_success(response: Response) -> InferenceResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    warn!("Gemini API returned {}", status);
    Err(InferenceError::api(status, body))
}

/// Concatenate the text parts of the first candidate.
fn response_text(response: GenerateContentResponse) -> InferenceResult<String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(InferenceError::Blocked(reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(InferenceError::invalid_response(format!(
            "empty response (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

/// MIME type for an upload, from the file extension.
fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
