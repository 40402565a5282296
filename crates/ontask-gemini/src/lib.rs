//! Client for the Gemini vision-language service.
//!
//! This crate provides:
//! - The [`InferenceClient`] contract: upload, poll state, infer, delete
//! - A REST implementation over the Gemini Files API and `generateContent`
//! - Error classification into rate-limited, transient and fatal

pub mod client;
pub mod error;
pub mod inference;
mod types;

pub use client::{GeminiClient, GeminiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{is_rate_limit_signal, ErrorClass, InferenceError, InferenceResult};
pub use inference::{InferenceClient, RemoteFile, RemoteFileState};
