//! Content generation against an external LLM backend.
//!
//! A [`GenerationBackend`] performs one request and classifies the reply.
//! [`GenerationClient`] owns the retry policy and output sanitization on top
//! of it, so the two can be tested independently.

mod client;
mod command;
mod gemini;
mod sanitize;

pub use client::GenerationClient;
pub use command::CommandBackend;
pub use gemini::GeminiApiBackend;
pub use sanitize::strip_code_fence;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendKind, GenerationConfig};
use crate::error::{Error, Result};

/// Classified reply from a single backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendReply {
    /// Generated text.
    Text(String),
    /// The backend refused the request on policy grounds.
    Blocked(String),
    /// Generation stopped for a reason other than normal completion.
    Incomplete(String),
    /// No text and no explanation.
    Empty,
}

/// A labeled piece of file content sent along with a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlob {
    /// Relative path the content came from.
    pub label: String,
    /// File content.
    pub content: String,
}

impl ContextBlob {
    /// Creates a blob for `label`.
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }
}

/// Trait for generation backends.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Sends one request.
    ///
    /// Transport failures are returned as errors; everything the backend
    /// answered is classified into a [`BackendReply`].
    async fn call(&self, payload: &str) -> Result<BackendReply>;

    /// Returns the name of this backend.
    fn name(&self) -> &str;
}

/// Concatenates a prompt with its labeled context blobs.
pub fn build_payload(prompt: &str, context: &[ContextBlob]) -> String {
    let mut payload = prompt.to_string();
    for blob in context {
        payload.push_str(&format!("\n--- Start File: {} ---\n", blob.label));
        payload.push_str(&blob.content);
        payload.push_str(&format!("\n--- End File: {} ---\n", blob.label));
    }
    payload
}

/// Builds the backend selected by configuration.
///
/// The HTTP backend reads its API key from the environment variable named in
/// the configuration; this is the only place the environment is consulted.
pub fn backend_for(config: &GenerationConfig) -> Result<Arc<dyn GenerationBackend>> {
    match config.backend {
        BackendKind::GeminiApi => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                Error::Config(format!(
                    "environment variable '{}' not set",
                    config.api_key_env
                ))
            })?;
            Ok(Arc::new(GeminiApiBackend::new(config, api_key)?))
        }
        BackendKind::Command => Ok(Arc::new(CommandBackend::from_config(config))),
    }
}
