//! Gemini `generateContent` HTTP backend.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

use super::{BackendReply, GenerationBackend};

/// Finish reasons that mean the candidate was withheld on policy grounds.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Finish reasons that mean generation ended normally.
const NORMAL_FINISH_REASONS: &[&str] = &["STOP", "FINISH_REASON_UNSPECIFIED"];

/// Backend calling the Gemini REST API.
pub struct GeminiApiBackend {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for GeminiApiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiApiBackend")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiApiBackend {
    /// Creates a backend using the model, endpoint and timeout from `config`.
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("API key is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl GenerationBackend for GeminiApiBackend {
    async fn call(&self, payload: &str) -> Result<BackendReply> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": payload }]
            }]
        });

        tracing::debug!(model = %self.model, bytes = payload.len(), "posting generateContent");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(500).collect();
            return Err(Error::Backend(format!("HTTP {}: {}", status, snippet)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("invalid response body: {}", e)))?;

        Ok(classify_response(&parsed))
    }

    fn name(&self) -> &str {
        "gemini-api"
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Maps a response onto the reply taxonomy.
///
/// Order: prompt block, then text, then finish reason. A candidate that has
/// text is returned even if its finish reason is abnormal.
fn classify_response(response: &GenerateContentResponse) -> BackendReply {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_ref())
    {
        return BackendReply::Blocked(reason.clone());
    }

    let Some(candidate) = response.candidates.first() else {
        return BackendReply::Empty;
    };

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();
    if !text.trim().is_empty() {
        return BackendReply::Text(text);
    }

    match candidate.finish_reason.as_deref() {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason) => {
            BackendReply::Blocked(reason.to_string())
        }
        Some(reason) if !NORMAL_FINISH_REASONS.contains(&reason) => {
            BackendReply::Incomplete(reason.to_string())
        }
        _ => BackendReply::Empty,
    }
}
