//! Retrying generation client.

use std::sync::Arc;
use std::time::Duration;

use crate::backoff::{Backoff, BackoffPolicy};
use crate::config::GenerationConfig;
use crate::error::{Error, Result};

use super::sanitize::strip_code_fence;
use super::{build_payload, BackendReply, ContextBlob, GenerationBackend};

/// Wraps a backend with bounded retries and output sanitization.
///
/// Only ambiguous outcomes (transport errors, empty replies) consume a retry.
/// Blocked and incomplete replies are terminal.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    max_attempts: u32,
    retry_delay: Duration,
    backoff: BackoffPolicy,
}

impl GenerationClient {
    /// Creates a client from configuration.
    pub fn new(backend: Arc<dyn GenerationBackend>, config: &GenerationConfig) -> Self {
        Self {
            backend,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
            backoff: config.backoff,
        }
    }

    /// Sets the delay between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns the attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the name of the underlying backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Generates text for `prompt` with labeled `context`.
    ///
    /// Returns sanitized text, or one of `GenerationBlocked`,
    /// `GenerationIncomplete`, `RetriesExhausted`.
    pub async fn generate(&self, prompt: &str, context: &[ContextBlob]) -> Result<String> {
        let payload = build_payload(prompt, context);
        let mut backoff = Backoff::from_policy(self.backoff, self.retry_delay);

        for attempt in 1..=self.max_attempts {
            tracing::info!(
                backend = %self.backend.name(),
                attempt,
                max_attempts = self.max_attempts,
                "sending generation request"
            );

            match self.backend.call(&payload).await {
                Ok(BackendReply::Text(text)) if !text.trim().is_empty() => {
                    tracing::info!(attempt, bytes = text.len(), "received generated content");
                    return Ok(strip_code_fence(&text));
                }
                Ok(BackendReply::Text(_)) | Ok(BackendReply::Empty) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "empty response with no block or finish reason"
                    );
                }
                Ok(BackendReply::Blocked(reason)) => {
                    tracing::warn!(reason = %reason, "generation blocked by backend");
                    return Err(Error::GenerationBlocked(reason));
                }
                Ok(BackendReply::Incomplete(reason)) => {
                    tracing::warn!(reason = %reason, "generation finished unexpectedly");
                    return Err(Error::GenerationIncomplete(reason));
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_attempts = self.max_attempts,
                        "generation attempt failed"
                    );
                }
            }

            if attempt < self.max_attempts {
                backoff.wait().await;
            }
        }

        tracing::error!(attempts = self.max_attempts, "generation failed after retries");
        Err(Error::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }
}
