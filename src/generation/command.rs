//! Backend that shells out to a generation CLI.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

use super::{BackendReply, GenerationBackend};

/// Runs a CLI such as `gemini` in non-interactive mode and reads stdout.
pub struct CommandBackend {
    /// Path to the CLI binary.
    cli_path: String,
    /// Model passed with `--model`, if any.
    model: Option<String>,
    /// Time allowed for one invocation.
    timeout: Duration,
}

impl Default for CommandBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBackend {
    /// Creates a backend using the default `gemini` command.
    pub fn new() -> Self {
        Self {
            cli_path: "gemini".to_string(),
            model: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Creates a backend with a custom CLI path.
    pub fn with_cli_path(cli_path: impl Into<String>) -> Self {
        Self {
            cli_path: cli_path.into(),
            ..Self::new()
        }
    }

    /// Creates a backend from configuration.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            cli_path: config.command.clone(),
            model: Some(config.model.clone()),
            timeout: config.request_timeout(),
        }
    }

    /// Sets the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the command arguments.
    fn build_args(&self, payload: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        args.push("--prompt".to_string());
        args.push(payload.to_string());

        args
    }
}

#[async_trait]
impl GenerationBackend for CommandBackend {
    async fn call(&self, payload: &str) -> Result<BackendReply> {
        let args = self.build_args(payload);

        tracing::info!(cli = %self.cli_path, "invoking generation CLI");

        let child = Command::new(&self.cli_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                Error::Backend(format!("{} timed out after {:?}", self.cli_path, self.timeout))
            })?
            .map_err(|e| Error::Backend(format!("failed to spawn {}: {}", self.cli_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Backend(format!(
                "{} exited with {}: {}",
                self.cli_path,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Ok(BackendReply::Empty);
        }

        Ok(BackendReply::Text(stdout))
    }

    fn name(&self) -> &str {
        "command"
    }
}
