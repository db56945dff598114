//! Workbench configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing file or a
//! partial file is valid. Validation is a separate pass that reports fatal
//! errors and non-fatal warnings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;
use crate::error::{Error, Result};

/// Which backend serves generation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Gemini `generateContent` HTTP API.
    #[default]
    GeminiApi,
    /// A local CLI that takes the prompt as an argument.
    Command,
}

/// Which diff implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// In-process line diff.
    #[default]
    Builtin,
    /// External `diff -u` utility.
    External,
}

/// Configuration for the generation client and its backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: BackendKind,
    /// Model name passed to the backend.
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the HTTP API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// CLI binary for the command backend.
    #[serde(default = "default_command")]
    pub command: String,
    /// Total attempts per generation, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Delay schedule between attempts.
    #[serde(default)]
    pub backoff: BackoffPolicy,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-pro".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_command() -> String {
    "gemini".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            command: default_command(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff: BackoffPolicy::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl GenerationConfig {
    /// Returns the delay between attempts as a Duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Returns the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration for session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sidecar file name inside the project root.
    #[serde(default = "default_sidecar_file")]
    pub sidecar_file: String,
    /// General-instructions file name inside the project root.
    #[serde(default = "default_instructions_file")]
    pub instructions_file: String,
    /// User/assistant pairs included in chat prompts.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

fn default_sidecar_file() -> String {
    ".llm_session".to_string()
}

fn default_instructions_file() -> String {
    ".llm_instructions".to_string()
}

fn default_max_history_turns() -> usize {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sidecar_file: default_sidecar_file(),
            instructions_file: default_instructions_file(),
            max_history_turns: default_max_history_turns(),
        }
    }
}

/// Configuration for project file enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// File extensions included in listings, without the dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory names never descended into.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Maximum files read for a project summary.
    #[serde(default = "default_max_sync_files")]
    pub max_sync_files: usize,
    /// Files larger than this are summarized by size only.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_extensions() -> Vec<String> {
    ["py", "md", "txt", "json", "yaml", "yml", "html", "css", "js"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_dirs() -> Vec<String> {
    [
        ".git",
        ".venv",
        "venv",
        "env",
        "__pycache__",
        "node_modules",
        ".idea",
        ".vscode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_sync_files() -> usize {
    50
}

fn default_max_file_bytes() -> u64 {
    100 * 1024
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
            max_sync_files: default_max_sync_files(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// Configuration for diff rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Diff implementation.
    #[serde(default)]
    pub engine: DiffKind,
    /// Program used by the external engine.
    #[serde(default = "default_diff_program")]
    pub program: String,
}

fn default_diff_program() -> String {
    "diff".to_string()
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            engine: DiffKind::default(),
            program: default_diff_program(),
        }
    }
}

/// Top-level workbench configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub diff: DiffConfig,
}

impl Config {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("invalid config: {}", e)))
    }

    /// Loads configuration from a file, falling back to defaults if it is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = ?path, "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Fatal issues.
    pub errors: Vec<String>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Merges another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

impl Validate for GenerationConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.max_attempts == 0 {
            result.add_error("generation.max_attempts must be at least 1");
        }
        if self.max_attempts > 10 {
            result.add_warning("generation.max_attempts > 10 may hide a persistent backend failure");
        }
        if self.model.trim().is_empty() {
            result.add_error("generation.model cannot be empty");
        }
        if self.backend == BackendKind::Command && self.command.trim().is_empty() {
            result.add_error("generation.command cannot be empty for the command backend");
        }
        if self.retry_delay_ms > 60_000 {
            result.add_warning("generation.retry_delay_ms over one minute stalls every retry");
        }

        result
    }
}

impl Validate for SessionConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        for (key, name) in [
            ("session.sidecar_file", &self.sidecar_file),
            ("session.instructions_file", &self.instructions_file),
        ] {
            if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
                result.add_error(format!("{} must be a plain file name, got '{}'", key, name));
            }
        }
        if self.max_history_turns == 0 {
            result.add_warning("session.max_history_turns = 0 sends no history to the backend");
        }

        result
    }
}

impl Validate for FilesConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.extensions.is_empty() {
            result.add_warning("files.extensions is empty; project listings will be empty");
        }
        for ext in &self.extensions {
            if ext.starts_with('.') {
                result.add_warning(format!("extension '{}' should not include the dot", ext));
            }
        }
        if self.max_sync_files == 0 {
            result.add_warning("files.max_sync_files = 0 summarizes no file content");
        }

        result
    }
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult {
        let mut result = self.generation.validate();
        result.merge(self.session.validate());
        result.merge(self.files.validate());
        if self.diff.engine == DiffKind::External && self.diff.program.trim().is_empty() {
            result.add_error("diff.program cannot be empty for the external engine");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_has_sensible_defaults() {
        let config = Config::default();

        assert_eq!(config.generation.backend, BackendKind::GeminiApi);
        assert_eq!(config.generation.model, "gemini-pro");
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.generation.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.generation.backoff, BackoffPolicy::Fixed);
        assert_eq!(config.session.sidecar_file, ".llm_session");
        assert_eq!(config.session.instructions_file, ".llm_instructions");
        assert_eq!(config.session.max_history_turns, 10);
        assert_eq!(config.files.max_sync_files, 50);
        assert_eq!(config.files.max_file_bytes, 102_400);
        assert!(config.files.exclude_dirs.contains(&"node_modules".to_string()));
        assert_eq!(config.diff.engine, DiffKind::Builtin);
    }

    #[test]
    fn default_config_is_valid() {
        let result = Config::default().validate();
        assert!(result.is_valid(), "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn config_deserializes_from_partial_toml() {
        let toml = r#"
            [generation]
            backend = "command"
            command = "gemini-cli"
            max_attempts = 5
            backoff = "exponential"

            [session]
            max_history_turns = 4

            [diff]
            engine = "external"
        "#;

        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.generation.backend, BackendKind::Command);
        assert_eq!(config.generation.command, "gemini-cli");
        assert_eq!(config.generation.max_attempts, 5);
        assert_eq!(config.generation.backoff, BackoffPolicy::Exponential);
        assert_eq!(config.generation.model, "gemini-pro");
        assert_eq!(config.session.max_history_turns, 4);
        assert_eq!(config.session.sidecar_file, ".llm_session");
        assert_eq!(config.diff.engine, DiffKind::External);
        assert_eq!(config.diff.program, "diff");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = Config::from_toml_str("[generation\nmodel = 1").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.generation.max_attempts, 3);
    }

    #[test]
    fn zero_attempts_is_an_error() {
        let mut config = Config::default();
        config.generation.max_attempts = 0;

        let result = config.validate();
        assert!(!result.is_valid());
        assert!(config.validate().into_result().is_err());
    }

    #[test]
    fn sidecar_name_with_separator_is_rejected() {
        let session = SessionConfig {
            sidecar_file: "../escape".to_string(),
            ..Default::default()
        };
        let result = session.validate();
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn dotted_extension_warns() {
        let files = FilesConfig {
            extensions: vec![".rs".to_string()],
            ..Default::default()
        };
        let result = files.validate();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn backend_kind_serializes_to_kebab_case() {
        assert_eq!(
            serde_json::to_string(&BackendKind::GeminiApi).unwrap(),
            "\"gemini-api\""
        );
    }
}
