//! Error types for the workbench.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for workspace operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The path escapes the project root or is malformed.
    #[error("path rejected: {path}: {reason}")]
    PathRejected { path: String, reason: String },

    /// An operation needs an active project root.
    #[error("project root not set; activate a project first")]
    NotActivated,

    /// The requested project root is not an existing directory.
    #[error("invalid project root: {0}")]
    InvalidRoot(PathBuf),

    /// A required request field was missing or blank.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The target file does not exist inside the project.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The backend declined to generate content.
    #[error("content generation blocked: {0}")]
    GenerationBlocked(String),

    /// The backend stopped generating abnormally.
    #[error("content generation stopped unexpectedly: {0}")]
    GenerationIncomplete(String),

    /// Transient backend failures persisted past the retry budget.
    #[error("generation failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Transport or backend error for a single attempt.
    #[error("backend error: {0}")]
    Backend(String),

    /// Confirm referenced a path with nothing pending.
    #[error("no pending modification for {0}")]
    NoPendingModification(String),

    /// The file behind a pending modification vanished or moved.
    #[error("target of pending modification is gone: {0}")]
    StaleTarget(String),

    /// Diff computation failed for a reason other than "files differ".
    #[error("diff unavailable: {0}")]
    DiffUnavailable(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error on a specific project file.
    #[error("IO error on {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sidecar file could not be written.
    #[error("failed to save session to {path}: {reason}")]
    Sidecar { path: PathBuf, reason: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Builds a [`Error::PathRejected`].
    pub fn rejected(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathRejected {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the caller caused the failure (bad input, wrong state).
    ///
    /// Everything else is a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::PathRejected { .. }
                | Error::NotActivated
                | Error::InvalidRoot(_)
                | Error::InvalidRequest(_)
                | Error::FileNotFound(_)
                | Error::GenerationBlocked(_)
                | Error::GenerationIncomplete(_)
                | Error::NoPendingModification(_)
                | Error::StaleTarget(_)
        )
    }
}

/// Result type alias for workspace operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(Error::rejected("../x", "escapes project root").is_client_error());
        assert!(Error::NotActivated.is_client_error());
        assert!(Error::NoPendingModification("a.txt".into()).is_client_error());
        assert!(Error::GenerationBlocked("SAFETY".into()).is_client_error());
    }

    #[test]
    fn server_errors_are_classified() {
        assert!(!Error::RetriesExhausted { attempts: 3 }.is_client_error());
        assert!(!Error::DiffUnavailable("diff missing".into()).is_client_error());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(!Error::from(io).is_client_error());
    }

    #[test]
    fn messages_carry_backend_reason() {
        let err = Error::GenerationIncomplete("MAX_TOKENS".into());
        assert_eq!(
            err.to_string(),
            "content generation stopped unexpectedly: MAX_TOKENS"
        );
    }
}
