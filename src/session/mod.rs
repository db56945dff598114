//! Per-user project session.
//!
//! A [`ProjectSession`] binds an activated project root to its conversation
//! history and the set of pending modifications. History is durable through
//! the sidecar file in the project root. Pending modifications live only in
//! memory: they are never written to the sidecar and a fresh activation
//! always starts with none.

mod sidecar;

pub use sidecar::SidecarRecord;

use std::collections::HashMap;
use std::path::{Component, Path};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::sandbox::PathSandbox;

/// Who said a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// One message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    /// A message from the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    /// A reply from the backend.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// Result of discarding a pending modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A pending modification existed and was dropped.
    Removed,
    /// Nothing was pending for the path.
    NotFound,
}

/// State bound to one activated project.
#[derive(Debug)]
pub struct ProjectSession {
    session_id: String,
    sandbox: PathSandbox,
    sidecar_file: String,
    history: Vec<Turn>,
    pending: HashMap<String, String>,
    max_history_turns: usize,
    history_loaded: bool,
}

impl ProjectSession {
    /// Activates `root` for `session_id`.
    ///
    /// The root must be an existing directory. Conversation history is
    /// restored from the sidecar when it is present and well formed; any
    /// problem with the sidecar leaves the history empty. The pending set
    /// always starts empty.
    pub fn activate(
        session_id: impl Into<String>,
        root: impl AsRef<Path>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let root = root.as_ref();
        let sandbox = PathSandbox::new(root).map_err(|e| match e {
            Error::PathRejected { .. } => Error::InvalidRoot(root.to_path_buf()),
            other => other,
        })?;
        let session_id = session_id.into();

        let history: Vec<Turn> = match sandbox.resolve(&config.sidecar_file) {
            Ok(path) => sidecar::load(&path)
                .map(|record| history_from_messages(record.conversation_history))
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!(file = %config.sidecar_file, error = %e, "sidecar path rejected, starting fresh");
                Vec::new()
            }
        };
        let history_loaded = !history.is_empty();

        tracing::info!(
            session_id = %session_id,
            root = ?sandbox.root(),
            restored_messages = history.len(),
            "activated project"
        );

        Ok(Self {
            session_id,
            sandbox,
            sidecar_file: config.sidecar_file.clone(),
            history,
            pending: HashMap::new(),
            max_history_turns: config.max_history_turns,
            history_loaded,
        })
    }

    /// Identifier of the owning workspace.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Canonical project root.
    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    /// Sandbox confining paths to the root.
    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Returns true if activation restored a non-empty history.
    pub fn history_loaded(&self) -> bool {
        self.history_loaded
    }

    /// Full conversation history, oldest first.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// The most recent exchanges, bounded by the configured number of turns.
    pub fn recent_history(&self) -> &[Turn] {
        let keep = self.max_history_turns.saturating_mul(2);
        let start = self.history.len().saturating_sub(keep);
        &self.history[start..]
    }

    /// Appends a message to the history.
    pub fn record_turn(&mut self, turn: Turn) {
        self.history.push(turn);
    }

    /// Stores `content` as the pending modification for `path`.
    ///
    /// Replaces whatever was pending for that path; returns true if
    /// something was replaced.
    pub fn propose(&mut self, path: &str, content: impl Into<String>) -> bool {
        let key = pending_key(path);
        let replaced = self.pending.insert(key.clone(), content.into()).is_some();
        tracing::debug!(session_id = %self.session_id, path = %key, replaced, "stored pending modification");
        replaced
    }

    /// Returns the pending content for `path` without consuming it.
    pub fn take_pending(&self, path: &str) -> Result<&str> {
        self.pending
            .get(&pending_key(path))
            .map(String::as_str)
            .ok_or_else(|| Error::NoPendingModification(path.to_string()))
    }

    /// Removes and returns the pending content for `path`.
    pub fn resolve_confirm(&mut self, path: &str) -> Result<String> {
        self.pending
            .remove(&pending_key(path))
            .ok_or_else(|| Error::NoPendingModification(path.to_string()))
    }

    /// Discards the pending content for `path`, if any.
    pub fn resolve_cancel(&mut self, path: &str) -> CancelOutcome {
        match self.pending.remove(&pending_key(path)) {
            Some(_) => CancelOutcome::Removed,
            None => CancelOutcome::NotFound,
        }
    }

    /// Returns true if a modification is pending for `path`.
    pub fn has_pending(&self, path: &str) -> bool {
        self.pending.contains_key(&pending_key(path))
    }

    /// Paths with a pending modification, sorted.
    pub fn pending_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.pending.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Number of pending modifications.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Writes the root and history to the sidecar, replacing its content.
    ///
    /// The sidecar name is resolved inside the root on every call; a name or
    /// symlink leading outside it fails with [`Error::Sidecar`].
    pub fn persist(&self) -> Result<()> {
        let record = SidecarRecord {
            project_root: self.root().to_string_lossy().into_owned(),
            conversation_history: self.history.iter().map(|t| t.text.clone()).collect(),
        };
        let path = self.sandbox.resolve(&self.sidecar_file).map_err(|e| {
            tracing::error!(file = %self.sidecar_file, error = %e, "refusing to save sidecar");
            Error::Sidecar {
                path: self.root().join(&self.sidecar_file),
                reason: e.to_string(),
            }
        })?;
        sidecar::save(&path, &record)?;
        tracing::debug!(
            session_id = %self.session_id,
            path = ?path,
            messages = record.conversation_history.len(),
            "saved session"
        );
        Ok(())
    }
}

/// Messages alternate user then assistant.
fn history_from_messages(messages: Vec<String>) -> Vec<Turn> {
    messages
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            if i % 2 == 0 {
                Turn::user(text)
            } else {
                Turn::assistant(text)
            }
        })
        .collect()
}

/// Lexical normal form so `./a.txt` and `a.txt` share one pending slot.
fn pending_key(path: &str) -> String {
    let parts: Vec<String> = Path::new(path.trim())
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        path.to_string()
    } else {
        parts.join("/")
    }
}
