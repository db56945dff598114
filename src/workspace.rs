//! Route-level operations for one user session.
//!
//! [`Workspace`] is what an upper layer (the REPL binary, or an HTTP layer)
//! calls into. Every operation except activation needs an active project
//! and fails with [`Error::NotActivated`] before doing any other work.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::diff::{engine_for, Diff};
use crate::error::{Error, Result};
use crate::files;
use crate::generation::{ContextBlob, GenerationBackend, GenerationClient};
use crate::prompt;
use crate::session::{ProjectSession, Turn};
use crate::workflow::{Cancelled, ModificationWorkflow, Written};

/// Reply to a sync when the project has no matching files.
pub const NO_FILES_MESSAGE: &str = "Project synced. No relevant files found to summarize.";

/// Marker sent in place of a file that could not be read during sync.
const UNREADABLE_MARKER: &str = "[Error reading file content]";

/// Result of activating a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    /// Canonical project root.
    pub root: PathBuf,
    /// True if prior conversation history was restored.
    pub history_loaded: bool,
}

/// Result of a project sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    /// Backend summary, or a fixed message for an empty project.
    pub summary: String,
    /// Files sent to the backend.
    pub files_analyzed: usize,
    /// Files matching the listing filters.
    pub total_files: usize,
}

/// One user's session state plus the services it drives.
pub struct Workspace {
    session_id: String,
    config: Config,
    workflow: ModificationWorkflow,
    session: Option<ProjectSession>,
}

impl Workspace {
    /// Creates a workspace with no active project.
    pub fn new(config: Config, backend: Arc<dyn GenerationBackend>) -> Self {
        let client = GenerationClient::new(backend, &config.generation);
        let workflow = ModificationWorkflow::new(
            client,
            engine_for(&config.diff),
            config.session.instructions_file.clone(),
        );

        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            config,
            workflow,
            session: None,
        }
    }

    /// Identifier carried across re-activations.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Configuration this workspace was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The active project session, if any.
    pub fn session(&self) -> Option<&ProjectSession> {
        self.session.as_ref()
    }

    fn active(&self) -> Result<&ProjectSession> {
        self.session.as_ref().ok_or(Error::NotActivated)
    }

    /// Binds the workspace to `path`, replacing any previous project.
    ///
    /// Pending modifications from a previous activation are dropped. The
    /// sidecar is written immediately so the root is recorded; a sidecar
    /// that resolves outside the root fails activation with `Error::Sidecar`.
    pub fn activate_project(&mut self, path: impl AsRef<Path>) -> Result<Activation> {
        let session =
            ProjectSession::activate(self.session_id.clone(), path, &self.config.session)?;
        session.persist()?;

        let activation = Activation {
            root: session.root().to_path_buf(),
            history_loaded: session.history_loaded(),
        };
        self.session = Some(session);
        Ok(activation)
    }

    /// Generates a new file from instructions and writes it directly.
    pub async fn generate_new(&self, filename: &str, instructions: &str) -> Result<Written> {
        let session = self.active()?;
        self.workflow.generate_new(session, filename, instructions).await
    }

    /// Proposes a modification to an existing file and returns its diff.
    pub async fn propose_modification(&mut self, path: &str, instructions: &str) -> Result<Diff> {
        let session = self.session.as_mut().ok_or(Error::NotActivated)?;
        let proposal = self.workflow.propose(session, path, instructions).await?;
        Ok(proposal.diff)
    }

    /// Applies the pending modification for `path`.
    pub fn confirm_modification(&mut self, path: &str) -> Result<Written> {
        let session = self.session.as_mut().ok_or(Error::NotActivated)?;
        self.workflow.confirm(session, path)
    }

    /// Discards the pending modification for `path`, if any.
    pub fn cancel_modification(&mut self, path: &str) -> Result<Cancelled> {
        let session = self.session.as_mut().ok_or(Error::NotActivated)?;
        Ok(self.workflow.cancel(session, path))
    }

    /// Sends a chat message and returns the reply.
    ///
    /// On success both the message and the reply are appended to history and
    /// the sidecar is rewritten. A failed generation leaves history as is.
    pub async fn chat(&mut self, message: &str) -> Result<String> {
        let session = self.session.as_mut().ok_or(Error::NotActivated)?;
        if message.trim().is_empty() {
            return Err(Error::InvalidRequest("message is empty".to_string()));
        }

        let general = self.workflow.general_instructions(session);
        let prompt = prompt::chat_prompt(general.as_deref(), session.recent_history(), message);
        let reply = self.workflow.client().generate(&prompt, &[]).await?;

        session.record_turn(Turn::user(message));
        session.record_turn(Turn::assistant(reply.as_str()));
        session.persist()?;

        Ok(reply)
    }

    /// Lists project files, sorted.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let session = self.active()?;
        files::list_project_files(session.sandbox(), &self.config.files)
    }

    /// Reads a project file.
    pub fn read_file(&self, path: &str) -> Result<String> {
        let session = self.active()?;
        let target = session.sandbox().resolve(path)?;
        if !target.is_file() {
            return Err(Error::FileNotFound(path.to_string()));
        }
        files::read_text(&target)
    }

    /// Asks the backend to summarize the project.
    ///
    /// At most `max_sync_files` files are sent. Files larger than
    /// `max_file_bytes` are replaced by a placeholder.
    pub async fn sync_project(&self) -> Result<SyncSummary> {
        let session = self.active()?;
        let listed = files::list_project_files(session.sandbox(), &self.config.files)?;
        if listed.is_empty() {
            return Ok(SyncSummary {
                summary: NO_FILES_MESSAGE.to_string(),
                files_analyzed: 0,
                total_files: 0,
            });
        }

        let limit = self.config.files.max_sync_files;
        if listed.len() > limit {
            tracing::warn!(limit, total = listed.len(), "sync limit reached, remaining files skipped");
        }

        let context: Vec<ContextBlob> = listed
            .iter()
            .take(limit)
            .map(|rel| ContextBlob::new(rel.as_str(), self.sync_content(session, rel)))
            .collect();

        let general = self.workflow.general_instructions(session);
        let prompt = prompt::sync_prompt(general.as_deref());
        tracing::info!(files = context.len(), total = listed.len(), "requesting project summary");
        let summary = self.workflow.client().generate(&prompt, &context).await?;

        Ok(SyncSummary {
            summary,
            files_analyzed: context.len(),
            total_files: listed.len(),
        })
    }

    fn sync_content(&self, session: &ProjectSession, rel: &str) -> String {
        let read = session.sandbox().resolve(rel).and_then(|path| {
            let size = std::fs::metadata(&path)?.len();
            if size > self.config.files.max_file_bytes {
                tracing::warn!(path = %rel, size, "skipping large file during sync");
                return Ok(format!(
                    "[File content truncated: Size {} bytes exceeds limit]",
                    size
                ));
            }
            files::read_text(&path)
        });

        read.unwrap_or_else(|e| {
            tracing::warn!(path = %rel, error = %e, "could not read file during sync");
            UNREADABLE_MARKER.to_string()
        })
    }
}
