//! Propose, review, then confirm or cancel.
//!
//! Each (session, path) pair moves through `Clean -> Proposed -> Applied`
//! or `Proposed -> Discarded`. Only the generated content is kept as state;
//! the diff is handed back for review and then forgotten. Generating a
//! brand-new file skips all of this and writes directly.

use crate::diff::{review_labels, Diff, DiffEngine};
use crate::error::{Error, Result};
use crate::files;
use crate::generation::{ContextBlob, GenerationClient};
use crate::prompt;
use crate::session::{CancelOutcome, ProjectSession};

/// A proposed modification ready for review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub path: String,
    pub diff: Diff,
}

/// A file written by confirm or fresh generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub path: String,
    pub bytes: usize,
}

/// Outcome of a cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancelled {
    pub path: String,
    /// False when nothing was pending.
    pub discarded: bool,
}

/// Drives generation and the pending-modification lifecycle.
pub struct ModificationWorkflow {
    client: GenerationClient,
    diff: Box<dyn DiffEngine>,
    instructions_file: String,
}

impl ModificationWorkflow {
    /// Creates a workflow reading general instructions from `instructions_file`.
    pub fn new(
        client: GenerationClient,
        diff: Box<dyn DiffEngine>,
        instructions_file: impl Into<String>,
    ) -> Self {
        Self {
            client,
            diff,
            instructions_file: instructions_file.into(),
        }
    }

    /// The generation client used for every request.
    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// General instructions for the session's project, if any.
    pub fn general_instructions(&self, session: &ProjectSession) -> Option<String> {
        prompt::load_general_instructions(session.sandbox(), &self.instructions_file)
    }

    /// Generates a new file and writes it without review.
    ///
    /// An existing file at `filename` is overwritten.
    pub async fn generate_new(
        &self,
        session: &ProjectSession,
        filename: &str,
        instructions: &str,
    ) -> Result<Written> {
        let target = session.sandbox().resolve(filename)?;
        if target.is_dir() {
            return Err(Error::rejected(filename, "is a directory"));
        }

        let general = self.general_instructions(session);
        let prompt = prompt::generation_prompt(general.as_deref(), filename, instructions);
        let content = self.client.generate(&prompt, &[]).await?;

        files::write_text(&target, &content)?;
        tracing::info!(
            session_id = %session.session_id(),
            path = %filename,
            "generated new file"
        );

        Ok(Written {
            path: filename.to_string(),
            bytes: content.len(),
        })
    }

    /// Generates a modification of an existing file and stores it as pending.
    ///
    /// Nothing is stored if generation or diffing fails. A previous pending
    /// modification for the same path is replaced.
    pub async fn propose(
        &self,
        session: &mut ProjectSession,
        path: &str,
        instructions: &str,
    ) -> Result<Proposal> {
        let target = session.sandbox().resolve(path)?;
        if !target.is_file() {
            return Err(Error::FileNotFound(path.to_string()));
        }

        let original = files::read_text(&target)?;
        let general = self.general_instructions(session);
        let prompt = prompt::modification_prompt(general.as_deref(), path, instructions);
        let context = [ContextBlob::new(path, original.as_str())];

        let modified = self.client.generate(&prompt, &context).await?;

        let (from, to) = review_labels(path);
        let diff = self.diff.diff(&original, &modified, &from, &to)?;

        let replaced = session.propose(path, modified);
        tracing::info!(
            session_id = %session.session_id(),
            path = %path,
            identical = diff.is_identical(),
            replaced,
            engine = %self.diff.name(),
            "proposed modification"
        );

        Ok(Proposal {
            path: path.to_string(),
            diff,
        })
    }

    /// Writes the pending modification for `path`.
    ///
    /// The pending entry is consumed even when the target turns out to be
    /// gone, in which case [`Error::StaleTarget`] is returned. It is also
    /// consumed when the write itself fails; the caller must propose again.
    pub fn confirm(&self, session: &mut ProjectSession, path: &str) -> Result<Written> {
        let content = session.resolve_confirm(path)?;

        let target = match session.sandbox().resolve(path) {
            Ok(target) if target.is_file() => target,
            Ok(_) => {
                tracing::warn!(path = %path, "pending target no longer exists, dropping proposal");
                return Err(Error::StaleTarget(path.to_string()));
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "pending target no longer resolves, dropping proposal");
                return Err(Error::StaleTarget(path.to_string()));
            }
        };

        files::write_text(&target, &content)?;
        tracing::info!(session_id = %session.session_id(), path = %path, "applied modification");

        Ok(Written {
            path: path.to_string(),
            bytes: content.len(),
        })
    }

    /// Discards the pending modification for `path`. Never fails.
    pub fn cancel(&self, session: &mut ProjectSession, path: &str) -> Cancelled {
        let discarded = session.resolve_cancel(path) == CancelOutcome::Removed;
        if discarded {
            tracing::info!(session_id = %session.session_id(), path = %path, "discarded modification");
        } else {
            tracing::debug!(path = %path, "nothing pending to cancel");
        }
        Cancelled {
            path: path.to_string(),
            discarded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::config::{GenerationConfig, SessionConfig};
    use crate::diff::SimilarDiff;
    use crate::generation::{BackendReply, GenerationBackend};

    struct Replies {
        replies: Mutex<VecDeque<BackendReply>>,
        calls: AtomicUsize,
        payloads: Mutex<Vec<String>>,
    }

    impl Replies {
        fn new(replies: Vec<BackendReply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                payloads: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationBackend for Replies {
        async fn call(&self, payload: &str) -> Result<BackendReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payloads.lock().unwrap().push(payload.to_string());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(BackendReply::Empty))
        }

        fn name(&self) -> &str {
            "replies"
        }
    }

    fn setup(replies: Vec<BackendReply>) -> (TempDir, ProjectSession, ModificationWorkflow, Arc<Replies>) {
        let dir = TempDir::new().unwrap();
        let session =
            ProjectSession::activate("s1", dir.path(), &SessionConfig::default()).unwrap();
        let backend = Replies::new(replies);
        let client = GenerationClient::new(backend.clone(), &GenerationConfig::default())
            .with_retry_delay(Duration::ZERO);
        let workflow =
            ModificationWorkflow::new(client, Box::new(SimilarDiff::default()), ".llm_instructions");
        (dir, session, workflow, backend)
    }

    fn text(s: &str) -> BackendReply {
        BackendReply::Text(s.to_string())
    }

    #[tokio::test]
    async fn propose_then_confirm_writes_generated_content() {
        let (dir, mut session, workflow, _) = setup(vec![text("HELLO\n")]);
        std::fs::write(dir.path().join("a.txt"), "hello\n").unwrap();

        let proposal = workflow
            .propose(&mut session, "a.txt", "capitalize")
            .await
            .unwrap();

        let Diff::Unified(diff) = &proposal.diff else {
            panic!("expected a diff");
        };
        assert!(diff.contains("-hello"));
        assert!(diff.contains("+HELLO"));
        assert_eq!(session.take_pending("a.txt").unwrap(), "HELLO\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello\n");

        workflow.confirm(&mut session, "a.txt").unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "HELLO\n");
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn cancel_leaves_file_untouched() {
        let (dir, mut session, workflow, _) = setup(vec![text("HELLO\n")]);
        std::fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
        workflow.propose(&mut session, "a.txt", "x").await.unwrap();

        let cancelled = workflow.cancel(&mut session, "a.txt");

        assert!(cancelled.discarded);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello\n");
        assert!(!workflow.cancel(&mut session, "a.txt").discarded);
    }

    #[tokio::test]
    async fn confirm_without_proposal_fails() {
        let (_dir, mut session, workflow, _) = setup(vec![]);

        assert!(matches!(
            workflow.confirm(&mut session, "a.txt").unwrap_err(),
            Error::NoPendingModification(_)
        ));
    }

    #[tokio::test]
    async fn confirm_after_target_deleted_is_stale_and_drops_entry() {
        let (dir, mut session, workflow, _) = setup(vec![text("new")]);
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        workflow.propose(&mut session, "a.txt", "x").await.unwrap();
        std::fs::remove_file(dir.path().join("a.txt")).unwrap();

        assert!(matches!(
            workflow.confirm(&mut session, "a.txt").unwrap_err(),
            Error::StaleTarget(_)
        ));
        assert!(!session.has_pending("a.txt"));
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn second_proposal_replaces_first() {
        let (dir, mut session, workflow, _) = setup(vec![text("one"), text("two")]);
        std::fs::write(dir.path().join("a.txt"), "zero").unwrap();

        workflow.propose(&mut session, "a.txt", "first").await.unwrap();
        workflow.propose(&mut session, "a.txt", "second").await.unwrap();
        workflow.confirm(&mut session, "a.txt").unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "two");
    }

    #[tokio::test]
    async fn propose_missing_file_never_calls_backend() {
        let (_dir, mut session, workflow, backend) = setup(vec![text("x")]);

        let err = workflow.propose(&mut session, "nope.txt", "x").await.unwrap_err();

        assert!(matches!(err, Error::FileNotFound(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn propose_outside_root_is_rejected_before_generation() {
        let (_dir, mut session, workflow, backend) = setup(vec![text("x")]);

        let err = workflow
            .propose(&mut session, "../etc/passwd", "x")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PathRejected { .. }));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn blocked_generation_stores_nothing() {
        let (dir, mut session, workflow, backend) =
            setup(vec![BackendReply::Blocked("SAFETY".into())]);
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();

        let err = workflow.propose(&mut session, "a.txt", "x").await.unwrap_err();

        assert!(matches!(err, Error::GenerationBlocked(reason) if reason == "SAFETY"));
        assert_eq!(backend.calls(), 1);
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn identical_proposal_reports_no_differences() {
        let (dir, mut session, workflow, _) = setup(vec![text("same\n")]);
        std::fs::write(dir.path().join("a.txt"), "same\n").unwrap();

        let proposal = workflow.propose(&mut session, "a.txt", "noop").await.unwrap();

        assert_eq!(proposal.diff, Diff::Identical);
        assert!(session.has_pending("a.txt"));
    }

    #[tokio::test]
    async fn proposal_payload_carries_file_and_instructions() {
        let (dir, mut session, workflow, backend) = setup(vec![text("x")]);
        std::fs::write(dir.path().join("a.txt"), "original body").unwrap();
        std::fs::write(dir.path().join(".llm_instructions"), "House rules.").unwrap();

        workflow.propose(&mut session, "a.txt", "tweak").await.unwrap();

        let payloads = backend.payloads.lock().unwrap();
        assert!(payloads[0].contains("House rules."));
        assert!(payloads[0].contains("User Instructions: tweak"));
        assert!(payloads[0].contains("--- Start File: a.txt ---\noriginal body"));
    }

    #[tokio::test]
    async fn generate_new_writes_without_pending_state() {
        let (dir, session, workflow, _) = setup(vec![text("```python\nprint('hi')\n```")]);

        let written = workflow
            .generate_new(&session, "src/app.py", "hello world")
            .await
            .unwrap();

        assert_eq!(written.path, "src/app.py");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/app.py")).unwrap(),
            "print('hi')"
        );
        assert_eq!(session.pending_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn generate_new_refuses_dangling_link_out_of_root() {
        let outside = TempDir::new().unwrap();
        let (dir, session, workflow, backend) = setup(vec![text("PWNED")]);
        std::os::unix::fs::symlink(
            outside.path().join("escaped.txt"),
            dir.path().join("link.txt"),
        )
        .unwrap();

        let err = workflow
            .generate_new(&session, "link.txt", "x")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PathRejected { .. }));
        assert_eq!(backend.calls(), 0);
        assert!(!outside.path().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn generate_new_failure_writes_nothing() {
        let (dir, session, workflow, backend) = setup(vec![]);

        let err = workflow
            .generate_new(&session, "out.md", "x")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RetriesExhausted { attempts: 3 }));
        assert_eq!(backend.calls(), 3);
        assert!(!dir.path().join("out.md").exists());
    }
}
