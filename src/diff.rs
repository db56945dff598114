//! Unified diffs between original and proposed file content.
//!
//! [`SimilarDiff`] computes the diff in-process and is the default.
//! [`ExternalDiff`] shells out to a `diff -u` compatible utility; its scratch
//! files live in a temporary directory owned by the call, so they are removed
//! on every return path.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use similar::TextDiff;

use crate::config::{DiffConfig, DiffKind};
use crate::error::{Error, Result};

/// Outcome of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diff {
    /// Both sides are identical.
    Identical,
    /// Unified diff text, headers included.
    Unified(String),
}

impl Diff {
    /// Returns true if there are no differences.
    pub fn is_identical(&self) -> bool {
        matches!(self, Diff::Identical)
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diff::Identical => write!(f, "No differences."),
            Diff::Unified(text) => write!(f, "{}", text),
        }
    }
}

/// Computes diffs between two text blobs.
pub trait DiffEngine: Send + Sync {
    /// Diffs `original` against `modified`, labeling each side.
    fn diff(
        &self,
        original: &str,
        modified: &str,
        original_label: &str,
        modified_label: &str,
    ) -> Result<Diff>;

    /// Returns the name of this engine.
    fn name(&self) -> &str;
}

/// Labels used when reviewing a proposed change to `path`.
pub fn review_labels(path: &str) -> (String, String) {
    (
        format!("{} (Original)", path),
        format!("{} (Proposed Changes)", path),
    )
}

/// Builds the engine selected by configuration.
pub fn engine_for(config: &DiffConfig) -> Box<dyn DiffEngine> {
    match config.engine {
        DiffKind::Builtin => Box::new(SimilarDiff::default()),
        DiffKind::External => Box::new(ExternalDiff::new(config.program.clone())),
    }
}

/// In-process line diff.
#[derive(Debug, Clone)]
pub struct SimilarDiff {
    context_radius: usize,
}

impl Default for SimilarDiff {
    fn default() -> Self {
        Self { context_radius: 3 }
    }
}

impl SimilarDiff {
    /// Sets the number of unchanged lines shown around each hunk.
    pub fn with_context_radius(mut self, radius: usize) -> Self {
        self.context_radius = radius;
        self
    }
}

impl DiffEngine for SimilarDiff {
    fn diff(
        &self,
        original: &str,
        modified: &str,
        original_label: &str,
        modified_label: &str,
    ) -> Result<Diff> {
        if original == modified {
            return Ok(Diff::Identical);
        }

        let diff = TextDiff::from_lines(original, modified);
        let text = diff
            .unified_diff()
            .context_radius(self.context_radius)
            .header(original_label, modified_label)
            .to_string();

        Ok(Diff::Unified(text))
    }

    fn name(&self) -> &str {
        "builtin"
    }
}

/// Diff via an external `diff -u` compatible program.
#[derive(Debug, Clone)]
pub struct ExternalDiff {
    program: String,
    /// Directory that scratch directories are created in. System temp if None.
    scratch_parent: Option<PathBuf>,
}

impl Default for ExternalDiff {
    fn default() -> Self {
        Self::new("diff")
    }
}

impl ExternalDiff {
    /// Creates an engine running `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            scratch_parent: None,
        }
    }

    /// Creates scratch directories under `dir` instead of the system temp dir.
    pub fn with_scratch_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_parent = Some(dir.into());
        self
    }
}

impl DiffEngine for ExternalDiff {
    fn diff(
        &self,
        original: &str,
        modified: &str,
        original_label: &str,
        modified_label: &str,
    ) -> Result<Diff> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("workbench-diff-");
        let scratch = match &self.scratch_parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| unavailable("failed to create scratch dir", e))?;

        let original_path = scratch.path().join("original");
        let modified_path = scratch.path().join("modified");
        std::fs::write(&original_path, original)
            .map_err(|e| unavailable("failed to write scratch file", e))?;
        std::fs::write(&modified_path, modified)
            .map_err(|e| unavailable("failed to write scratch file", e))?;

        tracing::debug!(program = %self.program, scratch = ?scratch.path(), "running external diff");

        let output = Command::new(&self.program)
            .arg("-u")
            .arg("-L")
            .arg(original_label)
            .arg("-L")
            .arg(modified_label)
            .arg(&original_path)
            .arg(&modified_path)
            .output()
            .map_err(|e| unavailable(&format!("failed to run {}", self.program), e))?;

        // diff exits 0 when identical, 1 when different, >1 on trouble
        match output.status.code() {
            Some(0) => Ok(Diff::Identical),
            Some(1) => Ok(Diff::Unified(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            )),
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::error!(program = %self.program, ?code, stderr = %stderr, "external diff failed");
                Err(Error::DiffUnavailable(format!(
                    "{} exited with {:?}: {}",
                    self.program,
                    code,
                    stderr.trim()
                )))
            }
        }
    }

    fn name(&self) -> &str {
        "external"
    }
}

fn unavailable(what: &str, e: impl fmt::Display) -> Error {
    Error::DiffUnavailable(format!("{}: {}", what, e))
}
