//! LLM Workbench - project sessions with reviewed, LLM-generated file edits
//!
//! This library confines file access to an activated project root, drives a
//! generation backend with bounded retries, and runs proposed modifications
//! through a review step (diff, then confirm or cancel) before anything is
//! written.

pub mod backoff;
pub mod config;
pub mod diff;
pub mod error;
pub mod files;
pub mod generation;
pub mod prompt;
pub mod sandbox;
pub mod session;
pub mod workflow;
pub mod workspace;

pub use error::{Error, Result};

pub use backoff::{Backoff, BackoffPolicy};
pub use config::{
    BackendKind, Config, DiffConfig, DiffKind, FilesConfig, GenerationConfig, SessionConfig,
    Validate, ValidationResult,
};
pub use diff::{Diff, DiffEngine, ExternalDiff, SimilarDiff};
pub use generation::{
    backend_for, BackendReply, CommandBackend, ContextBlob, GeminiApiBackend, GenerationBackend,
    GenerationClient,
};
pub use sandbox::PathSandbox;
pub use session::{CancelOutcome, ProjectSession, Speaker, Turn};
pub use workflow::{Cancelled, ModificationWorkflow, Proposal, Written};
pub use workspace::{Activation, SyncSummary, Workspace};
