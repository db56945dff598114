//! Sidecar file holding durable session state inside the project root.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Persisted form of a session.
///
/// History is a flat list alternating user and assistant messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarRecord {
    #[serde(default, alias = "projectRoot")]
    pub project_root: String,
    #[serde(default, alias = "conversationHistory")]
    pub conversation_history: Vec<String>,
}

/// Loads a sidecar record.
///
/// Returns `None` when the file is missing, empty, unreadable or malformed.
/// None of these are fatal: the session starts with empty history.
pub fn load(path: &Path) -> Option<SidecarRecord> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = ?path, "no sidecar file");
            return None;
        }
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "failed to read sidecar, starting fresh");
            return None;
        }
    };

    if text.trim().is_empty() {
        tracing::warn!(path = ?path, "sidecar file is empty, starting fresh");
        return None;
    }

    match serde_json::from_str::<SidecarRecord>(&text) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "invalid sidecar format, starting fresh");
            None
        }
    }
}

/// Writes a sidecar record, replacing any previous content.
pub fn save(path: &Path, record: &SidecarRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record).map_err(|e| Error::Sidecar {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    std::fs::write(path, json).map_err(|e| {
        tracing::error!(path = ?path, error = %e, "failed to save sidecar");
        Error::Sidecar {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })
}
