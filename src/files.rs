//! Project file access at sandbox-validated paths.

use std::path::Path;

use ignore::WalkBuilder;

use crate::config::FilesConfig;
use crate::error::{Error, Result};
use crate::sandbox::PathSandbox;

/// Reads a UTF-8 text file.
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| {
        tracing::error!(path = ?path, error = %source, "failed to read file");
        Error::FileIo {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Writes a UTF-8 text file, creating parent directories as needed.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    let wrap = |source: std::io::Error| {
        tracing::error!(path = ?path, error = %source, "failed to write file");
        Error::FileIo {
            path: path.to_path_buf(),
            source,
        }
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    std::fs::write(path, content).map_err(wrap)?;

    tracing::info!(path = ?path, bytes = content.len(), "wrote file");
    Ok(())
}

/// Lists project files matching the configured extensions.
///
/// Paths are relative to the root with `/` separators, sorted and unique.
/// Excluded directories are never descended into; hidden files and
/// `.gitignore`d paths are skipped.
pub fn list_project_files(sandbox: &PathSandbox, config: &FilesConfig) -> Result<Vec<String>> {
    let exclude = config.exclude_dirs.clone();
    let walker = WalkBuilder::new(sandbox.root())
        .standard_filters(true)
        .require_git(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && exclude.iter().any(|d| entry.file_name() == d.as_str()))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if !has_listed_extension(entry.path(), &config.extensions) {
            continue;
        }
        if let Some(relative) = sandbox.relative(entry.path()) {
            files.push(relative);
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn has_listed_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_lowercase();
    extensions
        .iter()
        .any(|ext| name.ends_with(&format!(".{}", ext.trim_start_matches('.').to_lowercase())))
}
