//! Project-root path resolution.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// A canonical project root that every file operation is confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSandbox {
    /// Canonical absolute root (symlinks resolved).
    root: PathBuf,
}

impl PathSandbox {
    /// Creates a sandbox for an existing directory.
    ///
    /// The root is canonicalized once here; later resolutions compare
    /// against this canonical form.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(Error::rejected("", "empty project root"));
        }

        let canonical =
            std::fs::canonicalize(root).map_err(|_| Error::InvalidRoot(root.to_path_buf()))?;
        if !canonical.is_dir() {
            return Err(Error::InvalidRoot(root.to_path_buf()));
        }

        Ok(Self { root: canonical })
    }

    /// Returns the canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `relative` to a canonical absolute path inside the root.
    ///
    /// The target does not need to exist. Rejects empty paths, absolute
    /// paths, `..` segments, and any path whose canonical form (after
    /// following symlinks) is outside the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        if relative.trim().is_empty() {
            return Err(Error::rejected(relative, "empty path"));
        }
        if relative.contains('\0') {
            return Err(Error::rejected(relative, "path contains a NUL byte"));
        }

        let input = Path::new(relative);
        if input.has_root() || input.is_absolute() {
            tracing::warn!(path = %relative, root = ?self.root, "absolute path rejected");
            return Err(Error::rejected(relative, "absolute paths are not allowed"));
        }
        if input.components().any(|c| matches!(c, Component::ParentDir)) {
            tracing::warn!(path = %relative, root = ?self.root, "path traversal attempt rejected");
            return Err(Error::rejected(relative, "parent directory segments are not allowed"));
        }

        let joined = self.root.join(input);
        let canonical = canonicalize_lenient(&joined)
            .map_err(|e| Error::rejected(relative, format!("cannot resolve: {}", e)))?;

        if !canonical.starts_with(&self.root) {
            tracing::error!(
                path = %relative,
                resolved = ?canonical,
                root = ?self.root,
                "path resolves outside project root"
            );
            return Err(Error::rejected(relative, "escapes project root"));
        }

        Ok(canonical)
    }

    /// Returns `path` relative to the root, using `/` separators.
    ///
    /// Returns `None` if `path` is not inside the root.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let stripped = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = stripped
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Some(parts.join("/"))
    }
}

/// Resolves `relative` against `root` in one call.
pub fn resolve(root: impl AsRef<Path>, relative: &str) -> Result<PathBuf> {
    PathSandbox::new(root)?.resolve(relative)
}

/// Symlink hops followed before giving up on a dangling chain.
const MAX_SYMLINK_HOPS: usize = 40;

/// Canonicalizes a path whose tail may not exist yet.
///
/// The deepest existing ancestor is canonicalized (following symlinks) and
/// the missing components are appended as-is. A dangling symlink along the
/// way is followed through its target, so the result names the location a
/// write would actually land on.
fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();
    let mut hops = 0;

    let base = loop {
        match std::fs::canonicalize(&existing) {
            Ok(canonical) => break canonical,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let is_link = std::fs::symlink_metadata(&existing)
                    .is_ok_and(|meta| meta.file_type().is_symlink());
                if is_link {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(io::Error::new(
                            io::ErrorKind::Other,
                            "too many levels of symbolic links",
                        ));
                    }
                    let target = std::fs::read_link(&existing)?;
                    existing.pop();
                    existing = existing.join(target);
                    continue;
                }

                let name = existing
                    .file_name()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no existing ancestor"))?
                    .to_os_string();
                missing.push(name);
                if !existing.pop() {
                    return Err(io::Error::new(io::ErrorKind::NotFound, "no existing ancestor"));
                }
            }
            Err(e) => return Err(e),
        }
    };

    Ok(missing
        .into_iter()
        .rev()
        .fold(base, |acc, name| acc.join(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, PathSandbox) {
        let dir = TempDir::new().unwrap();
        let sandbox = PathSandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn resolves_existing_file() {
        let (dir, sandbox) = sandbox();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let resolved = sandbox.resolve("a.txt").unwrap();
        assert_eq!(resolved, sandbox.root().join("a.txt"));
    }

    #[test]
    fn resolves_missing_nested_path() {
        let (_dir, sandbox) = sandbox();

        let resolved = sandbox.resolve("src/deep/new.py").unwrap();
        assert_eq!(resolved, sandbox.root().join("src").join("deep").join("new.py"));
    }

    #[test]
    fn current_dir_segments_are_dropped() {
        let (_dir, sandbox) = sandbox();

        let resolved = sandbox.resolve("./src/./main.py").unwrap();
        assert_eq!(resolved, sandbox.root().join("src").join("main.py"));
    }

    #[test]
    fn dot_resolves_to_root() {
        let (_dir, sandbox) = sandbox();
        assert_eq!(sandbox.resolve(".").unwrap(), sandbox.root());
    }

    #[test]
    fn parent_segments_are_rejected() {
        let (_dir, sandbox) = sandbox();

        for path in ["../etc/passwd", "src/../../x", "a/b/../../../c", ".."] {
            let err = sandbox.resolve(path).unwrap_err();
            assert!(
                matches!(err, Error::PathRejected { .. }),
                "{} was not rejected",
                path
            );
        }
    }

    #[test]
    fn absolute_paths_are_rejected() {
        let (dir, sandbox) = sandbox();
        let inside = dir.path().join("a.txt");

        assert!(sandbox.resolve("/etc/passwd").is_err());
        assert!(sandbox.resolve(inside.to_str().unwrap()).is_err());
    }

    #[test]
    fn empty_paths_are_rejected() {
        let (_dir, sandbox) = sandbox();

        assert!(matches!(
            sandbox.resolve("").unwrap_err(),
            Error::PathRejected { .. }
        ));
        assert!(sandbox.resolve("   ").is_err());
    }

    #[test]
    fn empty_root_is_rejected() {
        assert!(matches!(
            resolve("", "a.txt").unwrap_err(),
            Error::PathRejected { .. }
        ));
    }

    #[test]
    fn missing_root_is_invalid() {
        let dir = TempDir::new().unwrap();
        let err = PathSandbox::new(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::InvalidRoot(_)));
    }

    #[test]
    fn file_root_is_invalid() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();

        assert!(matches!(
            PathSandbox::new(&file).unwrap_err(),
            Error::InvalidRoot(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s3cret").unwrap();
        let (dir, sandbox) = sandbox();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = sandbox.resolve("link/secret.txt").unwrap_err();
        assert!(matches!(err, Error::PathRejected { .. }));

        let err = sandbox.resolve("link/not-yet-created.txt").unwrap_err();
        assert!(matches!(err, Error::PathRejected { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_out_of_root_is_rejected() {
        let outside = TempDir::new().unwrap();
        let (dir, sandbox) = sandbox();
        std::os::unix::fs::symlink(
            outside.path().join("escaped.txt"),
            dir.path().join("link.txt"),
        )
        .unwrap();
        std::os::unix::fs::symlink(outside.path().join("gone"), dir.path().join("dirlink"))
            .unwrap();

        for path in ["link.txt", "dirlink/new.txt"] {
            let err = sandbox.resolve(path).unwrap_err();
            assert!(matches!(err, Error::PathRejected { .. }), "{} was not rejected", path);
        }
        assert!(!outside.path().join("escaped.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_within_root_resolves_to_target() {
        let (dir, sandbox) = sandbox();
        std::os::unix::fs::symlink("later.txt", dir.path().join("alias.txt")).unwrap();

        let resolved = sandbox.resolve("alias.txt").unwrap();
        assert_eq!(resolved, sandbox.root().join("later.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_is_rejected() {
        let (dir, sandbox) = sandbox();
        std::os::unix::fs::symlink("b", dir.path().join("a")).unwrap();
        std::os::unix::fs::symlink("a", dir.path().join("b")).unwrap();

        assert!(matches!(
            sandbox.resolve("a").unwrap_err(),
            Error::PathRejected { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_within_root_is_allowed() {
        let (dir, sandbox) = sandbox();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::fs::write(dir.path().join("real").join("a.txt"), "a").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let resolved = sandbox.resolve("alias/a.txt").unwrap();
        assert_eq!(resolved, sandbox.root().join("real").join("a.txt"));
    }

    #[test]
    fn relative_strips_root() {
        let (_dir, sandbox) = sandbox();
        let abs = sandbox.root().join("src").join("lib.py");

        assert_eq!(sandbox.relative(&abs).as_deref(), Some("src/lib.py"));
        assert_eq!(sandbox.relative(Path::new("/definitely/elsewhere")), None);
    }
}
