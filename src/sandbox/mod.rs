//! Sandbox module confining file access to a project root.
//!
//! This module provides [`PathSandbox`], which resolves user-supplied
//! relative paths against a canonical project root and rejects anything
//! that would land outside of it.

mod path;

pub use path::{resolve, PathSandbox};
