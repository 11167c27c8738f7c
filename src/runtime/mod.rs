//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over the environment and
//! file system operations the stack pipeline performs, enabling dependency
//! injection and testability.
//!
//! # Structure
//!
//! - `path` - Path utility functions (normalize, is_path_under)
//! - `env` - Environment and system information
//! - `fs` - File system operations (read, write, directory)

mod env;
mod fs;
pub mod path;

use anyhow::Result;
use std::io;
use std::path::{Path, PathBuf};

pub use path::is_path_under;

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn current_dir(&self) -> Result<PathBuf>;
    fn home_dir(&self) -> Option<PathBuf>;

    // File System
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Create a file with the given contents, failing if it already exists.
    /// The error is the raw `io::Error` so callers can distinguish
    /// `AlreadyExists` from other failures.
    fn write_new(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Canonicalize a path by resolving all symlinks and returning the
    /// canonical absolute path.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir_impl()
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        self.copy_impl(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn write_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.write_new_impl(path, contents)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.canonicalize_impl(path)
    }
}
