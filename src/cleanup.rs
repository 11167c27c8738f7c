use log::debug;
use std::fmt;
use std::path::PathBuf;

use crate::runtime::Runtime;
use crate::stack::Stack;

/// Tracks transient files that must be removed before the pipeline returns,
/// on success and on failure alike.
#[derive(Debug, Default)]
pub struct CleanupContext {
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for removal. Registering the same path twice is a
    /// no-op.
    pub fn track(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Register the transient statefile of every module in the stack.
    pub fn track_stack(&mut self, stack: &Stack, statefile_name: &str) {
        for path in stack.statefile_paths(statefile_name) {
            self.track(path);
        }
    }

    /// Remove every tracked file. A file that is already absent is not an
    /// error, which makes cleanup idempotent; failures are collected per
    /// path instead of stopping at the first one.
    pub fn run<R: Runtime>(&self, runtime: &R) -> Result<(), CleanupError> {
        let mut failures = Vec::new();
        for path in &self.paths {
            if !runtime.exists(path) {
                continue;
            }
            debug!("Removing transient file {:?}", path);
            if let Err(err) = runtime.remove_file(path) {
                failures.push((path.clone(), err));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CleanupError { failures })
        }
    }
}

/// One or more tracked files could not be removed.
///
/// Carried alongside a primary pipeline error (never replacing it) so a
/// failed cleanup cannot mask the failure that caused it.
#[derive(Debug)]
pub struct CleanupError {
    pub failures: Vec<(PathBuf, anyhow::Error)>,
}

impl fmt::Display for CleanupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to remove {} transient file(s): ", self.failures.len())?;
        for (i, (path, err)) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {:#}", path.display(), err)?;
        }
        Ok(())
    }
}

impl std::error::Error for CleanupError {}
