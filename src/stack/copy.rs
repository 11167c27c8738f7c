//! Recursive copy of a configuration tree, honoring the relocation
//! manifest's exclusions.

use anyhow::{Context, Result};
use glob::Pattern;
use log::debug;
use serde::Deserialize;
use std::path::Path;

use super::{LOCK_FILENAME, MANIFEST_FILENAME};
use crate::runtime::Runtime;

/// Relocation bookkeeping: glob patterns (relative to the copy root) that
/// the tree copy must skip. The manifest file itself and the lock file are
/// always skipped.
#[derive(Debug, Default, Deserialize)]
pub struct MoveManifest {
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl MoveManifest {
    /// Load the manifest from the source root; a missing file means no
    /// extra exclusions, a malformed one is an error.
    pub fn load<R: Runtime>(runtime: &R, source_root: &Path) -> Result<Self> {
        let path = source_root.join(MANIFEST_FILENAME);
        if !runtime.exists(&path) {
            return Ok(Self::default());
        }
        let raw = runtime.read_to_string(&path)?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Malformed relocation manifest {:?}", path))
    }

    fn patterns(&self) -> Result<Vec<Pattern>> {
        self.exclude
            .iter()
            .map(|pattern| {
                Pattern::new(pattern)
                    .with_context(|| format!("Invalid exclusion pattern {:?} in manifest", pattern))
            })
            .collect()
    }
}

/// Copy every file and directory under `source` into `dest`, excluding the
/// relocation bookkeeping files and anything matched by the manifest found
/// at the source root. The source tree is left intact.
#[tracing::instrument(skip(runtime))]
pub fn copy_tree<R: Runtime>(runtime: &R, source: &Path, dest: &Path) -> Result<()> {
    let manifest = MoveManifest::load(runtime, source)?;
    let patterns = manifest.patterns()?;

    runtime.create_dir_all(dest)?;
    copy_dir(runtime, source, dest, source, &patterns)
}

fn copy_dir<R: Runtime>(
    runtime: &R,
    source_root: &Path,
    dest_root: &Path,
    dir: &Path,
    patterns: &[Pattern],
) -> Result<()> {
    for entry in runtime.read_dir(dir)? {
        let relative = entry.strip_prefix(source_root).with_context(|| {
            format!("Directory entry {:?} is not under the copy root {:?}", entry, source_root)
        })?;

        if is_excluded(relative, patterns) {
            debug!("Skipping {:?} (excluded from tree copy)", relative);
            continue;
        }

        let target = dest_root.join(relative);
        if runtime.is_dir(&entry) {
            runtime.create_dir_all(&target)?;
            copy_dir(runtime, source_root, dest_root, &entry, patterns)?;
        } else {
            runtime.copy(&entry, &target)?;
        }
    }
    Ok(())
}

fn is_excluded(relative: &Path, patterns: &[Pattern]) -> bool {
    if let Some(name) = relative.file_name() {
        if name == MANIFEST_FILENAME || name == LOCK_FILENAME {
            return true;
        }
    }
    patterns.iter().any(|pattern| pattern.matches_path(relative))
}
