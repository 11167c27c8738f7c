//! Stack discovery: locate every module configuration root under a
//! directory.

use anyhow::{Context, Result, bail};
use log::debug;
use std::path::{Path, PathBuf};

use super::{Module, Stack};
use crate::options::CONFIG_FILENAME;
use crate::runtime::Runtime;

/// Recursively walk `root` and build a [`Stack`] with one [`Module`] per
/// directory (including `root` itself) that directly contains a
/// configuration file.
///
/// Traversal errors propagate as discovery failure; finding zero modules
/// does not (an empty stack is valid). The module list is sorted by path so
/// discovery is deterministic.
#[tracing::instrument(skip(runtime))]
pub fn find_stack<R: Runtime>(runtime: &R, root: &Path) -> Result<Stack> {
    if !runtime.is_dir(root) {
        bail!("Stack root {:?} does not exist or is not a directory", root);
    }

    let mut module_dirs = Vec::new();
    collect_module_dirs(runtime, root, &mut module_dirs)?;
    module_dirs.sort();

    debug!("Discovered {} module(s) under {:?}", module_dirs.len(), root);
    Ok(Stack::new(
        root,
        module_dirs.into_iter().map(Module::new).collect(),
    ))
}

fn collect_module_dirs<R: Runtime>(
    runtime: &R,
    dir: &Path,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    if runtime.exists(&dir.join(CONFIG_FILENAME)) {
        out.push(dir.to_path_buf());
    }

    let entries = runtime
        .read_dir(dir)
        .with_context(|| format!("Failed to traverse {:?} during stack discovery", dir))?;
    for entry in entries {
        if runtime.is_dir(&entry) {
            collect_module_dirs(runtime, &entry, out)?;
        }
    }
    Ok(())
}
