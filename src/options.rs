//! Per-run configuration context.
//!
//! `RunOptions` carries the resolved paths and knobs for one invocation.
//! Commands derive new contexts from it (notably the relocation destination
//! context) by cloning, never by mutating a shared instance.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use crate::runtime::path::normalize_path;
use crate::runtime::{Runtime, is_path_under};

/// Well-known filename marking a directory as a module configuration root.
pub const CONFIG_FILENAME: &str = "tfstack.hcl";

/// Minimum Terraform version the pipeline is known to work with.
pub const DEFAULT_TERRAFORM_CONSTRAINT: &str = ">= 0.9.3";

/// Default bound on concurrent per-module state operations.
pub const DEFAULT_JOBS: usize = 4;

/// Resolved options for one run.
///
/// Invariant: `config_path` is always under `working_dir`; `RunOptions::new`
/// rejects anything else, so only a hand-constructed instance can violate it.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Absolute path of the directory the stack is rooted at.
    pub working_dir: PathBuf,
    /// Absolute path of the root module configuration file.
    pub config_path: PathBuf,
    /// Directory used for downloaded/cached artifacts.
    pub download_dir: PathBuf,
    /// Path or name of the terraform binary to invoke.
    pub terraform_path: PathBuf,
    /// Relocation destination name (sibling directory of `working_dir`).
    pub destination: Option<String>,
    /// Bound on concurrent per-module state operations.
    pub jobs: usize,
    /// Allow relocating into a destination directory that already exists.
    pub force: bool,
}

impl RunOptions {
    /// Resolve options from optional CLI inputs.
    ///
    /// The working directory defaults to the current directory and is
    /// canonicalized; the config path defaults to
    /// `<working_dir>/tfstack.hcl` and must resolve to a path under the
    /// working directory.
    pub fn new<R: Runtime>(
        runtime: &R,
        working_dir: Option<PathBuf>,
        config_path: Option<PathBuf>,
        download_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let working_dir = match working_dir {
            Some(dir) => runtime
                .canonicalize(&dir)
                .with_context(|| format!("Working directory {:?} is not accessible", dir))?,
            None => runtime.current_dir()?,
        };

        let config_path = match config_path {
            Some(path) => {
                let absolute = if path.is_absolute() {
                    path
                } else {
                    working_dir.join(path)
                };
                normalize_path(&absolute)
            }
            None => working_dir.join(CONFIG_FILENAME),
        };

        if !is_path_under(&config_path, &working_dir) {
            bail!(
                "Configuration file {:?} must live under the working directory {:?}",
                config_path,
                working_dir
            );
        }

        let download_dir = download_dir.unwrap_or_else(|| match runtime.home_dir() {
            Some(home) => home.join(".tfstack").join("cache"),
            None => working_dir.join(".tfstack-cache"),
        });

        Ok(Self {
            working_dir,
            config_path,
            download_dir,
            terraform_path: PathBuf::from("terraform"),
            destination: None,
            jobs: DEFAULT_JOBS,
            force: false,
        })
    }

    /// Derive the destination context for a relocation.
    ///
    /// The destination working directory is the sibling of the working
    /// directory named `destination_name`. The config path is rebuilt from
    /// its component suffix relative to the source working directory, so a
    /// working-directory string recurring deeper in the path cannot corrupt
    /// the result. Every other field is cloned verbatim. No I/O.
    pub fn for_destination(&self, destination_name: &str) -> Result<Self> {
        if destination_name.is_empty()
            || destination_name == "."
            || destination_name == ".."
            || destination_name.contains(['/', '\\'])
        {
            bail!(
                "Destination name {:?} must be a plain directory name",
                destination_name
            );
        }

        let parent = self.working_dir.parent().with_context(|| {
            format!(
                "Working directory {:?} has no parent to place {:?} next to",
                self.working_dir, destination_name
            )
        })?;
        let destination_dir = normalize_path(&parent.join(destination_name));

        let relative_config = self
            .config_path
            .strip_prefix(&self.working_dir)
            .with_context(|| {
                format!(
                    "Configuration file {:?} is not under the working directory {:?}",
                    self.config_path, self.working_dir
                )
            })?;

        let mut target = self.clone();
        target.config_path = destination_dir.join(relative_config);
        target.working_dir = destination_dir;
        Ok(target)
    }
}
