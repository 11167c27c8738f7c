//! Boundary to the external Terraform binary.
//!
//! Everything the pipeline needs from Terraform goes through here: the
//! version banner for the compatibility gate, and per-module remote-state
//! pull/push. The state operations are behind the [`StateBackend`] trait so
//! the relocation pipeline can be exercised without a real backend.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

/// Remote-state transfer for a single module, staged through a local file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Pull the module's remote state into `module_dir/statefile_name`.
    async fn state_pull(&self, module_dir: &Path, statefile_name: &str) -> Result<()>;

    /// Push `module_dir/statefile_name` to the module's remote backend.
    async fn state_push(&self, module_dir: &Path, statefile_name: &str) -> Result<()>;
}

/// Thin wrapper around the terraform binary.
pub struct TerraformCli {
    binary: PathBuf,
}

impl TerraformCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run `terraform version` and return the first line of its output.
    #[tracing::instrument(skip(self))]
    pub async fn version_banner(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("version")
            .output()
            .await
            .with_context(|| format!("Failed to run {:?} version", self.binary))?;
        check_status(&output, || format!("{:?} version", self.binary))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl StateBackend for TerraformCli {
    #[tracing::instrument(skip(self))]
    async fn state_pull(&self, module_dir: &Path, statefile_name: &str) -> Result<()> {
        debug!("Pulling state in {:?}", module_dir);
        let output = Command::new(&self.binary)
            .args(["state", "pull"])
            .current_dir(module_dir)
            .output()
            .await
            .with_context(|| {
                format!("Failed to run {:?} state pull in {:?}", self.binary, module_dir)
            })?;
        check_status(&output, || format!("state pull in {:?}", module_dir))?;

        let statefile = module_dir.join(statefile_name);
        tokio::fs::write(&statefile, &output.stdout)
            .await
            .with_context(|| format!("Failed to write pulled state to {:?}", statefile))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn state_push(&self, module_dir: &Path, statefile_name: &str) -> Result<()> {
        debug!("Pushing state in {:?}", module_dir);
        let output = Command::new(&self.binary)
            .args(["state", "push", statefile_name])
            .current_dir(module_dir)
            .output()
            .await
            .with_context(|| {
                format!("Failed to run {:?} state push in {:?}", self.binary, module_dir)
            })?;
        check_status(&output, || format!("state push in {:?}", module_dir))
    }
}

fn check_status(output: &Output, operation: impl Fn() -> String) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    bail!(
        "{} exited with {}: {}",
        operation(),
        output.status,
        stderr.trim()
    );
}
