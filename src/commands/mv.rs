use anyhow::Result;
use log::info;

use super::ensure_terraform_version;
use crate::options::RunOptions;
use crate::runtime::Runtime;
use crate::stack::mv::mv_all;
use crate::terraform::TerraformCli;

/// Gate on the Terraform version, then run the relocation pipeline.
#[tracing::instrument(skip(runtime, options))]
pub async fn mv<R: Runtime>(runtime: &R, options: &RunOptions, constraint: &str) -> Result<()> {
    let terraform = TerraformCli::new(&options.terraform_path);
    ensure_terraform_version(&terraform, constraint).await?;

    mv_all(runtime, &terraform, options).await?;

    let destination = options.destination.as_deref().unwrap_or_default();
    info!(
        "Relocated stack from {:?} to sibling {:?}",
        options.working_dir, destination
    );
    println!(
        "Relocated {} to sibling {:?}",
        options.working_dir.display(),
        destination
    );
    Ok(())
}
