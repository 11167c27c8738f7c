use anyhow::Result;

use super::ensure_terraform_version;
use crate::options::RunOptions;
use crate::terraform::TerraformCli;

/// Run the version gate on its own and report the outcome.
#[tracing::instrument(skip(options))]
pub async fn check(options: &RunOptions, constraint: &str) -> Result<()> {
    let terraform = TerraformCli::new(&options.terraform_path);
    let version = ensure_terraform_version(&terraform, constraint).await?;
    println!("Terraform {} satisfies {}", version, constraint);
    Ok(())
}
