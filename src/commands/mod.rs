//! CLI command implementations.

mod check;
mod list;
mod mv;

pub use check::check;
pub use list::list;
pub use mv::mv;

use anyhow::Result;
use log::debug;
use semver::Version;

use crate::terraform::TerraformCli;
use crate::version::{check_version_constraint, parse_constraint, parse_version_banner};

/// Verify that the installed Terraform satisfies `constraint` before any
/// command is allowed to touch state. Returns the detected version.
async fn ensure_terraform_version(
    terraform: &TerraformCli,
    constraint: &str,
) -> Result<Version> {
    let requirement = parse_constraint(constraint)?;
    let banner = terraform.version_banner().await?;
    let version = parse_version_banner(&banner)?;
    check_version_constraint(&version, &requirement)?;
    debug!("Terraform {} satisfies {}", version, requirement);
    Ok(version)
}
