use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tfstack::options::{DEFAULT_TERRAFORM_CONSTRAINT, RunOptions};
use tfstack::runtime::RealRuntime;

/// tfstack - Terraform stack orchestration
///
/// Discover a tree of Terraform module configurations and relocate it,
/// together with each module's remote state, to a sibling environment.
///
/// Every command that invokes Terraform first checks the installed version
/// against the required constraint.
#[derive(Parser, Debug)]
#[command(author, version = env!("TFSTACK_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Working directory containing the stack (defaults to the current directory)
    #[arg(long = "working-dir", value_name = "PATH", global = true)]
    working_dir: Option<PathBuf>,

    /// Root module configuration file (defaults to <working-dir>/tfstack.hcl)
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,

    /// Cache directory for downloaded artifacts (also via TFSTACK_DOWNLOAD_DIR)
    #[arg(
        long = "download-dir",
        env = "TFSTACK_DOWNLOAD_DIR",
        value_name = "PATH",
        global = true
    )]
    download_dir: Option<PathBuf>,

    /// Terraform binary to invoke (also via TFSTACK_TFPATH)
    #[arg(
        long = "terraform-path",
        env = "TFSTACK_TFPATH",
        value_name = "PATH",
        global = true,
        default_value = "terraform"
    )]
    terraform_path: PathBuf,

    /// Required Terraform version constraint (also via TFSTACK_TF_CONSTRAINT)
    #[arg(
        long = "constraint",
        env = "TFSTACK_TF_CONSTRAINT",
        value_name = "CONSTRAINT",
        global = true,
        default_value = DEFAULT_TERRAFORM_CONSTRAINT
    )]
    constraint: String,

    /// Maximum number of concurrent per-module state operations
    #[arg(long = "jobs", value_name = "N", global = true, default_value_t = 4)]
    jobs: usize,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Relocate the stack and its remote state to a sibling directory
    Mv(MvArgs),

    /// List the modules discovered under the working directory
    List,

    /// Check the installed Terraform against the version constraint
    Check,
}

#[derive(clap::Args, Debug)]
struct MvArgs {
    /// Name of the destination directory (a sibling of the working directory)
    #[arg(long = "to", value_name = "NAME")]
    to: String,

    /// Relocate even if the destination directory already exists
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;

    let mut options = RunOptions::new(&runtime, cli.working_dir, cli.config_path, cli.download_dir)?;
    options.terraform_path = cli.terraform_path;
    options.jobs = cli.jobs;

    match cli.command {
        Commands::Mv(args) => {
            options.destination = Some(args.to);
            options.force = args.force;
            tfstack::commands::mv(&runtime, &options, &cli.constraint).await?
        }
        Commands::List => tfstack::commands::list(&runtime, &options)?,
        Commands::Check => tfstack::commands::check(&options, &cli.constraint).await?,
    }
    Ok(())
}
