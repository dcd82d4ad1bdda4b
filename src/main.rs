use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
struct Args {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    command: FolioCommand,
}

#[derive(Parser)]
struct InitArgs {
    /// The path to initialize the project in
    path: PathBuf,

    /// Whether to create the directory if it doesn't exist
    #[arg(short, long, default_value = "false")]
    create: bool,
}

#[derive(Parser)]
struct BuildArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = "folio.yaml")]
    config_file: Option<PathBuf>,

    /// Include drafts in the build
    #[arg(long, default_value = "false")]
    drafts: bool,
}

#[derive(Parser)]
struct CleanArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = "folio.yaml")]
    config_file: Option<PathBuf>,

    /// Only print what would be deleted
    #[arg(short = 'n', long, default_value = "false")]
    dry_run: bool,
}

#[derive(Parser)]
struct CheckArgs {
    /// The filter expression to check
    expression: String,

    /// Also list the content items the expression matches
    #[arg(short, long, default_value = "false")]
    matches: bool,

    /// The path to the configuration file (used with --matches)
    #[arg(short, long, default_value = "folio.yaml")]
    config_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum FolioCommand {
    /// Initialize a new folio project
    Init(InitArgs),

    /// Build the site
    Build(BuildArgs),

    /// Delete build output and cached feeds
    Clean(CleanArgs),

    /// Parse a filter expression and report syntax errors
    Check(CheckArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "folio=debug" } else { "folio=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        FolioCommand::Init(args) => {
            commands::init::run(&args).await?;
        }
        FolioCommand::Build(args) => {
            commands::build::run(&args).await?;
        }
        FolioCommand::Clean(args) => {
            commands::clean::run(&args).await?;
        }
        FolioCommand::Check(args) => {
            commands::check::run(&args)?;
        }
    }

    Ok(())
}
