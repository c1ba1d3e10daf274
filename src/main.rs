use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use yieldsim::cli::project::{AllocationOverride, ProjectOptions};
use yieldsim::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Project the blended APY of the reserve
    Project {
        /// Boost multiplier, replacing the configured one
        #[arg(short, long)]
        boost: Option<f64>,

        /// Allocation edit as ASSET:STRATEGY=FRACTION, may be repeated
        #[arg(short, long = "alloc", value_name = "ASSET:STRATEGY=FRACTION")]
        alloc: Vec<AllocationOverride>,

        /// Print the projection as JSON
        #[arg(long)]
        json: bool,
    },
    /// Display holdings and the baseline allocation they imply
    Baseline,
    /// Display normalized venue quotes
    Quotes,
}

impl From<Commands> for yieldsim::AppCommand {
    fn from(cmd: Commands) -> yieldsim::AppCommand {
        match cmd {
            Commands::Project { boost, alloc, json } => {
                yieldsim::AppCommand::Project(ProjectOptions {
                    boost,
                    overrides: alloc,
                    json,
                })
            }
            Commands::Baseline => yieldsim::AppCommand::Baseline,
            Commands::Quotes => yieldsim::AppCommand::Quotes,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => yieldsim::cli::setup::setup_at_path(path),
            None => yieldsim::cli::setup::setup(),
        },
        Some(cmd) => yieldsim::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
