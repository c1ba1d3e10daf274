pub mod cli;
pub mod core;
pub mod providers;

use crate::cli::project::ProjectOptions;
use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Project(ProjectOptions),
    Baseline,
    Quotes,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("yieldsim starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Project(options) => cli::project::run(&config, &options).await,
        AppCommand::Baseline => cli::baseline::run(&config).await,
        AppCommand::Quotes => cli::quotes::run(&config).await,
    }
}
