pub mod cli;
pub mod core;
pub mod providers;

use crate::cli::prices::PricesQuery;
use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::debug;

pub enum AppCommand {
    Prices(PricesQuery),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Prices(query) => cli::prices::run(&query, &config).await,
    }
}
