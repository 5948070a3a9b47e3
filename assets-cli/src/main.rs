mod api;
mod cli;
mod config;
mod operations;
mod services;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug};
use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;

use cli::commands::{Session, assets, buyout, mass_update};
use cli::{Cli, Commands};
use config::Config;

fn init_logging(default_level: LevelFilter, verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let level = match verbose {
        0 => default_level,
        1 => default_level.max(LevelFilter::Info),
        _ => default_level.max(LevelFilter::Debug),
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
        builder.write_style(env_logger::WriteStyle::Never);
    }

    builder.try_init().context("Failed to initialise logging")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref(), &cli.overrides())?;
    init_logging(
        config.resilience.monitoring.log_level.to_level_filter(),
        cli.verbose,
        cli.log_file.as_deref(),
    )?;

    if let Some(path) = &config.config_file {
        debug!("Using config file {}", path.display());
    }
    debug!("Using Assets API at {}", config.credentials.base_url());
    if let Some(site) = &config.site_url {
        debug!("Jira site: {}", site);
    }

    let session = Session::connect(config)?;

    match cli.command {
        Commands::Get(args) => assets::handle_get_command(&session, args).await,
        Commands::Search(args) => assets::handle_search_command(&session, args).await,
        Commands::Update(args) => assets::handle_update_command(&session, args).await,
        Commands::MassUpdate(args) => mass_update::handle_mass_update_command(&session, args).await,
        Commands::Buyout(args) => buyout::handle_buyout_command(&session, args).await,
    }
}
