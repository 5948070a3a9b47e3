//! Command-line interface definitions

pub mod commands;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Overrides, Profile};
use commands::assets::{GetArgs, SearchArgs, UpdateArgs};
use commands::buyout::BuyoutArgs;
use commands::mass_update::MassUpdateArgs;

#[derive(Parser)]
#[command(name = "assets-cli")]
#[command(about = "Query and bulk-update Jira Service Management Assets")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to <config dir>/jira-assets/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write log output to a file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Retry and concurrency preset
    #[arg(long, global = true, value_enum, default_value_t)]
    pub profile: Profile,

    /// Retries per request after the first attempt
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// First backoff delay in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub initial_delay_ms: Option<u64>,

    /// Longest backoff delay in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub max_delay_ms: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show one object
    Get(GetArgs),
    /// Run an AQL search
    Search(SearchArgs),
    /// Update attributes on one object
    Update(UpdateArgs),
    /// Apply the same attribute changes to many objects
    MassUpdate(MassUpdateArgs),
    /// Compute device buyout prices, optionally writing them back
    Buyout(BuyoutArgs),
}

impl Cli {
    /// Config overrides taken from global and per-command flags
    pub fn overrides(&self) -> Overrides {
        let workers = match &self.command {
            Commands::MassUpdate(args) => args.workers,
            Commands::Buyout(args) => args.workers,
            _ => None,
        };
        Overrides {
            profile: self.profile,
            workers,
            max_retries: self.max_retries,
            initial_delay_ms: self.initial_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }
}
