//! Mass-update command

pub mod handler;

use clap::Args;

pub use handler::handle_mass_update_command;

use crate::api::client::DEFAULT_PAGE_SIZE;

#[derive(Args, Debug)]
pub struct MassUpdateArgs {
    /// Comma-separated object IDs (all of one object type)
    #[arg(
        long,
        value_delimiter = ',',
        required_unless_present = "aql",
        conflicts_with = "aql",
        requires = "object_type"
    )]
    pub ids: Vec<u64>,

    /// Object type ID shared by --ids
    #[arg(long = "type", value_name = "OBJECT_TYPE")]
    pub object_type: Option<u64>,

    /// Select the objects with an AQL query instead of --ids
    #[arg(long)]
    pub aql: Option<String>,

    /// Stop after this many search results (with --aql)
    #[arg(long, requires = "aql")]
    pub limit: Option<usize>,

    /// Attribute assignment; repeat for several attributes
    #[arg(long = "set", value_name = "NAME=VALUE", required = true)]
    pub set: Vec<String>,

    /// Concurrent update workers (1-50)
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Stop starting new items after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Validate the changes against each object type without updating
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, hide = true)]
    pub page_size: usize,
}
