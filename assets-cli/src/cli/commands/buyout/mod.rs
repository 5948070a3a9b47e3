//! Buyout command

pub mod handler;

use clap::Args;

pub use handler::handle_buyout_command;

use crate::api::client::DEFAULT_PAGE_SIZE;

#[derive(Args, Debug)]
pub struct BuyoutArgs {
    /// Object ID to quote
    #[arg(required_unless_present = "aql", conflicts_with = "aql")]
    pub id: Option<u64>,

    /// Quote every object matching an AQL query
    #[arg(long)]
    pub aql: Option<String>,

    /// Stop after this many search results (with --aql)
    #[arg(long, requires = "aql")]
    pub limit: Option<usize>,

    /// Write the computed fields back to each object
    #[arg(long)]
    pub apply: bool,

    /// Concurrent update workers for --apply (1-50)
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Print quotes as JSON
    #[arg(long)]
    pub json: bool,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, hide = true)]
    pub page_size: usize,
}
