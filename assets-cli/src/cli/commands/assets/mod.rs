//! Single-object commands: get, search, update

pub mod handler;

use clap::Args;

pub use handler::{handle_get_command, handle_search_command, handle_update_command};

use crate::api::client::DEFAULT_PAGE_SIZE;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Object ID
    pub id: u64,

    /// Print the raw JSON payload
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// AQL query, e.g. 'objectType = "Laptops" AND Status = "In Use"'
    pub aql: String,

    /// Stop after this many objects
    #[arg(long)]
    pub limit: Option<usize>,

    /// Objects fetched per request
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Object ID
    pub id: u64,

    /// Object type ID of the object
    #[arg(long = "type", value_name = "OBJECT_TYPE")]
    pub object_type: u64,

    /// Attribute assignment; repeat for several attributes
    #[arg(long = "set", value_name = "NAME=VALUE", required = true)]
    pub set: Vec<String>,
}
