//! Jira Assets API module
//!
//! Transport, resilient request execution, object and schema models, and a
//! typed client for the Assets REST endpoints.

pub mod client;
pub mod credentials;
pub mod models;
pub mod resilience;
pub mod schema;
pub mod transport;

#[cfg(test)]
pub mod testing;

pub use client::AssetsClient;
pub use models::{AssetObject, AssetRef};
pub use resilience::RequestExecutor;
pub use schema::{ObjectTypeSchema, SchemaRegistry};
pub use transport::HttpTransport;
