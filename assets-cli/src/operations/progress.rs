//! Progress events emitted as batch items complete

use tokio::sync::mpsc::UnboundedSender;

use super::outcome::OutcomeKind;

/// One completed item. Events arrive in completion order, not input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Position of the item in the submitted batch
    pub index: usize,
    pub total: usize,
    pub asset_id: u64,
    pub outcome: OutcomeKind,
    pub attempts: u32,
    /// Skip reason or failure text, when there is one
    pub detail: Option<String>,
}

pub type ProgressSender = UnboundedSender<ProgressEvent>;
