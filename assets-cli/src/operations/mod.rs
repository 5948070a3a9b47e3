//! Bulk update operations built on the Assets API client

pub mod changes;
pub mod mass_update;
pub mod outcome;
pub mod progress;

pub use changes::{AttributeChange, AttributeValue};
pub use mass_update::{MassUpdateCoordinator, UpdateItem};
pub use outcome::{BatchResult, OutcomeKind};
pub use progress::{ProgressEvent, ProgressSender};
