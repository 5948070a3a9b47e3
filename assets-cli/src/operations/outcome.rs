//! Per-item outcomes of a mass update

use serde::Serialize;
use std::fmt;

use crate::api::models::AssetRef;
use crate::api::resilience::RequestFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The change set does not fit the asset's object type
    Validation(String),
    /// No schema was loaded for the asset's object type
    UnknownObjectType(u64),
    /// The batch was cancelled before or while this item ran
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Validation(reason) => write!(f, "validation failed: {}", reason),
            SkipReason::UnknownObjectType(t) => write!(f, "no schema for object type {}", t),
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Updated,
    Skipped(SkipReason),
    Failed(RequestFailure),
}

impl ItemOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ItemOutcome::Updated => OutcomeKind::Updated,
            ItemOutcome::Skipped(_) => OutcomeKind::Skipped,
            ItemOutcome::Failed(_) => OutcomeKind::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OutcomeKind {
    Updated,
    Skipped,
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Updated => write!(f, "updated"),
            OutcomeKind::Skipped => write!(f, "skipped"),
            OutcomeKind::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal outcome for one submitted asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub asset: AssetRef,
    pub outcome: ItemOutcome,
    /// HTTP attempts made; zero when the item never reached the executor
    pub attempts: u32,
}

/// Outcomes in submission order: entry `i` belongs to input `i`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    entries: Vec<BatchEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.updated + self.skipped + self.failed
    }
}

impl BatchResult {
    pub(crate) fn from_entries(entries: Vec<BatchEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for entry in &self.entries {
            match entry.outcome {
                ItemOutcome::Updated => summary.updated += 1,
                ItemOutcome::Skipped(_) => summary.skipped += 1,
                ItemOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.outcome, ItemOutcome::Failed(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&AssetRef, &RequestFailure)> {
        self.entries.iter().filter_map(|e| match &e.outcome {
            ItemOutcome::Failed(failure) => Some((&e.asset, failure)),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&AssetRef, &SkipReason)> {
        self.entries.iter().filter_map(|e| match &e.outcome {
            ItemOutcome::Skipped(reason) => Some((&e.asset, reason)),
            _ => None,
        })
    }
}
