//! Mass-update coordinator
//!
//! Applies attribute changes to many assets through a fixed pool of worker
//! tasks. Workers claim items from a shared cursor, validate the change set
//! against the asset's schema, and send the update through the shared
//! [`RequestExecutor`]. Every submitted item ends with exactly one outcome,
//! stored in its own slot so the result keeps submission order.

use futures::future::join_all;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::changes::AttributeChange;
use super::outcome::{BatchEntry, BatchResult, ItemOutcome, SkipReason};
use super::progress::{ProgressEvent, ProgressSender};
use crate::api::client::update_object_request;
use crate::api::models::AssetRef;
use crate::api::resilience::{
    ConcurrencyConfig, FailureKind, RequestExecutor, RequestFailure, RequestOutcome,
};
use crate::api::schema::SchemaRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MassUpdateError {
    #[error("no attribute changes given")]
    EmptyChangeSet,
}

/// One asset together with the changes to apply to it
#[derive(Debug, Clone)]
pub struct UpdateItem {
    pub asset: AssetRef,
    pub changes: AttributeChange,
}

impl UpdateItem {
    pub fn new(asset: AssetRef, changes: AttributeChange) -> Self {
        Self { asset, changes }
    }
}

pub struct MassUpdateCoordinator {
    executor: Arc<RequestExecutor>,
    schemas: Arc<SchemaRegistry>,
    cancel: CancellationToken,
    progress: Option<ProgressSender>,
}

/// State shared by the workers of one batch
struct BatchState {
    items: Vec<UpdateItem>,
    slots: Vec<OnceLock<BatchEntry>>,
    cursor: AtomicUsize,
    executor: Arc<RequestExecutor>,
    schemas: Arc<SchemaRegistry>,
    cancel: CancellationToken,
    progress: Option<ProgressSender>,
}

impl MassUpdateCoordinator {
    pub fn new(executor: Arc<RequestExecutor>, schemas: SchemaRegistry) -> Self {
        Self {
            executor,
            schemas: Arc::new(schemas),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Stop the batch early when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Emit a [`ProgressEvent`] for every completed item
    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Apply one change set to every asset in `assets`
    pub async fn mass_update(
        &self,
        assets: &[AssetRef],
        changes: &AttributeChange,
        worker_count: usize,
    ) -> Result<BatchResult, MassUpdateError> {
        if changes.is_empty() {
            return Err(MassUpdateError::EmptyChangeSet);
        }

        let items = assets
            .iter()
            .map(|asset| UpdateItem::new(*asset, changes.clone()))
            .collect();
        Ok(self.run_batch(items, worker_count).await)
    }

    /// Apply per-item change sets. Returns once every item has an outcome.
    pub async fn run_batch(&self, items: Vec<UpdateItem>, worker_count: usize) -> BatchResult {
        let total = items.len();
        if total == 0 {
            return BatchResult::default();
        }

        let workers = ConcurrencyConfig::clamp_workers(worker_count).min(total);
        info!(
            "Starting batch of {} items with {} workers (up to {} retries per request)",
            total,
            workers,
            self.executor.retry_config().max_retries
        );

        let state = Arc::new(BatchState {
            slots: (0..total).map(|_| OnceLock::new()).collect(),
            items,
            cursor: AtomicUsize::new(0),
            executor: Arc::clone(&self.executor),
            schemas: Arc::clone(&self.schemas),
            cancel: self.cancel.clone(),
            progress: self.progress.clone(),
        });

        let handles: Vec<_> = (0..workers)
            .map(|worker| tokio::spawn(run_worker(worker, Arc::clone(&state))))
            .collect();

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!("Batch worker aborted: {}", e);
            }
        }

        // A worker that panicked leaves its claimed slot empty
        let entries: Vec<BatchEntry> = state
            .items
            .iter()
            .zip(&state.slots)
            .map(|(item, slot)| {
                slot.get().cloned().unwrap_or_else(|| BatchEntry {
                    asset: item.asset,
                    outcome: ItemOutcome::Failed(RequestFailure::new(
                        FailureKind::Request,
                        None,
                        "worker aborted before recording an outcome",
                    )),
                    attempts: 0,
                })
            })
            .collect();

        let stats = self.executor.limiter().stats();
        debug!(
            "Request limiter: {} permits acquired, {} waits, {} still in use",
            stats.requests_acquired,
            stats.requests_waited,
            stats.in_use()
        );

        let result = BatchResult::from_entries(entries);
        let summary = result.summary();
        info!(
            "Batch complete: {} updated, {} skipped, {} failed",
            summary.updated, summary.skipped, summary.failed
        );
        result
    }
}

async fn run_worker(worker: usize, state: Arc<BatchState>) {
    loop {
        let index = state.cursor.fetch_add(1, Ordering::SeqCst);
        let Some(item) = state.items.get(index) else {
            break;
        };

        let entry = process_item(&state, item).await;
        report(&state, index, &entry);

        if state.slots[index].set(entry).is_err() {
            error!("Outcome for batch item {} was recorded twice", index);
        }
    }
    debug!("Batch worker {} finished", worker);
}

async fn process_item(state: &BatchState, item: &UpdateItem) -> BatchEntry {
    let asset = item.asset;
    let skipped = |reason: SkipReason| BatchEntry {
        asset,
        outcome: ItemOutcome::Skipped(reason),
        attempts: 0,
    };

    if state.cancel.is_cancelled() {
        return skipped(SkipReason::Cancelled);
    }

    let Some(schema) = state.schemas.get(asset.object_type()) else {
        return skipped(SkipReason::UnknownObjectType(asset.object_type()));
    };

    let attributes = match item.changes.resolve(schema) {
        Ok(attributes) => attributes,
        Err(e) => return skipped(SkipReason::Validation(e.to_string())),
    };

    let request = update_object_request(asset, &attributes);
    let execution = state.executor.execute_traced(&request, &state.cancel).await;

    let outcome = match execution.outcome {
        RequestOutcome::Success(_) => ItemOutcome::Updated,
        RequestOutcome::Failure(failure) if failure.kind == FailureKind::Cancelled => {
            ItemOutcome::Skipped(SkipReason::Cancelled)
        }
        RequestOutcome::Failure(failure) => ItemOutcome::Failed(failure),
        RequestOutcome::RateLimited { body, .. } => ItemOutcome::Failed(RequestFailure::new(
            FailureKind::RateLimited,
            Some(429),
            body,
        )),
    };

    BatchEntry {
        asset,
        outcome,
        attempts: execution.attempts,
    }
}

fn report(state: &BatchState, index: usize, entry: &BatchEntry) {
    let id = entry.asset.id();
    let detail = match &entry.outcome {
        ItemOutcome::Updated => {
            info!("Updated asset {} ({} attempt(s))", id, entry.attempts);
            None
        }
        ItemOutcome::Skipped(reason) => {
            warn!("Skipped asset {}: {}", id, reason);
            Some(reason.to_string())
        }
        ItemOutcome::Failed(failure) => {
            warn!("Failed to update asset {}: {}", id, failure);
            Some(failure.to_string())
        }
    };

    if let Some(progress) = &state.progress {
        // The receiver may have gone away; the batch carries on regardless
        let _ = progress.send(ProgressEvent {
            index,
            total: state.items.len(),
            asset_id: id,
            outcome: entry.outcome.kind(),
            attempts: entry.attempts,
            detail,
        });
    }
}
