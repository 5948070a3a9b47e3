//! Command handlers and the helpers they share

pub mod assets;
pub mod buyout;
pub mod mass_update;

use anyhow::Result;
use colored::*;
use log::warn;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::transport::DEFAULT_REQUEST_TIMEOUT;
use crate::api::{AssetObject, AssetRef, AssetsClient, HttpTransport, RequestExecutor, SchemaRegistry};
use crate::config::Config;
use crate::operations::{
    BatchResult, MassUpdateCoordinator, OutcomeKind, ProgressEvent, ProgressSender,
};

/// Loaded configuration plus a client wired to it
pub struct Session {
    pub config: Config,
    pub client: AssetsClient,
}

impl Session {
    pub fn connect(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(DEFAULT_REQUEST_TIMEOUT)?;
        let executor = RequestExecutor::new(
            Arc::new(transport),
            config.credentials.clone(),
            &config.resilience,
        );
        Ok(Self {
            client: AssetsClient::new(Arc::new(executor)),
            config,
        })
    }

    pub fn coordinator(&self, schemas: SchemaRegistry) -> MassUpdateCoordinator {
        MassUpdateCoordinator::new(Arc::clone(self.client.executor()), schemas)
    }

    /// Worker count from flags or config
    pub fn workers(&self) -> usize {
        self.config.resilience.concurrency.workers
    }

    /// Fetch schemas for every object type among `assets`
    pub async fn schemas_for(&self, assets: &[AssetRef]) -> SchemaRegistry {
        self.client
            .load_schemas(assets.iter().map(AssetRef::object_type))
            .await
    }
}

/// Object references for search results, skipping any the API returned malformed
pub fn refs_for(objects: &[AssetObject]) -> Vec<AssetRef> {
    objects
        .iter()
        .filter_map(|object| match object.asset_ref() {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!("Ignoring object '{}': {}", object.id, e);
                None
            }
        })
        .collect()
}

/// Print one line per completed item until the sender side closes
pub fn spawn_progress_printer() -> (ProgressSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let position = format!("[{}/{}]", event.index + 1, event.total).dimmed();
            let status = match event.outcome {
                OutcomeKind::Updated => "updated".green(),
                OutcomeKind::Skipped => "skipped".yellow(),
                OutcomeKind::Failed => "failed".red(),
            };
            match event.detail {
                Some(detail) => println!("{} #{} {}: {}", position, event.asset_id, status, detail),
                None if event.attempts > 1 => println!(
                    "{} #{} {} after {} attempts",
                    position, event.asset_id, status, event.attempts
                ),
                None => println!("{} #{} {}", position, event.asset_id, status),
            }
        }
    });
    (tx, handle)
}

/// Cancel `cancel` on Ctrl-C or once `timeout` elapses
pub fn spawn_cancel_watch(cancel: CancellationToken, timeout: Option<Duration>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, skipping items that have not started");
            }
            _ = deadline => {
                warn!("Timeout reached, skipping items that have not started");
            }
        }
        cancel.cancel();
    })
}

/// Print failures, skips and totals; exit status 1 when anything failed
pub fn report_batch(result: &BatchResult) -> ExitCode {
    let summary = result.summary();

    let failures: Vec<_> = result.failures().collect();
    if !failures.is_empty() {
        println!();
        println!("{}", "Failures:".red().bold());
        for (asset, failure) in failures {
            println!("  #{} {}", asset.id(), failure);
        }
    }

    let skipped: Vec<_> = result.skipped().collect();
    if !skipped.is_empty() {
        println!();
        println!("{}", "Skipped:".yellow().bold());
        for (asset, reason) in skipped {
            println!("  #{} {}", asset.id(), reason);
        }
    }

    println!();
    println!(
        "{} {} updated, {} skipped, {} failed ({} total)",
        "Summary:".bold(),
        summary.updated.to_string().green(),
        summary.skipped.to_string().yellow(),
        summary.failed.to_string().red(),
        summary.total()
    );

    if result.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
