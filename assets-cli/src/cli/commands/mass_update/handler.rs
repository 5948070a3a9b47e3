//! Mass-update command handler

use anyhow::{Context, Result};
use colored::*;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::MassUpdateArgs;
use crate::api::{AssetRef, SchemaRegistry};
use crate::cli::commands::{Session, refs_for, report_batch, spawn_cancel_watch, spawn_progress_printer};
use crate::operations::AttributeChange;

pub async fn handle_mass_update_command(session: &Session, args: MassUpdateArgs) -> Result<ExitCode> {
    let changes = AttributeChange::from_assignments(&args.set)?;
    let assets = resolve_targets(session, &args).await?;

    if assets.is_empty() {
        println!("{}", "No objects to update".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    let schemas = session.schemas_for(&assets).await;

    if args.dry_run {
        return Ok(dry_run(&assets, &changes, &schemas));
    }

    let workers = session.workers();
    println!(
        "Updating {} objects with {} workers",
        assets.len().to_string().bright_cyan(),
        workers.min(assets.len())
    );

    let cancel = CancellationToken::new();
    let watch = spawn_cancel_watch(cancel.clone(), args.timeout.map(Duration::from_secs));
    let (progress, printer) = spawn_progress_printer();

    let coordinator = session
        .coordinator(schemas)
        .with_cancellation(cancel.clone())
        .with_progress(progress);
    let result = coordinator.mass_update(&assets, &changes, workers).await?;

    // Closing the sender lets the printer drain and exit
    drop(coordinator);
    let _ = printer.await;
    cancel.cancel();
    let _ = watch.await;

    Ok(report_batch(&result))
}

async fn resolve_targets(session: &Session, args: &MassUpdateArgs) -> Result<Vec<AssetRef>> {
    if let Some(aql) = &args.aql {
        let objects = session
            .client
            .search_all(aql, args.page_size, args.limit)
            .await
            .context("AQL search failed")?;
        return Ok(refs_for(&objects));
    }

    let object_type = args
        .object_type
        .context("--type is required with --ids")?;
    args.ids
        .iter()
        .map(|id| AssetRef::new(*id, object_type).map_err(Into::into))
        .collect()
}

/// Validate every item and print what would change
fn dry_run(assets: &[AssetRef], changes: &AttributeChange, schemas: &SchemaRegistry) -> ExitCode {
    let mut invalid = 0;

    for asset in assets {
        let verdict = match schemas.get(asset.object_type()) {
            None => Err(format!("no schema for object type {}", asset.object_type())),
            Some(schema) => changes.resolve(schema).map_err(|e| e.to_string()),
        };
        match verdict {
            Ok(attributes) => println!(
                "#{} {} ({} attributes)",
                asset.id(),
                "would update".green(),
                attributes.len()
            ),
            Err(reason) => {
                invalid += 1;
                println!("#{} {}: {}", asset.id(), "invalid".red(), reason);
            }
        }
    }

    println!();
    println!(
        "{} {} valid, {} invalid (dry run, nothing was changed)",
        "Summary:".bold(),
        (assets.len() - invalid).to_string().green(),
        invalid.to_string().red()
    );

    if invalid > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
