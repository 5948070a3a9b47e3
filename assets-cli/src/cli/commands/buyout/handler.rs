//! Buyout command handler

use anyhow::{Context, Result};
use chrono::Local;
use colored::*;
use log::warn;
use serde::Serialize;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use super::BuyoutArgs;
use crate::api::{AssetObject, AssetRef, SchemaRegistry};
use crate::cli::commands::{Session, refs_for, report_batch, spawn_cancel_watch, spawn_progress_printer};
use crate::operations::UpdateItem;
use crate::services::buyout::{self, BuyoutQuote};

#[derive(Serialize)]
struct QuotedAsset {
    id: String,
    key: String,
    #[serde(flatten)]
    quote: BuyoutQuote,
}

pub async fn handle_buyout_command(session: &Session, args: BuyoutArgs) -> Result<ExitCode> {
    let objects = fetch_objects(session, &args).await?;
    if objects.is_empty() {
        println!("{}", "No objects to quote".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    let assets = refs_for(&objects);
    let schemas = session.schemas_for(&assets).await;
    let today = Local::now().date_naive();

    let mut quoted = Vec::new();
    let mut errors = 0;
    for (object, asset) in objects.iter().filter_map(|o| o.asset_ref().ok().map(|a| (o, a))) {
        let Some(schema) = schemas.get(asset.object_type()) else {
            errors += 1;
            eprintln!(
                "{} {}: no schema for object type {}",
                "Error:".red().bold(),
                object.display_key(),
                asset.object_type()
            );
            continue;
        };
        match buyout::quote_for(object, schema, &session.config.buyout, today) {
            Ok(Some(quote)) => quoted.push((asset, object, quote)),
            Ok(None) => warn!("{} has no original cost, skipping", object.display_key()),
            Err(e) => {
                errors += 1;
                eprintln!("{} {}: {}", "Error:".red().bold(), object.display_key(), e);
            }
        }
    }

    if args.json {
        let rows: Vec<QuotedAsset> = quoted
            .iter()
            .map(|(_, object, quote)| QuotedAsset {
                id: object.id.clone(),
                key: object.display_key().to_string(),
                quote: quote.clone(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_quotes(&quoted);
    }

    if !args.apply {
        return Ok(if errors > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS });
    }

    let items: Vec<UpdateItem> = quoted
        .iter()
        .map(|(asset, _, quote)| UpdateItem::new(*asset, quote.to_changes(&session.config.buyout)))
        .filter(|item| !item.changes.is_empty())
        .collect();
    if items.is_empty() {
        println!("{}", "Nothing to write back".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    let status = apply_quotes(session, schemas, items).await;
    Ok(if errors > 0 { ExitCode::FAILURE } else { status })
}

async fn fetch_objects(session: &Session, args: &BuyoutArgs) -> Result<Vec<AssetObject>> {
    if let Some(aql) = &args.aql {
        return session
            .client
            .search_all(aql, args.page_size, args.limit)
            .await
            .context("AQL search failed");
    }

    let id = args.id.context("an object ID or --aql is required")?;
    match session.client.get_object(id).await? {
        Some(object) => Ok(vec![object]),
        None => anyhow::bail!("object {} not found", id),
    }
}

fn print_quotes(quoted: &[(AssetRef, &AssetObject, BuyoutQuote)]) {
    if quoted.is_empty() {
        println!("{}", "No quotes computed".yellow());
        return;
    }

    println!(
        "{:<14} {:<10} {:>6} {:>12} {:>8} {:>12}",
        "KEY".bold(),
        "DEVICE".bold(),
        "AGE".bold(),
        "WITH VAT".bold(),
        "RATE".bold(),
        "BUYOUT".bold()
    );
    for (_, object, quote) in quoted {
        println!(
            "{:<14} {:<10} {:>6} {:>12} {:>8} {:>12}",
            object.display_key(),
            quote.device_type.as_str(),
            format!("{}m", quote.age_months),
            quote.cost_with_vat.to_string(),
            quote.depreciation_rate.to_string(),
            quote.buyout_price.to_string().bright_green()
        );
    }
}

async fn apply_quotes(session: &Session, schemas: SchemaRegistry, items: Vec<UpdateItem>) -> ExitCode {
    println!();
    println!("Writing {} quotes back", items.len().to_string().bright_cyan());

    let cancel = CancellationToken::new();
    let watch = spawn_cancel_watch(cancel.clone(), None);
    let (progress, printer) = spawn_progress_printer();

    let coordinator = session
        .coordinator(schemas)
        .with_cancellation(cancel.clone())
        .with_progress(progress);
    let result = coordinator.run_batch(items, session.workers()).await;

    drop(coordinator);
    let _ = printer.await;
    cancel.cancel();
    let _ = watch.await;

    report_batch(&result)
}
