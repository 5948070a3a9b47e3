//! Handlers for get, search and update

use anyhow::{Context, Result};
use colored::*;
use log::warn;
use std::process::ExitCode;

use super::{GetArgs, SearchArgs, UpdateArgs};
use crate::api::{AssetObject, AssetRef, ObjectTypeSchema};
use crate::cli::commands::Session;
use crate::operations::AttributeChange;

pub async fn handle_get_command(session: &Session, args: GetArgs) -> Result<ExitCode> {
    let Some(object) = session.client.get_object(args.id).await? else {
        eprintln!("{} object {} not found", "Error:".red().bold(), args.id);
        return Ok(ExitCode::FAILURE);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&object)?);
        return Ok(ExitCode::SUCCESS);
    }

    // Attribute names are a nicety; fall back to IDs when the schema is unavailable
    let schema = match object.asset_ref() {
        Ok(asset) => session
            .client
            .fetch_object_type_schema(asset.object_type())
            .await
            .map_err(|e| warn!("Could not load schema for object {}: {}", args.id, e))
            .ok(),
        Err(_) => None,
    };
    print_object(&object, schema.as_ref());
    Ok(ExitCode::SUCCESS)
}

fn print_object(object: &AssetObject, schema: Option<&ObjectTypeSchema>) {
    println!(
        "{} {}",
        object.display_key().bright_cyan().bold(),
        object.label.as_deref().unwrap_or("")
    );
    println!(
        "  {} {} ({})",
        "Type:".dimmed(),
        object.object_type_name().unwrap_or("unknown"),
        object.object_type.id
    );
    println!("  {} {}", "ID:".dimmed(), object.id);

    for attribute in &object.attributes {
        let id = &attribute.object_type_attribute_id;
        let name = schema
            .and_then(|s| s.attributes.iter().find(|a| &a.id == id))
            .map(|a| a.name.clone())
            .unwrap_or_else(|| format!("#{}", id));
        let value = object.attribute_text(id).unwrap_or_default();
        println!("  {} {}", format!("{}:", name).dimmed(), value);
    }
}

pub async fn handle_search_command(session: &Session, args: SearchArgs) -> Result<ExitCode> {
    let objects = session
        .client
        .search_all(&args.aql, args.page_size, args.limit)
        .await
        .context("AQL search failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&objects)?);
        return Ok(ExitCode::SUCCESS);
    }

    if objects.is_empty() {
        println!("{}", "No objects matched".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{:<10} {:<14} {:<20} {}",
        "ID".bold(),
        "KEY".bold(),
        "TYPE".bold(),
        "LABEL".bold()
    );
    for object in &objects {
        println!(
            "{:<10} {:<14} {:<20} {}",
            object.id,
            object.display_key(),
            object.object_type_name().unwrap_or(&object.object_type.id),
            object.label.as_deref().unwrap_or("")
        );
    }
    println!();
    println!("{} objects", objects.len().to_string().bright_green());
    Ok(ExitCode::SUCCESS)
}

pub async fn handle_update_command(session: &Session, args: UpdateArgs) -> Result<ExitCode> {
    let asset = AssetRef::new(args.id, args.object_type)?;
    let changes = AttributeChange::from_assignments(&args.set)?;
    let schema = session
        .client
        .fetch_object_type_schema(asset.object_type())
        .await
        .context("Failed to load object type schema")?;
    let attributes = changes.resolve(&schema)?;

    session.client.update_object(asset, &attributes).await?;

    println!("{} object {}", "Updated".green().bold(), asset.id());
    for (name, value) in changes.iter() {
        println!("  {} {}", format!("{}:", name).dimmed(), value);
    }
    Ok(ExitCode::SUCCESS)
}
