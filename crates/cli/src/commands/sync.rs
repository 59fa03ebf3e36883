// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sync-places: converge places on a declarative file

use std::path::Path;

use labgrid_client::output::{self, OutputFormat};
use labgrid_client::sync::{self, PlacesDocument};
use labgrid_client::ClientError;

use super::Context;

pub async fn sync_places(ctx: &Context, file: &Path, prune: bool, dry_run: bool) -> Result<(), ClientError> {
    let document = PlacesDocument::load(file)?;
    let actions = sync::plan(&ctx.session.places(), &document, prune)?;

    if ctx.format == OutputFormat::Text {
        for action in &actions {
            println!("{}{}", if dry_run { "would " } else { "" }, action);
        }
    }
    if dry_run {
        if ctx.format == OutputFormat::Json {
            let planned: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
            println!("{}", serde_json::to_string_pretty(&planned)?);
        }
        return Ok(());
    }

    let count = sync::apply(&ctx.session, actions).await?;
    let message = if count == 0 {
        "places already in sync".to_string()
    } else {
        format!("applied {} change(s)", count)
    };
    output::done(&message, ctx.format)?;
    Ok(())
}
