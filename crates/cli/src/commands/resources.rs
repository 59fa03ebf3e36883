// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource listing

use std::fmt;

use labgrid_client::output;
use labgrid_client::ClientError;
use lg_core::resource::tree_iter;
use lg_core::{Params, ResourceMatch};
use serde::Serialize;

use super::Context;

#[derive(Serialize)]
struct ResourceRow {
    path: String,
    cls: String,
    avail: bool,
    acquired: Option<String>,
    params: Params,
}

impl fmt::Display for ResourceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<60} {:<6} {}",
            self.path,
            if self.avail { "yes" } else { "no" },
            self.acquired.as_deref().unwrap_or("-")
        )
    }
}

/// List resources; unavailable ones only with `all`
///
/// `filter` is a match pattern (`exporter/group/cls[/name]`).
pub fn list(ctx: &Context, all: bool, filter: Option<&str>) -> Result<(), ClientError> {
    let filter = filter
        .map(str::parse::<ResourceMatch>)
        .transpose()
        .map_err(|e| ClientError::Invalid(e.to_string()))?;

    let resources = ctx.session.resources();
    let rows: Vec<ResourceRow> = tree_iter(&resources)
        .filter(|(_, entry)| all || entry.avail)
        .filter(|(path, _)| filter.as_ref().is_none_or(|m| m.ismatch(path)))
        .map(|(path, entry)| ResourceRow {
            path: path.to_string(),
            cls: entry.cls.clone(),
            avail: entry.avail,
            acquired: entry.acquired.clone(),
            params: entry.params.clone(),
        })
        .collect();

    let header = format!("{:<60} {:<6} ACQUIRED", "RESOURCE", "AVAIL");
    output::print_list(&rows, &header, "No resources", ctx.format)?;
    Ok(())
}
