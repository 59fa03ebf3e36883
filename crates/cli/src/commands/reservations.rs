// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reservation commands

use std::collections::BTreeMap;
use std::fmt;

use labgrid_client::output::{self, OutputFormat};
use labgrid_client::ClientError;
use lg_core::reservation::DEFAULT_GROUP;
use lg_core::{parse_filter, Reservation};
use serde::Serialize;

use super::Context;

#[derive(Serialize)]
#[serde(transparent)]
struct ReservationRow(Reservation);

impl fmt::Display for ReservationRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.0;
        let filters: Vec<String> = r
            .filters
            .iter()
            .map(|(group, filter)| {
                let terms: Vec<String> = filter.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                format!("{}: {}", group, terms.join(" "))
            })
            .collect();
        let allocations: Vec<String> = r
            .allocations
            .iter()
            .map(|(group, places)| format!("{}: {}", group, places.join(",")))
            .collect();
        write!(
            f,
            "{:<12} {:<20} {:<10} {:>4}  {}  [{}]",
            r.token,
            r.owner,
            r.state,
            r.prio,
            filters.join("; "),
            allocations.join("; ")
        )
    }
}

/// `export LG_TOKEN=...` for shells
struct ShellExport<'a>(&'a Reservation);

impl fmt::Display for ShellExport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "export LG_TOKEN={}", self.0.token)?;
        write!(f, "export LG_PLACE=+")
    }
}

pub async fn reserve(
    ctx: &Context,
    terms: &[String],
    prio: i64,
    wait: bool,
    shell: bool,
) -> Result<(), ClientError> {
    let filter = parse_filter(&terms.join(" ")).map_err(|e| ClientError::Invalid(e.to_string()))?;
    if filter.is_empty() {
        return Err(ClientError::Invalid(
            "a reservation needs at least one key=value filter".to_string(),
        ));
    }
    let filters = BTreeMap::from([(DEFAULT_GROUP.to_string(), filter)]);

    let mut reservation = ctx.session.create_reservation(filters, prio).await?;
    if wait {
        reservation = ctx.session.wait_reservation(&reservation.token).await?;
    }

    if shell && ctx.format == OutputFormat::Text {
        println!("{}", ShellExport(&reservation));
    } else {
        output::print(&ReservationRow(reservation), ctx.format)?;
    }
    Ok(())
}

pub async fn cancel(ctx: &Context, token: &str) -> Result<(), ClientError> {
    ctx.session.cancel_reservation(token).await?;
    output::done(&format!("cancelled reservation {}", token), ctx.format)?;
    Ok(())
}

pub async fn wait(ctx: &Context, token: &str) -> Result<(), ClientError> {
    let reservation = ctx.session.wait_reservation(token).await?;
    output::print(&ReservationRow(reservation), ctx.format)?;
    Ok(())
}

pub fn list(ctx: &Context) -> Result<(), ClientError> {
    let rows: Vec<ReservationRow> = ctx
        .session
        .reservations()
        .into_values()
        .map(ReservationRow)
        .collect();
    let header = format!(
        "{:<12} {:<20} {:<10} {:>4}  FILTERS  [ALLOCATIONS]",
        "TOKEN", "OWNER", "STATE", "PRIO"
    );
    output::print_list(&rows, &header, "No reservations", ctx.format)?;
    Ok(())
}
