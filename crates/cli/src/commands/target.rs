// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands acting on an acquired place: env, power, connect

use std::fmt;

use labgrid_client::console;
use labgrid_client::output::{self, OutputFormat};
use labgrid_client::power::{self, PowerAction};
use labgrid_client::ClientError;
use serde::Serialize;

use super::Context;

pub fn env(ctx: &Context) -> Result<(), ClientError> {
    let place = ctx.place()?;
    let env = ctx.session.get_env(&place.name)?;
    match ctx.format {
        OutputFormat::Text => print!("{}", env.to_yaml()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&env)?),
    }
    Ok(())
}

#[derive(Serialize)]
struct PowerState {
    place: String,
    powered: bool,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.powered { "on" } else { "off" };
        write!(f, "power for place {} is {}", self.place, state)
    }
}

pub async fn power(ctx: &Context, action: PowerAction) -> Result<(), ClientError> {
    let place = ctx.place()?;
    let backend = ctx.session.power(&place.name)?;
    match power::run(&backend, action).await? {
        Some(powered) => output::print(
            &PowerState {
                place: place.name,
                powered,
            },
            ctx.format,
        )?,
        None => output::done(&format!("power {} for place {}", action, place.name), ctx.format)?,
    }
    Ok(())
}

/// Attach the terminal to the place's serial console until EOF
pub async fn connect(ctx: &Context) -> Result<(), ClientError> {
    let place = ctx.place()?;
    let target = ctx.session.console(&place.name)?;
    eprintln!(
        "connected to {} for place {} (end input to detach)",
        target.addr(),
        place.name
    );
    let mut terminal = tokio::io::join(tokio::io::stdin(), tokio::io::stdout());
    console::attach(&target, &mut terminal).await?;
    Ok(())
}
