// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! labgrid-client - acquire and control lab places

mod commands;
mod completions;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use labgrid_client::{
    ClientSession, LgError, OutputFormat, PowerAction, SessionOptions, DEFAULT_COORDINATOR,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::{places, reservations, resources, sync, target, Context};
use crate::completions::CompletionsArgs;

#[derive(Parser)]
#[command(
    name = "labgrid-client",
    version,
    about = "Labgrid client - acquire and control lab places"
)]
struct Cli {
    /// Coordinator address (host:port)
    #[arg(long, short = 'x', global = true, env = "LG_COORDINATOR", default_value = DEFAULT_COORDINATOR)]
    coordinator: String,

    /// Place name, alias or unique part of one; `+` for the LG_TOKEN reservation
    #[arg(long, short = 'p', global = true, env = "LG_PLACE")]
    place: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List resources
    Resources {
        /// Include unavailable resources
        #[arg(long, short = 'a')]
        all: bool,
        /// Only resources matching exporter/group/cls[/name]
        filter: Option<String>,
    },
    /// List places
    Places {
        /// Only acquired places
        #[arg(long)]
        acquired: bool,
    },
    /// Show one place in detail
    Show,
    /// Create a place (named by the argument or -p)
    AddPlace { name: Option<String> },
    /// Delete a place
    DelPlace,
    /// Add an alias to a place
    AddAlias { alias: String },
    /// Remove an alias from a place
    DelAlias { alias: String },
    /// Set the comment of a place
    SetComment {
        #[arg(required = true)]
        comment: Vec<String>,
    },
    /// Set tags (key=value; key= removes a tag)
    SetTags {
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Add resource matches (exporter/group/cls[/name])
    AddMatch {
        #[arg(required = true)]
        patterns: Vec<String>,
        /// Name the bound resource gets in the driver environment
        #[arg(long)]
        rename: Option<String>,
    },
    /// Remove resource matches
    DelMatch {
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Acquire a place
    Acquire,
    /// Release a place
    Release {
        /// Release a place acquired by someone else
        #[arg(long, short = 'k')]
        kick: bool,
    },
    /// Let another user use an acquired place
    Allow {
        /// User identity (host/user)
        user: String,
        /// Take the permission away again
        #[arg(long)]
        revoke: bool,
    },
    /// Print the driver environment of an acquired place
    Env,
    /// Switch the power of an acquired place
    Power {
        #[arg(value_enum)]
        action: PowerAction,
    },
    /// Attach to the serial console of the place
    Connect,
    /// Reserve a place by tags (key=value ...)
    Reserve {
        #[arg(required = true)]
        filters: Vec<String>,
        /// Higher priorities are allocated first
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        prio: i64,
        /// Wait until the reservation is allocated
        #[arg(long)]
        wait: bool,
        /// Print shell exports instead of the reservation
        #[arg(long)]
        shell: bool,
    },
    /// Cancel a reservation
    CancelReservation {
        /// Reservation token (default: LG_TOKEN)
        token: Option<String>,
    },
    /// Wait until a reservation is allocated
    Wait {
        /// Reservation token (default: LG_TOKEN)
        token: Option<String>,
    },
    /// List reservations
    Reservations,
    /// Make the coordinator's places match a TOML file
    SyncPlaces {
        file: PathBuf,
        /// Delete places the file does not declare
        #[arg(long)]
        prune: bool,
        /// Only print the planned changes
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprint!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), LgError> {
    // Handle completions separately (doesn't need a coordinator)
    if let Commands::Completions(args) = &cli.command {
        completions::generate_completions::<Cli>(args.shell);
        return Ok(());
    }

    let session = ClientSession::join(&cli.coordinator, SessionOptions::from_env()).await?;
    let ctx = Context {
        session,
        place: cli.place,
        token: std::env::var("LG_TOKEN").ok().filter(|t| !t.is_empty()),
        format: cli.format,
    };

    match cli.command {
        Commands::Resources { all, filter } => resources::list(&ctx, all, filter.as_deref())?,
        Commands::Places { acquired } => places::list(&ctx, acquired)?,
        Commands::Show => places::show(&ctx)?,
        Commands::AddPlace { name } => places::add_place(&ctx, name).await?,
        Commands::DelPlace => places::del_place(&ctx).await?,
        Commands::AddAlias { alias } => places::add_alias(&ctx, &alias).await?,
        Commands::DelAlias { alias } => places::del_alias(&ctx, &alias).await?,
        Commands::SetComment { comment } => places::set_comment(&ctx, &comment).await?,
        Commands::SetTags { tags } => places::set_tags(&ctx, &tags).await?,
        Commands::AddMatch { patterns, rename } => {
            places::add_match(&ctx, &patterns, rename.as_deref()).await?
        }
        Commands::DelMatch { patterns } => places::del_match(&ctx, &patterns).await?,
        Commands::Acquire => places::acquire(&ctx).await?,
        Commands::Release { kick } => places::release(&ctx, kick).await?,
        Commands::Allow { user, revoke } => places::allow(&ctx, &user, revoke).await?,
        Commands::Env => target::env(&ctx)?,
        Commands::Power { action } => target::power(&ctx, action).await?,
        Commands::Connect => target::connect(&ctx).await?,
        Commands::Reserve {
            filters,
            prio,
            wait,
            shell,
        } => reservations::reserve(&ctx, &filters, prio, wait, shell).await?,
        Commands::CancelReservation { token } => {
            let token = ctx.token(token.as_deref())?;
            reservations::cancel(&ctx, token).await?
        }
        Commands::Wait { token } => {
            let token = ctx.token(token.as_deref())?;
            reservations::wait(&ctx, token).await?
        }
        Commands::Reservations => reservations::list(&ctx)?,
        Commands::SyncPlaces {
            file,
            prune,
            dry_run,
        } => sync::sync_places(&ctx, &file, prune, dry_run).await?,
        Commands::Completions(_) => {}
    }

    Ok(())
}
