// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use std::fmt::Display;

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print one value
pub fn print<T: Serialize + Display>(value: &T, format: OutputFormat) -> serde_json::Result<()> {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Print a table: `header` then one line per item in text, an array in JSON
pub fn print_list<T: Serialize + Display>(
    items: &[T],
    header: &str,
    empty: &str,
    format: OutputFormat,
) -> serde_json::Result<()> {
    match format {
        OutputFormat::Text if items.is_empty() => println!("{}", empty),
        OutputFormat::Text => {
            println!("{}", header);
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

/// Print a confirmation line; JSON callers get `{"ok": true, "message": ...}`
pub fn done(message: &str, format: OutputFormat) -> serde_json::Result<()> {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "ok": true, "message": message }))?
        ),
    }
    Ok(())
}
