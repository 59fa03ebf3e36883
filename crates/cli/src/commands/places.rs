// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Place commands

use std::collections::BTreeMap;
use std::fmt;

use labgrid_client::output;
use labgrid_client::ClientError;
use lg_core::Place;
use serde::Serialize;

use super::Context;

#[derive(Serialize)]
struct PlaceRow {
    name: String,
    aliases: Vec<String>,
    comment: String,
    acquired: Option<String>,
}

impl From<&Place> for PlaceRow {
    fn from(place: &Place) -> Self {
        Self {
            name: place.name.clone(),
            aliases: place.aliases.iter().cloned().collect(),
            comment: place.comment.clone(),
            acquired: place.acquired.clone(),
        }
    }
}

impl fmt::Display for PlaceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} {:<20} {}",
            self.name,
            self.acquired.as_deref().unwrap_or("-"),
            self.comment
        )
    }
}

/// All details of one place
#[derive(Serialize)]
#[serde(transparent)]
struct PlaceDetail(Place);

impl fmt::Display for PlaceDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let place = &self.0;
        writeln!(f, "Place '{}':", place.name)?;
        if !place.aliases.is_empty() {
            let aliases: Vec<&str> = place.aliases.iter().map(String::as_str).collect();
            writeln!(f, "  aliases: {}", aliases.join(", "))?;
        }
        writeln!(f, "  comment: {}", place.comment)?;
        let tags: Vec<String> = place.tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        writeln!(f, "  tags: {}", tags.join(", "))?;
        writeln!(f, "  matches:")?;
        for m in &place.matches {
            writeln!(f, "    {}", m.describe())?;
        }
        match &place.acquired {
            Some(holder) => writeln!(f, "  acquired: {}", holder)?,
            None => writeln!(f, "  acquired: -")?,
        }
        if !place.acquired_resources.is_empty() {
            writeln!(f, "  acquired resources:")?;
            for path in &place.acquired_resources {
                writeln!(f, "    {}", path)?;
            }
        }
        if !place.allowed.is_empty() {
            let allowed: Vec<&str> = place.allowed.iter().map(String::as_str).collect();
            writeln!(f, "  allowed: {}", allowed.join(", "))?;
        }
        if let Some(token) = &place.reservation {
            writeln!(f, "  reservation: {}", token)?;
        }
        write!(f, "  changed: {:.3}", place.changed)
    }
}

pub fn list(ctx: &Context, acquired_only: bool) -> Result<(), ClientError> {
    let rows: Vec<PlaceRow> = ctx
        .session
        .places()
        .values()
        .filter(|p| !acquired_only || p.is_acquired())
        .map(PlaceRow::from)
        .collect();
    let header = format!("{:<20} {:<20} COMMENT", "PLACE", "ACQUIRED");
    output::print_list(&rows, &header, "No places", ctx.format)?;
    Ok(())
}

pub fn show(ctx: &Context) -> Result<(), ClientError> {
    output::print(&PlaceDetail(ctx.place()?), ctx.format)?;
    Ok(())
}

pub async fn add_place(ctx: &Context, name: Option<String>) -> Result<(), ClientError> {
    let name = match name {
        Some(name) => name,
        None => ctx.place_name()?.to_string(),
    };
    ctx.session.add_place(&name).await?;
    output::done(&format!("Added place {}", name), ctx.format)?;
    Ok(())
}

pub async fn del_place(ctx: &Context) -> Result<(), ClientError> {
    let place = ctx.place()?;
    ctx.session.del_place(&place.name).await?;
    output::done(&format!("Deleted place {}", place.name), ctx.format)?;
    Ok(())
}

pub async fn add_alias(ctx: &Context, alias: &str) -> Result<(), ClientError> {
    let place = ctx.place()?;
    ctx.session.add_alias(&place.name, alias).await?;
    output::done(&format!("Added alias {} to {}", alias, place.name), ctx.format)?;
    Ok(())
}

pub async fn del_alias(ctx: &Context, alias: &str) -> Result<(), ClientError> {
    let place = ctx.place()?;
    ctx.session.del_alias(&place.name, alias).await?;
    output::done(&format!("Removed alias {} from {}", alias, place.name), ctx.format)?;
    Ok(())
}

pub async fn set_comment(ctx: &Context, words: &[String]) -> Result<(), ClientError> {
    let place = ctx.place()?;
    ctx.session.set_comment(&place.name, &words.join(" ")).await?;
    output::done(&format!("Set comment of {}", place.name), ctx.format)?;
    Ok(())
}

/// Parse `key=value` terms; `key=` removes a tag
pub fn parse_tags(terms: &[String]) -> Result<BTreeMap<String, String>, ClientError> {
    terms
        .iter()
        .map(|term| {
            term.split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| ClientError::Invalid(format!("invalid tag '{}', expected 'key=value'", term)))
        })
        .collect()
}

pub async fn set_tags(ctx: &Context, terms: &[String]) -> Result<(), ClientError> {
    let tags = parse_tags(terms)?;
    let place = ctx.place()?;
    ctx.session.set_tags(&place.name, tags).await?;
    output::done(&format!("Set tags of {}", place.name), ctx.format)?;
    Ok(())
}

pub async fn add_match(ctx: &Context, patterns: &[String], rename: Option<&str>) -> Result<(), ClientError> {
    if rename.is_some() && patterns.len() != 1 {
        return Err(ClientError::Invalid(
            "--rename needs exactly one pattern".to_string(),
        ));
    }
    let place = ctx.place()?;
    for pattern in patterns {
        ctx.session.add_match(&place.name, pattern, rename).await?;
    }
    output::done(&format!("Added {} match(es) to {}", patterns.len(), place.name), ctx.format)?;
    Ok(())
}

pub async fn del_match(ctx: &Context, patterns: &[String]) -> Result<(), ClientError> {
    let place = ctx.place()?;
    for pattern in patterns {
        ctx.session.del_match(&place.name, pattern).await?;
    }
    output::done(&format!("Removed {} match(es) from {}", patterns.len(), place.name), ctx.format)?;
    Ok(())
}

pub async fn acquire(ctx: &Context) -> Result<(), ClientError> {
    let place = ctx.place()?;
    ctx.session.acquire(&place.name).await?;
    output::done(&format!("acquired place {}", place.name), ctx.format)?;
    Ok(())
}

pub async fn release(ctx: &Context, kick: bool) -> Result<(), ClientError> {
    let place = ctx.place()?;
    ctx.session.release(&place.name, kick).await?;
    output::done(&format!("released place {}", place.name), ctx.format)?;
    Ok(())
}

pub async fn allow(ctx: &Context, user: &str, revoke: bool) -> Result<(), ClientError> {
    let place = ctx.place()?;
    if revoke {
        ctx.session.disallow(&place.name, user).await?;
        output::done(&format!("revoked {} on place {}", user, place.name), ctx.format)?;
    } else {
        ctx.session.allow(&place.name, user).await?;
        output::done(&format!("allowed {} on place {}", user, place.name), ctx.format)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_parse_and_allow_removal() {
        let tags = parse_tags(&["board=rpi4".into(), "owner=".into()]).unwrap();
        assert_eq!(tags["board"], "rpi4");
        assert_eq!(tags["owner"], "");
    }

    #[test]
    fn tags_without_key_are_rejected() {
        assert!(matches!(
            parse_tags(&["=x".into()]),
            Err(ClientError::Invalid(_))
        ));
        assert!(parse_tags(&["board".into()]).is_err());
    }
}
