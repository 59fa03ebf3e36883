// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serial console of an acquired place
//!
//! Network serial ports are plain TCP endpoints on the exporter host;
//! attaching copies bytes both ways until either side closes.

use lg_core::resource::tree_get;
use lg_core::{Place, ResourcePath, ResourceTree};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::ClientError;

/// Resource classes reachable as a raw TCP console
pub const CONSOLE_CLASSES: &[&str] = &["NetworkSerialPort"];

/// Where a place's console lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleTarget {
    pub resource: ResourcePath,
    pub host: String,
    pub port: u16,
}

impl ConsoleTarget {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Locate the place's bound console resource
pub fn console_target(place: &Place, resources: &ResourceTree) -> Result<ConsoleTarget, ClientError> {
    let path = place
        .acquired_resources
        .iter()
        .find(|path| CONSOLE_CLASSES.contains(&path.cls.as_str()))
        .ok_or_else(|| ClientError::MissingResource {
            place: place.name.clone(),
            what: "console",
        })?;
    let entry = tree_get(resources, path)
        .filter(|entry| entry.avail)
        .ok_or_else(|| ClientError::Unavailable(path.clone()))?;

    let params = entry.construction_params();
    let host = params.get("host").and_then(|v| v.as_str());
    let port = params
        .get("port")
        .and_then(|v| v.as_u64())
        .and_then(|p| u16::try_from(p).ok());
    match (host, port) {
        (Some(host), Some(port)) => Ok(ConsoleTarget {
            resource: path.clone(),
            host: host.to_string(),
            port,
        }),
        _ => Err(ClientError::Invalid(format!(
            "resource {} needs a host and a port",
            path
        ))),
    }
}

/// Bridge `local` with the console; returns bytes sent and received
pub async fn attach<S>(target: &ConsoleTarget, local: &mut S) -> Result<(u64, u64), ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let addr = target.addr();
    let console_error = |source| ClientError::Console {
        addr: addr.clone(),
        source,
    };
    let mut remote = TcpStream::connect(&addr).await.map_err(console_error)?;
    info!(resource = %target.resource, %addr, "console attached");
    let (sent, received) = tokio::io::copy_bidirectional(local, &mut remote)
        .await
        .map_err(console_error)?;
    debug!(sent, received, "console detached");
    Ok((sent, received))
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
