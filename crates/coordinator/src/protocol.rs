// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between the coordinator and its sessions
//!
//! Every frame is a 4-byte big-endian length followed by a JSON document.
//! Sessions send [`ClientFrame`]s; the coordinator answers each with a
//! [`ServerFrame::Response`] carrying the same id, and pushes
//! [`ServerFrame::Change`] frames to sessions that have joined.

use lg_core::{
    ErrorKind, Place, Reservation, ResourcePath, ResourceTree, ResourceUpdate, SequencedChange,
    Snapshot, TagFilter,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version exchanged in `Hello`
pub const PROTOCOL_VERSION: &str = "1";

/// Default coordinator port
pub const DEFAULT_PORT: u16 = 20408;

/// Timeout for writing a single frame
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest frame either side will accept
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    FrameTooLarge(usize),
    #[error("timed out")]
    Timeout,
    #[error("connection closed")]
    ConnectionClosed,
}

/// Which side of the coordinator a session speaks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Exporter,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Exporter => write!(f, "exporter"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// First request on every connection; `name` is the client identity or
    /// the exporter name
    Hello {
        role: Role,
        name: String,
        version: String,
    },
    /// Snapshot plus subscription to every change topic
    Join,
    Ping,

    GetResources,
    GetPlaces,
    GetReservations,

    AddPlace {
        name: String,
    },
    DelPlace {
        name: String,
    },
    AddPlaceAlias {
        place: String,
        alias: String,
    },
    DelPlaceAlias {
        place: String,
        alias: String,
    },
    SetPlaceComment {
        place: String,
        comment: String,
    },
    SetPlaceTags {
        place: String,
        tags: BTreeMap<String, String>,
    },
    AddPlaceMatch {
        place: String,
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rename: Option<String>,
    },
    DelPlaceMatch {
        place: String,
        pattern: String,
    },
    AcquirePlace {
        place: String,
    },
    ReleasePlace {
        place: String,
        #[serde(default)]
        force: bool,
    },
    AllowPlace {
        place: String,
        user: String,
    },
    DisallowPlace {
        place: String,
        user: String,
    },

    CreateReservation {
        filters: BTreeMap<String, TagFilter>,
        #[serde(default)]
        prio: i64,
    },
    CancelReservation {
        token: String,
    },
    PollReservation {
        token: String,
    },

    // Exporter only
    SyncResources {
        resources: Vec<ResourceUpdate>,
    },
    UpsertResource {
        resource: ResourceUpdate,
    },
    RemoveResource {
        path: ResourcePath,
    },
}

impl Request {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Request::Hello { .. } => "hello",
            Request::Join => "join",
            Request::Ping => "ping",
            Request::GetResources => "get_resources",
            Request::GetPlaces => "get_places",
            Request::GetReservations => "get_reservations",
            Request::AddPlace { .. } => "add_place",
            Request::DelPlace { .. } => "del_place",
            Request::AddPlaceAlias { .. } => "add_place_alias",
            Request::DelPlaceAlias { .. } => "del_place_alias",
            Request::SetPlaceComment { .. } => "set_place_comment",
            Request::SetPlaceTags { .. } => "set_place_tags",
            Request::AddPlaceMatch { .. } => "add_place_match",
            Request::DelPlaceMatch { .. } => "del_place_match",
            Request::AcquirePlace { .. } => "acquire_place",
            Request::ReleasePlace { .. } => "release_place",
            Request::AllowPlace { .. } => "allow_place",
            Request::DisallowPlace { .. } => "disallow_place",
            Request::CreateReservation { .. } => "create_reservation",
            Request::CancelReservation { .. } => "cancel_reservation",
            Request::PollReservation { .. } => "poll_reservation",
            Request::SyncResources { .. } => "sync_resources",
            Request::UpsertResource { .. } => "upsert_resource",
            Request::RemoveResource { .. } => "remove_resource",
        }
    }

    /// Whether only exporter sessions may send this request
    pub fn is_exporter_only(&self) -> bool {
        matches!(
            self,
            Request::SyncResources { .. }
                | Request::UpsertResource { .. }
                | Request::RemoveResource { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Hello {
        version: String,
    },
    Ok,
    Pong,
    Snapshot {
        snapshot: Snapshot,
    },
    Resources {
        resources: ResourceTree,
    },
    Places {
        places: BTreeMap<String, Place>,
    },
    Reservations {
        reservations: BTreeMap<String, Reservation>,
    },
    Reservation {
        reservation: Reservation,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Response {
    pub fn user_error(message: impl Into<String>) -> Self {
        Response::Error {
            kind: ErrorKind::User,
            message: message.into(),
        }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Response::Error {
            kind: ErrorKind::Server,
            message: message.into(),
        }
    }
}

/// A request tagged with the id its response will carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub id: u64,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ServerFrame {
    Response { id: u64, response: Response },
    Change { change: SequencedChange },
}

/// Encode a value as JSON (without length prefix)
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode a value from JSON
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(data)?)
}

/// Write a length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(data.len()));
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Read and decode one frame
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let data = read_message(reader).await?;
    decode(&data)
}

/// Encode and write one frame within `timeout`
pub async fn write_frame<W, T>(writer: &mut W, value: &T, timeout: Duration) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = encode(value)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
