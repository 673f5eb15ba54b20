//! Control protocol (C8), spec §4.8: one-message-per-connection
//! request/response objects exchanged between the daemon (C7) and
//! front-ends, plus the client-side framing (size cap, timeout).

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Messages larger than this in either direction are rejected (spec
/// §4.8).
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    PauseLaunch,
    ResumeLaunch,
    Proceed,
    Abort,
    GetStatus,
    GetGameInfo,
    GetTinkers,
    ToggleTinker,
    UpdateConfig,
}

impl Action {
    /// Unknown action values map to `GetStatus` (spec §4.8's
    /// forward-compatibility rule).
    fn from_wire(s: &str) -> Self {
        match s {
            "PauseLaunch" => Action::PauseLaunch,
            "ResumeLaunch" => Action::ResumeLaunch,
            "Proceed" => Action::Proceed,
            "Abort" => Action::Abort,
            "GetGameInfo" => Action::GetGameInfo,
            "GetTinkers" => Action::GetTinkers,
            "ToggleTinker" => Action::ToggleTinker,
            "UpdateConfig" => Action::UpdateConfig,
            _ => Action::GetStatus,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub action: Action,
    pub tinker_id: Option<String>,
    pub enabled: Option<bool>,
}

/// Hand-rolled `Deserialize` so an unrecognized `action` string degrades
/// to `GetStatus` rather than a hard parse error, per spec §4.8.
impl<'de> Deserialize<'de> for Request {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            action: Option<String>,
            #[serde(default)]
            tinker_id: Option<String>,
            #[serde(default)]
            enabled: Option<bool>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Request {
            action: raw.action.as_deref().map(Action::from_wire).unwrap_or(Action::GetStatus),
            tinker_id: raw.tinker_id,
            enabled: raw.enabled,
        })
    }
}

/// The response object returned for every action (spec §4.8). The
/// per-tinker `<id>_enabled` booleans are flattened to the top level via
/// `tinkers`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Response {
    pub state: String,
    /// Canonical on output. The decoder additionally accepts the legacy
    /// misspelled `countdown_secs` key as a tolerated alias, resolving
    /// spec §9's Open Question about this field's key width.
    #[serde(alias = "countdown_secs")]
    pub countdown_seconds: u32,
    pub game_name: String,
    pub app_id: i64,
    #[serde(flatten)]
    pub tinkers: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
}

pub fn encode_request(req: &Request) -> Vec<u8> {
    serde_json::to_vec(req).expect("Request always serializes")
}

pub fn decode_request(bytes: &[u8]) -> Result<Request, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub fn encode_response(resp: &Response) -> Vec<u8> {
    serde_json::to_vec(resp).expect("Response always serializes")
}

pub fn decode_response(bytes: &[u8]) -> Result<Response, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Connect to the daemon at `socket_path`, send one request, and read
/// back one response, enforcing the size cap and an overall timeout.
pub async fn send_request(socket_path: &Path, req: &Request, timeout: Duration) -> Result<Response, ProtocolError> {
    tokio::time::timeout(timeout, send_request_inner(socket_path, req))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

async fn send_request_inner(socket_path: &Path, req: &Request) -> Result<Response, ProtocolError> {
    let mut stream = UnixStream::connect(socket_path).await?;
    let payload = encode_request(req);
    stream.write_all(&payload).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_MESSAGE_BYTES {
            return Err(ProtocolError::OversizeResponse);
        }
    }

    if buf.is_empty() {
        return Err(ProtocolError::EmptyResponse);
    }

    decode_response(&buf).map_err(ProtocolError::Malformed)
}
