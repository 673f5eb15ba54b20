//! App-info index (C3): O(1)-bytes-per-skip lookup over Steam's binary
//! `appinfo.vdf` database, and materialization of a `GameInfo` from a
//! located entry (spec §4.3).
//!
//! Grounded on `other_examples/beae5846_dank0i-pc-bridge__src-steam-appinfo.rs`,
//! whose index-then-seek technique we generalize: instead of building an
//! in-memory `HashMap<app_id, offset>` up front, we walk the file lazily
//! and only materialize the VDF payload of the one entry the caller asked
//! for, matching spec §4.3's O(1)-bytes-skipped contract exactly.

use crate::error::{AppInfoError, VdfError};
use crate::steam::AppId;
use crate::vdf::{self, VdfMap, VdfValue};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Known appinfo header magic words. Steam has rolled this forward
/// several times without documentation; per spec §4.3/§9 an unrecognized
/// magic is a warning, not a hard failure — we still attempt to parse.
const KNOWN_MAGICS: &[u32] = &[0x0756_4427, 0x0756_4428, 0x0756_4429];

/// Size, in bytes, of the fixed per-entry header fields that follow
/// `app_id` and `payload_size`: info_state(4) + last_updated(4) +
/// pics_token(8) + sha1(20) + change_number(4).
const FIXED_HEADER_REMAINDER: u64 = 4 + 4 + 8 + 20 + 4;

#[derive(Debug, Clone)]
pub struct AppInfoEntry {
    pub app_id: u32,
    pub size: u32,
    pub info_state: u32,
    pub last_updated: u32,
    pub pics_token: u64,
    pub sha1: [u8; 20],
    pub change_number: u32,
    pub payload: VdfMap,
}

#[derive(Debug, Clone)]
pub struct LaunchOption {
    pub id: u32,
    pub executable: String,
    pub arguments: Option<String>,
    pub description: Option<String>,
    pub os_filter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GameInfo {
    pub app_id: AppId,
    pub display_name: String,
    pub install_dir: String,
    pub primary_executable: Option<String>,
    pub launch_options: Vec<LaunchOption>,
    pub proton_runtime_hint: Option<String>,
    pub is_installed: bool,
}

pub struct AppInfoIndex {
    file: File,
    /// Byte offset of the first entry, i.e. right after the 8-byte header.
    entries_start: u64,
}

impl AppInfoIndex {
    pub fn open(path: &Path) -> Result<Self, AppInfoError> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
        if !KNOWN_MAGICS.contains(&magic) {
            tracing::warn!("unrecognized appinfo magic 0x{magic:08x}, attempting to parse anyway");
        }
        Ok(Self {
            file,
            entries_start: 8,
        })
    }

    /// Seek-by-id (spec §4.3): walk entries from the start, skipping each
    /// non-matching entry in a single seek of `(remainder-of-fixed-header
    /// + payload_size)` bytes. Stops at the zero-app-id end sentinel.
    pub fn find(&mut self, target: u32) -> Result<Option<AppInfoEntry>, AppInfoError> {
        self.file.seek(SeekFrom::Start(self.entries_start))?;
        let mut head = [0u8; 8];
        loop {
            if self.file.read_exact(&mut head).is_err() {
                return Ok(None);
            }
            let app_id = u32::from_le_bytes(head[0..4].try_into().unwrap());
            if app_id == 0 {
                return Ok(None);
            }
            let payload_size = u32::from_le_bytes(head[4..8].try_into().unwrap());

            if app_id == target {
                let mut rest = [0u8; FIXED_HEADER_REMAINDER as usize];
                self.file.read_exact(&mut rest)?;
                let info_state = u32::from_le_bytes(rest[0..4].try_into().unwrap());
                let last_updated = u32::from_le_bytes(rest[4..8].try_into().unwrap());
                let pics_token = u64::from_le_bytes(rest[8..16].try_into().unwrap());
                let mut sha1 = [0u8; 20];
                sha1.copy_from_slice(&rest[16..36]);
                let change_number = u32::from_le_bytes(rest[36..40].try_into().unwrap());

                let mut payload_bytes = vec![0u8; payload_size as usize];
                self.file.read_exact(&mut payload_bytes)?;
                let payload = match vdf::parse_binary(&payload_bytes) {
                    Ok(m) => m,
                    Err(VdfError::Io(e)) => return Err(AppInfoError::Io(e)),
                    Err(e) => return Err(AppInfoError::Vdf(e)),
                };

                return Ok(Some(AppInfoEntry {
                    app_id,
                    size: payload_size,
                    info_state,
                    last_updated,
                    pics_token,
                    sha1,
                    change_number,
                    payload,
                }));
            }

            let skip = FIXED_HEADER_REMAINDER + payload_size as u64;
            self.file.seek(SeekFrom::Current(skip as i64))?;
        }
    }

    /// Lazy, finite, restartable iteration over `{app_id, payload_size}`
    /// pairs without materializing any payload (spec §4.3) — useful for
    /// building a name index without paying the VDF-parse cost per entry.
    pub fn iter_ids(&mut self) -> Result<Vec<(u32, u32)>, AppInfoError> {
        self.file.seek(SeekFrom::Start(self.entries_start))?;
        let mut out = Vec::new();
        let mut head = [0u8; 8];
        loop {
            if self.file.read_exact(&mut head).is_err() {
                break;
            }
            let app_id = u32::from_le_bytes(head[0..4].try_into().unwrap());
            if app_id == 0 {
                break;
            }
            let payload_size = u32::from_le_bytes(head[4..8].try_into().unwrap());
            out.push((app_id, payload_size));
            let skip = FIXED_HEADER_REMAINDER + payload_size as u64;
            self.file.seek(SeekFrom::Current(skip as i64))?;
        }
        Ok(out)
    }
}

const HOST_OS: &str = "linux";

/// Materialize a `GameInfo` from a located entry and a C2 manifest. The
/// entry's VDF payload root is the `appinfo` object itself (its
/// `common`/`config` children), matching the dotted-path examples in
/// spec §4.3.
pub fn materialize(app_id: AppId, entry: &AppInfoEntry, install_dir_fallback: &str, is_installed: bool) -> GameInfo {
    let root = VdfValue::Map(entry.payload.clone());

    let display_name = root
        .query("appinfo.common.name")
        .and_then(VdfValue::as_str)
        .map(String::from)
        .unwrap_or_else(|| format!("Game {app_id}"));

    let install_dir = root
        .query("appinfo.config.installdir")
        .and_then(VdfValue::as_str)
        .map(String::from)
        .unwrap_or_else(|| install_dir_fallback.to_string());

    let mut launch_options = Vec::new();
    if let Some(launch_map) = root.query("appinfo.config.launch").and_then(VdfValue::as_map) {
        for (id, slot) in launch_map.numeric_children() {
            let Some(slot_map) = slot.as_map() else { continue };
            let Some(executable) = slot_map.get("executable").and_then(VdfValue::as_str) else { continue };
            launch_options.push(LaunchOption {
                id,
                executable: executable.to_string(),
                arguments: slot_map.get("arguments").and_then(VdfValue::as_str).map(String::from),
                description: slot_map.get("description").and_then(VdfValue::as_str).map(String::from),
                os_filter: slot_map.get("oslist").and_then(VdfValue::as_str).map(String::from),
            });
        }
    }

    // OS-filter-aware selection is authoritative (spec §9 Open Question):
    // an option whose oslist is non-empty and excludes "linux" cannot be
    // the primary executable, but it remains in the full launch_options list.
    let primary_executable = launch_options
        .iter()
        .find(|opt| {
            opt.os_filter
                .as_ref()
                .map(|list| list.is_empty() || list.split(',').any(|o| o.trim() == HOST_OS))
                .unwrap_or(true)
        })
        .map(|opt| opt.executable.clone());

    GameInfo {
        app_id,
        display_name,
        install_dir,
        primary_executable,
        launch_options,
        proton_runtime_hint: None,
        is_installed,
    }
}
