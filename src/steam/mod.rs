//! Steam state locator (C2) — installation discovery, library folders,
//! the active login user, and on-disk app manifests (spec §4.2).
//!
//! Grounded on `ghostforge::launcher::LauncherManager::detect_steam`'s
//! candidate-path probing and on
//! `other_examples/a3d776c7_dank0i-pc-bridge__src-steam-discovery.rs`'s
//! per-library app-id collection, generalized to the exact discovery
//! contract in spec §4.2 (installation-class tagging, dedup, graceful
//! degradation on manifest parse failure).

mod manifest;

pub use manifest::AppManifest;

use crate::error::SteamError;
use crate::vdf::{self, VdfValue};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Stable numeric identifier for an installed title (spec §3). Modeled as
/// `i64` rather than `u32`/`i32` since both the full positive `u32`
/// Steam-id range and the negative user-added sequence starting at -1000
/// need to fit losslessly in the same type. See DESIGN.md/SPEC_FULL.md for
/// this Open-Question resolution.
pub type AppId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallationClass {
    Native,
    Flatpak,
    Snap,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct SteamRoot {
    pub path: PathBuf,
    pub class: InstallationClass,
}

#[derive(Debug, Clone)]
pub struct LoginUser {
    pub steam_id: String,
    pub account_name: Option<String>,
    pub most_recent: bool,
}

#[derive(Debug, Clone)]
pub struct InstalledGame {
    pub app_id: AppId,
    pub name: String,
    pub install_dir: String,
}

/// Candidate roots relative to `$HOME`, tried in order (spec §4.2).
fn candidate_roots(home: &Path) -> Vec<(PathBuf, InstallationClass)> {
    vec![
        (home.join(".local/share/Steam"), InstallationClass::Native),
        (home.join(".steam/steam"), InstallationClass::Native),
        (
            home.join(".var/app/com.valvesoftware.Steam/data/Steam"),
            InstallationClass::Flatpak,
        ),
        (
            home.join("snap/steam/common/.local/share/Steam"),
            InstallationClass::Snap,
        ),
    ]
}

/// Locate the Steam installation root. A root is valid iff it contains the
/// `steam.sh` marker file.
pub fn locate_root(home: &Path) -> Result<SteamRoot, SteamError> {
    for (path, class) in candidate_roots(home) {
        if path.join("steam.sh").exists() {
            return Ok(SteamRoot { path, class });
        }
    }
    Err(SteamError::SteamNotFound)
}

/// Library folders: the root itself, unioned with every `path` value found
/// in `steamapps/libraryfolders.vdf`, deduplicated. Parse failures degrade
/// to just the root (a warning, not a fatal error, per spec §4.2).
pub fn library_folders(root: &SteamRoot) -> Vec<PathBuf> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut out = Vec::new();

    let mut push = |p: PathBuf, seen: &mut HashSet<PathBuf>, out: &mut Vec<PathBuf>| {
        if seen.insert(p.clone()) {
            out.push(p);
        }
    };
    push(root.path.clone(), &mut seen, &mut out);

    let vdf_path = root.path.join("steamapps/libraryfolders.vdf");
    let content = match std::fs::read(&vdf_path) {
        Ok(c) => c,
        Err(_) => return out,
    };
    let map = match vdf::parse_text(&content) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!("failed to parse libraryfolders.vdf: {e}");
            return out;
        }
    };

    // Layout: { "libraryfolders": { "0": { "path": "...", ... }, "1": {...} } }
    let folders_root = map.get("libraryfolders").and_then(VdfValue::as_map).unwrap_or(&map);
    for (_, entry) in folders_root.iter() {
        if let Some(entry_map) = entry.as_map() {
            if let Some(path_str) = entry_map.get("path").and_then(|v| v.as_str()) {
                push(PathBuf::from(path_str), &mut seen, &mut out);
            }
        }
    }

    out
}

/// The active user is the entry in `loginusers.vdf` whose `MostRecent`
/// field equals `"1"`; first iteration-order match wins on ties; absent if
/// none match or the file is unreadable/malformed (spec §4.2).
pub fn active_user(root: &SteamRoot) -> Option<LoginUser> {
    let path = root.path.join("config/loginusers.vdf");
    let content = std::fs::read(path).ok()?;
    let map = vdf::parse_text(&content)
        .map_err(|e| tracing::warn!("failed to parse loginusers.vdf: {e}"))
        .ok()?;

    let users_root = map.get("users").and_then(VdfValue::as_map).unwrap_or(&map);
    for (steam_id, entry) in users_root.iter() {
        let Some(entry_map) = entry.as_map() else { continue };
        let most_recent = entry_map
            .get("MostRecent")
            .and_then(|v| v.as_str())
            .map(|s| s == "1")
            .unwrap_or(false);
        if most_recent {
            return Some(LoginUser {
                steam_id: steam_id.to_string(),
                account_name: entry_map.get("AccountName").and_then(|v| v.as_str()).map(String::from),
                most_recent: true,
            });
        }
    }
    None
}

/// Lazily enumerate `appmanifest_*.acf` across all library folders.
/// Order is arbitrary but stable within a single call (spec §4.2).
pub fn list_installed_games(libraries: &[PathBuf]) -> Vec<InstalledGame> {
    let mut out = Vec::new();
    for lib in libraries {
        let steamapps = lib.join("steamapps");
        let Ok(entries) = std::fs::read_dir(&steamapps) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_manifest = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("appmanifest_") && n.ends_with(".acf"))
                .unwrap_or(false);
            if !is_manifest {
                continue;
            }
            if let Some(manifest) = AppManifest::read(&path) {
                out.push(InstalledGame {
                    app_id: manifest.app_id,
                    name: manifest.display_name,
                    install_dir: manifest.install_dir,
                });
            }
        }
    }
    out
}

/// All installed app ids across the given library folders, without
/// materializing full manifests — used by commands that only need ids
/// (e.g. building a name index against the appinfo database), grounded on
/// `other_examples/a3d776c7_dank0i-pc-bridge__src-steam-discovery.rs`'s
/// per-library app-id collection.
pub fn library_app_ids(libraries: &[PathBuf]) -> Vec<AppId> {
    list_installed_games(libraries).into_iter().map(|g| g.app_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn steam_root(dir: &Path) -> SteamRoot {
        fs::write(dir.join("steam.sh"), b"#!/bin/sh\n").unwrap();
        SteamRoot {
            path: dir.to_path_buf(),
            class: InstallationClass::Native,
        }
    }

    #[test]
    fn locate_root_finds_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let steam_dir = tmp.path().join(".local/share/Steam");
        fs::create_dir_all(&steam_dir).unwrap();
        fs::write(steam_dir.join("steam.sh"), b"#!/bin/sh\n").unwrap();

        let root = locate_root(tmp.path()).unwrap();
        assert_eq!(root.path, steam_dir);
        assert_eq!(root.class, InstallationClass::Native);
    }

    #[test]
    fn locate_root_missing_is_steam_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(locate_root(tmp.path()), Err(SteamError::SteamNotFound)));
    }

    #[test]
    fn library_folders_dedup() {
        let tmp = tempfile::tempdir().unwrap();
        let root = steam_root(tmp.path());
        fs::create_dir_all(root.path.join("steamapps")).unwrap();
        let vdf = format!(
            r#""libraryfolders" {{ "0" {{ "path" "{}" }} "1" {{ "path" "{}" }} }}"#,
            tmp.path().display(),
            tmp.path().display(),
        );
        fs::write(root.path.join("steamapps/libraryfolders.vdf"), vdf).unwrap();

        let folders = library_folders(&root);
        // root path appears once even though the vdf repeats it.
        let count = folders.iter().filter(|p| **p == tmp.path()).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn library_folders_degrades_on_parse_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let root = steam_root(tmp.path());
        fs::create_dir_all(root.path.join("steamapps")).unwrap();
        fs::write(root.path.join("steamapps/libraryfolders.vdf"), b"not valid vdf {{{").unwrap();

        let folders = library_folders(&root);
        assert_eq!(folders, vec![root.path.clone()]);
    }

    #[test]
    fn active_user_most_recent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = steam_root(tmp.path());
        fs::create_dir_all(root.path.join("config")).unwrap();
        let vdf = r#""users"
        {
            "76561190000000001"
            {
                "AccountName" "alice"
                "MostRecent" "0"
            }
            "76561190000000002"
            {
                "AccountName" "bob"
                "MostRecent" "1"
            }
        }"#;
        fs::write(root.path.join("config/loginusers.vdf"), vdf).unwrap();

        let user = active_user(&root).unwrap();
        assert_eq!(user.steam_id, "76561190000000002");
        assert_eq!(user.account_name.as_deref(), Some("bob"));
    }
}
