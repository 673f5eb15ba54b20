//! Configuration store (C4), spec §4.4: per-app `GameConfig`, directory
//! resolution, and the non-Steam game registry.
//!
//! Grounded on `ghostforge::config::Config`'s load/default/save shape,
//! adapted to per-app files instead of one global file and to the
//! never-fail-on-parse-error contract spec §4.4/§7 requires.

use crate::error::ConfigError;
use crate::steam::AppId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const MAX_CONFIG_BYTES: u64 = 1024 * 1024;

/// Per-app settings (spec §3). A missing file is equivalent to
/// `GameConfig::default()` — not an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub app_id: AppId,
    pub prefer_native: bool,
    pub runtime_override: Option<String>,
    pub extra_launch_arguments: Option<String>,
    pub tinker_settings: BTreeMap<String, toml::Value>,
    pub steamgriddb_settings: Option<toml::Value>,
    pub proton_advanced: Option<toml::Value>,
    pub gpu_preference: Option<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            app_id: 0,
            prefer_native: false,
            runtime_override: None,
            extra_launch_arguments: None,
            tinker_settings: BTreeMap::new(),
            steamgriddb_settings: None,
            proton_advanced: None,
            gpu_preference: None,
        }
    }
}

/// Resolve the config directory in priority order (spec §4.4):
/// `STL_CONFIG_DIR` env var, then `$XDG_CONFIG_HOME/stl-next`, then
/// `$HOME/.config/stl-next`.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("STL_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("stl-next"));
        }
    }
    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".config/stl-next"));
    }
    Err(ConfigError::NoConfigDir)
}

fn game_config_path(config_dir: &Path, app_id: AppId) -> PathBuf {
    config_dir.join("games").join(format!("{app_id}.toml"))
}

impl GameConfig {
    /// Load the config for `app_id` under `config_dir`. Missing file,
    /// parse failure, or a malformed-but-present file all degrade to
    /// `GameConfig::default()` (with `app_id` filled in) — only an
    /// oversized file is an error, per spec §4.4.
    pub fn load(config_dir: &Path, app_id: AppId) -> Result<Self, ConfigError> {
        let path = game_config_path(config_dir, app_id);

        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(_) => {
                return Ok(Self {
                    app_id,
                    ..Default::default()
                });
            }
        };
        if metadata.len() > MAX_CONFIG_BYTES {
            return Err(ConfigError::ConfigFileTooLarge(metadata.len()));
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("failed to read game config {}: {e}", path.display());
                return Ok(Self {
                    app_id,
                    ..Default::default()
                });
            }
        };

        match toml::from_str::<GameConfig>(&contents) {
            Ok(mut cfg) => {
                cfg.app_id = app_id;
                Ok(cfg)
            }
            Err(e) => {
                tracing::warn!("failed to parse game config {}: {e}", path.display());
                Ok(Self {
                    app_id,
                    ..Default::default()
                })
            }
        }
    }

    /// Write this config atomically (create-truncate) to
    /// `<config_dir>/games/<app_id>.toml`, creating parent directories
    /// idempotently (spec §4.4).
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let path = game_config_path(config_dir, self.app_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self).map_err(|e| {
            ConfigError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
        })?;
        std::fs::write(&path, contents)?;
        Ok(())
    }
}

/// One user-added, non-Steam game entry, keyed by a negative `AppId`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NonSteamEntry {
    pub app_id: AppId,
    pub name: String,
    pub executable: PathBuf,
    pub arguments: Option<String>,
}

/// Registry of non-Steam games at `<config_dir>/nonsteam.toml` (spec §6's
/// persisted-state layout; not otherwise detailed as an operation in §4).
/// New entries are assigned ids by decrementing from -1000, matching the
/// `AppId` invariant that user-added entries are negative.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NonSteamRegistry {
    pub entries: Vec<NonSteamEntry>,
}

fn registry_path(config_dir: &Path) -> PathBuf {
    config_dir.join("nonsteam.toml")
}

impl NonSteamRegistry {
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = registry_path(config_dir);
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(_) => return Ok(Self::default()),
        };
        if metadata.len() > MAX_CONFIG_BYTES {
            return Err(ConfigError::ConfigFileTooLarge(metadata.len()));
        }
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("failed to read non-Steam registry {}: {e}", path.display());
                return Ok(Self::default());
            }
        };
        match toml::from_str(&contents) {
            Ok(reg) => Ok(reg),
            Err(e) => {
                tracing::warn!("failed to parse non-Steam registry {}: {e}", path.display());
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let path = registry_path(config_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self).map_err(|e| {
            ConfigError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
        })?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    /// The next id to assign: one less than the smallest existing id, or
    /// -1000 for the first entry.
    fn next_app_id(&self) -> AppId {
        self.entries.iter().map(|e| e.app_id).min().map(|m| m - 1).unwrap_or(-1000)
    }

    pub fn add(&mut self, name: String, executable: PathBuf, arguments: Option<String>) -> AppId {
        let app_id = self.next_app_id();
        self.entries.push(NonSteamEntry {
            app_id,
            name,
            executable,
            arguments,
        });
        app_id
    }

    pub fn get(&self, app_id: AppId) -> Option<&NonSteamEntry> {
        self.entries.iter().find(|e| e.app_id == app_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_returns_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = GameConfig::load(tmp.path(), 413150).unwrap();
        assert_eq!(cfg, GameConfig { app_id: 413150, ..Default::default() });
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = GameConfig {
            app_id: 413150,
            prefer_native: true,
            extra_launch_arguments: Some("-skipintro".into()),
            ..Default::default()
        };
        cfg.tinker_settings.insert("mangohud".into(), toml::Value::Boolean(true));
        cfg.save(tmp.path()).unwrap();

        let loaded = GameConfig::load(tmp.path(), 413150).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn oversized_file_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("games").join("1.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, vec![b'a'; (MAX_CONFIG_BYTES + 1) as usize]).unwrap();

        let result = GameConfig::load(tmp.path(), 1);
        assert!(matches!(result, Err(ConfigError::ConfigFileTooLarge(_))));
    }

    #[test]
    fn malformed_file_degrades_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("games").join("1.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not = [valid toml").unwrap();

        let cfg = GameConfig::load(tmp.path(), 1).unwrap();
        assert_eq!(cfg, GameConfig { app_id: 1, ..Default::default() });
    }

    #[test]
    fn config_dir_prefers_stl_config_dir_env() {
        std::env::set_var("STL_CONFIG_DIR", "/tmp/stl-next-test-config");
        let dir = config_dir().unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/stl-next-test-config"));
        std::env::remove_var("STL_CONFIG_DIR");
    }

    #[test]
    fn non_steam_registry_assigns_descending_ids() {
        let mut registry = NonSteamRegistry::default();
        let first = registry.add("My Game".into(), PathBuf::from("/usr/bin/mygame"), None);
        let second = registry.add("Another".into(), PathBuf::from("/usr/bin/another"), None);
        assert_eq!(first, -1000);
        assert_eq!(second, -1001);
    }

    #[test]
    fn non_steam_registry_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = NonSteamRegistry::default();
        registry.add("My Game".into(), PathBuf::from("/usr/bin/mygame"), Some("--fullscreen".into()));
        registry.save(tmp.path()).unwrap();

        let loaded = NonSteamRegistry::load(tmp.path()).unwrap();
        assert_eq!(loaded, registry);
        assert_eq!(loaded.get(-1000).unwrap().name, "My Game");
    }
}
