//! Launcher (C6), spec §4.6: the ten-step compose-and-spawn algorithm.
//!
//! Grounded on `game_launcher.rs::GameLauncher::launch_game`'s overall
//! shape (build command, seed env, spawn, return a handle) and on
//! `find_proton_binary`'s search order, adapted to the tinker pipeline
//! and dry-run contract spec §4.6 actually specifies.

use crate::appinfo::{self, GameInfo};
use crate::config::{self, GameConfig};
use crate::error::{LaunchError, SteamError};
use crate::steam::{self, AppId, SteamRoot};
use crate::tinker::{self, ArgVec, Context, EnvMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::process::Command;

pub const DEFAULT_PROTON_NAME: &str = "Proton Experimental";

#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub argv: Vec<String>,
    pub env_var_count: usize,
    pub setup_time: Duration,
}

#[derive(Debug)]
pub enum LaunchOutcome {
    DryRun(LaunchReport),
    Spawned { pid: u32 },
}

/// Proton binary lookup (spec §4.6): first the current Steam root's
/// `compatibilitytools.d/<name>/proton`, then each library folder's
/// `steamapps/common/<name>/proton`.
pub fn find_proton_binary(steam_root: &SteamRoot, libraries: &[PathBuf], name: &str) -> Result<PathBuf, LaunchError> {
    let local = steam_root.path.join("compatibilitytools.d").join(name).join("proton");
    if local.exists() {
        return Ok(local);
    }
    for lib in libraries {
        let candidate = lib.join("steamapps/common").join(name).join("proton");
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(LaunchError::ProtonNotFound(name.to_string()))
}

/// Enumerate installed Proton runtime names across `compatibilitytools.d`
/// and each library's `steamapps/common`, for `list-protons`.
pub fn list_installed_protons(steam_root: &SteamRoot, libraries: &[PathBuf]) -> Vec<String> {
    let mut out = Vec::new();
    let mut roots = vec![steam_root.path.join("compatibilitytools.d")];
    roots.extend(libraries.iter().map(|lib| lib.join("steamapps/common")));

    for root in roots {
        let Ok(entries) = std::fs::read_dir(&root) else { continue };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_ascii_lowercase().contains("proton") {
                continue;
            }
            if entry.path().join("proton").exists() && !out.contains(&name) {
                out.push(name);
            }
        }
    }
    out
}

/// A Proton hint is present when the config names a runtime explicitly,
/// the appinfo entry carries one, or the primary executable is a Windows
/// binary — any of these means "this title cannot run as-is on Linux".
fn proton_hint_present(config: &GameConfig, info: &GameInfo) -> bool {
    config.runtime_override.is_some()
        || info.proton_runtime_hint.is_some()
        || info
            .primary_executable
            .as_deref()
            .map(|e| e.to_ascii_lowercase().ends_with(".exe"))
            .unwrap_or(false)
}

/// Steps 3-8 of the algorithm: build paths, seed env, choose native vs.
/// Proton, append extra args, run the tinker pipeline. Kept separate from
/// directory/appinfo resolution so it can be unit tested without a real
/// Steam installation.
fn compose(
    steam_root: &SteamRoot,
    libraries: &[PathBuf],
    info: &GameInfo,
    config: &GameConfig,
    config_dir: &Path,
    extra_args: &[String],
) -> Result<(EnvMap, ArgVec), LaunchError> {
    let app_id = info.app_id;
    let prefix_path = steam_root.path.join("steamapps/compatdata").join(app_id.to_string()).join("pfx");
    let compat_data_path = steam_root.path.join("steamapps/compatdata").join(app_id.to_string());
    let scratch_dir = std::env::temp_dir().join("stl-next").join(app_id.to_string());
    std::fs::create_dir_all(&scratch_dir)?;

    let mut env = EnvMap::from_current_env();
    env.set("SteamAppId", app_id.to_string());
    env.set("SteamGameId", app_id.to_string());
    env.set("STEAM_COMPAT_DATA_PATH", compat_data_path.display().to_string());

    let mut argv = ArgVec::new();
    let use_native = config.prefer_native || !proton_hint_present(config, info);

    if use_native {
        let executable = info
            .primary_executable
            .as_ref()
            .ok_or_else(|| LaunchError::GameNotFound(format!("no launch option for app {app_id}")))?;
        argv.push(format!("{}/{}", info.install_dir, executable));
    } else {
        let name = config.runtime_override.clone().unwrap_or_else(|| DEFAULT_PROTON_NAME.to_string());
        let proton = find_proton_binary(steam_root, libraries, &name)?;
        let executable = info
            .primary_executable
            .as_ref()
            .ok_or_else(|| LaunchError::GameNotFound(format!("no launch option for app {app_id}")))?;
        argv.push(proton.display().to_string());
        argv.push("run");
        argv.push(format!("{}/{}", info.install_dir, executable));
    }

    argv.extend(extra_args.iter().cloned());

    if let Some(extra) = &config.extra_launch_arguments {
        argv.extend(extra.split_ascii_whitespace().map(String::from));
    }

    let ctx = Context {
        app_id,
        game_name: info.display_name.clone(),
        install_dir: PathBuf::from(&info.install_dir),
        prefix_path,
        scratch_dir,
        config_dir: config_dir.to_path_buf(),
        config,
    };
    let registry = tinker::default_registry();
    registry.run(&ctx, &mut env, &mut argv).map_err(|e| LaunchError::TinkerFatal(e.to_string()))?;

    Ok((env, argv))
}

fn resolve_game_info(app_id: AppId) -> Result<(SteamRoot, Vec<PathBuf>, GameInfo), LaunchError> {
    let home = dirs::home_dir().ok_or(LaunchError::Steam(SteamError::SteamNotFound))?;
    let root = steam::locate_root(&home)?;
    let libraries = steam::library_folders(&root);
    let installed = steam::list_installed_games(&libraries);
    let manifest = installed.iter().find(|g| g.app_id == app_id);
    let install_dir_fallback = manifest.map(|g| g.install_dir.clone()).unwrap_or_default();

    let numeric_id: u32 = app_id
        .try_into()
        .map_err(|_| LaunchError::GameNotFound(format!("app id {app_id} is not a Steam title")))?;

    let appinfo_path = root.path.join("appcache/appinfo.vdf");
    let mut index = appinfo::AppInfoIndex::open(&appinfo_path)?;
    let entry = index
        .find(numeric_id)?
        .ok_or_else(|| LaunchError::GameNotFound(app_id.to_string()))?;
    let info = appinfo::materialize(app_id, &entry, &install_dir_fallback, manifest.is_some());

    Ok((root, libraries, info))
}

/// Run the full ten-step algorithm (spec §4.6).
pub async fn launch(app_id: AppId, extra_args: &[String], dry_run: bool) -> Result<LaunchOutcome, LaunchError> {
    let start = Instant::now();

    let config_dir = config::config_dir()?;
    let game_config = GameConfig::load(&config_dir, app_id)?;

    let (steam_root, libraries, info) = resolve_game_info(app_id)?;

    let (env, argv) = compose(&steam_root, &libraries, &info, &game_config, &config_dir, extra_args)?;

    if dry_run {
        return Ok(LaunchOutcome::DryRun(LaunchReport {
            argv: argv.into_vec(),
            env_var_count: env.len(),
            setup_time: start.elapsed(),
        }));
    }

    let argv = argv.into_vec();
    let (program, args) = argv.split_first().ok_or_else(|| LaunchError::GameNotFound(app_id.to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.env_clear();
    for (k, v) in env.iter() {
        cmd.env(k, v);
    }

    let child = cmd.spawn()?;
    let pid = child.id().unwrap_or(0);
    tracing::info!(app_id, pid, "launched");
    Ok(LaunchOutcome::Spawned { pid })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appinfo::LaunchOption;
    use crate::steam::InstallationClass;

    fn sample_info(primary: Option<&str>) -> GameInfo {
        GameInfo {
            app_id: 413150,
            display_name: "Stardew Valley".into(),
            install_dir: "Stardew Valley".into(),
            primary_executable: primary.map(String::from),
            launch_options: vec![LaunchOption {
                id: 0,
                executable: primary.unwrap_or("StardewValley").to_string(),
                arguments: None,
                description: None,
                os_filter: None,
            }],
            proton_runtime_hint: None,
            is_installed: true,
        }
    }

    fn sample_root(path: &Path) -> SteamRoot {
        SteamRoot {
            path: path.to_path_buf(),
            class: InstallationClass::Native,
        }
    }

    #[test]
    fn native_selected_when_no_proton_hint() {
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_root(tmp.path());
        let info = sample_info(Some("StardewValley"));
        let config = GameConfig::default();
        let (_, argv) = compose(&root, &[], &info, &config, tmp.path(), &[]).unwrap();
        assert_eq!(argv.as_slice()[0], "Stardew Valley/StardewValley");
    }

    #[test]
    fn exe_executable_requires_proton_and_fails_without_one() {
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_root(tmp.path());
        let info = sample_info(Some("game.exe"));
        let config = GameConfig::default();
        let result = compose(&root, &[], &info, &config, tmp.path(), &[]);
        assert!(matches!(result, Err(LaunchError::ProtonNotFound(_))));
    }

    #[test]
    fn proton_found_in_compatibilitytools_d() {
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_root(tmp.path());
        let proton_dir = root.path.join("compatibilitytools.d/Proton Experimental");
        std::fs::create_dir_all(&proton_dir).unwrap();
        std::fs::write(proton_dir.join("proton"), b"").unwrap();

        let info = sample_info(Some("game.exe"));
        let config = GameConfig::default();
        let (_, argv) = compose(&root, &[], &info, &config, tmp.path(), &[]).unwrap();
        assert_eq!(argv.as_slice()[1], "run");
        assert_eq!(argv.as_slice()[2], "Stardew Valley/game.exe");
    }

    #[test]
    fn prefer_native_overrides_exe_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_root(tmp.path());
        let info = sample_info(Some("game.exe"));
        let config = GameConfig {
            prefer_native: true,
            ..Default::default()
        };
        let (_, argv) = compose(&root, &[], &info, &config, tmp.path(), &[]).unwrap();
        assert_eq!(argv.as_slice()[0], "Stardew Valley/game.exe");
    }

    #[test]
    fn extra_args_then_config_args_appended_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_root(tmp.path());
        let info = sample_info(Some("StardewValley"));
        let config = GameConfig {
            extra_launch_arguments: Some("-skipintro  -windowed".into()),
            ..Default::default()
        };
        let (_, argv) = compose(&root, &[], &info, &config, tmp.path(), &["--extra".to_string()]).unwrap();
        assert_eq!(
            argv.as_slice(),
            &["Stardew Valley/StardewValley", "--extra", "-skipintro", "-windowed"]
        );
    }

    #[test]
    fn env_carries_steam_identity_vars() {
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_root(tmp.path());
        let info = sample_info(Some("StardewValley"));
        let config = GameConfig::default();
        let (env, _) = compose(&root, &[], &info, &config, tmp.path(), &[]).unwrap();
        assert_eq!(env.get("SteamAppId"), Some("413150"));
        assert_eq!(env.get("SteamGameId"), Some("413150"));
        assert!(env.get("STEAM_COMPAT_DATA_PATH").unwrap().ends_with("413150"));
    }

    #[test]
    fn list_installed_protons_finds_compatibilitytools_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_root(tmp.path());
        let proton_dir = root.path.join("compatibilitytools.d/Proton Experimental");
        std::fs::create_dir_all(&proton_dir).unwrap();
        std::fs::write(proton_dir.join("proton"), b"").unwrap();
        std::fs::create_dir_all(root.path.join("compatibilitytools.d/not-a-proton")).unwrap();

        let found = list_installed_protons(&root, &[]);
        assert_eq!(found, vec!["Proton Experimental".to_string()]);
    }
}
