//! Concrete built-in tinkers (spec §4.5's parenthetical list), grounded on
//! the env-var sets and wrapper-command composition in
//! `game_launcher.rs`'s `wrap_with_performance_tools`/`run_script`. These
//! exist to exercise the registry protocol with real (if simple)
//! behavior, not to reimplement a full performance-tooling suite.

use super::{ArgVec, Context, EnvMap, Registry, Tinker};
use crate::error::TinkerError;

fn is_enabled(ctx: &Context, id: &str) -> bool {
    match ctx.config.tinker_settings.get(id) {
        Some(toml::Value::Boolean(b)) => *b,
        Some(toml::Value::Table(t)) => t.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true),
        Some(_) => true,
        None => false,
    }
}

fn setting_table<'a>(ctx: &'a Context, id: &str) -> Option<&'a toml::value::Table> {
    match ctx.config.tinker_settings.get(id) {
        Some(toml::Value::Table(t)) => Some(t),
        _ => None,
    }
}

/// Injects `MANGOHUD=1` (and an optional config file path) so the MangoHud
/// overlay layer activates for the child process.
pub struct MangoHudTinker;

impl Tinker for MangoHudTinker {
    fn id(&self) -> &str {
        "mangohud"
    }
    fn priority(&self) -> i32 {
        10
    }
    fn applicable(&self, ctx: &Context) -> bool {
        is_enabled(ctx, self.id())
    }
    fn modify_env(&self, ctx: &Context, env: &mut EnvMap) -> Result<(), TinkerError> {
        env.set("MANGOHUD", "1");
        if let Some(path) = setting_table(ctx, self.id()).and_then(|t| t.get("config_file")).and_then(|v| v.as_str()) {
            env.set("MANGOHUD_CONFIGFILE", path);
        }
        Ok(())
    }
}

/// Sets `WINEDLLOVERRIDES` from a table of `dll = "mode"` pairs, e.g.
/// `{ "d3d11" = "n,b" }` becomes `d3d11=n,b`.
pub struct DllOverrideTinker;

impl Tinker for DllOverrideTinker {
    fn id(&self) -> &str {
        "dll_overrides"
    }
    fn priority(&self) -> i32 {
        15
    }
    fn applicable(&self, ctx: &Context) -> bool {
        setting_table(ctx, self.id()).is_some_and(|t| !t.is_empty())
    }
    fn modify_env(&self, ctx: &Context, env: &mut EnvMap) -> Result<(), TinkerError> {
        let Some(table) = setting_table(ctx, self.id()) else { return Ok(()) };
        let joined = table
            .iter()
            .filter_map(|(dll, mode)| mode.as_str().map(|m| format!("{dll}={m}")))
            .collect::<Vec<_>>()
            .join(";");
        if !joined.is_empty() {
            env.set("WINEDLLOVERRIDES", joined);
        }
        Ok(())
    }
}

/// A logged no-op hook point for an external D-Bus collaborator (power
/// profile / idle-inhibit requests). D-Bus itself is out of scope (spec
/// §1 Non-goals); this tinker only marks the handoff point.
pub struct PowerHookTinker;

impl Tinker for PowerHookTinker {
    fn id(&self) -> &str {
        "power_hook"
    }
    fn priority(&self) -> i32 {
        5
    }
    fn applicable(&self, ctx: &Context) -> bool {
        is_enabled(ctx, self.id())
    }
    fn prepare(&self, ctx: &Context) -> Result<(), TinkerError> {
        tracing::info!(app_id = ctx.app_id, "power hook requested; handing off to session D-Bus collaborator");
        Ok(())
    }
}

/// Spawns a companion process (e.g. a mod-manager forwarder) alongside
/// the main launch rather than wrapping its argv. The helper's own
/// lifecycle is not tracked beyond spawn.
pub struct HelperAppTinker;

impl Tinker for HelperAppTinker {
    fn id(&self) -> &str {
        "helper_app"
    }
    fn priority(&self) -> i32 {
        20
    }
    fn applicable(&self, ctx: &Context) -> bool {
        setting_table(ctx, self.id()).and_then(|t| t.get("command")).and_then(|v| v.as_str()).is_some()
    }
    fn prepare(&self, ctx: &Context) -> Result<(), TinkerError> {
        let Some(command) = setting_table(ctx, self.id()).and_then(|t| t.get("command")).and_then(|v| v.as_str()) else {
            return Ok(());
        };
        match std::process::Command::new("sh").arg("-c").arg(command).spawn() {
            Ok(child) => {
                tracing::info!(pid = child.id(), "helper app spawned");
                Ok(())
            }
            Err(e) => Err(TinkerError::Warn {
                id: self.id().to_string(),
                message: format!("failed to spawn helper app: {e}"),
            }),
        }
    }
}

/// Runs a pre-launch shell command synchronously in `prepare`, grounded on
/// `game_launcher.rs::run_script_blocking`. The post-launch half of that
/// pattern lives in the launcher itself, run after the child exits — it
/// is outside the tinker pipeline's scope since `Tinker` has no
/// post-spawn hook (spec §4.5).
pub struct ShellHookTinker;

impl Tinker for ShellHookTinker {
    fn id(&self) -> &str {
        "shell_hook"
    }
    fn priority(&self) -> i32 {
        1
    }
    fn applicable(&self, ctx: &Context) -> bool {
        setting_table(ctx, self.id()).and_then(|t| t.get("pre")).and_then(|v| v.as_str()).is_some()
    }
    fn prepare(&self, ctx: &Context) -> Result<(), TinkerError> {
        let Some(script) = setting_table(ctx, self.id()).and_then(|t| t.get("pre")).and_then(|v| v.as_str()) else {
            return Ok(());
        };
        let status = std::process::Command::new("bash").arg("-c").arg(script).status();
        match status {
            Ok(s) if s.success() => Ok(()),
            Ok(s) => Err(TinkerError::Warn {
                id: self.id().to_string(),
                message: format!("pre-launch script exited with {s:?}"),
            }),
            Err(e) => Err(TinkerError::Fatal {
                id: self.id().to_string(),
                message: format!("failed to run pre-launch script: {e}"),
            }),
        }
    }
}

/// Wraps the command with `gamemoderun`, when present on `PATH` and
/// enabled, by pushing it to the front of argv.
pub struct GamemodeTinker;

impl Tinker for GamemodeTinker {
    fn id(&self) -> &str {
        "gamemode"
    }
    fn priority(&self) -> i32 {
        50
    }
    fn applicable(&self, ctx: &Context) -> bool {
        is_enabled(ctx, self.id()) && which::which("gamemoderun").is_ok()
    }
    fn modify_argv(&self, _ctx: &Context, argv: &mut ArgVec) -> Result<(), TinkerError> {
        argv.push_front(["gamemoderun".to_string()]);
        Ok(())
    }
}

/// Wraps the command with a `gamescope`-shaped compositor, outermost of
/// the wrapping tinkers (highest priority among them, per spec §4.5's
/// front-push discipline).
pub struct CompositorTinker;

const DEFAULT_GAMESCOPE_ARGS: &[&str] = &["-W", "1920", "-H", "1080", "-f"];

impl Tinker for CompositorTinker {
    fn id(&self) -> &str {
        "compositor"
    }
    fn priority(&self) -> i32 {
        60
    }
    fn applicable(&self, ctx: &Context) -> bool {
        is_enabled(ctx, self.id())
    }
    fn modify_argv(&self, ctx: &Context, argv: &mut ArgVec) -> Result<(), TinkerError> {
        let mut parts = vec!["gamescope".to_string()];
        match setting_table(ctx, self.id()).and_then(|t| t.get("options")).and_then(|v| v.as_str()) {
            Some(opts) => parts.extend(opts.split_whitespace().map(String::from)),
            None => parts.extend(DEFAULT_GAMESCOPE_ARGS.iter().map(|s| s.to_string())),
        }
        parts.push("--".to_string());
        argv.push_front(parts);
        Ok(())
    }
}

/// Construct the registry of built-in tinkers in registration order
/// (priority ties, where they occur, break by this order).
pub fn default_registry() -> Registry {
    Registry::new(vec![
        Box::new(ShellHookTinker),
        Box::new(PowerHookTinker),
        Box::new(MangoHudTinker),
        Box::new(DllOverrideTinker),
        Box::new(HelperAppTinker),
        Box::new(GamemodeTinker),
        Box::new(CompositorTinker),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use std::path::PathBuf;

    fn context_with(config: &GameConfig) -> Context {
        Context {
            app_id: 1,
            game_name: "Test".into(),
            install_dir: PathBuf::from("/games/test"),
            prefix_path: PathBuf::from("/prefix"),
            scratch_dir: PathBuf::from("/scratch"),
            config_dir: PathBuf::from("/config"),
            config,
        }
    }

    #[test]
    fn mangohud_sets_env_when_enabled() {
        let mut config = GameConfig::default();
        config.tinker_settings.insert("mangohud".into(), toml::Value::Boolean(true));
        let ctx = context_with(&config);
        let tinker = MangoHudTinker;
        assert!(tinker.applicable(&ctx));
        let mut env = EnvMap::new();
        tinker.modify_env(&ctx, &mut env).unwrap();
        assert_eq!(env.get("MANGOHUD"), Some("1"));
    }

    #[test]
    fn mangohud_inapplicable_by_default() {
        let config = GameConfig::default();
        let ctx = context_with(&config);
        assert!(!MangoHudTinker.applicable(&ctx));
    }

    #[test]
    fn dll_overrides_joins_entries() {
        let mut config = GameConfig::default();
        let mut table = toml::value::Table::new();
        table.insert("d3d11".into(), toml::Value::String("n,b".into()));
        config.tinker_settings.insert("dll_overrides".into(), toml::Value::Table(table));
        let ctx = context_with(&config);
        let mut env = EnvMap::new();
        DllOverrideTinker.modify_env(&ctx, &mut env).unwrap();
        assert_eq!(env.get("WINEDLLOVERRIDES"), Some("d3d11=n,b"));
    }

    #[test]
    fn compositor_wraps_with_default_options_when_unspecified() {
        let mut config = GameConfig::default();
        config.tinker_settings.insert("compositor".into(), toml::Value::Boolean(true));
        let ctx = context_with(&config);
        let mut argv = ArgVec::from_vec(vec!["game".into()]);
        CompositorTinker.modify_argv(&ctx, &mut argv).unwrap();
        assert_eq!(argv.as_slice()[0], "gamescope");
        assert_eq!(argv.as_slice().last().unwrap(), "game");
    }

    #[test]
    fn shell_hook_inapplicable_without_pre_script() {
        let config = GameConfig::default();
        let ctx = context_with(&config);
        assert!(!ShellHookTinker.applicable(&ctx));
    }

    #[test]
    fn default_registry_has_all_seven_builtins() {
        assert_eq!(default_registry().len(), 7);
    }
}
