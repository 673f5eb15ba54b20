//! CLI surface (spec §6): thin `clap` wiring over the library modules.
//! Business logic lives in `launcher`, `steam`, `appinfo`, `config`,
//! `daemon`, `protocol`, and `nxm` — this module only parses argv,
//! calls through, and formats output.

use crate::config::{self, GameConfig, NonSteamRegistry};
use crate::daemon::{self, Daemon};
use crate::error::StlError;
use crate::protocol::{Action, Request};
use crate::steam::AppId;
use crate::{appinfo, launcher, nxm, steam};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "stl", author, version, about = "Launch and tinker with Steam and non-Steam games")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Print what would happen without spawning anything")]
    pub dry_run: bool,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Launch a game by its Steam app id (or a negative non-Steam id)")]
    Launch {
        id: AppId,
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },

    #[command(about = "Show resolved game info without launching")]
    Info { id: AppId },

    #[command(about = "List installed games across all Steam libraries")]
    ListGames,

    #[command(about = "List installed Proton runtimes")]
    ListProtons,

    #[command(about = "Run the wait-requester daemon for a game launch")]
    Wait {
        id: AppId,
        #[arg(long, help = "Display name to report over the control socket")]
        name: Option<String>,
        #[arg(long, help = "Countdown length in seconds (overrides STL_COUNTDOWN)")]
        countdown: Option<u32>,
    },

    #[command(subcommand, about = "Talk to a running daemon's control socket")]
    Ui(UiCommands),

    #[command(about = "Parse an nxm:// mod-download URL")]
    Nxm {
        url: String,
        #[arg(long, help = "Print the downstream-safe encoded form instead")]
        encode: bool,
    },

    #[command(subcommand, about = "Inspect or edit a per-app profile")]
    Profile(ProfileCommands),
}

#[derive(Subcommand)]
pub enum UiCommands {
    Status { id: AppId },
    Pause { id: AppId },
    Resume { id: AppId },
    Proceed { id: AppId },
    Abort { id: AppId },
    ToggleTinker {
        id: AppId,
        tinker_id: String,
        #[arg(long)]
        enabled: Option<bool>,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    #[command(about = "Show a game's saved configuration")]
    Show { id: AppId },
    #[command(about = "Set a single configuration key")]
    Set { id: AppId, key: String, value: String },
    #[command(about = "Register a non-Steam game, assigning it a negative id")]
    AddNonSteam {
        name: String,
        executable: PathBuf,
        #[arg(long)]
        arguments: Option<String>,
    },
    #[command(about = "List registered non-Steam games")]
    ListNonSteam,
}

pub async fn run(cli: Cli) -> Result<(), StlError> {
    match cli.command {
        Commands::Launch { id, args } => launch(id, args, cli.dry_run).await,
        Commands::Info { id } => info(id),
        Commands::ListGames => list_games(),
        Commands::ListProtons => list_protons(),
        Commands::Wait { id, name, countdown } => wait(id, name, countdown).await,
        Commands::Ui(ui) => ui_command(ui).await,
        Commands::Nxm { url, encode } => nxm_command(&url, encode),
        Commands::Profile(action) => profile_command(action),
    }
}

async fn launch(id: AppId, args: Vec<String>, dry_run: bool) -> Result<(), StlError> {
    match launcher::launch(id, &args, dry_run).await? {
        launcher::LaunchOutcome::DryRun(report) => {
            println!("argv: {}", report.argv.join(" "));
            println!("env vars: {}", report.env_var_count);
            println!("setup time: {:?}", report.setup_time);
        }
        launcher::LaunchOutcome::Spawned { pid } => {
            println!("launched (pid {pid})");
        }
    }
    Ok(())
}

fn info(id: AppId) -> Result<(), StlError> {
    let home = dirs::home_dir().ok_or_else(|| StlError::Environment("no home directory".into()))?;
    let root = steam::locate_root(&home)?;
    let libraries = steam::library_folders(&root);
    let installed = steam::list_installed_games(&libraries);
    let manifest = installed.iter().find(|g| g.app_id == id);
    let install_dir_fallback = manifest.map(|g| g.install_dir.clone()).unwrap_or_default();

    let numeric_id: u32 = id.try_into().map_err(|_| StlError::NotFound(format!("app id {id} is not a Steam title")))?;
    let appinfo_path = root.path.join("appcache/appinfo.vdf");
    let mut index = appinfo::AppInfoIndex::open(&appinfo_path)?;
    let entry = index.find(numeric_id)?.ok_or_else(|| StlError::NotFound(id.to_string()))?;
    let game = appinfo::materialize(id, &entry, &install_dir_fallback, manifest.is_some());

    println!("{} (app {})", game.display_name, game.app_id);
    println!("install dir: {}", game.install_dir);
    println!("installed: {}", game.is_installed);
    match &game.primary_executable {
        Some(exe) => println!("primary executable: {exe}"),
        None => println!("primary executable: none for this platform"),
    }
    for opt in &game.launch_options {
        println!("  launch option {}: {} {}", opt.id, opt.executable, opt.arguments.as_deref().unwrap_or(""));
    }
    Ok(())
}

fn list_games() -> Result<(), StlError> {
    let home = dirs::home_dir().ok_or_else(|| StlError::Environment("no home directory".into()))?;
    let root = steam::locate_root(&home)?;
    let libraries = steam::library_folders(&root);
    for game in steam::list_installed_games(&libraries) {
        println!("{}\t{}", game.app_id, game.name);
    }

    let config_dir = config::config_dir()?;
    let registry = NonSteamRegistry::load(&config_dir)?;
    for entry in &registry.entries {
        println!("{}\t{} (non-Steam)", entry.app_id, entry.name);
    }
    Ok(())
}

fn list_protons() -> Result<(), StlError> {
    let home = dirs::home_dir().ok_or_else(|| StlError::Environment("no home directory".into()))?;
    let root = steam::locate_root(&home)?;
    let libraries = steam::library_folders(&root);
    for name in launcher::list_installed_protons(&root, &libraries) {
        println!("{name}");
    }
    Ok(())
}

async fn wait(id: AppId, name: Option<String>, countdown: Option<u32>) -> Result<(), StlError> {
    let config_dir = config::config_dir()?;
    let game_name = name.unwrap_or_else(|| format!("Game {id}"));
    let ttl = countdown.or_else(|| std::env::var("STL_COUNTDOWN").ok().and_then(|s| s.parse().ok()));

    let path = daemon::socket_path(id);
    match daemon::bind_or_detect_running(&path).await? {
        None => {
            println!("a daemon is already serving app {id}");
            Ok(())
        }
        Some(listener) => {
            let d = Daemon::new(id, game_name, config_dir, ttl)?;
            let final_state = daemon::run(d, listener).await;
            println!("daemon finished in state {final_state:?}");
            Ok(())
        }
    }
}

async fn ui_command(cmd: UiCommands) -> Result<(), StlError> {
    let (id, action, tinker_id, enabled) = match cmd {
        UiCommands::Status { id } => (id, Action::GetStatus, None, None),
        UiCommands::Pause { id } => (id, Action::PauseLaunch, None, None),
        UiCommands::Resume { id } => (id, Action::ResumeLaunch, None, None),
        UiCommands::Proceed { id } => (id, Action::Proceed, None, None),
        UiCommands::Abort { id } => (id, Action::Abort, None, None),
        UiCommands::ToggleTinker { id, tinker_id, enabled } => (id, Action::ToggleTinker, Some(tinker_id), enabled),
    };

    let path = daemon::socket_path(id);
    let req = Request { action, tinker_id, enabled };
    let resp = crate::protocol::send_request(&path, &req, Duration::from_secs(5)).await?;

    println!("state: {}", resp.state);
    println!("countdown: {}s", resp.countdown_seconds);
    println!("game: {}", resp.game_name);
    for (tinker, enabled) in &resp.tinkers {
        println!("  {tinker}: {enabled}");
    }
    if let Some(msg) = &resp.error_message {
        println!("error: {msg}");
    }
    Ok(())
}

fn nxm_command(url: &str, encode: bool) -> Result<(), StlError> {
    let parsed = nxm::parse(url)?;
    if encode {
        println!("{}", nxm::encode_for_host(url));
        return Ok(());
    }

    match &parsed.link {
        nxm::NxmLink::ModDownload { game_domain, mod_id, file_id } => {
            println!("mod download: {game_domain}/{mod_id}");
            if let Some(f) = file_id {
                println!("  file: {f}");
            }
        }
        nxm::NxmLink::Collection { game_domain, collection_slug, revision_id } => {
            println!("collection: {game_domain}/{collection_slug}");
            match revision_id {
                Some(r) => println!("  revision: {r}"),
                None => println!("  revision: unspecified (incomplete)"),
            }
        }
        nxm::NxmLink::Unknown { game_domain } => {
            println!("unrecognized link for domain {game_domain}");
        }
    }
    if parsed.is_incomplete_collection() {
        println!("warning: collection link has no revision id");
    }
    if let Some(key) = &parsed.query.download_key {
        println!("download key: {key}");
    }
    if let Some(expires) = parsed.query.expires_at {
        println!("expires at: {expires}");
    }
    Ok(())
}

fn profile_command(action: ProfileCommands) -> Result<(), StlError> {
    let config_dir = config::config_dir()?;
    match action {
        ProfileCommands::Show { id } => {
            let cfg = GameConfig::load(&config_dir, id)?;
            println!("prefer_native: {}", cfg.prefer_native);
            println!("runtime_override: {}", cfg.runtime_override.as_deref().unwrap_or("(default)"));
            println!("extra_launch_arguments: {}", cfg.extra_launch_arguments.as_deref().unwrap_or(""));
            println!("gpu_preference: {}", cfg.gpu_preference.as_deref().unwrap_or("(default)"));
            Ok(())
        }
        ProfileCommands::Set { id, key, value } => {
            let mut cfg = GameConfig::load(&config_dir, id)?;
            match key.as_str() {
                "prefer_native" => cfg.prefer_native = value.parse().unwrap_or(false),
                "runtime_override" => cfg.runtime_override = Some(value),
                "extra_launch_arguments" => cfg.extra_launch_arguments = Some(value),
                "gpu_preference" => cfg.gpu_preference = Some(value),
                other => return Err(StlError::Malformed(format!("unknown profile key: {other}"))),
            }
            cfg.save(&config_dir)?;
            println!("saved");
            Ok(())
        }
        ProfileCommands::AddNonSteam { name, executable, arguments } => {
            let mut registry = NonSteamRegistry::load(&config_dir)?;
            let app_id = registry.add(name, executable, arguments);
            registry.save(&config_dir)?;
            println!("registered as app {app_id}");
            Ok(())
        }
        ProfileCommands::ListNonSteam => {
            let registry = NonSteamRegistry::load(&config_dir)?;
            for entry in &registry.entries {
                println!("{}\t{}\t{}", entry.app_id, entry.name, entry.executable.display());
            }
            Ok(())
        }
    }
}
