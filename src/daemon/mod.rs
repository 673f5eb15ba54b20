//! Wait-requester daemon (C7), spec §4.7: owns a per-app Unix-domain
//! socket, runs the countdown state machine, and serves control
//! requests from one connection at a time.

use crate::config::GameConfig;
use crate::error::DaemonError;
use crate::protocol::{self, Action, Request, Response};
use crate::steam::AppId;
use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Initializing,
    Countdown,
    Waiting,
    Launching,
    Running,
    Finished,
    Error,
}

impl DaemonState {
    fn is_terminal(self) -> bool {
        matches!(self, DaemonState::Running | DaemonState::Finished | DaemonState::Error)
    }

    fn as_wire(self) -> &'static str {
        match self {
            DaemonState::Initializing => "Initializing",
            DaemonState::Countdown => "Countdown",
            DaemonState::Waiting => "Waiting",
            DaemonState::Launching => "Launching",
            DaemonState::Running => "Running",
            DaemonState::Finished => "Finished",
            DaemonState::Error => "Error",
        }
    }
}

/// The `{mangohud, compositor, power_hook}`-like bitmap (spec §4.7),
/// seeded from the loaded `GameConfig` and mutated live by
/// `ToggleTinker`.
#[derive(Debug, Clone, Default)]
pub struct TinkerSnapshot(BTreeMap<String, bool>);

const SNAPSHOT_TINKER_IDS: &[&str] = &["mangohud", "compositor", "power_hook", "dll_overrides", "gamemode", "shell_hook", "helper_app"];

impl TinkerSnapshot {
    pub fn from_config(config: &GameConfig) -> Self {
        let mut map = BTreeMap::new();
        for id in SNAPSHOT_TINKER_IDS {
            let enabled = match config.tinker_settings.get(*id) {
                Some(toml::Value::Boolean(b)) => *b,
                Some(toml::Value::Table(t)) => t.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true),
                Some(_) => true,
                None => false,
            };
            map.insert(id.to_string(), enabled);
        }
        Self(map)
    }

    pub fn get(&self, id: &str) -> Option<bool> {
        self.0.get(id).copied()
    }

    /// Flip, or set explicitly when `enabled` is given. Unknown tinker
    /// ids are a no-op.
    pub fn toggle(&mut self, id: &str, enabled: Option<bool>) {
        if let Some(current) = self.0.get_mut(id) {
            *current = enabled.unwrap_or(!*current);
        }
    }

    /// Write this snapshot back into `config.tinker_settings` (spec
    /// §4.7's write-back on the `Launching` transition).
    pub fn write_back(&self, config: &mut GameConfig) {
        for (id, enabled) in &self.0 {
            config.tinker_settings.insert(id.clone(), toml::Value::Boolean(*enabled));
        }
    }

    fn as_response_fields(&self) -> BTreeMap<String, bool> {
        self.0.iter().map(|(id, enabled)| (format!("{id}_enabled"), *enabled)).collect()
    }
}

/// Resolve the per-app socket path: `$XDG_RUNTIME_DIR/stl-next-<id>.sock`,
/// falling back to `/tmp` (spec §4.7).
pub fn socket_path(app_id: AppId) -> PathBuf {
    let dir = std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp"));
    dir.join(format!("stl-next-{app_id}.sock"))
}

pub struct Daemon {
    pub state: DaemonState,
    pub app_id: AppId,
    pub game_name: String,
    pub countdown_seconds: u32,
    pub tinkers: TinkerSnapshot,
    pub config: GameConfig,
    pub config_dir: PathBuf,
    pub error_message: Option<String>,
    last_tick: Instant,
}

const DEFAULT_INITIAL_TTL: u32 = 10;

impl Daemon {
    pub fn new(app_id: AppId, game_name: String, config_dir: PathBuf, initial_ttl: Option<u32>) -> Result<Self, DaemonError> {
        let config = GameConfig::load(&config_dir, app_id).unwrap_or(GameConfig { app_id, ..Default::default() });
        let tinkers = TinkerSnapshot::from_config(&config);
        let skip_wait = std::env::var_os("STL_SKIP_WAIT").is_some();

        Ok(Self {
            state: if skip_wait { DaemonState::Launching } else { DaemonState::Initializing },
            app_id,
            game_name,
            countdown_seconds: initial_ttl.unwrap_or(DEFAULT_INITIAL_TTL),
            tinkers,
            config,
            config_dir,
            error_message: None,
            last_tick: Instant::now(),
        })
    }

    /// Advance on a timer tick (spec §4.7 state table).
    fn tick(&mut self) {
        if self.state == DaemonState::Initializing {
            self.state = DaemonState::Countdown;
            return;
        }
        if self.state != DaemonState::Countdown {
            return;
        }
        if self.last_tick.elapsed() < Duration::from_secs(1) {
            return;
        }
        self.last_tick = Instant::now();
        if self.countdown_seconds == 0 {
            self.transition_to_launching();
        } else {
            self.countdown_seconds -= 1;
            if self.countdown_seconds == 0 {
                self.transition_to_launching();
            }
        }
    }

    fn transition_to_launching(&mut self) {
        self.tinkers.write_back(&mut self.config);
        if let Err(e) = self.config.save(&self.config_dir) {
            tracing::warn!("failed to write back tinker snapshot: {e}");
        }
        self.state = DaemonState::Launching;
    }

    /// Apply one client action to the state machine (spec §4.7's table).
    fn apply(&mut self, req: &Request) -> Response {
        match req.action {
            Action::PauseLaunch => {
                if self.state == DaemonState::Countdown {
                    self.state = DaemonState::Waiting;
                }
            }
            Action::ResumeLaunch => {
                if self.state == DaemonState::Waiting {
                    self.state = DaemonState::Countdown;
                    self.last_tick = Instant::now();
                }
            }
            Action::Proceed => {
                if matches!(self.state, DaemonState::Countdown | DaemonState::Waiting) {
                    self.transition_to_launching();
                }
            }
            Action::Abort => {
                if matches!(self.state, DaemonState::Countdown | DaemonState::Waiting) {
                    self.state = DaemonState::Finished;
                }
            }
            Action::ToggleTinker => {
                if matches!(self.state, DaemonState::Countdown | DaemonState::Waiting) {
                    if let Some(id) = &req.tinker_id {
                        self.tinkers.toggle(id, req.enabled);
                    }
                }
            }
            Action::GetStatus | Action::GetGameInfo | Action::GetTinkers | Action::UpdateConfig => {}
        }
        self.response()
    }

    fn response(&self) -> Response {
        Response {
            state: self.state.as_wire().to_string(),
            countdown_seconds: self.countdown_seconds,
            game_name: self.game_name.clone(),
            app_id: self.app_id,
            tinkers: self.tinkers.as_response_fields(),
            error_message: self.error_message.clone(),
        }
    }

    fn fail(&mut self, message: String) {
        self.error_message = Some(message);
        self.state = DaemonState::Error;
    }
}

/// `sockaddr_un.sun_path` capacity on Linux, including the terminating nul
/// that `bind(2)` requires room for.
const SOCKADDR_UN_PATH_MAX: usize = 108;

/// Bind-vs-connect collision resolution (spec §9): try connecting to an
/// existing socket first; a successful connect means another daemon
/// already owns it, so the caller should become a client instead. A
/// refused connection means the file is stale — unlink and bind.
pub async fn bind_or_detect_running(path: &Path) -> Result<Option<UnixListener>, DaemonError> {
    if path.as_os_str().len() > SOCKADDR_UN_PATH_MAX {
        return Err(DaemonError::PathTooLong(path.to_path_buf()));
    }

    if path.exists() {
        if UnixStream::connect(path).await.is_ok() {
            return Ok(None);
        }
        std::fs::remove_file(path).ok();
    }

    let listener = UnixListener::bind(path).map_err(|source| DaemonError::BindFailed {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(Some(listener))
}

/// The cooperative single-threaded loop (spec §4.7): poll, accept at
/// most one connection, serve it, tick, check terminal conditions.
pub async fn run(mut daemon: Daemon, listener: UnixListener) -> DaemonState {
    loop {
        match tokio::time::timeout(Duration::from_millis(0), listener.accept()).await {
            Ok(Ok((stream, _))) => {
                if let Err(e) = serve_one(&mut daemon, stream).await {
                    tracing::warn!("connection error: {e}");
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("accept error: {e}");
            }
            Err(_) => {}
        }

        daemon.tick();

        if daemon.state.is_terminal() {
            break;
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    daemon.state
}

async fn serve_one(daemon: &mut Daemon, mut stream: UnixStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > protocol::MAX_MESSAGE_BYTES {
            break;
        }
    }

    let response = match protocol::decode_request(&buf) {
        Ok(req) => daemon.apply(&req),
        Err(e) => {
            daemon.fail(format!("malformed request: {e}"));
            daemon.response()
        }
    };

    stream.write_all(&protocol::encode_response(&response)).await?;
    stream.shutdown().await?;
    Ok(())
}
