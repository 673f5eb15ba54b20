use thiserror::Error;

/// Failures from the VDF decoder (C1): both the text and binary readers
/// share this taxonomy even though only a subset applies to each mode.
#[derive(Error, Debug)]
pub enum VdfError {
    #[error("malformed text VDF: {0}")]
    MalformedText(String),

    #[error("VDF string is not valid UTF-8")]
    EncodingError,

    #[error("unknown binary VDF type tag: 0x{0:02x}")]
    UnknownTag(u8),

    #[error("truncated binary VDF stream")]
    Truncated,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from Steam state discovery (C2).
#[derive(Error, Debug)]
pub enum SteamError {
    #[error("Steam installation not found")]
    SteamNotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from the app-info index (C3).
#[derive(Error, Debug)]
pub enum AppInfoError {
    #[error("app id {0} not found in appinfo database")]
    NotFound(u32),

    #[error("truncated appinfo entry")]
    Truncated,

    #[error(transparent)]
    Vdf(#[from] VdfError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from the configuration store (C4). Per spec §4.4/§7, parse
/// failures never surface through this type — only the fatal "no config
/// directory" and "file too large" paths do.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no config directory could be resolved (set STL_CONFIG_DIR, XDG_CONFIG_HOME, or HOME)")]
    NoConfigDir,

    #[error("config file too large: {0} bytes (max 1 MiB)")]
    ConfigFileTooLarge(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-tinker failure, classified by the tinker itself (spec §4.5/§7).
#[derive(Error, Debug)]
pub enum TinkerError {
    #[error("tinker '{id}' failed (warning): {message}")]
    Warn { id: String, message: String },

    #[error("tinker '{id}' failed (fatal): {message}")]
    Fatal { id: String, message: String },
}

impl TinkerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TinkerError::Fatal { .. })
    }
}

/// Failures from the launcher (C6).
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("game not found: {0}")]
    GameNotFound(String),

    #[error("Proton/Wine runtime not found: {0}")]
    ProtonNotFound(String),

    #[error(transparent)]
    Steam(#[from] SteamError),

    #[error(transparent)]
    AppInfo(#[from] AppInfoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("tinker pipeline aborted: {0}")]
    TinkerFatal(String),

    #[error("failed to spawn child process: {0}")]
    SpawnFailed(#[from] std::io::Error),
}

/// Failures surfaced only at the control-protocol client boundary (C8),
/// per spec §7's "Protocol" kind. The daemon itself never returns this —
/// it always answers with a `state = Error` response instead.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("daemon did not respond before the timeout")]
    Timeout,

    #[error("empty response from daemon")]
    EmptyResponse,

    #[error("response exceeded the 64 KiB message limit")]
    OversizeResponse,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failures from the daemon's own lifecycle (C7) — bind/unlink failures
/// are fatal to the daemon process; everything else is logged and dropped.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("failed to bind control socket at {path}: {source}")]
    BindFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("socket path exceeds the platform maximum: {0}")]
    PathTooLong(std::path::PathBuf),

    #[error("another daemon is already serving {0}")]
    AlreadyRunning(std::path::PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from the NXM URL parser (C9).
#[derive(Error, Debug)]
pub enum NxmError {
    #[error("empty URL")]
    EmptyUrl,

    #[error("URL exceeds 2048 bytes")]
    UrlTooLong,

    #[error("URL does not start with nxm://")]
    BadScheme,

    #[error("missing game domain")]
    MissingGameDomain,

    #[error("unrecognized path kind (expected 'mods' or 'collections')")]
    UnrecognizedKind,

    #[error("invalid mod id")]
    InvalidModId,

    #[error("invalid file id")]
    InvalidFileId,

    #[error("missing collection slug")]
    MissingCollectionSlug,

    #[error("invalid revision id")]
    InvalidRevisionId,
}

/// The closed error-kind taxonomy of spec §7, used only at the invoker
/// boundary (`main.rs`) to pick an exit code and format the single-line
/// `<kind>: <context>` message. Internal code always returns the
/// concern-specific error types above; this enum exists solely to unify
/// them for `main`.
#[derive(Error, Debug)]
pub enum StlError {
    #[error("environment: {0}")]
    Environment(String),

    #[error("not-found: {0}")]
    NotFound(String),

    #[error("malformed: {0}")]
    Malformed(String),

    #[error("io: {0}")]
    Io(String),

    #[error("runtime: {0}")]
    Runtime(String),
}

impl StlError {
    /// Exit codes per spec §6: 0 success, 2 user error, 3 environment
    /// error, 4 runtime error.
    pub fn exit_code(&self) -> i32 {
        match self {
            StlError::Environment(_) => 3,
            StlError::NotFound(_) | StlError::Malformed(_) => 2,
            StlError::Io(_) | StlError::Runtime(_) => 4,
        }
    }
}

impl From<SteamError> for StlError {
    fn from(e: SteamError) -> Self {
        match e {
            SteamError::SteamNotFound => StlError::Environment(e.to_string()),
            SteamError::Io(_) => StlError::Io(e.to_string()),
        }
    }
}

impl From<AppInfoError> for StlError {
    fn from(e: AppInfoError) -> Self {
        match &e {
            AppInfoError::NotFound(_) => StlError::NotFound(e.to_string()),
            AppInfoError::Truncated | AppInfoError::Vdf(_) => StlError::Malformed(e.to_string()),
            AppInfoError::Io(_) => StlError::Io(e.to_string()),
        }
    }
}

impl From<ConfigError> for StlError {
    fn from(e: ConfigError) -> Self {
        match &e {
            ConfigError::NoConfigDir => StlError::Environment(e.to_string()),
            ConfigError::ConfigFileTooLarge(_) => StlError::Malformed(e.to_string()),
            ConfigError::Io(_) => StlError::Io(e.to_string()),
        }
    }
}

impl From<LaunchError> for StlError {
    fn from(e: LaunchError) -> Self {
        match &e {
            LaunchError::GameNotFound(_) => StlError::NotFound(e.to_string()),
            LaunchError::ProtonNotFound(_) => StlError::NotFound(e.to_string()),
            LaunchError::Steam(SteamError::SteamNotFound) => {
                StlError::Environment(e.to_string())
            }
            LaunchError::Steam(SteamError::Io(_)) => StlError::Io(e.to_string()),
            LaunchError::AppInfo(_) => StlError::Malformed(e.to_string()),
            LaunchError::Config(ConfigError::NoConfigDir) => StlError::Environment(e.to_string()),
            LaunchError::Config(_) => StlError::Io(e.to_string()),
            LaunchError::TinkerFatal(_) => StlError::Runtime(e.to_string()),
            LaunchError::SpawnFailed(_) => StlError::Runtime(e.to_string()),
        }
    }
}

impl From<NxmError> for StlError {
    fn from(e: NxmError) -> Self {
        StlError::Malformed(e.to_string())
    }
}

impl From<DaemonError> for StlError {
    fn from(e: DaemonError) -> Self {
        match &e {
            DaemonError::AlreadyRunning(_) => StlError::Environment(e.to_string()),
            DaemonError::BindFailed { .. } | DaemonError::PathTooLong(_) | DaemonError::Io(_) => {
                StlError::Io(e.to_string())
            }
        }
    }
}

impl From<ProtocolError> for StlError {
    fn from(e: ProtocolError) -> Self {
        StlError::Runtime(e.to_string())
    }
}
