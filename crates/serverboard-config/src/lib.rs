//! Configuration for the serverboard binary.
//!
//! One TOML file layered under `SERVERBOARD_` environment variables,
//! credential resolution (env + keyring + plaintext), and translation to
//! `serverboard_core::BoardConfig`. Out-of-range values fall back to the
//! defaults instead of failing; only values that cannot mean anything
//! (a malformed address or color, a missing channel) are errors.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use serverboard_core::config::{
    DEFAULT_CONNECT_PREFIX, DEFAULT_DIRECTORY_LIMIT, DEFAULT_EMBED_MAX, DEFAULT_MAX_BACKOFF,
    DEFAULT_MAX_OTHER_MESSAGES, DEFAULT_MAX_TOTAL_QUERY_TIME, DEFAULT_MIN_SLEEP,
    DEFAULT_POLL_CONCURRENCY, DEFAULT_QUERY_INTERVAL, DEFAULT_SERVER_QUERY_INTERVAL, DEFAULT_TITLE,
};
use serverboard_core::{
    Address, BoardConfig, ChannelId, DiscoveryConfig, EvictionPolicy, PresentationConfig,
    ScheduleConfig,
};

/// Prefix of every environment override. Nested keys are split on `__`,
/// e.g. `SERVERBOARD_DISCORD__CHANNEL_ID`.
pub const ENV_PREFIX: &str = "SERVERBOARD_";

const KEYRING_SERVICE: &str = "serverboard";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_COLOR: u32 = 0x00FF_FFFF;
const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {what} configured")]
    MissingSecret { what: &'static str },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// `error`, `warn`, `info`, `debug` or `trace`; any `EnvFilter` directive works.
    pub log_level: String,

    /// HTTP request timeout in seconds.
    pub timeout: f64,

    pub discord: DiscordSection,
    pub steam: SteamSection,
    pub board: BoardSection,
    pub discovery: DiscoverySection,
    pub schedule: ScheduleSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".into(),
            timeout: DEFAULT_HTTP_TIMEOUT.as_secs_f64(),
            discord: DiscordSection::default(),
            steam: SteamSection::default(),
            board: BoardSection::default(),
            discovery: DiscoverySection::default(),
            schedule: ScheduleSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscordSection {
    /// Channel the board is posted to.
    pub channel_id: Option<u64>,

    /// Bot token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the bot token.
    pub token_env: Option<String>,

    /// Listen on the gateway for chat commands and channel noise.
    pub gateway: bool,

    /// REST base URL override.
    pub api_base: Option<String>,
}

impl Default for DiscordSection {
    fn default() -> Self {
        Self {
            channel_id: None,
            token: None,
            token_env: None,
            gateway: true,
            api_base: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SteamSection {
    /// Web API key (plaintext; prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the Web API key.
    pub api_key_env: Option<String>,

    /// Web API base URL override.
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BoardSection {
    pub title: String,

    /// Embed color as hex: `0x1abc9c`, `#1abc9c` or `1abc9c`.
    pub color: String,

    /// Most servers listed; values below 1 mean 1.
    pub embed_max: i64,

    pub connect_prefix: String,

    /// Unrelated messages tolerated below the board before it is re-posted.
    pub max_other_messages: i64,

    /// Where the id of the last posted board is kept.
    pub state_file: Option<PathBuf>,
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.into(),
            color: "0x0".into(),
            embed_max: i64::try_from(DEFAULT_EMBED_MAX).unwrap_or(1),
            connect_prefix: DEFAULT_CONNECT_PREFIX.into(),
            max_other_messages: i64::from(DEFAULT_MAX_OTHER_MESSAGES),
            state_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoverySection {
    /// Game directory the server list is filtered on. Empty lists every game.
    pub gamedir: String,

    /// Explicit `host[:port]` entries. When set the directory is never used.
    pub servers: Vec<String>,

    /// Directory results matching any of these are ignored. Port 0 or no
    /// port matches every port on the host.
    pub blacklist: Vec<String>,

    /// Seconds one directory lookup or poll batch may take.
    pub max_total_query_time: f64,

    /// Seconds before the directory is asked again.
    pub query_interval: f64,

    pub poll_concurrency: i64,

    pub directory_limit: i64,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            gamedir: String::new(),
            servers: Vec::new(),
            blacklist: Vec::new(),
            max_total_query_time: DEFAULT_MAX_TOTAL_QUERY_TIME.as_secs_f64(),
            query_interval: DEFAULT_QUERY_INTERVAL.as_secs_f64(),
            poll_concurrency: i64::try_from(DEFAULT_POLL_CONCURRENCY).unwrap_or(1),
            directory_limit: i64::from(DEFAULT_DIRECTORY_LIMIT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleSection {
    /// Seconds between polls of the known servers.
    pub server_query_interval: f64,

    pub min_sleep: f64,

    /// Ceiling in seconds for the sleep after failed cycles.
    pub max_backoff: f64,

    /// Drop a server after this many cycles without an answer.
    pub max_missed_cycles: Option<i64>,

    /// Drop a server after this many seconds without an answer. 0 drops it
    /// on the first missed cycle; a negative value keeps it forever.
    pub max_unresponsive: f64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            server_query_interval: DEFAULT_SERVER_QUERY_INTERVAL.as_secs_f64(),
            min_sleep: DEFAULT_MIN_SLEEP.as_secs_f64(),
            max_backoff: DEFAULT_MAX_BACKOFF.as_secs_f64(),
            max_missed_cycles: None,
            max_unresponsive: 0.0,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "serverboard", "serverboard")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from("serverboard.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the last-posted-message pointer.
pub fn default_state_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from("serverboard.last_message"),
        |dirs| dirs.data_dir().join("last_message"),
    )
}

// ── Loading & saving ────────────────────────────────────────────────

/// Load the config from `path` (a missing file is fine) and the environment.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

/// The file `config init` writes: defaults plus a short header.
pub fn template() -> Result<String, ConfigError> {
    let body = toml::to_string_pretty(&Config::default())?;
    Ok(format!(
        "# serverboard configuration\n\
         #\n\
         # Required: discord.channel_id, a Discord bot token and a Steam Web API key.\n\
         # Secrets resolve from the variable named by `token_env` / `api_key_env`,\n\
         # then the system keyring (service \"{KEYRING_SERVICE}\"), then this file.\n\
         # Any key may be overridden from the environment, e.g.\n\
         # {ENV_PREFIX}DISCORD__CHANNEL_ID or {ENV_PREFIX}DISCOVERY__GAMEDIR.\n\n{body}"
    ))
}

/// Write [`template`] to `path`, creating parent directories.
pub fn write_template(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, template()?)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Validate and convert into the runtime board configuration.
    pub fn board_config(&self) -> Result<BoardConfig, ConfigError> {
        let channel_id = match self.discord.channel_id {
            Some(id) if id != 0 => ChannelId(id),
            _ => {
                return Err(ConfigError::validation(
                    "discord.channel_id",
                    "must be set to the channel the board is posted in",
                ));
            }
        };

        let discovery = self.discovery_config()?;

        let presentation = PresentationConfig {
            title: self.board.title.clone(),
            color: parse_color(&self.board.color)?,
            embed_max: usize::try_from(self.board.embed_max.max(1)).unwrap_or(1),
            connect_prefix: self.board.connect_prefix.clone(),
            max_other_messages: u32::try_from(self.board.max_other_messages)
                .unwrap_or(DEFAULT_MAX_OTHER_MESSAGES),
        };

        let schedule = ScheduleConfig {
            server_query_interval: seconds_or(
                self.schedule.server_query_interval,
                DEFAULT_SERVER_QUERY_INTERVAL,
            ),
            min_sleep: seconds_or(self.schedule.min_sleep, DEFAULT_MIN_SLEEP),
            max_backoff: seconds_or(self.schedule.max_backoff, DEFAULT_MAX_BACKOFF),
        };

        let eviction = EvictionPolicy {
            max_missed_cycles: self
                .schedule
                .max_missed_cycles
                .and_then(|n| u32::try_from(n).ok()),
            max_unresponsive: retention_seconds(self.schedule.max_unresponsive),
        };

        Ok(BoardConfig {
            channel_id,
            discovery,
            presentation,
            schedule,
            eviction,
        })
    }

    /// The discovery half on its own; needs no chat settings.
    pub fn discovery_config(&self) -> Result<DiscoveryConfig, ConfigError> {
        Ok(DiscoveryConfig {
            gamedir: self.discovery.gamedir.trim().to_owned(),
            explicit_addresses: parse_addresses("discovery.servers", &self.discovery.servers)?,
            blacklist: parse_addresses("discovery.blacklist", &self.discovery.blacklist)?,
            max_total_query_time: seconds_or(
                self.discovery.max_total_query_time,
                DEFAULT_MAX_TOTAL_QUERY_TIME,
            ),
            query_interval: seconds_or(self.discovery.query_interval, DEFAULT_QUERY_INTERVAL),
            poll_concurrency: usize::try_from(self.discovery.poll_concurrency)
                .ok()
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_POLL_CONCURRENCY),
            directory_limit: u32::try_from(self.discovery.directory_limit)
                .ok()
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_DIRECTORY_LIMIT),
        })
    }

    pub fn http_timeout(&self) -> Duration {
        seconds_or(self.timeout, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn state_path(&self) -> PathBuf {
        self.board
            .state_file
            .clone()
            .unwrap_or_else(default_state_path)
    }

    /// Bot token: `token_env` variable → keyring → plaintext.
    pub fn discord_token(&self) -> Result<SecretString, ConfigError> {
        resolve_secret(
            SecretKind::DiscordToken,
            self.discord.token_env.as_deref(),
            self.discord.token.as_deref(),
        )
    }

    /// Steam Web API key: `api_key_env` variable → keyring → plaintext.
    pub fn steam_api_key(&self) -> Result<SecretString, ConfigError> {
        resolve_secret(
            SecretKind::SteamApiKey,
            self.steam.api_key_env.as_deref(),
            self.steam.api_key.as_deref(),
        )
    }

    /// Copy with plaintext secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.discord.token.is_some() {
            copy.discord.token = Some(REDACTED.into());
        }
        if copy.steam.api_key.is_some() {
            copy.steam.api_key = Some(REDACTED.into());
        }
        copy
    }
}

// ── Value helpers ───────────────────────────────────────────────────

fn positive_seconds(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Negative means "no bound"; NaN or unrepresentable falls back to zero.
fn retention_seconds(secs: f64) -> Option<Duration> {
    if secs < 0.0 {
        None
    } else {
        Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }
}

/// Non-positive or unrepresentable values mean "use the default".
fn seconds_or(secs: f64, default: Duration) -> Duration {
    positive_seconds(secs).unwrap_or(default)
}

/// Parse `0xRRGGBB`, `#RRGGBB` or bare hex. Empty means black.
pub fn parse_color(input: &str) -> Result<u32, ConfigError> {
    let trimmed = input.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_prefix('#'))
        .unwrap_or(trimmed);

    if hex.is_empty() {
        return Ok(0);
    }

    let color = u32::from_str_radix(hex, 16)
        .map_err(|e| ConfigError::validation("board.color", format!("'{input}': {e}")))?;
    if color > MAX_COLOR {
        return Err(ConfigError::validation(
            "board.color",
            format!("'{input}' is wider than 24 bits"),
        ));
    }
    Ok(color)
}

/// Each entry may itself be a comma-separated list.
fn parse_addresses(field: &str, entries: &[String]) -> Result<Vec<Address>, ConfigError> {
    let mut out = Vec::new();
    for entry in entries {
        let parsed = Address::parse_list(entry)
            .map_err(|e| ConfigError::validation(field, format!("'{entry}': {e}")))?;
        out.extend(parsed);
    }
    Ok(out)
}

// ── Credential resolution ───────────────────────────────────────────

/// The two secrets serverboard needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    DiscordToken,
    SteamApiKey,
}

impl SecretKind {
    fn keyring_user(self) -> &'static str {
        match self {
            Self::DiscordToken => "discord-token",
            Self::SteamApiKey => "steam-api-key",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DiscordToken => "Discord bot token",
            Self::SteamApiKey => "Steam Web API key",
        }
    }
}

/// Save a secret to the system keyring, where resolution finds it next.
pub fn store_secret(kind: SecretKind, secret: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, kind.keyring_user())?;
    entry.set_password(secret.expose_secret())?;
    Ok(())
}

fn resolve_secret(
    kind: SecretKind,
    env_name: Option<&str>,
    plaintext: Option<&str>,
) -> Result<SecretString, ConfigError> {
    // 1. Named env var
    if let Some(name) = env_name {
        if let Ok(val) = std::env::var(name) {
            if !val.trim().is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, kind.keyring_user()) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config (or a SERVERBOARD_ override of it)
    match plaintext.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(SecretString::from(value.to_owned())),
        _ => Err(ConfigError::MissingSecret { what: kind.label() }),
    }
}
