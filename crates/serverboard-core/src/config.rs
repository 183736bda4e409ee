// ── Runtime board configuration ──
//
// These types describe *what* the board polls and *how* it presents it.
// They never touch disk: serverboard-config validates the TOML/env layers
// and hands a finished `BoardConfig` in.

use std::time::Duration;

use crate::model::{Address, ChannelId};
use crate::store::EvictionPolicy;

pub const DEFAULT_TITLE: &str = "Game Servers";
pub const DEFAULT_CONNECT_PREFIX: &str = "steam://connect/";
pub const DEFAULT_EMBED_MAX: usize = 10;
pub const DEFAULT_MAX_TOTAL_QUERY_TIME: Duration = Duration::from_secs(30);
pub const DEFAULT_QUERY_INTERVAL: Duration = Duration::from_secs(100);
pub const DEFAULT_SERVER_QUERY_INTERVAL: Duration = Duration::from_secs(20);
pub const DEFAULT_MAX_OTHER_MESSAGES: u32 = 5;
pub const DEFAULT_POLL_CONCURRENCY: usize = 4;
pub const DEFAULT_DIRECTORY_LIMIT: u32 = 1_000;
pub const DEFAULT_MIN_SLEEP: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);
pub const IDLE_TICK: Duration = Duration::from_secs(3);
/// How many recent channel messages are inspected when restoring the board.
pub const HISTORY_WINDOW: u8 = 6;

/// Which endpoints to poll and how long a cycle may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Directory filter value (`\gamedir\<gamedir>`). Empty means no filter.
    pub gamedir: String,
    /// When non-empty, polled verbatim and the directory is never consulted.
    pub explicit_addresses: Vec<Address>,
    /// Directory results equivalent to any entry here are dropped.
    pub blacklist: Vec<Address>,
    /// Hard budget for one directory lookup and for one poll batch.
    pub max_total_query_time: Duration,
    /// How long directory results stay fresh before a new lookup.
    pub query_interval: Duration,
    /// Queries in flight at once. 1 = sequential.
    pub poll_concurrency: usize,
    /// Upper bound on directory results requested per lookup.
    pub directory_limit: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            gamedir: String::new(),
            explicit_addresses: Vec::new(),
            blacklist: Vec::new(),
            max_total_query_time: DEFAULT_MAX_TOTAL_QUERY_TIME,
            query_interval: DEFAULT_QUERY_INTERVAL,
            poll_concurrency: DEFAULT_POLL_CONCURRENCY,
            directory_limit: DEFAULT_DIRECTORY_LIMIT,
        }
    }
}

impl DiscoveryConfig {
    /// Master-server style filter string for the directory.
    pub fn directory_filter(&self) -> String {
        if self.gamedir.is_empty() {
            String::new()
        } else {
            format!("\\gamedir\\{}", self.gamedir)
        }
    }
}

/// How the summary message looks and when it is re-posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationConfig {
    pub title: String,
    /// Embed side color, `0xRRGGBB`.
    pub color: u32,
    /// Most entries shown; always at least 1.
    pub embed_max: usize,
    /// Prepended to each address in the "Connect:" column.
    pub connect_prefix: String,
    /// Foreign messages tolerated below the board before it is re-posted.
    pub max_other_messages: u32,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_owned(),
            color: 0,
            embed_max: DEFAULT_EMBED_MAX,
            connect_prefix: DEFAULT_CONNECT_PREFIX.to_owned(),
            max_other_messages: DEFAULT_MAX_OTHER_MESSAGES,
        }
    }
}

/// Poll cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Minimum age of the last poll before endpoints are polled again.
    pub server_query_interval: Duration,
    /// Floor for the sleep after a real poll.
    pub min_sleep: Duration,
    /// Ceiling for the sleep after consecutive failed cycles.
    pub max_backoff: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            server_query_interval: DEFAULT_SERVER_QUERY_INTERVAL,
            min_sleep: DEFAULT_MIN_SLEEP,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

/// Everything the board needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub channel_id: ChannelId,
    pub discovery: DiscoveryConfig,
    pub presentation: PresentationConfig,
    pub schedule: ScheduleConfig,
    pub eviction: EvictionPolicy,
}

impl BoardConfig {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            discovery: DiscoveryConfig::default(),
            presentation: PresentationConfig::default(),
            schedule: ScheduleConfig::default(),
            eviction: EvictionPolicy::default(),
        }
    }
}
