// Steam Web API wire types
//
// `IGameServersService/GetServerList/v1` answers with
// `{"response": {"servers": [...]}}`. The `servers` key is omitted
// entirely when nothing matches the filter.

use serde::{Deserialize, Serialize};

/// Outer `{ "response": ... }` wrapper.
#[derive(Debug, Deserialize)]
pub(crate) struct ServerListEnvelope {
    #[serde(default)]
    pub response: ServerListResponse,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServerListResponse {
    #[serde(default)]
    pub servers: Vec<SteamServer>,
}

/// One game server as reported by the Steam master list.
///
/// Older server builds omit several fields; every counter defaults to 0
/// and `bots` stays `None` when the server never reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteamServer {
    /// Query address, `"ip:queryport"`.
    pub addr: String,
    /// Port clients connect to. 0 when not reported.
    #[serde(default)]
    pub gameport: u16,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub map: String,
    #[serde(default)]
    pub gamedir: String,
    #[serde(default)]
    pub players: u32,
    #[serde(default)]
    pub max_players: u32,
    #[serde(default)]
    pub bots: Option<u32>,
    #[serde(default)]
    pub appid: Option<u32>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub dedicated: Option<bool>,
}

impl SteamServer {
    /// Host part of `addr`.
    pub fn host(&self) -> &str {
        self.addr
            .rsplit_once(':')
            .map_or(self.addr.as_str(), |(host, _)| host)
    }

    /// Query port parsed from `addr`, 0 when absent or malformed.
    pub fn query_port(&self) -> u16 {
        self.addr
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or(0)
    }

    /// The address players connect to: host plus game port, falling back
    /// to the query port when the game port was not reported.
    pub fn game_port(&self) -> u16 {
        if self.gameport == 0 {
            self.query_port()
        } else {
            self.gameport
        }
    }
}
