// Steam Web API server list client
//
// Directory lookups and per-server queries both go through
// `IGameServersService/GetServerList/v1`; only the filter differs.
// Base URL: https://api.steampowered.com/
// Auth: `key` query parameter

use futures_util::Stream;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use super::models::{ServerListEnvelope, SteamServer};
use crate::error::Error;
use crate::transport::TransportConfig;

const DEFAULT_BASE_URL: &str = "https://api.steampowered.com/";
const SERVER_LIST_PATH: &str = "IGameServersService/GetServerList/v1/";

/// Upper bound the Web API accepts for `limit`.
pub const MAX_LIST_LIMIT: u32 = 20_000;

/// Async client for the Steam game server list.
pub struct SteamWebClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl SteamWebClient {
    /// Client against the public Steam Web API.
    pub fn new(api_key: SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, transport)
    }

    /// Client against a custom base URL (mirrors, tests).
    pub fn with_base_url(
        base_url: &str,
        api_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http: transport.build_client()?,
            base_url,
            api_key,
        })
    }

    /// Fetch every server matching a master-server style filter,
    /// e.g. `\gamedir\cstrike`.
    pub async fn list_servers(&self, filter: &str, limit: u32) -> Result<Vec<SteamServer>, Error> {
        let url = self.base_url.join(SERVER_LIST_PATH)?;
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let limit_param = limit.to_string();
        debug!(filter, limit, "GET {url}");

        let resp = self
            .http
            .get(url)
            .query(&[
                ("key", self.api_key.expose_secret()),
                ("filter", filter),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("Steam Web API rejected the API key (HTTP {status})"),
            });
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Steam {
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body.chars().take(200).collect()
                },
                status: status.as_u16(),
            });
        }

        let envelope: ServerListEnvelope = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })?;

        Ok(envelope.response.servers)
    }

    /// Lazily yield servers matching `filter`.
    ///
    /// Nothing is requested until the stream is first polled, and callers
    /// may stop consuming at any point.
    pub fn find_servers<'a>(
        &'a self,
        filter: &'a str,
        limit: u32,
    ) -> impl Stream<Item = Result<SteamServer, Error>> + Send + 'a {
        async_stream::try_stream! {
            let servers = self.list_servers(filter, limit).await?;
            for server in servers {
                yield server;
            }
        }
    }

    /// Look up the server listening at `address` (`"host"` or `"host:port"`).
    ///
    /// Returns `Ok(None)` when the master list does not know the address,
    /// which usually means the server is down.
    pub async fn server_at(&self, address: &str) -> Result<Option<SteamServer>, Error> {
        let filter = format!("\\gameaddr\\{address}");
        let mut servers = self.list_servers(&filter, 1).await?;
        Ok(if servers.is_empty() {
            None
        } else {
            Some(servers.swap_remove(0))
        })
    }
}
