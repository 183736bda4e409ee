// ── Endpoint sources ──
//
// The two read-side collaborators: a directory that lists candidate
// addresses and a point query that asks one endpoint for its state.
// `SteamSource` implements both on top of the Steam Web API server list.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use secrecy::SecretString;
use serverboard_api::{SteamWebClient, TransportConfig, steam::SteamServer};
use tracing::trace;

use crate::error::CoreError;
use crate::model::{Address, EndpointReport};

/// Asks a single endpoint for its current state.
pub trait EndpointQuery: Send + Sync {
    /// Any failure (timeout, unreachable, malformed answer) is reported as
    /// `CoreError::Query` and counted as offline by the caller.
    fn query(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<EndpointReport, CoreError>> + Send;
}

/// Lists candidate endpoint addresses.
pub trait Directory: Send + Sync {
    /// Lazily yield addresses matching `filter`. The stream is finite and
    /// callers may stop consuming it at any point.
    fn find<'a>(&'a self, filter: &'a str) -> BoxStream<'a, Result<Address, CoreError>>;
}

// One shared source can serve as both collaborators.

impl<T: EndpointQuery> EndpointQuery for Arc<T> {
    fn query(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<EndpointReport, CoreError>> + Send {
        (**self).query(address)
    }
}

impl<T: Directory> Directory for Arc<T> {
    fn find<'a>(&'a self, filter: &'a str) -> BoxStream<'a, Result<Address, CoreError>> {
        (**self).find(filter)
    }
}

// ── Steam Web API adapter ────────────────────────────────────────────

/// Directory and point queries backed by `IGameServersService/GetServerList`.
pub struct SteamSource {
    client: SteamWebClient,
    directory_limit: u32,
}

impl SteamSource {
    pub fn new(
        api_key: SecretString,
        transport: &TransportConfig,
        directory_limit: u32,
    ) -> Result<Self, CoreError> {
        Ok(Self::from_client(
            SteamWebClient::new(api_key, transport)?,
            directory_limit,
        ))
    }

    pub fn from_client(client: SteamWebClient, directory_limit: u32) -> Self {
        Self {
            client,
            directory_limit,
        }
    }
}

fn server_address(server: &SteamServer) -> Address {
    Address::new(server.host(), server.game_port())
}

fn server_report(address: &Address, server: SteamServer) -> EndpointReport {
    EndpointReport {
        address: address.clone(),
        player_count: server.players,
        bot_count: server.bots,
        max_players: server.max_players,
        server_name: server.name,
        map_name: server.map,
        observed_at: Utc::now(),
    }
}

impl EndpointQuery for SteamSource {
    async fn query(&self, address: &Address) -> Result<EndpointReport, CoreError> {
        let target = address.to_string();
        match self.client.server_at(&target).await {
            Ok(Some(server)) => {
                trace!(%address, players = server.players, "endpoint answered");
                Ok(server_report(address, server))
            }
            Ok(None) => Err(CoreError::Query {
                address: target,
                reason: "not listed by the master server".into(),
            }),
            Err(e) => Err(CoreError::Query {
                address: target,
                reason: e.to_string(),
            }),
        }
    }
}

impl Directory for SteamSource {
    fn find<'a>(&'a self, filter: &'a str) -> BoxStream<'a, Result<Address, CoreError>> {
        self.client
            .find_servers(filter, self.directory_limit)
            .map(|item| {
                item.map(|server| server_address(&server))
                    .map_err(|e| CoreError::DirectoryUnavailable {
                        reason: e.to_string(),
                    })
            })
            .boxed()
    }
}
