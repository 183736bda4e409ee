// serverboard-api: Async clients for the Steam server list and Discord

pub mod discord;
pub mod error;
pub mod steam;
pub mod transport;

pub use discord::DiscordClient;
pub use error::Error;
pub use steam::SteamWebClient;
pub use transport::TransportConfig;
