// Steam Web API surface: master server list lookups.

pub mod client;
pub mod models;

pub use client::SteamWebClient;
pub use models::SteamServer;
