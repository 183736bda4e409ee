// Discord surface: REST client for message management plus the gateway
// event stream used to watch the board channel.

pub mod client;
pub mod gateway;
pub mod models;

pub use client::DiscordClient;
pub use gateway::{GatewayEvent, GatewayHandle, ReconnectConfig};
pub use models::{Embed, EmbedField, Message, MessageDelete, MessagePayload, Snowflake, User};
