// ── Chat transport ──
//
// Write-side collaborator: where the summary is rendered. Each call is
// one atomic, fallible network operation. `DiscordTransport` binds the
// Discord REST client to the board channel; `chat_event` maps gateway
// dispatches onto transport-neutral `ChatEvent`s.

use std::future::Future;

use secrecy::SecretString;
use serverboard_api::discord::{Embed, EmbedField, GatewayEvent, MessagePayload, Snowflake};
use serverboard_api::{DiscordClient, TransportConfig};

use crate::error::CoreError;
use crate::model::{ChannelId, MessageId, UserId};
use crate::presentation::Summary;

/// A message seen in the board channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: UserId,
    pub content: String,
}

/// Inbound chat activity the scheduler reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The transport is connected; carries the bot's own user id.
    Ready { user: UserId },
    MessageCreated(ChatMessage),
    MessageDeleted { id: MessageId, channel_id: ChannelId },
}

/// Send/edit/delete/fetch against the single board channel.
pub trait ChatTransport: Send + Sync {
    fn send(&self, summary: &Summary) -> impl Future<Output = Result<MessageId, CoreError>> + Send;

    fn edit(
        &self,
        id: MessageId,
        summary: &Summary,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn delete(&self, id: MessageId) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// `Ok(None)` when the message no longer exists.
    fn fetch_message(
        &self,
        id: MessageId,
    ) -> impl Future<Output = Result<Option<ChatMessage>, CoreError>> + Send;

    /// Most recent messages, newest first.
    fn fetch_recent_history(
        &self,
        limit: u8,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, CoreError>> + Send;
}

// ── Discord adapter ──────────────────────────────────────────────────

/// Discord REST client bound to the board channel.
pub struct DiscordTransport {
    client: DiscordClient,
    channel: ChannelId,
}

impl DiscordTransport {
    pub fn new(
        token: &SecretString,
        transport: &TransportConfig,
        channel: ChannelId,
    ) -> Result<Self, CoreError> {
        Ok(Self::from_client(DiscordClient::new(token, transport)?, channel))
    }

    pub fn from_client(client: DiscordClient, channel: ChannelId) -> Self {
        Self { client, channel }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// The bot's own user id. Also validates the token.
    pub async fn current_user(&self) -> Result<UserId, CoreError> {
        let me = self.client.current_user().await?;
        Ok(UserId(me.id.0))
    }

    fn channel_snowflake(&self) -> Snowflake {
        Snowflake(self.channel.0)
    }
}

fn summary_payload(summary: &Summary) -> MessagePayload {
    MessagePayload::embed(Embed {
        title: Some(summary.title.clone()),
        description: Some(summary.description.clone()),
        color: Some(summary.color),
        fields: summary
            .fields
            .iter()
            .map(|f| EmbedField {
                name: f.name.clone(),
                value: f.value.clone(),
                inline: false,
            })
            .collect(),
    })
}

fn chat_message(msg: &serverboard_api::discord::Message) -> ChatMessage {
    ChatMessage {
        id: MessageId(msg.id.0),
        channel_id: ChannelId(msg.channel_id.0),
        author: UserId(msg.author.id.0),
        content: msg.content.clone(),
    }
}

impl ChatTransport for DiscordTransport {
    async fn send(&self, summary: &Summary) -> Result<MessageId, CoreError> {
        let msg = self
            .client
            .create_message(self.channel_snowflake(), &summary_payload(summary))
            .await?;
        Ok(MessageId(msg.id.0))
    }

    async fn edit(&self, id: MessageId, summary: &Summary) -> Result<(), CoreError> {
        self.client
            .edit_message(
                self.channel_snowflake(),
                Snowflake(id.0),
                &summary_payload(summary),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, id: MessageId) -> Result<(), CoreError> {
        self.client
            .delete_message(self.channel_snowflake(), Snowflake(id.0))
            .await?;
        Ok(())
    }

    async fn fetch_message(&self, id: MessageId) -> Result<Option<ChatMessage>, CoreError> {
        let msg = self
            .client
            .get_message(self.channel_snowflake(), Snowflake(id.0))
            .await?;
        Ok(msg.as_ref().map(chat_message))
    }

    async fn fetch_recent_history(&self, limit: u8) -> Result<Vec<ChatMessage>, CoreError> {
        let history = self
            .client
            .channel_messages(self.channel_snowflake(), limit)
            .await?;
        Ok(history.iter().map(chat_message).collect())
    }
}

/// Map a gateway dispatch onto a chat event.
pub fn chat_event(event: &GatewayEvent) -> ChatEvent {
    match event {
        GatewayEvent::Ready { user } => ChatEvent::Ready {
            user: UserId(user.id.0),
        },
        GatewayEvent::MessageCreate(msg) => ChatEvent::MessageCreated(chat_message(msg)),
        GatewayEvent::MessageDelete(deleted) => ChatEvent::MessageDeleted {
            id: MessageId(deleted.id.0),
            channel_id: ChannelId(deleted.channel_id.0),
        },
    }
}
