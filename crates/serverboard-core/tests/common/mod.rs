// Scripted collaborators shared by the core integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use serverboard_core::{
    Address, BoardConfig, ChannelId, ChatMessage, ChatTransport, CoreError, Directory,
    EndpointQuery, EndpointReport, MessageId, Summary, UserId,
};

pub const CHANNEL: ChannelId = ChannelId(500);
pub const BOT: UserId = UserId(1);
pub const SOMEONE: UserId = UserId(2);

// ── Endpoints ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerState {
    pub players: u32,
    pub max_players: u32,
    pub name: String,
    pub map: String,
}

pub fn server(players: u32, max_players: u32, name: &str, map: &str) -> ServerState {
    ServerState {
        players,
        max_players,
        name: name.into(),
        map: map.into(),
    }
}

/// Endpoints keyed by display address. Missing keys time out.
#[derive(Clone, Default)]
pub struct ScriptedQuery {
    servers: Arc<Mutex<HashMap<String, ServerState>>>,
    delay: Duration,
}

impl ScriptedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, address: &str, state: ServerState) {
        self.servers.lock().unwrap().insert(address.into(), state);
    }

    pub fn take_down(&self, address: &str) {
        self.servers.lock().unwrap().remove(address);
    }
}

impl EndpointQuery for ScriptedQuery {
    async fn query(&self, address: &Address) -> Result<EndpointReport, CoreError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let state = self.servers.lock().unwrap().get(&address.to_string()).cloned();
        match state {
            Some(s) => Ok(EndpointReport {
                address: address.clone(),
                player_count: s.players,
                bot_count: None,
                max_players: s.max_players,
                server_name: s.name,
                map_name: s.map,
                observed_at: Utc::now(),
            }),
            None => Err(CoreError::Query {
                address: address.to_string(),
                reason: "timed out".into(),
            }),
        }
    }
}

/// Directory answering with a fixed list.
#[derive(Clone, Default)]
pub struct ScriptedDirectory {
    addresses: Arc<Mutex<Vec<String>>>,
    lookups: Arc<Mutex<u32>>,
}

impl ScriptedDirectory {
    pub fn new(addresses: &[&str]) -> Self {
        Self {
            addresses: Arc::new(Mutex::new(addresses.iter().map(|a| (*a).to_owned()).collect())),
            lookups: Arc::default(),
        }
    }

    pub fn lookups(&self) -> u32 {
        *self.lookups.lock().unwrap()
    }
}

impl Directory for ScriptedDirectory {
    fn find<'a>(&'a self, _filter: &'a str) -> BoxStream<'a, Result<Address, CoreError>> {
        *self.lookups.lock().unwrap() += 1;
        let addresses = self.addresses.lock().unwrap().clone();
        async_stream::stream! {
            for address in addresses {
                yield Ok(address.parse().unwrap());
            }
        }
        .boxed()
    }
}

// ── Chat ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send(MessageId),
    Edit(MessageId),
    Delete(MessageId),
}

/// Transport operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Send,
    Edit,
    Delete,
}

#[derive(Default)]
struct ChannelLog {
    calls: Vec<Call>,
    failing: Vec<Op>,
    summaries: Vec<Summary>,
    /// Channel contents, oldest first.
    messages: Vec<ChatMessage>,
    next_id: u64,
}

/// In-memory channel recording every transport call.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    log: Arc<Mutex<ChannelLog>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        let transport = Self::default();
        transport.log.lock().unwrap().next_id = 1_000;
        transport
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn last_summary(&self) -> Option<Summary> {
        self.log.lock().unwrap().summaries.last().cloned()
    }

    /// Someone else posts in the channel.
    pub fn post_foreign(&self, content: &str) -> ChatMessage {
        let mut log = self.log.lock().unwrap();
        log.next_id += 1;
        let msg = ChatMessage {
            id: MessageId(log.next_id),
            channel_id: CHANNEL,
            author: SOMEONE,
            content: content.into(),
        };
        log.messages.push(msg.clone());
        msg
    }

    /// A message of ours that already sits in the channel.
    pub fn post_own(&self) -> MessageId {
        let mut log = self.log.lock().unwrap();
        log.next_id += 1;
        let id = MessageId(log.next_id);
        log.messages.push(ChatMessage {
            id,
            channel_id: CHANNEL,
            author: BOT,
            content: String::new(),
        });
        id
    }

    /// Make `op` fail with a server error until switched back.
    pub fn set_failing(&self, op: Op, failing: bool) {
        let mut log = self.log.lock().unwrap();
        log.failing.retain(|o| *o != op);
        if failing {
            log.failing.push(op);
        }
    }

    /// Whether `id` is still in the channel.
    pub fn contains(&self, id: MessageId) -> bool {
        self.log.lock().unwrap().messages.iter().any(|m| m.id == id)
    }

    /// Remove a message behind the bot's back.
    pub fn vanish(&self, id: MessageId) {
        self.log.lock().unwrap().messages.retain(|m| m.id != id);
    }
}

fn server_error() -> CoreError {
    CoreError::Transport {
        message: "Internal Server Error".into(),
        status: Some(500),
    }
}

impl ChannelLog {
    fn check(&self, op: Op) -> Result<(), CoreError> {
        if self.failing.contains(&op) {
            Err(server_error())
        } else {
            Ok(())
        }
    }
}

impl ChatTransport for RecordingTransport {
    async fn send(&self, summary: &Summary) -> Result<MessageId, CoreError> {
        let mut log = self.log.lock().unwrap();
        log.check(Op::Send)?;
        log.next_id += 1;
        let id = MessageId(log.next_id);
        log.calls.push(Call::Send(id));
        log.summaries.push(summary.clone());
        log.messages.push(ChatMessage {
            id,
            channel_id: CHANNEL,
            author: BOT,
            content: String::new(),
        });
        Ok(id)
    }

    async fn edit(&self, id: MessageId, summary: &Summary) -> Result<(), CoreError> {
        let mut log = self.log.lock().unwrap();
        log.check(Op::Edit)?;
        if !log.messages.iter().any(|m| m.id == id) {
            return Err(CoreError::Transport {
                message: "Unknown Message".into(),
                status: Some(404),
            });
        }
        log.calls.push(Call::Edit(id));
        log.summaries.push(summary.clone());
        Ok(())
    }

    async fn delete(&self, id: MessageId) -> Result<(), CoreError> {
        let mut log = self.log.lock().unwrap();
        log.check(Op::Delete)?;
        log.calls.push(Call::Delete(id));
        log.messages.retain(|m| m.id != id);
        Ok(())
    }

    async fn fetch_message(&self, id: MessageId) -> Result<Option<ChatMessage>, CoreError> {
        let log = self.log.lock().unwrap();
        Ok(log.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn fetch_recent_history(&self, limit: u8) -> Result<Vec<ChatMessage>, CoreError> {
        let log = self.log.lock().unwrap();
        Ok(log
            .messages
            .iter()
            .rev()
            .take(usize::from(limit))
            .cloned()
            .collect())
    }
}

pub fn config() -> BoardConfig {
    let mut config = BoardConfig::new(CHANNEL);
    config.presentation.title = "ZM Servers".into();
    config.presentation.max_other_messages = 8;
    config.schedule.server_query_interval = Duration::from_secs(20);
    config
}

pub const OTHER_CHANNEL: ChannelId = ChannelId(501);
