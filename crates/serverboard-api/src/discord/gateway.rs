//! Discord gateway event stream with auto-reconnect.
//!
//! Connects to the Discord gateway, performs the hello/identify handshake,
//! keeps the session alive with heartbeats and streams the dispatch events
//! serverboard cares about through a [`tokio::sync::broadcast`] channel.
//! Dropped connections resume the previous session where Discord allows it;
//! a heartbeat that goes unacknowledged counts as a dropped connection.
//! Reconnection uses exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use serverboard_api::discord::gateway::{GatewayHandle, ReconnectConfig, intents};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let handle = GatewayHandle::spawn(
//!     GatewayHandle::default_url()?,
//!     token,
//!     intents::GUILDS | intents::GUILD_MESSAGES | intents::MESSAGE_CONTENT,
//!     ReconnectConfig::default(),
//!     cancel.clone(),
//! );
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::models::{Message, MessageDelete, User};
use crate::error::Error;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Gateway intent bits.
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const MESSAGE_CONTENT: u64 = 1 << 15;
}

mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RESUME: u8 = 6;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

// ── GatewayEvent ─────────────────────────────────────────────────────

/// Dispatch events forwarded to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Session established; carries the bot's own user.
    Ready { user: User },
    MessageCreate(Message),
    MessageDelete(MessageDelete),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for gateway reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 60s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// Resumable session state carried across reconnects.
#[derive(Debug, Default)]
struct Session {
    id: Option<String>,
    sequence: Option<u64>,
    resume_url: Option<Url>,
}

impl Session {
    fn can_resume(&self) -> bool {
        self.id.is_some()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record the session announced by READY.
    fn open(&mut self, ready: &serde_json::Value) {
        self.id = ready
            .get("session_id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);
        self.resume_url = ready
            .get("resume_gateway_url")
            .and_then(serde_json::Value::as_str)
            .and_then(|u| Url::parse(u).ok());
    }

    /// The resume URL while a session is open, keeping the query of `default`.
    fn connect_url(&self, default: &Url) -> Url {
        match (&self.id, &self.resume_url) {
            (Some(_), Some(resume)) => {
                let mut url = resume.clone();
                url.set_query(default.query());
                url
            }
            _ => default.clone(),
        }
    }
}

// ── GatewayHandle ────────────────────────────────────────────────────

/// Handle to a running gateway session.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`spawn`](Self::spawn)) to tear down the background task.
pub struct GatewayHandle {
    event_rx: broadcast::Receiver<Arc<GatewayEvent>>,
    cancel: CancellationToken,
}

impl GatewayHandle {
    /// The public gateway endpoint (API v10, JSON encoding).
    pub fn default_url() -> Result<Url, Error> {
        Ok(Url::parse(DEFAULT_GATEWAY_URL)?)
    }

    /// Spawn the connect/reconnect loop and return immediately.
    pub fn spawn(
        url: Url,
        token: SecretString,
        intents: u64,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            gateway_loop(url, token, intents, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<GatewayEvent>> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn gateway_loop(
    url: Url,
    token: SecretString,
    intents: u64,
    event_tx: broadcast::Sender<Arc<GatewayEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut session = Session::default();

    loop {
        let target = session.connect_url(&url);
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(
                &target, &token, intents, &mut session, &event_tx, &cancel,
            ) => result,
        };

        match result {
            Ok(()) => {
                tracing::info!(resume = session.can_resume(), "gateway session ended, reconnecting");
                attempt = 0;
            }
            Err(Error::GatewayClosed { code, reason }) if is_fatal_close(code) => {
                tracing::error!(code, %reason, "gateway refused the session, giving up");
                break;
            }
            Err(e) => {
                if matches!(e, Error::GatewayClosed { code, .. } if ends_session(code)) {
                    session.reset();
                }
                tracing::warn!(error = %e, attempt, resume = session.can_resume(), "gateway error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "gateway reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
            }
        }
    }

    tracing::debug!("gateway loop exiting");
}

/// Close codes after which reconnecting cannot succeed
/// (bad token, bad shard, invalid or disallowed intents).
fn is_fatal_close(code: u16) -> bool {
    matches!(code, 4004 | 4010..=4014)
}

/// Close codes after which the session cannot be resumed
/// (invalid sequence, session timed out).
fn ends_session(code: u16) -> bool {
    matches!(code, 4007 | 4009)
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Run one gateway connection until it drops.
async fn connect_and_read(
    url: &Url,
    token: &SecretString,
    intents: u64,
    session: &mut Session,
    event_tx: &broadcast::Sender<Arc<GatewayEvent>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to gateway");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::GatewayConnect(e.to_string()))?;

    tracing::info!("gateway connected");

    let (mut write, mut read) = ws_stream.split();
    let mut heartbeat: Option<Interval> = None;
    let mut awaiting_ack = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(());
            }
            () = next_heartbeat(&mut heartbeat) => {
                // No close frame: a 1000 close would end the session.
                if awaiting_ack {
                    tracing::warn!("heartbeat not acknowledged, dropping connection");
                    return Err(Error::GatewayConnect("heartbeat not acknowledged".into()));
                }
                tracing::trace!(sequence = ?session.sequence, "sending heartbeat");
                write
                    .send(text_frame(&heartbeat_payload(session.sequence)))
                    .await
                    .map_err(|e| Error::GatewayConnect(e.to_string()))?;
                awaiting_ack = true;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        match handle_payload(&text, session, event_tx) {
                            GatewayAction::Hello { heartbeat_interval } => {
                                let start = Instant::now() + heartbeat_interval;
                                heartbeat = Some(tokio::time::interval_at(start, heartbeat_interval));
                                awaiting_ack = false;
                                let handshake = match resume_payload(token, session) {
                                    Some(resume) => {
                                        tracing::debug!("resuming session");
                                        resume
                                    }
                                    None => identify_payload(token, intents),
                                };
                                write
                                    .send(text_frame(&handshake))
                                    .await
                                    .map_err(|e| Error::GatewayConnect(e.to_string()))?;
                            }
                            GatewayAction::Heartbeat => {
                                write
                                    .send(text_frame(&heartbeat_payload(session.sequence)))
                                    .await
                                    .map_err(|e| Error::GatewayConnect(e.to_string()))?;
                            }
                            GatewayAction::HeartbeatAck => awaiting_ack = false,
                            GatewayAction::Reconnect => return Ok(()),
                            GatewayAction::InvalidSession { resumable } => {
                                if !resumable {
                                    session.reset();
                                }
                                return Err(Error::GatewayConnect("session invalidated".into()));
                            }
                            GatewayAction::None => {}
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return match frame {
                            Some(cf) => {
                                let code = u16::from(cf.code);
                                tracing::info!(code, reason = %cf.reason, "gateway close frame received");
                                Err(Error::GatewayClosed {
                                    code,
                                    reason: cf.reason.as_str().to_owned(),
                                })
                            }
                            None => {
                                tracing::info!("gateway close frame received (no payload)");
                                Ok(())
                            }
                        };
                    }
                    Some(Err(e)) => {
                        return Err(Error::GatewayConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("gateway stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Ping, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn text_frame(payload: &serde_json::Value) -> tungstenite::Message {
    tungstenite::Message::Text(payload.to_string().into())
}

fn heartbeat_payload(sequence: Option<u64>) -> serde_json::Value {
    serde_json::json!({ "op": opcode::HEARTBEAT, "d": sequence })
}

/// RESUME for the open session, if there is one.
fn resume_payload(token: &SecretString, session: &Session) -> Option<serde_json::Value> {
    let id = session.id.as_deref()?;
    Some(serde_json::json!({
        "op": opcode::RESUME,
        "d": {
            "token": token.expose_secret(),
            "session_id": id,
            "seq": session.sequence,
        },
    }))
}

fn identify_payload(token: &SecretString, intents: u64) -> serde_json::Value {
    serde_json::json!({
        "op": opcode::IDENTIFY,
        "d": {
            "token": token.expose_secret(),
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "serverboard",
                "device": "serverboard",
            },
        },
    })
}

// ── Payload parsing ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: serde_json::Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelloData {
    heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
struct ReadyData {
    user: User,
}

/// What the connection loop must do after a frame.
#[derive(Debug, PartialEq, Eq)]
enum GatewayAction {
    Hello { heartbeat_interval: Duration },
    Heartbeat,
    HeartbeatAck,
    Reconnect,
    InvalidSession { resumable: bool },
    None,
}

/// Parse one gateway text frame, broadcasting any dispatch event inside.
fn handle_payload(
    text: &str,
    session: &mut Session,
    event_tx: &broadcast::Sender<Arc<GatewayEvent>>,
) -> GatewayAction {
    let payload: GatewayPayload = match serde_json::from_str(text) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse gateway payload");
            return GatewayAction::None;
        }
    };

    if payload.s.is_some() {
        session.sequence = payload.s;
    }

    match payload.op {
        opcode::HELLO => match serde_json::from_value::<HelloData>(payload.d) {
            Ok(hello) => GatewayAction::Hello {
                heartbeat_interval: Duration::from_millis(hello.heartbeat_interval),
            },
            Err(e) => {
                tracing::warn!(error = %e, "malformed hello payload");
                GatewayAction::Reconnect
            }
        },
        opcode::HEARTBEAT => GatewayAction::Heartbeat,
        opcode::RECONNECT => GatewayAction::Reconnect,
        opcode::INVALID_SESSION => GatewayAction::InvalidSession {
            resumable: payload.d.as_bool().unwrap_or(false),
        },
        opcode::HEARTBEAT_ACK => {
            tracing::trace!("heartbeat acknowledged");
            GatewayAction::HeartbeatAck
        }
        opcode::DISPATCH => {
            let kind = payload.t.as_deref().unwrap_or("");
            match kind {
                "READY" => session.open(&payload.d),
                "RESUMED" => tracing::info!("gateway session resumed"),
                _ => {}
            }
            if let Some(event) = dispatch_event(kind, payload.d) {
                // No active subscribers right now is fine
                let _ = event_tx.send(Arc::new(event));
            }
            GatewayAction::None
        }
        other => {
            tracing::trace!(op = other, "ignoring gateway opcode");
            GatewayAction::None
        }
    }
}

fn dispatch_event(kind: &str, data: serde_json::Value) -> Option<GatewayEvent> {
    let parsed = match kind {
        "READY" => {
            serde_json::from_value::<ReadyData>(data).map(|r| GatewayEvent::Ready { user: r.user })
        }
        "MESSAGE_CREATE" => serde_json::from_value(data).map(GatewayEvent::MessageCreate),
        "MESSAGE_DELETE" => serde_json::from_value(data).map(GatewayEvent::MessageDelete),
        _ => return None,
    };

    match parsed {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, kind, "could not deserialize dispatch event");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`, jitter within ±25%.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
