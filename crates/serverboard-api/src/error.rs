use thiserror::Error;

/// Top-level error type for the `serverboard-api` crate.
///
/// Covers every failure mode across the API surfaces this crate talks to:
/// HTTP transport, the Steam Web API, Discord REST and the Discord gateway.
/// `serverboard-core` maps these into its own failure taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The token or API key was rejected (HTTP 401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Building the HTTP client failed (TLS backend, header values).
    #[error("Client setup failed: {0}")]
    ClientSetup(String),

    // ── Discord ─────────────────────────────────────────────────────
    /// Discord asked us to slow down (HTTP 429).
    #[error("Rate limited -- retry after {retry_after_secs:.1}s")]
    RateLimited { retry_after_secs: f64 },

    /// Structured error from the Discord REST API.
    #[error("Discord API error (HTTP {status}): {message}")]
    Discord {
        message: String,
        code: Option<u64>,
        status: u16,
    },

    // ── Steam Web API ───────────────────────────────────────────────
    /// Non-success answer from the Steam Web API.
    #[error("Steam Web API error (HTTP {status}): {message}")]
    Steam { message: String, status: u16 },

    // ── Gateway ─────────────────────────────────────────────────────
    /// Gateway WebSocket connection failed.
    #[error("Gateway connection failed: {0}")]
    GatewayConnect(String),

    /// Gateway closed the session (close code + reason).
    #[error("Gateway closed (code {code}): {reason}")]
    GatewayClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying next cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::GatewayConnect(_) => true,
            Self::Discord { status, .. } | Self::Steam { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Discord { status: 404, .. } | Self::Steam { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the remote rejected our credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}
