// ── Core error types ──
//
// Domain-level failures from serverboard-core. Consumers never see raw
// wire errors: the `From<serverboard_api::Error>` impl translates them,
// and the collaborator adapters pick `Query` / `DirectoryUnavailable`
// explicitly where the context is known.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Collaborator failures ────────────────────────────────────────
    /// A single endpoint could not be queried (timeout, unreachable,
    /// malformed answer). Counted as offline for the cycle.
    #[error("Query of {address} failed: {reason}")]
    Query { address: String, reason: String },

    /// The directory lookup failed as a whole.
    #[error("Server directory unavailable: {reason}")]
    DirectoryUnavailable { reason: String },

    /// The chat transport rejected or failed a call.
    #[error("Chat transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Local failures ───────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The remote reported the target as gone (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                status: Some(404),
                ..
            }
        )
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<serverboard_api::Error> for CoreError {
    fn from(err: serverboard_api::Error) -> Self {
        use serverboard_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::Authentication { message },
            Api::Transport(ref e) => CoreError::Transport {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Timeout { timeout_secs } => CoreError::Transport {
                message: format!("request timed out after {timeout_secs}s"),
                status: None,
            },
            Api::ClientSetup(message) => CoreError::Config { message },
            Api::RateLimited { retry_after_secs } => CoreError::Transport {
                message: format!("rate limited -- retry after {retry_after_secs:.1}s"),
                status: Some(429),
            },
            Api::Discord {
                message, status, ..
            }
            | Api::Steam { message, status } => CoreError::Transport {
                message,
                status: Some(status),
            },
            Api::GatewayConnect(reason) => CoreError::Transport {
                message: format!("gateway connection failed: {reason}"),
                status: None,
            },
            Api::GatewayClosed { code, reason } => CoreError::Transport {
                message: format!("gateway closed (code {code}): {reason}"),
                status: None,
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
