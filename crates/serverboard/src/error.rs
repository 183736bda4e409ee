//! CLI error types with miette diagnostics.
//!
//! Maps `ConfigError` and `CoreError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use serverboard_config::ConfigError;
use serverboard_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach {service}: {message}")]
    #[diagnostic(
        code(serverboard::connection_failed),
        help("Check network access, or raise `timeout` in the config file.")
    )]
    ConnectionFailed { service: String, message: String },

    #[error("{service} error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    #[diagnostic(code(serverboard::api_error))]
    Api {
        service: String,
        status: Option<u16>,
        message: String,
    },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(serverboard::auth_failed),
        help(
            "Verify the Discord bot token and the Steam Web API key.\n\
             Store them with: serverboard config set-secret discord-token"
        )
    )]
    AuthFailed { message: String },

    #[error("No {what} configured")]
    #[diagnostic(
        code(serverboard::no_credentials),
        help(
            "Store it with: serverboard config set-secret <discord-token|steam-api-key>\n\
             Or set SERVERBOARD_DISCORD__TOKEN / SERVERBOARD_STEAM__API_KEY."
        )
    )]
    NoCredentials { what: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(serverboard::validation))]
    Validation { field: String, reason: String },

    #[error("Could not load configuration")]
    #[diagnostic(
        code(serverboard::config),
        help("Check the file at `serverboard config path`, or create one with: serverboard config init")
    )]
    Config(#[source] Box<ConfigError>),

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(serverboard::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Runtime ──────────────────────────────────────────────────────

    #[error("Server directory unavailable: {reason}")]
    #[diagnostic(
        code(serverboard::directory_unavailable),
        help("List servers explicitly under [discovery] servers to poll without the directory.")
    )]
    DirectoryUnavailable { reason: String },

    #[error("{0}")]
    #[diagnostic(code(serverboard::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(serverboard::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::DirectoryUnavailable { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Validation { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::MissingSecret { what } => CliError::NoCredentials { what: what.into() },
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Authentication { message } => CliError::AuthFailed { message },

            CoreError::Transport {
                message,
                status: None,
            } => CliError::ConnectionFailed {
                service: "remote API".into(),
                message,
            },

            CoreError::Transport { message, status } => CliError::Api {
                service: "remote API".into(),
                status,
                message,
            },

            CoreError::Query { address, reason } => CliError::ConnectionFailed {
                service: address,
                message: reason,
            },

            CoreError::DirectoryUnavailable { reason } => {
                CliError::DirectoryUnavailable { reason }
            }

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Io(e) => CliError::Io(e),

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
