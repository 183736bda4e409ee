//! Command dispatch: bridges CLI args -> board wiring -> output formatting.

pub mod config_cmd;
pub mod poll;
pub mod run;

use serverboard_api::{SteamWebClient, TransportConfig};
use serverboard_config::Config;
use serverboard_core::{CoreError, SteamSource};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command that needs a loaded configuration.
pub async fn dispatch(cmd: Command, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(args, config).await,
        Command::Poll => poll::handle(config, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not take a loaded configuration".into(),
        )),
    }
}

// ── Shared wiring ────────────────────────────────────────────────────

pub(crate) fn transport_config(config: &Config) -> TransportConfig {
    TransportConfig::default().with_timeout(config.http_timeout())
}

/// Steam server list source, honoring `steam.api_base`.
pub(crate) fn steam_source(
    config: &Config,
    transport: &TransportConfig,
    directory_limit: u32,
) -> Result<SteamSource, CliError> {
    let api_key = config.steam_api_key()?;
    let client = match config.steam.api_base.as_deref() {
        Some(base) => SteamWebClient::with_base_url(base, api_key, transport),
        None => SteamWebClient::new(api_key, transport),
    }
    .map_err(CoreError::from)?;
    Ok(SteamSource::from_client(client, directory_limit))
}
