//! `serverboard run`: wire the board to Steam and Discord and drive it
//! until interrupted.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use serverboard_api::DiscordClient;
use serverboard_api::discord::gateway::intents;
use serverboard_api::discord::{GatewayEvent, GatewayHandle, ReconnectConfig};
use serverboard_config::Config;
use serverboard_core::{
    Board, ChatEvent, CoreError, DiscordTransport, PointerStore, Scheduler, chat_event,
};

use crate::cli::RunArgs;
use crate::error::CliError;

const INTENTS: u64 = intents::GUILDS | intents::GUILD_MESSAGES | intents::MESSAGE_CONTENT;

pub async fn handle(args: RunArgs, config: &Config) -> Result<(), CliError> {
    let board_config = config.board_config()?;
    let token = config.discord_token()?;
    let transport = super::transport_config(config);

    let client = match config.discord.api_base.as_deref() {
        Some(base) => DiscordClient::with_base_url(base, &token, &transport),
        None => DiscordClient::new(&token, &transport),
    }
    .map_err(CoreError::from)?;
    let discord = DiscordTransport::from_client(client, board_config.channel_id);

    // Bad tokens fail here, before anything is spawned
    let own_user = discord.current_user().await?;
    info!(user = %own_user, channel = %discord.channel(), "logged in");

    let source = Arc::new(super::steam_source(
        config,
        &transport,
        board_config.discovery.directory_limit,
    )?);
    let pointer = PointerStore::new(config.state_path());
    let board = Board::new(
        board_config,
        Arc::clone(&source),
        source,
        discord,
        Some(pointer),
    );
    let mut scheduler = Scheduler::new(board);

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::unbounded_channel();

    // Without a gateway the sender is held open here so the scheduler
    // keeps sleeping on its interval instead of seeing a closed stream.
    let (gateway, _idle_sender) = if config.discord.gateway && !args.no_gateway {
        let url = GatewayHandle::default_url().map_err(CoreError::from)?;
        let handle = GatewayHandle::spawn(
            url,
            token,
            INTENTS,
            ReconnectConfig::default(),
            cancel.child_token(),
        );
        tokio::spawn(bridge(handle.subscribe(), tx));
        (Some(handle), None)
    } else {
        info!("gateway disabled, chat commands are ignored");
        tx.send(ChatEvent::Ready { user: own_user })
            .map_err(|_| CliError::Internal("scheduler event channel closed".into()))?;
        (None, Some(tx))
    };

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            signal_cancel.cancel();
        }
    });

    let mut state = scheduler.state();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = state.borrow_and_update().to_string();
            debug!(state = %current, "scheduler state");
        }
    });

    let result = scheduler.run(rx, cancel.clone()).await;

    if let Some(gateway) = gateway {
        gateway.shutdown();
    }
    cancel.cancel();

    result.map_err(CliError::from)
}

/// Forward gateway dispatches into the scheduler's event channel until
/// either side goes away.
async fn bridge(
    mut events: broadcast::Receiver<Arc<GatewayEvent>>,
    tx: mpsc::UnboundedSender<ChatEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if tx.send(chat_event(&event)).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "gateway events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("gateway bridge stopped");
}
