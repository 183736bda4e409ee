//! One discovery + poll cycle, printed instead of posted.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::{Duration, Instant};

use owo_colors::OwoColorize;
use tabled::Tabled;

use serverboard_config::Config;
use serverboard_core::{EvictionPolicy, Orchestrator, Roster, RosterEntry};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Map")]
    map: String,
    #[tabled(rename = "Players")]
    players: String,
}

impl ServerRow {
    fn new(entry: &RosterEntry, color: bool) -> Self {
        let players = format!("{}/{}", entry.player_count, entry.max_players);
        Self {
            address: entry.address.to_string(),
            name: entry.server_name.clone(),
            map: entry.map_name.clone(),
            players: if color && entry.player_count > 0 {
                players.green().bold().to_string()
            } else {
                players
            },
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let discovery = config.discovery_config()?;
    let transport = super::transport_config(config);
    let source = Arc::new(super::steam_source(
        config,
        &transport,
        discovery.directory_limit,
    )?);

    let started = Instant::now();
    let mut orchestrator = Orchestrator::new(Arc::clone(&source), source, discovery);
    let mut roster = Roster::new();

    let poll_set = orchestrator.build_poll_set(&roster).await;
    if let Some(reason) = poll_set.directory_error {
        return Err(CliError::DirectoryUnavailable { reason });
    }

    let snapshot = orchestrator.poll_all(&poll_set.addresses).await;
    roster.reconcile(&snapshot, &EvictionPolicy::default());
    let elapsed = started.elapsed();

    let mut entries = roster.entries().to_vec();
    entries.sort_by_key(|e| Reverse(e.player_count));

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &entries,
        |e| ServerRow::new(e, color),
        |e| e.address.to_string(),
    )?;
    output::print_output(&out, global.quiet);

    if !global.quiet {
        let players: u32 = entries.iter().map(|e| e.player_count).sum();
        eprintln!(
            "{} servers ({}), {players} players, {} offline, took {}",
            entries.len(),
            poll_set.source,
            snapshot.offline,
            humantime::format_duration(round_to_millis(elapsed)),
        );
    }
    Ok(())
}

fn round_to_millis(d: Duration) -> Duration {
    Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
