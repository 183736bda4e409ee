// ── Board context ──
//
// Owns everything one summary board needs: roster, render state, the
// orchestrator with its collaborators, the chat transport and the render
// pointer. The scheduler drives it; nothing else holds a reference, so
// cycles never overlap.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{BoardConfig, HISTORY_WINDOW};
use crate::discovery::{Orchestrator, PollSet, PollSetSource};
use crate::model::{Snapshot, UserId};
use crate::presentation::{
    PublishOutcome, RenderState, Summary, publish, render, should_create_new_message,
};
use crate::source::{Directory, EndpointQuery};
use crate::store::{PointerStore, ReconcileResult, Roster};
use crate::transport::{ChatEvent, ChatMessage, ChatTransport};

/// Chat commands that ask for the list.
const LIST_COMMANDS: [&str; 3] = ["servers", "serverlist", "list"];

/// Poll output of one cycle, not yet applied to the roster.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub poll_set: PollSet,
    pub snapshot: Snapshot,
}

/// What applying a cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub source: PollSetSource,
    pub polled: usize,
    pub answered: usize,
    pub offline: u32,
    pub offline_changed: bool,
    pub result: ReconcileResult,
    /// Directory failure, or a non-empty poll set with no answers.
    pub failed: bool,
}

pub struct Board<Q, D, T> {
    config: BoardConfig,
    roster: Roster,
    render: RenderState,
    orchestrator: Orchestrator<Q, D>,
    transport: T,
    pointer: Option<PointerStore>,
    own_user: Option<UserId>,
    last_poll: Option<Instant>,
    last_offline: u32,
    consecutive_failures: u32,
}

impl<Q, D, T> Board<Q, D, T>
where
    Q: EndpointQuery,
    D: Directory,
    T: ChatTransport,
{
    pub fn new(
        config: BoardConfig,
        query: Q,
        directory: D,
        transport: T,
        pointer: Option<PointerStore>,
    ) -> Self {
        let orchestrator = Orchestrator::new(query, directory, config.discovery.clone());
        Self {
            config,
            roster: Roster::new(),
            render: RenderState::default(),
            orchestrator,
            transport,
            pointer,
            own_user: None,
            last_poll: None,
            last_offline: 0,
            consecutive_failures: 0,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn render_state(&self) -> &RenderState {
        &self.render
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn own_user(&self) -> Option<UserId> {
        self.own_user
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Whether the endpoints are due for another poll: never polled, or
    /// the interval has been exceeded.
    pub fn should_query(&self) -> bool {
        self.last_poll
            .is_none_or(|at| at.elapsed() > self.config.schedule.server_query_interval)
    }

    /// Discover and poll, without touching the roster.
    ///
    /// Safe to abandon midway: nothing is committed until [`apply`](Self::apply).
    pub async fn collect(&mut self) -> Cycle {
        let poll_set = self.orchestrator.build_poll_set(&self.roster).await;
        let snapshot = if poll_set.addresses.is_empty() {
            debug!(source = %poll_set.source, "nothing to poll");
            Snapshot::new(Utc::now())
        } else {
            self.orchestrator.poll_all(&poll_set.addresses).await
        };
        Cycle { poll_set, snapshot }
    }

    /// Reconcile a collected cycle into the roster.
    pub fn apply(&mut self, cycle: Cycle) -> CycleReport {
        let Cycle { poll_set, snapshot } = cycle;

        let result = self.roster.reconcile(&snapshot, &self.config.eviction);
        self.last_poll = Some(Instant::now());

        let failed =
            poll_set.directory_failed() || (!poll_set.addresses.is_empty() && snapshot.is_empty());
        if failed {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            warn!(
                failures = self.consecutive_failures,
                source = %poll_set.source,
                "poll cycle produced no results"
            );
        } else {
            self.consecutive_failures = 0;
        }

        let offline_changed = snapshot.offline != self.last_offline;
        self.last_offline = snapshot.offline;

        CycleReport {
            source: poll_set.source,
            polled: poll_set.addresses.len(),
            answered: snapshot.len(),
            offline: snapshot.offline,
            offline_changed,
            result,
            failed,
        }
    }

    /// One full discovery + poll + reconcile.
    pub async fn refresh(&mut self) -> CycleReport {
        let cycle = self.collect().await;
        self.apply(cycle)
    }

    /// Refresh only when due.
    pub async fn get_or_refresh(&mut self) -> Option<CycleReport> {
        if self.should_query() {
            Some(self.refresh().await)
        } else {
            None
        }
    }

    /// Sleep before the next poll, given how long the last one took.
    ///
    /// `max(interval - elapsed, min_sleep)`, stretched exponentially while
    /// cycles keep failing and capped at `max_backoff`.
    pub fn next_sleep(&self, elapsed: Duration) -> Duration {
        let schedule = &self.config.schedule;
        let base = schedule
            .server_query_interval
            .saturating_sub(elapsed)
            .max(schedule.min_sleep);

        if self.consecutive_failures == 0 {
            return base;
        }

        let factor = 1_u32 << self.consecutive_failures.min(16);
        schedule
            .server_query_interval
            .saturating_mul(factor)
            .min(schedule.max_backoff)
            .max(base)
    }

    // ── Presentation ─────────────────────────────────────────────────

    pub fn summary(&self) -> Summary {
        render(
            &self.roster,
            self.last_offline,
            self.config.schedule.server_query_interval,
            &self.config.presentation,
        )
    }

    /// Render and publish the roster. An empty roster is not published.
    pub async fn publish(&mut self) -> Option<PublishOutcome> {
        if self.roster.is_empty() {
            debug!("nothing to print");
            return None;
        }

        let summary = self.summary();
        Some(
            publish(
                &self.transport,
                &summary,
                &mut self.render,
                self.pointer.as_ref(),
                self.config.presentation.max_other_messages,
            )
            .await,
        )
    }

    /// Publish after a scheduled cycle, skipping no-op edits.
    pub async fn publish_cycle(&mut self, report: &CycleReport) -> Option<PublishOutcome> {
        let new_message_due =
            should_create_new_message(&self.render, self.config.presentation.max_other_messages);
        if !report.result.changed() && !report.offline_changed && !new_message_due {
            trace!("roster unchanged, leaving summary as is");
            return None;
        }
        self.publish().await
    }

    // ── Chat events ──────────────────────────────────────────────────

    /// Re-attach to the summary posted before a restart.
    ///
    /// Loads the persisted message id, confirms it still exists, then walks
    /// the newest channel messages counting foreign ones until it is found.
    /// A summary buried deeper than the inspected window is re-posted on the
    /// next publish.
    pub async fn restore(&mut self, own_user: UserId) {
        self.own_user = Some(own_user);

        let persisted = match self.pointer.as_ref().map(PointerStore::load) {
            Some(Ok(id)) => id,
            Some(Err(e)) => {
                warn!(error = %e, "failed to read render pointer");
                None
            }
            None => None,
        };

        if let Some(id) = persisted {
            match self.transport.fetch_message(id).await {
                Ok(Some(_)) => {
                    info!(%id, "found last summary");
                    self.render.current_message_id = Some(id);
                }
                Ok(None) => info!(%id, "last summary no longer exists"),
                Err(e) => warn!(error = %e, %id, "failed to look up last summary"),
            }
        }

        let history = match self.transport.fetch_recent_history(HISTORY_WINDOW).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "failed to read channel history");
                return;
            }
        };

        let mut foreign: u32 = 0;
        let mut found = false;
        for msg in &history {
            if self.render.is_own(msg.id) {
                found = true;
                break;
            }
            foreign = foreign.saturating_add(1);
        }
        self.render.messages_since_last_render = foreign;

        if !found && foreign >= u32::from(HISTORY_WINDOW) {
            // Buried: force a fresh post.
            let max_other = self.config.presentation.max_other_messages;
            self.render.messages_since_last_render = foreign.max(max_other.saturating_add(1));
        }

        debug!(foreign, found, "restored render state");
    }

    /// React to one chat event.
    pub async fn handle_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Ready { user } => {
                trace!(%user, "transport ready again");
                self.own_user = Some(user);
            }
            ChatEvent::MessageCreated(msg) => self.on_message(msg).await,
            ChatEvent::MessageDeleted { id, channel_id } => {
                if self.render.current_message_id.is_none() {
                    return;
                }
                if self.render.is_own(id) {
                    info!(%id, "our summary was deleted");
                    self.render.clear();
                } else if channel_id == self.config.channel_id {
                    self.render.note_foreign_delete();
                }
            }
        }
    }

    async fn on_message(&mut self, msg: ChatMessage) {
        if msg.channel_id != self.config.channel_id {
            return;
        }
        if self.render.is_own(msg.id) || self.own_user == Some(msg.author) {
            return;
        }

        self.render.note_foreign_message();

        let Some(command) = msg.content.strip_prefix('!') else {
            return;
        };
        if !LIST_COMMANDS.contains(&command.trim_end()) {
            return;
        }

        let new_message_due =
            should_create_new_message(&self.render, self.config.presentation.max_other_messages);
        if !self.should_query() && !new_message_due {
            debug!(author = %msg.author, "list command ignored, summary is fresh");
            return;
        }

        info!(author = %msg.author, command, "list requested");
        self.get_or_refresh().await;
        self.publish().await;
    }
}
