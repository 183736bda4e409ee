// ── Scheduler loop ──
//
// WaitingForReady → Polling → Sleeping → Polling → … until the
// cancellation token fires. Chat events are handled while sleeping, one
// at a time, on the same task that runs the poll cycles.

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::board::Board;
use crate::config::IDLE_TICK;
use crate::error::CoreError;
use crate::model::UserId;
use crate::source::{Directory, EndpointQuery};
use crate::transport::{ChatEvent, ChatTransport};

/// Scheduler state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ScheduleState {
    WaitingForReady,
    Polling,
    Sleeping,
    Stopped,
}

/// Drives a [`Board`] on its poll interval.
pub struct Scheduler<Q, D, T> {
    board: Board<Q, D, T>,
    state: watch::Sender<ScheduleState>,
}

impl<Q, D, T> Scheduler<Q, D, T>
where
    Q: EndpointQuery,
    D: Directory,
    T: ChatTransport,
{
    pub fn new(board: Board<Q, D, T>) -> Self {
        let (state, _) = watch::channel(ScheduleState::WaitingForReady);
        Self { board, state }
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<ScheduleState> {
        self.state.subscribe()
    }

    pub fn board(&self) -> &Board<Q, D, T> {
        &self.board
    }

    pub fn into_board(self) -> Board<Q, D, T> {
        self.board
    }

    fn set_state(&self, state: ScheduleState) {
        trace!(%state, "scheduler state");
        self.state.send_replace(state);
    }

    /// Run until `cancel` fires.
    ///
    /// Fails only if the event stream closes before the transport ever
    /// became ready.
    pub async fn run(
        &mut self,
        mut events: mpsc::UnboundedReceiver<ChatEvent>,
        cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        self.set_state(ScheduleState::WaitingForReady);

        let own_user = match wait_for_ready(&mut events, &cancel).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.set_state(ScheduleState::Stopped);
                return Ok(());
            }
            Err(e) => {
                self.set_state(ScheduleState::Stopped);
                return Err(e);
            }
        };

        info!(user = %own_user, channel = %self.board.config().channel_id, "transport ready");
        self.board.restore(own_user).await;

        let mut events_open = true;

        'cycles: loop {
            self.set_state(ScheduleState::Polling);

            let sleep_for = if self.board.should_query() {
                let started = Instant::now();
                let cycle = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break 'cycles,
                    cycle = self.board.collect() => cycle,
                };

                let report = self.board.apply(cycle);
                debug!(
                    source = %report.source,
                    polled = report.polled,
                    answered = report.answered,
                    offline = report.offline,
                    "poll cycle complete"
                );
                self.board.publish_cycle(&report).await;
                self.board.next_sleep(started.elapsed())
            } else {
                IDLE_TICK
            };

            self.set_state(ScheduleState::Sleeping);
            let wake = Instant::now() + sleep_for;

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break 'cycles,
                    () = sleep_until(wake) => break,
                    event = events.recv(), if events_open => match event {
                        Some(event) => self.board.handle_event(event).await,
                        None => {
                            warn!("chat event stream closed, polling continues without commands");
                            events_open = false;
                        }
                    },
                }
            }
        }

        info!("scheduler stopped");
        self.set_state(ScheduleState::Stopped);
        Ok(())
    }
}

async fn wait_for_ready(
    events: &mut mpsc::UnboundedReceiver<ChatEvent>,
    cancel: &CancellationToken,
) -> Result<Option<UserId>, CoreError> {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(None),
            event = events.recv() => match event {
                Some(ChatEvent::Ready { user }) => return Ok(Some(user)),
                Some(other) => trace!(?other, "ignoring chat event before ready"),
                None => {
                    return Err(CoreError::Internal(
                        "chat event stream closed before the transport was ready".into(),
                    ));
                }
            },
        }
    }
}
