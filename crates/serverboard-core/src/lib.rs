//! Board logic between `serverboard-api` and the `serverboard` binary.
//!
//! - **[`Roster`]**: the persisted set of known endpoints. Each poll
//!   cycle's [`Snapshot`] is merged in by [`Roster::reconcile`], which
//!   inserts new endpoints, updates changed ones and tracks staleness of
//!   the ones that stopped answering.
//!
//! - **[`Orchestrator`]**: picks the addresses to poll (explicit list,
//!   cached roster or a fresh directory lookup) and polls them within a
//!   time budget.
//!
//! - **Presentation** ([`presentation`]): renders the roster into a
//!   [`Summary`] and decides between editing the tracked message and
//!   posting a new one.
//!
//! - **[`Board`] / [`Scheduler`]**: the context object owning all of the
//!   above, and the loop that drives it on the poll interval while
//!   reacting to chat events.
//!
//! Collaborators sit behind the [`EndpointQuery`], [`Directory`] and
//! [`ChatTransport`] traits; [`SteamSource`] and [`DiscordTransport`] adapt
//! the `serverboard-api` clients onto them.

pub mod board;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod presentation;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use board::{Board, Cycle, CycleReport};
pub use config::{BoardConfig, DiscoveryConfig, PresentationConfig, ScheduleConfig};
pub use discovery::{Orchestrator, PollSet, PollSetSource};
pub use error::CoreError;
pub use model::{Address, AddressError, ChannelId, EndpointReport, MessageId, Snapshot, UserId};
pub use presentation::{PublishOutcome, RenderState, Summary, SummaryField};
pub use scheduler::{ScheduleState, Scheduler};
pub use source::{Directory, EndpointQuery, SteamSource};
pub use store::{EvictionPolicy, PointerStore, ReconcileResult, Roster, RosterEntry};
pub use transport::{ChatEvent, ChatMessage, ChatTransport, DiscordTransport, chat_event};
