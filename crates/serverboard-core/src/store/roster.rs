// ── Roster reconciliation ──
//
// Merges each poll cycle's `Snapshot` into the persisted list of known
// endpoints. Entries that stop answering are flagged and counted rather
// than dropped, so the board can keep showing them until the eviction
// policy says otherwise.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::model::{Address, EndpointReport, Snapshot};

/// When endpoints that stopped answering are dropped from the roster.
///
/// The default drops an endpoint on the first cycle it goes missing. With
/// both bounds unset entries are retained forever and only flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Remove once `missed_count` exceeds this.
    pub max_missed_cycles: Option<u32>,
    /// Remove once the entry has been unresponsive longer than this. Zero
    /// removes it on the first missed cycle.
    pub max_unresponsive: Option<Duration>,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_missed_cycles: None,
            max_unresponsive: Some(Duration::ZERO),
        }
    }
}

impl EvictionPolicy {
    /// Never evict; unresponsive entries stay flagged on the roster.
    pub const RETAIN_ALL: Self = Self {
        max_missed_cycles: None,
        max_unresponsive: None,
    };

    pub fn retains_all(&self) -> bool {
        self.max_missed_cycles.is_none() && self.max_unresponsive.is_none()
    }

    fn should_evict(&self, entry: &RosterEntry, now: DateTime<Utc>) -> bool {
        let by_cycles = self
            .max_missed_cycles
            .is_some_and(|max| entry.missed_count > max);

        let by_age = match (self.max_unresponsive, entry.unresponsive_since) {
            (Some(max), _) if max.is_zero() => true,
            (Some(max), Some(since)) => (now - since).to_std().is_ok_and(|age| age > max),
            _ => false,
        };

        by_cycles || by_age
    }
}

/// Last known state of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub address: Address,
    /// Effective (non-bot) player count.
    pub player_count: u32,
    pub max_players: u32,
    pub server_name: String,
    pub map_name: String,
    /// Set once any report has been copied in.
    pub queried: bool,
    /// Consecutive cycles without a report.
    pub missed_count: u32,
    pub last_query_time: Option<DateTime<Utc>>,
    /// Query time of the first cycle it went missing.
    pub unresponsive_since: Option<DateTime<Utc>>,
}

impl RosterEntry {
    fn from_report(report: &EndpointReport) -> Self {
        Self {
            address: report.address.clone(),
            player_count: report.effective_player_count(),
            max_players: report.max_players,
            server_name: report.server_name.clone(),
            map_name: report.map_name.clone(),
            queried: true,
            missed_count: 0,
            last_query_time: Some(report.observed_at),
            unresponsive_since: None,
        }
    }

    fn differs_from(&self, report: &EndpointReport) -> bool {
        !self.queried
            || self.player_count != report.effective_player_count()
            || self.max_players != report.max_players
            || self.server_name != report.server_name
            || self.map_name != report.map_name
    }

    fn absorb(&mut self, report: &EndpointReport) {
        self.player_count = report.effective_player_count();
        self.max_players = report.max_players;
        self.server_name.clone_from(&report.server_name);
        self.map_name.clone_from(&report.map_name);
        self.queried = true;
        self.missed_count = 0;
        self.unresponsive_since = None;
        self.last_query_time = Some(report.observed_at);
    }

    pub fn is_unresponsive(&self) -> bool {
        self.unresponsive_since.is_some()
    }
}

/// Counts from one `reconcile` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileResult {
    pub inserted: usize,
    pub updated: usize,
    pub missing: usize,
    pub removed: usize,
}

impl ReconcileResult {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.missing > 0
    }
}

/// Ordered set of known endpoints. No two entries are equivalent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    last_snapshot_time: Option<DateTime<Utc>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_snapshot_time(&self) -> Option<DateTime<Utc>> {
        self.last_snapshot_time
    }

    /// Current addresses in roster order.
    pub fn addresses(&self) -> Vec<Address> {
        self.entries.iter().map(|e| e.address.clone()).collect()
    }

    /// Merge `snapshot` into the roster.
    ///
    /// Runs to completion without yielding, so no caller can observe a
    /// half-applied cycle.
    pub fn reconcile(&mut self, snapshot: &Snapshot, eviction: &EvictionPolicy) -> ReconcileResult {
        let mut result = ReconcileResult::default();
        let now = snapshot.query_time;

        // Flag entries the snapshot no longer mentions, evicting as configured.
        self.entries.retain_mut(|entry| {
            let seen = snapshot
                .reports()
                .iter()
                .any(|r| r.address.equivalent(&entry.address));
            if seen {
                return true;
            }

            result.missing += 1;
            entry.missed_count = entry.missed_count.saturating_add(1);
            entry.unresponsive_since.get_or_insert(now);

            if eviction.should_evict(entry, now) {
                info!(
                    address = %entry.address,
                    server = %entry.server_name,
                    missed = entry.missed_count,
                    "removing unresponsive server from roster"
                );
                result.removed += 1;
                false
            } else {
                true
            }
        });

        // Update known entries in place, collect the rest in snapshot order.
        let mut inserts: Vec<RosterEntry> = Vec::new();
        for report in snapshot.reports() {
            if let Some(entry) = self
                .entries
                .iter_mut()
                .find(|e| e.address.equivalent(&report.address))
            {
                if entry.differs_from(report) {
                    result.updated += 1;
                }
                entry.absorb(report);
            } else if !inserts
                .iter()
                .any(|e| e.address.equivalent(&report.address))
            {
                inserts.push(RosterEntry::from_report(report));
            }
        }

        result.inserted = inserts.len();
        self.entries.extend(inserts);
        self.last_snapshot_time = Some(now);

        if result.changed() {
            info!(
                updated = result.updated,
                inserted = result.inserted,
                missing = result.missing,
                removed = result.removed,
                "roster changed"
            );
        } else {
            debug!(entries = self.entries.len(), "roster unchanged");
        }

        result
    }

    /// Same length and pairwise-equivalent addresses, in order.
    pub fn matches(&self, other: &Roster) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(a, b)| a.address.equivalent(&b.address))
    }

    /// Order-sensitive comparison of what the board displays.
    ///
    /// An empty roster never differs. Otherwise a length change, or any
    /// position whose player count, server name or map differs, does.
    pub fn differs(&self, other: &Roster) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        if self.entries.len() != other.entries.len() {
            return true;
        }
        self.entries.iter().zip(&other.entries).any(|(a, b)| {
            a.player_count != b.player_count
                || a.server_name != b.server_name
                || a.map_name != b.map_name
        })
    }
}
