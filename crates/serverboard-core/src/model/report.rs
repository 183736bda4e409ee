// ── Poll results ──
//
// One `EndpointReport` per successful endpoint query, collected into a
// `Snapshot` per poll cycle.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Address;

/// What a single endpoint reported when polled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointReport {
    /// The address this report was polled at.
    pub address: Address,
    pub player_count: u32,
    /// Older protocol variants do not report bots.
    pub bot_count: Option<u32>,
    pub max_players: u32,
    pub server_name: String,
    pub map_name: String,
    pub observed_at: DateTime<Utc>,
}

impl EndpointReport {
    /// Human players: `player_count - bot_count`, or the raw count when the
    /// subtraction would underflow.
    pub fn effective_player_count(&self) -> u32 {
        let bots = self.bot_count.unwrap_or(0);
        self.player_count
            .checked_sub(bots)
            .unwrap_or(self.player_count)
    }
}

/// Reports gathered during one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    reports: Vec<EndpointReport>,
    /// When the cycle finished polling.
    pub query_time: DateTime<Utc>,
    /// Endpoints that failed to answer during the cycle.
    pub offline: u32,
}

impl Snapshot {
    pub fn new(query_time: DateTime<Utc>) -> Self {
        Self {
            reports: Vec::new(),
            query_time,
            offline: 0,
        }
    }

    /// Append a report unless an equivalent address is already present.
    ///
    /// Returns whether the report was added.
    pub fn add(&mut self, report: EndpointReport) -> bool {
        if self
            .reports
            .iter()
            .any(|r| r.address.equivalent(&report.address))
        {
            return false;
        }
        self.reports.push(report);
        true
    }

    pub fn reports(&self) -> &[EndpointReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
