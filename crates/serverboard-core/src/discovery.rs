// ── Discovery and polling ──
//
// Each cycle picks a poll set (explicit list, cached roster, or a fresh
// directory lookup) and turns it into a `Snapshot`. Both the directory
// lookup and the poll batch run against `max_total_query_time`; whatever
// arrived before the deadline is kept.

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::error::CoreError;
use crate::model::{Address, Snapshot};
use crate::source::{Directory, EndpointQuery};
use crate::store::Roster;

/// Where a poll set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PollSetSource {
    Explicit,
    Roster,
    Directory,
}

/// Addresses to poll this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSet {
    pub addresses: Vec<Address>,
    pub source: PollSetSource,
    /// Why the directory lookup errored; `addresses` is then empty. A lookup
    /// cut short by the query budget is not an error.
    pub directory_error: Option<String>,
}

impl PollSet {
    pub fn directory_failed(&self) -> bool {
        self.directory_error.is_some()
    }
}

/// Builds poll sets and runs poll batches.
pub struct Orchestrator<Q, D> {
    query: Q,
    directory: D,
    config: DiscoveryConfig,
    last_directory_lookup: Option<Instant>,
}

impl<Q: EndpointQuery, D: Directory> Orchestrator<Q, D> {
    pub fn new(query: Q, directory: D, config: DiscoveryConfig) -> Self {
        Self {
            query,
            directory,
            config,
            last_directory_lookup: None,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn last_directory_lookup(&self) -> Option<Instant> {
        self.last_directory_lookup
    }

    /// Decide which addresses to poll this cycle.
    ///
    /// An explicit address list wins outright (the blacklist does not apply
    /// to it). Otherwise the roster is reused while the last directory
    /// lookup is younger than `query_interval`, and a fresh lookup is made
    /// once it is not.
    pub async fn build_poll_set(&mut self, roster: &Roster) -> PollSet {
        if !self.config.explicit_addresses.is_empty() {
            return PollSet {
                addresses: self.config.explicit_addresses.clone(),
                source: PollSetSource::Explicit,
                directory_error: None,
            };
        }

        let directory_fresh = self
            .last_directory_lookup
            .is_some_and(|at| at.elapsed() < self.config.query_interval);
        if !roster.is_empty() && directory_fresh {
            return PollSet {
                addresses: roster.addresses(),
                source: PollSetSource::Roster,
                directory_error: None,
            };
        }

        self.lookup().await
    }

    async fn lookup(&mut self) -> PollSet {
        let filter = self.config.directory_filter();
        info!(filter = %filter, "querying server directory");

        let started = Instant::now();
        let deadline = started + self.config.max_total_query_time;
        let mut found = Vec::new();
        let mut error = None;
        let mut results = self.directory.find(&filter);

        loop {
            match timeout_at(deadline, results.next()).await {
                Ok(Some(Ok(address))) => {
                    if address.is_blacklisted(&self.config.blacklist) {
                        debug!(%address, "skipping blacklisted server");
                        continue;
                    }
                    if !found.iter().any(|a: &Address| a.equivalent(&address)) {
                        found.push(address);
                    }
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "server directory lookup failed");
                    error = Some(match e {
                        CoreError::DirectoryUnavailable { reason } => reason,
                        other => other.to_string(),
                    });
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    info!(
                        found = found.len(),
                        "directory lookup hit the query budget, keeping partial results"
                    );
                    break;
                }
            }
        }
        drop(results);

        self.last_directory_lookup = Some(Instant::now());

        if error.is_some() {
            found.clear();
        }

        PollSet {
            addresses: found,
            source: PollSetSource::Directory,
            directory_error: error,
        }
    }

    /// Poll every address, in order, within the query budget.
    ///
    /// Failed queries are counted in `offline` and left out. Queries still
    /// in flight at the deadline are abandoned and not counted.
    pub async fn poll_all(&self, addresses: &[Address]) -> Snapshot {
        info!(count = addresses.len(), "querying servers");

        let deadline = Instant::now() + self.config.max_total_query_time;
        let concurrency = self.config.poll_concurrency.max(1);
        let mut snapshot = Snapshot::new(Utc::now());
        let mut offline: u32 = 0;

        let mut results = stream::iter(addresses)
            .map(|address| async move { (address, self.query.query(address).await) })
            .buffered(concurrency);

        loop {
            match timeout_at(deadline, results.next()).await {
                Ok(Some((_, Ok(report)))) => {
                    snapshot.add(report);
                }
                Ok(Some((address, Err(e)))) => {
                    info!(%address, error = %e, "couldn't contact server");
                    offline = offline.saturating_add(1);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        answered = snapshot.len(),
                        offline, "poll batch hit the query budget, abandoning the rest"
                    );
                    break;
                }
            }
        }

        snapshot.offline = offline;
        snapshot.query_time = Utc::now();
        snapshot
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use futures_util::stream::BoxStream;

    use super::*;
    use crate::error::CoreError;
    use crate::model::EndpointReport;
    use crate::store::EvictionPolicy;

    /// Answers from a fixed table, sleeping `delay` per query.
    struct TableQuery {
        answers: HashMap<String, u32>,
        delay: Duration,
    }

    impl EndpointQuery for TableQuery {
        async fn query(&self, address: &Address) -> Result<EndpointReport, CoreError> {
            tokio::time::sleep(self.delay).await;
            match self.answers.get(&address.to_string()) {
                Some(players) => Ok(EndpointReport {
                    address: address.clone(),
                    player_count: *players,
                    bot_count: None,
                    max_players: 16,
                    server_name: address.to_string(),
                    map_name: "map".into(),
                    observed_at: Utc::now(),
                }),
                None => Err(CoreError::Query {
                    address: address.to_string(),
                    reason: "timed out".into(),
                }),
            }
        }
    }

    /// Yields a fixed list, optionally failing after it.
    struct ListDirectory {
        addresses: Vec<&'static str>,
        fail: bool,
    }

    impl Directory for ListDirectory {
        fn find<'a>(&'a self, _filter: &'a str) -> BoxStream<'a, Result<Address, CoreError>> {
            let mut items: Vec<Result<Address, CoreError>> = self
                .addresses
                .iter()
                .map(|a| Ok(a.parse().unwrap()))
                .collect();
            if self.fail {
                items.push(Err(CoreError::DirectoryUnavailable {
                    reason: "master server timed out".into(),
                }));
            }
            stream::iter(items).boxed()
        }
    }

    fn orchestrator(
        answers: &[(&str, u32)],
        directory: Vec<&'static str>,
        config: DiscoveryConfig,
    ) -> Orchestrator<TableQuery, ListDirectory> {
        Orchestrator::new(
            TableQuery {
                answers: answers.iter().map(|(a, p)| ((*a).to_owned(), *p)).collect(),
                delay: Duration::from_millis(10),
            },
            ListDirectory {
                addresses: directory,
                fail: false,
            },
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_list_ignores_blacklist() {
        let config = DiscoveryConfig {
            explicit_addresses: vec![Address::new("a", 1)],
            blacklist: vec![Address::any_port("a")],
            ..DiscoveryConfig::default()
        };
        let mut orch = orchestrator(&[], vec!["z:1"], config);

        let set = orch.build_poll_set(&Roster::new()).await;
        assert_eq!(set.source, PollSetSource::Explicit);
        assert_eq!(set.addresses, vec![Address::new("a", 1)]);
        assert!(orch.last_directory_lookup().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn directory_results_are_filtered() {
        let config = DiscoveryConfig {
            blacklist: vec![Address::any_port("b")],
            ..DiscoveryConfig::default()
        };
        let mut orch = orchestrator(&[], vec!["a:1", "b:1", "c:1", "a:1"], config);

        let set = orch.build_poll_set(&Roster::new()).await;
        assert_eq!(set.source, PollSetSource::Directory);
        assert_eq!(set.addresses, vec![Address::new("a", 1), Address::new("c", 1)]);
        assert!(!set.directory_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn roster_reused_while_directory_is_fresh() {
        let mut orch = orchestrator(&[("a:1", 1)], vec!["a:1", "b:1"], DiscoveryConfig::default());
        let mut roster = Roster::new();

        let first = orch.build_poll_set(&roster).await;
        assert_eq!(first.source, PollSetSource::Directory);

        let snapshot = orch.poll_all(&first.addresses).await;
        roster.reconcile(&snapshot, &EvictionPolicy::default());

        tokio::time::advance(Duration::from_secs(30)).await;
        let second = orch.build_poll_set(&roster).await;
        assert_eq!(second.source, PollSetSource::Roster);
        assert_eq!(second.addresses, vec![Address::new("a", 1)]);

        tokio::time::advance(Duration::from_secs(100)).await;
        let third = orch.build_poll_set(&roster).await;
        assert_eq!(third.source, PollSetSource::Directory);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_roster_always_consults_directory() {
        let mut orch = orchestrator(&[], vec!["a:1"], DiscoveryConfig::default());
        orch.build_poll_set(&Roster::new()).await;
        let again = orch.build_poll_set(&Roster::new()).await;
        assert_eq!(again.source, PollSetSource::Directory);
    }

    #[tokio::test(start_paused = true)]
    async fn directory_failure_yields_empty_set() {
        let mut orch = Orchestrator::new(
            TableQuery {
                answers: HashMap::new(),
                delay: Duration::ZERO,
            },
            ListDirectory {
                addresses: vec!["a:1"],
                fail: true,
            },
            DiscoveryConfig::default(),
        );

        let set = orch.build_poll_set(&Roster::new()).await;
        assert!(set.addresses.is_empty());
        assert_eq!(set.directory_error.as_deref(), Some("master server timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_count_as_offline() {
        let orch = orchestrator(&[("a:1", 5), ("c:1", 1)], vec![], DiscoveryConfig::default());
        let addresses = Address::parse_list("a:1,b:1,c:1").unwrap();

        let snapshot = orch.poll_all(&addresses).await;
        let polled: Vec<_> = snapshot.reports().iter().map(|r| r.address.to_string()).collect();
        assert_eq!(polled, vec!["a:1", "c:1"]);
        assert_eq!(snapshot.offline, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_abandons_slow_queries() {
        let config = DiscoveryConfig {
            max_total_query_time: Duration::from_secs(25),
            poll_concurrency: 1,
            ..DiscoveryConfig::default()
        };
        let orch = Orchestrator::new(
            TableQuery {
                answers: [("a:1", 1), ("b:1", 2), ("c:1", 3)]
                    .iter()
                    .map(|(a, p)| ((*a).to_owned(), *p))
                    .collect(),
                delay: Duration::from_secs(10),
            },
            ListDirectory {
                addresses: vec![],
                fail: false,
            },
            config,
        );

        let started = Instant::now();
        let snapshot = orch
            .poll_all(&Address::parse_list("a:1,b:1,c:1").unwrap())
            .await;

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.offline, 0);
        assert!(started.elapsed() <= Duration::from_secs(26));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_keeps_address_order() {
        let config = DiscoveryConfig {
            poll_concurrency: 3,
            ..DiscoveryConfig::default()
        };
        let orch = orchestrator(&[("a:1", 1), ("b:1", 2), ("c:1", 3)], vec![], config);

        let started = Instant::now();
        let snapshot = orch
            .poll_all(&Address::parse_list("c:1,a:1,b:1").unwrap())
            .await;

        let order: Vec<_> = snapshot.reports().iter().map(|r| r.player_count).collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert!(started.elapsed() < Duration::from_millis(30));
    }
}
