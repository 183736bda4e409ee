// ── Summary rendering ──

use std::cmp::Reverse;
use std::time::Duration;

use serde::Serialize;

use crate::config::PresentationConfig;
use crate::store::Roster;

/// Transport-neutral rendering of the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<SummaryField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryField {
    pub name: String,
    pub value: String,
}

/// Render the roster, busiest servers first, at most `embed_max` of them.
///
/// The description counts every responsive roster entry, including ones
/// beyond the cut. Entries kept on the roster while unresponsive sort
/// last and are marked instead of showing their stale player count.
pub fn render(
    roster: &Roster,
    offline: u32,
    interval: Duration,
    config: &PresentationConfig,
) -> Summary {
    let mut entries: Vec<_> = roster.entries().iter().collect();
    // Stable: equal counts keep roster order.
    entries.sort_by_key(|e| (e.is_unresponsive(), Reverse(e.player_count)));
    let online = entries.iter().filter(|e| !e.is_unresponsive()).count();

    let mut description = format!("{online} server(s) online");
    if offline > 0 {
        description.push_str(&format!(", {offline} offline"));
    }
    description.push_str(&format!("\nUpdating every {} seconds", interval.as_secs()));

    let fields = entries
        .into_iter()
        .take(config.embed_max.max(1))
        .map(|entry| SummaryField {
            name: if entry.is_unresponsive() {
                format!("unresponsive | {}", entry.server_name)
            } else {
                format!(
                    "{}/{} | {}",
                    entry.player_count, entry.max_players, entry.server_name
                )
            },
            value: format!(
                "Map: {} | Connect: {}{}",
                entry.map_name, config.connect_prefix, entry.address
            ),
        })
        .collect();

    Summary {
        title: config.title.clone(),
        description,
        color: config.color,
        fields,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{EndpointReport, Snapshot};
    use crate::store::EvictionPolicy;

    fn roster(servers: &[(&str, u32, &str)]) -> Roster {
        let mut snap = Snapshot::new(Utc::now());
        for (address, players, name) in servers {
            snap.add(EndpointReport {
                address: address.parse().unwrap(),
                player_count: *players,
                bot_count: None,
                max_players: 16,
                server_name: (*name).to_owned(),
                map_name: "zm_lab".into(),
                observed_at: Utc::now(),
            });
        }
        let mut roster = Roster::new();
        roster.reconcile(&snap, &EvictionPolicy::default());
        roster
    }

    #[test]
    fn renders_description_and_fields() {
        let config = PresentationConfig {
            title: "ZM Servers".into(),
            ..PresentationConfig::default()
        };
        let summary = render(
            &roster(&[("a:27015", 2, "Quiet"), ("b:27015", 7, "Busy")]),
            0,
            Duration::from_secs(20),
            &config,
        );

        assert_eq!(summary.title, "ZM Servers");
        assert_eq!(
            summary.description,
            "2 server(s) online\nUpdating every 20 seconds"
        );
        assert_eq!(
            summary.fields,
            vec![
                SummaryField {
                    name: "7/16 | Busy".into(),
                    value: "Map: zm_lab | Connect: steam://connect/b:27015".into(),
                },
                SummaryField {
                    name: "2/16 | Quiet".into(),
                    value: "Map: zm_lab | Connect: steam://connect/a:27015".into(),
                },
            ]
        );
    }

    #[test]
    fn offline_count_is_mentioned() {
        let summary = render(
            &roster(&[("a:1", 1, "A")]),
            3,
            Duration::from_secs(60),
            &PresentationConfig::default(),
        );
        assert_eq!(
            summary.description,
            "1 server(s) online, 3 offline\nUpdating every 60 seconds"
        );
    }

    #[test]
    fn truncates_to_embed_max_keeping_ties_stable() {
        let config = PresentationConfig {
            embed_max: 2,
            ..PresentationConfig::default()
        };
        let summary = render(
            &roster(&[("a:1", 3, "A"), ("b:1", 5, "B"), ("c:1", 3, "C")]),
            0,
            Duration::from_secs(20),
            &config,
        );

        let names: Vec<_> = summary.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["5/16 | B", "3/16 | A"]);
        assert!(summary.description.starts_with("3 server(s) online"));
    }

    #[test]
    fn embed_max_zero_still_shows_one() {
        let config = PresentationConfig {
            embed_max: 0,
            ..PresentationConfig::default()
        };
        let summary = render(
            &roster(&[("a:1", 3, "A"), ("b:1", 5, "B")]),
            0,
            Duration::from_secs(20),
            &config,
        );
        assert_eq!(summary.fields.len(), 1);
    }

    #[test]
    fn retained_unresponsive_entry_is_not_shown_online() {
        let keep = EvictionPolicy::RETAIN_ALL;
        let report = |address: &str, players: u32, name: &str| EndpointReport {
            address: address.parse().unwrap(),
            player_count: players,
            bot_count: None,
            max_players: 10,
            server_name: name.into(),
            map_name: "zm_lab".into(),
            observed_at: Utc::now(),
        };

        let mut roster = Roster::new();
        let mut first = Snapshot::new(Utc::now());
        first.add(report("a:1", 5, "A"));
        first.add(report("b:1", 9, "B"));
        roster.reconcile(&first, &keep);

        for _ in 0..50 {
            let mut only_a = Snapshot::new(Utc::now());
            only_a.add(report("a:1", 5, "A"));
            roster.reconcile(&only_a, &keep);
        }
        assert_eq!(roster.len(), 2);

        let summary = render(&roster, 1, Duration::from_secs(20), &PresentationConfig::default());
        assert_eq!(
            summary.description,
            "1 server(s) online, 1 offline\nUpdating every 20 seconds"
        );
        let names: Vec<_> = summary.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["5/10 | A", "unresponsive | B"]);
    }

    #[test]
    fn custom_connect_prefix() {
        let config = PresentationConfig {
            connect_prefix: String::new(),
            ..PresentationConfig::default()
        };
        let summary = render(&roster(&[("a", 1, "A")]), 0, Duration::from_secs(5), &config);
        assert_eq!(summary.fields[0].value, "Map: zm_lab | Connect: a");
    }
}
