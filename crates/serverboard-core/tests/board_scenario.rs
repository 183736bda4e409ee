#![allow(clippy::unwrap_used)]
// End-to-end board behavior against scripted collaborators.

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{
    BOT, CHANNEL, Call, Op, RecordingTransport, SOMEONE, ScriptedDirectory, ScriptedQuery,
    config, server,
};
use serverboard_core::{
    Address, Board, BoardConfig, ChatEvent, ChatMessage, EvictionPolicy, MessageId, PointerStore,
    PollSetSource, PublishOutcome,
};

type TestBoard = Board<ScriptedQuery, ScriptedDirectory, RecordingTransport>;

fn two_servers() -> ScriptedQuery {
    let query = ScriptedQuery::new();
    query.set("a:27015", server(5, 10, "S1", "m1"));
    query.set("b:27015", server(2, 8, "S2", "m2"));
    query
}

fn board(
    config: BoardConfig,
    query: &ScriptedQuery,
    transport: &RecordingTransport,
    pointer: Option<PointerStore>,
) -> TestBoard {
    Board::new(
        config,
        query.clone(),
        ScriptedDirectory::new(&["a:27015", "b:27015"]),
        transport.clone(),
        pointer,
    )
}

fn field_names(transport: &RecordingTransport) -> Vec<String> {
    transport
        .last_summary()
        .unwrap()
        .fields
        .into_iter()
        .map(|f| f.name)
        .collect()
}

fn chat(transport: &RecordingTransport, content: &str) -> ChatEvent {
    ChatEvent::MessageCreated(transport.post_foreign(content))
}

// ── Reconcile + render ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn insert_then_update_keeps_order() {
    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, None);
    board.restore(BOT).await;

    let report = board.refresh().await;
    assert_eq!(report.source, PollSetSource::Directory);
    assert_eq!(report.result.inserted, 2);
    assert_eq!(
        board.publish_cycle(&report).await,
        Some(PublishOutcome::Posted(MessageId(1_001)))
    );
    assert_eq!(field_names(&transport), vec!["5/10 | S1", "2/8 | S2"]);

    query.set("b:27015", server(4, 8, "S2", "m2"));
    let report = board.refresh().await;
    assert_eq!(report.result.updated, 1);
    assert_eq!(report.result.inserted, 0);
    assert_eq!(
        board.roster().addresses(),
        vec![Address::new("a", 27015), Address::new("b", 27015)]
    );

    assert_eq!(
        board.publish_cycle(&report).await,
        Some(PublishOutcome::Edited(MessageId(1_001)))
    );
    assert_eq!(field_names(&transport), vec!["5/10 | S1", "4/8 | S2"]);
}

#[tokio::test(start_paused = true)]
async fn unchanged_cycle_is_not_republished() {
    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, None);
    board.restore(BOT).await;

    let first = board.refresh().await;
    board.publish_cycle(&first).await;
    let second = board.refresh().await;
    assert!(!second.result.changed());
    assert_eq!(board.publish_cycle(&second).await, None);
    assert_eq!(transport.calls(), vec![Call::Send(MessageId(1_001))]);
}

#[tokio::test(start_paused = true)]
async fn timed_out_endpoint_counts_offline() {
    let query = ScriptedQuery::new();
    query.set("a:27015", server(3, 16, "A", "m"));
    query.set("c:27015", server(1, 16, "C", "m"));

    let mut config = config();
    config.discovery.explicit_addresses =
        Address::parse_list("a:27015, b:27015, c:27015").unwrap();

    let transport = RecordingTransport::new();
    let mut board = board(config, &query, &transport, None);
    board.restore(BOT).await;

    let report = board.refresh().await;
    assert_eq!(report.source, PollSetSource::Explicit);
    assert_eq!(report.polled, 3);
    assert_eq!(report.answered, 2);
    assert_eq!(report.offline, 1);
    assert_eq!(
        board.roster().addresses(),
        vec![Address::new("a", 27015), Address::new("c", 27015)]
    );

    board.publish().await;
    let summary = transport.last_summary().unwrap();
    assert!(
        summary.description.contains(", 1 offline"),
        "description was {:?}",
        summary.description
    );
}

#[tokio::test(start_paused = true)]
async fn missing_servers_are_evicted() {
    let query = ScriptedQuery::new();
    query.set("a:27015", server(3, 16, "A", "m"));

    let mut config = config();
    config.discovery.explicit_addresses = vec![Address::new("a", 27015)];
    config.eviction = EvictionPolicy {
        max_missed_cycles: Some(2),
        max_unresponsive: None,
    };

    let transport = RecordingTransport::new();
    let mut board = board(config, &query, &transport, None);
    board.refresh().await;
    assert_eq!(board.roster().len(), 1);

    query.take_down("a:27015");
    for _ in 0..2 {
        let report = board.refresh().await;
        assert_eq!(report.result.missing, 1);
        assert!(report.failed);
    }
    assert_eq!(board.roster().entries()[0].missed_count, 2);

    let report = board.refresh().await;
    assert_eq!(report.result.removed, 1);
    assert!(board.roster().is_empty());
    assert_eq!(board.consecutive_failures(), 3);
}

#[tokio::test(start_paused = true)]
async fn roster_reused_until_directory_goes_stale() {
    let query = two_servers();
    let directory = ScriptedDirectory::new(&["a:27015", "b:27015"]);
    let transport = RecordingTransport::new();
    let mut board = Board::new(config(), query, directory.clone(), transport, None);

    assert_eq!(board.refresh().await.source, PollSetSource::Directory);
    tokio::time::advance(Duration::from_secs(20)).await;
    assert_eq!(board.refresh().await.source, PollSetSource::Roster);
    assert_eq!(directory.lookups(), 1);

    tokio::time::advance(Duration::from_secs(100)).await;
    assert_eq!(board.refresh().await.source, PollSetSource::Directory);
    assert_eq!(directory.lookups(), 2);
}

// ── Cadence ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn buried_summary_is_reposted() {
    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, None);
    board.restore(BOT).await;
    board.refresh().await;
    let Some(PublishOutcome::Posted(first)) = board.publish().await else {
        panic!("expected a new post");
    };

    for i in 0..8 {
        board.handle_event(chat(&transport, &format!("chatter {i}"))).await;
    }
    assert_eq!(board.render_state().messages_since_last_render, 8);
    assert_eq!(board.publish().await, Some(PublishOutcome::Edited(first)));

    board.handle_event(chat(&transport, "one too many")).await;
    let outcome = board.publish().await;
    let Some(PublishOutcome::Posted(second)) = outcome else {
        panic!("expected a new post, got {outcome:?}");
    };

    assert_ne!(first, second);
    assert_eq!(
        transport.calls(),
        vec![
            Call::Send(first),
            Call::Edit(first),
            Call::Delete(first),
            Call::Send(second),
        ]
    );
    assert_eq!(board.render_state().messages_since_last_render, 0);
}

#[tokio::test(start_paused = true)]
async fn vanished_summary_is_posted_again() {
    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, None);
    board.refresh().await;
    let Some(PublishOutcome::Posted(first)) = board.publish().await else {
        panic!("expected a new post");
    };

    transport.vanish(first);
    assert_eq!(board.publish().await, Some(PublishOutcome::Failed));
    assert_eq!(board.render_state().current_message_id, None);

    assert!(matches!(
        board.publish().await,
        Some(PublishOutcome::Posted(id)) if id != first
    ));
}

// ── Transport failures ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_delete_still_posts_new_summary() {
    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, None);
    board.restore(BOT).await;
    board.refresh().await;
    let Some(PublishOutcome::Posted(first)) = board.publish().await else {
        panic!("expected a new post");
    };

    for i in 0..9 {
        board.handle_event(chat(&transport, &format!("chatter {i}"))).await;
    }
    transport.set_failing(Op::Delete, true);

    let outcome = board.publish().await;
    let Some(PublishOutcome::Posted(second)) = outcome else {
        panic!("expected a new post, got {outcome:?}");
    };
    assert_ne!(first, second);
    assert_eq!(transport.calls(), vec![Call::Send(first), Call::Send(second)]);
    assert!(transport.contains(first), "old summary is left behind");
    assert_eq!(board.render_state().current_message_id, Some(second));
    assert_eq!(board.render_state().messages_since_last_render, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_send_is_retried_next_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let pointer = PointerStore::new(dir.path().join("last_message"));

    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, Some(pointer.clone()));
    board.restore(BOT).await;

    transport.set_failing(Op::Send, true);
    let report = board.refresh().await;
    assert_eq!(board.publish_cycle(&report).await, Some(PublishOutcome::Failed));
    assert_eq!(board.render_state().current_message_id, None);
    assert_eq!(board.render_state().last_render_time, None);
    assert_eq!(pointer.load().unwrap(), None);
    assert!(transport.calls().is_empty());

    // Nothing changed on the servers, but no summary is up yet.
    transport.set_failing(Op::Send, false);
    tokio::time::advance(Duration::from_secs(20)).await;
    let report = board.refresh().await;
    assert!(!report.result.changed());
    let outcome = board.publish_cycle(&report).await;
    let Some(PublishOutcome::Posted(id)) = outcome else {
        panic!("expected a retry to post, got {outcome:?}");
    };
    assert_eq!(board.render_state().current_message_id, Some(id));
    assert_eq!(pointer.load().unwrap(), Some(id));
}

#[tokio::test(start_paused = true)]
async fn failed_edit_keeps_tracking_the_summary() {
    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, None);
    board.restore(BOT).await;
    board.refresh().await;
    let Some(PublishOutcome::Posted(first)) = board.publish().await else {
        panic!("expected a new post");
    };

    transport.set_failing(Op::Edit, true);
    assert_eq!(board.publish().await, Some(PublishOutcome::Failed));
    assert_eq!(board.render_state().current_message_id, Some(first));

    transport.set_failing(Op::Edit, false);
    assert_eq!(board.publish().await, Some(PublishOutcome::Edited(first)));
}

// ── Chat events ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn own_messages_are_not_noise() {
    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, None);
    board.restore(BOT).await;
    board.refresh().await;
    let Some(PublishOutcome::Posted(id)) = board.publish().await else {
        panic!("expected a new post");
    };

    board
        .handle_event(ChatEvent::MessageCreated(ChatMessage {
            id,
            channel_id: CHANNEL,
            author: BOT,
            content: String::new(),
        }))
        .await;
    board
        .handle_event(ChatEvent::MessageCreated(ChatMessage {
            id: MessageId(77),
            channel_id: common::OTHER_CHANNEL,
            author: SOMEONE,
            content: "elsewhere".into(),
        }))
        .await;

    assert_eq!(board.render_state().messages_since_last_render, 0);
}

#[tokio::test(start_paused = true)]
async fn list_command_respects_freshness() {
    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, None);
    board.restore(BOT).await;
    board.refresh().await;
    board.publish().await;
    assert_eq!(transport.calls().len(), 1);

    // Fresh summary, nothing due: ignored but still counted as noise.
    board.handle_event(chat(&transport, "!servers")).await;
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(board.render_state().messages_since_last_render, 1);

    // Unknown commands never trigger anything.
    tokio::time::advance(Duration::from_secs(21)).await;
    board.handle_event(chat(&transport, "!help")).await;
    assert_eq!(transport.calls().len(), 1);

    query.set("a:27015", server(9, 10, "S1", "m1"));
    board.handle_event(chat(&transport, "!list")).await;
    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[1], Call::Edit(_)));
    assert_eq!(field_names(&transport)[0], "9/10 | S1");
    assert!(!board.should_query());
}

#[tokio::test(start_paused = true)]
async fn list_command_reposts_when_buried() {
    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, None);
    board.restore(BOT).await;
    board.refresh().await;
    board.publish().await;

    for _ in 0..8 {
        board.handle_event(chat(&transport, "lol")).await;
    }
    board.handle_event(chat(&transport, "!serverlist")).await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert!(matches!(calls[1], Call::Delete(_)));
    assert!(matches!(calls[2], Call::Send(_)));
}

#[tokio::test(start_paused = true)]
async fn deletes_adjust_tracking() {
    let query = two_servers();
    let transport = RecordingTransport::new();
    let mut board = board(config(), &query, &transport, None);

    // Nothing tracked yet: ignored.
    board
        .handle_event(ChatEvent::MessageDeleted {
            id: MessageId(5),
            channel_id: CHANNEL,
        })
        .await;
    assert_eq!(board.render_state().messages_since_last_render, 0);

    board.refresh().await;
    let Some(PublishOutcome::Posted(id)) = board.publish().await else {
        panic!("expected a new post");
    };

    let noise = transport.post_foreign("hello");
    board.handle_event(ChatEvent::MessageCreated(noise.clone())).await;
    board.handle_event(chat(&transport, "again")).await;
    assert_eq!(board.render_state().messages_since_last_render, 2);

    board
        .handle_event(ChatEvent::MessageDeleted {
            id: noise.id,
            channel_id: CHANNEL,
        })
        .await;
    assert_eq!(board.render_state().messages_since_last_render, 1);

    board
        .handle_event(ChatEvent::MessageDeleted {
            id,
            channel_id: CHANNEL,
        })
        .await;
    assert_eq!(board.render_state().current_message_id, None);
}

// ── Restart ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn restore_reattaches_to_persisted_summary() {
    let dir = tempfile::tempdir().unwrap();
    let pointer = PointerStore::new(dir.path().join("lastmsg"));

    let transport = RecordingTransport::new();
    let previous = transport.post_own();
    transport.post_foreign("hi");
    transport.post_foreign("anyone?");
    pointer.store(previous).unwrap();

    let query = two_servers();
    let mut board = board(config(), &query, &transport, Some(pointer));
    board.restore(BOT).await;

    assert_eq!(board.render_state().current_message_id, Some(previous));
    assert_eq!(board.render_state().messages_since_last_render, 2);

    board.refresh().await;
    assert_eq!(board.publish().await, Some(PublishOutcome::Edited(previous)));
}

#[tokio::test(start_paused = true)]
async fn restore_reposts_when_buried_beyond_window() {
    let dir = tempfile::tempdir().unwrap();
    let pointer = PointerStore::new(dir.path().join("lastmsg"));

    let transport = RecordingTransport::new();
    let previous = transport.post_own();
    for i in 0..6 {
        transport.post_foreign(&format!("msg {i}"));
    }
    pointer.store(previous).unwrap();

    let query = two_servers();
    let mut board = board(config(), &query, &transport, Some(pointer.clone()));
    board.restore(BOT).await;
    assert_eq!(board.render_state().current_message_id, Some(previous));

    board.refresh().await;
    let outcome = board.publish().await;
    let Some(PublishOutcome::Posted(fresh)) = outcome else {
        panic!("expected a new post, got {outcome:?}");
    };
    assert_eq!(transport.calls()[0], Call::Delete(previous));
    assert_eq!(pointer.load().unwrap(), Some(fresh));
}

#[tokio::test(start_paused = true)]
async fn restore_ignores_stale_pointer() {
    let dir = tempfile::tempdir().unwrap();
    let pointer = PointerStore::new(dir.path().join("lastmsg"));
    pointer.store(MessageId(999)).unwrap();

    let transport = RecordingTransport::new();
    let query = two_servers();
    let mut board = board(config(), &query, &transport, Some(pointer));
    board.restore(BOT).await;
    assert_eq!(board.render_state().current_message_id, None);

    board.refresh().await;
    assert!(matches!(
        board.publish().await,
        Some(PublishOutcome::Posted(_))
    ));
    assert!(!transport.calls().contains(&Call::Delete(MessageId(999))));
}
