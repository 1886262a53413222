// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use irkerd::irc::mock::Event;

use crate::integration_tests::common::{make_multiplexer, wait_for_handle};

/// spec.md §8 scenario F: 5 messages across 2 sessions, shutdown signalled
/// immediately. All 5 must be delivered, then QUIT sent on both handles,
/// before the pool empties out.
#[tokio::test]
async fn shutdown_drains_all_messages_then_quits_both_handles() {
    let (mux, pool) = make_multiplexer(Duration::from_secs(3600), 18);

    for i in 0..3 {
        mux.handle(&format!(r#"{{"channel":"irc://irc.example.net/a","privmsg":"a{i}"}}"#)).await;
    }
    for i in 0..2 {
        mux.handle(&format!(r#"{{"channel":"irc://irc.example.net/b","privmsg":"b{i}"}}"#)).await;
    }

    let entry = wait_for_handle(&pool, "irc.example.net", 6667)
        .await
        .expect("shared handle should open");

    // Shutdown signalled immediately: `shutdown()` itself drains each
    // session's FIFO before terminating it, so nothing further is awaited
    // here before calling it.
    mux.shutdown().await;

    assert_eq!(mux.session_count(), 0);
    assert!(pool.is_empty(), "no handle leaks after shutdown (spec.md §8 invariant 3)");
    assert!(!entry.handle.is_alive());

    let events = entry.handle.events().await;
    // Per-session FIFO must be preserved (spec.md §8 invariant 1); no
    // ordering guarantee is made *between* sessions `a` and `b` sharing this
    // handle, so each channel's subsequence is checked independently.
    let on_a: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            Event::Privmsg { channel, text } if channel == "#a" => Some(text.as_str()),
            _ => None,
        })
        .collect();
    let on_b: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            Event::Privmsg { channel, text } if channel == "#b" => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(on_a, vec!["a0", "a1", "a2"]);
    assert_eq!(on_b, vec!["b0", "b1"]);
    assert!(events.iter().any(|e| matches!(e, Event::Quit { .. })), "QUIT must be sent before close");
}
