// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use irkerd::irc::mock::Event;

use crate::integration_tests::common::{make_multiplexer, wait_for_events, wait_for_handle};

/// spec.md §8 scenario D: with `TTL=2s` (scaled down here to keep the test
/// fast), enqueue one message, wait past the TTL so the connection closes,
/// then enqueue a second; expect a fresh connection carrying the second
/// message.
#[tokio::test]
async fn ttl_eviction_then_transparent_revival() {
    let (mux, pool) = make_multiplexer(Duration::from_millis(100), 18);

    mux.handle(r#"{"channel":"irc://irc.example.net/dev","privmsg":"first"}"#).await;
    let first_entry = wait_for_handle(&pool, "irc.example.net", 6667)
        .await
        .expect("first handle should open");
    wait_for_events(&first_entry.handle, 2).await;

    // Wait comfortably past the TTL for the pump to self-evict.
    let mut evicted = false;
    for _ in 0..200 {
        if pool.handles_for("irc.example.net", 6667).await.is_empty() {
            evicted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(evicted, "idle session must release its handle after the TTL");
    assert!(!first_entry.handle.is_alive(), "released handle must be closed");

    mux.handle(r#"{"channel":"irc://irc.example.net/dev","privmsg":"second"}"#).await;
    let second_entry = wait_for_handle(&pool, "irc.example.net", 6667)
        .await
        .expect("a fresh handle should open on the next message");
    let events = wait_for_events(&second_entry.handle, 2).await;

    assert!(!std::sync::Arc::ptr_eq(&first_entry, &second_entry), "revival must use a new handle");
    assert!(events.iter().any(|e| matches!(e, Event::Privmsg { text, .. } if text == "second")));
}
