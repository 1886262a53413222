// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use crate::integration_tests::common::{make_multiplexer, wait_for_events};

/// spec.md §8 scenario C: with `CONNECT_MAX=2`, three sessions on the same
/// `(host, port)` must split two-and-one across two handles: `irker001`
/// holds the first two sessions, `irker002` is forced open for the third.
#[tokio::test]
async fn third_session_forces_a_fresh_handle_at_the_cap() {
    let (mux, pool) = make_multiplexer(Duration::from_secs(3600), 2);

    mux.handle(r#"{"channel":"irc://irc.example.net/a","privmsg":"m1"}"#).await;
    mux.handle(r#"{"channel":"irc://irc.example.net/b","privmsg":"m2"}"#).await;
    mux.handle(r#"{"channel":"irc://irc.example.net/c","privmsg":"m3"}"#).await;

    let mut handles = Vec::new();
    for _ in 0..200 {
        handles = pool.handles_for("irc.example.net", 6667).await;
        if handles.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(handles.len(), 2, "three sessions at cap=2 must open exactly two handles");

    let first = handles.iter().find(|h| h.nickname == "irker001").expect("irker001 present");
    let second = handles.iter().find(|h| h.nickname == "irker002").expect("irker002 present");

    wait_for_events(&first.handle, 1).await;
    wait_for_events(&second.handle, 1).await;

    assert!(pool.sharer_count(first) <= 2, "no handle may exceed CONNECT_MAX sharers");
    assert!(pool.sharer_count(second) <= 2);
    assert_eq!(pool.sharer_count(first) + pool.sharer_count(second), 3, "all three sessions accounted for");
}
