// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use irkerd::irc::mock::Event;

use crate::integration_tests::common::{make_multiplexer, wait_for_events, wait_for_handle};

/// spec.md §8 scenario B: two channels, same server. Two sessions must share
/// the single open handle, and each channel's message must land on the wire
/// with its own FIFO intact.
#[tokio::test]
async fn two_channels_share_one_connection() {
    let (mux, pool) = make_multiplexer(Duration::from_secs(3600), 18);

    mux.handle(r#"{"channel":"irc://irc.example.net/a","privmsg":"for-a"}"#).await;
    mux.handle(r#"{"channel":"irc://irc.example.net/b","privmsg":"for-b"}"#).await;

    let entry = wait_for_handle(&pool, "irc.example.net", 6667)
        .await
        .expect("a handle should have been opened");
    let events = wait_for_events(&entry.handle, 3).await;

    assert_eq!(pool.handles_for("irc.example.net", 6667).await.len(), 1, "must be one connection");
    assert_eq!(pool.sharer_count(&entry), 2, "both sessions must share the one handle");

    assert!(events.iter().any(|e| matches!(e, Event::Join { channel } if channel == "#a")));
    assert!(events.iter().any(|e| matches!(e, Event::Join { channel } if channel == "#b")));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Privmsg { channel, text } if channel == "#a" && text == "for-a")));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Privmsg { channel, text } if channel == "#b" && text == "for-b")));
}
