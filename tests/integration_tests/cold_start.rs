// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use irkerd::irc::mock::Event;

use crate::integration_tests::common::{make_multiplexer, wait_for_events, wait_for_handle};

/// spec.md §8 scenario A: single message, cold start. Expects a connect to
/// `irc.example.net:6667` under nickname `irker001`, a JOIN of `#dev`, then
/// a PRIVMSG of the literal text.
#[tokio::test]
async fn single_message_cold_start() {
    let (mux, pool) = make_multiplexer(Duration::from_secs(3600), 18);

    mux.handle(r#"{"channel":"irc://irc.example.net/dev","privmsg":"hello"}"#).await;

    let entry = wait_for_handle(&pool, "irc.example.net", 6667)
        .await
        .expect("a handle should have been opened");
    assert_eq!(entry.nickname, "irker001");

    let events = wait_for_events(&entry.handle, 2).await;
    assert!(matches!(
        &events[0],
        Event::Connect { host, port: 6667, nickname }
            if host == "irc.example.net" && nickname == "irker001"
    ));
    assert!(events.iter().any(|e| matches!(e, Event::Join { channel } if channel == "#dev")));
    assert!(events.iter().any(|e| matches!(e, Event::Privmsg { channel, text }
        if channel == "#dev" && text == "hello")));
}
