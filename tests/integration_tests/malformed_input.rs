// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use crate::integration_tests::common::{make_multiplexer, wait_for_handle};

/// spec.md §8 scenario E: a relay request missing `privmsg` produces no IRC
/// traffic and no session, but the multiplexer keeps working for the next
/// (valid) line.
#[tokio::test]
async fn malformed_request_produces_no_traffic_and_does_not_wedge_the_multiplexer() {
    let (mux, pool) = make_multiplexer(Duration::from_secs(3600), 18);

    mux.handle(r#"{"channel":"irc://x/y"}"#).await;
    assert_eq!(mux.session_count(), 0, "missing privmsg must not create a session");
    assert!(pool.handles_for("x", 6667).await.is_empty(), "no irc traffic must result");

    mux.handle(r#"{"channel":"irc://irc.example.net/dev","privmsg":"hi"}"#).await;
    let entry = wait_for_handle(&pool, "irc.example.net", 6667).await;
    assert!(entry.is_some(), "a subsequent well-formed request must still be handled");
}

/// Invalid JSON and an otherwise-valid-looking but channel-less URL are both
/// dropped the same way (spec.md §8 invariant 6).
#[tokio::test]
async fn invalid_json_and_bad_url_are_both_dropped() {
    let (mux, _pool) = make_multiplexer(Duration::from_secs(3600), 18);

    mux.handle(r#"not json at all"#).await;
    assert_eq!(mux.session_count(), 0);

    mux.handle(r#"{"channel":"irc://irc.example.net/","privmsg":"hi"}"#).await;
    assert_eq!(mux.session_count(), 0, "empty channel path must be rejected");

    mux.handle(r#"{"channel":"not a url","privmsg":"hi"}"#).await;
    assert_eq!(mux.session_count(), 0, "unparseable url must be rejected");
}
