// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use irkerd::{irc::mock::Event, listener};
use serial_test::serial;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{make_multiplexer, wait_for_events, wait_for_handle};

async fn free_port() -> u16 {
    let l = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind ephemeral port");
    l.local_addr().expect("local addr").port()
}

/// Drives the full stack — real TCP accept loop, real line framing — over
/// the mock IRC facade, so the wire protocol itself (spec.md §6) is
/// exercised end to end rather than just `Multiplexer::handle`.
#[tokio::test]
#[serial]
async fn requests_over_real_tcp_reach_the_wire() {
    let (mux, pool) = make_multiplexer(Duration::from_secs(3600), 18);
    let port = free_port().await;
    let cancel = CancellationToken::new();

    let server_cancel = cancel.clone();
    let server_mux = mux.clone();
    let server = tokio::spawn(async move { listener::run(port, server_mux, server_cancel).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut stream = timeout(Duration::from_secs(2), TcpStream::connect(("127.0.0.1", port)))
        .await
        .expect("connect timeout")
        .expect("connect");

    stream
        .write_all(b"{\"channel\":\"irc://irc.example.net/dev\",\"privmsg\":\"hello\"}\n")
        .await
        .expect("write request line");
    // A blank line must be ignored, not treated as a second (malformed) request.
    stream.write_all(b"\n").await.expect("write blank line");
    stream
        .write_all(b"{\"channel\":\"irc://irc.example.net/dev\",\"privmsg\":\"again\"}\n")
        .await
        .expect("write second request line");

    let entry = wait_for_handle(&pool, "irc.example.net", 6667)
        .await
        .expect("handle should open from a wire request");
    let events = wait_for_events(&entry.handle, 5).await;

    assert!(events.iter().any(|e| matches!(e, Event::Privmsg { text, .. } if text == "hello")));
    assert!(events.iter().any(|e| matches!(e, Event::Privmsg { text, .. } if text == "again")));
    assert_eq!(mux.session_count(), 1);

    cancel.cancel();
    let _ = timeout(Duration::from_secs(2), server).await;
}
