// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Request Listener: a newline-delimited JSON TCP server. External
//! collaborator per spec.md §2 (~15% of the core), implemented here because
//! nothing in the teacher crate or pack provides it ready-made — grounded on
//! the plain `TcpListener` accept-loop-per-connection shape common across
//! the pack's own small servers (e.g. `ahnlich`'s `server.rs`), expressed in
//! this crate's idiom: `tracing` logs, `tokio_util::sync::CancellationToken`
//! for shutdown, and calls straight into [`crate::multiplexer::Multiplexer`].

use std::sync::Arc;

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{error::RelayError, irc::IrcDriver, multiplexer::Multiplexer};

/// Binds `port` and accepts connections until `cancel` fires. Each accepted
/// connection gets its own task reading newline-delimited JSON lines and
/// forwarding them to `mux.handle`; a malformed line never closes the
/// connection (spec.md §6).
pub async fn run<D: IrcDriver>(
    port: u16,
    mux: Arc<Multiplexer<D>>,
    cancel: CancellationToken,
) -> Result<(), RelayError> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await.map_err(|e| {
        RelayError::Fatal(format!("failed to bind listener port {port}: {e}"))
    })?;
    info!(port, "listening for relay requests");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("listener shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        debug!(%addr, "accepted relay connection");
                        let mux = mux.clone();
                        let cancel = cancel.child_token();
                        tokio::spawn(async move {
                            handle_connection(stream, mux, cancel).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                    }
                }
            }
        }
    }
}

/// Reads newline-delimited JSON lines from `stream` until EOF, a read error,
/// or `cancel` fires; each non-empty line is forwarded to `mux.handle`.
async fn handle_connection<D: IrcDriver>(
    stream: TcpStream,
    mux: Arc<Multiplexer<D>>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            next = lines.next_line() => {
                match next {
                    Ok(Some(line)) => mux.handle(&line).await,
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = %e, "relay connection read error");
                        return;
                    }
                }
            }
        }
    }
}
