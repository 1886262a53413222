// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Process-wide registry of [`Session`]s: the entry point inbound relay
//! requests are routed through, and the coordinator for graceful shutdown.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::{
    irc::{Driver, IrcDriver},
    pool::Pool,
    request::{DestinationUrl, RelayRequest},
    session::Session,
};

/// Maps destination URL to its `Session`. The only component that creates
/// sessions; creation is idempotent per URL (spec.md §4.4).
pub struct Multiplexer<D: IrcDriver> {
    sessions: DashMap<String, Arc<Session<D>>>,
    pool: Arc<Pool<D>>,
    driver: Driver<D>,
    ttl: Duration,
    queue_soft_cap: usize,
    shutdown_timeout: Duration,
}

impl<D: IrcDriver> Multiplexer<D> {
    pub fn new(
        pool: Arc<Pool<D>>,
        driver: Driver<D>,
        ttl: Duration,
        queue_soft_cap: usize,
        shutdown_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            pool,
            driver,
            ttl,
            queue_soft_cap,
            shutdown_timeout,
        })
    }

    /// Parses `line` as a `RelayRequest`, validates the destination URL, and
    /// enqueues `privmsg` on the session for that URL (creating it lazily if
    /// this is the first request to it). On any validation failure, logs and
    /// drops the request; the caller (the listener's per-connection loop)
    /// never sees the distinction and the connection stays open regardless.
    pub async fn handle(self: &Arc<Self>, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let request: RelayRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(%line, error = %e, "dropping malformed relay request");
                return;
            },
        };

        let dest = match DestinationUrl::parse(&request.channel) {
            Ok(d) => d,
            Err(e) => {
                warn!(channel = %request.channel, error = %e, "dropping request with invalid channel url");
                return;
            },
        };

        let session = self.session_for(dest);
        session.enqueue(request.privmsg).await;
    }

    /// Looks up (or lazily creates) the session keyed by `dest.raw`.
    fn session_for(self: &Arc<Self>, dest: DestinationUrl) -> Arc<Session<D>> {
        self.sessions
            .entry(dest.raw.clone())
            .or_insert_with(|| {
                Session::new(dest, self.pool.clone(), self.ttl, self.queue_soft_cap)
            })
            .clone()
    }

    /// Drains every live session, then terminates every live session, then
    /// stops the driver. Best-effort with a total `shutdown_timeout` budget;
    /// sessions still holding pending messages past it are logged and
    /// dropped (spec.md §4.4, §7 `ShutdownTimeout`).
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<Session<D>>> =
            self.sessions.iter().map(|e| e.value().clone()).collect();

        for session in &sessions {
            if let Err(e) = session.drain(self.shutdown_timeout).await {
                warn!(url = %session.dest.raw, error = %e, "shutdown drain budget exceeded");
            }
        }
        for session in &sessions {
            session.terminate().await;
        }
        self.sessions.clear();
        self.driver.stop();
        info!(sessions = sessions.len(), "multiplexer shutdown complete");
    }

    /// Number of live sessions. Exposed beyond `#[cfg(test)]` because the
    /// integration test binary links the library as an ordinary dependency
    /// and needs it to assert routing/shutdown behavior end to end.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
