// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

/// Error taxonomy for the relay daemon, by kind rather than by call site.
///
/// Only `Fatal` ever reaches `main` and causes a non-zero exit; every other
/// variant is recovered locally (retried or logged-and-dropped).
#[derive(Debug, Error)]
pub enum RelayError {
    /// JSON parse failure, missing required field, or unparseable channel
    /// URL. Logged and dropped; the submitting connection stays open.
    #[error("malformed relay request: {0}")]
    RequestMalformed(String),

    /// IRC connect failed or timed out. Handled inside the session pump
    /// with backoff and indefinite retry; never surfaced to the requester.
    #[error("failed to connect to {host}:{port}: {source}")]
    ConnectError {
        host: String,
        port: u16,
        #[source]
        source: anyhow::Error,
    },

    /// The driver (or a write attempt) observed a handle closed
    /// unexpectedly. The owning pump resets to `DISCONNECTED` and retries.
    #[error("irc connection lost")]
    ConnectionLost,

    /// Drain exceeded the shutdown budget.
    #[error("shutdown timed out with {pending} message(s) still pending")]
    ShutdownTimeout { pending: usize },

    /// Port bind failure, inability to start the logger, or any other
    /// condition from which the daemon cannot recover. Causes a non-zero
    /// exit.
    #[error("fatal: {0}")]
    Fatal(String),
}
