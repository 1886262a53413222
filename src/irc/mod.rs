//! The IRC Client Facade: the external collaborator the rest of the daemon
//! depends on. Only the contract in this module is load-bearing for the
//! multiplexer core — [`facade`] is one concrete realization of it over raw
//! TCP, and [`mock`] (test-only) is another used to exercise the pool and
//! session state machines without opening sockets.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod facade;
/// In-memory fake facade. Not `#[cfg(test)]`-gated because the integration
/// test binary (a separate compilation unit from the library crate) needs
/// it too; kept under its own module rather than a default export so it
/// reads unambiguously as test support.
pub mod mock;

use tokio_util::sync::CancellationToken;

use crate::error::RelayError;

/// A single open (or opening) connection to one IRC server under one
/// nickname.
///
/// Operations other than [`IrcHandle::connect`] must not block on network
/// round-trips; PING/PONG is handled independently of any caller of this
/// trait (see [`facade`] for where that independent read loop lives).
pub trait IrcHandle: Clone + Send + Sync + 'static {
    /// Blocks until registration completes or fails.
    fn connect(
        &self,
        host: &str,
        port: u16,
        nickname: &str,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Idempotent; safe to call before every `PRIVMSG`.
    fn join(&self, channel: &str) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Enqueues a `PRIVMSG` line. Non-blocking modulo local socket buffers.
    fn privmsg(
        &self,
        channel: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Sends `QUIT`.
    fn quit(&self, reason: &str) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Releases the socket.
    fn close(&self);

    /// Whether the underlying transport is still believed open. Used by the
    /// pump to decide whether a handle handed back by the pool is worth
    /// reusing without a round trip.
    fn is_alive(&self) -> bool;
}

/// Factory for server handles. Implementors must be cheap to clone (an
/// `Arc`-backed handle to shared dial/registration state is typical).
pub trait IrcDriver: Clone + Send + Sync + 'static {
    type Handle: IrcHandle;

    /// Allocates a fresh, not-yet-connected handle.
    fn new_server(&self) -> Self::Handle;
}

/// The always-on worker that keeps every open handle's read side serviced.
///
/// Concretely, each [`IrcHandle::connect`] call spawns its own background
/// read loop (see `facade::RealHandle::connect`) rather than this type
/// running one central poll loop; `Driver` exists so the rest of the core
/// can depend on the `new_driver()` / `driver.new_server()` /
/// `driver.run_forever()` shape from the spec regardless of that
/// implementation choice, and so shutdown has a single place to signal
/// "stop accepting new work."
#[derive(Debug)]
pub struct Driver<D: IrcDriver> {
    factory: D,
    shutdown: CancellationToken,
}

impl<D: IrcDriver> Clone for Driver<D> {
    fn clone(&self) -> Self {
        Self { factory: self.factory.clone(), shutdown: self.shutdown.clone() }
    }
}

impl<D: IrcDriver> Driver<D> {
    pub fn new(factory: D) -> Self {
        Self { factory, shutdown: CancellationToken::new() }
    }

    pub fn new_server(&self) -> D::Handle {
        self.factory.new_server()
    }

    /// Runs until [`Driver::stop`] is called. PING handling itself happens
    /// in the per-handle read loops and is never gated on this future being
    /// polled, so a stuck caller of `run_forever` cannot starve it.
    pub async fn run_forever(&self) {
        self.shutdown.cancelled().await;
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

/// Starts the driver. Per the facade contract, this must be called (and the
/// returned driver kept alive) before any handle is created.
pub fn new_driver<D: IrcDriver>(factory: D) -> Driver<D> {
    Driver::new(factory)
}
