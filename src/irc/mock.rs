//! In-memory fake IRC facade used to unit-test the pool and session state
//! machines without opening real sockets.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use tokio::sync::Mutex;

use crate::{error::RelayError, irc::IrcDriver};

/// One recorded event observed by a [`MockHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect { host: String, port: u16, nickname: String },
    Join { channel: String },
    Privmsg { channel: String, text: String },
    Quit { reason: String },
    Close,
}

struct Inner {
    id: u32,
    alive: AtomicBool,
    events: Mutex<Vec<Event>>,
    fail_connect: Arc<AtomicBool>,
    fail_privmsg: AtomicBool,
}

#[derive(Clone)]
pub struct MockHandle {
    inner: Arc<Inner>,
}

impl MockHandle {
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    /// Snapshot of everything this handle has observed, in order.
    pub async fn events(&self) -> Vec<Event> {
        self.inner.events.lock().await.clone()
    }

    /// Makes the next `connect()` call fail once, then succeed.
    pub fn fail_next_connect(&self) {
        self.inner.fail_connect.store(true, Ordering::SeqCst);
    }

    /// Makes every subsequent `privmsg()` call fail and mark the handle dead.
    pub fn fail_privmsg(&self) {
        self.inner.fail_privmsg.store(true, Ordering::SeqCst);
    }
}

impl crate::irc::IrcHandle for MockHandle {
    async fn connect(&self, host: &str, port: u16, nickname: &str) -> Result<(), RelayError> {
        if self.inner.fail_connect.swap(false, Ordering::SeqCst) {
            return Err(RelayError::ConnectError {
                host: host.to_string(),
                port,
                source: anyhow::anyhow!("mock connect failure"),
            });
        }
        self.inner.alive.store(true, Ordering::SeqCst);
        self.inner.events.lock().await.push(Event::Connect {
            host: host.to_string(),
            port,
            nickname: nickname.to_string(),
        });
        Ok(())
    }

    async fn join(&self, channel: &str) -> Result<(), RelayError> {
        if !self.inner.alive.load(Ordering::SeqCst) {
            return Err(RelayError::ConnectionLost);
        }
        self.inner.events.lock().await.push(Event::Join { channel: channel.to_string() });
        Ok(())
    }

    async fn privmsg(&self, channel: &str, text: &str) -> Result<(), RelayError> {
        if self.inner.fail_privmsg.load(Ordering::SeqCst) {
            self.inner.alive.store(false, Ordering::SeqCst);
            return Err(RelayError::ConnectionLost);
        }
        if !self.inner.alive.load(Ordering::SeqCst) {
            return Err(RelayError::ConnectionLost);
        }
        self.inner
            .events
            .lock()
            .await
            .push(Event::Privmsg { channel: channel.to_string(), text: text.to_string() });
        Ok(())
    }

    async fn quit(&self, reason: &str) -> Result<(), RelayError> {
        self.inner.events.lock().await.push(Event::Quit { reason: reason.to_string() });
        Ok(())
    }

    fn close(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        // `try_lock` because `close` is sync: best-effort recording only,
        // mirroring that the real facade's `close()` cannot await either.
        if let Ok(mut events) = self.inner.events.try_lock() {
            events.push(Event::Close);
        }
    }

    fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }
}

/// Factory for [`MockHandle`]s. Clone-cheap, shares a handle counter.
#[derive(Clone)]
pub struct MockDriver {
    next_id: Arc<AtomicU32>,
    fail_next_connect: Arc<AtomicBool>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU32::new(0)),
            fail_next_connect: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes the next handle this driver creates fail its first `connect()`
    /// call once, regardless of which destination it targets.
    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::SeqCst);
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl IrcDriver for MockDriver {
    type Handle = MockHandle;

    fn new_server(&self) -> MockHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        MockHandle {
            inner: Arc::new(Inner {
                id,
                alive: AtomicBool::new(false),
                events: Mutex::new(Vec::new()),
                fail_connect: self.fail_next_connect.clone(),
                fail_privmsg: AtomicBool::new(false),
            }),
        }
    }
}
