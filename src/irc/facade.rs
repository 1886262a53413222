// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::anyhow;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    error::RelayError,
    irc::{IrcDriver, IrcHandle},
};

/// Real IRC facade: a minimal RFC 1459-subset client directly over TCP.
///
/// Registration (`NICK`/`USER`), `JOIN`, `PRIVMSG` and `QUIT` are sent as
/// plain lines; `PING` is answered with `PONG` from the handle's own read
/// loop, independent of whatever the session pump is doing.
#[derive(Debug, Clone)]
pub struct RealDriver {
    connect_timeout: Duration,
}

impl RealDriver {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl IrcDriver for RealDriver {
    type Handle = RealHandle;

    fn new_server(&self) -> RealHandle {
        RealHandle::new(self.connect_timeout)
    }
}

struct Inner {
    writer: Mutex<Option<OwnedWriteHalf>>,
    alive: AtomicBool,
    cancel: CancellationToken,
    connect_timeout: Duration,
}

/// A handle to one IRC server connection. Cheap to clone: every clone shares
/// the same underlying socket and read loop.
#[derive(Clone)]
pub struct RealHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RealHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealHandle").field("alive", &self.is_alive()).finish()
    }
}

impl RealHandle {
    fn new(connect_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                writer: Mutex::new(None),
                alive: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                connect_timeout,
            }),
        }
    }

    async fn write_line(&self, line: &str) -> Result<(), RelayError> {
        if !self.inner.alive.load(Ordering::SeqCst) {
            return Err(RelayError::ConnectionLost);
        }
        let mut guard = self.inner.writer.lock().await;
        let Some(w) = guard.as_mut() else {
            return Err(RelayError::ConnectionLost);
        };
        let mut framed = String::with_capacity(line.len() + 2);
        framed.push_str(line);
        framed.push_str("\r\n");
        if let Err(e) = w.write_all(framed.as_bytes()).await {
            warn!(error = %e, "write failed, marking handle dead");
            self.inner.alive.store(false, Ordering::SeqCst);
            return Err(RelayError::ConnectionLost);
        }
        Ok(())
    }

    async fn read_loop(inner: Arc<Inner>, reader: OwnedReadHalf) {
        let mut lines = BufReader::new(reader).lines();
        loop {
            tokio::select! {
                _ = inner.cancel.cancelled() => break,
                next = lines.next_line() => {
                    match next {
                        Ok(Some(line)) => {
                            trace!(%line, "irc recv");
                            if let Some(rest) = line.strip_prefix("PING") {
                                let reply = format!("PONG{rest}\r\n");
                                let mut guard = inner.writer.lock().await;
                                if let Some(w) = guard.as_mut() {
                                    let _ = w.write_all(reply.as_bytes()).await;
                                }
                            }
                            // Everything else (JOIN/PRIVMSG acks, NOTICEs, numerics)
                            // is intentionally not modeled: the core only needs the
                            // link kept alive and dead links detected.
                        }
                        Ok(None) => {
                            debug!("irc connection closed by peer");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "irc read error");
                            break;
                        }
                    }
                }
            }
        }
        inner.alive.store(false, Ordering::SeqCst);
        *inner.writer.lock().await = None;
    }
}

impl IrcHandle for RealHandle {
    async fn connect(&self, host: &str, port: u16, nickname: &str) -> Result<(), RelayError> {
        let stream = timeout(self.inner.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| RelayError::ConnectError {
                host: host.to_string(),
                port,
                source: anyhow!("connect timed out after {:?}", self.inner.connect_timeout),
            })?
            .map_err(|e| RelayError::ConnectError {
                host: host.to_string(),
                port,
                source: e.into(),
            })?;
        let _ = stream.set_nodelay(true);

        let (r, mut w) = stream.into_split();
        let nick_cmd = format!("NICK {nickname}\r\n");
        let user_cmd = format!("USER {nickname} 0 * :irkerd relay bot\r\n");
        w.write_all(nick_cmd.as_bytes()).await.map_err(|e| RelayError::ConnectError {
            host: host.to_string(),
            port,
            source: e.into(),
        })?;
        w.write_all(user_cmd.as_bytes()).await.map_err(|e| RelayError::ConnectError {
            host: host.to_string(),
            port,
            source: e.into(),
        })?;

        *self.inner.writer.lock().await = Some(w);
        self.inner.alive.store(true, Ordering::SeqCst);

        let inner = self.inner.clone();
        tokio::spawn(async move { RealHandle::read_loop(inner, r).await });

        Ok(())
    }

    async fn join(&self, channel: &str) -> Result<(), RelayError> {
        self.write_line(&format!("JOIN {channel}")).await
    }

    async fn privmsg(&self, channel: &str, text: &str) -> Result<(), RelayError> {
        self.write_line(&format!("PRIVMSG {channel} :{text}")).await
    }

    async fn quit(&self, reason: &str) -> Result<(), RelayError> {
        self.write_line(&format!("QUIT :{reason}")).await
    }

    fn close(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        self.inner.cancel.cancel();
    }

    fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }
}
