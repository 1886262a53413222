// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    sync::{Mutex, Notify},
    task::JoinHandle,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    irc::{IrcDriver, IrcHandle},
    pool::{Pool, PoolEntry},
    request::DestinationUrl,
};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

struct SessionState<H> {
    queue: VecDeque<String>,
    entry: Option<Arc<PoolEntry<H>>>,
    last_active: Instant,
    /// Whether a pump task is currently alive for this session. Eviction
    /// (on TTL) and enqueue both read-and-write this under the same lock as
    /// `queue`, which is what makes the TTL-eviction-vs-enqueue race safe:
    /// whichever of "a message arrived" or "the pump decided to evict"
    /// observes the lock first wins, and the loser either skips eviction or
    /// re-arms a fresh pump.
    pump_armed: bool,
    terminated: bool,
}

/// One destination channel's outbound queue and pump.
///
/// See module-level docs on [`crate::multiplexer::Multiplexer`] for how
/// sessions are created and looked up.
pub struct Session<D: IrcDriver> {
    pub dest: DestinationUrl,
    pool: Arc<Pool<D>>,
    state: Mutex<SessionState<D::Handle>>,
    notify: Notify,
    cancel: CancellationToken,
    ttl: Duration,
    queue_soft_cap: usize,
    pump_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<D: IrcDriver> Session<D> {
    pub fn new(
        dest: DestinationUrl,
        pool: Arc<Pool<D>>,
        ttl: Duration,
        queue_soft_cap: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            dest,
            pool,
            state: Mutex::new(SessionState {
                queue: VecDeque::new(),
                entry: None,
                last_active: Instant::now(),
                pump_armed: false,
                terminated: false,
            }),
            notify: Notify::new(),
            cancel: CancellationToken::new(),
            ttl,
            queue_soft_cap,
            pump_handle: Mutex::new(None),
        })
    }

    /// Appends `text` to the FIFO. Never blocks on network; wakes the pump
    /// if it is idle, or spawns a fresh one if the session had gone
    /// `DISCONNECTED` and self-terminated after a TTL eviction.
    pub async fn enqueue(self: &Arc<Self>, text: String) {
        let need_spawn = {
            let mut st = self.state.lock().await;
            if st.terminated {
                warn!(url = %self.dest.raw, "dropping message enqueued after termination");
                return;
            }
            st.queue.push_back(text);
            if st.queue.len() > self.queue_soft_cap {
                st.queue.pop_front();
                warn!(
                    url = %self.dest.raw,
                    cap = self.queue_soft_cap,
                    "queue soft cap exceeded, dropped oldest pending message"
                );
            }
            let need_spawn = !st.pump_armed;
            if need_spawn {
                st.pump_armed = true;
            }
            need_spawn
        };
        self.notify.notify_one();
        if need_spawn {
            let me = self.clone();
            let handle = tokio::spawn(async move { me.pump_loop().await });
            *self.pump_handle.lock().await = Some(handle);
        }
    }

    /// Blocks until the FIFO is empty and the pump has flushed the last
    /// message to the IRC handle, or `budget` elapses.
    pub async fn drain(&self, budget: Duration) -> Result<(), crate::error::RelayError> {
        let deadline = Instant::now() + budget;
        loop {
            {
                let st = self.state.lock().await;
                if st.queue.is_empty() {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                let pending = self.state.lock().await.queue.len();
                return Err(crate::error::RelayError::ShutdownTimeout { pending });
            }
            sleep(Duration::from_millis(20)).await;
        }
    }

    /// Sends `QUIT` on the current handle (if any), releases the pool
    /// refcount, and stops the pump. Idempotent.
    pub async fn terminate(&self) {
        self.cancel.cancel();
        self.notify.notify_one();
        let handle = self.pump_handle.lock().await.take();
        if let Some(h) = handle {
            let _ = h.await;
        }
    }

    async fn pump_loop(self: Arc<Self>) {
        loop {
            let entry = {
                let st = self.state.lock().await;
                st.entry.clone()
            };
            let entry = match entry {
                Some(e) if e.handle.is_alive() => e,
                _ => match self.acquire_with_backoff().await {
                    Some(e) => {
                        let mut st = self.state.lock().await;
                        st.entry = Some(e.clone());
                        st.last_active = Instant::now();
                        e
                    },
                    None => {
                        self.finish(None).await;
                        return;
                    },
                },
            };

            if !self.drain_queue_onto(&entry).await {
                // Handle died mid-send; loop back and reconnect.
                continue;
            }

            match self.wait_for_work_or_ttl().await {
                PumpWake::WorkArrived => continue,
                PumpWake::Cancelled => {
                    self.finish(Some(entry)).await;
                    return;
                },
                PumpWake::TtlExpired => {
                    let mut st = self.state.lock().await;
                    if !st.queue.is_empty() {
                        // A message arrived in the window between the TTL
                        // timer firing and us taking the lock; skip eviction.
                        continue;
                    }
                    st.entry = None;
                    st.pump_armed = false;
                    drop(st);
                    self.pool.release(&self.dest.host, self.dest.port, &entry).await;
                    debug!(url = %self.dest.raw, "ttl eviction: released idle handle");
                    return;
                },
            }
        }
    }

    /// Drains every currently-queued message onto `entry`. Returns `false`
    /// if a send failed partway (handle treated as dead, message requeued
    /// at the head, pool ref released) so the caller reconnects.
    async fn drain_queue_onto(&self, entry: &Arc<PoolEntry<D::Handle>>) -> bool {
        loop {
            let msg = {
                let mut st = self.state.lock().await;
                st.queue.pop_front()
            };
            let Some(msg) = msg else { return true };

            let sent = entry.handle.join(&self.dest.wire_channel()).await.is_ok()
                && entry.handle.privmsg(&self.dest.wire_channel(), &msg).await.is_ok();

            if sent {
                let mut st = self.state.lock().await;
                st.last_active = Instant::now();
            } else {
                warn!(url = %self.dest.raw, "send failed, treating handle as dead and retrying");
                let mut st = self.state.lock().await;
                st.queue.push_front(msg);
                st.entry = None;
                drop(st);
                self.pool.release(&self.dest.host, self.dest.port, entry).await;
                return false;
            }
        }
    }

    async fn acquire_with_backoff(&self) -> Option<Arc<PoolEntry<D::Handle>>> {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                result = self.pool.acquire(&self.dest.host, self.dest.port) => {
                    match result {
                        Ok(entry) => return Some(entry),
                        Err(err) => {
                            warn!(
                                url = %self.dest.raw,
                                error = %err,
                                backoff_secs = backoff.as_secs(),
                                "connect failed, backing off before retry"
                            );
                            tokio::select! {
                                _ = self.cancel.cancelled() => return None,
                                _ = sleep(backoff) => {},
                            }
                            backoff = (backoff * 2).min(MAX_BACKOFF);
                        }
                    }
                }
            }
        }
    }

    async fn wait_for_work_or_ttl(&self) -> PumpWake {
        loop {
            let deadline = {
                let st = self.state.lock().await;
                if !st.queue.is_empty() {
                    return PumpWake::WorkArrived;
                }
                st.last_active + self.ttl
            };
            let now = Instant::now();
            let remaining = deadline.saturating_duration_since(now);
            tokio::select! {
                _ = self.cancel.cancelled() => return PumpWake::Cancelled,
                _ = self.notify.notified() => {
                    let st = self.state.lock().await;
                    if !st.queue.is_empty() {
                        return PumpWake::WorkArrived;
                    }
                    // spurious wake (e.g. terminate() without cancellation
                    // having been observed yet); loop and re-check the clock.
                }
                _ = sleep(remaining) => return PumpWake::TtlExpired,
            }
        }
    }

    async fn finish(&self, entry: Option<Arc<PoolEntry<D::Handle>>>) {
        if let Some(e) = entry {
            let _ = e.handle.quit("irkerd shutting down").await;
            self.pool.release(&self.dest.host, self.dest.port, &e).await;
        }
        let mut st = self.state.lock().await;
        st.entry = None;
        st.pump_armed = false;
        st.terminated = true;
    }
}

enum PumpWake {
    WorkArrived,
    Cancelled,
    TtlExpired,
}
