// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicU32, AtomicU64, Ordering},
};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::{
    error::RelayError,
    irc::{Driver, IrcDriver, IrcHandle},
};

/// One entry in the pool: a connected handle plus how many sessions are
/// currently sharing it.
#[derive(Debug)]
pub struct PoolEntry<H> {
    pub handle: H,
    pub nickname: String,
    refcount: AtomicU32,
}

impl<H> PoolEntry<H> {
    /// Current sharer count. Exposed (beyond `#[cfg(test)]`) because the
    /// integration test binary links the library as an ordinary dependency
    /// and needs it to assert the `CONNECT_MAX` invariant end to end.
    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::SeqCst)
    }
}

type Key = (String, u16);

/// Maps `(host, port)` to the set of handles currently serving sessions for
/// that destination, enforcing `CONNECT_MAX` sharers per handle.
pub struct Pool<D: IrcDriver> {
    driver: Driver<D>,
    entries: DashMap<Key, Arc<AsyncMutex<Vec<Arc<PoolEntry<D::Handle>>>>>>,
    next_id: AtomicU64,
    connect_max: u32,
    nickname_prefix: String,
}

impl<D: IrcDriver> Pool<D> {
    pub fn new(driver: Driver<D>, connect_max: u32, nickname_prefix: String) -> Arc<Self> {
        Arc::new(Self {
            driver,
            entries: DashMap::new(),
            next_id: AtomicU64::new(0),
            connect_max,
            nickname_prefix,
        })
    }

    /// Returns a usable handle for `(host, port)`, creating one if none
    /// exists or the current one is already at `CONNECT_MAX` sharers.
    /// Blocks only for the duration of a fresh `connect()`.
    pub async fn acquire(
        self: &Arc<Self>,
        host: &str,
        port: u16,
    ) -> Result<Arc<PoolEntry<D::Handle>>, RelayError> {
        let key = (host.to_string(), port);
        let list_lock = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(Vec::new())))
            .clone();

        let mut list = list_lock.lock().await;

        if let Some(entry) = list.last() {
            if Self::try_share(entry, self.connect_max) {
                return Ok(entry.clone());
            }
        }

        let seq = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let nickname = format!("{}{:03}", self.nickname_prefix, seq);
        let handle = self.driver.new_server();
        handle.connect(host, port, &nickname).await?;

        let entry = Arc::new(PoolEntry { handle, nickname, refcount: AtomicU32::new(1) });
        list.push(entry.clone());
        debug!(host, port, nickname = %entry.nickname, "opened new irc handle");
        Ok(entry)
    }

    /// Increments `entry`'s refcount in place if it has not reached the
    /// cap yet. Returns whether the increment happened.
    fn try_share(entry: &Arc<PoolEntry<D::Handle>>, connect_max: u32) -> bool {
        entry
            .refcount
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < connect_max).then_some(n + 1)
            })
            .is_ok()
    }

    /// Decrements `entry`'s refcount; when it reaches zero, closes the
    /// handle and removes the entry from the pool.
    pub async fn release(&self, host: &str, port: u16, entry: &Arc<PoolEntry<D::Handle>>) {
        let key = (host.to_string(), port);
        let Some(list_lock) = self.entries.get(&key).map(|e| e.clone()) else {
            return;
        };
        let mut list = list_lock.lock().await;
        let prev = entry.refcount.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            entry.handle.close();
            list.retain(|e| !Arc::ptr_eq(e, entry));
            debug!(host, port, nickname = %entry.nickname, "closed irc handle, pool entry removed");
        }
        if list.is_empty() {
            drop(list);
            self.entries.remove(&key);
        }
    }

    pub fn sharer_count(&self, entry: &Arc<PoolEntry<D::Handle>>) -> u32 {
        entry.refcount()
    }

    /// Snapshot of every handle currently open for `(host, port)`, in
    /// creation order. Test/introspection only; the core never needs to
    /// enumerate entries outside `acquire`/`release`.
    pub async fn handles_for(&self, host: &str, port: u16) -> Vec<Arc<PoolEntry<D::Handle>>> {
        let key = (host.to_string(), port);
        let Some(list_lock) = self.entries.get(&key).map(|e| e.clone()) else {
            return Vec::new();
        };
        list_lock.lock().await.clone()
    }

    /// Whether the pool currently has no entries at all (spec.md §8
    /// invariant 3: "no handle leaks").
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
