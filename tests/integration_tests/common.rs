// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use irkerd::{
    irc::{Driver, mock::{Event, MockDriver, MockHandle}},
    multiplexer::Multiplexer,
    pool::{Pool, PoolEntry},
};

/// Builds a fresh multiplexer over the mock IRC facade with generous
/// defaults; individual tests override `ttl`/`connect_max` where the
/// scenario calls for it.
pub fn make_multiplexer(
    ttl: Duration,
    connect_max: u32,
) -> (Arc<Multiplexer<MockDriver>>, Arc<Pool<MockDriver>>) {
    let driver = Driver::new(MockDriver::new());
    let pool = Pool::new(driver.clone(), connect_max, "irker".to_string());
    let mux = Multiplexer::new(pool.clone(), driver, ttl, 10_000, Duration::from_secs(5));
    (mux, pool)
}

/// Polls `predicate` until it is true or `budget` elapses, sleeping briefly
/// between checks. Used in place of a fixed sleep so tests don't race the
/// pump's async scheduling.
pub async fn wait_until<F: Fn() -> bool>(budget: Duration, predicate: F) -> bool {
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Polls the pool for the first handle it has open for `(host, port)`.
pub async fn wait_for_handle(
    pool: &Arc<Pool<MockDriver>>,
    host: &str,
    port: u16,
) -> Option<Arc<PoolEntry<MockHandle>>> {
    for _ in 0..100 {
        if let Some(h) = pool.handles_for(host, port).await.into_iter().next() {
            return Some(h);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

/// Polls `handle` until it has recorded at least `min_count` events.
pub async fn wait_for_events(handle: &MockHandle, min_count: usize) -> Vec<Event> {
    for _ in 0..100 {
        let events = handle.events().await;
        if events.len() >= min_count {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.events().await
}
