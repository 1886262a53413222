// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Idle lifetime of a session's claim on a handle (spec.md §6: default 10800s
/// / 3h).
const DEFAULT_TTL_SECS: u64 = 10_800;
/// Per-handle sharer ceiling (spec.md §6: default 18, the canonical freenode
/// limit).
const DEFAULT_CONNECT_MAX: u32 = 18;
/// Soft FIFO cap before drop-oldest kicks in (SPEC_FULL.md §3 addition).
const DEFAULT_QUEUE_SOFT_CAP: usize = 10_000;
/// Connect timeout (SPEC_FULL.md §6 addition, per spec.md §5's
/// recommendation).
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Total shutdown drain budget (spec.md §4.4 default).
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
/// Nickname prefix for pool-assigned handles (spec.md §3: `irkerNNN`).
const DEFAULT_NICKNAME_PREFIX: &str = "irker";

/// The daemon's tunables. All of them are compile-time defaults, optionally
/// overridden by a YAML config file; none of them are CLI flags (spec.md §6:
/// "Tunables ... not CLI").
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Idle seconds after which a session releases its handle.
    #[serde(rename = "ttl_secs", with = "serde_secs")]
    pub ttl: Duration,
    /// Hard cap on sessions sharing one handle.
    pub connect_max: u32,
    /// Soft FIFO cap; the oldest pending message is dropped past this.
    pub queue_soft_cap: usize,
    /// Timeout for a single IRC `connect()` attempt.
    #[serde(rename = "connect_timeout_secs", with = "serde_secs")]
    pub connect_timeout: Duration,
    /// Total budget for `Multiplexer::shutdown`'s drain phase.
    #[serde(rename = "shutdown_timeout_secs", with = "serde_secs")]
    pub shutdown_timeout: Duration,
    /// Prefix for pool-assigned nicknames (`irker001`, `irker002`, ...).
    pub nickname_prefix: String,
}

/// Represents a `Duration` as a plain integer number of seconds, the same
/// convention the teacher's login-timer fields use.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            connect_max: DEFAULT_CONNECT_MAX,
            queue_soft_cap: DEFAULT_QUEUE_SOFT_CAP,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            nickname_prefix: DEFAULT_NICKNAME_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value. A missing config file is not an error: the daemon
    /// runs on defaults (spec.md: "Environment: none required").
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let mut cfg = Self::default();
            cfg.validate_and_normalize()?;
            return Ok(cfg);
        }
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        let mut cfg: Config = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants. There is nothing to normalize (unlike a
    /// protocol-negotiation config, these tunables don't interact), but the
    /// method is kept symmetric with the load path for callers that mutate a
    /// `Config` in place before using it.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(self.connect_max >= 1, "connect_max must be >= 1");
        ensure!(!self.nickname_prefix.is_empty(), "nickname_prefix must not be empty");
        ensure!(self.ttl.as_secs() >= 1, "ttl_secs must be >= 1");
        ensure!(self.connect_timeout.as_secs() >= 1, "connect_timeout_secs must be >= 1");
        Ok(())
    }
}
