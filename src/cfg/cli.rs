// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result, bail};

/// Parsed command-line arguments.
///
/// Only two flags exist (`-p`, `-d`); tunables such as `TTL` and
/// `CONNECT_MAX` live in the config file, never on the command line.
#[derive(Debug, Clone, Copy)]
pub struct DaemonArgs {
    /// Listener TCP port. Default 4747.
    pub port: u16,
    /// Debug verbosity. 0 = info, 1 = debug, >=2 = trace. Passed to the IRC
    /// facade one level below the daemon's own.
    pub debug_level: u8,
}

impl Default for DaemonArgs {
    fn default() -> Self {
        Self { port: 4747, debug_level: 0 }
    }
}

impl DaemonArgs {
    /// Parses `args` (excluding argv[0]) in the style of a small getopt:
    /// unrecognized flags are a fatal startup error, not silently ignored.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut out = Self::default();
        let mut it = args.into_iter();
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "-p" => {
                    let value = it.next().context("-p requires a port argument")?;
                    out.port = value.parse().with_context(|| format!("invalid port {value:?}"))?;
                },
                "-d" => {
                    let value = it.next().context("-d requires a debug level argument")?;
                    out.debug_level = value
                        .parse()
                        .with_context(|| format!("invalid debug level {value:?}"))?;
                },
                other => bail!("unrecognized argument {other:?}"),
            }
        }
        Ok(out)
    }
}
