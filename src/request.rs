// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Deserialize;
use url::Url;

use crate::error::RelayError;

/// Default IRC port used when a destination URL omits one.
pub const DEFAULT_IRC_PORT: u16 = 6667;

/// One relay request as received on the listener port.
///
/// Extra JSON fields are ignored by construction: `serde` only looks at the
/// two fields named here.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayRequest {
    pub channel: String,
    pub privmsg: String,
}

/// A parsed destination: the host/port/channel triple a session is keyed on,
/// plus the original URL text (the session registry key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationUrl {
    pub raw: String,
    pub host: String,
    pub port: u16,
    pub channel: String,
}

impl DestinationUrl {
    /// Parses `<scheme>://<host>[:<port>]/<channel>` into its parts.
    ///
    /// The scheme is accepted but not validated against a fixed list, mirroring
    /// the tolerance of the original daemon this one is modeled on. Host and
    /// channel must both be non-empty after parsing.
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let url = Url::parse(raw)
            .map_err(|e| RelayError::RequestMalformed(format!("bad channel url {raw:?}: {e}")))?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RelayError::RequestMalformed(format!("channel url {raw:?} has no host")))?
            .to_string();

        let port = url.port().unwrap_or(DEFAULT_IRC_PORT);

        let channel = url.path().trim_start_matches('/').to_string();
        if channel.is_empty() {
            return Err(RelayError::RequestMalformed(format!(
                "channel url {raw:?} has no channel path"
            )));
        }

        Ok(Self { raw: raw.to_string(), host, port, channel })
    }

    /// The channel name as transmitted on the wire, prefixed with `#`.
    pub fn wire_channel(&self) -> String {
        format!("#{}", self.channel)
    }
}
