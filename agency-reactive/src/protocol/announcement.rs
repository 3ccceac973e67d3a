/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolError;

const PORT_TOKEN: &str = r"(?P<scheme>[a-z][a-z0-9+.\-]*):(?P<port>\d+)";

lazy_static! {
    static ref PORT_TOKEN_PATTERN: Result<Regex, regex::Error> = Regex::new(PORT_TOKEN);
}

/// One transport endpoint exported by an agency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortEntry {
    pub scheme: String,
    pub port: u16,
}

impl PortEntry {
    pub fn new(scheme: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            port,
        }
    }
}

/// Presence message an agency broadcasts to its peers.
///
/// `ports` is an ordered stream of `scheme:port` tokens, for example
/// `"mem:7001 tcp:7002"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub agency_id: String,
    pub host: String,
    pub ports: String,
    pub digest: String,
}

impl Announcement {
    pub fn new(
        agency_id: impl Into<String>,
        host: impl Into<String>,
        entries: &[PortEntry],
        digest: impl Into<String>,
    ) -> Self {
        let ports = entries
            .iter()
            .map(|entry| format!("{}:{}", entry.scheme, entry.port))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            agency_id: agency_id.into(),
            host: host.into(),
            ports,
            digest: digest.into(),
        }
    }

    /// Endpoints in announcement order.
    pub fn entries(&self) -> Result<Vec<PortEntry>, ProtocolError> {
        parse_port_tokens(&self.ports)
    }
}

/// Extracts `scheme:port` tokens, preserving their order.
pub fn parse_port_tokens(text: &str) -> Result<Vec<PortEntry>, ProtocolError> {
    let pattern = PORT_TOKEN_PATTERN
        .as_ref()
        .map_err(|e| ProtocolError::MalformedRequest(format!("port token pattern: {e}")))?;
    pattern
        .captures_iter(text)
        .map(|captures| {
            let port = captures["port"].parse::<u16>().map_err(|e| {
                ProtocolError::MalformedRequest(format!("port {}: {e}", &captures["port"]))
            })?;
            Ok(PortEntry::new(&captures["scheme"], port))
        })
        .collect()
}
