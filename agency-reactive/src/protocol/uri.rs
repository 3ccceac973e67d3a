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

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::common::AddressingError;
use crate::traits::IdentifiableType;

/// Address of an object hosted by an agency:
/// `scheme://host:port/agencyId/<type>/<id>`, for example
/// `mem://127.0.0.1:7001/node-a/actors/pinger`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUri {
    scheme: String,
    host: String,
    port: Option<u16>,
    agency_id: String,
    kind: IdentifiableType,
    id: String,
}

/// Brackets bare IPv6 literals so they can be followed by a port.
pub(crate) fn bracket_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

impl ObjectUri {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        agency_id: impl Into<String>,
        kind: IdentifiableType,
        id: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: bracket_host(&host.into()),
            port,
            agency_id: agency_id.into(),
            kind,
            id: id.into(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, AddressingError> {
        let url = Url::parse(text).map_err(|e| AddressingError::InvalidUri(format!("{text}: {e}")))?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| AddressingError::InvalidUri(format!("{text}: missing host")))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|segment| !segment.is_empty()).collect())
            .unwrap_or_default();
        let [agency_id, kind, id] = segments.as_slice() else {
            return Err(AddressingError::InvalidUri(format!(
                "{text}: expected /agencyId/<type>/<id>"
            )));
        };
        let kind = IdentifiableType::from_path_segment(kind)
            .ok_or_else(|| AddressingError::InvalidUri(format!("{text}: unknown type {kind}")))?;

        Ok(Self::new(url.scheme(), host, url.port(), *agency_id, kind, *id))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn agency_id(&self) -> &str {
        &self.agency_id
    }

    pub fn kind(&self) -> IdentifiableType {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The URI of the agency hosting this object, at the same endpoint.
    pub fn agency_uri(&self) -> Self {
        Self {
            kind: IdentifiableType::Agency,
            id: self.agency_id.clone(),
            ..self.clone()
        }
    }

    /// The same endpoint, addressing another object of the same agency.
    pub fn sibling(&self, kind: IdentifiableType, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "/{}/{}/{}", self.agency_id, self.kind.path_segment(), self.id)
    }
}

impl FromStr for ObjectUri {
    type Err = AddressingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actor_uri() {
        let uri = ObjectUri::parse("mem://127.0.0.1:7001/node-a/actors/pinger").unwrap();
        assert_eq!(uri.scheme(), "mem");
        assert_eq!(uri.host(), "127.0.0.1");
        assert_eq!(uri.port(), Some(7001));
        assert_eq!(uri.agency_id(), "node-a");
        assert_eq!(uri.kind(), IdentifiableType::Actor);
        assert_eq!(uri.id(), "pinger");
        assert_eq!(uri.to_string(), "mem://127.0.0.1:7001/node-a/actors/pinger");
    }

    #[test]
    fn test_ipv6_hosts_are_bracketed() {
        let uri = ObjectUri::new("tcp", "::1", Some(80), "n", IdentifiableType::Agency, "n");
        assert_eq!(uri.to_string(), "tcp://[::1]:80/n/agencies/n");

        let parsed = ObjectUri::parse(&uri.to_string()).unwrap();
        assert_eq!(parsed.host(), "[::1]");
    }

    #[test]
    fn test_agency_uri() {
        let uri = ObjectUri::parse("xml-tcp://host:81/node-b/actors/worker").unwrap();
        assert_eq!(uri.agency_uri().to_string(), "xml-tcp://host:81/node-b/agencies/node-b");
    }

    #[test]
    fn test_rejects_bad_paths() {
        assert!(ObjectUri::parse("mem://host:1/node-a/actors").is_err());
        assert!(ObjectUri::parse("mem://host:1/node-a/widgets/x").is_err());
        assert!(ObjectUri::parse("not a uri").is_err());
    }
}
