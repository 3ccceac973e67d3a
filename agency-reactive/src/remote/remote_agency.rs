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

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use tracing::{debug, info, warn};

use crate::actor::{ActorRef, RemoteActorRef};
use crate::common::AgencyCore;
use crate::protocol::{bracket_host, ObjectUri, PortEntry};
use crate::traits::IdentifiableType;

/// Errors raised by remote port bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemotePortError {
    /// The agency already exports a port with this number.
    AlreadyRegistered(u16),
    /// No port of the agency satisfies the request.
    NoRemotePortAvailable(String),
}

impl fmt::Display for RemotePortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered(port) => write!(f, "Remote port {port} is already registered"),
            Self::NoRemotePortAvailable(agency) => {
                write!(f, "No remote port available for agency {agency}")
            }
        }
    }
}

impl std::error::Error for RemotePortError {}

/// Network host of a remote agency.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteHost {
    name: String,
}

impl RemoteHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host as it appears in a URI, IPv6 literals bracketed.
    pub fn uri_host(&self) -> String {
        bracket_host(&self.name)
    }
}

/// A transport endpoint exported by a remote agency.
pub struct RemotePort {
    agency: Weak<RemoteAgency>,
    scheme: String,
    port: u16,
    transmitter: bool,
}

impl RemotePort {
    pub fn agency(&self) -> Option<Arc<RemoteAgency>> {
        self.agency.upgrade()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `true` when requests can be sent to this port.
    pub fn is_transmitter(&self) -> bool {
        self.transmitter
    }

    /// URI of an object of the owning agency, reached through this port.
    pub fn object_uri(&self, kind: IdentifiableType, id: impl Into<String>) -> Option<ObjectUri> {
        let agency = self.agency()?;
        Some(ObjectUri::new(
            self.scheme.clone(),
            agency.host().uri_host(),
            Some(self.port),
            agency.id(),
            kind,
            id,
        ))
    }

    /// URI of the owning agency itself, reached through this port.
    pub fn agency_uri(&self) -> Option<ObjectUri> {
        let agency = self.agency()?;
        self.object_uri(IdentifiableType::Agency, agency.id())
    }
}

impl fmt::Debug for RemotePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotePort")
            .field("scheme", &self.scheme)
            .field("port", &self.port)
            .field("transmitter", &self.transmitter)
            .finish()
    }
}

struct RemoteAgencyState {
    ports: BTreeMap<u16, Arc<RemotePort>>,
    digest: String,
    last_presence: Instant,
}

/// Everything known about a peer agency.
///
/// Ports, digest and presence change only through
/// [`update_ports`](Self::update_ports) and the port methods, each applied under
/// this agency's own lock.
pub struct RemoteAgency {
    id: String,
    host: RemoteHost,
    core: Weak<AgencyCore>,
    this: Weak<RemoteAgency>,
    state: Mutex<RemoteAgencyState>,
}

impl RemoteAgency {
    pub fn new(id: impl Into<String>, host: RemoteHost) -> Arc<Self> {
        Self::with_core(id.into(), host, Weak::new())
    }

    pub(crate) fn with_core(id: String, host: RemoteHost, core: Weak<AgencyCore>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id,
            host,
            core,
            this: this.clone(),
            state: Mutex::new(RemoteAgencyState {
                ports: BTreeMap::new(),
                digest: String::new(),
                last_presence: Instant::now(),
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &RemoteHost {
        &self.host
    }

    /// Scheme-less address of the agency: `//host/agencyId/agencyId`.
    pub fn uri(&self) -> String {
        format!("//{}/{}/{}", self.host.uri_host(), self.id, self.id)
    }

    pub fn digest(&self) -> String {
        self.state.lock().digest.clone()
    }

    pub fn last_presence(&self) -> Instant {
        self.state.lock().last_presence
    }

    pub fn update_presence(&self) {
        self.state.lock().last_presence = Instant::now();
    }

    /// `true` when the agency has not been heard from for longer than `ttl`.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.last_presence().elapsed() > ttl
    }

    fn insert_port(
        &self,
        state: &mut RemoteAgencyState,
        scheme: &str,
        port: u16,
        transmitter: bool,
    ) -> Result<Arc<RemotePort>, RemotePortError> {
        if state.ports.contains_key(&port) {
            return Err(RemotePortError::AlreadyRegistered(port));
        }
        let remote_port = Arc::new(RemotePort {
            agency: self.this.clone(),
            scheme: scheme.to_string(),
            port,
            transmitter,
        });
        state.ports.insert(port, remote_port.clone());
        debug!(agency = %self.id, scheme, port, transmitter, "Remote port registered");
        Ok(remote_port)
    }

    pub fn register_port(
        &self,
        scheme: &str,
        port: u16,
        transmitter: bool,
    ) -> Result<Arc<RemotePort>, RemotePortError> {
        let mut state = self.state.lock();
        self.insert_port(&mut state, scheme, port, transmitter)
    }

    pub fn unregister_port(&self, port: u16) -> Option<Arc<RemotePort>> {
        let removed = self.state.lock().ports.remove(&port);
        if removed.is_some() {
            debug!(agency = %self.id, port, "Remote port unregistered");
        }
        removed
    }

    /// Reconciles the port map with an announcement.
    ///
    /// Ports absent from `entries` are removed, new ones registered, and ports
    /// whose number and scheme did not change keep their identity. Digest and
    /// presence are refreshed even when nothing else changed.
    pub fn update_ports(
        &self,
        entries: &[PortEntry],
        digest: &str,
        is_transmitter: impl Fn(&str) -> bool,
    ) {
        let mut state = self.state.lock();

        let stale: Vec<u16> = state
            .ports
            .iter()
            .filter(|(number, port)| {
                !entries
                    .iter()
                    .any(|entry| entry.port == **number && entry.scheme == port.scheme)
            })
            .map(|(number, _)| *number)
            .collect();
        for number in stale {
            state.ports.remove(&number);
            debug!(agency = %self.id, port = number, "Remote port withdrawn");
        }

        let mut announced: Vec<u16> = Vec::with_capacity(entries.len());
        for entry in entries {
            let repeated = announced.contains(&entry.port);
            announced.push(entry.port);
            if !repeated && state.ports.contains_key(&entry.port) {
                continue;
            }
            // Numbers repeated within one announcement keep their first scheme.
            let transmitter = is_transmitter(&entry.scheme);
            if let Err(e) = self.insert_port(&mut state, &entry.scheme, entry.port, transmitter) {
                warn!(
                    agency = %self.id,
                    port = entry.port,
                    scheme = %entry.scheme,
                    "Inconsistent announcement: {}",
                    e
                );
            }
        }

        if state.digest != digest {
            info!(agency = %self.id, digest, "Remote agency digest changed");
        }
        state.digest = digest.to_string();
        state.last_presence = Instant::now();
    }

    pub fn port(&self, number: u16) -> Option<Arc<RemotePort>> {
        self.state.lock().ports.get(&number).cloned()
    }

    /// Ports ordered by number.
    pub fn ports(&self) -> Vec<Arc<RemotePort>> {
        self.state.lock().ports.values().cloned().collect()
    }

    /// Picks a random port satisfying `accept`.
    pub fn random_remote_port_matching(
        &self,
        accept: impl Fn(&RemotePort) -> bool,
    ) -> Result<Arc<RemotePort>, RemotePortError> {
        self.state
            .lock()
            .ports
            .values()
            .filter(|port| accept(port))
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| RemotePortError::NoRemotePortAvailable(self.id.clone()))
    }

    pub fn random_remote_port(&self) -> Result<Arc<RemotePort>, RemotePortError> {
        self.random_remote_port_matching(|_| true)
    }

    pub fn random_remote_port_transmittable(&self) -> Result<Arc<RemotePort>, RemotePortError> {
        self.random_remote_port_matching(RemotePort::is_transmitter)
    }

    /// A handle for calling this agency's own capabilities.
    pub fn as_remote_actor(&self) -> Result<ActorRef, RemotePortError> {
        let port = self.random_remote_port_transmittable()?;
        let uri = port
            .agency_uri()
            .ok_or_else(|| RemotePortError::NoRemotePortAvailable(self.id.clone()))?;
        Ok(ActorRef::Remote(RemoteActorRef::new(uri, self.core.clone())))
    }
}

impl fmt::Debug for RemoteAgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RemoteAgency")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("ports", &state.ports.values().collect::<Vec<_>>())
            .field("digest", &state.digest)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transmitting(scheme: &str) -> bool {
        scheme != "udp"
    }

    #[test]
    fn test_update_ports_is_a_pure_diff() {
        let agency = RemoteAgency::new("node-b", RemoteHost::new("10.0.0.2"));
        agency.update_ports(
            &[PortEntry::new("tcp", 80), PortEntry::new("tcp", 81)],
            "d1",
            transmitting,
        );
        let kept = agency.port(81).unwrap();

        agency.update_ports(
            &[PortEntry::new("tcp", 81), PortEntry::new("tcp", 82)],
            "d2",
            transmitting,
        );
        let numbers: Vec<u16> = agency.ports().iter().map(|port| port.port()).collect();
        assert_eq!(numbers, vec![81, 82]);
        assert!(Arc::ptr_eq(&kept, &agency.port(81).unwrap()));
        assert_eq!(agency.digest(), "d2");
    }

    #[test]
    fn test_unchanged_announcement_is_idempotent() {
        let agency = RemoteAgency::new("node-b", RemoteHost::new("h"));
        let entries = [PortEntry::new("mem", 1)];
        agency.update_ports(&entries, "d", transmitting);
        let before = agency.port(1).unwrap();
        let presence = agency.last_presence();

        std::thread::sleep(Duration::from_millis(5));
        agency.update_ports(&entries, "d", transmitting);
        assert!(Arc::ptr_eq(&before, &agency.port(1).unwrap()));
        assert!(agency.last_presence() > presence);
    }

    #[test]
    fn test_repeated_port_number_keeps_first_scheme() {
        let agency = RemoteAgency::new("node-b", RemoteHost::new("h"));
        agency.update_ports(
            &[PortEntry::new("tcp", 80), PortEntry::new("mem", 80)],
            "d",
            transmitting,
        );
        let numbers: Vec<u16> = agency.ports().iter().map(|port| port.port()).collect();
        assert_eq!(numbers, vec![80]);
        assert_eq!(agency.port(80).unwrap().scheme(), "tcp");
        assert_eq!(
            agency.register_port("mem", 80, true).unwrap_err(),
            RemotePortError::AlreadyRegistered(80)
        );
    }

    #[test]
    fn test_scheme_change_replaces_port() {
        let agency = RemoteAgency::new("node-b", RemoteHost::new("h"));
        agency.update_ports(&[PortEntry::new("tcp", 80)], "d", transmitting);
        agency.update_ports(&[PortEntry::new("udp", 80)], "d", transmitting);
        let port = agency.port(80).unwrap();
        assert_eq!(port.scheme(), "udp");
        assert!(!port.is_transmitter());
    }

    #[test]
    fn test_register_port_twice() {
        let agency = RemoteAgency::new("node-b", RemoteHost::new("h"));
        agency.register_port("tcp", 80, true).unwrap();
        assert_eq!(
            agency.register_port("mem", 80, true).unwrap_err(),
            RemotePortError::AlreadyRegistered(80)
        );
        assert!(agency.unregister_port(80).is_some());
        assert!(agency.unregister_port(80).is_none());
    }

    #[test]
    fn test_random_ports() {
        let agency = RemoteAgency::new("node-b", RemoteHost::new("h"));
        assert_eq!(
            agency.random_remote_port().unwrap_err(),
            RemotePortError::NoRemotePortAvailable("node-b".to_string())
        );

        agency.register_port("udp", 5000, false).unwrap();
        assert_eq!(agency.random_remote_port().unwrap().port(), 5000);
        assert!(agency.random_remote_port_transmittable().is_err());

        agency.register_port("tcp", 5001, true).unwrap();
        for _ in 0..10 {
            assert_eq!(agency.random_remote_port_transmittable().unwrap().port(), 5001);
        }
    }

    #[test]
    fn test_uris() {
        let agency = RemoteAgency::new("node-b", RemoteHost::new("fe80::1"));
        assert_eq!(agency.uri(), "//[fe80::1]/node-b/node-b");

        let port = agency.register_port("tcp", 81, true).unwrap();
        assert_eq!(
            port.agency_uri().unwrap().to_string(),
            "tcp://[fe80::1]:81/node-b/agencies/node-b"
        );
        assert!(agency.as_remote_actor().unwrap().is_remote());
    }
}
