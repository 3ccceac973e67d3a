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

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, instrument, trace};

use crate::common::AgencyCore;
use crate::protocol::{Announcement, ProtocolError};
use crate::remote::{RemoteAgency, RemoteHost};

/// The peers an agency knows about, keyed by agency id.
pub struct RemoteAgencies {
    local_id: String,
    transmitter_schemes: Vec<String>,
    core: Weak<AgencyCore>,
    agencies: DashMap<String, Arc<RemoteAgency>>,
}

impl RemoteAgencies {
    pub(crate) fn new(
        local_id: impl Into<String>,
        transmitter_schemes: Vec<String>,
        core: Weak<AgencyCore>,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            transmitter_schemes,
            core,
            agencies: DashMap::new(),
        }
    }

    fn is_transmitter(&self, scheme: &str) -> bool {
        self.transmitter_schemes.iter().any(|candidate| candidate == scheme)
    }

    /// Creates or refreshes the peer described by `announcement`.
    ///
    /// Announcements from this agency itself are ignored and yield `None`.
    #[instrument(skip(self), fields(local = %self.local_id))]
    pub fn handle_announcement(
        &self,
        announcement: &Announcement,
    ) -> Result<Option<Arc<RemoteAgency>>, ProtocolError> {
        if announcement.agency_id == self.local_id {
            trace!("Ignoring own announcement");
            return Ok(None);
        }
        if announcement.agency_id.is_empty() {
            return Err(ProtocolError::MalformedRequest(
                "announcement without agency id".to_string(),
            ));
        }
        let entries = announcement.entries()?;

        let agency = self
            .agencies
            .entry(announcement.agency_id.clone())
            .or_insert_with(|| {
                info!(agency = %announcement.agency_id, host = %announcement.host, "Discovered remote agency");
                RemoteAgency::with_core(
                    announcement.agency_id.clone(),
                    RemoteHost::new(announcement.host.clone()),
                    self.core.clone(),
                )
            })
            .clone();
        agency.update_ports(&entries, &announcement.digest, |scheme| {
            self.is_transmitter(scheme)
        });
        Ok(Some(agency))
    }

    pub fn get(&self, id: &str) -> Option<Arc<RemoteAgency>> {
        self.agencies.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &str) -> Option<Arc<RemoteAgency>> {
        let removed = self.agencies.remove(id).map(|(_, agency)| agency);
        if removed.is_some() {
            info!(agency = id, "Forgot remote agency");
        }
        removed
    }

    /// Forgets every peer not heard from within `ttl`. Returns their ids.
    pub fn prune_stale(&self, ttl: Duration) -> Vec<String> {
        let stale: Vec<String> = self
            .agencies
            .iter()
            .filter(|entry| entry.value().is_stale(ttl))
            .map(|entry| entry.key().clone())
            .collect();
        for id in &stale {
            self.remove(id);
        }
        stale
    }

    /// Known peer ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agencies.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.agencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agencies.is_empty()
    }
}
