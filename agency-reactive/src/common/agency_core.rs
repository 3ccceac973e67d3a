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

use std::sync::{Arc, OnceLock, Weak};
use std::time::Instant;

use dashmap::DashMap;
use derive_new::new;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, trace, warn};

use crate::actor::{current, ActorRef, Call, Future, RemoteActorRef};
use crate::common::{AddressingError, AgencyConfig, AgencyState, Feature, IdentifiableRegistry, StateGate};
use crate::message::{CallError, CallResult};
use crate::protocol::{
    CallRequest, Dispatcher, FutureRequest, ObjectUri, PortEntry, Protocol, Request,
};
use crate::remote::{RemoteAgencies, RemoteAgency, RemoteHost, RemotePort};
use crate::traits::IdentifiableType;

/// A remote call waiting for its result.
#[derive(new)]
struct PendingFuture {
    future: Future,
    deadline: Instant,
}

/// Shared state behind an [`Agency`](crate::common::Agency) handle.
///
/// Bodies, protocols and remote handles keep `Weak` references to it, so
/// dropping the last `Agency` handle after shutdown releases everything.
pub struct AgencyCore {
    id: String,
    config: AgencyConfig,
    registry: IdentifiableRegistry,
    remotes: RemoteAgencies,
    protocols: RwLock<Vec<Arc<dyn Protocol>>>,
    features: Mutex<Vec<Arc<dyn Feature>>>,
    pending: DashMap<String, PendingFuture>,
    pub(crate) state: StateGate<AgencyState>,
    actor: OnceLock<ActorRef>,
    this: Weak<AgencyCore>,
}

impl AgencyCore {
    pub(crate) fn new(id: String, config: AgencyConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            remotes: RemoteAgencies::new(
                id.clone(),
                config.remote.transmitter_schemes.clone(),
                this.clone(),
            ),
            state: StateGate::new(AgencyState::Booting, config.state_recheck()),
            id,
            config,
            registry: IdentifiableRegistry::new(),
            protocols: RwLock::new(Vec::new()),
            features: Mutex::new(Vec::new()),
            pending: DashMap::new(),
            actor: OnceLock::new(),
            this: this.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &AgencyConfig {
        &self.config
    }

    pub fn registry(&self) -> &IdentifiableRegistry {
        &self.registry
    }

    pub fn remotes(&self) -> &RemoteAgencies {
        &self.remotes
    }

    pub(crate) fn weak(&self) -> Weak<AgencyCore> {
        self.this.clone()
    }

    pub(crate) fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.this.clone())
    }

    pub(crate) fn set_actor(&self, actor: ActorRef) {
        let _ = self.actor.set(actor);
    }

    /// Handle of the agency's own body.
    pub(crate) fn actor(&self) -> Option<ActorRef> {
        self.actor.get().cloned()
    }

    pub(crate) fn add_protocol(&self, protocol: Arc<dyn Protocol>) {
        self.protocols.write().push(protocol);
    }

    pub(crate) fn take_protocols(&self) -> Vec<Arc<dyn Protocol>> {
        std::mem::take(&mut *self.protocols.write())
    }

    pub(crate) fn protocols(&self) -> Vec<Arc<dyn Protocol>> {
        self.protocols.read().clone()
    }

    pub(crate) fn push_feature(&self, feature: Arc<dyn Feature>) {
        self.features.lock().push(feature);
    }

    pub(crate) fn take_features(&self) -> Vec<Arc<dyn Feature>> {
        std::mem::take(&mut *self.features.lock())
    }

    /// Exported endpoints in registration order.
    pub fn port_entries(&self) -> Vec<PortEntry> {
        self.protocols
            .read()
            .iter()
            .map(|protocol| PortEntry::new(protocol.scheme(), protocol.port()))
            .collect()
    }

    /// URI of a local object, through the first registered protocol.
    ///
    /// Without protocols the URI uses the `local` scheme and no port.
    pub fn local_uri(&self, kind: IdentifiableType, id: &str) -> ObjectUri {
        let protocols = self.protocols.read();
        let (scheme, port) = protocols
            .first()
            .map(|protocol| (protocol.scheme().to_string(), Some(protocol.port())))
            .unwrap_or_else(|| ("local".to_string(), None));
        ObjectUri::new(scheme, &self.config.defaults.host, port, &self.id, kind, id)
    }

    fn local_uri_for_scheme(&self, scheme: &str, kind: IdentifiableType, id: &str) -> ObjectUri {
        let port = self
            .protocols
            .read()
            .iter()
            .find(|protocol| protocol.scheme() == scheme)
            .map(|protocol| protocol.port());
        ObjectUri::new(scheme, &self.config.defaults.host, port, &self.id, kind, id)
    }

    fn transmitter_protocol(&self, scheme: &str) -> Option<Arc<dyn Protocol>> {
        self.protocols
            .read()
            .iter()
            .find(|protocol| protocol.scheme() == scheme && protocol.as_transmitter().is_some())
            .cloned()
    }

    /// Chooses a port of `agency` that one of our transmitters can reach.
    ///
    /// A port named explicitly is preferred when it is usable.
    fn route(
        &self,
        agency: &RemoteAgency,
        preferred_port: Option<u16>,
    ) -> Result<(Arc<dyn Protocol>, Arc<RemotePort>), CallError> {
        if let Some(port) = preferred_port.and_then(|number| agency.port(number)) {
            if port.is_transmitter() {
                if let Some(protocol) = self.transmitter_protocol(port.scheme()) {
                    return Ok((protocol, port));
                }
            }
        }
        let port = agency
            .random_remote_port_matching(|port| {
                port.is_transmitter() && self.transmitter_protocol(port.scheme()).is_some()
            })
            .map_err(|e| CallError::NotFound(e.to_string()))?;
        let protocol = self
            .transmitter_protocol(port.scheme())
            .ok_or_else(|| CallError::Transport(format!("no transmitter for {}", port.scheme())))?;
        Ok((protocol, port))
    }

    /// Sends `call` to a remote object and tracks its future until the result
    /// comes back or the call times out.
    #[instrument(skip(self, call), fields(agency = %self.id, capability = call.name()))]
    pub(crate) fn call_remote(&self, call: Call, target: &ObjectUri) -> Future {
        let future = call.future().clone();
        if let Err(e) = self.send_call(&call, target) {
            warn!(target_uri = %target, "Remote call not sent: {}", e);
            let _ = future.resolve(Err(e));
        }
        future
    }

    fn send_call(&self, call: &Call, target: &ObjectUri) -> Result<(), CallError> {
        let agency = self
            .remotes
            .get(target.agency_id())
            .ok_or_else(|| CallError::NotFound(format!("agency {}", target.agency_id())))?;
        let (protocol, port) = self.route(&agency, target.port())?;
        let transmitter = protocol
            .as_transmitter()
            .ok_or_else(|| CallError::Transport(format!("{} cannot transmit", protocol.scheme())))?;

        let target_uri = port
            .object_uri(target.kind(), target.id())
            .ok_or_else(|| CallError::NotFound(format!("agency {}", target.agency_id())))?;
        let source_uri =
            self.local_uri_for_scheme(protocol.scheme(), IdentifiableType::Agency, &self.id);
        let request = CallRequest::new(
            call.future().id(),
            source_uri.to_string(),
            target_uri.to_string(),
            call.name(),
            call.args(),
            transmitter.preferred_coding(),
        )
        .map_err(|e| CallError::Transport(e.to_string()))?;

        let future_id = call.future().id().to_string();
        self.pending.insert(
            future_id.clone(),
            PendingFuture::new(
                call.future().clone(),
                Instant::now() + self.config.call_timeout(),
            ),
        );
        if let Err(e) = transmitter.send_request(&Request::Call(request), &port) {
            self.pending.remove(&future_id);
            return Err(CallError::Transport(e.to_string()));
        }
        trace!(future_id, to = %target_uri, "Remote call sent");
        Ok(())
    }

    /// Resolves `request.target` locally and delivers the request to it.
    #[instrument(skip(self, request), fields(agency = %self.id, target_uri = request.target()))]
    pub fn dispatch(&self, request: Request) -> Result<(), AddressingError> {
        match request {
            Request::Call(call) => self.dispatch_call(call),
            Request::Future(future) => {
                self.complete_future(&future);
                Ok(())
            }
        }
    }

    fn resolve_local(&self, uri: &ObjectUri) -> Result<ActorRef, AddressingError> {
        if uri.agency_id() != self.id {
            return Err(AddressingError::TargetNotFound(uri.to_string()));
        }
        self.registry
            .get(uri.kind(), uri.id())
            .and_then(|object| object.as_actor())
            .ok_or_else(|| AddressingError::TargetNotFound(uri.to_string()))
    }

    fn dispatch_call(&self, request: CallRequest) -> Result<(), AddressingError> {
        let source_uri = ObjectUri::parse(&request.source)?;
        let source = ActorRef::Remote(RemoteActorRef::new(source_uri.clone(), self.weak()));

        let target = match ObjectUri::parse(&request.target).and_then(|uri| self.resolve_local(&uri)) {
            Ok(target) => target,
            Err(e) => {
                self.send_future_result(&request.future_id, Err(e.clone().into()), &source_uri);
                return Err(e);
            }
        };

        let args = match request.decoded_args() {
            Ok(args) => args,
            Err(e) => {
                let error = CallError::BadArguments(e.to_string());
                self.send_future_result(&request.future_id, Err(error), &source_uri);
                return Ok(());
            }
        };

        let call = match Call::with_source(source.clone(), target.clone(), request.name, args) {
            Ok(call) => call,
            Err(e) => {
                self.send_future_result(&request.future_id, Err(e), &source_uri);
                return Ok(());
            }
        };

        let future = current::enter(source, || target.submit(call, std::time::Duration::ZERO));
        let core = self.weak();
        let future_id = request.future_id;
        future.on_resolve(move |result| {
            if let Some(core) = core.upgrade() {
                core.send_future_result(&future_id, result.clone(), &source_uri);
            }
        });
        Ok(())
    }

    /// Relays a result to the agency at `destination` under `future_id`.
    pub(crate) fn send_future_result(&self, future_id: &str, result: CallResult, destination: &ObjectUri) {
        if let Err(e) = self.relay_future(future_id, &result, destination) {
            warn!(future_id, to = %destination, "Result not relayed: {}", e);
        }
    }

    fn relay_future(
        &self,
        future_id: &str,
        result: &CallResult,
        destination: &ObjectUri,
    ) -> Result<(), CallError> {
        let agency = match self.remotes.get(destination.agency_id()) {
            Some(agency) => agency,
            None => {
                // The caller has not announced itself; reply to the endpoint it called from.
                let host = destination.host().trim_start_matches('[').trim_end_matches(']');
                let agency = RemoteAgency::with_core(
                    destination.agency_id().to_string(),
                    RemoteHost::new(host),
                    self.weak(),
                );
                if let Some(port) = destination.port() {
                    let _ = agency.register_port(destination.scheme(), port, true);
                }
                agency
            }
        };
        let (protocol, port) = self.route(&agency, destination.port())?;
        let transmitter = protocol
            .as_transmitter()
            .ok_or_else(|| CallError::Transport(format!("{} cannot transmit", protocol.scheme())))?;
        let relay = FutureRequest::encode(future_id, result, transmitter, &port)
            .map_err(|e| CallError::Transport(e.to_string()))?;
        transmitter
            .send_request(&Request::Future(relay), &port)
            .map_err(|e| CallError::Transport(e.to_string()))?;
        trace!(future_id, "Result relayed");
        Ok(())
    }

    fn complete_future(&self, relay: &FutureRequest) {
        let Some((_, pending)) = self.pending.remove(relay.future_id()) else {
            warn!(future_id = relay.future_id(), "No pending future for result, dropping it");
            return;
        };
        let result = relay
            .decoded_value()
            .unwrap_or_else(|e| Err(CallError::Transport(e.to_string())));
        if let Err(e) = pending.future.resolve(result) {
            debug!("Late result ignored: {}", e);
        }
    }

    /// Resolves remote calls whose deadline has passed with [`CallError::Timeout`].
    pub fn sweep_pending(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| entry.value().deadline <= now)
            .map(|entry| entry.key().clone())
            .collect();
        let mut swept = 0;
        for future_id in expired {
            if let Some((_, pending)) = self.pending.remove(&future_id) {
                let _ = pending.future.resolve(Err(CallError::Timeout));
                swept += 1;
            }
        }
        if swept > 0 {
            info!(agency = %self.id, swept, "Remote calls timed out");
        }
        swept
    }

    /// Resolves every pending remote call with `error`.
    pub(crate) fn fail_pending(&self, error: &CallError) {
        let ids: Vec<String> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        for future_id in ids {
            if let Some((_, pending)) = self.pending.remove(&future_id) {
                let _ = pending.future.resolve(Err(error.clone()));
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
