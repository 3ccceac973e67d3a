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
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::actor::{
    current, ActorRef, Body, CapabilityTableBuilder, Future, LocalActorRef, RemoteActorRef,
};
use crate::common::{
    AddressingError, AgencyConfig, AgencyCore, AgencyState, Feature, IdentifiableRegistry,
    RegistrationStatus, CONFIG,
};
use crate::message::{CallError, CallResult, Value};
use crate::protocol::{Announcement, ObjectUri, Protocol, ProtocolError, Request};
use crate::remote::{RemoteAgencies, RemoteAgency};
use crate::traits::{Actor, Identifiable, IdentifiableType, StepActor};

/// A process hosting actors, features and protocols.
///
/// The agency is itself an actor: it owns a body registered under
/// [`IdentifiableType::Agency`] that answers `id`, `digest`, `remote_agencies`
/// and `announce`, and periodically times out remote calls that never got an
/// answer.
///
/// `Agency` is a cheap handle; clones share the same core.
#[derive(Clone)]
pub struct Agency {
    core: Arc<AgencyCore>,
}

impl Agency {
    /// Launches an agency configured from [`CONFIG`].
    pub fn launch() -> Result<Self, AddressingError> {
        Self::launch_with_config(CONFIG.clone())
    }

    /// Launches an agency with an explicit configuration.
    #[instrument(skip(config), fields(agency = %config.defaults.agency_id))]
    pub fn launch_with_config(config: AgencyConfig) -> Result<Self, AddressingError> {
        let core = AgencyCore::new(config.defaults.agency_id.clone(), config);
        let agency = Self { core };

        let actor = AgencyActor {
            core: agency.core.weak(),
            sweep_interval: agency.core.config().pending_sweep_interval(),
        };
        let id = agency.core.id().to_string();
        let handle = agency.start_body(id, IdentifiableType::Agency, actor)?;
        agency.core.set_actor(handle);
        agency.core.state.advance(AgencyState::Initialized);

        agency.core.state.advance(AgencyState::Running);
        info!("Agency running");
        Ok(agency)
    }

    pub fn id(&self) -> &str {
        self.core.id()
    }

    pub fn config(&self) -> &AgencyConfig {
        self.core.config()
    }

    pub fn state(&self) -> AgencyState {
        self.core.state.get()
    }

    /// Blocks until the agency reaches `target` or a later state.
    pub fn wait_for_state(&self, target: AgencyState) -> AgencyState {
        self.core.state.wait_for(target)
    }

    pub fn registry(&self) -> &IdentifiableRegistry {
        self.core.registry()
    }

    pub fn remote_agencies(&self) -> &RemoteAgencies {
        self.core.remotes()
    }

    /// Handle of the agency's own body.
    pub fn actor(&self) -> Option<ActorRef> {
        self.core.actor()
    }

    fn ensure_running(&self) -> Result<(), AddressingError> {
        if self.state() >= AgencyState::ShuttingDown {
            return Err(AddressingError::AgencyStopped);
        }
        Ok(())
    }

    fn start_body<A: Actor>(
        &self,
        id: String,
        kind: IdentifiableType,
        actor: A,
    ) -> Result<ActorRef, AddressingError> {
        let body = Body::new(
            id.clone(),
            kind,
            actor,
            self.core.weak(),
            self.core.config().state_recheck(),
            self.core.config().direct_call_timeout(),
        );
        let object: Arc<dyn Identifiable> = body.clone();
        let status = self.core.registry().register(object.clone());
        if status != RegistrationStatus::Accepted {
            return Err(AddressingError::Registration { id, status });
        }
        if let Err(e) = body.start() {
            error!(actor = %id, "Could not start actor thread: {}", e);
            self.core.registry().unregister(&object);
            return Err(AddressingError::Registration {
                id,
                status: RegistrationStatus::Error,
            });
        }
        Ok(ActorRef::Local(LocalActorRef::new(body)))
    }

    /// Hosts `actor` under `id` on a new body thread.
    pub fn spawn<A: Actor>(&self, id: impl Into<String>, actor: A) -> Result<ActorRef, AddressingError> {
        self.ensure_running()?;
        self.start_body(id.into(), IdentifiableType::Actor, actor)
    }

    /// Calls `target` on behalf of the agency itself.
    ///
    /// Use this from threads that do not run an actor.
    pub fn call(
        &self,
        target: &ActorRef,
        name: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<Future, CallError> {
        self.call_delayed(target, name, args, Duration::ZERO)
    }

    pub fn call_delayed(
        &self,
        target: &ActorRef,
        name: impl Into<String>,
        args: Vec<Value>,
        delay: Duration,
    ) -> Result<Future, CallError> {
        let agency = self
            .core
            .actor()
            .ok_or_else(|| CallError::ActorStopped(self.id().to_string()))?;
        current::enter(agency, || target.call_delayed(name, args, delay))
    }

    /// Looks up a local object and returns a handle if it is an actor.
    pub fn lookup(&self, kind: IdentifiableType, id: &str) -> Option<ActorRef> {
        self.core
            .registry()
            .get(kind, id)
            .and_then(|object| object.as_actor())
    }

    /// Shorthand for looking up a local actor.
    pub fn actor_by_id(&self, id: &str) -> Option<ActorRef> {
        self.lookup(IdentifiableType::Actor, id)
    }

    /// Resolves an object URI to a handle.
    ///
    /// URIs naming this agency resolve through the registry; URIs naming a
    /// known peer yield a remote handle.
    pub fn resolve(&self, uri: &str) -> Result<ActorRef, AddressingError> {
        let uri = ObjectUri::parse(uri)?;
        if uri.agency_id() == self.id() {
            return self
                .lookup(uri.kind(), uri.id())
                .ok_or_else(|| AddressingError::TargetNotFound(uri.to_string()));
        }
        if self.core.remotes().get(uri.agency_id()).is_none() {
            return Err(AddressingError::AgencyNotFound(uri.agency_id().to_string()));
        }
        Ok(ActorRef::Remote(RemoteActorRef::new(uri, self.core.weak())))
    }

    /// Handle for an object of a known peer agency.
    pub fn remote_actor(
        &self,
        agency_id: &str,
        kind: IdentifiableType,
        id: &str,
    ) -> Result<ActorRef, AddressingError> {
        let agency = self
            .core
            .remotes()
            .get(agency_id)
            .ok_or_else(|| AddressingError::AgencyNotFound(agency_id.to_string()))?;
        let port = agency
            .random_remote_port_transmittable()
            .map_err(|e| AddressingError::TargetNotFound(e.to_string()))?;
        let uri = port
            .object_uri(kind, id)
            .ok_or_else(|| AddressingError::AgencyNotFound(agency_id.to_string()))?;
        Ok(ActorRef::Remote(RemoteActorRef::new(uri, self.core.weak())))
    }

    /// Registers and starts a protocol.
    #[instrument(skip(self, protocol), fields(agency = %self.id()))]
    pub fn add_protocol<P: Protocol>(&self, protocol: Arc<P>) -> Result<(), ProtocolError> {
        let object: Arc<dyn Identifiable> = protocol.clone();
        let status = self.core.registry().register(object.clone());
        if status != RegistrationStatus::Accepted {
            return Err(ProtocolError::AddressInUse(format!(
                "{}:{} ({status:?})",
                protocol.scheme(),
                protocol.port()
            )));
        }
        if let Err(e) = protocol.start(self.core.dispatcher()) {
            self.core.registry().unregister(&object);
            return Err(e);
        }
        info!(scheme = protocol.scheme(), port = protocol.port(), "Protocol started");
        self.core.add_protocol(protocol);
        Ok(())
    }

    /// Registers a feature and runs its init hook.
    ///
    /// Returns `Ok(false)` when the hook rejected the feature, which is then
    /// unregistered again.
    pub fn add_feature<F: Feature>(&self, feature: Arc<F>) -> Result<bool, AddressingError> {
        self.ensure_running()?;
        let object: Arc<dyn Identifiable> = feature.clone();
        let status = self.core.registry().register(object.clone());
        if status != RegistrationStatus::Accepted {
            return Err(AddressingError::Registration {
                id: feature.id().to_string(),
                status,
            });
        }
        if !feature.init_feature(self) {
            warn!(feature = feature.id(), "Feature rejected during init");
            self.core.registry().unregister(&object);
            return Ok(false);
        }
        info!(feature = feature.id(), "Feature initialized");
        self.core.push_feature(feature);
        Ok(true)
    }

    /// Routes a decoded request into this agency.
    pub fn dispatch(&self, request: Request) -> Result<(), AddressingError> {
        self.core.dispatch(request)
    }

    /// Presence message describing this agency's endpoints.
    pub fn announcement(&self) -> Announcement {
        Announcement::new(
            self.id(),
            &self.core.config().defaults.host,
            &self.core.port_entries(),
            self.core.registry().digest(),
        )
    }

    pub fn handle_announcement(
        &self,
        announcement: &Announcement,
    ) -> Result<Option<Arc<RemoteAgency>>, ProtocolError> {
        self.core.remotes().handle_announcement(announcement)
    }

    /// Times out remote calls past their deadline. Returns how many were resolved.
    pub fn sweep_pending(&self) -> usize {
        self.core.sweep_pending()
    }

    /// Remote calls still waiting for a result.
    pub fn pending_remote_calls(&self) -> usize {
        self.core.pending_len()
    }

    /// Stops actors, features and protocols, then the agency's own body.
    #[instrument(skip(self), fields(agency = %self.id()))]
    pub fn shutdown(&self) {
        if !self.core.state.advance(AgencyState::ShuttingDown) {
            self.core.state.wait_for(AgencyState::Terminated);
            return;
        }
        info!("Agency shutting down");
        let timeout = self.core.config().actor_shutdown_timeout();

        let actors: Vec<ActorRef> = self
            .core
            .registry()
            .objects(IdentifiableType::Actor)
            .into_iter()
            .filter_map(|object| object.as_actor())
            .collect();
        for actor in &actors {
            actor.stop();
        }
        for actor in &actors {
            if !actor.wait_stopped(timeout) {
                warn!(actor = actor.id(), "Actor did not stop in time");
            }
        }

        for feature in self.core.take_features().into_iter().rev() {
            feature.terminate_feature(self);
            self.core
                .registry()
                .unregister_id(IdentifiableType::Feature, feature.id());
        }

        for protocol in self.core.take_protocols() {
            protocol.stop();
            self.core
                .registry()
                .unregister_id(IdentifiableType::Protocol, protocol.id());
        }

        self.core
            .fail_pending(&CallError::Transport("agency shut down".to_string()));

        if let Some(agency) = self.core.actor() {
            agency.stop();
            if !agency.wait_stopped(timeout) {
                warn!("Agency body did not stop in time");
            }
        }

        self.core.state.advance(AgencyState::Terminated);
        info!("Agency terminated");
    }
}

impl fmt::Debug for Agency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agency")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("registry", self.core.registry())
            .finish()
    }
}

/// State of the agency's own body.
struct AgencyActor {
    core: Weak<AgencyCore>,
    sweep_interval: Duration,
}

impl AgencyActor {
    fn with_core<R>(&self, f: impl FnOnce(&AgencyCore) -> R) -> Result<R, CallError> {
        let core = self
            .core
            .upgrade()
            .ok_or_else(|| CallError::ActorStopped("agency".to_string()))?;
        Ok(f(&core))
    }

    fn id(&self, args: &[Value]) -> CallResult {
        crate::actor::expect_no_args("id", args)?;
        let id = self.with_core(|core| core.id().to_string())?;
        crate::actor::encode_return("id", id)
    }

    fn digest(&self, args: &[Value]) -> CallResult {
        crate::actor::expect_no_args("digest", args)?;
        let digest = self.with_core(|core| core.registry().digest())?;
        crate::actor::encode_return("digest", digest)
    }

    fn remote_agencies(&self, args: &[Value]) -> CallResult {
        crate::actor::expect_no_args("remote_agencies", args)?;
        let ids = self.with_core(|core| core.remotes().ids())?;
        crate::actor::encode_return("remote_agencies", ids)
    }

    fn announce(&mut self, args: &[Value]) -> CallResult {
        let announcement: Announcement = crate::actor::decode_args("announce", args)
            .map(|(agency_id, host, ports, digest): (String, String, String, String)| {
                Announcement {
                    agency_id,
                    host,
                    ports,
                    digest,
                }
            })?;
        let known = self
            .with_core(|core| core.remotes().handle_announcement(&announcement))?
            .map_err(|e| CallError::BadArguments(e.to_string()))?;
        crate::actor::encode_return("announce", known.is_some())
    }
}

impl fmt::Debug for AgencyActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgencyActor")
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl Actor for AgencyActor {
    fn declare(builder: &mut CapabilityTableBuilder<Self>) {
        builder.direct_fn("id", |actor, args| actor.id(args));
        builder.direct_fn("digest", |actor, args| actor.digest(args));
        builder.direct_fn("remote_agencies", |actor, args| actor.remote_agencies(args));
        builder.callable_fn("announce", |actor, args| actor.announce(args));
    }

    fn as_step(&mut self) -> Option<&mut dyn StepActor> {
        Some(self)
    }
}

impl StepActor for AgencyActor {
    fn step_delay(&self) -> Duration {
        self.sweep_interval
    }

    fn step(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.sweep_pending();
            let stale = core.remotes().prune_stale(core.config().presence_ttl());
            if !stale.is_empty() {
                info!(?stale, "Pruned silent remote agencies");
            }
        }
    }
}
