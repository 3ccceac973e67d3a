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

use tracing::{trace, warn};

use crate::actor::body::LocalBody;
use crate::actor::{Call, Future};
use crate::common::{AgencyCore, BodyState};
use crate::message::{CallError, CallResult, Value};
use crate::protocol::ObjectUri;
use crate::traits::IdentifiableType;

/// Handle to an actor hosted by this agency.
#[derive(Clone)]
pub struct LocalActorRef {
    body: Arc<dyn LocalBody>,
}

impl LocalActorRef {
    pub(crate) fn new(body: Arc<dyn LocalBody>) -> Self {
        Self { body }
    }

    /// Fully qualified type name of the actor state.
    pub fn actor_type(&self) -> &'static str {
        self.body.actor_type()
    }

    pub fn state(&self) -> BodyState {
        self.body.state()
    }
}

/// Handle to an object hosted by another agency.
#[derive(Clone)]
pub struct RemoteActorRef {
    uri: ObjectUri,
    core: Weak<AgencyCore>,
}

impl RemoteActorRef {
    pub(crate) fn new(uri: ObjectUri, core: Weak<AgencyCore>) -> Self {
        Self { uri, core }
    }

    pub fn uri(&self) -> &ObjectUri {
        &self.uri
    }
}

/// Address of an actor, local or remote, that calls can be sent to.
#[derive(Clone)]
pub enum ActorRef {
    Local(LocalActorRef),
    Remote(RemoteActorRef),
}

impl ActorRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Local(local) => local.body.id(),
            Self::Remote(remote) => remote.uri.id(),
        }
    }

    pub fn kind(&self) -> IdentifiableType {
        match self {
            Self::Local(local) => local.body.kind(),
            Self::Remote(remote) => remote.uri.kind(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Object URI of this actor. `None` once the hosting agency is gone.
    pub fn uri(&self) -> Option<ObjectUri> {
        match self {
            Self::Local(local) => {
                let core = local.body.core()?;
                Some(core.local_uri(local.body.kind(), local.body.id()))
            }
            Self::Remote(remote) => Some(remote.uri.clone()),
        }
    }

    /// Sends `name(args)` to this actor and returns the pending result.
    ///
    /// Never blocks. Fails only when the call cannot be created: outside of an
    /// actor thread or with an empty name.
    pub fn call(&self, name: impl Into<String>, args: Vec<Value>) -> Result<Future, CallError> {
        self.call_delayed(name, args, Duration::ZERO)
    }

    /// Like [`call`](Self::call) but runs no earlier than `delay` from now.
    ///
    /// Remote targets ignore the delay.
    pub fn call_delayed(
        &self,
        name: impl Into<String>,
        args: Vec<Value>,
        delay: Duration,
    ) -> Result<Future, CallError> {
        let call = Call::new(self.clone(), name, args)?;
        Ok(self.submit(call, delay))
    }

    pub(crate) fn submit(&self, call: Call, delay: Duration) -> Future {
        match self {
            Self::Local(local) => local.body.submit(call, delay),
            Self::Remote(remote) => {
                if !delay.is_zero() {
                    trace!(target_uri = %remote.uri, ?delay, "Delay ignored for remote call");
                }
                match remote.core.upgrade() {
                    Some(core) => core.call_remote(call, &remote.uri),
                    None => {
                        let future = call.future().clone();
                        let _ = future.resolve(Err(CallError::Transport(
                            "hosting agency has shut down".to_string(),
                        )));
                        future
                    }
                }
            }
        }
    }

    /// Runs a direct capability on the calling thread and returns its result.
    pub fn invoke_direct(&self, name: &str, args: &[Value]) -> CallResult {
        match self {
            Self::Local(local) => local.body.invoke_direct(name, args),
            Self::Remote(remote) => Err(CallError::InvalidCall(format!(
                "direct invocation of remote object {}",
                remote.uri
            ))),
        }
    }

    /// `true` when the local actor declares `name`. Remote handles cannot tell.
    pub fn has_capability(&self, name: &str) -> bool {
        match self {
            Self::Local(local) => local.body.has_capability(name),
            Self::Remote(_) => false,
        }
    }

    /// Asks the actor to stop after the tasks already due.
    pub fn stop(&self) {
        match self {
            Self::Local(local) => local.body.stop(),
            Self::Remote(remote) => warn!(target_uri = %remote.uri, "Remote actors cannot be stopped"),
        }
    }

    /// Waits until the actor thread has exited. Remote handles return `false`.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        match self {
            Self::Local(local) => local.body.wait_stopped(timeout),
            Self::Remote(_) => false,
        }
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(local) => f
                .debug_tuple("Local")
                .field(&format_args!("{}/{}", local.body.kind(), local.body.id()))
                .finish(),
            Self::Remote(remote) => f
                .debug_tuple("Remote")
                .field(&format_args!("{}", remote.uri))
                .finish(),
        }
    }
}
