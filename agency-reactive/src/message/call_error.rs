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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error carried by a resolved [`Future`](crate::actor::Future).
///
/// Every failure a caller can observe through a call travels as one of these
/// variants, including failures that happened on another agency. The type is
/// serializable so it can cross a transport inside a
/// [`FutureRequest`](crate::protocol::FutureRequest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallError {
    /// The call was created on a thread that is not running an actor.
    NoCurrentActor,

    /// The call itself is malformed (for example an empty capability name).
    InvalidCall(String),

    /// The target actor's capability table has no entry with this name.
    UnknownCapability(String),

    /// The capability is flagged `local` and the call came from a remote agency.
    LocalOnly(String),

    /// The positional arguments could not be decoded into the routine's parameters.
    BadArguments(String),

    /// The routine ran and reported a failure.
    Failed(String),

    /// The routine panicked; the payload message is kept when available.
    Panicked(String),

    /// The target actor has stopped or is stopping.
    ActorStopped(String),

    /// The target (actor, agency or port) could not be resolved.
    NotFound(String),

    /// The target's state stayed held by a running routine past the direct-call timeout.
    Busy(String),

    /// No result arrived within the allowed time.
    Timeout,

    /// The transport could not carry the call or its result.
    Transport(String),
}

impl CallError {
    /// Convenience constructor for routine failures.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCurrentActor => write!(f, "Call created outside of any actor thread"),
            Self::InvalidCall(reason) => write!(f, "Invalid call: {reason}"),
            Self::UnknownCapability(name) => write!(f, "Unknown capability: {name}"),
            Self::LocalOnly(name) => write!(f, "Capability {name} cannot be invoked remotely"),
            Self::BadArguments(reason) => write!(f, "Bad arguments: {reason}"),
            Self::Failed(reason) => write!(f, "Call failed: {reason}"),
            Self::Panicked(reason) => write!(f, "Routine panicked: {reason}"),
            Self::ActorStopped(id) => write!(f, "Actor stopped: {id}"),
            Self::NotFound(what) => write!(f, "Not found: {what}"),
            Self::Busy(id) => write!(f, "Actor busy: {id}"),
            Self::Timeout => write!(f, "Call timeout"),
            Self::Transport(reason) => write!(f, "Transport error: {reason}"),
        }
    }
}

impl std::error::Error for CallError {}
