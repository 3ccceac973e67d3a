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

//! Transport boundary.
//!
//! A [`Protocol`] owns an endpoint (`scheme` plus `port`). Inbound bytes are
//! handed to a [`Dispatcher`], which decodes them and routes the request into
//! the agency exactly as a local call would be. A protocol that can also send
//! requests exposes itself as a [`Transmitter`].

use std::sync::{Arc, Weak};

use tracing::{instrument, warn};

use crate::common::{AddressingError, AgencyCore};
use crate::remote::RemotePort;
use crate::traits::Identifiable;

pub use announcement::{parse_port_tokens, Announcement, PortEntry};
pub use coding::{CodingError, CodingMethod};
pub use future_request::FutureRequest;
pub use memory::{MemoryNetwork, MemoryProtocol};
pub use types::{
    read_request, CallRequest, ProtocolError, Request, HEADER_SIZE, KIND_CALL, KIND_FUTURE,
    PROTOCOL_VERSION, REQUEST_MAX_SIZE,
};
pub use uri::ObjectUri;

pub(crate) use uri::bracket_host;

mod announcement;
mod coding;
mod future_request;
mod memory;
mod types;
mod uri;

/// A transport endpoint registered with an agency.
///
/// Protocols register under [`IdentifiableType::Protocol`](crate::traits::IdentifiableType::Protocol)
/// with their port number as id.
pub trait Protocol: Identifiable {
    fn scheme(&self) -> &str;

    fn port(&self) -> u16;

    /// Begins accepting requests, handing each one to `dispatcher`.
    fn start(&self, dispatcher: Dispatcher) -> Result<(), ProtocolError>;

    /// Stops accepting requests. Idempotent.
    fn stop(&self);

    /// The sending half of this protocol, if it has one.
    fn as_transmitter(&self) -> Option<&dyn Transmitter> {
        None
    }
}

/// A protocol able to send requests to remote ports.
pub trait Transmitter: Send + Sync {
    /// Coding used for values this transmitter sends.
    fn preferred_coding(&self) -> CodingMethod;

    /// Sends `request` to `destination` without waiting for any answer.
    fn send_request(&self, request: &Request, destination: &RemotePort) -> Result<(), ProtocolError>;
}

/// Entry point protocols use to hand inbound requests to their agency.
#[derive(Clone)]
pub struct Dispatcher {
    core: Weak<AgencyCore>,
}

impl Dispatcher {
    pub(crate) fn new(core: Weak<AgencyCore>) -> Self {
        Self { core }
    }

    /// Routes a decoded request to its local target.
    pub fn dispatch(&self, request: Request) -> Result<(), AddressingError> {
        let core: Arc<AgencyCore> = self.core.upgrade().ok_or(AddressingError::AgencyStopped)?;
        core.dispatch(request)
    }

    /// Decodes and dispatches raw bytes. Failures are logged and swallowed so
    /// that the calling protocol thread keeps running.
    #[instrument(skip_all, fields(len = buffer.len()))]
    pub fn handle_bytes(&self, buffer: &[u8]) {
        match read_request(buffer) {
            Ok(request) => {
                if let Err(e) = self.dispatch(request) {
                    warn!("Dispatch failed: {}", e);
                }
            }
            Err(e) => warn!("Dropping request: {}", e),
        }
    }
}
