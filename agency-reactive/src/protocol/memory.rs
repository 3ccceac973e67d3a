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

//! In-process transport.
//!
//! A [`MemoryNetwork`] maps `(host, port)` endpoints to channels. Each bound
//! [`MemoryProtocol`] drains its channel on a dedicated thread and hands every
//! frame to its agency's dispatcher. Frames go through the same encoding as any
//! other transport, so two agencies sharing a network behave like two processes.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, trace};

use crate::protocol::{CodingMethod, Dispatcher, Protocol, ProtocolError, Request, Transmitter};
use crate::remote::RemotePort;
use crate::traits::{Identifiable, IdentifiableType};

/// Scheme announced by memory protocols.
pub const MEMORY_SCHEME: &str = "mem";

type Endpoint = (String, u16);

/// Shared switchboard connecting memory protocols.
#[derive(Default)]
pub struct MemoryNetwork {
    endpoints: DashMap<Endpoint, UnboundedSender<Vec<u8>>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn bind(&self, host: &str, port: u16, sender: UnboundedSender<Vec<u8>>) -> Result<(), ProtocolError> {
        match self.endpoints.entry((host.to_string(), port)) {
            Entry::Occupied(_) => Err(ProtocolError::AddressInUse(format!("{host}:{port}"))),
            Entry::Vacant(slot) => {
                slot.insert(sender);
                Ok(())
            }
        }
    }

    fn unbind(&self, host: &str, port: u16) {
        self.endpoints.remove(&(host.to_string(), port));
    }

    /// Queues `frame` for the protocol bound at `host:port`.
    pub fn deliver(&self, host: &str, port: u16, frame: Vec<u8>) -> Result<(), ProtocolError> {
        let sender = self
            .endpoints
            .get(&(host.to_string(), port))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ProtocolError::Unreachable(format!("{host}:{port}")))?;
        sender
            .send(frame)
            .map_err(|_| ProtocolError::Unreachable(format!("{host}:{port}")))
    }

    pub fn is_bound(&self, host: &str, port: u16) -> bool {
        self.endpoints.contains_key(&(host.to_string(), port))
    }
}

/// A protocol bound to one endpoint of a [`MemoryNetwork`].
pub struct MemoryProtocol {
    id: String,
    host: String,
    port: u16,
    coding: CodingMethod,
    network: Arc<MemoryNetwork>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryProtocol {
    pub fn new(network: Arc<MemoryNetwork>, host: impl Into<String>, port: u16) -> Arc<Self> {
        Self::with_coding(network, host, port, CodingMethod::default())
    }

    pub fn with_coding(
        network: Arc<MemoryNetwork>,
        host: impl Into<String>,
        port: u16,
        coding: CodingMethod,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: port.to_string(),
            host: host.into(),
            port,
            coding,
            network,
            worker: Mutex::new(None),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Identifiable for MemoryProtocol {
    fn id(&self) -> &str {
        &self.id
    }

    fn identifiable_type(&self) -> IdentifiableType {
        IdentifiableType::Protocol
    }
}

impl Protocol for MemoryProtocol {
    fn scheme(&self) -> &str {
        MEMORY_SCHEME
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn start(&self, dispatcher: Dispatcher) -> Result<(), ProtocolError> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<u8>>();
        self.network.bind(&self.host, self.port, sender)?;

        let spawned = thread::Builder::new()
            .name(format!("mem-{}", self.port))
            .spawn(move || {
                while let Some(frame) = receiver.blocking_recv() {
                    trace!(len = frame.len(), "Frame received");
                    dispatcher.handle_bytes(&frame);
                }
            });
        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                debug!(host = %self.host, port = self.port, "Memory protocol listening");
                Ok(())
            }
            Err(e) => {
                self.network.unbind(&self.host, self.port);
                Err(e.into())
            }
        }
    }

    fn stop(&self) {
        self.network.unbind(&self.host, self.port);
        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
            debug!(host = %self.host, port = self.port, "Memory protocol stopped");
        }
    }

    fn as_transmitter(&self) -> Option<&dyn Transmitter> {
        Some(self)
    }
}

impl Transmitter for MemoryProtocol {
    fn preferred_coding(&self) -> CodingMethod {
        self.coding
    }

    fn send_request(&self, request: &Request, destination: &RemotePort) -> Result<(), ProtocolError> {
        let agency = destination
            .agency()
            .ok_or_else(|| ProtocolError::Unreachable(format!("port {}", destination.port())))?;
        let frame = request.to_bytes(self.coding)?;
        trace!(to = %agency.id(), port = destination.port(), len = frame.len(), "Sending frame");
        self.network.deliver(agency.host().name(), destination.port(), frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;

    #[test]
    fn test_endpoints_are_exclusive() {
        let network = MemoryNetwork::new();
        let first = MemoryProtocol::new(network.clone(), "127.0.0.1", 7001);
        let second = MemoryProtocol::new(network.clone(), "127.0.0.1", 7001);

        first.start(Dispatcher::new(Weak::new())).unwrap();
        assert!(matches!(
            second.start(Dispatcher::new(Weak::new())),
            Err(ProtocolError::AddressInUse(_))
        ));

        first.stop();
        assert!(!network.is_bound("127.0.0.1", 7001));
        second.start(Dispatcher::new(Weak::new())).unwrap();
        second.stop();
    }

    #[test]
    fn test_deliver_to_nobody_is_unreachable() {
        let network = MemoryNetwork::new();
        assert!(matches!(
            network.deliver("127.0.0.1", 9, vec![1, 2, 3]),
            Err(ProtocolError::Unreachable(_))
        ));
    }
}
