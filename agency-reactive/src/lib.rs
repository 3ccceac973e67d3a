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

#![forbid(unsafe_code)]

//! # Agency Reactive
//!
//! A distributed actor runtime. Actors are addressable objects hosted by an
//! agency; each actor owns one OS thread that drains a time-ordered task queue.
//! Actors talk to each other through asynchronous calls that return a
//! [`Future`](prelude::Future), whether the target lives in the same agency or
//! in a peer reached over a pluggable transport.
//!
//! ## Key Concepts
//!
//! - **Agency (`Agency`)**: hosts actors, features and protocols, owns the
//!   registry of addressable objects and tracks peer agencies.
//! - **Actors (`Actor`, `StepActor`)**: user state declared once per type as a
//!   capability table; step actors also run periodically.
//! - **Handles (`ActorRef`)**: local or remote addresses accepting calls.
//! - **Calls & Futures**: a call names a capability and carries positional
//!   arguments; its future is resolved exactly once.
//! - **Remote agencies**: peers discovered through announcements, with the
//!   transport endpoints they export.
//! - **Protocols**: transports that turn bytes into dispatched requests and
//!   carry calls and results between agencies.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agency_reactive::prelude::*;
//!
//! #[agency_actor]
//! #[derive(Default)]
//! struct Pinger {
//!     pings: u64,
//! }
//!
//! #[callables]
//! impl Pinger {
//!     #[callable("ping")]
//!     fn ping(&mut self) -> String {
//!         self.pings += 1;
//!         "pong".to_string()
//!     }
//! }
//!
//! impl Actor for Pinger {
//!     fn declare(builder: &mut CapabilityTableBuilder<Self>) {
//!         Self::declare_callables(builder);
//!     }
//! }
//!
//! let agency = Agency::launch()?;
//! let pinger = agency.spawn("pinger", Pinger::default())?;
//! let reply = agency.call(&pinger, "ping", vec![])?.get()?;
//! assert_eq!(reply, "pong");
//! agency.shutdown();
//! ```

// Lets the macro-generated `::agency_reactive::` paths resolve inside this crate.
extern crate self as agency_reactive;

/// Agency, registry, configuration and lifecycle.
pub(crate) mod common;

/// Actor bodies, calls, futures and capability tables.
pub(crate) mod actor;

/// Call results and errors.
pub(crate) mod message;

/// Core traits implemented by actors and addressable objects.
pub(crate) mod traits;

/// Remote agencies and the ports they export.
pub mod remote;

/// Transport boundary: protocols, request framing and the in-process network.
pub mod protocol;

/// A prelude module for conveniently importing the most commonly used items.
///
/// # Re-exports
///
/// ## Macros (from `agency-macro`)
/// *   [`agency_macro::callables`]: Declares capabilities from an `impl` block.
/// *   [`agency_macro::agency_actor`]: Prepares an actor state type.
///
/// ## Core Types
/// *   [`crate::common::Agency`]: The process hosting actors.
/// *   [`crate::actor::ActorRef`]: Handle for calling an actor.
/// *   [`crate::actor::Future`]: Single-assignment call result.
/// *   [`crate::actor::CapabilityTable`]: Per-type capability dispatch table.
/// *   [`crate::common::IdentifiableRegistry`]: Registry of addressable objects.
/// *   [`crate::message::CallError`]: Error carried by a failed call.
pub mod prelude {
    pub use agency_macro::*;

    pub use crate::actor::{
        current_actor, decode_args, encode_return, expect_no_args, ActorRef, Call,
        CapabilityEntry, CapabilityTable, CapabilityTableBuilder, DirectFn, Future, FutureError,
        LocalActorRef, QueuedFn, RemoteActorRef,
    };
    pub use crate::common::{
        set_fault_handler, AddressingError, Agency, AgencyConfig, AgencyCore, AgencyState,
        BodyState, DefaultsConfig, FaultHandler, Feature, IdentifiableRegistry, LogFaultHandler,
        RegistrationStatus, RemoteConfig, SchedulingConfig, StateGate,
        TimeoutConfig, CONFIG,
    };
    pub use crate::message::{CallError, CallResult, Value};
    pub use crate::protocol::{
        Announcement, CodingMethod, Dispatcher, FutureRequest, MemoryNetwork, MemoryProtocol,
        ObjectUri, PortEntry, Protocol, ProtocolError, Request, Transmitter,
    };
    pub use crate::remote::{RemoteAgencies, RemoteAgency, RemoteHost, RemotePort, RemotePortError};
    pub use crate::traits::{Actor, Identifiable, IdentifiableType, StepActor};
}

#[doc(hidden)]
pub mod __private {
    pub use crate::actor::{decode_args, encode_return, expect_no_args, CapabilityTableBuilder};
    pub use crate::message::{CallResult, Value};
}
