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

pub use agency::Agency;
pub use agency_core::AgencyCore;
pub use config::{
    AgencyConfig, DefaultsConfig, RemoteConfig, SchedulingConfig, TimeoutConfig,
    CONFIG,
};
pub use errors::AddressingError;
pub use fault::{set_fault_handler, FaultHandler, LogFaultHandler};
pub use feature::Feature;
pub use lifecycle::{AgencyState, BodyState, StateGate};
pub use registry::{IdentifiableRegistry, RegistrationStatus};

pub(crate) use fault::{panic_message, report_fault};

mod agency;
mod agency_core;
mod config;
mod errors;
mod fault;
mod feature;
mod lifecycle;
mod registry;
