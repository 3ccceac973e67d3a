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

use crate::common::RegistrationStatus;
use crate::message::CallError;

/// Failure to resolve or register an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressingError {
    /// No local object is registered under the requested address.
    TargetNotFound(String),
    /// The address names an agency this agency does not know.
    AgencyNotFound(String),
    /// The address could not be parsed.
    InvalidUri(String),
    /// The registry did not accept an object.
    Registration {
        id: String,
        status: RegistrationStatus,
    },
    /// The agency is shutting down or already terminated.
    AgencyStopped,
}

impl fmt::Display for AddressingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetNotFound(target) => write!(f, "Target not found: {target}"),
            Self::AgencyNotFound(agency) => write!(f, "Unknown agency: {agency}"),
            Self::InvalidUri(reason) => write!(f, "Invalid URI: {reason}"),
            Self::Registration { id, status } => {
                write!(f, "Registration of {id} failed: {status:?}")
            }
            Self::AgencyStopped => write!(f, "Agency is not running"),
        }
    }
}

impl std::error::Error for AddressingError {}

impl From<AddressingError> for CallError {
    fn from(err: AddressingError) -> Self {
        match err {
            AddressingError::TargetNotFound(target) => Self::NotFound(target),
            AddressingError::AgencyNotFound(agency) => Self::NotFound(agency),
            other => Self::InvalidCall(other.to_string()),
        }
    }
}
