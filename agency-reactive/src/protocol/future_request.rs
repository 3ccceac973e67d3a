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

use crate::message::CallResult;
use crate::protocol::{CodingError, CodingMethod, Transmitter};
use crate::remote::RemotePort;

/// Envelope carrying a resolved future's result back to the agency that made
/// the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureRequest {
    future_id: String,
    coding: CodingMethod,
    value: Vec<u8>,
    target: String,
}

impl FutureRequest {
    /// Encodes `result` with the transmitter's preferred coding, addressed to the
    /// agency owning `port`.
    pub fn encode(
        future_id: impl Into<String>,
        result: &CallResult,
        transmitter: &dyn Transmitter,
        port: &RemotePort,
    ) -> Result<Self, CodingError> {
        let coding = transmitter.preferred_coding();
        let target = port
            .agency_uri()
            .ok_or_else(|| CodingError::Encode("remote agency is gone".to_string()))?
            .to_string();
        Ok(Self {
            future_id: future_id.into(),
            coding,
            value: coding.encode(result)?,
            target,
        })
    }

    /// Rebuilds an envelope from fields read off the wire.
    pub fn from_wire(
        future_id: impl Into<String>,
        coding: CodingMethod,
        value: Vec<u8>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            future_id: future_id.into(),
            coding,
            value,
            target: target.into(),
        }
    }

    pub fn decoded_value(&self) -> Result<CallResult, CodingError> {
        self.coding.decode(&self.value)
    }

    pub fn future_id(&self) -> &str {
        &self.future_id
    }

    pub fn coding(&self) -> CodingMethod {
        self.coding
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}
