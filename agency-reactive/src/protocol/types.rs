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

//! Requests exchanged between agencies and their framing.
//!
//! # Wire Format
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ Protocol Version (1 byte, currently 0x01)                     │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Request Kind (1 byte)                                         │
//! │   0x01 = Call                                                 │
//! │   0x02 = Future                                               │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Coding (1 byte)                                               │
//! │   0x01 = JSON                                                 │
//! │   0x02 = MessagePack                                          │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Envelope (remaining bytes, coded as above)                    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! A whole request never exceeds [`REQUEST_MAX_SIZE`] bytes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::Value;
use crate::protocol::{CodingError, CodingMethod, FutureRequest};

/// Largest request a protocol accepts, header included.
pub const REQUEST_MAX_SIZE: usize = 1_024_000;

/// Protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Request kind: call to a remote object.
pub const KIND_CALL: u8 = 0x01;

/// Request kind: result of an earlier call.
pub const KIND_FUTURE: u8 = 0x02;

/// Header size: version, kind and coding bytes.
pub const HEADER_SIZE: usize = 3;

/// A call addressed to an object hosted by another agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Id of the caller's pending future; the result is relayed back under it.
    pub future_id: String,
    /// URI of the calling agency.
    pub source: String,
    /// URI of the target object.
    pub target: String,
    pub name: String,
    pub coding: CodingMethod,
    /// Positional arguments, coded with `coding`.
    pub args: Vec<u8>,
}

impl CallRequest {
    pub fn new(
        future_id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        name: impl Into<String>,
        args: &[Value],
        coding: CodingMethod,
    ) -> Result<Self, CodingError> {
        Ok(Self {
            future_id: future_id.into(),
            source: source.into(),
            target: target.into(),
            name: name.into(),
            coding,
            args: coding.encode(args)?,
        })
    }

    pub fn decoded_args(&self) -> Result<Vec<Value>, CodingError> {
        self.coding.decode(&self.args)
    }
}

/// Anything a protocol can carry between agencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Call(CallRequest),
    Future(FutureRequest),
}

impl Request {
    /// URI of the object this request is addressed to.
    pub fn target(&self) -> &str {
        match self {
            Self::Call(call) => &call.target,
            Self::Future(future) => future.target(),
        }
    }

    const fn kind_byte(&self) -> u8 {
        match self {
            Self::Call(_) => KIND_CALL,
            Self::Future(_) => KIND_FUTURE,
        }
    }

    /// Frames this request with its envelope coded as `coding`.
    pub fn to_bytes(&self, coding: CodingMethod) -> Result<Vec<u8>, ProtocolError> {
        let envelope = match self {
            Self::Call(call) => coding.encode(call)?,
            Self::Future(future) => coding.encode(future)?,
        };
        let mut frame = Vec::with_capacity(HEADER_SIZE + envelope.len());
        frame.push(PROTOCOL_VERSION);
        frame.push(self.kind_byte());
        frame.push(coding.to_byte());
        frame.extend_from_slice(&envelope);
        if frame.len() > REQUEST_MAX_SIZE {
            return Err(ProtocolError::MalformedRequest(format!(
                "request of {} bytes exceeds the {REQUEST_MAX_SIZE} byte limit",
                frame.len()
            )));
        }
        Ok(frame)
    }
}

/// Parses a framed request received by a protocol.
pub fn read_request(buffer: &[u8]) -> Result<Request, ProtocolError> {
    if buffer.len() > REQUEST_MAX_SIZE {
        return Err(ProtocolError::MalformedRequest(format!(
            "request of {} bytes exceeds the {REQUEST_MAX_SIZE} byte limit",
            buffer.len()
        )));
    }
    let [version, kind, coding, envelope @ ..] = buffer else {
        return Err(ProtocolError::MalformedRequest(format!(
            "truncated header ({} bytes)",
            buffer.len()
        )));
    };
    if *version != PROTOCOL_VERSION {
        return Err(ProtocolError::MalformedRequest(format!(
            "unsupported protocol version: {version}, expected {PROTOCOL_VERSION}"
        )));
    }
    let coding = CodingMethod::from_byte(*coding).ok_or_else(|| {
        ProtocolError::MalformedRequest(format!("unsupported coding method: {coding:#04x}"))
    })?;

    let request = match *kind {
        KIND_CALL => Request::Call(
            coding
                .decode(envelope)
                .map_err(|e| ProtocolError::MalformedRequest(e.to_string()))?,
        ),
        KIND_FUTURE => Request::Future(
            coding
                .decode(envelope)
                .map_err(|e| ProtocolError::MalformedRequest(e.to_string()))?,
        ),
        other => {
            return Err(ProtocolError::MalformedRequest(format!(
                "unknown request kind: {other:#04x}"
            )))
        }
    };
    Ok(request)
}

/// Errors raised by protocols and the framing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The bytes do not form a valid request.
    MalformedRequest(String),
    /// Another protocol is already bound to this endpoint.
    AddressInUse(String),
    /// Nothing is listening at the destination.
    Unreachable(String),
    /// The protocol could not start or stop its worker.
    Io(String),
    Coding(CodingError),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRequest(reason) => write!(f, "Malformed request: {reason}"),
            Self::AddressInUse(address) => write!(f, "Address in use: {address}"),
            Self::Unreachable(address) => write!(f, "Unreachable: {address}"),
            Self::Io(reason) => write!(f, "I/O error: {reason}"),
            Self::Coding(err) => write!(f, "Coding error: {err}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<CodingError> for ProtocolError {
    fn from(err: CodingError) -> Self {
        Self::Coding(err)
    }
}
