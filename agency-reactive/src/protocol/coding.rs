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

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Coding applied to values crossing a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodingMethod {
    /// JSON (UTF-8, human-readable).
    #[default]
    Json,
    /// `MessagePack` (binary, compact).
    #[cfg(feature = "messagepack")]
    MessagePack,
}

impl CodingMethod {
    /// Coding byte for JSON.
    pub const JSON_BYTE: u8 = 0x01;
    /// Coding byte for `MessagePack`.
    pub const MESSAGEPACK_BYTE: u8 = 0x02;

    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Json => Self::JSON_BYTE,
            #[cfg(feature = "messagepack")]
            Self::MessagePack => Self::MESSAGEPACK_BYTE,
        }
    }

    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::JSON_BYTE => Some(Self::Json),
            #[cfg(feature = "messagepack")]
            Self::MESSAGEPACK_BYTE => Some(Self::MessagePack),
            _ => None,
        }
    }

    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, CodingError> {
        match self {
            Self::Json => serde_json::to_vec(value).map_err(|e| CodingError::Encode(e.to_string())),
            #[cfg(feature = "messagepack")]
            Self::MessagePack => rmp_serde::to_vec(value)
                .map_err(|e| CodingError::Encode(format!("MessagePack: {e}"))),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodingError> {
        match self {
            Self::Json => {
                serde_json::from_slice(bytes).map_err(|e| CodingError::Decode(e.to_string()))
            }
            #[cfg(feature = "messagepack")]
            Self::MessagePack => rmp_serde::from_slice(bytes)
                .map_err(|e| CodingError::Decode(format!("MessagePack: {e}"))),
        }
    }
}

/// Failure to encode or decode a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodingError {
    Encode(String),
    Decode(String),
    /// The coding byte names a method this build does not support.
    Unsupported(u8),
}

impl fmt::Display for CodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(reason) => write!(f, "Encoding failed: {reason}"),
            Self::Decode(reason) => write!(f, "Decoding failed: {reason}"),
            Self::Unsupported(byte) => write!(f, "Unsupported coding method: {byte:#04x}"),
        }
    }
}

impl std::error::Error for CodingError {}
