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

use serde::{Deserialize, Serialize};

use crate::actor::ActorRef;

/// Kind of an addressable object. Ids are unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdentifiableType {
    Agency,
    Feature,
    Protocol,
    Actor,
}

impl IdentifiableType {
    pub const ALL: [Self; 4] = [Self::Agency, Self::Feature, Self::Protocol, Self::Actor];

    /// Path segment naming this kind in an object URI.
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Agency => "agencies",
            Self::Feature => "features",
            Self::Protocol => "protocols",
            Self::Actor => "actors",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.path_segment() == segment)
    }
}

impl fmt::Display for IdentifiableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// An object with a `(type, id)` identity that can live in the registry.
pub trait Identifiable: Send + Sync + 'static {
    fn id(&self) -> &str;

    fn identifiable_type(&self) -> IdentifiableType;

    /// Returns a handle for calling this object, when it is an actor.
    fn as_actor(self: std::sync::Arc<Self>) -> Option<ActorRef> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        for kind in IdentifiableType::ALL {
            assert_eq!(
                IdentifiableType::from_path_segment(kind.path_segment()),
                Some(kind)
            );
        }
        assert_eq!(IdentifiableType::from_path_segment("widgets"), None);
        assert_eq!(IdentifiableType::Actor.to_string(), "actors");
    }
}
