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

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use agency_reactive::prelude::*;

/// Actor that reads another actor's state directly from inside its own routines.
#[agency_actor]
pub struct Peer {
    pub other: Arc<OnceLock<ActorRef>>,
    pub value: u64,
}

impl Peer {
    pub fn new(value: u64, other: Arc<OnceLock<ActorRef>>) -> Self {
        Self { other, value }
    }
}

#[callables]
impl Peer {
    #[callable("peek")]
    #[direct]
    fn peek(&self) -> u64 {
        self.value
    }

    /// Holds its own state for `millis`, then reads the other peer directly.
    #[callable("poke")]
    fn poke(&mut self, millis: u64) -> CallResult {
        thread::sleep(Duration::from_millis(millis));
        let other = self
            .other
            .get()
            .ok_or_else(|| CallError::failed("peer not linked"))?;
        other.invoke_direct("peek", &[])
    }

    /// Reads its own state through its own handle.
    #[callable("poke_self")]
    fn poke_self(&mut self) -> CallResult {
        let me = current_actor().ok_or(CallError::NoCurrentActor)?;
        me.invoke_direct("peek", &[])
    }
}

impl Actor for Peer {
    fn declare(builder: &mut CapabilityTableBuilder<Self>) {
        Self::declare_callables(builder);
    }
}
