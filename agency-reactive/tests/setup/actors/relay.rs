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

use std::time::Duration;

use agency_reactive::prelude::*;

/// Forwards calls to another actor from its own thread.
#[agency_actor]
pub struct Relay {
    pub target: ActorRef,
}

#[callables]
impl Relay {
    /// Calls `name` on the target and waits for the answer.
    #[callable("forward")]
    fn forward(&mut self, name: String) -> CallResult {
        self.target.call(name, vec![])?.get_timeout(Duration::from_secs(5))
    }

    /// Id of the actor a call created inside this routine is attributed to.
    #[callable("caller_of_outgoing")]
    fn caller_of_outgoing(&mut self) -> CallResult {
        let call = Call::new(self.target.clone(), "ping", vec![])?;
        Ok(call.source().id().into())
    }

    #[callable("current")]
    #[direct]
    fn current(&self) -> Option<String> {
        current_actor().map(|actor| actor.id().to_string())
    }
}

impl Actor for Relay {
    fn declare(builder: &mut CapabilityTableBuilder<Self>) {
        Self::declare_callables(builder);
    }
}
