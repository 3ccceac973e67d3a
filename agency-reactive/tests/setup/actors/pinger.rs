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

use agency_reactive::prelude::*;

/// Answers `ping` with `"pong"` and counts how often it was asked.
#[agency_actor]
#[derive(Default)]
pub struct Pinger {
    /// Number of pings answered.
    pub pings: u64,
}

#[callables]
impl Pinger {
    #[callable("ping")]
    fn ping(&mut self) -> String {
        self.pings += 1;
        "pong".to_string()
    }

    #[callable("pings")]
    #[direct]
    fn pings(&self) -> u64 {
        self.pings
    }

    /// Only callable from inside the agency.
    #[callable("reset")]
    #[local]
    fn reset(&mut self, to: u64) {
        self.pings = to;
    }

    #[callable("echo")]
    fn echo(&mut self, text: String, times: usize) -> Vec<String> {
        vec![text; times]
    }
}

impl Actor for Pinger {
    fn declare(builder: &mut CapabilityTableBuilder<Self>) {
        Self::declare_callables(builder);
    }
}
