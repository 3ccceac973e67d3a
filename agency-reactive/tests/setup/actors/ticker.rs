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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use agency_reactive::prelude::*;

/// Step actor counting its steps; the delay can be changed through a call.
#[agency_actor]
pub struct Ticker {
    pub delay: Duration,
    pub ticks: Arc<AtomicUsize>,
    pub stamps: Vec<Instant>,
}

impl Ticker {
    pub fn new(delay: Duration, ticks: Arc<AtomicUsize>) -> Self {
        Self {
            delay,
            ticks,
            stamps: Vec::new(),
        }
    }
}

#[callables]
impl Ticker {
    #[callable("set_delay")]
    fn set_delay(&mut self, millis: u64) {
        self.delay = Duration::from_millis(millis);
    }

    #[callable("ticks")]
    #[direct]
    fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl Actor for Ticker {
    fn declare(builder: &mut CapabilityTableBuilder<Self>) {
        Self::declare_callables(builder);
    }

    fn as_step(&mut self) -> Option<&mut dyn StepActor> {
        Some(self)
    }
}

impl StepActor for Ticker {
    fn step_delay(&self) -> Duration {
        self.delay
    }

    fn step(&mut self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        self.stamps.push(Instant::now());
    }
}
