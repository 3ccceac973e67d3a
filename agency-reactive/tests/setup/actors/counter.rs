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
use std::thread;
use std::time::Duration;

use agency_reactive::prelude::*;

/// Tracks how many queued routines overlap, to observe serial execution.
#[derive(Debug, Default)]
pub struct Overlap {
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

/// Keeps a running total and a log of tagged calls in execution order.
#[agency_actor]
#[derive(Default)]
pub struct Counter {
    pub total: i64,
    pub log: Vec<String>,
    pub overlap: Arc<Overlap>,
}

impl Counter {
    pub fn with_overlap(overlap: Arc<Overlap>) -> Self {
        Self {
            overlap,
            ..Self::default()
        }
    }
}

#[callables]
impl Counter {
    #[callable("add")]
    fn add(&mut self, amount: i64) -> i64 {
        self.total += amount;
        self.total
    }

    #[callable("total")]
    #[direct]
    fn total(&self) -> i64 {
        self.total
    }

    #[callable("record")]
    fn record(&mut self, tag: String) {
        self.log.push(tag);
    }

    #[callable("log")]
    #[direct]
    fn log(&self) -> Vec<String> {
        self.log.clone()
    }

    /// Sleeps while holding the actor, recording the peak number of overlapping runs.
    #[callable("slow_add")]
    fn slow_add(&mut self, amount: i64, millis: u64) -> i64 {
        let now = self.overlap.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.overlap.max_in_flight.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(millis));
        self.total += amount;
        self.overlap.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.total
    }

    #[callable("checked_div")]
    fn checked_div(&mut self, divisor: i64) -> CallResult {
        if divisor == 0 {
            return Err(CallError::failed("division by zero"));
        }
        self.total /= divisor;
        Ok(self.total.into())
    }

    #[callable("boom")]
    fn boom(&mut self) {
        panic!("counter exploded");
    }
}

impl Actor for Counter {
    fn declare(builder: &mut CapabilityTableBuilder<Self>) {
        Self::declare_callables(builder);
        builder.callable("double", |counter: &mut Counter, (): ()| {
            counter.total *= 2;
            counter.total
        });
    }
}
