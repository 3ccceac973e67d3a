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

use crate::actor::CapabilityTableBuilder;

/// State type hosted by a body thread.
///
/// Implementors declare their capabilities once per type; the resulting table
/// is shared by every instance. `#[callables]` generates a `declare_callables`
/// function that can be forwarded to from [`declare`](Self::declare).
pub trait Actor: Send + Sync + 'static {
    /// Declares the capabilities of this actor type, most specific first.
    fn declare(builder: &mut CapabilityTableBuilder<Self>)
    where
        Self: Sized;

    /// Returns the periodic behavior of this actor, if it has one.
    fn as_step(&mut self) -> Option<&mut dyn StepActor> {
        None
    }

    /// Runs on the body thread before the first task.
    fn on_start(&mut self) {}

    /// Runs on the body thread after the last task.
    fn on_stop(&mut self) {}
}

/// An actor that performs a step every `step_delay`.
///
/// The delay is read again after each step, so a change made during a step
/// applies from the next cycle.
pub trait StepActor {
    fn step_delay(&self) -> Duration;

    fn step(&mut self);
}
