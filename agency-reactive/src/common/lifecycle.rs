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
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Lifecycle state of an agency. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgencyState {
    Booting,
    Initialized,
    Running,
    ShuttingDown,
    Terminated,
}

/// Lifecycle state of an actor body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BodyState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// A state value that threads can wait on until it reaches a target.
///
/// Waiting uses a condition variable with a bounded re-check interval, so a
/// missed notification delays a waiter by at most `recheck`.
pub struct StateGate<S> {
    state: Mutex<S>,
    changed: Condvar,
    recheck: Duration,
}

impl<S: Copy + Ord + fmt::Debug> StateGate<S> {
    pub fn new(initial: S, recheck: Duration) -> Self {
        Self {
            state: Mutex::new(initial),
            changed: Condvar::new(),
            recheck,
        }
    }

    pub fn get(&self) -> S {
        *self.state.lock()
    }

    /// Moves to `next` and wakes every waiter. Returns the previous state.
    pub fn set(&self, next: S) -> S {
        let previous = std::mem::replace(&mut *self.state.lock(), next);
        self.changed.notify_all();
        previous
    }

    /// Moves to `next` only if the gate is currently below it.
    pub fn advance(&self, next: S) -> bool {
        let mut state = self.state.lock();
        if *state >= next {
            return false;
        }
        *state = next;
        drop(state);
        self.changed.notify_all();
        true
    }

    /// Blocks until the state reaches `target` or a later state.
    pub fn wait_for(&self, target: S) -> S {
        let mut state = self.state.lock();
        while *state < target {
            self.changed.wait_for(&mut state, self.recheck);
        }
        *state
    }

    /// Like [`wait_for`](Self::wait_for) but gives up after `timeout`.
    pub fn wait_for_timeout(&self, target: S, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state < target {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let slice = self.recheck.min(deadline - now);
            self.changed.wait_for(&mut state, slice);
        }
        true
    }
}

impl<S: fmt::Debug> fmt::Debug for StateGate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateGate")
            .field("state", &*self.state.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_for_wakes_on_set() {
        let gate = Arc::new(StateGate::new(AgencyState::Booting, Duration::from_secs(1)));
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait_for(AgencyState::Running))
        };
        thread::sleep(Duration::from_millis(10));
        gate.set(AgencyState::Initialized);
        gate.set(AgencyState::Running);
        assert_eq!(waiter.join().unwrap(), AgencyState::Running);
    }

    #[test]
    fn test_later_state_satisfies_earlier_target() {
        let gate = StateGate::new(AgencyState::Terminated, Duration::from_millis(5));
        assert_eq!(gate.wait_for(AgencyState::Running), AgencyState::Terminated);
    }

    #[test]
    fn test_wait_for_timeout() {
        let gate = StateGate::new(BodyState::Starting, Duration::from_millis(5));
        assert!(!gate.wait_for_timeout(BodyState::Stopped, Duration::from_millis(20)));
        assert!(gate.advance(BodyState::Stopped));
        assert!(!gate.advance(BodyState::Running));
        assert!(gate.wait_for_timeout(BodyState::Stopped, Duration::from_millis(20)));
    }
}
