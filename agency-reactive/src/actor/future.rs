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
use std::sync::Arc;
use std::time::{Duration, Instant};

use mti::prelude::*;
use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::message::{CallError, CallResult};

type Listener = Box<dyn FnOnce(&CallResult) + Send>;

/// Error returned by [`Future::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FutureError {
    /// The future already holds a result; the first result is kept.
    AlreadyResolved(String),
}

impl fmt::Display for FutureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyResolved(id) => write!(f, "Future {id} is already resolved"),
        }
    }
}

impl std::error::Error for FutureError {}

#[derive(Default)]
struct FutureState {
    result: Option<CallResult>,
    listeners: Vec<Listener>,
}

struct FutureInner {
    id: String,
    state: Mutex<FutureState>,
    resolved: Condvar,
}

/// Single-assignment result cell shared by a call and everyone waiting on it.
///
/// Cloning a `Future` yields another handle to the same cell. Any number of
/// threads may block in [`get`](Self::get); all of them observe the same result.
#[derive(Clone)]
pub struct Future {
    inner: Arc<FutureInner>,
}

impl Future {
    pub(crate) fn new() -> Self {
        Self::with_id("future".create_type_id::<V7>().to_string())
    }

    pub(crate) fn with_id(id: String) -> Self {
        Self {
            inner: Arc::new(FutureInner {
                id,
                state: Mutex::new(FutureState::default()),
                resolved: Condvar::new(),
            }),
        }
    }

    /// Creates a future that is already resolved with `result`.
    pub fn resolved(result: CallResult) -> Self {
        let future = Self::new();
        let mut state = future.inner.state.lock();
        state.result = Some(result);
        drop(state);
        future
    }

    /// Unique identifier used to correlate remote results with this future.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Stores `result` and wakes every waiter.
    ///
    /// Only the first resolution counts. Later attempts return
    /// [`FutureError::AlreadyResolved`] and leave the stored result untouched.
    pub fn resolve(&self, result: CallResult) -> Result<(), FutureError> {
        let listeners = {
            let mut state = self.inner.state.lock();
            if state.result.is_some() {
                return Err(FutureError::AlreadyResolved(self.inner.id.clone()));
            }
            state.result = Some(result.clone());
            std::mem::take(&mut state.listeners)
        };
        self.inner.resolved.notify_all();
        trace!(future_id = %self.inner.id, ok = result.is_ok(), "Future resolved");

        for listener in listeners {
            listener(&result);
        }
        Ok(())
    }

    /// Blocks until the future is resolved and returns its result.
    pub fn get(&self) -> CallResult {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(result) = &state.result {
                return result.clone();
            }
            self.inner.resolved.wait(&mut state);
        }
    }

    /// Like [`get`](Self::get) but gives up after `timeout` with [`CallError::Timeout`].
    ///
    /// Timing out does not resolve the future.
    pub fn get_timeout(&self, timeout: Duration) -> CallResult {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if let Some(result) = &state.result {
                return result.clone();
            }
            if self
                .inner
                .resolved
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.result.clone().unwrap_or(Err(CallError::Timeout));
            }
        }
    }

    /// Blocks for the result and deserializes it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self) -> Result<T, CallError> {
        let value = self.get()?;
        serde_json::from_value(value).map_err(|e| CallError::BadArguments(e.to_string()))
    }

    /// Returns the result if the future is resolved, without blocking.
    pub fn try_get(&self) -> Option<CallResult> {
        self.inner.state.lock().result.clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.state.lock().result.is_some()
    }

    /// Registers `listener` to run once with the result.
    ///
    /// If the future is already resolved the listener runs immediately on the
    /// calling thread; otherwise it runs on the thread that resolves the future.
    pub fn on_resolve<F>(&self, listener: F)
    where
        F: FnOnce(&CallResult) + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        match state.result.clone() {
            Some(result) => {
                drop(state);
                listener(&result);
            }
            None => state.listeners.push(Box::new(listener)),
        }
    }
}

impl fmt::Debug for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("id", &self.inner.id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
