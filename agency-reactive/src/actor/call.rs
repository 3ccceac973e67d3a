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

use crate::actor::{current_actor, ActorRef, Future};
use crate::message::{CallError, Value};

/// An asynchronous invocation request: a capability name and positional
/// arguments addressed from one actor to another.
///
/// A call is executed exactly once. Its [`Future`] is handed to the caller
/// as soon as the call is submitted.
#[derive(Debug)]
pub struct Call {
    source: ActorRef,
    target: ActorRef,
    name: String,
    args: Vec<Value>,
    future: Future,
}

impl Call {
    /// Creates a call attributed to the actor owning the current thread.
    ///
    /// Fails with [`CallError::NoCurrentActor`] outside of an actor thread and
    /// with [`CallError::InvalidCall`] when `name` is empty.
    pub fn new(target: ActorRef, name: impl Into<String>, args: Vec<Value>) -> Result<Self, CallError> {
        let source = current_actor().ok_or(CallError::NoCurrentActor)?;
        Self::with_source(source, target, name, args)
    }

    pub(crate) fn with_source(
        source: ActorRef,
        target: ActorRef,
        name: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<Self, CallError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CallError::InvalidCall("empty capability name".to_string()));
        }
        Ok(Self {
            source,
            target,
            name,
            args,
            future: Future::new(),
        })
    }

    pub fn source(&self) -> &ActorRef {
        &self.source
    }

    pub fn target(&self) -> &ActorRef {
        &self.target
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn future(&self) -> &Future {
        &self.future
    }

    /// `true` when the call originated on another agency.
    pub fn is_remote(&self) -> bool {
        self.source.is_remote()
    }
}
