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

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, trace, warn};

use crate::actor::current;
use crate::actor::task::{TaskKind, TaskQueue};
use crate::actor::{ActorRef, Call, CapabilityTable, Future, LocalActorRef};
use crate::common::{panic_message, report_fault, AgencyCore, BodyState, StateGate};
use crate::message::{CallError, CallResult, Value};
use crate::traits::{Actor, Identifiable, IdentifiableType};

/// Type-erased view of a body used by actor handles.
pub(crate) trait LocalBody: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> IdentifiableType;

    fn actor_type(&self) -> &'static str;

    /// Routes `call` to the queue, or runs it inline for direct capabilities.
    fn submit(&self, call: Call, delay: Duration) -> Future;

    fn invoke_direct(&self, name: &str, args: &[Value]) -> CallResult;

    fn has_capability(&self, name: &str) -> bool;

    fn stop(&self);

    fn state(&self) -> BodyState;

    fn wait_stopped(&self, timeout: Duration) -> bool;

    fn core(&self) -> Option<Arc<AgencyCore>>;
}

/// The thread-owned home of one actor.
///
/// Exactly one OS thread drains the queue, so queued capabilities of an actor
/// never overlap. Direct capabilities take a shared lock on the state from the
/// caller's thread and may overlap with each other.
pub(crate) struct Body<A: Actor> {
    id: String,
    kind: IdentifiableType,
    actor: RwLock<A>,
    table: Arc<CapabilityTable<A>>,
    queue: TaskQueue,
    state: StateGate<BodyState>,
    thread: OnceLock<ThreadId>,
    direct_timeout: Duration,
    core: Weak<AgencyCore>,
    this: Weak<Body<A>>,
}

impl<A: Actor> Body<A> {
    pub(crate) fn new(
        id: String,
        kind: IdentifiableType,
        actor: A,
        core: Weak<AgencyCore>,
        recheck: Duration,
        direct_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id,
            kind,
            actor: RwLock::new(actor),
            table: CapabilityTable::<A>::of(),
            queue: TaskQueue::new(),
            state: StateGate::new(BodyState::Starting, recheck),
            thread: OnceLock::new(),
            direct_timeout,
            core,
            this: this.clone(),
        })
    }

    /// Starts the body thread.
    pub(crate) fn start(self: &Arc<Self>) -> std::io::Result<()> {
        let body = self.clone();
        thread::Builder::new()
            .name(format!("actor-{}", self.id))
            .spawn(move || body.run())
            .map(|_| ())
    }

    fn handle(&self) -> Option<ActorRef> {
        let body: Arc<dyn LocalBody> = self.this.upgrade()?;
        Some(ActorRef::Local(LocalActorRef::new(body)))
    }

    fn on_own_thread(&self) -> bool {
        self.thread.get() == Some(&thread::current().id())
    }

    #[instrument(skip(self), fields(actor = %self.id, kind = %self.kind))]
    fn run(self: Arc<Self>) {
        let _ = self.thread.set(thread::current().id());
        if let Some(handle) = self.handle() {
            current::bind(handle);
        }

        self.guarded("on_start", |actor| actor.on_start());
        self.state.advance(BodyState::Running);
        info!("Actor started");

        let first_step = self.actor.write().as_step().map(|step| step.step_delay());
        if let Some(delay) = first_step {
            self.schedule_step(delay);
        }

        loop {
            let task = self.queue.take();
            trace!(sequence = task.sequence, "Task due");
            match task.kind {
                TaskKind::Call(call) => self.execute(call),
                TaskKind::Step => self.run_step(),
                TaskKind::Stop => break,
            }
        }

        self.finish();
    }

    fn schedule_step(&self, delay: Duration) {
        if self.queue.push(Instant::now() + delay, TaskKind::Step).is_err() {
            trace!(actor = %self.id, "Queue closed, step not rescheduled");
        }
    }

    fn execute(&self, call: Call) {
        trace!(capability = call.name(), remote = call.is_remote(), "Executing call");
        let result = self.invoke_exclusive(call.name(), call.args());
        if let Err(error) = &result {
            debug!(actor = %self.id, capability = call.name(), "Call failed: {}", error);
        }
        if let Err(e) = call.future().resolve(result) {
            debug!(actor = %self.id, "Result dropped: {}", e);
        }
    }

    fn run_step(&self) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut actor = self.actor.write();
            actor.as_step().map(|step| {
                step.step();
                step.step_delay()
            })
        }));
        let next = match outcome {
            Ok(next) => next,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                report_fault(&anyhow!("step panicked: {message}"), Some(&self.id));
                self.actor.write().as_step().map(|step| step.step_delay())
            }
        };
        if let Some(delay) = next {
            self.schedule_step(delay);
        }
    }

    fn invoke_exclusive(&self, name: &str, args: &[Value]) -> CallResult {
        catch_unwind(AssertUnwindSafe(|| {
            let mut actor = self.actor.write();
            self.table.invoke(&mut actor, name, args)
        }))
        .unwrap_or_else(|payload| self.panicked(name, payload.as_ref()))
    }

    /// Runs a direct capability on the calling thread.
    ///
    /// A queued routine holds the state exclusively for its whole run, so the
    /// wait for a shared lock is bounded. Two actors directly calling each other
    /// from queued routines give up with [`CallError::Busy`] instead of
    /// blocking both threads forever.
    fn invoke_shared(&self, name: &str, args: &[Value]) -> CallResult {
        if self.on_own_thread() {
            return Err(CallError::InvalidCall(format!(
                "direct call of {name} from a routine of {} itself",
                self.id
            )));
        }
        let Some(actor) = self.actor.try_read_for(self.direct_timeout) else {
            warn!(
                actor = %self.id,
                capability = name,
                timeout = ?self.direct_timeout,
                "Actor busy, direct call abandoned"
            );
            return Err(CallError::Busy(self.id.clone()));
        };
        catch_unwind(AssertUnwindSafe(|| self.table.invoke_direct(&actor, name, args)))
            .unwrap_or_else(|payload| self.panicked(name, payload.as_ref()))
    }

    fn panicked(&self, name: &str, payload: &(dyn std::any::Any + Send)) -> CallResult {
        let message = panic_message(payload);
        report_fault(
            &anyhow!("capability {name} panicked: {message}"),
            Some(&self.id),
        );
        Err(CallError::Panicked(message))
    }

    fn guarded(&self, hook: &str, f: impl FnOnce(&mut A)) {
        let outcome = catch_unwind(AssertUnwindSafe(|| f(&mut self.actor.write())));
        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            report_fault(&anyhow!("{hook} panicked: {message}"), Some(&self.id));
        }
    }

    fn finish(self: Arc<Self>) {
        self.state.advance(BodyState::Stopping);

        if let Some(core) = self.core.upgrade() {
            let object: Arc<dyn Identifiable> = self.clone();
            core.registry().unregister(&object);
        }

        let drained = self.queue.close();
        let abandoned = drained.len();
        for task in drained {
            if let TaskKind::Call(call) = task.kind {
                let _ = call
                    .future()
                    .resolve(Err(CallError::ActorStopped(self.id.clone())));
            }
        }

        self.guarded("on_stop", |actor| actor.on_stop());
        current::clear();
        self.state.advance(BodyState::Stopped);
        info!(abandoned, "Actor stopped");
    }
}

impl<A: Actor> LocalBody for Body<A> {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> IdentifiableType {
        self.kind
    }

    fn actor_type(&self) -> &'static str {
        std::any::type_name::<A>()
    }

    fn submit(&self, call: Call, delay: Duration) -> Future {
        let future = call.future().clone();
        let name = call.name();

        if call.is_remote() && self.table.is_local(name) {
            let _ = future.resolve(Err(CallError::LocalOnly(name.to_string())));
            return future;
        }

        // A direct call from the actor's own thread would wait on its own lock.
        if delay.is_zero() && self.table.is_direct(name) && !self.on_own_thread() {
            let result = if self.state.get() >= BodyState::Stopping {
                Err(CallError::ActorStopped(self.id.clone()))
            } else {
                self.invoke_shared(name, call.args())
            };
            let _ = future.resolve(result);
            return future;
        }

        if let Err(TaskKind::Call(call)) = self.queue.push(Instant::now() + delay, TaskKind::Call(call)) {
            let _ = call
                .future()
                .resolve(Err(CallError::ActorStopped(self.id.clone())));
        }
        future
    }

    fn invoke_direct(&self, name: &str, args: &[Value]) -> CallResult {
        if self.state.get() >= BodyState::Stopping {
            return Err(CallError::ActorStopped(self.id.clone()));
        }
        self.invoke_shared(name, args)
    }

    fn has_capability(&self, name: &str) -> bool {
        self.table.has(name)
    }

    fn stop(&self) {
        if self.queue.push(Instant::now(), TaskKind::Stop).is_ok() {
            debug!(actor = %self.id, "Stop requested");
        }
    }

    fn state(&self) -> BodyState {
        self.state.get()
    }

    fn wait_stopped(&self, timeout: Duration) -> bool {
        self.state.wait_for_timeout(BodyState::Stopped, timeout)
    }

    fn core(&self) -> Option<Arc<AgencyCore>> {
        self.core.upgrade()
    }
}

impl<A: Actor> Identifiable for Body<A> {
    fn id(&self) -> &str {
        &self.id
    }

    fn identifiable_type(&self) -> IdentifiableType {
        self.kind
    }

    fn as_actor(self: Arc<Self>) -> Option<ActorRef> {
        Some(ActorRef::Local(LocalActorRef::new(self)))
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use super::*;
    use crate::actor::CapabilityTableBuilder;

    #[derive(Default)]
    struct Refuser;

    fn refuse(_target: &mut Refuser, _args: &[Value]) -> CallResult {
        Err(CallError::failed("refused"))
    }

    impl Actor for Refuser {
        fn declare(builder: &mut CapabilityTableBuilder<Self>) {
            builder.callable_fn("refuse", refuse);
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_call_is_logged() {
        let body = Body::new(
            "refuser".to_string(),
            IdentifiableType::Actor,
            Refuser,
            Weak::new(),
            Duration::from_millis(50),
            Duration::from_millis(50),
        );
        let handle = body.handle().unwrap();
        let call = Call::with_source(handle.clone(), handle, "refuse", vec![]).unwrap();
        let future = call.future().clone();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || body.execute(call));

        assert_eq!(future.get_timeout(Duration::ZERO), Err(CallError::failed("refused")));
        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Call failed"), "got {output}");
        assert!(output.contains("refuser"), "got {output}");
        assert!(output.contains("refuse"), "got {output}");
    }
}
