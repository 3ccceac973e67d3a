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

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::actor::Call;

/// What a body thread does when a task comes due.
#[derive(Debug)]
pub(crate) enum TaskKind {
    /// Execute a call through the capability table and resolve its future.
    Call(Call),
    /// Run one cycle of a step actor, then reschedule.
    Step,
    /// Leave the run loop.
    Stop,
}

/// A unit of work ordered by deadline, ties broken by insertion sequence.
#[derive(Debug)]
pub(crate) struct ScheduledTask {
    pub(crate) deadline: Instant,
    pub(crate) sequence: u64,
    pub(crate) kind: TaskKind,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    // Reversed so the max-heap pops the earliest deadline, then the lowest sequence.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<ScheduledTask>,
    next_sequence: u64,
    closed: bool,
}

/// Time-ordered queue drained by exactly one body thread.
#[derive(Default)]
pub(crate) struct TaskQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a task. Never blocks on the consumer.
    ///
    /// Returns the task kind back when the queue has been closed.
    pub(crate) fn push(&self, deadline: Instant, kind: TaskKind) -> Result<(), TaskKind> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(kind);
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.heap.push(ScheduledTask {
            deadline,
            sequence,
            kind,
        });
        trace!(sequence, pending = state.heap.len(), "Task queued");
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Blocks until the earliest task is due and removes it.
    pub(crate) fn take(&self) -> ScheduledTask {
        let mut state = self.state.lock();
        loop {
            let head_deadline = state.heap.peek().map(|task| task.deadline);
            match head_deadline {
                Some(deadline) if deadline <= Instant::now() => {
                    if let Some(task) = state.heap.pop() {
                        return task;
                    }
                }
                Some(deadline) => {
                    self.ready.wait_until(&mut state, deadline);
                }
                None => self.ready.wait(&mut state),
            }
        }
    }

    /// Refuses further pushes and hands back everything still queued, in order.
    pub(crate) fn close(&self) -> Vec<ScheduledTask> {
        let mut state = self.state.lock();
        state.closed = true;
        let mut drained = Vec::with_capacity(state.heap.len());
        while let Some(task) = state.heap.pop() {
            drained.push(task);
        }
        drained
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().heap.len()
    }
}
