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

use std::cell::RefCell;

use crate::actor::ActorRef;

thread_local! {
    static CURRENT_ACTOR: RefCell<Option<ActorRef>> = const { RefCell::new(None) };
}

/// Returns the actor owning the calling thread, if any.
///
/// Body threads always have a current actor. Other threads only have one while
/// inside [`enter`], which is how the agency attributes calls it makes on behalf
/// of external code or remote peers.
pub fn current_actor() -> Option<ActorRef> {
    CURRENT_ACTOR.with(|current| current.borrow().clone())
}

/// Restores the previous current actor when dropped, including during unwinding.
struct Restore(Option<ActorRef>);

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = self.0.take();
        CURRENT_ACTOR.with(|current| *current.borrow_mut() = previous);
    }
}

/// Runs `f` with `actor` as the current actor of this thread.
pub(crate) fn enter<R>(actor: ActorRef, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_ACTOR.with(|current| current.borrow_mut().replace(actor));
    let _restore = Restore(previous);
    f()
}

/// Binds `actor` to this thread until [`clear`] is called. Used by body threads.
pub(crate) fn bind(actor: ActorRef) {
    CURRENT_ACTOR.with(|current| *current.borrow_mut() = Some(actor));
}

pub(crate) fn clear() {
    CURRENT_ACTOR.with(|current| current.borrow_mut().take());
}
