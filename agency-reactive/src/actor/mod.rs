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

pub use actor_ref::{ActorRef, LocalActorRef, RemoteActorRef};
pub use call::Call;
pub use capability::{
    decode_args, encode_return, expect_no_args, CapabilityEntry, CapabilityTable,
    CapabilityTableBuilder, DirectFn, QueuedFn,
};
pub use current::current_actor;
pub use future::{Future, FutureError};

pub(crate) use body::Body;

mod actor_ref;
mod body;
mod call;
mod capability;
pub(crate) mod current;
mod future;
mod task;
