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

//! Per-actor-type capability tables.
//!
//! A table maps capability names to routines. It is declared once per concrete
//! actor type through [`Actor::declare`](crate::traits::Actor::declare), built
//! lazily on first use, cached by [`TypeId`] and shared read-only by every
//! instance of that type.
//!
//! Routines come in two shapes with identical behavior: a specialized function
//! pointer (what `#[callables]` generates) and a generic closure that marshals
//! positional arguments through serde.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::message::{CallError, CallResult, Value};
use crate::traits::Actor;

/// Specialized adapter for a capability that runs on the actor's own thread.
pub type QueuedFn<A> = fn(&mut A, &[Value]) -> CallResult;

/// Specialized adapter for a capability that runs on the caller's thread.
pub type DirectFn<A> = fn(&A, &[Value]) -> CallResult;

type QueuedClosure<A> = Arc<dyn Fn(&mut A, &[Value]) -> CallResult + Send + Sync>;
type DirectClosure<A> = Arc<dyn Fn(&A, &[Value]) -> CallResult + Send + Sync>;

enum Routine<A> {
    Specialized(QueuedFn<A>),
    Generic(QueuedClosure<A>),
    DirectSpecialized(DirectFn<A>),
    DirectGeneric(DirectClosure<A>),
}

impl<A> Routine<A> {
    fn is_direct(&self) -> bool {
        matches!(self, Self::DirectSpecialized(_) | Self::DirectGeneric(_))
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Specialized(_) | Self::DirectSpecialized(_) => "specialized",
            Self::Generic(_) | Self::DirectGeneric(_) => "generic",
        }
    }
}

/// One named capability and its policy flags.
pub struct CapabilityEntry<A> {
    name: String,
    routine: Routine<A>,
    local: bool,
}

impl<A> CapabilityEntry<A> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` when the capability may bypass the owning thread's queue.
    pub fn is_direct(&self) -> bool {
        self.routine.is_direct()
    }

    /// `true` when the capability refuses invocation from a remote agency.
    pub fn is_local(&self) -> bool {
        self.local
    }
}

impl<A> fmt::Debug for CapabilityEntry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityEntry")
            .field("name", &self.name)
            .field("shape", &self.routine.shape())
            .field("direct", &self.is_direct())
            .field("local", &self.local)
            .finish()
    }
}

/// Collects capability declarations for actor type `A`.
///
/// Declarations are processed in order. When two declarations share a name the
/// first one is kept and the collision is logged.
pub struct CapabilityTableBuilder<A> {
    entries: Vec<CapabilityEntry<A>>,
    index: HashMap<String, usize>,
    last_accepted: Option<usize>,
}

impl<A: 'static> CapabilityTableBuilder<A> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            last_accepted: None,
        }
    }

    fn push(&mut self, name: &str, routine: Routine<A>) -> &mut Self {
        if let Some(&existing) = self.index.get(name) {
            warn!(
                actor_type = std::any::type_name::<A>(),
                capability = name,
                kept = self.entries[existing].routine.shape(),
                "Capability declared twice, keeping the first declaration"
            );
            self.last_accepted = None;
            return self;
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.last_accepted = Some(self.entries.len());
        self.entries.push(CapabilityEntry {
            name: name.to_string(),
            routine,
            local: false,
        });
        self
    }

    /// Declares a queued capability backed by a specialized adapter.
    pub fn callable_fn(&mut self, name: &str, routine: QueuedFn<A>) -> &mut Self {
        self.push(name, Routine::Specialized(routine))
    }

    /// Declares a direct capability backed by a specialized adapter.
    pub fn direct_fn(&mut self, name: &str, routine: DirectFn<A>) -> &mut Self {
        self.push(name, Routine::DirectSpecialized(routine))
    }

    /// Declares a queued capability from a closure taking decoded arguments.
    ///
    /// `Args` is a tuple matching the positional arguments, `()` for none.
    pub fn callable<Args, R, F>(&mut self, name: &str, routine: F) -> &mut Self
    where
        Args: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(&mut A, Args) -> R + Send + Sync + 'static,
    {
        let capability = name.to_string();
        self.push(
            name,
            Routine::Generic(Arc::new(move |target: &mut A, args: &[Value]| {
                let decoded: Args = decode_args(&capability, args)?;
                encode_return(&capability, routine(target, decoded))
            })),
        )
    }

    /// Declares a direct capability from a closure taking decoded arguments.
    pub fn direct<Args, R, F>(&mut self, name: &str, routine: F) -> &mut Self
    where
        Args: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(&A, Args) -> R + Send + Sync + 'static,
    {
        let capability = name.to_string();
        self.push(
            name,
            Routine::DirectGeneric(Arc::new(move |target: &A, args: &[Value]| {
                let decoded: Args = decode_args(&capability, args)?;
                encode_return(&capability, routine(target, decoded))
            })),
        )
    }

    /// Prefers the specialized adapter and falls back to the generic closure when
    /// no adapter could be produced for this capability.
    pub fn specialized_or_generic<Args, R, F>(
        &mut self,
        name: &str,
        specialized: Option<QueuedFn<A>>,
        generic: F,
    ) -> &mut Self
    where
        Args: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(&mut A, Args) -> R + Send + Sync + 'static,
    {
        match specialized {
            Some(routine) => self.callable_fn(name, routine),
            None => {
                warn!(
                    actor_type = std::any::type_name::<A>(),
                    capability = name,
                    "No specialized adapter, using the generic routine"
                );
                self.callable(name, generic)
            }
        }
    }

    /// Flags the most recent accepted declaration as local only.
    pub fn local(&mut self) -> &mut Self {
        if let Some(position) = self.last_accepted {
            self.entries[position].local = true;
        }
        self
    }

    /// Walks an included capability set after the current declarations.
    ///
    /// Names already declared keep their first declaration.
    pub fn include(&mut self, declare: fn(&mut CapabilityTableBuilder<A>)) -> &mut Self {
        declare(self);
        self.last_accepted = None;
        self
    }

    pub fn build(self) -> CapabilityTable<A> {
        CapabilityTable {
            entries: self.entries,
            index: self.index,
        }
    }
}

/// Immutable map from capability name to routine for actor type `A`.
pub struct CapabilityTable<A> {
    entries: Vec<CapabilityEntry<A>>,
    index: HashMap<String, usize>,
}

lazy_static! {
    static ref TABLES: DashMap<TypeId, Arc<dyn Any + Send + Sync>> = DashMap::new();
}

impl<A: 'static> CapabilityTable<A> {
    pub fn builder() -> CapabilityTableBuilder<A> {
        CapabilityTableBuilder::new()
    }

    pub fn entry(&self, name: &str) -> Option<&CapabilityEntry<A>> {
        self.index.get(name).map(|&position| &self.entries[position])
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn is_direct(&self, name: &str) -> bool {
        self.entry(name).is_some_and(CapabilityEntry::is_direct)
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.entry(name).is_some_and(CapabilityEntry::is_local)
    }

    /// Capability names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(CapabilityEntry::name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs capability `name` against `target` with exclusive access.
    pub fn invoke(&self, target: &mut A, name: &str, args: &[Value]) -> CallResult {
        let entry = self
            .entry(name)
            .ok_or_else(|| CallError::UnknownCapability(name.to_string()))?;
        match &entry.routine {
            Routine::Specialized(routine) => routine(target, args),
            Routine::Generic(routine) => routine(target, args),
            Routine::DirectSpecialized(routine) => routine(target, args),
            Routine::DirectGeneric(routine) => routine(target, args),
        }
    }

    /// Runs a direct capability with shared access.
    ///
    /// Queued capabilities need exclusive access and are rejected with
    /// [`CallError::InvalidCall`].
    pub fn invoke_direct(&self, target: &A, name: &str, args: &[Value]) -> CallResult {
        let entry = self
            .entry(name)
            .ok_or_else(|| CallError::UnknownCapability(name.to_string()))?;
        match &entry.routine {
            Routine::DirectSpecialized(routine) => routine(target, args),
            Routine::DirectGeneric(routine) => routine(target, args),
            Routine::Specialized(_) | Routine::Generic(_) => Err(CallError::InvalidCall(format!(
                "capability {name} must run on the actor's thread"
            ))),
        }
    }
}

impl<A: Actor> CapabilityTable<A> {
    /// Returns the shared table for `A`, declaring it on first use.
    pub fn of() -> Arc<Self> {
        let type_id = TypeId::of::<A>();
        if let Some(table) = TABLES
            .get(&type_id)
            .and_then(|cached| cached.value().clone().downcast::<Self>().ok())
        {
            return table;
        }

        let mut builder = Self::builder();
        A::declare(&mut builder);
        let table = Arc::new(builder.build());
        debug!(
            actor_type = std::any::type_name::<A>(),
            capabilities = table.len(),
            "Capability table built"
        );

        // Another thread may have raced us here; whichever table landed first is shared.
        let cached = TABLES
            .entry(type_id)
            .or_insert_with(|| table.clone() as Arc<dyn Any + Send + Sync>)
            .value()
            .clone();
        cached.downcast::<Self>().unwrap_or(table)
    }
}

impl<A> fmt::Debug for CapabilityTable<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

/// Decodes positional arguments into the tuple `T`.
pub fn decode_args<T: DeserializeOwned>(name: &str, args: &[Value]) -> Result<T, CallError> {
    if args.is_empty() {
        if let Ok(unit) = serde_json::from_value(Value::Null) {
            return Ok(unit);
        }
    }
    serde_json::from_value(Value::Array(args.to_vec()))
        .map_err(|e| CallError::BadArguments(format!("{name}: {e}")))
}

/// Rejects a non-empty argument list for a capability without parameters.
pub fn expect_no_args(name: &str, args: &[Value]) -> Result<(), CallError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CallError::BadArguments(format!(
            "{name}: expected no arguments, got {}",
            args.len()
        )))
    }
}

/// Encodes a routine's return value.
pub fn encode_return<R: Serialize>(name: &str, value: R) -> CallResult {
    serde_json::to_value(value)
        .map_err(|e| CallError::Failed(format!("{name}: cannot encode return value: {e}")))
}
