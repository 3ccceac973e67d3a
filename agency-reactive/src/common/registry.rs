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

//! Registry of identifiable objects.
//!
//! Every addressable object (agencies, features, protocols and actors) is
//! registered here under its `(type, id)` identity. Lookups read the per-type
//! pools directly; every mutation goes through one registration lock so that
//! concurrent registrations of the same id are arbitrated deterministically.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{info, trace};

use crate::traits::{Identifiable, IdentifiableType};

/// Outcome of [`IdentifiableRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// The object now holds its id.
    Accepted,
    /// A different object already holds the id.
    Refused,
    /// This very object already holds the id.
    AlreadyRegistered,
    /// The object cannot be registered (empty id).
    Error,
}

impl RegistrationStatus {
    /// `true` when the object holds its id after the call.
    pub const fn is_registered(self) -> bool {
        matches!(self, Self::Accepted | Self::AlreadyRegistered)
    }
}

fn same_object(left: &Arc<dyn Identifiable>, right: &Arc<dyn Identifiable>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(left).cast::<()>(),
        Arc::as_ptr(right).cast::<()>(),
    )
}

/// Per-agency registry of identifiable objects.
#[derive(Default)]
pub struct IdentifiableRegistry {
    pools: DashMap<IdentifiableType, DashMap<String, Arc<dyn Identifiable>>>,
    registration: Mutex<()>,
}

impl IdentifiableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `object` under its own id.
    pub fn register(&self, object: Arc<dyn Identifiable>) -> RegistrationStatus {
        let id = object.id().to_string();
        let kind = object.identifiable_type();
        if id.is_empty() {
            return RegistrationStatus::Error;
        }

        let _guard = self.registration.lock();
        let pool = self.pools.entry(kind).or_default();
        let status = match pool.get(&id) {
            Some(existing) if same_object(existing.value(), &object) => {
                RegistrationStatus::AlreadyRegistered
            }
            Some(_) => RegistrationStatus::Refused,
            None => RegistrationStatus::Accepted,
        };
        if status == RegistrationStatus::Accepted {
            pool.insert(id.clone(), object);
            info!(kind = %kind, id = %id, "Registered");
        } else {
            trace!(kind = %kind, id = %id, ?status, "Registration not applied");
        }
        status
    }

    /// Removes every id (including aliases) held by `object` in its pool.
    pub fn unregister(&self, object: &Arc<dyn Identifiable>) {
        let kind = object.identifiable_type();
        let _guard = self.registration.lock();
        let Some(pool) = self.pools.get(&kind) else {
            return;
        };
        let held: Vec<String> = pool
            .iter()
            .filter(|entry| same_object(entry.value(), object))
            .map(|entry| entry.key().clone())
            .collect();
        for id in held {
            pool.remove(&id);
            info!(kind = %kind, id = %id, "Unregistered");
        }
    }

    /// Unregisters whatever object holds `id` in the `kind` pool, aliases included.
    pub fn unregister_id(&self, kind: IdentifiableType, id: &str) {
        if let Some(object) = self.get(kind, id) {
            self.unregister(&object);
        }
    }

    /// Adds `alias` as another id for `object`.
    ///
    /// Does nothing unless `object` is registered and `alias` is free. Returns
    /// whether the alias was added.
    pub fn alias(&self, object: &Arc<dyn Identifiable>, alias: &str) -> bool {
        if alias.is_empty() {
            return false;
        }
        let kind = object.identifiable_type();
        let _guard = self.registration.lock();
        let Some(pool) = self.pools.get(&kind) else {
            return false;
        };
        let registered = pool
            .get(object.id())
            .is_some_and(|existing| same_object(existing.value(), object));
        if !registered || pool.contains_key(alias) {
            return false;
        }
        pool.insert(alias.to_string(), object.clone());
        info!(kind = %kind, id = object.id(), alias, "Aliased");
        true
    }

    pub fn get(&self, kind: IdentifiableType, id: &str) -> Option<Arc<dyn Identifiable>> {
        self.pools
            .get(&kind)
            .and_then(|pool| pool.get(id).map(|entry| entry.value().clone()))
    }

    pub fn contains(&self, kind: IdentifiableType, id: &str) -> bool {
        self.get(kind, id).is_some()
    }

    /// Ids registered under `kind`, aliases included, sorted.
    pub fn ids(&self, kind: IdentifiableType) -> Vec<String> {
        let mut ids: Vec<String> = self
            .pools
            .get(&kind)
            .map(|pool| pool.iter().map(|entry| entry.key().clone()).collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Every registered object of `kind`, aliases resolved to their object once.
    pub fn objects(&self, kind: IdentifiableType) -> Vec<Arc<dyn Identifiable>> {
        let mut objects: Vec<Arc<dyn Identifiable>> = Vec::new();
        if let Some(pool) = self.pools.get(&kind) {
            for entry in pool.iter() {
                if !objects.iter().any(|seen| same_object(seen, entry.value())) {
                    objects.push(entry.value().clone());
                }
            }
        }
        objects
    }

    /// Hex SHA-256 over every `(type, id)` pair, stable for equal contents.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for kind in IdentifiableType::ALL {
            for id in self.ids(kind) {
                hasher.update(kind.path_segment().as_bytes());
                hasher.update(b"/");
                hasher.update(id.as_bytes());
                hasher.update(b"\n");
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for IdentifiableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for kind in IdentifiableType::ALL {
            map.entry(&kind, &self.ids(kind));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct Node {
        id: String,
    }

    impl Identifiable for Node {
        fn id(&self) -> &str {
            &self.id
        }

        fn identifiable_type(&self) -> IdentifiableType {
            IdentifiableType::Actor
        }
    }

    fn node(id: &str) -> Arc<dyn Identifiable> {
        Arc::new(Node { id: id.to_string() })
    }

    #[test]
    fn test_register_statuses() {
        let registry = IdentifiableRegistry::new();
        let first = node("node-1");

        assert_eq!(registry.register(first.clone()), RegistrationStatus::Accepted);
        assert_eq!(
            registry.register(first.clone()),
            RegistrationStatus::AlreadyRegistered
        );
        assert_eq!(registry.register(node("node-1")), RegistrationStatus::Refused);
        assert_eq!(registry.register(node("")), RegistrationStatus::Error);

        let held = registry.get(IdentifiableType::Actor, "node-1").unwrap();
        assert!(same_object(&held, &first));
    }

    #[test]
    fn test_ids_are_unique_per_type_only() {
        struct Proto;
        impl Identifiable for Proto {
            fn id(&self) -> &str {
                "node-1"
            }
            fn identifiable_type(&self) -> IdentifiableType {
                IdentifiableType::Protocol
            }
        }

        let registry = IdentifiableRegistry::new();
        assert_eq!(registry.register(node("node-1")), RegistrationStatus::Accepted);
        assert_eq!(registry.register(Arc::new(Proto)), RegistrationStatus::Accepted);
    }

    #[test]
    fn test_unregister_removes_aliases() {
        let registry = IdentifiableRegistry::new();
        let object = node("pinger");
        registry.register(object.clone());

        assert!(registry.alias(&object, "ping-service"));
        assert!(registry.contains(IdentifiableType::Actor, "ping-service"));
        assert_eq!(registry.objects(IdentifiableType::Actor).len(), 1);

        registry.unregister(&object);
        assert!(registry.get(IdentifiableType::Actor, "pinger").is_none());
        assert!(registry.get(IdentifiableType::Actor, "ping-service").is_none());

        // Unregistering again is a no-op.
        registry.unregister(&object);
    }

    #[test]
    fn test_alias_requires_registration_and_free_id() {
        let registry = IdentifiableRegistry::new();
        let stranger = node("stranger");
        assert!(!registry.alias(&stranger, "nickname"));

        let taken = node("taken");
        registry.register(taken.clone());
        registry.register(stranger.clone());
        assert!(!registry.alias(&stranger, "taken"));
        assert!(registry.alias(&stranger, "nickname"));
    }

    #[test]
    fn test_unregister_leaves_other_holders_alone() {
        let registry = IdentifiableRegistry::new();
        let holder = node("shared");
        registry.register(holder.clone());

        let impostor = node("shared");
        registry.unregister(&impostor);
        assert!(registry.contains(IdentifiableType::Actor, "shared"));
    }

    #[test]
    fn test_concurrent_registration_accepts_exactly_one() {
        let registry = Arc::new(IdentifiableRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || registry.register(node("contended")))
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|status| *status == RegistrationStatus::Accepted)
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn test_digest_tracks_contents() {
        let left = IdentifiableRegistry::new();
        let right = IdentifiableRegistry::new();
        left.register(node("a"));
        left.register(node("b"));
        right.register(node("b"));
        right.register(node("a"));
        assert_eq!(left.digest(), right.digest());

        right.register(node("c"));
        assert_ne!(left.digest(), right.digest());
    }
}
