// ABOUTME: Concurrency-safe named collection of signing key pairs with atomic rotation
// ABOUTME: Serializes registration uniqueness checks while keeping key generation lock-free
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! The key registry.
//!
//! Keys are registered once at startup and looked up on the hot path by KID.
//! Rotation replaces a pair atomically under the write lock; readers never
//! observe a state where the old pair is gone and the new one is not yet
//! visible.

use super::pair::{JsonWebKeySet, KeyPair};
use super::Descriptor;
use crate::errors::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Named collection of registered key pairs, keyed by KID
#[derive(Default)]
pub struct Registry {
    keys: RwLock<HashMap<String, Arc<KeyPair>>>,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a descriptor and register the resulting pair.
    ///
    /// The pair's KID is the descriptor's `kid`, or `name` when that is
    /// empty. Key generation runs outside the lock, so concurrent
    /// registrations of different KIDs do not serialize on it; only the
    /// uniqueness check and insertion are serialized.
    ///
    /// Re-registering the same descriptor fails on the second call: the
    /// registry never silently overwrites, and a failed call leaves the
    /// observable key set unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor cannot be resolved into key
    /// material or if the KID is already registered.
    pub fn register(&self, name: &str, descriptor: &Descriptor) -> AppResult<Arc<KeyPair>> {
        let kid = if descriptor.kid.is_empty() {
            name
        } else {
            descriptor.kid.as_str()
        };

        if self.read().contains_key(kid) {
            return Err(AppError::duplicate_key(kid));
        }

        let material = descriptor.resolve()?;
        let pair = Arc::new(KeyPair::new(kid, material)?);

        let mut keys = self.write();
        if keys.contains_key(kid) {
            return Err(AppError::duplicate_key(kid));
        }
        keys.insert(kid.to_owned(), Arc::clone(&pair));
        drop(keys);

        info!(kid, kind = ?descriptor.kind, "registered signing key");
        Ok(pair)
    }

    /// Look up a pair by KID
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<Arc<KeyPair>> {
        self.read().get(kid).cloned()
    }

    /// Atomically replace `old_kid` with a new pair registered under the new
    /// pair's own KID.
    ///
    /// Returns `false`, with no mutation at all, when `old_kid` is not
    /// present. Unlike [`Registry::register`], rotation does not re-validate
    /// uniqueness against other keys.
    pub fn update(&self, old_kid: &str, new_pair: Arc<KeyPair>) -> bool {
        let mut keys = self.write();
        if keys.remove(old_kid).is_none() {
            return false;
        }
        let new_kid = new_pair.kid().to_owned();
        keys.insert(new_kid.clone(), new_pair);
        drop(keys);

        info!(old_kid, new_kid, "rotated signing key");
        true
    }

    /// JWKS document covering every registered key's verification material
    #[must_use]
    pub fn key_set(&self) -> JsonWebKeySet {
        let keys = self
            .read()
            .values()
            .map(|pair| pair.jwk().clone())
            .collect();
        JsonWebKeySet { keys }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<KeyPair>>> {
        self.keys.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<KeyPair>>> {
        self.keys.write().unwrap_or_else(PoisonError::into_inner)
    }
}
