// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dependency tracking between routes and the objects they reference.
//!
//! After a reconcile pass resolves a route's traffic block it registers one
//! subscription per referenced `Configuration` and `Revision`. Watch mappers
//! for those kinds then ask the tracker which routes to enqueue, so a
//! dependency change pushes work to exactly the routes that care.
//!
//! Subscriptions expire after a lease so routes that stop referencing an
//! object fall out of the index without explicit cleanup. Every pass renews
//! the lease of everything it still references.

use crate::constants::{DEFAULT_TRACKER_LEASE_SECS, KIND_CONFIGURATION, KIND_REVISION};
use crate::crd::Route;
use kube::runtime::reflector::ObjectRef;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Identity of an object a route depends on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl DependencyRef {
    #[must_use]
    pub fn configuration(namespace: &str, name: &str) -> Self {
        Self {
            kind: KIND_CONFIGURATION.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    #[must_use]
    pub fn revision(namespace: &str, name: &str) -> Self {
        Self {
            kind: KIND_REVISION.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

/// Subscription API used by the reconciler.
pub trait Tracker: Send + Sync {
    /// Re-trigger `dependent` whenever `dependency` changes.
    fn track(&self, dependency: DependencyRef, dependent: &ObjectRef<Route>);

    /// Drop every subscription held by `dependent`.
    fn forget(&self, dependent: &ObjectRef<Route>);
}

/// In-memory tracker with lease-based expiry.
pub struct DependencyTracker {
    lease: Duration,
    subscriptions: RwLock<HashMap<DependencyRef, HashMap<ObjectRef<Route>, Instant>>>,
}

impl Default for DependencyTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TRACKER_LEASE_SECS))
    }
}

impl DependencyTracker {
    #[must_use]
    pub fn new(lease: Duration) -> Self {
        Self {
            lease,
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Routes whose subscription to `dependency` is still live.
    #[must_use]
    pub fn dependents_of(&self, dependency: &DependencyRef) -> Vec<ObjectRef<Route>> {
        let now = Instant::now();
        let subscriptions = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions
            .get(dependency)
            .map(|dependents| {
                dependents
                    .iter()
                    .filter(|(_, expires)| **expires > now)
                    .map(|(route, _)| route.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove expired subscriptions.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions.retain(|_, dependents| {
            dependents.retain(|_, expires| *expires > now);
            !dependents.is_empty()
        });
    }
}

impl Tracker for DependencyTracker {
    fn track(&self, dependency: DependencyRef, dependent: &ObjectRef<Route>) {
        debug!(
            kind = %dependency.kind,
            namespace = %dependency.namespace,
            name = %dependency.name,
            route = %dependent,
            "Tracking dependency"
        );
        let expires = Instant::now() + self.lease;
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions
            .entry(dependency)
            .or_default()
            .insert(dependent.clone(), expires);
    }

    fn forget(&self, dependent: &ObjectRef<Route>) {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions.retain(|_, dependents| {
            dependents.remove(dependent);
            !dependents.is_empty()
        });
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tracker_tests;
