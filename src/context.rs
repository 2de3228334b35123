// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the route controller with reflector stores.
//!
//! The controller receives an `Arc<Context>` that contains:
//! - Kubernetes client
//! - Reflector stores for routes and their dependencies
//! - The route reconciler with all of its collaborators
//! - The dependency tracker used by watch mappers
//! - Per-route failure counters for error backoff
//!
//! The stores enable O(1) in-memory lookups so a reconcile pass never reads
//! `Configuration` or `Revision` objects from the API server.

use crate::crd::{Configuration, Revision, Route};
use crate::reconcilers::retry::FailureBackoff;
use crate::reconcilers::route::RouteReconciler;
use crate::tracker::DependencyTracker;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::Client;
use std::sync::Arc;

/// Read-only view of the watch cache.
///
/// Objects handed out are shared with every other consumer of the cache and
/// must be cloned before they are modified.
pub trait Listers: Send + Sync {
    fn route(&self, namespace: &str, name: &str) -> Option<Arc<Route>>;
    fn configuration(&self, namespace: &str, name: &str) -> Option<Arc<Configuration>>;
    fn revision(&self, namespace: &str, name: &str) -> Option<Arc<Revision>>;
}

/// Collection of the reflector stores the route controller reads from.
///
/// Each store is populated by a dedicated reflector task and provides
/// in-memory access to resources without API calls.
#[derive(Clone)]
pub struct Stores {
    pub routes: Store<Route>,
    pub configurations: Store<Configuration>,
    pub revisions: Store<Revision>,
}

impl Listers for Stores {
    fn route(&self, namespace: &str, name: &str) -> Option<Arc<Route>> {
        self.routes.get(&ObjectRef::new(name).within(namespace))
    }

    fn configuration(&self, namespace: &str, name: &str) -> Option<Arc<Configuration>> {
        self.configurations
            .get(&ObjectRef::new(name).within(namespace))
    }

    fn revision(&self, namespace: &str, name: &str) -> Option<Arc<Revision>> {
        self.revisions.get(&ObjectRef::new(name).within(namespace))
    }
}

/// Shared context passed to the route controller.
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Reflector stores backing the listers
    pub stores: Stores,

    /// Reconciler driving each route toward its desired state
    pub reconciler: RouteReconciler,

    /// Index of which routes depend on which configurations and revisions
    pub tracker: Arc<DependencyTracker>,

    /// Consecutive failure counts for error-policy backoff
    pub backoff: FailureBackoff,
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
