// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for `Route` resources.
//!
//! A route is reconciled into the children that expose it:
//!
//! - one `EdgeIngress` carrying the weighted traffic splits
//! - one `Certificate` per public host when automatic TLS is enabled
//! - one placeholder `Service` per traffic group
//!
//! # Reconciliation Architecture
//!
//! Routeplane follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Routes, their children, and the configurations and revisions they reference
//! 2. **Reconcile** - Resolve traffic against the watch cache and compute desired children
//! 3. **Update** - Create or update children that drifted from their desired state
//! 4. **Status** - Report conditions, URLs and resolved traffic back on the route
//!
//! # Modules
//!
//! - [`route`] - The [`RouteReconciler`] pass, TLS handling, and deletion
//! - [`child`] - Generic create/compare/update of owned children
//! - [`finalizers`] - Adding and removing the route finalizer
//! - [`status`] - Condition bookkeeping on `RouteStatus`
//! - [`retry`] - Error backoff used by the controller's error policy

pub mod child;
pub mod finalizers;
pub mod retry;
pub mod route;
pub mod status;

pub use route::RouteReconciler;
