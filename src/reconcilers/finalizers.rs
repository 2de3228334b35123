// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for `Route` resources.
//!
//! The route finalizer gates deletion until the controller has removed every
//! `EdgeIngress` it produced. It is added before any child exists and removed
//! only after cleanup succeeded.
//!
//! Finalizers are processed in order: this controller only acts while its
//! token is the first entry, and removes exactly that entry so tokens of
//! other controllers survive.
//!
//! Every patch carries the route's `resourceVersion` so a concurrent change to
//! the finalizer list is detected as a conflict rather than overwritten.

use crate::crd::Route;
use crate::reconcilers::route::api::RouteApi;
use anyhow::Result;
use kube::ResourceExt;
use serde_json::json;
use tracing::info;

/// Returns true when `finalizer` is the first entry of the route's finalizers.
#[must_use]
pub fn is_first_finalizer(route: &Route, finalizer: &str) -> bool {
    route.finalizers().first().is_some_and(|f| f == finalizer)
}

/// Add a finalizer to a route if not already present.
///
/// The operation is idempotent: nothing is written when the finalizer is
/// already present.
///
/// # Returns
///
/// The patched route when a write happened, `None` otherwise.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn ensure_finalizer(
    api: &dyn RouteApi,
    route: &Route,
    finalizer: &str,
) -> Result<Option<Route>> {
    if route.finalizers().iter().any(|f| f == finalizer) {
        return Ok(None);
    }

    let namespace = route.namespace().unwrap_or_default();
    let name = route.name_any();
    info!("Adding finalizer {} to Route {}/{}", finalizer, namespace, name);

    let mut finalizers = route.finalizers().to_vec();
    finalizers.push(finalizer.to_string());

    let patch = json!({
        "metadata": {
            "finalizers": finalizers,
            "resourceVersion": route.resource_version(),
        }
    });
    let patched = api.patch_metadata(&namespace, &name, &patch).await?;
    Ok(Some(patched))
}

/// Remove the first finalizer from a route, which must be `finalizer`.
///
/// Does nothing when `finalizer` is not the first entry.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn pop_finalizer(api: &dyn RouteApi, route: &Route, finalizer: &str) -> Result<()> {
    if !is_first_finalizer(route, finalizer) {
        return Ok(());
    }

    let namespace = route.namespace().unwrap_or_default();
    let name = route.name_any();
    info!(
        "Removing finalizer {} from Route {}/{}",
        finalizer, namespace, name
    );

    let remaining: Vec<String> = route.finalizers().iter().skip(1).cloned().collect();
    let patch = json!({
        "metadata": {
            "finalizers": remaining,
            "resourceVersion": route.resource_version(),
        }
    });
    api.patch_metadata(&namespace, &name, &patch).await?;
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
