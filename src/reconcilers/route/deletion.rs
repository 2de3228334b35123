// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cleanup when a route is deleted.
//!
//! Ingresses are found through the route labels and the controller owner
//! reference rather than by name, so ingresses left behind by an earlier
//! naming scheme are removed too. Certificates and placeholder services are
//! left to the cluster garbage collector.

use super::RouteReconciler;
use crate::constants::{KIND_EDGE_INGRESS, ROUTE_FINALIZER};
use crate::crd::Route;
use crate::metrics;
use crate::reconcilers::finalizers::{is_first_finalizer, pop_finalizer};
use crate::route_resources::{is_controlled_by, route_label_selector};
use anyhow::{Context as _, Result};
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

/// Run the deletion workflow for a route carrying a deletion timestamp.
///
/// Does nothing until the route finalizer is the first finalizer. The
/// finalizer is removed only after every owned ingress is gone.
///
/// # Errors
///
/// Returns an error if listing or deleting an ingress fails, or if the
/// finalizer cannot be removed.
pub async fn finalize(reconciler: &RouteReconciler, route: &Route) -> Result<()> {
    let namespace = route.namespace().unwrap_or_default();
    let name = route.name_any();

    if !is_first_finalizer(route, ROUTE_FINALIZER) {
        debug!(
            "Route {}/{} is being deleted but {} is not the first finalizer",
            namespace, name, ROUTE_FINALIZER
        );
        return Ok(());
    }

    info!("Route {}/{} is being deleted", namespace, name);

    let uid = route.meta().uid.as_deref().unwrap_or_default();
    let ingresses = reconciler
        .ingresses
        .list(&namespace, &route_label_selector(route))
        .await
        .with_context(|| format!("Failed to list ingresses of Route {namespace}/{name}"))?;

    for ingress in ingresses
        .iter()
        .filter(|ingress| is_controlled_by(ingress.meta(), uid))
    {
        let ingress_name = ingress.name_any();
        reconciler
            .ingresses
            .delete(&namespace, &ingress_name)
            .await
            .with_context(|| format!("Failed to delete EdgeIngress {namespace}/{ingress_name}"))?;
        info!("Deleted EdgeIngress {}/{}", namespace, ingress_name);
        metrics::record_child_write(KIND_EDGE_INGRESS, metrics::OPERATION_DELETED);
    }

    reconciler.tracker.forget(&ObjectRef::from_obj(route));
    pop_finalizer(reconciler.routes.as_ref(), route, ROUTE_FINALIZER).await
}

#[cfg(test)]
#[path = "deletion_tests.rs"]
mod deletion_tests;
