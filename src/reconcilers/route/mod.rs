// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Route` reconciliation.
//!
//! A pass runs against a private copy of the cached route:
//!
//! 1. Deleted routes go through [`deletion::finalize`] and nothing else.
//! 2. Spec defaults are applied and missing conditions initialized.
//! 3. The primary URL and cluster-local address are computed.
//! 4. Traffic is resolved. A target that is missing or not ready ends the
//!    pass successfully with the reason in `AllTrafficAssigned`.
//! 5. Every referenced `Configuration` and `Revision` is tracked.
//! 6. The finalizer is added before any child exists.
//! 7. Placeholder services are created.
//! 8. Certificates are reconciled and TLS bindings computed.
//! 9. The `EdgeIngress` is reconciled and its readiness copied into status.
//! 10. Placeholder services are pointed at the ingress load balancer.
//! 11. `observedGeneration` is recorded.
//!
//! Status is written once at the end, only when it changed, and also when the
//! pass failed so users see the failing condition.

pub mod api;
pub mod deletion;
pub mod tls;

use crate::config::RouteConfig;
use crate::constants::ROUTE_FINALIZER;
use crate::context::Listers;
use crate::crd::{Addressable, Certificate, EdgeIngress, Route, RouteSpec, RouteStatus};
use crate::domains::{cluster_local_host, effective_visibility, host_for, http_url};
use crate::events::{EventPublisher, ACTION_RECONCILE};
use crate::labels::NEEDS_UPGRADE_ANNOTATION;
use crate::metrics;
use crate::reconcilers::child::{
    ensure_desired, ensure_exists, ChildApi, IngressInput, PlaceholderInput,
};
use crate::reconcilers::finalizers::ensure_finalizer;
use crate::reconcilers::status::status_changed;
use crate::route_resources::ingress_class;
use crate::status_reasons::{EVENT_REASON_INTERNAL_ERROR, EVENT_REASON_UPDATE_FAILED};
use crate::tracker::{DependencyRef, Tracker};
use crate::traffic::{self, References, Resolution, TrafficConfig};
use anyhow::{Context as _, Result};
use api::RouteApi;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::events::EventType;
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives routes toward their desired state.
///
/// Every collaborator is injected so the reconciler can run against the
/// cluster or against in-memory fakes.
pub struct RouteReconciler {
    pub config: Arc<RouteConfig>,
    pub listers: Arc<dyn Listers>,
    pub routes: Arc<dyn RouteApi>,
    pub ingresses: Arc<dyn ChildApi<EdgeIngress>>,
    pub certificates: Arc<dyn ChildApi<Certificate>>,
    pub services: Arc<dyn ChildApi<Service>>,
    pub tracker: Arc<dyn Tracker>,
    pub events: Arc<dyn EventPublisher>,
}

/// Split a `namespace/name` work-queue key.
#[must_use]
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    match key.split_once('/') {
        Some((namespace, name))
            if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Some((namespace, name))
        }
        _ => None,
    }
}

/// Fill in fields older clients left empty.
///
/// `latestRevision` follows whether a fixed revision is named. A lone target
/// without a percent receives all traffic; any other missing percent is 0.
pub fn set_defaults(spec: &mut RouteSpec) {
    let single = spec.traffic.len() == 1;
    for target in &mut spec.traffic {
        if target.latest_revision.is_none() {
            target.latest_revision = Some(target.revision_name.is_none());
        }
        if target.percent.is_none() {
            target.percent = Some(if single { 100 } else { 0 });
        }
    }
}

impl RouteReconciler {
    /// Reconcile the route identified by a `namespace/name` key.
    ///
    /// Invalid keys and routes that no longer exist are logged and dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when the pass or the status write failed; the caller
    /// is expected to retry with backoff.
    pub async fn reconcile(&self, key: &str) -> Result<()> {
        let Some((namespace, name)) = split_key(key) else {
            error!("Invalid resource key: {}", key);
            return Ok(());
        };

        let Some(original) = self.listers.route(namespace, name) else {
            info!("Route {} in work queue no longer exists", key);
            return Ok(());
        };

        // The cached object is shared with every other reader.
        let mut route = Route::clone(&original);
        let result = self.reconcile_route(&mut route).await;
        let route_ref = original.object_ref(&());

        if let Err(e) = &result {
            warn!("Failed to reconcile Route {}: {:#}", key, e);
            self.events
                .publish(
                    &route_ref,
                    EventType::Warning,
                    EVENT_REASON_INTERNAL_ERROR,
                    ACTION_RECONCILE,
                    Some(format!("{e:#}")),
                )
                .await;
        }

        if let Some(status) = route.status.as_ref() {
            if status_changed(original.status.as_ref(), status) {
                debug!("Updating status of Route {}", key);
                if let Err(e) = self.routes.update_status(&route).await {
                    warn!("Failed to update status of Route {}: {:#}", key, e);
                    self.events
                        .publish(
                            &route_ref,
                            EventType::Warning,
                            EVENT_REASON_UPDATE_FAILED,
                            ACTION_RECONCILE,
                            Some(format!("Failed to update status for Route {name:?}: {e:#}")),
                        )
                        .await;
                    return Err(e);
                }
            }
        }

        result?;
        self.mark_needs_upgrade(&original).await
    }

    /// Annotate routes whose stored spec predates the current defaults.
    async fn mark_needs_upgrade(&self, original: &Route) -> Result<()> {
        if original.metadata.deletion_timestamp.is_some()
            || original.annotations().contains_key(NEEDS_UPGRADE_ANNOTATION)
        {
            return Ok(());
        }

        let mut defaulted = original.spec.clone();
        set_defaults(&mut defaulted);
        if defaulted == original.spec {
            return Ok(());
        }

        let namespace = original.namespace().unwrap_or_default();
        let name = original.name_any();
        info!("Marking Route {}/{} as needing a spec upgrade", namespace, name);
        let patch = json!({
            "metadata": { "annotations": { NEEDS_UPGRADE_ANNOTATION: "true" } }
        });
        self.routes
            .patch_metadata(&namespace, &name, &patch)
            .await
            .with_context(|| format!("Failed to annotate Route {namespace}/{name}"))?;
        Ok(())
    }

    async fn reconcile_route(&self, route: &mut Route) -> Result<()> {
        if route.metadata.deletion_timestamp.is_some() {
            return deletion::finalize(self, route).await;
        }

        set_defaults(&mut route.spec);
        let mut status = route.status.take().unwrap_or_default();
        status.initialize_conditions();

        let result = self.reconcile_resources(route, &mut status).await;
        route.status = Some(status);
        result
    }

    async fn reconcile_resources(&self, route: &mut Route, status: &mut RouteStatus) -> Result<()> {
        let namespace = route.namespace().unwrap_or_default();
        let name = route.name_any();

        let host = host_for(
            &self.config,
            route,
            &name,
            effective_visibility(route, None),
        )
        .with_context(|| format!("Failed to compute the URL of Route {namespace}/{name}"))?;
        status.url = Some(http_url(&host));
        status.address = Some(Addressable {
            url: Some(http_url(&cluster_local_host(&self.config, &name, &namespace))),
        });

        let resolution = match traffic::resolve(route, &self.config, self.listers.as_ref()) {
            Ok(resolution) => resolution,
            Err(e) => {
                status.mark_unknown_traffic_error(&e.to_string());
                return Err(e).with_context(|| {
                    format!("Failed to resolve traffic of Route {namespace}/{name}")
                });
            }
        };

        self.track_references(route, resolution.references());

        let traffic = match resolution {
            Resolution::Resolved(traffic) => traffic,
            Resolution::Unresolved { error, .. } => {
                info!(
                    "Route {}/{} has an unresolved traffic target: {}",
                    namespace, name, error
                );
                metrics::record_target_error(error.reason());
                status.mark_target_error(&error);
                status.observed_generation = route.metadata.generation;
                return Ok(());
            }
        };
        status.mark_traffic_assigned();
        status.traffic = traffic.status_targets();

        if let Some(patched) = ensure_finalizer(self.routes.as_ref(), route, ROUTE_FINALIZER).await?
        {
            route.metadata.resource_version = patched.metadata.resource_version;
            route.metadata.finalizers = patched.metadata.finalizers;
        }

        self.ensure_placeholders(route, &traffic).await?;

        let domains = tls::desired_domains(&traffic);
        let bindings = tls::reconcile_tls(self, route, &domains, status).await?;

        let input = IngressInput {
            traffic: &traffic,
            tls: bindings,
            ingress_class: ingress_class(route, &self.config.default_ingress_class),
            config: &self.config,
        };
        let ingress =
            ensure_desired(self.ingresses.as_ref(), self.events.as_ref(), route, &input).await?;

        let ingress_current = ingress.status.as_ref().and_then(|s| s.observed_generation)
            == ingress.metadata.generation;
        if ingress_current {
            status.propagate_ingress_status(ingress.ready_condition());
        } else {
            status.mark_ingress_not_configured();
        }

        self.point_placeholders_at(route, &traffic, &ingress).await?;

        status.observed_generation = route.metadata.generation;
        Ok(())
    }

    fn track_references(&self, route: &Route, references: &References) {
        let namespace = route.namespace().unwrap_or_default();
        let dependent = ObjectRef::from_obj(route);
        for name in &references.configurations {
            self.tracker
                .track(DependencyRef::configuration(&namespace, name), &dependent);
        }
        for name in &references.revisions {
            self.tracker
                .track(DependencyRef::revision(&namespace, name), &dependent);
        }
    }

    /// Create a placeholder service per traffic group so its cluster DNS name
    /// resolves before the ingress is live. Existing services are kept as is.
    async fn ensure_placeholders(&self, route: &Route, traffic: &TrafficConfig) -> Result<()> {
        for host in traffic.hosts.values() {
            let input = PlaceholderInput {
                host,
                external_name: &host.host,
            };
            ensure_exists(self.services.as_ref(), self.events.as_ref(), route, &input).await?;
        }
        Ok(())
    }

    /// Alias every placeholder service to the ingress load balancer.
    ///
    /// Load balancers exposing only an IP leave the placeholders unchanged.
    async fn point_placeholders_at(
        &self,
        route: &Route,
        traffic: &TrafficConfig,
        ingress: &EdgeIngress,
    ) -> Result<()> {
        let Some(target) = ingress
            .load_balancer()
            .and_then(|lb| lb.domain_internal.as_deref().or(lb.domain.as_deref()))
            .filter(|name| !name.is_empty())
        else {
            debug!(
                "EdgeIngress {} has no load balancer domain yet",
                ingress.name_any()
            );
            return Ok(());
        };

        for host in traffic.hosts.values() {
            let input = PlaceholderInput {
                host,
                external_name: target,
            };
            ensure_desired(self.services.as_ref(), self.events.as_ref(), route, &input).await?;
        }
        Ok(())
    }
}
