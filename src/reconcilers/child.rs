// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic create-or-update reconciliation for route children.
//!
//! Every resource the route controller produces goes through
//! [`ensure_desired`] (or [`ensure_exists`], which stops after step 3):
//!
//! 1. Look the child up by its deterministic name.
//! 2. Absent: create it (the desired object already carries the owner reference).
//! 3. Present but controlled by someone else: fail, never adopt.
//! 4. Present and semantically equal: return it untouched.
//! 5. Otherwise: copy the fields this controller owns onto the observed
//!    object and update, leaving fields set by other controllers alone.
//!
//! Per-kind behavior lives in [`ChildResource`] implementations.

use crate::config::RouteConfig;
use crate::constants::{KIND_CERTIFICATE, KIND_EDGE_INGRESS, KIND_SERVICE};
use crate::crd::{Certificate, EdgeIngress, IngressTls, Route};
use crate::events::{EventPublisher, ACTION_RECONCILE};
use crate::metrics;
use crate::route_errors::ChildError;
use crate::route_resources::{
    certificate_name, is_controlled_by, make_certificate, make_edge_ingress,
    make_placeholder_service,
};
use crate::status_reasons::EVENT_REASON_CREATED;
use crate::traffic::{TrafficConfig, TrafficHost};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::runtime::events::EventType;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Namespace-scoped CRUD against the cluster store for one child kind.
#[async_trait]
pub trait ChildApi<K: Send + Sync + 'static>: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>>;
    async fn create(&self, namespace: &str, obj: &K) -> Result<K>;
    async fn update(&self, namespace: &str, obj: &K) -> Result<K>;
    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>>;
    /// Deleting an object that does not exist succeeds.
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}

/// [`ChildApi`] backed by the Kubernetes API.
pub struct KubeChildApi<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeChildApi<K> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K> ChildApi<K> for KubeChildApi<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create(&self, namespace: &str, obj: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&PostParams::default(), obj).await?)
    }

    async fn update(&self, namespace: &str, obj: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .replace(&obj.name_any(), &PostParams::default(), obj)
            .await?)
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(list.items)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!("{} {}/{} already deleted", K::kind(&()), namespace, name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Per-kind capabilities used by [`ensure_desired`].
pub trait ChildResource:
    Resource<DynamicType = ()> + Clone + Debug + Send + Sync + 'static
{
    /// Kind name used in logs, errors and metrics.
    const KIND: &'static str;

    /// Inputs needed to build the desired object besides the route.
    type Input<'a>;

    /// Deterministic name of the child.
    fn name_for(route: &Route, input: &Self::Input<'_>) -> String;

    fn build_desired(route: &Route, input: &Self::Input<'_>) -> Self;

    /// Compare only the fields this controller sets.
    fn semantic_eq(&self, observed: &Self) -> bool;

    /// Copy the fields this controller sets onto `observed`.
    fn apply_desired(&self, observed: &mut Self);
}

fn labels_contained(desired: &ObjectMeta, observed: &ObjectMeta) -> bool {
    let observed_labels = observed.labels.as_ref();
    desired.labels.iter().flatten().all(|(key, value)| {
        observed_labels.and_then(|labels| labels.get(key)) == Some(value)
    })
}

fn merge_map(
    desired: Option<&BTreeMap<String, String>>,
    observed: &mut Option<BTreeMap<String, String>>,
) {
    if let Some(desired) = desired {
        let target = observed.get_or_insert_with(BTreeMap::new);
        target.extend(desired.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

enum Lookup<K> {
    Created(K),
    Existing(K),
}

/// Fetch the child named by `input`, creating it when absent.
///
/// An existing child must be controlled by `route`.
async fn get_or_create<K: ChildResource>(
    api: &dyn ChildApi<K>,
    events: &dyn EventPublisher,
    route: &Route,
    input: &K::Input<'_>,
) -> Result<Lookup<K>> {
    let namespace = route.namespace().unwrap_or_default();
    let name = K::name_for(route, input);
    let uid = route.metadata.uid.as_deref().unwrap_or_default();

    let Some(observed) = api
        .get(&namespace, &name)
        .await
        .with_context(|| format!("Failed to get {} {}/{}", K::KIND, namespace, name))?
    else {
        let desired = K::build_desired(route, input);
        let created = api
            .create(&namespace, &desired)
            .await
            .with_context(|| format!("Failed to create {} {}/{}", K::KIND, namespace, name))?;
        info!("Created {} {}/{}", K::KIND, namespace, name);
        metrics::record_child_write(K::KIND, metrics::OPERATION_CREATED);
        events
            .publish(
                &route.object_ref(&()),
                EventType::Normal,
                EVENT_REASON_CREATED,
                ACTION_RECONCILE,
                Some(format!("Created {} \"{}\"", K::KIND, name)),
            )
            .await;
        return Ok(Lookup::Created(created));
    };

    if !is_controlled_by(observed.meta(), uid) {
        return Err(ChildError::NotOwned {
            kind: K::KIND.to_string(),
            namespace,
            name,
        }
        .into());
    }
    Ok(Lookup::Existing(observed))
}

/// Ensure the child exists, leaving an existing one untouched.
///
/// # Errors
///
/// Returns an error if the API call fails, or [`ChildError::NotOwned`] if an
/// object with the same name exists but is controlled by something else.
pub async fn ensure_exists<K: ChildResource>(
    api: &dyn ChildApi<K>,
    events: &dyn EventPublisher,
    route: &Route,
    input: &K::Input<'_>,
) -> Result<K> {
    match get_or_create(api, events, route, input).await? {
        Lookup::Created(child) | Lookup::Existing(child) => Ok(child),
    }
}

/// Ensure the child described by `input` exists and matches.
///
/// Returns the object as stored after any write, so callers can read status
/// fields maintained by the child's own controller.
///
/// # Errors
///
/// Returns an error if the API call fails, or [`ChildError::NotOwned`] if an
/// object with the same name exists but is controlled by something else.
pub async fn ensure_desired<K: ChildResource>(
    api: &dyn ChildApi<K>,
    events: &dyn EventPublisher,
    route: &Route,
    input: &K::Input<'_>,
) -> Result<K> {
    let observed = match get_or_create(api, events, route, input).await? {
        Lookup::Created(created) => return Ok(created),
        Lookup::Existing(observed) => observed,
    };

    let desired = K::build_desired(route, input);
    let namespace = route.namespace().unwrap_or_default();
    let name = observed.name_any();
    if desired.semantic_eq(&observed) {
        debug!("{} {}/{} is up to date", K::KIND, namespace, name);
        return Ok(observed);
    }

    let mut updated = observed;
    desired.apply_desired(&mut updated);
    let stored = api
        .update(&namespace, &updated)
        .await
        .with_context(|| format!("Failed to update {} {}/{}", K::KIND, namespace, name))?;
    info!("Updated {} {}/{}", K::KIND, namespace, name);
    metrics::record_child_write(K::KIND, metrics::OPERATION_UPDATED);
    Ok(stored)
}

// ============================================================================
// Certificate
// ============================================================================

/// Host and tag a certificate is requested for.
pub struct CertificateInput<'a> {
    pub host: &'a str,
    pub tag: &'a str,
}

impl ChildResource for Certificate {
    const KIND: &'static str = KIND_CERTIFICATE;
    type Input<'a> = CertificateInput<'a>;

    fn name_for(route: &Route, input: &Self::Input<'_>) -> String {
        certificate_name(route, input.tag)
    }

    fn build_desired(route: &Route, input: &Self::Input<'_>) -> Self {
        make_certificate(route, input.host, input.tag)
    }

    fn semantic_eq(&self, observed: &Self) -> bool {
        self.spec == observed.spec && labels_contained(&self.metadata, &observed.metadata)
    }

    fn apply_desired(&self, observed: &mut Self) {
        observed.spec = self.spec.clone();
        merge_map(self.metadata.labels.as_ref(), &mut observed.metadata.labels);
    }
}

// ============================================================================
// EdgeIngress
// ============================================================================

/// Everything the ingress is generated from.
pub struct IngressInput<'a> {
    pub traffic: &'a TrafficConfig,
    pub tls: Vec<IngressTls>,
    pub ingress_class: String,
    pub config: &'a RouteConfig,
}

impl ChildResource for EdgeIngress {
    const KIND: &'static str = KIND_EDGE_INGRESS;
    type Input<'a> = IngressInput<'a>;

    fn name_for(route: &Route, _input: &Self::Input<'_>) -> String {
        route.name_any()
    }

    fn build_desired(route: &Route, input: &Self::Input<'_>) -> Self {
        make_edge_ingress(
            route,
            input.traffic,
            input.tls.clone(),
            &input.ingress_class,
            input.config,
        )
    }

    fn semantic_eq(&self, observed: &Self) -> bool {
        let annotations_contained = self.metadata.annotations.iter().flatten().all(|(k, v)| {
            observed
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(k))
                == Some(v)
        });
        self.spec == observed.spec
            && annotations_contained
            && labels_contained(&self.metadata, &observed.metadata)
    }

    fn apply_desired(&self, observed: &mut Self) {
        observed.spec = self.spec.clone();
        merge_map(self.metadata.labels.as_ref(), &mut observed.metadata.labels);
        merge_map(
            self.metadata.annotations.as_ref(),
            &mut observed.metadata.annotations,
        );
    }
}

// ============================================================================
// Placeholder Service
// ============================================================================

/// Traffic group a placeholder service stands in for and where it points.
pub struct PlaceholderInput<'a> {
    pub host: &'a TrafficHost,
    pub external_name: &'a str,
}

/// `(name, port)` of every service port; the API server fills in the rest.
fn port_keys(service: &Service) -> Vec<(Option<String>, i32)> {
    service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(|ports| ports.iter().map(|p| (p.name.clone(), p.port)).collect())
        .unwrap_or_default()
}

impl ChildResource for Service {
    const KIND: &'static str = KIND_SERVICE;
    type Input<'a> = PlaceholderInput<'a>;

    fn name_for(_route: &Route, input: &Self::Input<'_>) -> String {
        input.host.name.clone()
    }

    fn build_desired(route: &Route, input: &Self::Input<'_>) -> Self {
        make_placeholder_service(route, input.host, input.external_name)
    }

    fn semantic_eq(&self, observed: &Self) -> bool {
        let (Some(desired), Some(current)) = (self.spec.as_ref(), observed.spec.as_ref()) else {
            return self.spec.is_none() && observed.spec.is_none();
        };
        desired.type_ == current.type_
            && desired.external_name == current.external_name
            && port_keys(self) == port_keys(observed)
            && labels_contained(&self.metadata, &observed.metadata)
    }

    fn apply_desired(&self, observed: &mut Self) {
        merge_map(self.metadata.labels.as_ref(), &mut observed.metadata.labels);
        let Some(desired) = self.spec.as_ref() else {
            return;
        };
        let current = observed.spec.get_or_insert_with(Default::default);
        current.type_.clone_from(&desired.type_);
        current.external_name.clone_from(&desired.external_name);
        current.ports.clone_from(&desired.ports);
        if current.session_affinity.is_none() {
            current.session_affinity.clone_from(&desired.session_affinity);
        }
    }
}

#[cfg(test)]
#[path = "child_tests.rs"]
mod child_tests;
