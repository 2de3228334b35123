// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired child resources for a `Route`.
//!
//! Pure builders for everything the route controller creates:
//!
//! - [`make_certificate`] - one `Certificate` per public host
//! - [`make_edge_ingress`] - the single `EdgeIngress` carrying the weighted splits
//! - [`make_placeholder_service`] - one `ExternalName` `Service` per traffic group
//!
//! Every child is named deterministically, labeled with its route, and
//! carries a controller owner reference back to the route so cluster garbage
//! collection removes it with the route.

use crate::config::RouteConfig;
use crate::constants::{API_GROUP_VERSION, HTTP_PORT, HTTP_PORT_NAME, KIND_ROUTE};
use crate::crd::{
    Certificate, CertificateSpec, EdgeIngress, EdgeIngressSpec, IngressBackendSplit, IngressRule,
    IngressTls, Route, Visibility,
};
use crate::domains::cluster_local_host;
use crate::labels::{
    COMPONENT_CERTIFICATE, COMPONENT_INGRESS, COMPONENT_PLACEHOLDER, INGRESS_CLASS_ANNOTATION,
    K8S_COMPONENT, K8S_MANAGED_BY, K8S_PART_OF, MANAGED_BY_ROUTE, PART_OF_ROUTEPLANE,
    REVISION_HEADER, REVISION_NAMESPACE_HEADER, ROUTE_LABEL, ROUTE_NAMESPACE_LABEL,
};
use crate::traffic::{RevisionTarget, TrafficConfig, TrafficHost};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Builds the standard labels for a child of `route`.
#[must_use]
pub fn build_labels(route: &Route, component: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(ROUTE_LABEL.into(), route.name_any());
    labels.insert(
        ROUTE_NAMESPACE_LABEL.into(),
        route.namespace().unwrap_or_default(),
    );
    labels.insert(K8S_COMPONENT.into(), component.into());
    labels.insert(K8S_MANAGED_BY.into(), MANAGED_BY_ROUTE.into());
    labels.insert(K8S_PART_OF.into(), PART_OF_ROUTEPLANE.into());
    labels
}

/// Label selector matching every child of `route`.
#[must_use]
pub fn route_label_selector(route: &Route) -> String {
    format!(
        "{ROUTE_LABEL}={},{ROUTE_NAMESPACE_LABEL}={}",
        route.name_any(),
        route.namespace().unwrap_or_default()
    )
}

/// Builds owner references for a child of `route`.
///
/// The reference is marked as controller so other controllers see the route
/// as the single owner of the child.
#[must_use]
pub fn build_owner_references(route: &Route) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_ROUTE.to_string(),
        name: route.name_any(),
        uid: route.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Returns true when `meta` names the route with `uid` as its controller.
#[must_use]
pub fn is_controlled_by(meta: &ObjectMeta, uid: &str) -> bool {
    meta.owner_references.as_ref().is_some_and(|refs| {
        refs.iter()
            .any(|r| r.controller == Some(true) && r.kind == KIND_ROUTE && r.uid == uid)
    })
}

fn child_meta(route: &Route, name: String, component: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: route.namespace(),
        labels: Some(build_labels(route, component)),
        owner_references: Some(build_owner_references(route)),
        ..Default::default()
    }
}

// ============================================================================
// Certificates
// ============================================================================

/// Deterministic certificate (and secret) name for a tag of the route.
///
/// The primary host gets `<route>-<uid>`; every tag gets
/// `<route>-<uid>-<adler32(tag)>`.
#[must_use]
pub fn certificate_name(route: &Route, tag: &str) -> String {
    let base = format!(
        "{}-{}",
        route.name_any(),
        route.metadata.uid.as_deref().unwrap_or_default()
    );
    if tag.is_empty() {
        return base;
    }
    let mut hasher = adler2::Adler32::new();
    hasher.write_slice(tag.as_bytes());
    format!("{base}-{}", hasher.checksum())
}

/// Builds the desired certificate for one host of the route.
#[must_use]
pub fn make_certificate(route: &Route, host: &str, tag: &str) -> Certificate {
    let name = certificate_name(route, tag);
    Certificate {
        metadata: child_meta(route, name.clone(), COMPONENT_CERTIFICATE),
        spec: CertificateSpec {
            dns_names: vec![host.to_string()],
            secret_name: name,
        },
        status: None,
    }
}

// ============================================================================
// EdgeIngress
// ============================================================================

/// Ingress class for the route: its annotation, or the configured default.
#[must_use]
pub fn ingress_class(route: &Route, default_class: &str) -> String {
    route
        .annotations()
        .get(INGRESS_CLASS_ANNOTATION)
        .filter(|class| !class.is_empty())
        .cloned()
        .unwrap_or_else(|| default_class.to_string())
}

/// Weighted splits for one traffic group; targets sharing a revision are merged.
fn make_splits(targets: &[RevisionTarget], namespace: &str) -> Vec<IngressBackendSplit> {
    let mut merged: Vec<IngressBackendSplit> = Vec::new();
    for target in targets.iter().filter(|t| t.percent > 0) {
        if let Some(split) = merged
            .iter_mut()
            .find(|s| s.service_name == target.revision_name)
        {
            split.percent += target.percent;
            continue;
        }
        merged.push(IngressBackendSplit {
            service_name: target.revision_name.clone(),
            service_namespace: namespace.to_string(),
            service_port: HTTP_PORT,
            percent: target.percent,
            append_headers: BTreeMap::from([
                (REVISION_HEADER.to_string(), target.revision_name.clone()),
                (REVISION_NAMESPACE_HEADER.to_string(), namespace.to_string()),
            ]),
        });
    }
    merged
}

fn make_rules(
    host: &TrafficHost,
    splits: &[IngressBackendSplit],
    namespace: &str,
    config: &RouteConfig,
) -> Vec<IngressRule> {
    let mut rules = Vec::with_capacity(2);
    let internal = cluster_local_host(config, &host.name, namespace);
    let mut internal_hosts = vec![internal];

    match host.visibility {
        Visibility::Public => rules.push(IngressRule {
            hosts: vec![host.host.clone()],
            visibility: Visibility::Public,
            splits: splits.to_vec(),
        }),
        Visibility::ClusterLocal => {
            if !internal_hosts.contains(&host.host) {
                internal_hosts.push(host.host.clone());
            }
        }
    }

    rules.push(IngressRule {
        hosts: internal_hosts,
        visibility: Visibility::ClusterLocal,
        splits: splits.to_vec(),
    });
    rules
}

/// Builds the desired `EdgeIngress` for a resolved route.
#[must_use]
pub fn make_edge_ingress(
    route: &Route,
    traffic: &TrafficConfig,
    tls: Vec<IngressTls>,
    ingress_class: &str,
    config: &RouteConfig,
) -> EdgeIngress {
    let namespace = route.namespace().unwrap_or_default();

    let rules: Vec<IngressRule> = traffic
        .hosts
        .iter()
        .flat_map(|(tag, host)| {
            let splits = traffic
                .targets
                .get(tag)
                .map(|targets| make_splits(targets, &namespace))
                .unwrap_or_default();
            make_rules(host, &splits, &namespace, config)
        })
        .collect();

    let visibility = if rules.iter().any(|r| r.visibility == Visibility::Public) {
        Visibility::Public
    } else {
        Visibility::ClusterLocal
    };

    let mut metadata = child_meta(route, route.name_any(), COMPONENT_INGRESS);
    metadata.annotations = Some(BTreeMap::from([(
        INGRESS_CLASS_ANNOTATION.to_string(),
        ingress_class.to_string(),
    )]));

    EdgeIngress {
        metadata,
        spec: EdgeIngressSpec {
            visibility,
            rules,
            tls,
        },
        status: None,
    }
}

// ============================================================================
// Placeholder Services
// ============================================================================

/// Builds the placeholder `Service` for one traffic group.
///
/// The service exists so that `<name>.<namespace>.svc` resolves before the
/// ingress is live; it aliases `external_name` through DNS.
#[must_use]
pub fn make_placeholder_service(route: &Route, host: &TrafficHost, external_name: &str) -> Service {
    Service {
        metadata: child_meta(route, host.name.clone(), COMPONENT_PLACEHOLDER),
        spec: Some(ServiceSpec {
            type_: Some("ExternalName".into()),
            external_name: Some(external_name.to_string()),
            session_affinity: Some("None".into()),
            ports: Some(vec![ServicePort {
                name: Some(HTTP_PORT_NAME.into()),
                port: HTTP_PORT,
                target_port: Some(IntOrString::Int(HTTP_PORT)),
                protocol: Some("TCP".into()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    }
}

#[cfg(test)]
#[path = "route_resources_tests.rs"]
mod route_resources_tests;
