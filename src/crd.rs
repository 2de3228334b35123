// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for route management.
//!
//! This module defines all Kubernetes Custom Resource Definitions the route
//! controller reads or writes.
//!
//! # Resource Types
//!
//! ## Reconciled
//!
//! - [`Route`] - Weighted traffic targets exposed on one or more hosts
//!
//! ## Consumed
//!
//! - [`Configuration`] - Points at the latest ready [`Revision`]
//! - [`Revision`] - An immutable deployable snapshot
//!
//! ## Produced
//!
//! - [`Certificate`] - A TLS provisioning request for a set of DNS names
//! - [`EdgeIngress`] - The edge-routing resource generated for a [`Route`]
//!
//! # Example: Splitting traffic between two revisions
//!
//! ```rust,no_run
//! use routeplane::crd::{RouteSpec, TrafficTarget};
//!
//! let spec = RouteSpec {
//!     traffic: vec![
//!         TrafficTarget {
//!             revision_name: Some("hello-00001".to_string()),
//!             percent: Some(90),
//!             ..Default::default()
//!         },
//!         TrafficTarget {
//!             configuration_name: Some("hello".to_string()),
//!             tag: Some("candidate".to_string()),
//!             percent: Some(10),
//!             ..Default::default()
//!         },
//!     ],
//! };
//! ```

use crate::status_reasons::{
    CONDITION_TYPE_ACTIVE, CONDITION_TYPE_READY, STATUS_FALSE, STATUS_TRUE,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Route conditions: Ready, AllTrafficAssigned, IngressReady,
    /// CertificateProvisioned.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Look up a condition by type.
fn condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Network reachability of a route or of a single traffic target.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    /// Reachable from outside the cluster through the public domain.
    #[default]
    Public,
    /// Reachable only through the cluster-local service domain.
    ClusterLocal,
}

// ============================================================================
// Route
// ============================================================================

/// One weighted entry of a route's traffic block.
///
/// Exactly one of `revisionName` and `configurationName` must be set.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTarget {
    /// Optional name exposing this target on its own subdomain.
    ///
    /// Non-empty tags must be unique within one route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// A fixed revision to send traffic to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,

    /// A configuration whose latest ready revision receives traffic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_name: Option<String>,

    /// Whether the target floats with the configuration's latest ready revision.
    ///
    /// Defaults to `true` when no `revisionName` is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_revision: Option<bool>,

    /// Share of the route's traffic, 0-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0, max = 100))]
    pub percent: Option<i64>,

    /// Restricts this target's tag host to the cluster network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

/// `Route` exposes revisions on one or more hosts with a weighted split.
///
/// # Example YAML
///
/// ```yaml
/// apiVersion: routeplane.firestoned.io/v1alpha1
/// kind: Route
/// metadata:
///   name: hello
///   namespace: default
/// spec:
///   traffic:
///     - revisionName: hello-00001
///       percent: 90
///     - configurationName: hello
///       tag: candidate
///       percent: 10
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "routeplane.firestoned.io",
    version = "v1alpha1",
    kind = "Route",
    namespaced,
    shortname = "rt",
    doc = "Route maps weighted traffic targets (Revisions, or the latest ready Revision of a Configuration) to public and cluster-local hosts, with optional per-tag subdomains and automatic TLS.",
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.url"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].reason"}"#
)]
#[kube(status = "RouteStatus")]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Weighted traffic targets, in priority order.
    #[serde(default)]
    pub traffic: Vec<TrafficTarget>,
}

/// Address reachable from inside the cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Addressable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A traffic target bound to a concrete revision.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTargetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    pub revision_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_name: Option<String>,

    #[serde(default)]
    pub latest_revision: bool,

    pub percent: i64,

    /// Externally visible URL; only set for tagged targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// `Route` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Primary URL of the route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Cluster-local address of the route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Addressable>,

    /// Resolved traffic targets, in declaration order.
    #[serde(default)]
    pub traffic: Vec<TrafficTargetStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

// ============================================================================
// Configuration / Revision
// ============================================================================

/// `Configuration` tracks the latest revision stamped out from a template.
///
/// The route controller only reads its status.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "routeplane.firestoned.io",
    version = "v1alpha1",
    kind = "Configuration",
    namespaced,
    shortname = "config",
    doc = "Configuration describes the desired deployable template and points at the latest Revision created from it."
)]
#[kube(status = "ConfigurationStatus")]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    /// Container image revisions are stamped from.
    #[serde(default)]
    pub image: String,
}

/// `Configuration` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_created_revision_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_ready_revision_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Configuration {
    /// Returns true when the configuration's Ready condition is explicitly False.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| condition(&s.conditions, CONDITION_TYPE_READY))
            .is_some_and(|c| c.status == STATUS_FALSE)
    }

    /// Name of the latest revision that became ready, if any.
    #[must_use]
    pub fn latest_ready_revision(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.latest_ready_revision_name.as_deref())
            .filter(|name| !name.is_empty())
    }
}

/// `Revision` is an immutable snapshot of a configuration.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "routeplane.firestoned.io",
    version = "v1alpha1",
    kind = "Revision",
    namespaced,
    shortname = "rev",
    doc = "Revision is an immutable snapshot of a Configuration. It reports readiness and whether it is scaled to zero."
)]
#[kube(status = "RevisionStatus")]
#[serde(rename_all = "camelCase")]
pub struct RevisionSpec {
    #[serde(default)]
    pub image: String,
}

/// `Revision` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionStatus {
    /// Ready plus Active; Active=False means the revision is scaled to zero.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Revision {
    fn ready_status(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| condition(&s.conditions, CONDITION_TYPE_READY))
            .map(|c| c.status.as_str())
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready_status() == Some(STATUS_TRUE)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.ready_status() == Some(STATUS_FALSE)
    }

    /// Returns true when the revision is scaled to zero and needs activation
    /// before it can serve.
    #[must_use]
    pub fn activation_required(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| condition(&s.conditions, CONDITION_TYPE_ACTIVE))
            .is_some_and(|c| c.status == STATUS_FALSE)
    }
}

// ============================================================================
// Certificate
// ============================================================================

/// `Certificate` requests a TLS certificate for a set of DNS names.
///
/// Provisioning is performed by a separate certificate controller; the route
/// controller only writes the spec and reads the Ready condition.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "routeplane.firestoned.io",
    version = "v1alpha1",
    kind = "Certificate",
    namespaced,
    shortname = "rcert",
    doc = "Certificate requests a TLS certificate covering dnsNames, stored in secretName once issued.",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(status = "CertificateStatus")]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    pub dns_names: Vec<String>,
    pub secret_name: String,
}

/// `Certificate` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,
}

/// Readiness of an observed certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertificateReadiness {
    Ready,
    NotReady,
    Unknown,
}

impl Certificate {
    #[must_use]
    pub fn readiness(&self) -> CertificateReadiness {
        let status = self
            .status
            .as_ref()
            .and_then(|s| condition(&s.conditions, CONDITION_TYPE_READY))
            .map(|c| c.status.as_str());
        match status {
            Some(STATUS_TRUE) => CertificateReadiness::Ready,
            Some(STATUS_FALSE) => CertificateReadiness::NotReady,
            _ => CertificateReadiness::Unknown,
        }
    }

    /// Reason and message of the Ready condition, for status reporting.
    #[must_use]
    pub fn ready_message(&self) -> Option<String> {
        self.status
            .as_ref()
            .and_then(|s| condition(&s.conditions, CONDITION_TYPE_READY))
            .and_then(|c| c.message.clone())
    }
}

// ============================================================================
// EdgeIngress
// ============================================================================

/// One weighted backend of an ingress rule.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackendSplit {
    pub service_name: String,
    pub service_namespace: String,
    pub service_port: i32,
    pub percent: i64,

    /// Headers the edge proxy appends to requests sent to this backend.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub append_headers: BTreeMap<String, String>,
}

/// Hosts that share one weighted split.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    pub hosts: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub splits: Vec<IngressBackendSplit>,
}

/// TLS termination for a set of hosts.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngressTls {
    pub hosts: Vec<String>,
    pub secret_name: String,
    pub secret_namespace: String,
}

/// `EdgeIngress` is the edge-routing specification generated for a `Route`.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "routeplane.firestoned.io",
    version = "v1alpha1",
    kind = "EdgeIngress",
    namespaced,
    shortname = "edgeing",
    doc = "EdgeIngress describes the weighted host routing and TLS termination an edge proxy must implement for one Route.",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(status = "EdgeIngressStatus")]
#[serde(rename_all = "camelCase")]
pub struct EdgeIngressSpec {
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub rules: Vec<IngressRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTls>,
}

/// One address the edge proxy is reachable at.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerIngress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_internal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerStatus {
    #[serde(default)]
    pub ingress: Vec<LoadBalancerIngress>,
}

/// `EdgeIngress` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgeIngressStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<LoadBalancerStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl EdgeIngress {
    /// The ingress Ready condition, if the ingress controller reported one.
    #[must_use]
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| condition(&s.conditions, CONDITION_TYPE_READY))
    }

    /// First load balancer entry, if any.
    #[must_use]
    pub fn load_balancer(&self) -> Option<&LoadBalancerIngress> {
        self.status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.first())
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
