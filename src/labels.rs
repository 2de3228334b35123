// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and Routeplane-specific labels/annotations
//! to ensure consistency across all resources created by the controller.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of` indicating this resource is part of Routeplane
pub const PART_OF_ROUTEPLANE: &str = "routeplane";

/// Value for `app.kubernetes.io/managed-by` on everything the route controller creates
pub const MANAGED_BY_ROUTE: &str = "Route";

/// Component value for TLS certificates
pub const COMPONENT_CERTIFICATE: &str = "certificate";

/// Component value for the edge ingress
pub const COMPONENT_INGRESS: &str = "ingress";

/// Component value for placeholder services
pub const COMPONENT_PLACEHOLDER: &str = "placeholder";

// ============================================================================
// Routeplane-Specific Labels
// ============================================================================

/// Label carrying the name of the `Route` that owns a child resource
pub const ROUTE_LABEL: &str = "routeplane.firestoned.io/route";

/// Label carrying the namespace of the `Route` that owns a child resource
pub const ROUTE_NAMESPACE_LABEL: &str = "routeplane.firestoned.io/route-namespace";

/// Label a `Revision` carries naming the `Configuration` it was stamped from
pub const CONFIGURATION_LABEL: &str = "routeplane.firestoned.io/configuration";

/// Label that restricts a `Route` (or a `Service`) to the cluster network
pub const VISIBILITY_LABEL: &str = "routeplane.firestoned.io/visibility";

/// Value of [`VISIBILITY_LABEL`] for cluster-local routes
pub const VISIBILITY_CLUSTER_LOCAL: &str = "cluster-local";

// ============================================================================
// Routeplane-Specific Annotations
// ============================================================================

/// Annotation selecting the ingress implementation for a `Route`
pub const INGRESS_CLASS_ANNOTATION: &str = "routeplane.firestoned.io/ingress.class";

/// Annotation set when a stored `Route` spec predates the current defaults
pub const NEEDS_UPGRADE_ANNOTATION: &str = "routeplane.firestoned.io/needs-upgrade";

// ============================================================================
// Request Headers
// ============================================================================

/// Header the edge proxy appends naming the revision that served a request
pub const REVISION_HEADER: &str = "Routeplane-Revision";

/// Header the edge proxy appends naming the revision's namespace
pub const REVISION_NAMESPACE_HEADER: &str = "Routeplane-Revision-Namespace";
