// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Routeplane operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Routeplane CRDs
pub const API_GROUP: &str = "routeplane.firestoned.io";

/// API version for all Routeplane CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "routeplane.firestoned.io/v1alpha1";

/// Kind name for `Route` resource
pub const KIND_ROUTE: &str = "Route";

/// Kind name for `Configuration` resource
pub const KIND_CONFIGURATION: &str = "Configuration";

/// Kind name for `Revision` resource
pub const KIND_REVISION: &str = "Revision";

/// Kind name for `Certificate` resource
pub const KIND_CERTIFICATE: &str = "Certificate";

/// Kind name for `EdgeIngress` resource
pub const KIND_EDGE_INGRESS: &str = "EdgeIngress";

/// Kind name for core `Service` resources used as placeholder endpoints
pub const KIND_SERVICE: &str = "Service";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer token the route controller places on every `Route` before it
/// creates any child resource.
pub const ROUTE_FINALIZER: &str = "route.routeplane.firestoned.io/finalizer";

// ============================================================================
// Domain Constants
// ============================================================================

/// Domain used when no domain configuration is supplied
pub const DEFAULT_DOMAIN: &str = "example.com";

/// Default template for a route's public host
pub const DEFAULT_DOMAIN_TEMPLATE: &str = "{{.Name}}.{{.Namespace}}.{{.Domain}}";

/// Default template for a tagged target's subdomain name
pub const DEFAULT_TAG_TEMPLATE: &str = "{{.Name}}-{{.Tag}}";

/// Default Kubernetes cluster DNS domain
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

/// Maximum length of a DNS-1123 subdomain
pub const MAX_DNS_SUBDOMAIN_LEN: usize = 253;

/// Maximum length of a single DNS label
pub const MAX_DNS_LABEL_LEN: usize = 63;

// ============================================================================
// Traffic Constants
// ============================================================================

/// Total traffic share that all percent-bearing targets must add up to
pub const TOTAL_TRAFFIC_PERCENT: i64 = 100;

/// Port every placeholder service and ingress split points at
pub const HTTP_PORT: i32 = 80;

/// Name of the placeholder service port
pub const HTTP_PORT_NAME: &str = "http";

// ============================================================================
// Error Handling Constants
// ============================================================================

/// Initial requeue delay after a failed reconciliation (1 second)
pub const ERROR_BACKOFF_INITIAL_MILLIS: u64 = 1_000;

/// Maximum requeue delay after repeated failures (5 minutes)
pub const ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Backoff growth factor between consecutive failures
pub const ERROR_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor applied to each backoff interval (±10%)
pub const ERROR_BACKOFF_RANDOMIZATION: f64 = 0.1;

// ============================================================================
// Dependency Tracking Constants
// ============================================================================

/// How long a dependency subscription stays alive without being refreshed (30 minutes)
pub const DEFAULT_TRACKER_LEASE_SECS: u64 = 1_800;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of Tokio worker threads for the operator runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default number of routes reconciled in parallel
pub const DEFAULT_RECONCILE_WORKERS: u16 = 8;

/// Name reported by the event recorder
pub const CONTROLLER_NAME: &str = "routeplane-route-controller";

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness endpoint served next to metrics
pub const HEALTH_SERVER_PATH: &str = "/healthz";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
