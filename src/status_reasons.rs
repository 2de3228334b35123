// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition types and reasons for Routeplane resources.
//!
//! This module defines constants for condition reasons following Kubernetes conventions.
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status.
//!
//! # Condition Types
//!
//! A `Route` carries one condition per capability plus an encompassing `Ready`:
//!
//! - `AllTrafficAssigned` - every traffic target resolved to a routable revision
//! - `IngressReady` - the generated `EdgeIngress` reports Ready
//! - `CertificateProvisioned` - every certificate for the route's public hosts is issued
//! - `Ready` - `AllTrafficAssigned` and `IngressReady` are both True
//!
//! `CertificateProvisioned` is informational and does not gate `Ready`: a route
//! without certificates still serves plain HTTP.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: AllTrafficAssigned
//!       status: "False"
//!       reason: RevisionMissing
//!       message: "Revision \"hello-00002\" referenced in traffic not found."
//!     - type: Ready
//!       status: "False"
//!       reason: RevisionMissing
//!       message: "Revision \"hello-00002\" referenced in traffic not found."
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Encompassing readiness of a resource.
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Route condition: every traffic target is bound to a routable revision.
pub const CONDITION_TYPE_ALL_TRAFFIC_ASSIGNED: &str = "AllTrafficAssigned";

/// Route condition: the generated ingress is ready.
pub const CONDITION_TYPE_INGRESS_READY: &str = "IngressReady";

/// Route condition: certificates for all public hosts are issued.
pub const CONDITION_TYPE_CERTIFICATE_PROVISIONED: &str = "CertificateProvisioned";

/// Revision condition: False while the revision is scaled to zero.
pub const CONDITION_TYPE_ACTIVE: &str = "Active";

// ============================================================================
// Condition Status Values
// ============================================================================

pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";
pub const STATUS_UNKNOWN: &str = "Unknown";

// ============================================================================
// Common Reasons
// ============================================================================

/// Condition has been initialized and not yet evaluated.
pub const REASON_INITIALIZING: &str = "Initializing";

/// All capabilities of the route are ready.
pub const REASON_READY: &str = "Ready";

/// Traffic is assigned to routable revisions.
pub const REASON_TRAFFIC_ASSIGNED: &str = "TrafficAssigned";

/// The generated ingress reports Ready.
pub const REASON_INGRESS_READY: &str = "IngressReady";

/// The generated ingress has not reported Ready yet.
pub const REASON_INGRESS_NOT_CONFIGURED: &str = "IngressNotConfigured";

// ============================================================================
// Traffic Reasons
// ============================================================================

/// A referenced `Configuration` does not exist.
pub const REASON_CONFIGURATION_MISSING: &str = "ConfigurationMissing";

/// A referenced `Configuration` has no ready revision yet.
pub const REASON_CONFIGURATION_NOT_READY: &str = "ConfigurationNotReady";

/// A referenced `Configuration` reports Ready=False.
pub const REASON_CONFIGURATION_FAILED: &str = "ConfigurationFailed";

/// A referenced `Revision` does not exist.
pub const REASON_REVISION_MISSING: &str = "RevisionMissing";

/// A referenced `Revision` is neither Ready nor activatable.
pub const REASON_REVISION_NOT_READY: &str = "RevisionNotReady";

/// A referenced `Revision` reports Ready=False.
pub const REASON_REVISION_FAILED: &str = "RevisionFailed";

/// Resolution failed for a reason unrelated to a specific target.
///
/// **Usage:**
/// - Infrastructure failures while reading dependencies
/// - Malformed traffic blocks (duplicate tags, percents not summing to 100)
pub const REASON_UNKNOWN_TRAFFIC_ERROR: &str = "Unknown";

// ============================================================================
// Certificate Reasons
// ============================================================================

/// Every certificate for the route's public hosts is Ready.
pub const REASON_CERTIFICATE_READY: &str = "CertificateReady";

/// At least one certificate has not been issued yet.
pub const REASON_CERTIFICATE_NOT_READY: &str = "CertificateNotReady";

/// A certificate could not be created or updated.
pub const REASON_CERTIFICATE_PROVISION_FAILED: &str = "CertificateProvisionFailed";

/// Automatic TLS is disabled for this route.
pub const REASON_TLS_NOT_ENABLED: &str = "TLSNotEnabled";

// ============================================================================
// Event Reasons
// ============================================================================

/// Warning event: a reconcile pass failed.
pub const EVENT_REASON_INTERNAL_ERROR: &str = "InternalError";

/// Warning event: the status write-back failed.
pub const EVENT_REASON_UPDATE_FAILED: &str = "UpdateFailed";

/// Normal event: a child resource was created.
pub const EVENT_REASON_CREATED: &str = "Created";
