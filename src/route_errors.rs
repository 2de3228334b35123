// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Classified error types for route reconciliation.
//!
//! This module provides specialized error types for:
//! - Traffic targets that cannot be routed yet ([`TargetError`])
//! - Malformed traffic blocks ([`TrafficError`])
//! - Host rendering from domain templates ([`DomainError`])
//! - Child resources owned by someone else ([`ChildError`])
//!
//! A [`TargetError`] is a soft condition: it is written into the route's
//! status and never retried on a timer. Everything else is a hard error that
//! is returned to the controller runtime.

use crate::status_reasons::{
    REASON_CONFIGURATION_FAILED, REASON_CONFIGURATION_MISSING, REASON_CONFIGURATION_NOT_READY,
    REASON_REVISION_FAILED, REASON_REVISION_MISSING, REASON_REVISION_NOT_READY,
};
use thiserror::Error;

/// A traffic target that does not point at a routable revision yet.
///
/// Converges on its own once the referenced `Configuration` or `Revision`
/// changes, which re-triggers the route through the dependency tracker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// The referenced `Configuration` does not exist
    #[error("Configuration \"{name}\" referenced in traffic not found.")]
    ConfigurationMissing { name: String },

    /// The referenced `Configuration` has not produced a ready revision yet
    #[error("Configuration \"{name}\" is waiting for a Revision to become ready.")]
    ConfigurationNotReady { name: String },

    /// The referenced `Configuration` reports Ready=False and has no ready revision
    #[error("Configuration \"{name}\" does not have any ready Revision.")]
    ConfigurationFailed { name: String },

    /// The referenced `Revision` does not exist
    #[error("Revision \"{name}\" referenced in traffic not found.")]
    RevisionMissing { name: String },

    /// The referenced `Revision` is neither Ready nor waiting for activation
    #[error("Revision \"{name}\" is not yet ready.")]
    RevisionNotReady { name: String },

    /// The referenced `Revision` reports Ready=False
    #[error("Revision \"{name}\" failed to become ready.")]
    RevisionFailed { name: String },
}

impl TargetError {
    /// Machine-readable condition reason for this error.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing { .. } => REASON_CONFIGURATION_MISSING,
            Self::ConfigurationNotReady { .. } => REASON_CONFIGURATION_NOT_READY,
            Self::ConfigurationFailed { .. } => REASON_CONFIGURATION_FAILED,
            Self::RevisionMissing { .. } => REASON_REVISION_MISSING,
            Self::RevisionNotReady { .. } => REASON_REVISION_NOT_READY,
            Self::RevisionFailed { .. } => REASON_REVISION_FAILED,
        }
    }

    /// Name of the `Configuration` or `Revision` the error is about.
    #[must_use]
    pub fn target_name(&self) -> &str {
        match self {
            Self::ConfigurationMissing { name }
            | Self::ConfigurationNotReady { name }
            | Self::ConfigurationFailed { name }
            | Self::RevisionMissing { name }
            | Self::RevisionNotReady { name }
            | Self::RevisionFailed { name } => name,
        }
    }

    /// True when the dependency exists and may still become ready on its own.
    #[must_use]
    pub fn is_converging(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationNotReady { .. } | Self::RevisionNotReady { .. }
        )
    }
}

/// A malformed traffic block. These never fix themselves without a spec change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrafficError {
    #[error("traffic block is empty")]
    EmptyTraffic,

    #[error("traffic target {index} sets both revisionName and configurationName")]
    AmbiguousTarget { index: usize },

    #[error("traffic target {index} sets neither revisionName nor configurationName")]
    MissingTarget { index: usize },

    #[error("traffic target {index} has percent {percent}, expected 0-100")]
    InvalidPercent { index: usize, percent: i64 },

    #[error("traffic tag \"{tag}\" is used by more than one target")]
    DuplicateTag { tag: String },

    #[error("traffic targets sum to {sum} percent, expected 100")]
    PercentSum { sum: i64 },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Errors rendering hosts from the configured domain templates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The template references a placeholder that is not supported
    #[error("domain template \"{template}\" is invalid: {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// The rendered host is not a valid DNS-1123 subdomain
    #[error("rendered host \"{host}\" is invalid: {reason}")]
    InvalidHost { host: String, reason: String },
}

/// Errors from the generic child resource reconciler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChildError {
    /// A resource with the desired name exists but is controlled by another owner
    #[error("{kind} {namespace}/{name} exists and is not owned by this route")]
    NotOwned {
        kind: String,
        namespace: String,
        name: String,
    },
}

#[cfg(test)]
#[path = "route_errors_tests.rs"]
mod route_errors_tests;
