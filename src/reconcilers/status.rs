// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for `Route` resources.
//!
//! This module provides utility functions for creating and managing Kubernetes
//! status conditions following the standard conventions, plus the condition
//! transitions the route reconciler performs.
//!
//! # Condition Format
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (e.g., "Ready", "IngressReady")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed
//!
//! # Route Conditions
//!
//! `Ready` is never set directly. It is recomputed from `AllTrafficAssigned`
//! and `IngressReady` whenever either changes: a `False` dependency makes the
//! route not ready with that dependency's reason, two `True` dependencies make
//! it ready, anything else leaves it `Unknown`. `CertificateProvisioned` is
//! informational and does not gate readiness.
//!
//! # Example
//!
//! ```rust,no_run
//! use routeplane::reconcilers::status::create_condition;
//!
//! let condition = create_condition(
//!     "IngressReady",
//!     "True",
//!     "IngressReady",
//!     "Ingress reported ready"
//! );
//! ```

use crate::crd::{Condition, RouteStatus};
use crate::route_errors::TargetError;
use crate::status_reasons::{
    CONDITION_TYPE_ALL_TRAFFIC_ASSIGNED, CONDITION_TYPE_CERTIFICATE_PROVISIONED,
    CONDITION_TYPE_INGRESS_READY, CONDITION_TYPE_READY, REASON_CERTIFICATE_NOT_READY,
    REASON_CERTIFICATE_PROVISION_FAILED, REASON_CERTIFICATE_READY, REASON_INGRESS_NOT_CONFIGURED,
    REASON_INGRESS_READY, REASON_INITIALIZING, REASON_READY, REASON_TLS_NOT_ENABLED,
    REASON_TRAFFIC_ASSIGNED, REASON_UNKNOWN_TRAFFIC_ERROR, STATUS_FALSE, STATUS_TRUE,
    STATUS_UNKNOWN,
};
use chrono::Utc;

/// Conditions every route carries, in the order they are initialized.
const ROUTE_CONDITION_TYPES: [&str; 4] = [
    CONDITION_TYPE_ALL_TRAFFIC_ASSIGNED,
    CONDITION_TYPE_CERTIFICATE_PROVISIONED,
    CONDITION_TYPE_INGRESS_READY,
    CONDITION_TYPE_READY,
];

/// Create a new Kubernetes condition with the current timestamp.
///
/// This is a convenience function for creating conditions that follow Kubernetes
/// conventions. The `lastTransitionTime` is automatically set to the current time.
///
/// # Arguments
///
/// * `condition_type` - The type of condition (e.g., "Ready", "IngressReady")
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase` (e.g., "`TrafficAssigned`")
/// * `message` - A human-readable explanation
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// This function modifies the conditions list in-place by either updating an existing
/// condition or adding a new one. It preserves the `lastTransitionTime` if the status
/// hasn't changed, or sets a new timestamp if it has.
///
/// **Important:** This function does NOT make any Kubernetes API calls. It only modifies
/// the in-memory conditions list; the route reconciler persists the whole status once
/// at the end of a pass.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        // Preserve lastTransitionTime if status hasn't changed
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Compare two condition lists to check if they are semantically equal.
///
/// This function compares two lists of conditions to determine if they represent
/// the same state. It ignores `lastTransitionTime` differences and ordering, and
/// only compares the semantic content (type, status, reason, message).
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    for new_cond in new {
        match current.iter().find(|c| c.r#type == new_cond.r#type) {
            None => return false,
            Some(curr_cond) => {
                if curr_cond.status != new_cond.status
                    || curr_cond.reason != new_cond.reason
                    || curr_cond.message != new_cond.message
                {
                    return false;
                }
            }
        }
    }

    true
}

/// Returns true when `new` differs from `current` in anything but condition
/// timestamps, so an unchanged pass never writes status.
#[must_use]
pub fn status_changed(current: Option<&RouteStatus>, new: &RouteStatus) -> bool {
    match current {
        None => true,
        Some(current) => {
            current.url != new.url
                || current.address != new.address
                || current.traffic != new.traffic
                || current.observed_generation != new.observed_generation
                || !conditions_equal(&current.conditions, &new.conditions)
        }
    }
}

impl RouteStatus {
    fn set(&mut self, condition_type: &str, status: &str, reason: &str, message: &str) {
        update_condition_in_memory(&mut self.conditions, condition_type, status, reason, message);
        if condition_type == CONDITION_TYPE_ALL_TRAFFIC_ASSIGNED
            || condition_type == CONDITION_TYPE_INGRESS_READY
        {
            self.recompute_ready();
        }
    }

    fn recompute_ready(&mut self) {
        let dependents = [
            CONDITION_TYPE_ALL_TRAFFIC_ASSIGNED,
            CONDITION_TYPE_INGRESS_READY,
        ];

        let failed = dependents
            .iter()
            .filter_map(|t| find_condition(&self.conditions, t))
            .find(|c| c.status == STATUS_FALSE)
            .cloned();
        if let Some(failed) = failed {
            update_condition_in_memory(
                &mut self.conditions,
                CONDITION_TYPE_READY,
                STATUS_FALSE,
                failed.reason.as_deref().unwrap_or_default(),
                failed.message.as_deref().unwrap_or_default(),
            );
            return;
        }

        let all_true = dependents.iter().all(|t| {
            find_condition(&self.conditions, t).is_some_and(|c| c.status == STATUS_TRUE)
        });
        if all_true {
            update_condition_in_memory(
                &mut self.conditions,
                CONDITION_TYPE_READY,
                STATUS_TRUE,
                REASON_READY,
                "",
            );
            return;
        }

        let pending = dependents
            .iter()
            .filter_map(|t| find_condition(&self.conditions, t))
            .find(|c| c.status != STATUS_TRUE)
            .cloned();
        let (reason, message) = pending.map_or_else(
            || (REASON_INITIALIZING.to_string(), String::new()),
            |c| (c.reason.unwrap_or_default(), c.message.unwrap_or_default()),
        );
        update_condition_in_memory(
            &mut self.conditions,
            CONDITION_TYPE_READY,
            STATUS_UNKNOWN,
            &reason,
            &message,
        );
    }

    /// Add every route condition that is missing as `Unknown`; existing
    /// conditions are left as they are.
    pub fn initialize_conditions(&mut self) {
        for condition_type in ROUTE_CONDITION_TYPES {
            if find_condition(&self.conditions, condition_type).is_none() {
                self.conditions.push(create_condition(
                    condition_type,
                    STATUS_UNKNOWN,
                    REASON_INITIALIZING,
                    "",
                ));
            }
        }
    }

    pub fn mark_traffic_assigned(&mut self) {
        self.set(
            CONDITION_TYPE_ALL_TRAFFIC_ASSIGNED,
            STATUS_TRUE,
            REASON_TRAFFIC_ASSIGNED,
            "",
        );
    }

    /// Record a target that cannot be routed yet.
    ///
    /// Missing and failed targets are `False`; targets still converging are `Unknown`.
    pub fn mark_target_error(&mut self, error: &TargetError) {
        let status = if error.is_converging() {
            STATUS_UNKNOWN
        } else {
            STATUS_FALSE
        };
        self.set(
            CONDITION_TYPE_ALL_TRAFFIC_ASSIGNED,
            status,
            error.reason(),
            &error.to_string(),
        );
    }

    /// Record a traffic error that is not attributable to a single target.
    pub fn mark_unknown_traffic_error(&mut self, message: &str) {
        self.set(
            CONDITION_TYPE_ALL_TRAFFIC_ASSIGNED,
            STATUS_UNKNOWN,
            REASON_UNKNOWN_TRAFFIC_ERROR,
            message,
        );
    }

    pub fn mark_ingress_not_configured(&mut self) {
        self.set(
            CONDITION_TYPE_INGRESS_READY,
            STATUS_UNKNOWN,
            REASON_INGRESS_NOT_CONFIGURED,
            "Ingress has not yet been reconciled.",
        );
    }

    /// Mirror the ingress Ready condition onto `IngressReady`.
    pub fn propagate_ingress_status(&mut self, ready: Option<&Condition>) {
        match ready {
            Some(c) if c.status == STATUS_TRUE => self.set(
                CONDITION_TYPE_INGRESS_READY,
                STATUS_TRUE,
                REASON_INGRESS_READY,
                "",
            ),
            Some(c) if c.status == STATUS_FALSE => self.set(
                CONDITION_TYPE_INGRESS_READY,
                STATUS_FALSE,
                c.reason.as_deref().unwrap_or(REASON_INGRESS_NOT_CONFIGURED),
                c.message.as_deref().unwrap_or_default(),
            ),
            Some(c) => self.set(
                CONDITION_TYPE_INGRESS_READY,
                STATUS_UNKNOWN,
                c.reason.as_deref().unwrap_or(REASON_INGRESS_NOT_CONFIGURED),
                c.message.as_deref().unwrap_or_default(),
            ),
            None => self.mark_ingress_not_configured(),
        }
    }

    pub fn mark_certificate_ready(&mut self) {
        self.set(
            CONDITION_TYPE_CERTIFICATE_PROVISIONED,
            STATUS_TRUE,
            REASON_CERTIFICATE_READY,
            "",
        );
    }

    pub fn mark_certificate_not_ready(&mut self, name: &str) {
        self.set(
            CONDITION_TYPE_CERTIFICATE_PROVISIONED,
            STATUS_UNKNOWN,
            REASON_CERTIFICATE_NOT_READY,
            &format!("Certificate {name} is not ready."),
        );
    }

    pub fn mark_certificate_provision_failed(&mut self, name: &str, message: &str) {
        self.set(
            CONDITION_TYPE_CERTIFICATE_PROVISIONED,
            STATUS_FALSE,
            REASON_CERTIFICATE_PROVISION_FAILED,
            &format!("Certificate {name} fails to be provisioned: {message}"),
        );
    }

    pub fn mark_tls_not_enabled(&mut self, message: &str) {
        self.set(
            CONDITION_TYPE_CERTIFICATE_PROVISIONED,
            STATUS_TRUE,
            REASON_TLS_NOT_ENABLED,
            message,
        );
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
