// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Traffic resolution.
//!
//! Turns a route's traffic block plus a snapshot of the watch cache into a
//! validated [`TrafficConfig`]. The resolver reads the cache and nothing else:
//! it never writes and never blocks.
//!
//! There are three outcomes:
//!
//! - `Ok(Resolution::Resolved(config))` - every target points at a routable revision
//! - `Ok(Resolution::Unresolved { error, .. })` - a target is missing or not ready yet;
//!   the first such target in declaration order is reported
//! - `Err(TrafficError)` - the traffic block is malformed, or a host could not be rendered
//!
//! References to every `Configuration` and `Revision` the route names are
//! collected in both `Ok` cases so the caller can subscribe to them.

use crate::config::RouteConfig;
use crate::constants::TOTAL_TRAFFIC_PERCENT;
use crate::context::Listers;
use crate::crd::{Revision, Route, TrafficTarget, TrafficTargetStatus, Visibility};
use crate::domains::{effective_visibility, host_for, http_url, subdomain_name};
use crate::labels::CONFIGURATION_LABEL;
use crate::route_errors::{TargetError, TrafficError};
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

/// Every traffic target bound to a concrete revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionTarget {
    /// Tag of the target; empty when untagged.
    pub tag: String,
    pub configuration_name: Option<String>,
    pub revision_name: String,
    pub latest_revision: bool,
    pub percent: i64,
    /// The revision is scaled to zero and is served through the activator.
    pub activation_required: bool,
}

/// Externally visible name of one traffic group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrafficHost {
    /// Subdomain name: the route name, or the rendered tag template.
    pub name: String,
    pub host: String,
    pub visibility: Visibility,
}

impl TrafficHost {
    #[must_use]
    pub fn url(&self) -> String {
        http_url(&self.host)
    }
}

/// Configurations and revisions a traffic block depends on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct References {
    pub configurations: BTreeSet<String>,
    pub revisions: BTreeSet<String>,
}

/// A fully resolved traffic block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrafficConfig {
    /// Traffic groups keyed by tag. The empty tag holds every target with its
    /// spec percent; each tag holds its own target at 100%.
    pub targets: BTreeMap<String, Vec<RevisionTarget>>,

    /// Every target in declaration order.
    pub revision_targets: Vec<RevisionTarget>,

    /// Host per traffic group, keyed like `targets`.
    pub hosts: BTreeMap<String, TrafficHost>,

    pub references: References,
}

impl TrafficConfig {
    /// Route status entries for the resolved targets, in declaration order.
    ///
    /// Only tagged targets carry a URL; untagged traffic is reachable through
    /// the route's primary URL.
    #[must_use]
    pub fn status_targets(&self) -> Vec<TrafficTargetStatus> {
        self.revision_targets
            .iter()
            .map(|target| TrafficTargetStatus {
                tag: (!target.tag.is_empty()).then(|| target.tag.clone()),
                revision_name: target.revision_name.clone(),
                configuration_name: target.configuration_name.clone(),
                latest_revision: target.latest_revision,
                percent: target.percent,
                url: if target.tag.is_empty() {
                    None
                } else {
                    self.hosts.get(&target.tag).map(TrafficHost::url)
                },
            })
            .collect()
    }
}

/// Outcome of a resolution that did not hit a malformed spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(TrafficConfig),
    Unresolved {
        /// First target error in declaration order.
        error: TargetError,
        references: References,
    },
}

impl Resolution {
    #[must_use]
    pub fn references(&self) -> &References {
        match self {
            Self::Resolved(config) => &config.references,
            Self::Unresolved { references, .. } => references,
        }
    }
}

/// Resolve a route's traffic block against the watch cache.
///
/// # Errors
///
/// Returns a [`TrafficError`] when the traffic block is malformed or a host
/// cannot be rendered from the domain templates. Missing or not-ready targets
/// are not errors; they are reported through [`Resolution::Unresolved`].
pub fn resolve(
    route: &Route,
    config: &RouteConfig,
    listers: &dyn Listers,
) -> Result<Resolution, TrafficError> {
    let traffic = &route.spec.traffic;
    validate(traffic)?;

    let namespace = route.namespace().unwrap_or_default();
    let mut references = References::default();
    let mut first_error: Option<TargetError> = None;
    let mut revision_targets = Vec::with_capacity(traffic.len());

    for target in traffic {
        match resolve_target(target, &namespace, listers, &mut references) {
            Ok(resolved) => revision_targets.push(resolved),
            Err(error) => {
                debug!(
                    route = %route.name_any(),
                    reason = error.reason(),
                    target = error.target_name(),
                    "Traffic target not resolved"
                );
                first_error.get_or_insert(error);
            }
        }
    }

    if let Some(error) = first_error {
        return Ok(Resolution::Unresolved { error, references });
    }

    for target in revision_targets.iter().filter(|t| t.activation_required) {
        info!(
            "Revision {}/{} is inactive and will be activated on demand for route {}",
            namespace,
            target.revision_name,
            route.name_any()
        );
    }

    let route_name = route.name_any();
    let mut targets: BTreeMap<String, Vec<RevisionTarget>> = BTreeMap::new();
    let mut hosts = BTreeMap::new();

    hosts.insert(
        String::new(),
        traffic_host(route, config, &route_name, "", None)?,
    );
    for (target, spec) in revision_targets.iter().zip(traffic) {
        targets.entry(String::new()).or_default().push(target.clone());
        if !target.tag.is_empty() {
            targets.insert(
                target.tag.clone(),
                vec![RevisionTarget {
                    percent: TOTAL_TRAFFIC_PERCENT,
                    ..target.clone()
                }],
            );
            hosts.insert(
                target.tag.clone(),
                traffic_host(route, config, &route_name, &target.tag, spec.visibility)?,
            );
        }
    }

    Ok(Resolution::Resolved(TrafficConfig {
        targets,
        revision_targets,
        hosts,
        references,
    }))
}

fn traffic_host(
    route: &Route,
    config: &RouteConfig,
    route_name: &str,
    tag: &str,
    target_visibility: Option<Visibility>,
) -> Result<TrafficHost, TrafficError> {
    let visibility = effective_visibility(route, target_visibility);
    let name = subdomain_name(config, route_name, tag)?;
    let host = host_for(config, route, &name, visibility)?;
    Ok(TrafficHost {
        name,
        host,
        visibility,
    })
}

/// Structural checks that do not depend on the cache.
///
/// # Errors
///
/// Returns the first violated rule in declaration order.
pub fn validate(traffic: &[TrafficTarget]) -> Result<(), TrafficError> {
    if traffic.is_empty() {
        return Err(TrafficError::EmptyTraffic);
    }

    let mut tags = HashSet::new();
    let mut sum = 0;
    for (index, target) in traffic.iter().enumerate() {
        match (&target.revision_name, &target.configuration_name) {
            (Some(_), Some(_)) => return Err(TrafficError::AmbiguousTarget { index }),
            (None, None) => return Err(TrafficError::MissingTarget { index }),
            _ => {}
        }

        let percent = target.percent.unwrap_or(0);
        if !(0..=TOTAL_TRAFFIC_PERCENT).contains(&percent) {
            return Err(TrafficError::InvalidPercent { index, percent });
        }
        sum += percent;

        if let Some(tag) = target.tag.as_deref().filter(|t| !t.is_empty()) {
            if !tags.insert(tag) {
                return Err(TrafficError::DuplicateTag {
                    tag: tag.to_string(),
                });
            }
        }
    }

    if sum != TOTAL_TRAFFIC_PERCENT {
        return Err(TrafficError::PercentSum { sum });
    }
    Ok(())
}

fn resolve_target(
    target: &TrafficTarget,
    namespace: &str,
    listers: &dyn Listers,
    references: &mut References,
) -> Result<RevisionTarget, TargetError> {
    let (configuration_name, revision) = if let Some(name) = &target.configuration_name {
        references.configurations.insert(name.clone());
        let configuration =
            listers
                .configuration(namespace, name)
                .ok_or_else(|| TargetError::ConfigurationMissing { name: name.clone() })?;

        let Some(latest_ready) = configuration.latest_ready_revision() else {
            return Err(if configuration.is_failed() {
                TargetError::ConfigurationFailed { name: name.clone() }
            } else {
                TargetError::ConfigurationNotReady { name: name.clone() }
            });
        };
        references.revisions.insert(latest_ready.to_string());
        (Some(name.clone()), routable_revision(latest_ready, namespace, listers)?)
    } else {
        // validate() guarantees one of the two names is present
        let name = target.revision_name.clone().unwrap_or_default();
        references.revisions.insert(name.clone());
        let revision = routable_revision(&name, namespace, listers)?;
        let configuration_name = revision.labels().get(CONFIGURATION_LABEL).cloned();
        (configuration_name, revision)
    };

    Ok(RevisionTarget {
        tag: target.tag.clone().unwrap_or_default(),
        configuration_name,
        revision_name: revision.name_any(),
        latest_revision: target
            .latest_revision
            .unwrap_or(target.revision_name.is_none()),
        percent: target.percent.unwrap_or(0),
        activation_required: revision.activation_required(),
    })
}

fn routable_revision(
    name: &str,
    namespace: &str,
    listers: &dyn Listers,
) -> Result<std::sync::Arc<Revision>, TargetError> {
    let revision = listers
        .revision(namespace, name)
        .ok_or_else(|| TargetError::RevisionMissing {
            name: name.to_string(),
        })?;

    if revision.is_ready() || revision.activation_required() {
        Ok(revision)
    } else if revision.is_failed() {
        Err(TargetError::RevisionFailed {
            name: name.to_string(),
        })
    } else {
        Err(TargetError::RevisionNotReady {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "traffic_tests.rs"]
mod traffic_tests;
