// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Host and URL derivation for routes.
//!
//! Public hosts are rendered from the domain template:
//!
//! ```text
//! {{.Name}}.{{.Namespace}}.{{.Domain}}   ->   hello.default.example.com
//! ```
//!
//! Tagged targets get their own subdomain name from the tag template
//! (`{{.Name}}-{{.Tag}}` -> `hello-candidate`) which is then rendered through
//! the domain template like any other name. Cluster-local routes and targets
//! use `svc.<cluster domain>` as their domain.

use crate::config::RouteConfig;
use crate::constants::{DEFAULT_DOMAIN, MAX_DNS_LABEL_LEN, MAX_DNS_SUBDOMAIN_LEN};
use crate::crd::{Route, Visibility};
use crate::labels::{VISIBILITY_CLUSTER_LOCAL, VISIBILITY_LABEL};
use crate::route_errors::DomainError;
use kube::ResourceExt;
use std::collections::BTreeMap;

const NAME_PLACEHOLDER: &str = "{{.Name}}";
const NAMESPACE_PLACEHOLDER: &str = "{{.Namespace}}";
const DOMAIN_PLACEHOLDER: &str = "{{.Domain}}";
const TAG_PLACEHOLDER: &str = "{{.Tag}}";

/// Mapping from fully-qualified host to tag; the empty tag is the primary host.
pub type DomainTagMap = BTreeMap<String, String>;

/// Returns true when the route is restricted to the cluster network.
#[must_use]
pub fn is_cluster_local(route: &Route) -> bool {
    route
        .labels()
        .get(VISIBILITY_LABEL)
        .is_some_and(|v| v == VISIBILITY_CLUSTER_LOCAL)
}

/// Effective visibility of one traffic name on a route.
#[must_use]
pub fn effective_visibility(route: &Route, target: Option<Visibility>) -> Visibility {
    if is_cluster_local(route) {
        Visibility::ClusterLocal
    } else {
        target.unwrap_or_default()
    }
}

/// Domain suffix for the route.
///
/// Cluster-local routes always get `svc.<cluster domain>`. Otherwise the
/// configured domain whose selector matches the most route labels wins.
#[must_use]
pub fn domain_for(config: &RouteConfig, route: &Route, visibility: Visibility) -> String {
    if visibility == Visibility::ClusterLocal {
        return cluster_local_domain(config);
    }

    let labels = route.labels();
    config
        .domains
        .iter()
        .filter(|(_, domain)| {
            domain
                .selector
                .iter()
                .all(|(key, value)| labels.get(key) == Some(value))
        })
        .max_by_key(|(_, domain)| domain.selector.len())
        .map_or_else(|| DEFAULT_DOMAIN.to_string(), |(name, _)| name.clone())
}

fn cluster_local_domain(config: &RouteConfig) -> String {
    format!("svc.{}", config.cluster_domain)
}

/// Subdomain name for a traffic name: the route name itself, or the rendered
/// tag template for tagged targets.
///
/// # Errors
///
/// Returns an error if the tag template is invalid or renders an invalid DNS label.
pub fn subdomain_name(
    config: &RouteConfig,
    route_name: &str,
    tag: &str,
) -> Result<String, DomainError> {
    if tag.is_empty() {
        return Ok(route_name.to_string());
    }
    let name = render(
        &config.tag_template,
        &[(NAME_PLACEHOLDER, route_name), (TAG_PLACEHOLDER, tag)],
    )?;
    validate_label(&name).map_err(|reason| DomainError::InvalidHost {
        host: name.clone(),
        reason,
    })?;
    Ok(name)
}

/// Render the host for a subdomain name of the route.
///
/// # Errors
///
/// Returns an error if the domain template is invalid or the rendered host is
/// not a valid DNS-1123 subdomain.
pub fn host_for(
    config: &RouteConfig,
    route: &Route,
    name: &str,
    visibility: Visibility,
) -> Result<String, DomainError> {
    let namespace = route.namespace().unwrap_or_default();
    let domain = domain_for(config, route, visibility);
    let host = render(
        &config.domain_template,
        &[
            (NAME_PLACEHOLDER, name),
            (NAMESPACE_PLACEHOLDER, namespace.as_str()),
            (DOMAIN_PLACEHOLDER, domain.as_str()),
        ],
    )?;
    validate_host(&host)?;
    Ok(host)
}

/// Host of a traffic name inside the cluster: `<name>.<namespace>.svc.<cluster domain>`.
#[must_use]
pub fn cluster_local_host(config: &RouteConfig, name: &str, namespace: &str) -> String {
    format!("{name}.{namespace}.{}", cluster_local_domain(config))
}

/// `http://` URL for a host.
#[must_use]
pub fn http_url(host: &str) -> String {
    format!("http://{host}")
}

fn render(template: &str, values: &[(&str, &str)]) -> Result<String, DomainError> {
    let rendered = values
        .iter()
        .fold(template.to_string(), |acc, (placeholder, value)| {
            acc.replace(placeholder, value)
        });
    if let Some(start) = rendered.find("{{") {
        let unknown = rendered[start..]
            .split_once("}}")
            .map_or(&rendered[start..], |(placeholder, _)| placeholder);
        return Err(DomainError::InvalidTemplate {
            template: template.to_string(),
            reason: format!("unsupported placeholder {unknown}}}}}"),
        });
    }
    Ok(rendered)
}

/// Validate a DNS-1123 subdomain.
///
/// # Errors
///
/// Returns [`DomainError::InvalidHost`] naming the first violated rule.
pub fn validate_host(host: &str) -> Result<(), DomainError> {
    let invalid = |reason: String| DomainError::InvalidHost {
        host: host.to_string(),
        reason,
    };
    if host.len() > MAX_DNS_SUBDOMAIN_LEN {
        return Err(invalid(format!(
            "must be no more than {MAX_DNS_SUBDOMAIN_LEN} characters"
        )));
    }
    host.split('.').try_for_each(validate_label).map_err(invalid)
}

fn validate_label(label: &str) -> Result<(), String> {
    if label.is_empty() {
        return Err("labels must not be empty".to_string());
    }
    if label.len() > MAX_DNS_LABEL_LEN {
        return Err(format!(
            "label \"{label}\" must be no more than {MAX_DNS_LABEL_LEN} characters"
        ));
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(format!(
            "label \"{label}\" must consist of lower case alphanumeric characters or '-'"
        ));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(format!(
            "label \"{label}\" must start and end with an alphanumeric character"
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "domains_tests.rs"]
mod domains_tests;
