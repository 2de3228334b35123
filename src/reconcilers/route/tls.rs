// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Automatic TLS for routes.
//!
//! One `Certificate` is requested per public host of the route. Once a
//! certificate reports Ready its secret is bound to the ingress and every
//! URL whose host it covers is switched to `https`. Hosts whose certificate
//! is not ready yet stay on `http`.
//!
//! Scheme changes are per host: a route with several tags may have some
//! hosts served securely while others still wait for their certificate.

use super::RouteReconciler;
use crate::crd::{Certificate, CertificateReadiness, IngressTls, Route, RouteStatus, Visibility};
use crate::domains::{is_cluster_local, DomainTagMap};
use crate::reconcilers::child::{ensure_desired, CertificateInput, ChildResource};
use crate::traffic::TrafficConfig;
use anyhow::Result;
use kube::ResourceExt;
use tracing::{debug, warn};
use url::Url;

const SCHEME_HTTP: &str = "http";
const SCHEME_HTTPS: &str = "https";

/// Public hosts of the resolved traffic, mapped to their tag.
///
/// Cluster-local hosts are never given certificates.
#[must_use]
pub fn desired_domains(traffic: &TrafficConfig) -> DomainTagMap {
    traffic
        .hosts
        .iter()
        .filter(|(_, host)| host.visibility == Visibility::Public)
        .map(|(tag, host)| (host.host.clone(), tag.clone()))
        .collect()
}

/// Reconcile the route's certificates and return the TLS bindings for the ingress.
///
/// Returns no bindings, and writes no certificates, when automatic TLS is
/// disabled or the route is cluster-local.
///
/// # Errors
///
/// Returns the first certificate reconciliation error after marking the
/// certificate condition failed.
pub async fn reconcile_tls(
    reconciler: &RouteReconciler,
    route: &Route,
    domains: &DomainTagMap,
    status: &mut RouteStatus,
) -> Result<Vec<IngressTls>> {
    if !reconciler.config.auto_tls {
        status.mark_tls_not_enabled("Automatic TLS is disabled.");
        return Ok(Vec::new());
    }
    if is_cluster_local(route) {
        status.mark_tls_not_enabled("Cluster-local routes are not served over TLS.");
        return Ok(Vec::new());
    }

    let namespace = route.namespace().unwrap_or_default();
    let mut bindings = Vec::new();
    let mut first_not_ready: Option<String> = None;

    for (host, tag) in domains {
        let input = CertificateInput {
            host: host.as_str(),
            tag: tag.as_str(),
        };
        let name = Certificate::name_for(route, &input);

        let certificate = match ensure_desired(
            reconciler.certificates.as_ref(),
            reconciler.events.as_ref(),
            route,
            &input,
        )
        .await
        {
            Ok(certificate) => certificate,
            Err(e) => {
                warn!("Failed to reconcile Certificate {}/{}: {:#}", namespace, name, e);
                status.mark_certificate_provision_failed(&name, &format!("{e:#}"));
                return Err(e);
            }
        };

        let dns_names = &certificate.spec.dns_names;
        // The secret is bound even while the certificate is pending; only
        // the advertised scheme follows readiness.
        bindings.push(IngressTls {
            hosts: dns_names.clone(),
            secret_name: certificate.spec.secret_name.clone(),
            secret_namespace: namespace.clone(),
        });
        if certificate.readiness() == CertificateReadiness::Ready {
            set_scheme_for_hosts(status, dns_names, SCHEME_HTTPS);
        } else {
            debug!(
                certificate = %name,
                detail = %certificate.ready_message().unwrap_or_default(),
                "Certificate is not ready"
            );
            set_scheme_for_hosts(status, dns_names, SCHEME_HTTP);
            first_not_ready.get_or_insert(name);
        }
    }

    match first_not_ready {
        Some(name) => status.mark_certificate_not_ready(&name),
        None => status.mark_certificate_ready(),
    }
    Ok(bindings)
}

/// Switch the scheme of the route URL and of every traffic URL whose host is
/// one of `hosts`.
pub fn set_scheme_for_hosts(status: &mut RouteStatus, hosts: &[String], scheme: &str) {
    if let Some(url) = status.url.as_deref().and_then(|u| with_scheme(u, hosts, scheme)) {
        status.url = Some(url);
    }
    for target in &mut status.traffic {
        if let Some(url) = target.url.as_deref().and_then(|u| with_scheme(u, hosts, scheme)) {
            target.url = Some(url);
        }
    }
}

/// `url` with its scheme replaced, when its host is one of `hosts`.
///
/// Everything after the scheme is kept verbatim so the URL is not normalized.
fn with_scheme(url: &str, hosts: &[String], scheme: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if !hosts.iter().any(|h| h == host) {
        return None;
    }
    let (_, rest) = url.split_once("://")?;
    Some(format!("{scheme}://{rest}"))
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tls_tests;
