// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Settings come from command-line flags with environment variable fallbacks.
//! The domain table can additionally be loaded from a YAML file, one entry per
//! domain suffix with an optional label selector:
//!
//! ```yaml
//! example.com: {}
//! internal.example.com:
//!   selector:
//!     app: private
//! ```
//!
//! A route gets the domain whose selector matches the most of its labels; the
//! entry with an empty selector is the fallback.

use crate::constants::{
    DEFAULT_CLUSTER_DOMAIN, DEFAULT_DOMAIN, DEFAULT_DOMAIN_TEMPLATE, DEFAULT_RECONCILE_WORKERS,
    DEFAULT_TAG_TEMPLATE, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PORT,
};
use anyhow::{Context as _, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default ingress class written onto generated `EdgeIngress` resources
pub const DEFAULT_INGRESS_CLASS: &str = "edge.routeplane.firestoned.io";

/// Routeplane - route reconciliation controller for Kubernetes
#[derive(Parser, Debug, Clone)]
#[command(name = "routeplane", version, about, long_about = None)]
pub struct Cli {
    /// Default domain suffix for public hosts
    #[arg(long, env = "ROUTEPLANE_DOMAIN", default_value = DEFAULT_DOMAIN)]
    pub domain: String,

    /// YAML file mapping domain suffixes to route label selectors
    #[arg(long, env = "ROUTEPLANE_DOMAIN_CONFIG")]
    pub domain_config: Option<PathBuf>,

    /// Template for a route's public host
    #[arg(long, env = "ROUTEPLANE_DOMAIN_TEMPLATE", default_value = DEFAULT_DOMAIN_TEMPLATE)]
    pub domain_template: String,

    /// Template for a tagged target's subdomain name
    #[arg(long, env = "ROUTEPLANE_TAG_TEMPLATE", default_value = DEFAULT_TAG_TEMPLATE)]
    pub tag_template: String,

    /// Cluster DNS domain used for cluster-local hosts
    #[arg(long, env = "ROUTEPLANE_CLUSTER_DOMAIN", default_value = DEFAULT_CLUSTER_DOMAIN)]
    pub cluster_domain: String,

    /// Provision a certificate per public host and promote URLs to https
    #[arg(long, env = "ROUTEPLANE_AUTO_TLS")]
    pub auto_tls: bool,

    /// Ingress class used when a route carries no ingress class annotation
    #[arg(long, env = "ROUTEPLANE_INGRESS_CLASS", default_value = DEFAULT_INGRESS_CLASS)]
    pub default_ingress_class: String,

    /// Number of routes reconciled in parallel
    #[arg(long, env = "ROUTEPLANE_WORKERS", default_value_t = DEFAULT_RECONCILE_WORKERS)]
    pub workers: u16,

    /// Address the metrics and health server listens on
    #[arg(long, env = "ROUTEPLANE_METRICS_ADDR", default_value_t = default_metrics_addr())]
    pub metrics_addr: SocketAddr,
}

fn default_metrics_addr() -> SocketAddr {
    SocketAddr::new(
        METRICS_SERVER_BIND_ADDRESS
            .parse()
            .unwrap_or(std::net::Ipv4Addr::UNSPECIFIED.into()),
        METRICS_SERVER_PORT,
    )
}

/// One entry of the domain table file.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DomainSelector {
    /// Labels a route must carry to be served under this domain.
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

/// Settings the route reconciler reads on every pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteConfig {
    /// Domain suffix to selector; an empty selector matches every route.
    pub domains: BTreeMap<String, DomainSelector>,
    pub domain_template: String,
    pub tag_template: String,
    pub cluster_domain: String,
    pub auto_tls: bool,
    pub default_ingress_class: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            domains: BTreeMap::from([(DEFAULT_DOMAIN.to_string(), DomainSelector::default())]),
            domain_template: DEFAULT_DOMAIN_TEMPLATE.to_string(),
            tag_template: DEFAULT_TAG_TEMPLATE.to_string(),
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
            auto_tls: false,
            default_ingress_class: DEFAULT_INGRESS_CLASS.to_string(),
        }
    }
}

impl RouteConfig {
    /// Build the reconciler settings from parsed flags, loading the domain
    /// table file when one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain table file cannot be read or parsed.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let domains = match &cli.domain_config {
            Some(path) => load_domain_table(path)?,
            None => BTreeMap::from([(cli.domain.clone(), DomainSelector::default())]),
        };

        let config = Self {
            domains,
            domain_template: cli.domain_template.clone(),
            tag_template: cli.tag_template.clone(),
            cluster_domain: cli.cluster_domain.clone(),
            auto_tls: cli.auto_tls,
            default_ingress_class: cli.default_ingress_class.clone(),
        };
        info!(
            domains = config.domains.len(),
            auto_tls = config.auto_tls,
            ingress_class = %config.default_ingress_class,
            "Loaded route configuration"
        );
        Ok(config)
    }
}

/// Read a YAML domain table from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML, or is empty.
pub fn load_domain_table(path: &Path) -> Result<BTreeMap<String, DomainSelector>> {
    debug!(path = %path.display(), "Reading domain table");
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read domain table {}", path.display()))?;
    let table: BTreeMap<String, DomainSelector> = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse domain table {}", path.display()))?;
    if table.is_empty() {
        anyhow::bail!("Domain table {} defines no domains", path.display());
    }
    Ok(table)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
