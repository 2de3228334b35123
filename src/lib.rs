// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Routeplane - Route controller for Kubernetes
//!
//! Routeplane reconciles `Route` resources into the edge-routing objects that
//! expose them: an `EdgeIngress` with weighted splits, TLS `Certificate`s for
//! public hosts, and placeholder `Service`s that make every route host
//! resolvable inside the cluster.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`traffic`] - Resolving and validating traffic targets
//! - [`domains`] - Host name templating and visibility
//! - [`route_resources`] - Building the desired children of a route
//! - [`reconcilers`] - The reconciliation pass, finalizers and child updates
//! - [`tracker`] - Route to configuration/revision dependency tracking
//! - [`context`] - Shared context and reflector stores for the controller
//! - [`config`] - Command line and environment configuration
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use routeplane::crd::{RouteSpec, TrafficTarget};
//!
//! let spec = RouteSpec {
//!     traffic: vec![TrafficTarget {
//!         configuration_name: Some("hello".to_string()),
//!         percent: Some(100),
//!         ..Default::default()
//!     }],
//! };
//! assert_eq!(spec.traffic.len(), 1);
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod domains;
pub mod events;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod route_errors;
pub mod route_resources;
pub mod status_reasons;
pub mod tracker;
pub mod traffic;

#[cfg(test)]
pub mod test_fixtures;
