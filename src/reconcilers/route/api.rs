// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Writes against the `Route` resource itself.

use crate::crd::Route;
use anyhow::Result;
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Value};

/// The two kinds of writes the route reconciler performs on a route.
#[async_trait]
pub trait RouteApi: Send + Sync {
    /// Persist `route.status`.
    ///
    /// The write carries the route's `resourceVersion`, so a pass computed
    /// from a stale snapshot fails with a conflict instead of clobbering a
    /// newer status.
    async fn update_status(&self, route: &Route) -> Result<Route>;

    /// Apply a JSON merge patch to the route's metadata.
    async fn patch_metadata(&self, namespace: &str, name: &str, patch: &Value) -> Result<Route>;
}

/// [`RouteApi`] backed by the Kubernetes API.
pub struct KubeRouteApi {
    client: Client,
}

impl KubeRouteApi {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RouteApi for KubeRouteApi {
    async fn update_status(&self, route: &Route) -> Result<Route> {
        let namespace = route.namespace().unwrap_or_default();
        let api: Api<Route> = Api::namespaced(self.client.clone(), &namespace);
        let patch = json!({
            "metadata": { "resourceVersion": route.resource_version() },
            "status": route.status,
        });
        Ok(api
            .patch_status(&route.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn patch_metadata(&self, namespace: &str, name: &str, patch: &Value) -> Result<Route> {
        let api: Api<Route> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }
}
