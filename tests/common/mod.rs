// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::client::Client;
use routeplane::crd::{
    Condition, Configuration, ConfigurationSpec, ConfigurationStatus, Revision, RevisionSpec,
    RevisionStatus,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::sleep;

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([
                ("test".to_string(), "integration".to_string()),
                ("managed-by".to_string(), "routeplane-test".to_string()),
            ])),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(Box::new(e)),
    }
}

fn ready_condition() -> Condition {
    Condition {
        r#type: "Ready".to_string(),
        status: "True".to_string(),
        reason: Some("Ready".to_string()),
        message: None,
        last_transition_time: None,
    }
}

/// Create a Revision and mark it Ready through the status subresource
pub async fn create_ready_revision(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let revisions: Api<Revision> = Api::namespaced(client.clone(), namespace);
    let revision = Revision::new(
        name,
        RevisionSpec {
            image: "ghcr.io/firestoned/hello:latest".to_string(),
        },
    );
    revisions.create(&PostParams::default(), &revision).await?;

    let status = RevisionStatus {
        conditions: vec![ready_condition()],
        observed_generation: Some(1),
    };
    revisions
        .patch_status(
            name,
            &PatchParams::default(),
            &Patch::Merge(json!({ "status": status })),
        )
        .await?;

    println!("Created ready Revision: {namespace}/{name}");
    Ok(())
}

/// Create a Configuration whose latest ready revision is `revision`
pub async fn create_ready_configuration(
    client: &Client,
    namespace: &str,
    name: &str,
    revision: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let configurations: Api<Configuration> = Api::namespaced(client.clone(), namespace);
    let configuration = Configuration::new(
        name,
        ConfigurationSpec {
            image: "ghcr.io/firestoned/hello:latest".to_string(),
        },
    );
    configurations
        .create(&PostParams::default(), &configuration)
        .await?;

    let status = ConfigurationStatus {
        conditions: vec![ready_condition()],
        latest_created_revision_name: Some(revision.to_string()),
        latest_ready_revision_name: Some(revision.to_string()),
        observed_generation: Some(1),
    };
    configurations
        .patch_status(
            name,
            &PatchParams::default(),
            &Patch::Merge(json!({ "status": status })),
        )
        .await?;

    println!("Created ready Configuration: {namespace}/{name} -> {revision}");
    Ok(())
}

/// Poll `name` until `check` accepts it or the attempts run out
pub async fn wait_for<K, F>(api: &Api<K>, name: &str, attempts: u32, check: F) -> Option<K>
where
    K: Clone + Debug + DeserializeOwned,
    F: Fn(&K) -> bool,
{
    for _ in 0..attempts {
        if let Ok(Some(object)) = api.get_opt(name).await {
            if check(&object) {
                return Some(object);
            }
        }
        sleep(Duration::from_secs(2)).await;
    }
    None
}
