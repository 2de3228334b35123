// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `deletion.rs`

#[cfg(test)]
mod tests {
    use super::super::finalize;
    use crate::config::RouteConfig;
    use crate::constants::ROUTE_FINALIZER;
    use crate::crd::{EdgeIngress, EdgeIngressSpec, Route};
    use crate::labels::COMPONENT_INGRESS;
    use crate::route_resources::{build_labels, build_owner_references};
    use crate::test_fixtures::{revision_target, route, Harness};
    use crate::tracker::{DependencyRef, Tracker};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::jiff::Timestamp;
    use kube::runtime::reflector::ObjectRef;
    use kube::ResourceExt;
    use std::sync::atomic::Ordering;

    const OTHER_FINALIZER: &str = "other.example.com/finalizer";

    fn deleted_route(finalizers: &[&str]) -> Route {
        let mut route = route("hello", vec![revision_target("hello-00001", 100)]);
        route.metadata.deletion_timestamp = Some(Time(Timestamp::now()));
        route.metadata.finalizers = Some(finalizers.iter().map(ToString::to_string).collect());
        route
    }

    fn ingress_owned_by(route: &Route, name: &str, uid: &str) -> EdgeIngress {
        let mut ingress = EdgeIngress::new(name, EdgeIngressSpec::default());
        ingress.metadata.namespace = route.namespace();
        ingress.metadata.labels = Some(build_labels(route, COMPONENT_INGRESS));
        let mut owners = build_owner_references(route);
        owners[0].uid = uid.to_string();
        ingress.metadata.owner_references = Some(owners);
        ingress
    }

    fn setup(route: &Route) -> Harness {
        let harness = Harness::new(RouteConfig::default());
        harness.listers.insert_route(route.clone());
        harness
    }

    #[tokio::test]
    async fn test_waits_until_finalizer_is_first() {
        let route = deleted_route(&[OTHER_FINALIZER, ROUTE_FINALIZER]);
        let harness = setup(&route);
        harness.ingresses.insert(ingress_owned_by(&route, "hello", "12345"));

        finalize(&harness.reconciler(), &route).await.unwrap();

        assert_eq!(harness.ingresses.deletes(), 0);
        assert_eq!(harness.routes.patch_count(), 0);
        assert_eq!(
            harness.route("hello").finalizers(),
            &[OTHER_FINALIZER.to_string(), ROUTE_FINALIZER.to_string()]
        );
    }

    #[tokio::test]
    async fn test_deletes_owned_ingress_and_removes_finalizer() {
        let route = deleted_route(&[ROUTE_FINALIZER]);
        let harness = setup(&route);
        harness.ingresses.insert(ingress_owned_by(&route, "hello", "12345"));
        harness.tracker.track(
            DependencyRef::revision("default", "hello-00001"),
            &ObjectRef::from_obj(&route),
        );

        finalize(&harness.reconciler(), &route).await.unwrap();

        assert_eq!(harness.ingresses.deletes(), 1);
        assert!(harness.ingresses.names().is_empty());
        assert!(harness.route("hello").finalizers().is_empty());
        assert!(harness
            .tracker
            .dependents_of(&DependencyRef::revision("default", "hello-00001"))
            .is_empty());
    }

    #[tokio::test]
    async fn test_keeps_ingress_owned_by_another_route() {
        let route = deleted_route(&[ROUTE_FINALIZER, OTHER_FINALIZER]);
        let harness = setup(&route);
        harness.ingresses.insert(ingress_owned_by(&route, "hello", "12345"));
        // Same labels, but a recreated route with the same name owns it
        harness
            .ingresses
            .insert(ingress_owned_by(&route, "hello-previous", "67890"));

        finalize(&harness.reconciler(), &route).await.unwrap();

        assert_eq!(harness.ingresses.names(), vec!["hello-previous".to_string()]);
        assert_eq!(
            harness.route("hello").finalizers(),
            &[OTHER_FINALIZER.to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_finalizer() {
        let route = deleted_route(&[ROUTE_FINALIZER]);
        let harness = setup(&route);
        harness.ingresses.insert(ingress_owned_by(&route, "hello", "12345"));
        harness.ingresses.fail_delete.store(true, Ordering::SeqCst);

        let err = finalize(&harness.reconciler(), &route).await.unwrap_err();

        assert!(format!("{err:#}").contains("Failed to delete EdgeIngress default/hello"));
        assert_eq!(harness.routes.patch_count(), 0);
        assert_eq!(
            harness.route("hello").finalizers(),
            &[ROUTE_FINALIZER.to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_ingress_still_removes_finalizer() {
        let route = deleted_route(&[ROUTE_FINALIZER]);
        let harness = setup(&route);

        finalize(&harness.reconciler(), &route).await.unwrap();

        assert_eq!(harness.ingresses.deletes(), 0);
        assert!(harness.route("hello").finalizers().is_empty());
    }
}
