// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use kube::{
    runtime::{
        controller::{self, Action},
        reflector::{self, ObjectRef},
        watcher, Controller, WatchStreamExt,
    },
    Api, Client, Resource, ResourceExt,
};
use routeplane::{
    config::{Cli, RouteConfig},
    constants::{
        CONTROLLER_NAME, DEFAULT_TRACKER_LEASE_SECS, HEALTH_SERVER_PATH, KIND_ROUTE,
        METRICS_SERVER_PATH, TOKIO_WORKER_THREADS,
    },
    context::{Context, Listers, Stores},
    crd::{Certificate, Configuration, EdgeIngress, Revision, Route},
    events::KubeEventPublisher,
    labels::{K8S_MANAGED_BY, MANAGED_BY_ROUTE, ROUTE_LABEL, ROUTE_NAMESPACE_LABEL},
    metrics,
    reconcilers::{
        child::KubeChildApi,
        retry::{ExponentialBackoff, FailureBackoff},
        route::{api::KubeRouteApi, split_key},
        RouteReconciler,
    },
    route_errors::{ChildError, TrafficError},
    tracker::{DependencyRef, DependencyTracker},
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("routeplane-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();

    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (text or json)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Routeplane route controller");

    let config = Arc::new(RouteConfig::from_cli(&cli)?);

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let configurations = start_reflector::<Configuration>(client.clone());
    let revisions = start_reflector::<Revision>(client.clone());
    configurations
        .wait_until_ready()
        .await
        .context("Configuration reflector stopped before its first sync")?;
    revisions
        .wait_until_ready()
        .await
        .context("Revision reflector stopped before its first sync")?;
    info!("Configuration and Revision caches synced");

    let tracker = Arc::new(DependencyTracker::default());

    let managed_by = format!("{K8S_MANAGED_BY}={MANAGED_BY_ROUTE}");
    let children = watcher::Config::default().labels(&managed_by);
    let config_tracker = tracker.clone();
    let revision_tracker = tracker.clone();

    let controller = Controller::new(Api::<Route>::all(client.clone()), watcher::Config::default())
        .owns(Api::<Service>::all(client.clone()), children.clone())
        .watches(
            Api::<EdgeIngress>::all(client.clone()),
            children.clone(),
            route_of_child::<EdgeIngress>,
        )
        .watches(
            Api::<Certificate>::all(client.clone()),
            children,
            route_of_child::<Certificate>,
        )
        .watches(
            Api::<Configuration>::all(client.clone()),
            watcher::Config::default(),
            move |configuration: Configuration| {
                config_tracker.dependents_of(&DependencyRef::configuration(
                    &configuration.namespace().unwrap_or_default(),
                    &configuration.name_any(),
                ))
            },
        )
        .watches(
            Api::<Revision>::all(client.clone()),
            watcher::Config::default(),
            move |revision: Revision| {
                revision_tracker.dependents_of(&DependencyRef::revision(
                    &revision.namespace().unwrap_or_default(),
                    &revision.name_any(),
                ))
            },
        );

    let stores = Stores {
        routes: controller.store(),
        configurations,
        revisions,
    };

    let reconciler = RouteReconciler {
        config,
        listers: Arc::new(stores.clone()),
        routes: Arc::new(KubeRouteApi::new(client.clone())),
        ingresses: Arc::new(KubeChildApi::<EdgeIngress>::new(client.clone())),
        certificates: Arc::new(KubeChildApi::<Certificate>::new(client.clone())),
        services: Arc::new(KubeChildApi::<Service>::new(client.clone())),
        tracker: tracker.clone(),
        events: Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME)),
    };

    let context = Arc::new(Context {
        client,
        stores,
        reconciler,
        tracker,
        backoff: FailureBackoff::new(ExponentialBackoff::default()),
    });

    tokio::spawn(housekeeping(context.clone()));

    info!(workers = cli.workers, "Starting Route controller");

    let run_controller = controller
        .with_config(controller::Config::default().concurrency(cli.workers))
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((route, _)) => debug!(route = %route, "Reconciled"),
                Err(e) => debug!(error = %e, "Controller event"),
            }
        });

    tokio::select! {
        () = run_controller => {
            info!("Route controller shut down");
            Ok(())
        }
        result = run_metrics_server(cli.metrics_addr) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
    }
}

/// Start a cluster-wide reflector for `K` and return its store.
fn start_reflector<K>(client: Client) -> reflector::Store<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
{
    let (store, writer) = reflector::store::<K>();
    let stream = reflector::reflector(
        writer,
        watcher::watcher(Api::<K>::all(client), watcher::Config::default()),
    )
    .default_backoff()
    .applied_objects()
    .for_each(|event| async move {
        if let Err(e) = event {
            warn!(kind = %K::kind(&()), error = %e, "Reflector watch error");
        }
    });
    tokio::spawn(stream);
    store
}

/// Periodically drop dependency subscriptions whose lease ran out, and the
/// failure counts of routes that are gone from the cache.
async fn housekeeping(ctx: Arc<Context>) {
    let mut interval = tokio::time::interval(Duration::from_secs(DEFAULT_TRACKER_LEASE_SECS / 2));
    loop {
        interval.tick().await;
        ctx.tracker.prune();
        ctx.backoff.retain(|key| {
            split_key(key)
                .is_some_and(|(namespace, name)| ctx.stores.route(namespace, name).is_some())
        });
    }
}

/// The route a child belongs to, read from its route labels.
fn route_of_child<K: ResourceExt>(child: K) -> Option<ObjectRef<Route>> {
    let labels = child.labels();
    let name = labels.get(ROUTE_LABEL)?;
    let namespace = labels.get(ROUTE_NAMESPACE_LABEL)?;
    Some(ObjectRef::new(name).within(namespace))
}

fn route_key(route: &Route) -> String {
    format!(
        "{}/{}",
        route.namespace().unwrap_or_default(),
        route.name_any()
    )
}

/// Reconcile wrapper for `Route`
async fn reconcile(route: Arc<Route>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let key = route_key(&route);

    match ctx.reconciler.reconcile(&key).await {
        Ok(()) => {
            ctx.backoff.reset(&key);
            metrics::record_reconciliation_success(KIND_ROUTE, start.elapsed());
            Ok(Action::await_change())
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_ROUTE, start.elapsed());
            metrics::record_error(KIND_ROUTE, error_category(&e));
            Err(e.into())
        }
    }
}

/// Error category label for the errors metric.
fn error_category(err: &anyhow::Error) -> &'static str {
    if err.downcast_ref::<ChildError>().is_some() {
        return "not_owned";
    }
    if err.downcast_ref::<TrafficError>().is_some() {
        return "invalid_traffic";
    }
    match err.downcast_ref::<kube::Error>() {
        Some(kube::Error::Api(response)) if response.code == 409 => "conflict",
        _ => "api_error",
    }
}

/// Error policy for the route controller: exponential backoff per route.
#[allow(clippy::needless_pass_by_value)] // Signature required by kube::runtime::Controller
fn error_policy(route: Arc<Route>, err: &ReconcileError, ctx: Arc<Context>) -> Action {
    let key = route_key(&route);
    let delay = ctx.backoff.next_delay(&key);
    warn!(
        route = %key,
        error = %err,
        "Reconciliation error - will retry in {:?}",
        delay
    );
    metrics::record_reconciliation_requeue(KIND_ROUTE, "error");
    Action::requeue(delay)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "# Error encoding metrics").into_response()
        }
    }
}

/// Serve `/metrics` and `/healthz`.
async fn run_metrics_server(addr: SocketAddr) -> Result<()> {
    let app = Router::new()
        .route(METRICS_SERVER_PATH, get(metrics_handler))
        .route(HEALTH_SERVER_PATH, get(healthz));

    info!(%addr, "Starting metrics server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
