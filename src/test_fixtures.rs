// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes and object builders shared by unit tests.

use crate::config::RouteConfig;
use crate::context::Listers;
use crate::crd::{
    Certificate, Condition, Configuration, ConfigurationSpec, ConfigurationStatus, EdgeIngress,
    Revision, RevisionSpec, RevisionStatus, Route, RouteSpec, TrafficTarget,
};
use crate::events::EventPublisher;
use crate::reconcilers::child::ChildApi;
use crate::reconcilers::route::api::RouteApi;
use crate::reconcilers::route::RouteReconciler;
use crate::status_reasons::{CONDITION_TYPE_ACTIVE, CONDITION_TYPE_READY, STATUS_FALSE, STATUS_TRUE};
use crate::tracker::DependencyTracker;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ObjectReference, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

pub const TEST_NAMESPACE: &str = "default";
pub const TEST_UID: &str = "12345";

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn key_of<K: Resource>(obj: &K) -> Key {
    key(
        obj.meta().namespace.as_deref().unwrap_or_default(),
        obj.meta().name.as_deref().unwrap_or_default(),
    )
}

fn bump_resource_version(meta: &mut ObjectMeta) {
    let next = meta
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    meta.resource_version = Some(next.to_string());
}

// ============================================================================
// Builders
// ============================================================================

fn condition(condition_type: &str, status: &str) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: None,
        message: None,
        last_transition_time: Some("2025-01-01T00:00:00+00:00".to_string()),
    }
}

/// A route in the test namespace with uid `12345`.
pub fn route(name: &str, traffic: Vec<TrafficTarget>) -> Route {
    let mut route = Route::new(name, RouteSpec { traffic });
    route.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    route.metadata.uid = Some(TEST_UID.to_string());
    route.metadata.generation = Some(1);
    route.metadata.resource_version = Some("1".to_string());
    route
}

pub fn revision_target(revision: &str, percent: i64) -> TrafficTarget {
    TrafficTarget {
        revision_name: Some(revision.to_string()),
        percent: Some(percent),
        ..Default::default()
    }
}

pub fn configuration_target(configuration: &str, percent: i64) -> TrafficTarget {
    TrafficTarget {
        configuration_name: Some(configuration.to_string()),
        percent: Some(percent),
        ..Default::default()
    }
}

pub fn tagged(target: TrafficTarget, tag: &str) -> TrafficTarget {
    TrafficTarget {
        tag: Some(tag.to_string()),
        ..target
    }
}

fn revision_with(name: &str, conditions: Vec<Condition>) -> Revision {
    let mut revision = Revision::new(name, RevisionSpec::default());
    revision.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    revision.status = Some(RevisionStatus {
        conditions,
        observed_generation: Some(1),
    });
    revision
}

pub fn ready_revision(name: &str) -> Revision {
    revision_with(name, vec![condition(CONDITION_TYPE_READY, STATUS_TRUE)])
}

pub fn failed_revision(name: &str) -> Revision {
    revision_with(name, vec![condition(CONDITION_TYPE_READY, STATUS_FALSE)])
}

/// A revision still deploying: Ready is Unknown.
pub fn pending_revision(name: &str) -> Revision {
    revision_with(name, vec![condition(CONDITION_TYPE_READY, "Unknown")])
}

/// A revision scaled to zero.
pub fn inactive_revision(name: &str) -> Revision {
    revision_with(
        name,
        vec![
            condition(CONDITION_TYPE_READY, "Unknown"),
            condition(CONDITION_TYPE_ACTIVE, STATUS_FALSE),
        ],
    )
}

pub fn configuration(name: &str, latest_ready: Option<&str>) -> Configuration {
    let mut configuration = Configuration::new(name, ConfigurationSpec::default());
    configuration.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    configuration.status = Some(ConfigurationStatus {
        latest_ready_revision_name: latest_ready.map(str::to_string),
        latest_created_revision_name: latest_ready.map(str::to_string),
        ..Default::default()
    });
    configuration
}

pub fn failed_configuration(name: &str) -> Configuration {
    let mut configuration = configuration(name, None);
    if let Some(status) = configuration.status.as_mut() {
        status.conditions = vec![condition(CONDITION_TYPE_READY, STATUS_FALSE)];
    }
    configuration
}

/// Set the Ready condition reported by a child's own controller.
pub fn ready_condition(status: &str) -> Condition {
    condition(CONDITION_TYPE_READY, status)
}

// ============================================================================
// Listers
// ============================================================================

#[derive(Default)]
pub struct FakeListers {
    routes: RwLock<HashMap<Key, Arc<Route>>>,
    configurations: RwLock<HashMap<Key, Arc<Configuration>>>,
    revisions: RwLock<HashMap<Key, Arc<Revision>>>,
}

impl FakeListers {
    pub fn insert_route(&self, route: Route) {
        self.routes
            .write()
            .unwrap()
            .insert(key_of(&route), Arc::new(route));
    }

    pub fn insert_configuration(&self, configuration: Configuration) {
        self.configurations
            .write()
            .unwrap()
            .insert(key_of(&configuration), Arc::new(configuration));
    }

    pub fn insert_revision(&self, revision: Revision) {
        self.revisions
            .write()
            .unwrap()
            .insert(key_of(&revision), Arc::new(revision));
    }
}

impl Listers for FakeListers {
    fn route(&self, namespace: &str, name: &str) -> Option<Arc<Route>> {
        self.routes.read().unwrap().get(&key(namespace, name)).cloned()
    }

    fn configuration(&self, namespace: &str, name: &str) -> Option<Arc<Configuration>> {
        self.configurations
            .read()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
    }

    fn revision(&self, namespace: &str, name: &str) -> Option<Arc<Revision>> {
        self.revisions
            .read()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
    }
}

// ============================================================================
// Route API
// ============================================================================

/// RFC 7386 JSON merge patch.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (k, v) in patch {
            if v.is_null() {
                target.remove(k);
            } else {
                merge_patch(target.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
    }
}

/// Route writes land in the shared listers, so the next pass observes them
/// the way it would observe a watch event.
pub struct FakeRouteApi {
    listers: Arc<FakeListers>,
    pub status_writes: Mutex<Vec<Route>>,
    pub patches: Mutex<Vec<Value>>,
    pub fail_status: AtomicBool,
}

impl FakeRouteApi {
    pub fn new(listers: Arc<FakeListers>) -> Self {
        Self {
            listers,
            status_writes: Mutex::new(Vec::new()),
            patches: Mutex::new(Vec::new()),
            fail_status: AtomicBool::new(false),
        }
    }

    pub fn status_write_count(&self) -> usize {
        self.status_writes.lock().unwrap().len()
    }

    pub fn patch_count(&self) -> usize {
        self.patches.lock().unwrap().len()
    }
}

#[async_trait]
impl RouteApi for FakeRouteApi {
    async fn update_status(&self, route: &Route) -> Result<Route> {
        if self.fail_status.load(Ordering::SeqCst) {
            bail!("injected status write failure");
        }
        let namespace = route.namespace().unwrap_or_default();
        let name = route.name_any();
        let mut stored = self
            .listers
            .route(&namespace, &name)
            .map(|r| Route::clone(&r))
            .ok_or_else(|| anyhow!("routes \"{name}\" not found"))?;
        if route.resource_version() != stored.resource_version() {
            bail!("conflict: route {namespace}/{name} has been modified");
        }

        stored.status.clone_from(&route.status);
        bump_resource_version(&mut stored.metadata);
        self.status_writes.lock().unwrap().push(route.clone());
        self.listers.insert_route(stored.clone());
        Ok(stored)
    }

    async fn patch_metadata(&self, namespace: &str, name: &str, patch: &Value) -> Result<Route> {
        let stored = self
            .listers
            .route(namespace, name)
            .ok_or_else(|| anyhow!("routes \"{name}\" not found"))?;
        let mut value = serde_json::to_value(stored.as_ref())?;
        merge_patch(&mut value, patch);
        let mut patched: Route = serde_json::from_value(value)?;
        bump_resource_version(&mut patched.metadata);

        self.patches.lock().unwrap().push(patch.clone());
        self.listers.insert_route(patched.clone());
        Ok(patched)
    }
}

// ============================================================================
// Child API
// ============================================================================

/// Namespaced object store for one child kind with call counters.
pub struct FakeChildApi<K> {
    objects: Mutex<BTreeMap<Key, K>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl<K> Default for FakeChildApi<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }
}

impl<K: Resource + Clone> FakeChildApi<K> {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Seed an object without counting it as a create.
    pub fn insert(&self, obj: K) {
        self.objects.lock().unwrap().insert(key_of(&obj), obj);
    }

    pub fn stored(&self, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&key(TEST_NAMESPACE, name))
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Change a stored object the way its own controller would.
    pub fn modify(&self, name: &str, f: impl FnOnce(&mut K)) {
        let mut objects = self.objects.lock().unwrap();
        let obj = objects
            .get_mut(&key(TEST_NAMESPACE, name))
            .expect("object to modify exists");
        f(obj);
    }
}

fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k).is_some_and(|value| value == v),
            None => labels.contains_key(term),
        })
}

#[async_trait]
impl<K> ChildApi<K> for FakeChildApi<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        Ok(self.objects.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn create(&self, namespace: &str, obj: &K) -> Result<K> {
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("injected create failure");
        }
        let mut created = obj.clone();
        let k = key(namespace, created.meta().name.as_deref().unwrap_or_default());
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&k) {
            bail!("{} already exists", k.1);
        }
        let meta = created.meta_mut();
        meta.generation = Some(1);
        meta.resource_version = Some("1".to_string());
        objects.insert(k, created.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn update(&self, namespace: &str, obj: &K) -> Result<K> {
        let mut updated = obj.clone();
        let k = key(namespace, updated.meta().name.as_deref().unwrap_or_default());
        let mut objects = self.objects.lock().unwrap();
        let Some(current) = objects.get(&k) else {
            bail!("{} not found", k.1);
        };
        let generation = current.meta().generation.unwrap_or(0) + 1;
        let meta = updated.meta_mut();
        meta.generation = Some(generation);
        bump_resource_version(meta);
        objects.insert(k, updated.clone());
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), obj)| {
                ns == namespace && matches_selector(obj.labels(), label_selector)
            })
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            bail!("injected delete failure");
        }
        if self
            .objects
            .lock()
            .unwrap()
            .remove(&key(namespace, name))
            .is_some()
        {
            self.deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Clone, Debug)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub note: Option<String>,
}

#[derive(Default)]
pub struct RecordingEventPublisher {
    pub events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    pub fn reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.reason.clone())
            .collect()
    }

    pub fn warnings(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.warning)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            note,
        });
    }
}

// ============================================================================
// Reconciler harness
// ============================================================================

/// A [`RouteReconciler`] wired to fakes that share one view of the world.
pub struct Harness {
    pub config: Arc<RouteConfig>,
    pub listers: Arc<FakeListers>,
    pub routes: Arc<FakeRouteApi>,
    pub ingresses: Arc<FakeChildApi<EdgeIngress>>,
    pub certificates: Arc<FakeChildApi<Certificate>>,
    pub services: Arc<FakeChildApi<Service>>,
    pub tracker: Arc<DependencyTracker>,
    pub events: Arc<RecordingEventPublisher>,
}

impl Harness {
    pub fn new(config: RouteConfig) -> Self {
        let listers = Arc::new(FakeListers::default());
        Self {
            config: Arc::new(config),
            routes: Arc::new(FakeRouteApi::new(listers.clone())),
            listers,
            ingresses: Arc::new(FakeChildApi::default()),
            certificates: Arc::new(FakeChildApi::default()),
            services: Arc::new(FakeChildApi::default()),
            tracker: Arc::new(DependencyTracker::default()),
            events: Arc::new(RecordingEventPublisher::default()),
        }
    }

    pub fn reconciler(&self) -> RouteReconciler {
        RouteReconciler {
            config: self.config.clone(),
            listers: self.listers.clone(),
            routes: self.routes.clone(),
            ingresses: self.ingresses.clone(),
            certificates: self.certificates.clone(),
            services: self.services.clone(),
            tracker: self.tracker.clone(),
            events: self.events.clone(),
        }
    }

    /// The route as currently stored.
    pub fn route(&self, name: &str) -> Route {
        self.listers
            .route(TEST_NAMESPACE, name)
            .map(|r| Route::clone(&r))
            .expect("route exists")
    }
}
