// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock HTTP backend for `kube::Client` and in-memory
//! implementations of the operator's cluster-facing traits.

use crate::error::{HelmOperatorError, Result};
use crate::kubernetes::{AccessRequest, Authorizer, Decision, ObjectStore, Principal, ResourceMapping};
use crate::manifest::Renderer;
use crate::types::{
    ChartReference, HelmChart, HelmChartSpec, HelmChartStatus, HelmDog, HelmDogSpec,
    HelmDogStatus, Resource,
};
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{DynamicObject, GroupVersionKind, ObjectMeta};
use kube::client::Body;
use kube::error::ErrorResponse;
use kube::Client;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for PATCH requests matching the exact path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    /// Add a response for DELETE requests matching the exact path
    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();
        responses
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let response = self.find_response(&method, &path);

        Box::pin(async move {
            let (status, body) = response.unwrap_or_else(|| (404, not_found_json("", &path)));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a discovery response listing `(plural, kind, namespaced)` resources
pub fn api_resource_list_json(group_version: &str, resources: &[(&str, &str, bool)]) -> String {
    let resources: Vec<_> = resources
        .iter()
        .map(|(plural, kind, namespaced)| {
            serde_json::json!({
                "name": plural,
                "singularName": kind.to_lowercase(),
                "namespaced": namespaced,
                "kind": kind,
                "verbs": ["create", "delete", "get", "list", "patch", "update", "watch"]
            })
        })
        .collect();

    serde_json::json!({
        "kind": "APIResourceList",
        "apiVersion": "v1",
        "groupVersion": group_version,
        "resources": resources
    })
    .to_string()
}

pub fn api_error(code: u16, message: &str) -> HelmOperatorError {
    HelmOperatorError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: "Test".to_string(),
        code,
    }))
}

pub fn cluster_role(name: &str) -> Resource {
    Resource {
        group: "rbac.authorization.k8s.io".to_string(),
        version: "v1".to_string(),
        kind: "ClusterRole".to_string(),
        name: name.to_string(),
        namespace: String::new(),
    }
}

pub fn config_map(name: &str, namespace: &str) -> Resource {
    Resource {
        group: String::new(),
        version: "v1".to_string(),
        kind: "ConfigMap".to_string(),
        name: name.to_string(),
        namespace: namespace.to_string(),
    }
}

pub fn config_map_yaml(name: &str, namespace: Option<&str>) -> String {
    let namespace = namespace
        .map(|ns| format!("\n  namespace: {}", ns))
        .unwrap_or_default();
    format!(
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {}{}\ndata:\n  key: value",
        name, namespace
    )
}

pub fn cluster_role_yaml(name: &str) -> String {
    format!(
        "apiVersion: rbac.authorization.k8s.io/v1\nkind: ClusterRole\nmetadata:\n  name: {}\nrules: []",
        name
    )
}

pub fn make_chart(name: &str, namespace: &str) -> HelmChart {
    HelmChart {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: HelmChartSpec {
            chart: ChartReference {
                path: "./charts/demo".to_string(),
                version: None,
                repo: None,
            },
            values: None,
        },
        status: None,
    }
}

pub fn make_dog(spec: Vec<Resource>, status: Vec<Resource>) -> HelmDog {
    HelmDog {
        metadata: ObjectMeta {
            name: Some("demo".to_string()),
            namespace: Some("ns".to_string()),
            ..Default::default()
        },
        spec: HelmDogSpec { resources: spec },
        status: Some(HelmDogStatus { resources: status }),
    }
}

/// Build a live object for a resource, with optional annotations and finalizers
pub fn live_object(res: &Resource, annotations: &[(&str, &str)], finalizers: &[&str]) -> DynamicObject {
    let mut metadata = ObjectMeta {
        name: Some(res.name.clone()),
        namespace: (!res.namespace.is_empty()).then(|| res.namespace.clone()),
        ..Default::default()
    };
    if !annotations.is_empty() {
        metadata.annotations = Some(
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }
    if !finalizers.is_empty() {
        metadata.finalizers = Some(finalizers.iter().map(|f| f.to_string()).collect());
    }
    DynamicObject {
        types: Some(kube::api::TypeMeta {
            api_version: res.api_version(),
            kind: res.kind.clone(),
        }),
        metadata,
        data: serde_json::json!({}),
    }
}

#[derive(Default)]
struct FakeState {
    mappings: HashMap<(String, String), ResourceMapping>,
    objects: HashMap<Resource, DynamicObject>,
    /// Objects whose finalizers keep coming back until cleared by the operator
    sticky: HashSet<Resource>,
    chart_status: HashMap<(String, String), HelmChartStatus>,
    companions: HashMap<(String, String), HelmDog>,
    fail_apply: HashSet<String>,
    fail_delete: HashSet<String>,
    read_delay: Option<Duration>,
    log: Vec<String>,
}

/// In-memory `ObjectStore` mimicking the API server semantics the engine depends on.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<FakeState>,
}

impl FakeStore {
    /// A store that knows ConfigMap, Secret, ClusterRole, Namespace and CustomResourceDefinition
    pub fn new() -> Self {
        Self::default()
            .with_kind("", "ConfigMap", "configmaps", true)
            .with_kind("", "Secret", "secrets", true)
            .with_kind("", "Namespace", "namespaces", false)
            .with_kind("rbac.authorization.k8s.io", "ClusterRole", "clusterroles", false)
            .with_kind(
                "apiextensions.k8s.io",
                "CustomResourceDefinition",
                "customresourcedefinitions",
                false,
            )
    }

    pub fn with_kind(self, group: &str, kind: &str, plural: &str, namespaced: bool) -> Self {
        self.state.lock().unwrap().mappings.insert(
            (group.to_string(), kind.to_string()),
            ResourceMapping {
                plural: plural.to_string(),
                namespaced,
            },
        );
        self
    }

    pub fn insert(&self, res: &Resource, object: DynamicObject) {
        self.state.lock().unwrap().objects.insert(res.clone(), object);
    }

    /// Insert an object carrying a finalizer whose controller never runs
    pub fn insert_stuck(&self, res: &Resource) {
        self.insert(res, live_object(res, &[], &["example.com/never-done"]));
        self.state.lock().unwrap().sticky.insert(res.clone());
    }

    pub fn object(&self, res: &Resource) -> Option<DynamicObject> {
        self.state.lock().unwrap().objects.get(res).cloned()
    }

    pub fn contains(&self, res: &Resource) -> bool {
        self.object(res).is_some()
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    pub fn fail_apply_of(&self, name: &str) {
        self.state.lock().unwrap().fail_apply.insert(name.to_string());
    }

    pub fn fail_delete_of(&self, name: &str) {
        self.state.lock().unwrap().fail_delete.insert(name.to_string());
    }

    /// Make every object read sleep first, as a slow API server would
    pub fn stall_reads(&self, delay: Duration) {
        self.state.lock().unwrap().read_delay = Some(delay);
    }

    pub fn put_companion(&self, dog: HelmDog) {
        let key = (
            dog.metadata.namespace.clone().unwrap_or_default(),
            dog.metadata.name.clone().unwrap_or_default(),
        );
        self.state.lock().unwrap().companions.insert(key, dog);
    }

    pub fn companion(&self, namespace: &str, name: &str) -> Option<HelmDog> {
        self.state
            .lock()
            .unwrap()
            .companions
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn chart_status(&self, namespace: &str, name: &str) -> Option<HelmChartStatus> {
        self.state
            .lock()
            .unwrap()
            .chart_status
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Operations performed so far, e.g. `delete ClusterRole rbac.authorization.k8s.io/v1 cr1`
    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|entry| entry.strip_prefix("delete ").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceMapping> {
        let state = self.state.lock().unwrap();
        state
            .mappings
            .get(&(gvk.group.clone(), gvk.kind.clone()))
            .cloned()
            .ok_or_else(|| HelmOperatorError::DiscoveryError {
                kind: gvk.kind.clone(),
                message: "not served".to_string(),
            })
    }

    async fn get(&self, target: &Resource) -> Result<Option<DynamicObject>> {
        let delay = self.state.lock().unwrap().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.object(target))
    }

    async fn apply(&self, target: &Resource, object: &DynamicObject) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("apply {}", target));
        if state.fail_apply.contains(&target.name) {
            return Err(api_error(500, "apply rejected"));
        }
        state.objects.insert(target.clone(), object.clone());
        Ok(())
    }

    async fn delete(&self, target: &Resource) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("delete {}", target));
        if state.fail_delete.contains(&target.name) {
            return Err(api_error(500, "delete rejected"));
        }
        let Some(object) = state.objects.get_mut(target) else {
            return Ok(false);
        };
        let has_finalizers = object
            .metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| !f.is_empty());
        if has_finalizers {
            object.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        } else {
            state.objects.remove(target);
        }
        Ok(true)
    }

    async fn clear_finalizers(&self, target: &Resource) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("clear_finalizers {}", target));
        let deleting = match state.objects.get_mut(target) {
            Some(object) => {
                object.metadata.finalizers = None;
                object.metadata.deletion_timestamp.is_some()
            }
            None => return Ok(()),
        };
        if deleting {
            state.objects.remove(target);
            state.sticky.remove(target);
        }
        Ok(())
    }

    async fn patch_chart_status(
        &self,
        namespace: &str,
        name: &str,
        status: &HelmChartStatus,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("status HelmChart {}/{}", namespace, name));
        state
            .chart_status
            .insert((namespace.to_string(), name.to_string()), status.clone());
        Ok(())
    }

    async fn get_companion(&self, namespace: &str, name: &str) -> Result<Option<HelmDog>> {
        Ok(self.companion(namespace, name))
    }

    async fn apply_companion(&self, namespace: &str, name: &str, spec: &HelmDogSpec) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("apply HelmDog {}/{}", namespace, name));
        let dog = state
            .companions
            .entry((namespace.to_string(), name.to_string()))
            .or_insert_with(|| {
                let mut dog = HelmDog::new(name, HelmDogSpec::default());
                dog.metadata.namespace = Some(namespace.to_string());
                dog.metadata.finalizers = Some(vec![crate::constants::FINALIZER.to_string()]);
                dog
            });
        dog.spec = spec.clone();
        Ok(())
    }

    async fn patch_companion_status(
        &self,
        namespace: &str,
        name: &str,
        resources: &[Resource],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("status HelmDog {}/{}", namespace, name));
        match state
            .companions
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            Some(dog) => {
                dog.status = Some(HelmDogStatus {
                    resources: resources.to_vec(),
                });
                Ok(())
            }
            None => Err(api_error(404, "helmdog not found")),
        }
    }

    async fn delete_companion(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("delete HelmDog {}/{}", namespace, name));
        state
            .companions
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}

/// Authorizer that denies a configured set of plural resources
#[derive(Default)]
pub struct FakeAuthorizer {
    denied: HashMap<String, String>,
    asked: Mutex<Vec<AccessRequest>>,
}

impl FakeAuthorizer {
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Deny `resource` (plural); an empty reason leaves the explanation to the caller
    pub fn deny(mut self, resource: &str, reason: &str) -> Self {
        self.denied.insert(resource.to_string(), reason.to_string());
        self
    }

    pub fn asked(&self) -> Vec<AccessRequest> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authorizer for FakeAuthorizer {
    async fn authorize(&self, _principal: &Principal, request: &AccessRequest) -> Result<Decision> {
        self.asked.lock().unwrap().push(request.clone());
        Ok(match self.denied.get(&request.resource) {
            Some(reason) => Decision {
                allowed: false,
                reason: reason.clone(),
            },
            None => Decision {
                allowed: true,
                reason: String::new(),
            },
        })
    }
}

/// Renderer returning whatever documents it currently holds
#[derive(Default)]
pub struct FakeRenderer {
    documents: Mutex<Vec<String>>,
    calls: Mutex<usize>,
    delay: Mutex<Option<Duration>>,
}

impl FakeRenderer {
    pub fn new(documents: Vec<String>) -> Self {
        Self {
            documents: Mutex::new(documents),
            calls: Mutex::new(0),
            delay: Mutex::new(None),
        }
    }

    pub fn set(&self, documents: Vec<String>) {
        *self.documents.lock().unwrap() = documents;
    }

    /// Make every render sleep first, as a slow chart repository would
    pub fn stall(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, _chart: &HelmChart) -> Result<Vec<String>> {
        *self.calls.lock().unwrap() += 1;
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.documents.lock().unwrap().clone())
    }
}
