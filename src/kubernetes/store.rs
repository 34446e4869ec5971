// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Access to cluster objects addressed by group, version, kind, namespace and name.

use crate::constants::{FIELD_MANAGER, FINALIZER};
use crate::error::{HelmOperatorError, Result};
use crate::types::{HelmChart, HelmChartStatus, HelmDog, HelmDogSpec, Resource};
use async_trait::async_trait;
use kube::{
    api::{DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams},
    discovery::{pinned_kind, Scope},
    Api, Client,
};
use tracing::{debug, instrument};

/// Where a kind lives in the API, as reported by discovery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceMapping {
    /// Plural resource name, e.g. `configmaps`
    pub plural: String,
    pub namespaced: bool,
}

/// Operations the reconciliation engine needs from the cluster.
///
/// Every call is a single request; retrying is left to the controller's requeue.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Map a kind to its plural resource name and scope
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceMapping>;

    /// Fetch an object, `None` when it does not exist
    async fn get(&self, target: &Resource) -> Result<Option<DynamicObject>>;

    /// Server-side apply, forcing ownership of conflicting fields
    async fn apply(&self, target: &Resource, object: &DynamicObject) -> Result<()>;

    /// Request deletion; `false` when the object was already gone
    async fn delete(&self, target: &Resource) -> Result<bool>;

    /// Strip every finalizer from an object; a missing object is not an error
    async fn clear_finalizers(&self, target: &Resource) -> Result<()>;

    async fn patch_chart_status(
        &self,
        namespace: &str,
        name: &str,
        status: &HelmChartStatus,
    ) -> Result<()>;

    async fn get_companion(&self, namespace: &str, name: &str) -> Result<Option<HelmDog>>;

    /// Create or update the companion's spec, carrying the cleanup finalizer
    async fn apply_companion(&self, namespace: &str, name: &str, spec: &HelmDogSpec) -> Result<()>;

    async fn patch_companion_status(
        &self,
        namespace: &str,
        name: &str,
        resources: &[Resource],
    ) -> Result<()>;

    /// Request deletion of the companion; a missing companion is not an error
    async fn delete_companion(&self, namespace: &str, name: &str) -> Result<()>;
}

/// `ObjectStore` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn dynamic_api(&self, target: &Resource) -> Result<Api<DynamicObject>> {
        let (api_resource, _) = pinned_kind(&self.client, &target.gvk())
            .await
            .map_err(|e| discovery_error(&target.gvk(), e))?;

        Ok(if target.namespace.is_empty() {
            Api::all_with(self.client.clone(), &api_resource)
        } else {
            Api::namespaced_with(self.client.clone(), &target.namespace, &api_resource)
        })
    }
}

fn discovery_error(gvk: &GroupVersionKind, err: kube::Error) -> HelmOperatorError {
    HelmOperatorError::DiscoveryError {
        kind: format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind),
        message: err.to_string(),
    }
}

fn ignore_not_found<T>(result: kube::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    #[instrument(skip(self), fields(kind = %gvk.kind))]
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceMapping> {
        let (api_resource, capabilities) = pinned_kind(&self.client, gvk)
            .await
            .map_err(|e| discovery_error(gvk, e))?;

        Ok(ResourceMapping {
            plural: api_resource.plural,
            namespaced: matches!(capabilities.scope, Scope::Namespaced),
        })
    }

    #[instrument(skip(self), fields(resource = %target))]
    async fn get(&self, target: &Resource) -> Result<Option<DynamicObject>> {
        let api = self.dynamic_api(target).await?;
        Ok(api.get_opt(&target.name).await?)
    }

    #[instrument(skip(self, object), fields(resource = %target))]
    async fn apply(&self, target: &Resource, object: &DynamicObject) -> Result<()> {
        let api = self.dynamic_api(target).await?;
        let pp = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&target.name, &pp, &Patch::Apply(object)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(resource = %target))]
    async fn delete(&self, target: &Resource) -> Result<bool> {
        let api = self.dynamic_api(target).await?;
        let deleted = ignore_not_found(api.delete(&target.name, &DeleteParams::default()).await)?;
        Ok(deleted.is_some())
    }

    #[instrument(skip(self), fields(resource = %target))]
    async fn clear_finalizers(&self, target: &Resource) -> Result<()> {
        let api = self.dynamic_api(target).await?;
        let patch = serde_json::json!({ "metadata": { "finalizers": null } });
        ignore_not_found(
            api.patch(&target.name, &PatchParams::default(), &Patch::Merge(&patch))
                .await,
        )?;
        Ok(())
    }

    #[instrument(skip(self, status))]
    async fn patch_chart_status(
        &self,
        namespace: &str,
        name: &str,
        status: &HelmChartStatus,
    ) -> Result<()> {
        let charts: Api<HelmChart> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": status });
        charts
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_companion(&self, namespace: &str, name: &str) -> Result<Option<HelmDog>> {
        let dogs: Api<HelmDog> = Api::namespaced(self.client.clone(), namespace);
        Ok(dogs.get_opt(name).await?)
    }

    #[instrument(skip(self, spec), fields(resources = spec.resources.len()))]
    async fn apply_companion(&self, namespace: &str, name: &str, spec: &HelmDogSpec) -> Result<()> {
        let dogs: Api<HelmDog> = Api::namespaced(self.client.clone(), namespace);

        let mut dog = HelmDog::new(name, spec.clone());
        dog.metadata.namespace = Some(namespace.to_string());
        dog.metadata.finalizers = Some(vec![FINALIZER.to_string()]);

        let pp = PatchParams::apply(FIELD_MANAGER).force();
        dogs.patch(name, &pp, &Patch::Apply(&dog)).await?;
        debug!("Applied HelmDog {}/{}", namespace, name);
        Ok(())
    }

    #[instrument(skip(self, resources), fields(resources = resources.len()))]
    async fn patch_companion_status(
        &self,
        namespace: &str,
        name: &str,
        resources: &[Resource],
    ) -> Result<()> {
        let dogs: Api<HelmDog> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": { "resources": resources } });
        dogs.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_companion(&self, namespace: &str, name: &str) -> Result<()> {
        let dogs: Api<HelmDog> = Api::namespaced(self.client.clone(), namespace);
        ignore_not_found(dogs.delete(name, &DeleteParams::default()).await)?;
        Ok(())
    }
}
