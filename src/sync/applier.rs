// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Apply a HelmChart's manifests to the cluster.

use crate::constants::cache::DOCUMENT_SEPARATOR;
use crate::constants::requeue::RESYNC_SECS;
use crate::error::{HelmOperatorError, Result};
use crate::kubernetes::ObjectStore;
use crate::manifest::{translate_all, ManifestCache, Renderer};
use crate::sync::tracker::CompanionTracker;
use crate::types::{HelmChart, HelmChartStatus, HelmDogSpec, Resource};
use kube::runtime::controller::Action;
use kube::{Resource as _, ResourceExt};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Where reconciliation takes its documents from
#[derive(Clone)]
pub enum ManifestSource {
    /// Documents admitted by the webhook, applied verbatim
    Cache(ManifestCache),
    /// Render on every reconcile; used when admission gating is off
    Renderer(Arc<dyn Renderer>),
}

#[derive(Clone)]
pub struct ReleaseApplier {
    store: Arc<dyn ObjectStore>,
    source: ManifestSource,
    tracker: CompanionTracker,
}

/// Hash identifying a manifest set in HelmChart status
pub fn manifest_hash(documents: &[String]) -> String {
    hex::encode(Sha256::digest(documents.join(DOCUMENT_SEPARATOR).as_bytes()))
}

impl ReleaseApplier {
    pub fn new(store: Arc<dyn ObjectStore>, source: ManifestSource) -> Self {
        Self {
            tracker: CompanionTracker::new(store.clone()),
            store,
            source,
        }
    }

    async fn documents(&self, chart: &HelmChart) -> Result<Vec<String>> {
        match &self.source {
            ManifestSource::Cache(cache) => {
                cache
                    .load(&chart.namespace().unwrap_or_default(), &chart.name_any())
                    .await
            }
            ManifestSource::Renderer(renderer) => renderer.render(chart).await,
        }
    }

    /// Apply every document in order, tracking those outside the chart's namespace.
    ///
    /// The first failing apply aborts the pass; objects applied before it stay.
    #[instrument(skip(self, chart), fields(chart = %chart.key()))]
    pub async fn apply_release(&self, chart: &HelmChart) -> Result<Action> {
        let namespace = chart.namespace().unwrap_or_default();
        let name = chart.name_any();

        let documents = self.documents(chart).await?;
        let objects = translate_all(self.store.as_ref(), &documents, &namespace).await?;
        let owner = chart.controller_owner_ref(&()).ok_or_else(|| {
            HelmOperatorError::ManifestError(format!(
                "HelmChart {} has no uid to own its objects",
                chart.key()
            ))
        })?;

        let mut companions: Vec<Resource> = Vec::new();
        let mut pending = Vec::with_capacity(objects.len());
        for translated in objects {
            let mut object = translated.object;
            if translated.descriptor.namespace == namespace {
                object
                    .metadata
                    .owner_references
                    .get_or_insert_with(Vec::new)
                    .push(owner.clone());
            } else if !companions.contains(&translated.descriptor) {
                companions.push(translated.descriptor.clone());
            }
            pending.push((translated.descriptor, object));
        }

        // Out-of-namespace objects must be tracked before they can exist
        let existing = self.store.get_companion(&namespace, &name).await?;
        let needs_update = match &existing {
            Some(dog) => dog.desired() != companions.as_slice(),
            None => !companions.is_empty(),
        };
        if needs_update {
            info!(count = companions.len(), "Tracking resources outside {}", namespace);
            let spec = HelmDogSpec {
                resources: companions,
            };
            self.store.apply_companion(&namespace, &name, &spec).await?;
        }

        for (descriptor, object) in &pending {
            self.store.apply(descriptor, object).await?;
            debug!(resource = %descriptor, "Applied");
        }

        let hash = manifest_hash(&documents);
        let identity = chart.chart_identity();
        let status_current = chart.applied_hash() == Some(hash.as_str())
            && chart.status.as_ref().and_then(|s| s.chart.as_deref()) == Some(identity.as_str());
        if !status_current {
            let status = HelmChartStatus {
                hashed_manifests: Some(hash),
                chart: Some(identity),
                updated: Some(chrono::Utc::now().to_rfc3339()),
            };
            self.store
                .patch_chart_status(&namespace, &name, &status)
                .await?;
            info!(count = pending.len(), "Applied new manifest set");
        }

        Ok(Action::requeue(Duration::from_secs(RESYNC_SECS)))
    }

    /// Delete everything the HelmChart's HelmDog tracks, then the HelmDog and the cache entry
    #[instrument(skip(self, chart), fields(chart = %chart.key()))]
    pub async fn cleanup_release(&self, chart: &HelmChart) -> Result<Action> {
        let namespace = chart.namespace().unwrap_or_default();
        let name = chart.name_any();

        if let Some(dog) = self.store.get_companion(&namespace, &name).await? {
            self.tracker.delete_all(&dog.responsible_for()).await?;
            self.store.delete_companion(&namespace, &name).await?;
            info!("Removed tracked resources");
        }
        if let ManifestSource::Cache(cache) = &self.source {
            cache.remove(&namespace, &name).await?;
        }

        Ok(Action::await_change())
    }
}
