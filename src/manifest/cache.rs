// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Snapshot of authorized manifests, written at admission and read at reconcile.

use crate::constants::cache::{DATA_KEY, DOCUMENT_SEPARATOR};
use crate::error::{HelmOperatorError, Result};
use crate::kubernetes::ObjectStore;
use crate::types::Resource;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Cache entries live as Secrets in the operator's own namespace, one per HelmChart.
#[derive(Clone)]
pub struct ManifestCache {
    store: Arc<dyn ObjectStore>,
    namespace: String,
}

impl ManifestCache {
    pub fn new(store: Arc<dyn ObjectStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    fn entry(&self, chart_namespace: &str, chart_name: &str) -> Resource {
        Resource {
            group: String::new(),
            version: "v1".to_string(),
            kind: "Secret".to_string(),
            name: format!("manifests.{}.{}", chart_namespace, chart_name),
            namespace: self.namespace.clone(),
        }
    }

    /// Upsert the document set for a HelmChart
    #[instrument(skip(self, documents), fields(chart = %format!("{}/{}", chart_namespace, chart_name)))]
    pub async fn store(&self, chart_namespace: &str, chart_name: &str, documents: &[String]) -> Result<()> {
        let entry = self.entry(chart_namespace, chart_name);
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(entry.name.clone()),
                namespace: Some(entry.namespace.clone()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                DATA_KEY.to_string(),
                ByteString(documents.join(DOCUMENT_SEPARATOR).into_bytes()),
            )])),
            ..Default::default()
        };

        let object = serde_json::from_value(serde_json::to_value(&secret)?)?;
        self.store.apply(&entry, &object).await?;
        debug!(count = documents.len(), "Cached manifests");
        Ok(())
    }

    /// Drop the entry of a deleted HelmChart; a missing entry is fine
    #[instrument(skip(self), fields(chart = %format!("{}/{}", chart_namespace, chart_name)))]
    pub async fn remove(&self, chart_namespace: &str, chart_name: &str) -> Result<()> {
        if self.store.delete(&self.entry(chart_namespace, chart_name)).await? {
            debug!("Removed cached manifests");
        }
        Ok(())
    }

    /// Read back the document set exactly as it was stored
    #[instrument(skip(self), fields(chart = %format!("{}/{}", chart_namespace, chart_name)))]
    pub async fn load(&self, chart_namespace: &str, chart_name: &str) -> Result<Vec<String>> {
        let entry = self.entry(chart_namespace, chart_name);
        let object = self.store.get(&entry).await?.ok_or_else(|| {
            HelmOperatorError::CacheConfigError(format!(
                "no cached manifests in {}/{}",
                entry.namespace, entry.name
            ))
        })?;

        let secret: Secret = serde_json::from_value(serde_json::to_value(&object)?)?;
        let bytes = secret
            .data
            .and_then(|mut data| data.remove(DATA_KEY))
            .ok_or_else(|| {
                HelmOperatorError::CacheConfigError(format!(
                    "{}/{} has no {} key",
                    entry.namespace, entry.name, DATA_KEY
                ))
            })?;
        let joined = String::from_utf8(bytes.0).map_err(|_| {
            HelmOperatorError::CacheConfigError(format!(
                "{}/{} is not valid UTF-8",
                entry.namespace, entry.name
            ))
        })?;

        let documents: Vec<String> = joined
            .split(DOCUMENT_SEPARATOR)
            .filter(|doc| !doc.trim().is_empty())
            .map(str::to_string)
            .collect();
        if documents.is_empty() {
            return Err(HelmOperatorError::CacheConfigError(format!(
                "{}/{} holds no documents",
                entry.namespace, entry.name
            )));
        }
        Ok(documents)
    }
}
