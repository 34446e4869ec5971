// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::{CustomResource, ResourceExt};
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Desired deployment of one chart with a value overlay
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "app.siji.io", version = "v1", kind = "HelmChart")]
#[kube(namespaced)]
#[kube(status = "HelmChartStatus")]
#[serde(rename_all = "camelCase")]
pub struct HelmChartSpec {
    pub chart: ChartReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub values: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartReference {
    /// Local path, `repo/name`, or `oci://` URL understood by helm
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Chart repository URL, for charts not available under a configured repo alias
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartStatus {
    /// Hash of the manifest set applied by the last successful reconcile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashed_manifests: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
    /// RFC 3339 time of the last status change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

impl HelmChart {
    /// Name of the chart as recorded in status, `path` or `path:version`
    pub fn chart_identity(&self) -> String {
        match &self.spec.chart.version {
            Some(version) => format!("{}:{}", self.spec.chart.path, version),
            None => self.spec.chart.path.clone(),
        }
    }

    /// The value overlay rendered as a YAML document for helm
    pub fn values_yaml(&self) -> Result<String> {
        match &self.spec.values {
            Some(values) if !values.is_null() => Ok(serde_yaml::to_string(values)?),
            _ => Ok("{}\n".to_string()),
        }
    }

    /// Hash of the last applied manifest set, if any
    pub fn applied_hash(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.hashed_manifests.as_deref())
    }

    /// `namespace/name`, used in log fields
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }
}

pub(crate) fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}
