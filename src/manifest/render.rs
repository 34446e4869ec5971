// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Chart rendering through `helm template`.

use crate::error::{HelmOperatorError, Result};
use crate::types::HelmChart;
use async_trait::async_trait;
use kube::ResourceExt;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Annotation marking a document as a helm hook, which is never applied
const HELM_HOOK_ANNOTATION: &str = "helm.sh/hook";

/// Turns a chart reference and value overlay into manifest documents.
///
/// The release name and namespace are those of the HelmChart. Output order is
/// the order documents must be applied in.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, chart: &HelmChart) -> Result<Vec<String>>;
}

/// Renderer shelling out to the helm CLI
#[derive(Clone, Debug)]
pub struct HelmTemplateRenderer {
    binary: String,
}

impl HelmTemplateRenderer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn args(chart: &HelmChart) -> Vec<String> {
        let mut args = vec![
            "template".to_string(),
            chart.name_any(),
            chart.spec.chart.path.clone(),
            "--namespace".to_string(),
            chart.namespace().unwrap_or_default(),
            "--no-hooks".to_string(),
        ];
        if let Some(version) = &chart.spec.chart.version {
            args.push("--version".to_string());
            args.push(version.clone());
        }
        if let Some(repo) = &chart.spec.chart.repo {
            args.push("--repo".to_string());
            args.push(repo.clone());
        }
        args.push("-f".to_string());
        args.push("-".to_string());
        args
    }
}

#[async_trait]
impl Renderer for HelmTemplateRenderer {
    #[instrument(skip(self, chart), fields(chart = %chart.key(), path = %chart.spec.chart.path))]
    async fn render(&self, chart: &HelmChart) -> Result<Vec<String>> {
        let values = chart.values_yaml()?;

        let mut child = Command::new(&self.binary)
            .args(Self::args(chart))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HelmOperatorError::RenderError(format!("failed to run {}: {}", self.binary, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(values.as_bytes())
                .await
                .map_err(|e| HelmOperatorError::RenderError(format!("failed to pass values: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| HelmOperatorError::RenderError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HelmOperatorError::RenderError(format!(
                "helm template failed: {}",
                stderr.trim()
            )));
        }

        let documents = split_documents(&String::from_utf8_lossy(&output.stdout));
        debug!(count = documents.len(), "Rendered chart");
        Ok(documents)
    }
}

/// Split multi-document YAML into object documents.
///
/// Empty and comment-only documents, documents without a `kind`, and hook
/// documents are dropped.
pub fn split_documents(yaml: &str) -> Vec<String> {
    yaml.split("\n---")
        .map(|doc| doc.trim_start_matches("---").trim())
        .filter(|doc| is_object_document(doc))
        .map(str::to_string)
        .collect()
}

fn is_object_document(doc: &str) -> bool {
    let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(doc) else {
        // Leave malformed documents for translation to report
        return !doc.is_empty() && doc.lines().any(|l| !l.trim_start().starts_with('#'));
    };
    let Some(mapping) = value.as_mapping() else {
        return false;
    };
    if !mapping.contains_key("kind") {
        return false;
    }
    let is_hook = value
        .get("metadata")
        .and_then(|m| m.get("annotations"))
        .and_then(|a| a.get(HELM_HOOK_ANNOTATION))
        .is_some();
    !is_hook
}
