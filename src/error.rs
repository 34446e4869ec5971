// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelmOperatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to render chart: {0}")]
    RenderError(String),

    #[error("Invalid manifest: {0}")]
    ManifestError(String),

    #[error("Failed to resolve resource type {kind}: {message}")]
    DiscoveryError { kind: String, message: String },

    #[error("Manifest cache misconfigured: {0}")]
    CacheConfigError(String),

    #[error("Failed to clean up resources: {0}")]
    CleanupError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Finalizer error: {0}")]
    FinalizerError(#[source] Box<kube::runtime::finalizer::Error<HelmOperatorError>>),
}

impl HelmOperatorError {
    /// Whether requeueing can make progress without someone changing the cluster first.
    pub fn is_retryable(&self) -> bool {
        use kube::runtime::finalizer::Error as FinalizerError;

        match self {
            HelmOperatorError::CacheConfigError(_) | HelmOperatorError::ManifestError(_) => false,
            HelmOperatorError::FinalizerError(inner) => match inner.as_ref() {
                FinalizerError::ApplyFailed(e) | FinalizerError::CleanupFailed(e) => {
                    e.is_retryable()
                }
                _ => true,
            },
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, HelmOperatorError>;
