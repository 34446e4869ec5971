// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use helm_operator::admission::{self, WebhookState};
use helm_operator::config::Config;
use helm_operator::kubernetes::{
    ensure_namespace_exists, wait_for_crds, KubeObjectStore, ObjectStore,
    SubjectAccessReviewAuthorizer,
};
use helm_operator::manifest::{HelmTemplateRenderer, ManifestCache, Renderer};
use helm_operator::reconcilers::{HelmChartReconciler, HelmDogReconciler};
use helm_operator::sync::{CompanionTracker, ManifestSource, ReleaseApplier};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting helm-operator");

    let config = Config::from_env()?;
    info!(
        webhooks_enabled = config.webhooks_enabled,
        operator_namespace = %config.operator_namespace,
        "Configuration loaded"
    );

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for HelmChart and HelmDog CRDs to become available...");
    wait_for_crds(&client).await?;

    let store: Arc<dyn ObjectStore> = Arc::new(KubeObjectStore::new(client.clone()));
    let renderer: Arc<dyn Renderer> = Arc::new(HelmTemplateRenderer::new(config.helm_binary.clone()));
    let cache = ManifestCache::new(store.clone(), config.operator_namespace.clone());

    // With gating on, only manifests admitted by the webhook are ever applied
    let source = if config.webhooks_enabled {
        ensure_namespace_exists(&client, &config.operator_namespace).await?;
        ManifestSource::Cache(cache.clone())
    } else {
        ManifestSource::Renderer(renderer.clone())
    };

    let chart_reconciler = HelmChartReconciler::new(
        client.clone(),
        ReleaseApplier::new(store.clone(), source),
        config.reconcile_timeout,
    );
    let dog_reconciler = HelmDogReconciler::new(
        client.clone(),
        CompanionTracker::new(store.clone()),
        config.reconcile_timeout,
    );

    let webhook = async {
        if !config.webhooks_enabled {
            return Ok(());
        }
        let state = Arc::new(WebhookState {
            store: store.clone(),
            renderer: renderer.clone(),
            authorizer: Arc::new(SubjectAccessReviewAuthorizer::new(client.clone())),
            cache: cache.clone(),
            timeout: config.admission_timeout,
        });
        admission::serve(state, config.webhook_port, &config.webhook_cert_dir).await
    };

    info!("Starting reconcilers...");

    tokio::try_join!(chart_reconciler.run(), dog_reconciler.run(), webhook)?;

    // This should never be reached as reconcilers run forever
    warn!("All reconcilers stopped unexpectedly");
    Ok(())
}
