// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HelmChart reconciler - applies releases and cleans up after deleted ones.

use crate::constants::FINALIZER;
use crate::error::{HelmOperatorError, Result};
use crate::sync::ReleaseApplier;
use crate::types::HelmChart;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    runtime::{
        controller::Action,
        finalizer::{finalizer, Event as Finalizer},
        Controller,
    },
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

pub struct HelmChartReconciler {
    client: Client,
    applier: ReleaseApplier,
    timeout: Duration,
}

impl HelmChartReconciler {
    pub fn new(client: Client, applier: ReleaseApplier, timeout: Duration) -> Self {
        Self {
            client,
            applier,
            timeout,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let charts: Api<HelmChart> = Api::all(self.client.clone());
        let client = self.client.clone();
        let context = Arc::new(self);

        // Owned objects are watched so drift on them is corrected promptly
        Controller::new(charts, WatcherConfig::default())
            .owns(Api::<ConfigMap>::all(client.clone()), WatcherConfig::default())
            .owns(Api::<Secret>::all(client.clone()), WatcherConfig::default())
            .owns(Api::<Service>::all(client.clone()), WatcherConfig::default())
            .owns(Api::<Deployment>::all(client.clone()), WatcherConfig::default())
            .owns(Api::<StatefulSet>::all(client.clone()), WatcherConfig::default())
            .owns(Api::<DaemonSet>::all(client.clone()), WatcherConfig::default())
            .owns(Api::<Ingress>::all(client), WatcherConfig::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled HelmChart: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

#[instrument(skip(chart, ctx), fields(chart = %chart.key()))]
async fn reconcile(chart: Arc<HelmChart>, ctx: Arc<HelmChartReconciler>) -> Result<Action> {
    let namespace = chart.namespace().unwrap_or_default();
    let charts: Api<HelmChart> = Api::namespaced(ctx.client.clone(), &namespace);
    let applier = &ctx.applier;

    let work = finalizer(&charts, FINALIZER, chart, |event| async move {
        match event {
            Finalizer::Apply(chart) => applier.apply_release(&chart).await,
            Finalizer::Cleanup(chart) => applier.cleanup_release(&chart).await,
        }
    });

    tokio::time::timeout(ctx.timeout, work)
        .await
        .map_err(|_| HelmOperatorError::Timeout(ctx.timeout))?
        .map_err(|e| HelmOperatorError::FinalizerError(Box::new(e)))
}

fn error_policy(
    chart: Arc<HelmChart>,
    error: &HelmOperatorError,
    _ctx: Arc<HelmChartReconciler>,
) -> Action {
    error!("Reconciliation of HelmChart {} failed: {}", chart.key(), error);
    super::backoff_for(error)
}
