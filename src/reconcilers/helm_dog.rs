// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HelmDog reconciler - deletes tracked resources that are no longer rendered.

use crate::constants::requeue::RESYNC_SECS;
use crate::constants::FINALIZER;
use crate::error::{HelmOperatorError, Result};
use crate::sync::CompanionTracker;
use crate::types::HelmDog;
use futures::StreamExt;
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
use tracing::{debug, error, info, instrument, warn};

pub struct HelmDogReconciler {
    client: Client,
    tracker: CompanionTracker,
    timeout: Duration,
}

impl HelmDogReconciler {
    pub fn new(client: Client, tracker: CompanionTracker, timeout: Duration) -> Self {
        Self {
            client,
            tracker,
            timeout,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let dogs: Api<HelmDog> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(dogs, WatcherConfig::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled HelmDog: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

#[instrument(skip(dog, ctx), fields(helmdog = %dog.key()))]
async fn reconcile(dog: Arc<HelmDog>, ctx: Arc<HelmDogReconciler>) -> Result<Action> {
    let namespace = dog.namespace().unwrap_or_default();
    let dogs: Api<HelmDog> = Api::namespaced(ctx.client.clone(), &namespace);
    let tracker = &ctx.tracker;

    let work = finalizer(&dogs, FINALIZER, dog, |event| async move {
        match event {
            Finalizer::Apply(dog) => tracker
                .sync(&dog)
                .await
                .map(|_| Action::requeue(Duration::from_secs(RESYNC_SECS))),
            Finalizer::Cleanup(dog) => {
                let resources = dog.responsible_for();
                tracker.delete_all(&resources).await?;
                info!(count = resources.len(), "Tracked resources removed");
                Ok::<_, HelmOperatorError>(Action::await_change())
            }
        }
    });

    tokio::time::timeout(ctx.timeout, work)
        .await
        .map_err(|_| HelmOperatorError::Timeout(ctx.timeout))?
        .map_err(|e| HelmOperatorError::FinalizerError(Box::new(e)))
}

fn error_policy(dog: Arc<HelmDog>, error: &HelmOperatorError, _ctx: Arc<HelmDogReconciler>) -> Action {
    error!("Reconciliation of HelmDog {} failed: {}", dog.key(), error);
    super::backoff_for(error)
}
