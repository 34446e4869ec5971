// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Garbage collection of resources outside a HelmChart's namespace.
//!
//! Such resources cannot carry an owner reference to the HelmChart, so they
//! are recorded on a HelmDog and deleted here when they drop out of the
//! desired set or when the HelmChart goes away.

use crate::constants::annotations;
use crate::error::{HelmOperatorError, Result};
use crate::kubernetes::ObjectStore;
use crate::types::{HelmDog, Resource};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What happened to one tracked resource during cleanup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Already gone
    Absent,
    /// Protected by the keep annotation or its kind
    Kept,
    Deleted,
    /// Deleted, then stripped of the finalizers holding it back
    ForceFinalized,
}

/// Members of `tracked` no longer present in `desired`
pub fn removed(tracked: &[Resource], desired: &[Resource]) -> Vec<Resource> {
    tracked
        .iter()
        .filter(|res| !desired.contains(res))
        .cloned()
        .collect()
}

#[derive(Clone)]
pub struct CompanionTracker {
    store: Arc<dyn ObjectStore>,
}

impl CompanionTracker {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Delete what dropped out of the HelmDog's spec, then promote spec to status.
    ///
    /// Status only advances once every removed resource is confirmed gone.
    #[instrument(skip(self, dog), fields(helmdog = %dog.key()))]
    pub async fn sync(&self, dog: &HelmDog) -> Result<()> {
        let removed = removed(dog.tracked(), dog.desired());
        if removed.is_empty() && dog.tracked() == dog.desired() {
            debug!("Tracked resources up to date");
            return Ok(());
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "Deleting resources no longer rendered");
            self.delete_all(&removed).await?;
        }

        self.store
            .patch_companion_status(
                &dog.namespace().unwrap_or_default(),
                &dog.name_any(),
                dog.desired(),
            )
            .await
    }

    /// Delete resources in reverse order, attempting every one before reporting failures
    pub async fn delete_all(&self, resources: &[Resource]) -> Result<()> {
        let mut failures = Vec::new();
        for res in resources.iter().rev() {
            if let Err(e) = self.delete_one(res).await {
                warn!(resource = %res, error = %e, "Failed to delete resource");
                failures.push(format!("{}: {}", res, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HelmOperatorError::CleanupError(failures.join(", ")))
        }
    }

    #[instrument(skip(self), fields(resource = %res))]
    pub async fn delete_one(&self, res: &Resource) -> Result<DeleteOutcome> {
        let Some(live) = self.store.get(res).await? else {
            return Ok(DeleteOutcome::Absent);
        };

        if live.annotations().contains_key(annotations::KEEP) {
            info!("Keeping resource annotated with {}", annotations::KEEP);
            return Ok(DeleteOutcome::Kept);
        }
        if res.is_custom_resource_definition() {
            info!("Not deleting CustomResourceDefinition");
            return Ok(DeleteOutcome::Kept);
        }

        if !self.store.delete(res).await? {
            return Ok(DeleteOutcome::Absent);
        }

        match self.store.get(res).await? {
            Some(lingering) if !lingering.finalizers().is_empty() => {
                info!(finalizers = ?lingering.finalizers(), "Removing finalizers");
                self.store.clear_finalizers(res).await?;
                Ok(DeleteOutcome::ForceFinalized)
            }
            _ => {
                debug!("Deleted");
                Ok(DeleteOutcome::Deleted)
            }
        }
    }
}
