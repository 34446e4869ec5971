// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

use crate::types::resource::Resource;

/// Resources a HelmChart is responsible for that live outside its namespace.
///
/// Shares name and namespace with its HelmChart. `spec` holds what the last
/// render wants, `status` what the last successful cleanup pass settled on.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "app.siji.io", version = "v1", kind = "HelmDog")]
#[kube(namespaced)]
#[kube(status = "HelmDogStatus")]
pub struct HelmDogSpec {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct HelmDogStatus {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl HelmDog {
    /// Resources wanted by the current render
    pub fn desired(&self) -> &[Resource] {
        &self.spec.resources
    }

    /// Resources as of the last successful reconcile
    pub fn tracked(&self) -> &[Resource] {
        self.status
            .as_ref()
            .map(|s| s.resources.as_slice())
            .unwrap_or_default()
    }

    /// Everything this record may have caused to exist: tracked resources
    /// followed by desired ones not yet promoted to status.
    pub fn responsible_for(&self) -> Vec<Resource> {
        let mut all = self.tracked().to_vec();
        for res in self.desired() {
            if !all.contains(res) {
                all.push(res.clone());
            }
        }
        all
    }

    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }
}
