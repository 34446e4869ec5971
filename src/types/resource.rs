// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Identity of a cluster object tracked outside native owner references.

use kube::api::GroupVersionKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind that is never deleted automatically; removing it would drop every instance cluster-wide.
pub const CUSTOM_RESOURCE_DEFINITION_KIND: &str = "CustomResourceDefinition";

/// A fully qualified reference to one cluster object.
///
/// Two resources are the same only when every field matches; the companion
/// diff relies on that structural equality.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    /// Empty for cluster-scoped resources
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl Resource {
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }

    /// The `apiVersion` string for this resource, e.g. `apps/v1` or `v1`
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn is_custom_resource_definition(&self) -> bool {
        self.kind == CUSTOM_RESOURCE_DEFINITION_KIND
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.api_version())?;
        if self.namespace.is_empty() {
            write!(f, " {}", self.name)
        } else {
            write!(f, " {}/{}", self.namespace, self.name)
        }
    }
}

/// Split an `apiVersion` into (group, version); the core group is empty.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}
