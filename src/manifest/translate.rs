// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Parse rendered documents into addressable objects.

use crate::error::{HelmOperatorError, Result};
use crate::kubernetes::{ObjectStore, ResourceMapping};
use crate::types::resource::parse_api_version;
use crate::types::Resource;
use kube::api::{DynamicObject, GroupVersionKind};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// One rendered document with its normalized identity and API mapping
#[derive(Clone, Debug)]
pub struct TranslatedObject {
    pub descriptor: Resource,
    pub mapping: ResourceMapping,
    pub object: DynamicObject,
}

/// Translate documents in order.
///
/// Namespaced objects without a namespace land in `release_namespace`;
/// cluster-scoped objects lose any namespace they were rendered with. Any
/// unresolvable kind fails the whole set.
pub async fn translate_all(
    store: &dyn ObjectStore,
    documents: &[String],
    release_namespace: &str,
) -> Result<Vec<TranslatedObject>> {
    let mut mappings: HashMap<(String, String, String), ResourceMapping> = HashMap::new();
    let mut translated = Vec::with_capacity(documents.len());

    for doc in documents {
        let mut value = parse_document(doc)?;
        let (group, version, kind, name) = identity(&value)?;

        let key = (group.clone(), version.clone(), kind.clone());
        let mapping = match mappings.get(&key) {
            Some(mapping) => mapping.clone(),
            None => {
                let mapping = store
                    .resolve(&GroupVersionKind::gvk(&group, &version, &kind))
                    .await?;
                mappings.insert(key, mapping.clone());
                mapping
            }
        };

        let namespace = normalize_namespace(&mut value, &mapping, release_namespace);
        let descriptor = Resource {
            group,
            version,
            kind,
            name,
            namespace,
        };
        debug!(resource = %descriptor, "Translated document");

        translated.push(TranslatedObject {
            descriptor,
            mapping,
            object: serde_json::from_value(value)?,
        });
    }

    Ok(translated)
}

fn parse_document(doc: &str) -> Result<Value> {
    let value: Value = serde_yaml::from_str(doc)?;
    if !value.is_object() {
        return Err(HelmOperatorError::ManifestError(
            "document is not an object".to_string(),
        ));
    }
    Ok(value)
}

fn identity(value: &Value) -> Result<(String, String, String, String)> {
    let field = |pointer: &str| {
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };

    let api_version = field("/apiVersion")
        .ok_or_else(|| HelmOperatorError::ManifestError("missing apiVersion".to_string()))?;
    let kind = field("/kind")
        .ok_or_else(|| HelmOperatorError::ManifestError("missing kind".to_string()))?;
    let name = field("/metadata/name").ok_or_else(|| {
        HelmOperatorError::ManifestError(format!("{} without metadata.name", kind))
    })?;

    let (group, version) = parse_api_version(api_version);
    Ok((group, version, kind.to_string(), name.to_string()))
}

/// Resolve the effective namespace and write it back into the document
fn normalize_namespace(value: &mut Value, mapping: &ResourceMapping, release_namespace: &str) -> String {
    let rendered = value
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let namespace = match (mapping.namespaced, rendered.is_empty()) {
        (false, _) => String::new(),
        (true, true) => release_namespace.to_string(),
        (true, false) => rendered,
    };

    if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        if namespace.is_empty() {
            metadata.remove("namespace");
        } else {
            metadata.insert("namespace".to_string(), Value::String(namespace.clone()));
        }
    }
    namespace
}
