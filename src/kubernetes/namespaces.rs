// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace management utilities

use crate::error::Result;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client,
};
use tracing::{debug, info, instrument};

/// Ensure the namespace holding the manifest cache exists, create if it doesn't
#[instrument(skip(client))]
pub async fn ensure_namespace_exists(client: &Client, namespace: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    if namespaces.get_opt(namespace).await?.is_some() {
        debug!("Namespace {} already exists", namespace);
        return Ok(());
    }

    info!("Creating namespace {}", namespace);
    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {}
        // Lost a race with another replica
        Err(kube::Error::Api(err)) if err.code == 409 => {}
        Err(e) => return Err(e.into()),
    }
    info!("Namespace {} ready", namespace);
    Ok(())
}
