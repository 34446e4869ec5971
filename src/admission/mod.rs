// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Validating admission webhook for HelmChart resources.
//!
//! Every object a HelmChart would create is checked against the requesting
//! user's permissions before the change is admitted. Admitted manifests are
//! cached so the reconciler applies exactly what was authorized.

pub mod gate;
pub mod validate;

pub use gate::{authorize_manifests, Verdict};

use crate::kubernetes::{Authorizer, ObjectStore};
use crate::manifest::{ManifestCache, Renderer};
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Path the API server posts HelmChart admission reviews to
pub const VALIDATE_PATH: &str = "/validate-app-siji-io-v1-helmchart";

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    pub store: Arc<dyn ObjectStore>,
    pub renderer: Arc<dyn Renderer>,
    pub authorizer: Arc<dyn Authorizer>,
    pub cache: ManifestCache,
    /// Deadline for one admission call
    pub timeout: Duration,
}

pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(VALIDATE_PATH, post(validate::validate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

/// Serve the webhook over TLS using `tls.crt` and `tls.key` from `cert_dir`
pub async fn serve(state: Arc<WebhookState>, port: u16, cert_dir: &Path) -> anyhow::Result<()> {
    let cert = cert_dir.join("tls.crt");
    let key = cert_dir.join("tls.key");
    let tls_config = RustlsConfig::from_pem_file(&cert, &key)
        .await
        .with_context(|| format!("Failed to load webhook certificate from {}", cert_dir.display()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "Starting admission webhook server");

    axum_server::bind_rustls(addr, tls_config)
        .serve(webhook_router(state).into_make_service())
        .await
        .context("Admission webhook server failed")?;

    Ok(())
}
