// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HelmChart admission: render, authorize each object, cache what was admitted.

use super::gate::{authorize_manifests, Verdict};
use super::WebhookState;
use crate::error::{HelmOperatorError, Result};
use crate::kubernetes::Principal;
use crate::manifest::translate_all;
use crate::types::HelmChart;
use axum::{extract::State, Json};
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
    ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<HelmChart>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<HelmChart> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    Json(review(&state, &req).await.into_review())
}

#[instrument(skip(state, request), fields(uid = %request.uid, chart = %format!("{}/{}", request.namespace.as_deref().unwrap_or_default(), request.name)))]
async fn review(state: &WebhookState, request: &AdmissionRequest<HelmChart>) -> AdmissionResponse {
    if !needs_authorization(request) {
        debug!("Nothing to authorize for {:?}", request.operation);
        return AdmissionResponse::from(request);
    }

    let Some(object) = &request.object else {
        return AdmissionResponse::invalid("admission request carries no HelmChart");
    };

    let mut chart = object.clone();
    if chart.metadata.namespace.is_none() {
        chart.metadata.namespace = request.namespace.clone();
    }
    if chart.metadata.name.is_none() && !request.name.is_empty() {
        chart.metadata.name = Some(request.name.clone());
    }

    let principal = Principal::from(&request.user_info);
    let outcome = tokio::time::timeout(
        state.timeout,
        admit(state, &chart, &principal, request.dry_run),
    )
    .await
    .unwrap_or(Err(HelmOperatorError::Timeout(state.timeout)));

    match outcome {
        Ok(Verdict::Allowed) => {
            info!(user = ?principal.username, "Admitted");
            AdmissionResponse::from(request)
        }
        Ok(Verdict::Denied { reason }) => AdmissionResponse::from(request).deny(reason),
        Err(e) => {
            warn!(error = %e, "Rejecting HelmChart");
            AdmissionResponse::from(request).deny(e.to_string())
        }
    }
}

/// Creates always render; updates only when the spec changed on a live chart.
///
/// Finalizer and status writes leave the admitted cache entry untouched, and a
/// chart being deleted can always release its finalizer.
fn needs_authorization(request: &AdmissionRequest<HelmChart>) -> bool {
    match request.operation {
        Operation::Create => true,
        Operation::Update => {
            let Some(object) = &request.object else {
                return true;
            };
            if object.metadata.deletion_timestamp.is_some() {
                return false;
            }
            request
                .old_object
                .as_ref()
                .map_or(true, |old| old.spec != object.spec)
        }
        _ => false,
    }
}

/// Render and gate the chart; cache its manifests when every object is allowed
async fn admit(
    state: &WebhookState,
    chart: &HelmChart,
    principal: &Principal,
    dry_run: bool,
) -> Result<Verdict> {
    let namespace = chart.namespace().unwrap_or_default();
    let documents = state.renderer.render(chart).await?;
    let objects = translate_all(state.store.as_ref(), &documents, &namespace).await?;

    let verdict = authorize_manifests(state.authorizer.as_ref(), principal, &objects).await?;
    if verdict == Verdict::Allowed && !dry_run {
        state
            .cache
            .store(&namespace, &chart.name_any(), &documents)
            .await?;
    }
    Ok(verdict)
}
