// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Access checks on behalf of the user that submitted a change.

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::UserInfo;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use kube::{api::PostParams, Api, Client};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Identity a request acts on behalf of. Derived per request, never stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Principal {
    pub uid: Option<String>,
    pub username: Option<String>,
    pub groups: Vec<String>,
    pub extra: BTreeMap<String, Vec<String>>,
}

impl From<&UserInfo> for Principal {
    fn from(user: &UserInfo) -> Self {
        Principal {
            uid: user.uid.clone(),
            username: user.username.clone(),
            groups: user.groups.clone().unwrap_or_default(),
            extra: user.extra.clone().unwrap_or_default(),
        }
    }
}

/// What is being asked for: a verb on a resource type in a namespace
#[derive(Clone, Debug, PartialEq)]
pub struct AccessRequest {
    pub verb: String,
    pub group: String,
    pub version: String,
    /// Plural resource name
    pub resource: String,
    /// Empty for cluster-scoped resources
    pub namespace: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    /// Authorizer's explanation, may be empty
    pub reason: String,
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, principal: &Principal, request: &AccessRequest) -> Result<Decision>;
}

/// Authorizer that asks the API server through a SubjectAccessReview
#[derive(Clone)]
pub struct SubjectAccessReviewAuthorizer {
    client: Client,
}

impl SubjectAccessReviewAuthorizer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn build_review(principal: &Principal, request: &AccessRequest) -> SubjectAccessReview {
    let namespace = (!request.namespace.is_empty()).then(|| request.namespace.clone());

    SubjectAccessReview {
        spec: SubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                namespace,
                verb: Some(request.verb.clone()),
                group: Some(request.group.clone()),
                version: Some(request.version.clone()),
                resource: Some(request.resource.clone()),
                ..Default::default()
            }),
            uid: principal.uid.clone(),
            user: principal.username.clone(),
            groups: Some(principal.groups.clone()),
            extra: (!principal.extra.is_empty()).then(|| principal.extra.clone()),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[async_trait]
impl Authorizer for SubjectAccessReviewAuthorizer {
    #[instrument(skip(self, principal), fields(user = ?principal.username, resource = %request.resource))]
    async fn authorize(&self, principal: &Principal, request: &AccessRequest) -> Result<Decision> {
        let reviews: Api<SubjectAccessReview> = Api::all(self.client.clone());
        let review = reviews
            .create(&PostParams::default(), &build_review(principal, request))
            .await?;

        let status = review.status.unwrap_or_default();
        debug!(allowed = status.allowed, "SubjectAccessReview answered");

        Ok(Decision {
            allowed: status.allowed,
            reason: status.reason.unwrap_or_default(),
        })
    }
}
