// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-object authorization of a rendered manifest set.

use crate::error::Result;
use crate::kubernetes::{AccessRequest, Authorizer, Principal};
use crate::manifest::TranslatedObject;
use tracing::{debug, info};

/// Verb checked for every object; the operator may create, update and delete them
const GATE_VERB: &str = "*";

#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Allowed,
    Denied { reason: String },
}

/// Check every object against the principal's permissions, stopping at the first denial
pub async fn authorize_manifests(
    authorizer: &dyn Authorizer,
    principal: &Principal,
    objects: &[TranslatedObject],
) -> Result<Verdict> {
    for translated in objects {
        let res = &translated.descriptor;
        let request = AccessRequest {
            verb: GATE_VERB.to_string(),
            group: res.group.clone(),
            version: res.version.clone(),
            resource: translated.mapping.plural.clone(),
            namespace: res.namespace.clone(),
        };

        let decision = authorizer.authorize(principal, &request).await?;
        if !decision.allowed {
            let reason = if decision.reason.is_empty() {
                format!("not allowed to create {}", res.kind)
            } else {
                decision.reason
            };
            info!(user = ?principal.username, resource = %res, "Denied: {}", reason);
            return Ok(Verdict::Denied { reason });
        }
        debug!(resource = %res, "Allowed");
    }

    Ok(Verdict::Allowed)
}
