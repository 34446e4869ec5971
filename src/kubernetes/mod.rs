// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery, object access, authorization and namespace management.

pub mod authorizer;
pub mod crd;
pub mod namespaces;
pub mod store;

pub use authorizer::{AccessRequest, Authorizer, Decision, Principal, SubjectAccessReviewAuthorizer};
pub use crd::wait_for_crds;
pub use namespaces::ensure_namespace_exists;
pub use store::{KubeObjectStore, ObjectStore, ResourceMapping};
