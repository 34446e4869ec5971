// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod helm_chart;
pub mod helm_dog;

pub use helm_chart::HelmChartReconciler;
pub use helm_dog::HelmDogReconciler;

use crate::constants::requeue::ERROR_SECS;
use crate::error::HelmOperatorError;
use kube::runtime::controller::Action;
use std::time::Duration;

/// Requeue transient failures; wait for a change to the object on fatal ones
fn backoff_for(error: &HelmOperatorError) -> Action {
    if error.is_retryable() {
        Action::requeue(Duration::from_secs(ERROR_SECS))
    } else {
        Action::await_change()
    }
}
