// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources served by the operator and the resource descriptor they share.

pub mod helm_chart;
pub mod helm_dog;
pub mod resource;

pub use helm_chart::{ChartReference, HelmChart, HelmChartSpec, HelmChartStatus};
pub use helm_dog::{HelmDog, HelmDogSpec, HelmDogStatus};
pub use resource::Resource;
