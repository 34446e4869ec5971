// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Applying releases and collecting the resources they leave behind.

pub mod applier;
pub mod tracker;

pub use applier::{manifest_hash, ManifestSource, ReleaseApplier};
pub use tracker::{removed, CompanionTracker, DeleteOutcome};
